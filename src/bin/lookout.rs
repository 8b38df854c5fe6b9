//! lookout — terminal front-end for the detection loop.
//!
//! Runs the blocking frame loop against a camera (synthetic by default) and
//! translates stdin keyboard commands into the loop's command surface:
//!
//!   q quit | s screenshot | r reset | p pause | g go
//!   + / - step threshold | t <v> set threshold | c <i> select camera
//!
//! Commands are drained between frames, never mid-frame. Ctrl-C stops the
//! loop and prints the final statistics summary.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, TryRecvError};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::BufRead;

use lookout::{
    AppConfig, BackendRegistry, Command, FrameLoop, MotionBackend, Overlay, StatsSnapshot,
    SyntheticBackend, SystemCameraOpener, TerminalSink,
};

const THRESHOLD_STEP: f32 = 0.05;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Camera index to open.
    #[arg(long)]
    camera: Option<u32>,
    /// Initial confidence threshold in (0, 1].
    #[arg(long)]
    confidence: Option<f32>,
    /// Detector backend name (synthetic, motion).
    #[arg(long)]
    backend: Option<String>,
    /// Capture from a real V4L2 device instead of the synthetic scene.
    #[arg(long)]
    device: bool,
    /// Hide the information panel overlay.
    #[arg(long)]
    no_panel: bool,
    /// Start paused; use 'g' to begin.
    #[arg(long)]
    paused: bool,
}

/// Keyboard input after parsing: either a loop command, a relative
/// threshold step (resolved against the current config), or quit.
enum KeyInput {
    Quit,
    Command(Command),
    StepConfidence(f32),
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = AppConfig::load()?;
    if let Some(camera) = args.camera {
        cfg.camera_index = camera;
    }
    if let Some(confidence) = args.confidence {
        cfg.confidence_threshold = confidence;
    }
    if let Some(backend) = &args.backend {
        cfg.backend = backend.clone();
    }
    if args.device {
        cfg.camera.synthetic = false;
    }
    if args.no_panel {
        cfg.show_overlay = false;
    }
    cfg.validate()?;

    let mut registry = BackendRegistry::new();
    registry.register(SyntheticBackend::new());
    registry.register(MotionBackend::new());
    registry.set_default(&cfg.backend)?;
    let detector = registry
        .default_backend()
        .ok_or_else(|| anyhow!("no detector backend registered"))?;

    let opener = SystemCameraOpener::new(cfg.camera.clone());
    let overlay = Overlay::new(&cfg.overlay_style());
    let mut frame_loop = FrameLoop::new(
        cfg.run_config(),
        Box::new(opener),
        detector,
        overlay,
        cfg.screenshot_prefix.clone(),
    );
    let mut sink = TerminalSink::default();

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let flag = interrupted.clone();
        ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))?;
    }

    let (tx, rx) = mpsc::channel();
    spawn_stdin_reader(tx);

    println!("controls: q quit | s screenshot | r reset | p pause | g go | +/- threshold | t <v> | c <i>");

    if !args.paused {
        report(frame_loop.apply(Command::Start));
    }

    while !interrupted.load(Ordering::SeqCst) {
        // Drain pending keyboard commands between frames.
        loop {
            match rx.try_recv() {
                Ok(KeyInput::Quit) => {
                    interrupted.store(true, Ordering::SeqCst);
                    break;
                }
                Ok(KeyInput::Command(command)) => report(frame_loop.apply(command)),
                Ok(KeyInput::StepConfidence(delta)) => {
                    let next = (frame_loop.config().confidence_threshold + delta)
                        .clamp(THRESHOLD_STEP, 1.0);
                    report(frame_loop.apply(Command::SetConfidence(next)));
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => break,
            }
        }
        if interrupted.load(Ordering::SeqCst) {
            break;
        }

        if frame_loop.is_running() {
            if let Err(err) = frame_loop.tick(&mut sink) {
                log::error!("frame loop halted: {:#}", err);
            }
        } else {
            std::thread::sleep(Duration::from_millis(50));
        }
    }

    frame_loop.stop()?;
    print_final_summary(&frame_loop.snapshot());
    Ok(())
}

fn spawn_stdin_reader(tx: mpsc::Sender<KeyInput>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match parse_key_line(line) {
                Some(input) => {
                    if tx.send(input).is_err() {
                        break;
                    }
                }
                None => eprintln!("unknown command: {}", line),
            }
        }
    });
}

fn parse_key_line(line: &str) -> Option<KeyInput> {
    let mut parts = line.split_whitespace();
    let key = parts.next()?;
    match key {
        "q" | "quit" => Some(KeyInput::Quit),
        "s" | "screenshot" => Some(KeyInput::Command(Command::TakeScreenshot)),
        "r" | "reset" => Some(KeyInput::Command(Command::ResetStats)),
        "p" | "pause" | "stop" => Some(KeyInput::Command(Command::Stop)),
        "g" | "go" | "start" => Some(KeyInput::Command(Command::Start)),
        "+" => Some(KeyInput::StepConfidence(THRESHOLD_STEP)),
        "-" => Some(KeyInput::StepConfidence(-THRESHOLD_STEP)),
        "t" | "threshold" => parts
            .next()?
            .parse()
            .ok()
            .map(|v| KeyInput::Command(Command::SetConfidence(v))),
        "c" | "camera" => parts
            .next()?
            .parse()
            .ok()
            .map(|i| KeyInput::Command(Command::SelectCamera(i))),
        _ => None,
    }
}

fn report(outcome: Result<lookout::CommandOutcome>) {
    match outcome {
        Ok(outcome) => log::info!("{}", outcome),
        Err(err) => log::warn!("command rejected: {:#}", err),
    }
}

fn print_final_summary(snapshot: &StatsSnapshot) {
    println!("final statistics:");
    println!("  frames processed: {}", snapshot.frames_processed);
    println!("  total detections: {}", snapshot.total_detections);
    for (class, count) in &snapshot.per_class {
        println!("  {}: {}", class, count);
    }
}
