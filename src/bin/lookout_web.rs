//! lookout_web — web dashboard front-end for the detection loop.
//!
//! Starts the HTTP panel server, then drives the frame loop on the main
//! thread at roughly 10 fps. Dashboard buttons post to `/control`, which
//! queues commands; the queue is drained between frames so the loop stays
//! single-threaded. Command failures (invalid threshold, screenshot before
//! the first frame) surface in the panel as `last_error`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::Parser;

use lookout::{
    AppConfig, BackendRegistry, Command, FrameLoop, MotionBackend, Overlay, PanelState,
    SyntheticBackend, SystemCameraOpener, WebConfig, WebServer, WebSink,
};

const LOOP_PACE: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Listen address for the dashboard (host:port).
    #[arg(long)]
    addr: Option<String>,
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
    /// Begin detection immediately instead of waiting for Start.
    #[arg(long)]
    autostart: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = AppConfig::load()?;
    if let Some(addr) = &args.addr {
        cfg.web_addr = addr.clone();
    }
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

    let panel = PanelState::new();
    let (tx, rx) = mpsc::channel::<Command>();
    let server = WebServer::new(
        WebConfig {
            addr: cfg.web_addr.clone(),
        },
        panel.clone(),
        tx,
    );
    let handle = server.spawn()?;
    log::info!("dashboard listening on http://{}", handle.addr);

    let mut sink = WebSink::new(panel.clone());

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let flag = interrupted.clone();
        ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))?;
    }

    if args.autostart {
        apply_command(&mut frame_loop, Command::Start, &panel);
    }

    while !interrupted.load(Ordering::SeqCst) {
        while let Ok(command) = rx.try_recv() {
            apply_command(&mut frame_loop, command, &panel);
        }
        panel.set_running(frame_loop.is_running());

        if frame_loop.is_running() {
            match frame_loop.tick(&mut sink) {
                Ok(summary) => panel.set_fps(summary.fps),
                Err(err) => {
                    log::error!("frame loop halted: {:#}", err);
                    panel.set_last_error(Some(format!("{:#}", err)));
                    panel.set_running(false);
                }
            }
        }

        std::thread::sleep(LOOP_PACE);
    }

    frame_loop.stop()?;
    handle.stop()?;
    Ok(())
}

fn apply_command(frame_loop: &mut FrameLoop, command: Command, panel: &PanelState) {
    match frame_loop.apply(command) {
        Ok(outcome) => {
            log::info!("{}", outcome);
            panel.set_last_error(None);
        }
        Err(err) => {
            log::warn!("command rejected: {:#}", err);
            panel.set_last_error(Some(format!("{:#}", err)));
        }
    }
}
