//! Web front-end adapter.
//!
//! Serves a small dashboard over the frame loop: the latest annotated frame
//! as JPEG, a JSON statistics panel, and a control endpoint that translates
//! HTTP requests into [`Command`] values queued to the loop thread. The
//! server owns no loop state; it only reads the shared [`PanelState`] the
//! loop publishes into and writes to the command queue, so the loop stays
//! single-threaded.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::pipeline::{confidence_in_range, Command};
use crate::sink::{encode_jpeg, DisplaySink};
use crate::stats::StatsSnapshot;

const MAX_REQUEST_BYTES: usize = 16 * 1024;
const FRAME_JPEG_QUALITY: u8 = 80;

/// State shared between the loop thread and the HTTP thread.
#[derive(Default)]
pub struct PanelState {
    frame_jpeg: Mutex<Option<Vec<u8>>>,
    stats: Mutex<StatsSnapshot>,
    fps: Mutex<f32>,
    running: AtomicBool,
    last_error: Mutex<Option<String>>,
}

impl PanelState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    pub fn set_fps(&self, fps: f32) {
        if let Ok(mut guard) = self.fps.lock() {
            *guard = fps;
        }
    }

    pub fn set_last_error(&self, error: Option<String>) {
        if let Ok(mut guard) = self.last_error.lock() {
            *guard = error;
        }
    }

    pub fn store_frame(&self, jpeg: Vec<u8>) {
        if let Ok(mut guard) = self.frame_jpeg.lock() {
            *guard = Some(jpeg);
        }
    }

    pub fn store_stats(&self, snapshot: StatsSnapshot) {
        if let Ok(mut guard) = self.stats.lock() {
            *guard = snapshot;
        }
    }

    fn frame(&self) -> Option<Vec<u8>> {
        self.frame_jpeg.lock().ok().and_then(|guard| guard.clone())
    }

    fn report(&self) -> PanelReport {
        PanelReport {
            running: self.running.load(Ordering::SeqCst),
            fps: self.fps.lock().map(|guard| *guard).unwrap_or(0.0),
            last_error: self
                .last_error
                .lock()
                .ok()
                .and_then(|guard| guard.clone()),
            stats: self
                .stats
                .lock()
                .map(|guard| guard.clone())
                .unwrap_or_default(),
        }
    }
}

#[derive(Serialize)]
struct PanelReport {
    running: bool,
    fps: f32,
    last_error: Option<String>,
    stats: StatsSnapshot,
}

/// Display sink that publishes frames and stats into the shared panel.
pub struct WebSink {
    panel: Arc<PanelState>,
}

impl WebSink {
    pub fn new(panel: Arc<PanelState>) -> Self {
        Self { panel }
    }
}

impl DisplaySink for WebSink {
    fn emit_frame(&mut self, frame: &image::RgbImage) -> Result<()> {
        let jpeg = encode_jpeg(frame, FRAME_JPEG_QUALITY)?;
        self.panel.store_frame(jpeg);
        Ok(())
    }

    fn emit_stats(&mut self, snapshot: &StatsSnapshot) -> Result<()> {
        self.panel.store_stats(snapshot.clone());
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct WebConfig {
    pub addr: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8420".to_string(),
        }
    }
}

#[derive(Debug)]
pub struct WebHandle {
    pub addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl WebHandle {
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("web server thread panicked"))?;
        }
        Ok(())
    }
}

pub struct WebServer {
    cfg: WebConfig,
    panel: Arc<PanelState>,
    commands: Sender<Command>,
}

impl WebServer {
    pub fn new(cfg: WebConfig, panel: Arc<PanelState>, commands: Sender<Command>) -> Self {
        Self {
            cfg,
            panel,
            commands,
        }
    }

    pub fn spawn(self) -> Result<WebHandle> {
        let configured_addr: SocketAddr = self.cfg.addr.parse()?;
        let listener = TcpListener::bind(configured_addr)?;
        let addr = listener.local_addr()?;
        if configured_addr.ip().is_loopback() && !addr.ip().is_loopback() {
            return Err(anyhow!(
                "web server configured for loopback address '{}', but bound to '{}'",
                configured_addr,
                addr
            ));
        }
        listener.set_nonblocking(true)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let panel = self.panel;
        let commands = self.commands;
        let join = std::thread::spawn(move || {
            if let Err(err) = run_server(listener, panel, commands, shutdown_thread) {
                log::error!("web server stopped: {:#}", err);
            }
        });

        Ok(WebHandle {
            addr,
            shutdown,
            join: Some(join),
        })
    }
}

fn run_server(
    listener: TcpListener,
    panel: Arc<PanelState>,
    commands: Sender<Command>,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match listener.accept() {
            Ok((stream, _)) => {
                if let Err(err) = handle_connection(stream, &panel, &commands) {
                    log::warn!("web request rejected: {:#}", err);
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(25));
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

fn handle_connection(
    mut stream: TcpStream,
    panel: &Arc<PanelState>,
    commands: &Sender<Command>,
) -> Result<()> {
    let request = read_request(&mut stream)?;

    match (request.method.as_str(), request.path.as_str()) {
        ("GET", "/") => write_response(&mut stream, 200, "text/html", INDEX_HTML.as_bytes()),
        ("GET", "/health") => write_json_response(&mut stream, 200, r#"{"status":"ok"}"#),
        ("GET", "/stats") => {
            let payload = serde_json::to_vec(&panel.report())?;
            write_response(&mut stream, 200, "application/json", &payload)
        }
        ("GET", "/frame.jpg") => match panel.frame() {
            Some(jpeg) => write_response(&mut stream, 200, "image/jpeg", &jpeg),
            None => write_json_response(&mut stream, 404, r#"{"error":"no_frame"}"#),
        },
        ("POST", "/control") => {
            let command = serde_json::from_slice::<ControlRequest>(&request.body)
                .map_err(|err| anyhow!("{}", err))
                .and_then(ControlRequest::into_command);
            let command = match command {
                Ok(command) => command,
                Err(err) => {
                    let body = serde_json::to_string(&serde_json::json!({
                        "error": "bad_request",
                        "detail": err.to_string(),
                    }))?;
                    return write_json_response(&mut stream, 400, &body);
                }
            };
            if commands.send(command).is_err() {
                return write_json_response(&mut stream, 503, r#"{"error":"loop_gone"}"#);
            }
            write_json_response(&mut stream, 202, r#"{"queued":true}"#)
        }
        ("GET", _) => write_json_response(&mut stream, 404, r#"{"error":"not_found"}"#),
        _ => write_json_response(&mut stream, 405, r#"{"error":"method_not_allowed"}"#),
    }
}

/// Control requests map one-to-one onto the loop's command surface.
#[derive(Debug, Deserialize)]
struct ControlRequest {
    command: String,
    value: Option<f32>,
    index: Option<u32>,
}

impl ControlRequest {
    fn into_command(self) -> Result<Command> {
        match self.command.as_str() {
            "start" => Ok(Command::Start),
            "stop" => Ok(Command::Stop),
            "reset" => Ok(Command::ResetStats),
            "screenshot" => Ok(Command::TakeScreenshot),
            "set_confidence" => {
                let value = self
                    .value
                    .ok_or_else(|| anyhow!("set_confidence requires a value"))?;
                if !confidence_in_range(value) {
                    return Err(anyhow!("confidence must be in (0, 1], got {}", value));
                }
                Ok(Command::SetConfidence(value))
            }
            "select_camera" => {
                let index = self
                    .index
                    .ok_or_else(|| anyhow!("select_camera requires an index"))?;
                Ok(Command::SelectCamera(index))
            }
            other => Err(anyhow!("unknown command '{}'", other)),
        }
    }
}

#[derive(Debug)]
struct HttpRequest {
    method: String,
    path: String,
    body: Vec<u8>,
}

fn read_request(stream: &mut TcpStream) -> Result<HttpRequest> {
    stream.set_read_timeout(Some(Duration::from_secs(2)))?;
    let mut buf = [0u8; 1024];
    let mut data = Vec::new();
    let header_end = loop {
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        let n = stream.read(&mut buf)?;
        if n == 0 {
            return Err(anyhow!("connection closed before headers"));
        }
        data.extend_from_slice(&buf[..n]);
        if data.len() > MAX_REQUEST_BYTES {
            return Err(anyhow!("request too large"));
        }
    };

    let head = String::from_utf8_lossy(&data[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let request_line = lines.next().ok_or_else(|| anyhow!("empty request"))?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().ok_or_else(|| anyhow!("missing method"))?;
    let raw_path = parts.next().ok_or_else(|| anyhow!("missing path"))?;

    let mut headers = HashMap::new();
    for line in lines {
        if let Some((k, v)) = line.split_once(':') {
            headers.insert(k.trim().to_lowercase(), v.trim().to_string());
        }
    }

    let content_length: usize = headers
        .get("content-length")
        .map(|v| v.parse())
        .transpose()
        .map_err(|_| anyhow!("invalid content-length"))?
        .unwrap_or(0);
    if content_length > MAX_REQUEST_BYTES {
        return Err(anyhow!("request body too large"));
    }

    let mut body = data[header_end + 4..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            return Err(anyhow!("connection closed before body"));
        }
        body.extend_from_slice(&buf[..n]);
    }
    body.truncate(content_length);

    let path = raw_path.split('?').next().unwrap_or(raw_path).to_string();
    Ok(HttpRequest {
        method: method.to_string(),
        path,
        body,
    })
}

fn write_json_response(stream: &mut TcpStream, status: u16, body: &str) -> Result<()> {
    write_response(stream, status, "application/json", body.as_bytes())
}

fn write_response(
    stream: &mut TcpStream,
    status: u16,
    content_type: &str,
    body: &[u8],
) -> Result<()> {
    let status_line = match status {
        200 => "HTTP/1.1 200 OK",
        202 => "HTTP/1.1 202 Accepted",
        400 => "HTTP/1.1 400 Bad Request",
        404 => "HTTP/1.1 404 Not Found",
        405 => "HTTP/1.1 405 Method Not Allowed",
        503 => "HTTP/1.1 503 Service Unavailable",
        _ => "HTTP/1.1 500 Internal Server Error",
    };
    let header = format!(
        "{status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {len}\r\nCache-Control: no-store\r\n\r\n",
        status_line = status_line,
        content_type = content_type,
        len = body.len()
    );
    stream.write_all(header.as_bytes())?;
    stream.write_all(body)?;
    Ok(())
}

const INDEX_HTML: &str = r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>lookout</title>
<style>
body { font-family: sans-serif; margin: 1.5rem; background: #111; color: #ddd; }
img { border: 1px solid #444; max-width: 100%; }
button, input { margin: 0.2rem; }
#error { color: #e66; }
.row { display: flex; gap: 2rem; flex-wrap: wrap; }
pre { background: #1a1a1a; padding: 0.8rem; }
</style>
</head>
<body>
<h1>lookout</h1>
<div class="row">
  <div>
    <img id="frame" width="640" height="480" alt="no frame yet">
  </div>
  <div>
    <p>
      <button onclick="control({command:'start'})">Start</button>
      <button onclick="control({command:'stop'})">Stop</button>
      <button onclick="control({command:'reset'})">Reset stats</button>
      <button onclick="control({command:'screenshot'})">Screenshot</button>
    </p>
    <p>
      Threshold <input id="thr" type="number" min="0.05" max="1" step="0.05" value="0.5">
      <button onclick="control({command:'set_confidence', value: parseFloat(document.getElementById('thr').value)})">Set</button>
    </p>
    <p>
      Camera <input id="cam" type="number" min="0" step="1" value="0">
      <button onclick="control({command:'select_camera', index: parseInt(document.getElementById('cam').value)})">Select</button>
    </p>
    <p id="error"></p>
    <pre id="stats">loading…</pre>
  </div>
</div>
<script>
async function control(body) {
  await fetch('/control', {method: 'POST', body: JSON.stringify(body)});
}
async function refresh() {
  try {
    const report = await (await fetch('/stats')).json();
    document.getElementById('stats').textContent = JSON.stringify(report, null, 2);
    document.getElementById('error').textContent = report.last_error || '';
    if (report.running) {
      document.getElementById('frame').src = '/frame.jpg?ts=' + Date.now();
    }
  } catch (err) {
    document.getElementById('error').textContent = String(err);
  }
}
setInterval(refresh, 500);
refresh();
</script>
</body>
</html>
"#;
