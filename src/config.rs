use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::camera::CameraSettings;
use crate::overlay::OverlayStyle;
use crate::pipeline::{confidence_in_range, RunConfig};

const DEFAULT_CAMERA_INDEX: u32 = 0;
const DEFAULT_FRAME_WIDTH: u32 = 640;
const DEFAULT_FRAME_HEIGHT: u32 = 480;
const DEFAULT_TARGET_FPS: u32 = 30;
const DEFAULT_CONFIDENCE: f32 = 0.5;
const DEFAULT_BACKEND: &str = "synthetic";
const DEFAULT_SCREENSHOT_PREFIX: &str = "detection";
const DEFAULT_WEB_ADDR: &str = "127.0.0.1:8420";

#[derive(Debug, Deserialize, Default)]
struct AppConfigFile {
    camera: Option<CameraConfigFile>,
    detection: Option<DetectionConfigFile>,
    overlay: Option<OverlayConfigFile>,
    screenshot_prefix: Option<String>,
    web: Option<WebConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    index: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
    synthetic: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectionConfigFile {
    backend: Option<String>,
    confidence_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct OverlayConfigFile {
    show_panel: Option<bool>,
    font_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct WebConfigFile {
    addr: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub camera_index: u32,
    pub camera: CameraSettings,
    pub backend: String,
    pub confidence_threshold: f32,
    pub show_overlay: bool,
    pub font_path: Option<PathBuf>,
    pub screenshot_prefix: String,
    pub web_addr: String,
}

impl AppConfig {
    /// Load from the JSON file named by `LOOKOUT_CONFIG` (if any), apply
    /// `LOOKOUT_*` environment overrides, then validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("LOOKOUT_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: AppConfigFile) -> Self {
        let camera = file.camera.unwrap_or_default();
        let detection = file.detection.unwrap_or_default();
        let overlay = file.overlay.unwrap_or_default();
        Self {
            camera_index: camera.index.unwrap_or(DEFAULT_CAMERA_INDEX),
            camera: CameraSettings {
                width: camera.width.unwrap_or(DEFAULT_FRAME_WIDTH),
                height: camera.height.unwrap_or(DEFAULT_FRAME_HEIGHT),
                target_fps: camera.target_fps.unwrap_or(DEFAULT_TARGET_FPS),
                synthetic: camera.synthetic.unwrap_or(true),
            },
            backend: detection
                .backend
                .unwrap_or_else(|| DEFAULT_BACKEND.to_string()),
            confidence_threshold: detection.confidence_threshold.unwrap_or(DEFAULT_CONFIDENCE),
            show_overlay: overlay.show_panel.unwrap_or(true),
            font_path: overlay.font_path,
            screenshot_prefix: file
                .screenshot_prefix
                .unwrap_or_else(|| DEFAULT_SCREENSHOT_PREFIX.to_string()),
            web_addr: file
                .web
                .and_then(|web| web.addr)
                .unwrap_or_else(|| DEFAULT_WEB_ADDR.to_string()),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(index) = std::env::var("LOOKOUT_CAMERA_INDEX") {
            self.camera_index = index
                .trim()
                .parse()
                .map_err(|_| anyhow!("LOOKOUT_CAMERA_INDEX must be a non-negative integer"))?;
        }
        if let Ok(synthetic) = std::env::var("LOOKOUT_CAMERA_SYNTHETIC") {
            self.camera.synthetic = parse_bool(&synthetic)
                .ok_or_else(|| anyhow!("LOOKOUT_CAMERA_SYNTHETIC must be a boolean"))?;
        }
        if let Ok(confidence) = std::env::var("LOOKOUT_CONFIDENCE") {
            self.confidence_threshold = confidence
                .trim()
                .parse()
                .map_err(|_| anyhow!("LOOKOUT_CONFIDENCE must be a number in (0, 1]"))?;
        }
        if let Ok(backend) = std::env::var("LOOKOUT_BACKEND") {
            if !backend.trim().is_empty() {
                self.backend = backend.trim().to_string();
            }
        }
        if let Ok(addr) = std::env::var("LOOKOUT_WEB_ADDR") {
            if !addr.trim().is_empty() {
                self.web_addr = addr;
            }
        }
        if let Ok(prefix) = std::env::var("LOOKOUT_SCREENSHOT_PREFIX") {
            if !prefix.trim().is_empty() {
                self.screenshot_prefix = prefix;
            }
        }
        if let Ok(path) = std::env::var("LOOKOUT_FONT_PATH") {
            if !path.trim().is_empty() {
                self.font_path = Some(PathBuf::from(path));
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !confidence_in_range(self.confidence_threshold) {
            return Err(anyhow!(
                "confidence threshold must be in (0, 1], got {}",
                self.confidence_threshold
            ));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera geometry must be non-zero"));
        }
        if self.backend.is_empty() {
            return Err(anyhow!("detection backend name must not be empty"));
        }
        if self.screenshot_prefix.is_empty() {
            return Err(anyhow!("screenshot prefix must not be empty"));
        }
        Ok(())
    }

    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            confidence_threshold: self.confidence_threshold,
            camera_index: self.camera_index,
            show_overlay: self.show_overlay,
        }
    }

    pub fn overlay_style(&self) -> OverlayStyle {
        OverlayStyle {
            font_path: self.font_path.clone(),
        }
    }
}

fn read_config_file(path: &Path) -> Result<AppConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
