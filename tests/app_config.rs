use std::sync::Mutex;

use tempfile::NamedTempFile;

use lookout::config::AppConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "LOOKOUT_CONFIG",
        "LOOKOUT_CAMERA_INDEX",
        "LOOKOUT_CAMERA_SYNTHETIC",
        "LOOKOUT_CONFIDENCE",
        "LOOKOUT_BACKEND",
        "LOOKOUT_WEB_ADDR",
        "LOOKOUT_SCREENSHOT_PREFIX",
        "LOOKOUT_FONT_PATH",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn defaults_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = AppConfig::load().expect("load config");

    assert_eq!(cfg.camera_index, 0);
    assert_eq!(cfg.camera.width, 640);
    assert_eq!(cfg.camera.height, 480);
    assert_eq!(cfg.camera.target_fps, 30);
    assert!(cfg.camera.synthetic);
    assert_eq!(cfg.backend, "synthetic");
    assert_eq!(cfg.confidence_threshold, 0.5);
    assert!(cfg.show_overlay);
    assert_eq!(cfg.screenshot_prefix, "detection");
    assert_eq!(cfg.web_addr, "127.0.0.1:8420");

    clear_env();
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "camera": {"index": 2, "width": 800, "height": 600, "target_fps": 15, "synthetic": false},
        "detection": {"backend": "motion", "confidence_threshold": 0.4},
        "overlay": {"show_panel": false},
        "screenshot_prefix": "captures/shot",
        "web": {"addr": "0.0.0.0:9000"}
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("LOOKOUT_CONFIG", file.path());
    std::env::set_var("LOOKOUT_CAMERA_INDEX", "1");
    std::env::set_var("LOOKOUT_CONFIDENCE", "0.8");
    std::env::set_var("LOOKOUT_CAMERA_SYNTHETIC", "true");

    let cfg = AppConfig::load().expect("load config");

    // File values survive where no env override exists.
    assert_eq!(cfg.camera.width, 800);
    assert_eq!(cfg.camera.height, 600);
    assert_eq!(cfg.camera.target_fps, 15);
    assert_eq!(cfg.backend, "motion");
    assert!(!cfg.show_overlay);
    assert_eq!(cfg.screenshot_prefix, "captures/shot");
    assert_eq!(cfg.web_addr, "0.0.0.0:9000");

    // Env overrides win.
    assert_eq!(cfg.camera_index, 1);
    assert_eq!(cfg.confidence_threshold, 0.8);
    assert!(cfg.camera.synthetic);

    clear_env();
}

#[test]
fn rejects_out_of_range_confidence() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("LOOKOUT_CONFIDENCE", "1.5");
    assert!(AppConfig::load().is_err());

    std::env::set_var("LOOKOUT_CONFIDENCE", "0");
    assert!(AppConfig::load().is_err());

    clear_env();
}

#[test]
fn run_config_mirrors_loaded_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("LOOKOUT_CAMERA_INDEX", "3");
    std::env::set_var("LOOKOUT_CONFIDENCE", "0.25");

    let cfg = AppConfig::load().expect("load config");
    let run = cfg.run_config();
    assert_eq!(run.camera_index, 3);
    assert_eq!(run.confidence_threshold, 0.25);
    assert!(run.show_overlay);

    clear_env();
}
