use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::NamedTempFile;

use detect_annotate::config::{AnnotateConfig, ConfigOverrides, SourceDescriptor};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "ANNOTATE_CONFIG",
        "ANNOTATE_SOURCE",
        "ANNOTATE_CONF",
        "ANNOTATE_IOU",
        "ANNOTATE_MODEL",
        "ANNOTATE_OUTPUT",
        "ANNOTATE_HEADLESS",
    ] {
        std::env::remove_var(key);
    }
}

fn write_config(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");
    file
}

#[test]
fn defaults_apply_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = AnnotateConfig::load(ConfigOverrides::default()).expect("load defaults");
    assert_eq!(
        cfg.source(),
        &SourceDescriptor::File(PathBuf::from("data/input.mp4"))
    );
    assert_eq!(cfg.threshold().value(), 0.35);
    assert_eq!(cfg.iou(), 0.45);
    assert_eq!(cfg.model(), Path::new("yolov8n.onnx"));
    assert_eq!(cfg.backend(), None);
    assert_eq!(cfg.output(), None);
    assert_eq!(cfg.preview(), None);
    assert!(!cfg.headless());
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        r#"{
            "source": "data/street.mp4",
            "backend": "stub",
            "confidence": 0.6,
            "iou": 0.5,
            "save": true,
            "output": "runs/street.y4m"
        }"#,
    );

    std::env::set_var("ANNOTATE_CONFIG", file.path());
    std::env::set_var("ANNOTATE_SOURCE", "1");
    std::env::set_var("ANNOTATE_CONF", "0.25");

    let cfg = AnnotateConfig::load(ConfigOverrides::default()).expect("load config");
    clear_env();

    assert_eq!(cfg.source(), &SourceDescriptor::Device("/dev/video1".to_string()));
    assert_eq!(cfg.threshold().value(), 0.25);
    assert_eq!(cfg.iou(), 0.5);
    assert_eq!(cfg.backend(), Some("stub"));
    assert_eq!(cfg.output(), Some(Path::new("runs/street.y4m")));
}

#[test]
fn cli_overrides_win_over_env_and_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(r#"{ "source": "data/a.mp4", "confidence": 0.6 }"#);
    std::env::set_var("ANNOTATE_CONF", "0.7");

    let cfg = AnnotateConfig::load(ConfigOverrides {
        config_path: Some(file.path().to_path_buf()),
        source: Some("stub://cli?frames=3".to_string()),
        confidence: Some(0.9),
        ..ConfigOverrides::default()
    })
    .expect("load config");
    clear_env();

    assert_eq!(
        cfg.source(),
        &SourceDescriptor::Synthetic("stub://cli?frames=3".to_string())
    );
    assert_eq!(cfg.threshold().value(), 0.9);
}

#[test]
fn save_flag_uses_default_output_path() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = AnnotateConfig::load(ConfigOverrides {
        save: true,
        ..ConfigOverrides::default()
    })
    .expect("load config");
    let expected = if cfg!(feature = "encode-ffmpeg") {
        "outputs/annotated.mp4"
    } else {
        "outputs/annotated.y4m"
    };
    assert_eq!(cfg.output(), Some(Path::new(expected)));

    // An output path alone does not turn saving on.
    let cfg = AnnotateConfig::load(ConfigOverrides {
        output: Some(PathBuf::from("elsewhere.y4m")),
        ..ConfigOverrides::default()
    })
    .expect("load config");
    assert_eq!(cfg.output(), None);
}

#[test]
fn rejects_out_of_range_thresholds() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let err = AnnotateConfig::load(ConfigOverrides {
        confidence: Some(1.5),
        ..ConfigOverrides::default()
    })
    .expect_err("threshold above 1 must be rejected");
    assert!(err.to_string().contains("threshold"), "{err:#}");

    std::env::set_var("ANNOTATE_IOU", "-0.1");
    let result = AnnotateConfig::load(ConfigOverrides::default());
    clear_env();
    assert!(result.is_err());

    std::env::set_var("ANNOTATE_CONF", "lots");
    let result = AnnotateConfig::load(ConfigOverrides::default());
    clear_env();
    assert!(result.is_err());
}

#[test]
fn rejects_unreadable_or_malformed_config_files() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let missing = AnnotateConfig::load(ConfigOverrides {
        config_path: Some(PathBuf::from("/nonexistent/annotate.json")),
        ..ConfigOverrides::default()
    });
    assert!(missing.is_err());

    let file = write_config("{ not json");
    let malformed = AnnotateConfig::load(ConfigOverrides {
        config_path: Some(file.path().to_path_buf()),
        ..ConfigOverrides::default()
    });
    assert!(malformed.is_err());
}

#[test]
fn rejects_unsupported_source_schemes() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let result = AnnotateConfig::load(ConfigOverrides {
        source: Some("rtsp://camera-1/stream".to_string()),
        ..ConfigOverrides::default()
    });
    assert!(result.is_err());
}

#[test]
fn headless_comes_from_file_env_or_flag() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(r#"{ "headless": true }"#);
    let cfg = AnnotateConfig::load(ConfigOverrides {
        config_path: Some(file.path().to_path_buf()),
        ..ConfigOverrides::default()
    })
    .expect("load config");
    assert!(cfg.headless());

    std::env::set_var("ANNOTATE_HEADLESS", "1");
    let cfg = AnnotateConfig::load(ConfigOverrides::default()).expect("load config");
    assert!(cfg.headless());
    std::env::set_var("ANNOTATE_HEADLESS", "false");
    let cfg = AnnotateConfig::load(ConfigOverrides::default()).expect("load config");
    assert!(!cfg.headless());
    clear_env();

    let cfg = AnnotateConfig::load(ConfigOverrides {
        headless: true,
        ..ConfigOverrides::default()
    })
    .expect("load config");
    assert!(cfg.headless());
}
