// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use std::path::PathBuf;
use surface_camera::errors::ConfigError;
use surface_camera::{CameraId, Config};

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("surface-camera-{}-{name}", uuid::Uuid::new_v4()))
}

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(config.start_camera, CameraId::Front);
    assert_eq!(config.video_sink, "autovideosink");
    assert_eq!(config.media_device, "/dev/media0");
    assert!(config.reset_media_links, "Media links should be reset by default");
    assert!(
        !config.wait_for_power_ready,
        "Power polling should be opt-in"
    );
    assert!(config.photos_dir.ends_with("SurfaceCamera"));
}

#[test]
fn test_partial_json_keeps_defaults() {
    let config = Config::from_json(r#"{ "start_camera": "rear", "video_sink": "waylandsink" }"#)
        .expect("partial config should parse");

    assert_eq!(config.start_camera, CameraId::Rear);
    assert_eq!(config.video_sink, "waylandsink");
    assert_eq!(config.media_device, Config::default().media_device);
}

#[test]
fn test_unknown_camera_is_rejected() {
    assert!(Config::from_json(r#"{ "start_camera": "side" }"#).is_err());
}

#[test]
fn test_missing_file_yields_defaults() {
    let path = temp_path("missing.json");
    let config = Config::load(Some(&path)).expect("missing file is not an error");
    assert_eq!(config, Config::default());
}

#[test]
fn test_load_from_file() {
    let path = temp_path("config.json");
    std::fs::write(&path, r#"{ "reset_media_links": false, "media_device": "/dev/media1" }"#)
        .unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert!(!config.reset_media_links);
    assert_eq!(config.media_device, "/dev/media1");

    std::fs::remove_file(path).ok();
}

#[test]
fn test_malformed_file_is_parse_error() {
    let path = temp_path("broken.json");
    std::fs::write(&path, "{ not json").unwrap();

    let err = Config::load(Some(&path)).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got {err}");

    std::fs::remove_file(path).ok();
}
