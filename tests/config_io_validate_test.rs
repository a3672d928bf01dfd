use goe_surplus::config::Config;
use std::fs;

#[test]
fn save_and_load_yaml_roundtrip() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let path = tmp_dir.path().join("config.yaml");

    let mut cfg = Config::default();
    cfg.device_name = "garage".to_string();
    cfg.controller.phase_settle_seconds = 45;
    cfg.entities.grid_power = "sensor.grid".to_string();
    cfg.logging.file = path.with_extension("log").to_string_lossy().to_string();

    cfg.save_to_file(&path).unwrap();
    let loaded = Config::from_file(&path).unwrap();

    assert_eq!(loaded.device_name, "garage");
    assert_eq!(loaded.controller.phase_settle_seconds, 45);
    assert_eq!(loaded.entities.grid_power, "sensor.grid");
    assert_eq!(loaded.logging.file, cfg.logging.file);
    assert_eq!(loaded.led_colors, cfg.led_colors);
    assert!(loaded.validate().is_ok());
}

#[test]
fn config_validation_errors() {
    let mut cfg = Config::default();

    // Tick interval zero
    cfg.tick_interval_ms = 0;
    assert!(cfg.validate().is_err());

    // Non-positive voltage
    cfg = Config::default();
    cfg.controller.phase_voltage_v = 0.0;
    assert!(cfg.validate().is_err());

    // Hysteresis thresholds reversed
    cfg = Config::default();
    cfg.controller.discharge_boost_soc_off = 98.0;
    assert!(cfg.validate().is_err());

    // Smoothing weight must be positive
    cfg = Config::default();
    cfg.controller.smoothing_previous_weight = 0.0;
    assert!(cfg.validate().is_err());

    // Colour for an unknown mode
    cfg = Config::default();
    cfg.led_colors.insert(12, "#123456".to_string());
    assert!(cfg.validate().is_err());

    // Wrong number of phase entities
    cfg = Config::default();
    cfg.entities.phase_powers.truncate(2);
    assert!(cfg.validate().is_err());
}

#[test]
fn from_file_with_invalid_yaml_fails() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    fs::write(tmp.path(), b"bad: [unclosed").unwrap();
    let err = Config::from_file(tmp.path()).unwrap_err();
    let msg = format!("{}", err);
    assert!(msg.contains("Serialization error"));
}

#[test]
fn from_missing_file_is_io_error() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let err = Config::from_file(tmp_dir.path().join("absent.yaml")).unwrap_err();
    assert!(format!("{}", err).contains("I/O error"));
}
