//! Configuration management for the surplus controller
//!
//! This module handles loading, validation, and management of the controller
//! configuration from YAML files. Every tunable constant of the control loop
//! lives here so it can be adjusted without rebuilding.

use crate::error::{Result, SurplusError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

mod defaults;

/// Highest valid priority mode code
pub const MAX_MODE_CODE: u8 = 8;

/// Number of breakpoints of the automatic-mode charge curve (0, 10, ..., 100 %)
pub const CURVE_POINTS: usize = 11;

/// Upper bound for every settle, guard and activity window (one day)
pub const MAX_WINDOW_SECONDS: u64 = 86_400;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Name of the controlled wallbox, used as log context
    pub device_name: String,

    /// Periodic tick interval in milliseconds
    pub tick_interval_ms: u64,

    /// Optional path for the controller state snapshot (JSON)
    pub state_file: Option<String>,

    /// Control loop tunables
    pub controller: ControllerConfig,

    /// Physical mode button behaviour
    pub button: ButtonConfig,

    /// LED colour per priority mode code (`#RRGGBB`)
    pub led_colors: BTreeMap<u8, String>,

    /// Telemetry entity ids
    pub entities: EntitiesConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Control loop tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Smallest power the wallbox can charge with (6 A on one phase)
    pub min_charge_power_w: f64,

    /// Above this power the multi-phase mode is always requested
    pub single_phase_max_power_w: f64,

    /// While two phases are in use, stay multi-phase down to this power
    pub two_phase_hold_power_w: f64,

    /// Grid export the battery-first modes tolerate before snapping up
    pub grid_feed_allowance_w: f64,

    /// PV production required before snapping to the minimum charge power
    pub snap_pv_threshold_w: f64,

    /// Extra power requested in grid import mode
    pub grid_import_boost_w: f64,

    /// Weight of the previous commanded power when smoothing (new reading weighs 1)
    pub smoothing_previous_weight: f64,

    /// Changes at or below this delta are applied without smoothing
    pub smoothing_min_delta_w: f64,

    /// Phase-to-neutral voltage
    pub phase_voltage_v: f64,

    /// Phase-to-phase voltage
    pub line_voltage_v: f64,

    /// Factor applied to the line voltage for three-phase power
    pub three_phase_factor: f64,

    /// Settle window for phase count changes in seconds
    pub phase_settle_seconds: u64,

    /// Settle window for charge enable changes in seconds
    pub enable_settle_seconds: u64,

    /// Battery SoC at which the discharge boost latches on
    pub discharge_boost_soc_on: f64,

    /// Battery SoC at or below which the discharge boost latch releases
    pub discharge_boost_soc_off: f64,

    /// Grid power below which (export) the discharge boost applies
    pub discharge_boost_grid_w: f64,

    /// Minimum current the wallbox accepts
    pub min_amp: u8,

    /// Maximum current on a single phase
    pub max_amp_single_phase: u8,

    /// Maximum current in multi-phase mode
    pub max_amp_multi_phase: u8,

    /// Per-phase power above which a phase counts as used
    pub used_phase_threshold_w: f64,

    /// A priority selection younger than this forces an instant update
    pub mode_change_instant_seconds: u64,
}

/// Physical mode button behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ButtonConfig {
    /// How long the LED stays bright after the last press
    pub active_window_seconds: u64,

    /// Presses closer together than this are ignored
    pub repeat_guard_seconds: u64,

    /// LED brightness while the button is active
    pub brightness_active: u8,

    /// LED brightness once the active window elapsed
    pub brightness_default: u8,

    /// Mode codes reachable by cycling with the button
    pub accessible_modes: Vec<u8>,
}

/// Telemetry entity ids
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EntitiesConfig {
    /// Grid power (W, negative = export)
    pub grid_power: String,

    /// Battery power (W, positive = charging)
    pub battery_power: String,

    /// Battery state of charge (%)
    pub battery_soc: String,

    /// Current car charging power (W)
    pub car_charge_power: String,

    /// Charger power per phase L1..L3 (W)
    pub phase_powers: Vec<String>,

    /// Charger energy counter (Wh)
    pub total_energy: String,

    /// Priority mode selector
    pub priority_mode: String,

    /// Maximum battery charge power (W)
    pub max_battery_charge_power: String,

    /// SoC floor for discharge mode (%)
    pub battery_soc_min: String,

    /// Manual car charge power (W)
    pub manual_charge_power: String,

    /// Energy to deliver in fixed amount mode (Wh)
    pub target_power_amount: String,

    /// Automatic curve breakpoints at 0, 10, ..., 100 % SoC
    pub automatic_curve: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Path to log file
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Skip the file appender entirely
    pub console_only: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the first default location that exists
    pub fn load() -> Result<Self> {
        let default_paths = [
            "goe_surplus.yaml",
            "/data/goe_surplus.yaml",
            "/etc/goe-surplus/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        Ok(Config::default())
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// LED colour configured for a mode, if any
    pub fn led_color(&self, mode: u8) -> Option<&str> {
        self.led_colors.get(&mode).map(String::as_str)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            return Err(SurplusError::validation(
                "tick_interval_ms",
                "Must be greater than 0",
            ));
        }

        self.controller.validate()?;
        self.button.validate()?;

        for (mode, color) in &self.led_colors {
            if *mode > MAX_MODE_CODE {
                return Err(SurplusError::validation(
                    "led_colors".to_string(),
                    format!("Unknown mode code {}", mode),
                ));
            }
            if !is_hex_color(color) {
                return Err(SurplusError::validation(
                    format!("led_colors.{}", mode),
                    format!("'{}' is not a #RRGGBB colour", color),
                ));
            }
        }

        if self.entities.phase_powers.len() != 3 {
            return Err(SurplusError::validation(
                "entities.phase_powers",
                "Exactly three phase entities are required",
            ));
        }
        if self.entities.automatic_curve.len() != CURVE_POINTS {
            return Err(SurplusError::validation(
                "entities.automatic_curve".to_string(),
                format!("Exactly {} curve entities are required", CURVE_POINTS),
            ));
        }

        Ok(())
    }
}

impl ControllerConfig {
    fn validate(&self) -> Result<()> {
        if self.phase_voltage_v <= 0.0 || self.line_voltage_v <= 0.0 {
            return Err(SurplusError::validation(
                "controller.phase_voltage_v",
                "Voltages must be positive",
            ));
        }
        if self.three_phase_factor <= 0.0 {
            return Err(SurplusError::validation(
                "controller.three_phase_factor",
                "Must be positive",
            ));
        }
        if self.smoothing_previous_weight <= 0.0 {
            return Err(SurplusError::validation(
                "controller.smoothing_previous_weight",
                "Must be positive",
            ));
        }
        if self.min_amp == 0
            || self.min_amp >= self.max_amp_single_phase
            || self.max_amp_single_phase > self.max_amp_multi_phase
        {
            return Err(SurplusError::validation(
                "controller.min_amp",
                "Expected 0 < min_amp < max_amp_single_phase <= max_amp_multi_phase",
            ));
        }
        if self.discharge_boost_soc_off >= self.discharge_boost_soc_on {
            return Err(SurplusError::validation(
                "controller.discharge_boost_soc_off",
                "Must be below discharge_boost_soc_on",
            ));
        }
        check_window("controller.phase_settle_seconds", self.phase_settle_seconds)?;
        check_window("controller.enable_settle_seconds", self.enable_settle_seconds)?;
        check_window(
            "controller.mode_change_instant_seconds",
            self.mode_change_instant_seconds,
        )?;
        Ok(())
    }
}

impl ButtonConfig {
    fn validate(&self) -> Result<()> {
        if let Some(bad) = self.accessible_modes.iter().find(|m| **m > MAX_MODE_CODE) {
            return Err(SurplusError::validation(
                "button.accessible_modes".to_string(),
                format!("Unknown mode code {}", bad),
            ));
        }
        check_window("button.active_window_seconds", self.active_window_seconds)?;
        check_window("button.repeat_guard_seconds", self.repeat_guard_seconds)?;
        Ok(())
    }
}

fn check_window(field: &str, secs: u64) -> Result<()> {
    if secs > MAX_WINDOW_SECONDS {
        return Err(SurplusError::validation(
            field.to_string(),
            format!("{} s exceeds the {} s limit", secs, MAX_WINDOW_SECONDS),
        ));
    }
    Ok(())
}

pub(crate) fn is_hex_color(s: &str) -> bool {
    s.len() == 7 && s.starts_with('#') && s[1..].chars().all(|c| c.is_ascii_hexdigit())
}
