//! Actuation commands and sink
//!
//! The controller never talks to the wallbox directly; it hands [`Command`]s
//! to an [`ActuationSink`]. Commands are idempotent and need no
//! acknowledgement.

use crate::config::{MAX_MODE_CODE, is_hex_color};
use crate::error::{Result, SurplusError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One output of the controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "value", rename_all = "snake_case")]
pub enum Command {
    /// Target charge power (W)
    TargetChargePower(f64),
    /// Charge current (A)
    AmpValue(u8),
    /// Charging allowed
    ChargeEnable(bool),
    /// Phase mode (1 = single, 2 = multi)
    PhaseCount(u8),
    /// LED brightness (0..=255)
    LedBrightness(u8),
    /// LED colour as `#RRGGBB`
    LedColor(String),
    /// Write back the priority selector
    PriorityMode(u8),
}

impl Command {
    /// Stable name of the output this command drives
    pub fn name(&self) -> &'static str {
        match self {
            Command::TargetChargePower(_) => "target_charge_power",
            Command::AmpValue(_) => "amp_value",
            Command::ChargeEnable(_) => "charge_enable",
            Command::PhaseCount(_) => "phase_count",
            Command::LedBrightness(_) => "led_brightness",
            Command::LedColor(_) => "led_color",
            Command::PriorityMode(_) => "priority_mode",
        }
    }

    /// Value rendered the way a state store keeps it
    pub fn value_string(&self) -> String {
        match self {
            Command::TargetChargePower(w) => format!("{w}"),
            Command::AmpValue(a) => a.to_string(),
            Command::ChargeEnable(on) => if *on { "on" } else { "off" }.to_string(),
            Command::PhaseCount(p) => p.to_string(),
            Command::LedBrightness(b) => b.to_string(),
            Command::LedColor(c) => c.clone(),
            Command::PriorityMode(m) => m.to_string(),
        }
    }

    /// Reject values the wallbox or the selector cannot take
    pub fn check(&self) -> Result<()> {
        let valid = match self {
            Command::TargetChargePower(w) => w.is_finite() && *w >= 0.0,
            Command::PhaseCount(p) => (1..=2).contains(p),
            Command::LedColor(c) => is_hex_color(c),
            Command::PriorityMode(m) => *m <= MAX_MODE_CODE,
            Command::AmpValue(_) | Command::ChargeEnable(_) | Command::LedBrightness(_) => true,
        };
        if valid {
            Ok(())
        } else {
            Err(SurplusError::actuation(format!("Rejected {}", self)))
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name(), self.value_string())
    }
}

/// Receiver of controller outputs
#[async_trait]
pub trait ActuationSink: Send + Sync {
    async fn set(&self, command: Command) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_name_and_value() {
        assert_eq!(Command::ChargeEnable(true).to_string(), "charge_enable=on");
        assert_eq!(Command::AmpValue(10).to_string(), "amp_value=10");
        assert_eq!(
            Command::TargetChargePower(2500.0).to_string(),
            "target_charge_power=2500"
        );
        assert_eq!(
            Command::LedColor("#00FF00".into()).to_string(),
            "led_color=#00FF00"
        );
    }

    #[test]
    fn check_rejects_out_of_range_values() {
        assert!(Command::PhaseCount(2).check().is_ok());
        assert!(Command::PhaseCount(3).check().is_err());
        assert!(Command::PriorityMode(9).check().is_err());
        assert!(Command::LedColor("red".into()).check().is_err());
        assert!(Command::TargetChargePower(f64::NAN).check().is_err());
        assert!(Command::TargetChargePower(-1.0).check().is_err());
        assert!(Command::LedColor("#FF0000".into()).check().is_ok());
    }

    #[test]
    fn serializes_tagged() {
        let json = serde_json::to_value(Command::PhaseCount(2)).unwrap();
        assert_eq!(json, serde_json::json!({"command": "phase_count", "value": 2}));
    }
}
