//! Controller state retained between cycles

use crate::debounce::Debouncer;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Everything the controller remembers from one cycle to the next
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerState {
    /// False until the first cycle completed; the first cycle is always instant
    pub initialized: bool,

    /// Last commanded charge power (W)
    pub target_charge_power: f64,

    /// Last commanded current (A)
    pub amp_value: u8,

    /// Last commanded charge enable flag
    pub charge_enable: bool,

    /// Last commanded phase mode (1 = single, 2 = multi)
    pub phase_count: u8,

    /// Priority mode code seen in the last completed cycle
    pub priority_mode: u8,

    /// Pending commits of debounced outputs
    pub debounce: Debouncer,

    /// Energy counter when fixed amount mode was entered (Wh)
    pub power_amount_start: f64,

    /// Energy delivered since fixed amount mode was entered (Wh)
    pub amount_fulfilled: f64,

    /// Sticky flag for the battery discharge boost
    pub battery_has_reached_discharge_boost: bool,

    /// LED is at full brightness after a button press
    pub led_brightness_active: bool,

    /// Last accepted button press
    pub last_button_press: Option<DateTime<Utc>>,
}

impl Default for ControllerState {
    fn default() -> Self {
        Self {
            initialized: false,
            target_charge_power: 0.0,
            amp_value: 6,
            charge_enable: false,
            phase_count: 1,
            priority_mode: 0,
            debounce: Debouncer::new(),
            power_amount_start: 0.0,
            amount_fulfilled: 0.0,
            battery_has_reached_discharge_boost: false,
            led_brightness_active: false,
            last_button_press: None,
        }
    }
}
