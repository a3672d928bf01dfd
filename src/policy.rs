//! Priority mode policy table
//!
//! Each mode maps the cycle's telemetry to a raw target charge power. The
//! result may be negative or exceed hardware limits; smoothing and the
//! phase/current resolver clamp it afterwards.

use crate::config::{CURVE_POINTS, ControllerConfig};
use crate::mode::PriorityMode;
use crate::state::ControllerState;
use crate::telemetry::Telemetry;

/// Raw target charge power for `mode`.
///
/// `instant_update` is set by modes whose result must bypass debouncing and
/// smoothing. `entered` marks the first cycle of the mode and resets the
/// fixed amount accumulator kept in `state`.
pub fn raw_target_power(
    mode: &PriorityMode,
    telemetry: &Telemetry,
    config: &ControllerConfig,
    state: &mut ControllerState,
    entered: bool,
    instant_update: &mut bool,
) -> f64 {
    let available = telemetry.available_power();

    match mode {
        PriorityMode::Off => {
            *instant_update = true;
            0.0
        }
        PriorityMode::PrioBattery {
            max_battery_charge_power,
        } => {
            let target = available - max_battery_charge_power;
            let pv = telemetry.battery_side_surplus();
            if in_snap_band(target, config)
                && pv > config.snap_pv_threshold_w
                && pv > *max_battery_charge_power
            {
                config.min_charge_power_w
            } else {
                target
            }
        }
        PriorityMode::PrioWallbox => available,
        PriorityMode::Split => {
            let target = available / 2.0;
            if in_snap_band(target, config)
                && telemetry.battery_side_surplus() > config.snap_pv_threshold_w
            {
                config.min_charge_power_w
            } else {
                target
            }
        }
        PriorityMode::DischargeToSoc {
            battery_soc_min,
            manual_charge_power,
        } => {
            if telemetry.battery_soc <= *battery_soc_min {
                *instant_update = true;
                0.0
            } else {
                manual_charge_power.max(available)
            }
        }
        PriorityMode::GridImport => {
            *instant_update = true;
            available + config.grid_import_boost_w
        }
        PriorityMode::Manual {
            manual_charge_power,
        } => {
            *instant_update = true;
            *manual_charge_power
        }
        PriorityMode::Automatic { curve } => {
            available * curve_fraction(curve, telemetry.battery_soc)
        }
        PriorityMode::FixedAmount {
            target_power_amount,
            manual_charge_power,
            max_battery_charge_power,
        } => {
            if entered {
                state.power_amount_start = telemetry.total_energy_delivered;
            }
            state.amount_fulfilled =
                (telemetry.total_energy_delivered - state.power_amount_start)
                    .abs()
                    .round();
            if state.amount_fulfilled >= *target_power_amount {
                *instant_update = true;
                0.0
            } else {
                manual_charge_power.max(available - max_battery_charge_power)
            }
        }
    }
}

/// Targets strictly between the tolerated grid feed and the minimum charge
/// power would otherwise export to the grid.
fn in_snap_band(target: f64, config: &ControllerConfig) -> bool {
    config.grid_feed_allowance_w < target && target < config.min_charge_power_w
}

/// Charge share (0..=1) at `soc`, linearly interpolated between the two
/// bracketing curve breakpoints. Curve values are percentages.
pub fn curve_fraction(curve: &[f64; CURVE_POINTS], soc: f64) -> f64 {
    let step = 100.0 / (CURVE_POINTS - 1) as f64;
    let soc = soc.clamp(0.0, 100.0);
    let lower = ((soc / step).floor() as usize).min(CURVE_POINTS - 2);
    let upper = lower + 1;
    let weight = (soc - lower as f64 * step) / step;
    let percent = curve[lower] + (curve[upper] - curve[lower]) * weight;
    percent / 100.0
}
