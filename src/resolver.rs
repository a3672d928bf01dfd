//! Phase and current resolver
//!
//! Turns the smoothed target power into the wallbox's phase mode, charge
//! current and enable flag. Phase mode and enable flag go through the
//! debouncer so a brief dip or spike does not toggle the contactor.

use crate::config::ControllerConfig;
use crate::mode::ChargePriority;
use crate::state::ControllerState;
use crate::telemetry::Telemetry;
use chrono::{DateTime, Utc};

/// Debounce key of the phase mode output
pub const PHASE_MODE_KEY: &str = "psm";

/// Debounce key of the charge enable output
pub const CHARGE_ENABLE_KEY: &str = "frc";

/// Single-phase mode value
pub const SINGLE_PHASE: u8 = 1;

/// Multi-phase mode value
pub const MULTI_PHASE: u8 = 2;

/// Outputs of one resolver pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    /// Target power, recomputed when the discharge boost applied (W).
    ///
    /// The boosted value is taken from the raised current before clamping, so
    /// at the amp limit it can exceed what `amp_value` actually delivers.
    pub target_charge_power: f64,
    /// Committed phase mode
    pub phase_count: u8,
    /// Clamped charge current (A)
    pub amp_value: u8,
    /// Committed charge enable flag
    pub charge_enable: bool,
    /// Seconds until a held phase change commits
    pub phase_settle_remaining: u64,
    /// Seconds until a held enable change commits
    pub enable_settle_remaining: u64,
    /// Whether the battery discharge boost raised the current
    pub discharge_boost: bool,
}

/// Phase mode the target power calls for.
///
/// While two phases are already in use the multi-phase mode is held down to
/// a lower power to avoid switching back and forth.
pub fn desired_phase_count(target: f64, used_phases: u8, config: &ControllerConfig) -> u8 {
    if target <= config.single_phase_max_power_w {
        if used_phases == 2 && target >= config.two_phase_hold_power_w {
            MULTI_PHASE
        } else {
            SINGLE_PHASE
        }
    } else {
        MULTI_PHASE
    }
}

/// Watts per amp for a phase mode
pub fn watts_per_amp(phase_count: u8, used_phases: u8, config: &ControllerConfig) -> f64 {
    if phase_count <= SINGLE_PHASE {
        config.phase_voltage_v
    } else if used_phases == 3 {
        config.line_voltage_v * config.three_phase_factor
    } else {
        config.phase_voltage_v * 2.0
    }
}

/// Whole amps deliverable within `power`
pub fn amps_for_power(power: f64, phase_count: u8, used_phases: u8, config: &ControllerConfig) -> i64 {
    (power / watts_per_amp(phase_count, used_phases, config)).floor() as i64
}

/// Clamp a current to what the wallbox accepts in `phase_count` mode
pub fn clamp_amps(amp: i64, phase_count: u8, config: &ControllerConfig) -> u8 {
    let max = if phase_count <= SINGLE_PHASE {
        config.max_amp_single_phase
    } else {
        config.max_amp_multi_phase
    };
    amp.clamp(i64::from(config.min_amp), i64::from(max)) as u8
}

/// Resolve phase mode, current and enable flag for `target`.
///
/// Updates the sticky discharge-boost flag and the debounce deadlines held
/// in `state`; the commanded values in `state` are left to the caller. A
/// boosted target is not reduced when the current is clamped.
pub fn resolve(
    target: f64,
    telemetry: &Telemetry,
    priority: ChargePriority,
    state: &mut ControllerState,
    config: &ControllerConfig,
    instant_update: bool,
    now: DateTime<Utc>,
) -> Resolution {
    let mut target = target.max(0.0);
    let used_phases = telemetry.used_phases;

    let desired = desired_phase_count(target, used_phases, config);
    let phase = state.debounce.evaluate(
        PHASE_MODE_KEY,
        state.phase_count,
        desired,
        config.phase_settle_seconds,
        instant_update,
        now,
    );
    let phase_count = phase.value;

    let mut amp = amps_for_power(target, phase_count, used_phases, config);

    let soc = telemetry.battery_soc;
    if soc >= config.discharge_boost_soc_on {
        state.battery_has_reached_discharge_boost = true;
    } else if soc <= config.discharge_boost_soc_off {
        state.battery_has_reached_discharge_boost = false;
    }

    let discharge_boost = priority.allows_discharge_boost()
        && state.battery_has_reached_discharge_boost
        && telemetry.grid_power < config.discharge_boost_grid_w;
    if discharge_boost {
        amp = if amp < i64::from(config.min_amp) {
            i64::from(config.min_amp)
        } else {
            amp + 1
        };
        target = amp as f64 * watts_per_amp(phase_count, used_phases, config);
    }

    let amp_value = clamp_amps(amp, phase_count, config);

    let enable = state.debounce.evaluate(
        CHARGE_ENABLE_KEY,
        state.charge_enable,
        target >= config.min_charge_power_w,
        config.enable_settle_seconds,
        instant_update,
        now,
    );

    Resolution {
        target_charge_power: target,
        phase_count,
        amp_value,
        charge_enable: enable.value,
        phase_settle_remaining: phase.remaining_secs,
        enable_settle_remaining: enable.remaining_secs,
        discharge_boost,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn telemetry(target_grid: f64, soc: f64, used_phases: u8) -> Telemetry {
        Telemetry {
            grid_power: target_grid,
            battery_power: 0.0,
            battery_soc: soc,
            car_charge_power: 0.0,
            used_phases,
            total_energy_delivered: 0.0,
            priority: String::new(),
            priority_changed_at: None,
        }
    }

    #[test]
    fn phase_decision_thresholds() {
        let cfg = ControllerConfig::default();
        assert_eq!(desired_phase_count(2500.0, 1, &cfg), SINGLE_PHASE);
        assert_eq!(desired_phase_count(3700.0, 1, &cfg), SINGLE_PHASE);
        assert_eq!(desired_phase_count(3700.0, 2, &cfg), MULTI_PHASE);
        assert_eq!(desired_phase_count(3600.0, 2, &cfg), SINGLE_PHASE);
        assert_eq!(desired_phase_count(4140.0, 3, &cfg), SINGLE_PHASE);
        assert_eq!(desired_phase_count(4141.0, 0, &cfg), MULTI_PHASE);
    }

    #[test]
    fn amps_per_phase_formula() {
        let cfg = ControllerConfig::default();
        assert_eq!(amps_for_power(2500.0, SINGLE_PHASE, 1, &cfg), 10);
        assert_eq!(amps_for_power(6000.0, MULTI_PHASE, 2, &cfg), 13);
        // 11000 / (400 * 1.73) = 15.9
        assert_eq!(amps_for_power(11000.0, MULTI_PHASE, 3, &cfg), 15);
    }

    #[test]
    fn clamp_respects_phase_limits() {
        let cfg = ControllerConfig::default();
        assert_eq!(clamp_amps(2, SINGLE_PHASE, &cfg), 6);
        assert_eq!(clamp_amps(25, SINGLE_PHASE, &cfg), 18);
        assert_eq!(clamp_amps(25, MULTI_PHASE, &cfg), 25);
        assert_eq!(clamp_amps(117, MULTI_PHASE, &cfg), 32);
        assert_eq!(clamp_amps(-3, MULTI_PHASE, &cfg), 6);
    }

    #[test]
    fn resolves_single_phase_scenario() {
        let cfg = ControllerConfig::default();
        let mut state = ControllerState::default();
        let r = resolve(
            2500.0,
            &telemetry(-500.0, 50.0, 0),
            ChargePriority::PrioWallbox,
            &mut state,
            &cfg,
            true,
            Utc::now(),
        );
        assert_eq!(r.phase_count, SINGLE_PHASE);
        assert_eq!(r.amp_value, 10);
        assert!(r.charge_enable);
        assert!(!r.discharge_boost);
    }

    #[test]
    fn phase_switch_waits_for_settle_window() {
        let cfg = ControllerConfig::default();
        let mut state = ControllerState::default();
        state.charge_enable = true;
        let t = telemetry(-500.0, 50.0, 1);
        let now = Utc::now();

        let r = resolve(9000.0, &t, ChargePriority::PrioWallbox, &mut state, &cfg, false, now);
        assert_eq!(r.phase_count, SINGLE_PHASE);
        assert_eq!(r.phase_settle_remaining, 30);
        // held on one phase, so the current is capped at the single-phase limit
        assert_eq!(r.amp_value, 18);

        let later = now + Duration::seconds(30);
        let r = resolve(9000.0, &t, ChargePriority::PrioWallbox, &mut state, &cfg, false, later);
        assert_eq!(r.phase_count, MULTI_PHASE);
        assert_eq!(r.amp_value, 19);
    }

    #[test]
    fn discharge_boost_adds_an_amp_and_latches() {
        let cfg = ControllerConfig::default();
        let mut state = ControllerState::default();
        let now = Utc::now();

        let r = resolve(
            2500.0,
            &telemetry(-800.0, 97.0, 1),
            ChargePriority::PrioWallbox,
            &mut state,
            &cfg,
            true,
            now,
        );
        assert!(r.discharge_boost);
        assert_eq!(r.amp_value, 11);
        assert_eq!(r.target_charge_power, 11.0 * 230.0);
        assert!(state.battery_has_reached_discharge_boost);

        // 96 % keeps the latch
        let r = resolve(
            500.0,
            &telemetry(-800.0, 96.0, 1),
            ChargePriority::PrioWallbox,
            &mut state,
            &cfg,
            true,
            now,
        );
        assert!(r.discharge_boost);
        assert_eq!(r.amp_value, 6);
        assert_eq!(r.target_charge_power, 1380.0);
        assert!(r.charge_enable);

        // 95 % releases it
        let r = resolve(
            500.0,
            &telemetry(-800.0, 95.0, 1),
            ChargePriority::PrioWallbox,
            &mut state,
            &cfg,
            true,
            now,
        );
        assert!(!r.discharge_boost);
        assert!(!state.battery_has_reached_discharge_boost);
        assert!(!r.charge_enable);
    }

    #[test]
    fn boosted_target_is_not_reduced_by_the_amp_clamp() {
        let cfg = ControllerConfig::default();
        let mut state = ControllerState::default();
        let r = resolve(
            4140.0,
            &telemetry(-800.0, 98.0, 1),
            ChargePriority::PrioWallbox,
            &mut state,
            &cfg,
            true,
            Utc::now(),
        );
        assert!(r.discharge_boost);
        assert_eq!(r.phase_count, SINGLE_PHASE);
        assert_eq!(r.amp_value, 18);
        assert_eq!(r.target_charge_power, 19.0 * 230.0);
        assert!(r.target_charge_power > f64::from(r.amp_value) * 230.0);
    }

    #[test]
    fn discharge_boost_needs_export_and_eligible_mode() {
        let cfg = ControllerConfig::default();
        let mut state = ControllerState::default();
        let now = Utc::now();

        let r = resolve(
            2500.0,
            &telemetry(-200.0, 99.0, 1),
            ChargePriority::PrioWallbox,
            &mut state,
            &cfg,
            true,
            now,
        );
        assert!(!r.discharge_boost);

        let r = resolve(
            2500.0,
            &telemetry(-800.0, 99.0, 1),
            ChargePriority::PrioBattery,
            &mut state,
            &cfg,
            true,
            now,
        );
        assert!(!r.discharge_boost);
        assert_eq!(r.amp_value, 10);
    }

    #[test]
    fn amps_always_within_limits() {
        let cfg = ControllerConfig::default();
        let now = Utc::now();
        for used in 0..=3u8 {
            for step in 0..80 {
                let power = f64::from(step) * 500.0;
                let mut state = ControllerState::default();
                let r = resolve(
                    power,
                    &telemetry(-1000.0, 98.0, used),
                    ChargePriority::GridImport,
                    &mut state,
                    &cfg,
                    true,
                    now,
                );
                let max = if r.phase_count == SINGLE_PHASE { 18 } else { 32 };
                assert!((6..=max).contains(&r.amp_value), "power {power} used {used}");
            }
        }
    }
}
