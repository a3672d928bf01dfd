//! Smoothing and clamp stage
//!
//! Large jumps of the target power are blended towards the previously
//! commanded power so noisy telemetry does not make the charger flicker.

use crate::config::ControllerConfig;

/// Blend `raw` against `previous` and clamp the result to be non-negative.
///
/// Smoothing only applies outside instant updates, while something is being
/// commanded, for targets the charger can actually run at, and for changes
/// larger than the configured delta. The new reading weighs 1 against the
/// previous value's configured weight.
pub fn smooth_target_power(
    raw: f64,
    previous: f64,
    instant_update: bool,
    config: &ControllerConfig,
) -> f64 {
    let smoothed = if !instant_update
        && previous != 0.0
        && raw >= config.min_charge_power_w
        && (raw - previous).abs() > config.smoothing_min_delta_w
    {
        let weight = config.smoothing_previous_weight;
        ((raw + weight * previous) / (1.0 + weight)).round()
    } else {
        raw
    };
    smoothed.max(0.0)
}
