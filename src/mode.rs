//! Priority modes
//!
//! [`ChargePriority`] is the operator-selected code (0..=8).
//! [`PriorityMode`] is the same selection once the readings that mode needs
//! have been fetched: each variant carries exactly its own parameters.

use crate::config::{CURVE_POINTS, EntitiesConfig};
use crate::telemetry::{ReadingKind, Snapshot, TelemetryRequest};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operator-selected charge priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum ChargePriority {
    /// Charger off
    Off = 0,
    /// Battery first, car gets what the battery cannot take
    PrioBattery = 1,
    /// Car first
    PrioWallbox = 2,
    /// Split surplus between battery and car
    Split = 3,
    /// Discharge the home battery into the car down to a SoC floor
    DischargeToSoc = 4,
    /// Fast charge from the grid
    GridImport = 5,
    /// Fixed manual power
    Manual = 6,
    /// SoC-dependent share of the surplus
    Automatic = 7,
    /// Deliver a fixed amount of energy
    FixedAmount = 8,
}

impl ChargePriority {
    /// All priorities in ascending code order
    pub fn all() -> &'static [ChargePriority] {
        &[
            Self::Off,
            Self::PrioBattery,
            Self::PrioWallbox,
            Self::Split,
            Self::DischargeToSoc,
            Self::GridImport,
            Self::Manual,
            Self::Automatic,
            Self::FixedAmount,
        ]
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::all().get(usize::from(code)).copied()
    }

    /// Label shown by the priority selector
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Off => "AUS",
            Self::PrioBattery => "Prio Hausakku",
            Self::PrioWallbox => "Prio Wallbox",
            Self::Split => "50/50",
            Self::DischargeToSoc => "Hausakku entladen bis SOC",
            Self::GridImport => "Netzstrom",
            Self::Manual => "Manuel",
            Self::Automatic => "Automatik",
            Self::FixedAmount => "Manuelle Menge",
        }
    }

    /// Parse a selector state: either the numeric code or the label
    pub fn parse(state: &str) -> Option<Self> {
        let state = state.trim();
        if let Ok(code) = state.parse::<u8>() {
            return Self::from_code(code);
        }
        Self::all()
            .iter()
            .copied()
            .find(|p| p.display_name() == state)
    }

    /// Modes in which a full battery may push extra current into the car
    pub fn allows_discharge_boost(self) -> bool {
        matches!(
            self,
            Self::PrioWallbox
                | Self::Split
                | Self::DischargeToSoc
                | Self::Manual
                | Self::Automatic
                | Self::FixedAmount
        )
    }

    /// Readings fetched only while this mode is active
    pub fn conditional_requests(self, entities: &EntitiesConfig) -> Vec<TelemetryRequest> {
        let float = |name: &String| TelemetryRequest::new(name, ReadingKind::Float);
        match self {
            Self::Off | Self::PrioWallbox | Self::Split | Self::GridImport => Vec::new(),
            Self::PrioBattery => vec![float(&entities.max_battery_charge_power)],
            Self::DischargeToSoc => vec![
                float(&entities.battery_soc_min),
                float(&entities.manual_charge_power),
            ],
            Self::Manual => vec![float(&entities.manual_charge_power)],
            Self::Automatic => entities.automatic_curve.iter().map(float).collect(),
            Self::FixedAmount => vec![
                float(&entities.target_power_amount),
                float(&entities.manual_charge_power),
                float(&entities.max_battery_charge_power),
            ],
        }
    }
}

impl fmt::Display for ChargePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code(), self.display_name())
    }
}

/// An active priority together with its parameters
#[derive(Debug, Clone, PartialEq)]
pub enum PriorityMode {
    Off,
    PrioBattery {
        max_battery_charge_power: f64,
    },
    PrioWallbox,
    Split,
    DischargeToSoc {
        battery_soc_min: f64,
        manual_charge_power: f64,
    },
    GridImport,
    Manual {
        manual_charge_power: f64,
    },
    Automatic {
        /// Charge share in percent at 0, 10, ..., 100 % SoC
        curve: [f64; CURVE_POINTS],
    },
    FixedAmount {
        target_power_amount: f64,
        manual_charge_power: f64,
        max_battery_charge_power: f64,
    },
}

impl PriorityMode {
    /// Build the mode from a snapshot read with
    /// [`ChargePriority::conditional_requests`]
    pub fn from_snapshot(
        priority: ChargePriority,
        snapshot: &Snapshot,
        entities: &EntitiesConfig,
    ) -> Option<Self> {
        let mode = match priority {
            ChargePriority::Off => Self::Off,
            ChargePriority::PrioBattery => Self::PrioBattery {
                max_battery_charge_power: snapshot.float(&entities.max_battery_charge_power)?,
            },
            ChargePriority::PrioWallbox => Self::PrioWallbox,
            ChargePriority::Split => Self::Split,
            ChargePriority::DischargeToSoc => Self::DischargeToSoc {
                battery_soc_min: snapshot.float(&entities.battery_soc_min)?,
                manual_charge_power: snapshot.float(&entities.manual_charge_power)?,
            },
            ChargePriority::GridImport => Self::GridImport,
            ChargePriority::Manual => Self::Manual {
                manual_charge_power: snapshot.float(&entities.manual_charge_power)?,
            },
            ChargePriority::Automatic => {
                let mut curve = [0.0; CURVE_POINTS];
                if entities.automatic_curve.len() != CURVE_POINTS {
                    return None;
                }
                for (slot, name) in curve.iter_mut().zip(&entities.automatic_curve) {
                    *slot = snapshot.float(name)?;
                }
                Self::Automatic { curve }
            }
            ChargePriority::FixedAmount => Self::FixedAmount {
                target_power_amount: snapshot.float(&entities.target_power_amount)?,
                manual_charge_power: snapshot.float(&entities.manual_charge_power)?,
                max_battery_charge_power: snapshot.float(&entities.max_battery_charge_power)?,
            },
        };
        Some(mode)
    }

    pub fn priority(&self) -> ChargePriority {
        match self {
            Self::Off => ChargePriority::Off,
            Self::PrioBattery { .. } => ChargePriority::PrioBattery,
            Self::PrioWallbox => ChargePriority::PrioWallbox,
            Self::Split => ChargePriority::Split,
            Self::DischargeToSoc { .. } => ChargePriority::DischargeToSoc,
            Self::GridImport => ChargePriority::GridImport,
            Self::Manual { .. } => ChargePriority::Manual,
            Self::Automatic { .. } => ChargePriority::Automatic,
            Self::FixedAmount { .. } => ChargePriority::FixedAmount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_codes_and_labels() {
        assert_eq!(ChargePriority::parse("3"), Some(ChargePriority::Split));
        assert_eq!(
            ChargePriority::parse("Prio Wallbox"),
            Some(ChargePriority::PrioWallbox)
        );
        assert_eq!(ChargePriority::parse("9"), None);
        assert_eq!(ChargePriority::parse("turbo"), None);
    }

    #[test]
    fn codes_roundtrip_in_order() {
        for (i, p) in ChargePriority::all().iter().enumerate() {
            assert_eq!(usize::from(p.code()), i);
            assert_eq!(ChargePriority::from_code(p.code()), Some(*p));
        }
    }

    #[test]
    fn discharge_boost_modes() {
        let boosted: Vec<u8> = ChargePriority::all()
            .iter()
            .filter(|p| p.allows_discharge_boost())
            .map(|p| p.code())
            .collect();
        assert_eq!(boosted, vec![2, 3, 4, 6, 7, 8]);
    }

    #[test]
    fn conditional_requests_per_mode() {
        let entities = EntitiesConfig::default();
        assert!(ChargePriority::PrioWallbox
            .conditional_requests(&entities)
            .is_empty());
        assert_eq!(
            ChargePriority::Automatic
                .conditional_requests(&entities)
                .len(),
            CURVE_POINTS
        );
        assert_eq!(
            ChargePriority::FixedAmount
                .conditional_requests(&entities)
                .len(),
            3
        );
    }

    #[test]
    fn from_snapshot_keeps_the_priority() {
        let entities = EntitiesConfig::default();
        let empty = Snapshot::default();
        for p in ChargePriority::all() {
            let mode = PriorityMode::from_snapshot(*p, &empty, &entities);
            if p.conditional_requests(&entities).is_empty() {
                assert_eq!(mode.map(|m| m.priority()), Some(*p));
            } else {
                assert_eq!(mode, None);
            }
        }
    }
}
