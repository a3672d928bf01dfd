//! Telemetry snapshot reader
//!
//! Pulls a named set of readings from the external state store. A reading
//! that cannot be fetched or parsed is reported as unavailable instead of
//! failing the read; the caller decides whether the cycle can go on.

use crate::config::{ControllerConfig, EntitiesConfig};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Raw state of one entity as the provider reports it
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryValue {
    /// State string, e.g. `"1234.5"` or `"Prio Wallbox"`
    pub state: String,
    /// When the state last changed
    pub last_changed: DateTime<Utc>,
}

/// Source of current readings
#[async_trait]
pub trait TelemetryProvider: Send + Sync {
    /// Current state of `name`, or `None` when unknown to the provider
    async fn get(&self, name: &str) -> Option<TelemetryValue>;
}

/// Expected type of a reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingKind {
    Float,
    Text,
}

/// A parsed reading
#[derive(Debug, Clone, PartialEq)]
pub enum Reading {
    Float(f64),
    Text(String),
}

impl Reading {
    /// Parse a provider state string as `kind`
    pub fn parse(state: &str, kind: ReadingKind) -> Option<Self> {
        let state = state.trim();
        if state.is_empty()
            || state.eq_ignore_ascii_case("unavailable")
            || state.eq_ignore_ascii_case("unknown")
            || state.eq_ignore_ascii_case("none")
        {
            return None;
        }
        match kind {
            ReadingKind::Float => state
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(Reading::Float),
            ReadingKind::Text => Some(Reading::Text(state.to_string())),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Reading::Float(v) => Some(*v),
            Reading::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Reading::Text(s) => Some(s),
            Reading::Float(_) => None,
        }
    }
}

/// One reading to fetch
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRequest {
    pub name: String,
    pub kind: ReadingKind,
    /// Used instead of reporting the reading unavailable
    pub default: Option<Reading>,
}

impl TelemetryRequest {
    pub fn new(name: &str, kind: ReadingKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            default: None,
        }
    }

    pub fn with_default(mut self, default: Reading) -> Self {
        self.default = Some(default);
        self
    }
}

/// Readings gathered for one cycle
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    values: HashMap<String, Reading>,
    last_changed: HashMap<String, DateTime<Utc>>,
}

impl Snapshot {
    pub fn get(&self, name: &str) -> Option<&Reading> {
        self.values.get(name)
    }

    pub fn float(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Reading::as_f64)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Reading::as_str)
    }

    pub fn last_changed(&self, name: &str) -> Option<DateTime<Utc>> {
        self.last_changed.get(name).copied()
    }
}

/// Fetch every request from `provider`.
///
/// Returns the snapshot together with the names that were unavailable and
/// had no default.
pub async fn read_snapshot<P>(provider: &P, requests: &[TelemetryRequest]) -> (Snapshot, Vec<String>)
where
    P: TelemetryProvider + ?Sized,
{
    let mut snapshot = Snapshot::default();
    let mut unavailable = Vec::new();

    for request in requests {
        let fetched = provider.get(&request.name).await;
        if let Some(value) = &fetched {
            snapshot
                .last_changed
                .insert(request.name.clone(), value.last_changed);
        }
        let parsed = fetched.and_then(|v| Reading::parse(&v.state, request.kind));
        match parsed.or_else(|| request.default.clone()) {
            Some(reading) => {
                snapshot.values.insert(request.name.clone(), reading);
            }
            None => unavailable.push(request.name.clone()),
        }
    }

    (snapshot, unavailable)
}

/// Readings every cycle needs
#[derive(Debug, Clone, PartialEq)]
pub struct Telemetry {
    /// W, negative while exporting
    pub grid_power: f64,
    /// W, positive while charging
    pub battery_power: f64,
    /// %
    pub battery_soc: f64,
    /// W
    pub car_charge_power: f64,
    /// Phases carrying more than the used-phase threshold (0..=3)
    pub used_phases: u8,
    /// Wh, monotonic
    pub total_energy_delivered: f64,
    /// Raw priority selector state
    pub priority: String,
    /// When the priority selector last changed
    pub priority_changed_at: Option<DateTime<Utc>>,
}

impl Telemetry {
    /// Requests for the mandatory readings
    pub fn requests(entities: &EntitiesConfig) -> Vec<TelemetryRequest> {
        let mut requests = vec![
            TelemetryRequest::new(&entities.priority_mode, ReadingKind::Text),
            TelemetryRequest::new(&entities.grid_power, ReadingKind::Float),
            TelemetryRequest::new(&entities.battery_power, ReadingKind::Float),
            TelemetryRequest::new(&entities.battery_soc, ReadingKind::Float),
            TelemetryRequest::new(&entities.car_charge_power, ReadingKind::Float),
            TelemetryRequest::new(&entities.total_energy, ReadingKind::Float),
        ];
        // An idle phase sensor is as good as 0 W
        requests.extend(entities.phase_powers.iter().map(|name| {
            TelemetryRequest::new(name, ReadingKind::Float).with_default(Reading::Float(0.0))
        }));
        requests
    }

    /// Build from a snapshot that was read with [`Telemetry::requests`]
    pub fn from_snapshot(
        snapshot: &Snapshot,
        entities: &EntitiesConfig,
        controller: &ControllerConfig,
    ) -> Option<Self> {
        let used_phases = entities
            .phase_powers
            .iter()
            .filter(|name| {
                snapshot
                    .float(name)
                    .is_some_and(|w| w > controller.used_phase_threshold_w)
            })
            .count() as u8;

        Some(Self {
            grid_power: snapshot.float(&entities.grid_power)?,
            battery_power: snapshot.float(&entities.battery_power)?,
            battery_soc: snapshot.float(&entities.battery_soc)?,
            car_charge_power: snapshot.float(&entities.car_charge_power)?,
            used_phases,
            total_energy_delivered: snapshot.float(&entities.total_energy)?,
            priority: snapshot.text(&entities.priority_mode)?.to_string(),
            priority_changed_at: snapshot.last_changed(&entities.priority_mode),
        })
    }

    /// Power left over after the battery and the car: `battery - grid + car`
    pub fn available_power(&self) -> f64 {
        self.battery_power - self.grid_power + self.car_charge_power
    }

    /// Power produced beyond what the grid takes: `battery - grid`
    pub fn battery_side_surplus(&self) -> f64 {
        self.battery_power - self.grid_power
    }
}
