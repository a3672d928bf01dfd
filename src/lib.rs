//! # goe-surplus - PV surplus charging controller for go-eCharger wallboxes
//!
//! Decides, every few seconds, how much of the house's solar surplus goes
//! into the car: charge power, phase mode, charge current and whether
//! charging is allowed at all, according to the operator-selected priority.
//!
//! ## Features
//!
//! - **Nine priority modes**: from battery-first to fixed-amount charging
//! - **Debounced outputs**: phase switching and enable changes must persist
//!   before they are committed
//! - **Smoothing**: large jumps of the target power are damped
//! - **Mode button**: cycle priorities with the wallbox button and LED
//! - **Async runtime**: single-writer Tokio task with a trigger queue
//! - **Configuration**: YAML-based configuration with validation
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `logging`: Structured logging and tracing
//! - `telemetry`: Telemetry provider interface and snapshot reader
//! - `debounce`: Settle-window engine and injectable clock
//! - `mode`: Priority codes and per-mode parameters
//! - `policy`: Raw target power per priority mode
//! - `smoothing`: Damping of target power jumps
//! - `resolver`: Phase mode, current and enable decision
//! - `button`: Mode-cycling button state machine
//! - `actuation`: Output commands and sink interface
//! - `controller`: Cycle orchestration
//! - `service`: Trigger queue and periodic tick
//! - `persistence`: State persistence and recovery
//! - `store`: In-memory entity store

pub mod actuation;
pub mod button;
pub mod config;
pub mod controller;
pub mod debounce;
pub mod error;
pub mod logging;
pub mod mode;
pub mod persistence;
pub mod policy;
pub mod resolver;
pub mod service;
pub mod smoothing;
pub mod state;
pub mod store;
pub mod telemetry;

// Re-export commonly used types
pub use actuation::{ActuationSink, Command};
pub use config::Config;
pub use controller::{CycleReport, SurplusController, Trigger};
pub use error::{Result, SurplusError};
pub use mode::{ChargePriority, PriorityMode};
pub use service::{ServiceHandle, SurplusService};
pub use state::ControllerState;
pub use store::StateStore;
pub use telemetry::TelemetryProvider;
