//! Controller orchestrator
//!
//! One [`SurplusController::execute_cycle`] call gathers telemetry, handles
//! the trigger, runs policy, smoothing and the phase/current resolver, and
//! pushes the outputs that changed to the actuation sink. Cycles take
//! `&mut self`, so two of them can never interleave on the same state.

use std::sync::Arc;

use crate::actuation::{ActuationSink, Command};
use crate::button::{self, ButtonEvent};
use crate::config::Config;
use crate::debounce::{Clock, SystemClock, window};
use crate::error::{Result, SurplusError};
use crate::logging::{LogContext, StructuredLogger, get_logger_with_context};
use crate::mode::{ChargePriority, PriorityMode};
use crate::policy;
use crate::resolver;
use crate::smoothing;
use crate::state::ControllerState;
use crate::telemetry::{Telemetry, TelemetryProvider, read_snapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why a cycle runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// The priority selector changed
    PriorityChanged,
    /// The mode button was pressed
    ButtonPressed,
    /// Periodic re-evaluation
    TimeTick,
}

/// Outcome of one cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    pub trigger: Trigger,
    pub timestamp: DateTime<Utc>,
    /// Priority code the cycle ran with (unknown selections run as 0)
    pub priority: u8,
    pub instant_update: bool,
    /// Set when a button press ended the cycle before the power computation
    pub button: Option<ButtonEvent>,
    /// Policy output before smoothing, `None` when no power was computed
    pub raw_target_power: Option<f64>,
    pub target_charge_power: f64,
    pub amp_value: u8,
    pub charge_enable: bool,
    pub phase_count: u8,
    pub discharge_boost: bool,
    pub phase_settle_remaining: u64,
    pub enable_settle_remaining: u64,
    /// Commands accepted by the sink, in emission order
    pub commands: Vec<Command>,
}

impl CycleReport {
    fn new(trigger: Trigger, timestamp: DateTime<Utc>, state: &ControllerState) -> Self {
        Self {
            trigger,
            timestamp,
            priority: state.priority_mode,
            instant_update: false,
            button: None,
            raw_target_power: None,
            target_charge_power: state.target_charge_power,
            amp_value: state.amp_value,
            charge_enable: state.charge_enable,
            phase_count: state.phase_count,
            discharge_boost: false,
            phase_settle_remaining: 0,
            enable_settle_remaining: 0,
            commands: Vec::new(),
        }
    }

    /// Whether the button cycled to another priority
    pub fn selected_priority(&self) -> Option<u8> {
        self.commands.iter().find_map(|c| match c {
            Command::PriorityMode(code) => Some(*code),
            _ => None,
        })
    }
}

/// Surplus charging controller for one wallbox
pub struct SurplusController {
    config: Config,
    state: ControllerState,
    telemetry: Arc<dyn TelemetryProvider>,
    sink: Arc<dyn ActuationSink>,
    clock: Arc<dyn Clock>,
    logger: StructuredLogger,
}

impl SurplusController {
    /// Create a controller with fresh state and the system clock
    pub fn new(
        config: Config,
        telemetry: Arc<dyn TelemetryProvider>,
        sink: Arc<dyn ActuationSink>,
    ) -> Self {
        let logger =
            get_logger_with_context(LogContext::new("controller").with_device(&config.device_name));
        Self {
            config,
            state: ControllerState::default(),
            telemetry,
            sink,
            clock: Arc::new(SystemClock),
            logger,
        }
    }

    /// Replace the clock used for debounce and button timing
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Resume from previously saved state
    pub fn with_state(mut self, state: ControllerState) -> Self {
        self.state = state;
        self
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run one control cycle.
    ///
    /// Missing telemetry aborts the cycle before any power command is sent
    /// and returns an error for which [`SurplusError::is_cycle_abort`] holds.
    pub async fn execute_cycle(&mut self, trigger: Trigger) -> Result<CycleReport> {
        let now = self.clock.now();
        let mut instant_update = false;
        let mut report = CycleReport::new(trigger, now, &self.state);

        let entities = &self.config.entities;
        let (snapshot, missing) =
            read_snapshot(self.telemetry.as_ref(), &Telemetry::requests(entities)).await;
        if !missing.is_empty() {
            self.logger.warn(&format!(
                "Skipping {:?} cycle, missing telemetry: {}",
                trigger,
                missing.join(", ")
            ));
            return Err(SurplusError::missing_mandatory(missing));
        }
        let telemetry = Telemetry::from_snapshot(&snapshot, entities, &self.config.controller)
            .ok_or_else(|| {
                SurplusError::missing_mandatory(
                    Telemetry::requests(entities)
                        .into_iter()
                        .map(|r| r.name)
                        .collect(),
                )
            })?;

        let priority = match ChargePriority::parse(&telemetry.priority) {
            Some(p) => p,
            None => {
                self.logger.warn(&format!(
                    "Unknown priority mode '{}', treating as {}",
                    telemetry.priority,
                    ChargePriority::Off
                ));
                instant_update = true;
                ChargePriority::Off
            }
        };
        let code = priority.code();
        report.priority = code;

        if !self.state.initialized {
            instant_update = true;
        }
        if self.selector_changed_recently(telemetry.priority_changed_at, now) {
            instant_update = true;
        }

        let mut led_commands = Vec::new();
        match trigger {
            Trigger::PriorityChanged => {
                instant_update = true;
                led_commands.extend(button::led_color_command(&self.config, code));
            }
            Trigger::ButtonPressed => {
                let outcome = button::on_press(&mut self.state, code, &self.config, now);
                report.button = Some(outcome.event);
                led_commands.extend(outcome.commands.iter().cloned());
                if outcome.ends_cycle() {
                    self.logger.info(&format!("Button press: {:?}", outcome.event));
                    self.emit(led_commands, &mut report).await;
                    return Ok(report);
                }
                self.logger.debug("Button press ignored, too soon after the previous one");
            }
            Trigger::TimeTick => {
                led_commands.extend(button::on_tick(&mut self.state, &self.config, now));
            }
        }
        self.emit(led_commands, &mut report).await;

        let conditional = priority.conditional_requests(entities);
        let (mode_snapshot, missing) = read_snapshot(self.telemetry.as_ref(), &conditional).await;
        if !missing.is_empty() {
            self.logger.warn(&format!(
                "Skipping {:?} cycle, missing telemetry for mode {}: {}",
                trigger,
                priority,
                missing.join(", ")
            ));
            return Err(SurplusError::missing_conditional(code, missing));
        }
        let mode = PriorityMode::from_snapshot(priority, &mode_snapshot, entities).ok_or_else(|| {
            SurplusError::missing_conditional(code, conditional.into_iter().map(|r| r.name).collect())
        })?;

        let entered = priority == ChargePriority::FixedAmount
            && (self.state.priority_mode != code || trigger == Trigger::PriorityChanged);
        let controller = &self.config.controller;
        let raw = policy::raw_target_power(
            &mode,
            &telemetry,
            controller,
            &mut self.state,
            entered,
            &mut instant_update,
        );
        let smoothed = smoothing::smooth_target_power(
            raw,
            self.state.target_charge_power,
            instant_update,
            controller,
        );
        let resolution = resolver::resolve(
            smoothed,
            &telemetry,
            mode.priority(),
            &mut self.state,
            controller,
            instant_update,
            now,
        );
        self.logger.debug(&format!(
            "mode={} available={:.0} raw={:.0} smoothed={:.0} target={:.0} amp={} phases={} enable={} instant={}",
            code,
            telemetry.available_power(),
            raw,
            smoothed,
            resolution.target_charge_power,
            resolution.amp_value,
            resolution.phase_count,
            resolution.charge_enable,
            instant_update
        ));
        if resolution.phase_settle_remaining > 0 || resolution.enable_settle_remaining > 0 {
            self.logger.debug(&format!(
                "Holding outputs: phase change in {}s, enable change in {}s",
                resolution.phase_settle_remaining, resolution.enable_settle_remaining
            ));
        }

        let first = !self.state.initialized;
        let mut commands = Vec::new();
        if first || resolution.target_charge_power != self.state.target_charge_power {
            commands.push(Command::TargetChargePower(resolution.target_charge_power));
        }
        if first || resolution.amp_value != self.state.amp_value {
            commands.push(Command::AmpValue(resolution.amp_value));
        }
        if first || resolution.charge_enable != self.state.charge_enable {
            commands.push(Command::ChargeEnable(resolution.charge_enable));
        }
        if first || resolution.phase_count != self.state.phase_count {
            commands.push(Command::PhaseCount(resolution.phase_count));
        }
        self.emit(commands, &mut report).await;

        self.state.target_charge_power = resolution.target_charge_power;
        self.state.amp_value = resolution.amp_value;
        self.state.charge_enable = resolution.charge_enable;
        self.state.phase_count = resolution.phase_count;
        self.state.priority_mode = code;
        self.state.initialized = true;

        report.instant_update = instant_update;
        report.raw_target_power = Some(raw);
        report.target_charge_power = resolution.target_charge_power;
        report.amp_value = resolution.amp_value;
        report.charge_enable = resolution.charge_enable;
        report.phase_count = resolution.phase_count;
        report.discharge_boost = resolution.discharge_boost;
        report.phase_settle_remaining = resolution.phase_settle_remaining;
        report.enable_settle_remaining = resolution.enable_settle_remaining;
        Ok(report)
    }

    fn selector_changed_recently(
        &self,
        changed_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> bool {
        let instant = window(self.config.controller.mode_change_instant_seconds);
        changed_at.is_some_and(|at| now - at <= instant)
    }

    /// Send commands in order; a rejected command is logged and left out of
    /// the report.
    async fn emit(&self, commands: Vec<Command>, report: &mut CycleReport) {
        for command in commands {
            match self.sink.set(command.clone()).await {
                Ok(()) => {
                    self.logger.info(&format!("Set {}", command));
                    report.commands.push(command);
                }
                Err(e) => {
                    self.logger.error(&format!("Failed to set {}: {}", command, e));
                }
            }
        }
    }
}
