//! Controller runtime
//!
//! A single task owns the [`SurplusController`] and works through triggers
//! one at a time: a periodic tick plus whatever arrives on the trigger
//! queue. Persisting state and publishing the latest report happen after
//! every completed cycle.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time::{Duration, MissedTickBehavior, interval};

use crate::controller::{CycleReport, SurplusController, Trigger};
use crate::error::{Result, SurplusError};
use crate::logging::{StructuredLogger, get_logger};
use crate::persistence::PersistenceManager;

/// Cycle counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceStats {
    pub completed_cycles: u64,
    pub aborted_cycles: u64,
    pub failed_persists: u64,
}

/// Cloneable handle for feeding and stopping a running service
#[derive(Clone)]
pub struct ServiceHandle {
    triggers: mpsc::UnboundedSender<Trigger>,
    shutdown: mpsc::UnboundedSender<()>,
    reports: watch::Receiver<Option<Arc<CycleReport>>>,
}

impl ServiceHandle {
    /// Queue a trigger behind any cycle in progress
    pub fn trigger(&self, trigger: Trigger) -> Result<()> {
        self.triggers
            .send(trigger)
            .map_err(|_| SurplusError::generic("controller service is not running"))
    }

    /// Ask the service to stop after the current cycle
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    /// Receiver that sees the report of every completed cycle
    pub fn subscribe_reports(&self) -> watch::Receiver<Option<Arc<CycleReport>>> {
        self.reports.clone()
    }
}

/// Single-writer runtime around a controller
pub struct SurplusService {
    controller: SurplusController,
    persistence: Option<PersistenceManager>,
    tick_interval: Duration,
    triggers_tx: mpsc::UnboundedSender<Trigger>,
    triggers_rx: mpsc::UnboundedReceiver<Trigger>,
    shutdown_rx: mpsc::UnboundedReceiver<()>,
    reports_tx: watch::Sender<Option<Arc<CycleReport>>>,
    stats: ServiceStats,
    logger: StructuredLogger,
}

impl SurplusService {
    /// Wrap `controller`; when `persistence` is set, state is saved after
    /// every completed cycle.
    pub fn new(
        controller: SurplusController,
        persistence: Option<PersistenceManager>,
    ) -> (Self, ServiceHandle) {
        let tick_interval = Duration::from_millis(controller.config().tick_interval_ms);
        let (triggers_tx, triggers_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::unbounded_channel();
        let (reports_tx, reports_rx) = watch::channel(None);

        let handle = ServiceHandle {
            triggers: triggers_tx.clone(),
            shutdown: shutdown_tx,
            reports: reports_rx,
        };
        let service = Self {
            controller,
            persistence,
            tick_interval,
            triggers_tx,
            triggers_rx,
            shutdown_rx,
            reports_tx,
            stats: ServiceStats::default(),
            logger: get_logger("service"),
        };
        (service, handle)
    }

    pub fn stats(&self) -> ServiceStats {
        self.stats
    }

    pub fn controller(&self) -> &SurplusController {
        &self.controller
    }

    /// Run until shutdown is requested or every handle is dropped
    pub async fn run(mut self) -> Result<ServiceStats> {
        self.logger.info(&format!(
            "Starting controller loop, tick every {} ms",
            self.tick_interval.as_millis()
        ));

        let mut tick = interval(self.tick_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    self.handle_trigger(Trigger::TimeTick).await;
                }
                maybe = self.triggers_rx.recv() => {
                    match maybe {
                        Some(trigger) => self.handle_trigger(trigger).await,
                        None => break,
                    }
                }
                _ = self.shutdown_rx.recv() => {
                    self.logger.info("Shutdown signal received");
                    break;
                }
            }
        }

        self.persist();
        self.logger.info(&format!(
            "Controller loop stopped after {} cycles ({} aborted)",
            self.stats.completed_cycles, self.stats.aborted_cycles
        ));
        Ok(self.stats)
    }

    /// Run one cycle for `trigger` and do the bookkeeping around it
    pub async fn handle_trigger(&mut self, trigger: Trigger) {
        match self.controller.execute_cycle(trigger).await {
            Ok(report) => {
                self.stats.completed_cycles = self.stats.completed_cycles.saturating_add(1);
                if let Some(code) = report.selected_priority() {
                    self.logger
                        .info(&format!("Button selected priority {}", code));
                    let _ = self.triggers_tx.send(Trigger::PriorityChanged);
                }
                self.persist();
                self.reports_tx.send_replace(Some(Arc::new(report)));
            }
            Err(e) if e.is_cycle_abort() => {
                self.stats.aborted_cycles = self.stats.aborted_cycles.saturating_add(1);
            }
            Err(e) => {
                self.stats.aborted_cycles = self.stats.aborted_cycles.saturating_add(1);
                self.logger.error(&format!("Cycle failed: {}", e));
            }
        }
    }

    fn persist(&mut self) {
        if let Some(persistence) = &self.persistence {
            if let Err(e) = persistence.save(self.controller.state()) {
                self.stats.failed_persists = self.stats.failed_persists.saturating_add(1);
                self.logger.warn(&format!(
                    "Failed to persist state to {}: {}",
                    persistence.path().display(),
                    e
                ));
            }
        }
    }
}
