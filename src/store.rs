//! In-memory entity store
//!
//! [`StateStore`] keeps entity states the way a home automation hub does:
//! a state string plus the time it last changed. It serves as telemetry
//! provider and as actuation sink, which makes it the backend of the
//! standalone binary and of the integration tests.

use crate::actuation::{ActuationSink, Command};
use crate::debounce::{Clock, SystemClock};
use crate::error::Result;
use crate::telemetry::{TelemetryProvider, TelemetryValue};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Shared entity store
pub struct StateStore {
    entities: Mutex<HashMap<String, TelemetryValue>>,
    commands: Mutex<Vec<Command>>,
    priority_entity: Option<String>,
    clock: Arc<dyn Clock>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl StateStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entities: Mutex::new(HashMap::new()),
            commands: Mutex::new(Vec::new()),
            priority_entity: None,
            clock,
        }
    }

    /// Mirror [`Command::PriorityMode`] writes into `entity`
    pub fn with_priority_entity(mut self, entity: &str) -> Self {
        self.priority_entity = Some(entity.to_string());
        self
    }

    /// Set the state of `name`; `last_changed` only moves when the state
    /// actually differs. Returns whether it changed.
    pub fn set_state(&self, name: &str, state: impl ToString) -> bool {
        let state = state.to_string();
        let now = self.clock.now();
        let mut entities = lock(&self.entities);
        match entities.get_mut(name) {
            Some(existing) if existing.state == state => false,
            Some(existing) => {
                existing.state = state;
                existing.last_changed = now;
                true
            }
            None => {
                entities.insert(
                    name.to_string(),
                    TelemetryValue {
                        state,
                        last_changed: now,
                    },
                );
                true
            }
        }
    }

    pub fn remove(&self, name: &str) -> Option<TelemetryValue> {
        lock(&self.entities).remove(name)
    }

    pub fn state(&self, name: &str) -> Option<String> {
        lock(&self.entities).get(name).map(|v| v.state.clone())
    }

    /// All entity states, sorted by name
    pub fn dump(&self) -> Vec<(String, String)> {
        let mut all: Vec<_> = lock(&self.entities)
            .iter()
            .map(|(k, v)| (k.clone(), v.state.clone()))
            .collect();
        all.sort();
        all
    }

    /// Commands received so far
    pub fn commands(&self) -> Vec<Command> {
        lock(&self.commands).clone()
    }

    /// Drain the received commands
    pub fn take_commands(&self) -> Vec<Command> {
        std::mem::take(&mut *lock(&self.commands))
    }

    /// Latest command received for the output `name`
    pub fn last_command(&self, name: &str) -> Option<Command> {
        lock(&self.commands)
            .iter()
            .rev()
            .find(|c| c.name() == name)
            .cloned()
    }
}

#[async_trait]
impl TelemetryProvider for StateStore {
    async fn get(&self, name: &str) -> Option<TelemetryValue> {
        lock(&self.entities).get(name).cloned()
    }
}

#[async_trait]
impl ActuationSink for StateStore {
    async fn set(&self, command: Command) -> Result<()> {
        command.check()?;
        if let (Command::PriorityMode(code), Some(entity)) = (&command, &self.priority_entity) {
            self.set_state(entity, code);
        }
        lock(&self.commands).push(command);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debounce::ManualClock;
    use crate::error::SurplusError;
    use chrono::Utc;

    #[test]
    fn last_changed_moves_only_on_change() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = StateStore::new(clock.clone());
        assert!(store.set_state("select.prio", "2"));
        let first = lock(&store.entities)["select.prio"].last_changed;

        clock.advance_secs(5);
        assert!(!store.set_state("select.prio", "2"));
        assert_eq!(lock(&store.entities)["select.prio"].last_changed, first);

        assert!(store.set_state("select.prio", "3"));
        assert_eq!(
            (lock(&store.entities)["select.prio"].last_changed - first).num_seconds(),
            5
        );
    }

    #[tokio::test]
    async fn priority_writes_are_mirrored() {
        let store = StateStore::default().with_priority_entity("select.prio");
        store.set_state("select.prio", "3");
        store.set(Command::PriorityMode(5)).await.unwrap();
        assert_eq!(store.state("select.prio").as_deref(), Some("5"));
        assert_eq!(store.last_command("priority_mode"), Some(Command::PriorityMode(5)));
        assert_eq!(store.take_commands().len(), 1);
        assert!(store.commands().is_empty());
    }

    #[tokio::test]
    async fn invalid_commands_are_rejected() {
        let store = StateStore::default().with_priority_entity("select.prio");
        store.set_state("select.prio", "3");

        let err = store.set(Command::PriorityMode(12)).await.unwrap_err();
        assert!(matches!(err, SurplusError::Actuation { .. }));
        assert!(!err.is_cycle_abort());
        assert_eq!(store.state("select.prio").as_deref(), Some("3"));

        let err = store.set(Command::LedColor("purple".into())).await.unwrap_err();
        assert!(matches!(err, SurplusError::Actuation { .. }));
        assert!(store.commands().is_empty());
    }
}
