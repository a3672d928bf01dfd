//! Persistence of controller state
//!
//! The controller state is saved as JSON after each cycle so commanded
//! outputs, pending debounce deadlines and the fixed amount accumulator
//! survive a restart. Saving is best-effort; a missing or unreadable file
//! simply means starting fresh.

use crate::error::Result;
use crate::logging::{StructuredLogger, get_logger};
use crate::state::ControllerState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// On-disk layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistentState {
    /// Crate version that wrote the file
    pub version: String,

    /// When the file was written
    pub saved_at: DateTime<Utc>,

    /// Controller state at that time
    pub controller: ControllerState,
}

/// Persistence manager
pub struct PersistenceManager {
    file_path: PathBuf,
    logger: StructuredLogger,
}

impl PersistenceManager {
    /// Create a new persistence manager
    pub fn new<P: AsRef<Path>>(file_path: P) -> Self {
        Self {
            file_path: file_path.as_ref().to_path_buf(),
            logger: get_logger("persistence"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Load state from disk, `None` if no state file exists
    pub fn load(&self) -> Result<Option<ControllerState>> {
        if !self.file_path.exists() {
            self.logger
                .info("No persistent state file found, using defaults");
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&self.file_path)?;
        let stored: PersistentState = serde_json::from_str(&contents)?;
        self.logger.info(&format!(
            "Loaded persistent state written at {}",
            stored.saved_at.to_rfc3339()
        ));

        Ok(Some(stored.controller))
    }

    /// Load state, falling back to defaults on any error
    pub fn load_or_default(&self) -> ControllerState {
        match self.load() {
            Ok(state) => state.unwrap_or_default(),
            Err(e) => {
                self.logger
                    .warn(&format!("Ignoring unreadable state file: {}", e));
                ControllerState::default()
            }
        }
    }

    /// Save state to disk
    pub fn save(&self, state: &ControllerState) -> Result<()> {
        let stored = PersistentState {
            version: env!("CARGO_PKG_VERSION").to_string(),
            saved_at: Utc::now(),
            controller: state.clone(),
        };
        let contents = serde_json::to_string_pretty(&stored)?;
        if let Some(parent) = self.file_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        // Write then rename so a crash never leaves a truncated file
        let tmp = self.file_path.with_extension("json.tmp");
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, &self.file_path)?;
        self.logger.debug("Saved persistent state to disk");

        Ok(())
    }
}
