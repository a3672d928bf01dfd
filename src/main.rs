use anyhow::{Context, Result};
use goe_surplus::config::Config;
use goe_surplus::persistence::PersistenceManager;
use goe_surplus::{ServiceHandle, StateStore, SurplusController, SurplusService, Trigger};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

const HELP: &str = "commands:
  set <entity> <state>   update an entity state
  prio <code|label>      select a priority
  press                  press the mode button
  tick                   run a cycle now
  show                   print entity states and the last cycle report
  quit                   stop";

#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(&path)
            .with_context(|| format!("Failed to load configuration from {}", path))?,
        None => Config::load().context("Failed to load configuration")?,
    };
    config.validate().context("Invalid configuration")?;

    goe_surplus::logging::init_logging(&config.logging)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "goe-surplus {} starting for {}",
        env!("APP_VERSION"),
        config.device_name
    );

    let store = Arc::new(StateStore::default().with_priority_entity(&config.entities.priority_mode));
    let persistence = config.state_file.as_deref().map(PersistenceManager::new);
    let state = persistence
        .as_ref()
        .map(PersistenceManager::load_or_default)
        .unwrap_or_default();

    let priority_entity = config.entities.priority_mode.clone();
    let controller = SurplusController::new(config, store.clone(), store.clone()).with_state(state);
    let (service, handle) = SurplusService::new(controller, persistence);
    let service_task = tokio::spawn(service.run());

    println!("{}", HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match run_line(line.trim(), &store, &handle, &priority_entity) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => warn!("{}", e),
        }
    }

    handle.shutdown();
    match service_task.await? {
        Ok(stats) => {
            info!(
                "Shutdown complete: {} cycles, {} aborted",
                stats.completed_cycles, stats.aborted_cycles
            );
            Ok(())
        }
        Err(e) => {
            error!("Controller service failed: {}", e);
            Err(anyhow::anyhow!("Controller service error: {}", e))
        }
    }
}

/// Handle one stdin line; `Ok(false)` ends the session
fn run_line(
    line: &str,
    store: &StateStore,
    handle: &ServiceHandle,
    priority_entity: &str,
) -> Result<bool> {
    let mut parts = line.splitn(3, char::is_whitespace);
    match parts.next().unwrap_or_default() {
        "" => {}
        "set" => {
            let (Some(entity), Some(state)) = (parts.next(), parts.next()) else {
                anyhow::bail!("usage: set <entity> <state>");
            };
            let changed = store.set_state(entity, state.trim());
            if changed && entity == priority_entity {
                handle.trigger(Trigger::PriorityChanged)?;
            }
        }
        "prio" => {
            let rest: Vec<&str> = parts.collect();
            if rest.is_empty() {
                anyhow::bail!("usage: prio <code|label>");
            }
            if store.set_state(priority_entity, rest.join(" ")) {
                handle.trigger(Trigger::PriorityChanged)?;
            }
        }
        "press" => handle.trigger(Trigger::ButtonPressed)?,
        "tick" => handle.trigger(Trigger::TimeTick)?,
        "show" => {
            for (name, state) in store.dump() {
                println!("{} = {}", name, state);
            }
            let latest = handle.subscribe_reports().borrow().clone();
            if let Some(report) = latest {
                println!("{}", serde_json::to_string_pretty(report.as_ref())?);
            }
        }
        "quit" | "exit" => return Ok(false),
        "help" => println!("{}", HELP),
        other => anyhow::bail!("unknown command '{}', try 'help'", other),
    }
    Ok(true)
}
