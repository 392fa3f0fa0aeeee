pub mod aggregation;
pub mod conflict;
pub mod dynamics;
pub mod estimation;
pub mod intervention;
pub mod models;
pub mod scoring;
pub mod session;
pub mod settings;
pub mod snapshot;
pub mod store;
pub mod utils;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::{Duration, Utc};
use log::{info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};

use models::{FeatureRecord, TaskType};
use scoring::model_factory;
use session::{ManualClock, SessionCommand, SessionController, SessionHandle};
use settings::{EngineConfig, SettingsStore};
use store::{CheckpointStore, SqliteStore};

const CONFIG_ENV: &str = "CORTEXFLOW_CONFIG";
const TASK_ENV: &str = "CORTEXFLOW_TASK";
const STATE_DB_ENV: &str = "CORTEXFLOW_STATE_DB";
const SESSION_ENV: &str = "CORTEXFLOW_SESSION";

/// Replays FeatureRecord JSON lines from stdin through one session and writes
/// each resulting event as a JSON line on stdout. The lines `reset` and
/// `dismiss` trigger a focus reset and a banner dismissal; `feedback 1` or
/// `feedback 0` reports whether the last interval really was a breakdown.
pub fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("CortexFlow starting up...");

    let config = match std::env::var_os(CONFIG_ENV) {
        Some(path) => SettingsStore::new(PathBuf::from(path))?.config(),
        None => EngineConfig::default(),
    };
    let task_type = std::env::var(TASK_ENV)
        .map(|value| TaskType::parse_lenient(&value))
        .unwrap_or_default();
    let store = match std::env::var_os(STATE_DB_ENV) {
        Some(path) => Some(Arc::new(SqliteStore::open(PathBuf::from(path))?) as Arc<dyn CheckpointStore>),
        None => None,
    };
    let resume_id = std::env::var(SESSION_ENV).ok();

    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    runtime.block_on(replay(config, task_type, store, resume_id))
}

async fn replay(
    config: EngineConfig,
    task_type: TaskType,
    store: Option<Arc<dyn CheckpointStore>>,
    resume_id: Option<String>,
) -> Result<()> {
    // Records arrive faster than real time, so time advances one interval per record.
    let clock = ManualClock::new(Utc::now());
    let step = Duration::seconds(config.interval_secs as i64);

    let factory = model_factory(&config.adapter);
    let mut controller = SessionController::new(config, factory)
        .with_clock(Arc::new(clock.clone()));
    if let Some(store) = store {
        controller = controller.with_store(store);
    }

    let SessionHandle { id, mut events } = match resume_id {
        Some(id) => {
            let restored = controller.resume_session(&id, task_type).await?;
            if restored.fell_back {
                warn!("no usable checkpoint for session {id}; starting fresh");
            }
            restored.value
        }
        None => controller.start_session(task_type).await?,
    };
    info!("replaying telemetry into session {id}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let line = line.trim();
        let command = match line {
            "" => continue,
            "reset" => SessionCommand::FocusReset,
            "dismiss" => SessionCommand::DismissBanner,
            _ => match line.strip_prefix("feedback") {
                Some(outcome) => {
                    let actual = parse_feedback(outcome)?;
                    // Feedback produces no event.
                    controller.send(&id, SessionCommand::Feedback(actual))?;
                    continue;
                }
                None => {
                    clock.advance(step);
                    SessionCommand::Telemetry(FeatureRecord::from_json_lenient(line))
                }
            },
        };
        controller.send(&id, command)?;

        let event = events
            .recv()
            .await
            .ok_or_else(|| anyhow!("session {id} stopped unexpectedly"))?;
        println!("{}", serde_json::to_string(&event)?);
    }

    let report = controller.end_session(&id).await?;
    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}

fn parse_feedback(outcome: &str) -> Result<bool> {
    match outcome.trim() {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        other => Err(anyhow!("feedback expects 0 or 1, got '{other}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feedback_lines_parse_both_outcomes() {
        assert!(parse_feedback(" 1").unwrap());
        assert!(!parse_feedback(" false ").unwrap());
        assert!(parse_feedback(" maybe").is_err());
    }
}
