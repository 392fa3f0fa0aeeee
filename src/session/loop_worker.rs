use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::intervention::Effect;
use crate::models::FeatureRecord;
use crate::session::clock::Clock;
use crate::session::engine::{SessionEngine, Tick};
use crate::store::{checkpoint_key, CheckpointStore};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

#[derive(Debug, Clone)]
pub enum SessionCommand {
    Telemetry(FeatureRecord),
    FocusReset,
    DismissBanner,
    /// Ground truth for the most recent interval.
    Feedback(bool),
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum SessionEvent {
    Tick(Tick),
    BannerDismissed { effects: Vec<Effect> },
    FocusReset { session_id: String },
}

pub struct WorkerContext {
    pub store: Option<Arc<dyn CheckpointStore>>,
    pub clock: Arc<dyn Clock>,
    pub checkpoint_every_ticks: u64,
}

/// Drives one session until cancelled or its command channel closes, then
/// hands the engine back for the final checkpoint.
pub async fn session_loop(
    mut engine: SessionEngine,
    mut commands: mpsc::UnboundedReceiver<SessionCommand>,
    events: mpsc::UnboundedSender<SessionEvent>,
    context: WorkerContext,
    cancel_token: CancellationToken,
) -> SessionEngine {
    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                log_info!("session loop {} shutting down", engine.id());
                break;
            }
            command = commands.recv() => {
                let Some(command) = command else {
                    log_info!("session {} command channel closed", engine.id());
                    break;
                };
                handle_command(&mut engine, command, &events, &context).await;
            }
        }
    }
    engine
}

async fn handle_command(
    engine: &mut SessionEngine,
    command: SessionCommand,
    events: &mpsc::UnboundedSender<SessionEvent>,
    context: &WorkerContext,
) {
    let now = context.clock.now();
    let event = match command {
        SessionCommand::Telemetry(record) => {
            let Some(tick) = engine.process(&record, now) else {
                return;
            };
            log_debug!(
                "session {} tick {} risk {:.3} effects {}",
                engine.id(),
                tick.result.tick,
                tick.result.risk,
                tick.effects.len()
            );
            if tick.result.degraded {
                log_warn!("session {} tick {} scored in degraded mode", engine.id(), tick.result.tick);
            }

            let every = context.checkpoint_every_ticks;
            if every > 0 && tick.result.tick % every == 0 {
                if let Some(store) = &context.store {
                    let checkpoint = engine.checkpoint();
                    let session_id = engine.id().to_string();
                    let saved = match checkpoint {
                        Ok(blob) => write_checkpoint(Arc::clone(store), &session_id, blob).await,
                        Err(err) => Err(err),
                    };
                    if let Err(err) = saved {
                        log_error!("checkpoint failed for session {}: {err:?}", engine.id());
                    }
                }
            }
            SessionEvent::Tick(tick)
        }
        SessionCommand::FocusReset => {
            engine.focus_reset();
            SessionEvent::FocusReset {
                session_id: engine.id().to_string(),
            }
        }
        SessionCommand::DismissBanner => SessionEvent::BannerDismissed {
            effects: engine.dismiss_banner(now),
        },
        SessionCommand::Feedback(actual) => {
            if !engine.record_feedback(actual) {
                log_warn!("feedback for session {} before any interval; ignored", engine.id());
            }
            return;
        }
    };

    // The receiver may be gone; the session keeps running regardless.
    let _ = events.send(event);
}

/// Store `blob` off the async runtime; store calls may block.
pub async fn write_checkpoint(
    store: Arc<dyn CheckpointStore>,
    session_id: &str,
    blob: Vec<u8>,
) -> Result<()> {
    let key = checkpoint_key(session_id);
    tokio::task::spawn_blocking(move || store.set(&key, &blob))
        .await
        .context("checkpoint worker join failed")?
}
