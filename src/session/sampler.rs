use tokio::sync::mpsc;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::models::FeatureRecord;
use crate::session::loop_worker::SessionCommand;

const ENABLE_LOGS: bool = false;

use crate::log_info;

/// Pull-based telemetry source polled once per interval.
pub trait TelemetrySampler: Send + 'static {
    /// `None` skips this interval.
    fn sample(&mut self) -> Option<FeatureRecord>;
}

impl<F> TelemetrySampler for F
where
    F: FnMut() -> Option<FeatureRecord> + Send + 'static,
{
    fn sample(&mut self) -> Option<FeatureRecord> {
        self()
    }
}

/// Polls `sampler` every `interval_secs` and feeds the session worker.
pub async fn sampler_loop<S: TelemetrySampler>(
    mut sampler: S,
    interval_secs: u64,
    commands: mpsc::UnboundedSender<SessionCommand>,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Some(record) = sampler.sample() {
                    if commands.send(SessionCommand::Telemetry(record)).is_err() {
                        log_info!("session worker gone; sampler stopping");
                        break;
                    }
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("sampler loop shutting down");
                break;
            }
        }
    }
}
