use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::pipeline::RunSummary;

/// Periodic trigger for one entity kind's pipeline. Each kind gets its own
/// independent task and cadence; nothing is coordinated across kinds. The
/// tick period is a soft duration budget: an overrunning run is logged but
/// allowed to finish, since dropping it mid-run could strand an item in its
/// in-flight claim. Runs never overlap within a kind because ticks missed
/// while a run is in progress are skipped.
pub struct PipelineTrigger {
    name: &'static str,
    task_handle: JoinHandle<()>,
    cancellation_token: CancellationToken,
}

impl PipelineTrigger {
    pub fn spawn<F, Fut>(name: &'static str, period: Duration, run: F) -> Self
    where
        F: Fn(DateTime<Utc>) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<RunSummary>> + Send + 'static,
    {
        let cancellation_token = CancellationToken::new();
        let task_token = cancellation_token.child_token();

        let task_handle = tokio::spawn(async move {
            log::info!("[{name}] trigger started, period {period:?}");
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = task_token.cancelled() => {
                        log::info!("[{name}] trigger shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        let started = Instant::now();
                        let run_fut = run(Utc::now());
                        tokio::pin!(run_fut);

                        let result = tokio::select! {
                            result = &mut run_fut => result,
                            _ = tokio::time::sleep(period) => {
                                log::warn!(
                                    "[{name}] run exceeded its {period:?} budget, waiting for it to finish"
                                );
                                run_fut.await
                            }
                        };

                        match result {
                            Ok(summary) => {
                                log::info!(
                                    "[{name}] run complete in {:?}. {summary}",
                                    started.elapsed()
                                );
                            }
                            // Kind-level failure; the next tick is the retry.
                            Err(e) => log::error!("[{name}] run failed: {e:#}"),
                        }
                    }
                }
            }
        });

        Self {
            name,
            task_handle,
            cancellation_token,
        }
    }

    pub async fn shutdown(self) {
        self.cancellation_token.cancel();
        if let Err(e) = self.task_handle.await {
            log::warn!("[{}] trigger task ended abnormally: {e}", self.name);
        }
    }
}
