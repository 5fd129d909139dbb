//! Sequential chain execution.
//!
//! The runner drives one chain instance: stages run one after another, each
//! receiving the previous stage's output. Retryable failures are retried
//! according to the [`RetryConfig`]; cancellation is checked before every
//! stage, after every attempt, and while waiting between attempts.

use super::{Chain, RetryConfig, StageSpec};
use crate::cancellation::CancellationToken;
use crate::context::{StageContext, WorkData};
use crate::core::{ChainState, ChainStatus, StageOutput, StageStatus};
use crate::observability::{SpanTimer, StageSpanAttributes, WideEventEmitter};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Receives status snapshots while a chain instance runs.
pub trait StatusSink: Send + Sync {
    /// Publishes a snapshot.
    fn publish(&self, status: ChainStatus);
}

impl<F> StatusSink for F
where
    F: Fn(ChainStatus) + Send + Sync,
{
    fn publish(&self, status: ChainStatus) {
        self(status);
    }
}

/// A sink that discards all snapshots.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpStatusSink;

impl StatusSink for NoOpStatusSink {
    fn publish(&self, _status: ChainStatus) {}
}

/// A sink that keeps every snapshot, mostly for tests.
#[derive(Debug, Default)]
pub struct CollectingStatusSink {
    statuses: Mutex<Vec<ChainStatus>>,
}

impl CollectingStatusSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the snapshots published so far.
    #[must_use]
    pub fn statuses(&self) -> Vec<ChainStatus> {
        self.statuses.lock().clone()
    }

    /// Returns the published states.
    #[must_use]
    pub fn states(&self) -> Vec<ChainState> {
        self.statuses.lock().iter().map(|s| s.state.clone()).collect()
    }
}

impl StatusSink for CollectingStatusSink {
    fn publish(&self, status: ChainStatus) {
        self.statuses.lock().push(status);
    }
}

/// Executes chains stage by stage.
#[derive(Debug, Clone, Default)]
pub struct ChainRunner {
    retry: RetryConfig,
    wide_events: WideEventEmitter,
}

impl ChainRunner {
    /// Creates a runner with the default retry policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Returns the retry policy.
    #[must_use]
    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }

    /// Runs one chain instance to completion.
    ///
    /// Publishes a `Running` snapshot before each stage and exactly one
    /// terminal snapshot, which is also returned.
    pub async fn run(
        &self,
        chain: &Chain,
        run_id: Uuid,
        input: WorkData,
        cancel: Arc<CancellationToken>,
        sink: &dyn StatusSink,
    ) -> ChainStatus {
        let timer = SpanTimer::start(chain.name());
        let mut records = Vec::new();
        let mut data = input;

        info!(chain = %chain.name(), %run_id, stages = chain.stage_count(), "Chain started");

        let mut terminal = None;
        for (index, spec) in chain.stages().iter().enumerate() {
            if cancel.is_cancelled() {
                terminal = Some(
                    ChainStatus::new(chain.name(), run_id, ChainState::Cancelled)
                        .with_output(Some(data.clone()))
                        .with_error(cancel_reason(&cancel)),
                );
                break;
            }

            sink.publish(
                ChainStatus::new(
                    chain.name(),
                    run_id,
                    ChainState::Running {
                        stage_index: index,
                        stage: spec.name.clone(),
                    },
                )
                .with_output(Some(data.clone())),
            );

            let output = self
                .run_stage(chain, spec, index, run_id, &data, &cancel, &mut records)
                .await;

            match output.status {
                StageStatus::Ok => {
                    // A stage without output forwards its input.
                    if let Some(next) = output.data {
                        data = next;
                    }
                }
                StageStatus::Fail => {
                    terminal = Some(
                        ChainStatus::new(chain.name(), run_id, ChainState::Failed)
                            .with_output(Some(data.clone()))
                            .with_error(output.error.unwrap_or_else(|| {
                                format!("Stage '{}' failed", spec.name)
                            })),
                    );
                    break;
                }
                StageStatus::Cancel => {
                    terminal = Some(
                        ChainStatus::new(chain.name(), run_id, ChainState::Cancelled)
                            .with_output(Some(data.clone()))
                            .with_error(
                                output.cancel_reason.unwrap_or_else(|| cancel_reason(&cancel)),
                            ),
                    );
                    break;
                }
            }
        }

        let status = terminal.unwrap_or_else(|| {
            ChainStatus::new(chain.name(), run_id, ChainState::Succeeded).with_output(Some(data))
        });

        let duration_ms = timer.finish();
        info!(
            chain = %chain.name(),
            %run_id,
            state = %status.state,
            duration_ms,
            "Chain finished"
        );
        self.wide_events.emit_chain_event(&status, &records, duration_ms);

        sink.publish(status.clone());
        status
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_stage(
        &self,
        chain: &Chain,
        spec: &StageSpec,
        index: usize,
        run_id: Uuid,
        input: &WorkData,
        cancel: &Arc<CancellationToken>,
        records: &mut Vec<StageSpanAttributes>,
    ) -> StageOutput {
        let mut attempt = 0;
        loop {
            let ctx = StageContext::new(chain.name(), run_id, &spec.name, input.clone(), cancel.clone())
                .with_stage_index(index)
                .with_attempt(attempt)
                .with_progress_observer(chain.progress_observer().clone());

            debug!(chain = %chain.name(), stage = %spec.name, attempt, "stage.started");
            let timer = SpanTimer::start(&spec.name);
            let mut output = spec.runner.execute(&ctx).await;
            let duration_ms = timer.finish();

            // Cancellation wins over whatever the stage reported.
            if cancel.is_cancelled() && output.status != StageStatus::Cancel {
                output = StageOutput::cancel(cancel_reason(cancel));
            }

            let mut record = StageSpanAttributes::new(chain.name(), &spec.name, index)
                .with_attempt(attempt)
                .with_status(output.status.to_string())
                .with_duration_ms(duration_ms);
            if let Some(ref error) = output.error {
                record = record.with_error(error.clone());
            }
            records.push(record);

            match output.status {
                StageStatus::Ok => {
                    info!(
                        chain = %chain.name(),
                        stage = %spec.name,
                        attempt,
                        duration_ms,
                        "stage.completed"
                    );
                    return output;
                }
                StageStatus::Cancel => {
                    info!(
                        chain = %chain.name(),
                        stage = %spec.name,
                        reason = output.cancel_reason.as_deref().unwrap_or(""),
                        "stage.cancelled"
                    );
                    return output;
                }
                StageStatus::Fail => {
                    let error = output.error.as_deref().unwrap_or("");
                    if !(output.retryable && self.retry.allows_retry_after(attempt)) {
                        warn!(
                            chain = %chain.name(),
                            stage = %spec.name,
                            attempt,
                            retryable = output.retryable,
                            error,
                            "stage.failed"
                        );
                        return output;
                    }

                    let delay = self.retry.delay_after(attempt);
                    warn!(
                        chain = %chain.name(),
                        stage = %spec.name,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error,
                        "Retryable stage failure, retrying"
                    );

                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        () = cancel.cancelled() => {
                            return StageOutput::cancel(cancel_reason(cancel));
                        }
                    }
                    attempt += 1;
                }
            }
        }
    }
}

fn cancel_reason(cancel: &CancellationToken) -> String {
    cancel.reason().unwrap_or_else(|| "cancelled".to_string())
}
