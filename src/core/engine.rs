use crate::core::bridge::{ProgressSink, UiBridge};
use crate::core::error::{BatchError, FetchError};
use crate::core::events::{BatchEvent, StatusMessage};
use crate::core::model::*;
use crate::plugins::registry::{DriverContext, FetchRequest, PluginRegistry};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Runs batches one target at a time on the calling task.
#[derive(Clone)]
pub struct BatchOrchestrator {
    registry: Arc<PluginRegistry>,
    driver_ctx: DriverContext,
    bridge: UiBridge,
}

enum LoopEnd {
    Completed,
    Halted,
}

#[derive(Default)]
struct Tally {
    processed: usize,
    failed: usize,
}

impl BatchOrchestrator {
    pub fn new(registry: Arc<PluginRegistry>, driver_ctx: DriverContext, bridge: UiBridge) -> Self {
        Self { registry, driver_ctx, bridge }
    }

    /// Drives `request` to `Completed`, `Halted` or `Failed`. Per-target
    /// failures are reported and skipped; only loop errors fail the batch.
    pub async fn run(&self, request: BatchRequest, cancel: CancellationToken) -> BatchOutcome {
        let ctx = BatchContext {
            batch_id: Uuid::new_v4(),
            layout: request.layout().clone(),
            format: request.format(),
            cancel,
        };
        let total = request.targets().len();
        let mut tally = Tally::default();

        info!(batch = %ctx.batch_id, total, format = %ctx.format, root = %ctx.layout.root.display(), "batch started");
        let _ = self.bridge.forward(BatchEvent::BatchStatusChanged { batch_id: ctx.batch_id, status: BatchStatus::Running });

        let (status, message) = match self.run_targets(&ctx, request.targets(), &mut tally).await {
            Ok(LoopEnd::Completed) => (BatchStatus::Completed, StatusMessage::Completed { total, failed: tally.failed }),
            Ok(LoopEnd::Halted) => (BatchStatus::Halted, StatusMessage::Halted { processed: tally.processed }),
            Err(e) => {
                error!(batch = %ctx.batch_id, error = %e, "batch aborted");
                (BatchStatus::Failed, StatusMessage::Critical { message: e.to_string() })
            }
        };

        info!(batch = %ctx.batch_id, ?status, processed = tally.processed, failed = tally.failed, "batch ended");

        let outcome = BatchOutcome {
            batch_id: ctx.batch_id,
            status,
            processed: tally.processed,
            failed: tally.failed,
            total,
            message: message.clone(),
        };
        let _ = self.bridge.forward(BatchEvent::Status(message));
        let _ = self.bridge.forward(BatchEvent::BatchStatusChanged { batch_id: ctx.batch_id, status });
        let _ = self.bridge.forward(BatchEvent::Finished(outcome.clone()));
        outcome
    }

    async fn run_targets(&self, ctx: &BatchContext, targets: &[Target], tally: &mut Tally) -> Result<LoopEnd, BatchError> {
        let req = FetchRequest { output_dir: ctx.layout.dir_for(&ctx.format), format: ctx.format };
        tokio::fs::create_dir_all(&req.output_dir)
            .await
            .map_err(|source| BatchError::OutputRoot { path: req.output_dir.clone(), source })?;

        let total = targets.len();
        for (i, target) in targets.iter().enumerate() {
            let index = i + 1;
            if ctx.cancel.is_cancelled() {
                info!(batch = %ctx.batch_id, processed = tally.processed, "halt observed before next target");
                return Ok(LoopEnd::Halted);
            }

            self.bridge.forward(BatchEvent::Status(StatusMessage::Processing {
                index,
                total,
                url: target.url().to_string(),
            }))?;
            self.bridge.forward(BatchEvent::TargetStarted { index, total, url: target.url().to_string() })?;

            let sink = self.bridge.target_sink(index);
            let result = self.fetch_one(target, &req, &sink).await;
            if sink.lost_events() {
                return Err(BatchError::BridgeClosed);
            }
            tally.processed += 1;

            match result {
                Ok(()) => {
                    debug!(batch = %ctx.batch_id, index, url = target.url(), "target done");
                    self.bridge.forward(BatchEvent::TargetDone { index })?;
                }
                Err(e) => {
                    warn!(batch = %ctx.batch_id, index, url = target.url(), kind = e.kind(), error = %e, "target skipped");
                    tally.failed += 1;
                    self.bridge.forward(BatchEvent::TargetFailed {
                        index,
                        url: target.url().to_string(),
                        error: e.clone(),
                    })?;
                    self.bridge.forward(BatchEvent::Status(StatusMessage::TargetSkipped {
                        index,
                        url: target.url().to_string(),
                        error: e,
                    }))?;
                }
            }
        }

        // a halt requested during the last target still counts as a halt
        if ctx.cancel.is_cancelled() {
            return Ok(LoopEnd::Halted);
        }
        Ok(LoopEnd::Completed)
    }

    async fn fetch_one(&self, target: &Target, req: &FetchRequest, sink: &dyn ProgressSink) -> Result<(), FetchError> {
        let engine = self
            .registry
            .best_engine(target, &req.format)
            .ok_or_else(|| FetchError::Unavailable(format!("no fetch engine accepts {}", target.url())))?;
        debug!(url = target.url(), engine = engine.name(), "engine selected");
        engine.fetch(target, req, &self.driver_ctx, sink).await
    }
}
