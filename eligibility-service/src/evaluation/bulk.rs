use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use super::Evaluator;
use crate::observability::{Metrics, BULK_ITEMS_TOTAL};

/// Fixed pool size for bulk re-evaluation.
pub const WORKER_COUNT: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Runs full evaluation over an id set with a bounded worker pool.
///
/// Individual failures are logged and counted; they never stop the run.
pub struct BulkRunner {
    evaluator: Arc<Evaluator>,
    metrics: Arc<dyn Metrics>,
}

impl BulkRunner {
    pub fn new(evaluator: Arc<Evaluator>, metrics: Arc<dyn Metrics>) -> Self {
        Self { evaluator, metrics }
    }

    pub async fn run(&self, occupancy_ids: Vec<String>) -> BulkSummary {
        let total = occupancy_ids.len();
        if total == 0 {
            return BulkSummary::default();
        }

        // Pre-populate and close the work channel before any worker starts.
        let (tx, rx) = mpsc::channel::<String>(total);
        for id in occupancy_ids {
            if tx.try_send(id).is_err() {
                tracing::error!("bulk work channel rejected an id");
            }
        }
        drop(tx);

        let rx = Arc::new(Mutex::new(rx));
        let mut joins = Vec::with_capacity(WORKER_COUNT);

        for worker in 0..WORKER_COUNT.min(total) {
            let rx = rx.clone();
            let evaluator = self.evaluator.clone();
            let metrics = self.metrics.clone();

            joins.push(tokio::spawn(async move {
                let mut succeeded = 0usize;
                let mut failed = 0usize;
                loop {
                    let next = rx.lock().await.recv().await;
                    let Some(occupancy_id) = next else { break };

                    match evaluator.run_full(&occupancy_id).await {
                        Ok(_) => {
                            succeeded += 1;
                            metrics.increment(BULK_ITEMS_TOTAL, ("outcome", "succeeded"));
                        }
                        Err(e) => {
                            failed += 1;
                            metrics.increment(BULK_ITEMS_TOTAL, ("outcome", "failed"));
                            tracing::error!(worker, occupancy_id = %occupancy_id, error = %e, "bulk evaluation failed");
                        }
                    }
                }
                (succeeded, failed)
            }));
        }

        let mut summary = BulkSummary {
            total,
            ..BulkSummary::default()
        };
        for j in joins {
            match j.await {
                Ok((succeeded, failed)) => {
                    summary.succeeded += succeeded;
                    summary.failed += failed;
                }
                Err(e) => tracing::error!(error = %e, "bulk worker join error"),
            }
        }

        // Ids a panicked worker never reported on count as failed.
        summary.failed = total.saturating_sub(summary.succeeded);
        summary
    }
}
