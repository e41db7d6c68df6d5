use anyhow::{anyhow, bail, Result};
use eligibility_client::db::{PgStore, Store};
use eligibility_service::{
    config::AppConfig,
    evaluation::Evaluator,
    ingest::{self, IngestContext},
    observability::{self, Metrics, PrometheusMetrics},
    pipeline::Consumer,
    sinks::{EventSink, LogSink},
    sources::BackfillFileSource,
};
use sqlx::postgres::PgPoolOptions;
use std::{env, sync::Arc};

/// Replays an NDJSON envelope file into one topic's stores without evaluating.
///
/// Run `PATCH /rerunEvaluation` against the service afterwards to reconcile.
#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        bail!("usage: backfill <topic> <ndjson_file_path>");
    }
    let topic = &args[1];
    let file_path = &args[2];

    let cfg = AppConfig::load()?;

    let pool = PgPoolOptions::new()
        .max_connections(cfg.database.max_connections)
        .connect(&cfg.database.uri)
        .await?;

    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));
    let metrics: Arc<dyn Metrics> = Arc::new(PrometheusMetrics);
    // Never reached with state_rebuild set; the evaluator still needs a sink.
    let sink: Arc<dyn EventSink> = Arc::new(LogSink);
    let evaluator = Arc::new(Evaluator::new(store.clone(), sink, metrics.clone()));

    let ctx = IngestContext {
        store,
        evaluator,
        metrics: metrics.clone(),
        state_rebuild: true,
    };
    let handler = ingest::handler_for(ctx, topic)
        .ok_or_else(|| anyhow!("unknown topic {topic}; expected one of {:?}", ingest::TOPICS))?;

    let consumer = Consumer {
        source: BackfillFileSource::new(file_path, cfg.ingest.backfill_batch_size, metrics.clone()),
        handler,
        metrics,
    };
    let stats = consumer.run().await;

    if stats.failed_batches > 0 || stats.source_errors > 0 {
        bail!(
            "backfill of {topic} finished with {} failed batches and {} source errors",
            stats.failed_batches,
            stats.source_errors
        );
    }
    tracing::info!(topic = %topic, batches = stats.batches, "backfill complete");
    Ok(())
}
