use anyhow::{anyhow, Result};
use eligibility_client::db::{PgStore, Store};
use eligibility_service::{
    admin::{self, AdminState},
    config::{AppConfig, SinkKind},
    evaluation::{BulkRunner, Evaluator},
    ingest::{self, IngestContext},
    metrics_server,
    observability::{self, Metrics, PrometheusMetrics},
    pipeline::Consumer,
    sinks::{EventSink, LogSink, OutboxSink},
    sources::HttpBatchSource,
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let cfg = AppConfig::load()?;

    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let pool = PgPoolOptions::new()
        .max_connections(cfg.database.max_connections)
        .connect(&cfg.database.uri)
        .await?;

    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool.clone()));
    let metrics: Arc<dyn Metrics> = Arc::new(PrometheusMetrics);
    let sink: Arc<dyn EventSink> = match cfg.sink.kind {
        SinkKind::Outbox => Arc::new(OutboxSink::new(
            pool,
            cfg.sink.max_retries,
            Duration::from_millis(cfg.sink.retry_backoff_ms),
        )),
        SinkKind::Log => Arc::new(LogSink),
    };

    let evaluator = Arc::new(Evaluator::new(store.clone(), sink, metrics.clone()));
    let bulk = Arc::new(BulkRunner::new(evaluator.clone(), metrics.clone()));

    let ctx = IngestContext {
        store: store.clone(),
        evaluator,
        metrics: metrics.clone(),
        state_rebuild: cfg.ingest.state_rebuild,
    };
    if ctx.state_rebuild {
        tracing::warn!("state rebuild mode: facts are persisted, nothing is evaluated or published");
    }

    // One consumer task per topic, each draining its own HTTP channel in order.
    let mut http = HttpBatchSource::new(&ingest::TOPICS, cfg.ingest.channel_capacity, metrics.clone());
    let mut consumers = Vec::new();
    for handler in ingest::handlers(ctx) {
        let topic = handler.topic();
        let source = http
            .take_source(topic)
            .ok_or_else(|| anyhow!("no ingest channel for topic {topic}"))?;
        let consumer = Consumer {
            source,
            handler,
            metrics: metrics.clone(),
        };
        consumers.push(tokio::spawn(consumer.run()));
    }
    http.serve(&cfg.ingest.http_bind_addr).await?;

    tokio::select! {
        res = admin::serve(AdminState { store, bulk }, &cfg.admin.bind_addr) => res?,
        _ = futures::future::join_all(consumers) => tracing::warn!("all consumers stopped"),
    }

    Ok(())
}
