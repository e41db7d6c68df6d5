use std::{collections::HashMap, net::SocketAddr, pin::Pin, sync::Arc};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use futures::{stream, Stream, StreamExt};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_stream::wrappers::ReceiverStream;

use crate::{
    envelope::Envelope,
    observability::{Metrics, HTTP_INGEST_FAILED_TOTAL, HTTP_INGEST_REQUESTS_TOTAL},
    pipeline::{Delivery, PipelineError, Source},
};

#[derive(Clone)]
struct IngestState {
    senders: Arc<HashMap<&'static str, mpsc::Sender<Delivery>>>,
    metrics: Arc<dyn Metrics>,
}

/// HTTP ingestion for every topic: `POST /ingest/{topic}` with a JSON array of envelopes.
///
/// Each request is one batch. The response is held until the topic's consumer
/// finished the batch, so a `500` tells the producer to redeliver.
pub struct HttpBatchSource {
    state: IngestState,
    sources: HashMap<&'static str, ChannelSource>,
}

impl HttpBatchSource {
    pub fn new(topics: &[&'static str], channel_capacity: usize, metrics: Arc<dyn Metrics>) -> Self {
        let mut senders = HashMap::new();
        let mut sources = HashMap::new();
        for &topic in topics {
            let (tx, rx) = mpsc::channel(channel_capacity);
            senders.insert(topic, tx);
            sources.insert(topic, ChannelSource::new(rx));
        }
        Self {
            state: IngestState {
                senders: Arc::new(senders),
                metrics,
            },
            sources,
        }
    }

    /// Hands out the receiving side of a topic. Each topic can be taken once.
    pub fn take_source(&mut self, topic: &str) -> Option<ChannelSource> {
        self.sources.remove(topic)
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/ingest/:topic", post(ingest_batch))
            .with_state(self.state.clone())
    }

    pub async fn serve(&self, bind_addr: &str) -> Result<(), PipelineError> {
        let addr: SocketAddr = bind_addr
            .parse()
            .map_err(|e| PipelineError::Source(format!("invalid bind addr: {e}")))?;
        let app = self.router();

        tokio::spawn(async move {
            match tokio::net::TcpListener::bind(addr).await {
                Ok(listener) => {
                    tracing::info!(%addr, "HTTP ingest listening");
                    if let Err(e) = axum::serve(listener, app.into_make_service()).await {
                        tracing::error!(error = %e, "HTTP ingest server error");
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to bind HTTP ingest listener");
                }
            }
        });
        Ok(())
    }
}

async fn ingest_batch(
    State(state): State<IngestState>,
    Path(topic): Path<String>,
    Json(envelopes): Json<Vec<Envelope>>,
) -> Result<StatusCode, (StatusCode, String)> {
    let Some((&topic, tx)) = state.senders.get_key_value(topic.as_str()) else {
        return Err((StatusCode::NOT_FOUND, format!("unknown topic {topic}")));
    };
    let metrics = &state.metrics;
    metrics.increment(HTTP_INGEST_REQUESTS_TOTAL, ("topic", topic));

    let (ack_tx, ack_rx) = oneshot::channel();
    let delivery = Delivery {
        envelopes,
        ack: Some(ack_tx),
    };
    if tx.send(delivery).await.is_err() {
        metrics.increment(HTTP_INGEST_FAILED_TOTAL, ("topic", topic));
        return Err((StatusCode::SERVICE_UNAVAILABLE, "consumer stopped".to_string()));
    }

    match ack_rx.await {
        Ok(Ok(())) => Ok(StatusCode::OK),
        Ok(Err(reason)) => {
            metrics.increment(HTTP_INGEST_FAILED_TOTAL, ("topic", topic));
            Err((StatusCode::INTERNAL_SERVER_ERROR, reason))
        }
        Err(_) => {
            metrics.increment(HTTP_INGEST_FAILED_TOTAL, ("topic", topic));
            Err((StatusCode::INTERNAL_SERVER_ERROR, "batch dropped".to_string()))
        }
    }
}

/// Receiving side of one topic's HTTP channel.
pub struct ChannelSource {
    receiver: Mutex<Option<mpsc::Receiver<Delivery>>>,
}

impl ChannelSource {
    fn new(receiver: mpsc::Receiver<Delivery>) -> Self {
        Self {
            receiver: Mutex::new(Some(receiver)),
        }
    }
}

#[async_trait::async_trait]
impl Source for ChannelSource {
    async fn stream(&self) -> Pin<Box<dyn Stream<Item = Result<Delivery, PipelineError>> + Send>> {
        match self.receiver.lock().await.take() {
            Some(rx) => Box::pin(ReceiverStream::new(rx).map(Ok)),
            None => Box::pin(stream::once(async {
                Err(PipelineError::Source(
                    "channel source already streamed; only one consumer supported".to_string(),
                ))
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::{NoopMetrics, RecordingMetrics};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn http(topics: &[&'static str], metrics: &Arc<RecordingMetrics>) -> HttpBatchSource {
        HttpBatchSource::new(topics, 4, metrics.clone())
    }

    fn request(topic: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(format!("/ingest/{topic}"))
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn answer_next(source: ChannelSource, outcome: Result<(), String>) -> usize {
        let mut stream = source.stream().await;
        let delivery = stream.next().await.unwrap().unwrap();
        let size = delivery.envelopes.len();
        delivery.ack.unwrap().send(outcome).unwrap();
        size
    }

    #[tokio::test]
    async fn batch_is_acknowledged_after_handling() {
        let metrics = Arc::new(RecordingMetrics::new());
        let mut http = http(&["psr"], &metrics);
        let source = http.take_source("psr").unwrap();
        let consumer = tokio::spawn(answer_next(source, Ok(())));

        let response = http.router().oneshot(request("psr", "[]")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(consumer.await.unwrap(), 0);
        assert_eq!(metrics.count(HTTP_INGEST_REQUESTS_TOTAL, "psr"), 1);
        assert_eq!(metrics.total(HTTP_INGEST_FAILED_TOTAL), 0);
    }

    #[tokio::test]
    async fn failed_batch_is_a_server_error() {
        let metrics = Arc::new(RecordingMetrics::new());
        let mut http = http(&["psr"], &metrics);
        let source = http.take_source("psr").unwrap();
        tokio::spawn(answer_next(source, Err("store down".to_string())));

        let response = http.router().oneshot(request("psr", "[]")).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(metrics.count(HTTP_INGEST_FAILED_TOTAL, "psr"), 1);
    }

    #[tokio::test]
    async fn stopped_consumer_is_unavailable() {
        let metrics = Arc::new(RecordingMetrics::new());
        let mut http = http(&["psr"], &metrics);
        drop(http.take_source("psr"));

        let response = http.router().oneshot(request("psr", "[]")).await.unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(metrics.count(HTTP_INGEST_FAILED_TOTAL, "psr"), 1);
    }

    #[tokio::test]
    async fn unknown_topic_is_not_found() {
        let metrics = Arc::new(RecordingMetrics::new());
        let http = http(&["psr"], &metrics);
        let response = http.router().oneshot(request("weather", "[]")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(metrics.total(HTTP_INGEST_REQUESTS_TOTAL), 0);
    }

    #[tokio::test]
    async fn source_streams_only_once() {
        let mut http = HttpBatchSource::new(&["site"], 1, Arc::new(NoopMetrics));
        let source = http.take_source("site").unwrap();
        assert!(http.take_source("site").is_none());

        let _first = source.stream().await;
        let mut second = source.stream().await;
        assert!(matches!(second.next().await, Some(Err(PipelineError::Source(_)))));
    }
}
