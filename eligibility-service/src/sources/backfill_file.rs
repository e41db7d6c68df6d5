use std::{path::PathBuf, pin::Pin, sync::Arc};

use async_stream::try_stream;
use futures::Stream;
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, BufReader},
};

use crate::{
    envelope::Envelope,
    observability::{Metrics, BACKFILL_PARSE_ERRORS_TOTAL},
    pipeline::{Delivery, PipelineError, Source},
};

/// NDJSON replay source: one envelope per line, delivered in fixed-size batches.
///
/// Lines that do not parse as an envelope are logged and skipped.
pub struct BackfillFileSource {
    path: PathBuf,
    batch_size: usize,
    metrics: Arc<dyn Metrics>,
}

impl BackfillFileSource {
    pub fn new<P: Into<PathBuf>>(path: P, batch_size: usize, metrics: Arc<dyn Metrics>) -> Self {
        Self {
            path: path.into(),
            batch_size: batch_size.max(1),
            metrics,
        }
    }
}

#[async_trait::async_trait]
impl Source for BackfillFileSource {
    async fn stream(&self) -> Pin<Box<dyn Stream<Item = Result<Delivery, PipelineError>> + Send>> {
        let path = self.path.clone();
        let batch_size = self.batch_size;
        let metrics = self.metrics.clone();
        let s = try_stream! {
            let file = File::open(&path).await.map_err(|e| {
                PipelineError::Source(format!("failed to open backfill file: {e}"))
            })?;
            let mut lines = BufReader::new(file).lines();
            let mut batch = Vec::with_capacity(batch_size);
            let mut line_no = 0usize;

            while let Some(line) = lines.next_line().await.map_err(|e| {
                PipelineError::Source(format!("failed to read backfill line: {e}"))
            })? {
                line_no += 1;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<Envelope>(&line) {
                    Ok(envelope) => batch.push(envelope),
                    Err(e) => {
                        metrics.increment(BACKFILL_PARSE_ERRORS_TOTAL, ("source", "backfill_file"));
                        tracing::warn!(line = line_no, error = %e, "skipping unparseable backfill line");
                        continue;
                    }
                }
                if batch.len() == batch_size {
                    yield Delivery::new(std::mem::take(&mut batch));
                }
            }

            if !batch.is_empty() {
                yield Delivery::new(batch);
            }
        };

        Box::pin(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::{NoopMetrics, RecordingMetrics};
    use futures::StreamExt;

    fn envelope_line(n: u32) -> String {
        format!(
            r#"{{"id":"00000000-0000-4000-8000-{n:012}","created_at":"2024-03-01T12:00:00Z","occurred_at":"2024-03-01T12:00:00Z","sender":"upstream"}}"#
        )
    }

    async fn write_file(contents: String) -> PathBuf {
        let path = std::env::temp_dir().join(format!("backfill-{}.ndjson", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, contents).await.unwrap();
        path
    }

    #[tokio::test]
    async fn lines_are_grouped_into_batches() {
        let lines: Vec<String> = (1..=5).map(envelope_line).collect();
        let path = write_file(lines.join("\n")).await;

        let source = BackfillFileSource::new(&path, 2, Arc::new(NoopMetrics));
        let sizes: Vec<usize> = source
            .stream()
            .await
            .map(|d| d.unwrap().envelopes.len())
            .collect()
            .await;

        assert_eq!(sizes, vec![2, 2, 1]);
        tokio::fs::remove_file(path).await.unwrap();
    }

    #[tokio::test]
    async fn blank_and_broken_lines_are_skipped() {
        let contents = format!("{}\n\nnot json\n{}\n", envelope_line(1), envelope_line(2));
        let path = write_file(contents).await;

        let metrics = Arc::new(RecordingMetrics::new());
        let source = BackfillFileSource::new(&path, 10, metrics.clone());
        let deliveries: Vec<_> = source.stream().await.collect().await;

        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].as_ref().unwrap().envelopes.len(), 2);
        assert_eq!(metrics.total(BACKFILL_PARSE_ERRORS_TOTAL), 1);
        tokio::fs::remove_file(path).await.unwrap();
    }

    #[tokio::test]
    async fn missing_file_is_a_source_error() {
        let source = BackfillFileSource::new("/nonexistent/backfill.ndjson", 10, Arc::new(NoopMetrics));
        let first = source.stream().await.next().await;
        assert!(matches!(first, Some(Err(PipelineError::Source(_)))));
    }
}
