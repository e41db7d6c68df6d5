use std::sync::Mutex;

use async_trait::async_trait;

use super::{EventSink, SinkError};
use crate::{envelope::Envelope, events::DownstreamEvent};

/// Records every published envelope in order. Can be told to fail.
#[derive(Debug, Default)]
pub struct MemorySink {
    published: Mutex<Vec<(&'static str, Envelope)>>,
    fail_topics: Mutex<Vec<&'static str>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every publish to `topic` fail until [`MemorySink::heal`] is called.
    pub fn fail_topic(&self, topic: &'static str) {
        if let Ok(mut topics) = self.fail_topics.lock() {
            topics.push(topic);
        }
    }

    pub fn heal(&self) {
        if let Ok(mut topics) = self.fail_topics.lock() {
            topics.clear();
        }
    }

    pub fn published(&self) -> Vec<(&'static str, Envelope)> {
        self.published
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    /// Decoded downstream events, in publish order.
    pub fn events(&self) -> Vec<DownstreamEvent> {
        self.published()
            .iter()
            .filter_map(|(_, envelope)| DownstreamEvent::from_envelope(envelope))
            .filter_map(Result::ok)
            .collect()
    }

    pub fn events_on(&self, topic: &str) -> Vec<DownstreamEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.topic() == topic)
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut published) = self.published.lock() {
            published.clear();
        }
    }
}

#[async_trait]
impl EventSink for MemorySink {
    async fn publish(&self, topic: &'static str, envelope: &Envelope) -> Result<(), SinkError> {
        let failing = self
            .fail_topics
            .lock()
            .map(|topics| topics.contains(&topic))
            .unwrap_or(false);
        if failing {
            return Err(SinkError::Publish {
                topic,
                reason: "sink unavailable".to_string(),
            });
        }

        if let Ok(mut published) = self.published.lock() {
            published.push((topic, envelope.clone()));
        }
        Ok(())
    }
}
