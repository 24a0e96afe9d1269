//! EventNotifier — "viewed file" observability events.
//!
//! Events are queued on a bounded channel and written to the sink by a
//! background task, so a slow or broken sink never stalls the analysis loop.
//! Every failure on this path is logged and otherwise ignored.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

/// Event kind of a "viewed file" record.
pub const VIEWED_FILE_KIND: u32 = 6838;

// ─── Types ──────────────────────────────────────────────────────────────────

/// An observability record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub kind: u32,
    pub content: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
    pub tags: Vec<Vec<String>>,
}

impl Event {
    pub fn viewed_file(path: &str) -> Self {
        Self {
            kind: VIEWED_FILE_KIND,
            content: format!("Viewed {path}"),
            created_at: Utc::now(),
            tags: Vec::new(),
        }
    }
}

/// Outbound envelope, serialized as `["EVENT", {…}]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventEnvelope(&'static str, Event);

impl EventEnvelope {
    pub fn new(event: Event) -> Self {
        Self("EVENT", event)
    }

    pub fn event(&self) -> &Event {
        &self.1
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification channel closed")]
    Closed,

    #[error("failed to serialize event: {reason}")]
    Serialize { reason: String },

    #[error("failed to write event: {reason}")]
    Write { reason: String },
}

// ─── Sinks ──────────────────────────────────────────────────────────────────

/// Destination of notification envelopes (an open connection to a client).
///
/// Writes arrive one at a time from a single notifier; a sink shared by
/// several notifiers must serialize writes itself.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn send(&self, envelope: &EventEnvelope) -> Result<(), NotifyError>;
}

/// Sink that forwards JSON text frames into an mpsc channel, for callers
/// that bridge the channel onto their own connection.
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<String>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<String>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn send(&self, envelope: &EventEnvelope) -> Result<(), NotifyError> {
        let frame = serde_json::to_string(envelope).map_err(|e| NotifyError::Serialize {
            reason: e.to_string(),
        })?;
        self.tx.send(frame).await.map_err(|_| NotifyError::Closed)
    }
}

// ─── EventNotifier ──────────────────────────────────────────────────────────

/// Queues "viewed file" events for a background writer.
pub struct EventNotifier {
    tx: Option<mpsc::Sender<EventEnvelope>>,
    worker: Option<JoinHandle<()>>,
}

impl EventNotifier {
    /// A notifier without a sink: every `notify` is a logged no-op.
    pub fn disabled() -> Self {
        Self {
            tx: None,
            worker: None,
        }
    }

    /// Spawn the writer task. Must be called inside a Tokio runtime.
    pub fn spawn(sink: Arc<dyn EventSink>, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<EventEnvelope>(capacity.max(1));

        let worker = tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                if let Err(e) = sink.send(&envelope).await {
                    tracing::warn!(
                        error = %e,
                        content = %envelope.event().content,
                        "failed to write viewed-file event"
                    );
                }
            }
        });

        Self {
            tx: Some(tx),
            worker: Some(worker),
        }
    }

    pub fn from_sink(sink: Option<Arc<dyn EventSink>>, capacity: usize) -> Self {
        match sink {
            Some(sink) => Self::spawn(sink, capacity),
            None => Self::disabled(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Queue a "Viewed <path>" event. Never waits; a full queue drops the event.
    pub fn notify(&self, path: &str) {
        let Some(ref tx) = self.tx else {
            tracing::info!(path, "no notification channel, viewed-file event skipped");
            return;
        };

        match tx.try_send(EventEnvelope::new(Event::viewed_file(path))) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(path, "notification queue full, viewed-file event dropped");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::warn!(path, "notification writer stopped, viewed-file event dropped");
            }
        }
    }

    /// Close the queue and wait until every queued event was written.
    pub async fn flush(mut self) {
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                tracing::warn!(error = %e, "notification writer task failed");
            }
        }
    }

    /// Like [`flush`](Self::flush), bounded by `grace`. A writer still busy
    /// when the grace period ends is aborted and its pending events dropped.
    pub async fn shutdown(mut self, grace: Duration) {
        self.tx.take();
        let Some(mut worker) = self.worker.take() else {
            return;
        };

        match tokio::time::timeout(grace, &mut worker).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "notification writer task failed"),
            Err(_) => {
                tracing::warn!(
                    grace_secs = grace.as_secs(),
                    "notification writer did not drain in time, pending events dropped"
                );
                worker.abort();
                // Wait for the abort so the sink is released on return.
                let _ = worker.await;
            }
        }
    }
}

impl Drop for EventNotifier {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
