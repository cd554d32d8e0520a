//! Progress events emitted while a search runs.
//!
//! The orchestrator reports through a [`ProgressSink`] callback; the
//! [`progress_channel`] helper adapts that callback into an async
//! stream so a server layer can forward events without this crate
//! knowing anything about its wire format.

use async_stream::stream;
use futures_util::stream::Stream;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Terminal and non-terminal states of one adapter invocation or phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Running,
    Complete,
    Error,
}

/// One progress event.
///
/// Every adapter invocation emits `running` followed by exactly one of
/// `complete` or `error`; phase boundaries emit their own events with
/// an empty source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub phase: String,
    pub source: String,
    pub status: ProgressStatus,
    pub count: usize,
    pub message: String,
}

impl ProgressEvent {
    pub fn phase_running(phase: &str, message: impl Into<String>) -> Self {
        Self {
            phase: phase.to_string(),
            source: String::new(),
            status: ProgressStatus::Running,
            count: 0,
            message: message.into(),
        }
    }

    pub fn phase_complete(phase: &str, count: usize, message: impl Into<String>) -> Self {
        Self {
            phase: phase.to_string(),
            source: String::new(),
            status: ProgressStatus::Complete,
            count,
            message: message.into(),
        }
    }

    pub fn source_running(phase: &str, source: &str) -> Self {
        Self {
            phase: phase.to_string(),
            source: source.to_string(),
            status: ProgressStatus::Running,
            count: 0,
            message: format!("searching {source}"),
        }
    }

    pub fn source_complete(phase: &str, source: &str, count: usize) -> Self {
        Self {
            phase: phase.to_string(),
            source: source.to_string(),
            status: ProgressStatus::Complete,
            count,
            message: format!("{source} returned {count} records"),
        }
    }

    pub fn source_error(phase: &str, source: &str, message: impl Into<String>) -> Self {
        Self {
            phase: phase.to_string(),
            source: source.to_string(),
            status: ProgressStatus::Error,
            count: 0,
            message: message.into(),
        }
    }
}

/// Callback consuming progress events. Cheap to clone, safe to call
/// from any worker.
pub type ProgressSink = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// A sink that discards everything.
pub fn null_sink() -> ProgressSink {
    Arc::new(|_| {})
}

/// Create a sink/stream pair. Events pushed into the sink are yielded
/// by the stream; when the engine drops its sink clone the stream ends.
///
/// The channel is bounded; if the consumer falls behind, the oldest
/// unread events are dropped rather than blocking a search worker.
pub fn progress_channel(buffer: usize) -> (ProgressSink, impl Stream<Item = ProgressEvent>) {
    let (tx, mut rx) = mpsc::channel::<ProgressEvent>(buffer.max(1));

    let sink: ProgressSink = Arc::new(move |event| {
        // try_send: a slow consumer must never stall the search.
        let _ = tx.try_send(event);
    });

    let events = stream! {
        while let Some(event) = rx.recv().await {
            yield event;
        }
    };

    (sink, events)
}
