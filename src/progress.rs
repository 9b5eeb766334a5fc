//! Progress reporting for long-running jobs.
//!
//! A producer reports through a [`ProgressSink`]; [`run`] spawns it as its own
//! task and turns its reports into an ordered stream of [`ProgressEvent`]s:
//!
//! - the first event is always `start` at 0%;
//! - then every `loading` event in emission order, percentages never decreasing;
//! - then exactly one terminal event, `success` at 100% or `error` at the last percent.
//!
//! End of stream is the channel closing when the producer task drops its sender.
//! The stream then awaits the task, so a panic still ends in an `error` event.

use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, error};

pub const START_MESSAGE: &str = "开始分析...";
const PANIC_MESSAGE: &str = "分析任务异常终止";

/// Port for receiving progress updates.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, percent: u8, message: &str);
}

/// Discards everything.
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn emit(&self, _percent: u8, _message: &str) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Start,
    Loading,
    Success,
    Error,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Success | Status::Error)
    }
}

/// Wire shape: `{progress, message, status, ...extra}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub progress: u8,
    pub message: String,
    pub status: Status,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProgressEvent {
    fn new(progress: u8, message: impl Into<String>, status: Status) -> Self {
        Self {
            progress: progress.min(100),
            message: message.into(),
            status,
            extra: Map::new(),
        }
    }

    pub fn start() -> Self {
        Self::new(0, START_MESSAGE, Status::Start)
    }

    pub fn loading(progress: u8, message: impl Into<String>) -> Self {
        Self::new(progress, message, Status::Loading)
    }

    pub fn success(message: impl Into<String>, payload: Map<String, Value>) -> Self {
        let mut ev = Self::new(100, message, Status::Success);
        ev.extra = payload;
        ev
    }

    /// Error events repeat the message under `error` for older clients.
    pub fn error(progress: u8, message: impl Into<String>) -> Self {
        let mut ev = Self::new(progress, message, Status::Error);
        ev.extra
            .insert("error".into(), Value::String(ev.message.clone()));
        ev
    }

    /// One NDJSON line (with trailing newline).
    pub fn to_line(&self) -> String {
        let mut line = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        line.push('\n');
        line
    }

    /// Server-Sent Events frame carrying the JSON object as `data:`.
    pub fn to_sse(&self) -> Result<axum::response::sse::Event, axum::Error> {
        axum::response::sse::Event::default().json_data(self)
    }
}

/// What happens to the producer when the consumer goes away.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelPolicy {
    /// Producer runs to completion (results are still persisted).
    #[default]
    Detach,
    /// Producer task is aborted when the stream is dropped.
    AbortOnDisconnect,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StreamOptions {
    /// Pause after each forwarded event.
    pub pacing: Option<Duration>,
    pub cancel: CancelPolicy,
}

/// Successful outcome of a producer: final message plus payload merged into the event.
#[derive(Debug, Clone, Default)]
pub struct Completion {
    pub message: String,
    pub payload: Map<String, Value>,
}

/// Sink feeding the stream's channel. Percentages are clamped to be non-decreasing.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ProgressEvent>,
    last: Arc<AtomicU8>,
    finished: AtomicBool,
}

impl ChannelSink {
    pub fn last_percent(&self) -> u8 {
        self.last.load(Ordering::SeqCst)
    }

    fn raise_to(&self, percent: u8) -> u8 {
        let p = percent.min(100);
        self.last.fetch_max(p, Ordering::SeqCst).max(p)
    }

    fn send(&self, ev: ProgressEvent) {
        // receiver gone means the consumer left; the producer keeps going
        if self.tx.send(ev).is_err() {
            debug!("progress consumer disconnected");
        }
    }

    fn finish(&self, ev: ProgressEvent) {
        if !self.finished.swap(true, Ordering::SeqCst) {
            self.send(ev);
        }
    }
}

impl ProgressSink for ChannelSink {
    fn emit(&self, percent: u8, message: &str) {
        if self.finished.load(Ordering::SeqCst) {
            return;
        }
        let p = self.raise_to(percent);
        self.send(ProgressEvent::loading(p, message));
    }
}

struct AbortOnDrop(Option<AbortHandle>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        if let Some(h) = self.0.take() {
            h.abort();
        }
    }
}

/// Spawn `producer` and return its progress as a stream. Must be called inside a Tokio runtime.
pub fn run<F, Fut, E>(opts: StreamOptions, producer: F) -> BoxStream<'static, ProgressEvent>
where
    F: FnOnce(Arc<ChannelSink>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<Completion, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let last = Arc::new(AtomicU8::new(0));
    let sink = Arc::new(ChannelSink {
        tx,
        last: last.clone(),
        finished: AtomicBool::new(false),
    });

    let handle = tokio::spawn(async move {
        let outcome = producer(sink.clone()).await;
        match outcome {
            Ok(done) => sink.finish(ProgressEvent::success(done.message, done.payload)),
            Err(e) => sink.finish(ProgressEvent::error(sink.last_percent(), e.to_string())),
        }
        // dropping the last sink closes the channel
    });

    let guard = AbortOnDrop(match opts.cancel {
        CancelPolicy::AbortOnDisconnect => Some(handle.abort_handle()),
        CancelPolicy::Detach => None,
    });

    let tail = stream::once(async move {
        let _guard = guard;
        match handle.await {
            Err(e) if e.is_panic() => {
                error!("progress producer panicked");
                Some(ProgressEvent::error(last.load(Ordering::SeqCst), PANIC_MESSAGE))
            }
            _ => None,
        }
    })
    .filter_map(futures::future::ready);

    let events = stream::once(futures::future::ready(ProgressEvent::start()))
        .chain(UnboundedReceiverStream::new(rx))
        .chain(tail);

    match opts.pacing {
        // each event goes out first; the pause runs before the next one is pulled
        Some(delay) if !delay.is_zero() => events
            .flat_map(move |ev| {
                stream::once(futures::future::ready(ev)).chain(
                    stream::once(tokio::time::sleep(delay))
                        .filter_map(|()| futures::future::ready(None::<ProgressEvent>)),
                )
            })
            .boxed(),
        _ => events.boxed(),
    }
}
