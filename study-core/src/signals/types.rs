//! Signal types and the listener trait

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use study_types::{EndingOutcome, StudyInfo};

/// The two signals a study emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// The study is enrolled and the feature may start
    Ready,
    /// The study ended; the feature should tear down
    End,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Ready => "ready",
            SignalKind::End => "end",
        }
    }
}

/// A fired signal with its payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "signal", content = "payload", rename_all = "snake_case")]
pub enum StudySignal {
    Ready(StudyInfo),
    End(EndingOutcome),
}

impl StudySignal {
    pub fn kind(&self) -> SignalKind {
        match self {
            StudySignal::Ready(_) => SignalKind::Ready,
            StudySignal::End(_) => SignalKind::End,
        }
    }
}

/// Receives study signals
pub trait StudyListener: Send + Sync {
    /// Unique identifier used to unsubscribe
    fn id(&self) -> &str;

    /// Signals this listener wants
    fn signals(&self) -> Vec<SignalKind> {
        vec![SignalKind::Ready, SignalKind::End]
    }

    fn on_signal(&self, signal: &StudySignal);
}

pub type BoxedListener = Arc<dyn StudyListener>;

/// Listener backed by a closure
pub struct FnListener<F>
where
    F: Fn(&StudySignal) + Send + Sync,
{
    id: String,
    signals: Vec<SignalKind>,
    callback: F,
}

impl<F> FnListener<F>
where
    F: Fn(&StudySignal) + Send + Sync,
{
    pub fn new(id: impl Into<String>, signals: Vec<SignalKind>, callback: F) -> Self {
        Self {
            id: id.into(),
            signals,
            callback,
        }
    }
}

impl<F> StudyListener for FnListener<F>
where
    F: Fn(&StudySignal) + Send + Sync,
{
    fn id(&self) -> &str {
        &self.id
    }

    fn signals(&self) -> Vec<SignalKind> {
        self.signals.clone()
    }

    fn on_signal(&self, signal: &StudySignal) {
        (self.callback)(signal)
    }
}

/// Keeps every signal it receives, in order
pub struct SignalRecorder {
    id: String,
    received: Mutex<Vec<StudySignal>>,
}

impl SignalRecorder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            received: Mutex::new(Vec::new()),
        }
    }

    pub fn received(&self) -> Vec<StudySignal> {
        self.received.lock().clone()
    }

    pub fn count(&self, kind: SignalKind) -> usize {
        self.received.lock().iter().filter(|s| s.kind() == kind).count()
    }
}

impl StudyListener for SignalRecorder {
    fn id(&self) -> &str {
        &self.id
    }

    fn on_signal(&self, signal: &StudySignal) {
        self.received.lock().push(signal.clone());
    }
}

/// Delivery statistics for one listener
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListenerStats {
    pub ready: u64,
    pub end: u64,
}

impl ListenerStats {
    pub fn record_delivery(&mut self, kind: SignalKind) {
        match kind {
            SignalKind::Ready => self.ready += 1,
            SignalKind::End => self.end += 1,
        }
    }

    pub fn deliveries(&self) -> u64 {
        self.ready + self.end
    }
}
