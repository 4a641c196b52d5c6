//! Ready / end signals for external feature code.
//!
//! Listeners subscribe by id and are notified in subscription order. The bus
//! never owns study state; the state machine decides when a signal fires and
//! guarantees at most one of the two per lifecycle run.

mod bus;
mod types;

pub use bus::SignalBus;
pub use types::{BoxedListener, FnListener, ListenerStats, SignalKind, SignalRecorder, StudyListener, StudySignal};
