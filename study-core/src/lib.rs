//! Study lifecycle runtime.
//!
//! Decides on every host run whether a study starts, which variation a client
//! gets, whether the client stays eligible, and ends the study exactly once
//! whichever trigger asks for it. Lifecycle transitions are reported as
//! telemetry pings and surfaced to feature code as `ready` / `end` signals.

pub mod db;
pub mod error;
pub mod experiments;
pub mod lifecycle;
pub mod permissions;
pub mod prefs;
pub mod setup;
pub mod signals;
pub mod telemetry;
pub mod urls;
pub mod variation;

pub use db::Database;
pub use error::{StudyError, StudyResult};
pub use experiments::ExperimentRegistry;
pub use lifecycle::{Study, StudyState};
pub use prefs::PreferenceStore;
pub use setup::StudySetup;
pub use signals::{SignalBus, SignalKind, SignalRecorder, StudyListener, StudySignal};
pub use telemetry::{TelemetryGate, TelemetryTransport};
pub use variation::VariationSelector;
