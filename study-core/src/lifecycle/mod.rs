//! Study lifecycle state machine.
//!
//! `Unconfigured → Configuring → AwaitingFirstRunDecision → Active → Ended`.
//! Every mutation goes through `Study`, which takes `&mut self` for each
//! transition, so two transitions can never be in flight for one instance.
//! Termination from any trigger funnels through one guarded ending sequence.

mod ending;
mod host;
mod state;
mod study;

pub use state::StudyState;
pub use study::Study;
