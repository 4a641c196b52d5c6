//! Telemetry gate and transport.
//!
//! The gate enforces the flat string-map payload contract, stamps every ping
//! with study metadata and hands it to a `TelemetryTransport`. Durability and
//! search indexing belong to the transport.

pub mod gate;
pub mod transport;

pub use gate::{validate_payload, PingStamp, TelemetryGate};
pub use transport::TelemetryTransport;
