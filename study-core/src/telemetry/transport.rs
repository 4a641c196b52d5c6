//! Transport seam for outgoing pings and the local ping archive.

use study_types::{PingQuery, TelemetryPing};

use crate::db::Database;
use crate::error::{StudyError, StudyResult};

/// Accepts stamped pings and answers searches over what it has stored
pub trait TelemetryTransport: Send + Sync {
    fn submit(&self, ping: &TelemetryPing) -> StudyResult<()>;

    /// Newest first, filters applied before truncation
    fn search(&self, query: &PingQuery) -> StudyResult<Vec<TelemetryPing>>;
}

impl TelemetryTransport for Database {
    fn submit(&self, ping: &TelemetryPing) -> StudyResult<()> {
        self.insert_ping(ping).map_err(StudyError::transport)
    }

    fn search(&self, query: &PingQuery) -> StudyResult<Vec<TelemetryPing>> {
        self.query_pings(query).map_err(StudyError::transport)
    }
}
