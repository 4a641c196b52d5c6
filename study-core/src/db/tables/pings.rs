//! Telemetry ping archive operations

use rusqlite::Result as SqliteResult;
use std::collections::BTreeMap;

use study_types::{PingQuery, TelemetryPing};

use super::super::Database;

impl Database {
    pub fn insert_ping(&self, ping: &TelemetryPing) -> SqliteResult<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO telemetry_pings (ping_id, ping_type, timestamp, study_name, branch, payload)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                ping.id,
                ping.ping_type,
                ping.timestamp,
                ping.study_name,
                ping.branch,
                serde_json::to_string(&ping.payload).unwrap_or_default(),
            ],
        )?;
        Ok(())
    }

    /// Search pings, newest first. Every filter set on the query applies.
    pub fn query_pings(&self, query: &PingQuery) -> SqliteResult<Vec<TelemetryPing>> {
        let conn = self.conn();

        let mut sql = String::from(
            "SELECT ping_id, ping_type, timestamp, study_name, branch, payload
             FROM telemetry_pings WHERE 1=1",
        );
        let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(ref types) = query.types {
            if types.is_empty() {
                return Ok(Vec::new());
            }
            let placeholders: Vec<String> = types
                .iter()
                .enumerate()
                .map(|(i, _)| format!("?{}", params.len() + i + 1))
                .collect();
            sql.push_str(&format!(" AND ping_type IN ({})", placeholders.join(", ")));
            for t in types {
                params.push(Box::new(t.clone()));
            }
        }

        if let Some(min) = query.min_timestamp {
            sql.push_str(&format!(" AND timestamp > ?{}", params.len() + 1));
            params.push(Box::new(min));
        }

        sql.push_str(" ORDER BY timestamp DESC, seq DESC");

        if let Some(max) = query.max_count {
            // SQLite limits are signed 64-bit
            sql.push_str(&format!(" LIMIT ?{}", params.len() + 1));
            params.push(Box::new(i64::try_from(max).unwrap_or(i64::MAX)));
        }

        let mut stmt = conn.prepare(&sql)?;
        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            params.iter().map(|p| p.as_ref()).collect();
        let headers_only = query.headers_only;
        let pings = stmt
            .query_map(param_refs.as_slice(), |row| {
                Self::row_to_ping(row, headers_only)
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(pings)
    }

    pub fn count_pings(&self) -> SqliteResult<i64> {
        let conn = self.conn();
        conn.query_row("SELECT COUNT(*) FROM telemetry_pings", [], |row| row.get(0))
    }

    fn row_to_ping(row: &rusqlite::Row, headers_only: bool) -> rusqlite::Result<TelemetryPing> {
        let payload = if headers_only {
            BTreeMap::new()
        } else {
            let payload_str: String = row.get(5)?;
            serde_json::from_str(&payload_str).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    5,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?
        };

        Ok(TelemetryPing {
            id: row.get(0)?,
            ping_type: row.get(1)?,
            timestamp: row.get(2)?,
            study_name: row.get(3)?,
            branch: row.get(4)?,
            payload,
        })
    }
}
