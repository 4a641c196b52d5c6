//! Active experiment annotations reported alongside host telemetry

use rusqlite::{OptionalExtension, Result as SqliteResult};

use super::super::Database;

impl Database {
    pub fn set_active_experiment(&self, study_name: &str, branch: &str) -> SqliteResult<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO active_experiments (study_name, branch, activated_at)
             VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(study_name) DO UPDATE SET branch = excluded.branch",
            rusqlite::params![study_name, branch],
        )?;
        Ok(())
    }

    pub fn remove_active_experiment(&self, study_name: &str) -> SqliteResult<usize> {
        let conn = self.conn();
        conn.execute(
            "DELETE FROM active_experiments WHERE study_name = ?1",
            [study_name],
        )
    }

    pub fn get_active_experiment(&self, study_name: &str) -> SqliteResult<Option<String>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT branch FROM active_experiments WHERE study_name = ?1",
            [study_name],
            |row| row.get(0),
        )
        .optional()
    }
}
