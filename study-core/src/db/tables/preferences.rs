//! Preference operations - typed key/value rows

use rusqlite::{OptionalExtension, Result as SqliteResult};

use super::super::Database;

impl Database {
    /// Returns `(kind, value)` for a key, or None when unset
    pub fn get_preference(&self, key: &str) -> SqliteResult<Option<(String, String)>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT kind, value FROM preferences WHERE key = ?1",
            [key],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
    }

    pub fn set_preference(&self, key: &str, kind: &str, value: &str) -> SqliteResult<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO preferences (key, kind, value, updated_at)
             VALUES (?1, ?2, ?3, datetime('now'))
             ON CONFLICT(key) DO UPDATE SET
                kind = excluded.kind,
                value = excluded.value,
                updated_at = excluded.updated_at",
            rusqlite::params![key, kind, value],
        )?;
        Ok(())
    }

    /// Delete every preference whose key starts with `prefix`
    pub fn delete_preferences_with_prefix(&self, prefix: &str) -> SqliteResult<usize> {
        let conn = self.conn();
        conn.execute(
            "DELETE FROM preferences WHERE substr(key, 1, length(?1)) = ?1",
            [prefix],
        )
    }
}
