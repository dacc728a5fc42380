use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use crate::db::Database;

/// `updated_at` is stamped on every write for anyone inspecting the file;
/// nothing reads it back.
impl Database {
    pub async fn get_value(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        self.execute(move |conn| {
            conn.query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()
            .with_context(|| format!("failed to read key {key}"))
        })
        .await
    }

    pub async fn set_value(&self, key: &str, value: &str) -> Result<()> {
        let key = key.to_string();
        let value = value.to_string();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, Utc::now().to_rfc3339()],
            )
            .with_context(|| format!("failed to write key {key}"))?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn set_get_and_overwrite() {
        let dir = TempDir::new().unwrap();
        let db = Database::new(dir.path().join("kv.sqlite3")).unwrap();

        assert_eq!(db.get_value("session").await.unwrap(), None);
        db.set_value("session", "{\"boxes\":{}}").await.unwrap();
        db.set_value("session", "{\"boxes\":{\"BOX001\":{}}}").await.unwrap();

        assert_eq!(
            db.get_value("session").await.unwrap().as_deref(),
            Some("{\"boxes\":{\"BOX001\":{}}}")
        );

        let stamped: String = db
            .execute(|conn| {
                Ok(conn.query_row(
                    "SELECT updated_at FROM kv WHERE key = 'session'",
                    [],
                    |row| row.get(0),
                )?)
            })
            .await
            .unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(&stamped).is_ok());
    }

    #[tokio::test]
    async fn values_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("kv.sqlite3");
        {
            let db = Database::new(path.clone()).unwrap();
            db.set_value("flag", "true").await.unwrap();
        }
        let db = Database::new(path).unwrap();
        assert_eq!(db.get_value("flag").await.unwrap().as_deref(), Some("true"));
    }
}
