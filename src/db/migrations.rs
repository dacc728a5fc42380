use anyhow::{bail, Context, Result};
use rusqlite::Connection;

/// Schema scripts in order; entry `n` upgrades `user_version` `n` to `n + 1`.
const MIGRATIONS: &[&str] = &[include_str!("schemas/schema_v1.sql")];

const CURRENT_SCHEMA_VERSION: i32 = MIGRATIONS.len() as i32;

/// Brings the kv schema up to date inside one transaction.
pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let version: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read user_version")?;

    if version > CURRENT_SCHEMA_VERSION {
        bail!("kv store schema v{version} was written by a newer release (this one knows v{CURRENT_SCHEMA_VERSION})");
    }
    if version == CURRENT_SCHEMA_VERSION {
        return Ok(());
    }

    let tx = conn.transaction().context("failed to begin migration")?;
    for (index, script) in MIGRATIONS.iter().enumerate().skip(version.max(0) as usize) {
        tx.execute_batch(script)
            .with_context(|| format!("schema v{} failed", index + 1))?;
    }
    tx.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)
        .context("failed to bump user_version")?;
    tx.commit().context("failed to commit migration")?;

    Ok(())
}
