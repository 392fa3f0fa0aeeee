use anyhow::{bail, Context, Result};
use log::warn;
use rusqlite::{params, Connection, OptionalExtension, Transaction};

use crate::session::CHECKPOINT_VERSION;

const CURRENT_SCHEMA_VERSION: i32 = 2;
const FORMAT_KEY: &str = "checkpoint_format";

/// Bring the table layout up to date, then make sure the stored blobs were
/// written in the checkpoint format this build reads.
pub fn prepare_store(conn: &mut Connection) -> Result<()> {
    run_migrations(conn)?;
    let purged = reconcile_checkpoint_format(conn)?;
    if purged > 0 {
        warn!("Dropped {purged} checkpoint(s) written in an older format");
    }
    Ok(())
}

fn run_migrations(conn: &mut Connection) -> Result<()> {
    let mut version: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read user_version pragma")?;

    if version > CURRENT_SCHEMA_VERSION {
        bail!(
            "checkpoint store schema ({}) is newer than supported schema ({})",
            version,
            CURRENT_SCHEMA_VERSION
        );
    }

    if version == CURRENT_SCHEMA_VERSION {
        return Ok(());
    }

    let tx = conn
        .transaction()
        .context("failed to open migration transaction")?;

    while version < CURRENT_SCHEMA_VERSION {
        let next_version = version + 1;
        apply_migration(&tx, next_version)
            .with_context(|| format!("migration to version {next_version} failed"))?;
        version = next_version;
    }

    tx.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)
        .context("failed to update user_version pragma")?;
    tx.commit().context("failed to commit migrations")?;

    Ok(())
}

fn apply_migration(tx: &Transaction<'_>, version: i32) -> Result<()> {
    let sql = match version {
        1 => include_str!("schemas/schema_v1.sql"),
        2 => include_str!("schemas/schema_v2.sql"),
        _ => bail!("unknown migration target version: {version}"),
    };
    tx.execute_batch(sql)
        .with_context(|| format!("failed to execute schema_v{version}.sql"))
}

/// Compare the recorded checkpoint format with [`CHECKPOINT_VERSION`].
///
/// A store stamped by a newer build is refused so its blobs are not
/// overwritten. Blobs from an older format can never be restored, so they
/// are deleted and the stamp moves forward. Returns how many were deleted.
fn reconcile_checkpoint_format(conn: &mut Connection) -> Result<usize> {
    let current = i64::from(CHECKPOINT_VERSION);
    let tx = conn
        .transaction()
        .context("failed to open checkpoint format transaction")?;

    let recorded: Option<i64> = tx
        .query_row(
            "SELECT value FROM store_meta WHERE name = ?1",
            params![FORMAT_KEY],
            |row| row.get(0),
        )
        .optional()
        .context("failed to read checkpoint format")?;

    let purged = match recorded {
        Some(format) if format == current => return Ok(0),
        Some(format) if format > current => bail!(
            "checkpoint store holds format {format}, newer than supported format {current}"
        ),
        Some(_) => tx
            .execute("DELETE FROM checkpoints", [])
            .context("failed to drop stale checkpoints")?,
        None => 0,
    };

    tx.execute(
        "INSERT INTO store_meta (name, value) VALUES (?1, ?2)
         ON CONFLICT(name) DO UPDATE SET value = excluded.value",
        params![FORMAT_KEY, current],
    )
    .context("failed to record checkpoint format")?;
    tx.commit().context("failed to commit checkpoint format")?;

    Ok(purged)
}
