//! Single-writer run lock.
//!
//! The incremental watermark check is read-then-write, so two runs against
//! the same fact store must never overlap. The lock is a row in `run_lock`;
//! inserting it is the acquisition and deleting it the release.

use super::Warehouse;
use crate::error::{DataError, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

/// Name of the lock row guarding fact-store runs.
pub const PIPELINE_LOCK: &str = "fact_daily_market";

/// Held run lock. Released on [`RunLock::release`] or when dropped.
#[derive(Debug)]
pub struct RunLock<'a> {
    conn: &'a Connection,
    owner: String,
    released: bool,
}

impl RunLock<'_> {
    /// Owner recorded for this lock.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Release the lock, reporting any database error.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.delete_row()?;
        tracing::debug!(owner = %self.owner, "released run lock");
        Ok(())
    }

    fn delete_row(&self) -> Result<()> {
        self.conn.execute(
            "DELETE FROM run_lock WHERE lock_name = ?1 AND owner = ?2",
            params![PIPELINE_LOCK, self.owner],
        )?;
        Ok(())
    }
}

impl Drop for RunLock<'_> {
    fn drop(&mut self) {
        if !self.released
            && let Err(e) = self.delete_row()
        {
            tracing::warn!(owner = %self.owner, error = %e, "failed to release run lock");
        }
    }
}

impl Warehouse {
    /// Acquire the pipeline run lock.
    ///
    /// Fails with [`DataError::LockHeld`] when another run holds it.
    pub fn acquire_run_lock(&self, owner: &str) -> Result<RunLock<'_>> {
        let acquired_at = Utc::now().to_rfc3339();
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO run_lock (lock_name, owner, acquired_at) VALUES (?1, ?2, ?3)",
            params![PIPELINE_LOCK, owner, acquired_at],
        )?;

        if inserted == 0 {
            let (holder, since) = self.run_lock_holder()?.unwrap_or_default();
            return Err(DataError::LockHeld {
                name: PIPELINE_LOCK.to_string(),
                owner: holder,
                acquired_at: since,
            });
        }

        tracing::debug!(owner, "acquired run lock");
        Ok(RunLock {
            conn: &self.conn,
            owner: owner.to_string(),
            released: false,
        })
    }

    /// Current holder of the run lock as `(owner, acquired_at)`.
    pub fn run_lock_holder(&self) -> Result<Option<(String, String)>> {
        let holder = self
            .conn
            .query_row(
                "SELECT owner, acquired_at FROM run_lock WHERE lock_name = ?1",
                params![PIPELINE_LOCK],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(holder)
    }

    /// Remove a lock left behind by a crashed run.
    ///
    /// Returns `true` when a lock row was removed.
    pub fn force_release_run_lock(&self) -> Result<bool> {
        let removed = self.conn.execute(
            "DELETE FROM run_lock WHERE lock_name = ?1",
            params![PIPELINE_LOCK],
        )?;
        if removed > 0 {
            tracing::warn!("force-released run lock");
        }
        Ok(removed > 0)
    }
}
