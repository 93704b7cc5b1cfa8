//! # Buffer Refreshers
//!
//! Ways to repopulate the buffer tables from the ERP.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  RELAY_REFRESH_SCRIPT=...   → SqlScriptRefresher                        │
//! │                               script runs in ONE transaction            │
//! │                                                                         │
//! │  RELAY_REFRESH_COMMAND=...  → CommandRefresher                          │
//! │                               exporter process, exit 0 = success        │
//! │                                                                         │
//! │  (neither)                  → UnconfiguredRefresher                     │
//! │                               every refresh fails                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A refresher never touches sync state of rows it did not create; that
//! contract belongs to the script or exporter.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use relay_db::Database;

use crate::error::{SyncError, SyncResult};

/// Populates the buffer tables from the ERP.
#[async_trait]
pub trait BufferRefresher: Send + Sync {
    /// Runs one refresh. Returns a short human readable summary.
    async fn refresh(&self) -> SyncResult<String>;

    /// What this refresher runs, for logs.
    fn describe(&self) -> String;
}

// =============================================================================
// SQL Script
// =============================================================================

/// Runs a SQL script against the buffer store.
pub struct SqlScriptRefresher {
    db: Database,
    script: String,
}

impl SqlScriptRefresher {
    /// Creates a refresher running `script` on `db`.
    pub fn new(db: Database, script: impl Into<String>) -> Self {
        SqlScriptRefresher {
            db,
            script: script.into(),
        }
    }
}

#[async_trait]
impl BufferRefresher for SqlScriptRefresher {
    async fn refresh(&self) -> SyncResult<String> {
        let affected = self
            .db
            .apply_refresh_script(&self.script)
            .await
            .map_err(|e| SyncError::UpstreamRefreshFailure(e.to_string()))?;

        Ok(format!("refresh script applied ({} rows)", affected))
    }

    fn describe(&self) -> String {
        format!("sql script ({} bytes)", self.script.len())
    }
}

// =============================================================================
// External Command
// =============================================================================

/// Runs an external exporter process directly, without a shell.
pub struct CommandRefresher {
    program: String,
    args: Vec<String>,
}

impl CommandRefresher {
    /// Creates a refresher running `program` with `args`.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        CommandRefresher {
            program: program.into(),
            args,
        }
    }
}

#[async_trait]
impl BufferRefresher for CommandRefresher {
    async fn refresh(&self) -> SyncResult<String> {
        debug!(program = %self.program, args = ?self.args, "Spawning refresh command");

        // kill_on_drop: a timed out or abandoned refresh must not keep running.
        let output = Command::new(&self.program)
            .args(&self.args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                SyncError::UpstreamRefreshFailure(format!("failed to start {}: {}", self.program, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(
                program = %self.program,
                status = %output.status,
                stderr = %stderr.trim(),
                "Refresh command failed"
            );
            return Err(SyncError::UpstreamRefreshFailure(format!(
                "{} exited with {}",
                self.program, output.status
            )));
        }

        Ok(format!("{} completed", self.program))
    }

    fn describe(&self) -> String {
        if self.args.is_empty() {
            format!("command `{}`", self.program)
        } else {
            format!("command `{} {}`", self.program, self.args.join(" "))
        }
    }
}

// =============================================================================
// Unconfigured
// =============================================================================

/// Stand-in used when no refresh source is configured.
pub struct UnconfiguredRefresher;

#[async_trait]
impl BufferRefresher for UnconfiguredRefresher {
    async fn refresh(&self) -> SyncResult<String> {
        Err(SyncError::UpstreamRefreshFailure(
            "no refresh source configured (set RELAY_REFRESH_SCRIPT or RELAY_REFRESH_COMMAND)"
                .to_string(),
        ))
    }

    fn describe(&self) -> String {
        "unconfigured".to_string()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use relay_db::DbConfig;

    #[tokio::test]
    async fn test_sql_script_refresher() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let refresher = SqlScriptRefresher::new(
            db.clone(),
            "INSERT INTO buffer_customers (id, company_name) VALUES ('C001', 'Acme');",
        );

        let summary = refresher.refresh().await.unwrap();
        assert!(summary.contains("1 rows"));
        assert_eq!(db.customers().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_broken_script_is_upstream_failure() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let refresher = SqlScriptRefresher::new(db, "EXEC sp_sync_all_to_buffer");

        assert!(matches!(
            refresher.refresh().await,
            Err(SyncError::UpstreamRefreshFailure(_))
        ));
    }

    #[test]
    fn test_command_description() {
        let refresher =
            CommandRefresher::new("erp-export", vec!["--target".into(), "buffer".into()]);
        assert_eq!(refresher.describe(), "command `erp-export --target buffer`");
        assert_eq!(CommandRefresher::new("erp-export", vec![]).describe(), "command `erp-export`");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_exit_status() {
        let ok = CommandRefresher::new("true", vec![]);
        assert!(ok.refresh().await.is_ok());

        let failing = CommandRefresher::new("false", vec![]);
        assert!(matches!(
            failing.refresh().await,
            Err(SyncError::UpstreamRefreshFailure(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_program_is_upstream_failure() {
        let missing = CommandRefresher::new("relay-no-such-exporter-binary", vec![]);
        assert!(matches!(
            missing.refresh().await,
            Err(SyncError::UpstreamRefreshFailure(_))
        ));
    }

    #[tokio::test]
    async fn test_unconfigured_always_fails() {
        assert!(UnconfiguredRefresher.refresh().await.is_err());
        assert_eq!(UnconfiguredRefresher.describe(), "unconfigured");
    }
}
