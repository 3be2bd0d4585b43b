//! Optional lifecycle management for the backend process.

use anyhow::{Context, Result};
use tokio::process::{Child, Command};
use tracing::{info, warn};

/// The backend process this client spawned, if any.
///
/// The synchronization engine never looks at this; it only talks to
/// whatever is listening on the configured URLs.
pub struct BackendProcess {
    child: Child,
}

impl BackendProcess {
    /// Spawns `command` (split on whitespace) with kill-on-drop so the
    /// backend never outlives the client.
    pub fn spawn(command: &str) -> Result<Self> {
        let mut parts = command.split_whitespace();
        let program = parts.next().context("empty backend command")?;
        let child = Command::new(program)
            .args(parts)
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn backend: {command}"))?;
        info!(%command, pid = ?child.id(), "backend process started");
        Ok(Self { child })
    }

    pub async fn shutdown(mut self) {
        if let Err(e) = self.child.start_kill() {
            warn!(error = %e, "backend process already gone");
        }
        let _ = self.child.wait().await;
        info!("backend process terminated");
    }
}
