//! Requisition hook that runs an external executable
//!
//! Invoked as `<hook> <status> <link>`. Exit status and output are logged and
//! never propagated. A hook that outlives its timeout is killed.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::domain::Requisition;
use crate::ports::RequisitionHook;

pub const DEFAULT_HOOK_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct CommandHook {
    program: PathBuf,
    timeout: Duration,
}

impl CommandHook {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: DEFAULT_HOOK_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl RequisitionHook for CommandHook {
    async fn notify(&self, requisition: &Requisition) {
        let run = Command::new(&self.program)
            .arg(requisition.status.code())
            .arg(&requisition.link)
            .kill_on_drop(true)
            .output();

        let Ok(output) = tokio::time::timeout(self.timeout, run).await else {
            tracing::warn!(
                hook = %self.program.display(),
                timeout_secs = self.timeout.as_secs_f64(),
                "requisition hook timed out and was killed"
            );
            return;
        };

        match output {
            Ok(output) if output.status.success() => {
                tracing::debug!(
                    hook = %self.program.display(),
                    stdout = %String::from_utf8_lossy(&output.stdout).trim(),
                    "requisition hook finished"
                );
            }
            Ok(output) => {
                tracing::warn!(
                    hook = %self.program.display(),
                    status = %output.status,
                    stdout = %String::from_utf8_lossy(&output.stdout).trim(),
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "requisition hook failed"
                );
            }
            Err(e) => {
                tracing::warn!(
                    hook = %self.program.display(),
                    error = %e,
                    "failed to run requisition hook"
                );
            }
        }
    }
}
