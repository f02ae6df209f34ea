#![forbid(unsafe_code)]

use crate::capture::{CaptureLauncher, CaptureOutcome, CaptureSpec};
use crate::error::Error;
use async_trait::async_trait;
use config::Config;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Runs tcpdump inside the target's network namespace through nsenter.
#[derive(Debug, Clone)]
pub struct NsenterLauncher {
    nsenter: PathBuf,
    tcpdump: PathBuf,
    user: String,
    file_size: u32,
    stop_grace: Duration,
}

impl NsenterLauncher {
    pub fn new(config: &Config) -> Self {
        let capture = &config.capture;
        Self {
            nsenter: capture.nsenter.clone(),
            tcpdump: capture.tcpdump.clone(),
            user: capture.user.clone(),
            file_size: capture.file_size,
            stop_grace: capture.stop_grace,
        }
    }

    /// Arguments passed to nsenter for `spec`.
    pub fn args(&self, spec: &CaptureSpec) -> Vec<OsString> {
        vec![
            "-t".into(),
            spec.pid.to_string().into(),
            "-n".into(),
            "--".into(),
            self.tcpdump.clone().into(),
            "-Z".into(),
            self.user.clone().into(),
            "-C".into(),
            self.file_size.to_string().into(),
            "-W".into(),
            spec.rotations.to_string().into(),
            "-w".into(),
            spec.output.clone().into(),
        ]
    }

    pub fn command(&self, spec: &CaptureSpec) -> Command {
        let mut command = Command::new(&self.nsenter);
        command
            .args(self.args(spec))
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl CaptureLauncher for NsenterLauncher {
    async fn run(
        &self,
        spec: &CaptureSpec,
        cancel: CancellationToken,
    ) -> Result<CaptureOutcome, Error> {
        if cancel.is_cancelled() {
            debug!(uid = %spec.unit, "capture cancelled before spawn");
            return Ok(CaptureOutcome::Stopped);
        }

        let mut command = self.command(spec);
        debug!(command = ?command.as_std(), "running capture");
        let child = command.spawn().map_err(Error::Spawn)?;
        info!(
            uid = %spec.unit,
            pod = %spec.name,
            namespace = %spec.namespace,
            child = child.id(),
            "capture running"
        );

        wait_or_terminate(child, cancel, self.stop_grace).await
    }
}

/// Wait for `child` to exit. If `cancel` fires first, send SIGTERM, and
/// SIGKILL once `grace` has passed.
pub async fn wait_or_terminate(
    mut child: Child,
    cancel: CancellationToken,
    grace: Duration,
) -> Result<CaptureOutcome, Error> {
    let status = tokio::select! {
        status = child.wait() => Some(status),
        _ = cancel.cancelled() => None,
    };

    match status {
        Some(status) => {
            let status = status.map_err(Error::Wait)?;
            if status.success() {
                Ok(CaptureOutcome::Completed)
            } else {
                Ok(CaptureOutcome::Failed {
                    code: status.code(),
                })
            }
        }
        None => {
            terminate(&mut child, grace).await?;
            Ok(CaptureOutcome::Stopped)
        }
    }
}

async fn terminate(child: &mut Child, grace: Duration) -> Result<(), Error> {
    // `None` means the child was already reaped.
    let Some(id) = child.id() else {
        return Ok(());
    };
    let pid = i32::try_from(id).map_err(|_| Error::InvalidPid(id))?;

    if let Err(err) = kill(Pid::from_raw(pid), Signal::SIGTERM) {
        warn!(pid, %err, "failed to send SIGTERM to capture");
    } else if let Ok(status) = tokio::time::timeout(grace, child.wait()).await {
        status.map_err(Error::Wait)?;
        return Ok(());
    } else {
        warn!(pid, ?grace, "capture did not exit after SIGTERM, killing it");
    }

    child.kill().await.map_err(Error::Wait)
}
