#![forbid(unsafe_code)]

mod artifacts;
mod launcher;

pub use artifacts::{artifact_path, artifact_pattern, remove_artifacts};
pub use launcher::{NsenterLauncher, wait_or_terminate};

use crate::domain::UnitId;
use crate::error::Error;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Everything needed to run one capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSpec {
    pub unit: UnitId,
    pub name: String,
    pub namespace: String,
    /// Host pid whose network namespace is entered.
    pub pid: u32,
    pub rotations: u32,
    pub output: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Terminated because the capture was cancelled.
    Stopped,
    /// Exited by itself with a success status.
    Completed,
    /// Exited by itself with a failure status. `code` is `None` when it was
    /// killed by a signal nobody here sent.
    Failed { code: Option<i32> },
}

#[async_trait]
pub trait CaptureLauncher: Send + Sync {
    /// Run the capture until it exits or `cancel` fires.
    ///
    /// A token cancelled before this is called must still be honored.
    async fn run(&self, spec: &CaptureSpec, cancel: CancellationToken)
    -> Result<CaptureOutcome, Error>;
}
