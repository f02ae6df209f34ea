#![forbid(unsafe_code)]

use crate::domain::UnitId;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed container identity for pod {unit}: {reason}")]
    MalformedIdentity { unit: UnitId, reason: &'static str },

    #[error("no host process belongs to container {container_id}")]
    PidNotFound { container_id: String },

    #[error("failed to read host process tree: {0}")]
    Procfs(#[from] procfs::ProcError),

    #[error("process lookup task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("failed to spawn capture: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("failed to wait for capture: {0}")]
    Wait(#[source] std::io::Error),

    #[error("capture process id {0} does not fit a signal target")]
    InvalidPid(u32),

    #[error("invalid artifact pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}
