#![forbid(unsafe_code)]

mod procfs_locator;

pub use procfs_locator::ProcfsLocator;

use crate::domain::WorkloadUnit;
use crate::error::Error;

pub trait ProcessLocator: Send + Sync {
    /// Resolve a unit to the host pid of a process inside its primary
    /// container. Blocking; callers run it off the async executor.
    fn resolve(&self, unit: &WorkloadUnit) -> Result<u32, Error>;
}

/// Opaque container id of the unit's primary container.
pub fn container_id(unit: &WorkloadUnit) -> Result<&str, Error> {
    let status = unit
        .primary_container()
        .ok_or_else(|| Error::MalformedIdentity {
            unit: unit.id.clone(),
            reason: "pod has no container status",
        })?;
    let (_, id) = status.runtime_id().ok_or_else(|| Error::MalformedIdentity {
        unit: unit.id.clone(),
        reason: "container id is not of the form <runtime>://<id>",
    })?;
    Ok(id)
}
