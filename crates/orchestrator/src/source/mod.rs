#![forbid(unsafe_code)]

mod pod;
mod pod_watcher;

pub use pod::workload_unit;
pub use pod_watcher::PodWatcher;

use crate::domain::WorkloadUnit;

/// Notification about a pod scheduled on this node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitEvent {
    /// The pod was created or changed, or is being replayed by a re-list.
    Observed(WorkloadUnit),
    /// The pod was deleted.
    Removed(WorkloadUnit),
    /// A full re-list begins; the `Observed` events up to `ResyncDone` are
    /// the complete set of pods on the node.
    ResyncStarted,
    ResyncDone,
}
