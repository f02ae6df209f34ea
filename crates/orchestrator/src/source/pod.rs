#![forbid(unsafe_code)]

use crate::domain::{ContainerStatus, WorkloadUnit};
use k8s_openapi::api::core::v1::Pod;

/// Snapshot a pod as a workload unit. Pods without a UID or a name are not
/// usable and yield `None`.
pub fn workload_unit(pod: &Pod) -> Option<WorkloadUnit> {
    let metadata = &pod.metadata;
    let uid = metadata.uid.as_deref()?;
    let name = metadata.name.clone()?;
    let namespace = metadata.namespace.clone().unwrap_or_default();

    let mut unit = WorkloadUnit::new(uid, name, namespace);
    unit.annotations = metadata.annotations.clone().unwrap_or_default();
    unit.containers = pod
        .status
        .as_ref()
        .and_then(|status| status.container_statuses.as_ref())
        .map(|statuses| {
            statuses
                .iter()
                .map(|cs| ContainerStatus::new(cs.name.clone(), cs.container_id.clone()))
                .collect()
        })
        .unwrap_or_default();
    Some(unit)
}
