#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Stable identity of a workload unit (the pod UID).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(Arc<str>);

impl UnitId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UnitId").field(&self.0).finish()
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerStatus {
    pub name: String,
    /// Runtime-qualified id, `<runtime>://<id>`. Absent until the container
    /// has been created by the runtime.
    pub container_id: Option<String>,
}

impl ContainerStatus {
    pub fn new(name: impl Into<String>, container_id: Option<String>) -> Self {
        Self {
            name: name.into(),
            container_id,
        }
    }

    /// Split the container id into its runtime and opaque id.
    ///
    /// Returns `None` when the id is missing, has no `://` separator, or the
    /// opaque part is empty.
    pub fn runtime_id(&self) -> Option<(&str, &str)> {
        let (runtime, id) = self.container_id.as_deref()?.split_once("://")?;
        if id.is_empty() {
            return None;
        }
        Some((runtime, id))
    }
}

/// Read-only snapshot of a pod as delivered by the event source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadUnit {
    pub id: UnitId,
    pub name: String,
    pub namespace: String,
    pub annotations: BTreeMap<String, String>,
    pub containers: Vec<ContainerStatus>,
}

impl WorkloadUnit {
    pub fn new(id: impl AsRef<str>, name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            id: UnitId::new(id),
            name: name.into(),
            namespace: namespace.into(),
            annotations: BTreeMap::new(),
            containers: Vec::new(),
        }
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    pub fn with_container(mut self, name: impl Into<String>, container_id: impl Into<String>) -> Self {
        self.containers
            .push(ContainerStatus::new(name, Some(container_id.into())));
        self
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }

    /// The container whose process is used to enter the pod's network
    /// namespace. All containers of a pod share it, so the first one will do.
    pub fn primary_container(&self) -> Option<&ContainerStatus> {
        self.containers.first()
    }
}
