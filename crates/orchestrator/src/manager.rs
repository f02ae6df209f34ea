#![forbid(unsafe_code)]

use crate::capture::{
    CaptureLauncher, CaptureOutcome, CaptureSpec, artifact_path, remove_artifacts,
};
use crate::domain::{CaptureDecision, UnitId, WorkloadUnit};
use crate::error::Error;
use crate::locator::ProcessLocator;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::collections::hash_map::Entry;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// Record of one running capture.
#[derive(Debug, Clone)]
pub struct CaptureDescriptor {
    pub id: UnitId,
    pub name: String,
    pub namespace: String,
    pub rotations: u32,
    pub pid: u32,
    pub output: PathBuf,
    cancel: CancellationToken,
}

impl CaptureDescriptor {
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[derive(Debug)]
enum Slot {
    /// A start owns the identity while the pod's process is looked up.
    Resolving(CancellationToken),
    Active(CaptureDescriptor),
}

impl Slot {
    fn cancel(&self) {
        match self {
            Slot::Resolving(cancel) => cancel.cancel(),
            Slot::Active(descriptor) => descriptor.cancel.cancel(),
        }
    }
}

/// Owns the set of running captures, at most one per unit identity.
///
/// The registry lock is only held to look up, insert or remove a slot. Process
/// lookup, subprocess supervision and artifact deletion all happen outside it.
pub struct CaptureManager {
    registry: Mutex<FxHashMap<UnitId, Slot>>,
    locator: Arc<dyn ProcessLocator + Send + Sync>,
    launcher: Arc<dyn CaptureLauncher + Send + Sync>,
    capture_dir: PathBuf,
    shutdown: CancellationToken,
    tasks: TaskTracker,
}

impl CaptureManager {
    pub fn new(
        capture_dir: impl Into<PathBuf>,
        locator: Arc<dyn ProcessLocator + Send + Sync>,
        launcher: Arc<dyn CaptureLauncher + Send + Sync>,
    ) -> Self {
        Self {
            registry: Mutex::new(FxHashMap::default()),
            locator,
            launcher,
            capture_dir: capture_dir.into(),
            shutdown: CancellationToken::new(),
            tasks: TaskTracker::new(),
        }
    }

    pub fn capture_dir(&self) -> &Path {
        &self.capture_dir
    }

    /// Apply a decision for `unit`. Repeated decisions are no-ops.
    pub async fn apply(&self, unit: &WorkloadUnit, decision: &CaptureDecision) {
        match decision {
            CaptureDecision::Start { rotations } => self.start(unit, *rotations).await,
            CaptureDecision::Stop => self.stop(&unit.id).await,
            CaptureDecision::Hold(_) => {}
        }
    }

    async fn start(&self, unit: &WorkloadUnit, rotations: u32) {
        let cancel = self.shutdown.child_token();
        match self.registry.lock().entry(unit.id.clone()) {
            Entry::Occupied(_) => {
                debug!(uid = %unit.id, pod = %unit.name, "capture already running");
                return;
            }
            Entry::Vacant(slot) => {
                slot.insert(Slot::Resolving(cancel.clone()));
            }
        }

        info!(
            uid = %unit.id,
            pod = %unit.name,
            namespace = %unit.namespace,
            rotations,
            "starting capture"
        );

        let pid = match self.resolve(unit).await {
            Ok(pid) => pid,
            Err(err) => {
                warn!(uid = %unit.id, pod = %unit.name, %err, "failed to find pod process");
                let mut registry = self.registry.lock();
                // A cancelled reservation was already removed by a stop.
                if !cancel.is_cancelled() {
                    registry.remove(&unit.id);
                }
                return;
            }
        };

        let spec = CaptureSpec {
            unit: unit.id.clone(),
            name: unit.name.clone(),
            namespace: unit.namespace.clone(),
            pid,
            rotations,
            output: artifact_path(&self.capture_dir, &unit.name),
        };

        {
            let mut registry = self.registry.lock();
            if cancel.is_cancelled() {
                debug!(uid = %unit.id, pod = %unit.name, "capture stopped before it started");
                return;
            }
            registry.insert(
                unit.id.clone(),
                Slot::Active(CaptureDescriptor {
                    id: unit.id.clone(),
                    name: unit.name.clone(),
                    namespace: unit.namespace.clone(),
                    rotations,
                    pid,
                    output: spec.output.clone(),
                    cancel: cancel.clone(),
                }),
            );
        }

        let launcher = self.launcher.clone();
        self.tasks.spawn(supervise(launcher, spec, cancel));
    }

    async fn resolve(&self, unit: &WorkloadUnit) -> Result<u32, Error> {
        let locator = self.locator.clone();
        let unit = unit.clone();
        tokio::task::spawn_blocking(move || locator.resolve(&unit)).await?
    }

    /// Stop the capture registered for `id`, if any, and delete its files.
    pub async fn stop(&self, id: &UnitId) {
        let Some(slot) = self.registry.lock().remove(id) else {
            return;
        };
        slot.cancel();

        let descriptor = match slot {
            Slot::Resolving(_) => {
                debug!(uid = %id, "abandoned capture start");
                return;
            }
            Slot::Active(descriptor) => descriptor,
        };

        info!(
            uid = %id,
            pod = %descriptor.name,
            namespace = %descriptor.namespace,
            "stopping capture"
        );

        let capture_dir = self.capture_dir.clone();
        let name = descriptor.name.clone();
        let removed =
            tokio::task::spawn_blocking(move || remove_artifacts(&capture_dir, &name)).await;
        match removed {
            Ok(Ok(paths)) => debug!(uid = %id, count = paths.len(), "capture files removed"),
            Ok(Err(err)) => warn!(uid = %id, %err, "failed to remove capture files"),
            Err(err) => warn!(uid = %id, %err, "capture file removal task failed"),
        }
    }

    pub fn is_capturing(&self, id: &UnitId) -> bool {
        matches!(self.registry.lock().get(id), Some(Slot::Active(_)))
    }

    pub fn descriptor(&self, id: &UnitId) -> Option<CaptureDescriptor> {
        match self.registry.lock().get(id) {
            Some(Slot::Active(descriptor)) => Some(descriptor.clone()),
            _ => None,
        }
    }

    /// Identities with a running capture.
    pub fn active_ids(&self) -> Vec<UnitId> {
        self.registry
            .lock()
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Active(_)))
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.registry
            .lock()
            .values()
            .filter(|slot| matches!(slot, Slot::Active(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cancel every capture and wait for their supervisors to finish.
    /// Capture files are left in place.
    pub async fn shutdown(&self) {
        let drained = {
            let mut registry = self.registry.lock();
            self.shutdown.cancel();
            registry.drain().count()
        };
        info!(count = drained, "stopping all captures");
        self.tasks.close();
        self.tasks.wait().await;
    }
}

async fn supervise(
    launcher: Arc<dyn CaptureLauncher + Send + Sync>,
    spec: CaptureSpec,
    cancel: CancellationToken,
) {
    match launcher.run(&spec, cancel).await {
        Ok(CaptureOutcome::Stopped) => {
            info!(uid = %spec.unit, pod = %spec.name, "capture stopped");
        }
        Ok(CaptureOutcome::Completed) => {
            info!(uid = %spec.unit, pod = %spec.name, "capture exited");
        }
        Ok(CaptureOutcome::Failed { code }) => {
            error!(uid = %spec.unit, pod = %spec.name, ?code, "capture failed");
        }
        Err(err) => {
            error!(uid = %spec.unit, pod = %spec.name, %err, "capture failed");
        }
    }
}
