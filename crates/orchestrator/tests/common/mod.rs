#![allow(dead_code)]

use async_trait::async_trait;
use orchestrator::locator::container_id;
use orchestrator::{CaptureLauncher, CaptureOutcome, CaptureSpec, Error, ProcessLocator, WorkloadUnit};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

pub const KEY: &str = "tcpdump.antrea.io";

/// Resolves container ids from a fixed table.
#[derive(Debug, Default)]
pub struct StaticLocator {
    pids: HashMap<String, u32>,
    calls: AtomicUsize,
}

impl StaticLocator {
    pub fn new(entries: &[(&str, u32)]) -> Self {
        Self {
            pids: entries
                .iter()
                .map(|(id, pid)| (id.to_string(), *pid))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ProcessLocator for StaticLocator {
    fn resolve(&self, unit: &WorkloadUnit) -> Result<u32, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let id = container_id(unit)?;
        self.pids
            .get(id)
            .copied()
            .ok_or_else(|| Error::PidNotFound {
                container_id: id.to_owned(),
            })
    }
}

/// Blocks inside `resolve` until the test lets it go.
pub struct GatedLocator {
    pub entered: Arc<Barrier>,
    pub release: Arc<Barrier>,
    pub pid: u32,
}

impl GatedLocator {
    pub fn new(pid: u32) -> Self {
        Self {
            entered: Arc::new(Barrier::new(2)),
            release: Arc::new(Barrier::new(2)),
            pid,
        }
    }
}

impl ProcessLocator for GatedLocator {
    fn resolve(&self, _unit: &WorkloadUnit) -> Result<u32, Error> {
        self.entered.wait();
        self.release.wait();
        Ok(self.pid)
    }
}

/// Records every launch. Runs until cancelled unless told to exit at once.
#[derive(Debug, Default)]
pub struct RecordingLauncher {
    launches: Mutex<Vec<CaptureSpec>>,
    stopped: AtomicUsize,
    exit_with: Option<CaptureOutcome>,
}

impl RecordingLauncher {
    pub fn exiting_with(outcome: CaptureOutcome) -> Self {
        Self {
            exit_with: Some(outcome),
            ..Default::default()
        }
    }

    pub fn launches(&self) -> Vec<CaptureSpec> {
        self.launches.lock().unwrap().clone()
    }

    pub fn stopped(&self) -> usize {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptureLauncher for RecordingLauncher {
    async fn run(
        &self,
        spec: &CaptureSpec,
        cancel: CancellationToken,
    ) -> Result<CaptureOutcome, Error> {
        self.launches.lock().unwrap().push(spec.clone());
        if let Some(outcome) = self.exit_with {
            return Ok(outcome);
        }
        cancel.cancelled().await;
        self.stopped.fetch_add(1, Ordering::SeqCst);
        Ok(CaptureOutcome::Stopped)
    }
}

pub fn pod(uid: &str, name: &str, container: &str) -> WorkloadUnit {
    WorkloadUnit::new(uid, name, "default").with_container("app", format!("containerd://{container}"))
}

pub async fn wait_for(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not met in time");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
