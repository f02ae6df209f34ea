#![forbid(unsafe_code)]

use crate::capture::{CaptureLauncher, NsenterLauncher};
use crate::domain::{CaptureDecision, UnitId, WorkloadUnit};
use crate::locator::{ProcessLocator, ProcfsLocator};
use crate::manager::CaptureManager;
use crate::reconciler::{AnnotationReconciler, Reconciler};
use crate::source::UnitEvent;
use config::Config;
use rustc_hash::FxHashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct Services {
    pub reconciler: Box<dyn Reconciler + Send + Sync>,
    pub locator: Arc<dyn ProcessLocator + Send + Sync>,
    pub launcher: Arc<dyn CaptureLauncher + Send + Sync>,
}

impl Services {
    /// Production services: annotation reconciler, procfs locator and
    /// nsenter/tcpdump launcher.
    pub fn from_config(config: &Config) -> Self {
        Self {
            reconciler: Box::new(AnnotationReconciler::new(config)),
            locator: Arc::new(ProcfsLocator::new(config)),
            launcher: Arc::new(NsenterLauncher::new(config)),
        }
    }
}

pub enum ControlEvent {
    DumpStatus,
}

/// Feeds pod events through the reconciler into the capture manager, one
/// event at a time and in arrival order.
pub struct Controller {
    config: Config,
    reconciler: Box<dyn Reconciler + Send + Sync>,
    manager: Arc<CaptureManager>,
    /// Identities observed since the current re-list started.
    resync: Option<FxHashSet<UnitId>>,
    synced: bool,
}

impl Controller {
    pub fn new(config: Config, services: Services) -> Self {
        let manager = CaptureManager::new(
            config.capture.capture_dir.clone(),
            services.locator,
            services.launcher,
        );
        Self {
            config,
            reconciler: services.reconciler,
            manager: Arc::new(manager),
            resync: None,
            synced: false,
        }
    }

    pub fn manager(&self) -> &Arc<CaptureManager> {
        &self.manager
    }

    /// Whether the initial pod list has been fully delivered.
    pub fn is_synced(&self) -> bool {
        self.synced
    }

    pub async fn handle(&mut self, event: UnitEvent) {
        match event {
            UnitEvent::Observed(unit) => {
                if let Some(seen) = &mut self.resync {
                    seen.insert(unit.id.clone());
                }
                self.observe(&unit).await;
            }
            UnitEvent::Removed(unit) => {
                // A deleted pod can't want a capture, whatever it was annotated with.
                self.manager.apply(&unit, &CaptureDecision::Stop).await;
            }
            UnitEvent::ResyncStarted => {
                debug!("pod re-list started");
                self.resync = Some(FxHashSet::default());
            }
            UnitEvent::ResyncDone => self.finish_resync().await,
        }
    }

    async fn observe(&self, unit: &WorkloadUnit) {
        let decision = self.reconciler.decide(unit);
        if let CaptureDecision::Hold(reason) = &decision {
            warn!(uid = %unit.id, pod = %unit.name, %reason, "ignoring invalid capture annotation");
        }
        self.manager.apply(unit, &decision).await;
    }

    async fn finish_resync(&mut self) {
        if let Some(seen) = self.resync.take() {
            // Pods deleted while the watch was down never get a delete event.
            for id in self.manager.active_ids() {
                if !seen.contains(&id) {
                    info!(uid = %id, "pod is gone after re-list");
                    self.manager.stop(&id).await;
                }
            }
        }
        if !self.synced {
            self.synced = true;
            info!("controller started, watching pods");
        }
    }

    /// Process events until `cancel` fires or both channels close, then stop
    /// every capture.
    pub async fn run_until(
        &mut self,
        cancel: CancellationToken,
        mut events: mpsc::Receiver<UnitEvent>,
        mut control_rx: mpsc::UnboundedReceiver<ControlEvent>,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("shutdown requested");
                    break;
                }
                Some(event) = events.recv() => {
                    self.handle(event).await;
                }
                Some(event) = control_rx.recv() => {
                    self.handle_control(event);
                }
                else => {
                    debug!("event channels closed");
                    break;
                }
            }
        }

        self.manager.shutdown().await;
    }

    fn handle_control(&self, event: ControlEvent) {
        match event {
            ControlEvent::DumpStatus => self.dump_status(),
        }
    }

    fn dump_status(&self) {
        info!(?self.config, "current config");
        info!(
            synced = self.synced,
            active = self.manager.len(),
            "capture summary"
        );
        for id in self.manager.active_ids() {
            if let Some(descriptor) = self.manager.descriptor(&id) {
                info!(
                    uid = %descriptor.id,
                    pod = %descriptor.name,
                    namespace = %descriptor.namespace,
                    pid = descriptor.pid,
                    rotations = descriptor.rotations,
                    output = %descriptor.output.display(),
                    "active capture"
                );
            }
        }
    }
}
