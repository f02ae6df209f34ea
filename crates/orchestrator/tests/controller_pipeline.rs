#![forbid(unsafe_code)]

mod common;

use common::{KEY, RecordingLauncher, StaticLocator, pod, wait_for};
use config::Config;
use orchestrator::{
    AnnotationReconciler, ControlEvent, Controller, ProcfsLocator, Services, UnitEvent, UnitId,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn config(capture_dir: &Path, proc_root: &Path) -> Config {
    let mut config = Config::default();
    config.capture.capture_dir = capture_dir.to_owned();
    config.capture.proc_root = proc_root.to_owned();
    config
}

fn controller(
    config: &Config,
    locator: Arc<StaticLocator>,
    launcher: Arc<RecordingLauncher>,
) -> Controller {
    let services = Services {
        reconciler: Box::new(AnnotationReconciler::new(config)),
        locator,
        launcher,
    };
    Controller::new(config.clone(), services)
}

#[tokio::test]
async fn annotated_pod_is_captured_until_annotation_removed() {
    let captures = tempdir().unwrap();
    let proc_root = tempdir().unwrap();
    let process = proc_root.path().join("4242");
    fs::create_dir_all(&process).unwrap();
    fs::write(
        process.join("cgroup"),
        "0::/kubepods.slice/kubepods-besteffort.slice/cri-containerd-abc123.scope\n",
    )
    .unwrap();

    let config = config(captures.path(), proc_root.path());
    let launcher = Arc::new(RecordingLauncher::default());
    let services = Services {
        reconciler: Box::new(AnnotationReconciler::new(&config)),
        locator: Arc::new(ProcfsLocator::new(&config)),
        launcher: launcher.clone(),
    };
    let mut controller = Controller::new(config, services);
    let id = UnitId::new("u1");

    let annotated = pod("u1", "pod-a", "abc123").with_annotation(KEY, "3");
    controller.handle(UnitEvent::Observed(annotated)).await;

    let descriptor = controller.manager().descriptor(&id).expect("capture registered");
    assert_eq!(descriptor.rotations, 3);
    assert_eq!(descriptor.pid, 4242);
    assert_eq!(descriptor.output, captures.path().join("capture-pod-a.pcap"));

    wait_for(|| launcher.launches().len() == 1).await;
    let launch = &launcher.launches()[0];
    assert_eq!(launch.pid, 4242);
    assert_eq!(launch.rotations, 3);
    assert_eq!(launch.name, "pod-a");

    for i in 0..3 {
        fs::write(captures.path().join(format!("capture-pod-a.pcap{i}")), b"pcap").unwrap();
    }

    controller
        .handle(UnitEvent::Observed(pod("u1", "pod-a", "abc123")))
        .await;

    assert!(!controller.manager().is_capturing(&id));
    for i in 0..3 {
        assert!(!captures.path().join(format!("capture-pod-a.pcap{i}")).exists());
    }
    wait_for(|| launcher.stopped() == 1).await;
}

#[tokio::test]
async fn deleted_pod_is_stopped_whatever_its_annotation() {
    let captures = tempdir().unwrap();
    let config = config(captures.path(), Path::new("/nonexistent"));
    let launcher = Arc::new(RecordingLauncher::default());
    let mut controller = controller(
        &config,
        Arc::new(StaticLocator::new(&[("abc", 10)])),
        launcher.clone(),
    );

    let annotated = pod("u1", "pod-a", "abc").with_annotation(KEY, "3");
    controller.handle(UnitEvent::Observed(annotated.clone())).await;
    assert!(controller.manager().is_capturing(&annotated.id));

    controller.handle(UnitEvent::Removed(annotated.clone())).await;
    assert!(controller.manager().is_empty());
    wait_for(|| launcher.stopped() == 1).await;
}

#[tokio::test]
async fn malformed_annotation_keeps_running_capture() {
    let captures = tempdir().unwrap();
    let config = config(captures.path(), Path::new("/nonexistent"));
    let launcher = Arc::new(RecordingLauncher::default());
    let mut controller = controller(
        &config,
        Arc::new(StaticLocator::new(&[("abc", 10)])),
        launcher.clone(),
    );

    let unit = pod("u1", "pod-a", "abc");
    controller
        .handle(UnitEvent::Observed(unit.clone().with_annotation(KEY, "3")))
        .await;
    controller
        .handle(UnitEvent::Observed(unit.clone().with_annotation(KEY, "three")))
        .await;
    assert!(controller.manager().is_capturing(&unit.id));

    // A malformed value alone never starts anything.
    let other = pod("u2", "pod-b", "abc");
    controller
        .handle(UnitEvent::Observed(other.clone().with_annotation(KEY, "-2")))
        .await;
    assert!(!controller.manager().is_capturing(&other.id));
}

#[tokio::test]
async fn replayed_events_are_idempotent() {
    let captures = tempdir().unwrap();
    let config = config(captures.path(), Path::new("/nonexistent"));
    let locator = Arc::new(StaticLocator::new(&[("abc", 10)]));
    let launcher = Arc::new(RecordingLauncher::default());
    let mut controller = controller(&config, locator.clone(), launcher.clone());

    let unit = pod("u1", "pod-a", "abc").with_annotation(KEY, "2");
    for _ in 0..5 {
        controller.handle(UnitEvent::Observed(unit.clone())).await;
    }
    for _ in 0..3 {
        controller.handle(UnitEvent::Removed(unit.clone())).await;
    }

    assert_eq!(locator.calls(), 1);
    assert!(controller.manager().is_empty());
    wait_for(|| launcher.launches().len() == 1 && launcher.stopped() == 1).await;
}

#[tokio::test]
async fn resync_stops_captures_of_vanished_pods() {
    let captures = tempdir().unwrap();
    let config = config(captures.path(), Path::new("/nonexistent"));
    let launcher = Arc::new(RecordingLauncher::default());
    let mut controller = controller(
        &config,
        Arc::new(StaticLocator::new(&[("aaa", 10), ("bbb", 20)])),
        launcher.clone(),
    );

    let a = pod("ua", "pod-a", "aaa").with_annotation(KEY, "1");
    let b = pod("ub", "pod-b", "bbb").with_annotation(KEY, "1");

    controller.handle(UnitEvent::ResyncStarted).await;
    controller.handle(UnitEvent::Observed(a.clone())).await;
    assert!(!controller.is_synced());
    controller.handle(UnitEvent::ResyncDone).await;
    assert!(controller.is_synced());
    assert!(controller.manager().is_capturing(&a.id));

    // The watch reconnects and pod-a is gone from the new list.
    controller.handle(UnitEvent::ResyncStarted).await;
    controller.handle(UnitEvent::Observed(b.clone())).await;
    controller.handle(UnitEvent::ResyncDone).await;

    assert!(!controller.manager().is_capturing(&a.id));
    assert!(controller.manager().is_capturing(&b.id));
    wait_for(|| launcher.stopped() == 1).await;
}

#[tokio::test]
async fn run_until_drains_events_and_shuts_down() {
    let captures = tempdir().unwrap();
    let config = config(captures.path(), Path::new("/nonexistent"));
    let launcher = Arc::new(RecordingLauncher::default());
    let mut controller = controller(
        &config,
        Arc::new(StaticLocator::new(&[("abc", 10)])),
        launcher.clone(),
    );
    let manager = controller.manager().clone();

    let (events_tx, events_rx) = mpsc::channel(16);
    let (control_tx, control_rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let run_cancel = cancel.clone();
    let handle = tokio::spawn(async move {
        controller.run_until(run_cancel, events_rx, control_rx).await;
    });

    events_tx.send(UnitEvent::ResyncStarted).await.unwrap();
    events_tx
        .send(UnitEvent::Observed(
            pod("u1", "pod-a", "abc").with_annotation(KEY, "4"),
        ))
        .await
        .unwrap();
    events_tx.send(UnitEvent::ResyncDone).await.unwrap();
    control_tx.send(ControlEvent::DumpStatus).unwrap();

    wait_for(|| launcher.launches().len() == 1).await;
    assert!(manager.is_capturing(&UnitId::new("u1")));

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("controller stops on cancel")
        .unwrap();

    assert!(manager.is_empty());
    assert_eq!(launcher.stopped(), 1);
}

#[tokio::test]
async fn run_until_returns_when_channels_close() {
    let captures = tempdir().unwrap();
    let config = config(captures.path(), Path::new("/nonexistent"));
    let mut controller = controller(
        &config,
        Arc::new(StaticLocator::default()),
        Arc::new(RecordingLauncher::default()),
    );

    let (events_tx, events_rx) = mpsc::channel(1);
    let (control_tx, control_rx) = mpsc::unbounded_channel();
    drop(events_tx);
    drop(control_tx);

    tokio::time::timeout(
        Duration::from_secs(5),
        controller.run_until(CancellationToken::new(), events_rx, control_rx),
    )
    .await
    .expect("controller returns once its inputs are gone");
}
