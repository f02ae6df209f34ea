#![forbid(unsafe_code)]

use crate::source::{UnitEvent, workload_unit};
use config::Config;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use kube::Client;
use kube::api::Api;
use kube::runtime::watcher::{self, Event};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Watches the pods scheduled on one node and forwards them as
/// [`UnitEvent`]s.
pub struct PodWatcher {
    client: Client,
    node_name: String,
    backoff: Duration,
}

impl PodWatcher {
    pub fn new(client: Client, node_name: impl Into<String>, config: &Config) -> Self {
        Self {
            client,
            node_name: node_name.into(),
            backoff: config.watch.backoff,
        }
    }

    pub fn field_selector(&self) -> String {
        format!("spec.nodeName={}", self.node_name)
    }

    /// Run the watch until `cancel` fires or the receiver is dropped. A
    /// failed or ended watch is re-established after the configured backoff,
    /// starting with a full re-list.
    pub async fn run(self, events: mpsc::Sender<UnitEvent>, cancel: CancellationToken) {
        let pods: Api<Pod> = Api::all(self.client.clone());
        let selector = self.field_selector();

        loop {
            let config = watcher::Config::default().fields(&selector);
            let stream = watcher::watcher(pods.clone(), config);
            tokio::pin!(stream);
            info!(node = %self.node_name, "watching pods");

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    event = stream.next() => match event {
                        Some(Ok(event)) => {
                            let Some(event) = translate(event) else {
                                continue;
                            };
                            if events.send(event).await.is_err() {
                                debug!("event receiver dropped, stopping pod watch");
                                return;
                            }
                        }
                        Some(Err(err)) => {
                            warn!(%err, "pod watch failed, will reconnect");
                            break;
                        }
                        None => {
                            info!("pod watch ended, reconnecting");
                            break;
                        }
                    },
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(self.backoff) => {}
            }
        }
    }
}

fn translate(event: Event<Pod>) -> Option<UnitEvent> {
    match event {
        Event::Apply(pod) | Event::InitApply(pod) => {
            let unit = workload_unit(&pod);
            if unit.is_none() {
                debug!(pod = ?pod.metadata.name, "ignoring pod without uid or name");
            }
            unit.map(UnitEvent::Observed)
        }
        Event::Delete(pod) => workload_unit(&pod).map(UnitEvent::Removed),
        Event::Init => Some(UnitEvent::ResyncStarted),
        Event::InitDone => Some(UnitEvent::ResyncDone),
    }
}
