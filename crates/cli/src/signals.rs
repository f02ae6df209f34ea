use flume::Sender;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to install signal handler: {0}")]
    Install(#[from] std::io::Error),

    #[error("signal receiver dropped")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalEvent {
    /// SIGINT or SIGTERM: stop every capture and exit.
    Shutdown,
    /// SIGUSR1: log the config and the running captures.
    DumpStatus,
}

/// Forward process signals to `tx` until the receiver goes away.
pub async fn wait_for_signal(tx: Sender<SignalEvent>) -> Result<(), Error> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigusr1 = signal(SignalKind::user_defined1())?;

    loop {
        let event = tokio::select! {
            _ = sigint.recv() => {
                info!("received SIGINT, shutting down");
                SignalEvent::Shutdown
            }
            _ = sigterm.recv() => {
                info!("received SIGTERM, shutting down");
                SignalEvent::Shutdown
            }
            _ = sigusr1.recv() => {
                debug!("received SIGUSR1");
                SignalEvent::DumpStatus
            }
        };
        tx.send_async(event).await.map_err(|_| Error::Closed)?;
    }
}
