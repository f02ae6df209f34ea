#![forbid(unsafe_code)]

use capture_agent::{
    cli::Cli,
    signals::{SignalEvent, wait_for_signal},
};
use clap::Parser;
use config::Config;
use flume::bounded;
use orchestrator::{ControlEvent, Controller, PodWatcher, Services};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "jemalloc")]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // NOTE: The verbosity flag sets the global level and the environment
    // variable (`CAPTURE_AGENT_LOG`) tunes individual crates on top of it.
    // Eg. `CAPTURE_AGENT_LOG=kube=debug capture-agent` logs kube requests
    // while everything else stays at the info level.
    let env_filter = EnvFilter::builder()
        .with_default_directive("kube=warn".parse()?)
        .with_env_var("CAPTURE_AGENT_LOG")
        .from_env()?
        .add_directive(cli.verbosity.log_level_filter().as_str().parse()?);

    let layer = tracing_subscriber::fmt::layer()
        .with_level(true)
        .with_file(false)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(layer)
        .with(env_filter)
        .init();

    // load config
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        _ => {
            let mut candidates = glob::glob("/etc/capture-agent/config.d/*.toml")?
                .filter_map(Result::ok)
                .collect::<Vec<_>>();
            candidates.sort();
            candidates.insert(0, "/etc/capture-agent/config.toml".into());
            trace!(?candidates, "config file candidates");
            Config::load_multiple(candidates)?
        }
    };
    debug!(?config, ?cli);

    let client = kube::Client::try_default().await?;
    let cancel = CancellationToken::new();

    // install signal handlers
    let (signals_tx, signals_rx) = bounded(8);
    let mut signal_handle = tokio::spawn(async move { wait_for_signal(signals_tx).await });

    // pod events flow from the watcher into the controller
    let (events_tx, events_rx) = mpsc::channel(256);
    let (control_tx, control_rx) = mpsc::unbounded_channel();

    let watcher = PodWatcher::new(client, cli.node_name.clone(), &config);
    let watcher_handle = tokio::spawn(watcher.run(events_tx, cancel.child_token()));

    let mut controller = Controller::new(config.clone(), Services::from_config(&config));
    let controller_cancel = cancel.clone();
    let mut controller_handle = tokio::spawn(async move {
        controller
            .run_until(controller_cancel, events_rx, control_rx)
            .await
    });

    info!(node = %cli.node_name, "capture agent running");

    loop {
        tokio::select! {
            // bubble up any errors from the signal handlers
            res = &mut signal_handle => {
                let res = res?;
                if let Err(err) = &res {
                    error!("error happened during handling signals: {}", err);
                }
                cancel.cancel();
                controller_handle.await?;
                watcher_handle.await?;
                return Ok(res?);
            }

            // the controller only returns once it has stopped every capture
            res = &mut controller_handle => {
                res?;
                cancel.cancel();
                watcher_handle.await?;
                return Ok(());
            }

            // handle the signal events
            event_res = signals_rx.recv_async() => {
                let event = event_res?;
                debug!(?event, "received signal event");

                match event {
                    SignalEvent::DumpStatus => {
                        if control_tx.send(ControlEvent::DumpStatus).is_err() {
                            debug!("controller already stopped");
                        }
                    }
                    SignalEvent::Shutdown => {
                        cancel.cancel();
                        break;
                    }
                }
            }
        }
    }

    controller_handle.await?;
    watcher_handle.await?;
    info!("capture agent stopped");
    Ok(())
}
