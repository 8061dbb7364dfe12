use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use clap::Parser;
use timetick_coordinator::{
    ChannelRegistry, CoreSettings, DdlBarrier, Dispatcher, Family, MessagePack,
    PrefixChannelNameMapper, ProxyId, Reducer,
};
use tokio_util::sync::CancellationToken;

const COORDINATOR_ID: ProxyId = 0;

#[derive(Parser, Debug)]
#[command(name = "timetick-coordinator", about = "Time-tick fusion core")]
struct Args {
    /// Path to a TOML settings file. Falls back to documented defaults when absent.
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Stand-in for the real message-stream client, which is an external collaborator to this core.
/// Logs every publish instead of putting it on a wire.
struct LoggingMessageStream;

#[async_trait]
impl timetick_coordinator::MessageStream for LoggingMessageStream {
    async fn send(&self, channel: &str, pack: &MessagePack) -> Result<(), String> {
        tracing::info!(channel, ?pack, "published heartbeat");
        Ok(())
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = Args::parse();
    let settings = match &args.config {
        Some(path) => {
            CoreSettings::load_from_file(path).with_context(|| format!("loading {path:?}"))?
        }
        None => {
            tracing::info!("no --config given, using documented defaults");
            CoreSettings::default()
        }
    };

    let registry = Arc::new(ChannelRegistry::new(Arc::new(LoggingMessageStream)));
    let mapper = PrefixChannelNameMapper::new(
        settings.dml_channel_prefix.clone(),
        settings.delta_channel_prefix.clone(),
    );

    let mut dml_channels = Vec::with_capacity(settings.channel_count as usize);
    for i in 0..settings.channel_count {
        let dml = format!("{}{i}", settings.dml_channel_prefix);
        let delta = mapper
            .dml_to_delta(&dml)
            .context("configured prefixes produced an invalid channel name")?;
        dml_channels.push(dml);
        registry.add_channels(Family::Delta, [delta]);
    }
    registry.add_channels(Family::Dml, dml_channels);

    let ddl_barrier = Arc::new(DdlBarrier::new());
    let (reducer, receiver) = Reducer::new(COORDINATOR_ID, ddl_barrier, settings.queue_capacity);
    let reducer = Arc::new(reducer);
    reducer.add_proxy(COORDINATOR_ID);

    let (watchdog, watchdog_handle) =
        timetick_coordinator::watchdog::spawn(settings.watchdog_interval, settings.watchdog_enabled);

    let dispatcher = Dispatcher::new(
        receiver,
        registry,
        COORDINATOR_ID,
        settings.tick_interval,
        watchdog,
    );

    let cancel = CancellationToken::new();
    let dispatcher_cancel = cancel.clone();
    let dispatcher_handle = tokio::spawn(dispatcher.run(dispatcher_cancel));

    tokio::signal::ctrl_c()
        .await
        .context("failed to install ctrl-c handler")?;
    tracing::info!("shutdown signal received");
    cancel.cancel();

    dispatcher_handle
        .await
        .context("dispatcher task panicked")?;
    watchdog_handle.abort();

    Ok(())
}
