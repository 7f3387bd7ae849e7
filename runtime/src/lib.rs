//! Rivulet runtime: process wiring for the channel and joiner binaries
//!
//! Loads configuration from the environment, initialises tracing and
//! metrics, builds the transport, and runs one processor behind the ingest
//! HTTP server until SIGINT or SIGTERM.
//!
//! # Quick start
//!
//! ```ignore
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     rivulet_runtime::run_channel().await
//! }
//! ```
//!
//! # Shutdown order
//!
//! ```text
//! signal ──► ingest server drains ──► processor stops ──► output queue drains ──► transport.shutdown()
//! ```

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]

pub mod prelude;

use anyhow::Context;
use axum::Router;
use rivulet_core::{Event, OutputEnvelope, Transport};
use rivulet_processor::config::{ChannelConfig, JoinerConfig, LogFormat, RuntimeConfig};
use rivulet_processor::ingest::{EventSender, IngestServer};
use rivulet_processor::metrics::Metrics;
use rivulet_processor::metrics_server::MetricsServer;
use rivulet_processor::router::{output_loop, OutputRouter, Targets};
use rivulet_processor::{transport, ChannelProcessor, Joiner};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Payloads waiting for the output router
const OUTPUT_QUEUE_CAPACITY: usize = 1024;

/// Run a channel processor configured from `CHANNEL_*` and `RIVULET_*`
pub async fn run_channel() -> anyhow::Result<()> {
    let runtime = RuntimeConfig::from_env().context("invalid runtime configuration")?;
    init_tracing(&runtime);
    let config = ChannelConfig::from_env().context("invalid channel configuration")?;
    run_channel_with(runtime, config).await
}

/// Run a joiner configured from `JOINER_*` and `RIVULET_*`
pub async fn run_joiner() -> anyhow::Result<()> {
    let runtime = RuntimeConfig::from_env().context("invalid runtime configuration")?;
    init_tracing(&runtime);
    let config = JoinerConfig::from_env().context("invalid joiner configuration")?;
    run_joiner_with(runtime, config).await
}

/// Run a channel processor with explicit configuration
///
/// Tracing must already be initialised.
pub async fn run_channel_with(runtime: RuntimeConfig, config: ChannelConfig) -> anyhow::Result<()> {
    info!(
        listen_addr = %config.listen_addr,
        route = %config.service_route,
        binding = %config.binding_name,
        mode = ?config.mode,
        transport = ?runtime.transport,
        "Starting rivulet channel"
    );

    let processor = ChannelProcessor::new(&config)?;
    let (stages, input) = Stages::start(&runtime, config.targets.clone()).await?;

    let mut server = IngestServer::new(stages.sender.clone())
        .invocation(&config.service_route, &config.binding_name);
    if let Some(source) = &config.source {
        server = server.stream(source.clone());
    }
    let app = server.router();

    let processor = processor.spawn(
        input,
        stages.output.clone(),
        stages.shutdown.subscribe(),
    );
    stages.serve(config.listen_addr, app, processor).await
}

/// Run a joiner with explicit configuration
///
/// Tracing must already be initialised.
pub async fn run_joiner_with(runtime: RuntimeConfig, config: JoinerConfig) -> anyhow::Result<()> {
    let [first, second] = config.topics();
    info!(
        listen_addr = %config.listen_addr,
        streams = %format!("{first},{second}"),
        window = ?config.window,
        transport = ?runtime.transport,
        "Starting rivulet joiner"
    );

    let joiner = Joiner::new(&config)?;
    let (stages, input) = Stages::start(&runtime, config.targets.clone()).await?;

    let app = config
        .streams
        .iter()
        .cloned()
        .fold(IngestServer::new(stages.sender.clone()), IngestServer::stream)
        .router();

    let joiner = joiner.spawn(
        input,
        stages.output.clone(),
        stages.shutdown.subscribe(),
    );
    stages.serve(config.listen_addr, app, joiner).await
}

/// Everything around the processor: queues, router task, transport, shutdown
struct Stages {
    transport: Arc<dyn Transport>,
    sender: EventSender,
    output: mpsc::Sender<OutputEnvelope>,
    router: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl Stages {
    /// Start the output side and return the processor's input queue
    async fn start(
        runtime: &RuntimeConfig,
        targets: Targets,
    ) -> anyhow::Result<(Self, mpsc::Receiver<Event>)> {
        if let Some(addr) = runtime.metrics_addr {
            Metrics::init()?;
            let _metrics_handle = MetricsServer::start(addr);
        }

        let transport = transport::from_config(runtime).context("failed to build transport")?;
        if !transport.health().await {
            warn!(transport = transport.name(), "Transport not ready yet, dispatches may fail");
        }

        let (sender, input) = EventSender::channel(runtime.queue_capacity);
        let (output, output_rx) = mpsc::channel(OUTPUT_QUEUE_CAPACITY);

        let router = OutputRouter::new(Arc::clone(&transport), targets);
        let router = tokio::spawn(output_loop(router, output_rx));

        let (shutdown, _) = watch::channel(false);

        let stages = Self {
            transport,
            sender,
            output,
            router,
            shutdown,
        };
        Ok((stages, input))
    }

    /// Serve ingest until a shutdown signal, then stop every stage in order
    async fn serve(
        self,
        addr: SocketAddr,
        app: Router,
        processor: JoinHandle<()>,
    ) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind ingest server on {addr}"))?;
        info!(%addr, "Ingest server listening");

        let Self {
            transport,
            sender,
            output,
            router,
            shutdown,
        } = self;
        // Only the processor and the server routes hold queue ends from here
        drop(sender);
        drop(output);

        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await;

        let _ = shutdown.send(true);
        if let Err(e) = processor.await {
            error!(error = %e, "Processor task failed");
        }
        if let Err(e) = router.await {
            error!(error = %e, "Output router task failed");
        }
        if let Err(e) = transport.shutdown().await {
            warn!(error = %e, "Transport shutdown failed");
        }

        served.context("ingest server error")?;
        info!("rivulet shutdown complete");
        Ok(())
    }
}

/// Initialise the tracing subscriber based on config.
///
/// `RUST_LOG` overrides `RIVULET_LOG_LEVEL` when set.
pub fn init_tracing(config: &RuntimeConfig) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.log_level.clone().into());

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.log_format {
        LogFormat::Json => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        LogFormat::Pretty => {
            registry.with(tracing_subscriber::fmt::layer()).init();
        }
    }
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = ?e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = ?e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
