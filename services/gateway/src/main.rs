//! Market-data gateway entry point
//!
//! Spawns one independent pipeline per configured pair (feed reader,
//! state actor, store writer, depth poller, ticker poller), the shared
//! monitor, and the HTTP server. A single cancellation token fans out
//! the shutdown signal; the process waits up to ten seconds for the
//! pipelines to drain and exits regardless.

mod config;
mod error;
mod handlers;
mod monitor;
mod router;
mod state;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use market_data::{
    run_store_writer, DepthPoller, StateActor, StreamReader, TickerPoller, PERSIST_QUEUE,
    STREAM_QUEUE,
};

use config::Config;
use monitor::Monitor;
use router::create_router;
use state::{AppState, PairHandles};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gateway=info,market_data=info,access=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::default();
    info!(
        pairs = config.pairs.len(),
        addr = %config.listen_addr,
        data_root = %config.data_root.display(),
        "starting market-data gateway"
    );

    let shutdown = CancellationToken::new();
    let client = reqwest::Client::new();
    let mut tasks = JoinSet::new();
    let mut pair_handles = HashMap::new();

    for pair in &config.pairs {
        let (actor, state_handle) =
            StateActor::new(&config.data_root, pair.clone(), config.ring_capacity);
        let (stream_tx, stream_rx) = mpsc::channel(STREAM_QUEUE);
        let (persist_tx, persist_rx) = mpsc::channel(PERSIST_QUEUE);

        let reader = StreamReader::new(config.stream_url(pair), pair.clone());
        tasks.spawn(reader.run(stream_tx, shutdown.clone()));
        tasks.spawn(actor.run(stream_rx, persist_tx, shutdown.clone()));
        tasks.spawn(run_store_writer(
            config.data_root.clone(),
            pair.clone(),
            persist_rx,
            shutdown.clone(),
        ));

        let (depth, depth_handle) =
            DepthPoller::new(client.clone(), config.depth_url(pair), pair.clone());
        tasks.spawn(depth.run(shutdown.clone()));

        let (ticks, ticks_handle) = TickerPoller::new(
            client.clone(),
            config.ticker_url(pair),
            &config.data_root,
            pair.clone(),
        );
        tasks.spawn(ticks.run(shutdown.clone()));

        pair_handles.insert(
            pair.clone(),
            PairHandles {
                state: state_handle,
                depth: depth_handle,
                ticks: ticks_handle,
            },
        );
    }

    let (monitor, monitor_handle) = Monitor::new();
    tasks.spawn(monitor.run(shutdown.clone()));

    let app = create_router(
        AppState::new(pair_handles, monitor_handle),
        &config.static_root,
    );

    let listener = TcpListener::bind(config.listen_addr).await?;
    info!(addr = %config.listen_addr, "listening");

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            info!("shutdown signal received");
            shutdown.cancel();
        }
    });

    let server_shutdown = shutdown.clone();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
    .await?;

    // Bounded drain: restart buffers and open day files are flushed by
    // their tasks; a wedged task must not keep the process alive.
    let drain = async {
        while tasks.join_next().await.is_some() {}
    };
    if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
        warn!("pipelines did not stop within {SHUTDOWN_GRACE:?}, exiting anyway");
    } else {
        info!("all pipelines stopped");
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
