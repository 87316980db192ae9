#![doc = include_str!("../README.md")]

mod server;

use anyhow::Context;
use clap::Parser;
use server::config::{CliArgs, ServerConfig};
use server::telemetry::Telemetry;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let config = ServerConfig::try_from(CliArgs::parse())?;

    let telemetry = Telemetry::init()?;
    let result = run(config).await;
    telemetry.shutdown();
    result
}

async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let addr = config.server_addr.clone();

    #[cfg(feature = "tracing")]
    tracing::info!(
        %addr,
        uds = config.uds,
        database = %config.database_url,
        strategy = %config.hashing.strategy,
        "starting record service"
    );

    if config.uds {
        #[cfg(unix)]
        {
            let listener = tokio::net::UnixListener::bind(&addr)
                .with_context(|| format!("failed to bind socket {addr}"))?;
            let incoming = tokio_stream::wrappers::UnixListenerStream::new(listener);
            let result = server::serve(config, incoming, shutdown_signal()).await;
            let _ = std::fs::remove_file(&addr);
            return result;
        }
        #[cfg(not(unix))]
        anyhow::bail!("unix domain sockets are not supported on this platform");
    }

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    server::serve(config, TcpListenerStream::new(listener), shutdown_signal()).await
}

/// Resolves on SIGTERM or Ctrl+C. A handler that fails to install never
/// resolves, leaving the other one in charge.
async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(_err) => {
                #[cfg(feature = "tracing")]
                tracing::error!("failed to install SIGTERM handler: {_err}");
                core::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = core::future::pending::<()>();

    let ctrl_c = async {
        if let Err(_err) = tokio::signal::ctrl_c().await {
            #[cfg(feature = "tracing")]
            tracing::error!("failed to install Ctrl+C handler: {_err}");
            core::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    #[cfg(feature = "tracing")]
    tracing::info!("shutdown signal received, draining requests");
}
