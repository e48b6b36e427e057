#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn, LevelFilter};
use std::sync::Arc;
use std::time::Duration;

use ledger_engine::{
    account_store::{AccountStore, DashMapAccountStore},
    api::{router, AppState},
    clock::{Clock, SystemClock},
    config::Config,
    transaction_processor::TransactionProcessor,
};

fn init_logging() {
    let mut builder = pretty_env_logger::formatted_timed_builder();
    builder.filter_level(LevelFilter::Info);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.init();
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for Ctrl-C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!("Cannot listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown requested");
}

/// Run the server until shutdown is requested, then give in-flight requests a grace period
async fn serve(config: &Config, state: AppState) -> Result<()> {
    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Cannot bind to {}", addr))?;
    info!("Server running on {}", addr);

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, router(state)).with_graceful_shutdown(async move {
        let _ = stop_rx.await;
    });
    let mut server = tokio::spawn(async move { server.await });

    tokio::select! {
        result = &mut server => return Ok(result??),
        _ = shutdown_signal() => {}
    }

    let _ = stop_tx.send(());
    let grace: Duration = config.shutdown_timeout();
    match tokio::time::timeout(grace, server).await {
        Ok(result) => Ok(result??),
        Err(_) => {
            warn!("Graceful shutdown timed out after {:?}, forcing exit", grace);
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let config = Config::parse();
    let registry = Arc::new(config.load_registry()?);
    let store: Arc<dyn AccountStore> = Arc::new(DashMapAccountStore::new());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let processor = TransactionProcessor::new(
        registry.clone(),
        store.clone(),
        clock.clone(),
        config.overdraft_policy(),
    )
    .with_signed_amounts(config.accept_signed_amounts);

    info!(
        "Loaded {} operation types (overdraft = {:?}, signed amounts = {})",
        registry.all().len(),
        processor.overdraft(),
        config.accept_signed_amounts
    );

    let state = AppState::new(store, Arc::new(processor), registry, clock);
    serve(&config, state).await
}
