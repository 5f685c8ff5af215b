use anyhow::Result;
use pulse_agent::agent::Agent;
use pulse_agent::config::AgentConfig;
use pulse_agent::dispatcher::BatchDispatcher;
use pulse_agent::transport::HttpTransport;
use pulse_collector::HostSampler;
use pulse_storage::queue::SqliteQueue;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("pulse=info".parse()?))
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/agent.toml".to_string());

    let config = AgentConfig::load(&config_path)?;
    let hostname = config
        .hostname
        .clone()
        .unwrap_or_else(pulse_collector::system::hostname);
    tracing::info!(hostname = %hostname, "pulse-agent starting");

    let queue = Arc::new(
        SqliteQueue::open(&config.db_path)?.with_max_pending(config.max_pending_records),
    );
    let transport = Arc::new(HttpTransport::new(&config.api_url, config.request_timeout())?);
    tracing::info!(url = transport.url(), "Delivering batches to collector");
    let dispatcher = BatchDispatcher::new(
        queue.clone(),
        transport,
        config.server_key.clone(),
        hostname.clone(),
        config.retry_policy(),
    );
    let sampler = HostSampler::new(hostname, config.collection_interval());

    tracing::info!(
        interval_secs = config.collection_interval_secs,
        retry_count = config.retry_count,
        retry_gap_secs = config.retry_gap_secs,
        db = %config.db_path.display(),
        "Starting collection loop"
    );

    let mut agent = Agent::new(sampler, queue.clone(), dispatcher);
    agent.run(shutdown_signal()).await;
    drop(agent);

    match Arc::try_unwrap(queue) {
        Ok(queue) => queue.close()?,
        Err(_) => tracing::warn!("Queue still in use at shutdown, skipping close"),
    }
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on Unix (what `systemctl stop` sends).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
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
