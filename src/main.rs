use anyhow::Result;
use std::process::ExitCode;

use sirene_client::config::{self, Command};
use sirene_client::SireneClient;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load configuration first (for log level)
    let (config, command) = config::Config::load()?;
    config.validate()?;

    // Initialize logging with a configured level
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(
        token_url = %config.token_url,
        api_url = %config.api_url,
        "Sirene client starting"
    );

    match command {
        Command::Exists { siren } => {
            let client = SireneClient::connect(&config).await?;
            let exists = client.siren_exists(&siren).await?;
            println!("{}", exists);
            if !exists {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Get { siren, pretty } => {
            let client = SireneClient::connect(&config).await?;
            let response = client.get_siren(&siren).await?;
            print_json(&response, pretty)?;
        }
        Command::Search { terms } => {
            let client = SireneClient::connect(&config).await?;
            let response = client.search(terms.as_slice()).await?;
            tracing::info!(
                total = ?response.header.total,
                returned = response.legal_units.len(),
                "Search complete"
            );
            print_json(&response, true)?;
        }
        Command::Watch => watch(&config).await?,
    }

    Ok(ExitCode::SUCCESS)
}

fn print_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", text);
    Ok(())
}

/// Keep a token alive until Ctrl+C, logging each refresh
async fn watch(config: &config::Config) -> Result<()> {
    let (client, handle) = SireneClient::connect_refreshed(config).await?;

    let snapshot = client.auth_manager().snapshot().await;
    tracing::info!(
        expires_at = ?snapshot.expires_at(),
        "✅ Authentication successful, refreshing in background"
    );

    let mut status = handle.status();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            changed = status.changed() => {
                if changed.is_err() {
                    tracing::warn!("Token refresher exited");
                    break;
                }
                let current = status.borrow_and_update().clone();
                match current.last_error {
                    Some(e) => tracing::warn!(
                        cycle = current.cycles,
                        error = %e,
                        "Refresh cycle failed"
                    ),
                    None => tracing::info!(
                        cycle = current.cycles,
                        next_in = ?current.next_delay,
                        "Token refreshed"
                    ),
                }
            }
        }
    }

    handle.stop().await;
    tracing::info!("👋 Shutdown complete");
    Ok(())
}

/// Handle shutdown signal
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, shutting down...");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, shutting down...");
        },
    }
}
