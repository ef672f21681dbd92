//! Kiln HTTP server entry point.

use kiln_core::Executor;
use kiln_server::{http, ServerConfig};
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::from_default_env()
                .add_directive("kiln_server=info".parse()?)
                .add_directive("kiln_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting Kiln server");

    let config = ServerConfig::from_env();
    tracing::info!(?config, "Configuration loaded");

    let executor = Executor::new(config.executor_config()?);

    // Warn-only so hosts with a partial toolchain still serve what they can
    config.validate_warn(executor.registry());
    tracing::info!(
        executable = ?executor.registry().executable_languages(),
        "Drivers registered"
    );

    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
        }
        tracing::info!("Received shutdown signal");
    };

    http::serve(executor, &config, shutdown).await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}
