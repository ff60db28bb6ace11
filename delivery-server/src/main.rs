use delivery_server::core::{Config, Server};
use delivery_server::utils::logger;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Load .env file
    let _ = dotenv::dotenv();

    let config = Config::from_env()?;
    logger::init_logger(
        &config.log_level,
        !config.is_development(),
        config.log_dir.as_deref(),
    );

    tracing::info!(
        environment = %config.environment,
        version = env!("CARGO_PKG_VERSION"),
        "Starting delivery server"
    );

    if let Err(e) = Server::new(config).run().await {
        tracing::error!(error = %e, "Server stopped with error");
        return Err(e.into());
    }
    Ok(())
}
