//! Order service entry point.
//!
//! ```bash
//! CONFIG_PATH=config/development.toml order-server
//! # or
//! order-server -config config/development.toml
//! ```

use order_core::{app, logging, Config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    logging::init_tracing(&config.logger.level);

    tracing::info!(
        name = %config.app.name,
        version = %config.app.version,
        "starting order service"
    );

    app::run(config).await?;

    Ok(())
}
