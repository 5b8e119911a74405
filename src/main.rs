use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use waypoint::Server;
use waypoint::config::ServerConfig;

mod demo;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "waypoint=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::parse();
    tracing::info!(
        bind_address = %config.bind_addr(),
        max_body_bytes = config.max_body_bytes,
        "configuration loaded"
    );

    let server = Server::bind(config.bind_addr())
        .await?
        .with_max_request_size(config.max_request_bytes());
    tracing::info!("Server is running on port {}", server.local_addr().port());

    demo::app(&config).serve(server).await?;
    Ok(())
}
