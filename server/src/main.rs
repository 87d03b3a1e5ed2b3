//! SimpleSync Server - serves the reference notes collection.

use simplesync_server::{app, config::Config, feed::NoteFeed, init_tracing, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    init_tracing();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!("Starting SimpleSync Server on {}:{}", config.host, config.port);
    if config.auth_token.is_none() {
        tracing::warn!("AUTH_TOKEN not set, the notes API accepts anonymous requests");
    }

    let feed = NoteFeed::new();
    if config.seed_notes > 0 {
        feed.seed(config.seed_notes).await;
        tracing::info!("Seeded {} notes", config.seed_notes);
    }

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(config, feed);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app(state)).await?;

    Ok(())
}
