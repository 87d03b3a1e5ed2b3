//! SimpleSync Server - reference notes collection for the sync engine.
//!
//! Serves a paginated `notes` collection over HTTP with continuation links,
//! bearer-token auth and mutation endpoints, so that `simplesync-engine`
//! clients have a real remote to sync against.

pub mod auth;
pub mod config;
pub mod error;
pub mod feed;
pub mod handlers;
pub mod routes;

use crate::config::Config;
use crate::feed::NoteFeed;
use axum::Router;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str =
    "simplesync_server=debug,simplesync_engine=debug,notes_sync=debug,tower_http=debug";

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub feed: Arc<NoteFeed>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, feed: NoteFeed) -> Self {
        Self {
            feed: Arc::new(feed),
            config: Arc::new(config),
        }
    }
}

/// Build the application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::create_routes())
        .layer(
            ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            ),
        )
        .with_state(state)
}

/// Install the global tracing subscriber.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
