//! Shared helpers for server integration tests.
#![allow(dead_code)]

use simplesync_server::{app, config::Config, feed::NoteFeed, AppState};
use std::net::SocketAddr;
use std::sync::Arc;

/// A server bound to an ephemeral local port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub feed: Arc<NoteFeed>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Start a server with `seed` notes.
pub async fn spawn_server(config: Config, seed: usize) -> TestServer {
    let feed = NoteFeed::new();
    feed.seed(seed).await;
    let state = AppState::new(config, feed);
    let feed = state.feed.clone();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app(state)).await.unwrap();
    });

    TestServer { addr, feed }
}

pub fn config_with_token(token: &str) -> Config {
    Config {
        auth_token: Some(token.to_string()),
        ..Config::default()
    }
}
