//! tally-api — HTTP surface of the tally server.
//!
//! Translates requests into [`MetricStore`] calls and formats the results.
//! Request bodies may be gzip-encoded; responses are gzip-encoded when the
//! client accepts it.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/` | HTML listing of all metrics |
//! | POST | `/update/{type}/{name}/{value}` | Path-encoded update |
//! | POST | `/update/` | JSON update `{id, type, delta \| value}` |
//! | POST | `/updates/` | JSON batch update (array) |
//! | GET | `/value/{type}/{name}` | Plain-text current value |
//! | POST | `/value/` | JSON query `{id, type}` |
//! | GET | `/ping` | Database connectivity check |

pub mod handlers;
pub mod pages;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tally_persist::Backend;
use tally_store::MetricStore;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::decompression::RequestDecompressionLayer;
use tower_http::trace::TraceLayer;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: MetricStore,
    pub backend: Arc<Backend>,
}

/// Build the complete API router.
pub fn build_router(store: MetricStore, backend: Arc<Backend>) -> Router {
    let state = ApiState { store, backend };

    Router::new()
        .route("/", get(pages::list_metrics))
        .route("/update/{kind}/{name}/{value}", post(handlers::update_path))
        .route("/update", post(handlers::update_json))
        .route("/update/", post(handlers::update_json))
        .route("/updates", post(handlers::update_batch))
        .route("/updates/", post(handlers::update_batch))
        .route("/value/{kind}/{name}", get(handlers::value_path))
        .route("/value", post(handlers::value_json))
        .route("/value/", post(handlers::value_json))
        .route("/ping", get(handlers::ping))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestDecompressionLayer::new())
                .layer(CompressionLayer::new()),
        )
}
