//! HTTP surface: four POST routes under `/api/core`.

pub mod error;
pub mod handlers;
pub mod types;

use std::sync::Arc;

use axum::{routing::post, Router};
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

pub use error::ApiError;

use crate::{
    broker::BrokerConnection,
    config::{BodyPolicy, Settings},
    lifecycle::{RequestBridge, SubscriptionManager},
};

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub broker: Arc<dyn BrokerConnection>,
    pub manager: Arc<SubscriptionManager>,
    pub requests: RequestBridge,
    pub body_policy: BodyPolicy,
}

impl AppState {
    pub fn new(
        broker: Arc<dyn BrokerConnection>,
        manager: Arc<SubscriptionManager>,
        settings: &Settings,
    ) -> Self {
        Self {
            requests: RequestBridge::new(broker.clone(), settings.broker.request_timeout()),
            broker,
            manager,
            body_policy: settings.http.body_policy,
        }
    }
}

pub fn build_router(
    state: AppState,
    settings: &Settings,
) -> Router {
    Router::new()
        .route(
            "/api/core/publish-message",
            post(handlers::publish_message).fallback(handlers::invalid_method),
        )
        .route(
            "/api/core/reply",
            post(handlers::reply).fallback(handlers::invalid_method),
        )
        .route(
            "/api/core/request-reply",
            post(handlers::request_reply).fallback(handlers::invalid_method),
        )
        .route(
            "/api/core/queue-group",
            post(handlers::queue_group).fallback(handlers::invalid_method),
        )
        .fallback(handlers::not_found)
        .layer(TimeoutLayer::new(settings.http.request_timeout()))
        .layer(RequestBodyLimitLayer::new(settings.http.body_limit_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
