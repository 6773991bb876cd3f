//! Inbound HTTP endpoints.
//!
//! | Route | Response |
//! |---|---|
//! | `GET /` | plain-text listing of feed URLs |
//! | `GET /rss/{category}?pretty=` | RSS document, 404 for unknown names |
//! | `GET /refresh` | regenerates every category, always 200 |
use std::fmt::Write as _;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use thiserror::Error;

use crate::assemble::{FeedAssembler, FeedTarget, GenerateError};
use crate::config::Config;
use crate::render::RSS_CONTENT_TYPE;

pub const REFRESH_OK: &str = "All categories refreshed successfully!";

#[derive(Clone)]
pub struct AppState {
    assembler: Arc<FeedAssembler>,
    pretty_default: bool,
}

impl AppState {
    pub fn new(assembler: Arc<FeedAssembler>, pretty_default: bool) -> Self {
        Self {
            assembler,
            pretty_default,
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Category not found")]
    NotFound,
    #[error("{0}")]
    Internal(String),
}

impl From<GenerateError> for ApiError {
    fn from(err: GenerateError) -> Self {
        match err {
            GenerateError::UnknownCategory(_) => ApiError::NotFound,
            GenerateError::Render(msg) => ApiError::Internal(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Feed generation failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, self.to_string()).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    pretty: Option<bool>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/rss/{category}", get(feed))
        .route("/refresh", get(refresh))
        .with_state(state)
}

/// Binds the configured address and serves until ctrl-c.
pub async fn serve(config: &Config, assembler: Arc<FeedAssembler>) -> anyhow::Result<()> {
    let addr: SocketAddr = config.bind.parse()?;
    let app = create_router(AppState::new(assembler, config.pretty_print));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "Listening");
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to install ctrl-c handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

async fn index(State(state): State<AppState>) -> String {
    let mut body = String::from("Newswire is running.\n\nFeeds:\n");
    for name in state.assembler.registry().names() {
        let _ = writeln!(body, "  /rss/{}", name);
    }
    let _ = writeln!(body, "  /rss/{}", Config::AGGREGATE_NAME);
    body
}

async fn feed(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Query(query): Query<FeedQuery>,
) -> Result<Response, ApiError> {
    let pretty = query.pretty.unwrap_or(state.pretty_default);
    let target = FeedTarget::from_name(&category);

    let xml = state.assembler.generate(&target, pretty).await?;
    Ok(([(header::CONTENT_TYPE, RSS_CONTENT_TYPE)], xml).into_response())
}

async fn refresh(State(state): State<AppState>) -> &'static str {
    tracing::info!("Refreshing all categories");
    let names: Vec<String> = state
        .assembler
        .registry()
        .names()
        .map(str::to_string)
        .collect();

    for name in names {
        match state
            .assembler
            .generate(&FeedTarget::Category(name.clone()), state.pretty_default)
            .await
        {
            Ok(_) => tracing::info!(category = %name, "Refreshed category"),
            Err(e) => tracing::warn!(category = %name, error = %e, "Failed to refresh category"),
        }
    }

    REFRESH_OK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_category_maps_to_404() {
        let err: ApiError =
            GenerateError::UnknownCategory(crate::registry::RegistryError::NotFound("x".into()))
                .into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_render_failure_maps_to_500() {
        let err: ApiError = GenerateError::Render("writer failed".into()).into();
        assert_eq!(err.to_string(), "writer failed");
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
