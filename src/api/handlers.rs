use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, warn};

use crate::allocator::{AllocationError, CodeAllocator};
use crate::auth::{Account, Caller};
use crate::config::ShortenerConfig;
use crate::models::{LinkStats, ShortenRequest, ShortenResponse};
use crate::normalize::normalize_url;
use crate::storage::Storage;

pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub allocator: CodeAllocator,
    pub shortener: ShortenerConfig,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Create (or reuse) a short code for a URL
pub async fn shorten_url(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    payload: Result<Json<ShortenRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ShortenResponse>), ApiError> {
    let Json(payload) =
        payload.map_err(|_| api_error(StatusCode::BAD_REQUEST, "Invalid JSON data"))?;

    let raw = payload.url.unwrap_or_default();
    let url =
        normalize_url(&raw).map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    let allocation = state
        .allocator
        .allocate(&url, caller.owner_id())
        .await
        .map_err(|e| {
            error!("Failed to allocate short code: {e:#}");
            match e {
                AllocationError::Exhausted(_) => api_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to generate unique short code",
                ),
                AllocationError::Storage(e) => api_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Server error: {e}"),
                ),
            }
        })?;

    let record = allocation.record;
    let (status, message) = if allocation.created {
        (StatusCode::CREATED, None)
    } else {
        (StatusCode::OK, Some("URL already exists".to_string()))
    };

    Ok((
        status,
        Json(ShortenResponse {
            short_url: state.shortener.short_url(&record.short_code),
            short_code: record.short_code,
            original_url: record.original_url,
            message,
        }),
    ))
}

/// List every link with its click count, newest first
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<LinkStats>>, ApiError> {
    match state.storage.list().await {
        Ok(records) => Ok(Json(records.iter().map(LinkStats::from).collect())),
        Err(e) => {
            error!("Failed to list URLs: {e:#}");
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Server error: {e}"),
            ))
        }
    }
}

/// Delete a link. Owners may delete their own links, staff may delete any.
pub async fn delete_url(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(code): Path<String>,
) -> Result<StatusCode, ApiError> {
    if caller.account.is_none() && !caller.privileged {
        return Err(api_error(
            StatusCode::UNAUTHORIZED,
            "Authentication credentials were not provided",
        ));
    }

    let record = match state.storage.get(&code).await {
        Ok(Some(record)) => record,
        Ok(None) => return Err(api_error(StatusCode::NOT_FOUND, "URL not found")),
        Err(e) => {
            error!(short_code = %code, "Failed to look up URL: {e:#}");
            return Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Server error: {e}"),
            ));
        }
    };

    if !caller.can_delete(&record) {
        warn!(
            short_code = %code,
            caller = caller.owner_id().unwrap_or("anonymous"),
            "delete refused: caller is neither owner nor staff"
        );
        return Err(api_error(
            StatusCode::FORBIDDEN,
            "You do not have permission to delete this URL",
        ));
    }

    match state.storage.delete(&code).await {
        Ok(true) => Ok(StatusCode::NO_CONTENT),
        Ok(false) => Err(api_error(StatusCode::NOT_FOUND, "URL not found")),
        Err(e) => {
            error!(short_code = %code, "Failed to delete URL: {e:#}");
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Server error: {e}"),
            ))
        }
    }
}

/// The authenticated account
pub async fn current_user(
    Extension(caller): Extension<Caller>,
) -> Result<Json<Account>, ApiError> {
    caller.account.map(Json).ok_or_else(|| {
        api_error(
            StatusCode::UNAUTHORIZED,
            "Authentication credentials were not provided",
        )
    })
}

/// Health check endpoint
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "url-shortener",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// API information endpoint
pub async fn api_info() -> Json<Value> {
    Json(json!({
        "message": "URL Shortener API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "shorten": "POST /shorten",
            "stats": "GET /stats",
            "delete": "DELETE /urls/{shortCode}",
            "me": "GET /me",
            "redirect": "GET /{shortCode}",
            "health": "GET /health",
        }
    }))
}
