use axum::{
    extract::{Path, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error};

use super::middleware::RequestStart;
use crate::storage::Storage;

pub struct RedirectState {
    pub storage: Arc<dyn Storage>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
}

/// Count the visit and redirect to the original URL
pub async fn redirect_url(
    State(state): State<Arc<RedirectState>>,
    Path(code): Path<String>,
    Extension(request_start): Extension<RequestStart>,
) -> Response {
    match state.storage.record_visit(&code).await {
        Ok(Some(destination)) => {
            let location = match HeaderValue::try_from(destination) {
                Ok(location) => location,
                Err(e) => {
                    error!(short_code = %code, "Stored URL is not a valid Location header: {e}");
                    return internal_error();
                }
            };

            let elapsed_ms = request_start.elapsed_ms();
            debug!(short_code = %code, elapsed_ms, "redirecting");

            (
                StatusCode::FOUND,
                [
                    (header::LOCATION, location),
                    (
                        HeaderName::from_static("x-linkcrush-timing-total-ms"),
                        HeaderValue::from(elapsed_ms),
                    ),
                ],
            )
                .into_response()
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorBody {
                error: "Short URL not found",
            }),
        )
            .into_response(),
        Err(e) => {
            error!(short_code = %code, "Failed to record visit: {e:#}");
            internal_error()
        }
    }
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            error: "Internal server error",
        }),
    )
        .into_response()
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    #[derive(Serialize)]
    struct HealthResponse {
        status: String,
    }

    Json(HealthResponse {
        status: "OK".to_string(),
    })
}
