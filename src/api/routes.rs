use axum::{
    http::HeaderValue,
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use crate::allocator::CodeAllocator;
use crate::auth::{auth_middleware, AuthService};
use crate::config::{CorsConfig, ShortenerConfig};
use crate::storage::Storage;

use super::handlers::{
    api_info, current_user, delete_url, get_stats, health_check, shorten_url, AppState,
};

pub fn create_api_router(
    storage: Arc<dyn Storage>,
    auth_service: Arc<AuthService>,
    shortener: ShortenerConfig,
    cors: &CorsConfig,
) -> Router {
    let allocator = CodeAllocator::new(Arc::clone(&storage), &shortener);
    let state = Arc::new(AppState {
        storage,
        allocator,
        shortener,
    });

    let authenticated_routes = Router::new()
        .route("/shorten", post(shorten_url))
        .route("/stats", get(get_stats))
        .route("/urls/{code}", delete(delete_url))
        .route("/urls/{code}/", delete(delete_url))
        .route("/me", get(current_user))
        .route_layer(middleware::from_fn_with_state(auth_service, auth_middleware))
        .with_state(state);

    Router::new()
        .route("/", get(api_info))
        .route("/health", get(health_check))
        .merge(authenticated_routes)
        .layer(cors_layer(cors))
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if config.allowed_origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{origin}'");
                None
            }
        })
        .collect();

    layer.allow_origin(origins)
}
