/**
 * Router Configuration
 *
 * Combines the route groups into the application router and wraps it in
 * the middleware stack. Layers run outermost first:
 *
 * 1. `TraceLayer` - request spans
 * 2. `CorsLayer` - exact-origin CORS with credentials
 * 3. `rate_limit` - per-client token bucket
 * 4. `authenticate` - session cookie to `AuthenticatedUser`
 *
 * Protected routes additionally carry `require_auth` as a route layer, so
 * unknown paths still get 404 rather than 401.
 */

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method,
    },
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::backend::error::BackendError;
use crate::backend::messaging::images::UPLOAD_URL_PREFIX;
use crate::backend::middleware::{authenticate, rate_limit, require_auth};
use crate::backend::routes::api_routes::{configure_protected_routes, configure_public_routes};
use crate::backend::server::state::AppState;
use crate::shared::AppConfig;

/// Create the Axum router with all routes and middleware.
///
/// # Arguments
///
/// * `app_state` - Shared state; the router takes its own clone
///
/// # Returns
///
/// A stateless router ready for `axum::serve`. Serve it with
/// `into_make_service_with_connect_info::<SocketAddr>()` so the client
/// address is known to the session and rate-limit middleware.
pub fn create_router(app_state: AppState) -> Router {
    let config = app_state.config.clone();

    let protected = configure_protected_routes(Router::new(), &config)
        .route_layer(from_fn_with_state(config.clone(), require_auth));

    configure_public_routes(Router::new())
        .merge(protected)
        .nest_service(UPLOAD_URL_PREFIX, ServeDir::new(&config.upload_dir))
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&config))
                .layer(from_fn_with_state(app_state.rate_limiter.clone(), rate_limit))
                .layer(from_fn_with_state(app_state.clone(), authenticate)),
        )
        .with_state(app_state)
}

/// CORS for the configured origins only.
pub fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("[Server] ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static("x-requested-with"),
        ])
}

async fn not_found() -> Response {
    BackendError::not_found("not found").into_response()
}
