use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE,
    ACCESS_CONTROL_REQUEST_METHOD, ALLOW,
};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{AllowHeaders, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::dispatch::Dispatcher;
use crate::handler::{self, ALLOWED_METHODS};

/// Build the axum router with all Bookshelf endpoints.
pub fn build_router(dispatcher: Dispatcher, cors_max_age_secs: u64) -> Router {
    Router::new()
        .route("/health", get(handler::health_handler))
        .route("/api/:owner/*tail", any(handler::api_handler))
        .fallback(handler::fallback_handler)
        .with_state(dispatcher)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn_with_state(
                    cors_max_age_secs,
                    cors_response_headers,
                ))
                .layer(middleware::from_fn(plain_options))
                .layer(cors_layer(cors_max_age_secs)),
        )
}

/// Answers preflights for any path and stamps `*` as the allowed origin.
fn cors_layer(max_age_secs: u64) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::HEAD, Method::POST, Method::OPTIONS])
        .allow_headers(AllowHeaders::mirror_request())
        .max_age(Duration::from_secs(max_age_secs))
}

/// Answers an `OPTIONS` request that is not a CORS preflight with the
/// allowed methods. `CorsLayer` would otherwise treat it as a preflight.
async fn plain_options(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS
        && !request.headers().contains_key(ACCESS_CONTROL_REQUEST_METHOD)
    {
        return (StatusCode::OK, [(ALLOW, "GET, HEAD, POST, OPTIONS")]).into_response();
    }
    next.run(request).await
}

/// Adds the CORS headers that `CorsLayer` only sets on some responses:
/// the origin on short-circuited replies, methods and max age on
/// everything that is not a preflight.
async fn cors_response_headers(
    State(max_age_secs): State<u64>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers
        .entry(ACCESS_CONTROL_ALLOW_ORIGIN)
        .or_insert(HeaderValue::from_static("*"));
    headers
        .entry(ACCESS_CONTROL_ALLOW_METHODS)
        .or_insert(HeaderValue::from_static(ALLOWED_METHODS));
    headers
        .entry(ACCESS_CONTROL_MAX_AGE)
        .or_insert(HeaderValue::from(max_age_secs));
    response
}
