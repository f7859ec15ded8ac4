//! # markbox-api
//!
//! HTTP server for markbox: form actions for the bookmark UI, an owner-scoped
//! read API, and the session refresh middleware that binds each request to
//! an account from the auth service.

pub mod actions;
pub mod config;
pub mod error;
pub mod form;
pub mod handlers;
pub mod middleware;
pub mod services;
pub mod state;

use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

pub use config::AppConfig;
pub use error::ApiError;
pub use state::AppState;

/// Generates time-ordered UUIDv7 request correlation IDs.
#[derive(Clone, Default)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}

/// Build the application router with every route and layer installed.
pub fn build_router(state: AppState) -> Router {
    let max_body_bytes = state.config.max_body_bytes;

    let action_routes = Router::new()
        .route("/add-bookmark", post(actions::bookmarks::add_bookmark))
        .route("/update-bookmark", post(actions::bookmarks::update_bookmark))
        .route("/delete-bookmark", post(actions::bookmarks::delete_bookmark))
        .route("/update-flagged", post(actions::bookmarks::update_flagged))
        .route("/update-importance", post(actions::bookmarks::update_importance))
        .route("/update-read", post(actions::bookmarks::update_read))
        .route(
            "/increase-opened-count",
            post(actions::bookmarks::increase_opened_count),
        )
        .route("/add-category", post(actions::categories::add_category))
        .route("/update-category", post(actions::categories::update_category))
        .route("/delete-category", post(actions::categories::delete_category))
        .route("/change-theme", post(actions::settings::change_theme))
        .route("/logout", post(actions::settings::logout));

    let api_routes = Router::new()
        .route("/categories", get(handlers::categories::list_categories))
        .route(
            "/categories/count",
            get(handlers::categories::count_categories),
        )
        .route("/categories/:id", get(handlers::categories::get_category))
        .route("/bookmarks", get(handlers::bookmarks::list_bookmarks))
        .route("/bookmarks/:id", get(handlers::bookmarks::get_bookmark))
        .route("/tags", get(handlers::tags::list_tags))
        .route("/files/:id", get(handlers::files::get_file))
        .route("/me", get(handlers::users::get_me));

    Router::new()
        .nest("/actions", action_routes)
        .nest("/api/v1", api_routes)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_refresh_middleware,
        ))
        // Registered after the session layer so health checks skip it.
        .route("/health", get(handlers::health_check))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(cors_layer(&state.config.allowed_origins))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .with_state(state)
}
