// HTTP 層：axum 路由、驗證 extractor 與錯誤回應

pub mod auth;
mod donation;
pub mod error;
mod mini_app;
mod static_files;
mod user;
mod wishlist;

use crate::auth::{InitDataVerifier, JwtService};
use crate::config::ServerConfig;
use crate::core::{DonationService, StaticService, UserService, WishService};
use axum::extract::DefaultBodyLimit;
use axum::http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, ORIGIN};
use axum::http::{HeaderName, HeaderValue, Method};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use static_files::UPLOAD_BODY_LIMIT;

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<UserService>,
    pub wishes: Arc<WishService>,
    pub statics: Arc<StaticService>,
    pub donations: Arc<DonationService>,
    pub jwt: Arc<JwtService>,
    pub verifier: Arc<InitDataVerifier>,
    pub session_ttl_secs: u64,
}

pub fn router(state: AppState, server: &ServerConfig) -> Router {
    let api = Router::new()
        .route("/api/auth/telegram", post(mini_app::authenticate))
        .route("/api/profile", get(mini_app::profile))
        .route("/api/user/streamer/register", post(user::register))
        .route("/api/user/streamer/login", post(user::login))
        .route("/api/user/me", get(user::me))
        .route(
            "/api/user",
            get(user::get_profile).put(user::update_profile),
        )
        .route("/api/user/history", get(user::get_history))
        .route(
            "/api/wishlist",
            get(wishlist::get_wishes)
                .post(wishlist::add_wish)
                .put(wishlist::update_wish),
        )
        .route(
            "/api/static/upload",
            post(static_files::upload).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/api/static/{id}", get(static_files::get_file))
        .route("/api/donation-event/stream", get(donation::stream))
        .route("/health", get(health));

    let api = match &server.static_dir {
        Some(dir) => {
            info!("📁 Serving mini app from {}", dir);
            api.fallback_service(ServeDir::new(dir))
        }
        None => api,
    };

    api.layer(cors_layer(&server.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "donly-gateway" }))
}

/// `*` 以回送請求 Origin 的方式放行，才能同時允許 credentials
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let allow_origin = if allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::mirror_request()
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| match o.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!("Ignoring invalid CORS origin {:?}", o);
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            ORIGIN,
            CONTENT_TYPE,
            ACCEPT,
            AUTHORIZATION,
            HeaderName::from_static("x-requested-with"),
        ])
        .allow_credentials(true)
}
