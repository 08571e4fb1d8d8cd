pub mod handlers;
pub mod response;

use crate::adapters::{SupabaseAuth, SupabaseTokenStore};
use crate::config::AppConfig;
use crate::core::oauth::build_http_client;
use crate::core::service::{Connectors, DealService};
use crate::domain::ports::IdentityProvider;
use crate::utils::error::Result;
use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: DealService,
    pub identity: Arc<dyn IdentityProvider>,
    /// Where OAuth callbacks send the browser afterwards.
    pub app_url: String,
}

impl AppState {
    /// Wires the Supabase-backed collaborators and configured connectors.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let client = build_http_client(&config.http)?;
        let store = Arc::new(SupabaseTokenStore::new(client.clone(), &config.supabase));
        let identity = Arc::new(SupabaseAuth::new(client.clone(), &config.supabase));
        let connectors = Connectors::from_config(config, client);

        Ok(Self {
            service: DealService::new(store, connectors),
            identity,
            app_url: config.server.app_url.clone(),
        })
    }
}

pub fn router(state: AppState, static_dir: Option<&str>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let api = Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/:provider/auth", get(handlers::authorize))
        .route("/api/:provider/callback", get(handlers::callback))
        .route(
            "/api/:provider/deals",
            get(handlers::deals).post(handlers::deals),
        )
        .route("/api/:provider/status", get(handlers::status))
        .route("/api/:provider/disconnect", post(handlers::disconnect))
        .with_state(state);

    let app = match static_dir {
        Some(dir) => api.fallback_service(ServeDir::new(dir)),
        None => api,
    };

    app.layer(cors).layer(TraceLayer::new_for_http())
}
