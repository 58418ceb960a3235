pub mod catalog;
pub mod comments;
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod favorites;
pub mod models;
pub mod notice;
pub mod profile;
pub mod remote;
pub mod routes;
pub mod session;
pub mod state;

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use axum::{
    Router,
    routing::{delete, get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    config::Config,
    remote::{
        AuthService, DataService,
        local::{CatalogSeed, LocalStore},
        supabase::SupabaseClient,
    },
    state::Clients,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub data: Arc<dyn DataService>,
    pub clients: Arc<Clients>,
}

impl AppState {
    pub fn new(config: Config, data: Arc<dyn DataService>, auth: Arc<dyn AuthService>) -> Self {
        let idle_ttl = Duration::from_secs(config.session_ttl_days.max(1) as u64 * 86_400);
        Self { config: Arc::new(config), data, clients: Arc::new(Clients::new(auth, idle_ttl)) }
    }

    /// Wires the hosted backend when configured, otherwise the local store.
    pub async fn from_config(config: Config) -> anyhow::Result<Self> {
        if config.uses_supabase() {
            let http = reqwest::Client::builder()
                .user_agent("celebyfilm/0.1")
                .timeout(Duration::from_secs(30))
                .build()?;
            let client = Arc::new(SupabaseClient::new(
                http,
                config.supabase_url.clone(),
                config.supabase_anon_key.clone(),
                config.supabase_rps,
            ));
            return Ok(Self::new(config, client.clone(), client));
        }

        tracing::warn!("Using local SQLite store - no SUPABASE_URL provided");
        let db = db::connect_and_migrate(&config.database_url).await?;
        let store = Arc::new(LocalStore::new(db));

        if let Some(path) = &config.catalog_seed {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            let seed: CatalogSeed = serde_json::from_str(&raw).context("CATALOG_SEED")?;
            store.import(&seed).await?;
        }

        Ok(Self::new(config, store.clone(), store))
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/home", get(routes::home))
        .route("/api/celebrities", get(routes::celebrities))
        .route("/api/celebrity/{id}", get(routes::celebrity))
        .route("/api/films", get(routes::films))
        .route("/api/film/{id}", get(routes::film))
        .route("/api/search", get(routes::search))
        .route("/api/comments", get(routes::feed))
        .route(
            "/api/comments/{kind}/{id}",
            get(routes::thread).post(routes::add_comment),
        )
        .route("/api/comments/{kind}/{id}/{comment_id}", delete(routes::delete_comment))
        .route("/api/favorites", get(routes::favorites))
        .route("/api/favorites/toggle", post(routes::toggle_favorite))
        .route("/api/profile", get(routes::profile).put(routes::update_profile))
        .route("/api/session", get(routes::session))
        .route("/api/auth/sign-in", post(routes::sign_in))
        .route("/api/auth/sign-up", post(routes::sign_up))
        .route("/api/auth/sign-out", post(routes::sign_out))
        .fallback(routes::not_found)
        .with_state(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
}
