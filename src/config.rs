use std::{net::SocketAddr, path::PathBuf};

use anyhow::Context;

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_rps: u32,
    pub database_url: String,
    pub catalog_seed: Option<PathBuf>,
    pub search_limit: u64,
    pub feed_limit: u64,
    pub featured_limit: u64,
    pub session_ttl_days: i64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 =
            std::env::var("PORT").unwrap_or_else(|_| "3000".to_string()).parse().context("PORT")?;

        let supabase_url = std::env::var("SUPABASE_URL").unwrap_or_default();
        let supabase_anon_key = std::env::var("SUPABASE_ANON_KEY").unwrap_or_default();

        let supabase_rps: u32 =
            std::env::var("SUPABASE_RPS").ok().and_then(|s| s.parse().ok()).unwrap_or(10);

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://celebyfilm.db?mode=rwc".to_string());

        let catalog_seed =
            std::env::var("CATALOG_SEED").ok().filter(|s| !s.trim().is_empty()).map(PathBuf::from);

        let search_limit: u64 =
            std::env::var("SEARCH_LIMIT").ok().and_then(|s| s.parse().ok()).unwrap_or(20);

        let feed_limit: u64 =
            std::env::var("FEED_LIMIT").ok().and_then(|s| s.parse().ok()).unwrap_or(50);

        let featured_limit: u64 =
            std::env::var("FEATURED_LIMIT").ok().and_then(|s| s.parse().ok()).unwrap_or(6);

        let session_ttl_days: i64 =
            std::env::var("SESSION_TTL_DAYS").ok().and_then(|s| s.parse().ok()).unwrap_or(30);

        Ok(Self {
            addr: format!("{host}:{port}").parse().context("HOST/PORT")?,
            supabase_url,
            supabase_anon_key,
            supabase_rps,
            database_url,
            catalog_seed,
            search_limit,
            feed_limit,
            featured_limit,
            session_ttl_days,
        })
    }

    pub fn uses_supabase(&self) -> bool {
        !self.supabase_url.trim().is_empty()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_rps: 10,
            database_url: "sqlite::memory:".to_string(),
            catalog_seed: None,
            search_limit: 20,
            feed_limit: 50,
            featured_limit: 6,
            session_ttl_days: 30,
        }
    }
}
