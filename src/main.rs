mod config;
mod fmt;
mod omdb;
mod search;
mod session;
mod tg;
mod tmdb;

use dotenvy::dotenv;
use teloxide::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = config::Config::from_env()?;
    let bot = Bot::from_env();

    let tmdb = tmdb::TmdbClient::new(cfg.tmdb_api_key.clone());
    if cfg.omdb_api_key.is_none() {
        tracing::info!("OMDB_API_KEY не задан — рейтинг IMDb отключён, фильтр по нему не применяется");
    }
    let ratings = omdb::OmdbClient::new(cfg.omdb_api_key.clone());
    let sessions = session::SessionStore::new();

    tg::run(bot, tmdb, ratings, sessions, cfg.webhook()).await
}
