use anyhow::Context;
use url::Url;

/// Конфигурация из окружения. Токен бота читает сам `Bot::from_env`
/// (TELOXIDE_TOKEN), остальное собираем здесь.
#[derive(Debug, Clone)]
pub struct Config {
    pub tmdb_api_key: String,
    pub omdb_api_key: Option<String>,
    pub port: u16,
    pub webhook_url: Option<Url>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let tmdb_api_key = std::env::var("TMDB_API_KEY").context("TMDB_API_KEY is missing")?;
        let omdb_api_key = std::env::var("OMDB_API_KEY").ok().filter(|s| !s.is_empty());
        let port = match std::env::var("PORT") {
            Ok(p) => p.parse().context("PORT must be a number")?,
            Err(_) => 3000,
        };
        let webhook_url = std::env::var("WEBHOOK_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .map(|u| u.parse())
            .transpose()
            .context("WEBHOOK_URL is not a valid URL")?;
        Ok(Self { tmdb_api_key, omdb_api_key, port, webhook_url })
    }

    /// Пара (порт, url) для webhook-режима; None — long polling.
    pub fn webhook(&self) -> Option<(u16, Url)> {
        self.webhook_url.clone().map(|u| (self.port, u))
    }
}
