use moka::future::Cache;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_BASE: &str = "https://www.omdbapi.com";

/// Клиент OMDb: рейтинг IMDb по названию (поиска по id у сервиса нет).
/// Ключ опционален — без него рейтинг просто недоступен.
#[derive(Clone)]
pub struct OmdbClient {
    api_key: Option<String>,
    base_url: String,
    http: Client,
    // кеш по названию, чтобы не дёргать сервис повторно на одних и тех же
    // кандидатах (у OMDb жёсткий суточный лимит)
    cache: Cache<String, Option<String>>,
}

impl OmdbClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE.to_string())
    }

    pub fn with_base_url(api_key: Option<String>, base_url: String) -> Self {
        Self {
            api_key,
            base_url,
            http: Client::new(),
            cache: Cache::builder()
                .max_capacity(4096)
                .time_to_live(Duration::from_secs(6 * 60 * 60))
                .build(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    /// Рейтинг как строка ("8.1"). None — сервис выключен, фильм не найден,
    /// рейтинга нет ("N/A") или вызов не удался; для вызывающего это всё
    /// одно и то же «рейтинга нет».
    pub async fn rating(&self, title: &str) -> Option<String> {
        let api_key = self.api_key.as_ref()?;
        if let Some(cached) = self.cache.get(title).await {
            return cached;
        }
        let url = format!(
            "{}/?apikey={}&t={}",
            self.base_url,
            api_key,
            urlencoding::encode(title)
        );
        let rating = match self.fetch(&url).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(title, error = %e, "не удалось получить рейтинг IMDb");
                None
            }
        };
        self.cache.insert(title.to_string(), rating.clone()).await;
        rating
    }

    async fn fetch(&self, url: &str) -> reqwest::Result<Option<String>> {
        let resp = self.http.get(url).send().await?;
        if !resp.status().is_success() {
            return Ok(None);
        }
        let body: OmdbResp = resp.json().await?;
        Ok(body.imdb_rating.filter(|r| r != "N/A"))
    }
}

#[derive(Deserialize, Debug)]
struct OmdbResp {
    #[serde(rename = "imdbRating")]
    imdb_rating: Option<String>,
}
