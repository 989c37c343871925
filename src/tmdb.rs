use crate::session::YearRange;
use reqwest::Client;
use serde::Deserialize;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;

const DEFAULT_BASE: &str = "https://api.themoviedb.org/3";
pub const POSTER_BASE: &str = "https://image.tmdb.org/t/p/w500";

#[derive(Clone)]
pub struct TmdbClient {
    api_key: String,
    base_url: String,
    http: Client,
    // name (lowercase) -> id; заполняется лениво один раз на процесс.
    // Гонка при первом заполнении безобидна: содержимое идемпотентно.
    genres: Arc<RwLock<HashMap<String, u64>>>,
}

impl TmdbClient {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE.to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            api_key,
            base_url,
            http: Client::new(),
            genres: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Жанры по именам: нормализуем (trim + lowercase), опечатки
    /// подтягиваем к ближайшему известному жанру, безнадёжное молча
    /// отбрасываем. Таблицу тянем из TMDb при первом обращении.
    pub async fn genre_ids(&self, names: &[String]) -> Vec<u64> {
        let table = self.genre_table().await;
        let mut ids = Vec::new();
        for name in names {
            let normalized = name.trim().to_lowercase();
            let found = table
                .get(&normalized)
                .copied()
                .or_else(|| closest_genre(&table, &normalized));
            match found {
                Some(id) if !ids.contains(&id) => ids.push(id),
                Some(_) => {}
                None => tracing::debug!(genre = %name, "жанр не найден, пропускаю"),
            }
        }
        ids
    }

    /// Известные имена жанров (для подсказки в чате), по алфавиту.
    pub async fn genre_names(&self) -> Vec<String> {
        let table = self.genre_table().await;
        let mut names: Vec<String> = table.into_keys().collect();
        names.sort();
        names
    }

    async fn genre_table(&self) -> HashMap<String, u64> {
        {
            let cached = self.genres.read().await;
            if !cached.is_empty() {
                return cached.clone();
            }
        }
        let url = format!("{}/genre/movie/list?language=ru", self.base_url);
        let fetched = match self.get_json::<GenreListResp>(&url).await {
            Ok(Some(resp)) => resp
                .genres
                .into_iter()
                .map(|g| (g.name.to_lowercase(), g.id))
                .collect::<HashMap<_, _>>(),
            Ok(None) | Err(_) => {
                tracing::warn!("не удалось получить список жанров TMDb");
                return HashMap::new();
            }
        };
        if !fetched.is_empty() {
            let mut cached = self.genres.write().await;
            *cached = fetched.clone();
        }
        fetched
    }

    /// Идентификаторы актёров: по одному поиску на имя, берём первый матч,
    /// имена без результатов отбрасываем.
    pub async fn person_ids(&self, names: &[String]) -> Vec<u64> {
        let mut ids = Vec::new();
        for name in names {
            let url = format!(
                "{}/search/person?query={}&language=ru-RU&include_adult=false&page=1",
                self.base_url,
                urlencoding::encode(name.trim())
            );
            match self.get_json::<PersonSearchResp>(&url).await {
                Ok(Some(resp)) => match resp.results.first() {
                    Some(p) => ids.push(p.id),
                    None => tracing::debug!(actor = %name, "актёр не найден, пропускаю"),
                },
                Ok(None) | Err(_) => {
                    tracing::warn!(actor = %name, "поиск актёра не удался, пропускаю")
                }
            }
        }
        ids
    }

    /// Одна страница discovery: популярность по убыванию, рейтинг источника
    /// от 8. Порядок результатов — как отдал TMDb.
    pub async fn discover(&self, q: &DiscoverQuery, page: u32) -> reqwest::Result<Vec<Movie>> {
        let url = format!("{}/discover/movie", self.base_url);
        let mut params: Vec<(&str, String)> = vec![
            ("language", "ru-RU".to_string()),
            ("include_adult", "false".to_string()),
            ("sort_by", "popularity.desc".to_string()),
            ("vote_average.gte", "8".to_string()),
            ("page", page.to_string()),
        ];
        if !q.genre_ids.is_empty() {
            // запятая = AND по всем жанрам
            params.push(("with_genres", join_ids(&q.genre_ids)));
        }
        if !q.actor_ids.is_empty() {
            params.push(("with_cast", join_ids(&q.actor_ids)));
        }
        if let Some(years) = &q.years {
            params.push(("primary_release_date.gte", years.date_from()));
            params.push(("primary_release_date.lte", years.date_to()));
        }
        let resp = self
            .http
            .get(url)
            .query(&params)
            .bearer_auth(self.api_key.clone())
            .send()
            .await?;
        if !resp.status().is_success() {
            return Ok(vec![]);
        }
        let data: DiscoverResp = resp.json().await?;
        Ok(data.results)
    }

    /// Детали фильма (полное описание + страны производства).
    pub async fn movie_details(&self, id: u64) -> reqwest::Result<Option<MovieDetails>> {
        let url = format!("{}/movie/{}?language=ru-RU", self.base_url, id);
        self.get_json(&url).await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> reqwest::Result<Option<T>> {
        let resp = self.http.get(url).bearer_auth(self.api_key.clone()).send().await?;
        if !resp.status().is_success() {
            return Ok(None);
        }
        Ok(Some(resp.json().await?))
    }
}

fn join_ids(ids: &[u64]) -> String {
    ids.iter().map(u64::to_string).collect::<Vec<_>>().join(",")
}

// порог схожести для исправления опечаток в жанрах («комедоя» -> «комедия»)
const GENRE_MATCH_CUTOFF: f64 = 0.6;

fn closest_genre(table: &HashMap<String, u64>, name: &str) -> Option<u64> {
    table
        .iter()
        .map(|(known, id)| (strsim::normalized_levenshtein(name, known), *id))
        .filter(|(score, _)| *score >= GENRE_MATCH_CUTOFF)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, id)| id)
}

/// Критерии discovery после разрешения имён в идентификаторы.
#[derive(Debug, Clone, Default)]
pub struct DiscoverQuery {
    pub genre_ids: Vec<u64>,
    pub actor_ids: Vec<u64>,
    pub years: Option<YearRange>,
}

/* ======= DTOs ======= */

#[derive(Deserialize, Debug, Clone)]
pub struct Movie {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub original_title: String,
    #[serde(default)]
    pub overview: String,
    pub poster_path: Option<String>,
    pub release_date: Option<String>,
    #[serde(default)]
    pub vote_average: f32,
}

impl Movie {
    pub fn release_year(&self) -> Option<&str> {
        self.release_date.as_deref().and_then(|d| d.get(..4))
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct MovieDetails {
    pub title: String,
    #[serde(default)]
    pub overview: String,
    pub release_date: Option<String>,
    #[serde(default)]
    pub vote_average: f32,
    #[serde(default)]
    pub production_countries: Vec<Country>,
}

impl MovieDetails {
    pub fn release_year(&self) -> Option<&str> {
        self.release_date.as_deref().and_then(|d| d.get(..4))
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct Country {
    pub name: String,
}

#[derive(Deserialize, Debug)]
struct DiscoverResp {
    results: Vec<Movie>,
}

#[derive(Deserialize, Debug)]
struct GenreListResp {
    genres: Vec<Genre>,
}

#[derive(Deserialize, Debug)]
struct Genre {
    id: u64,
    name: String,
}

#[derive(Deserialize, Debug)]
struct PersonSearchResp {
    results: Vec<Person>,
}

#[derive(Deserialize, Debug)]
struct Person {
    id: u64,
}
