use crate::omdb::OmdbClient;
use crate::session::FilterSet;
use crate::tmdb::{DiscoverQuery, Movie, TmdbClient};
use rand::seq::SliceRandom;
use std::time::Duration;

/// Порог внешнего рейтинга и потолок сканируемых страниц discovery.
pub const RATING_THRESHOLD: f32 = 8.0;
pub const MAX_PAGES: u32 = 9;

// пауза между страницами, чтобы не упереться в лимит OMDb
const PAGE_PAUSE: Duration = Duration::from_millis(300);

/// Кандидат, прошедший через фильтр рейтинга. None в рейтинге — сервис
/// рейтингов выключен, в карточке будет заглушка.
#[derive(Debug, Clone)]
pub struct Found {
    pub movie: Movie,
    pub imdb_rating: Option<String>,
}

/// Полный цикл поиска: имена -> идентификаторы -> постраничный скан с
/// фильтром по рейтингу. Пустой результат — «ничего не нашлось», не ошибка.
pub async fn run_search(tmdb: &TmdbClient, ratings: &OmdbClient, filters: &FilterSet) -> Vec<Found> {
    let query = DiscoverQuery {
        genre_ids: tmdb.genre_ids(&filters.genres).await,
        actor_ids: tmdb.person_ids(&filters.actors).await,
        years: filters.years,
    };
    find_qualifying(tmdb, ratings, &query, MAX_PAGES, RATING_THRESHOLD).await
}

/// Скан страниц 1..=max_pages. Каждую страницу перемешиваем (чтобы одни и
/// те же фильтры не давали один и тот же фильм), затем первый кандидат с
/// рейтингом >= threshold принимается, и скан останавливается целиком.
/// Неудачный запрос рейтинга считается «не прошёл», не ошибкой.
pub async fn find_qualifying(
    tmdb: &TmdbClient,
    ratings: &OmdbClient,
    query: &DiscoverQuery,
    max_pages: u32,
    threshold: f32,
) -> Vec<Found> {
    let mut found = Vec::new();
    'pages: for page in 1..=max_pages {
        if page > 1 {
            tokio::time::sleep(PAGE_PAUSE).await;
        }
        let mut batch = match tmdb.discover(query, page).await {
            Ok(batch) => batch,
            Err(e) => {
                tracing::warn!(page, error = %e, "discovery не удался, прекращаю скан");
                break;
            }
        };
        if batch.is_empty() {
            break;
        }
        batch.shuffle(&mut rand::thread_rng());
        for movie in batch {
            if !ratings.is_enabled() {
                // деградация: без сервиса рейтингов берём первого кандидата
                found.push(Found { movie, imdb_rating: None });
                break 'pages;
            }
            let rating = ratings.rating(lookup_title(&movie)).await;
            let qualifies = rating
                .as_deref()
                .and_then(|r| r.parse::<f32>().ok())
                .is_some_and(|r| r >= threshold);
            tracing::debug!(title = %movie.title, ?rating, qualifies, "проверка кандидата");
            if qualifies {
                found.push(Found { movie, imdb_rating: rating });
                break 'pages;
            }
        }
    }
    found
}

// OMDb матчит только по тексту названия, поэтому спрашиваем оригинальное
fn lookup_title(movie: &Movie) -> &str {
    if movie.original_title.is_empty() {
        &movie.title
    } else {
        &movie.original_title
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn movie_json(id: u64, title: &str) -> serde_json::Value {
        json!({
            "id": id,
            "title": title,
            "original_title": title,
            "overview": "описание",
            "vote_average": 8.2,
            "release_date": "2021-05-01"
        })
    }

    async fn mount_discover_page(server: &MockServer, page: &str, results: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/discover/movie"))
            .and(query_param("page", page))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": results })))
            .mount(server)
            .await;
    }

    async fn mount_rating(server: &MockServer, title: &str, rating: &str) {
        Mock::given(method("GET"))
            .and(path("/"))
            .and(query_param("t", title))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Title": title, "imdbRating": rating, "Response": "True"
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn first_qualifying_candidate_stops_the_scan() {
        let catalog = MockServer::start().await;
        let rating_srv = MockServer::start().await;

        // страница 1: никто не проходит, страница 2: проходит только "c"
        mount_discover_page(
            &catalog,
            "1",
            json!([movie_json(1, "a1"), movie_json(2, "a2")]),
        )
        .await;
        mount_discover_page(
            &catalog,
            "2",
            json!([movie_json(3, "b"), movie_json(4, "x"), movie_json(5, "c")]),
        )
        .await;
        // страница 3 существует, но до неё дойти не должны
        Mock::given(method("GET"))
            .and(path("/discover/movie"))
            .and(query_param("page", "3"))
            .respond_with(ResponseTemplate::new(200)
                .set_body_json(json!({ "results": [movie_json(6, "d")] })))
            .expect(0)
            .mount(&catalog)
            .await;

        mount_rating(&rating_srv, "a1", "6.0").await;
        mount_rating(&rating_srv, "a2", "7.9").await;
        mount_rating(&rating_srv, "b", "5.5").await;
        mount_rating(&rating_srv, "x", "N/A").await;
        mount_rating(&rating_srv, "c", "8.1").await;

        let tmdb = TmdbClient::with_base_url("k".into(), catalog.uri());
        let omdb = OmdbClient::with_base_url(Some("k".into()), rating_srv.uri());

        let found = find_qualifying(&tmdb, &omdb, &DiscoverQuery::default(), 9, 8.0).await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].movie.id, 5);
        assert_eq!(found[0].imdb_rating.as_deref(), Some("8.1"));
    }

    #[tokio::test]
    async fn nothing_qualifying_is_empty_not_an_error() {
        let catalog = MockServer::start().await;
        let rating_srv = MockServer::start().await;

        mount_discover_page(&catalog, "1", json!([movie_json(1, "слабый")])).await;
        mount_discover_page(&catalog, "2", json!([])).await;
        mount_rating(&rating_srv, "слабый", "6.1").await;

        let tmdb = TmdbClient::with_base_url("k".into(), catalog.uri());
        let omdb = OmdbClient::with_base_url(Some("k".into()), rating_srv.uri());

        let found = find_qualifying(&tmdb, &omdb, &DiscoverQuery::default(), 9, 8.0).await;
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn rating_lookup_failure_means_does_not_qualify() {
        let catalog = MockServer::start().await;
        let rating_srv = MockServer::start().await;

        mount_discover_page(
            &catalog,
            "1",
            json!([movie_json(1, "сломанный"), movie_json(2, "целый")]),
        )
        .await;
        mount_discover_page(&catalog, "2", json!([])).await;
        Mock::given(method("GET"))
            .and(path("/"))
            .and(query_param("t", "сломанный"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&rating_srv)
            .await;
        mount_rating(&rating_srv, "целый", "9.0").await;

        let tmdb = TmdbClient::with_base_url("k".into(), catalog.uri());
        let omdb = OmdbClient::with_base_url(Some("k".into()), rating_srv.uri());

        let found = find_qualifying(&tmdb, &omdb, &DiscoverQuery::default(), 9, 8.0).await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].movie.id, 2);
    }

    #[tokio::test]
    async fn disabled_ratings_admit_first_candidate_with_placeholder() {
        let catalog = MockServer::start().await;
        mount_discover_page(&catalog, "1", json!([movie_json(1, "единственный")])).await;

        let tmdb = TmdbClient::with_base_url("k".into(), catalog.uri());
        let omdb = OmdbClient::new(None);

        let found = find_qualifying(&tmdb, &omdb, &DiscoverQuery::default(), 9, 8.0).await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].imdb_rating, None);
    }

    #[tokio::test]
    async fn end_to_end_genre_search_finds_single_title() {
        let catalog = MockServer::start().await;
        let rating_srv = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/genre/movie/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "genres": [{"id": 35, "name": "комедия"}]
            })))
            .mount(&catalog)
            .await;
        Mock::given(method("GET"))
            .and(path("/discover/movie"))
            .and(query_param("with_genres", "35"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [movie_json(2997, "Иван Васильевич меняет профессию")]
            })))
            .mount(&catalog)
            .await;
        Mock::given(method("GET"))
            .and(path("/discover/movie"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [] })))
            .mount(&catalog)
            .await;
        mount_rating(&rating_srv, "Иван Васильевич меняет профессию", "9.0").await;

        let tmdb = TmdbClient::with_base_url("k".into(), catalog.uri());
        let omdb = OmdbClient::with_base_url(Some("k".into()), rating_srv.uri());
        let filters = FilterSet { genres: vec!["комедия".into()], ..Default::default() };

        let found = run_search(&tmdb, &omdb, &filters).await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].movie.title, "Иван Васильевич меняет профессию");
        assert_eq!(found[0].imdb_rating.as_deref(), Some("9.0"));
    }
}
