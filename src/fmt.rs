use crate::search::Found;
use crate::tmdb::MovieDetails;
use unicode_segmentation::UnicodeSegmentation;

/// Спецсимволы Telegram MarkdownV2, включая сам обратный слэш — иначе `\`
/// в чужом тексте «съест» следующий символ. Экранируем весь внешний текст
/// (названия, описания, рейтинги), но не собственные метки бота.
const MD2_SPECIAL: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!', '\\',
];

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if MD2_SPECIAL.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Обрезка по графемам, чтобы не разрезать эмодзи и диакритику.
pub fn clip(text: &str, max: usize) -> String {
    let mut graphemes = text.graphemes(true);
    let head: String = graphemes.by_ref().take(max).collect();
    if graphemes.next().is_some() {
        head + "…"
    } else {
        head
    }
}

const PLACEHOLDER_RATING: &str = "N/A";
// описание прячем под спойлер и укорачиваем: лимит подписи к фото — 1024
const OVERVIEW_LIMIT: usize = 600;

/// Подпись карточки: название, рейтинги, год, описание под спойлером.
pub fn candidate_caption(found: &Found) -> String {
    let movie = &found.movie;
    let mut lines = vec![format!("🎬 *{}*", escape(&movie.title))];
    lines.push(format!("⭐ TMDB: {}", escape(&format!("{:.1}", movie.vote_average))));
    lines.push(format!(
        "🏆 IMDb: {}",
        escape(found.imdb_rating.as_deref().unwrap_or(PLACEHOLDER_RATING))
    ));
    if let Some(year) = movie.release_year() {
        lines.push(format!("📅 {}", escape(year)));
    }
    if !movie.overview.trim().is_empty() {
        lines.push(format!("||{}||", escape(&clip(movie.overview.trim(), OVERVIEW_LIMIT))));
    }
    lines.join("\n")
}

/// Детальный вид по кнопке «Описание»: полное описание + страны.
pub fn details_text(details: &MovieDetails) -> String {
    let mut lines = vec![format!("🎬 *{}*", escape(&details.title))];
    let year = details.release_year().unwrap_or("");
    let countries = details
        .production_countries
        .iter()
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    match (year.is_empty(), countries.is_empty()) {
        (false, false) => lines.push(format!("📅 {} · {}", escape(year), escape(&countries))),
        (false, true) => lines.push(format!("📅 {}", escape(year))),
        (true, false) => lines.push(format!("🌍 {}", escape(&countries))),
        (true, true) => {}
    }
    lines.push(format!("⭐ TMDB: {}", escape(&format!("{:.1}", details.vote_average))));
    if details.overview.trim().is_empty() {
        lines.push("_нет описания_".to_string());
    } else {
        lines.push(format!("||{}||", escape(&clip(details.overview.trim(), 3000))));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tmdb::{Country, Movie};

    fn found(title: &str, overview: &str, rating: Option<&str>) -> Found {
        Found {
            movie: Movie {
                id: 1,
                title: title.to_string(),
                original_title: title.to_string(),
                overview: overview.to_string(),
                poster_path: None,
                release_date: Some("2021-05-01".to_string()),
                vote_average: 8.25,
            },
            imdb_rating: rating.map(str::to_string),
        }
    }

    #[test]
    fn escape_covers_the_whole_markdown_charset() {
        assert_eq!(
            escape("_*[]()~`>#+-=|{}.!"),
            r"\_\*\[\]\(\)\~\`\>\#\+\-\=\|\{\}\.\!"
        );
        assert_eq!(escape("Матрица: перезагрузка"), "Матрица: перезагрузка");
    }

    #[test]
    fn literal_backslash_is_escaped_too() {
        assert_eq!(escape(r"обратный \ слэш"), r"обратный \\ слэш");
        assert_eq!(escape(r"\."), r"\\\.");
    }

    #[test]
    fn escape_never_strips_existing_escapes() {
        let once = escape("8.1 (IMDb)");
        let twice = escape(&once);
        // повторное экранирование только добавляет обратные слэши
        assert!(twice.matches('\\').count() > once.matches('\\').count());
        assert!(twice.contains(r"\\"));
    }

    #[test]
    fn clip_counts_graphemes() {
        assert_eq!(clip("короткий", 100), "короткий");
        assert_eq!(clip("абвгд", 3), "абв…");
        assert_eq!(clip("🙂🙂🙂", 2), "🙂🙂…");
    }

    #[test]
    fn caption_hides_overview_behind_spoiler() {
        let caption = candidate_caption(&found("Дюна. Часть вторая", "Пол мстит.", Some("8.5")));
        assert!(caption.contains(r"🎬 *Дюна\. Часть вторая*"));
        assert!(caption.contains(r"⭐ TMDB: 8\.2"));
        assert!(caption.contains(r"🏆 IMDb: 8\.5"));
        assert!(caption.contains("📅 2021"));
        assert!(caption.contains(r"||Пол мстит\.||"));
    }

    #[test]
    fn caption_uses_placeholder_without_rating_service() {
        let caption = candidate_caption(&found("Фильм", "", None));
        assert!(caption.contains("🏆 IMDb: N/A"));
        assert!(!caption.contains("||"));
    }

    #[test]
    fn details_join_year_and_countries() {
        let details = MovieDetails {
            title: "Матрица".to_string(),
            overview: "Хакер узнаёт правду.".to_string(),
            release_date: Some("1999-03-30".to_string()),
            vote_average: 8.2,
            production_countries: vec![Country { name: "США".to_string() }],
        };
        let text = details_text(&details);
        assert!(text.contains("📅 1999 · США"));
        assert!(text.contains(r"||Хакер узнаёт правду\.||"));
    }
}
