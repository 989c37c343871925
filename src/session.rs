use crate::search::Found;
use once_cell::sync::Lazy;
use regex::Regex;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;

/* ====== Фильтры ====== */

/// Диапазон лет выпуска: "2021" или "2019-2023".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearRange {
    pub start: u16,
    pub end: u16,
}

static YEARS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})(?:\s*-\s*(\d{4}))?$").unwrap());

impl YearRange {
    /// Строгий разбор: нечисловой ввод и перевёрнутый диапазон отклоняем,
    /// одиночный год превращаем в диапазон год-год.
    pub fn parse(text: &str) -> Option<Self> {
        let caps = YEARS_RE.captures(text.trim())?;
        let start: u16 = caps[1].parse().ok()?;
        let end: u16 = match caps.get(2) {
            Some(m) => m.as_str().parse().ok()?,
            None => start,
        };
        if end < start {
            return None;
        }
        Some(Self { start, end })
    }

    pub fn date_from(&self) -> String {
        format!("{}-01-01", self.start)
    }

    pub fn date_to(&self) -> String {
        format!("{}-12-31", self.end)
    }
}

/// Разбивает ввод по запятым, обрезает пробелы, пустые куски выкидывает.
pub fn split_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Выбранные пользователем фильтры. Отсутствующее поле просто не попадает
/// в discovery-запрос.
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    pub genres: Vec<String>,
    pub actors: Vec<String>,
    pub years: Option<YearRange>,
}

/* ====== Состояние диалога ====== */

/// Чего бот ждёт от пользователя в этом чате.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DialogState {
    #[default]
    Idle,
    AwaitingGenres,
    AwaitingActors,
    AwaitingYears,
}

/* ====== Курсор по результатам ====== */

/// Указатель на текущий элемент списка найденного. Новый поиск всегда
/// заменяет курсор целиком, список на месте не меняется.
#[derive(Debug, Clone, Default)]
pub struct ResultCursor {
    candidates: Vec<Found>,
    position: usize,
}

impl ResultCursor {
    pub fn seed(candidates: Vec<Found>) -> Self {
        Self { candidates, position: 0 }
    }

    /// None — результаты кончились (или их и не было).
    pub fn current(&self) -> Option<&Found> {
        self.candidates.get(self.position)
    }

    /// Сдвиг вперёд без зацикливания и без зажима: за концом `current()`
    /// отвечает None.
    pub fn advance(&mut self) {
        self.position += 1;
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn has_next(&self) -> bool {
        self.position + 1 < self.candidates.len()
    }
}

/* ====== Сессии чатов ====== */

#[derive(Debug, Default)]
pub struct Session {
    pub state: DialogState,
    pub filters: FilterSet,
    pub cursor: ResultCursor,
}

/// Сессии, ключ — chat id. Инжектится в обработчики через dptree,
/// никаких глобалов.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<i64, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Доступ к сессии чата под одним локом; пустая сессия создаётся при
    /// первом обращении.
    pub async fn with<R>(&self, chat_id: i64, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut guard = self.inner.write().await;
        f(guard.entry(chat_id).or_default())
    }

    /// Полный сброс: фильтры, состояние и курсор исчезают атомарно.
    pub async fn reset(&self, chat_id: i64) {
        self.inner.write().await.remove(&chat_id);
    }
}
