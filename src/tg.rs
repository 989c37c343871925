use crate::fmt;
use crate::omdb::OmdbClient;
use crate::search;
use crate::session::{DialogState, ResultCursor, SessionStore, YearRange, split_list};
use crate::tmdb::{TmdbClient, POSTER_BASE};
use std::net::SocketAddr;
use teloxide::{
    dispatching::{Dispatcher, UpdateFilterExt},
    error_handlers::LoggingErrorHandler,
    prelude::*,
    types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, ParseMode},
    update_listeners::webhooks,
    utils::command::BotCommands,
};
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("telegram: {0}")]
    Telegram(#[from] teloxide::RequestError),
}

/* ====== Команды ====== */

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Команды:")]
enum Command {
    #[command(description = "главное меню")]
    Start,
    #[command(description = "сбросить фильтры")]
    Reset,
    #[command(description = "помощь")]
    Help,
}

pub async fn run(
    bot: Bot,
    tmdb: TmdbClient,
    ratings: OmdbClient,
    sessions: SessionStore,
    webhook: Option<(u16, Url)>,
) -> anyhow::Result<()> {
    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .branch(dptree::entry().filter_command::<Command>().endpoint(on_command))
                .branch(dptree::endpoint(on_text)),
        )
        .branch(Update::filter_callback_query().endpoint(on_callback));

    let mut dispatcher = Dispatcher::builder(bot.clone(), handler)
        .dependencies(dptree::deps![tmdb, ratings, sessions])
        .error_handler(LoggingErrorHandler::with_custom_text("ошибка в обработчике"))
        .enable_ctrlc_handler()
        .build();

    match webhook {
        Some((port, url)) => {
            tracing::info!(%url, port, "запуск в webhook-режиме");
            let addr = SocketAddr::from(([0, 0, 0, 0], port));
            let listener = webhooks::axum(bot, webhooks::Options::new(addr, url)).await?;
            dispatcher
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("ошибка webhook-листенера"),
                )
                .await;
        }
        None => {
            tracing::info!("запуск в режиме long polling");
            dispatcher.dispatch().await;
        }
    }
    Ok(())
}

/* ====== Команды ====== */

async fn on_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    sessions: SessionStore,
) -> Result<(), BotError> {
    match cmd {
        Command::Start => {
            bot.send_message(msg.chat.id, "Привет! Что хочешь сделать?")
                .reply_markup(main_menu())
                .await?;
        }
        Command::Reset => {
            sessions.reset(msg.chat.id.0).await;
            bot.send_message(msg.chat.id, "Фильтры сброшены.")
                .reply_markup(main_menu())
                .await?;
        }
        Command::Help => {
            bot.send_message(msg.chat.id, Command::descriptions().to_string()).await?;
        }
    }
    Ok(())
}

/* ====== Текстовый ввод: конечный автомат диалога ====== */

async fn on_text(bot: Bot, msg: Message, sessions: SessionStore) -> Result<(), BotError> {
    let Some(text) = msg.text() else { return Ok(()) };
    let chat = msg.chat.id;
    let state = sessions.with(chat.0, |s| s.state).await;

    match state {
        DialogState::AwaitingGenres => {
            let genres = split_list(text);
            let summary = genres.join(", ");
            sessions
                .with(chat.0, |s| {
                    s.filters.genres = genres;
                    s.state = DialogState::Idle;
                })
                .await;
            bot.send_message(chat, format!("✅ Жанры: {summary}"))
                .reply_markup(main_menu())
                .await?;
        }
        DialogState::AwaitingActors => {
            let actors = split_list(text);
            let summary = actors.join(", ");
            sessions
                .with(chat.0, |s| {
                    s.filters.actors = actors;
                    s.state = DialogState::Idle;
                })
                .await;
            bot.send_message(chat, format!("✅ Актёры: {summary}"))
                .reply_markup(main_menu())
                .await?;
        }
        DialogState::AwaitingYears => match YearRange::parse(text) {
            Some(range) => {
                sessions
                    .with(chat.0, |s| {
                        s.filters.years = Some(range);
                        s.state = DialogState::Idle;
                    })
                    .await;
                bot.send_message(chat, format!("✅ Годы: {}–{}", range.start, range.end))
                    .reply_markup(main_menu())
                    .await?;
            }
            None => {
                // остаёмся в AwaitingYears и переспрашиваем
                bot.send_message(chat, "Не понял 🤔 Введи год (2021) или диапазон (2019-2023):")
                    .await?;
            }
        },
        DialogState::Idle => {
            bot.send_message(chat, "Выбери действие на клавиатуре 👇")
                .reply_markup(main_menu())
                .await?;
        }
    }
    Ok(())
}

/* ====== Callback-кнопки ======
   genres/actors/years — перейти в режим ввода
   search — запустить поиск
   reset  — сбросить фильтры
   next   — следующий кандидат
   desc:<id> — полное описание */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallbackAction {
    Genres,
    Actors,
    Years,
    Reset,
    Search,
    Next,
    Desc(u64),
    Unknown,
}

fn parse_callback(data: &str) -> CallbackAction {
    match data {
        "genres" => CallbackAction::Genres,
        "actors" => CallbackAction::Actors,
        "years" => CallbackAction::Years,
        "reset" => CallbackAction::Reset,
        "search" => CallbackAction::Search,
        "next" => CallbackAction::Next,
        _ => match data.strip_prefix("desc:").and_then(|s| s.parse().ok()) {
            Some(id) => CallbackAction::Desc(id),
            None => CallbackAction::Unknown,
        },
    }
}

async fn on_callback(
    bot: Bot,
    q: CallbackQuery,
    tmdb: TmdbClient,
    ratings: OmdbClient,
    sessions: SessionStore,
) -> Result<(), BotError> {
    let Some(data) = q.data.clone() else { return Ok(()) };
    let Some(chat) = q.message.as_ref().map(|m| m.chat().id) else { return Ok(()) };
    // сразу снимаем «часики» на кнопке
    bot.answer_callback_query(q.id.clone()).await?;

    match parse_callback(&data) {
        CallbackAction::Genres => {
            sessions.with(chat.0, |s| s.state = DialogState::AwaitingGenres).await;
            let known = tmdb.genre_names().await;
            let prompt = if known.is_empty() {
                "Введи жанры через запятую:".to_string()
            } else {
                format!("Введи жанры через запятую:\n\n📌 {}", known.join(", "))
            };
            bot.send_message(chat, prompt).await?;
        }
        CallbackAction::Actors => {
            sessions.with(chat.0, |s| s.state = DialogState::AwaitingActors).await;
            bot.send_message(chat, "Введи имена актёров через запятую:").await?;
        }
        CallbackAction::Years => {
            sessions.with(chat.0, |s| s.state = DialogState::AwaitingYears).await;
            bot.send_message(chat, "Введи год (2021) или диапазон (2019-2023):").await?;
        }
        CallbackAction::Reset => {
            sessions.reset(chat.0).await;
            bot.send_message(chat, "Фильтры сброшены.").reply_markup(main_menu()).await?;
        }
        CallbackAction::Search => {
            do_search(&bot, chat, &tmdb, &ratings, &sessions).await?;
        }
        CallbackAction::Next => {
            sessions.with(chat.0, |s| s.cursor.advance()).await;
            show_current(&bot, chat, &sessions).await?;
        }
        CallbackAction::Desc(id) => {
            show_description(&bot, chat, &tmdb, id).await?;
        }
        CallbackAction::Unknown => {
            tracing::debug!(%data, "неизвестные callback-данные");
            bot.send_message(chat, "Неизвестная команда 🤷").await?;
        }
    }
    Ok(())
}

/* ====== Поиск и показ карточек ====== */

async fn do_search(
    bot: &Bot,
    chat: ChatId,
    tmdb: &TmdbClient,
    ratings: &OmdbClient,
    sessions: &SessionStore,
) -> Result<(), BotError> {
    let filters = sessions.with(chat.0, |s| s.filters.clone()).await;
    bot.send_message(chat, "🔎 Ищу...").await?;

    let found = search::run_search(tmdb, ratings, &filters).await;
    if found.is_empty() {
        bot.send_message(chat, "Ничего не нашёл 😕")
            .reply_markup(main_menu())
            .await?;
        return Ok(());
    }
    sessions.with(chat.0, |s| s.cursor = ResultCursor::seed(found)).await;
    show_current(bot, chat, sessions).await
}

async fn show_current(bot: &Bot, chat: ChatId, sessions: &SessionStore) -> Result<(), BotError> {
    let (current, has_next, position) = sessions
        .with(chat.0, |s| (s.cursor.current().cloned(), s.cursor.has_next(), s.cursor.position()))
        .await;
    tracing::debug!(chat = chat.0, position, has_next, "показ карточки");

    let Some(found) = current else {
        bot.send_message(chat, "😔 Больше нет!").reply_markup(main_menu()).await?;
        return Ok(());
    };

    let caption = fmt::candidate_caption(&found);
    let kb = candidate_keyboard(found.movie.id, has_next);
    let poster = found
        .movie
        .poster_path
        .as_deref()
        .and_then(|p| format!("{POSTER_BASE}{p}").parse::<Url>().ok());

    match poster {
        Some(url) => {
            bot.send_photo(chat, InputFile::url(url))
                .caption(caption)
                .parse_mode(ParseMode::MarkdownV2)
                .reply_markup(kb)
                .await?;
        }
        None => {
            bot.send_message(chat, caption)
                .parse_mode(ParseMode::MarkdownV2)
                .reply_markup(kb)
                .await?;
        }
    }
    Ok(())
}

async fn show_description(
    bot: &Bot,
    chat: ChatId,
    tmdb: &TmdbClient,
    id: u64,
) -> Result<(), BotError> {
    match tmdb.movie_details(id).await {
        Ok(Some(details)) => {
            bot.send_message(chat, fmt::details_text(&details))
                .parse_mode(ParseMode::MarkdownV2)
                .await?;
        }
        Ok(None) | Err(_) => {
            bot.send_message(chat, "Не удалось получить описание 😕").await?;
        }
    }
    Ok(())
}

/* ====== Кнопки ====== */

fn main_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new([
        vec![InlineKeyboardButton::callback("🎞 Указать жанры", "genres")],
        vec![InlineKeyboardButton::callback("🎭 Указать актёров", "actors")],
        vec![InlineKeyboardButton::callback("📅 Указать годы", "years")],
        vec![InlineKeyboardButton::callback("🔎 Найти фильмы", "search")],
        vec![InlineKeyboardButton::callback("🔄 Сбросить фильтры", "reset")],
    ])
}

fn candidate_keyboard(movie_id: u64, has_next: bool) -> InlineKeyboardMarkup {
    let mut rows = vec![vec![InlineKeyboardButton::callback(
        "📖 Описание",
        format!("desc:{movie_id}"),
    )]];
    if has_next {
        rows.push(vec![InlineKeyboardButton::callback("➡ Далее", "next")]);
    }
    rows.extend(main_menu().inline_keyboard);
    InlineKeyboardMarkup::new(rows)
}
