//! Reply keyboards and menu texts.

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{KeyboardButton, KeyboardMarkup, ReplyMarkup};

use crate::dialogue::{CANCEL_TEXT, MEDICATION_OPTIONS, NO_TEXT, YES_TEXT};

pub const MEASURE_BUTTON: &str = "✅ Сделать замер";
pub const CHART_BUTTON: &str = "📈 График";
pub const AI_BUTTON: &str = "🤖 Анализ ИИ";

/// Idle menu. Stays on screen, so not one-time.
pub fn main_menu() -> ReplyMarkup {
    ReplyMarkup::Keyboard(
        KeyboardMarkup::new(vec![
            vec![KeyboardButton::new(MEASURE_BUTTON)],
            vec![KeyboardButton::new(CHART_BUTTON), KeyboardButton::new(AI_BUTTON)],
        ])
        .resize_keyboard(),
    )
}

fn dialog_keyboard(rows: Vec<Vec<&str>>) -> ReplyMarkup {
    let rows = rows
        .into_iter()
        .map(|row| row.into_iter().map(KeyboardButton::new).collect::<Vec<_>>())
        .collect::<Vec<_>>();
    ReplyMarkup::Keyboard(
        KeyboardMarkup::new(rows)
            .resize_keyboard()
            .one_time_keyboard(),
    )
}

pub fn cancel_only() -> ReplyMarkup {
    dialog_keyboard(vec![vec![CANCEL_TEXT]])
}

pub fn yes_no() -> ReplyMarkup {
    dialog_keyboard(vec![vec![YES_TEXT, NO_TEXT], vec![CANCEL_TEXT]])
}

pub fn sex_choice() -> ReplyMarkup {
    dialog_keyboard(vec![vec!["Мужской", "Женский"], vec![CANCEL_TEXT]])
}

pub fn medication_choice() -> ReplyMarkup {
    let mut rows: Vec<Vec<&str>> = MEDICATION_OPTIONS.iter().map(|option| vec![*option]).collect();
    rows.push(vec![CANCEL_TEXT]);
    dialog_keyboard(rows)
}

pub fn month_choice(labels: &[String]) -> ReplyMarkup {
    let mut rows: Vec<Vec<&str>> = labels.iter().map(|label| vec![label.as_str()]).collect();
    rows.push(vec![CANCEL_TEXT]);
    dialog_keyboard(rows)
}

pub fn remove_keyboard() -> ReplyMarkup {
    ReplyMarkup::kb_remove()
}

pub async fn send_main_menu(bot: &Bot, chat: ChatId, text: &str) -> Result<()> {
    bot.send_message(chat, text).reply_markup(main_menu()).await?;
    Ok(())
}
