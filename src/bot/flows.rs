//! The guided dialog steps and their terminal effects.
//!
//! Every non-terminal step validates its input synchronously: a bad answer
//! re-prompts the same state without touching earlier answers or any
//! persisted data. Terminal steps persist first and confirm only on
//! success.

use anyhow::Result;
use chrono::Timelike;
use log::error;
use teloxide::prelude::*;
use teloxide::types::InputFile;

use super::{ui, AppContext};
use crate::chart;
use crate::dialogue::{
    is_yes_no, parse_date_of_birth, parse_reading, parse_reminder_times, BotDialogue,
    DialogueState, MEDICATION_OPTIONS,
};
use crate::llm;
use crate::models::{now_msk, Measurement, Period, Profile, Sex};

/// Measurement, chart and AI flows require a complete profile and an
/// existing reminder set. Redirects to the missing setup step otherwise.
pub async fn check_setup(bot: &Bot, ctx: &AppContext, chat: ChatId) -> Result<bool> {
    if ctx.store.profile(chat.0).await.is_none() {
        bot.send_message(
            chat,
            "Сначала нужно настроить профиль! Пожалуйста, используйте команду /profile.",
        )
        .reply_markup(ui::remove_keyboard())
        .await?;
        return Ok(false);
    }
    if ctx.store.reminder_set(chat.0).await.is_none() {
        bot.send_message(
            chat,
            "Отлично! Профиль настроен. Теперь нужно настроить напоминания. \
             Используйте команду /remind.",
        )
        .reply_markup(ui::remove_keyboard())
        .await?;
        return Ok(false);
    }
    Ok(true)
}

/// Shared cancel: discards the in-flight dialog and shows the idle menu.
pub async fn cancel(bot: &Bot, dialogue: &BotDialogue, chat: ChatId) -> Result<()> {
    dialogue.exit().await?;
    ui::send_main_menu(bot, chat, "Действие отменено.").await
}

// --- Measurement flow ---

pub async fn start_measurement(
    bot: &Bot,
    dialogue: &BotDialogue,
    ctx: &AppContext,
    chat: ChatId,
) -> Result<()> {
    if !check_setup(bot, ctx, chat).await? {
        return Ok(());
    }
    bot.send_message(chat, "Давай запишем показания. Какое число показал прибор?")
        .reply_markup(ui::cancel_only())
        .await?;
    dialogue.update(DialogueState::AwaitingReading).await?;
    Ok(())
}

pub async fn handle_reading(
    bot: &Bot,
    dialogue: &BotDialogue,
    chat: ChatId,
    text: &str,
) -> Result<()> {
    match parse_reading(text) {
        Ok(reading) => {
            bot.send_message(chat, "Дышать было трудно?")
                .reply_markup(ui::yes_no())
                .await?;
            dialogue
                .update(DialogueState::AwaitingBreathing { reading })
                .await?;
        }
        Err(_) => {
            bot.send_message(chat, "Это не похоже на число. Попробуй еще раз.")
                .await?;
        }
    }
    Ok(())
}

pub async fn handle_breathing(
    bot: &Bot,
    dialogue: &BotDialogue,
    chat: ChatId,
    text: &str,
    reading: i64,
) -> Result<()> {
    if !is_yes_no(text) {
        bot.send_message(chat, "Пожалуйста, используйте кнопки.").await?;
        return Ok(());
    }
    bot.send_message(chat, "А кашель был?")
        .reply_markup(ui::yes_no())
        .await?;
    dialogue
        .update(DialogueState::AwaitingCough {
            reading,
            breathing: text.to_string(),
        })
        .await?;
    Ok(())
}

pub async fn handle_cough(
    bot: &Bot,
    dialogue: &BotDialogue,
    chat: ChatId,
    text: &str,
    reading: i64,
    breathing: String,
) -> Result<()> {
    if !is_yes_no(text) {
        bot.send_message(chat, "Пожалуйста, используйте кнопки.").await?;
        return Ok(());
    }
    bot.send_message(chat, "Мокрота была?")
        .reply_markup(ui::yes_no())
        .await?;
    dialogue
        .update(DialogueState::AwaitingSputum {
            reading,
            breathing,
            cough: text.to_string(),
        })
        .await?;
    Ok(())
}

pub async fn handle_sputum(
    bot: &Bot,
    dialogue: &BotDialogue,
    chat: ChatId,
    text: &str,
    reading: i64,
    breathing: String,
    cough: String,
) -> Result<()> {
    if !is_yes_no(text) {
        bot.send_message(chat, "Пожалуйста, используйте кнопки.").await?;
        return Ok(());
    }
    bot.send_message(chat, "Какие-то лекарства принимал(а)?")
        .reply_markup(ui::medication_choice())
        .await?;
    dialogue
        .update(DialogueState::AwaitingMedication {
            reading,
            breathing,
            cough,
            sputum: text.to_string(),
        })
        .await?;
    Ok(())
}

/// Terminal step of the measurement flow: appends one diary row with the
/// age and sex snapshotted from the profile at write time.
#[allow(clippy::too_many_arguments)]
pub async fn handle_medication(
    bot: &Bot,
    dialogue: &BotDialogue,
    ctx: &AppContext,
    chat: ChatId,
    text: &str,
    reading: i64,
    breathing: String,
    cough: String,
    sputum: String,
) -> Result<()> {
    if !MEDICATION_OPTIONS.contains(&text) {
        bot.send_message(chat, "Пожалуйста, используйте кнопки.").await?;
        return Ok(());
    }
    bot.send_message(chat, "Спасибо! Сейчас все запишу...").await?;

    let now = now_msk();
    let (age, sex) = match ctx.store.profile(chat.0).await {
        Some(profile) => (
            profile.age_on(now.date_naive()),
            profile.sex.label().to_string(),
        ),
        // Unreachable through the flow (check_setup gates entry), but the
        // row stays writable if the profile vanished mid-dialog.
        None => ("н/д".to_string(), "н/д".to_string()),
    };

    // Sequence number from the shared diary row count; racy under
    // concurrent writers, accepted.
    let seq = match ctx.store.measurement_count().await {
        Ok(count) => count + 1,
        Err(e) => {
            error!("Failed to read diary row count: {e:#}");
            1
        }
    };

    let measurement = Measurement {
        seq,
        date: now.date_naive(),
        time: now.time(),
        period: Period::from_msk_hour(now.hour()),
        reading,
        breathing,
        cough,
        sputum,
        medication: text.to_string(),
        age,
        sex,
    };

    match ctx.store.append_measurement(chat.0, &measurement).await {
        Ok(()) => ui::send_main_menu(bot, chat, "✅ Готово! Все записала. Молодец!").await?,
        Err(e) => {
            error!("Failed to append diary row for chat {chat}: {e:#}");
            ui::send_main_menu(bot, chat, "❌ Ой, не смогла сохранить данные.").await?;
        }
    }
    dialogue.exit().await?;
    Ok(())
}

// --- Profile flow ---

pub async fn start_profile(bot: &Bot, dialogue: &BotDialogue, chat: ChatId) -> Result<()> {
    bot.send_message(
        chat,
        "Давайте настроим профиль. Введите дату рождения ребенка (ДД.ММ.ГГГГ).",
    )
    .reply_markup(ui::cancel_only())
    .await?;
    dialogue.update(DialogueState::AwaitingDateOfBirth).await?;
    Ok(())
}

pub async fn handle_date_of_birth(
    bot: &Bot,
    dialogue: &BotDialogue,
    chat: ChatId,
    text: &str,
) -> Result<()> {
    match parse_date_of_birth(text) {
        Ok(date_of_birth) => {
            bot.send_message(chat, "Отлично! Теперь выберите пол ребенка:")
                .reply_markup(ui::sex_choice())
                .await?;
            dialogue
                .update(DialogueState::AwaitingSex { date_of_birth })
                .await?;
        }
        Err(_) => {
            bot.send_message(chat, "Неверный формат. Попробуйте еще раз (ДД.ММ.ГГГГ).")
                .await?;
        }
    }
    Ok(())
}

/// Terminal step of the profile flow; overwrites the profile wholesale and
/// chains straight into the reminder flow.
pub async fn handle_sex(
    bot: &Bot,
    dialogue: &BotDialogue,
    ctx: &AppContext,
    msg: &Message,
    text: &str,
    date_of_birth: chrono::NaiveDate,
) -> Result<()> {
    let chat = msg.chat.id;
    let Some(sex) = Sex::parse(text) else {
        bot.send_message(chat, "Пожалуйста, используйте кнопки.").await?;
        return Ok(());
    };

    let display_name = msg
        .from
        .as_ref()
        .map(|user| user.first_name.clone())
        .unwrap_or_default();
    let profile = Profile {
        date_of_birth,
        sex,
        display_name,
    };

    match ctx.store.set_profile(chat.0, &profile).await {
        Ok(()) => {
            bot.send_message(
                chat,
                "Профиль успешно сохранен! Теперь давайте настроим напоминания.",
            )
            .await?;
            start_reminders(bot, dialogue, chat).await?;
        }
        Err(e) => {
            error!("Failed to save profile for chat {chat}: {e:#}");
            ui::send_main_menu(bot, chat, "❌ Не получилось сохранить профиль.").await?;
            dialogue.exit().await?;
        }
    }
    Ok(())
}

// --- Reminder flow ---

pub async fn start_reminders(bot: &Bot, dialogue: &BotDialogue, chat: ChatId) -> Result<()> {
    bot.send_message(chat, "Введите время для напоминаний (например: 08:00 20:30).")
        .reply_markup(ui::cancel_only())
        .await?;
    dialogue.update(DialogueState::AwaitingReminderTimes).await?;
    Ok(())
}

pub async fn handle_reminder_times(
    bot: &Bot,
    dialogue: &BotDialogue,
    ctx: &AppContext,
    chat: ChatId,
    text: &str,
) -> Result<()> {
    let times = match parse_reminder_times(text) {
        Ok(times) => times,
        Err(_) => {
            bot.send_message(
                chat,
                "Неверный формат. Пожалуйста, введите два времени (например, 08:00 20:30).",
            )
            .await?;
            return Ok(());
        }
    };

    match ctx.reminders.set_reminders(chat, times).await {
        Ok(()) => {
            ui::send_main_menu(
                bot,
                chat,
                "Отлично! Напоминания установлены. Теперь все готово к работе!",
            )
            .await?;
        }
        Err(e) => {
            error!("Failed to save reminders for chat {chat}: {e:#}");
            ui::send_main_menu(bot, chat, "❌ Не получилось сохранить напоминания.").await?;
        }
    }
    dialogue.exit().await?;
    Ok(())
}

// --- Chart flow ---

pub async fn start_chart(
    bot: &Bot,
    dialogue: &BotDialogue,
    ctx: &AppContext,
    chat: ChatId,
) -> Result<()> {
    if !check_setup(bot, ctx, chat).await? {
        return Ok(());
    }
    bot.send_message(chat, "Собираю данные для выбора периода...").await?;

    let rows = match ctx.store.all_measurements().await {
        Ok(rows) => rows,
        Err(e) => {
            error!("Failed to read diary rows for chat {chat}: {e:#}");
            return ui::send_main_menu(bot, chat, "❌ Произошла ошибка при чтении данных из таблицы.")
                .await;
        }
    };
    if rows.is_empty() {
        return ui::send_main_menu(bot, chat, "В таблице пока нет данных для построения графика.")
            .await;
    }

    let months: Vec<String> = chart::available_months(&rows)
        .into_iter()
        .map(|(year, month)| chart::month_label(year, month))
        .collect();
    bot.send_message(chat, "Пожалуйста, выберите месяц для построения графика:")
        .reply_markup(ui::month_choice(&months))
        .await?;
    dialogue
        .update(DialogueState::AwaitingChartMonth { months })
        .await?;
    Ok(())
}

/// Terminal step of the chart flow: renders or reports "no data".
pub async fn handle_chart_month(
    bot: &Bot,
    dialogue: &BotDialogue,
    ctx: &AppContext,
    chat: ChatId,
    text: &str,
    months: Vec<String>,
) -> Result<()> {
    // Only the offered keyboard labels are valid answers.
    let selection = chart::parse_month_label(text)
        .filter(|_| months.iter().any(|label| label == text));
    let Some((year, month)) = selection else {
        bot.send_message(
            chat,
            "Не удалось распознать месяц. Пожалуйста, попробуйте еще раз, используя кнопки.",
        )
        .await?;
        return Ok(());
    };

    bot.send_message(chat, format!("Готовлю график за {text}...")).await?;

    let rows = match ctx.store.all_measurements().await {
        Ok(rows) => rows,
        Err(e) => {
            error!("Failed to read diary rows for chat {chat}: {e:#}");
            ui::send_main_menu(bot, chat, "❌ Произошла ошибка при чтении данных из таблицы.")
                .await?;
            dialogue.exit().await?;
            return Ok(());
        }
    };

    match chart::aggregate(&rows, year, month) {
        None => {
            ui::send_main_menu(bot, chat, &format!("Нет данных за {text} для построения графика."))
                .await?;
        }
        Some(series) => match chart::render_png(&series) {
            Ok(png) => {
                match bot.send_photo(chat, InputFile::memory(png)).await {
                    Ok(_) => ui::send_main_menu(bot, chat, "Вот твой график!").await?,
                    Err(e) => {
                        error!("Failed to deliver chart to chat {chat}: {e:#}");
                        ui::send_main_menu(bot, chat, "❌ Не удалось отправить график.").await?;
                    }
                }
            }
            Err(e) => {
                error!("Failed to render chart for chat {chat}: {e:#}");
                ui::send_main_menu(bot, chat, "❌ Не удалось отправить график.").await?;
            }
        },
    }
    dialogue.exit().await?;
    Ok(())
}

// --- Clear-data flow ---

pub async fn start_clear_data(bot: &Bot, dialogue: &BotDialogue, chat: ChatId) -> Result<()> {
    bot.send_message(
        chat,
        "ВНИМАНИЕ! Вы собираетесь полностью удалить все данные. Это действие необратимо. \
         Вы уверены?",
    )
    .reply_markup(ui::yes_no())
    .await?;
    dialogue.update(DialogueState::AwaitingWipeConfirm).await?;
    Ok(())
}

/// Terminal step of the clear-data flow: wipes the chat's collections and
/// chains into the profile setup.
pub async fn handle_wipe_confirm(
    bot: &Bot,
    dialogue: &BotDialogue,
    ctx: &AppContext,
    chat: ChatId,
    text: &str,
) -> Result<()> {
    match text.trim().to_lowercase().as_str() {
        "да" => {
            bot.send_message(chat, "Начинаю очистку данных...").await?;

            // Live reminder jobs go first so nothing fires for wiped data.
            if let Err(e) = ctx.reminders.cancel_reminders(chat).await {
                error!("Failed to cancel reminders while wiping chat {chat}: {e:#}");
            }
            match ctx.store.wipe_owner(chat.0).await {
                Ok(()) => {
                    bot.send_message(
                        chat,
                        "✅ Все данные успешно очищены! Теперь давайте настроим ваш профиль.",
                    )
                    .await?;
                    start_profile(bot, dialogue, chat).await?;
                }
                Err(e) => {
                    error!("Failed to wipe data for chat {chat}: {e:#}");
                    bot.send_message(chat, "❌ Произошла ошибка при очистке данных.").await?;
                    dialogue.exit().await?;
                }
            }
        }
        "нет" | "отмена" => cancel(bot, dialogue, chat).await?,
        _ => {
            bot.send_message(chat, "Пожалуйста, ответьте 'Да' или 'Нет'.").await?;
        }
    }
    Ok(())
}

// --- AI analysis (precondition-gated, not a dialog) ---

pub async fn ai_report(bot: &Bot, ctx: &AppContext, chat: ChatId) -> Result<()> {
    if !check_setup(bot, ctx, chat).await? {
        return Ok(());
    }
    let Some(client) = ctx.llm.as_ref() else {
        return ui::send_main_menu(bot, chat, "Функция ИИ-анализа не настроена.").await;
    };

    bot.send_message(
        chat,
        "🤖 Минутку, отправляю данные на анализ Искусственному Интеллекту...",
    )
    .await?;

    let rows = match ctx.store.all_measurements().await {
        Ok(rows) => rows,
        Err(e) => {
            error!("Failed to read diary rows for chat {chat}: {e:#}");
            return ui::send_main_menu(bot, chat, "❌ Не могу получить доступ к данным.").await;
        }
    };
    let recent = llm::recent_rows(&rows, now_msk().date_naive(), 14);
    if recent.is_empty() {
        return ui::send_main_menu(
            bot,
            chat,
            "Недостаточно данных за последние 2 недели для анализа.",
        )
        .await;
    }

    let (age, sex) = match ctx.store.profile(chat.0).await {
        Some(profile) => (
            profile.age_on(now_msk().date_naive()),
            profile.sex.label().to_string(),
        ),
        None => ("не указан".to_string(), "н/д".to_string()),
    };
    let prompt = llm::build_summary_prompt(&age, &sex, &recent);

    match client.summarize(&prompt).await {
        Ok(summary) => {
            bot.send_message(chat, summary)
                .reply_markup(ui::remove_keyboard())
                .await?;
            ui::send_main_menu(bot, chat, "ИИ-анализ завершен.").await?;
        }
        Err(e) => {
            error!("Gemini summary failed for chat {chat}: {e:#}");
            ui::send_main_menu(bot, chat, "❌ Не удалось получить ответ от ИИ. Попробуйте позже.")
                .await?;
        }
    }
    Ok(())
}
