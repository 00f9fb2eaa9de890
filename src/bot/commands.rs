//! Slash-command surface.

use anyhow::Result;
use log::error;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use super::{flows, ui, AppContext};
use crate::dialogue::BotDialogue;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Доступные команды:")]
pub enum Command {
    #[command(description = "главное меню")]
    Start,
    #[command(description = "настроить профиль ребенка")]
    Profile,
    #[command(description = "настроить напоминания")]
    Remind,
    #[command(description = "отключить напоминания")]
    Cancelreminders,
    #[command(description = "полностью удалить все данные")]
    Cleardata,
    #[command(description = "отменить текущее действие")]
    Cancel,
}

pub async fn command_handler(
    bot: Bot,
    dialogue: BotDialogue,
    msg: Message,
    ctx: AppContext,
    cmd: Command,
) -> Result<()> {
    let chat = msg.chat.id;
    match cmd {
        Command::Start => {
            if !flows::check_setup(&bot, &ctx, chat).await? {
                return Ok(());
            }
            let name = msg
                .from
                .as_ref()
                .map(|user| user.first_name.clone())
                .unwrap_or_else(|| "родитель".to_string());
            ui::send_main_menu(&bot, chat, &format!("Привет, {name}! Я помощник Бронхитик.")).await?;
        }
        Command::Profile => flows::start_profile(&bot, &dialogue, chat).await?,
        Command::Remind => flows::start_reminders(&bot, &dialogue, chat).await?,
        Command::Cancelreminders => {
            let text = match ctx.reminders.cancel_reminders(chat).await {
                Ok(true) => "Все ваши напоминания отменены.",
                Ok(false) => "У вас нет активных напоминаний.",
                Err(e) => {
                    error!("Failed to cancel reminders for chat {chat}: {e:#}");
                    "❌ Не получилось отменить напоминания."
                }
            };
            bot.send_message(chat, text).await?;
            ui::send_main_menu(&bot, chat, "Главное меню:").await?;
        }
        Command::Cleardata => flows::start_clear_data(&bot, &dialogue, chat).await?,
        Command::Cancel => flows::cancel(&bot, &dialogue, chat).await?,
    }
    Ok(())
}
