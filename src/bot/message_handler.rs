//! Routes plain text messages by the chat's current dialogue state.

use anyhow::Result;
use log::debug;
use teloxide::prelude::*;

use super::{flows, ui, AppContext};
use crate::dialogue::{BotDialogue, DialogueState, CANCEL_TEXT};

pub async fn message_handler(
    bot: Bot,
    dialogue: BotDialogue,
    msg: Message,
    ctx: AppContext,
) -> Result<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let chat = msg.chat.id;
    let state = dialogue.get().await?.unwrap_or_default();
    debug!("Message from chat {chat} in state {state:?}");

    // The cancel text works in every state.
    if text == CANCEL_TEXT {
        return flows::cancel(&bot, &dialogue, chat).await;
    }

    match state {
        DialogueState::Idle => match text {
            ui::MEASURE_BUTTON => flows::start_measurement(&bot, &dialogue, &ctx, chat).await,
            ui::CHART_BUTTON => flows::start_chart(&bot, &dialogue, &ctx, chat).await,
            ui::AI_BUTTON => flows::ai_report(&bot, &ctx, chat).await,
            _ => {
                bot.send_message(chat, "Я не поняла. Выберите действие на клавиатуре.")
                    .reply_markup(ui::main_menu())
                    .await?;
                Ok(())
            }
        },
        DialogueState::AwaitingReading => flows::handle_reading(&bot, &dialogue, chat, text).await,
        DialogueState::AwaitingBreathing { reading } => {
            flows::handle_breathing(&bot, &dialogue, chat, text, reading).await
        }
        DialogueState::AwaitingCough { reading, breathing } => {
            flows::handle_cough(&bot, &dialogue, chat, text, reading, breathing).await
        }
        DialogueState::AwaitingSputum {
            reading,
            breathing,
            cough,
        } => flows::handle_sputum(&bot, &dialogue, chat, text, reading, breathing, cough).await,
        DialogueState::AwaitingMedication {
            reading,
            breathing,
            cough,
            sputum,
        } => {
            flows::handle_medication(
                &bot, &dialogue, &ctx, chat, text, reading, breathing, cough, sputum,
            )
            .await
        }
        DialogueState::AwaitingDateOfBirth => {
            flows::handle_date_of_birth(&bot, &dialogue, chat, text).await
        }
        DialogueState::AwaitingSex { date_of_birth } => {
            flows::handle_sex(&bot, &dialogue, &ctx, &msg, text, date_of_birth).await
        }
        DialogueState::AwaitingReminderTimes => {
            flows::handle_reminder_times(&bot, &dialogue, &ctx, chat, text).await
        }
        DialogueState::AwaitingChartMonth { months } => {
            flows::handle_chart_month(&bot, &dialogue, &ctx, chat, text, months).await
        }
        DialogueState::AwaitingWipeConfirm => {
            flows::handle_wipe_confirm(&bot, &dialogue, &ctx, chat, text).await
        }
    }
}
