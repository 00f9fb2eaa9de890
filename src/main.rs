use anyhow::Result;
use chrono::NaiveTime;
use log::{error, info};
use std::sync::Arc;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::prelude::*;
use teloxide::types::InputFile;

use peakflow_bot::bot::{commands, message_handler, AppContext};
use peakflow_bot::config::Config;
use peakflow_bot::dialogue::DialogueState;
use peakflow_bot::llm::GeminiClient;
use peakflow_bot::models::now_msk;
use peakflow_bot::reminders::{ReminderManager, REMINDER_TEXT};
use peakflow_bot::report;
use peakflow_bot::scheduler::{JobCallback, JobFuture, JobRegistry};
use peakflow_bot::store::Store;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::init();

    // Load environment variables from .env file
    dotenv::dotenv().ok();
    let config = Config::from_env()?;

    info!("Starting peak-flow diary bot");

    let store = Arc::new(Store::open(&config.database_path, &config.cache_dir)?);
    let registry = Arc::new(JobRegistry::new());
    let bot = Bot::new(&config.bot_token);

    // Reminder triggers deliver a fixed message to their chat.
    let notify: JobCallback = {
        let bot = bot.clone();
        Arc::new(move |chat: ChatId| {
            let bot = bot.clone();
            Box::pin(async move {
                if let Err(e) = bot.send_message(chat, REMINDER_TEXT).await {
                    error!("Failed to deliver reminder to chat {chat}: {e}");
                }
            }) as JobFuture
        })
    };

    let reminders = Arc::new(ReminderManager::new(
        Arc::clone(&store),
        Arc::clone(&registry),
        notify,
    ));
    let restored = reminders.restore_on_startup().await?;
    info!("Restored {restored} reminder triggers from the store");

    // One daily trigger drives the monthly chart dispatch; the dispatcher
    // itself decides whether today is the first of a month.
    {
        let bot = bot.clone();
        let store = Arc::clone(&store);
        let dispatch_at = NaiveTime::from_hms_opt(0, 5, 0).expect("00:05 is a valid time");
        registry.register_daily(
            report::DISPATCH_JOB_NAME,
            dispatch_at,
            ChatId(0),
            Arc::new(move |_chat| {
                let bot = bot.clone();
                let store = Arc::clone(&store);
                Box::pin(async move {
                    let today = now_msk().date_naive();
                    let send_chart = |chat: ChatId, png: Vec<u8>, caption: String| {
                        let bot = bot.clone();
                        async move {
                            bot.send_photo(chat, InputFile::memory(png))
                                .caption(caption)
                                .await?;
                            Ok(())
                        }
                    };
                    if let Err(e) = report::dispatch_monthly_charts(&store, today, send_chart).await
                    {
                        error!("Monthly chart dispatch failed: {e:#}");
                    }
                }) as JobFuture
            }),
        );
    }

    let ctx = AppContext {
        store,
        reminders,
        llm: config.gemini_api_key.clone().map(|key| Arc::new(GeminiClient::new(key))),
    };
    if ctx.llm.is_none() {
        info!("GEMINI_API_KEY not set, AI analysis disabled");
    }

    let handler = Update::filter_message()
        .enter_dialogue::<Message, InMemStorage<DialogueState>, DialogueState>()
        .branch(
            dptree::entry()
                .filter_command::<commands::Command>()
                .endpoint(commands::command_handler),
        )
        .branch(dptree::endpoint(message_handler));

    info!("Bot initialized, starting dispatcher");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![InMemStorage::<DialogueState>::new(), ctx])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
