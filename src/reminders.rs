//! Reminder lifecycle: the mapping of chat -> scheduled trigger names.

use anyhow::Result;
use chrono::NaiveTime;
use log::{info, warn};
use std::sync::Arc;
use teloxide::types::ChatId;

use crate::models::{reminder_job_name, ReminderSet};
use crate::scheduler::{JobCallback, JobRegistry};
use crate::store::Store;

/// Message delivered by every reminder trigger.
pub const REMINDER_TEXT: &str = "Не забудь сделать замер! 🌸";

/// Owns reminder registration and persistence. The notification callback is
/// injected so the manager never touches the bot transport directly.
pub struct ReminderManager {
    store: Arc<Store>,
    registry: Arc<JobRegistry>,
    notify: JobCallback,
}

impl ReminderManager {
    pub fn new(store: Arc<Store>, registry: Arc<JobRegistry>, notify: JobCallback) -> Self {
        Self {
            store,
            registry,
            notify,
        }
    }

    /// Replaces a chat's reminders wholesale. Any jobs of an existing set
    /// are cancelled before the new ones register, so calling this twice
    /// with the same times leaves exactly two live triggers, never four.
    pub async fn set_reminders(&self, chat: ChatId, times: [NaiveTime; 2]) -> Result<()> {
        if let Some(existing) = self.store.reminder_set(chat.0).await {
            for name in &existing.job_names {
                self.registry.cancel(name);
            }
        }

        let mut job_names = Vec::with_capacity(times.len());
        for (index, at) in times.iter().enumerate() {
            let name = reminder_job_name(chat.0, index);
            self.registry
                .register_daily(&name, *at, chat, Arc::clone(&self.notify));
            job_names.push(name);
        }

        let set = ReminderSet {
            times: times.to_vec(),
            job_names,
        };
        self.store.set_reminder_set(chat.0, &set).await?;
        info!("Reminders for chat {chat} set to {:?}", set.times);
        Ok(())
    }

    /// Cancels all reminders of a chat. Returns `false` when there was
    /// nothing to cancel; that is not an error.
    pub async fn cancel_reminders(&self, chat: ChatId) -> Result<bool> {
        match self.store.reminder_set(chat.0).await {
            None => Ok(false),
            Some(set) => {
                for name in &set.job_names {
                    self.registry.cancel(name);
                }
                self.store.delete_reminder_set(chat.0).await?;
                info!("Cancelled all reminders for chat {chat}");
                Ok(true)
            }
        }
    }

    /// Replays every persisted reminder set after a restart. A set whose
    /// times and job names disagree is logged and skipped; the remaining
    /// chats still restore. Returns the number of re-registered triggers.
    pub async fn restore_on_startup(&self) -> Result<usize> {
        let mut restored = 0;
        for (owner, set) in self.store.all_reminder_sets().await? {
            if !set.is_consistent() {
                warn!("Skipping inconsistent reminder set for chat {owner}");
                continue;
            }
            for (index, at) in set.times.iter().enumerate() {
                self.registry.register_daily(
                    &set.job_names[index],
                    *at,
                    ChatId(owner),
                    Arc::clone(&self.notify),
                );
                restored += 1;
            }
        }
        Ok(restored)
    }
}
