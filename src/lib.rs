//! # Peak-Flow Diary Telegram Bot
//!
//! A Telegram bot that helps a parent log a child's peak-flow measurements
//! through guided dialogs, stores them in a measurement diary, schedules
//! twice-daily reminders, renders monthly trend charts and can forward
//! recent data to an LLM for a plain-language summary.

pub mod bot;
pub mod chart;
pub mod config;
pub mod dialogue;
pub mod llm;
pub mod models;
pub mod reminders;
pub mod report;
pub mod scheduler;
pub mod store;
