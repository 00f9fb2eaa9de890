//! Conversation state for the guided dialog flows, plus the input
//! validators they share.
//!
//! State lives in teloxide's in-memory dialogue storage, keyed by chat. It
//! is transient by design: a restart drops any in-flight dialog.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use teloxide::dispatching::dialogue::{Dialogue, InMemStorage};

/// Universal cancel text, recognized in every state.
pub const CANCEL_TEXT: &str = "Отмена";
pub const YES_TEXT: &str = "Да";
pub const NO_TEXT: &str = "Нет";

pub const MEDICATION_OPTIONS: [&str; 3] = ["Базисная терапия", "Назначения при болезни", "Нет"];

/// Per-chat dialog position. Collected answers ride along in the variants,
/// so a re-prompt never loses earlier answers.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub enum DialogueState {
    #[default]
    Idle,
    // Measurement flow
    AwaitingReading,
    AwaitingBreathing {
        reading: i64,
    },
    AwaitingCough {
        reading: i64,
        breathing: String,
    },
    AwaitingSputum {
        reading: i64,
        breathing: String,
        cough: String,
    },
    AwaitingMedication {
        reading: i64,
        breathing: String,
        cough: String,
        sputum: String,
    },
    // Profile flow
    AwaitingDateOfBirth,
    AwaitingSex {
        date_of_birth: NaiveDate,
    },
    // Reminder flow
    AwaitingReminderTimes,
    // Chart flow; the offered keyboard labels constrain the valid answers
    AwaitingChartMonth {
        months: Vec<String>,
    },
    // Clear-data flow
    AwaitingWipeConfirm,
}

pub type BotDialogue = Dialogue<DialogueState, InMemStorage<DialogueState>>;

/// The peak-flow reading must be an integer.
pub fn parse_reading(input: &str) -> Result<i64, &'static str> {
    input.trim().parse::<i64>().map_err(|_| "not-a-number")
}

/// Date of birth in the fixed `DD.MM.YYYY` pattern.
pub fn parse_date_of_birth(input: &str) -> Result<NaiveDate, &'static str> {
    NaiveDate::parse_from_str(input.trim(), "%d.%m.%Y").map_err(|_| "bad-date")
}

/// Exactly two `HH:MM` tokens. Partial valid input is discarded wholesale;
/// there is no such thing as saving one of the two times.
pub fn parse_reminder_times(input: &str) -> Result<[NaiveTime; 2], &'static str> {
    let tokens: Vec<&str> = input.split_whitespace().collect();
    if tokens.len() != 2 {
        return Err("need-two-times");
    }
    let first = NaiveTime::parse_from_str(tokens[0], "%H:%M").map_err(|_| "bad-time")?;
    let second = NaiveTime::parse_from_str(tokens[1], "%H:%M").map_err(|_| "bad-time")?;
    Ok([first, second])
}

pub fn is_yes_no(input: &str) -> bool {
    input == YES_TEXT || input == NO_TEXT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reading_must_be_an_integer() {
        assert_eq!(parse_reading("320"), Ok(320));
        assert_eq!(parse_reading("  280 "), Ok(280));
        assert!(parse_reading("триста").is_err());
        assert!(parse_reading("320.5").is_err());
        assert!(parse_reading("").is_err());
    }

    #[test]
    fn test_date_of_birth_format_is_fixed() {
        assert_eq!(
            parse_date_of_birth("15.06.2018"),
            Ok(NaiveDate::from_ymd_opt(2018, 6, 15).unwrap())
        );
        assert!(parse_date_of_birth("2018-06-15").is_err());
        assert!(parse_date_of_birth("31.02.2020").is_err(), "impossible date");
        assert!(parse_date_of_birth("15/06/2018").is_err());
    }

    #[test]
    fn test_reminder_times_require_exactly_two_tokens() {
        let times = parse_reminder_times("08:00 20:30").unwrap();
        assert_eq!(times[0], NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        assert_eq!(times[1], NaiveTime::from_hms_opt(20, 30, 0).unwrap());

        assert_eq!(parse_reminder_times("08:00"), Err("need-two-times"));
        assert_eq!(
            parse_reminder_times("08:00 12:00 20:30"),
            Err("need-two-times")
        );
        // One valid token does not get partially saved.
        assert_eq!(parse_reminder_times("08:00 25:70"), Err("bad-time"));
        assert_eq!(parse_reminder_times("утром вечером"), Err("bad-time"));
    }

    #[test]
    fn test_yes_no_is_exact_match() {
        assert!(is_yes_no("Да"));
        assert!(is_yes_no("Нет"));
        assert!(!is_yes_no("да"));
        assert!(!is_yes_no("ДА"));
        assert!(!is_yes_no("может быть"));
    }

    #[test]
    fn test_default_state_is_idle() {
        assert!(matches!(DialogueState::default(), DialogueState::Idle));
    }
}
