//! Gemini client for the AI analysis feature.
//!
//! One prompt in, one plain-text summary out. Any transport, auth or decode
//! problem surfaces as a single error at the call site; no retries.

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::Measurement;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const MODEL: &str = "gemini-1.5-flash-latest";

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
        }
    }

    /// Sends the prompt and returns the model's text reply.
    pub async fn summarize(&self, prompt: &str) -> Result<String> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        };
        let url = format!("{API_BASE}/{MODEL}:generateContent?key={}", self.api_key);

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Gemini request failed")?
            .error_for_status()
            .context("Gemini rejected the request")?;

        let body: GenerateContentResponse =
            response.json().await.context("Malformed Gemini response")?;
        extract_text(body).context("Gemini returned no text")
    }
}

fn extract_text(body: GenerateContentResponse) -> Option<String> {
    body.candidates
        .into_iter()
        .next()?
        .content
        .parts
        .into_iter()
        .map(|part| part.text)
        .find(|text| !text.is_empty())
}

/// Diary rows dated within the last `days` days, inclusive of today. The
/// day exactly `days` back is already outside the window.
pub fn recent_rows(rows: &[Measurement], today: NaiveDate, days: i64) -> Vec<Measurement> {
    let cutoff = today - Duration::days(days);
    rows.iter()
        .filter(|row| row.date > cutoff)
        .cloned()
        .collect()
}

/// Builds the Russian care-assistant prompt around the child's profile and
/// the recent diary rows.
pub fn build_summary_prompt(age: &str, sex: &str, rows: &[Measurement]) -> String {
    let mut data = String::new();
    for row in rows {
        data.push_str(&format!(
            "{} {} ({}): пикфлоуметр {}, трудно дышать: {}, кашель: {}, мокрота: {}, лекарства: {}\n",
            row.date.format("%d.%m.%Y"),
            row.time.format("%H:%M"),
            row.period.label(),
            row.reading,
            row.breathing,
            row.cough,
            row.sputum,
            row.medication,
        ));
    }

    format!(
        "Ты — заботливый ИИ-врач, ассистент по имени Бронхитик. Проанализируй данные из \
         дневника здоровья ребенка. Профиль ребенка: возраст {age}, пол {sex}. Данные за \
         последние две недели:\n{data}\nТвоя задача: 1. Кратко оцени общую динамику \
         пикфлоуметрии (стабильная, падает, растет). Обрати внимание на разницу между утром \
         и вечером. 2. Посмотри, есть ли дни с низкими показателями. Если есть, проверь, \
         были ли в эти дни симптомы (кашель, затрудненное дыхание). 3. Сформулируй выводы в \
         2-3 коротких и понятных предложениях. 4. Дай одну главную, ободряющую рекомендацию. \
         Пиши в дружелюбной и поддерживающей манере, обращаясь к родителю."
    )
}
