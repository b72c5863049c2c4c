//! Question answering against the loaded dataset.
//!
//! The dataset is rendered as aligned text, capped in size, and sent together
//! with the question to an OpenAI-compatible completions endpoint.

use std::time::Duration;

use log::info;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::domain::{QaSettings, Table};
use crate::error::{AppError, ServiceError};
use crate::report::{cell_text, table_lines};
use crate::services::http::{build_client, post_json, with_single_retry};

/// Environment variable holding the API credential.
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";

/// A text-completion backend.
pub trait TextCompletion {
    fn complete(&self, prompt: &str) -> Result<String, ServiceError>;
}

/// One question and its answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub question: String,
    pub answer: String,
}

/// Running log of exchanges for the current session.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    exchanges: Vec<Exchange>,
}

impl Conversation {
    pub fn push(&mut self, exchange: Exchange) {
        self.exchanges.push(exchange);
    }

    pub fn exchanges(&self) -> &[Exchange] {
        &self.exchanges
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    pub fn last(&self) -> Option<&Exchange> {
        self.exchanges.last()
    }
}

/// Render the table as text, never longer than `max_chars` characters.
///
/// Only the leading rows that could fit are rendered, so column widths come
/// from those rows. When rows are cut, a final `... (N more rows omitted)`
/// line says how many.
pub fn build_context(table: &Table, max_chars: usize) -> String {
    let candidates = rows_within_budget(table, max_chars);
    let lines = table_lines(&table.head(candidates.max(1)));
    if candidates == table.len() {
        let full = lines.join("\n");
        if full.chars().count() <= max_chars {
            return full;
        }
    }

    let mut iter = lines.into_iter();
    let header = iter.next().unwrap_or_default();

    // Reserve room for the footer using the largest count it could show.
    let reserve = omitted_footer(table.len()).chars().count() + 1;

    let mut out = header;
    let mut used = out.chars().count();
    let mut kept = 0;
    for row in iter.take(candidates) {
        let len = row.chars().count() + 1;
        if used + len + reserve > max_chars {
            break;
        }
        out.push('\n');
        out.push_str(&row);
        used += len;
        kept += 1;
    }

    out.push('\n');
    out.push_str(&omitted_footer(table.len() - kept));

    if out.chars().count() > max_chars {
        // Header alone is over budget.
        return out.chars().take(max_chars).collect();
    }
    out
}

/// Leading rows whose cell text alone (two separator spaces per cell plus a
/// newline) stays within `max_chars`. A rendered row is never shorter.
fn rows_within_budget(table: &Table, max_chars: usize) -> usize {
    let mut used = 0;
    for (i, row) in table.rows().iter().enumerate() {
        used += row.iter().map(|v| cell_text(v).chars().count() + 2).sum::<usize>() + 1;
        if used > max_chars {
            return i;
        }
    }
    table.len()
}

fn omitted_footer(n: usize) -> String {
    format!("... ({n} more rows omitted)")
}

/// Context block followed by the question.
pub fn compose_prompt(context: &str, question: &str) -> String {
    format!("{context}\n\nQuestion: {question}\nAnswer:")
}

/// Ask one question about `table`.
pub fn ask(
    completer: &dyn TextCompletion,
    table: &Table,
    question: &str,
    max_context_chars: usize,
) -> Result<Exchange, AppError> {
    let question = question.trim();
    if question.is_empty() {
        return Err(AppError::new(2, "Type a question first."));
    }

    let context = build_context(table, max_context_chars);
    let prompt = compose_prompt(&context, question);
    info!("asking: {} prompt chars", prompt.chars().count());

    let answer = completer.complete(&prompt)?;
    Ok(Exchange {
        question: question.to_string(),
        answer: answer.trim().to_string(),
    })
}

/// OpenAI-compatible completions client.
pub struct CompletionClient {
    client: Client,
    endpoint: String,
    model: String,
    max_tokens: u32,
    api_key: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    text: String,
}

impl CompletionClient {
    /// Build a client with the credential read from the environment (or `.env`).
    pub fn from_env(settings: &QaSettings, timeout: Duration) -> Result<Self, ServiceError> {
        dotenvy::dotenv().ok();
        let api_key = std::env::var(API_KEY_VAR)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ServiceError::MissingCredential(API_KEY_VAR))?;
        Self::new(settings, api_key, timeout)
    }

    pub fn new(settings: &QaSettings, api_key: String, timeout: Duration) -> Result<Self, ServiceError> {
        Ok(Self {
            client: build_client(timeout)?,
            endpoint: format!("{}/completions", settings.base_url.trim_end_matches('/')),
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            api_key,
            timeout,
        })
    }
}

impl TextCompletion for CompletionClient {
    fn complete(&self, prompt: &str) -> Result<String, ServiceError> {
        let request = CompletionRequest {
            model: &self.model,
            prompt,
            max_tokens: self.max_tokens,
        };

        let response: CompletionResponse = with_single_retry("completion", || {
            post_json(&self.client, &self.endpoint, Some(&self.api_key), &request, self.timeout)
        })?;

        response
            .choices
            .into_iter()
            .next()
            .map(|c| c.text.trim().to_string())
            .ok_or_else(|| ServiceError::Decode("completion response has no choices".to_string()))
    }
}
