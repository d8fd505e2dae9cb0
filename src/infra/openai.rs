use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    Client, StatusCode,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};
use crate::services::LanguageModelService;

const INITIAL_RETRY_DELAY: Duration = Duration::from_secs(1);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

pub struct OpenAiClient {
    http: Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
    max_attempts: u32,
    initial_delay: Duration,
}

impl OpenAiClient {
    pub fn new(api_url: String, api_key: Option<String>, model: String, max_attempts: u32) -> Self {
        Self {
            http: Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            max_attempts: max_attempts.max(1),
            initial_delay: INITIAL_RETRY_DELAY,
        }
    }

    #[cfg(test)]
    fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    fn api_key(&self) -> AppResult<&str> {
        self.api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| AppError::Configuration("OpenAI API key not configured".to_string()))
    }

    async fn complete_once(&self, api_key: &str, prompt: &str) -> Result<String, Attempt> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.api_url))
            .header(AUTHORIZATION, format!("Bearer {api_key}"))
            .header(CONTENT_TYPE, "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|err| Attempt::Retry(format!("failed to call OpenAI: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unable to read response>".to_string());
            let message = format!("OpenAI responded with {status}: {body}");
            return Err(if is_transient(status) {
                Attempt::Retry(message)
            } else {
                Attempt::Fatal(message)
            });
        }

        let payload: ChatResponse = response
            .json()
            .await
            .map_err(|err| Attempt::Fatal(format!("failed to parse OpenAI response: {err}")))?;

        payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| Attempt::Fatal("OpenAI returned empty content".to_string()))
    }
}

enum Attempt {
    Retry(String),
    Fatal(String),
}

fn is_transient(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[async_trait]
impl LanguageModelService for OpenAiClient {
    fn model_name(&self) -> String {
        format!("OpenAI {}", self.model)
    }

    /// Up to `max_attempts` calls, backing off exponentially between
    /// transient failures.
    async fn summarize(&self, prompt: &str) -> AppResult<String> {
        let api_key = self.api_key()?;
        let mut delay = self.initial_delay;
        let mut attempt = 1;

        loop {
            match self.complete_once(api_key, prompt).await {
                Ok(content) => {
                    debug!(attempt, "completion received");
                    return Ok(content);
                }
                Err(Attempt::Retry(message)) if attempt < self.max_attempts => {
                    warn!(attempt, ?delay, %message, "transient OpenAI failure, retrying");
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(MAX_RETRY_DELAY);
                    attempt += 1;
                }
                Err(Attempt::Retry(message) | Attempt::Fatal(message)) => {
                    return Err(AppError::LanguageModel(message));
                }
            }
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}
