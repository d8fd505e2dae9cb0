use async_trait::async_trait;

use crate::error::AppResult;

#[async_trait]
pub trait LanguageModelService: Send + Sync {
    /// Human-readable model name for the output disclaimer.
    fn model_name(&self) -> String;

    /// Complete a prompt. An empty completion is an error, never `Ok("")`.
    async fn summarize(&self, prompt: &str) -> AppResult<String>;
}
