//! LLM invocation used by the popup workflow.

mod openai_compat;

use async_trait::async_trait;

pub use openai_compat::{chat_completions_url, OpenAiCompatClient, SYSTEM_PROMPT};

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("auth error: {0}")]
    Auth(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(value: reqwest::Error) -> Self {
        Self::Request(value.to_string())
    }
}

/// One-shot prompt completion against an OpenAI-compatible endpoint.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn invoke(
        &self,
        endpoint: &str,
        model: &str,
        api_key: &str,
        prompt: &str,
    ) -> Result<String, LlmError>;
}
