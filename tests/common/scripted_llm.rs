// tests/common/scripted_llm.rs
//! LLM double answering from a fixed table.

use std::sync::Mutex;

use async_trait::async_trait;
use byoa_lib::llm::{LlmClient, LlmError};

#[derive(Default)]
pub struct ScriptedLlm {
    prompts: Mutex<Vec<(String, String)>>,
}

impl ScriptedLlm {
    /// `(model, prompt)` pairs in call order.
    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn invoke(
        &self,
        _endpoint: &str,
        model: &str,
        _api_key: &str,
        prompt: &str,
    ) -> Result<String, LlmError> {
        self.prompts
            .lock()
            .unwrap()
            .push((model.to_string(), prompt.to_string()));
        if model == "offline" {
            return Err(LlmError::Request("connection refused".to_string()));
        }
        Ok(prompt.to_uppercase())
    }
}
