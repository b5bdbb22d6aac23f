//! Test doubles shared by the unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::bus::event_types::LlmConfig;
use crate::bus::{NativeBridge, TransportError};
use crate::llm::{LlmClient, LlmError};

/// Records every relayed `(name, payload)` instead of delivering it.
#[derive(Default)]
pub struct RecordingBridge {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingBridge {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NativeBridge for RecordingBridge {
    async fn send(&self, event_name: &str, payload: &str) -> Result<(), TransportError> {
        self.sent
            .lock()
            .unwrap()
            .push((event_name.to_string(), payload.to_string()));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmCall {
    pub endpoint: String,
    pub model: String,
    pub prompt: String,
}

/// Scripted LLM. Replies are consumed in order; once exhausted it answers
/// `"answer from <model>"`. With a gate, each call waits for one permit.
#[derive(Default)]
pub struct StubLlm {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    calls: Mutex<Vec<LlmCall>>,
    gate: Option<Arc<Notify>>,
}

impl StubLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn reply(self, reply: Result<String, LlmError>) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn calls(&self) -> Vec<LlmCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for StubLlm {
    async fn invoke(
        &self,
        endpoint: &str,
        model: &str,
        _api_key: &str,
        prompt: &str,
    ) -> Result<String, LlmError> {
        self.calls.lock().unwrap().push(LlmCall {
            endpoint: endpoint.to_string(),
            model: model.to_string(),
            prompt: prompt.to_string(),
        });
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let scripted = self.replies.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(format!("answer from {model}")))
    }
}

pub fn llm_config(id: &str, enabled: bool) -> LlmConfig {
    LlmConfig {
        id: id.to_string(),
        name: format!("LLM {id}"),
        model_name: format!("model-{id}"),
        base_url: format!("https://{id}.example.com/v1"),
        api_key: format!("sk-{id}"),
        enabled,
    }
}
