use serde::Serialize;
use serde_json::{Map, Value};

use crate::chat::types::Message;

/// Token ID (as a string) to bias value.
pub type LogitBias = Map<String, Value>;

/// Body of `POST /completions`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
    pub n: u32,
    pub stream: bool,
    pub echo: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<String>,
    pub presence_penalty: f64,
    pub frequency_penalty: f64,
    pub best_of: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logit_bias: Option<LogitBias>,
    pub user: String,
}

/// Body of `POST /chat/completions`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
    pub n: u32,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<String>,
    pub presence_penalty: f64,
    pub frequency_penalty: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logit_bias: Option<LogitBias>,
    pub user: String,
}

impl ChatCompletionRequest {
    /// Turn a plain completion request into a chat request.
    ///
    /// The prompt becomes the single user message, preceded by `system` when
    /// it is non-empty. `best_of` and `echo` have no chat equivalent and are
    /// dropped.
    pub fn from_completion(request: CompletionRequest, system: Option<&str>) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system
            && !system.is_empty()
        {
            messages.push(Message::system(system));
        }
        messages.push(Message::user(request.prompt));

        Self {
            model: request.model,
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            top_p: request.top_p,
            n: request.n,
            stream: request.stream,
            stop: request.stop,
            presence_penalty: request.presence_penalty,
            frequency_penalty: request.frequency_penalty,
            logit_bias: request.logit_bias,
            user: request.user,
        }
    }
}
