use crate::chat::types::Message;
use crate::completion::request::{ChatCompletionRequest, CompletionRequest, LogitBias};
use crate::config::{DEFAULT_LOCAL_ENDPOINT, DEFAULT_OPENAI_ENDPOINT, DEFAULT_REMOTE_USER};
use crate::context::ExecutionContext;
use crate::error::KnownSafeError;

pub const DEFAULT_TEMPERATURE: f64 = 0.6;
pub const DEFAULT_MAX_TOKENS: u32 = 1024;
pub const DEFAULT_PROMPT_JOINER: &str = "\n";

/// Validated API options for one completion run.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOptions {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    /// Number of choices to request (`n`).
    pub repeat: u32,
    pub frequency_penalty: f64,
    pub presence_penalty: f64,
    pub top_p: f64,
    pub best_of: u32,
    pub echo: bool,
    pub logit_bias: Option<LogitBias>,
    pub stop: Option<String>,
    pub stream: bool,
    pub user: String,
    /// Base URL of the OpenAI-compatible API.
    pub endpoint: String,
    /// System message for chat models.
    pub system: Option<String>,
}

impl CompletionOptions {
    pub fn with_defaults(model: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            repeat: 1,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            top_p: 1.0,
            best_of: 1,
            echo: false,
            logit_bias: None,
            stop: None,
            stream: false,
            user: user.into(),
            endpoint: DEFAULT_OPENAI_ENDPOINT.to_string(),
            system: None,
        }
    }

    /// Clamp options a remote caller is not allowed to choose: the API user
    /// is forced and streaming is off.
    #[must_use]
    pub fn restricted_to(mut self, ctx: &ExecutionContext) -> Self {
        if ctx.is_remote() {
            self.user = DEFAULT_REMOTE_USER.to_string();
            self.stream = false;
        }
        self
    }

    pub fn completion_request(&self, prompt: &str) -> CompletionRequest {
        CompletionRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
            n: self.repeat,
            stream: self.stream,
            echo: self.echo,
            stop: self.stop.clone(),
            presence_penalty: self.presence_penalty,
            frequency_penalty: self.frequency_penalty,
            best_of: self.best_of,
            logit_bias: self.logit_bias.clone(),
            user: self.user.clone(),
        }
    }

    /// A chat request for a single prompt, with the system message if set.
    pub fn single_turn_chat_request(&self, prompt: &str) -> ChatCompletionRequest {
        ChatCompletionRequest::from_completion(
            self.completion_request(prompt),
            self.system.as_deref(),
        )
    }

    /// A chat request carrying a full conversation history.
    pub fn chat_request(&self, messages: Vec<Message>) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
            n: self.repeat,
            stream: self.stream,
            stop: self.stop.clone(),
            presence_penalty: self.presence_penalty,
            frequency_penalty: self.frequency_penalty,
            logit_bias: self.logit_bias.clone(),
            user: self.user.clone(),
        }
    }
}

/// How prompt pieces are glued together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptLayout {
    pub joiner: String,
    pub trailing_newline: bool,
}

impl PromptLayout {
    /// `no_joiner` wins over an explicit `joiner`.
    pub fn new(joiner: Option<&str>, no_joiner: bool, no_trailing_newline: bool) -> Self {
        let joiner = if no_joiner {
            ""
        } else {
            joiner.unwrap_or(DEFAULT_PROMPT_JOINER)
        };
        Self {
            joiner: joiner.to_string(),
            trailing_newline: !no_trailing_newline,
        }
    }
}

impl Default for PromptLayout {
    fn default() -> Self {
        Self::new(None, false, false)
    }
}

/// Resolve `--endpoint` / `--local` to a base URL, falling back to `default`.
///
/// An explicit endpoint overrides `--local`; the endpoint `local` is an alias
/// for the llama.cpp server default.
pub fn resolve_endpoint(endpoint: Option<&str>, local: bool, default: &str) -> String {
    let url = match endpoint {
        Some("local") => DEFAULT_LOCAL_ENDPOINT,
        Some(url) => url,
        None if local => DEFAULT_LOCAL_ENDPOINT,
        None => default,
    };
    url.trim_end_matches('/').to_string()
}

/// Parse `--logit-bias`, which must be a JSON object.
pub fn parse_logit_bias(raw: &str) -> Result<LogitBias, KnownSafeError> {
    serde_json::from_str::<LogitBias>(raw).map_err(|e| {
        KnownSafeError::new(format!(
            "[ERROR] --logit-bias must be a JSON object mapping token IDs to bias values: {e}"
        ))
    })
}
