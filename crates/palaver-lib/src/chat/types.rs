use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_CHAT_MODEL;

pub type ChatId = String;
pub type UserId = String;
pub type ModelId = String;

/// One entry of a chat transcript.
///
/// `role` is `system`, `user` or `assistant` by convention; the store keeps
/// whatever it is given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

/// Backend service a chat is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceId {
    #[serde(rename = "openai-chat-completion")]
    OpenAiChatCompletion,
    #[serde(rename = "openai-completion")]
    OpenAiCompletion,
    #[serde(rename = "openai-edit")]
    OpenAiEdit,
    #[serde(rename = "openai-code-completion")]
    OpenAiCodeCompletion,
    #[serde(rename = "openai-image")]
    OpenAiImage,
}

/// Which model and service a chat targets. Stored as JSON in `serviceInfo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    #[serde(rename = "modelID")]
    pub model_id: ModelId,
    pub service: ServiceId,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            model_id: DEFAULT_CHAT_MODEL.to_string(),
            service: ServiceId::OpenAiChatCompletion,
        }
    }
}

/// A persisted conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    #[serde(rename = "chatID")]
    pub chat_id: ChatId,
    #[serde(rename = "userID")]
    pub user_id: UserId,
    /// Unix timestamp in seconds.
    #[serde(rename = "lastUpdated")]
    pub last_updated: i64,
    #[serde(rename = "chatName")]
    pub chat_name: String,
    #[serde(rename = "serviceInfo")]
    pub service_info: ServiceInfo,
    pub messages: Vec<Message>,
}

/// Per-user selection and pause state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserContext {
    #[serde(rename = "userID")]
    pub user_id: UserId,
    #[serde(rename = "activeChatID")]
    pub active_chat_id: ChatId,
    #[serde(rename = "isPaused")]
    pub is_paused: bool,
}

/// The requested (or implied) chat does not exist for the given user.
///
/// Serializes as `{"errorType": "chat-load-error", "message": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "errorType", rename = "chat-load-error")]
pub struct ChatLoadError {
    pub message: String,
}

impl ChatLoadError {
    pub fn missing(chat_id: &str, user_id: &str) -> Self {
        Self {
            message: format!("Chat {chat_id} does not exist for user {user_id}"),
        }
    }
}

impl fmt::Display for ChatLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ChatLoadError {}
