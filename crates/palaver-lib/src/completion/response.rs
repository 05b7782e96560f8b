use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::client::CompletionError;
use crate::error::{KnownSafeError, NO_CHOICES_ERROR, NO_TEXT_ERROR};

#[derive(Debug, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
pub struct CompletionChoice {
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub message: Option<ChatContent>,
}

#[derive(Debug, Deserialize)]
pub struct ChatContent {
    #[serde(default)]
    pub content: Option<String>,
}

/// One `data:` event of a streamed chat completion.
#[derive(Debug, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChatChunkChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChunkChoice {
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub delta: Option<ChatContent>,
}

/// Error envelope returned by OpenAI-compatible servers.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorDetail {
    pub message: String,
}

/// A response (or stream chunk) that carries text per choice index.
pub(crate) trait ChoiceTexts: DeserializeOwned {
    fn into_texts(self) -> Vec<(usize, String)>;
}

impl ChoiceTexts for CompletionResponse {
    fn into_texts(self) -> Vec<(usize, String)> {
        self.choices
            .into_iter()
            .map(|c| (c.index, c.text.unwrap_or_default()))
            .collect()
    }
}

impl ChoiceTexts for ChatCompletionResponse {
    fn into_texts(self) -> Vec<(usize, String)> {
        self.choices
            .into_iter()
            .map(|c| (c.index, c.message.and_then(|m| m.content).unwrap_or_default()))
            .collect()
    }
}

impl ChoiceTexts for ChatCompletionChunk {
    fn into_texts(self) -> Vec<(usize, String)> {
        self.choices
            .into_iter()
            .map(|c| (c.index, c.delta.and_then(|d| d.content).unwrap_or_default()))
            .collect()
    }
}

/// Collects choice texts by index, appending streamed deltas.
///
/// Indexes come from the server and must stay below the number of choices
/// that were requested.
#[derive(Debug)]
pub(crate) struct ChoiceAccumulator {
    requested: usize,
    choices: Vec<String>,
}

impl ChoiceAccumulator {
    pub fn new(requested: u32) -> Self {
        Self {
            requested: requested.max(1) as usize,
            choices: Vec::new(),
        }
    }

    pub fn push(&mut self, index: usize, text: &str) -> Result<(), CompletionError> {
        if index >= self.requested {
            return Err(CompletionError::Api(format!(
                "API returned choice index {index} but only {} choice(s) were requested",
                self.requested
            )));
        }
        if index >= self.choices.len() {
            self.choices.resize(index + 1, String::new());
        }
        self.choices[index].push_str(text);
        Ok(())
    }

    pub fn extend(&mut self, texts: Vec<(usize, String)>) -> Result<(), CompletionError> {
        for (index, text) in texts {
            self.push(index, &text)?;
        }
        Ok(())
    }

    pub fn finish(self) -> Vec<String> {
        self.choices
    }
}

/// Render API choices as command output.
///
/// A single choice is printed as-is; several are each followed by a newline.
pub fn render_choices(choices: &[String]) -> Result<String, KnownSafeError> {
    let output = match choices {
        [] => return Err(KnownSafeError::new(NO_CHOICES_ERROR)),
        [only] => only.clone(),
        many => many.iter().map(|c| format!("{c}\n")).collect(),
    };
    if output.trim().is_empty() {
        return Err(KnownSafeError::new(NO_TEXT_ERROR));
    }
    Ok(output)
}
