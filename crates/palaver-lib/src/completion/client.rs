use std::io::{BufRead, BufReader, Read};
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use super::request::{ChatCompletionRequest, CompletionRequest};
use super::response::{
    ApiErrorBody, ChatCompletionChunk, ChatCompletionResponse, ChoiceAccumulator, ChoiceTexts,
    CompletionResponse,
};
use crate::config::{OPENAI_API_KEY_NOT_SET_ERROR, REQUEST_TIMEOUT_SECS};

#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("{}", OPENAI_API_KEY_NOT_SET_ERROR)]
    MissingApiKey,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Reading the response stream failed: {0}")]
    Stream(#[from] std::io::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Message reported by the API for a non-2xx response.
    #[error("{0}")]
    Api(String),
}

/// Blocking client for an OpenAI-compatible completion API.
pub struct OpenAiClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl OpenAiClient {
    /// Fails with [`CompletionError::MissingApiKey`] when no key is set.
    pub fn new(base_url: &str, api_key: Option<&str>) -> Result<Self, CompletionError> {
        let api_key = api_key
            .filter(|key| !key.is_empty())
            .ok_or(CompletionError::MissingApiKey)?;
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// `POST /completions`, returning the text of each choice.
    pub fn complete(&self, request: &CompletionRequest) -> Result<Vec<String>, CompletionError> {
        debug!(model = %request.model, n = request.n, stream = request.stream, "Requesting completion");
        let response = self.post("completions", request)?;
        if request.stream {
            collect_stream::<CompletionResponse, _>(response, request.n)
        } else {
            collect_body::<CompletionResponse>(response, request.n)
        }
    }

    /// `POST /chat/completions`, returning the assistant content of each choice.
    pub fn chat_complete(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<Vec<String>, CompletionError> {
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            n = request.n,
            stream = request.stream,
            "Requesting chat completion"
        );
        let response = self.post("chat/completions", request)?;
        if request.stream {
            collect_stream::<ChatCompletionChunk, _>(response, request.n)
        } else {
            collect_body::<ChatCompletionResponse>(response, request.n)
        }
    }

    fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<Response, CompletionError> {
        let url = format!("{}/{path}", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()?;

        let status = response.status();
        debug!(url = %url, status = status.as_u16(), "Completion API responded");
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(CompletionError::Api(api_error_message(status, &text)));
        }
        Ok(response)
    }
}

fn api_error_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(envelope) => envelope.error.message,
        Err(_) => format!("HTTP {status}: {body}"),
    }
}

fn collect_body<T: ChoiceTexts>(response: Response, n: u32) -> Result<Vec<String>, CompletionError> {
    let text = response.text()?;
    let parsed: T = serde_json::from_str(&text)?;
    let mut acc = ChoiceAccumulator::new(n);
    acc.extend(parsed.into_texts())?;
    Ok(acc.finish())
}

/// Read server-sent events until `[DONE]`, appending each chunk's deltas.
fn collect_stream<T: ChoiceTexts, R: Read>(reader: R, n: u32) -> Result<Vec<String>, CompletionError> {
    let mut acc = ChoiceAccumulator::new(n);
    for line in BufReader::new(reader).lines() {
        let line = line?;
        let Some(data) = line.strip_prefix("data:") else {
            continue;
        };
        let data = data.trim();
        if data == "[DONE]" {
            break;
        }
        if data.is_empty() {
            continue;
        }
        let chunk: T = serde_json::from_str(data)?;
        acc.extend(chunk.into_texts())?;
    }
    Ok(acc.finish())
}
