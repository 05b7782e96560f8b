//! Canned OpenAI-compatible response bodies for HTTP mocks.

use serde_json::json;

/// A `/completions` response with one choice per text.
pub fn completion_body(texts: &[&str]) -> String {
    let choices: Vec<_> = texts
        .iter()
        .enumerate()
        .map(|(index, text)| {
            json!({
                "text": text,
                "index": index,
                "logprobs": null,
                "finish_reason": "stop"
            })
        })
        .collect();
    json!({
        "id": "cmpl-test",
        "object": "text_completion",
        "created": 1_700_000_000,
        "model": "davinci",
        "choices": choices
    })
    .to_string()
}

/// A `/chat/completions` response with one assistant message per text.
pub fn chat_completion_body(texts: &[&str]) -> String {
    let choices: Vec<_> = texts
        .iter()
        .enumerate()
        .map(|(index, text)| {
            json!({
                "index": index,
                "message": {"role": "assistant", "content": text},
                "finish_reason": "stop"
            })
        })
        .collect();
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "created": 1_700_000_000,
        "model": "gpt-4o",
        "choices": choices
    })
    .to_string()
}

/// A streamed `/chat/completions` body: one SSE event per delta of choice 0,
/// then `[DONE]`.
pub fn chat_stream_body(deltas: &[&str]) -> String {
    let mut body = String::new();
    for delta in deltas {
        let chunk = json!({
            "id": "chatcmpl-test",
            "object": "chat.completion.chunk",
            "choices": [{"index": 0, "delta": {"content": delta}, "finish_reason": null}]
        });
        body.push_str(&format!("data: {chunk}\n\n"));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

/// A streamed `/completions` body: one SSE event per piece of choice 0.
pub fn completion_stream_body(pieces: &[&str]) -> String {
    let mut body = String::new();
    for piece in pieces {
        let chunk = json!({
            "id": "cmpl-test",
            "object": "text_completion",
            "choices": [{"index": 0, "text": piece, "finish_reason": null}]
        });
        body.push_str(&format!("data: {chunk}\n\n"));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

/// The error envelope OpenAI returns with non-2xx statuses.
pub fn api_error_body(message: &str) -> String {
    json!({
        "error": {
            "message": message,
            "type": "invalid_request_error",
            "param": null,
            "code": null
        }
    })
    .to_string()
}
