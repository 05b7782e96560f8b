/// Models known to be served only by the chat-completion endpoint.
const KNOWN_CHAT_COMPLETION_MODELS: &[&str] = &[
    "gpt-4",
    "gpt-4o",
    "gpt-4-0314",
    "gpt-4-32k",
    "gpt-4-32k-0314",
    "gpt-3.5-turbo",
    "gpt-3.5-turbo-0301",
];

/// Model families assumed to be chat models when the exact id is unknown.
const INFERRED_CHAT_COMPLETION_PREFIXES: &[&str] = &["gpt-3.5-turbo", "gpt-4"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatModelMatch {
    Known,
    Probably,
    No,
}

pub fn classify_model(model: &str) -> ChatModelMatch {
    if KNOWN_CHAT_COMPLETION_MODELS.contains(&model) {
        ChatModelMatch::Known
    } else if INFERRED_CHAT_COMPLETION_PREFIXES
        .iter()
        .any(|prefix| model.starts_with(prefix))
    {
        ChatModelMatch::Probably
    } else {
        ChatModelMatch::No
    }
}

/// Whether requests for `model` go to `/chat/completions`. Probable matches
/// count.
pub fn is_chat_completion_model(model: &str) -> bool {
    classify_model(model) != ChatModelMatch::No
}
