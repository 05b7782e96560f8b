use thiserror::Error;

/// A failure whose message is safe to show to any caller, local or remote.
///
/// Commands return it (wrapped in `anyhow::Error`) for expected problems such
/// as an empty prompt; the runner reports it verbatim. Anything else reaching
/// the runner is treated as unexpected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct KnownSafeError(pub String);

impl KnownSafeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

pub const NO_PROMPT_ERROR: &str = "[ERROR] No prompt text was provided.";
pub const NO_CHOICES_ERROR: &str = "[ERROR] No choices returned from the API.";
pub const NO_TEXT_ERROR: &str = "[ERROR] No text returned.";

/// Short label for an unexpected error, safe to show without its details.
pub fn error_kind(err: &anyhow::Error) -> &'static str {
    for cause in err.chain() {
        if cause.is::<rusqlite::Error>() || cause.is::<rusqlite_migration::Error>() {
            return "DatabaseError";
        }
        if cause.is::<crate::completion::client::CompletionError>() {
            return "CompletionError";
        }
        if cause.is::<serde_json::Error>() {
            return "JsonError";
        }
        if cause.is::<std::io::Error>() {
            return "IoError";
        }
    }
    "Error"
}

#[cfg(test)]
mod tests {
    use anyhow::Context;

    use super::*;

    #[test]
    fn known_safe_error_displays_message() {
        let err = KnownSafeError::new(NO_PROMPT_ERROR);
        assert_eq!(err.to_string(), NO_PROMPT_ERROR);
        assert_eq!(err.message(), NO_PROMPT_ERROR);
    }

    #[test]
    fn kind_of_wrapped_io_error() {
        let err = Err::<(), _>(std::io::Error::other("disk on fire"))
            .context("Failed to read prompt file")
            .unwrap_err();
        assert_eq!(error_kind(&err), "IoError");
    }

    #[test]
    fn kind_of_database_error() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let err = conn
            .execute("SELECT * FROM missing_table", [])
            .context("query failed")
            .unwrap_err();
        assert_eq!(error_kind(&err), "DatabaseError");
    }

    #[test]
    fn kind_of_plain_error() {
        assert_eq!(error_kind(&anyhow::anyhow!("boom")), "Error");
    }
}
