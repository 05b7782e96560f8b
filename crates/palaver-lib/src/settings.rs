use std::path::PathBuf;

use crate::config::{
    DB_FILENAME, DEFAULT_ADMIN_CONTACT, DEFAULT_OPENAI_ENDPOINT, DEFAULT_REMOTE_USER,
    FALLBACK_COMPLETION_MODEL,
};
use crate::context::ExecutionContext;

/// Process-level settings read from the environment (after `.env` loading).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_key: Option<String>,
    pub default_completion_model: String,
    /// Base URL used when a run does not pick one with `--endpoint`/`--local`.
    pub default_endpoint: String,
    /// `CLI_IS_REMOTE=true` exercises remote behaviour from a terminal.
    pub is_remote: bool,
    pub admin_contact: String,
    pub remote_user_id: String,
    /// Let unexpected errors escape the runner instead of being formatted.
    pub debug_throw: bool,
    pub db_path: PathBuf,
    /// `$USER`, used as the default local API user and chat owner.
    pub local_user: Option<String>,
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_path = match lookup("PALAVER_DB") {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => default_db_path()?,
        };

        Ok(Self {
            api_key: lookup("OPENAI_API_KEY").filter(|k| !k.is_empty()),
            default_completion_model: lookup("DEFAULT_OPENAI_COMPLETION_MODEL")
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| FALLBACK_COMPLETION_MODEL.to_string()),
            default_endpoint: lookup("PALAVER_OPENAI_ENDPOINT")
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| DEFAULT_OPENAI_ENDPOINT.to_string()),
            is_remote: lookup("CLI_IS_REMOTE").as_deref() == Some("true"),
            admin_contact: lookup("PALAVER_ADMIN_CONTACT")
                .unwrap_or_else(|| DEFAULT_ADMIN_CONTACT.to_string()),
            remote_user_id: lookup("PALAVER_REMOTE_USER_ID")
                .unwrap_or_else(|| DEFAULT_REMOTE_USER.to_string()),
            debug_throw: matches!(lookup("DEBUG_THROW").as_deref(), Some("true" | "1")),
            db_path,
            local_user: lookup("USER").filter(|u| !u.is_empty()),
        })
    }

    /// Execution context implied by these settings for a run started in `cwd`.
    pub fn execution_context(&self, cwd: PathBuf) -> ExecutionContext {
        if self.is_remote {
            ExecutionContext::remote(&self.admin_contact, &self.remote_user_id)
        } else {
            ExecutionContext::local(cwd)
        }
    }
}

fn default_db_path() -> anyhow::Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .or_else(dirs::home_dir)
        .ok_or_else(|| anyhow::anyhow!("Cannot determine a data directory for the chat database"))?;
    Ok(data_dir.join("palaver").join(DB_FILENAME))
}
