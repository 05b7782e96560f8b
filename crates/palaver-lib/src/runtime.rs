use crate::chat::store::ChatStore;
use crate::config::UNKNOWN_LOCAL_USER;
use crate::context::ExecutionContext;
use crate::db::driver::DatabaseDriver;
use crate::settings::Settings;

/// Everything a command needs besides its arguments and console.
pub struct Runtime {
    pub context: ExecutionContext,
    pub db: DatabaseDriver,
    pub settings: Settings,
}

impl Runtime {
    /// Open the chat store on this runtime's database.
    pub fn chat_store(&self) -> anyhow::Result<ChatStore> {
        ChatStore::open(&self.db)
    }

    /// Owner of chat sessions for this run.
    ///
    /// Remote runs always act for the user the relaying caller vouched for;
    /// local runs may pick any user and default to `$USER`.
    pub fn chat_user(&self, requested: Option<&str>) -> String {
        match &self.context {
            ExecutionContext::Remote { user_id, .. } => user_id.clone(),
            ExecutionContext::Local { .. } => requested
                .map(str::to_string)
                .or_else(|| self.settings.local_user.clone())
                .unwrap_or_else(|| UNKNOWN_LOCAL_USER.to_string()),
        }
    }

    /// Default `user` field for API requests from a local run.
    pub fn api_user(&self) -> String {
        self.settings
            .local_user
            .clone()
            .unwrap_or_else(|| UNKNOWN_LOCAL_USER.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn runtime(context: ExecutionContext, user: Option<&str>) -> Runtime {
        let mut vars = HashMap::from([("PALAVER_DB".to_string(), "/tmp/unused.db".to_string())]);
        if let Some(user) = user {
            vars.insert("USER".to_string(), user.to_string());
        }
        let settings = Settings::from_lookup(|key| vars.get(key).cloned()).unwrap();
        Runtime {
            context,
            db: DatabaseDriver::in_memory(&format!("runtime_{}", user.unwrap_or("none"))).unwrap(),
            settings,
        }
    }

    #[test]
    fn local_chat_user_prefers_request_then_env() {
        let rt = runtime(ExecutionContext::local("/tmp"), Some("alice"));
        assert_eq!(rt.chat_user(Some("bob")), "bob");
        assert_eq!(rt.chat_user(None), "alice");
        assert_eq!(rt.api_user(), "alice");

        let rt = runtime(ExecutionContext::local("/tmp"), None);
        assert_eq!(rt.chat_user(None), UNKNOWN_LOCAL_USER);
    }

    #[test]
    fn remote_chat_user_is_fixed() {
        let rt = runtime(ExecutionContext::remote("admin@x", "discord-42"), Some("alice"));
        assert_eq!(rt.chat_user(Some("bob")), "discord-42");
    }

    #[test]
    fn chat_store_opens_on_runtime_db() {
        let rt = runtime(ExecutionContext::local("/tmp"), Some("store_user"));
        let store = rt.chat_store().unwrap();
        store.create_chat("store_user", Some("x"), None).unwrap();
        assert_eq!(rt.chat_store().unwrap().list_chats("store_user", None).unwrap().len(), 1);
    }
}
