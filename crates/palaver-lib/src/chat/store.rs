use anyhow::Context;
use rusqlite::Connection;
use tracing::{debug, warn};

use super::queries;
use super::types::{Chat, ChatLoadError, Message, ServiceInfo, UserContext};
use crate::config::DEFAULT_CHAT_NAME;
use crate::db::driver::DatabaseDriver;
use crate::db::schema::apply_migrations;

/// Source of Unix timestamps (seconds) for `lastUpdated`.
pub type Clock = Box<dyn Fn() -> i64>;

fn system_clock() -> Clock {
    Box::new(|| jiff::Timestamp::now().as_second())
}

/// Durable chat sessions and per-user context over one SQLite connection.
///
/// Every method is an independent unit of work that writes through
/// immediately. Nothing is cached between calls, and multi-step operations
/// (delete then re-elect, load then save) are not transactional, so callers
/// must not drive the same user from two places at once.
///
/// Methods that can name a chat that does not exist return
/// `anyhow::Result<Result<_, ChatLoadError>>`: the outer error is a storage
/// failure, the inner one is the domain outcome the caller must match on.
pub struct ChatStore {
    conn: Connection,
    clock: Clock,
}

impl ChatStore {
    /// Wrap a connection, creating the tables if they are missing.
    pub fn initialize(mut conn: Connection) -> anyhow::Result<Self> {
        apply_migrations(&mut conn)?;
        Ok(Self {
            conn,
            clock: system_clock(),
        })
    }

    /// Open a store on the database the driver points at.
    pub fn open(driver: &DatabaseDriver) -> anyhow::Result<Self> {
        Self::initialize(driver.open()?)
    }

    /// A private, throwaway in-memory store.
    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::initialize(conn)
    }

    /// Replace the timestamp source.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Close the underlying connection.
    pub fn shutdown(self) -> anyhow::Result<()> {
        self.conn
            .close()
            .map_err(|(_, e)| e)
            .context("Failed to close chat database")
    }

    fn now(&self) -> i64 {
        (self.clock)()
    }

    /// Create a chat and make it the user's active, unpaused chat.
    ///
    /// With `system`, the chat starts with that single system message.
    pub fn create_chat(
        &self,
        user_id: &str,
        chat_name: Option<&str>,
        system: Option<&str>,
    ) -> anyhow::Result<Chat> {
        let chat = Chat {
            chat_id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            last_updated: self.now(),
            chat_name: chat_name.unwrap_or(DEFAULT_CHAT_NAME).to_string(),
            service_info: ServiceInfo::default(),
            messages: system.map(Message::system).into_iter().collect(),
        };
        queries::upsert_chat(&self.conn, &chat)?;
        queries::upsert_user_context(
            &self.conn,
            &UserContext {
                user_id: user_id.to_string(),
                active_chat_id: chat.chat_id.clone(),
                is_paused: false,
            },
        )?;
        debug!(user_id = %user_id, chat_id = %chat.chat_id, "Created chat");
        Ok(chat)
    }

    /// Delete a chat (the active one when `chat_id` is `None`), then make the
    /// user's most recently updated remaining chat active, creating a fresh
    /// chat if none remain.
    pub fn delete_chat(&self, user_id: &str, chat_id: Option<&str>) -> anyhow::Result<()> {
        let target = self.target_chat_id(user_id, chat_id)?;
        queries::delete_chat(&self.conn, &target, user_id)?;

        match queries::most_recent_chat_id(&self.conn, user_id)? {
            Some(next) => {
                if queries::set_active_chat(&self.conn, user_id, &next)? == 0 {
                    queries::upsert_user_context(
                        &self.conn,
                        &UserContext {
                            user_id: user_id.to_string(),
                            active_chat_id: next,
                            is_paused: false,
                        },
                    )?;
                }
            }
            None => {
                self.create_chat(user_id, None, None)?;
            }
        }
        Ok(())
    }

    /// All chats of a user, optionally filtered by a SQL `LIKE` pattern on
    /// the chat name (e.g. `%draft%`).
    pub fn list_chats(&self, user_id: &str, filter: Option<&str>) -> anyhow::Result<Vec<Chat>> {
        queries::list_chats(&self.conn, user_id, filter)
    }

    /// Insert or replace a chat by ID, exactly as given.
    pub fn save_chat(&self, chat: &Chat) -> anyhow::Result<()> {
        queries::upsert_chat(&self.conn, chat)
    }

    /// Empty a chat's message list. Does nothing if the chat is missing.
    pub fn clear(&self, user_id: &str, chat_id: Option<&str>) -> anyhow::Result<()> {
        let target = self.target_chat_id(user_id, chat_id)?;
        queries::update_messages(&self.conn, &target, user_id, &[], self.now())?;
        Ok(())
    }

    /// Drop the last message of a chat. Does nothing if the chat is missing
    /// or already empty.
    pub fn pop(&self, user_id: &str, chat_id: Option<&str>) -> anyhow::Result<()> {
        let target = self.target_chat_id(user_id, chat_id)?;
        let Some(mut chat) = queries::get_chat(&self.conn, &target, user_id)? else {
            return Ok(());
        };
        if chat.messages.pop().is_some() {
            queries::update_messages(&self.conn, &target, user_id, &chat.messages, self.now())?;
        }
        Ok(())
    }

    pub fn pause(&self, user_id: &str) -> anyhow::Result<()> {
        self.modify_paused(user_id, true)
    }

    pub fn unpause(&self, user_id: &str) -> anyhow::Result<()> {
        self.modify_paused(user_id, false)
    }

    fn modify_paused(&self, user_id: &str, paused: bool) -> anyhow::Result<()> {
        // The context row must exist for the partial update to land.
        self.get_user_context(user_id)?;
        queries::set_paused(&self.conn, user_id, paused)?;
        Ok(())
    }

    pub fn is_paused(&self, user_id: &str) -> anyhow::Result<bool> {
        Ok(self.get_user_context(user_id)?.is_paused)
    }

    /// Point a chat (the active one when `chat_id` is `None`) at another model.
    pub fn set_model(
        &self,
        user_id: &str,
        model: &str,
        chat_id: Option<&str>,
    ) -> anyhow::Result<Result<(), ChatLoadError>> {
        let mut chat = match self.get_chat_for_user(user_id, chat_id)? {
            Ok(chat) => chat,
            Err(err) => return Ok(Err(err)),
        };
        chat.service_info.model_id = model.to_string();
        chat.last_updated = self.now();
        queries::upsert_chat(&self.conn, &chat)?;
        Ok(Ok(()))
    }

    pub fn add_user_message(&self, user_id: &str, text: &str) -> anyhow::Result<()> {
        self.add_message_to_active_chat(user_id, Message::user(text))
    }

    pub fn add_system_message(&self, user_id: &str, text: &str) -> anyhow::Result<()> {
        self.add_message_to_active_chat(user_id, Message::system(text))
    }

    pub fn add_answer(&self, user_id: &str, text: &str) -> anyhow::Result<()> {
        self.add_message_to_active_chat(user_id, Message::assistant(text))
    }

    fn add_message_to_active_chat(&self, user_id: &str, message: Message) -> anyhow::Result<()> {
        let mut chat = self.get_active_chat(user_id)?;
        chat.messages.push(message);
        queries::update_messages(
            &self.conn,
            &chat.chat_id,
            user_id,
            &chat.messages,
            self.now(),
        )?;
        Ok(())
    }

    /// The user's context, created on first access.
    ///
    /// A new context points at the user's most recently updated chat, or at a
    /// freshly created one if the user has no chats. A stored pointer that is
    /// NULL or names a chat the user no longer owns is re-elected the same
    /// way, keeping the pause flag.
    pub fn get_user_context(&self, user_id: &str) -> anyhow::Result<UserContext> {
        let Some(stored) = queries::get_user_context(&self.conn, user_id)? else {
            return self.create_user_context(user_id);
        };
        if let Some(active_chat_id) = stored.active_chat_id.as_deref()
            && queries::chat_exists(&self.conn, active_chat_id, user_id)?
        {
            return Ok(UserContext {
                user_id: user_id.to_string(),
                active_chat_id: active_chat_id.to_string(),
                is_paused: stored.is_paused,
            });
        }

        warn!(
            user_id = %user_id,
            chat_id = ?stored.active_chat_id,
            "Active chat pointer is missing or dangling, re-electing"
        );
        let chat = self.reelect_active_chat(user_id, stored.is_paused)?;
        Ok(UserContext {
            user_id: user_id.to_string(),
            active_chat_id: chat.chat_id,
            is_paused: stored.is_paused,
        })
    }

    fn create_user_context(&self, user_id: &str) -> anyhow::Result<UserContext> {
        let active_chat_id = match queries::most_recent_chat_id(&self.conn, user_id)? {
            Some(chat_id) => chat_id,
            None => self.create_chat(user_id, None, None)?.chat_id,
        };
        let ctx = UserContext {
            user_id: user_id.to_string(),
            active_chat_id,
            is_paused: false,
        };
        queries::upsert_user_context(&self.conn, &ctx)?;
        Ok(ctx)
    }

    /// Make `chat_id` the user's active chat and unpause them.
    pub fn activate_chat(
        &self,
        user_id: &str,
        chat_id: &str,
    ) -> anyhow::Result<Result<(), ChatLoadError>> {
        if queries::get_chat(&self.conn, chat_id, user_id)?.is_none() {
            return Ok(Err(ChatLoadError::missing(chat_id, user_id)));
        }
        queries::upsert_user_context(
            &self.conn,
            &UserContext {
                user_id: user_id.to_string(),
                active_chat_id: chat_id.to_string(),
                is_paused: false,
            },
        )?;
        Ok(Ok(()))
    }

    /// Load `chat_id` for the user, or the active chat when `chat_id` is `None`.
    pub fn get_chat_for_user(
        &self,
        user_id: &str,
        chat_id: Option<&str>,
    ) -> anyhow::Result<Result<Chat, ChatLoadError>> {
        match chat_id {
            Some(chat_id) => Ok(queries::get_chat(&self.conn, chat_id, user_id)?
                .ok_or_else(|| ChatLoadError::missing(chat_id, user_id))),
            None => Ok(Ok(self.get_active_chat(user_id)?)),
        }
    }

    /// The chat the user's context points at.
    ///
    /// A context left dangling by an outside writer is re-pointed at the most
    /// recently updated chat, keeping the pause flag.
    pub fn get_active_chat(&self, user_id: &str) -> anyhow::Result<Chat> {
        let ctx = self.get_user_context(user_id)?;
        if let Some(chat) = queries::get_chat(&self.conn, &ctx.active_chat_id, user_id)? {
            return Ok(chat);
        }
        warn!(
            user_id = %user_id,
            chat_id = %ctx.active_chat_id,
            "Active chat is missing, re-electing"
        );
        self.reelect_active_chat(user_id, ctx.is_paused)
    }

    fn reelect_active_chat(&self, user_id: &str, is_paused: bool) -> anyhow::Result<Chat> {
        let Some(chat_id) = queries::most_recent_chat_id(&self.conn, user_id)? else {
            let chat = self.create_chat(user_id, None, None)?;
            if is_paused {
                queries::set_paused(&self.conn, user_id, true)?;
            }
            return Ok(chat);
        };
        queries::upsert_user_context(
            &self.conn,
            &UserContext {
                user_id: user_id.to_string(),
                active_chat_id: chat_id.clone(),
                is_paused,
            },
        )?;
        queries::get_chat(&self.conn, &chat_id, user_id)?
            .ok_or_else(|| anyhow::anyhow!("Chat {chat_id} vanished during re-election"))
    }

    fn target_chat_id(&self, user_id: &str, chat_id: Option<&str>) -> anyhow::Result<String> {
        match chat_id {
            Some(chat_id) => Ok(chat_id.to_string()),
            None => Ok(self.get_active_chat(user_id)?.chat_id),
        }
    }
}
