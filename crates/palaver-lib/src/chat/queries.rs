use anyhow::Context;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::debug;

use super::types::{Chat, Message, ServiceInfo, UserContext};

const CHAT_COLUMNS: &str = "chatID, userID, lastUpdated, chatName, serviceInfo, messages";

/// A `chatHistory` row as stored, JSON columns still encoded.
struct ChatRow {
    chat_id: String,
    user_id: String,
    last_updated: i64,
    chat_name: String,
    service_info: String,
    messages: String,
}

impl ChatRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            chat_id: row.get(0)?,
            user_id: row.get(1)?,
            last_updated: row.get(2)?,
            chat_name: row.get(3)?,
            service_info: row.get(4)?,
            messages: row.get(5)?,
        })
    }

    fn into_chat(self) -> anyhow::Result<Chat> {
        let service_info: ServiceInfo = serde_json::from_str(&self.service_info)
            .with_context(|| format!("Malformed serviceInfo for chat {}", self.chat_id))?;
        let messages: Vec<Message> = serde_json::from_str(&self.messages)
            .with_context(|| format!("Malformed messages for chat {}", self.chat_id))?;
        Ok(Chat {
            chat_id: self.chat_id,
            user_id: self.user_id,
            last_updated: self.last_updated,
            chat_name: self.chat_name,
            service_info,
            messages,
        })
    }
}

/// A `userContext` row as stored. `active_chat_id` can be NULL in rows
/// written by older tools that upserted only the pause flag.
#[derive(Debug, PartialEq, Eq)]
pub struct StoredUserContext {
    pub active_chat_id: Option<String>,
    pub is_paused: bool,
}

/// Insert a chat, or replace every column of the existing row with the same ID.
pub fn upsert_chat(conn: &Connection, chat: &Chat) -> anyhow::Result<()> {
    debug!(
        chat_id = %chat.chat_id,
        user_id = %chat.user_id,
        message_count = chat.messages.len(),
        model = %chat.service_info.model_id,
        "Upserting chat"
    );
    let service_info = serde_json::to_string(&chat.service_info)?;
    let messages = serde_json::to_string(&chat.messages)?;
    conn.execute(
        "INSERT INTO chatHistory (chatID, userID, lastUpdated, chatName, serviceInfo, messages)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(chatID) DO UPDATE SET
           userID = excluded.userID,
           lastUpdated = excluded.lastUpdated,
           chatName = excluded.chatName,
           serviceInfo = excluded.serviceInfo,
           messages = excluded.messages",
        params![
            chat.chat_id,
            chat.user_id,
            chat.last_updated,
            chat.chat_name,
            service_info,
            messages,
        ],
    )
    .context("Failed to upsert chat")?;
    Ok(())
}

/// Get a chat owned by `user_id`. Returns `None` if it does not exist for
/// that user.
pub fn get_chat(conn: &Connection, chat_id: &str, user_id: &str) -> anyhow::Result<Option<Chat>> {
    let row = conn
        .query_row(
            &format!("SELECT {CHAT_COLUMNS} FROM chatHistory WHERE chatID = ?1 AND userID = ?2"),
            params![chat_id, user_id],
            ChatRow::from_row,
        )
        .optional()
        .context("Failed to query chat")?;
    row.map(ChatRow::into_chat).transpose()
}

/// Whether `chat_id` exists and is owned by `user_id`.
pub fn chat_exists(conn: &Connection, chat_id: &str, user_id: &str) -> anyhow::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM chatHistory WHERE chatID = ?1 AND userID = ?2)",
        params![chat_id, user_id],
        |row| row.get(0),
    )
    .context("Failed to check chat existence")
}

/// List a user's chats in insertion order, optionally filtered with a SQL
/// `LIKE` pattern on the chat name.
pub fn list_chats(
    conn: &Connection,
    user_id: &str,
    name_pattern: Option<&str>,
) -> anyhow::Result<Vec<Chat>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {CHAT_COLUMNS} FROM chatHistory
             WHERE userID = ?1 AND (?2 IS NULL OR chatName LIKE ?2)
             ORDER BY rowid ASC"
        ))
        .context("Failed to prepare list_chats query")?;
    let rows = stmt
        .query_map(params![user_id, name_pattern], ChatRow::from_row)?
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to list chats")?;

    debug!(
        user_id = %user_id,
        filter = ?name_pattern,
        result_count = rows.len(),
        "Listed chats"
    );

    rows.into_iter().map(ChatRow::into_chat).collect()
}

/// Delete a chat owned by `user_id`. Returns the number of rows removed.
pub fn delete_chat(conn: &Connection, chat_id: &str, user_id: &str) -> anyhow::Result<usize> {
    let deleted = conn
        .execute(
            "DELETE FROM chatHistory WHERE chatID = ?1 AND userID = ?2",
            params![chat_id, user_id],
        )
        .context("Failed to delete chat")?;
    debug!(chat_id = %chat_id, user_id = %user_id, deleted, "Deleted chat");
    Ok(deleted)
}

/// ID of the user's most recently updated chat. Ties go to the row inserted
/// last.
pub fn most_recent_chat_id(conn: &Connection, user_id: &str) -> anyhow::Result<Option<String>> {
    conn.query_row(
        "SELECT chatID FROM chatHistory WHERE userID = ?1
         ORDER BY lastUpdated DESC, rowid DESC LIMIT 1",
        params![user_id],
        |row| row.get(0),
    )
    .optional()
    .context("Failed to query most recent chat")
}

/// Replace a chat's message list and bump its timestamp. Returns the number
/// of rows touched (0 when the chat does not exist for the user).
pub fn update_messages(
    conn: &Connection,
    chat_id: &str,
    user_id: &str,
    messages: &[Message],
    last_updated: i64,
) -> anyhow::Result<usize> {
    let encoded = serde_json::to_string(messages)?;
    let updated = conn
        .execute(
            "UPDATE chatHistory SET messages = ?1, lastUpdated = ?2
             WHERE chatID = ?3 AND userID = ?4",
            params![encoded, last_updated, chat_id, user_id],
        )
        .context("Failed to update chat messages")?;
    debug!(
        chat_id = %chat_id,
        user_id = %user_id,
        message_count = messages.len(),
        updated,
        "Updated chat messages"
    );
    Ok(updated)
}

/// Insert or fully replace a user's context row.
pub fn upsert_user_context(conn: &Connection, ctx: &UserContext) -> anyhow::Result<()> {
    debug!(
        user_id = %ctx.user_id,
        active_chat_id = %ctx.active_chat_id,
        is_paused = ctx.is_paused,
        "Upserting user context"
    );
    conn.execute(
        "INSERT INTO userContext (userID, activeChatID, isPaused)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(userID) DO UPDATE SET
           activeChatID = excluded.activeChatID,
           isPaused = excluded.isPaused",
        params![ctx.user_id, ctx.active_chat_id, i64::from(ctx.is_paused)],
    )
    .context("Failed to upsert user context")?;
    Ok(())
}

/// Get a user's context row. Returns `None` if the user has none yet.
pub fn get_user_context(
    conn: &Connection,
    user_id: &str,
) -> anyhow::Result<Option<StoredUserContext>> {
    conn.query_row(
        "SELECT activeChatID, isPaused FROM userContext WHERE userID = ?1",
        params![user_id],
        |row| {
            Ok(StoredUserContext {
                active_chat_id: row.get(0)?,
                is_paused: row.get::<_, Option<i64>>(1)?.unwrap_or(0) == 1,
            })
        },
    )
    .optional()
    .context("Failed to query user context")
}

/// Point an existing context row at another chat, keeping the pause flag.
pub fn set_active_chat(conn: &Connection, user_id: &str, chat_id: &str) -> anyhow::Result<usize> {
    let updated = conn
        .execute(
            "UPDATE userContext SET activeChatID = ?1 WHERE userID = ?2",
            params![chat_id, user_id],
        )
        .context("Failed to update active chat")?;
    debug!(user_id = %user_id, chat_id = %chat_id, updated, "Re-pointed active chat");
    Ok(updated)
}

/// Flip the pause flag of an existing context row, keeping the active chat.
pub fn set_paused(conn: &Connection, user_id: &str, paused: bool) -> anyhow::Result<usize> {
    let updated = conn
        .execute(
            "UPDATE userContext SET isPaused = ?1 WHERE userID = ?2",
            params![i64::from(paused), user_id],
        )
        .context("Failed to update pause flag")?;
    debug!(user_id = %user_id, paused, updated, "Updated pause flag");
    Ok(updated)
}
