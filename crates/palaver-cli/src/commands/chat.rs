use anyhow::Context;
use tracing::debug;

use palaver_lib::chat::store::ChatStore;
use palaver_lib::chat::types::{Chat, ChatLoadError};
use palaver_lib::completion::response::render_choices;
use palaver_lib::error::{KnownSafeError, NO_PROMPT_ERROR};
use palaver_lib::prompt::options::{CompletionOptions, resolve_endpoint};
use palaver_lib::runtime::Runtime;

use super::complete::{api_failure, open_client};
use crate::cli::ChatCommand;
use crate::runner::{CommandInfo, Outcome};

pub const PAUSED_REPLY: &str = "Message saved. Replies are paused; run `palaver chat unpause` to resume.";

/// Run a `chat` subcommand for the user this run acts as.
pub fn run_chat(
    command: ChatCommand,
    requested_user: Option<&str>,
    runtime: &Runtime,
) -> anyhow::Result<Outcome> {
    let user_id = runtime.chat_user(requested_user);
    let store = runtime.chat_store()?;
    debug!(user_id = %user_id, command = ?command, "Running chat command");

    let (name, output) = match command {
        ChatCommand::New { name, system } => {
            let chat = store.create_chat(&user_id, name.as_deref(), system.as_deref())?;
            ("new", format!("Created chat {} ({})", chat.chat_name, chat.chat_id))
        }
        ChatCommand::List { filter } => {
            let active = store.get_user_context(&user_id)?.active_chat_id;
            let pattern = filter.as_deref().map(like_pattern);
            let chats = store.list_chats(&user_id, pattern.as_deref())?;
            ("list", render_list(&chats, &active))
        }
        ChatCommand::Show { chat_id } => {
            let chat = load(&store, &user_id, chat_id.as_deref())?;
            let json = serde_json::to_string_pretty(&chat).context("Failed to serialize chat")?;
            ("show", json)
        }
        ChatCommand::Delete { chat_id } => {
            let chat = load(&store, &user_id, chat_id.as_deref())?;
            store.delete_chat(&user_id, Some(&chat.chat_id))?;
            ("delete", format!("Deleted chat {}", chat.chat_id))
        }
        ChatCommand::Activate { chat_id } => {
            store.activate_chat(&user_id, &chat_id)?.map_err(load_failure)?;
            ("activate", format!("Activated chat {chat_id}"))
        }
        ChatCommand::Clear { chat_id } => {
            let chat = load(&store, &user_id, chat_id.as_deref())?;
            store.clear(&user_id, Some(&chat.chat_id))?;
            ("clear", format!("Cleared chat {}", chat.chat_id))
        }
        ChatCommand::Pop { chat_id } => {
            let chat = load(&store, &user_id, chat_id.as_deref())?;
            let output = if chat.messages.is_empty() {
                format!("Chat {} has no messages", chat.chat_id)
            } else {
                store.pop(&user_id, Some(&chat.chat_id))?;
                format!("Removed the last message from chat {}", chat.chat_id)
            };
            ("pop", output)
        }
        ChatCommand::Model { model, chat_id } => {
            store
                .set_model(&user_id, &model, chat_id.as_deref())?
                .map_err(load_failure)?;
            ("model", format!("Chat now uses {model}"))
        }
        ChatCommand::Pause => {
            store.pause(&user_id)?;
            ("pause", "Paused. Messages are saved without replies.".to_string())
        }
        ChatCommand::Unpause => {
            store.unpause(&user_id)?;
            ("unpause", "Unpaused.".to_string())
        }
        ChatCommand::Status => {
            let paused = store.is_paused(&user_id)?;
            let chat = store.get_active_chat(&user_id)?;
            ("status", render_status(&chat, paused))
        }
        ChatCommand::Send {
            endpoint,
            local,
            prompt,
        } => {
            let endpoint = resolve_endpoint(
                endpoint.as_deref(),
                local,
                &runtime.settings.default_endpoint,
            );
            return send(&store, &user_id, &prompt.join(" "), &endpoint, runtime);
        }
    };

    Ok(Outcome::success(
        output,
        CommandInfo {
            service: "palaver",
            command: name,
            model: None,
        },
    ))
}

/// Wrap a plain filter as `%filter%`; filters with `%` are used as given.
fn like_pattern(filter: &str) -> String {
    if filter.contains('%') {
        filter.to_string()
    } else {
        format!("%{filter}%")
    }
}

fn load(store: &ChatStore, user_id: &str, chat_id: Option<&str>) -> anyhow::Result<Chat> {
    Ok(store.get_chat_for_user(user_id, chat_id)?.map_err(load_failure)?)
}

fn load_failure(err: ChatLoadError) -> KnownSafeError {
    KnownSafeError::new(format!("[ERROR] {err}"))
}

fn render_list(chats: &[Chat], active_chat_id: &str) -> String {
    if chats.is_empty() {
        return "No chats found.".to_string();
    }
    chats
        .iter()
        .map(|chat| {
            let marker = if chat.chat_id == active_chat_id { '*' } else { ' ' };
            format!(
                "{marker} {}\t{}\t{}\n",
                chat.chat_id, chat.chat_name, chat.service_info.model_id
            )
        })
        .collect()
}

fn render_status(chat: &Chat, paused: bool) -> String {
    format!(
        "Active chat: {} ({})\nModel: {}\nMessages: {}\nPaused: {}",
        chat.chat_name,
        chat.chat_id,
        chat.service_info.model_id,
        chat.messages.len(),
        if paused { "yes" } else { "no" }
    )
}

/// Append the message to the active chat and, unless paused, store and
/// print the model's answer to the whole conversation.
fn send(
    store: &ChatStore,
    user_id: &str,
    text: &str,
    endpoint: &str,
    runtime: &Runtime,
) -> anyhow::Result<Outcome> {
    if text.trim().is_empty() {
        return Err(KnownSafeError::new(NO_PROMPT_ERROR).into());
    }
    store.add_user_message(user_id, text)?;
    let info = |model: Option<String>| CommandInfo {
        service: "palaver",
        command: "send",
        model,
    };
    if store.is_paused(user_id)? {
        return Ok(Outcome::success(PAUSED_REPLY, info(None)));
    }

    let chat = store.get_active_chat(user_id)?;
    let options = CompletionOptions::with_defaults(chat.service_info.model_id.clone(), runtime.api_user())
        .restricted_to(&runtime.context);
    let client = open_client(endpoint, runtime)?;
    let choices = client
        .chat_complete(&options.chat_request(chat.messages))
        .map_err(|e| api_failure(&e, client.api_key(), &runtime.context))?;
    let answer = render_choices(&choices)?;

    store.add_answer(user_id, &answer)?;
    debug!(user_id = %user_id, chat_id = %chat.chat_id, "Stored answer");
    Ok(Outcome::success(answer, info(Some(options.model))))
}
