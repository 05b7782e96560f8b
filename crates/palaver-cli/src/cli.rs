use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Args, CommandFactory, FromArgMatches, Parser, Subcommand};

use palaver_lib::context::ExecutionContext;
use palaver_lib::prompt::options::{DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};

#[derive(Parser, Debug)]
#[command(
    name = "palaver",
    about = "Send prompts to OpenAI-compatible completion APIs and keep chat sessions",
    version,
    disable_version_flag = true
)]
pub struct Cli {
    /// Log debug output to stderr.
    #[arg(short, long)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate text using an OpenAI-compatible completion API.
    #[command(
        name = "openai-completion",
        visible_aliases = ["complete", "openai-complete", "completion"]
    )]
    OpenAiCompletion(CompletionArgs),

    /// Manage persistent chat sessions.
    Chat {
        /// Act on the chats of this user instead of `$USER`.
        #[arg(long)]
        user_id: Option<String>,

        #[command(subcommand)]
        command: ChatCommand,
    },
}

#[derive(Args, Debug, Clone)]
pub struct CompletionArgs {
    /// The model to use. Defaults to `$DEFAULT_OPENAI_COMPLETION_MODEL`.
    #[arg(short, long)]
    pub model: Option<String>,

    /// The sampling temperature.
    #[arg(short, long, default_value_t = DEFAULT_TEMPERATURE)]
    pub temperature: f64,

    /// The maximum number of tokens to generate.
    #[arg(short = 'M', long, default_value_t = DEFAULT_MAX_TOKENS)]
    pub max_tokens: u32,

    /// How many completions to request. Large values eat through the API quota.
    #[arg(short, long, default_value_t = 1)]
    pub repeat: u32,

    #[arg(short = 'F', long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub frequency_penalty: f64,

    #[arg(short = 'P', long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub presence_penalty: f64,

    /// Nucleus sampling. Avoid changing both this and the temperature.
    #[arg(short = 'T', long, default_value_t = 1.0)]
    pub top_p: f64,

    /// Generate this many completions server-side and return the best (completion models only).
    #[arg(short, long, default_value_t = 1)]
    pub best_of: u32,

    /// Echo the prompt back before the completion (completion models only).
    #[arg(short = 'E', long)]
    pub echo: bool,

    /// JSON object mapping token IDs to a bias between -100 and 100.
    #[arg(short = 'L', long)]
    pub logit_bias: Option<String>,

    /// Stop sequence.
    #[arg(long)]
    pub stop: Option<String>,

    /// Stream the response.
    #[arg(short = 'S', long)]
    pub stream: bool,

    /// The `user` reported to the API. Defaults to `$USER`.
    #[arg(short, long)]
    pub user: Option<String>,

    /// OpenAI-compatible base URL. `local` means http://localhost:8080/v1.
    #[arg(short, long)]
    pub endpoint: Option<String>,

    /// Shorthand for `-e local`. Overridden by `-e`.
    #[arg(short, long)]
    pub local: bool,

    /// Prompt text, placed before the positional arguments.
    #[arg(short, long)]
    pub prompt: Option<String>,

    #[arg(long)]
    pub prompt_prefix: Option<String>,

    #[arg(long)]
    pub prompt_suffix: Option<String>,

    /// String joining the prompt pieces (prefix, flag, args, file, stdin, suffix).
    #[arg(long)]
    pub prompt_joiner: Option<String>,

    /// Join prompt pieces with nothing. Takes precedence over --prompt-joiner.
    #[arg(short = 'N', long)]
    pub no_joiner: bool,

    /// Do not end the prompt with a newline. Good for finishing a sentence.
    #[arg(short, long)]
    pub no_trailing_newline: bool,

    /// System instructions for chat models. Ignored by other models.
    #[arg(short, long)]
    pub system: Option<String>,

    /// Read prompt text from a file, relative to the working directory.
    #[arg(short = 'f', long)]
    pub prompt_file: Option<PathBuf>,

    /// Prompt text.
    pub args: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum ChatCommand {
    /// Start a new chat and make it active.
    New {
        #[arg(short, long)]
        name: Option<String>,
        /// System message the chat starts with.
        #[arg(short, long)]
        system: Option<String>,
    },
    /// List chats. The active chat is marked with `*`.
    List {
        /// Only chats whose name contains this text (or matches this LIKE pattern).
        #[arg(short, long)]
        filter: Option<String>,
    },
    /// Print a chat as JSON. Defaults to the active chat.
    Show { chat_id: Option<String> },
    /// Delete a chat. Defaults to the active chat.
    Delete { chat_id: Option<String> },
    /// Make a chat the active one.
    Activate { chat_id: String },
    /// Remove every message from a chat. Defaults to the active chat.
    Clear { chat_id: Option<String> },
    /// Remove the last message from a chat. Defaults to the active chat.
    Pop { chat_id: Option<String> },
    /// Change the model a chat uses.
    Model {
        model: String,
        #[arg(long)]
        chat_id: Option<String>,
    },
    /// Keep recording messages without asking for replies.
    Pause,
    /// Resume asking for replies.
    Unpause,
    /// Show the active chat and pause state.
    Status,
    /// Add a message to the active chat and print the reply.
    Send {
        /// OpenAI-compatible base URL. `local` means http://localhost:8080/v1.
        #[arg(short, long)]
        endpoint: Option<String>,
        /// Shorthand for `-e local`. Overridden by `-e`.
        #[arg(short, long)]
        local: bool,
        /// Message text.
        #[arg(required = true)]
        prompt: Vec<String>,
    },
}

const COMPLETION_SUBCOMMAND: &str = "openai-completion";
const CHAT_SUBCOMMAND: &str = "chat";
const SEND_SUBCOMMAND: &str = "send";

/// Top-level flags remote callers may not use.
const REMOTE_FORBIDDEN_GLOBAL: &[&str] = &["debug"];
/// Completion flags remote callers may not use.
const REMOTE_FORBIDDEN_COMPLETION: &[&str] = &["stream", "user", "prompt_file", "endpoint", "local"];
/// Chat flags remote callers may not use.
const REMOTE_FORBIDDEN_CHAT: &[&str] = &["user_id"];
const REMOTE_FORBIDDEN_SEND: &[&str] = &["endpoint", "local"];

/// The clap command for a run in `ctx`.
///
/// Remote runs get the same parser with the local-only flags hidden from help;
/// using one is rejected by [`parse`].
pub fn command_for(ctx: &ExecutionContext) -> clap::Command {
    let cmd = Cli::command().arg(
        Arg::new("version")
            .short('v')
            .long("version")
            .action(ArgAction::Version)
            .help("Print version"),
    );
    if !ctx.is_remote() {
        return cmd;
    }

    let cmd = hide_args(cmd, REMOTE_FORBIDDEN_GLOBAL);
    cmd.mut_subcommand(COMPLETION_SUBCOMMAND, |sub| {
        hide_args(sub, REMOTE_FORBIDDEN_COMPLETION)
    })
    .mut_subcommand(CHAT_SUBCOMMAND, |chat| {
        hide_args(chat, REMOTE_FORBIDDEN_CHAT)
            .mut_subcommand(SEND_SUBCOMMAND, |send| hide_args(send, REMOTE_FORBIDDEN_SEND))
    })
}

fn hide_args(cmd: clap::Command, ids: &[&str]) -> clap::Command {
    ids.iter()
        .fold(cmd, |cmd, id| cmd.mut_arg(*id, |arg| arg.hide(true)))
}

/// Parse `args` (including the program name) for a run in `ctx`.
pub fn parse(args: &[&str], ctx: &ExecutionContext) -> Result<Cli, clap::Error> {
    let mut cmd = command_for(ctx);
    let matches = cmd.try_get_matches_from_mut(args)?;
    if ctx.is_remote() {
        reject_local_only_flags(&mut cmd, &matches)?;
    }
    Cli::from_arg_matches(&matches)
}

/// Whether `--debug` was passed. Parse errors count as "no".
pub fn debug_requested(args: &[&str], ctx: &ExecutionContext) -> bool {
    if ctx.is_remote() {
        return false;
    }
    command_for(ctx)
        .ignore_errors(true)
        .try_get_matches_from(args)
        .is_ok_and(|m| m.get_flag("debug"))
}

fn reject_local_only_flags(cmd: &mut clap::Command, matches: &ArgMatches) -> Result<(), clap::Error> {
    check_level(cmd, matches, REMOTE_FORBIDDEN_GLOBAL)?;
    match matches.subcommand() {
        Some((COMPLETION_SUBCOMMAND, sub)) => {
            check_level(cmd, sub, REMOTE_FORBIDDEN_COMPLETION)?;
        }
        Some((CHAT_SUBCOMMAND, chat)) => {
            check_level(cmd, chat, REMOTE_FORBIDDEN_CHAT)?;
            if let Some((SEND_SUBCOMMAND, send)) = chat.subcommand() {
                check_level(cmd, send, REMOTE_FORBIDDEN_SEND)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn check_level(cmd: &mut clap::Command, matches: &ArgMatches, ids: &[&str]) -> Result<(), clap::Error> {
    for id in ids {
        if matches.value_source(id) == Some(ValueSource::CommandLine) {
            let flag = flag_spelling(id);
            return Err(cmd.error(
                ErrorKind::UnknownArgument,
                format!("unexpected argument '{flag}' found"),
            ));
        }
    }
    Ok(())
}

/// `prompt_file` -> `--prompt-file`
fn flag_spelling(id: &str) -> String {
    format!("--{}", id.replace('_', "-"))
}
