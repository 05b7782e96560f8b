/// Display name given to chats created without an explicit name.
pub const DEFAULT_CHAT_NAME: &str = "Untitled Chat";

/// Model assigned to newly created chats.
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o";

/// Completion model used when neither `--model` nor
/// `DEFAULT_OPENAI_COMPLETION_MODEL` is set.
pub const FALLBACK_COMPLETION_MODEL: &str = "gpt-4o";

/// Base URL of the hosted OpenAI API.
pub const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.openai.com/v1";

/// Base URL selected by `--local` or `--endpoint local` (llama.cpp server).
pub const DEFAULT_LOCAL_ENDPOINT: &str = "http://localhost:8080/v1";

/// The `user` field sent to the API for every remote run.
pub const DEFAULT_REMOTE_USER: &str = "remote_user";

/// The `user` field for local runs when `$USER` is unset.
pub const UNKNOWN_LOCAL_USER: &str = "unknown-local-script-user";

/// Contact shown to remote users when something goes wrong server-side.
pub const DEFAULT_ADMIN_CONTACT: &str = "test-admin@test.admin";

/// File name of the chat database inside the data directory.
pub const DB_FILENAME: &str = "chats.db";

/// Request timeout for the completion API, in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 300;

/// Message shown when `OPENAI_API_KEY` is missing.
pub const OPENAI_API_KEY_NOT_SET_ERROR: &str = "[ERROR] OPENAI_API_KEY environment variable not set.
Step 1) Go to https://platform.openai.com/account/api-keys to get an API key.
Step 2) Open the file .env in the root of this project, and add the following line, without the angle brackets:
OPENAI_API_KEY=<your API key>";
