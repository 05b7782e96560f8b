use std::collections::HashMap;

use palaver_lib::context::ExecutionContext;
use palaver_lib::db::driver::DatabaseDriver;
use palaver_lib::runtime::Runtime;
use palaver_lib::settings::Settings;

// Re-export shared helpers from palaver-test-util.
pub use palaver_test_util::api::{
    api_error_body, chat_completion_body, chat_stream_body, completion_body,
};
pub use palaver_test_util::prompt_file::write_prompt_file;

pub const TEST_API_KEY: &str = "sk-test-key";
pub const TEST_LOCAL_USER: &str = "tester";
pub const TEST_ADMIN_CONTACT: &str = "ops@example.com";
pub const TEST_REMOTE_USER: &str = "discord-42";

fn test_settings(tmp: &tempfile::TempDir, remote: bool) -> Settings {
    let mut vars = HashMap::from([
        ("OPENAI_API_KEY", TEST_API_KEY.to_string()),
        ("USER", TEST_LOCAL_USER.to_string()),
        ("PALAVER_ADMIN_CONTACT", TEST_ADMIN_CONTACT.to_string()),
        ("PALAVER_REMOTE_USER_ID", TEST_REMOTE_USER.to_string()),
        (
            "PALAVER_DB",
            tmp.path().join("unused.db").to_string_lossy().into_owned(),
        ),
    ]);
    if remote {
        vars.insert("CLI_IS_REMOTE", "true".to_string());
    }
    Settings::from_lookup(|key| vars.get(key).cloned()).unwrap()
}

/// Create a local [`Runtime`] with an in-memory database whose working
/// directory is a fresh tempdir.
///
/// The `name` must be unique per test to prevent cross-test DB collisions.
/// The caller must hold the returned [`tempfile::TempDir`] to keep the
/// temporary directory alive for the duration of the test.
pub fn runtime_in_memory(name: &str) -> (tempfile::TempDir, Runtime) {
    let tmp = tempfile::tempdir().unwrap();
    let settings = test_settings(&tmp, false);
    let runtime = Runtime {
        context: settings.execution_context(tmp.path().to_path_buf()),
        db: DatabaseDriver::in_memory(name).unwrap(),
        settings,
    };
    (tmp, runtime)
}

/// Like [`runtime_in_memory`], but for a remote caller acting as
/// [`TEST_REMOTE_USER`].
pub fn remote_runtime_in_memory(name: &str) -> (tempfile::TempDir, Runtime) {
    let tmp = tempfile::tempdir().unwrap();
    let settings = test_settings(&tmp, true);
    let runtime = Runtime {
        context: settings.execution_context(tmp.path().to_path_buf()),
        db: DatabaseDriver::in_memory(name).unwrap(),
        settings,
    };
    assert!(matches!(runtime.context, ExecutionContext::Remote { .. }));
    (tmp, runtime)
}

/// Strip margin markers from a multi-line string (Kotlin-style `trimMargin`).
///
/// Each line is scanned for the first `|` character after optional leading
/// whitespace. Everything before and including the `|` is removed. Lines that
/// do not contain a leading `|` are dropped.
///
/// Use `\|` to include a literal `|` in the output.
///
/// Prefer the [`trim_margin!`] macro which wraps `format!` for convenience.
pub fn _trim_margin(s: &str) -> String {
    s.lines()
        .filter_map(|line| {
            let trimmed = line.trim_start();
            trimmed
                .strip_prefix('|')
                .map(|rest| rest.replace("\\|", "|"))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build a margin-trimmed string with `format!`-style interpolation.
macro_rules! trim_margin {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::test_util::_trim_margin(&format!($fmt $(, $arg)*))
    };
}
pub(crate) use trim_margin;

#[cfg(test)]
mod tests {
    use super::_trim_margin;

    #[test]
    fn trim_margin_trailing_newline() {
        let result = _trim_margin(
            "|hello
             |",
        );
        assert_eq!(result, "hello\n");
    }

    #[test]
    fn trim_margin_escaped_pipe() {
        let result = _trim_margin(
            "|a \\| b
             |c",
        );
        assert_eq!(result, "a | b\nc");
    }

    #[test]
    fn trim_margin_with_format() {
        let name = "world";
        let s = trim_margin!(
            "|Hello, {name}!
             |  indented
             |"
        );
        assert_eq!(s, "Hello, world!\n  indented\n");
    }

    #[test]
    fn runtimes_have_expected_context() {
        let (_tmp, local) = super::runtime_in_memory("test_util_local");
        assert!(!local.context.is_remote());
        assert_eq!(local.settings.api_key.as_deref(), Some(super::TEST_API_KEY));

        let (_tmp, remote) = super::remote_runtime_in_memory("test_util_remote");
        assert_eq!(remote.context.admin_contact(), Some(super::TEST_ADMIN_CONTACT));
    }
}
