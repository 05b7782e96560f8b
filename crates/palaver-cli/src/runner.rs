use std::io::{Read, Write};

use tracing::error;

use palaver_lib::context::ExecutionContext;
use palaver_lib::error::{KnownSafeError, error_kind};
use palaver_lib::output::ConsoleIO;
use palaver_lib::runtime::Runtime;

/// What a successful command did, for callers that relay results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInfo {
    pub service: &'static str,
    pub command: &'static str,
    pub model: Option<String>,
}

/// Result of one run, ready to be printed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success { output: String, command: CommandInfo },
    /// Help or version output.
    Exit { output: String },
    /// Failure whose message may be shown to anyone.
    FailureSafe { stderr: String },
    /// Failure carrying internal details. Only produced for local runs.
    FailureUnsafe { stderr: String },
}

impl Outcome {
    pub fn success(output: impl Into<String>, command: CommandInfo) -> Self {
        Self::Success {
            output: output.into(),
            command,
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Success { .. } | Self::Exit { .. } => 0,
            Self::FailureSafe { .. } | Self::FailureUnsafe { .. } => 1,
        }
    }

    /// Print output to stdout and failures to stderr, newline-terminated.
    pub fn write_to<IN, OUT, ERR>(&self, io: &mut dyn ConsoleIO<IN, OUT, ERR>) -> std::io::Result<()>
    where
        IN: Read,
        OUT: Write,
        ERR: Write,
    {
        match self {
            Self::Success { output, .. } | Self::Exit { output } => {
                write_terminated(io.stdout(), output)
            }
            Self::FailureSafe { stderr } | Self::FailureUnsafe { stderr } => {
                write_terminated(io.stderr(), stderr)
            }
        }
    }
}

fn write_terminated(out: &mut dyn Write, text: &str) -> std::io::Result<()> {
    out.write_all(text.as_bytes())?;
    if !text.ends_with('\n') {
        out.write_all(b"\n")?;
    }
    out.flush()
}

/// Run the CLI and map every failure to an [`Outcome`].
///
/// [`KnownSafeError`]s are reported verbatim. Other errors are unexpected:
/// remote callers only learn the error kind and who to contact, local
/// callers get the full chain. With `DEBUG_THROW` set, unexpected errors are
/// returned instead.
pub fn run<IN, OUT, ERR>(
    args: &[&str],
    runtime: &Runtime,
    io: &mut dyn ConsoleIO<IN, OUT, ERR>,
) -> anyhow::Result<Outcome>
where
    IN: Read,
    OUT: Write,
    ERR: Write,
{
    match crate::try_run(args, runtime, io) {
        Ok(outcome) => Ok(outcome),
        Err(err) => {
            if let Some(safe) = err.downcast_ref::<KnownSafeError>() {
                return Ok(Outcome::FailureSafe {
                    stderr: safe.to_string(),
                });
            }
            if runtime.settings.debug_throw {
                return Err(err);
            }
            Ok(unexpected_failure(&err, &runtime.context))
        }
    }
}

fn unexpected_failure(err: &anyhow::Error, ctx: &ExecutionContext) -> Outcome {
    let Some(admin_contact) = ctx.admin_contact() else {
        return Outcome::FailureUnsafe {
            stderr: format!("[ERROR]: {err:#}"),
        };
    };
    let chain = format!("{err:#}");
    error!(error = %chain, "Unexpected error in remote run");
    Outcome::FailureSafe {
        stderr: format!(
            "[ERROR]: {}. This is an unexpected error.\nPlease contact the server administrator and let them know: {admin_contact}",
            error_kind(err)
        ),
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Context;
    use palaver_lib::output::BufferedIO;

    use super::*;
    use crate::test_util::{remote_runtime_in_memory, runtime_in_memory};

    #[test]
    fn exit_codes() {
        let info = CommandInfo {
            service: "palaver",
            command: "chat",
            model: None,
        };
        assert_eq!(Outcome::success("x", info).exit_code(), 0);
        assert_eq!(Outcome::Exit { output: String::new() }.exit_code(), 0);
        assert_eq!(Outcome::FailureSafe { stderr: String::new() }.exit_code(), 1);
        assert_eq!(Outcome::FailureUnsafe { stderr: String::new() }.exit_code(), 1);
    }

    #[test]
    fn write_to_terminates_lines() {
        let mut io = BufferedIO::new();
        Outcome::Exit {
            output: "usage".to_string(),
        }
        .write_to(&mut io)
        .unwrap();
        Outcome::FailureSafe {
            stderr: "[ERROR] nope\n".to_string(),
        }
        .write_to(&mut io)
        .unwrap();
        assert_eq!(io.stdout_to_string(), "usage\n");
        assert_eq!(io.stderr_to_string(), "[ERROR] nope\n");
    }

    #[test]
    fn unexpected_local_error_carries_chain() {
        let err = Err::<(), _>(std::io::Error::other("disk on fire"))
            .context("Failed to read prompt file p.txt")
            .unwrap_err();
        let outcome = unexpected_failure(&err, &ExecutionContext::local("/tmp"));
        assert_eq!(
            outcome,
            Outcome::FailureUnsafe {
                stderr: "[ERROR]: Failed to read prompt file p.txt: disk on fire".to_string()
            }
        );
    }

    #[test]
    fn unexpected_remote_error_hides_details() {
        let err = Err::<(), _>(std::io::Error::other("/srv/secret/path"))
            .context("boom")
            .unwrap_err();
        let outcome = unexpected_failure(&err, &ExecutionContext::remote("ops@example.com", "u1"));
        assert_eq!(
            outcome,
            Outcome::FailureSafe {
                stderr: "[ERROR]: IoError. This is an unexpected error.\nPlease contact the server administrator and let them know: ops@example.com".to_string()
            }
        );
    }

    #[test]
    fn known_safe_errors_are_reported_verbatim() {
        let (_tmp, runtime) = runtime_in_memory("runner_known_safe");
        let mut io = BufferedIO::new();

        let outcome = run(&["palaver", "complete"], &runtime, &mut io).unwrap();

        assert_eq!(
            outcome,
            Outcome::FailureSafe {
                stderr: "[ERROR] No prompt text was provided.".to_string()
            }
        );
    }

    #[test]
    fn debug_throw_propagates_unexpected_errors() {
        let (tmp, mut runtime) = runtime_in_memory("runner_debug_throw");
        runtime.settings.debug_throw = true;
        let mut io = BufferedIO::new();

        let missing = tmp.path().join("missing.txt");
        let result = run(
            &["palaver", "complete", "-f", missing.to_str().unwrap()],
            &runtime,
            &mut io,
        );

        assert!(result.unwrap_err().to_string().starts_with("Failed to read prompt file"));
    }

    #[test]
    fn unexpected_local_error_without_debug_throw() {
        let (_tmp, runtime) = runtime_in_memory("runner_unexpected_local");
        let mut io = BufferedIO::new();

        let outcome = run(&["palaver", "complete", "-f", "missing.txt"], &runtime, &mut io).unwrap();

        let Outcome::FailureUnsafe { stderr } = outcome else {
            panic!("expected unsafe failure, got {outcome:?}");
        };
        assert!(stderr.starts_with("[ERROR]: Failed to read prompt file"));
    }

    #[test]
    fn parse_errors_are_safe_failures() {
        let (_tmp, runtime) = remote_runtime_in_memory("runner_parse_error");
        let mut io = BufferedIO::new();

        let outcome = run(&["palaver", "complete", "--stream", "hi"], &runtime, &mut io).unwrap();

        let Outcome::FailureSafe { stderr } = outcome else {
            panic!("expected safe failure, got {outcome:?}");
        };
        assert!(stderr.starts_with("error: unexpected argument '--stream' found"));
    }

    #[test]
    fn help_is_an_exit_outcome() {
        let (_tmp, runtime) = remote_runtime_in_memory("runner_help");
        let mut io = BufferedIO::new();

        let outcome = run(&["palaver", "--help"], &runtime, &mut io).unwrap();

        let Outcome::Exit { output } = outcome else {
            panic!("expected exit, got {outcome:?}");
        };
        assert!(output.contains("Usage: palaver"));
        assert_eq!(io.stdout_to_string(), "");
    }
}
