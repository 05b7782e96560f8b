pub mod cli;
pub mod commands;
pub mod logging;
pub mod runner;

#[cfg(test)]
pub mod test_util;

use std::io::{Read, Write};

use clap::error::ErrorKind;

use palaver_lib::output::ConsoleIO;
use palaver_lib::runtime::Runtime;

use cli::Command;
use runner::Outcome;

/// Main CLI entry point. Parses args and dispatches to the appropriate command.
///
/// Parse failures, help and version requests come back as outcomes; command
/// failures are returned as errors for [`runner::run`] to classify.
pub fn try_run<IN, OUT, ERR>(
    args: &[&str],
    runtime: &Runtime,
    io: &mut dyn ConsoleIO<IN, OUT, ERR>,
) -> anyhow::Result<Outcome>
where
    IN: Read,
    OUT: Write,
    ERR: Write,
{
    let cli = match cli::parse(args, &runtime.context) {
        Ok(cli) => cli,
        Err(err) => return Ok(parse_error_outcome(&err)),
    };

    match cli.command {
        Command::OpenAiCompletion(args) => commands::complete::run_completion(&args, runtime, io),
        Command::Chat { user_id, command } => {
            commands::chat::run_chat(command, user_id.as_deref(), runtime)
        }
    }
}

fn parse_error_outcome(err: &clap::Error) -> Outcome {
    match err.kind() {
        ErrorKind::DisplayHelp
        | ErrorKind::DisplayVersion
        | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => Outcome::Exit {
            output: err.to_string(),
        },
        _ => Outcome::FailureSafe {
            stderr: err.to_string(),
        },
    }
}
