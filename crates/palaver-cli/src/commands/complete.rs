use std::io::{Read, Write};

use anyhow::Context;
use tracing::debug;

use palaver_lib::completion::client::{CompletionError, OpenAiClient};
use palaver_lib::completion::models::is_chat_completion_model;
use palaver_lib::completion::response::render_choices;
use palaver_lib::completion::sanitize::sanitize_api_error;
use palaver_lib::context::ExecutionContext;
use palaver_lib::error::{KnownSafeError, NO_PROMPT_ERROR};
use palaver_lib::output::ConsoleIO;
use palaver_lib::prompt::options::{
    CompletionOptions, PromptLayout, parse_logit_bias, resolve_endpoint,
};
use palaver_lib::prompt::pieces::{PromptPieces, concatenate_prompt_pieces};
use palaver_lib::runtime::Runtime;

use crate::cli::CompletionArgs;
use crate::runner::{CommandInfo, Outcome};

/// Assemble the prompt, call the completion or chat API and render the choices.
pub fn run_completion<IN, OUT, ERR>(
    args: &CompletionArgs,
    runtime: &Runtime,
    io: &mut dyn ConsoleIO<IN, OUT, ERR>,
) -> anyhow::Result<Outcome>
where
    IN: Read,
    OUT: Write,
    ERR: Write,
{
    let ctx = &runtime.context;
    let options = completion_options(args, runtime)?;

    let pieces = PromptPieces {
        prefix: args.prompt_prefix.clone(),
        flag: args.prompt.clone(),
        args: args.args.clone(),
        file: read_prompt_file(args, ctx)?,
        stdin: if ctx.is_remote() {
            None
        } else {
            io.read_piped_stdin().context("Failed to read stdin")?
        },
        suffix: args.prompt_suffix.clone(),
    };
    let layout = PromptLayout::new(
        args.prompt_joiner.as_deref(),
        args.no_joiner,
        args.no_trailing_newline,
    );
    let prompt = concatenate_prompt_pieces(&pieces, &layout.joiner, layout.trailing_newline);
    if prompt.is_empty() {
        return Err(KnownSafeError::new(NO_PROMPT_ERROR).into());
    }

    let client = open_client(&options.endpoint, runtime)?;
    let chat = is_chat_completion_model(&options.model);
    debug!(model = %options.model, chat, endpoint = %options.endpoint, "Running completion");

    let result = if chat {
        client.chat_complete(&options.single_turn_chat_request(&prompt))
    } else {
        client.complete(&options.completion_request(&prompt))
    };
    let choices = result.map_err(|e| api_failure(&e, client.api_key(), ctx))?;
    let output = render_choices(&choices)?;

    Ok(Outcome::success(
        output,
        CommandInfo {
            service: "openai",
            command: "completion",
            model: Some(options.model),
        },
    ))
}

fn completion_options(args: &CompletionArgs, runtime: &Runtime) -> anyhow::Result<CompletionOptions> {
    let model = args
        .model
        .clone()
        .unwrap_or_else(|| runtime.settings.default_completion_model.clone());
    let user = args.user.clone().unwrap_or_else(|| runtime.api_user());

    let mut options = CompletionOptions::with_defaults(model, user);
    options.temperature = args.temperature;
    options.max_tokens = args.max_tokens;
    options.repeat = args.repeat;
    options.frequency_penalty = args.frequency_penalty;
    options.presence_penalty = args.presence_penalty;
    options.top_p = args.top_p;
    options.best_of = args.best_of;
    options.echo = args.echo;
    options.logit_bias = args.logit_bias.as_deref().map(parse_logit_bias).transpose()?;
    options.stop.clone_from(&args.stop);
    options.stream = args.stream;
    options.system.clone_from(&args.system);
    options.endpoint = resolve_endpoint(
        args.endpoint.as_deref(),
        args.local,
        &runtime.settings.default_endpoint,
    );
    Ok(options.restricted_to(&runtime.context))
}

/// Contents of `--prompt-file`, resolved against the working directory.
/// Remote runs have no working directory and never read files.
fn read_prompt_file(args: &CompletionArgs, ctx: &ExecutionContext) -> anyhow::Result<Option<String>> {
    let (Some(path), Some(cwd)) = (&args.prompt_file, ctx.cwd()) else {
        return Ok(None);
    };
    let path = cwd.join(path);
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read prompt file {}", path.display()))?;
    Ok(Some(contents))
}

/// Client for `endpoint`, turning a missing API key into a user-facing error.
pub(crate) fn open_client(endpoint: &str, runtime: &Runtime) -> anyhow::Result<OpenAiClient> {
    match OpenAiClient::new(endpoint, runtime.settings.api_key.as_deref()) {
        Ok(client) => Ok(client),
        Err(err @ CompletionError::MissingApiKey) => Err(KnownSafeError::new(err.to_string()).into()),
        Err(err) => Err(err).context("Failed to build HTTP client"),
    }
}

/// API failures are reported to the caller, censored for remote runs.
pub(crate) fn api_failure(err: &CompletionError, api_key: &str, ctx: &ExecutionContext) -> anyhow::Error {
    KnownSafeError::new(sanitize_api_error(&err.to_string(), api_key, ctx)).into()
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;
    use palaver_lib::config::OPENAI_API_KEY_NOT_SET_ERROR;
    use palaver_lib::output::BufferedIO;
    use serde_json::json;

    use crate::runner::{Outcome, run};
    use crate::test_util::{
        TEST_ADMIN_CONTACT, TEST_API_KEY, api_error_body, chat_completion_body, completion_body,
        remote_runtime_in_memory, runtime_in_memory, trim_margin, write_prompt_file,
    };

    fn success_output(outcome: Outcome) -> String {
        match outcome {
            Outcome::Success { output, .. } => output,
            other => panic!("expected success, got {other:?}"),
        }
    }

    fn safe_failure(outcome: Outcome) -> String {
        match outcome {
            Outcome::FailureSafe { stderr } => stderr,
            other => panic!("expected safe failure, got {other:?}"),
        }
    }

    #[test]
    fn prompt_pieces_reach_the_completion_api() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/completions")
            .match_header("authorization", format!("Bearer {TEST_API_KEY}").as_str())
            .match_body(Matcher::PartialJson(json!({
                "model": "davinci",
                "prompt": "Summarize:\nfirst second\nfile body\nThanks\n",
                "user": "tester",
            })))
            .with_status(200)
            .with_body(completion_body(&["Done."]))
            .create();
        let (tmp, runtime) = runtime_in_memory("complete_prompt_pieces");
        write_prompt_file(tmp.path(), "prompt.txt", "file body");
        let url = server.url();
        let mut io = BufferedIO::new();

        let outcome = run(
            &[
                "palaver", "complete", "-m", "davinci", "-e", &url, "-p", "Summarize:",
                "-f", "prompt.txt", "--prompt-suffix", "Thanks", "first", "second",
            ],
            &runtime,
            &mut io,
        )
        .unwrap();

        assert_eq!(success_output(outcome), "Done.");
        mock.assert();
    }

    #[test]
    fn piped_stdin_and_custom_joiner() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/chat/completions")
            .match_body(Matcher::PartialJson(json!({
                "model": "gpt-4o",
                "messages": [
                    {"role": "system", "content": "Be terse."},
                    {"role": "user", "content": "Explain | fn main() {}"},
                ],
            })))
            .with_status(200)
            .with_body(chat_completion_body(&["It is empty."]))
            .create();
        let (_tmp, runtime) = runtime_in_memory("complete_piped_stdin");
        let url = server.url();
        let mut io = BufferedIO::with_stdin(b"fn main() {}");

        let outcome = run(
            &[
                "palaver", "complete", "-e", &url, "-s", "Be terse.", "--prompt-joiner", " | ",
                "-n", "Explain",
            ],
            &runtime,
            &mut io,
        )
        .unwrap();

        assert_eq!(success_output(outcome), "It is empty.");
        mock.assert();
    }

    #[test]
    fn multiple_choices_are_newline_terminated() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/chat/completions")
            .match_body(Matcher::PartialJson(json!({"n": 2})))
            .with_status(200)
            .with_body(chat_completion_body(&["one", "two"]))
            .create();
        let (_tmp, runtime) = runtime_in_memory("complete_multi_choice");
        let url = server.url();
        let mut io = BufferedIO::new();

        let outcome = run(
            &["palaver", "complete", "-e", &url, "-r", "2", "count"],
            &runtime,
            &mut io,
        )
        .unwrap();

        assert_eq!(
            success_output(outcome),
            trim_margin!(
                "|one
                 |two
                 |"
            )
        );
    }

    #[test]
    fn whitespace_answer_is_no_text() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(chat_completion_body(&["  \n"]))
            .create();
        let (_tmp, runtime) = runtime_in_memory("complete_whitespace");
        let url = server.url();
        let mut io = BufferedIO::new();

        let outcome = run(&["palaver", "complete", "-e", &url, "hello"], &runtime, &mut io).unwrap();

        assert_eq!(safe_failure(outcome), "[ERROR] No text returned.");
    }

    #[test]
    fn missing_api_key_is_reported_after_prompt_check() {
        let (_tmp, mut runtime) = runtime_in_memory("complete_missing_key");
        runtime.settings.api_key = None;
        let mut io = BufferedIO::new();

        let outcome = run(&["palaver", "complete", "hello"], &runtime, &mut io).unwrap();

        assert_eq!(safe_failure(outcome), OPENAI_API_KEY_NOT_SET_ERROR);
    }

    #[test]
    fn invalid_logit_bias_is_rejected() {
        let (_tmp, runtime) = runtime_in_memory("complete_bad_logit_bias");
        let mut io = BufferedIO::new();

        let outcome = run(
            &["palaver", "complete", "-L", "[1, 2]", "hello"],
            &runtime,
            &mut io,
        )
        .unwrap();

        assert!(safe_failure(outcome).starts_with("[ERROR] --logit-bias must be a JSON object"));
    }

    #[test]
    fn local_api_errors_are_shown_verbatim() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body(api_error_body("Incorrect API key provided: sk-test-key."))
            .create();
        let (_tmp, runtime) = runtime_in_memory("complete_local_api_error");
        let url = server.url();
        let mut io = BufferedIO::new();

        let outcome = run(&["palaver", "complete", "-e", &url, "hello"], &runtime, &mut io).unwrap();

        assert_eq!(
            safe_failure(outcome),
            "Incorrect API key provided: sk-test-key."
        );
    }

    #[test]
    fn remote_runs_use_the_configured_endpoint_and_forced_user() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/chat/completions")
            .match_body(Matcher::PartialJson(json!({
                "user": "remote_user",
                "stream": false,
            })))
            .with_status(200)
            .with_body(chat_completion_body(&["Hi there"]))
            .create();
        let (_tmp, mut runtime) = remote_runtime_in_memory("complete_remote_user");
        runtime.settings.default_endpoint = server.url();
        let mut io = BufferedIO::with_stdin(b"ignored");

        let outcome = run(&["palaver", "complete", "hello"], &runtime, &mut io).unwrap();

        assert_eq!(success_output(outcome), "Hi there");
        mock.assert();
    }

    #[test]
    fn remote_api_key_errors_are_censored() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body(api_error_body("Incorrect API key provided: sk-test-key."))
            .create();
        let (_tmp, mut runtime) = remote_runtime_in_memory("complete_remote_censor");
        runtime.settings.default_endpoint = server.url();
        let mut io = BufferedIO::new();

        let outcome = run(&["palaver", "complete", "hello"], &runtime, &mut io).unwrap();

        assert_eq!(
            safe_failure(outcome),
            format!(
                "[ERROR] Something is wrong with the API key. Please contact the server administrator and let them know: {TEST_ADMIN_CONTACT}"
            )
        );
    }

    #[test]
    fn remote_prompt_file_is_rejected() {
        let (_tmp, runtime) = remote_runtime_in_memory("complete_remote_file");
        let mut io = BufferedIO::new();

        let outcome = run(
            &["palaver", "complete", "-f", "/etc/passwd"],
            &runtime,
            &mut io,
        )
        .unwrap();

        assert!(safe_failure(outcome).starts_with("error: unexpected argument '--prompt-file' found"));
    }
}
