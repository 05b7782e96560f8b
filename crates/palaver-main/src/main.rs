use std::process::ExitCode;

use anyhow::Context;

use palaver_cli::{cli, logging, runner};
use palaver_lib::db::driver::DatabaseDriver;
use palaver_lib::output::StdIO;
use palaver_lib::runtime::Runtime;
use palaver_lib::settings::Settings;

fn main() -> anyhow::Result<ExitCode> {
    dotenv::dotenv().ok();

    let settings = Settings::from_env()?;
    let cwd = std::env::current_dir().context("Failed to determine the working directory")?;
    let context = settings.execution_context(cwd);

    let args: Vec<String> = std::env::args().collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    logging::init(cli::debug_requested(&args, &context))?;

    let runtime = Runtime {
        context,
        db: DatabaseDriver::file(settings.db_path.clone()),
        settings,
    };

    let mut io = StdIO::new();
    let outcome = runner::run(&args, &runtime, &mut io)?;
    outcome
        .write_to(&mut io)
        .context("Failed to write output")?;
    Ok(ExitCode::from(outcome.exit_code()))
}
