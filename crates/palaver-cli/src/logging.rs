use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

const DEFAULT_DIRECTIVES: &str = "warn";

/// Filter directives for this run: `--debug` wins, then `PALAVER_LOG`, then
/// `RUST_LOG`, then `warn`.
pub fn filter_directives(debug: bool, palaver_log: Option<&str>, rust_log: Option<&str>) -> String {
    if debug {
        return "debug".to_string();
    }
    palaver_log
        .or(rust_log)
        .filter(|d| !d.trim().is_empty())
        .unwrap_or(DEFAULT_DIRECTIVES)
        .to_string()
}

/// Install the global subscriber. Logs go to stderr so stdout stays clean for
/// completions; `PALAVER_LOG_FORMAT=json` switches to JSON lines.
pub fn init(debug: bool) -> anyhow::Result<()> {
    let directives = filter_directives(
        debug,
        std::env::var("PALAVER_LOG").ok().as_deref(),
        std::env::var("RUST_LOG").ok().as_deref(),
    );
    let filter = EnvFilter::try_new(&directives)
        .or_else(|_| EnvFilter::try_new(DEFAULT_DIRECTIVES))?;

    let json = std::env::var("PALAVER_LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    let layer = if json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .try_init()?;
    Ok(())
}
