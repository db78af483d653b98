use clap::Parser;
use hr_odds_log::config::Config;
use hr_odds_log::{handle_invocation, telemetry, InvocationContext};
use std::path::PathBuf;

/// Fetch today's home-run prop odds and append them to the stored log.
#[derive(Parser, Debug)]
#[command(name = "hr-odds-log", version, about)]
struct Cli {
    /// Path to the TOML config.
    #[arg(long, env = "HR_ODDS_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    /// Which `[logs.<name>]` table to run.
    #[arg(long, default_value = "odds")]
    log: String,

    /// Trigger payload, passed through to the invocation log.
    #[arg(long, default_value = "{}")]
    event: String,

    /// Emit JSON log lines instead of compact text.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    telemetry::init(cli.json_logs);

    // Load saved keys from .env (real env vars take precedence)
    Config::load_env_file();

    let event = serde_json::from_str(&cli.event).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "event payload is not JSON, passing it as a string");
        serde_json::Value::String(cli.event.clone())
    });

    handle_invocation(event, InvocationContext::new(cli.config, cli.log)).await;
}
