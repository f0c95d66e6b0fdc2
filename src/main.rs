mod backup;
mod cli;
mod commands;
mod config;
mod deploy;
mod docker;
mod env;
mod error;
mod lock;
mod preflight;
mod reset;
mod status;
mod topology;

#[cfg(test)]
mod test_support;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // LOG_LEVEL wins over -v
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
        .to_string()
    });

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level))
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    let start_dir = std::env::current_dir()?;
    let root = cli
        .root
        .clone()
        .unwrap_or_else(|| config::find_project_root(&start_dir));
    let env_file = cli
        .env_file
        .clone()
        .unwrap_or_else(|| root.join(env::DEFAULT_ENV_FILE));

    let inv = commands::Invocation { root, env_file };
    if let Err(e) = commands::dispatch(&inv, cli.command).await {
        // Not routed through tracing: LOG_LEVEL=off must still report it.
        eprintln!("{}", e.diagnostic());
        std::process::exit(e.exit_code());
    }
    Ok(())
}
