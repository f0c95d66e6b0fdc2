use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "moodle-stack")]
#[command(about = "Deploy, reset and back up a Moodle + MySQL stack with docker compose", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Project directory (defaults to the nearest parent holding .env or docker-compose.yml)
    #[arg(long, global = true, env = "MOODLE_STACK_ROOT")]
    pub root: Option<PathBuf>,

    /// Env file with the deployment settings (defaults to <root>/.env)
    #[arg(long, global = true)]
    pub env_file: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Pull the Moodle image and (re)start the db and app services
    Install,

    /// Stop the stack, delete all database files and install again
    Reset {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Copy database files and archive Moodle data into a timestamped directory
    Backup,

    /// Show the state of the db and app services
    Status,

    /// Print the compose file install would write
    Compose,
}
