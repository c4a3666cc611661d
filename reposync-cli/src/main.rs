//! reposync: mirror one project tree to many repositories.
//!
//! # Usage
//!
//! ```text
//! reposync init [--root <dir>] [--settings-password <pw>] [--password <current>]
//! reposync profile add <name> --repo <url> --token <token>
//! reposync profile list [--json]
//! reposync profile edit <name-or-id> [--name <name>] [--repo <url>] [--token <token>]
//! reposync profile remove <name-or-id>
//! reposync sync [--profile <name>]... [--root <dir>] [--password <pw>] [--json]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{init::InitArgs, profile::ProfileCommand, sync::SyncArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "reposync",
    version,
    about = "Force-mirror a project tree to several remote repositories",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write ~/.reposync/config.yaml.
    Init(InitArgs),

    /// Manage stored sync profiles.
    Profile {
        #[command(subcommand)]
        command: ProfileCommand,
    },

    /// Replace every selected remote with a snapshot of the project tree.
    Sync(SyncArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Profile { command } => commands::profile::run(command),
        Commands::Sync(args) => args.run(),
    }
}

/// Log to stderr so `--json` output on stdout stays parseable.
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
