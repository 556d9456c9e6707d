//! FixIt CLI - headless operator tools.
//!
//! Drives the same access guard and complaint loader as the web console,
//! against the Firebase project named in the environment.
//!
//! # Usage
//!
//! ```bash
//! # Sign in and report whether the account is admitted
//! FIXIT_EMAIL=warden@campus.edu FIXIT_PASSWORD=... fixit-cli check-access
//!
//! # Sign in and print the complaint list, newest first
//! FIXIT_EMAIL=warden@campus.edu FIXIT_PASSWORD=... fixit-cli complaints
//! ```
//!
//! # Commands
//!
//! - `check-access` - Run the role check for an account
//! - `complaints` - Print the sorted complaint list

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

use fixit_admin::state::AppState;

mod commands;

use commands::{CliError, Credentials};

/// Exit code when the account signed in but was not admitted.
const EXIT_DENIED: i32 = 2;

#[derive(Parser)]
#[command(name = "fixit-cli")]
#[command(author, version, about = "FixIt admin console tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and report the role decision
    CheckAccess,
    /// Sign in and print the complaint list
    Complaints {
        /// Print at most this many complaints
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() {
    // Logs go to stderr so command output can be piped
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fixit_cli=info,fixit_admin=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(EXIT_DENIED),
        Err(e) => {
            tracing::error!("Command failed: {e}");
            std::process::exit(1);
        }
    }
}

/// Run a command. Returns whether the account was admitted.
async fn run(cli: Cli) -> Result<bool, CliError> {
    let config = commands::load_config()?;
    let credentials = Credentials::from_env()?;
    let state = AppState::from_config(config)?;
    let _driver = state.start();

    let mut out = std::io::stdout().lock();
    match cli.command {
        Commands::CheckAccess => commands::access::check_access(&state, &credentials, &mut out).await,
        Commands::Complaints { limit } => {
            commands::complaints::list(&state, &credentials, limit, &mut out).await
        }
    }
}
