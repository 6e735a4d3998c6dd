//! scandash - command-line dashboard for a remote security-scanning service.
//!
//! Signs in against the service, keeps the session on disk and exposes the
//! user management, role and URL scanning endpoints as subcommands.

mod commands;

use std::io;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use scandash_core::models::{ScanKind, DEFAULT_LINES_PER_PAGE};
use scandash_core::ApiError;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Printed when a command cannot obtain a usable session
const LOGIN_HINT: &str = "Session expired or missing. Run `scandash login`.";

#[derive(Parser, Debug)]
#[command(name = "scandash", version, about = "Dashboard for the security-scanning API")]
struct Cli {
    /// Print raw JSON instead of tables
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and store the session
    Login {
        /// Username or email; defaults to the last one used
        #[arg(short, long)]
        username: Option<String>,
    },
    /// Revoke the session and remove stored credentials
    Logout,
    /// Show the signed-in user and token state
    Whoami,
    /// Manage users
    #[command(subcommand)]
    Users(UserCommand),
    /// Manage roles and role assignments
    #[command(subcommand)]
    Roles(RoleCommand),
    /// Submit a URL for scanning
    Scan { url: String },
    /// List scanned URLs
    History {
        /// Only show URLs containing this text
        #[arg(short, long, default_value = "")]
        search: String,
        #[arg(short, long, default_value_t = 1)]
        page: usize,
    },
    /// Delete a scanned URL and its analyses
    Forget { url_id: String },
    /// Show one analysis (ssl, dns, http, vuln), or all of them
    Result {
        url_id: String,
        #[arg(short, long)]
        kind: Option<ScanKind>,
    },
    /// Show the summary and recommendations of a scan
    Summary { url_id: String },
    /// Print the full paginated report of a scan
    Report {
        url_id: String,
        #[arg(long, default_value_t = DEFAULT_LINES_PER_PAGE)]
        lines_per_page: usize,
    },
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    /// List users with their roles
    List,
    /// Show one user
    Show { user_id: String },
    /// Create a user; the password is prompted for
    Create {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "")]
        phone: String,
    },
    /// Change user fields; only values that differ are sent
    Update {
        user_id: String,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        active: Option<bool>,
    },
    /// Set a new password; it is prompted for
    ResetPassword { user_id: String },
    /// Delete a user
    Delete { user_id: String },
}

#[derive(Subcommand, Debug)]
enum RoleCommand {
    /// List available roles
    List,
    /// Give a user a role, by role name
    Assign { user_id: String, role: String },
    /// Take a role away from a user, by role name
    Remove { user_id: String, role: String },
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();
    let cli = Cli::parse();
    info!(command = ?cli.command, "scandash starting");

    match commands::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let needs_login = e
                .downcast_ref::<ApiError>()
                .is_some_and(ApiError::requires_login);
            if needs_login {
                eprintln!("{}", LOGIN_HINT);
                ExitCode::from(2)
            } else {
                eprintln!("Error: {:#}", e);
                ExitCode::FAILURE
            }
        }
    }
}
