//! NEFOL CLI - Database migrations and staff management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! nefol-cli migrate
//!
//! # Seed the standard roles and permissions
//! nefol-cli staff seed-roles
//!
//! # Create a staff user (password read from stdin)
//! echo "$PASSWORD" | nefol-cli staff create -e ops@thenefol.com -n "Ops" -r admin --password-stdin
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` - `PostgreSQL` connection string

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "nefol-cli")]
#[command(author, version, about = "NEFOL backend CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage staff accounts
    Staff {
        #[command(subcommand)]
        action: StaffAction,
    },
}

#[derive(Subcommand)]
enum StaffAction {
    /// Create a new staff user
    Create {
        /// Staff email address
        #[arg(short, long)]
        email: String,

        /// Staff display name
        #[arg(short, long)]
        name: String,

        /// Role to assign (`admin`, `manager`, `staff`, `viewer` or a custom role)
        #[arg(short, long)]
        role: Option<String>,

        /// Read the password from stdin instead of generating one
        #[arg(long)]
        password_stdin: bool,
    },
    /// Create the standard roles and permissions (idempotent)
    SeedRoles,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Staff { action } => match action {
            StaffAction::Create {
                email,
                name,
                role,
                password_stdin,
            } => {
                commands::staff::create(&email, &name, role.as_deref(), password_stdin).await?;
            }
            StaffAction::SeedRoles => commands::staff::seed_roles().await?,
        },
    }
    Ok(())
}
