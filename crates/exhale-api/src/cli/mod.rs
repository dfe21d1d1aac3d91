//! CLI command definitions and dispatch for the `exhale` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod status;
pub mod token;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use uuid::Uuid;

use exhale_types::identity::Role;

/// Appointment scheduling and coaching-session messaging server.
#[derive(Parser)]
#[command(name = "exhale", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the REST API and realtime channel server.
    Serve {
        /// Port to listen on.
        #[arg(short, long, default_value_t = 8087, env = "EXHALE_PORT")]
        port: u16,

        /// Host to bind.
        #[arg(long, default_value = "127.0.0.1", env = "EXHALE_HOST")]
        host: String,

        /// Export traces via OpenTelemetry (stdout exporter).
        #[arg(long)]
        otel: bool,
    },

    /// Show appointment and message counts.
    Status,

    /// Issue an access token for a principal.
    Token {
        #[command(subcommand)]
        action: TokenCommand,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum TokenCommand {
    /// Issue a new token. Prints it once; only the hash is stored.
    Issue {
        /// Principal the token authenticates as (random when omitted).
        #[arg(long)]
        principal_id: Option<Uuid>,

        /// Role of the principal: participant or coach.
        #[arg(long)]
        role: Role,

        /// Optional label for the token.
        #[arg(long)]
        name: Option<String>,
    },
}
