//! CLI argument parsing definitions

use clap::{Parser, Subcommand};
use secureaware_rbac::Role;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the portal API server
    Serve {
        /// YAML user directory for the in-memory identity provider
        #[arg(long, value_name = "PATH")]
        users: Option<PathBuf>,
    },

    /// Mint a session token for local testing
    Token {
        /// Principal id to put in the token
        #[arg(long, value_name = "ID")]
        user: String,

        /// Email claim
        #[arg(long, value_name = "EMAIL")]
        email: Option<String>,

        /// Role claim (admin, employee); only consulted when role_source is claims
        #[arg(long, value_name = "ROLE")]
        role: Option<Role>,
    },

    /// Print a sample configuration file
    PrintConfig,
}
