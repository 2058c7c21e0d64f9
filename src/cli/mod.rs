//! CLI module - Command-line interface for Marquee
//!
//! This module provides a structured CLI using clap for argument parsing.

mod commands;

use clap::{Parser, Subcommand};

/// Marquee - movie catalog JSON API
#[derive(Parser)]
#[command(name = "marquee")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API (default)
    Serve,

    /// Apply database migrations and exit
    Migrate,

    /// Grant permission codes to a user
    Grant {
        /// Email the account was registered with
        email: String,
        /// Permission codes, e.g. movies:write
        #[arg(required = true)]
        codes: Vec<String>,
    },

    /// Create default config file
    #[command(alias = "init")]
    InitConfig,
}

pub use commands::*;
