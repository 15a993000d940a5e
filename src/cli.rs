//! Command-line interface definitions using clap

use clap::{Parser, Subcommand};

/// url-shortener - short links with signed deletion and visitor logs
#[derive(Parser, Debug)]
#[command(name = "url-shortener")]
#[command(version)]
#[command(about = "URL shortening service backed by Redis", long_about = None)]
pub struct Cli {
    /// Configuration file (TOML); missing file means defaults + environment
    #[arg(long, short = 'c', global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

/// Configuration management commands
#[derive(Subcommand, Debug, PartialEq)]
pub enum ConfigCommands {
    /// Print (or write) a sample configuration file
    Sample {
        /// Output path (default: stdout)
        output_path: Option<String>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
