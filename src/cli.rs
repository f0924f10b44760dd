//! CLI definition and parsing.
//! Defines Args/Command and provides parse() for command-line handling.
//!
//! Notes:
//! - URIs are `tag://path` or bare filesystem paths.
//! - --debug is a shorthand for --log-level debug.

use clap::{Parser, Subcommand, ValueHint};
use std::path::PathBuf;

use xmove::LogLevel;

#[derive(Parser, Debug, Clone)]
#[command(
    version,
    about = "Copy, move and delete files across local, scratch and xet storage"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Set log level. One of: quiet, normal, info, debug.
    #[arg(long, global = true, help = "Set log level: quiet, normal, info, debug")]
    pub log_level: Option<String>,

    /// Enable debug logging (equivalent to `--log-level debug`).
    #[arg(
        short = 'd',
        long,
        global = true,
        help = "Enable debug logging (shorthand for --log-level debug)"
    )]
    pub debug: bool,

    /// Emit logs in structured JSON.
    #[arg(long, global = true, help = "Emit logs in structured JSON")]
    pub json: bool,

    /// Override the bound on concurrently streaming transfers.
    #[arg(
        long,
        global = true,
        value_name = "N",
        help = "Max transfers streaming at once (overrides config)"
    )]
    pub jobs: Option<usize>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Copy a file, wildcard expansion or directory tree between URIs.
    Cp {
        #[arg(value_name = "SOURCE", value_hint = ValueHint::AnyPath)]
        source: String,
        #[arg(value_name = "DESTINATION", value_hint = ValueHint::AnyPath)]
        destination: String,
        /// Recurse into directories (and directory wildcard matches).
        #[arg(short = 'r', long)]
        recursive: bool,
        /// Transaction message recorded by transactional destinations.
        #[arg(short = 'm', long)]
        message: Option<String>,
    },

    /// Move within one backend (cross-backend moves are rejected).
    Mv {
        #[arg(value_name = "SOURCE", value_hint = ValueHint::AnyPath)]
        source: String,
        #[arg(value_name = "TARGET", value_hint = ValueHint::AnyPath)]
        target: String,
        #[arg(short = 'r', long)]
        recursive: bool,
        #[arg(short = 'm', long)]
        message: Option<String>,
    },

    /// Delete one or more paths (branch roots are refused).
    Rm {
        #[arg(value_name = "PATH", required = true, value_hint = ValueHint::AnyPath)]
        paths: Vec<String>,
        #[arg(short = 'm', long)]
        message: Option<String>,
    },

    /// Print metadata for a URI.
    Info {
        #[arg(value_name = "URI", value_hint = ValueHint::AnyPath)]
        uri: String,
    },

    /// Duplicate a repository, optionally adjusting visibility.
    Duplicate {
        #[arg(value_name = "SOURCE")]
        source: String,
        /// Destination repository (default: xet://<you>/<source repo name>).
        #[arg(value_name = "DESTINATION")]
        destination: Option<String>,
        #[arg(long, conflicts_with = "public")]
        private: bool,
        #[arg(long)]
        public: bool,
    },

    /// Store login details in the config file.
    Login {
        #[arg(long)]
        user: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        email: Option<String>,
        /// Host to authenticate against.
        #[arg(long)]
        host: Option<String>,
        /// Skip the authentication check and write the config regardless.
        #[arg(long)]
        force: bool,
        /// Refuse to overwrite existing login information.
        #[arg(long)]
        no_overwrite: bool,
    },

    /// Attach a branch read-only at a local path.
    Mount {
        /// Branch reference, e.g. xet://user/repo/main.
        #[arg(value_name = "SOURCE")]
        source: String,
        #[arg(value_name = "PATH", value_hint = ValueHint::DirPath)]
        path: PathBuf,
    },
}

impl Args {
    /// Effective log level derived from flags.
    /// Precedence: --debug > --log-level value > None (use config default).
    pub fn effective_log_level(&self) -> Option<LogLevel> {
        if self.debug {
            return Some(LogLevel::Debug);
        }
        self.log_level.as_deref().and_then(LogLevel::parse)
    }
}

pub fn parse() -> Args {
    Args::parse()
}
