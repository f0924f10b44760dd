//! Core configuration types.
//! - Config holds session settings with sensible defaults.
//! - LogLevel represents verbosity with simple parsing helpers.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::paths;
use super::{DEFAULT_DOMAIN, DEFAULT_MAX_CONCURRENT};

/// Verbosity levels users can set via config or CLI. Ordered quiet to
/// noisy; each maps one step more verbose internally so normal runs still
/// show per-file copy lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Quiet,
    #[default]
    Normal,
    Info,
    Debug,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Quiet => "quiet",
            LogLevel::Normal => "normal",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }

    /// Case-insensitive parse accepting a few common synonyms.
    pub fn parse(s: &str) -> Option<Self> {
        let level = match s.to_ascii_lowercase().as_str() {
            "quiet" | "error" | "none" => LogLevel::Quiet,
            "normal" => LogLevel::Normal,
            "info" | "verbose" | "detailed" => LogLevel::Info,
            "debug" | "trace" => LogLevel::Debug,
            _ => return None,
        };
        Some(level)
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid log level: '{s}'"))
    }
}

/// Session configuration used by every top-level operation.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the local xet repository store
    pub store_root: PathBuf,
    /// Root URI namespace for xet references
    pub domain: String,
    /// Logged-in user, if any
    pub user: Option<String>,
    /// Email associated with the account
    pub email: Option<String>,
    /// Access token written by `xmove login`
    pub token: Option<String>,
    /// Process-wide bound on concurrently streaming transfers
    pub max_concurrent: usize,
    /// Console verbosity
    pub log_level: LogLevel,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_root: paths::default_store_root(),
            domain: DEFAULT_DOMAIN.to_string(),
            user: None,
            email: None,
            token: None,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            log_level: LogLevel::Normal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_parse_aliases() {
        assert_eq!(LogLevel::parse("ERROR"), Some(LogLevel::Quiet));
        assert_eq!(LogLevel::parse("verbose"), Some(LogLevel::Info));
        assert_eq!(LogLevel::parse("trace"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("nope"), None);
    }

    #[test]
    fn defaults_are_sane() {
        let cfg = Config::default();
        assert_eq!(cfg.domain, DEFAULT_DOMAIN);
        assert!(cfg.max_concurrent >= 1);
        assert!(cfg.user.is_none());
    }
}
