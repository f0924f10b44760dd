//! Session configuration: store location, identity, concurrency bound.

pub mod paths;
pub mod types;
pub mod xml;

pub use paths::{default_config_path, default_store_root};
pub use types::{Config, LogLevel};
pub use xml::{configure_login, load_config_from_xml};

/// Namespace the xet backend is scoped to when the config names none.
pub const DEFAULT_DOMAIN: &str = "xethub.com";

/// Default process-wide bound on concurrently streaming transfers.
pub const DEFAULT_MAX_CONCURRENT: usize = 16;

/// Effective configuration: defaults overlaid with the XML file when one
/// exists. CLI flags are applied on top by the caller.
pub fn load() -> Config {
    let mut cfg = Config::default();
    if let Some(file) = load_config_from_xml() {
        file.apply(&mut cfg);
    }
    cfg
}
