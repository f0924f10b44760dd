//! Per-OS default locations for the config file and the repository store.

use std::env;
use std::path::PathBuf;

/// Config file location:
///  - `$XMOVE_CONFIG` when set (explicit override),
///  - else `<config dir>/xmove/config.xml` (per-OS via `dirs`),
///  - else `./xmove-config.xml` on exotic hosts with no home.
pub fn default_config_path() -> PathBuf {
    if let Some(explicit) = env::var_os("XMOVE_CONFIG") {
        return PathBuf::from(explicit);
    }
    dirs::config_dir()
        .map(|d| d.join("xmove").join("config.xml"))
        .unwrap_or_else(|| PathBuf::from("xmove-config.xml"))
}

/// Repository store root:
///  - `$XMOVE_STORE` when set,
///  - else `<data dir>/xmove/store`,
///  - else `.xmove-store` relative to the working directory.
pub fn default_store_root() -> PathBuf {
    if let Some(explicit) = env::var_os("XMOVE_STORE") {
        return PathBuf::from(explicit);
    }
    dirs::data_dir()
        .map(|d| d.join("xmove").join("store"))
        .unwrap_or_else(|| PathBuf::from(".xmove-store"))
}
