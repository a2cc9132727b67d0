//! Per-user data locations

use std::path::{Path, PathBuf};

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "SURF_DATA_DIR";

/// Settings document name inside the data directory
pub const SETTINGS_FILE: &str = "settings.json";

/// Cached rule lists inside the data directory
pub const RULE_CACHE_FILE: &str = "adblock_lists.cache";

/// Data directory: `$SURF_DATA_DIR`, else `<platform data dir>/surf`
pub fn default_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("surf")
}

pub fn settings_file(data_dir: &Path) -> PathBuf {
    data_dir.join(SETTINGS_FILE)
}

pub fn rule_cache_file(data_dir: &Path) -> PathBuf {
    data_dir.join(RULE_CACHE_FILE)
}
