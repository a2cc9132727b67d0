//! Surf Settings
//!
//! Strongly-typed, validated browser settings addressed by dotted paths.
//!
//! - Every top-level key has a schema default fixing its kind
//! - Writes go through per-key validators and never partially apply
//! - Load and import merge additively onto the live tree
//! - Readers see copy-on-write snapshots, no lock held while reading

mod error;
mod path;
mod paths;
mod schema;
mod store;
mod value;

pub use error::{PersistenceError, ValidationError};
pub use path::SettingPath;
pub use paths::{default_data_dir, rule_cache_file, settings_file, DATA_DIR_ENV};
pub use schema::{
    float_in, int_in, is_color, is_url, is_url_set, one_of, Schema, SettingSpec, Validator,
    DEFAULT_ADBLOCK_LISTS,
};
pub use store::ConfigStore;
pub use value::{SettingValue, SettingsMap, ValueKind};
