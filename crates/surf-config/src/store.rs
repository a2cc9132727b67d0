//! Settings Store
//!
//! Holds the live settings tree behind a copy-on-write pointer: readers
//! clone the current `Arc` and walk it without holding any lock, writers
//! build the next tree and swap it in. Writes are rare (settings dialog,
//! import), reads happen on every intercepted request.
//!
//! Persistence is a pretty-printed JSON object. Loading and importing
//! merge additively onto the current tree: keys present in the document
//! overwrite, keys absent are left alone, nested maps merge recursively.
//! A document value whose kind disagrees with the schema is discarded.

use crate::error::{PersistenceError, ValidationError};
use crate::path::SettingPath;
use crate::paths::settings_file;
use crate::schema::Schema;
use crate::value::{SettingValue, SettingsMap};
use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Validated, persistent settings tree
pub struct ConfigStore {
    schema: Schema,
    tree: RwLock<Arc<SettingsMap>>,
    file: PathBuf,
}

impl ConfigStore {
    /// Create a store holding the schema defaults, persisted at `file`.
    ///
    /// Nothing is read from disk; call [`ConfigStore::load`] for that.
    pub fn new(schema: Schema, file: impl Into<PathBuf>) -> Self {
        let tree = Arc::new(schema.defaults());
        Self {
            schema,
            tree: RwLock::new(tree),
            file: file.into(),
        }
    }

    /// Open the browser settings in `data_dir`, merging whatever is on disk.
    ///
    /// A missing or unreadable document leaves the defaults in place.
    pub fn open(data_dir: &Path) -> Self {
        let store = Self::new(Schema::browser(), settings_file(data_dir));
        match store.load() {
            Ok(true) => info!("Settings loaded from {}", store.file.display()),
            Ok(false) => info!("No settings file at {}, using defaults", store.file.display()),
            Err(e) => warn!("Failed to load settings: {}", e),
        }
        store
    }

    /// Location of the settings document
    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Current tree. Later writes do not affect the returned snapshot.
    pub fn snapshot(&self) -> Arc<SettingsMap> {
        self.tree
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Value at `path`, falling back to the schema default when any
    /// segment is missing or holds the wrong kind.
    pub fn get(&self, path: &str) -> Option<SettingValue> {
        let path = SettingPath::parse(path).ok()?;
        let tree = self.snapshot();

        let expected = self.schema.kind_at(&path).ok().flatten();
        match lookup(&tree, &path) {
            Some(value) if expected.is_none_or(|kind| kind == value.kind()) => Some(value.clone()),
            _ => self.schema.default_at(&path),
        }
    }

    pub fn get_bool(&self, path: &str) -> Option<bool> {
        self.get(path).and_then(|v| v.as_bool())
    }

    pub fn get_int(&self, path: &str) -> Option<i64> {
        self.get(path).and_then(|v| v.as_int())
    }

    pub fn get_float(&self, path: &str) -> Option<f64> {
        self.get(path).and_then(|v| v.as_float())
    }

    pub fn get_string(&self, path: &str) -> Option<String> {
        self.get(path).and_then(|v| v.as_str().map(str::to_string))
    }

    pub fn get_str_set(&self, path: &str) -> Option<BTreeSet<String>> {
        self.get(path).and_then(|v| v.as_str_set().cloned())
    }

    /// Validate and write a value. On error the store is unchanged.
    pub fn set(&self, path: &str, value: impl Into<SettingValue>) -> Result<(), ValidationError> {
        let path = SettingPath::parse(path)?;
        let value = self.schema.check(&path, value.into())?;

        let mut guard = self.tree.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = SettingsMap::clone(&guard);
        insert_at(&mut next, &path, value)?;
        *guard = Arc::new(next);

        debug!("Setting updated: {}", path);
        Ok(())
    }

    /// Merge the settings document onto the current tree.
    ///
    /// Returns `Ok(false)` when there is no document yet.
    pub fn load(&self) -> Result<bool, PersistenceError> {
        if !self.file.exists() {
            return Ok(false);
        }
        self.merge_file(&self.file)?;
        Ok(true)
    }

    /// Write the current tree to the settings document
    pub fn save(&self) -> Result<(), PersistenceError> {
        write_document(&self.file, &self.snapshot())?;
        debug!("Settings saved to {}", self.file.display());
        Ok(())
    }

    /// Write the current tree to an arbitrary file
    pub fn export_to(&self, path: &Path) -> Result<(), PersistenceError> {
        write_document(path, &self.snapshot())?;
        info!("Settings exported to {}", path.display());
        Ok(())
    }

    /// Merge a previously exported document, then persist.
    ///
    /// If persisting fails the merged values stay live in memory.
    pub fn import_from(&self, path: &Path) -> Result<(), PersistenceError> {
        let merged = self.merge_file(path)?;
        info!("Imported {} settings from {}", merged, path.display());
        self.save()
    }

    /// Replace the whole tree with the schema defaults and persist
    pub fn reset_to_defaults(&self) -> Result<(), PersistenceError> {
        {
            let mut guard = self.tree.write().unwrap_or_else(PoisonError::into_inner);
            *guard = Arc::new(self.schema.defaults());
        }
        info!("Settings reset to defaults");
        self.save()
    }

    fn merge_file(&self, path: &Path) -> Result<usize, PersistenceError> {
        let document = read_document(path)?;

        let mut guard = self.tree.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = SettingsMap::clone(&guard);
        let merged = self.merge_into(&mut next, &document, &[]);
        *guard = Arc::new(next);
        Ok(merged)
    }

    /// Additive recursive merge of a JSON object into `target`.
    ///
    /// Returns the number of leaf values written.
    fn merge_into(
        &self,
        target: &mut SettingsMap,
        incoming: &serde_json::Map<String, serde_json::Value>,
        prefix: &[String],
    ) -> usize {
        let mut merged = 0;

        for (key, raw) in incoming {
            let mut segments = prefix.to_vec();
            segments.push(key.clone());
            let Ok(path) = SettingPath::from_segments(segments.clone()) else {
                warn!("Ignoring setting with empty name under '{}'", prefix.join("."));
                continue;
            };

            if let (serde_json::Value::Object(members), Some(SettingValue::Map(existing))) =
                (raw, target.get_mut(key))
            {
                merged += self.merge_into(existing, members, &segments);
                continue;
            }

            let Some(value) = SettingValue::from_json(raw) else {
                warn!("Ignoring unsupported value for setting {}", path);
                continue;
            };

            match self.schema.check(&path, value) {
                Ok(value) => {
                    target.insert(key.clone(), value);
                    merged += 1;
                }
                Err(e) => warn!("Discarding stored setting: {}", e),
            }
        }

        merged
    }
}

/// Walk the tree along `path`
fn lookup<'a>(tree: &'a SettingsMap, path: &SettingPath) -> Option<&'a SettingValue> {
    let (first, rest) = path.segments().split_first()?;
    let mut node = tree.get(first)?;
    for segment in rest {
        node = node.as_map()?.get(segment)?;
    }
    Some(node)
}

/// Write `value` at `path`, creating intermediate maps
fn insert_at(tree: &mut SettingsMap, path: &SettingPath, value: SettingValue) -> Result<(), ValidationError> {
    let mut node = tree;
    for (depth, segment) in path.parents().iter().enumerate() {
        let child = node
            .entry(segment.clone())
            .or_insert_with(|| SettingValue::Map(SettingsMap::new()));
        node = match child {
            SettingValue::Map(map) => map,
            _ => {
                return Err(ValidationError::NotAMap(
                    path.segments()[..=depth].join("."),
                ));
            }
        };
    }
    node.insert(path.leaf().to_string(), value);
    Ok(())
}

fn read_document(path: &Path) -> Result<serde_json::Map<String, serde_json::Value>, PersistenceError> {
    let text = fs::read_to_string(path).map_err(|source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let document: serde_json::Value =
        serde_json::from_str(&text).map_err(|source| PersistenceError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    match document {
        serde_json::Value::Object(members) => Ok(members),
        _ => Err(PersistenceError::NotAnObject(path.to_path_buf())),
    }
}

/// Pretty-print the tree and replace `path` via a uniquely named sibling
/// temp file
fn write_document(path: &Path, tree: &SettingsMap) -> Result<(), PersistenceError> {
    let io_err = |source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            fs::create_dir_all(parent).map_err(io_err)?;
            parent
        }
        None => Path::new("."),
    };

    let json = serde_json::to_string_pretty(tree)?;
    let mut tmp = NamedTempFile::new_in(parent).map_err(io_err)?;
    tmp.write_all(json.as_bytes()).map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn store_in(dir: &Path) -> ConfigStore {
        ConfigStore::new(Schema::browser(), dir.join("settings.json"))
    }

    #[test]
    fn test_set_then_get() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());

        store.set("proxy_port", 8080).unwrap();
        store.set("ai_panel_width", 0.5).unwrap();
        store.set("shortcuts.new_tab", "Ctrl+Alt+T").unwrap();
        store.set("custom_search_engines.kagi", "https://kagi.com/search?q=%s").unwrap();

        assert_eq!(store.get_int("proxy_port"), Some(8080));
        assert_eq!(store.get_float("ai_panel_width"), Some(0.5));
        assert_eq!(store.get_string("shortcuts.new_tab").as_deref(), Some("Ctrl+Alt+T"));
        assert_eq!(
            store.get_string("custom_search_engines.kagi").as_deref(),
            Some("https://kagi.com/search?q=%s")
        );
    }

    #[test]
    fn test_rejected_set_keeps_prior_value() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());

        store.set("proxy_port", 9050).unwrap();
        assert!(store.set("proxy_port", 70_000).is_err());
        assert_eq!(store.get_int("proxy_port"), Some(9050));

        assert!(store.set("font_color", "not-a-color").is_err());
        assert_eq!(store.get_string("font_color").as_deref(), Some("#000000"));

        assert!(store.set("enable_javascript", "no").is_err());
        assert_eq!(store.get_bool("enable_javascript"), Some(true));
    }

    #[test]
    fn test_get_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());

        assert_eq!(store.get_string("homepage").as_deref(), Some("https://html.duckduckgo.com/html"));
        assert_eq!(store.get_string("shortcuts.find").as_deref(), Some("Ctrl+F"));
        assert_eq!(store.get("shortcuts.missing"), None);
        assert_eq!(store.get("no.such.key"), None);
        assert_eq!(store.get("bad..path"), None);
        assert_eq!(store.get_int("homepage"), None);
    }

    #[test]
    fn test_unknown_keys_pass_through() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());

        store.set("extension_state.reader.enabled", true).unwrap();
        assert_eq!(store.get_bool("extension_state.reader.enabled"), Some(true));

        store.set("plugin_note", "hi").unwrap();
        assert!(matches!(
            store.set("plugin_note.child", 1),
            Err(ValidationError::NotAMap(_))
        ));
        assert_eq!(store.get_string("plugin_note").as_deref(), Some("hi"));
    }

    #[test]
    fn test_load_partial_document() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("settings.json"),
            json!({
                "proxy_port": 3128,
                "theme": "dark",
                "shortcuts": { "reload": "F5" }
            })
            .to_string(),
        )
        .unwrap();

        let store = ConfigStore::open(dir.path());

        assert_eq!(store.get_int("proxy_port"), Some(3128));
        assert_eq!(store.get_string("theme").as_deref(), Some("dark"));
        assert_eq!(store.get_string("shortcuts.reload").as_deref(), Some("F5"));
        // Untouched defaults survive, including siblings inside merged maps
        assert_eq!(store.get_string("shortcuts.find").as_deref(), Some("Ctrl+F"));
        assert_eq!(store.get_int("font_size"), Some(12));
        assert_eq!(store.get_bool("block_ads"), Some(true));
    }

    #[test]
    fn test_malformed_document_keeps_defaults() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("settings.json"), "{ not json").unwrap();

        let store = store_in(dir.path());
        assert!(matches!(store.load(), Err(PersistenceError::Parse { .. })));
        assert_eq!(store.get_int("proxy_port"), Some(8080));

        fs::write(dir.path().join("settings.json"), "[1, 2, 3]").unwrap();
        assert!(matches!(store.load(), Err(PersistenceError::NotAnObject(_))));
    }

    #[test]
    fn test_incompatible_stored_types_are_discarded() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("settings.json"),
            json!({
                "shortcuts": "Ctrl+T",
                "proxy_port": { "value": 1 },
                "font_size": 99,
                "ui_scale": 2,
                "homepage": null
            })
            .to_string(),
        )
        .unwrap();

        let store = store_in(dir.path());
        assert!(store.load().unwrap());

        assert_eq!(store.get_string("shortcuts.new_tab").as_deref(), Some("Ctrl+T"));
        assert_eq!(store.get_int("proxy_port"), Some(8080));
        assert_eq!(store.get_int("font_size"), Some(12));
        assert_eq!(store.get_float("ui_scale"), Some(2.0));
        assert!(store.get_string("homepage").is_some());
    }

    #[test]
    fn test_export_import_round_trip() {
        let dir = tempdir().unwrap();
        let source = store_in(dir.path());
        source.set("proxy_type", "socks5").unwrap();
        source.set("proxy_port", 9050).unwrap();
        source.set("ui_scale", 1.25).unwrap();
        source.set("shortcuts.find", "Ctrl+Shift+F").unwrap();
        source.set("custom_search_engines.wiki", "https://en.wikipedia.org/?search=%s").unwrap();

        let export = dir.path().join("export.json");
        source.export_to(&export).unwrap();

        let other_dir = tempdir().unwrap();
        let target = store_in(other_dir.path());
        target.import_from(&export).unwrap();
        assert_eq!(target.snapshot(), source.snapshot());

        // Import persisted immediately
        assert!(target.file().exists());

        // Importing the same document again changes nothing
        let once = target.snapshot();
        target.import_from(&export).unwrap();
        assert_eq!(target.snapshot(), once);
    }

    #[test]
    fn test_import_is_additive() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        store.set("plugin_note", "keep me").unwrap();

        let doc = dir.path().join("partial.json");
        fs::write(&doc, json!({ "theme": "light" }).to_string()).unwrap();
        store.import_from(&doc).unwrap();

        assert_eq!(store.get_string("theme").as_deref(), Some("light"));
        assert_eq!(store.get_string("plugin_note").as_deref(), Some("keep me"));
    }

    #[test]
    fn test_import_missing_file_reports_error() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let result = store.import_from(&dir.path().join("missing.json"));
        assert!(matches!(result, Err(PersistenceError::Io { .. })));
        assert_eq!(store.snapshot().as_ref(), &Schema::browser().defaults());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        store.set("homepage", "https://example.org").unwrap();
        store.save().unwrap();

        let text = fs::read_to_string(store.file()).unwrap();
        assert!(text.contains("\n"), "settings should be pretty-printed");

        let reopened = ConfigStore::open(dir.path());
        assert_eq!(reopened.get_string("homepage").as_deref(), Some("https://example.org"));
    }

    #[test]
    fn test_reset_to_defaults() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        store.set("proxy_port", 1080).unwrap();
        store.set("plugin_note", "gone").unwrap();

        store.reset_to_defaults().unwrap();

        assert_eq!(store.get_int("proxy_port"), Some(8080));
        assert_eq!(store.get("plugin_note"), None);
        assert!(store.file().exists());
    }

    #[test]
    fn test_snapshot_is_isolated_from_writes() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let before = store.snapshot();
        store.set("proxy_port", 1234).unwrap();
        assert_eq!(before["proxy_port"], SettingValue::Int(8080));
        assert_eq!(store.snapshot()["proxy_port"], SettingValue::Int(1234));
    }

    #[test]
    fn test_writes_visible_across_threads() {
        let dir = tempdir().unwrap();
        let store = Arc::new(store_in(dir.path()));

        let writer = {
            let store = store.clone();
            std::thread::spawn(move || {
                for port in 1000..1100 {
                    store.set("proxy_port", port).unwrap();
                }
            })
        };
        let reader = {
            let store = store.clone();
            std::thread::spawn(move || {
                for _ in 0..100 {
                    let port = store.get_int("proxy_port").unwrap();
                    assert!(port == 8080 || (1000..1100).contains(&port));
                }
            })
        };

        writer.join().unwrap();
        reader.join().unwrap();
        assert_eq!(store.get_int("proxy_port"), Some(1099));
    }

    #[test]
    fn test_concurrent_saves_and_exports() {
        let dir = tempdir().unwrap();
        let store = Arc::new(store_in(dir.path()));
        let export = dir.path().join("export.json");

        let workers: Vec<_> = (0..8)
            .map(|worker| {
                let store = store.clone();
                let export = export.clone();
                std::thread::spawn(move || {
                    for i in 0..25 {
                        store.set("proxy_port", 2000 + worker * 100 + i).unwrap();
                        store.save().unwrap();
                        store.export_to(&export).unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let reloaded = store_in(dir.path());
        reloaded.load().unwrap();
        let port = reloaded.get_int("proxy_port").unwrap();
        assert!((2000..2800).contains(&port));

        let exported: serde_json::Value = serde_json::from_str(&fs::read_to_string(&export).unwrap()).unwrap();
        assert!(exported["proxy_port"].is_i64());

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .filter(|name| name != "settings.json" && name != "export.json")
            .collect();
        assert!(leftovers.is_empty(), "stray temp files: {:?}", leftovers);
    }
}
