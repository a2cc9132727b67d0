//! Settings Schema
//!
//! Maps every top-level setting to its default (which fixes its kind)
//! and an optional validator. Nested maps such as `shortcuts` take the
//! kinds of their default members; keys missing from a nested default
//! (e.g. entries of `custom_search_engines`) are open.

use crate::error::ValidationError;
use crate::path::SettingPath;
use crate::value::{SettingValue, SettingsMap, ValueKind};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Pure predicate over a candidate value
pub type Validator = Box<dyn Fn(&SettingValue) -> bool + Send + Sync>;

/// Top-level key prefixes that only ever hold booleans
const BOOLEAN_PREFIXES: &[&str] = &["enable_", "show_", "block_"];

/// Named colors accepted besides hex notation
const NAMED_COLORS: &[&str] = &[
    "white", "black", "red", "green", "blue", "yellow", "cyan", "magenta", "system",
];

/// Default rule lists (EasyList + EasyPrivacy)
pub const DEFAULT_ADBLOCK_LISTS: &[&str] = &[
    "https://easylist.to/easylist/easylist.txt",
    "https://easylist.to/easylist/easyprivacy.txt",
];

/// Schema entry for one top-level setting
pub struct SettingSpec {
    pub default: SettingValue,
    pub validator: Option<Validator>,
}

/// The full settings schema
pub struct Schema {
    entries: BTreeMap<String, SettingSpec>,
    allow_unknown: bool,
}

impl Schema {
    /// Empty schema that rejects unknown keys
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            allow_unknown: false,
        }
    }

    /// Register a setting without a validator
    pub fn entry(mut self, key: &str, default: impl Into<SettingValue>) -> Self {
        self.entries.insert(
            key.to_string(),
            SettingSpec {
                default: default.into(),
                validator: None,
            },
        );
        self
    }

    /// Register a setting guarded by a validator
    pub fn validated<F>(mut self, key: &str, default: impl Into<SettingValue>, validator: F) -> Self
    where
        F: Fn(&SettingValue) -> bool + Send + Sync + 'static,
    {
        self.entries.insert(
            key.to_string(),
            SettingSpec {
                default: default.into(),
                validator: Some(Box::new(validator)),
            },
        );
        self
    }

    /// Let keys outside the schema pass through untyped
    pub fn permit_unknown(mut self, allow: bool) -> Self {
        self.allow_unknown = allow;
        self
    }

    pub fn permits_unknown(&self) -> bool {
        self.allow_unknown
    }

    /// Compiled-in browser settings
    pub fn browser() -> Self {
        Self::new()
            // General
            .validated("homepage", "https://html.duckduckgo.com/html", is_url)
            .entry("restore_session", true)
            .entry("confirm_close_multiple_tabs", true)
            .entry("open_new_tab_next_to_current", true)
            .entry("show_tab_close_buttons", true)
            .entry("enable_smooth_scrolling", false)
            // Appearance
            .validated("theme", "system", one_of(&["system", "light", "dark", "custom"]))
            .validated("background_color", "system", is_color)
            .validated("font_color", "#000000", is_color)
            .entry("font_family", "system")
            .validated("font_size", 12, int_in(8, 32))
            .validated("ui_scale", 1.0, float_in(0.5, 2.0))
            .entry("show_toolbar", true)
            .entry("show_bookmarks_bar", false)
            .entry("show_status_bar", true)
            .validated("tab_position", "top", one_of(&["top", "bottom"]))
            // Privacy & security
            .entry("enable_javascript", true)
            .entry("enable_plugins", true)
            .entry("enable_images", true)
            .entry("enable_webgl", true)
            .entry("enable_geolocation", false)
            .entry("enable_notifications", true)
            .entry("enable_autoplay", false)
            .entry("block_popups", true)
            .entry("enable_do_not_track", true)
            .entry("clear_data_on_exit", false)
            .entry("incognito_by_default", false)
            // Content filtering
            .entry("block_ads", true)
            .validated("adblock_lists", string_set(DEFAULT_ADBLOCK_LISTS), is_url_set)
            .validated("adblock_cache_max_age", 86_400, int_in(60, 604_800))
            .validated("network_log_capacity", 5_000, int_in(100, 100_000))
            // Network & proxy
            .validated(
                "proxy_type",
                "none",
                one_of(&["none", "http", "socks5", "tor", "i2p"]),
            )
            .entry("proxy_host", "127.0.0.1")
            .validated("proxy_port", 8080, int_in(1, 65_535))
            .entry("proxy_username", "")
            .entry("proxy_password", "")
            .entry("user_agent", "default")
            .entry("enable_dns_over_https", false)
            .entry("dns_server", "system")
            // Downloads
            .entry("download_directory", "")
            .entry("ask_download_location", true)
            .entry("auto_open_downloads", false)
            .validated("max_concurrent_downloads", 3, int_in(1, 10))
            // Search
            .entry("default_search_engine", "duckduckgo")
            .entry("custom_search_engines", SettingsMap::new())
            .entry("enable_search_suggestions", true)
            .entry("search_in_address_bar", true)
            // Advanced
            .entry("enable_developer_tools", true)
            .entry("enable_hardware_acceleration", true)
            .validated("max_cache_size", 100, int_in(10, 1000))
            .entry("enable_spell_check", true)
            .entry("spell_check_language", "en-US")
            .entry("enable_accessibility", false)
            .entry("custom_css", "")
            .entry("custom_js", "")
            // AI assistant
            .entry("ai_enabled", true)
            .entry("ai_api_key", "")
            .entry("ai_model", "claude-3-7-sonnet-20250219")
            .validated("ai_panel_position", "right", one_of(&["left", "right"]))
            .validated("ai_panel_width", 0.3, float_in(0.1, 0.8))
            .entry("voice_recognition_language", "en-US")
            // Keyboard shortcuts
            .entry("shortcuts", default_shortcuts())
            .permit_unknown(true)
    }

    /// Fresh tree holding every default
    pub fn defaults(&self) -> SettingsMap {
        self.entries
            .iter()
            .map(|(key, spec)| (key.clone(), spec.default.clone()))
            .collect()
    }

    /// Default value at a path, if the schema defines one
    pub fn default_at(&self, path: &SettingPath) -> Option<SettingValue> {
        let (first, rest) = path.segments().split_first()?;
        let mut node = &self.entries.get(first)?.default;
        for segment in rest {
            node = node.as_map()?.get(segment)?;
        }
        Some(node.clone())
    }

    /// Expected kind at a path.
    ///
    /// `Ok(None)` means the path is open: an unknown top-level key (when
    /// permitted) or a key missing from a nested default map.
    pub fn kind_at(&self, path: &SettingPath) -> Result<Option<ValueKind>, ValidationError> {
        let segments = path.segments();
        let Some(spec) = self.entries.get(path.base()) else {
            if self.allow_unknown {
                return Ok(None);
            }
            return Err(ValidationError::UnknownKey(path.to_string()));
        };

        let mut node = &spec.default;
        for (depth, segment) in segments.iter().enumerate().skip(1) {
            let Some(map) = node.as_map() else {
                return Err(ValidationError::NotAMap(segments[..depth].join(".")));
            };
            match map.get(segment) {
                Some(child) => node = child,
                None => return Ok(None),
            }
        }
        Ok(Some(node.kind()))
    }

    /// Check a candidate value for a path, returning it coerced to the
    /// schema's kind.
    pub fn check(&self, path: &SettingPath, value: SettingValue) -> Result<SettingValue, ValidationError> {
        let found = value.kind();
        let value = match self.kind_at(path)? {
            Some(expected) => value.coerce(expected).ok_or_else(|| ValidationError::TypeMismatch {
                path: path.to_string(),
                expected,
                found,
            })?,
            None => value,
        };

        if path.is_top_level()
            && value.kind() != ValueKind::Bool
            && BOOLEAN_PREFIXES.iter().any(|p| path.base().starts_with(p))
        {
            return Err(ValidationError::TypeMismatch {
                path: path.to_string(),
                expected: ValueKind::Bool,
                found: value.kind(),
            });
        }

        if let Some(validator) = self.entries.get(path.base()).and_then(|s| s.validator.as_ref()) {
            if !validator(&value) {
                debug!("Validator rejected {} = {}", path, value);
                return Err(ValidationError::Rejected {
                    path: path.to_string(),
                    value: value.to_string(),
                });
            }
        }

        match value {
            SettingValue::Map(members) => self.check_members(path, members).map(SettingValue::Map),
            other => Ok(other),
        }
    }

    /// Check every member of a map written as a whole
    fn check_members(&self, path: &SettingPath, members: SettingsMap) -> Result<SettingsMap, ValidationError> {
        members
            .into_iter()
            .map(|(key, value)| {
                let mut segments = path.segments().to_vec();
                segments.push(key.clone());
                let child = SettingPath::from_segments(segments)?;
                Ok((key, self.check(&child, value)?))
            })
            .collect()
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::browser()
    }
}

fn default_shortcuts() -> SettingsMap {
    [
        ("new_tab", "Ctrl+T"),
        ("close_tab", "Ctrl+W"),
        ("reload", "Ctrl+R"),
        ("hard_reload", "Ctrl+Shift+R"),
        ("find", "Ctrl+F"),
        ("zoom_in", "Ctrl+="),
        ("zoom_out", "Ctrl+-"),
        ("zoom_reset", "Ctrl+0"),
        ("home", "Alt+Home"),
        ("back", "Alt+Left"),
        ("forward", "Alt+Right"),
        ("bookmark", "Ctrl+D"),
        ("bookmarks", "Ctrl+Shift+B"),
        ("history", "Ctrl+H"),
        ("downloads", "Ctrl+J"),
        ("settings", "Ctrl+,"),
        ("developer_tools", "F12"),
        ("view_source", "Ctrl+U"),
        ("fullscreen", "F11"),
        ("private_tab", "Ctrl+Shift+N"),
        ("ai_assistant", "Ctrl+Shift+A"),
    ]
    .into_iter()
    .map(|(action, keys)| (action.to_string(), SettingValue::from(keys)))
    .collect()
}

fn string_set(items: &[&str]) -> SettingValue {
    SettingValue::StrSet(items.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>())
}

/// Integer within an inclusive range
pub fn int_in(min: i64, max: i64) -> impl Fn(&SettingValue) -> bool + Send + Sync {
    move |value| value.as_int().is_some_and(|v| (min..=max).contains(&v))
}

/// Number within an inclusive range
pub fn float_in(min: f64, max: f64) -> impl Fn(&SettingValue) -> bool + Send + Sync {
    move |value| value.as_float().is_some_and(|v| (min..=max).contains(&v))
}

/// String from a fixed vocabulary
pub fn one_of(allowed: &'static [&'static str]) -> impl Fn(&SettingValue) -> bool + Send + Sync {
    move |value| value.as_str().is_some_and(|v| allowed.contains(&v))
}

/// Absolute http(s) URL, or a bare host/relative string without markup
pub fn is_url(value: &SettingValue) -> bool {
    let Some(s) = value.as_str() else {
        return false;
    };
    if s.starts_with("http://") || s.starts_with("https://") {
        return url::Url::parse(s).is_ok();
    }
    !s.is_empty() && !s.contains(['<', '>', '"', '\''])
}

/// Every member is an absolute http(s) URL
pub fn is_url_set(value: &SettingValue) -> bool {
    value.as_str_set().is_some_and(|set| {
        set.iter().all(|s| {
            url::Url::parse(s).is_ok_and(|u| matches!(u.scheme(), "http" | "https"))
        })
    })
}

/// `#rgb`, `#rrggbb` or a named color
pub fn is_color(value: &SettingValue) -> bool {
    let Some(s) = value.as_str() else {
        return false;
    };
    if let Some(hex) = s.strip_prefix('#') {
        return matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit());
    }
    NAMED_COLORS.contains(&s.to_lowercase().as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(p: &str) -> SettingPath {
        SettingPath::parse(p).unwrap()
    }

    #[test]
    fn test_port_range() {
        let schema = Schema::browser();
        assert!(schema.check(&path("proxy_port"), 70_000.into()).is_err());
        assert!(schema.check(&path("proxy_port"), 0.into()).is_err());
        assert_eq!(
            schema.check(&path("proxy_port"), 8080.into()).unwrap(),
            SettingValue::Int(8080)
        );
    }

    #[test]
    fn test_float_ranges_and_widening() {
        let schema = Schema::browser();
        assert_eq!(
            schema.check(&path("ui_scale"), 2.into()).unwrap(),
            SettingValue::Float(2.0)
        );
        assert!(schema.check(&path("ui_scale"), 2.5.into()).is_err());
        assert!(schema.check(&path("ai_panel_width"), 0.05.into()).is_err());
        assert!(schema.check(&path("ai_panel_width"), 0.5.into()).is_ok());
    }

    #[test]
    fn test_colors() {
        assert!(is_color(&"#fff".into()));
        assert!(is_color(&"#A0B1C2".into()));
        assert!(is_color(&"Black".into()));
        assert!(!is_color(&"#ggg".into()));
        assert!(!is_color(&"#12345".into()));
        assert!(!is_color(&"purple".into()));
        assert!(!is_color(&SettingValue::Int(0)));
    }

    #[test]
    fn test_urls() {
        assert!(is_url(&"https://example.com".into()));
        assert!(is_url(&"example.com".into()));
        assert!(!is_url(&"".into()));
        assert!(!is_url(&"<script>".into()));
        assert!(!is_url(&"https://".into()));
    }

    #[test]
    fn test_type_mismatch() {
        let schema = Schema::browser();
        let err = schema.check(&path("enable_javascript"), "yes".into()).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::TypeMismatch { expected: ValueKind::Bool, .. }
        ));
        assert!(schema.check(&path("font_size"), 12.5.into()).is_err());
    }

    #[test]
    fn test_boolean_prefix_for_unknown_keys() {
        let schema = Schema::browser();
        assert!(schema.check(&path("enable_experiments"), true.into()).is_ok());
        assert!(schema.check(&path("show_debug_overlay"), 1.into()).is_err());
        assert!(schema.check(&path("some_plugin_state"), 1.into()).is_ok());
    }

    #[test]
    fn test_strict_schema_rejects_unknown() {
        let schema = Schema::new().entry("a", true);
        assert!(matches!(
            schema.check(&path("b"), true.into()),
            Err(ValidationError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_nested_kinds() {
        let schema = Schema::browser();
        assert_eq!(
            schema.kind_at(&path("shortcuts.new_tab")).unwrap(),
            Some(ValueKind::Str)
        );
        assert_eq!(schema.kind_at(&path("custom_search_engines.kagi")).unwrap(), None);
        assert!(matches!(
            schema.kind_at(&path("proxy_port.inner")),
            Err(ValidationError::NotAMap(_))
        ));
        assert!(schema.check(&path("shortcuts.new_tab"), 5.into()).is_err());
    }

    #[test]
    fn test_whole_map_members_checked() {
        let schema = Schema::browser();
        let mut shortcuts = SettingsMap::new();
        shortcuts.insert("reload".into(), SettingValue::Bool(true));
        assert!(schema.check(&path("shortcuts"), shortcuts.into()).is_err());
    }

    #[test]
    fn test_adblock_lists() {
        let schema = Schema::browser();
        let good: BTreeSet<String> = ["https://lists.example.org/a.txt".to_string()].into();
        let bad: BTreeSet<String> = ["ftp://lists.example.org/a.txt".to_string()].into();
        assert!(schema.check(&path("adblock_lists"), good.into()).is_ok());
        assert!(schema.check(&path("adblock_lists"), bad.into()).is_err());
    }

    #[test]
    fn test_defaults_tree() {
        let schema = Schema::browser();
        let defaults = schema.defaults();
        assert_eq!(defaults["proxy_port"], SettingValue::Int(8080));
        assert_eq!(
            schema.default_at(&path("shortcuts.find")),
            Some(SettingValue::from("Ctrl+F"))
        );
        assert_eq!(schema.default_at(&path("nonexistent")), None);
    }
}
