use std::collections::BTreeMap;
use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::domain::DomainError;

/// Allowed values for the sound and callbox settings.
const NOTIFICATION_POLICIES: &[&str] = &["always", "respect-dnd", "never"];

/// Every setting the application knows about.
///
/// Serialized names are the on-disk keys of the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConfigKey {
    LaunchAtStartup,
    SystemTitleBar,
    MonochromeTrayIcon,
    Theme,
    ZoomFactor,
    PlaySoundChat,
    PlaySoundCall,
    EnableCallbox,
    DownloadsDirectory,
    LastAppVersion,
    LogLevel,
    FileLogging,
    TrustedFingerprints,
}

/// Expected runtime shape of a config value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Bool,
    Number,
    /// One of a fixed set of string literals.
    Enum(&'static [&'static str]),
    /// A string or `null`.
    NullableString,
    /// An array of strings.
    StringList,
}

impl ValueKind {
    /// Check whether a JSON value has this shape.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ValueKind::Bool => value.is_boolean(),
            ValueKind::Number => value.as_f64().is_some_and(f64::is_finite),
            ValueKind::Enum(allowed) => value
                .as_str()
                .is_some_and(|s| allowed.iter().any(|literal| *literal == s)),
            ValueKind::NullableString => value.is_null() || value.is_string(),
            ValueKind::StringList => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
        }
    }

    /// Human-readable description used in error messages.
    pub fn describe(&self) -> String {
        match self {
            ValueKind::Bool => "a boolean".to_string(),
            ValueKind::Number => "a number".to_string(),
            ValueKind::Enum(allowed) => format!("one of {}", allowed.join(", ")),
            ValueKind::NullableString => "a string or null".to_string(),
            ValueKind::StringList => "a list of strings".to_string(),
        }
    }
}

/// One row of the config schema.
pub struct SchemaEntry {
    pub key: ConfigKey,
    pub kind: ValueKind,
    pub default: fn() -> Value,
}

/// The config schema. Rows are ordered by `ConfigKey` discriminant.
static SCHEMA: &[SchemaEntry] = &[
    SchemaEntry {
        key: ConfigKey::LaunchAtStartup,
        kind: ValueKind::Bool,
        default: || Value::Bool(false),
    },
    SchemaEntry {
        key: ConfigKey::SystemTitleBar,
        kind: ValueKind::Bool,
        default: || Value::Bool(cfg!(target_os = "linux")),
    },
    SchemaEntry {
        key: ConfigKey::MonochromeTrayIcon,
        kind: ValueKind::Bool,
        default: || Value::Bool(false),
    },
    SchemaEntry {
        key: ConfigKey::Theme,
        kind: ValueKind::Enum(&["default", "dark", "light"]),
        default: || json!("default"),
    },
    SchemaEntry {
        key: ConfigKey::ZoomFactor,
        kind: ValueKind::Number,
        default: || json!(1),
    },
    SchemaEntry {
        key: ConfigKey::PlaySoundChat,
        kind: ValueKind::Enum(NOTIFICATION_POLICIES),
        default: || json!("respect-dnd"),
    },
    SchemaEntry {
        key: ConfigKey::PlaySoundCall,
        kind: ValueKind::Enum(NOTIFICATION_POLICIES),
        default: || json!("respect-dnd"),
    },
    SchemaEntry {
        key: ConfigKey::EnableCallbox,
        kind: ValueKind::Enum(NOTIFICATION_POLICIES),
        default: || json!("respect-dnd"),
    },
    SchemaEntry {
        key: ConfigKey::DownloadsDirectory,
        kind: ValueKind::NullableString,
        default: || Value::Null,
    },
    SchemaEntry {
        key: ConfigKey::LastAppVersion,
        kind: ValueKind::NullableString,
        default: || Value::Null,
    },
    SchemaEntry {
        key: ConfigKey::LogLevel,
        kind: ValueKind::Enum(&["trace", "debug", "info", "warn", "error"]),
        default: || json!("info"),
    },
    SchemaEntry {
        key: ConfigKey::FileLogging,
        kind: ValueKind::Bool,
        default: || Value::Bool(true),
    },
    SchemaEntry {
        key: ConfigKey::TrustedFingerprints,
        kind: ValueKind::StringList,
        default: || Value::Array(Vec::new()),
    },
];

/// Compiled-in defaults for every key, as a JSON object.
static DEFAULTS: Lazy<Map<String, Value>> = Lazy::new(|| {
    SCHEMA
        .iter()
        .map(|entry| (entry.key.as_str().to_string(), (entry.default)()))
        .collect()
});

impl ConfigKey {
    /// Iterate over all keys in schema order.
    pub fn all() -> impl Iterator<Item = ConfigKey> {
        SCHEMA.iter().map(|entry| entry.key)
    }

    /// Parse an on-disk key name.
    pub fn parse(name: &str) -> Option<ConfigKey> {
        Self::all().find(|key| key.as_str() == name)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigKey::LaunchAtStartup => "launchAtStartup",
            ConfigKey::SystemTitleBar => "systemTitleBar",
            ConfigKey::MonochromeTrayIcon => "monochromeTrayIcon",
            ConfigKey::Theme => "theme",
            ConfigKey::ZoomFactor => "zoomFactor",
            ConfigKey::PlaySoundChat => "playSoundChat",
            ConfigKey::PlaySoundCall => "playSoundCall",
            ConfigKey::EnableCallbox => "enableCallbox",
            ConfigKey::DownloadsDirectory => "downloadsDirectory",
            ConfigKey::LastAppVersion => "lastAppVersion",
            ConfigKey::LogLevel => "logLevel",
            ConfigKey::FileLogging => "fileLogging",
            ConfigKey::TrustedFingerprints => "trustedFingerprints",
        }
    }

    fn schema(&self) -> &'static SchemaEntry {
        &SCHEMA[*self as usize]
    }

    pub fn kind(&self) -> ValueKind {
        self.schema().kind
    }

    /// Compiled-in default value.
    pub fn default_value(&self) -> Value {
        (self.schema().default)()
    }

    /// Check a candidate value against this key's kind.
    pub fn validate(&self, value: &Value) -> Result<(), DomainError> {
        let kind = self.kind();
        if kind.matches(value) {
            Ok(())
        } else {
            Err(DomainError::InvalidValue {
                key: *self,
                expected: kind.describe(),
            })
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted entry that `Overrides::decode` refused to keep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedEntry {
    pub key: String,
    pub reason: String,
}

/// Equality used for no-op detection. Numbers compare by value, so `1` and `1.0` match.
pub fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => a == b,
    }
}

/// The user-set subset of the config, keyed by known keys only.
///
/// Every value held here has already passed its key's validator.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Overrides(BTreeMap<ConfigKey, Value>);

impl Overrides {
    /// Decode an arbitrary JSON document into validated overrides.
    ///
    /// A non-object document is an error. Unknown keys and values of the
    /// wrong kind are dropped and reported back to the caller.
    pub fn decode(document: Value) -> Result<(Self, Vec<DroppedEntry>), DomainError> {
        let Value::Object(entries) = document else {
            return Err(DomainError::Config(format!(
                "expected a JSON object, found {}",
                json_type_name(&document)
            )));
        };

        let mut overrides = BTreeMap::new();
        let mut dropped = Vec::new();
        for (name, value) in entries {
            let Some(key) = ConfigKey::parse(&name) else {
                dropped.push(DroppedEntry {
                    key: name,
                    reason: "unknown key".to_string(),
                });
                continue;
            };
            if !key.kind().matches(&value) {
                dropped.push(DroppedEntry {
                    key: name,
                    reason: format!("expected {}", key.kind().describe()),
                });
                continue;
            }
            overrides.insert(key, value);
        }

        Ok((Self(overrides), dropped))
    }

    pub fn get(&self, key: ConfigKey) -> Option<&Value> {
        self.0.get(&key)
    }

    pub(crate) fn insert(&mut self, key: ConfigKey, value: Value) -> Option<Value> {
        self.0.insert(key, value)
    }

    pub(crate) fn remove(&mut self, key: ConfigKey) -> Option<Value> {
        self.0.remove(&key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Merged value for a key: the override if present, else the default.
    pub fn resolve(&self, key: ConfigKey) -> Value {
        self.get(key).cloned().unwrap_or_else(|| key.default_value())
    }

    /// Defaults overlaid by these overrides.
    pub fn merged(&self) -> Map<String, Value> {
        let mut merged = DEFAULTS.clone();
        for (key, value) in &self.0 {
            merged.insert(key.as_str().to_string(), value.clone());
        }
        merged
    }

    /// Pretty-printed JSON (2-space indent) as written to disk.
    pub fn to_json_pretty(&self) -> Result<String, DomainError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Color theme of the application windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Default,
    Dark,
    Light,
}

/// When a sound or the incoming-call box is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationPolicy {
    Always,
    RespectDnd,
    Never,
}

/// Log level: "trace", "debug", "info", "warn", "error".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Main application configuration: defaults merged with overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    /// Register the app to start with the user session.
    pub launch_at_startup: bool,
    /// Use the native window decorations instead of the custom title bar.
    pub system_title_bar: bool,
    pub monochrome_tray_icon: bool,
    pub theme: Theme,
    pub zoom_factor: f64,
    pub play_sound_chat: NotificationPolicy,
    pub play_sound_call: NotificationPolicy,
    pub enable_callbox: NotificationPolicy,
    /// Custom downloads directory; `None` uses the OS default.
    pub downloads_directory: Option<String>,
    /// Version that last ran on this profile, used by migrations.
    pub last_app_version: Option<String>,
    pub log_level: LogLevel,
    /// Enable file logging with rotation.
    pub file_logging: bool,
    /// Certificates the user accepted despite failed verification.
    pub trusted_fingerprints: Vec<String>,
}

impl AppConfig {
    /// Build the typed view from validated overrides.
    pub fn from_overrides(overrides: &Overrides) -> Result<Self, DomainError> {
        Ok(serde_json::from_value(Value::Object(overrides.merged()))?)
    }
}

/// A single config change, as broadcast to every open window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigChange {
    pub key: ConfigKey,
    pub value: Value,
}
