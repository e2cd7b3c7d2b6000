use once_cell::sync::Lazy;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::error::Result;

const DEFAULT_CONFIG: &str = include_str!("default_config.toml");

// build.rs checks the embedded file parses
static COMPILED_DEFAULT: Lazy<Config> =
    Lazy::new(|| Config::from_toml_str(DEFAULT_CONFIG).unwrap_or_default());

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub lists: ListsConfig,
    pub date: DateConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ListsConfig {
    /// Spaces per nesting level.
    pub indent: usize,
    /// Marker for unordered items: `-`, `*` or `+`.
    pub bullet: String,
}

impl Default for ListsConfig {
    fn default() -> Self {
        Self {
            indent: 2,
            bullet: "-".to_string(),
        }
    }
}

impl ListsConfig {
    /// The unordered marker, falling back to `-` for anything the parser
    /// wouldn't read back as a bullet.
    pub fn bullet_marker(&self) -> &str {
        match self.bullet.as_str() {
            marker @ ("-" | "*" | "+") => marker,
            _ => "-",
        }
    }

    pub fn indent_width(&self) -> usize {
        self.indent.max(1)
    }
}

/// Which calendar a timestamp is resolved in before comparing to today.
#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Timezone {
    #[default]
    Local,
    Utc,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DateConfig {
    pub timezone: Timezone,
    /// Text for a date element with no timestamp.
    pub placeholder: String,
    pub today: String,
    pub yesterday: String,
    pub tomorrow: String,
    /// `strftime` pattern for dates outside the relative window. Month and
    /// weekday names are always English.
    pub format: String,
}

impl Default for DateConfig {
    fn default() -> Self {
        Self {
            timezone: Timezone::Local,
            placeholder: "Pick a date".to_string(),
            today: "Today".to_string(),
            yesterday: "Yesterday".to_string(),
            tomorrow: "Tomorrow".to_string(),
            format: "%B %-d, %Y".to_string(),
        }
    }
}

impl Config {
    /// The configuration bundled with the crate.
    pub fn compiled_default() -> Self {
        COMPILED_DEFAULT.clone()
    }

    /// Borrow the bundled configuration, parsed once per process.
    pub(crate) fn shared_default() -> &'static Config {
        &COMPILED_DEFAULT
    }

    /// Parse a TOML document, rejecting malformed input.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load config from a TOML file, or return defaults if not found.
    pub fn load(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "config not readable, using defaults");
                return Self::compiled_default();
            }
        };
        match Self::from_toml_str(&content) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "config invalid, using defaults");
                Self::compiled_default()
            }
        }
    }
}
