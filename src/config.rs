//! Configuration file support for ferro-disc.
//!
//! This module provides loading of `.disc.toml` configuration files which
//! can select tests and set engine defaults.
//!
//! # Example Configuration
//!
//! ```toml
//! [tests]
//! include = ["COUNT_NUCLEOTIDES", "COUNTRY_COLON"]
//! exclude = ["N_RUNS"]
//! groups = ["default", "oncaller"]
//!
//! [engine]
//! big-file = true
//! ```
//!
//! # Config File Locations
//!
//! Configuration is searched in this order (first found wins):
//! 1. `.disc.toml` in current directory
//! 2. `~/.config/disc/config.toml`
//!
//! CLI flags take precedence over config file settings.

use std::fs;
use std::path::PathBuf;

use crate::registry::{groups, TestDescriptor};

/// Which registered tests participate in a run.
#[derive(Debug, Clone)]
pub struct TestSelection {
    /// When non-empty, only these names/aliases run.
    pub include: Vec<String>,
    /// Names/aliases never run; applied after everything else.
    pub exclude: Vec<String>,
    /// Group flags consulted when `include` is empty.
    pub groups: u32,
}

impl Default for TestSelection {
    fn default() -> Self {
        Self {
            include: Vec::new(),
            exclude: Vec::new(),
            groups: groups::DEFAULT,
        }
    }
}

impl TestSelection {
    /// Every registered test.
    pub fn all() -> Self {
        Self {
            groups: u32::MAX,
            ..Self::default()
        }
    }

    pub fn selects(&self, desc: &TestDescriptor) -> bool {
        if name_matches(&self.exclude, desc) {
            return false;
        }
        if !self.include.is_empty() {
            return name_matches(&self.include, desc);
        }
        desc.in_group(self.groups)
    }
}

fn name_matches(names: &[String], desc: &TestDescriptor) -> bool {
    names.iter().any(|n| {
        let upper = n.to_ascii_uppercase();
        upper == desc.name || desc.aliases.iter().any(|a| a.to_ascii_uppercase() == upper)
    })
}

/// Parsed configuration from a .disc.toml file.
#[derive(Debug, Clone, Default)]
pub struct DiscConfig {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub groups: Vec<String>,
    pub big_file: Option<bool>,
}

/// Error from loading or parsing a config file.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    Io(String),
    Parse(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "config IO error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "config parse error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl DiscConfig {
    /// Load configuration from the default locations.
    pub fn load() -> Option<Self> {
        let cwd_config = PathBuf::from(".disc.toml");
        if cwd_config.exists() {
            if let Ok(config) = Self::load_from_path(&cwd_config) {
                return Some(config);
            }
        }
        if let Some(home) = std::env::var_os("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("disc")
                .join("config.toml");
            if home_config.exists() {
                if let Ok(config) = Self::load_from_path(&home_config) {
                    return Some(config);
                }
            }
        }
        None
    }

    /// Load configuration from a specific path.
    pub fn load_from_path(path: &PathBuf) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML content.
    ///
    /// Only the subset this tool writes is understood, so no external
    /// parser is pulled in.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut config = DiscConfig::default();
        let mut section = String::new();

        for line in content.lines() {
            let line = line.trim();
            if line.starts_with('#') || line.is_empty() {
                continue;
            }
            if line.starts_with('[') && line.ends_with(']') {
                section = line[1..line.len() - 1].to_string();
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(ConfigError::Parse(format!("expected key = value: {}", line)));
            };
            let key = key.trim();
            let value = value.trim();
            match (section.as_str(), key) {
                ("tests", "include") => config.include = parse_string_array(value),
                ("tests", "exclude") => config.exclude = parse_string_array(value),
                ("tests", "groups") => config.groups = parse_string_array(value),
                ("engine", "big-file") => config.big_file = Some(value == "true"),
                _ => {} // unknown keys are ignored for forward compatibility
            }
        }
        Ok(config)
    }

    /// Fold the file settings into a selection.
    pub fn selection(&self) -> TestSelection {
        let mut selection = TestSelection {
            include: self.include.clone(),
            exclude: self.exclude.clone(),
            ..TestSelection::default()
        };
        if !self.groups.is_empty() {
            selection.groups = self
                .groups
                .iter()
                .filter_map(|g| groups::from_name(g))
                .fold(0, |acc, g| acc | g);
        }
        selection
    }
}

/// Parse a TOML string array like `["a", "b"]`.
fn parse_string_array(value: &str) -> Vec<String> {
    let value = value.trim();
    if !value.starts_with('[') || !value.ends_with(']') {
        return Vec::new();
    }
    value[1..value.len() - 1]
        .split(',')
        .map(|s| s.trim().trim_matches('"').trim_matches('\'').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
