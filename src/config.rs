//! Configuration handling for envstamp.
//! Loads the package properties file of a content package and the process
//! configuration properties that back the `SystemProperties` source.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Deserializer};

use crate::constants::{CONFIG_FILES, DEFAULT_SOURCES};
use crate::error::{Error, Result};
use crate::filter::{FilterSetDef, WorkspaceFilter};

/// Properties of a content package, read from `envstamp.json|yml|yaml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageProperties {
    #[serde(default)]
    pub group: String,
    pub name: String,
    #[serde(default)]
    pub version: String,
    /// Comma separated source identifiers, in lookup order
    #[serde(default)]
    pub apply_system_env_sources: Option<String>,
    /// Node and property paths to adjust, separated by whitespace or commas
    #[serde(default)]
    pub apply_system_env_for_paths: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub fail_for_missing_env_vars: bool,
    #[serde(default)]
    pub filter: Vec<FilterSetDef>,
}

/// Accepts `true`/`false` as well as their string forms.
fn deserialize_flag<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(value) => value,
        Flag::Text(text) => text.trim().eq_ignore_ascii_case("true"),
    })
}

impl PackageProperties {
    /// Package identifier in `group:name:version` form.
    pub fn id(&self) -> String {
        format!("{}:{}:{}", self.group, self.name, self.version)
    }

    /// Configured source identifiers, or the default sources when none are configured.
    pub fn source_names(&self) -> Vec<String> {
        let configured: Vec<String> = self
            .apply_system_env_sources
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();

        if configured.is_empty() {
            DEFAULT_SOURCES.iter().map(|name| name.to_string()).collect()
        } else {
            configured
        }
    }

    pub fn target_paths(&self) -> Vec<String> {
        parse_target_paths(self.apply_system_env_for_paths.as_deref().unwrap_or_default())
    }
}

/// Splits a target path list on whitespace and commas.
pub fn parse_target_paths(raw: &str) -> Vec<String> {
    raw.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|path| !path.is_empty())
        .map(str::to_string)
        .collect()
}

/// Loads configuration from a package directory, trying multiple file formats.
///
/// # Returns
/// * `Result<String>` - Contents of the first found configuration file
///
/// # Errors
/// * `Error::ConfigError` if no config file exists
pub fn load_config<P: AsRef<Path>>(package_dir: P, config_files: &[&str]) -> Result<String> {
    for file in config_files {
        let config_path = package_dir.as_ref().join(file);
        if config_path.exists() {
            debug!("Loading configuration from {}", config_path.display());
            return Ok(fs::read_to_string(&config_path)?);
        }
    }

    Err(Error::ConfigError(format!(
        "No configuration file found (tried: {})",
        config_files.join(", ")
    )))
}

/// Parses package properties, as JSON first and then as YAML.
pub fn parse_config(content: &str) -> Result<PackageProperties> {
    match serde_json::from_str(content) {
        Ok(properties) => Ok(properties),
        Err(json_error) => serde_yaml::from_str(content).map_err(|yaml_error| {
            Error::ConfigError(format!(
                "Invalid configuration format: {json_error} (as JSON), {yaml_error} (as YAML)"
            ))
        }),
    }
}

/// A content package on disk.
#[derive(Debug)]
pub struct Package {
    pub root: PathBuf,
    pub properties: PackageProperties,
    pub filter: WorkspaceFilter,
}

impl Package {
    pub fn id(&self) -> String {
        self.properties.id()
    }
}

pub fn load_package<P: AsRef<Path>>(package_dir: P) -> Result<Package> {
    let root = package_dir.as_ref();
    if !root.is_dir() {
        return Err(Error::PathNotFound {
            path: root.display().to_string(),
        });
    }

    let properties = parse_config(&load_config(root, &CONFIG_FILES)?)?;
    let filter = WorkspaceFilter::from_definitions(&properties.filter)?;
    debug!("Loaded package {} from {}", properties.id(), root.display());

    Ok(Package {
        root: root.to_path_buf(),
        properties,
        filter,
    })
}

/// Parses a properties document the way Java properties files are read.
///
/// The key ends at the first unescaped `=`, `:` or whitespace; `#` and `!`
/// start comment lines. A line ending in an odd number of backslashes
/// continues on the next one, whose leading whitespace is dropped. Escapes
/// (`\t`, `\n`, `\r`, `\f`, `\uXXXX`) are decoded in keys and values, any
/// other escaped character stands for itself.
pub fn parse_properties(text: &str) -> IndexMap<String, String> {
    let mut properties = IndexMap::new();
    let mut lines = text.lines();

    while let Some(line) = lines.next() {
        let line = line.trim_start();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let mut logical = line.to_string();
        while ends_with_continuation(&logical) {
            logical.pop();
            match lines.next() {
                Some(next) => logical.push_str(next.trim_start()),
                None => break,
            }
        }
        let (key, value) = split_property_line(&logical);
        properties.insert(unescape_property(key), unescape_property(value));
    }

    properties
}

fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

fn split_property_line(line: &str) -> (&str, &str) {
    let mut key_end = line.len();
    let mut escaped = false;
    for (index, c) in line.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '=' || c == ':' || c.is_whitespace() {
            key_end = index;
            break;
        }
    }

    let rest = line[key_end..].trim_start();
    let value = rest.strip_prefix(['=', ':']).map(str::trim_start).unwrap_or(rest);
    (&line[..key_end], value)
}

fn unescape_property(raw: &str) -> String {
    let mut result = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => result.push('\t'),
            Some('n') => result.push('\n'),
            Some('r') => result.push('\r'),
            Some('f') => result.push('\u{c}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => result.push(decoded),
                    None => {
                        result.push('u');
                        result.push_str(&hex);
                    }
                }
            }
            Some(other) => result.push(other),
            None => {}
        }
    }

    result
}

/// Builds the process configuration properties from an optional properties
/// file and `KEY=VALUE` definitions, the latter taking precedence.
pub fn load_process_properties(file: Option<&Path>, defines: &[String]) -> Result<IndexMap<String, String>> {
    let mut properties = match file {
        Some(path) => {
            debug!("Loading process properties from {}", path.display());
            parse_properties(&fs::read_to_string(path)?)
        }
        None => IndexMap::new(),
    };

    for define in defines {
        let (key, value) = define.split_once('=').ok_or_else(|| {
            Error::ConfigError(format!("Invalid definition '{define}', expected KEY=VALUE"))
        })?;
        if key.trim().is_empty() {
            return Err(Error::ConfigError(format!("Invalid definition '{define}', empty key")));
        }
        properties.insert(key.trim().to_string(), value.to_string());
    }

    Ok(properties)
}
