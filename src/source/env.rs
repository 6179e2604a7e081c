//! Sources backed by the running process: its environment and its
//! configuration properties.

use std::ffi::OsString;

use indexmap::IndexMap;
use log::debug;

use super::{MapSource, NamedValue, VariableSource};

/// Reads the process environment. Environment variable names cannot contain
/// dots, so `${db.host}` is looked up as `db_host`.
#[derive(Debug, Clone)]
pub struct OsEnvSource {
    inner: MapSource,
}

impl OsEnvSource {
    pub const NAME: &'static str = "OsEnvVars";

    /// Snapshots the current process environment. Variables whose name or
    /// value is not valid UTF-8 are left out.
    pub fn new() -> Self {
        Self::from_os_vars(std::env::vars_os())
    }

    pub fn from_os_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        let vars = vars.into_iter().filter_map(|(name, value)| match (name.into_string(), value.into_string()) {
            (Ok(name), Ok(value)) => Some((name, value)),
            (Ok(name), Err(_)) => {
                debug!("Skipping environment variable {name}, value is not valid UTF-8");
                None
            }
            (Err(name), _) => {
                debug!("Skipping environment variable {}, name is not valid UTF-8", name.to_string_lossy());
                None
            }
        });
        Self::from_vars(vars)
    }

    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            inner: MapSource::new(Self::NAME, vars),
        }
    }
}

impl Default for OsEnvSource {
    fn default() -> Self {
        OsEnvSource::new()
    }
}

impl VariableSource for OsEnvSource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn get(&self, var_name: &str) -> Option<NamedValue> {
        self.inner.get(&normalize_env_name(var_name))
    }
}

pub fn normalize_env_name(var_name: &str) -> String {
    var_name.replace('.', "_")
}

/// Process configuration properties, given with `--define` or a properties file.
#[derive(Debug, Clone)]
pub struct SystemPropertiesSource {
    inner: MapSource,
}

impl SystemPropertiesSource {
    pub const NAME: &'static str = "SystemProperties";

    pub fn new(properties: &IndexMap<String, String>) -> Self {
        Self {
            inner: MapSource::new(Self::NAME, properties.clone()),
        }
    }
}

impl VariableSource for SystemPropertiesSource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn get(&self, var_name: &str) -> Option<NamedValue> {
        self.inner.get(var_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dots_are_normalized() {
        let source = OsEnvSource::from_vars([("db_host", "db.internal")]);

        let value = source.get("db.host").unwrap();
        assert_eq!(value.value, "db.internal");
        assert_eq!(value.var_name, "db_host");
        assert_eq!(value.source_name, "OsEnvVars");
        assert!(source.get("db.port").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_variables_are_skipped() {
        use std::os::unix::ffi::OsStringExt;

        let source = OsEnvSource::from_os_vars([
            (OsString::from("BROKEN"), OsString::from_vec(vec![0xff, 0xfe])),
            (OsString::from_vec(vec![0x66, 0xff]), OsString::from("x")),
            (OsString::from("db_host"), OsString::from("db.internal")),
        ]);

        assert!(source.get("BROKEN").is_none());
        assert_eq!(source.get("db.host").unwrap().value, "db.internal");
    }

    #[test]
    fn test_snapshot_of_process_environment() {
        let source = OsEnvSource::new();
        assert_eq!(source.name(), "OsEnvVars");
    }

    #[test]
    fn test_normalize_env_name() {
        assert_eq!(normalize_env_name("a.b.c"), "a_b_c");
        assert_eq!(normalize_env_name("plain"), "plain");
    }

    #[test]
    fn test_system_properties_keep_dots() {
        let mut properties = IndexMap::new();
        properties.insert("db.host".to_string(), "props-host".to_string());
        let source = SystemPropertiesSource::new(&properties);

        assert_eq!(source.get("db.host").unwrap().value, "props-host");
        assert!(source.get("db_host").is_none());
        assert_eq!(source.name(), "SystemProperties");
    }
}
