//! Variable sources: named, flat, read-only mappings from variable name to value.
//!
//! Every built-in source wraps a [`MapSource`] and may transform the requested
//! name before the lookup. Sources are combined by [`chain::SourceChain`],
//! where the first source returning a value wins.

use indexmap::IndexMap;

pub mod chain;
pub mod env;
pub mod factory;
pub mod node;
pub mod remote;

pub use chain::SourceChain;

/// Result of a successful lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedValue {
    pub source_name: String,
    /// The key that was actually found, which may differ from the requested name
    pub var_name: String,
    pub value: String,
}

/// Capability shared by all variable sources.
pub trait VariableSource {
    fn name(&self) -> &str;

    fn get(&self, var_name: &str) -> Option<NamedValue>;
}

/// A plain name to value mapping.
#[derive(Debug, Clone, Default)]
pub struct MapSource {
    name: String,
    variables: IndexMap<String, String>,
}

impl MapSource {
    pub fn new<S, I, K, V>(name: S, variables: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            name: name.into(),
            variables: variables.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// A source that never yields a value, used when a backend could not be loaded.
    pub fn empty<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            variables: IndexMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.variables.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(String::as_str)
    }
}

impl VariableSource for MapSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, var_name: &str) -> Option<NamedValue> {
        self.variables.get(var_name).map(|value| NamedValue {
            source_name: self.name.clone(),
            var_name: var_name.to_string(),
            value: value.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_source_lookup() {
        let source = MapSource::new("testsource", [("var1", "val1"), ("prefix.var2", "val2")]);

        let value = source.get("prefix.var2").unwrap();
        assert_eq!(value.source_name, "testsource");
        assert_eq!(value.var_name, "prefix.var2");
        assert_eq!(value.value, "val2");
        assert!(source.get("missing").is_none());
        assert_eq!(source.len(), 2);
    }

    #[test]
    fn test_empty_value_is_still_present() {
        let source = MapSource::new("testsource", [("blank", "")]);
        assert_eq!(source.get("blank").unwrap().value, "");
    }

    #[test]
    fn test_empty_source() {
        let source = MapSource::empty("nothing");
        assert!(source.is_empty());
        assert!(source.get("anything").is_none());
        assert_eq!(source.name(), "nothing");
    }
}
