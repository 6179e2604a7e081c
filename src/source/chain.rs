use super::{NamedValue, VariableSource};

/// Ordered list of sources queried in priority order; the first hit wins.
pub struct SourceChain {
    name: String,
    sources: Vec<Box<dyn VariableSource>>,
}

impl SourceChain {
    pub fn new<S: Into<String>>(name: S, sources: Vec<Box<dyn VariableSource>>) -> Self {
        Self {
            name: name.into(),
            sources,
        }
    }

    /// Queries the sources in construction order, stopping at the first value.
    pub fn resolve(&self, var_name: &str) -> Option<NamedValue> {
        self.sources.iter().find_map(|source| source.get(var_name))
    }

    /// Display names of the sources, in lookup order.
    pub fn source_names(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|source| source.name())
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl std::fmt::Debug for SourceChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceChain")
            .field("name", &self.name)
            .field("sources", &self.source_names().collect::<Vec<_>>())
            .finish()
    }
}

impl VariableSource for SourceChain {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, var_name: &str) -> Option<NamedValue> {
        self.resolve(var_name)
    }
}
