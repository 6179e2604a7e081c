//! Source backed by the flat property set of one repository node.

use log::debug;

use super::{MapSource, NamedValue, VariableSource};
use crate::logger::DiagnosticSink;
use crate::tree::ContentTree;

/// Node whose properties hold the environment's variables
pub const NODE_CONFIG_PATH: &str = "/etc/system-env";

#[derive(Debug, Clone)]
pub struct NodeSource {
    inner: MapSource,
}

impl NodeSource {
    pub const NAME: &'static str = "JCR";

    /// Reads the variables stored on [`NODE_CONFIG_PATH`].
    pub fn load(tree: &dyn ContentTree, sink: &dyn DiagnosticSink) -> Self {
        Self::load_from(tree, NODE_CONFIG_PATH, sink)
    }

    /// Reads the variables stored on `path`. Namespaced property names (those
    /// containing `:`) are skipped and multi-valued properties are ignored.
    pub fn load_from(tree: &dyn ContentTree, path: &str, sink: &dyn DiagnosticSink) -> Self {
        let display_name = format!("{} {}", Self::NAME, path);

        if !tree.node_exists(path) {
            sink.log(&format!("Node {path} does not exist"));
            return Self {
                inner: MapSource::empty(display_name),
            };
        }

        let names = match tree.property_names(path) {
            Ok(names) => names,
            Err(e) => {
                sink.error(&format!("Could not load variables from {path}: {e}"));
                return Self {
                    inner: MapSource::empty(display_name),
                };
            }
        };

        let mut variables = Vec::new();
        for name in names {
            if name.contains(':') {
                continue;
            }
            let property = match tree.property(path, &name) {
                Ok(property) => property,
                Err(e) => {
                    debug!("Skipping {path}@{name}: {e}");
                    continue;
                }
            };
            match property.single_value() {
                Some(value) => variables.push((name, value.to_string())),
                None => sink.log(&format!(
                    "Only single-valued properties are supported (skipping {name})"
                )),
            }
        }
        debug!("Loaded {} variables from {}", variables.len(), path);

        Self {
            inner: MapSource::new(display_name, variables),
        }
    }
}

impl VariableSource for NodeSource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn get(&self, var_name: &str) -> Option<NamedValue> {
        self.inner.get(var_name)
    }
}
