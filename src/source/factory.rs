//! Builds a source chain from configured source identifiers.

use indexmap::IndexMap;
use log::debug;

use super::env::{OsEnvSource, SystemPropertiesSource};
use super::node::NodeSource;
use super::remote::{RemoteConfig, RemoteLoader, RemoteSource};
use super::{SourceChain, VariableSource};
use crate::logger::DiagnosticSink;
use crate::tree::ContentTree;

/// Everything the built-in sources are populated from.
pub struct SourceContext<'a> {
    /// Process configuration properties
    pub properties: &'a IndexMap<String, String>,
    pub tree: &'a dyn ContentTree,
    pub remote_loader: &'a dyn RemoteLoader,
    pub sink: &'a dyn DiagnosticSink,
}

/// Identifiers the factory recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    OsEnv,
    SystemProperties,
    Node,
    Remote,
}

impl SourceKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            OsEnvSource::NAME => Some(Self::OsEnv),
            SystemPropertiesSource::NAME => Some(Self::SystemProperties),
            NodeSource::NAME => Some(Self::Node),
            RemoteSource::NAME => Some(Self::Remote),
            _ => None,
        }
    }
}

/// Builds the chain in the order given. Unknown identifiers are skipped with a
/// diagnostic, sources that fail to load stay in the chain as empty sources.
pub fn build_chain(source_names: &[String], context: &SourceContext) -> SourceChain {
    let mut sources: Vec<Box<dyn VariableSource>> = Vec::new();

    for name in source_names {
        let source: Box<dyn VariableSource> = match SourceKind::from_name(name) {
            Some(SourceKind::OsEnv) => Box::new(OsEnvSource::new()),
            Some(SourceKind::SystemProperties) => {
                Box::new(SystemPropertiesSource::new(context.properties))
            }
            Some(SourceKind::Node) => Box::new(NodeSource::load(context.tree, context.sink)),
            Some(SourceKind::Remote) => {
                let config = RemoteConfig::from_properties(context.properties);
                Box::new(RemoteSource::load(&config, context.remote_loader, context.sink))
            }
            None => {
                context.sink.log(&format!("Could not find source {name}, ignoring"));
                continue;
            }
        };
        debug!("Added source {}", source.name());
        sources.push(source);
    }

    SourceChain::new(source_names.join(", "), sources)
}
