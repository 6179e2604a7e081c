//! Applies variables to the live content tree and promotes template nodes.
//!
//! A target is either `path@property`, adjusting one property in place, or a
//! node path. A node path ending in `.TEMPLATE` is promoted: its content is
//! copied to the de-suffixed path (replacing whatever was there) and the copy
//! is adjusted. Files are substituted as a whole.

use log::debug;

use crate::constants::TEMPLATE_SUFFIX;
use crate::error::{Error, Result};
use crate::filter::WorkspaceFilter;
use crate::logger::DiagnosticSink;
use crate::merger::{ResolutionStats, VariablesMerger};
use crate::source::SourceChain;
use crate::tree::{join_path, split_path, ContentTree, NodeKind, PropertyType, PropertyValue};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Node(String),
    Property { path: String, name: String },
}

impl Target {
    pub fn parse(raw: &str) -> Self {
        match raw.split_once('@') {
            Some((path, name)) => Target::Property {
                path: path.to_string(),
                name: name.to_string(),
            },
            None => Target::Node(raw.to_string()),
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Target::Node(path) => path,
            Target::Property { path, .. } => path,
        }
    }
}

/// True for a node name carrying the template marker after a non-empty stem.
pub fn is_template_name(name: &str) -> bool {
    name.len() > TEMPLATE_SUFFIX.len() && name.ends_with(TEMPLATE_SUFFIX)
}

pub fn is_template_path(path: &str) -> bool {
    is_template_name(path.rsplit('/').next().unwrap_or(path))
}

/// Path a template node is promoted to.
pub fn resolve_target_path(path: &str) -> &str {
    match path.strip_suffix(TEMPLATE_SUFFIX) {
        Some(target) if !target.ends_with('/') && !target.is_empty() => target,
        _ => path,
    }
}

pub struct Processor<'a> {
    chain: &'a SourceChain,
    filter: &'a WorkspaceFilter,
    sink: &'a dyn DiagnosticSink,
    merger: VariablesMerger<'a>,
}

impl<'a> Processor<'a> {
    pub fn new(chain: &'a SourceChain, filter: &'a WorkspaceFilter, sink: &'a dyn DiagnosticSink) -> Self {
        Self {
            chain,
            filter,
            sink,
            merger: VariablesMerger::for_chain(chain, sink),
        }
    }

    /// Finds every covered node below the filter roots whose name carries the
    /// template marker, in pre-order. Templates nested inside other templates
    /// are reported too.
    pub fn collect_template_nodes(&self, tree: &dyn ContentTree) -> Result<Vec<String>> {
        let mut templates = Vec::new();

        for root in self.filter.roots() {
            if !tree.node_exists(root) {
                debug!("Filter root {root} does not exist in the repository");
                continue;
            }
            let mut stack = vec![root.to_string()];
            while let Some(path) = stack.pop() {
                if is_template_path(&path) && self.filter.covers(&path) {
                    debug!("Found template node {path}");
                    templates.push(path.clone());
                }
                let children = tree.child_names(&path)?;
                stack.extend(children.iter().rev().map(|child| join_path(&path, child)));
            }
        }

        Ok(templates)
    }

    /// Adjusts every target in order. Targets outside the filter or missing
    /// in the tree are skipped with a diagnostic.
    pub fn apply_all(&mut self, tree: &mut dyn ContentTree, targets: &[String]) -> Result<()> {
        for raw in targets {
            let target = Target::parse(raw);
            if !self.filter.covers(target.path()) {
                self.sink.log(&format!(
                    "Path {} is not covered by filter \n{}",
                    target.path(),
                    self.filter.describe()
                ));
                continue;
            }

            let result = match &target {
                Target::Property { path, name } => self.adjust_property(tree, path, name),
                Target::Node(path) => self.adjust_node(tree, path),
            };
            match result {
                Ok(()) => {}
                Err(e @ (Error::PathNotFound { .. } | Error::InvalidPath { .. })) => {
                    self.sink.log(&format!("{e}, skipping {raw}"));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    pub fn adjust_node(&mut self, tree: &mut dyn ContentTree, path: &str) -> Result<()> {
        if !tree.node_exists(path) {
            return Err(Error::PathNotFound {
                path: path.to_string(),
            });
        }

        if tree.node_kind(path)? == NodeKind::File {
            return self.adjust_file(tree, path);
        }

        let target = resolve_target_path(path);
        if is_template_path(path) && target != path {
            if tree.node_exists(target) {
                debug!("Removing existing node {target}");
                tree.remove(target)?;
            }
            self.copy_subtree(tree, path, target)?;
            debug!("Promoted {path} to {target}");
            self.adjust_subtree(tree, target)
        } else {
            self.adjust_subtree(tree, path)
        }
    }

    fn adjust_file(&mut self, tree: &mut dyn ContentTree, path: &str) -> Result<()> {
        let (parent, _) = split_path(path).ok_or_else(|| Error::InvalidPath {
            path: path.to_string(),
        })?;
        let text = match String::from_utf8(tree.read_file(path)?) {
            Ok(text) => text,
            Err(e) => {
                self.sink.log(&format!("Could not read {path} as text, skipping ({e})"));
                return Ok(());
            }
        };

        let adjusted = self.merger.apply(&text, self.chain, path);
        let target = resolve_target_path(path);
        let target_name = split_path(target).map(|(_, name)| name).unwrap_or(target);
        tree.put_file(parent, target_name, adjusted.into_bytes())?;
        debug!("Written file {target}");
        Ok(())
    }

    /// Deep copy of a subtree without protected properties. An existing node
    /// at `to` is reused.
    pub fn copy_subtree(&self, tree: &mut dyn ContentTree, from: &str, to: &str) -> Result<()> {
        let mut worklist = vec![(from.to_string(), to.to_string())];

        while let Some((source, target)) = worklist.pop() {
            let kind = tree.node_kind(&source)?;
            if kind == NodeKind::File {
                let (parent, name) = split_path(&target).ok_or_else(|| Error::InvalidPath {
                    path: target.clone(),
                })?;
                let content = tree.read_file(&source)?;
                tree.put_file(parent, name, content)?;
                continue;
            }

            tree.create_node(&target, kind)?;
            for name in tree.property_names(&source)? {
                let property = tree.property(&source, &name)?;
                if property.protected {
                    continue;
                }
                tree.set_property(&target, &name, property)?;
            }
            let children = tree.child_names(&source)?;
            worklist.extend(
                children
                    .iter()
                    .rev()
                    .map(|child| (join_path(&source, child), join_path(&target, child))),
            );
        }

        Ok(())
    }

    /// Adjusts all properties of the subtree, pre-order.
    pub fn adjust_subtree(&mut self, tree: &mut dyn ContentTree, root: &str) -> Result<()> {
        let mut stack = vec![root.to_string()];

        while let Some(path) = stack.pop() {
            for name in tree.property_names(&path)? {
                self.adjust_property(tree, &path, &name)?;
            }
            let children = tree.child_names(&path)?;
            stack.extend(children.iter().rev().map(|child| join_path(&path, child)));
        }

        Ok(())
    }

    /// Substitutes a string property in place. Protected and non-string
    /// properties are left untouched; multi-valued properties are adjusted
    /// element by element.
    pub fn adjust_property(&mut self, tree: &mut dyn ContentTree, path: &str, name: &str) -> Result<()> {
        let mut property = tree.property(path, name)?;
        if property.protected {
            debug!("Skipping protected property {path}@{name}");
            return Ok(());
        }
        if property.kind != PropertyType::String {
            debug!("Skipping {path}@{name} of type {:?}", property.kind);
            return Ok(());
        }

        let changed = match &mut property.value {
            PropertyValue::Value(value) => {
                let adjusted = self.merger.apply(value.as_str(), self.chain, &format!("{path}@{name}"));
                let changed = adjusted != *value;
                *value = adjusted;
                changed
            }
            PropertyValue::Values(values) => {
                let mut changed = false;
                for (index, value) in values.iter_mut().enumerate() {
                    let adjusted = self.merger.apply(value.as_str(), self.chain, &format!("{path}@{name}[{index}]"));
                    changed |= adjusted != *value;
                    *value = adjusted;
                }
                changed
            }
        };

        if changed {
            tree.set_property(path, name, property)?;
        }
        Ok(())
    }

    pub fn stats(&self) -> &ResolutionStats {
        self.merger.stats()
    }

    pub fn into_stats(self) -> ResolutionStats {
        self.merger.into_stats()
    }
}
