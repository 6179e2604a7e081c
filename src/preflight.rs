//! Read-only validation of a package's archive before anything is installed.
//!
//! Every text entry that is either explicitly configured for adjustment or
//! gets substituted when its template is promoted is scanned for placeholders
//! without default. Each of them must be resolvable by the source chain.
//! Plain files inside a template directory are copied verbatim and not checked.

use std::fmt;

use log::debug;

use crate::archive::{Archive, Entry};
use crate::constants::ARCHIVE_ROOT;
use crate::error::Result;
use crate::logger::DiagnosticSink;
use crate::parser::placeholders;
use crate::processor::{is_template_name, is_template_path};
use crate::source::SourceChain;

/// A required variable that no source can resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingVariable {
    pub name: String,
    pub path: String,
    /// Names of the sources that were asked
    pub sources: String,
}

impl fmt::Display for MissingVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Variable '{}' is not found but is used in file {} without declaring a default and it could not be found in sources: {}",
            self.name, self.path, self.sources
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreflightReport {
    pub failures: Vec<MissingVariable>,
    /// In-scope entries that were scanned
    pub checked: usize,
    /// In-scope entries that could not be read as text
    pub skipped: usize,
}

impl PreflightReport {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Maps an archive entry path to the repository path it most likely ends up at.
pub fn normalize_archive_path(path: &str) -> String {
    let root = format!("/{ARCHIVE_ROOT}");
    let path = path.strip_prefix(&root).unwrap_or(path);
    let path = path
        .strip_suffix("/.content.json")
        .or_else(|| path.strip_suffix("/.content.xml"))
        .unwrap_or(path);
    path.strip_suffix(".xml").unwrap_or(path).to_string()
}

fn is_node_descriptor(entry_path: &str) -> bool {
    entry_path.ends_with("/.content.json") || entry_path.ends_with("/.content.xml")
}

/// True if any segment of the path carries the template marker.
pub fn has_template_marker(path: &str) -> bool {
    path.split('/').any(is_template_name)
}

/// True if the entry's text is substituted when a template is promoted: the
/// template itself, or a node descriptor anywhere inside a template directory.
pub fn in_template_scope(entry_path: &str) -> bool {
    let normalized = normalize_archive_path(entry_path);
    is_template_path(&normalized) || (is_node_descriptor(entry_path) && has_template_marker(&normalized))
}

/// Prefix match of a normalized path against the configured target paths,
/// ignoring any `@property` part of the targets.
pub fn is_marked_for_adjustment(normalized_path: &str, target_paths: &[String]) -> bool {
    target_paths.iter().any(|target| {
        let node_path = target.split('@').next().unwrap_or(target);
        if !normalized_path.starts_with(node_path) {
            return false;
        }
        if normalized_path != node_path {
            debug!("{normalized_path} matched configured path {target} by prefix only");
        }
        true
    })
}

pub struct PreflightValidator<'a> {
    chain: &'a SourceChain,
    target_paths: &'a [String],
    sink: &'a dyn DiagnosticSink,
}

impl<'a> PreflightValidator<'a> {
    pub fn new(chain: &'a SourceChain, target_paths: &'a [String], sink: &'a dyn DiagnosticSink) -> Self {
        Self {
            chain,
            target_paths,
            sink,
        }
    }

    fn in_scope(&self, entry: &Entry) -> bool {
        let normalized = normalize_archive_path(&entry.path);
        if in_template_scope(&entry.path) || is_marked_for_adjustment(&normalized, self.target_paths) {
            return true;
        }
        if has_template_marker(&normalized) {
            debug!("{} is copied verbatim with its template, not checked", entry.path);
        }
        false
    }

    /// Walks the whole archive depth-first and collects every failure.
    pub fn validate(&self, archive: &dyn Archive) -> Result<PreflightReport> {
        let mut report = PreflightReport::default();
        let mut stack = vec![archive.root()];

        while let Some(entry) = stack.pop() {
            if entry.is_directory {
                stack.extend(archive.children(&entry)?.into_iter().rev());
                continue;
            }
            if !self.in_scope(&entry) {
                continue;
            }

            let text = match archive.read(&entry).map(String::from_utf8) {
                Ok(Ok(text)) => text,
                Ok(Err(e)) => {
                    self.sink.log(&format!("Could not read {} as text, skipping ({e})", entry.path));
                    report.skipped += 1;
                    continue;
                }
                Err(e) => {
                    self.sink.log(&format!("Could not read {}, skipping ({e})", entry.path));
                    report.skipped += 1;
                    continue;
                }
            };

            report.checked += 1;
            for placeholder in placeholders(&text).filter(|p| !p.has_default()) {
                if self.chain.resolve(placeholder.name).is_none() {
                    let failure = MissingVariable {
                        name: placeholder.name.to_string(),
                        path: entry.path.clone(),
                        sources: self.chain.source_names().collect::<Vec<_>>().join(", "),
                    };
                    self.sink.log(&failure.to_string());
                    report.failures.push(failure);
                }
            }
        }

        debug!(
            "Preflight checked {} entries, skipped {}, {} failures",
            report.checked,
            report.skipped,
            report.failures.len()
        );
        Ok(report)
    }
}
