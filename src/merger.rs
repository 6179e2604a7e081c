//! Substitution of placeholders in text and the accounting of every resolution.

use indexmap::IndexMap;
use log::debug;

use crate::constants::TEMPLATE_SUFFIX;
use crate::logger::DiagnosticSink;
use crate::parser::placeholders;
use crate::source::{SourceChain, VariableSource};

/// Resolution counters keyed by source name.
///
/// Defaults and misses are tracked in their own counters so no source
/// name can be mistaken for them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionStats {
    counts: IndexMap<String, usize>,
    default_used: usize,
    not_found: usize,
}

impl ResolutionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the chain's sources up front so the summary follows lookup order.
    pub fn for_chain(chain: &SourceChain) -> Self {
        let mut stats = Self::new();
        for name in chain.source_names() {
            stats.counts.entry(name.to_string()).or_insert(0);
        }
        stats
    }

    pub fn increment(&mut self, source: &str) {
        *self.counts.entry(source.to_string()).or_insert(0) += 1;
    }

    pub fn increment_default(&mut self) {
        self.default_used += 1;
    }

    pub fn increment_not_found(&mut self) {
        self.not_found += 1;
    }

    /// Placeholders resolved by the named source.
    pub fn count(&self, source: &str) -> usize {
        self.counts.get(source).copied().unwrap_or(0)
    }

    pub fn default_used(&self) -> usize {
        self.default_used
    }

    pub fn not_found(&self) -> usize {
        self.not_found
    }

    /// Placeholders replaced from a source or by a default.
    pub fn total_replaced(&self) -> usize {
        self.counts.values().sum::<usize>() + self.default_used
    }

    /// Folds counts gathered elsewhere into these, e.g. from a worker.
    pub fn merge(&mut self, other: &ResolutionStats) {
        for (source, count) in &other.counts {
            *self.counts.entry(source.clone()).or_insert(0) += count;
        }
        self.default_used += other.default_used;
        self.not_found += other.not_found;
    }

    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        for (source, count) in self.counts.iter().filter(|(_, count)| **count > 0) {
            lines.push(format!("Replacement count for '{source}': {count}"));
        }
        lines.push(format!("Count default value used: {}", self.default_used));
        lines.push(format!("Total variables replaced: {}", self.total_replaced()));
        if self.not_found > 0 {
            lines.push(format!(
                "WARN: No value found for variable and no default given: {}",
                self.not_found
            ));
        }
        lines.join("\n")
    }
}

/// Replaces placeholders in text, logging one line per placeholder.
pub struct VariablesMerger<'a> {
    sink: &'a dyn DiagnosticSink,
    stats: ResolutionStats,
}

impl<'a> VariablesMerger<'a> {
    pub fn new(sink: &'a dyn DiagnosticSink) -> Self {
        Self {
            sink,
            stats: ResolutionStats::new(),
        }
    }

    pub fn for_chain(chain: &SourceChain, sink: &'a dyn DiagnosticSink) -> Self {
        Self {
            sink,
            stats: ResolutionStats::for_chain(chain),
        }
    }

    /// Returns `text` with every placeholder substituted.
    ///
    /// A resolved value wins over the inline default; a placeholder with
    /// neither is kept exactly as written. Text outside placeholders is
    /// copied unchanged.
    pub fn apply(&mut self, text: &str, source: &dyn VariableSource, context_path: &str) -> String {
        let display_path = context_path.replace(TEMPLATE_SUFFIX, "");
        let mut result = String::with_capacity(text.len());
        let mut cursor = 0;

        for placeholder in placeholders(text) {
            result.push_str(&text[cursor..placeholder.start]);
            cursor = placeholder.end;

            let (replacement, action) = match (source.get(placeholder.name), placeholder.default) {
                (Some(found), _) => {
                    if found.var_name != placeholder.name {
                        debug!("Using key '{}' for variable '{}'", found.var_name, placeholder.name);
                    }
                    self.stats.increment(&found.source_name);
                    let action = format!("replaced from {}", found.source_name);
                    (found.value, action)
                }
                (None, Some(default)) => {
                    self.stats.increment_default();
                    (default.to_string(), "default in package".to_string())
                }
                (None, None) => {
                    self.stats.increment_not_found();
                    (
                        placeholder.matched.to_string(),
                        "var not found (no default provided)".to_string(),
                    )
                }
            };

            self.sink.log(&format!(
                "{display_path}: {}=\"{replacement}\" ({action})",
                placeholder.name
            ));
            result.push_str(&replacement);
        }
        result.push_str(&text[cursor..]);

        result
    }

    pub fn stats(&self) -> &ResolutionStats {
        &self.stats
    }

    pub fn into_stats(self) -> ResolutionStats {
        self.stats
    }

    pub fn summary(&self) -> String {
        self.stats.summary()
    }
}
