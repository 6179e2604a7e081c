//! Workspace filter of a content package: which repository paths the
//! package owns. Rule patterns are globs matched against absolute paths.

use globset::{GlobBuilder, GlobMatcher};
use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterRule {
    Include(String),
    Exclude(String),
}

/// One filter set as declared in the package properties.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FilterSetDef {
    pub root: String,
    #[serde(default)]
    pub rules: Vec<FilterRule>,
}

#[derive(Debug)]
struct CompiledRule {
    include: bool,
    matcher: GlobMatcher,
}

#[derive(Debug)]
struct FilterSet {
    def: FilterSetDef,
    rules: Vec<CompiledRule>,
}

impl FilterSet {
    fn is_within_root(&self, path: &str) -> bool {
        let root = self.def.root.trim_end_matches('/');
        root.is_empty() || path == root || path.starts_with(&format!("{root}/"))
    }

    /// Without rules every path below the root is covered. Otherwise the
    /// first rule decides the default and the last matching rule wins.
    fn covers(&self, path: &str) -> bool {
        if !self.is_within_root(path) {
            return false;
        }
        let mut covered = match self.rules.first() {
            Some(rule) => !rule.include,
            None => return true,
        };
        for rule in &self.rules {
            if rule.matcher.is_match(path) {
                covered = rule.include;
            }
        }
        covered
    }
}

#[derive(Debug, Default)]
pub struct WorkspaceFilter {
    sets: Vec<FilterSet>,
}

impl WorkspaceFilter {
    pub fn from_definitions(definitions: &[FilterSetDef]) -> Result<Self> {
        let mut sets = Vec::new();
        for def in definitions {
            if !def.root.starts_with('/') {
                return Err(Error::FilterError(format!(
                    "filter root '{}' is not an absolute path",
                    def.root
                )));
            }
            let rules = def
                .rules
                .iter()
                .map(|rule| {
                    let (include, pattern) = match rule {
                        FilterRule::Include(pattern) => (true, pattern),
                        FilterRule::Exclude(pattern) => (false, pattern),
                    };
                    let glob = GlobBuilder::new(pattern)
                        .literal_separator(true)
                        .build()
                        .map_err(|e| Error::FilterError(format!("invalid pattern '{pattern}': {e}")))?;
                    Ok(CompiledRule {
                        include,
                        matcher: glob.compile_matcher(),
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            sets.push(FilterSet {
                def: def.clone(),
                rules,
            });
        }
        Ok(Self { sets })
    }

    pub fn covers(&self, path: &str) -> bool {
        self.sets.iter().any(|set| set.covers(path))
    }

    pub fn roots(&self) -> impl Iterator<Item = &str> {
        self.sets.iter().map(|set| set.def.root.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Human readable rendering of the filter sets, for diagnostics.
    pub fn describe(&self) -> String {
        let mut lines = Vec::new();
        for set in &self.sets {
            lines.push(format!("root: {}", set.def.root));
            for rule in &set.def.rules {
                match rule {
                    FilterRule::Include(pattern) => lines.push(format!("  include: {pattern}")),
                    FilterRule::Exclude(pattern) => lines.push(format!("  exclude: {pattern}")),
                }
            }
        }
        lines.join("\n")
    }
}
