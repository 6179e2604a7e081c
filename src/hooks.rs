//! Install hook run around the import of a package.
//!
//! The [`RunContext`] is created in the prepare phase, before the package
//! content is imported, and carries the source chain into the installed
//! phase, after the import.

use indexmap::IndexMap;
use log::debug;

use crate::archive::Archive;
use crate::config::Package;
use crate::constants::{PACKAGE_PROP_PREFIX, PACKAGE_ROOT_PATH};
use crate::error::{Error, Result};
use crate::logger::DiagnosticSink;
use crate::merger::ResolutionStats;
use crate::preflight::{PreflightReport, PreflightValidator};
use crate::processor::Processor;
use crate::source::factory::{build_chain, SourceContext};
use crate::source::remote::RemoteLoader;
use crate::source::{SourceChain, VariableSource};
use crate::tree::{ContentTree, NodeKind, Property};

/// Registry key marking a package as environment specific.
pub fn package_key(group: &str, name: &str) -> String {
    let strip = |value: &str| -> String { value.chars().filter(char::is_ascii_alphanumeric).collect() };
    format!("{PACKAGE_PROP_PREFIX}{}_{}", strip(group), strip(name))
}

pub struct RunContext<'a> {
    package: &'a Package,
    chain: SourceChain,
    sink: &'a dyn DiagnosticSink,
    /// Report of the check already run in the prepare phase
    checked: Option<PreflightReport>,
}

impl<'a> RunContext<'a> {
    /// Prepare phase: builds the source chain and, if the package asks for
    /// it, aborts when a required variable cannot be resolved.
    pub fn prepare(
        package: &'a Package,
        properties: &IndexMap<String, String>,
        tree: &dyn ContentTree,
        archive: &dyn Archive,
        remote_loader: &dyn RemoteLoader,
        sink: &'a dyn DiagnosticSink,
    ) -> Result<Self> {
        sink.log(&format!("Preparing installation of package {}", package.id()));

        let source_context = SourceContext {
            properties,
            tree,
            remote_loader,
            sink,
        };
        let chain = build_chain(&package.properties.source_names(), &source_context);
        sink.log(&format!(
            "Using sources [{}]",
            chain.source_names().collect::<Vec<_>>().join(", ")
        ));

        let mut context = Self {
            package,
            chain,
            sink,
            checked: None,
        };
        if package.properties.fail_for_missing_env_vars {
            context.checked = Some(context.check(archive)?);
        } else {
            debug!("failForMissingEnvVars is not set, skipping check for missing variables");
        }

        Ok(context)
    }

    pub fn chain(&self) -> &SourceChain {
        &self.chain
    }

    /// Runs the preflight validation over the archive.
    pub fn preflight(&self, archive: &dyn Archive) -> Result<PreflightReport> {
        let targets = self.package.properties.target_paths();
        PreflightValidator::new(&self.chain, &targets, self.sink).validate(archive)
    }

    /// Fails with every missing variable if the preflight does not pass.
    pub fn check(&self, archive: &dyn Archive) -> Result<PreflightReport> {
        let report = self.preflight(archive)?;
        if report.is_ok() {
            self.sink.log(&format!(
                "All required variables can be resolved by {} ({} entries checked)",
                self.chain.name(),
                report.checked
            ));
            Ok(report)
        } else {
            Err(Error::MissingVariables {
                package: self.package.id(),
                failures: report.failures,
            })
        }
    }

    pub fn was_checked(&self) -> bool {
        self.checked.is_some()
    }

    /// Like [`check`](Self::check), reusing the prepare phase's report when
    /// the package already asked for the check.
    pub fn ensure_checked(&self, archive: &dyn Archive) -> Result<PreflightReport> {
        match &self.checked {
            Some(report) => Ok(report.clone()),
            None => self.check(archive),
        }
    }

    /// Installed phase: adjusts configured and discovered targets, records
    /// the package as environment specific and commits the tree.
    pub fn installed(&self, tree: &mut dyn ContentTree) -> Result<ResolutionStats> {
        let mut processor = Processor::new(&self.chain, &self.package.filter, self.sink);

        let mut targets = self.package.properties.target_paths();
        for template in processor.collect_template_nodes(tree)? {
            if !targets.contains(&template) {
                targets.push(template);
            }
        }

        if targets.is_empty() {
            self.sink.log(
                "Property applySystemEnvForPaths was left blank and no .TEMPLATE nodes were found in package. No action taken.",
            );
            return Ok(ResolutionStats::for_chain(&self.chain));
        }
        debug!("Adjusting {} paths: {}", targets.len(), targets.join(", "));

        processor.apply_all(tree, &targets)?;
        let stats = processor.into_stats();
        for line in stats.summary().lines() {
            self.sink.log(line);
        }

        if let Err(e) = self.mark_package(tree) {
            self.sink.error(&format!("Could not mark package {} as environment specific: {e}", self.package.id()));
        }

        tree.commit()?;
        self.sink.log("Saved session.");
        Ok(stats)
    }

    fn mark_package(&self, tree: &mut dyn ContentTree) -> Result<()> {
        let properties = &self.package.properties;
        let key = package_key(&properties.group, &properties.name);
        tree.create_node(PACKAGE_ROOT_PATH, NodeKind::Folder)?;
        tree.set_property(PACKAGE_ROOT_PATH, &key, Property::string(properties.id()))?;
        debug!("Set {PACKAGE_ROOT_PATH}@{key}");
        Ok(())
    }
}
