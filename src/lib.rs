//! envstamp stamps environment specific values into content packages.
//! It resolves `${name}` and `${name:default}` placeholders in the content
//! tree of a package against an ordered chain of variable sources, and
//! promotes `.TEMPLATE` nodes to their real names on installation.

/// Package content before installation and its import into the repository
pub mod archive;

/// Command-line interface module for the envstamp application
pub mod cli;

/// Package and process configuration
/// Supports JSON and YAML formats (envstamp.json, envstamp.yml, envstamp.yaml)
pub mod config;

pub mod constants;

/// Error types and handling for the envstamp application
pub mod error;

/// Workspace filter deciding which repository paths a package owns
pub mod filter;

/// Install hook phases: prepare (before import) and installed (after import)
pub mod hooks;

pub mod logger;

/// Placeholder substitution and replacement statistics
pub mod merger;

/// Placeholder scanning
pub mod parser;

/// Validation of required variables before anything is mutated
pub mod preflight;

/// Variable application and template promotion on the live tree
pub mod processor;

/// Variable sources and the ordered source chain
pub mod source;

/// Content tree abstraction and the in-memory repository
pub mod tree;
