//! Error handling for envstamp.
//! Defines the crate-wide error type and the result alias used by every module.

use std::io;
use thiserror::Error;

use crate::preflight::MissingVariable;

/// Error types for envstamp operations.
///
/// Only `MissingVariables` aborts an installation on purpose; the other
/// variants surface failures of the host collaborators (file system,
/// repository document, remote transport).
#[derive(Error, Debug)]
pub enum Error {
    /// Represents errors that occur during file system operations
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    /// Represents failures while reading or writing JSON documents
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Represents failures while reading YAML documents
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Represents errors in package or process configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A node or property path is absent in the content tree
    #[error("Path {path} could not be found")]
    PathNotFound { path: String },

    /// A path that is not absolute or contains empty segments
    #[error("Invalid path: '{path}'")]
    InvalidPath { path: String },

    /// A file operation was requested on a node that carries no body
    #[error("Node {path} is not a file")]
    NotAFile { path: String },

    /// Represents errors while compiling workspace filter rules
    #[error("Filter error: {0}")]
    FilterError(String),

    /// Represents failures of a remote variable source
    #[error("Remote source error: {0}")]
    RemoteError(String),

    /// Transport failures of the HTTP remote loader
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Preflight found placeholders without default that no source resolves
    #[error("Aborting installation of package {package} due to missing env variables")]
    MissingVariables {
        package: String,
        failures: Vec<MissingVariable>,
    },
}

/// Convenience type alias for Results with envstamp's Error as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Default error handler that prints the error and exits the program.
///
/// Every collected preflight failure is printed, not just the first.
pub fn default_error_handler(err: Error) {
    eprintln!("{err}");
    if let Error::MissingVariables { failures, .. } = &err {
        for failure in failures {
            eprintln!("  {failure}");
        }
    }
    std::process::exit(1);
}
