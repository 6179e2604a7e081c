//! Common constants used throughout envstamp.

/// Supported package properties file names
pub const CONFIG_FILES: [&str; 3] = ["envstamp.json", "envstamp.yml", "envstamp.yaml"];

/// Marks a node or file that is promoted to its de-suffixed name on install
pub const TEMPLATE_SUFFIX: &str = ".TEMPLATE";

/// Directory of a package that holds the content to be imported
pub const ARCHIVE_ROOT: &str = "jcr_root";

/// Per-directory file carrying the typed properties of the directory node
pub const CONTENT_PROPERTIES_FILE: &str = ".content.json";

/// Registry node that records environment-sensitive packages
pub const PACKAGE_ROOT_PATH: &str = "/etc/packages";

/// Prefix of the registry key written for an environment-sensitive package
pub const PACKAGE_PROP_PREFIX: &str = "envSpecificPackage_";

/// Sources used when a package does not configure any
pub const DEFAULT_SOURCES: [&str; 3] = ["SystemProperties", "JCR", "OsEnvVars"];
