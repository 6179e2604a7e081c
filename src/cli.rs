//! Command-line interface implementation for envstamp.
//! Provides argument parsing and help text formatting using clap.

use clap::{error::ErrorKind, CommandFactory, Parser};
use std::path::PathBuf;

/// Command-line arguments structure for envstamp.
#[derive(Parser, Debug)]
#[command(author, version, about = "envstamp: stamps environment specific values into content packages", long_about = None)]
pub struct Args {
    /// Package directory containing envstamp.json|yml|yaml and jcr_root/
    #[arg(value_name = "PACKAGE_DIR")]
    pub package_dir: PathBuf,

    /// Repository document the package is installed into; created if missing
    #[arg(value_name = "REPOSITORY_FILE")]
    pub repository: PathBuf,

    /// Process configuration property, may be repeated
    #[arg(short = 'D', long = "define", value_name = "KEY=VALUE")]
    pub define: Vec<String>,

    /// Properties file with process configuration properties
    #[arg(short, long, value_name = "FILE")]
    pub properties: Option<PathBuf>,

    /// Only check that every required variable can be resolved
    #[arg(long)]
    pub check: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,
}

/// Parses command line arguments and returns the Args structure.
///
/// # Exits
/// * With status code 1 if required arguments are missing
/// * With clap's default error handling for other argument errors
pub fn get_args() -> Args {
    match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            if e.kind() == ErrorKind::MissingRequiredArgument {
                if let Err(help_error) = Args::command()
                    .help_template(
                        r#"{about-section}
{usage-heading} {usage}

{all-args}
{after-help}
"#,
                    )
                    .print_help()
                {
                    eprintln!("{help_error}");
                }
                std::process::exit(1);
            } else {
                e.exit();
            }
        }
    }
}
