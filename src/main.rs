//! envstamp's main application entry point.
//! Installs a package into a repository document, running the install hook
//! phases around the import.

use envstamp::{
    archive::{import_archive, DirArchive},
    cli::{get_args, Args},
    config::{load_package, load_process_properties},
    error::{default_error_handler, Result},
    hooks::RunContext,
    logger::{init_logger, LogSink},
    source::remote::HttpLoader,
    tree::MemoryTree,
};

/// Main application entry point.
fn main() {
    let args = get_args();
    init_logger(args.verbose);

    if let Err(err) = run(args) {
        default_error_handler(err);
    }
}

/// Main application logic execution.
///
/// # Flow
/// 1. Loads the package and the process configuration properties
/// 2. Prepare phase: builds the sources, optionally validates the package
/// 3. Imports the package content into the repository
/// 4. Installed phase: applies variables and saves the repository
fn run(args: Args) -> Result<()> {
    let package = load_package(&args.package_dir)?;
    let properties = load_process_properties(args.properties.as_deref(), &args.define)?;
    let mut tree = MemoryTree::open(&args.repository)?;
    let archive = DirArchive::new(&package.root);
    let loader = HttpLoader::new();
    let sink = LogSink;

    let context = RunContext::prepare(&package, &properties, &tree, &archive, &loader, &sink)?;

    if args.check {
        let report = context.ensure_checked(&archive)?;
        println!(
            "All required variables of package {} can be resolved ({} entries checked).",
            package.id(),
            report.checked
        );
        return Ok(());
    }

    import_archive(&archive, &mut tree, &package.filter, &sink)?;
    let stats = context.installed(&mut tree)?;

    println!(
        "Package {} installed into {} ({} variables replaced).",
        package.id(),
        args.repository.display(),
        stats.total_replaced()
    );
    Ok(())
}
