use clap::Parser;
use envstamp::cli::Args;
use std::ffi::OsString;
use std::path::PathBuf;

fn make_args(args: &[&str]) -> Vec<OsString> {
    let mut res = vec![OsString::from("envstamp")];
    res.extend(args.iter().map(OsString::from));
    res
}

#[test]
fn test_basic_args() {
    let args = make_args(&["./package", "./repo.json"]);
    let parsed = Args::try_parse_from(args).unwrap();

    assert_eq!(parsed.package_dir, PathBuf::from("./package"));
    assert_eq!(parsed.repository, PathBuf::from("./repo.json"));
    assert!(parsed.define.is_empty());
    assert!(parsed.properties.is_none());
    assert!(!parsed.check);
    assert!(!parsed.verbose);
}

#[test]
fn test_all_flags() {
    let args = make_args(&[
        "--verbose",
        "--check",
        "--properties",
        "env.properties",
        "--define",
        "db.host=localhost",
        "-D",
        "db.port=5432",
        "./package",
        "./repo.json",
    ]);
    let parsed = Args::try_parse_from(args).unwrap();

    assert!(parsed.verbose);
    assert!(parsed.check);
    assert_eq!(parsed.properties, Some(PathBuf::from("env.properties")));
    assert_eq!(parsed.define, vec!["db.host=localhost", "db.port=5432"]);
}

#[test]
fn test_short_flags() {
    let args = make_args(&["-v", "-p", "env.properties", "./package", "./repo.json"]);
    let parsed = Args::try_parse_from(args).unwrap();

    assert!(parsed.verbose);
    assert_eq!(parsed.properties, Some(PathBuf::from("env.properties")));
}

#[test]
fn test_missing_repository() {
    let args = make_args(&["./package"]);
    assert!(Args::try_parse_from(args).is_err());
}
