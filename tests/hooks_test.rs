use std::fs;
use std::path::Path;

use envstamp::archive::{import_archive, DirArchive};
use envstamp::config::load_package;
use envstamp::error::{Error, Result};
use envstamp::hooks::RunContext;
use envstamp::logger::MemorySink;
use envstamp::source::remote::{RemoteConfig, RemoteLoader};
use envstamp::tree::{ContentTree, MemoryTree, NodeKind, Property};
use indexmap::IndexMap;
use tempfile::TempDir;

struct StaticLoader(&'static str);

impl RemoteLoader for StaticLoader {
    fn fetch(&self, _config: &RemoteConfig) -> Result<Vec<u8>> {
        Ok(self.0.as_bytes().to_vec())
    }
}

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn create_package(root: &Path, config: &str) {
    write(root, "envstamp.json", config);
    write(
        root,
        "jcr_root/apps/site/config.TEMPLATE/.content.json",
        r#"{"url": "http://${db.host}:${db.port:5432}/", "ttl": 30}"#,
    );
    write(root, "jcr_root/apps/site/app.conf.TEMPLATE", "host=${db.host}\nuser=${db.user:admin}\n");
    write(root, "jcr_root/apps/site/page/.content.json", r#"{"title": "${site.title}"}"#);
}

fn properties(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

#[test_log::test]
fn test_install_package() {
    let temp_dir = TempDir::new().unwrap();
    let package_dir = temp_dir.path().join("package");
    create_package(
        &package_dir,
        r#"{
            "group": "acme",
            "name": "site-config",
            "version": "1.0.0",
            "applySystemEnvSources": "SystemProperties, JCR",
            "applySystemEnvForPaths": "/apps/site/page@title",
            "failForMissingEnvVars": true,
            "filter": [{"root": "/apps/site"}]
        }"#,
    );
    let repository = temp_dir.path().join("repo.json");
    let mut tree = MemoryTree::open(&repository).unwrap();
    tree.create_node("/etc/system-env", NodeKind::Unstructured).unwrap();
    tree.set_property("/etc/system-env", "db.host", Property::string("jcr-host")).unwrap();
    tree.set_property("/etc/system-env", "site.title", Property::string("Acme")).unwrap();

    let package = load_package(&package_dir).unwrap();
    let archive = DirArchive::new(&package.root);
    let properties = properties(&[("db.host", "prop-host")]);
    let sink = MemorySink::new();

    let context =
        RunContext::prepare(&package, &properties, &tree, &archive, &StaticLoader(""), &sink).unwrap();
    import_archive(&archive, &mut tree, &package.filter, &sink).unwrap();
    let stats = context.installed(&mut tree).unwrap();

    assert_eq!(
        tree.property("/apps/site/config", "url").unwrap(),
        Property::string("http://prop-host:5432/")
    );
    assert_eq!(tree.property("/apps/site/config", "ttl").unwrap().single_value(), Some("30"));
    assert_eq!(
        tree.read_file("/apps/site/app.conf").unwrap(),
        b"host=prop-host\nuser=admin\n"
    );
    assert_eq!(tree.property("/apps/site/page", "title").unwrap(), Property::string("Acme"));
    assert_eq!(
        tree.property("/etc/packages", "envSpecificPackage_acme_siteconfig").unwrap(),
        Property::string("acme:site-config:1.0.0")
    );

    assert_eq!(stats.count("SystemProperties"), 2);
    assert_eq!(stats.count("JCR /etc/system-env"), 1);
    assert_eq!(stats.total_replaced(), 5);
    assert!(sink.contains("Using sources [SystemProperties, JCR /etc/system-env]"));
    assert!(sink.contains("Replacement count for 'SystemProperties': 2"));
    assert!(sink.contains("Total variables replaced: 5"));
    assert!(sink.contains("Saved session."));

    let saved = MemoryTree::open(&repository).unwrap();
    assert_eq!(saved.read_file("/apps/site/app.conf").unwrap(), b"host=prop-host\nuser=admin\n");
}

#[test]
fn test_missing_variables_abort_before_import() {
    let temp_dir = TempDir::new().unwrap();
    create_package(
        temp_dir.path(),
        r#"{
            "group": "acme",
            "name": "site-config",
            "version": "1.0.0",
            "applySystemEnvSources": "SystemProperties",
            "failForMissingEnvVars": "true",
            "filter": [{"root": "/apps/site"}]
        }"#,
    );
    let tree = MemoryTree::new();
    let package = load_package(temp_dir.path()).unwrap();
    let archive = DirArchive::new(&package.root);
    let sink = MemorySink::new();

    let result = RunContext::prepare(&package, &IndexMap::new(), &tree, &archive, &StaticLoader(""), &sink);

    match result {
        Err(Error::MissingVariables { package, failures }) => {
            assert_eq!(package, "acme:site-config:1.0.0");
            let names: Vec<&str> = failures.iter().map(|f| f.name.as_str()).collect();
            assert_eq!(names, vec!["db.host", "db.host"]);
        }
        Err(e) => panic!("Expected MissingVariables, got {e}"),
        Ok(_) => panic!("Expected MissingVariables"),
    }
}

#[test]
fn test_unflagged_package_is_not_checked() {
    let temp_dir = TempDir::new().unwrap();
    create_package(
        temp_dir.path(),
        r#"{"name": "site", "applySystemEnvSources": "SystemProperties", "filter": [{"root": "/apps/site"}]}"#,
    );
    let mut tree = MemoryTree::new();
    let package = load_package(temp_dir.path()).unwrap();
    let archive = DirArchive::new(&package.root);
    let sink = MemorySink::new();

    let context =
        RunContext::prepare(&package, &IndexMap::new(), &tree, &archive, &StaticLoader(""), &sink).unwrap();
    assert!(!context.preflight(&archive).unwrap().is_ok());

    import_archive(&archive, &mut tree, &package.filter, &sink).unwrap();
    let stats = context.installed(&mut tree).unwrap();

    assert_eq!(
        tree.read_file("/apps/site/app.conf").unwrap(),
        b"host=${db.host}\nuser=admin\n"
    );
    assert!(sink.contains("WARN: No value found for variable and no default given: 2"));
    assert_eq!(stats.total_replaced(), 2);
}

#[test]
fn test_remote_source_with_override_suffix() {
    let temp_dir = TempDir::new().unwrap();
    create_package(
        temp_dir.path(),
        r#"{"name": "site", "applySystemEnvSources": "ZooKeeper, SystemProperties", "filter": [{"root": "/apps/site"}]}"#,
    );
    let mut tree = MemoryTree::new();
    let package = load_package(temp_dir.path()).unwrap();
    let archive = DirArchive::new(&package.root);
    let sink = MemorySink::new();
    let properties = properties(&[
        ("envstamp.remote.hosts", "zk:2181"),
        ("envstamp.remote.path", "/env/prod"),
        ("envstamp.remote.overrideSuffix", "blue"),
        ("db.host", "prop-host"),
    ]);
    let loader = StaticLoader("db.host=remote-host\ndb.host@blue=blue-host\n");

    let context = RunContext::prepare(&package, &properties, &tree, &archive, &loader, &sink).unwrap();
    import_archive(&archive, &mut tree, &package.filter, &sink).unwrap();
    context.installed(&mut tree).unwrap();

    assert_eq!(tree.read_file("/apps/site/app.conf").unwrap(), b"host=blue-host\nuser=admin\n");
    assert!(sink.contains("Loaded 2 properties (1 with suffix 'blue') from ZooKeeper at /env/prod"));
}

#[test]
fn test_nothing_to_do() {
    let temp_dir = TempDir::new().unwrap();
    write(temp_dir.path(), "envstamp.json", r#"{"name": "empty", "filter": [{"root": "/apps/empty"}]}"#);
    write(temp_dir.path(), "jcr_root/apps/empty/readme.txt", "${not.templated}");
    let mut tree = MemoryTree::new();
    let package = load_package(temp_dir.path()).unwrap();
    let archive = DirArchive::new(&package.root);
    let sink = MemorySink::new();

    let context =
        RunContext::prepare(&package, &IndexMap::new(), &tree, &archive, &StaticLoader(""), &sink).unwrap();
    import_archive(&archive, &mut tree, &package.filter, &sink).unwrap();
    let stats = context.installed(&mut tree).unwrap();

    assert_eq!(stats.total_replaced(), 0);
    assert!(sink.contains("No action taken."));
    assert!(!tree.node_exists("/etc/packages"));
    assert_eq!(tree.read_file("/apps/empty/readme.txt").unwrap(), b"${not.templated}");
}

#[test]
fn test_check_runs_once_per_run() {
    let temp_dir = TempDir::new().unwrap();
    create_package(
        temp_dir.path(),
        r#"{"name": "site", "applySystemEnvSources": "SystemProperties", "failForMissingEnvVars": true, "filter": [{"root": "/apps/site"}]}"#,
    );
    let tree = MemoryTree::new();
    let package = load_package(temp_dir.path()).unwrap();
    let archive = DirArchive::new(&package.root);
    let sink = MemorySink::new();
    let properties = properties(&[("db.host", "h")]);

    let context = RunContext::prepare(&package, &properties, &tree, &archive, &StaticLoader(""), &sink).unwrap();
    assert!(context.was_checked());
    let report = context.ensure_checked(&archive).unwrap();

    assert_eq!(report.checked, 2);
    let passed = sink
        .lines()
        .iter()
        .filter(|line| line.starts_with("All required variables can be resolved"))
        .count();
    assert_eq!(passed, 1);
}

#[test]
fn test_check_on_demand_for_unflagged_package() {
    let temp_dir = TempDir::new().unwrap();
    create_package(
        temp_dir.path(),
        r#"{"name": "site", "applySystemEnvSources": "SystemProperties", "filter": [{"root": "/apps/site"}]}"#,
    );
    let tree = MemoryTree::new();
    let package = load_package(temp_dir.path()).unwrap();
    let archive = DirArchive::new(&package.root);
    let sink = MemorySink::new();

    let context =
        RunContext::prepare(&package, &IndexMap::new(), &tree, &archive, &StaticLoader(""), &sink).unwrap();
    assert!(!context.was_checked());

    assert!(matches!(
        context.ensure_checked(&archive),
        Err(Error::MissingVariables { .. })
    ));
}
