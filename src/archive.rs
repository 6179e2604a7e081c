//! Read-only view of a package's content before installation, and its
//! import into the content tree.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use walkdir::WalkDir;

use crate::constants::{ARCHIVE_ROOT, CONTENT_PROPERTIES_FILE};
use crate::error::{Error, Result};
use crate::filter::WorkspaceFilter;
use crate::logger::DiagnosticSink;
use crate::tree::{join_path, parse_content_properties, split_path, ContentTree, NodeKind};

/// An archive entry. Paths are absolute within the archive, e.g.
/// `/jcr_root/apps/site/config.TEMPLATE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub path: String,
    pub is_directory: bool,
}

pub trait Archive {
    fn root(&self) -> Entry;

    /// Child entries of a directory, sorted by name.
    fn children(&self, entry: &Entry) -> Result<Vec<Entry>>;

    fn read(&self, entry: &Entry) -> Result<Vec<u8>>;
}

/// An unpacked package directory.
#[derive(Debug, Clone)]
pub struct DirArchive {
    base: PathBuf,
}

impl DirArchive {
    pub fn new<P: AsRef<Path>>(base: P) -> Self {
        Self {
            base: base.as_ref().to_path_buf(),
        }
    }

    fn fs_path(&self, entry: &Entry) -> PathBuf {
        self.base.join(entry.path.trim_start_matches('/'))
    }
}

impl Archive for DirArchive {
    fn root(&self) -> Entry {
        Entry {
            name: String::new(),
            path: "/".to_string(),
            is_directory: true,
        }
    }

    fn children(&self, entry: &Entry) -> Result<Vec<Entry>> {
        let mut children = Vec::new();
        for dir_entry in WalkDir::new(self.fs_path(entry))
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let dir_entry = dir_entry.map_err(|e| Error::IoError(e.into()))?;
            let name = dir_entry.file_name().to_string_lossy().to_string();
            children.push(Entry {
                path: join_path(&entry.path, &name),
                name,
                is_directory: dir_entry.file_type().is_dir(),
            });
        }
        Ok(children)
    }

    fn read(&self, entry: &Entry) -> Result<Vec<u8>> {
        Ok(fs::read(self.fs_path(entry))?)
    }
}

/// Maps an archive path below the content root to its repository path.
pub fn repository_path(archive_path: &str) -> Option<String> {
    let root = format!("/{ARCHIVE_ROOT}");
    let rest = archive_path.strip_prefix(&root)?;
    if rest.is_empty() {
        Some("/".to_string())
    } else if rest.starts_with('/') {
        Some(rest.to_string())
    } else {
        None
    }
}

/// Imports the filter-covered content of the archive into the tree.
///
/// Directories become container nodes carrying the properties of their
/// `.content.json`, other files become file nodes. Existing nodes are kept
/// and their properties and bodies overwritten. Returns the number of
/// imported nodes.
pub fn import_archive(
    archive: &dyn Archive,
    tree: &mut dyn ContentTree,
    filter: &WorkspaceFilter,
    sink: &dyn DiagnosticSink,
) -> Result<usize> {
    let content_root = archive
        .children(&archive.root())?
        .into_iter()
        .find(|entry| entry.is_directory && entry.name == ARCHIVE_ROOT);
    let Some(content_root) = content_root else {
        sink.log(&format!("Package has no {ARCHIVE_ROOT} directory, nothing to import"));
        return Ok(0);
    };

    let mut imported = 0;
    let mut stack = vec![content_root];
    while let Some(entry) = stack.pop() {
        let Some(path) = repository_path(&entry.path) else {
            continue;
        };

        if entry.is_directory {
            let children = archive.children(&entry)?;
            if path != "/" && filter.covers(&path) {
                let properties = match children.iter().find(|c| c.name == CONTENT_PROPERTIES_FILE) {
                    Some(content) => {
                        let text = String::from_utf8_lossy(&archive.read(content)?).to_string();
                        Some(parse_content_properties(&text)?)
                    }
                    None => None,
                };
                let kind = if properties.is_some() {
                    NodeKind::Unstructured
                } else {
                    NodeKind::Folder
                };
                tree.create_node(&path, kind)?;
                for (name, property) in properties.into_iter().flatten() {
                    tree.set_property(&path, &name, property)?;
                }
                debug!("Imported {path}");
                imported += 1;
            }
            stack.extend(
                children
                    .into_iter()
                    .filter(|c| c.name != CONTENT_PROPERTIES_FILE)
                    .rev(),
            );
        } else if filter.covers(&path) {
            let Some((parent, _)) = split_path(&path) else {
                continue;
            };
            tree.create_node(parent, NodeKind::Folder)?;
            tree.put_file(parent, &entry.name, archive.read(&entry)?)?;
            debug!("Imported file {path}");
            imported += 1;
        }
    }

    sink.log(&format!("Imported {imported} nodes"));
    Ok(imported)
}
