//! Device pack repository
//!
//! A read-only view over an installed device pack directory. Nothing is
//! cached: every query walks the filesystem and parses the files it needs,
//! so a repository can be pointed at a fixture directory in tests and
//! always reflects what is on disk.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::atdf;
use super::types::{DeviceInfo, FuseField};

/// File name of the per-package target catalog
pub const PACKAGE_CONTENT: &str = "package.content";

/// Extension of device descriptor files
pub const DESCRIPTOR_EXTENSION: &str = "atdf";

/// Repository of device packs rooted at a directory
///
/// An invalid repository (missing, not a directory, or unreadable root)
/// answers every query with an empty result. The programming tool and its
/// bundled packs may legitimately be absent.
#[derive(Debug, Clone, Default)]
pub struct PackRepository {
    root: Option<PathBuf>,
    valid: bool,
}

impl PackRepository {
    /// Create a repository rooted at `path`
    pub fn new(path: impl AsRef<Path>) -> Self {
        let mut repo = Self::default();
        repo.set_root(path);
        repo
    }

    /// Point the repository at a new root, returning whether it is valid
    pub fn set_root(&mut self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        self.valid = path.is_dir() && fs::read_dir(path).is_ok();
        self.root = Some(path.to_path_buf());

        if !self.valid {
            log::debug!("Pack repository {} is not usable", path.display());
        }
        self.valid
    }

    /// Root directory, if one was set
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Whether the root exists, is a directory and is readable
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Root to walk, only when valid
    fn walk_root(&self) -> Option<&Path> {
        self.root.as_deref().filter(|_| self.valid)
    }

    /// Collect every target named in any `package.content` under the root
    ///
    /// Files that cannot be read or parsed contribute nothing.
    pub fn list_targets(&self) -> BTreeSet<String> {
        let mut targets = BTreeSet::new();
        let Some(root) = self.walk_root() else {
            return targets;
        };

        let catalogs = WalkDir::new(root)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry.path().is_file() && entry.file_name() == PACKAGE_CONTENT
            });

        for entry in catalogs {
            let Some(text) = atdf::read_xml(entry.path()) else {
                continue;
            };
            match atdf::parse(&text) {
                Some(doc) => targets.extend(atdf::package_targets(&doc)),
                None => log::debug!("Skipping malformed {}", entry.path().display()),
            }
        }

        log::debug!("Found {} targets under {}", targets.len(), root.display());
        targets
    }

    /// Targets containing `needle`, compared case-insensitively
    pub fn find_targets(&self, needle: &str) -> Vec<String> {
        let needle = needle.to_ascii_lowercase();
        self.list_targets()
            .into_iter()
            .filter(|t| t.to_ascii_lowercase().contains(&needle))
            .collect()
    }

    /// Locate the descriptor file `<target>.atdf` anywhere under the root
    ///
    /// If several packs ship a descriptor with the same name, the first one
    /// produced by the directory walk is returned. Walk order is whatever the
    /// filesystem yields and is not guaranteed to be stable across systems.
    pub fn target_file(&self, target: &str) -> Option<PathBuf> {
        let root = self.walk_root()?;
        if target.is_empty() {
            return None;
        }
        let file_name = format!("{}.{}", target, DESCRIPTOR_EXTENSION);

        let found = WalkDir::new(root)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .find(|entry| {
                entry.path().is_file()
                    && entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| name.eq_ignore_ascii_case(&file_name))
            })
            .map(|entry| entry.into_path());

        match &found {
            Some(path) => log::debug!("Descriptor for {}: {}", target, path.display()),
            None => log::debug!("No descriptor for {} under {}", target, root.display()),
        }
        found
    }

    /// Parse the target's descriptor and run `query` over it
    fn with_descriptor<T: Default>(
        &self,
        target: &str,
        query: impl FnOnce(&roxmltree::Document<'_>) -> T,
    ) -> T {
        let Some(path) = self.target_file(target) else {
            return T::default();
        };
        let Some(text) = atdf::read_xml(&path) else {
            return T::default();
        };
        match atdf::parse(&text) {
            Some(doc) => query(&doc),
            None => {
                log::debug!("Skipping malformed {}", path.display());
                T::default()
            }
        }
    }

    /// Address space names of `target` (e.g. "prog", "eeprom", "lockbits")
    pub fn get_memories(&self, target: &str) -> Vec<String> {
        self.with_descriptor(target, |doc| atdf::memories(doc, target))
    }

    /// Programming interfaces of `target`, in descriptor order
    pub fn get_interfaces(&self, target: &str) -> Vec<String> {
        self.with_descriptor(target, |doc| atdf::interfaces(doc, target))
    }

    /// Fuse registers of `target`, in descriptor order
    ///
    /// Targets without a `FUSE` peripheral yield an empty list.
    pub fn get_fuse_info(&self, target: &str) -> Vec<FuseField> {
        self.with_descriptor(target, |doc| atdf::fuse_fields(doc, target))
    }

    /// Memories, interfaces and fuses of `target` from one parse
    pub fn device_info(&self, target: &str) -> Option<DeviceInfo> {
        self.with_descriptor(target, |doc| atdf::device_info(doc, target))
    }
}
