//! Cache construction.
//!
//! [`CacheBuilder`] is the identity registry: it interns packages, versions,
//! and files so the same identity seen from several index files resolves to
//! one record. The build is atomic — parse problems accumulate and are
//! reported together, and a cache is only handed out when none of them is
//! fatal.

use std::collections::HashMap;

use crate::acquire::SourceList;
use crate::compare::{SegmentCompare, VersionCompare};
use crate::error::{Error, ErrorStack};
use crate::index::{FileMetadata, RawRecord, parse_provides, parse_relations};

use super::model::{
    self, CurrentState, FileId, FileRecord, FileOccurrence, PackageId, PackageRecord,
    ProvidesRecord, SelectedState, VersionRecord,
};
use super::Cache;

/// Explicit session environment for one cache build: comparator choice,
/// native architecture, and the configured source list. Replaces any ambient
/// process-wide configuration.
pub struct Environment {
    pub comparator: Box<dyn VersionCompare>,
    /// Native architecture, used for bare-name lookup preference and pretty
    /// full names.
    pub arch: String,
    pub sources: SourceList,
}

impl Environment {
    pub fn new(comparator: Box<dyn VersionCompare>, arch: impl Into<String>) -> Self {
        Self {
            comparator,
            arch: arch.into(),
            sources: SourceList::default(),
        }
    }

    pub fn with_sources(mut self, sources: SourceList) -> Self {
        self.sources = sources;
        self
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new(Box::new(SegmentCompare), "amd64")
    }
}

/// Builder for one immutable [`Cache`].
pub struct CacheBuilder {
    env: Environment,
    tag: u32,
    packages: Vec<PackageRecord>,
    versions: Vec<VersionRecord>,
    files: Vec<FileRecord>,
    provides: Vec<ProvidesRecord>,
    by_name: HashMap<(String, String), u32>,
    issues: ErrorStack,
}

impl CacheBuilder {
    pub fn new(env: Environment) -> Self {
        Self {
            env,
            tag: model::next_cache_tag(),
            packages: Vec::new(),
            versions: Vec::new(),
            files: Vec::new(),
            provides: Vec::new(),
            by_name: HashMap::new(),
            issues: ErrorStack::new(),
        }
    }

    /// Register one repository index file. Every record added against the
    /// returned handle is tagged with an occurrence in this file.
    pub fn add_file(&mut self, meta: FileMetadata) -> FileId {
        let index = self.files.len() as u32;
        self.files.push(FileRecord {
            filename: meta.filename,
            archive: meta.archive,
            origin: meta.origin,
            codename: meta.codename,
            label: meta.label,
            site: meta.site,
            component: meta.component,
            arch: meta.arch,
            index_type: meta.index_type,
            downloadable: meta.downloadable,
            trusted: std::sync::OnceLock::new(),
        });
        FileId {
            tag: self.tag,
            index,
        }
    }

    /// Intern a (name, architecture) package identity. Idempotent: the same
    /// identity always yields an equal handle.
    pub fn intern_package(&mut self, name: &str, arch: &str) -> PackageId {
        let index = self.intern_package_index(name, arch);
        PackageId {
            tag: self.tag,
            index,
        }
    }

    fn intern_package_index(&mut self, name: &str, arch: &str) -> u32 {
        let key = (name.to_string(), arch.to_string());
        if let Some(&index) = self.by_name.get(&key) {
            return index;
        }

        let index = self.packages.len() as u32;
        self.packages.push(PackageRecord {
            name: name.to_string(),
            arch: arch.to_string(),
            essential: false,
            current_state: CurrentState::default(),
            inst_state: Default::default(),
            selected_state: SelectedState::default(),
            versions: Vec::new(),
            current_version: None,
            provided_by: Vec::new(),
        });
        self.by_name.insert(key, index);
        index
    }

    /// Add one raw record from the given index file.
    ///
    /// Interns the package and version; a version string already known for
    /// the package gains a new file occurrence instead of a duplicate entry.
    /// Malformed relation fields accumulate as build issues and do not abort
    /// the record.
    pub fn add_record(&mut self, file: FileId, raw: RawRecord) -> Result<(), Error> {
        if file.tag != self.tag || file.index as usize >= self.files.len() {
            return Err(Error::invalid_handle("file"));
        }

        if raw.name.is_empty() || raw.version.is_empty() {
            self.issues.error(format!(
                "record {} is missing a package name or version",
                raw.identity()
            ));
            return Ok(());
        }

        let package = self.intern_package_index(&raw.name, &raw.arch);
        if raw.essential {
            self.packages[package as usize].essential = true;
        }

        let occurrence = FileOccurrence {
            file: file.index,
            offset: raw.offset,
        };
        let description = raw.description_offset.map(|offset| FileOccurrence {
            file: file.index,
            offset,
        });

        if let Some(existing) = self.find_version(package, &raw.version, &raw.arch) {
            let version = &mut self.versions[existing as usize];
            version.files.push(occurrence);
            if version.description.is_none() {
                version.description = description;
            }
            return Ok(());
        }

        let version_index = self.versions.len() as u32;
        let mut depends = Vec::new();
        for relation in &raw.relations {
            match parse_relations(relation.kind, &relation.line) {
                Ok(clauses) => depends.extend(clauses),
                Err(reason) => self.issues.error(format!(
                    "record {}: bad {} field: {}",
                    raw.identity(),
                    relation.kind,
                    reason
                )),
            }
        }
        // Dependency targets become (possibly virtual) packages too, so any
        // name mentioned anywhere in the index is resolvable.
        for clause in &depends {
            self.intern_package_index(&clause.target_name, &raw.arch);
        }

        self.versions.push(VersionRecord {
            package,
            version: raw.version.clone(),
            arch: raw.arch.clone(),
            size: raw.size,
            installed_size: raw.installed_size,
            section: raw.section.clone(),
            priority: raw.priority.clone(),
            source_name: if raw.source_name.is_empty() {
                raw.name.clone()
            } else {
                raw.source_name.clone()
            },
            source_version: if raw.source_version.is_empty() {
                raw.version.clone()
            } else {
                raw.source_version.clone()
            },
            depends,
            provides: Vec::new(),
            files: vec![occurrence],
            description,
        });
        self.packages[package as usize].versions.push(version_index);

        match parse_provides(&raw.provides) {
            Ok(names) => {
                for name in names {
                    self.add_provides(&name, &raw.arch, version_index);
                }
            }
            Err(reason) => self.issues.error(format!(
                "record {}: bad Provides field: {}",
                raw.identity(),
                reason
            )),
        }

        Ok(())
    }

    /// Distinguish a version as the package's currently installed one,
    /// mirroring the dpkg status information.
    pub fn mark_installed(&mut self, name: &str, arch: &str, version: &str) {
        let Some(&package) = self.by_name.get(&(name.to_string(), arch.to_string())) else {
            self.issues.error(format!(
                "cannot mark {}:{} {} installed: package not in any index",
                name, arch, version
            ));
            return;
        };

        match self.find_version(package, version, arch) {
            Some(index) => {
                let record = &mut self.packages[package as usize];
                record.current_version = Some(index);
                record.current_state = CurrentState::Installed;
                record.selected_state = SelectedState::Install;
            }
            None => self.issues.error(format!(
                "cannot mark {}:{} {} installed: version not in any index",
                name, arch, version
            )),
        }
    }

    /// Finish the build. Atomic: any Error-severity issue fails the whole
    /// attempt with the full accumulated stack; warnings survive on the
    /// cache and are logged.
    pub fn build(mut self) -> Result<Cache, ErrorStack> {
        if self.issues.is_fatal() {
            return Err(self.issues);
        }

        let warnings = self.issues.take_warnings();
        for warning in &warnings {
            log::warn!("cache build: {}", warning.message);
        }
        log::debug!(
            "built cache: {} packages, {} versions, {} files",
            self.packages.len(),
            self.versions.len(),
            self.files.len()
        );

        Ok(Cache {
            tag: self.tag,
            comparator: self.env.comparator,
            native_arch: self.env.arch,
            sources: self.env.sources,
            packages: self.packages,
            versions: self.versions,
            files: self.files,
            provides: self.provides,
            by_name: self.by_name,
            warnings,
        })
    }

    fn find_version(&self, package: u32, version: &str, arch: &str) -> Option<u32> {
        self.packages[package as usize]
            .versions
            .iter()
            .copied()
            .find(|&index| {
                let record = &self.versions[index as usize];
                record.version == version && record.arch == arch
            })
    }

    fn add_provides(&mut self, name: &str, arch: &str, version_index: u32) {
        let provided = self.intern_package_index(name, arch);
        let provides_index = self.provides.len() as u32;
        self.provides.push(ProvidesRecord {
            package: provided,
            version: version_index,
        });
        self.packages[provided as usize].provided_by.push(provides_index);
        self.versions[version_index as usize]
            .provides
            .push(provides_index);
    }
}
