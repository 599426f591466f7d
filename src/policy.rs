//! Candidate-version selection and pin priorities.
//!
//! Every component that needs "the" version of a package (state tracking,
//! provides candidacy, the upgradable filter) goes through [`Policy`], so the
//! selection rules live in exactly one place: highest pin weight wins,
//! comparator order breaks ties, negative pins are never candidates.

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::cache::{Cache, PackageId, VersionId, VersionView};
use crate::error::Error;

/// Default weight for versions present in a downloadable index.
pub const PRIORITY_ARCHIVE: i32 = 500;
/// Default weight for versions known only from the status file.
pub const PRIORITY_STATUS: i32 = 100;

/// One pin preference: applies to every version of `package`, or to the
/// exact version string when `version` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pin {
    pub package: String,
    #[serde(default)]
    pub version: Option<String>,
    pub priority: i32,
}

impl Pin {
    pub fn package(name: impl Into<String>, priority: i32) -> Self {
        Self {
            package: name.into(),
            version: None,
            priority,
        }
    }

    pub fn version(name: impl Into<String>, version: impl Into<String>, priority: i32) -> Self {
        Self {
            package: name.into(),
            version: Some(version.into()),
            priority,
        }
    }

    fn matches(&self, package: &str, version: &str) -> bool {
        self.package == package
            && self
                .version
                .as_ref()
                .is_none_or(|pinned| pinned == version)
    }

    /// Load a pin table from its JSON representation. Order is preserved;
    /// the first matching pin wins.
    pub fn table_from_json(text: &str) -> anyhow::Result<Vec<Pin>> {
        serde_json::from_str(text).context("malformed pin table")
    }
}

/// The policy layer for one cache.
pub struct Policy<'c> {
    cache: &'c Cache,
    pins: Vec<Pin>,
}

impl<'c> Policy<'c> {
    /// Policy with default archive/status weights and no explicit pins.
    pub fn new(cache: &'c Cache) -> Self {
        Self {
            cache,
            pins: Vec::new(),
        }
    }

    pub fn with_pins(cache: &'c Cache, pins: Vec<Pin>) -> Self {
        Self { cache, pins }
    }

    /// The pin weight of one version. The first matching explicit pin wins;
    /// otherwise the archive/status default applies.
    pub fn priority(&self, version: VersionId) -> Result<i32, Error> {
        self.cache.version_record(version)?;
        Ok(self.priority_of_index(version.id()))
    }

    fn priority_of_index(&self, version_index: u32) -> i32 {
        let record = &self.cache.versions[version_index as usize];
        let package = &self.cache.packages[record.package as usize].name;

        for pin in &self.pins {
            if pin.matches(package, &record.version) {
                return pin.priority;
            }
        }

        let downloadable = record
            .files
            .iter()
            .any(|occurrence| self.cache.files[occurrence.file as usize].downloadable);
        if downloadable {
            PRIORITY_ARCHIVE
        } else {
            PRIORITY_STATUS
        }
    }

    /// The version's Priority field text (required/important/standard/...).
    pub fn priority_label(&self, version: VersionId) -> Result<&'c str, Error> {
        Ok(&self.cache.version_record(version)?.priority)
    }

    /// The preferred version of one package: highest pin weight, comparator
    /// order as tie-break, never a version outside the package's own list.
    pub fn candidate(&self, pkg: PackageId) -> Result<Option<VersionView<'c>>, Error> {
        self.cache.package_record(pkg)?;
        match self.candidate_index(pkg.id()) {
            Some(index) => {
                let id = VersionId {
                    tag: pkg.tag,
                    index,
                };
                Ok(Some(self.cache.version(id)?))
            }
            None => Ok(None),
        }
    }

    pub(crate) fn candidate_index(&self, package_index: u32) -> Option<u32> {
        let record = &self.cache.packages[package_index as usize];
        let mut best: Option<(u32, i32)> = None;

        for &version_index in &record.versions {
            let version = &self.cache.versions[version_index as usize];
            let priority = self.priority_of_index(version_index);
            if priority < 0 {
                continue;
            }

            best = match best {
                None => Some((version_index, priority)),
                Some((current_index, current_priority)) => {
                    let current = &self.cache.versions[current_index as usize];
                    let better = priority > current_priority
                        || (priority == current_priority
                            && self
                                .cache
                                .compare_versions(&version.version, &current.version)
                                .is_gt());
                    if better {
                        Some((version_index, priority))
                    } else {
                        Some((current_index, current_priority))
                    }
                }
            };
        }
        best.map(|(index, _)| index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheBuilder, Environment};
    use crate::index::{FileMetadata, RawRecord};

    fn cache_with_versions(versions: &[&str]) -> Cache {
        let mut builder = CacheBuilder::new(Environment::default());
        let file = builder.add_file(FileMetadata {
            filename: "Packages".into(),
            ..Default::default()
        });
        for version in versions {
            builder
                .add_record(
                    file,
                    RawRecord {
                        name: "foo".into(),
                        arch: "amd64".into(),
                        version: (*version).into(),
                        priority: "optional".into(),
                        ..Default::default()
                    },
                )
                .unwrap();
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_candidate_is_highest_by_comparator_on_equal_pins() {
        let cache = cache_with_versions(&["1.0", "2.0", "1.5"]);
        let policy = Policy::new(&cache);
        let pkg = cache.find("foo").unwrap();

        let candidate = policy.candidate(pkg.id()).unwrap().unwrap();
        assert_eq!(candidate.version(), "2.0");
    }

    #[test]
    fn test_pin_outweighs_comparator_order() {
        let cache = cache_with_versions(&["1.0", "2.0"]);
        let policy = Policy::with_pins(&cache, vec![Pin::version("foo", "1.0", 1001)]);
        let pkg = cache.find("foo").unwrap();

        let candidate = policy.candidate(pkg.id()).unwrap().unwrap();
        assert_eq!(candidate.version(), "1.0");
    }

    #[test]
    fn test_negative_pin_is_never_candidate() {
        let cache = cache_with_versions(&["1.0", "2.0"]);
        let policy = Policy::with_pins(&cache, vec![Pin::version("foo", "2.0", -1)]);
        let pkg = cache.find("foo").unwrap();

        let candidate = policy.candidate(pkg.id()).unwrap().unwrap();
        assert_eq!(candidate.version(), "1.0");
    }

    #[test]
    fn test_all_versions_pinned_out_yields_no_candidate() {
        let cache = cache_with_versions(&["1.0"]);
        let policy = Policy::with_pins(&cache, vec![Pin::package("foo", -1)]);
        let pkg = cache.find("foo").unwrap();

        assert!(policy.candidate(pkg.id()).unwrap().is_none());
    }

    #[test]
    fn test_virtual_package_has_no_candidate() {
        let mut builder = CacheBuilder::new(Environment::default());
        let file = builder.add_file(FileMetadata {
            filename: "Packages".into(),
            ..Default::default()
        });
        let mut provider = RawRecord {
            name: "real".into(),
            arch: "amd64".into(),
            version: "1.0".into(),
            ..Default::default()
        };
        provider.provides = "ghost".into();
        builder.add_record(file, provider).unwrap();
        let cache = builder.build().unwrap();

        let policy = Policy::new(&cache);
        let ghost = cache.find("ghost").unwrap();
        assert!(policy.candidate(ghost.id()).unwrap().is_none());
    }

    #[test]
    fn test_default_priorities_and_label() {
        let cache = cache_with_versions(&["1.0"]);
        let policy = Policy::new(&cache);
        let version = cache.find("foo").unwrap().versions().next().unwrap();

        assert_eq!(policy.priority(version.id()).unwrap(), PRIORITY_ARCHIVE);
        assert_eq!(policy.priority_label(version.id()).unwrap(), "optional");
    }

    #[test]
    fn test_status_only_version_gets_status_priority() {
        let mut builder = CacheBuilder::new(Environment::default());
        let status = builder.add_file(FileMetadata {
            filename: "status".into(),
            index_type: "Debian dpkg status file".into(),
            downloadable: false,
            ..Default::default()
        });
        builder
            .add_record(
                status,
                RawRecord {
                    name: "local-only".into(),
                    arch: "amd64".into(),
                    version: "0.1".into(),
                    ..Default::default()
                },
            )
            .unwrap();
        let cache = builder.build().unwrap();

        let policy = Policy::new(&cache);
        let version = cache.find("local-only").unwrap().versions().next().unwrap();
        assert_eq!(policy.priority(version.id()).unwrap(), PRIORITY_STATUS);
    }

    #[test]
    fn test_pin_table_from_json() {
        let pins = Pin::table_from_json(
            r#"[{"package": "foo", "version": "1.0", "priority": 1001},
                {"package": "bar", "priority": -1}]"#,
        )
        .unwrap();
        assert_eq!(pins.len(), 2);
        assert_eq!(pins[0].version.as_deref(), Some("1.0"));
        assert_eq!(pins[1].version, None);
        assert_eq!(pins[1].priority, -1);

        assert!(Pin::table_from_json("not json").is_err());
    }

    #[test]
    fn test_foreign_handle_rejected() {
        let cache = cache_with_versions(&["1.0"]);
        let other = cache_with_versions(&["1.0"]);
        let policy = Policy::new(&cache);
        let foreign = other.find("foo").unwrap().id();

        assert!(matches!(
            policy.candidate(foreign),
            Err(Error::InvalidHandle { .. })
        ));
    }
}
