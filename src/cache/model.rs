//! Arena records and opaque handles.
//!
//! Everything the cache owns lives in contiguous arenas; cross-references are
//! small indices, never pointers. Public handles additionally carry the tag
//! of the cache that minted them so a handle from a released or different
//! cache is rejected instead of silently indexing unrelated data.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

use crate::index::DependencyClause;

static NEXT_CACHE_TAG: AtomicU32 = AtomicU32::new(1);

/// Mint a process-unique tag for one built cache.
pub(crate) fn next_cache_tag() -> u32 {
    NEXT_CACHE_TAG.fetch_add(1, Ordering::Relaxed)
}

macro_rules! handle {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name {
            pub(crate) tag: u32,
            pub(crate) index: u32,
        }

        impl $name {
            /// Numeric identifier within the cache (build order).
            pub fn id(&self) -> u32 {
                self.index
            }
        }
    };
}

handle!(
    /// Opaque handle to a package in one built cache.
    PackageId
);
handle!(
    /// Opaque handle to a version in one built cache.
    VersionId
);
handle!(
    /// Opaque handle to a repository index file in one built cache.
    FileId
);

/// dpkg installation state of a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CurrentState {
    #[default]
    NotInstalled,
    UnPacked,
    HalfConfigured,
    HalfInstalled,
    ConfigFiles,
    Installed,
    TriggersAwaited,
    TriggersPending,
}

/// dpkg installer flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InstState {
    #[default]
    Ok,
    ReInstReq,
    Hold,
    HoldReInstReq,
}

/// dpkg selection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SelectedState {
    #[default]
    Unknown,
    Install,
    Hold,
    DeInstall,
    Purge,
}

/// One interned package: identity is (name, arch).
#[derive(Debug)]
pub(crate) struct PackageRecord {
    pub name: String,
    pub arch: String,
    pub essential: bool,
    pub current_state: CurrentState,
    pub inst_state: InstState,
    pub selected_state: SelectedState,
    /// Version arena indices, in parse order.
    pub versions: Vec<u32>,
    /// Currently installed version, if any.
    pub current_version: Option<u32>,
    /// Provides arena indices where this package is the provided name.
    pub provided_by: Vec<u32>,
}

/// One `(file, offset)` occurrence of a version in a repository index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileOccurrence {
    pub(crate) file: u32,
    pub offset: u64,
}

/// One interned version: identity is (package, version string, arch).
#[derive(Debug)]
pub(crate) struct VersionRecord {
    pub package: u32,
    pub version: String,
    pub arch: String,
    pub size: u64,
    pub installed_size: u64,
    pub section: String,
    pub priority: String,
    pub source_name: String,
    pub source_version: String,
    pub depends: Vec<DependencyClause>,
    /// Provides arena indices where this version is the provider.
    pub provides: Vec<u32>,
    /// One entry per index file listing this version, in encounter order.
    pub files: Vec<FileOccurrence>,
    /// Translated description location, when an index carried one.
    pub description: Option<FileOccurrence>,
}

/// Provides relation: `versions[version]` provides the name `packages[package]`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ProvidesRecord {
    pub package: u32,
    pub version: u32,
}

/// One repository index file, referenced (never owned) by version occurrences.
#[derive(Debug)]
pub(crate) struct FileRecord {
    pub filename: String,
    pub archive: String,
    pub origin: String,
    pub codename: String,
    pub label: String,
    pub site: String,
    pub component: String,
    pub arch: String,
    pub index_type: String,
    pub downloadable: bool,
    /// Trust verdict, resolved once through the index collaborator and
    /// cached. Safe against concurrent first access.
    pub trusted: OnceLock<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_tags_are_unique() {
        let a = next_cache_tag();
        let b = next_cache_tag();
        assert_ne!(a, b);
    }

    #[test]
    fn test_handles_compare_by_tag_and_index() {
        let a = PackageId { tag: 1, index: 4 };
        let b = PackageId { tag: 1, index: 4 };
        let c = PackageId { tag: 2, index: 4 };
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.id(), 4);
    }
}
