//! The package cache graph.
//!
//! An immutable-after-build graph of Packages, Versions, Dependencies,
//! Provides relations, and index Files, with lazy traversal queries. Built
//! once through [`CacheBuilder`]; every query is read-only and restartable.
//!
//! Views (`PackageView`, `VersionView`, `FileView`) are cheap copyable
//! references into the cache arenas. Opaque handles (`PackageId`,
//! `VersionId`, `FileId`) can be stored by embedders and re-resolved; they
//! are rejected with `InvalidHandle` when presented to a different cache.

mod build;
mod model;

use std::cmp::Ordering;
use std::collections::HashMap;
use std::collections::HashSet;
use std::fmt;

use crate::acquire::{Acquire, AcquireProgress, SourceFile, SourceList};
use crate::compare::VersionCompare;
use crate::error::{Error, Issue};
use crate::index::{DepType, DependencyClause};
use crate::policy::Policy;
use crate::records::IndexResolver;

pub use build::{CacheBuilder, Environment};
pub use model::{CurrentState, FileId, FileOccurrence, InstState, PackageId, SelectedState, VersionId};

use model::{FileRecord, PackageRecord, ProvidesRecord, VersionRecord};

/// The built package cache. Exclusively owns all package, version,
/// dependency, provides, and file records for its lifetime.
pub struct Cache {
    pub(crate) tag: u32,
    pub(crate) comparator: Box<dyn VersionCompare>,
    pub(crate) native_arch: String,
    pub(crate) sources: SourceList,
    pub(crate) packages: Vec<PackageRecord>,
    pub(crate) versions: Vec<VersionRecord>,
    pub(crate) files: Vec<FileRecord>,
    pub(crate) provides: Vec<ProvidesRecord>,
    pub(crate) by_name: HashMap<(String, String), u32>,
    pub(crate) warnings: Vec<Issue>,
}

impl Cache {
    /// All interned packages, in build order.
    pub fn packages(&self) -> impl Iterator<Item = PackageView<'_>> + '_ {
        (0..self.packages.len() as u32).map(move |index| PackageView { cache: self, index })
    }

    /// Look up a package by bare name, preferring the native architecture,
    /// then `all`, then build order.
    pub fn find(&self, name: &str) -> Option<PackageView<'_>> {
        for arch in [self.native_arch.as_str(), "all"] {
            if let Some(pkg) = self.find_arch(name, arch) {
                return Some(pkg);
            }
        }
        self.packages().find(|pkg| pkg.name() == name)
    }

    /// Look up a package by exact (name, architecture) identity.
    pub fn find_arch(&self, name: &str, arch: &str) -> Option<PackageView<'_>> {
        self.by_name
            .get(&(name.to_string(), arch.to_string()))
            .map(|&index| PackageView { cache: self, index })
    }

    /// Three-way version comparison through the session comparator.
    pub fn compare_versions(&self, a: &str, b: &str) -> Ordering {
        self.comparator.compare(a, b)
    }

    /// Warnings accumulated during the build (errors would have failed it).
    pub fn warnings(&self) -> &[Issue] {
        &self.warnings
    }

    /// The source list this cache was built against.
    pub fn source_list(&self) -> &SourceList {
        &self.sources
    }

    /// The index files the acquirer would refresh for this cache.
    pub fn source_uris(&self, acquire: &dyn Acquire) -> Result<Vec<SourceFile>, Error> {
        acquire
            .fetch_indexes(&self.sources)
            .map_err(|stack| Error::Collaborator(stack.to_string()))
    }

    /// Refresh the package indexes through the acquirer, reporting progress
    /// to the sink. Failures arrive as one aggregated message.
    pub fn update(
        &self,
        acquire: &mut dyn Acquire,
        progress: &mut dyn AcquireProgress,
    ) -> Result<(), Error> {
        acquire
            .update(&self.sources, progress)
            .map_err(|stack| Error::Collaborator(stack.to_string()))
    }

    /// Packages providing the given (usually virtual) package, deduplicated
    /// by full name. With `candidates_only`, a provider counts only when the
    /// providing version is its package's policy candidate.
    pub fn providers_of(
        &self,
        pkg: PackageId,
        policy: &Policy<'_>,
        candidates_only: bool,
    ) -> Result<Vec<PackageView<'_>>, Error> {
        let record = self.package_record(pkg)?;
        let mut seen = HashSet::new();
        let mut providers = Vec::new();

        for &provides_index in &record.provided_by {
            let version_index = self.provides[provides_index as usize].version;
            let owner = self.versions[version_index as usize].package;

            if candidates_only && policy.candidate_index(owner) != Some(version_index) {
                continue;
            }

            let view = PackageView {
                cache: self,
                index: owner,
            };
            if seen.insert(view.full_name(false)) {
                providers.push(view);
            }
        }
        Ok(providers)
    }

    /// Every concrete version satisfying one dependency clause, including
    /// versions reachable through Provides. Providers satisfy only
    /// unconstrained clauses, since the provides relation is unversioned.
    pub fn resolve_all_targets(&self, clause: &DependencyClause) -> Vec<VersionView<'_>> {
        let mut targets = Vec::new();

        for record in &self.packages {
            if record.name != clause.target_name {
                continue;
            }

            for &version_index in &record.versions {
                let version = &self.versions[version_index as usize];
                let verdict = self.comparator.compare(&version.version, &clause.constraint);
                if clause.comp.matches(verdict) {
                    targets.push(VersionView {
                        cache: self,
                        index: version_index,
                    });
                }
            }

            if clause.comp == crate::index::CompOp::None {
                for &provides_index in &record.provided_by {
                    targets.push(VersionView {
                        cache: self,
                        index: self.provides[provides_index as usize].version,
                    });
                }
            }
        }
        targets
    }

    pub(crate) fn package_record(&self, id: PackageId) -> Result<&PackageRecord, Error> {
        if id.tag != self.tag || id.index as usize >= self.packages.len() {
            return Err(Error::invalid_handle("package"));
        }
        Ok(&self.packages[id.index as usize])
    }

    pub(crate) fn version_record(&self, id: VersionId) -> Result<&VersionRecord, Error> {
        if id.tag != self.tag || id.index as usize >= self.versions.len() {
            return Err(Error::invalid_handle("version"));
        }
        Ok(&self.versions[id.index as usize])
    }

    /// Re-resolve a stored package handle into a view.
    pub fn package(&self, id: PackageId) -> Result<PackageView<'_>, Error> {
        self.package_record(id)?;
        Ok(PackageView {
            cache: self,
            index: id.index,
        })
    }

    /// Re-resolve a stored version handle into a view.
    pub fn version(&self, id: VersionId) -> Result<VersionView<'_>, Error> {
        self.version_record(id)?;
        Ok(VersionView {
            cache: self,
            index: id.index,
        })
    }
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("packages", &self.packages.len())
            .field("versions", &self.versions.len())
            .field("files", &self.files.len())
            .field("native_arch", &self.native_arch)
            .finish()
    }
}

/// Read-only view of one package.
#[derive(Clone, Copy)]
pub struct PackageView<'c> {
    cache: &'c Cache,
    index: u32,
}

impl<'c> PackageView<'c> {
    fn record(&self) -> &'c PackageRecord {
        &self.cache.packages[self.index as usize]
    }

    /// Storable opaque handle for this package.
    pub fn id(&self) -> PackageId {
        PackageId {
            tag: self.cache.tag,
            index: self.index,
        }
    }

    pub fn name(&self) -> &'c str {
        &self.record().name
    }

    pub fn arch(&self) -> &'c str {
        &self.record().arch
    }

    /// `name:arch`; with `pretty`, the native and `all` architectures are
    /// omitted.
    pub fn full_name(&self, pretty: bool) -> String {
        let record = self.record();
        if pretty && (record.arch == self.cache.native_arch || record.arch == "all") {
            record.name.clone()
        } else {
            format!("{}:{}", record.name, record.arch)
        }
    }

    pub fn essential(&self) -> bool {
        self.record().essential
    }

    pub fn current_state(&self) -> CurrentState {
        self.record().current_state
    }

    pub fn inst_state(&self) -> InstState {
        self.record().inst_state
    }

    pub fn selected_state(&self) -> SelectedState {
        self.record().selected_state
    }

    /// True for real packages; false means the name exists only as a
    /// dependency target or provides target (virtual package).
    pub fn has_versions(&self) -> bool {
        !self.record().versions.is_empty()
    }

    pub fn has_provides(&self) -> bool {
        !self.record().provided_by.is_empty()
    }

    /// All versions of this package, in parse order (not sorted).
    pub fn versions(&self) -> impl Iterator<Item = VersionView<'c>> + '_ {
        let cache = self.cache;
        self.record()
            .versions
            .iter()
            .map(move |&index| VersionView { cache, index })
    }

    /// The currently installed version, if any.
    pub fn current_version(&self) -> Option<VersionView<'c>> {
        self.record().current_version.map(|index| VersionView {
            cache: self.cache,
            index,
        })
    }

    pub fn is_installed(&self) -> bool {
        self.record().current_version.is_some()
    }

    /// The policy candidate for this package. None for virtual packages,
    /// fully pinned-out packages, and policies over a different cache.
    pub fn candidate(&self, policy: &Policy<'c>) -> Option<VersionView<'c>> {
        policy.candidate(self.id()).ok().flatten()
    }
}

impl fmt::Display for PackageView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_name(true))
    }
}

impl fmt::Debug for PackageView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PackageView({})", self.full_name(false))
    }
}

/// A maximal run of dependency clauses joined by the OR marker. Satisfied if
/// any member is; the type is shared by the whole group.
#[derive(Debug, Clone)]
pub struct DependencyGroup<'c> {
    pub dep_type: DepType,
    pub clauses: Vec<&'c DependencyClause>,
}

impl<'c> DependencyGroup<'c> {
    /// True when the group holds more than one alternative.
    pub fn is_or(&self) -> bool {
        self.clauses.len() > 1
    }

    pub fn first(&self) -> &'c DependencyClause {
        self.clauses[0]
    }
}

/// Read-only view of one version.
#[derive(Clone, Copy)]
pub struct VersionView<'c> {
    cache: &'c Cache,
    index: u32,
}

impl<'c> VersionView<'c> {
    fn record(&self) -> &'c VersionRecord {
        &self.cache.versions[self.index as usize]
    }

    /// Storable opaque handle for this version.
    pub fn id(&self) -> VersionId {
        VersionId {
            tag: self.cache.tag,
            index: self.index,
        }
    }

    /// The owning package.
    pub fn package(&self) -> PackageView<'c> {
        PackageView {
            cache: self.cache,
            index: self.record().package,
        }
    }

    pub fn version(&self) -> &'c str {
        &self.record().version
    }

    pub fn arch(&self) -> &'c str {
        &self.record().arch
    }

    pub fn size(&self) -> u64 {
        self.record().size
    }

    pub fn installed_size(&self) -> u64 {
        self.record().installed_size
    }

    pub fn section(&self) -> &'c str {
        &self.record().section
    }

    /// The Debian Priority field text (required/important/standard/...).
    pub fn priority_str(&self) -> &'c str {
        &self.record().priority
    }

    pub fn source_name(&self) -> &'c str {
        &self.record().source_name
    }

    pub fn source_version(&self) -> &'c str {
        &self.record().source_version
    }

    /// True when at least one listing index file is downloadable (i.e. the
    /// version is not known only from the status file).
    pub fn downloadable(&self) -> bool {
        self.record()
            .files
            .iter()
            .any(|occurrence| self.cache.files[occurrence.file as usize].downloadable)
    }

    /// True when this version is its package's currently installed one.
    pub fn is_installed(&self) -> bool {
        self.package().record().current_version == Some(self.index)
    }

    /// The raw clause list, OR markers intact.
    pub fn clauses(&self) -> &'c [DependencyClause] {
        &self.record().depends
    }

    /// All dependency clauses grouped by the OR-continuation marker. Each
    /// group's type is taken from its first clause.
    pub fn dependency_groups(&self) -> Vec<DependencyGroup<'c>> {
        let mut groups = Vec::new();
        let mut clauses = self.record().depends.iter().peekable();

        while let Some(first) = clauses.next() {
            let mut group = DependencyGroup {
                dep_type: first.dep_type,
                clauses: vec![first],
            };
            let mut continues = first.or_continues;
            while continues {
                match clauses.next() {
                    Some(clause) => {
                        continues = clause.or_continues;
                        group.clauses.push(clause);
                    }
                    // A trailing marker cannot recruit a clause that is not
                    // there; close the group.
                    None => break,
                }
            }
            groups.push(group);
        }
        groups
    }

    /// Dependency groups of one kind only.
    pub fn depends_of(&self, kind: DepType) -> Vec<DependencyGroup<'c>> {
        self.dependency_groups()
            .into_iter()
            .filter(|group| group.dep_type == kind)
            .collect()
    }

    /// Hard dependencies (Depends groups).
    pub fn dependencies(&self) -> Vec<DependencyGroup<'c>> {
        self.depends_of(DepType::Depends)
    }

    pub fn recommends(&self) -> Vec<DependencyGroup<'c>> {
        self.depends_of(DepType::Recommends)
    }

    pub fn suggests(&self) -> Vec<DependencyGroup<'c>> {
        self.depends_of(DepType::Suggests)
    }

    /// `(file, offset)` occurrences, one per index listing this version.
    pub fn files(&self) -> impl Iterator<Item = (FileView<'c>, u64)> + '_ {
        let cache = self.cache;
        self.record().files.iter().map(move |occurrence| {
            (
                FileView {
                    cache,
                    index: occurrence.file,
                },
                occurrence.offset,
            )
        })
    }

    /// The listing files themselves, one per occurrence, not deduplicated.
    pub fn package_files(&self) -> impl Iterator<Item = FileView<'c>> + '_ {
        self.files().map(|(file, _)| file)
    }

    /// Location of the translated description, when an index carried one.
    pub fn description_ref(&self) -> Option<(FileView<'c>, u64)> {
        self.record().description.map(|occurrence| {
            (
                FileView {
                    cache: self.cache,
                    index: occurrence.file,
                },
                occurrence.offset,
            )
        })
    }
}

impl fmt::Display for VersionView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.package().full_name(true), self.version())
    }
}

impl fmt::Debug for VersionView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "VersionView({} {})",
            self.package().full_name(false),
            self.version()
        )
    }
}

/// Read-only view of one repository index file.
#[derive(Clone, Copy)]
pub struct FileView<'c> {
    cache: &'c Cache,
    index: u32,
}

impl<'c> FileView<'c> {
    fn record(&self) -> &'c FileRecord {
        &self.cache.files[self.index as usize]
    }

    /// Storable opaque handle for this file.
    pub fn id(&self) -> FileId {
        FileId {
            tag: self.cache.tag,
            index: self.index,
        }
    }

    pub fn filename(&self) -> &'c str {
        &self.record().filename
    }

    pub fn archive(&self) -> &'c str {
        &self.record().archive
    }

    pub fn origin(&self) -> &'c str {
        &self.record().origin
    }

    pub fn codename(&self) -> &'c str {
        &self.record().codename
    }

    pub fn label(&self) -> &'c str {
        &self.record().label
    }

    pub fn site(&self) -> &'c str {
        &self.record().site
    }

    pub fn component(&self) -> &'c str {
        &self.record().component
    }

    pub fn arch(&self) -> &'c str {
        &self.record().arch
    }

    /// Descriptive index kind, e.g. "Debian Package Index".
    pub fn index_type(&self) -> &'c str {
        &self.record().index_type
    }

    pub fn downloadable(&self) -> bool {
        self.record().downloadable
    }

    /// Whether this index is trusted. Resolved through the index collaborator
    /// on first access and memoized; later calls never consult the
    /// collaborator again.
    pub fn is_trusted(&self, resolver: &dyn IndexResolver) -> bool {
        *self
            .record()
            .trusted
            .get_or_init(|| resolver.is_trusted(self.filename()))
    }
}

impl fmt::Debug for FileView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileView({})", self.filename())
    }
}
