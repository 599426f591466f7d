//! Derived per-package state.
//!
//! [`DepCache`] layers planning state over an immutable cache: whether a
//! package is installed, upgradable, automatically installed, removable as
//! garbage, broken, and which action (if any) is currently planned for it.
//! Nothing here is persisted; everything is recomputed from the cache, the
//! policy, and the external resolution engine each session.
//!
//! Garbage and broken verdicts are not computed locally. Full mark-and-sweep
//! reachability is a separate system; this tracker only surfaces verdicts
//! from the [`ResolutionEngine`] collaborator.

use crate::cache::{Cache, PackageId, PackageView};
use crate::error::Error;
use crate::policy::Policy;
use crate::sort::{PackageSort, Sort};

/// Verdicts supplied by the external dependency-resolution engine.
#[cfg_attr(test, mockall::automock)]
pub trait ResolutionEngine {
    /// True when the package is unreachable from any manually requested
    /// install root.
    fn is_garbage(&self, package: PackageId) -> bool;

    /// True when the currently installed state has unsatisfied dependencies.
    fn is_now_broken(&self, package: PackageId) -> bool;

    /// True when the currently planned state has unsatisfied dependencies.
    fn is_inst_broken(&self, package: PackageId) -> bool;
}

/// Engine that reports nothing garbage and nothing broken. Useful when the
/// embedding system has no resolver wired up.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEngine;

impl ResolutionEngine for NullEngine {
    fn is_garbage(&self, _package: PackageId) -> bool {
        false
    }

    fn is_now_broken(&self, _package: PackageId) -> bool {
        false
    }

    fn is_inst_broken(&self, _package: PackageId) -> bool {
        false
    }
}

/// The action currently planned for a package. A single value per package,
/// so the mark classifications are mutually exclusive by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mark {
    /// Untouched.
    #[default]
    None,
    NewInstall,
    Upgrade,
    Downgrade,
    Delete,
    Keep,
    ReInstall,
}

#[derive(Debug, Clone, Copy, Default)]
struct PkgState {
    mark: Mark,
    auto: bool,
}

/// Derived-state tracker for one cache session.
pub struct DepCache<'c, E: ResolutionEngine> {
    cache: &'c Cache,
    policy: Policy<'c>,
    engine: E,
    states: Vec<PkgState>,
}

impl<'c, E: ResolutionEngine> DepCache<'c, E> {
    pub fn new(cache: &'c Cache, policy: Policy<'c>, engine: E) -> Self {
        let states = vec![PkgState::default(); cache.packages().count()];
        Self {
            cache,
            policy,
            engine,
            states,
        }
    }

    pub fn policy(&self) -> &Policy<'c> {
        &self.policy
    }

    /// True when the package has a distinguished current version.
    pub fn is_installed(&self, pkg: PackageId) -> Result<bool, Error> {
        Ok(self.cache.package_record(pkg)?.current_version.is_some())
    }

    /// Installed, a candidate exists, and the candidate differs from the
    /// current version.
    pub fn is_upgradable(&self, pkg: PackageId) -> Result<bool, Error> {
        let record = self.cache.package_record(pkg)?;
        let Some(current) = record.current_version else {
            return Ok(false);
        };
        let Some(candidate) = self.policy.candidate_index(pkg.id()) else {
            return Ok(false);
        };
        Ok(candidate != current)
    }

    /// The externally supplied auto-installed flag; this tracker only
    /// reads and reports it.
    pub fn is_auto_installed(&self, pkg: PackageId) -> Result<bool, Error> {
        self.check(pkg)?;
        Ok(self.states[pkg.id() as usize].auto)
    }

    /// Write the auto-installed flag on behalf of the surrounding system.
    pub fn set_auto(&mut self, pkg: PackageId, auto: bool) -> Result<(), Error> {
        self.check(pkg)?;
        self.states[pkg.id() as usize].auto = auto;
        Ok(())
    }

    /// (Installed or marked for new install) and flagged unreachable by the
    /// resolution engine.
    pub fn is_auto_removable(&self, pkg: PackageId) -> Result<bool, Error> {
        let record = self.cache.package_record(pkg)?;
        let relevant =
            record.current_version.is_some() || self.mark(pkg)? == Mark::NewInstall;
        Ok(relevant && self.engine.is_garbage(pkg))
    }

    pub fn is_now_broken(&self, pkg: PackageId) -> Result<bool, Error> {
        self.check(pkg)?;
        Ok(self.engine.is_now_broken(pkg))
    }

    pub fn is_inst_broken(&self, pkg: PackageId) -> Result<bool, Error> {
        self.check(pkg)?;
        Ok(self.engine.is_inst_broken(pkg))
    }

    /// The currently planned action for the package.
    pub fn mark(&self, pkg: PackageId) -> Result<Mark, Error> {
        self.check(pkg)?;
        Ok(self.states[pkg.id() as usize].mark)
    }

    pub fn marked_install(&self, pkg: PackageId) -> Result<bool, Error> {
        Ok(self.mark(pkg)? == Mark::NewInstall)
    }

    pub fn marked_upgrade(&self, pkg: PackageId) -> Result<bool, Error> {
        Ok(self.mark(pkg)? == Mark::Upgrade)
    }

    pub fn marked_downgrade(&self, pkg: PackageId) -> Result<bool, Error> {
        Ok(self.mark(pkg)? == Mark::Downgrade)
    }

    pub fn marked_delete(&self, pkg: PackageId) -> Result<bool, Error> {
        Ok(self.mark(pkg)? == Mark::Delete)
    }

    pub fn marked_keep(&self, pkg: PackageId) -> Result<bool, Error> {
        Ok(self.mark(pkg)? == Mark::Keep)
    }

    pub fn marked_reinstall(&self, pkg: PackageId) -> Result<bool, Error> {
        Ok(self.mark(pkg)? == Mark::ReInstall)
    }

    /// Plan an install, classified against current and candidate versions:
    /// not installed becomes a new install, an installed package moves up or
    /// down to the candidate, and a package already at its candidate keeps.
    pub fn mark_install(&mut self, pkg: PackageId) -> Result<Mark, Error> {
        let record = self.cache.package_record(pkg)?;
        let candidate = self.policy.candidate_index(pkg.id());

        let mark = match (record.current_version, candidate) {
            (_, None) => Mark::Keep,
            (None, Some(_)) => Mark::NewInstall,
            (Some(current), Some(candidate)) if current == candidate => Mark::Keep,
            (Some(current), Some(candidate)) => {
                let current = &self.cache.versions[current as usize].version;
                let wanted = &self.cache.versions[candidate as usize].version;
                if self.cache.compare_versions(wanted, current).is_gt() {
                    Mark::Upgrade
                } else {
                    Mark::Downgrade
                }
            }
        };

        self.states[pkg.id() as usize].mark = mark;
        Ok(mark)
    }

    /// Plan a removal.
    pub fn mark_delete(&mut self, pkg: PackageId) -> Result<(), Error> {
        self.check(pkg)?;
        self.states[pkg.id() as usize].mark = Mark::Delete;
        Ok(())
    }

    /// Hold the package at its current state.
    pub fn mark_keep(&mut self, pkg: PackageId) -> Result<(), Error> {
        self.check(pkg)?;
        self.states[pkg.id() as usize].mark = Mark::Keep;
        Ok(())
    }

    /// Plan reinstallation of the current version. No-op for packages that
    /// are not installed.
    pub fn mark_reinstall(&mut self, pkg: PackageId) -> Result<(), Error> {
        let record = self.cache.package_record(pkg)?;
        if record.current_version.is_some() {
            self.states[pkg.id() as usize].mark = Mark::ReInstall;
        } else {
            log::debug!("ignoring reinstall mark for non-installed package");
        }
        Ok(())
    }

    /// Forget all planned actions.
    pub fn clear_marks(&mut self) {
        for state in &mut self.states {
            state.mark = Mark::None;
        }
    }

    /// List packages matching a filter spec. Flag-based filters are checked
    /// before the candidate computation behind the upgradable and
    /// auto-removable predicates.
    pub fn packages<'a>(
        &'a self,
        sort: &'a PackageSort,
    ) -> impl Iterator<Item = PackageView<'c>> + 'a {
        self.cache.packages().filter(move |pkg| {
            let id = pkg.id();

            // Virtual filter: the default (Disable) keeps only real packages.
            let keep_virtual = match sort.virtual_pkgs {
                Sort::Disable => pkg.has_versions(),
                Sort::Enable => true,
                Sort::Reverse => !pkg.has_versions(),
            };
            if !keep_virtual {
                return false;
            }

            if !sort.installed.keeps(pkg.is_installed()) {
                return false;
            }
            if !sort
                .auto_installed
                .keeps(self.states[id.id() as usize].auto)
            {
                return false;
            }
            if sort.upgradable != Sort::Disable
                && !sort
                    .upgradable
                    .keeps(self.is_upgradable(id).unwrap_or(false))
            {
                return false;
            }
            if sort.auto_removable != Sort::Disable
                && !sort
                    .auto_removable
                    .keeps(self.is_auto_removable(id).unwrap_or(false))
            {
                return false;
            }
            true
        })
    }

    fn check(&self, pkg: PackageId) -> Result<(), Error> {
        self.cache.package_record(pkg).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheBuilder, Environment};
    use crate::index::{FileMetadata, RawRecord};
    use crate::policy::Pin;

    fn build_cache(installed: Option<&str>) -> Cache {
        let mut builder = CacheBuilder::new(Environment::default());
        let file = builder.add_file(FileMetadata {
            filename: "Packages".into(),
            ..Default::default()
        });
        for version in ["1.0", "2.0"] {
            builder
                .add_record(
                    file,
                    RawRecord {
                        name: "foo".into(),
                        arch: "amd64".into(),
                        version: version.into(),
                        ..Default::default()
                    },
                )
                .unwrap();
        }
        if let Some(version) = installed {
            builder.mark_installed("foo", "amd64", version);
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_not_installed_is_not_upgradable() {
        let cache = build_cache(None);
        let depcache = DepCache::new(&cache, Policy::new(&cache), NullEngine);
        let foo = cache.find("foo").unwrap().id();

        assert!(!depcache.is_installed(foo).unwrap());
        assert!(!depcache.is_upgradable(foo).unwrap());
    }

    #[test]
    fn test_installed_behind_candidate_is_upgradable() {
        let cache = build_cache(Some("1.0"));
        let depcache = DepCache::new(&cache, Policy::new(&cache), NullEngine);
        let foo = cache.find("foo").unwrap().id();

        assert!(depcache.is_installed(foo).unwrap());
        assert!(depcache.is_upgradable(foo).unwrap());
    }

    #[test]
    fn test_installed_at_candidate_is_not_upgradable() {
        let cache = build_cache(Some("2.0"));
        let depcache = DepCache::new(&cache, Policy::new(&cache), NullEngine);
        let foo = cache.find("foo").unwrap().id();

        assert!(!depcache.is_upgradable(foo).unwrap());
    }

    #[test]
    fn test_upgradable_invariant_matches_definition() {
        for installed in [None, Some("1.0"), Some("2.0")] {
            let cache = build_cache(installed);
            let depcache = DepCache::new(&cache, Policy::new(&cache), NullEngine);
            let foo = cache.find("foo").unwrap();
            let id = foo.id();

            let expected = depcache.is_installed(id).unwrap()
                && depcache
                    .policy()
                    .candidate(id)
                    .unwrap()
                    .is_some_and(|cand| {
                        foo.current_version()
                            .is_some_and(|cur| cur.id() != cand.id())
                    });
            assert_eq!(depcache.is_upgradable(id).unwrap(), expected);
        }
    }

    #[test]
    fn test_mark_install_classifies_new_install() {
        let cache = build_cache(None);
        let mut depcache = DepCache::new(&cache, Policy::new(&cache), NullEngine);
        let foo = cache.find("foo").unwrap().id();

        assert_eq!(depcache.mark_install(foo).unwrap(), Mark::NewInstall);
        assert!(depcache.marked_install(foo).unwrap());
        assert!(!depcache.marked_upgrade(foo).unwrap());
    }

    #[test]
    fn test_mark_install_classifies_upgrade() {
        let cache = build_cache(Some("1.0"));
        let mut depcache = DepCache::new(&cache, Policy::new(&cache), NullEngine);
        let foo = cache.find("foo").unwrap().id();

        assert_eq!(depcache.mark_install(foo).unwrap(), Mark::Upgrade);
    }

    #[test]
    fn test_mark_install_classifies_downgrade_under_pin() {
        let cache = build_cache(Some("2.0"));
        let policy = Policy::with_pins(&cache, vec![Pin::version("foo", "1.0", 1001)]);
        let mut depcache = DepCache::new(&cache, policy, NullEngine);
        let foo = cache.find("foo").unwrap().id();

        assert_eq!(depcache.mark_install(foo).unwrap(), Mark::Downgrade);
    }

    #[test]
    fn test_marks_are_mutually_exclusive() {
        let cache = build_cache(Some("1.0"));
        let mut depcache = DepCache::new(&cache, Policy::new(&cache), NullEngine);
        let foo = cache.find("foo").unwrap().id();

        depcache.mark_install(foo).unwrap();
        depcache.mark_delete(foo).unwrap();

        let marks = [
            depcache.marked_install(foo).unwrap(),
            depcache.marked_upgrade(foo).unwrap(),
            depcache.marked_downgrade(foo).unwrap(),
            depcache.marked_delete(foo).unwrap(),
            depcache.marked_keep(foo).unwrap(),
            depcache.marked_reinstall(foo).unwrap(),
        ];
        assert_eq!(marks.iter().filter(|&&m| m).count(), 1);
        assert!(depcache.marked_delete(foo).unwrap());
    }

    #[test]
    fn test_untouched_package_has_no_mark() {
        let cache = build_cache(Some("1.0"));
        let depcache = DepCache::new(&cache, Policy::new(&cache), NullEngine);
        let foo = cache.find("foo").unwrap().id();

        assert_eq!(depcache.mark(foo).unwrap(), Mark::None);
    }

    #[test]
    fn test_reinstall_requires_installation() {
        let cache = build_cache(None);
        let mut depcache = DepCache::new(&cache, Policy::new(&cache), NullEngine);
        let foo = cache.find("foo").unwrap().id();

        depcache.mark_reinstall(foo).unwrap();
        assert_eq!(depcache.mark(foo).unwrap(), Mark::None);
    }

    #[test]
    fn test_auto_flag_is_read_back() {
        let cache = build_cache(Some("1.0"));
        let mut depcache = DepCache::new(&cache, Policy::new(&cache), NullEngine);
        let foo = cache.find("foo").unwrap().id();

        assert!(!depcache.is_auto_installed(foo).unwrap());
        depcache.set_auto(foo, true).unwrap();
        assert!(depcache.is_auto_installed(foo).unwrap());
    }

    #[test]
    fn test_garbage_consults_engine_only_for_relevant_packages() {
        let mut engine = MockResolutionEngine::new();
        engine.expect_is_garbage().returning(|_| true);

        // Installed and flagged: auto-removable.
        let cache = build_cache(Some("1.0"));
        let depcache = DepCache::new(&cache, Policy::new(&cache), engine);
        let foo = cache.find("foo").unwrap().id();
        assert!(depcache.is_auto_removable(foo).unwrap());

        // Not installed, not marked: engine verdict does not matter.
        let mut engine = MockResolutionEngine::new();
        engine.expect_is_garbage().returning(|_| true);
        let cache = build_cache(None);
        let depcache = DepCache::new(&cache, Policy::new(&cache), engine);
        let foo = cache.find("foo").unwrap().id();
        assert!(!depcache.is_auto_removable(foo).unwrap());
    }

    #[test]
    fn test_broken_flags_surface_engine_verdicts() {
        let mut engine = MockResolutionEngine::new();
        engine.expect_is_now_broken().returning(|_| true);
        engine.expect_is_inst_broken().returning(|_| false);

        let cache = build_cache(Some("1.0"));
        let depcache = DepCache::new(&cache, Policy::new(&cache), engine);
        let foo = cache.find("foo").unwrap().id();

        assert!(depcache.is_now_broken(foo).unwrap());
        assert!(!depcache.is_inst_broken(foo).unwrap());
    }

    #[test]
    fn test_foreign_handle_fails_with_invalid_handle() {
        let cache = build_cache(None);
        let other = build_cache(None);
        let depcache = DepCache::new(&cache, Policy::new(&cache), NullEngine);
        let foreign = other.find("foo").unwrap().id();

        assert!(matches!(
            depcache.is_installed(foreign),
            Err(Error::InvalidHandle { .. })
        ));
        assert!(matches!(
            depcache.mark(foreign),
            Err(Error::InvalidHandle { .. })
        ));
    }
}
