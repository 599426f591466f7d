//! Composable tri-state package filters.
//!
//! Each filter is independently disabled, enabled (keep matching), or
//! reversed (keep non-matching); active filters compose by logical AND.
//! Evaluation order never changes the result set, only how much candidate
//! computation the expensive filters get to skip.

/// Tri-state filter setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sort {
    /// No filtering on this property.
    #[default]
    Disable,
    /// Keep only packages matching the property.
    Enable,
    /// Keep only packages not matching the property.
    Reverse,
}

impl Sort {
    /// Whether a package with the given property value passes this filter.
    pub fn keeps(&self, matches: bool) -> bool {
        match self {
            Sort::Disable => true,
            Sort::Enable => matches,
            Sort::Reverse => !matches,
        }
    }
}

/// Filter specification for package listing.
///
/// The default excludes virtual packages (names with no versions) and
/// filters on nothing else.
///
/// ```
/// use debcache::sort::PackageSort;
///
/// let sort = PackageSort::default().upgradable().manually_installed();
/// ```
#[derive(Debug, Clone, Default)]
pub struct PackageSort {
    /// Disable excludes virtual packages, Enable includes them, Reverse
    /// keeps only them.
    pub virtual_pkgs: Sort,
    pub upgradable: Sort,
    pub installed: Sort,
    pub auto_installed: Sort,
    pub auto_removable: Sort,
}

impl PackageSort {
    /// Include virtual packages alongside real ones.
    pub fn include_virtual(mut self) -> Self {
        self.virtual_pkgs = Sort::Enable;
        self
    }

    /// Keep only virtual packages.
    pub fn only_virtual(mut self) -> Self {
        self.virtual_pkgs = Sort::Reverse;
        self
    }

    /// Keep only packages with an upgrade available.
    pub fn upgradable(mut self) -> Self {
        self.upgradable = Sort::Enable;
        self
    }

    /// Keep only packages without an upgrade available.
    pub fn not_upgradable(mut self) -> Self {
        self.upgradable = Sort::Reverse;
        self
    }

    /// Keep only installed packages.
    pub fn installed(mut self) -> Self {
        self.installed = Sort::Enable;
        self
    }

    /// Keep only packages that are not installed.
    pub fn not_installed(mut self) -> Self {
        self.installed = Sort::Reverse;
        self
    }

    /// Keep only automatically installed packages.
    pub fn auto_installed(mut self) -> Self {
        self.auto_installed = Sort::Enable;
        self
    }

    /// Keep only manually installed packages.
    pub fn manually_installed(mut self) -> Self {
        self.auto_installed = Sort::Reverse;
        self
    }

    /// Keep only packages eligible for automatic removal.
    pub fn auto_removable(mut self) -> Self {
        self.auto_removable = Sort::Enable;
        self
    }

    /// Keep only packages not eligible for automatic removal.
    pub fn not_auto_removable(mut self) -> Self {
        self.auto_removable = Sort::Reverse;
        self
    }
}
