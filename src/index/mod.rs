//! Raw index-record input model.
//!
//! The cache is built from per-repository index entries supplied by the
//! embedding system (typically parsed out of `Packages` index files and the
//! dpkg status file). This module defines that input shape plus the relation
//! vocabulary; [`parse`] turns textual relation lines into clause sequences.

mod parse;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use parse::{parse_provides, parse_relations};

/// Dependency relation kinds, with an unspecified sentinel at index 0
/// matching the conventional dep-type table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DepType {
    #[default]
    Unspecified,
    Depends,
    PreDepends,
    Suggests,
    Recommends,
    Conflicts,
    Replaces,
    Obsoletes,
    Breaks,
    Enhances,
}

impl DepType {
    /// The untranslated field label, empty for the sentinel.
    pub fn label(&self) -> &'static str {
        match self {
            DepType::Unspecified => "",
            DepType::Depends => "Depends",
            DepType::PreDepends => "PreDepends",
            DepType::Suggests => "Suggests",
            DepType::Recommends => "Recommends",
            DepType::Conflicts => "Conflicts",
            DepType::Replaces => "Replaces",
            DepType::Obsoletes => "Obsoletes",
            DepType::Breaks => "Breaks",
            DepType::Enhances => "Enhances",
        }
    }
}

impl fmt::Display for DepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for DepType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Depends" => Ok(DepType::Depends),
            "PreDepends" | "Pre-Depends" => Ok(DepType::PreDepends),
            "Suggests" => Ok(DepType::Suggests),
            "Recommends" => Ok(DepType::Recommends),
            "Conflicts" => Ok(DepType::Conflicts),
            "Replaces" => Ok(DepType::Replaces),
            "Obsoletes" => Ok(DepType::Obsoletes),
            "Breaks" => Ok(DepType::Breaks),
            "Enhances" => Ok(DepType::Enhances),
            _ => anyhow::bail!("unknown dependency type: {}", s),
        }
    }
}

/// Version comparison operator on a dependency clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CompOp {
    /// No version constraint.
    #[default]
    None,
    Less,
    LessEq,
    Equal,
    GreaterEq,
    Greater,
    NotEqual,
}

impl CompOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompOp::None => "",
            CompOp::Less => "<<",
            CompOp::LessEq => "<=",
            CompOp::Equal => "=",
            CompOp::GreaterEq => ">=",
            CompOp::Greater => ">>",
            CompOp::NotEqual => "!=",
        }
    }

    /// Evaluate this operator against a comparator verdict
    /// (`ordering` = actual version compared to the constraint).
    pub fn matches(&self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            CompOp::None => true,
            CompOp::Less => ordering == Less,
            CompOp::LessEq => ordering != Greater,
            CompOp::Equal => ordering == Equal,
            CompOp::GreaterEq => ordering != Less,
            CompOp::Greater => ordering == Greater,
            CompOp::NotEqual => ordering != Equal,
        }
    }
}

impl fmt::Display for CompOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One parsed dependency clause. Consecutive clauses with `or_continues`
/// set form an OR-group with the clause that finally clears it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyClause {
    /// Target package name (architecture qualifier stripped).
    pub target_name: String,
    /// Version constraint string, empty when unconstrained.
    pub constraint: String,
    pub comp: CompOp,
    pub dep_type: DepType,
    /// True when the next clause belongs to the same OR-group.
    pub or_continues: bool,
}

/// One textual relation field of a record, e.g.
/// `(Depends, "libc6 (>= 2.14), foo | bar")`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationField {
    pub kind: DepType,
    pub line: String,
}

/// Identity and provenance of one repository index file. The default value
/// is a downloadable index with every descriptive field empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMetadata {
    pub filename: String,
    #[serde(default)]
    pub archive: String,
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub codename: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub site: String,
    #[serde(default)]
    pub component: String,
    #[serde(default)]
    pub arch: String,
    /// Descriptive index kind, e.g. "Debian Package Index" or
    /// "Debian dpkg status file".
    #[serde(default)]
    pub index_type: String,
    /// False for the status file; versions listed only there are not
    /// downloadable.
    #[serde(default = "default_true")]
    pub downloadable: bool,
}

fn default_true() -> bool {
    true
}

impl Default for FileMetadata {
    fn default() -> Self {
        Self {
            filename: String::new(),
            archive: String::new(),
            origin: String::new(),
            codename: String::new(),
            label: String::new(),
            site: String::new(),
            component: String::new(),
            arch: String::new(),
            index_type: String::new(),
            downloadable: true,
        }
    }
}

/// One raw package stanza from an index file, pre-parsed into fields by the
/// record collaborator but with relation lines still textual.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRecord {
    pub name: String,
    pub arch: String,
    pub version: String,
    #[serde(default)]
    pub essential: bool,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub installed_size: u64,
    #[serde(default)]
    pub section: String,
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub source_name: String,
    #[serde(default)]
    pub source_version: String,
    /// Byte offset of this stanza within its index file.
    #[serde(default)]
    pub offset: u64,
    /// Offset of the translated description, when the index carries one.
    #[serde(default)]
    pub description_offset: Option<u64>,
    #[serde(default)]
    pub relations: Vec<RelationField>,
    /// Comma-separated provided names, empty if none.
    #[serde(default)]
    pub provides: String,
}

impl RawRecord {
    /// Identity string used in diagnostics: `name:arch version`.
    pub fn identity(&self) -> String {
        format!("{}:{} {}", self.name, self.arch, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    #[test]
    fn test_dep_type_labels_match_field_names() {
        assert_eq!(DepType::Unspecified.label(), "");
        assert_eq!(DepType::PreDepends.label(), "PreDepends");
        assert_eq!("Pre-Depends".parse::<DepType>().unwrap(), DepType::PreDepends);
        assert!("NotAType".parse::<DepType>().is_err());
    }

    #[test]
    fn test_comp_op_matches() {
        assert!(CompOp::GreaterEq.matches(Ordering::Equal));
        assert!(CompOp::GreaterEq.matches(Ordering::Greater));
        assert!(!CompOp::GreaterEq.matches(Ordering::Less));
        assert!(CompOp::None.matches(Ordering::Less));
        assert!(CompOp::Less.matches(Ordering::Less));
        assert!(!CompOp::Equal.matches(Ordering::Greater));
    }

    #[test]
    fn test_raw_record_identity() {
        let record = RawRecord {
            name: "apt".into(),
            arch: "amd64".into(),
            version: "2.6.1".into(),
            ..Default::default()
        };
        assert_eq!(record.identity(), "apt:amd64 2.6.1");
    }
}
