//! In-memory Debian-style package metadata cache and dependency query engine.
//!
//! `debcache` turns raw package-index records into a normalized,
//! immutable-after-build graph of packages, versions, dependencies, provides
//! relations, and index files, and answers structural queries over it: what
//! provides a name, which versions satisfy a clause, whether a package is
//! upgradable, what action is planned for it.
//!
//! Network fetching, on-disk record parsing, version-string arithmetic, and
//! dependency resolution are external collaborators, injected as traits:
//! [`acquire::Acquire`], [`records::RecordParser`], [`compare::VersionCompare`],
//! and [`depcache::ResolutionEngine`].
//!
//! # Example
//!
//! ```
//! use debcache::cache::{CacheBuilder, Environment};
//! use debcache::index::{FileMetadata, RawRecord};
//!
//! let mut builder = CacheBuilder::new(Environment::default());
//! let file = builder.add_file(FileMetadata {
//!     filename: "debian_sid_main_Packages".into(),
//!     ..Default::default()
//! });
//! builder.add_record(file, RawRecord {
//!     name: "nano".into(),
//!     arch: "amd64".into(),
//!     version: "7.2-1".into(),
//!     ..Default::default()
//! }).unwrap();
//!
//! let cache = builder.build().unwrap();
//! assert!(cache.find("nano").unwrap().has_versions());
//! ```

pub mod acquire;
pub mod cache;
pub mod compare;
pub mod depcache;
pub mod error;
pub mod index;
pub mod policy;
pub mod records;
pub mod sort;

pub use cache::{Cache, CacheBuilder, Environment, FileId, PackageId, VersionId};
pub use depcache::DepCache;
pub use error::{Error, ErrorStack};
pub use policy::Policy;
pub use sort::PackageSort;
