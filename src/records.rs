//! Record projection: descriptive text fields for a (version, file) pair.
//!
//! The cache only stores offsets; the actual stanza text lives on disk and
//! is read through the [`RecordParser`] collaborator. A [`Records`] session
//! is a stateful seek: at most one lookup result is valid at a time, and a
//! later lookup invalidates the fields of an earlier one, so callers must
//! extract what they need before seeking again.

use std::collections::HashMap;

use anyhow::Result;

use crate::cache::{Cache, FileId, VersionView};
use crate::error::Error;

/// Collaborator reading textual records out of index files.
#[cfg_attr(test, mockall::automock)]
pub trait RecordParser {
    /// Seek to the stanza at `offset` within the named index file. Field
    /// accessors reflect this stanza until the next lookup.
    fn lookup(&mut self, index_filename: &str, offset: u64) -> Result<()>;

    /// Path of the package archive named by the current stanza.
    fn file_name(&self) -> String;

    fn long_desc(&self) -> String;

    fn short_desc(&self) -> String;

    /// All hashes of the current stanza, keyed by algorithm name
    /// (e.g. "sha256").
    fn hashes(&self) -> HashMap<String, String>;
}

/// Collaborator resolving index files to archive locations and trust.
#[cfg_attr(test, mockall::automock)]
pub trait IndexResolver {
    /// Full archive URI for a record's file path within the given index.
    fn archive_uri(&self, index_filename: &str, record_filename: &str) -> String;

    /// Whether the given index file is trusted.
    fn is_trusted(&self, index_filename: &str) -> bool;
}

/// One record-projection session over a cache.
pub struct Records<'c, P: RecordParser> {
    cache: &'c Cache,
    parser: P,
    current: Option<FileId>,
}

impl<'c, P: RecordParser> Records<'c, P> {
    pub fn new(cache: &'c Cache, parser: P) -> Self {
        Self {
            cache,
            parser,
            current: None,
        }
    }

    /// Seek to the record behind one file occurrence of a version. Replaces
    /// any earlier lookup in this session.
    pub fn lookup(&mut self, version: &VersionView<'c>, occurrence: usize) -> Result<(), Error> {
        self.cache.version_record(version.id())?;
        let (file, offset) = version.files().nth(occurrence).ok_or_else(|| {
            Error::not_found(format!("file occurrence {} of {}", occurrence, version))
        })?;

        self.seek(file.id(), offset)
    }

    /// Seek to the translated description record of a version.
    pub fn lookup_desc(&mut self, version: &VersionView<'c>) -> Result<(), Error> {
        self.cache.version_record(version.id())?;
        let (file, offset) = version
            .description_ref()
            .ok_or_else(|| Error::not_found(format!("description of {}", version)))?;

        self.seek(file.id(), offset)
    }

    fn seek(&mut self, file: FileId, offset: u64) -> Result<(), Error> {
        let filename = &self.cache.files[file.index as usize].filename;
        self.parser
            .lookup(filename, offset)
            .map_err(|err| Error::Collaborator(err.to_string()))?;
        self.current = Some(file);
        Ok(())
    }

    pub fn long_desc(&self) -> Result<String, Error> {
        self.require_active()?;
        Ok(self.parser.long_desc())
    }

    pub fn short_desc(&self) -> Result<String, Error> {
        self.require_active()?;
        Ok(self.parser.short_desc())
    }

    /// The hash of the given algorithm, or `None` when the record does not
    /// carry it. A missing algorithm is an ordinary outcome, not a failure.
    pub fn hash(&self, kind: &str) -> Result<Option<String>, Error> {
        self.require_active()?;
        Ok(self.parser.hashes().get(kind).cloned())
    }

    /// The archive URI of the current record, resolved through the index
    /// collaborator keyed by the looked-up file.
    pub fn uri(&self, resolver: &dyn IndexResolver) -> Result<String, Error> {
        let file = self.require_active()?;
        let filename = &self.cache.files[file.index as usize].filename;
        Ok(resolver.archive_uri(filename, &self.parser.file_name()))
    }

    fn require_active(&self) -> Result<FileId, Error> {
        self.current
            .ok_or_else(|| Error::not_found("active record (call lookup first)"))
    }
}
