//! Index acquisition collaborator contract.
//!
//! The cache never touches the network itself. Fetching package indexes is
//! delegated to an [`Acquire`] implementation, which reports progress through
//! an [`AcquireProgress`] sink and returns failures as one aggregated
//! [`ErrorStack`] rather than a stream of individual errors.

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::ErrorStack;

/// One configured repository line.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceEntry {
    pub uri: String,
    pub distribution: String,
    #[serde(default)]
    pub components: Vec<String>,
}

/// The configured repositories a cache session works against.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceList {
    pub entries: Vec<SourceEntry>,
}

impl SourceList {
    pub fn new(entries: Vec<SourceEntry>) -> Self {
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load a source list from its JSON representation.
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        serde_json::from_str(text).context("malformed source list")
    }
}

/// One index file the acquirer manages: its remote URI and the local name
/// it is stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub uri: String,
    pub filename: String,
}

/// Progress sink for an update run. Events carry an item id and a
/// human-readable description of the index being fetched.
#[cfg_attr(test, mockall::automock)]
pub trait AcquireProgress {
    /// Microseconds between pulse calls; 0 leaves the choice to the
    /// acquirer.
    fn pulse_interval(&self) -> usize {
        0
    }

    fn start(&mut self) {}

    /// The index was already up to date.
    fn hit(&mut self, id: u32, description: String);

    /// The index is being downloaded.
    fn fetch(&mut self, id: u32, description: String, file_size: u64);

    /// The index could not be fetched.
    fn fail(&mut self, id: u32, description: String, status: u32, error: String);

    /// Periodic overall progress.
    fn pulse(&mut self, percent: f32, total_bytes: u64, current_bytes: u64);

    fn done(&mut self) {}

    fn stop(&mut self, fetched_bytes: u64, elapsed_time: u64, current_cps: u64);
}

/// Collaborator fetching package indexes. Implementations may block; this
/// core imposes no timeout or retry of its own.
#[cfg_attr(test, mockall::automock)]
pub trait Acquire {
    /// The `(uri, local file name)` pairs an update would refresh for the
    /// given sources.
    fn fetch_indexes(&self, sources: &SourceList) -> Result<Vec<SourceFile>, ErrorStack>;

    /// Refresh all indexes, reporting progress to the sink. All failures
    /// accumulate into the returned stack; partial successes are kept.
    fn update(
        &mut self,
        sources: &SourceList,
        progress: &mut dyn AcquireProgress,
    ) -> Result<(), ErrorStack>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::always;

    #[test]
    fn test_update_failure_is_one_aggregated_report() {
        let mut acquire = MockAcquire::new();
        acquire.expect_update().returning(|_, _| {
            let mut stack = ErrorStack::new();
            stack.error("Failed to fetch http://deb.debian.org/dists/sid/InRelease");
            stack.warning("Some index files failed to download");
            Err(stack)
        });

        let sources = SourceList::default();
        let mut progress = MockAcquireProgress::new();
        let err = acquire
            .update(&sources, &mut progress)
            .unwrap_err();

        assert!(err.is_fatal());
        assert_eq!(
            err.to_string(),
            "E:Failed to fetch http://deb.debian.org/dists/sid/InRelease;\
             W:Some index files failed to download"
        );
    }

    #[test]
    fn test_source_list_from_json() {
        let sources = SourceList::from_json(
            r#"{"entries": [{"uri": "http://deb.debian.org/debian",
                             "distribution": "sid",
                             "components": ["main", "contrib"]}]}"#,
        )
        .unwrap();
        assert_eq!(sources.entries.len(), 1);
        assert_eq!(sources.entries[0].distribution, "sid");
        assert_eq!(sources.entries[0].components.len(), 2);

        assert!(SourceList::from_json("{\"entries\": 3}").is_err());
    }

    #[test]
    fn test_progress_receives_events() {
        let mut progress = MockAcquireProgress::new();
        progress
            .expect_hit()
            .with(always(), always())
            .times(1)
            .return_const(());
        progress.expect_stop().times(1).return_const(());

        // Drive the sink the way an acquirer would.
        progress.hit(1, "http://deb.debian.org sid InRelease".into());
        progress.stop(0, 0, 0);
    }
}
