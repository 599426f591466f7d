//! Error taxonomy for cache building and queries.
//!
//! Build-time parse problems are not reported one at a time: they accumulate
//! into an [`ErrorStack`] and are surfaced together once the build attempt
//! finishes. Everything else fails fast with a single [`Error`].

use std::fmt;

use thiserror::Error;

/// Error type for cache operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A malformed index record encountered during the build.
    #[error("failed to parse record for {record}: {reason}")]
    Parse { record: String, reason: String },

    /// A queried name, hash, or file has no match.
    #[error("{what} not found")]
    NotFound { what: String },

    /// A handle from a different (or already released) cache was passed in.
    #[error("invalid handle: {what} does not belong to this cache")]
    InvalidHandle { what: String },

    /// An external collaborator (fetch, record lookup) failed.
    #[error("collaborator failure: {0}")]
    Collaborator(String),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn invalid_handle(what: impl Into<String>) -> Self {
        Self::InvalidHandle { what: what.into() }
    }
}

/// Severity of one accumulated build issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// One accumulated issue from a build or fetch attempt.
#[derive(Debug, Clone)]
pub struct Issue {
    pub severity: Severity,
    pub message: String,
}

/// An ordered collection of issues reported together after an attempt
/// completes, rather than aborting on the first problem.
#[derive(Debug, Clone, Default)]
pub struct ErrorStack {
    issues: Vec<Issue>,
}

impl ErrorStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.issues.push(Issue {
            severity: Severity::Error,
            message: message.into(),
        });
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.issues.push(Issue {
            severity: Severity::Warning,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// True if at least one issue has Error severity.
    pub fn is_fatal(&self) -> bool {
        self.issues
            .iter()
            .any(|issue| issue.severity == Severity::Error)
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    /// Split off the warnings, leaving only the errors behind.
    pub fn take_warnings(&mut self) -> Vec<Issue> {
        let (warnings, errors) = self
            .issues
            .drain(..)
            .partition(|issue| issue.severity == Severity::Warning);
        self.issues = errors;
        warnings
    }
}

impl fmt::Display for ErrorStack {
    /// Renders the aggregated, semicolon-joined form: `E:first;W:second`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for issue in &self.issues {
            if !first {
                write!(f, ";")?;
            }
            first = false;
            let prefix = match issue.severity {
                Severity::Error => "E",
                Severity::Warning => "W",
            };
            write!(f, "{}:{}", prefix, issue.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ErrorStack {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_joins_with_semicolons() {
        let mut stack = ErrorStack::new();
        stack.error("bad record");
        stack.warning("odd field");
        assert_eq!(stack.to_string(), "E:bad record;W:odd field");
    }

    #[test]
    fn test_fatal_requires_error_severity() {
        let mut stack = ErrorStack::new();
        assert!(!stack.is_fatal());
        stack.warning("just a warning");
        assert!(!stack.is_fatal());
        stack.error("now it is fatal");
        assert!(stack.is_fatal());
    }

    #[test]
    fn test_take_warnings_leaves_errors() {
        let mut stack = ErrorStack::new();
        stack.warning("w1");
        stack.error("e1");
        stack.warning("w2");

        let warnings = stack.take_warnings();
        assert_eq!(warnings.len(), 2);
        assert_eq!(stack.issues().len(), 1);
        assert!(stack.is_fatal());
    }

    #[test]
    fn test_error_messages_carry_context() {
        let err = Error::Parse {
            record: "foo 1.0 amd64".into(),
            reason: "unterminated version constraint".into(),
        };
        let text = err.to_string();
        assert!(text.contains("foo 1.0 amd64"));
        assert!(text.contains("unterminated"));
    }
}
