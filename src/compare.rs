//! Version comparison collaborator.
//!
//! Version-string arithmetic is not part of this core: the cache only ever
//! asks a [`VersionCompare`] implementation for a three-way ordering. A
//! simple numeric-segment default is provided for embedders and tests;
//! systems needing full Debian epoch/tilde semantics supply their own.

use std::cmp::Ordering;

/// Three-way comparison over version strings.
#[cfg_attr(test, mockall::automock)]
pub trait VersionCompare: Send + Sync {
    /// Compare two version strings, returning Less/Equal/Greater.
    fn compare(&self, a: &str, b: &str) -> Ordering;
}

/// Default comparator: splits on `.`, `-` and `+`, compares numeric segments
/// numerically and everything else lexically. A missing segment sorts first,
/// so `1.0 < 1.0.1`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SegmentCompare;

impl SegmentCompare {
    fn segments(version: &str) -> impl Iterator<Item = &str> {
        version.split(['.', '-', '+']).filter(|s| !s.is_empty())
    }

    fn compare_segment(a: &str, b: &str) -> Ordering {
        match (a.parse::<u64>(), b.parse::<u64>()) {
            (Ok(na), Ok(nb)) => na.cmp(&nb),
            _ => a.cmp(b),
        }
    }
}

impl VersionCompare for SegmentCompare {
    fn compare(&self, a: &str, b: &str) -> Ordering {
        let mut left = Self::segments(a);
        let mut right = Self::segments(b);

        loop {
            match (left.next(), right.next()) {
                (None, None) => return Ordering::Equal,
                (None, Some(_)) => return Ordering::Less,
                (Some(_), None) => return Ordering::Greater,
                (Some(sa), Some(sb)) => match Self::compare_segment(sa, sb) {
                    Ordering::Equal => continue,
                    other => return other,
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_segments_compare_numerically() {
        let cmp = SegmentCompare;
        assert_eq!(cmp.compare("1.10", "1.9"), Ordering::Greater);
        assert_eq!(cmp.compare("2.0", "10.0"), Ordering::Less);
    }

    #[test]
    fn test_equal_versions() {
        let cmp = SegmentCompare;
        assert_eq!(cmp.compare("1.0.0", "1.0.0"), Ordering::Equal);
    }

    #[test]
    fn test_shorter_version_sorts_first() {
        let cmp = SegmentCompare;
        assert_eq!(cmp.compare("1.0", "1.0.1"), Ordering::Less);
    }

    #[test]
    fn test_mixed_segments_fall_back_to_lexical() {
        let cmp = SegmentCompare;
        assert_eq!(cmp.compare("1.0-alpha", "1.0-beta"), Ordering::Less);
        assert_eq!(cmp.compare("1.0+deb1", "1.0+deb2"), Ordering::Less);
    }
}
