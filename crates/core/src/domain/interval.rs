//! Half-open time interval `[start, end)` in UTC.

use super::error::{DomainError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// A slot of time. Always satisfies `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Interval {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl Interval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start >= end {
            return Err(DomainError::InvalidInterval {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// `[s1, e1)` and `[s2, e2)` overlap iff `s1 < e2 && s2 < e1`.
    ///
    /// Touching intervals (`e1 == s2`) do not overlap. The SQL stores use the
    /// same predicate.
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn at_minute(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn slot(start_min: i64, end_min: i64) -> Interval {
        Interval::new(at_minute(start_min), at_minute(end_min)).unwrap()
    }

    /// Brute force: do the two intervals share any minute tick?
    fn shares_a_tick(a: (i64, i64), b: (i64, i64)) -> bool {
        (a.0..a.1).any(|tick| b.0 <= tick && tick < b.1)
    }

    #[test]
    fn test_rejects_empty_and_inverted_intervals() {
        assert!(Interval::new(at_minute(10), at_minute(10)).is_err());
        assert!(matches!(
            Interval::new(at_minute(11), at_minute(10)),
            Err(DomainError::InvalidInterval { .. })
        ));
    }

    #[test]
    fn test_touching_intervals_do_not_overlap() {
        assert!(!slot(0, 60).overlaps(&slot(60, 120)));
        assert!(!slot(60, 120).overlaps(&slot(0, 60)));
    }

    #[test]
    fn test_containment_and_partial_overlap() {
        assert!(slot(0, 120).overlaps(&slot(30, 60)));
        assert!(slot(30, 60).overlaps(&slot(0, 120)));
        assert!(slot(0, 60).overlaps(&slot(30, 90)));
        assert!(slot(0, 60).overlaps(&slot(0, 60)));
    }

    proptest! {
        #[test]
        fn prop_overlap_matches_tick_scan(
            s1 in 0i64..600, len1 in 1i64..180,
            s2 in 0i64..600, len2 in 1i64..180,
        ) {
            let a = slot(s1, s1 + len1);
            let b = slot(s2, s2 + len2);
            let expected = shares_a_tick((s1, s1 + len1), (s2, s2 + len2));
            prop_assert_eq!(a.overlaps(&b), expected);
        }

        #[test]
        fn prop_overlap_is_negation_of_disjointness(
            s1 in 0i64..600, len1 in 1i64..180,
            s2 in 0i64..600, len2 in 1i64..180,
        ) {
            let a = slot(s1, s1 + len1);
            let b = slot(s2, s2 + len2);
            let disjoint = a.end() <= b.start() || b.end() <= a.start();
            prop_assert_eq!(a.overlaps(&b), !disjoint);
            prop_assert_eq!(a.overlaps(&b), b.overlaps(&a));
        }
    }
}
