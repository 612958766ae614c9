//! Version ordering keys.
//!
//! A version string is split into runs of digits and runs of other
//! alphanumerics; `.`, `-`, `_`, `+` and any other punctuation only separate
//! runs. Numeric runs compare by value (without overflow, so arbitrarily long
//! numbers are fine), text runs compare case-insensitively, a numeric run
//! beats a text run at the same position, and when one key is a prefix of the
//! other the longer key is newer.

use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// Digits with leading zeros removed.
    Number(String),
    Text(String),
}

impl Ord for Segment {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Segment::Number(a), Segment::Number(b)) => {
                a.len().cmp(&b.len()).then_with(|| a.cmp(b))
            }
            (Segment::Text(a), Segment::Text(b)) => a.cmp(b),
            (Segment::Number(_), Segment::Text(_)) => Ordering::Greater,
            (Segment::Text(_), Segment::Number(_)) => Ordering::Less,
        }
    }
}

impl PartialOrd for Segment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Totally ordered key derived from a version string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct VersionKey(Vec<Segment>);

impl VersionKey {
    pub fn parse(version: &str) -> Self {
        let mut segments = Vec::new();
        let mut current = String::new();
        let mut numeric = false;

        let mut flush = |current: &mut String, numeric: bool| {
            if current.is_empty() {
                return;
            }
            let run = std::mem::take(current);
            if numeric {
                let trimmed = run.trim_start_matches('0');
                segments.push(Segment::Number(trimmed.to_string()));
            } else {
                segments.push(Segment::Text(run.to_lowercase()));
            }
        };

        for c in version.trim().chars() {
            if c.is_ascii_digit() {
                if !numeric {
                    flush(&mut current, numeric);
                    numeric = true;
                }
                current.push(c);
            } else if c.is_alphanumeric() {
                if numeric {
                    flush(&mut current, numeric);
                    numeric = false;
                }
                current.push(c);
            } else {
                flush(&mut current, numeric);
            }
        }
        flush(&mut current, numeric);
        VersionKey(segments)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for VersionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = self
            .0
            .iter()
            .map(|s| match s {
                Segment::Number(n) if n.is_empty() => "0",
                Segment::Number(n) | Segment::Text(n) => n.as_str(),
            })
            .collect();
        write!(f, "{}", parts.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn key(v: &str) -> VersionKey {
        VersionKey::parse(v)
    }

    #[test]
    fn test_numeric_runs_compare_by_value() {
        assert!(key("1.10") > key("1.9"));
        assert!(key("2.0") > key("1.99.99"));
        assert_eq!(key("1.01"), key("1.1"));
        assert!(key("123456789012345678901234567890") > key("99999999999999999999"));
    }

    #[test]
    fn test_number_beats_text_and_longer_wins() {
        assert!(key("1.0.1") > key("1.0.beta"));
        assert!(key("1.0.0") > key("1.0"));
        assert!(key("1.0+galaxy1") > key("1.0"));
        assert!(key("1.0+galaxy2") > key("1.0+galaxy1"));
    }

    #[test]
    fn test_separators_are_interchangeable() {
        assert_eq!(key("1-2_3+4"), key("1.2.3.4"));
        assert_eq!(key("1.0RC1"), key("1.0.rc.1"));
        assert_eq!(key("1.0rc1").to_string(), "1.0.rc.1");
    }

    proptest! {
        #[test]
        fn prop_numeric_versions_order_like_tuples(
            a in proptest::collection::vec(0u32..1000, 1..4),
            b in proptest::collection::vec(0u32..1000, 1..4),
        ) {
            let render = |parts: &[u32]| parts.iter().map(u32::to_string).collect::<Vec<_>>().join(".");
            prop_assert_eq!(key(&render(&a)).cmp(&key(&render(&b))), a.cmp(&b));
        }

        #[test]
        fn prop_ordering_is_total_and_antisymmetric(a in "[0-9a-z.]{0,8}", b in "[0-9a-z.]{0,8}") {
            let (ka, kb) = (key(&a), key(&b));
            prop_assert_eq!(ka.cmp(&kb), kb.cmp(&ka).reverse());
            prop_assert_eq!(ka.cmp(&kb) == Ordering::Equal, ka == kb);
        }
    }
}
