//! Outline number generation and ordering.
//!
//! An outline number is a dotted string ("2", "2.3", "2.3.1") encoding a
//! task's position and sibling order within its project's tree. Ordering is
//! segment-wise numeric, so "2.10" sorts after "2.9". Segments may be
//! arbitrarily wide, so comparison and increment work on digit strings
//! rather than parsed integers.

use std::cmp::Ordering;

/// Compare two outline numbers segment by segment, numerically.
/// A strict prefix sorts before its descendants ("2" < "2.1").
pub fn compare(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => match compare_segment(x, y) {
                Ordering::Equal => continue,
                other => return other,
            },
        }
    }
}

/// Numeric comparison of a single segment without integer parsing:
/// strip leading zeros, then longer digit strings are larger, ties broken
/// lexicographically.
fn compare_segment(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Add one to a decimal digit string ("9" -> "10", "1.2" is not valid input).
pub fn increment(segment: &str) -> String {
    let mut digits: Vec<u8> = segment.bytes().collect();
    for d in digits.iter_mut().rev() {
        if *d < b'9' {
            *d += 1;
            return String::from_utf8(digits).unwrap_or_default();
        }
        *d = b'0';
    }
    let mut out = String::with_capacity(digits.len() + 1);
    out.push('1');
    out.push_str(std::str::from_utf8(&digits).unwrap_or_default());
    out
}

/// Next top-level outline number, given the deepest existing root
/// (the segment-wise maximum among live single-segment outlines).
pub fn next_root(deepest_root: Option<&str>) -> String {
    match deepest_root {
        None => "1".to_string(),
        Some(existing) => increment(first_segment(existing)),
    }
}

/// Next outline number for a child of `parent`, given the deepest existing
/// direct child. First subtask of a parent gets `"<parent>.1"`.
pub fn next_child(parent: &str, deepest_sibling: Option<&str>) -> String {
    match deepest_sibling {
        None => format!("{parent}.1"),
        Some(sibling) => match parent_of(sibling) {
            Some(prefix) => format!("{}.{}", prefix, increment(last_segment(sibling))),
            None => increment(sibling),
        },
    }
}

/// Explicit sibling renumbering used when flattening a client-assembled
/// batch: `"<parentOutline>.<1-based index>"`.
pub fn child_at(parent: &str, index: usize) -> String {
    format!("{}.{}", parent, index + 1)
}

/// The outline number of the parent, or None for a root task.
pub fn parent_of(outline: &str) -> Option<&str> {
    outline.rsplit_once('.').map(|(prefix, _)| prefix)
}

pub fn first_segment(outline: &str) -> &str {
    outline.split('.').next().unwrap_or(outline)
}

pub fn last_segment(outline: &str) -> &str {
    outline.rsplit('.').next().unwrap_or(outline)
}

/// Number of dotted segments; roots have depth 1.
pub fn depth(outline: &str) -> usize {
    outline.split('.').count()
}

/// True if `outline` is a strict descendant of `ancestor`. The prefix match
/// requires the trailing dot, so a task never matches itself.
pub fn is_descendant(outline: &str, ancestor: &str) -> bool {
    outline.len() > ancestor.len() + 1
        && outline.starts_with(ancestor)
        && outline.as_bytes()[ancestor.len()] == b'.'
}

/// True if `outline` is a direct child of `parent`.
pub fn is_child_of(outline: &str, parent: &str) -> bool {
    is_descendant(outline, parent) && depth(outline) == depth(parent) + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_wise_ordering_beats_lexicographic() {
        assert_eq!(compare("2.9", "2.10"), Ordering::Less);
        assert_eq!(compare("2.10", "2.9"), Ordering::Greater);
        assert_eq!(compare("2", "10"), Ordering::Less);
        assert_eq!(compare("1.2.3", "1.2.3"), Ordering::Equal);
    }

    #[test]
    fn prefix_sorts_before_descendants() {
        assert_eq!(compare("2", "2.1"), Ordering::Less);
        assert_eq!(compare("2.1.5", "2.1"), Ordering::Greater);
    }

    #[test]
    fn arbitrarily_wide_segments() {
        let wide = "99999999999999999999999999999";
        assert_eq!(compare(wide, "100"), Ordering::Greater);
        assert_eq!(increment(wide), "100000000000000000000000000000");
    }

    #[test]
    fn increment_carries() {
        assert_eq!(increment("1"), "2");
        assert_eq!(increment("9"), "10");
        assert_eq!(increment("199"), "200");
    }

    #[test]
    fn root_numbering() {
        assert_eq!(next_root(None), "1");
        assert_eq!(next_root(Some("1")), "2");
        assert_eq!(next_root(Some("12")), "13");
    }

    #[test]
    fn child_numbering() {
        assert_eq!(next_child("1", None), "1.1");
        assert_eq!(next_child("1", Some("1.1")), "1.2");
        assert_eq!(next_child("2.3", Some("2.3.9")), "2.3.10");
    }

    #[test]
    fn explicit_sibling_index() {
        assert_eq!(child_at("2.3", 0), "2.3.1");
        assert_eq!(child_at("2.3", 4), "2.3.5");
    }

    #[test]
    fn descendant_matching_excludes_self_and_lookalikes() {
        assert!(is_descendant("2.3.1", "2.3"));
        assert!(!is_descendant("2.3", "2.3"));
        // "2.30" must not match the "2.3" prefix
        assert!(!is_descendant("2.30", "2.3"));
        assert!(is_child_of("2.3.1", "2.3"));
        assert!(!is_child_of("2.3.1.1", "2.3"));
    }

    #[test]
    fn parent_extraction() {
        assert_eq!(parent_of("2.3.1"), Some("2.3"));
        assert_eq!(parent_of("2"), None);
        assert_eq!(last_segment("2.3.1"), "1");
        assert_eq!(depth("2.3.1"), 3);
    }
}
