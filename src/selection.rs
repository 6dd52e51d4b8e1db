//! Free-text course selection: `all`, single numbers, and `a-b` ranges
//! (descending allowed), separated by ASCII or full-width commas.
//!
//! Tokens that do not parse, and indices outside `1..=N`, are dropped
//! silently. Earlier selections win over later duplicates.

use std::collections::HashSet;

const FULL_WIDTH_COMMA: char = '，';

/// Returns the courses picked by `expression`, in first-occurrence order.
pub fn select<T: Clone>(courses: &[T], expression: &str) -> Vec<T> {
    select_indices(courses.len(), expression)
        .into_iter()
        .map(|index| courses[index - 1].clone())
        .collect()
}

/// 1-based indices into a collection of `count` items.
pub fn select_indices(count: usize, expression: &str) -> Vec<usize> {
    let expression = expression.trim();
    if count == 0 || expression.is_empty() {
        return Vec::new();
    }
    if expression.eq_ignore_ascii_case("all") {
        return (1..=count).collect();
    }

    let normalized = expression.replace(FULL_WIDTH_COMMA, ",");
    let mut picked = Vec::new();
    let mut seen = HashSet::new();
    for token in normalized.split(',') {
        for index in expand_token(token.trim(), count) {
            if (1..=count).contains(&index) && seen.insert(index) {
                picked.push(index);
            }
        }
    }
    picked
}

/// Indices named by one token. Range ends past `count` are clamped, which
/// yields the same in-bounds indices as expanding and filtering.
fn expand_token(token: &str, count: usize) -> Vec<usize> {
    if token.is_empty() {
        return Vec::new();
    }
    if let Ok(single) = token.parse::<usize>() {
        return vec![single];
    }

    let Some((start, end)) = token.split_once('-') else {
        return Vec::new();
    };
    let (Some(start), Some(end)) = (range_bound(start), range_bound(end)) else {
        return Vec::new();
    };
    if start <= end {
        (start..=end.min(count)).collect()
    } else {
        (end..=start.min(count)).rev().collect()
    }
}

/// A range end. Integers too large for `usize` still lie past any `count`.
fn range_bound(raw: &str) -> Option<usize> {
    let raw = raw.trim();
    match raw.parse::<usize>() {
        Ok(value) => Some(value),
        Err(_) if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) => Some(usize::MAX),
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn five() -> Vec<String> {
        (1..=5).map(|i| format!("C{i}")).collect()
    }

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn all_selects_everything_in_order() {
        assert_eq!(select(&five(), "all"), five());
        assert_eq!(select(&five(), "  ALL "), five());
        assert_eq!(select(&five(), "All"), five());
    }

    #[test]
    fn single_number() {
        assert_eq!(select(&five(), "3"), names(&["C3"]));
    }

    #[test]
    fn ascending_range() {
        assert_eq!(select(&five(), "1-3"), names(&["C1", "C2", "C3"]));
    }

    #[test]
    fn descending_range() {
        assert_eq!(select(&five(), "5-3"), names(&["C5", "C4", "C3"]));
    }

    #[test]
    fn mixed_list_and_range() {
        assert_eq!(select(&five(), "1,3-5"), names(&["C1", "C3", "C4", "C5"]));
    }

    #[test]
    fn duplicates_keep_first_position() {
        assert_eq!(select(&five(), "2,2-4"), names(&["C2", "C3", "C4"]));
        assert_eq!(select(&five(), "4,1-5"), names(&["C4", "C1", "C2", "C3", "C5"]));
    }

    #[test]
    fn malformed_and_out_of_range_tokens_are_dropped() {
        assert_eq!(select(&five(), "2,abc,6-8"), names(&["C2"]));
        assert!(select(&five(), "0,6").is_empty());
        assert!(select(&five(), "1-x,-,3--4").is_empty());
    }

    #[test]
    fn range_partially_out_of_bounds_keeps_valid_part() {
        assert_eq!(select(&five(), "4-7"), names(&["C4", "C5"]));
        assert_eq!(select(&five(), "6-4"), names(&["C5", "C4"]));
        assert_eq!(select(&five(), "3-18446744073709551615"), names(&["C3", "C4", "C5"]));
        assert_eq!(select(&five(), "1-99999999999999999999"), five());
        assert_eq!(select(&five(), "99999999999999999999-3"), names(&["C5", "C4", "C3"]));
        assert!(select(&five(), "99999999999999999999").is_empty());
    }

    #[test]
    fn full_width_comma_separates() {
        assert_eq!(select(&five(), "1，5"), names(&["C1", "C5"]));
    }

    #[test]
    fn empty_expression_selects_nothing() {
        assert!(select(&five(), "").is_empty());
        assert!(select(&five(), "   ").is_empty());
    }

    #[test]
    fn empty_collection_selects_nothing() {
        let empty: Vec<String> = Vec::new();
        assert!(select(&empty, "1-3").is_empty());
        assert!(select(&empty, "all").is_empty());
    }

    #[test]
    fn indices_are_in_bounds_and_unique() {
        let expressions = [
            "all", "1-9", "9-1", "3,3,3", "2，4,1-2", "x,1,,5-5", "10,0,-1", " 7 - 2 ",
        ];
        for count in 0..8 {
            for expr in expressions {
                let picked = select_indices(count, expr);
                let unique: HashSet<_> = picked.iter().collect();
                assert_eq!(unique.len(), picked.len(), "{expr} over {count}");
                assert!(picked.iter().all(|i| (1..=count).contains(i)));
            }
        }
    }

    #[test]
    fn tokens_may_carry_spaces() {
        assert_eq!(select_indices(5, " 1 , 3 - 4 "), vec![1, 3, 4]);
    }
}
