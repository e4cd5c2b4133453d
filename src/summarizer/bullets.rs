use std::cmp::Reverse;
use std::sync::LazyLock;

use regex::Regex;

pub const MAX_BULLETS: usize = 5;

static NUMBERED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+[.)]\s*(.*)$").unwrap());

/// Pull at most five bullet points out of a model's free-form answer.
///
/// Bulleted (`•`, `-`, `*`) and numbered lines win. With none, the first
/// sentences stand in. With too many, the longest are kept in their original
/// order. Short answers stay short.
pub fn extract_bullet_points(summary: &str) -> Vec<String> {
    let points: Vec<String> = summary.lines().filter_map(bullet_text).collect();

    if points.is_empty() {
        return summary
            .split('.')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .take(MAX_BULLETS)
            .map(str::to_string)
            .collect();
    }
    if points.len() <= MAX_BULLETS {
        return points;
    }

    let mut by_length: Vec<usize> = (0..points.len()).collect();
    by_length.sort_by_key(|&i| Reverse(points[i].chars().count()));
    let mut keep = by_length[..MAX_BULLETS].to_vec();
    keep.sort_unstable();
    keep.into_iter().map(|i| points[i].clone()).collect()
}

fn bullet_text(line: &str) -> Option<String> {
    let line = line.trim();
    let text = if line.starts_with(['•', '-', '*']) {
        line.trim_start_matches(['•', '-', '*']).trim()
    } else if let Some(caps) = NUMBERED_RE.captures(line) {
        caps.get(1).map_or("", |m| m.as_str()).trim()
    } else {
        return None;
    };
    (!text.is_empty()).then(|| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bullet_markers() {
        let raw = "Summary:\n• Ownership is unique\n- Borrowing is checked\n* Lifetimes are inferred";
        assert_eq!(
            extract_bullet_points(raw),
            vec!["Ownership is unique", "Borrowing is checked", "Lifetimes are inferred"]
        );
    }

    #[test]
    fn numbered_lines() {
        let raw = "1. First idea\n2) Second idea\n10. Tenth idea";
        assert_eq!(extract_bullet_points(raw), vec!["First idea", "Second idea", "Tenth idea"]);
    }

    #[test]
    fn empty_markers_are_ignored() {
        assert_eq!(extract_bullet_points("•\n- \n• Real point"), vec!["Real point"]);
    }

    #[test]
    fn sentences_when_no_bullets() {
        let raw = "One. Two. Three. Four. Five. Six. Seven.";
        assert_eq!(extract_bullet_points(raw), vec!["One", "Two", "Three", "Four", "Five"]);
    }

    #[test]
    fn fewer_than_five_are_not_padded() {
        assert_eq!(extract_bullet_points("• only\n• two").len(), 2);
    }

    #[test]
    fn longest_five_keep_order() {
        let raw = "• aaaa\n• b\n• cccccc\n• dd\n• eeeee\n• ffffffff\n• ggg";
        assert_eq!(
            extract_bullet_points(raw),
            vec!["aaaa", "cccccc", "eeeee", "ffffffff", "ggg"]
        );
    }

    #[test]
    fn empty_summary() {
        assert!(extract_bullet_points("").is_empty());
        assert!(extract_bullet_points(" . . ").is_empty());
    }
}
