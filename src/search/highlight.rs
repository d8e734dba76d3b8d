use serde::{Deserialize, Serialize};

use crate::text::fold_char;

/// A highlight range representing a match in the excerpt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HighlightRange {
    /// Byte offset of the match start.
    pub start: usize,
    /// Byte offset of the match end (exclusive).
    pub end: usize,
}

/// Find all occurrences of query terms in the text, ignoring case and
/// diacritics. Returns non-overlapping ranges over the original bytes,
/// sorted by start position.
pub fn find_highlights(text: &str, terms: &[String]) -> Vec<HighlightRange> {
    // (byte start, byte end, folded char) for every char of the text
    let folded: Vec<(usize, usize, char)> = text
        .char_indices()
        .map(|(i, c)| (i, i + c.len_utf8(), fold_char(c)))
        .collect();
    let mut ranges: Vec<HighlightRange> = Vec::new();

    for term in terms {
        let needle: Vec<char> = term.chars().map(fold_char).collect();
        if needle.is_empty() || needle.len() > folded.len() {
            continue;
        }
        let mut i = 0;
        while i + needle.len() <= folded.len() {
            let matches = folded[i..i + needle.len()]
                .iter()
                .zip(&needle)
                .all(|((_, _, c), n)| c == n);
            if matches {
                ranges.push(HighlightRange {
                    start: folded[i].0,
                    end: folded[i + needle.len() - 1].1,
                });
                i += needle.len();
            } else {
                i += 1;
            }
        }
    }

    ranges.sort_by_key(|r| r.start);
    merge_overlapping(ranges)
}

fn merge_overlapping(ranges: Vec<HighlightRange>) -> Vec<HighlightRange> {
    let mut merged: Vec<HighlightRange> = Vec::with_capacity(ranges.len());
    for r in ranges {
        match merged.last_mut() {
            Some(last) if r.start <= last.end => last.end = last.end.max(r.end),
            _ => merged.push(r),
        }
    }
    merged
}
