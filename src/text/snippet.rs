//! Excerpt cleaning: raw matched text in, display excerpt out.

use once_cell::sync::Lazy;
use regex::Regex;

/// Separator the FTS backend puts between matched fragments.
pub const FRAGMENT_SEPARATOR: char = '…';

/// Safety bound on pathological inputs, in characters.
pub const MAX_TEXT_CHARS: usize = 20_000;

const JOINED_SEPARATOR: &str = " … ";

// Upper bound on dedupe/strip rounds; two suffice in practice.
const MAX_PASSES: usize = 4;
const MAX_BOILERPLATE_PASSES: usize = 2;

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

static SPACE_BEFORE_PUNCT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+([,;:.!?])").expect("static regex"));

// Leading labels, possibly stacked, with the punctuation and ellipsis debris
// that surrounds them.
static LEADING_BOILERPLATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^[\s\-–—:…]*(?:(?:titre\s+de\s+la\s+contribution\s*[:\-–]?|titre\s*:|title\s*:|objet\s*:|subject\s*:|th[eé]matique\s*:)[\s\-–—:…]*)*",
    )
    .expect("static regex")
});

/// Cut `s` to at most `max_chars` characters.
pub fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &s[..byte_idx],
        None => s,
    }
}

/// Cut to `max_chars` and flatten line breaks. Returns whether anything was cut.
pub fn clean_preview(s: &str, max_chars: usize) -> (String, bool) {
    let cut = truncate(s, max_chars);
    let was_cut = cut.len() < s.len();
    (cut.replace(['\r', '\n'], " "), was_cut)
}

fn compact(s: &str) -> String {
    let collapsed = WHITESPACE_RUN.replace_all(s, " ");
    SPACE_BEFORE_PUNCT
        .replace_all(collapsed.trim(), "$1")
        .into_owned()
}

/// Drop consecutive duplicate fragments and normalize separators and spacing.
pub fn dedupe_segments(s: &str) -> String {
    let mut kept: Vec<String> = Vec::new();
    for segment in s.split(FRAGMENT_SEPARATOR) {
        let segment = compact(segment);
        if segment.is_empty() {
            continue;
        }
        if kept.last() != Some(&segment) {
            kept.push(segment);
        }
    }
    compact(&kept.join(JOINED_SEPARATOR))
}

/// Remove leading "Titre:"-style labels.
pub fn strip_leading_boilerplate(s: &str) -> String {
    let mut current = s.to_string();
    for _ in 0..MAX_BOILERPLATE_PASSES {
        let stripped = LEADING_BOILERPLATE.replace(&current, "");
        if stripped.len() == current.len() {
            break;
        }
        current = stripped.into_owned();
    }
    current
}

fn pass(s: &str) -> String {
    let deduped = if s.contains(FRAGMENT_SEPARATOR) {
        dedupe_segments(s)
    } else {
        s.to_string()
    };
    strip_leading_boilerplate(&deduped).trim().to_string()
}

/// Raw fragment to excerpt. Stripping a label can expose a duplicate fragment
/// (and the reverse), so passes repeat until the text is stable.
pub fn postprocess(raw: &str) -> String {
    let mut current = truncate(raw, MAX_TEXT_CHARS).to_string();
    for _ in 0..MAX_PASSES {
        let next = pass(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}
