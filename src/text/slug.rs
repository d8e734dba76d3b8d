use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

const MAX_SLUG_LEN: usize = 60;
const FALLBACK_SLUG: &str = "question";

static DISALLOWED: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9\s-]").expect("static regex"));
static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-\s]+").expect("static regex"));

/// Lower-cased base character with diacritics removed.
pub fn fold_char(c: char) -> char {
    let base = c.nfd().next().unwrap_or(c);
    base.to_lowercase().next().unwrap_or(base)
}

/// URL slug for a question title: ascii, hyphenated, at most 60 characters.
pub fn slugify(title: &str) -> String {
    let expanded = title
        .replace(['œ', 'Œ'], "oe")
        .replace(['æ', 'Æ'], "ae");
    let ascii: String = expanded
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();
    let spaced = DISALLOWED.replace_all(&ascii, " ");
    let hyphenated = SEPARATORS.replace_all(&spaced, "-");
    // ascii only at this point, so byte slicing is safe
    let trimmed = hyphenated.trim_matches('-');
    let capped = &trimmed[..trimmed.len().min(MAX_SLUG_LEN)];
    let slug = capped.trim_end_matches('-');
    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug.to_string()
    }
}

/// Slug for a hit, falling back to `question-{id}` when the title is missing.
pub fn question_slug(title: Option<&str>, question_id: i64) -> String {
    match title.map(str::trim).filter(|t| !t.is_empty()) {
        Some(t) => slugify(t),
        None => slugify(&format!("question-{question_id}")),
    }
}
