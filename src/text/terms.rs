use unicode_segmentation::UnicodeSegmentation;

/// Canonical form used for popularity counters and cache keys.
pub fn normalize_query(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Split a query into lower-cased words. Punctuation and FTS operators are
/// dropped, so user input can never inject query syntax.
pub fn query_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for word in query.unicode_words() {
        let lower = word.to_lowercase();
        let cleaned: String = lower
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '\'' || *c == '’')
            .collect();
        if cleaned.chars().any(char::is_alphanumeric) && !terms.contains(&cleaned) {
            terms.push(cleaned);
        }
    }
    terms
}

/// FTS5 MATCH expression: every term quoted as a phrase, implicitly AND-ed.
/// `None` when the query has no searchable word.
pub fn match_expression(terms: &[String]) -> Option<String> {
    if terms.is_empty() {
        return None;
    }
    let quoted: Vec<String> = terms
        .iter()
        .map(|t| format!("\"{}\"", t.replace('"', "\"\"")))
        .collect();
    Some(quoted.join(" "))
}
