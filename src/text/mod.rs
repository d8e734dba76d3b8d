//! Pure text helpers: excerpt cleaning, slugs and query terms. No I/O.

pub mod slug;
pub mod snippet;
pub mod terms;

pub use slug::{fold_char, question_slug, slugify};
pub use snippet::{clean_preview, dedupe_segments, postprocess, strip_leading_boilerplate, truncate};
pub use terms::{match_expression, normalize_query, query_terms};
