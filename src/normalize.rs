//! Pattern normalization
//!
//! String-level rewrites applied before a pattern is sent to the query
//! engine: leading-slash cleanup, case-insensitive attribute tests and
//! the appended metadata filter predicates. None of these need a parse,
//! and all of them pass malformed input through untouched.

use std::sync::LazyLock;

use memchr::memmem;
use regex::Regex;

use crate::filters::{FilterSpec, compile_filters};

/// Attribute marking a node test as case insensitive
pub const CASE_INSENSITIVE_MARKER: &str = r#"@caseinsensitive="yes""#;

static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"\s*\band\s+@caseinsensitive="yes"|@caseinsensitive="yes"\s+and\b\s*|@caseinsensitive="yes""#,
    )
    .expect("valid marker regex")
});

static LEXICAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"@(word|lemma)="([^"]+)""#).expect("valid lexical regex"));

/// Normalize a pattern and its original (pre-filter) form.
///
/// Both get the same treatment: leading slashes are collapsed and replaced
/// by `//` (`descendant`) or `/`, and case-insensitive node tests are
/// rewritten to compare lower-cased values.
pub fn normalize(pattern: &str, original: &str, descendant: bool) -> (String, String) {
    let normalize_one = |p: &str| apply_case_insensitive(&with_prefix(p, descendant));
    (normalize_one(pattern), normalize_one(original))
}

/// Replace any run of leading slashes by exactly one axis prefix
pub fn with_prefix(pattern: &str, descendant: bool) -> String {
    let bare = strip_slashes(pattern);
    let prefix = if descendant { "//" } else { "/" };
    format!("{}{}", prefix, bare)
}

/// The pattern without any leading slashes or surrounding whitespace
pub fn strip_slashes(pattern: &str) -> &str {
    pattern.trim().trim_start_matches('/')
}

/// Append the compiled metadata filters to a pattern
pub fn attach_filters(pattern: &str, filters: &[FilterSpec]) -> String {
    format!("{}{}", pattern, compile_filters(filters))
}

/// Rewrite node tests carrying `@caseinsensitive="yes"`.
///
/// Each `node[` opens a segment that runs to the next `node[` or `]`.
/// In a segment holding the marker, the marker is removed and a
/// `@word`/`@lemma` equality becomes `lower-case(@word)="<lower-cased>"`.
/// Other segments are copied unchanged.
pub fn apply_case_insensitive(pattern: &str) -> String {
    if !pattern.contains(CASE_INSENSITIVE_MARKER) {
        return pattern.to_string();
    }

    let bytes = pattern.as_bytes();
    let starts: Vec<usize> = memmem::find_iter(bytes, b"node[").map(|i| i + 5).collect();

    let mut out = String::with_capacity(pattern.len());
    let mut copied = 0;
    for (n, &start) in starts.iter().enumerate() {
        let next_node = starts.get(n + 1).map(|&s| s - 5).unwrap_or(bytes.len());
        let end = memchr::memchr(b']', &bytes[start..next_node])
            .map(|i| start + i)
            .unwrap_or(next_node);

        // unterminated last segment
        if end == bytes.len() {
            continue;
        }

        let segment = &pattern[start..end];
        if !segment.contains(CASE_INSENSITIVE_MARKER) {
            continue;
        }

        let rewritten = rewrite_segment(segment);
        if rewritten.trim().is_empty() && bytes.get(end) == Some(&b']') {
            // node[@caseinsensitive="yes"] -> node
            out.push_str(&pattern[copied..start - 1]);
            copied = end + 1;
        } else {
            out.push_str(&pattern[copied..start]);
            out.push_str(&rewritten);
            copied = end;
        }
    }
    out.push_str(&pattern[copied..]);
    out
}

fn rewrite_segment(segment: &str) -> String {
    let stripped = MARKER_RE.replace_all(segment, "");
    if !(stripped.contains("@word") || stripped.contains("@lemma")) {
        return stripped.into_owned();
    }
    LEXICAL_RE
        .replace_all(&stripped, |caps: &regex::Captures| {
            format!(r#"lower-case(@{})="{}""#, &caps[1], caps[2].to_lowercase())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_collapses_slashes() {
        assert_eq!(with_prefix(r#"node[@cat="np"]"#, true), r#"//node[@cat="np"]"#);
        assert_eq!(with_prefix(r#"////node[@cat="np"]"#, false), r#"/node[@cat="np"]"#);
        assert_eq!(with_prefix(r#"/node[@cat="np"]"#, true), r#"//node[@cat="np"]"#);

        let once = with_prefix("node", true);
        assert_eq!(with_prefix(&once, true), once);
    }

    #[test]
    fn test_case_insensitive_word() {
        let (pattern, original) = normalize(
            r#"node[@word="Huis" and @caseinsensitive="yes"]"#,
            r#"node[@word="Huis" and @caseinsensitive="yes"]"#,
            true,
        );
        assert_eq!(pattern, r#"//node[lower-case(@word)="huis"]"#);
        assert_eq!(original, pattern);
    }

    #[test]
    fn test_case_insensitive_marker_first() {
        let rewritten =
            apply_case_insensitive(r#"//node[@caseinsensitive="yes" and @lemma="Amsterdam"]"#);
        assert_eq!(rewritten, r#"//node[lower-case(@lemma)="amsterdam"]"#);
    }

    #[test]
    fn test_case_insensitive_only_marked_group() {
        let pattern = r#"//node[@cat="np" and node[@rel="det" and @word="De"] and node[@rel="hd" and @word="Stad" and @caseinsensitive="yes"]]"#;
        let rewritten = apply_case_insensitive(pattern);
        assert_eq!(
            rewritten,
            r#"//node[@cat="np" and node[@rel="det" and @word="De"] and node[@rel="hd" and lower-case(@word)="stad"]]"#
        );
    }

    #[test]
    fn test_case_insensitive_without_lexical_attribute() {
        let rewritten = apply_case_insensitive(r#"//node[@pt="n" and @caseinsensitive="yes"]"#);
        assert_eq!(rewritten, r#"//node[@pt="n"]"#);

        let rewritten =
            apply_case_insensitive(r#"//node[@cat="np" and node[@caseinsensitive="yes"]]"#);
        assert_eq!(rewritten, r#"//node[@cat="np" and node]"#);
    }

    #[test]
    fn test_unterminated_segment_untouched() {
        let pattern = r#"//node[@word="Huis" and @caseinsensitive="yes""#;
        assert_eq!(apply_case_insensitive(pattern), pattern);

        let pattern = r#"//node[@cat="np" and node[@word="Huis" and @caseinsensitive="yes" and node[@rel="hd""#;
        assert_eq!(
            apply_case_insensitive(pattern),
            r#"//node[@cat="np" and node[lower-case(@word)="huis" and node[@rel="hd""#
        );
    }

    #[test]
    fn test_untouched_without_marker() {
        let pattern = r#"//node[@word="Huis"]]["#;
        assert_eq!(apply_case_insensitive(pattern), pattern);
    }

    #[test]
    fn test_attach_filters() {
        let filters = vec![FilterSpec::Single {
            field: "genre".to_string(),
            value: "news".to_string(),
        }];
        let pattern = attach_filters(r#"//node[@cat="np"]"#, &filters);
        assert_eq!(
            pattern,
            r#"//node[@cat="np"][ancestor::alpino_ds/metadata/meta[@name="genre" and @value="news"]]"#
        );
    }
}
