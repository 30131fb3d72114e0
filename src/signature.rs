//! Shape signatures
//!
//! A shape signature summarises the top category of a pattern and the
//! relation/category of its immediate children. Heavily sharded corpora
//! keep a table from signature to the shards that can contain the shape,
//! so the signature decides which shards are searched first.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::pattern::{NodeTest, Pattern};
use crate::query::parse_pattern;

/// Top category used when the pattern's root does not test `@cat`
pub const ANY_CATEGORY: &str = "ALL";

/// Patterns with more first-level children than this get no signature
pub const MAX_CHILDREN: usize = 64;

/// Canonical lookup key for a pattern's shape
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShapeSignature(String);

impl ShapeSignature {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derive the signature of a pattern string.
    ///
    /// Returns `None` when the pattern is not a node with children or does
    /// not parse; callers then search the full shard set.
    pub fn derive(pattern: &str) -> Option<Self> {
        match parse_pattern(pattern) {
            Ok(parsed) => Self::from_pattern(&parsed),
            Err(e) => {
                log::debug!("no shape signature for {:?}: {}", pattern, e);
                None
            }
        }
    }

    /// Derive the signature of an already parsed pattern
    pub fn from_pattern(pattern: &Pattern) -> Option<Self> {
        let root = &pattern.root;
        if !root.has_children() {
            return None;
        }

        let children = root.child_count();
        if children > MAX_CHILDREN {
            log::debug!("no shape signature: {} first-level children", children);
            return None;
        }

        let top = root.leading_attr_value("cat").unwrap_or(ANY_CATEGORY);

        // Children without @rel are left out, so the signature can be
        // coarser than the pattern.
        let mut tokens: Vec<String> = root.children().into_iter().filter_map(child_token).collect();
        tokens.sort();

        Some(ShapeSignature(format!("{}{}", top, tokens.join("_"))))
    }
}

fn child_token(child: &NodeTest) -> Option<String> {
    let rel = child.attr_value("rel")?;
    let category = child
        .attr_value("cat")
        .or_else(|| child.attr_value("pt"))
        .unwrap_or("");
    Some(format!("{}%{}", rel, category))
}

impl fmt::Display for ShapeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ShapeSignature {
    fn from(value: &str) -> Self {
        ShapeSignature(value.to_string())
    }
}

/// Convenience wrapper around [`ShapeSignature::derive`]
pub fn derive_signature(pattern: &str) -> Option<ShapeSignature> {
    ShapeSignature::derive(pattern)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;

    fn sig(pattern: &str) -> Option<String> {
        derive_signature(pattern).map(|s| s.as_str().to_string())
    }

    #[test]
    fn test_signature_separate_brackets() {
        let pattern =
            r#"node[@cat="smain"][node[@rel="su"][@cat="np"] node[@rel="hd"][@pt="verb"]]"#;
        assert_eq!(sig(pattern).as_deref(), Some("smainhd%verb_su%np"));
    }

    #[test]
    fn test_signature_conjunction() {
        let pattern = r#"//node[@cat="smain" and node[@rel="su" and @cat="np"] and node[@rel="hd" and @pt="verb"]]"#;
        assert_eq!(sig(pattern).as_deref(), Some("smainhd%verb_su%np"));
    }

    #[test]
    fn test_signature_sibling_order() {
        let a = r#"//node[@cat="ssub" and node[@rel="obj1" and @cat="np"] and node[@rel="su" and @pt="vnw"] and node[@rel="hd"]]"#;
        let b = r#"//node[@cat="ssub" and node[@rel="hd"] and node[@rel="su" and @pt="vnw"] and node[@rel="obj1" and @cat="np"]]"#;
        assert_eq!(sig(a), sig(b));
        assert_eq!(sig(a).as_deref(), Some("ssubhd%_obj1%np_su%vnw"));
    }

    #[test]
    fn test_signature_ignores_grandchildren() {
        let pattern = r#"//node[@cat="np" and node[@rel="det" and @pt="lid"] and node[@rel="mod" and @cat="pp" and node[@rel="hd" and @pt="vz"] and node[@rel="obj1"]]]"#;
        assert_eq!(sig(pattern).as_deref(), Some("npdet%lid_mod%pp"));
    }

    #[test]
    fn test_signature_without_top_category() {
        let pattern = r#"//node[node[@rel="hd" and @pt="ww"] and node[@rel="su"]]"#;
        assert_eq!(sig(pattern).as_deref(), Some("ALLhd%ww_su%"));
    }

    #[test]
    fn test_signature_children_without_rel() {
        let pattern = r#"//node[@cat="pp" and node[@pt="vz"] and node[@rel="obj1" and @cat="np"]]"#;
        assert_eq!(sig(pattern).as_deref(), Some("ppobj1%np"));

        let pattern = r#"//node[@cat="pp" and node[@pt="vz"]]"#;
        assert_eq!(sig(pattern).as_deref(), Some("pp"));
    }

    #[test]
    fn test_signature_count_expansion() {
        let pattern = r#"//node[@cat="np" and count(node[@rel="mod" and @pt="adj"]) > 2 and node[@rel="hd"]]"#;
        assert_eq!(sig(pattern).as_deref(), Some("nphd%_mod%adj_mod%adj"));
    }

    #[test]
    fn test_signature_child_limit() {
        let pattern = r#"//node[@cat="np" and count(node[@rel="mod" and @pt="adj"]) > 5000000]"#;
        assert_eq!(sig(pattern), None);

        let pattern = format!(r#"//node[@cat="np" and count(node[@rel="mod"]) > {}]"#, MAX_CHILDREN);
        let signature = sig(&pattern).unwrap();
        assert_eq!(signature.matches("mod%").count(), MAX_CHILDREN);

        let pattern = r#"//node[@cat="np" and count(node[@rel="mod"]) > 99999999999999999999999]"#;
        assert_eq!(sig(pattern), None);
    }

    #[test]
    fn test_signature_top_category_before_children() {
        assert_eq!(sig(r#"//node[node[@rel="su"] and @cat="np"]"#).as_deref(), Some("ALLsu%"));
        assert_eq!(sig(r#"//node[@cat="np" and node[@rel="su"]]"#).as_deref(), Some("npsu%"));
    }

    #[test]
    fn test_signature_ignores_word_order() {
        let plain = r#"//node[@cat="smain" and node[@rel="su"] and node[@rel="hd"]]"#;
        let ordered = r#"//node[@cat="smain" and node[@rel="su"] and node[@rel="hd"] and number(@begin) < number(../node[@rel="hd"]/@begin)]"#;
        assert_eq!(sig(plain), sig(ordered));
    }

    #[test]
    fn test_signature_requires_children() {
        assert_eq!(sig(r#"//node[@cat="np"]"#), None);
        assert_eq!(sig("//node"), None);
        assert_eq!(sig(r#"//node[@cat="np" and node[@rel="su"]"#), None);
        assert_eq!(sig("not a pattern"), None);
    }

    #[test]
    fn test_signature_is_stable_under_normalization() {
        let pattern = r#"node[@cat="smain" and node[@rel="su" and @word="Jan" and @caseinsensitive="yes"] and node[@rel="hd" and @pt="ww"]]"#;
        let (once, _) = normalize(pattern, pattern, true);
        let (twice, _) = normalize(&once, &once, false);

        assert_eq!(sig(&once), sig(&twice));
        assert_eq!(sig(&once), sig(pattern));
        assert_eq!(sig(&once).as_deref(), Some("smainhd%ww_su%"));
    }
}
