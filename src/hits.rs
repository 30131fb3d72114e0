//! Hit mapping
//!
//! Converts raw engine rows into `Hit` records: integer node lists,
//! metadata and variable maps, and a highlighted sentence.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::engine::RawHit;

/// Tag wrapped around matched runs of words
pub const HIGHLIGHT_TAG: &str = "strong";

static HIT_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-endPos=(\d+|all)\+match=\d+$").expect("valid hit id regex"));

static CONTEXT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^(.*<em>)(.*?)(</em>.*)$").expect("valid context regex"));

static ELEMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(meta|var)\b([^>]*)>").expect("valid element regex"));

static ATTRIBUTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_][\w:.-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid attribute regex")
});

/// A search result ready for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hit {
    pub id: String,
    /// Component of the shard that produced the hit
    pub shard_id: String,
    pub file_id: String,
    /// Component guessed from the hit id; not reliable for every corpus
    pub component: String,
    pub sentence: String,
    pub highlighted_sentence: String,
    pub node_ids: Vec<u64>,
    pub node_starts: Vec<usize>,
    pub tree_xml: String,
    pub meta_values: BTreeMap<String, String>,
    pub variable_values: BTreeMap<String, BTreeMap<String, String>>,
}

/// Map a raw engine row from the given shard into a `Hit`
pub fn map_hit(raw: &RawHit, shard_id: &str) -> Hit {
    let node_starts: Vec<usize> = parse_id_list(&raw.begins);
    Hit {
        id: raw.id.clone(),
        shard_id: shard_id.to_string(),
        file_id: HIT_SUFFIX_RE.replace(&raw.id, "").into_owned(),
        component: raw
            .id
            .split('-')
            .next()
            .unwrap_or_default()
            .to_uppercase(),
        sentence: raw.sentence.clone(),
        highlighted_sentence: highlight_sentence(&raw.sentence, &node_starts, HIGHLIGHT_TAG),
        node_ids: parse_id_list(&raw.node_ids),
        node_starts,
        tree_xml: raw.tree_xml.clone(),
        meta_values: parse_meta(&raw.meta_xml),
        variable_values: parse_variables(&raw.variables_xml),
    }
}

/// `"3-4-7"` -> `[3, 4, 7]`; entries that are not numbers are skipped
pub fn parse_id_list<T: atoi::FromRadix10SignedChecked>(list: &str) -> Vec<T> {
    list.split('-')
        .filter_map(|item| atoi::atoi::<T>(item.trim().as_bytes()))
        .collect()
}

/// Wrap each run of consecutive matched words in one `<tag>...</tag>`.
///
/// When the sentence carries context (`before<em>hit</em>after`), only
/// the part between the markers is highlighted and the rest is put back
/// around it unchanged.
pub fn highlight_sentence(sentence: &str, starts: &[usize], tag: &str) -> String {
    let (prefix, body, suffix) = match CONTEXT_RE.captures(sentence) {
        Some(caps) => (
            caps.get(1).map(|m| m.as_str()),
            caps.get(2).map_or("", |m| m.as_str()),
            caps.get(3).map(|m| m.as_str()),
        ),
        None => (None, sentence, None),
    };

    let matched: FxHashSet<usize> = starts.iter().copied().collect();
    let is_matched = |i: usize| matched.contains(&i);

    let words: Vec<String> = body
        .split(' ')
        .enumerate()
        .map(|(i, word)| {
            if !is_matched(i) {
                return word.to_string();
            }
            let mut value = String::with_capacity(word.len() + 2 * tag.len() + 5);
            if i == 0 || !is_matched(i - 1) {
                value.push_str(&format!("<{}>", tag));
            }
            value.push_str(word);
            if !is_matched(i + 1) {
                value.push_str(&format!("</{}>", tag));
            }
            value
        })
        .collect();
    let highlighted = words.join(" ");

    match (prefix, suffix) {
        (Some(prefix), Some(suffix)) => format!("{} {} {}", prefix, highlighted, suffix),
        _ => highlighted,
    }
}

/// `<meta type="text" name="genre" value="news"/>...` -> `{genre: news}`
pub fn parse_meta(xml: &str) -> BTreeMap<String, String> {
    elements(xml, "meta")
        .filter_map(|mut attrs| {
            let name = attrs.remove("name")?;
            let value = attrs.remove("value").unwrap_or_default();
            Some((name, value))
        })
        .collect()
}

/// `<vars><var name="$node1" pos="verb" lemma="lopen"/></vars>` -> `{$node1: {...}}`
pub fn parse_variables(xml: &str) -> BTreeMap<String, BTreeMap<String, String>> {
    elements(xml, "var")
        .filter_map(|attrs| {
            let name = attrs.get("name")?.clone();
            Some((name, attrs))
        })
        .collect()
}

fn elements<'a>(
    xml: &'a str,
    element: &'a str,
) -> impl Iterator<Item = BTreeMap<String, String>> + 'a {
    ELEMENT_RE
        .captures_iter(xml)
        .filter(move |caps| &caps[1] == element)
        .map(|caps| {
            ATTRIBUTE_RE
                .captures_iter(&caps[2])
                .map(|attr| {
                    let value = attr.get(2).or_else(|| attr.get(3)).map_or("", |m| m.as_str());
                    (attr[1].to_string(), unescape(value))
                })
                .collect()
        })
}

fn unescape(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }
    value
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Count metadata values over a set of hits: field -> value -> hits
pub fn metadata_counts<'a>(
    hits: impl IntoIterator<Item = &'a Hit>,
) -> BTreeMap<String, BTreeMap<String, usize>> {
    let mut counts: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();
    for hit in hits {
        for (field, value) in &hit.meta_values {
            *counts
                .entry(field.clone())
                .or_default()
                .entry(value.clone())
                .or_default() += 1;
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id_list() {
        assert_eq!(parse_id_list::<u64>("3-4-17"), vec![3, 4, 17]);
        assert_eq!(parse_id_list::<usize>("0"), vec![0]);
        assert_eq!(parse_id_list::<usize>(""), Vec::<usize>::new());
        assert_eq!(parse_id_list::<usize>("2-x-5"), vec![2, 5]);
    }

    #[test]
    fn test_highlight_merges_runs() {
        let sentence = "de grote hond loopt snel weg";
        assert_eq!(
            highlight_sentence(sentence, &[1, 2, 4], "strong"),
            "de <strong>grote hond</strong> loopt <strong>snel</strong> weg"
        );
        assert_eq!(
            highlight_sentence(sentence, &[0, 1, 2, 3, 4, 5], "strong"),
            "<strong>de grote hond loopt snel weg</strong>"
        );
        assert_eq!(highlight_sentence(sentence, &[], "strong"), sentence);
    }

    #[test]
    fn test_highlight_with_context() {
        let sentence = "Eerste zin. <em>de hond loopt</em> Laatste zin.";
        assert_eq!(
            highlight_sentence(sentence, &[1], "strong"),
            "Eerste zin. <em> de <strong>hond</strong> loopt </em> Laatste zin."
        );
    }

    #[test]
    fn test_parse_meta() {
        let xml = r#"<meta type="text" name="genre" value="news &amp; views"/><meta type="int" name="year" value="1999"/>"#;
        let meta = parse_meta(xml);
        assert_eq!(meta.len(), 2);
        assert_eq!(meta["genre"], "news & views");
        assert_eq!(meta["year"], "1999");
        assert!(parse_meta("").is_empty());
    }

    #[test]
    fn test_parse_variables() {
        let xml = r#"<vars><var name="$node1" pos="verb" lemma="lopen"/><var name="$node2" pos="noun" lemma="hond"/></vars>"#;
        let vars = parse_variables(xml);
        assert_eq!(vars.len(), 2);
        assert_eq!(vars["$node1"]["lemma"], "lopen");
        assert_eq!(vars["$node2"]["pos"], "noun");
        assert!(parse_variables("").is_empty());
    }

    #[test]
    fn test_map_hit() {
        let raw = RawHit {
            id: "wiki-1234.p.2.s.1-endPos=all+match=3".to_string(),
            sentence: "de hond blaft".to_string(),
            node_ids: "5-6".to_string(),
            begins: "1-2".to_string(),
            tree_xml: "<node/>".to_string(),
            meta_xml: r#"<meta name="genre" value="wiki"/>"#.to_string(),
            variables_xml: String::new(),
        };
        let hit = map_hit(&raw, "WIKI");

        assert_eq!(hit.file_id, "wiki-1234.p.2.s.1");
        assert_eq!(hit.component, "WIKI");
        assert_eq!(hit.shard_id, "WIKI");
        assert_eq!(hit.node_ids, vec![5, 6]);
        assert_eq!(hit.node_starts, vec![1, 2]);
        assert_eq!(hit.highlighted_sentence, "de <strong>hond blaft</strong>");
        assert_eq!(hit.meta_values["genre"], "wiki");
    }

    #[test]
    fn test_metadata_counts() {
        let raw = |id: &str, genre: &str| RawHit {
            id: id.to_string(),
            meta_xml: format!(r#"<meta name="genre" value="{}"/>"#, genre),
            ..RawHit::default()
        };
        let hits = [
            map_hit(&raw("a-endPos=1+match=1", "news"), "A"),
            map_hit(&raw("b-endPos=1+match=1", "news"), "A"),
            map_hit(&raw("c-endPos=1+match=1", "wiki"), "A"),
        ];
        let counts = metadata_counts(&hits);
        assert_eq!(counts["genre"]["news"], 2);
        assert_eq!(counts["genre"]["wiki"], 1);
    }
}
