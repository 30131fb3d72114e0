//! Shape index and shard selection
//!
//! Maps a corpus plus a pattern's shape signature to the ordered list of
//! shards a session has to search. Corpora with a shape index search the
//! shards listed for the signature first; everything else searches the
//! selected components directly.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{Corpus, Shard};
use crate::signature::ShapeSignature;

/// Error in the corpus/component part of a request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("Unknown corpus: {0}")]
    UnknownCorpus(String),

    #[error("Unknown component {component} in corpus {corpus}")]
    UnknownComponent { corpus: String, component: String },

    #[error("Corpus {corpus} allows one component at a time, {count} selected")]
    ExclusiveComponents { corpus: String, count: usize },
}

/// Table from shape signature to the components holding that shape
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShapeIndex {
    by_signature: FxHashMap<ShapeSignature, Vec<String>>,
}

impl ShapeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the components (in search order) for a signature
    pub fn insert(&mut self, signature: impl Into<ShapeSignature>, components: Vec<String>) {
        self.by_signature.insert(signature.into(), components);
    }

    pub fn get(&self, signature: &ShapeSignature) -> Option<&[String]> {
        self.by_signature.get(signature).map(|v| v.as_slice())
    }

    pub fn entries(&self) -> impl Iterator<Item = (&ShapeSignature, &[String])> {
        self.by_signature.iter().map(|(k, v)| (k, v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.by_signature.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_signature.is_empty()
    }
}

/// Shards to search for one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardPlan {
    /// Shards for the first pass, in search order
    pub shards: Vec<Shard>,
    /// True when the first pass already is the unpruned, descendant-anywhere search
    pub fallback: bool,
    /// Shards for the fallback pass (empty when `fallback` is set)
    pub fallback_shards: Vec<Shard>,
}

/// Resolve the shards to search for a corpus, signature and selection.
///
/// Selected ids may name components or component groups. An empty
/// selection means every component of the corpus.
pub fn resolve_shards(
    corpus: &Corpus,
    signature: Option<&ShapeSignature>,
    selected: &[String],
) -> Result<ShardPlan, SelectionError> {
    let components = expand_selection(corpus, selected)?;

    if !corpus.multi_option && components.len() > 1 {
        return Err(SelectionError::ExclusiveComponents {
            corpus: corpus.id.clone(),
            count: components.len(),
        });
    }

    let Some(index) = &corpus.shape_index else {
        let shards = if components.is_empty() {
            corpus.shards.clone()
        } else {
            components
                .iter()
                .filter_map(|c| corpus.shard(c))
                .cloned()
                .collect()
        };
        return Ok(ShardPlan {
            shards,
            fallback: true,
            fallback_shards: Vec::new(),
        });
    };

    let allowed: FxHashSet<&str> = components.iter().map(String::as_str).collect();
    let is_allowed = |component: &str| allowed.is_empty() || allowed.contains(component);

    let full: Vec<Shard> = corpus
        .shards
        .iter()
        .filter(|s| is_allowed(&s.component))
        .cloned()
        .collect();

    let subset: Vec<Shard> = signature
        .and_then(|s| index.get(s))
        .unwrap_or_default()
        .iter()
        .filter(|c| is_allowed(c))
        .filter_map(|c| corpus.shard(c))
        .cloned()
        .collect();

    if subset.is_empty() {
        log::debug!(
            "corpus {}: no shape match for {:?}, searching all {} shards",
            corpus.id,
            signature.map(ShapeSignature::as_str),
            full.len()
        );
        Ok(ShardPlan {
            shards: full,
            fallback: true,
            fallback_shards: Vec::new(),
        })
    } else {
        log::debug!(
            "corpus {}: shape {:?} narrows search to {} of {} shards",
            corpus.id,
            signature.map(ShapeSignature::as_str),
            subset.len(),
            full.len()
        );
        Ok(ShardPlan {
            shards: subset,
            fallback: false,
            fallback_shards: full,
        })
    }
}

/// Expand group ids and check component ids, keeping first-seen order
fn expand_selection(corpus: &Corpus, selected: &[String]) -> Result<Vec<String>, SelectionError> {
    let mut seen = FxHashSet::default();
    let mut components = Vec::new();
    for id in selected {
        let members: Vec<&str> = if let Some(group) = corpus.group(id) {
            group.components.iter().map(String::as_str).collect()
        } else if corpus.shard(id).is_some() {
            vec![id.as_str()]
        } else {
            return Err(SelectionError::UnknownComponent {
                corpus: corpus.id.clone(),
                component: id.clone(),
            });
        };
        for member in members {
            if seen.insert(member) {
                components.push(member.to_string());
            }
        }
    }
    Ok(components)
}
