//! Query engine interface
//!
//! The tree-query execution engine is an external service. A session
//! only needs one operation from it: run a pattern against one shard and
//! return a bounded slice of the matches.

use std::sync::Mutex;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Shard;

/// Error reported by a query engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The query failed for this shard only
    #[error("Query on shard {shard} failed: {message}")]
    Query { shard: String, message: String },

    /// The engine could not be reached at all
    #[error("Query engine unavailable: {0}")]
    Unavailable(String),
}

/// One bounded query against one shard
#[derive(Debug, Clone, Copy)]
pub struct ShardQuery<'a> {
    pub pattern: &'a str,
    pub shard: &'a Shard,
    pub offset: usize,
    pub limit: usize,
    /// Ask for the neighbouring sentences as context
    pub context: bool,
}

/// One result row as returned by the engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawHit {
    /// `<fileId>-endPos=<offset|all>+match=<n>`
    pub id: String,
    /// Sentence text, with the hit wrapped in `<em>` when context was asked for
    pub sentence: String,
    /// Dash-separated ids of the matched nodes
    pub node_ids: String,
    /// Dash-separated token start positions of the matched nodes
    pub begins: String,
    pub tree_xml: String,
    pub meta_xml: String,
    pub variables_xml: String,
}

/// Tree-query execution engine
pub trait QueryEngine {
    fn query(&self, query: &ShardQuery<'_>) -> Result<Vec<RawHit>, EngineError>;
}

impl<E: QueryEngine + ?Sized> QueryEngine for &E {
    fn query(&self, query: &ShardQuery<'_>) -> Result<Vec<RawHit>, EngineError> {
        (**self).query(query)
    }
}

/// Query as seen by [`MemoryEngine`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedQuery {
    pub pattern: String,
    pub component: String,
    pub offset: usize,
    pub limit: usize,
}

/// In-memory engine serving fixed hit lists per component.
///
/// The pattern is not evaluated; every query against a component pages
/// through that component's hits. Useful for fixtures and demos.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    hits: FxHashMap<String, Vec<RawHit>>,
    failing: FxHashSet<String>,
    unavailable: bool,
    log: Mutex<Vec<RecordedQuery>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the hits served for a component
    pub fn with_hits(mut self, component: &str, hits: Vec<RawHit>) -> Self {
        self.hits.insert(component.to_string(), hits);
        self
    }

    /// Make every query against a component fail
    pub fn with_failing(mut self, component: &str) -> Self {
        self.failing.insert(component.to_string());
        self
    }

    /// Make every query fail as if the engine were down
    pub fn set_unavailable(&mut self, unavailable: bool) {
        self.unavailable = unavailable;
    }

    /// Queries received so far, oldest first
    pub fn queries(&self) -> Vec<RecordedQuery> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }
}

impl QueryEngine for MemoryEngine {
    fn query(&self, query: &ShardQuery<'_>) -> Result<Vec<RawHit>, EngineError> {
        if self.unavailable {
            return Err(EngineError::Unavailable("memory engine switched off".to_string()));
        }

        let component = &query.shard.component;
        if let Ok(mut log) = self.log.lock() {
            log.push(RecordedQuery {
                pattern: query.pattern.to_string(),
                component: component.clone(),
                offset: query.offset,
                limit: query.limit,
            });
        }

        if self.failing.contains(component) {
            return Err(EngineError::Query {
                shard: component.clone(),
                message: "shard failure".to_string(),
            });
        }

        let hits = self.hits.get(component).map(Vec::as_slice).unwrap_or_default();
        Ok(hits
            .iter()
            .skip(query.offset)
            .take(query.limit)
            .cloned()
            .collect())
    }
}

/// Build a raw hit with the given id and sentence and no tree data
pub fn raw_hit(id: &str, sentence: &str) -> RawHit {
    RawHit {
        id: id.to_string(),
        sentence: sentence.to_string(),
        ..RawHit::default()
    }
}
