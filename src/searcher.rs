//! Incremental multi-shard search
//!
//! A search session walks an ordered queue of shards, issuing one bounded
//! query at a time and remembering where to resume:
//! 1. Query the current shard at the resume offset, capped by the flush
//!    size and the remaining global limit
//! 2. Drop hits already returned earlier in the session
//! 3. Stay on the shard after a full batch, move on after a short one
//! 4. When the queue runs dry, re-run once over the full shard set in
//!    descendant-anywhere mode if the first pass was pruned
//!
//! All progress lives in `SearchState`, a plain value that can be
//! serialized into a resume token between pages.

use std::mem;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{SearchMode, Shard};
use crate::engine::{EngineError, QueryEngine, RawHit, ShardQuery};
use crate::index::{SelectionError, ShardPlan};
use crate::normalize::with_prefix;
use crate::token::TokenError;

/// Error during a search session
#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error("Search mode {0:?} is disabled")]
    ModeDisabled(SearchMode),

    /// The engine is down; the session can be retried unchanged
    #[error("Query engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Invalid resume token: {0}")]
    InvalidResumeToken(#[from] TokenError),

    /// Session state could not be turned into a token
    #[error("Failed to encode resume token: {0}")]
    TokenEncoding(TokenError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Querying,
    Exhausted,
}

/// Progress of one search session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchState {
    pub corpus: String,
    /// Normalized pattern including metadata filters
    pub pattern: String,
    /// Normalized pattern without metadata filters
    pub original_pattern: String,
    pub shard_queue: Vec<Shard>,
    pub current_shard: usize,
    pub resume_offset: usize,
    /// Ids of every hit returned so far
    pub already: FxHashSet<String>,
    /// Whether queries use the unpruned `//` form
    pub fallback_mode: bool,
    /// Shards for the fallback pass, consumed when it starts
    pub fallback_shards: Vec<Shard>,
    /// Mode the limit was taken from; the limit is re-derived from it on resume
    #[serde(default)]
    pub mode: SearchMode,
    pub limit: usize,
    pub delivered: usize,
    pub context: bool,
    pub phase: Phase,
}

impl SearchState {
    pub fn new(
        corpus: &str,
        pattern: String,
        original_pattern: String,
        plan: ShardPlan,
        limit: usize,
    ) -> Self {
        Self {
            corpus: corpus.to_string(),
            pattern,
            original_pattern,
            shard_queue: plan.shards,
            current_shard: 0,
            resume_offset: 0,
            already: FxHashSet::default(),
            fallback_mode: plan.fallback,
            fallback_shards: plan.fallback_shards,
            mode: SearchMode::default(),
            limit,
            delivered: 0,
            context: false,
            phase: Phase::Querying,
        }
    }

    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_context(mut self, context: bool) -> Self {
        self.context = context;
        self
    }

    pub fn is_exhausted(&self) -> bool {
        self.phase == Phase::Exhausted
    }

    pub fn current(&self) -> Option<&Shard> {
        self.shard_queue.get(self.current_shard)
    }

    /// Pattern as sent to the engine in the current mode
    pub fn query_pattern(&self) -> String {
        with_prefix(&self.pattern, self.fallback_mode)
    }

    fn advance_shard(&mut self) {
        self.current_shard += 1;
        self.resume_offset = 0;
    }

    fn fallback_pending(&self) -> bool {
        !self.fallback_mode && !self.fallback_shards.is_empty()
    }

    /// Start the fallback pass if there is one; false if nothing is left
    fn start_fallback(&mut self) -> bool {
        if !self.fallback_pending() {
            return false;
        }
        log::info!(
            "corpus {}: pruned shards done, searching {} shards in fallback mode",
            self.corpus,
            self.fallback_shards.len()
        );
        self.fallback_mode = true;
        self.shard_queue = mem::take(&mut self.fallback_shards);
        self.current_shard = 0;
        self.resume_offset = 0;
        true
    }

    fn exhaust(&mut self, reason: &str) {
        if self.phase != Phase::Exhausted {
            log::info!(
                "corpus {}: search exhausted ({}), {} hits delivered",
                self.corpus,
                reason,
                self.delivered
            );
            self.phase = Phase::Exhausted;
        }
    }

    /// Mark the session exhausted if no further query could return hits
    fn settle(&mut self) {
        if self.delivered >= self.limit {
            self.exhaust("limit reached");
        } else if self.current().is_none() && !self.fallback_pending() {
            self.exhaust("no shards left");
        }
    }
}

/// Hits returned by one shard query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Component of the shard that produced the hits
    pub shard: String,
    pub hits: Vec<RawHit>,
}

/// Drives search sessions against a query engine
#[derive(Debug)]
pub struct Searcher<E> {
    engine: E,
    flush: usize,
}

impl<E: QueryEngine> Searcher<E> {
    /// Create a searcher issuing at most `flush` hits per query
    pub fn new(engine: E, flush: usize) -> Self {
        Self {
            engine,
            flush: flush.max(1),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Fetch the next batch of new hits for a session.
    ///
    /// Queries shards until one returns hits that were not seen before,
    /// the limit is reached, or no shards are left. Returns `None` once
    /// the session is exhausted. A failing shard is skipped; an
    /// unavailable engine aborts the call and leaves the current shard's
    /// position untouched.
    pub fn next_page(&self, state: &mut SearchState) -> Result<Option<Batch>, SearchError> {
        loop {
            if state.is_exhausted() {
                return Ok(None);
            }

            let remaining = state.limit.saturating_sub(state.delivered);
            if remaining == 0 {
                state.exhaust("limit reached");
                return Ok(None);
            }

            let Some(shard) = state.current().cloned() else {
                if state.start_fallback() {
                    continue;
                }
                state.exhaust("no shards left");
                return Ok(None);
            };

            let cap = remaining.min(self.flush);
            let pattern = state.query_pattern();
            let query = ShardQuery {
                pattern: &pattern,
                shard: &shard,
                offset: state.resume_offset,
                limit: cap,
                context: state.context,
            };

            let mut raw = match self.engine.query(&query) {
                Ok(raw) => raw,
                Err(EngineError::Query { shard: id, message }) => {
                    log::warn!("skipping shard {}: {}", id, message);
                    state.advance_shard();
                    continue;
                }
                Err(EngineError::Unavailable(message)) => {
                    return Err(SearchError::EngineUnavailable(message));
                }
            };
            raw.truncate(cap);

            if raw.len() == cap {
                state.resume_offset += cap;
            } else {
                state.advance_shard();
            }

            let hits: Vec<RawHit> = raw
                .into_iter()
                .filter(|hit| state.already.insert(hit.id.clone()))
                .collect();
            state.delivered += hits.len();
            log::debug!(
                "shard {} at offset {}: {} new hits",
                shard.component,
                query.offset,
                hits.len()
            );

            if !hits.is_empty() {
                state.settle();
                return Ok(Some(Batch {
                    shard: shard.component,
                    hits,
                }));
            }
        }
    }
}
