//! Paged search sessions
//!
//! Ties the pieces together for one request: a fresh request derives the
//! pattern's shape signature, resolves shards, attaches metadata filters
//! and normalizes the pattern; a request carrying a resume token picks up
//! the session where the token left it. Either way one batch of hits is
//! fetched and returned with the token for the next page.

use serde::{Deserialize, Serialize};

use crate::config::{SearchConfig, SearchMode};
use crate::engine::QueryEngine;
use crate::filters::FilterSpec;
use crate::hits::{Hit, map_hit};
use crate::index::resolve_shards;
use crate::normalize::{attach_filters, normalize};
use crate::searcher::{SearchError, SearchState, Searcher};
use crate::signature::derive_signature;
use crate::token;

/// One page request from a client
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub corpus: String,
    /// Component or component group ids; empty selects the whole corpus
    #[serde(default)]
    pub components: Vec<String>,
    pub pattern: String,
    #[serde(default)]
    pub filters: Vec<FilterSpec>,
    #[serde(default)]
    pub mode: SearchMode,
    /// Ask for neighbouring sentences around each hit
    #[serde(default)]
    pub context: bool,
    /// Token from the previous page; everything else but `corpus` is
    /// ignored when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_token: Option<String>,
}

impl PageRequest {
    pub fn new(corpus: &str, pattern: &str) -> Self {
        Self {
            corpus: corpus.to_string(),
            pattern: pattern.to_string(),
            ..Self::default()
        }
    }

    pub fn with_components(mut self, components: &[&str]) -> Self {
        self.components = components.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_filters(mut self, filters: Vec<FilterSpec>) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_context(mut self, context: bool) -> Self {
        self.context = context;
        self
    }

    /// The same request continuing from `token`
    pub fn resumed(&self, token: &str) -> Self {
        Self {
            resume_token: Some(token.to_string()),
            ..self.clone()
        }
    }
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageResponse {
    pub hits: Vec<Hit>,
    /// Token for the next page, `None` once the session is exhausted
    pub resume_token: Option<String>,
    pub exhausted: bool,
}

/// Serves paged searches over a configuration and a query engine.
///
/// Holds no per-session state, so one pager can serve any number of
/// concurrent sessions.
#[derive(Debug)]
pub struct Pager<'c, E> {
    config: &'c SearchConfig,
    searcher: Searcher<E>,
}

impl<'c, E: QueryEngine> Pager<'c, E> {
    pub fn new(config: &'c SearchConfig, engine: E) -> Self {
        Self {
            config,
            searcher: Searcher::new(engine, config.limits().flush),
        }
    }

    pub fn config(&self) -> &SearchConfig {
        self.config
    }

    pub fn engine(&self) -> &E {
        self.searcher.engine()
    }

    /// Set up a new session for a request
    pub fn start(&self, request: &PageRequest) -> Result<SearchState, SearchError> {
        let corpus = self.config.corpus(&request.corpus)?;
        let limit = self
            .config
            .limits()
            .cap(request.mode)
            .ok_or(SearchError::ModeDisabled(request.mode))?;

        let signature = derive_signature(&request.pattern);
        let plan = resolve_shards(corpus, signature.as_ref(), &request.components)?;

        let filters = corpus.metadata.declared(&request.filters);
        let filtered = attach_filters(&request.pattern, &filters);
        let (pattern, original) = normalize(&filtered, &request.pattern, plan.fallback);

        log::info!(
            "corpus {}: new session over {} shards{}, limit {}",
            corpus.id,
            plan.shards.len(),
            if plan.fallback { "" } else { " (shape pruned)" },
            limit
        );
        Ok(SearchState::new(&corpus.id, pattern, original, plan, limit)
            .with_mode(request.mode)
            .with_context(request.context))
    }

    /// Restore a session from a resume token.
    ///
    /// The limit is taken from the current configuration for the
    /// session's mode, never from the token.
    pub fn resume(&self, corpus: &str, token: &str) -> Result<SearchState, SearchError> {
        let corpus = self.config.corpus(corpus)?;
        let mut state = token::decode_for(token, corpus)?;
        state.limit = self
            .config
            .limits()
            .cap(state.mode)
            .ok_or(SearchError::ModeDisabled(state.mode))?;
        Ok(state)
    }

    /// Fetch one page: starts a session, or continues the one in the
    /// request's resume token.
    ///
    /// On [`SearchError::EngineUnavailable`] nothing is lost; the same
    /// request can be sent again.
    pub fn search_page(&self, request: &PageRequest) -> Result<PageResponse, SearchError> {
        let mut state = match &request.resume_token {
            Some(token) => self.resume(&request.corpus, token)?,
            None => self.start(request)?,
        };

        let hits = match self.searcher.next_page(&mut state)? {
            Some(batch) => batch
                .hits
                .iter()
                .map(|raw| map_hit(raw, &batch.shard))
                .collect(),
            None => Vec::new(),
        };

        let exhausted = state.is_exhausted();
        let resume_token = if exhausted {
            None
        } else {
            Some(token::encode(&state).map_err(SearchError::TokenEncoding)?)
        };
        Ok(PageResponse {
            hits,
            resume_token,
            exhausted,
        })
    }

    /// Run a session to the end and return every hit.
    ///
    /// Meant for analysis mode, where the ceiling is large and callers
    /// want the whole result set at once.
    pub fn collect_all(&self, request: &PageRequest) -> Result<Vec<Hit>, SearchError> {
        let mut state = match &request.resume_token {
            Some(token) => self.resume(&request.corpus, token)?,
            None => self.start(request)?,
        };

        let mut hits = Vec::new();
        while let Some(batch) = self.searcher.next_page(&mut state)? {
            hits.extend(batch.hits.iter().map(|raw| map_hit(raw, &batch.shard)));
        }
        Ok(hits)
    }
}
