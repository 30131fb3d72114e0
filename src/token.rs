//! Resume tokens
//!
//! A resume token is the complete `SearchState` of a session, serialized
//! as JSON and encoded with URL-safe base64. Tokens are opaque to clients
//! and immutable: handing the same token back twice resumes from the same
//! point both times.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use thiserror::Error;

use crate::config::Corpus;
use crate::searcher::SearchState;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("malformed state: {0}")]
    State(#[from] serde_json::Error),

    #[error("token belongs to corpus {found}, not {expected}")]
    WrongCorpus { expected: String, found: String },

    #[error("shard {0} is not part of the corpus")]
    UnknownShard(String),
}

/// Encode a session state as a resume token
pub fn encode(state: &SearchState) -> Result<String, TokenError> {
    let json = serde_json::to_vec(state)?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

/// Decode a resume token back into a session state
pub fn decode(token: &str) -> Result<SearchState, TokenError> {
    let json = URL_SAFE_NO_PAD.decode(token.trim())?;
    Ok(serde_json::from_slice(&json)?)
}

/// Decode a token and check that every shard it refers to is configured
/// for `corpus`, so a token cannot steer queries at arbitrary machines.
pub fn decode_for(token: &str, corpus: &Corpus) -> Result<SearchState, TokenError> {
    let state = decode(token)?;
    if state.corpus != corpus.id {
        return Err(TokenError::WrongCorpus {
            expected: corpus.id.clone(),
            found: state.corpus,
        });
    }
    let unknown = state
        .shard_queue
        .iter()
        .chain(&state.fallback_shards)
        .find(|shard| corpus.shard(&shard.component) != Some(*shard));
    if let Some(shard) = unknown {
        return Err(TokenError::UnknownShard(format!(
            "{}@{}:{}",
            shard.component, shard.machine, shard.port
        )));
    }
    Ok(state)
}
