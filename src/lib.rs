//! Shardquery: structural query compilation and incremental search over
//! sharded treebank corpora
//!
//! Turns a user's tree pattern into an engine-ready query, picks the
//! shards worth searching, and pages through their results a batch at a
//! time with resumable, serializable session state.

// Pattern compilation
pub mod filters; // Metadata filter predicates
pub mod normalize; // Prefix and case-insensitive rewrites
pub mod pattern; // Pattern parse tree
pub mod query; // Pattern language parser
pub mod signature; // Shape signatures for shard pruning

// Search
pub mod config; // Corpora, shards and limits
pub mod engine; // Query engine interface
pub mod hits; // Result mapping
pub mod index; // Shape index and shard selection
pub mod pager; // Paged sessions with resume tokens
pub mod searcher; // Incremental multi-shard controller
pub mod token; // Resume token encoding

// Re-exports for convenience
pub use config::{ConfigError, Corpus, SearchConfig, SearchLimits, SearchMode, Shard};
pub use engine::{EngineError, MemoryEngine, QueryEngine, RawHit, ShardQuery};
pub use filters::{FilterSpec, RangeKind, compile_filters};
pub use hits::{Hit, highlight_sentence, map_hit, metadata_counts};
pub use index::{SelectionError, ShapeIndex, ShardPlan, resolve_shards};
pub use normalize::{apply_case_insensitive, attach_filters, normalize};
pub use pager::{PageRequest, PageResponse, Pager};
pub use query::{PatternError, parse_pattern};
pub use searcher::{Batch, SearchError, SearchState, Searcher};
pub use signature::{ShapeSignature, derive_signature};
pub use token::TokenError;
