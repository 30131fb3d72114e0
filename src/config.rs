//! Corpus and shard configuration
//!
//! Static description of the searchable corpora: their shards, component
//! groups, metadata schema and optional shape index, plus the result
//! limits. Loaded once (usually from JSON) and shared read-only by every
//! search session.

use std::fs;
use std::path::Path;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::filters::{FilterSpec, RangeKind};
use crate::index::{SelectionError, ShapeIndex};

/// Error raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: flush size must be positive")]
    ZeroFlush,

    #[error("Config error: duplicate corpus {0}")]
    DuplicateCorpus(String),

    #[error("Config error: duplicate component {component} in corpus {corpus}")]
    DuplicateComponent { corpus: String, component: String },

    #[error("Config error: {context} in corpus {corpus} refers to unknown component {component}")]
    UnknownComponent {
        corpus: String,
        context: String,
        component: String,
    },
}

/// One independently queryable partition of a corpus
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shard {
    pub machine: String,
    pub port: u16,
    pub component: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentence_count: Option<u64>,
}

impl Shard {
    pub fn new(machine: &str, port: u16, component: &str) -> Self {
        Self {
            machine: machine.to_string(),
            port,
            component: component.to_string(),
            sentence_count: None,
        }
    }
}

/// Named set of components that can be selected as a whole
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentGroup {
    pub id: String,
    #[serde(default)]
    pub description: String,
    pub components: Vec<String>,
}

/// Value type of a metadata field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Int,
    Date,
}

impl FieldKind {
    /// How `min*max` ranges over this field are compared
    pub fn range_kind(self) -> RangeKind {
        match self {
            FieldKind::Date => RangeKind::Date,
            FieldKind::Text | FieldKind::Int => RangeKind::Int,
        }
    }
}

/// How a metadata field is presented as a facet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacetKind {
    Checkbox,
    Slider,
    Range,
    Dropdown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataField {
    pub field: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    pub facet: FacetKind,
}

impl MetadataField {
    pub fn new(field: &str, kind: FieldKind, facet: FacetKind) -> Self {
        Self {
            field: field.to_string(),
            kind,
            facet,
        }
    }
}

/// Declared metadata fields of a corpus
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataSchema {
    fields: Vec<MetadataField>,
}

impl MetadataSchema {
    pub fn new(fields: Vec<MetadataField>) -> Self {
        Self { fields }
    }

    pub fn field(&self, name: &str) -> Option<&MetadataField> {
        self.fields.iter().find(|f| f.field == name)
    }

    pub fn fields(&self) -> &[MetadataField] {
        &self.fields
    }

    /// The filters whose field is declared; others are dropped
    pub fn declared(&self, filters: &[FilterSpec]) -> Vec<FilterSpec> {
        filters
            .iter()
            .filter(|filter| match filter.field() {
                Some(field) if self.field(field).is_none() => {
                    log::debug!("ignoring filter on undeclared metadata field {}", field);
                    false
                }
                _ => true,
            })
            .cloned()
            .collect()
    }
}

fn default_multi_option() -> bool {
    true
}

/// A searchable corpus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Corpus {
    pub id: String,
    pub shards: Vec<Shard>,
    #[serde(default)]
    pub component_groups: Vec<ComponentGroup>,
    /// Whether more than one component may be searched at once
    #[serde(default = "default_multi_option")]
    pub multi_option: bool,
    #[serde(default)]
    pub metadata: MetadataSchema,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape_index: Option<ShapeIndex>,
}

impl Corpus {
    pub fn new(id: &str, shards: Vec<Shard>) -> Self {
        Self {
            id: id.to_string(),
            shards,
            component_groups: Vec::new(),
            multi_option: true,
            metadata: MetadataSchema::default(),
            shape_index: None,
        }
    }

    pub fn shard(&self, component: &str) -> Option<&Shard> {
        self.shards.iter().find(|s| s.component == component)
    }

    pub fn group(&self, id: &str) -> Option<&ComponentGroup> {
        self.component_groups.iter().find(|g| g.id == id)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = FxHashSet::default();
        for shard in &self.shards {
            if !seen.insert(shard.component.as_str()) {
                return Err(ConfigError::DuplicateComponent {
                    corpus: self.id.clone(),
                    component: shard.component.clone(),
                });
            }
        }

        let unknown = |context: String, component: &str| ConfigError::UnknownComponent {
            corpus: self.id.clone(),
            context,
            component: component.to_string(),
        };
        for group in &self.component_groups {
            if let Some(missing) = group.components.iter().find(|c| !seen.contains(c.as_str())) {
                return Err(unknown(format!("group {}", group.id), missing));
            }
        }
        if let Some(index) = &self.shape_index {
            for (signature, components) in index.entries() {
                if let Some(missing) = components.iter().find(|c| !seen.contains(c.as_str())) {
                    return Err(unknown(format!("shape {}", signature), missing));
                }
            }
        }
        Ok(())
    }
}

/// Which result ceiling applies to a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    #[default]
    Normal,
    /// Bulk retrieval for analysis, with a much larger ceiling
    Analysis,
}

/// Result-count limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchLimits {
    /// Maximum hits per query (and so per page)
    pub flush: usize,
    /// Ceiling for normal paged browsing; 0 disables the mode
    pub results: usize,
    /// Ceiling for analysis mode; 0 disables the mode
    pub analysis: usize,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            flush: 50,
            results: 500,
            analysis: 50_000,
        }
    }
}

impl SearchLimits {
    /// Global ceiling for a mode, `None` if the mode is disabled
    pub fn cap(&self, mode: SearchMode) -> Option<usize> {
        let cap = match mode {
            SearchMode::Normal => self.results,
            SearchMode::Analysis => self.analysis,
        };
        (cap > 0).then_some(cap)
    }
}

#[derive(Deserialize)]
struct RawConfig {
    #[serde(default)]
    limits: SearchLimits,
    corpora: Vec<Corpus>,
}

/// Complete, validated search configuration
#[derive(Debug, Clone)]
pub struct SearchConfig {
    limits: SearchLimits,
    corpora: Vec<Corpus>,
    by_id: FxHashMap<String, usize>,
}

impl SearchConfig {
    pub fn new(limits: SearchLimits, corpora: Vec<Corpus>) -> Result<Self, ConfigError> {
        if limits.flush == 0 {
            return Err(ConfigError::ZeroFlush);
        }

        let mut by_id = FxHashMap::default();
        for (i, corpus) in corpora.iter().enumerate() {
            corpus.validate()?;
            if by_id.insert(corpus.id.clone(), i).is_some() {
                return Err(ConfigError::DuplicateCorpus(corpus.id.clone()));
            }
        }

        Ok(Self {
            limits,
            corpora,
            by_id,
        })
    }

    /// Parse and validate a JSON configuration document
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(json)?;
        Self::new(raw.limits, raw.corpora)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn limits(&self) -> &SearchLimits {
        &self.limits
    }

    pub fn corpora(&self) -> &[Corpus] {
        &self.corpora
    }

    pub fn corpus(&self, id: &str) -> Result<&Corpus, SelectionError> {
        self.by_id
            .get(id)
            .map(|&i| &self.corpora[i])
            .ok_or_else(|| SelectionError::UnknownCorpus(id.to_string()))
    }
}
