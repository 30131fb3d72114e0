//! Metadata filters
//!
//! Typed filter descriptors compiled into predicate clauses that restrict
//! matches to documents whose metadata satisfies them.

use serde::{Deserialize, Serialize};

use crate::config::MetadataSchema;

/// Path from a matched node to its document's metadata entries
const META_PATH: &str = "ancestor::alpino_ds/metadata/meta";

/// Value type of a ranged filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeKind {
    Int,
    Date,
}

/// A metadata filter as selected by the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterSpec {
    Single {
        field: String,
        value: String,
    },
    Range {
        field: String,
        min: String,
        max: String,
        kind: RangeKind,
    },
    Multiple {
        field: String,
        values: Vec<String>,
    },
    /// Inserted verbatim inside a predicate bracket
    RawPredicate {
        predicate: String,
    },
}

impl FilterSpec {
    /// Metadata field this filter applies to (`None` for raw predicates)
    pub fn field(&self) -> Option<&str> {
        match self {
            FilterSpec::Single { field, .. }
            | FilterSpec::Range { field, .. }
            | FilterSpec::Multiple { field, .. } => Some(field),
            FilterSpec::RawPredicate { .. } => None,
        }
    }

    /// Build a filter from a `field=value` request parameter.
    ///
    /// A value of the form `min*max` is a range; its kind comes from the
    /// schema (text fields compare like ints). Fields missing from the
    /// schema give `None`.
    pub fn from_param(schema: &MetadataSchema, field: &str, value: &str) -> Option<FilterSpec> {
        let declared = schema.field(field)?;
        let field = field.to_string();
        match value.split_once('*') {
            None => Some(FilterSpec::Single {
                field,
                value: value.to_string(),
            }),
            Some((min, max)) => Some(FilterSpec::Range {
                field,
                min: min.to_string(),
                max: max.to_string(),
                kind: declared.kind.range_kind(),
            }),
        }
    }

    /// Compile this filter into a single predicate clause
    pub fn compile(&self) -> String {
        match self {
            FilterSpec::Single { field, value } => format!(
                r#"[{}[@name="{}" and @value="{}"]]"#,
                META_PATH,
                escape(field),
                escape(value)
            ),
            FilterSpec::Range {
                field,
                min,
                max,
                kind,
            } => {
                let (value, min, max) = match kind {
                    RangeKind::Date => (
                        "number(translate(@value,'-',''))",
                        digits(min),
                        digits(max),
                    ),
                    RangeKind::Int => ("@value", escape(min), escape(max)),
                };
                format!(
                    r#"[{}[@name="{}" and {value}>={} and {value}<={}]]"#,
                    META_PATH,
                    escape(field),
                    min,
                    max
                )
            }
            FilterSpec::Multiple { field, values } => {
                let alternatives: Vec<String> = values
                    .iter()
                    .map(|v| format!(r#"@value="{}""#, escape(v)))
                    .collect();
                format!(
                    r#"[{}[@name="{}" and ({})]]"#,
                    META_PATH,
                    escape(field),
                    alternatives.join(" or ")
                )
            }
            FilterSpec::RawPredicate { predicate } => format!("[{}]", predicate),
        }
    }
}

/// Compile filters into the concatenation of their predicate clauses
pub fn compile_filters(filters: &[FilterSpec]) -> String {
    filters.iter().map(FilterSpec::compile).collect()
}

/// Escape a literal for embedding in a double-quoted attribute value
pub fn escape(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

/// `1990-01-01` -> `19900101`
fn digits(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FacetKind, FieldKind, MetadataField};

    fn schema() -> MetadataSchema {
        MetadataSchema::new(vec![
            MetadataField::new("genre", FieldKind::Text, FacetKind::Checkbox),
            MetadataField::new("year", FieldKind::Int, FacetKind::Slider),
            MetadataField::new("date", FieldKind::Date, FacetKind::Range),
        ])
    }

    fn balanced(s: &str) -> bool {
        s.matches('[').count() == s.matches(']').count()
    }

    #[test]
    fn test_compile_single() {
        let filter = FilterSpec::Single {
            field: "genre".to_string(),
            value: r#"news & "opinion""#.to_string(),
        };
        assert_eq!(
            filter.compile(),
            r#"[ancestor::alpino_ds/metadata/meta[@name="genre" and @value="news &amp; &quot;opinion&quot;"]]"#
        );
    }

    #[test]
    fn test_compile_date_range() {
        let filter = FilterSpec::Range {
            field: "year".to_string(),
            min: "1990-01-01".to_string(),
            max: "2000-12-31".to_string(),
            kind: RangeKind::Date,
        };
        let compiled = filter.compile();
        assert_eq!(
            compiled,
            r#"[ancestor::alpino_ds/metadata/meta[@name="year" and number(translate(@value,'-',''))>=19900101 and number(translate(@value,'-',''))<=20001231]]"#
        );

        let pattern = format!(r#"//node[@cat="smain" and node[@rel="su"]]{}"#, compiled);
        assert!(balanced(&pattern));
    }

    #[test]
    fn test_compile_int_range() {
        let filter = FilterSpec::Range {
            field: "year".to_string(),
            min: "1990".to_string(),
            max: "2000".to_string(),
            kind: RangeKind::Int,
        };
        assert_eq!(
            filter.compile(),
            r#"[ancestor::alpino_ds/metadata/meta[@name="year" and @value>=1990 and @value<=2000]]"#
        );
    }

    #[test]
    fn test_compile_multiple() {
        let filter = FilterSpec::Multiple {
            field: "genre".to_string(),
            values: vec!["news".to_string(), "fiction".to_string()],
        };
        assert_eq!(
            filter.compile(),
            r#"[ancestor::alpino_ds/metadata/meta[@name="genre" and (@value="news" or @value="fiction")]]"#
        );
    }

    #[test]
    fn test_compile_in_order() {
        let filters = vec![
            FilterSpec::RawPredicate {
                predicate: r#"$node1[@pt="ww"]"#.to_string(),
            },
            FilterSpec::Single {
                field: "genre".to_string(),
                value: "news".to_string(),
            },
        ];
        let compiled = compile_filters(&filters);
        assert!(compiled.starts_with(r#"[$node1[@pt="ww"]][ancestor::"#));
        assert_eq!(compiled, filters[0].compile() + &filters[1].compile());
        assert_eq!(compile_filters(&[]), "");
    }

    #[test]
    fn test_schema_drops_unknown_fields() {
        let filters = vec![
            FilterSpec::Single {
                field: "speaker".to_string(),
                value: "x".to_string(),
            },
            FilterSpec::Single {
                field: "genre".to_string(),
                value: "news".to_string(),
            },
            FilterSpec::RawPredicate {
                predicate: "true()".to_string(),
            },
        ];
        let compiled = compile_filters(&schema().declared(&filters));
        assert!(!compiled.contains("speaker"));
        assert!(compiled.contains(r#"@name="genre""#));
        assert!(compiled.ends_with("[true()]"));
    }

    #[test]
    fn test_from_param() {
        let schema = schema();
        assert_eq!(
            FilterSpec::from_param(&schema, "genre", "news"),
            Some(FilterSpec::Single {
                field: "genre".to_string(),
                value: "news".to_string()
            })
        );
        assert_eq!(
            FilterSpec::from_param(&schema, "date", "1990-01-01*1995-06-30"),
            Some(FilterSpec::Range {
                field: "date".to_string(),
                min: "1990-01-01".to_string(),
                max: "1995-06-30".to_string(),
                kind: RangeKind::Date,
            })
        );
        assert_eq!(FilterSpec::from_param(&schema, "unknown", "1"), None);
    }

    #[test]
    fn test_deserialize_tagged() {
        let filter: FilterSpec = serde_json::from_str(
            r#"{"type": "range", "field": "year", "min": "1990", "max": "2000", "kind": "int"}"#,
        )
        .unwrap();
        assert_eq!(filter.field(), Some("year"));

        let unknown = serde_json::from_str::<FilterSpec>(r#"{"type": "fuzzy", "field": "year"}"#);
        assert!(unknown.is_err());
    }
}
