//! Structural pattern parser
//!
//! Parses pattern strings into the `Pattern` tree using pest grammar.

use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;
use thiserror::Error;

use crate::pattern::{AttrTest, CmpOp, Connective, NodeTest, Pattern, Term};

#[derive(Parser)]
#[grammar = "pattern_grammar.pest"]
struct PatternParser;

/// Error type for pattern parsing failures
#[derive(Debug, Error)]
pub enum PatternError {
    #[error("Pattern error: {0}")]
    Syntax(#[from] Box<pest::error::Error<Rule>>),

    #[error("Pattern error: count must be a non-negative integer, got {0}")]
    InvalidCount(String),

    #[error("Pattern error: unexpected {0:?}")]
    Unexpected(Rule),
}

impl From<pest::error::Error<Rule>> for PatternError {
    fn from(err: pest::error::Error<Rule>) -> Self {
        PatternError::Syntax(Box::new(err))
    }
}

/// Parse a pattern string into a Pattern
pub fn parse_pattern(input: &str) -> Result<Pattern, PatternError> {
    let mut pairs = PatternParser::parse(Rule::pattern, input)?;
    let Some(pattern_pair) = pairs.next() else {
        return Err(PatternError::Unexpected(Rule::EOI));
    };

    let mut slashes = 0;
    let mut root = None;
    for pair in pattern_pair.into_inner() {
        match pair.as_rule() {
            Rule::axis => slashes = pair.as_str().len(),
            Rule::node => root = Some(parse_node(pair)?),
            Rule::EOI => {}
            rule => return Err(PatternError::Unexpected(rule)),
        }
    }

    match root {
        Some(root) => Ok(Pattern { slashes, root }),
        None => Err(PatternError::Unexpected(Rule::node)),
    }
}

/// Parse `node[...][...]`
fn parse_node(pair: Pair<Rule>) -> Result<NodeTest, PatternError> {
    let mut node = NodeTest::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::node_kw => {}
            Rule::predicate => {
                let terms = match inner.into_inner().next() {
                    Some(expr) => parse_expr(expr)?,
                    None => Vec::new(),
                };
                node.predicates.push(terms);
            }
            rule => return Err(PatternError::Unexpected(rule)),
        }
    }
    Ok(node)
}

fn parse_expr(pair: Pair<Rule>) -> Result<Vec<Term>, PatternError> {
    pair.into_inner().map(parse_term).collect()
}

fn parse_term(pair: Pair<Rule>) -> Result<Term, PatternError> {
    match pair.as_rule() {
        Rule::connective => Ok(Term::Connective(if pair.as_str() == "and" {
            Connective::And
        } else {
            Connective::Or
        })),
        Rule::node => Ok(Term::Child(parse_node(pair)?)),
        Rule::count_test => parse_count(pair),
        Rule::order_test => Ok(Term::Order),
        Rule::attr_test => Ok(Term::Attr(parse_attr(pair)?)),
        Rule::group => {
            let mut name = None;
            let mut terms = Vec::new();
            for inner in pair.into_inner() {
                match inner.as_rule() {
                    Rule::fn_name => name = Some(inner.as_str().to_string()),
                    Rule::expr => terms = parse_expr(inner)?,
                    rule => return Err(PatternError::Unexpected(rule)),
                }
            }
            Ok(Term::Group(name, terms))
        }
        Rule::atom => Ok(Term::Opaque(pair.as_str().to_string())),
        rule => Err(PatternError::Unexpected(rule)),
    }
}

/// Parse `count(node[...]) > N`
fn parse_count(pair: Pair<Rule>) -> Result<Term, PatternError> {
    let mut node = None;
    let mut count = 0;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::node => node = Some(parse_node(inner)?),
            Rule::count => {
                count = inner
                    .as_str()
                    .parse()
                    .map_err(|_| PatternError::InvalidCount(inner.as_str().to_string()))?;
            }
            rule => return Err(PatternError::Unexpected(rule)),
        }
    }
    match node {
        Some(node) => Ok(Term::Count(node, count)),
        None => Err(PatternError::Unexpected(Rule::count_test)),
    }
}

/// Parse `@name` or `@name op literal`
fn parse_attr(pair: Pair<Rule>) -> Result<AttrTest, PatternError> {
    let mut name = String::new();
    let mut op = None;
    let mut value = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::name => name = inner.as_str().to_string(),
            Rule::cmp_op => op = CmpOp::from_symbol(inner.as_str()),
            Rule::dq_string | Rule::sq_string => {
                value = Some(
                    inner
                        .into_inner()
                        .next()
                        .map(|s| s.as_str().to_string())
                        .unwrap_or_default(),
                );
            }
            Rule::number => value = Some(inner.as_str().to_string()),
            rule => return Err(PatternError::Unexpected(rule)),
        }
    }
    Ok(AttrTest {
        name,
        comparison: op.zip(value),
    })
}
