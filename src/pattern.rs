//! Pattern representation
//!
//! This module defines the parse tree for structural patterns. It only
//! models what shape extraction needs: node tests, attribute tests,
//! `count()` tests and linear-order tests. Everything else is kept
//! as opaque text.

/// Comparison operator in an attribute test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "=" => Some(CmpOp::Eq),
            "!=" => Some(CmpOp::Ne),
            "<" => Some(CmpOp::Lt),
            "<=" => Some(CmpOp::Le),
            ">" => Some(CmpOp::Gt),
            ">=" => Some(CmpOp::Ge),
            _ => None,
        }
    }
}

/// `@name`, `@name="value"`, `@name != 'value'`, ...
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrTest {
    pub name: String,
    pub comparison: Option<(CmpOp, String)>,
}

impl AttrTest {
    /// The literal this test requires the attribute to equal, if any
    pub fn equals(&self) -> Option<&str> {
        match &self.comparison {
            Some((CmpOp::Eq, value)) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connective {
    And,
    Or,
}

/// One item inside a predicate bracket
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    Attr(AttrTest),
    Child(NodeTest),
    /// `count(node[...]) > n`
    Count(NodeTest, usize),
    /// Comparison of `@begin` positions; encodes linear order, not shape
    Order,
    /// Parenthesised sub-expression, optionally a function call (`not(...)`)
    Group(Option<String>, Vec<Term>),
    Connective(Connective),
    Opaque(String),
}

/// A `node[...][...]` step and its predicates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeTest {
    pub predicates: Vec<Vec<Term>>,
}

impl NodeTest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of the first `@name="..."` test on this node.
    ///
    /// Looks through parenthesised groups but never into child nodes,
    /// so the attributes of descendants don't leak upwards.
    pub fn attr_value(&self, name: &str) -> Option<&str> {
        self.predicates
            .iter()
            .find_map(|terms| find_attr(terms, name))
    }

    /// Value of the first `@name="..."` test that comes before every
    /// child node test, i.e. an attribute of this node's own bracket
    pub fn leading_attr_value(&self, name: &str) -> Option<&str> {
        for terms in &self.predicates {
            for term in terms {
                let term = std::slice::from_ref(term);
                if any_child(term) {
                    return None;
                }
                if let Some(value) = find_attr(term, name) {
                    return Some(value);
                }
            }
        }
        None
    }

    /// Number of first-level children `children` would return, without
    /// expanding `count()` tests
    pub fn child_count(&self) -> usize {
        self.predicates
            .iter()
            .fold(0, |total, terms| total.saturating_add(count_children(terms)))
    }

    /// Whether any predicate holds a first-level child or `count()` test
    pub fn has_children(&self) -> bool {
        self.predicates.iter().any(|terms| any_child(terms))
    }

    /// First-level children with `count(X) > n` expanded to `n` copies of `X`
    pub fn children(&self) -> Vec<&NodeTest> {
        let mut children = Vec::new();
        for terms in &self.predicates {
            collect_children(terms, &mut children);
        }
        children
    }
}

fn find_attr<'a>(terms: &'a [Term], name: &str) -> Option<&'a str> {
    terms.iter().find_map(|term| match term {
        Term::Attr(attr) if attr.name == name => attr.equals(),
        Term::Group(_, inner) => find_attr(inner, name),
        _ => None,
    })
}

fn any_child(terms: &[Term]) -> bool {
    terms.iter().any(|term| match term {
        Term::Child(_) | Term::Count(..) => true,
        Term::Group(_, inner) => any_child(inner),
        _ => false,
    })
}

fn count_children(terms: &[Term]) -> usize {
    terms.iter().fold(0, |total, term| {
        let n = match term {
            Term::Child(_) => 1,
            Term::Count(_, n) => *n,
            Term::Group(_, inner) => count_children(inner),
            Term::Attr(_) | Term::Order | Term::Connective(_) | Term::Opaque(_) => 0,
        };
        total.saturating_add(n)
    })
}

fn collect_children<'a>(terms: &'a [Term], out: &mut Vec<&'a NodeTest>) {
    for term in terms {
        match term {
            Term::Child(node) => out.push(node),
            Term::Count(node, n) => out.extend(std::iter::repeat_n(node, *n)),
            Term::Group(_, inner) => collect_children(inner, out),
            Term::Attr(_) | Term::Order | Term::Connective(_) | Term::Opaque(_) => {}
        }
    }
}

/// Parsed structural pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    /// Number of leading slashes (0 for a relative pattern)
    pub slashes: usize,
    pub root: NodeTest,
}
