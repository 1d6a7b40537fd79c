//! Document filters
//!
//! A [`Filter`] is a predicate over a [`DocumentView`] (`{key, value}`).
//! Leaf filters name a [`FieldPath`]: `["key"]` for the document key, or
//! `["value", ...segments]` to descend into the document value. Missing
//! segments resolve to "undefined" and never raise.
//!
//! ## Wire format
//!
//! ```json
//! {"operator": "gt", "path": ["value", "age"], "value": 30}
//! {"operator": "matches", "path": ["value", "name"], "value": "^an", "caseInsensitive": true}
//! {"operator": "and", "filters": [ ... ]}
//! {"operator": "not", "filter": { ... }}
//! ```
//!
//! An operator name the evaluator does not know deserializes into
//! [`Filter::Unsupported`]; compiling or evaluating such a filter fails with
//! [`Error::UnsupportedOperator`] rather than reporting "no match".
//!
//! ## Building filters
//!
//! ```
//! use docfeed_core::filter::{key, value, Filter};
//!
//! let adults = Filter::and(vec![
//!     key().starts_with("user:"),
//!     value().at("age").gte(18),
//! ]);
//! ```

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;

use crate::error::{Error, Result};
use crate::value::{compare_same_kind, json_equal};

/// First path segment selecting the document key
pub const KEY_SEGMENT: &str = "key";
/// First path segment selecting the document value
pub const VALUE_SEGMENT: &str = "value";

// =============================================================================
// Paths
// =============================================================================

/// Path into a document view
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    /// Path from raw segments
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldPath(segments.into_iter().map(Into::into).collect())
    }

    /// `["key"]`
    pub fn key() -> Self {
        FieldPath(vec![KEY_SEGMENT.to_string()])
    }

    /// `["value", ...segments]`
    pub fn value<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut path = vec![VALUE_SEGMENT.to_string()];
        path.extend(segments.into_iter().map(Into::into));
        FieldPath(path)
    }

    /// Segments of the path
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Extend the path by one segment
    pub fn child(mut self, segment: impl Into<String>) -> Self {
        self.0.push(segment.into());
        self
    }

    /// Resolve against a document; `None` means undefined
    pub fn resolve<'a>(&self, doc: &DocumentView<'a>) -> Option<Cow<'a, Value>> {
        let (head, rest) = self.0.split_first()?;
        match head.as_str() {
            KEY_SEGMENT if rest.is_empty() => Some(Cow::Owned(Value::String(doc.key.to_string()))),
            VALUE_SEGMENT => {
                let mut current = doc.value;
                for segment in rest {
                    current = match current {
                        Value::Object(map) => map.get(segment)?,
                        Value::Array(arr) => arr.get(segment.parse::<usize>().ok()?)?,
                        _ => return None,
                    };
                }
                Some(Cow::Borrowed(current))
            }
            _ => None,
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

/// The view of a document filters are evaluated against
#[derive(Debug, Clone, Copy)]
pub struct DocumentView<'a> {
    /// Document key
    pub key: &'a str,
    /// Document value
    pub value: &'a Value,
}

impl<'a> DocumentView<'a> {
    /// Create a view
    pub fn new(key: &'a str, value: &'a Value) -> Self {
        DocumentView { key, value }
    }
}

// =============================================================================
// Filter
// =============================================================================

/// Predicate over a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFilter", into = "RawFilter")]
pub enum Filter {
    /// Strict equality
    Eq {
        /// Field to test
        path: FieldPath,
        /// Operand
        value: Value,
    },
    /// Strict inequality
    Ne {
        /// Field to test
        path: FieldPath,
        /// Operand
        value: Value,
    },
    /// Greater than (same type only)
    Gt {
        /// Field to test
        path: FieldPath,
        /// Operand
        value: Value,
    },
    /// Greater than or equal (same type only)
    Gte {
        /// Field to test
        path: FieldPath,
        /// Operand
        value: Value,
    },
    /// Less than (same type only)
    Lt {
        /// Field to test
        path: FieldPath,
        /// Operand
        value: Value,
    },
    /// Less than or equal (same type only)
    Lte {
        /// Field to test
        path: FieldPath,
        /// Operand
        value: Value,
    },
    /// Field is defined (null counts as defined)
    Exists {
        /// Field to test
        path: FieldPath,
    },
    /// Field is exactly null
    IsNull {
        /// Field to test
        path: FieldPath,
    },
    /// Field is a string matching a regular expression
    Matches {
        /// Field to test
        path: FieldPath,
        /// Regular expression
        pattern: String,
        /// Match without regard to case
        case_insensitive: bool,
    },
    /// Field is a string with the given prefix
    StartsWith {
        /// Field to test
        path: FieldPath,
        /// Required prefix
        prefix: String,
    },
    /// All sub-filters match
    And(Vec<Filter>),
    /// At least one sub-filter matches
    Or(Vec<Filter>),
    /// The sub-filter does not match
    Not(Box<Filter>),
    /// An operator this evaluator does not implement
    Unsupported {
        /// Operator name as received
        operator: String,
    },
}

impl Filter {
    /// Conjunction
    pub fn and(filters: Vec<Filter>) -> Self {
        Filter::And(filters)
    }

    /// Disjunction
    pub fn or(filters: Vec<Filter>) -> Self {
        Filter::Or(filters)
    }

    /// Negation
    #[allow(clippy::should_implement_trait)]
    pub fn not(filter: Filter) -> Self {
        Filter::Not(Box::new(filter))
    }

    /// Wire name of the operator
    pub fn operator(&self) -> &str {
        match self {
            Filter::Eq { .. } => "eq",
            Filter::Ne { .. } => "ne",
            Filter::Gt { .. } => "gt",
            Filter::Gte { .. } => "gte",
            Filter::Lt { .. } => "lt",
            Filter::Lte { .. } => "lte",
            Filter::Exists { .. } => "exists",
            Filter::IsNull { .. } => "isNull",
            Filter::Matches { .. } => "matches",
            Filter::StartsWith { .. } => "startsWith",
            Filter::And(_) => "and",
            Filter::Or(_) => "or",
            Filter::Not(_) => "not",
            Filter::Unsupported { operator } => operator,
        }
    }

    /// Compile regular expressions and reject unsupported operators
    pub fn compile(&self) -> Result<CompiledFilter> {
        let node = match self {
            Filter::Eq { path, value } => Node::Compare(path.clone(), Comparison::Eq, value.clone()),
            Filter::Ne { path, value } => Node::Compare(path.clone(), Comparison::Ne, value.clone()),
            Filter::Gt { path, value } => Node::Compare(path.clone(), Comparison::Gt, value.clone()),
            Filter::Gte { path, value } => {
                Node::Compare(path.clone(), Comparison::Gte, value.clone())
            }
            Filter::Lt { path, value } => Node::Compare(path.clone(), Comparison::Lt, value.clone()),
            Filter::Lte { path, value } => {
                Node::Compare(path.clone(), Comparison::Lte, value.clone())
            }
            Filter::Exists { path } => Node::Exists(path.clone()),
            Filter::IsNull { path } => Node::IsNull(path.clone()),
            Filter::Matches {
                path,
                pattern,
                case_insensitive,
            } => {
                let regex = RegexBuilder::new(pattern)
                    .case_insensitive(*case_insensitive)
                    .build()
                    .map_err(|e| Error::InvalidPattern {
                        pattern: pattern.clone(),
                        reason: e.to_string(),
                    })?;
                Node::Matches(path.clone(), regex)
            }
            Filter::StartsWith { path, prefix } => Node::StartsWith(path.clone(), prefix.clone()),
            Filter::And(filters) => Node::And(compile_all(filters)?),
            Filter::Or(filters) => Node::Or(compile_all(filters)?),
            Filter::Not(filter) => Node::Not(Box::new(filter.compile()?.node)),
            Filter::Unsupported { operator } => {
                return Err(Error::UnsupportedOperator {
                    operator: operator.clone(),
                })
            }
        };
        Ok(CompiledFilter { node })
    }

    /// Evaluate against a single document
    ///
    /// Compiles on every call; prefer [`Filter::compile`] when scanning.
    pub fn matches(&self, doc: &DocumentView<'_>) -> Result<bool> {
        Ok(self.compile()?.matches(doc))
    }
}

fn compile_all(filters: &[Filter]) -> Result<Vec<Node>> {
    filters
        .iter()
        .map(|f| f.compile().map(|c| c.node))
        .collect()
}

// =============================================================================
// Evaluation
// =============================================================================

#[derive(Debug, Clone, Copy)]
enum Comparison {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

#[derive(Debug, Clone)]
enum Node {
    Compare(FieldPath, Comparison, Value),
    Exists(FieldPath),
    IsNull(FieldPath),
    Matches(FieldPath, Regex),
    StartsWith(FieldPath, String),
    And(Vec<Node>),
    Or(Vec<Node>),
    Not(Box<Node>),
}

/// A filter ready for repeated evaluation
#[derive(Debug, Clone)]
pub struct CompiledFilter {
    node: Node,
}

impl CompiledFilter {
    /// Evaluate against a document
    pub fn matches(&self, doc: &DocumentView<'_>) -> bool {
        eval(&self.node, doc)
    }
}

fn eval(node: &Node, doc: &DocumentView<'_>) -> bool {
    match node {
        Node::And(nodes) => nodes.iter().all(|n| eval(n, doc)),
        Node::Or(nodes) => nodes.iter().any(|n| eval(n, doc)),
        Node::Not(inner) => !eval(inner, doc),
        Node::Exists(path) => path.resolve(doc).is_some(),
        Node::IsNull(path) => matches!(path.resolve(doc).as_deref(), Some(Value::Null)),
        Node::Matches(path, regex) => match path.resolve(doc).as_deref() {
            Some(Value::String(s)) => regex.is_match(s),
            _ => false,
        },
        Node::StartsWith(path, prefix) => match path.resolve(doc).as_deref() {
            Some(Value::String(s)) => s.starts_with(prefix.as_str()),
            _ => false,
        },
        Node::Compare(path, op, operand) => {
            let resolved = path.resolve(doc);
            match op {
                Comparison::Eq => resolved.map_or(false, |v| json_equal(&v, operand)),
                Comparison::Ne => !resolved.map_or(false, |v| json_equal(&v, operand)),
                _ => {
                    let ordering = match resolved {
                        Some(v) => compare_same_kind(&v, operand),
                        None => None,
                    };
                    match (op, ordering) {
                        (Comparison::Gt, Some(o)) => o == Ordering::Greater,
                        (Comparison::Gte, Some(o)) => o != Ordering::Less,
                        (Comparison::Lt, Some(o)) => o == Ordering::Less,
                        (Comparison::Lte, Some(o)) => o != Ordering::Greater,
                        _ => false,
                    }
                }
            }
        }
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Fluent reference to a field, producing leaf filters
#[derive(Debug, Clone)]
pub struct FieldRef {
    path: FieldPath,
}

/// Reference to the document key
pub fn key() -> FieldRef {
    FieldRef {
        path: FieldPath::key(),
    }
}

/// Reference to the document value root
pub fn value() -> FieldRef {
    FieldRef {
        path: FieldPath::value(Vec::<String>::new()),
    }
}

/// Reference to an arbitrary path
pub fn field(path: FieldPath) -> FieldRef {
    FieldRef { path }
}

impl FieldRef {
    /// Descend one segment
    pub fn at(self, segment: impl Into<String>) -> Self {
        FieldRef {
            path: self.path.child(segment),
        }
    }

    /// The path referenced so far
    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    /// `eq`
    pub fn eq(self, value: impl Into<Value>) -> Filter {
        Filter::Eq {
            path: self.path,
            value: value.into(),
        }
    }

    /// `ne`
    pub fn ne(self, value: impl Into<Value>) -> Filter {
        Filter::Ne {
            path: self.path,
            value: value.into(),
        }
    }

    /// `gt`
    pub fn gt(self, value: impl Into<Value>) -> Filter {
        Filter::Gt {
            path: self.path,
            value: value.into(),
        }
    }

    /// `gte`
    pub fn gte(self, value: impl Into<Value>) -> Filter {
        Filter::Gte {
            path: self.path,
            value: value.into(),
        }
    }

    /// `lt`
    pub fn lt(self, value: impl Into<Value>) -> Filter {
        Filter::Lt {
            path: self.path,
            value: value.into(),
        }
    }

    /// `lte`
    pub fn lte(self, value: impl Into<Value>) -> Filter {
        Filter::Lte {
            path: self.path,
            value: value.into(),
        }
    }

    /// `exists`
    pub fn exists(self) -> Filter {
        Filter::Exists { path: self.path }
    }

    /// `isNull`
    pub fn is_null(self) -> Filter {
        Filter::IsNull { path: self.path }
    }

    /// `matches`, case sensitive
    pub fn matches(self, pattern: impl Into<String>) -> Filter {
        Filter::Matches {
            path: self.path,
            pattern: pattern.into(),
            case_insensitive: false,
        }
    }

    /// `matches`, case insensitive
    pub fn matches_ignore_case(self, pattern: impl Into<String>) -> Filter {
        Filter::Matches {
            path: self.path,
            pattern: pattern.into(),
            case_insensitive: true,
        }
    }

    /// `startsWith`
    pub fn starts_with(self, prefix: impl Into<String>) -> Filter {
        Filter::StartsWith {
            path: self.path,
            prefix: prefix.into(),
        }
    }
}

// =============================================================================
// Wire representation
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFilter {
    operator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    path: Option<FieldPath>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    value: Option<Value>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    case_insensitive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    filters: Option<Vec<Filter>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    filter: Option<Box<Filter>>,
}

// Keeps an explicit `"value": null` distinct from a missing field.
fn present<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl RawFilter {
    fn bare(operator: &str) -> Self {
        RawFilter {
            operator: operator.to_string(),
            path: None,
            value: None,
            case_insensitive: false,
            filters: None,
            filter: None,
        }
    }

    fn leaf(operator: &str, path: FieldPath, value: Option<Value>) -> Self {
        RawFilter {
            path: Some(path),
            value,
            ..RawFilter::bare(operator)
        }
    }

    fn take_path(&mut self) -> std::result::Result<FieldPath, String> {
        self.path
            .take()
            .ok_or_else(|| format!("filter '{}' requires a path", self.operator))
    }

    fn take_value(&mut self) -> std::result::Result<Value, String> {
        self.value
            .take()
            .ok_or_else(|| format!("filter '{}' requires a value", self.operator))
    }

    fn take_string(&mut self) -> std::result::Result<String, String> {
        match self.take_value()? {
            Value::String(s) => Ok(s),
            other => Err(format!(
                "filter '{}' requires a string value, got {}",
                self.operator, other
            )),
        }
    }
}

impl TryFrom<RawFilter> for Filter {
    type Error = String;

    fn try_from(mut raw: RawFilter) -> std::result::Result<Self, Self::Error> {
        let filter = match raw.operator.as_str() {
            "eq" => Filter::Eq {
                path: raw.take_path()?,
                value: raw.take_value()?,
            },
            "ne" => Filter::Ne {
                path: raw.take_path()?,
                value: raw.take_value()?,
            },
            "gt" => Filter::Gt {
                path: raw.take_path()?,
                value: raw.take_value()?,
            },
            "gte" => Filter::Gte {
                path: raw.take_path()?,
                value: raw.take_value()?,
            },
            "lt" => Filter::Lt {
                path: raw.take_path()?,
                value: raw.take_value()?,
            },
            "lte" => Filter::Lte {
                path: raw.take_path()?,
                value: raw.take_value()?,
            },
            "exists" => Filter::Exists {
                path: raw.take_path()?,
            },
            "isNull" => Filter::IsNull {
                path: raw.take_path()?,
            },
            "matches" => Filter::Matches {
                path: raw.take_path()?,
                pattern: raw.take_string()?,
                case_insensitive: raw.case_insensitive,
            },
            "startsWith" => Filter::StartsWith {
                path: raw.take_path()?,
                prefix: raw.take_string()?,
            },
            "and" => Filter::And(raw.filters.take().unwrap_or_default()),
            "or" => Filter::Or(raw.filters.take().unwrap_or_default()),
            "not" => Filter::Not(
                raw.filter
                    .take()
                    .ok_or_else(|| "filter 'not' requires a filter".to_string())?,
            ),
            _ => Filter::Unsupported {
                operator: raw.operator,
            },
        };
        Ok(filter)
    }
}

impl From<Filter> for RawFilter {
    fn from(filter: Filter) -> Self {
        match filter {
            Filter::Eq { path, value } => RawFilter::leaf("eq", path, Some(value)),
            Filter::Ne { path, value } => RawFilter::leaf("ne", path, Some(value)),
            Filter::Gt { path, value } => RawFilter::leaf("gt", path, Some(value)),
            Filter::Gte { path, value } => RawFilter::leaf("gte", path, Some(value)),
            Filter::Lt { path, value } => RawFilter::leaf("lt", path, Some(value)),
            Filter::Lte { path, value } => RawFilter::leaf("lte", path, Some(value)),
            Filter::Exists { path } => RawFilter::leaf("exists", path, None),
            Filter::IsNull { path } => RawFilter::leaf("isNull", path, None),
            Filter::Matches {
                path,
                pattern,
                case_insensitive,
            } => RawFilter {
                case_insensitive,
                ..RawFilter::leaf("matches", path, Some(Value::String(pattern)))
            },
            Filter::StartsWith { path, prefix } => {
                RawFilter::leaf("startsWith", path, Some(Value::String(prefix)))
            }
            Filter::And(filters) => RawFilter {
                filters: Some(filters),
                ..RawFilter::bare("and")
            },
            Filter::Or(filters) => RawFilter {
                filters: Some(filters),
                ..RawFilter::bare("or")
            },
            Filter::Not(inner) => RawFilter {
                filter: Some(inner),
                ..RawFilter::bare("not")
            },
            Filter::Unsupported { operator } => RawFilter::bare(&operator),
        }
    }
}
