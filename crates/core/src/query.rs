//! Queries: filter, order, skip and limit over a set of documents
//!
//! Queries are evaluated by brute force. [`Query::execute`] filters every
//! document it is handed, sorts the matches stably by the `orderBy` keys, then
//! slices out `skip`/`limit`.
//!
//! ## Ordering
//!
//! Values of the same comparable kind (number, string, boolean) are compared
//! directly. Values of different kinds, and missing values, never compare
//! against each other by content; they are grouped by kind so the ordering
//! stays total: missing < null < boolean < number < string < array/object.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

use crate::error::Result;
use crate::filter::{DocumentView, FieldPath, Filter};
use crate::record::Document;
use crate::value::compare_same_kind;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Smallest first
    #[default]
    Asc,
    /// Largest first
    Desc,
}

/// One sort key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    /// Field to sort on
    pub path: FieldPath,
    /// Sort direction
    #[serde(default)]
    pub direction: Direction,
}

/// A filter plus ordering and pagination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    /// Documents must match this filter
    pub filter: Filter,
    /// Maximum number of documents returned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Number of matching documents skipped after sorting
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<usize>,
    /// Composite sort keys, most significant first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<OrderBy>,
}

impl Query {
    /// Query with only a filter
    pub fn new(filter: Filter) -> Self {
        Query {
            filter,
            limit: None,
            skip: None,
            order_by: Vec::new(),
        }
    }

    /// Append a sort key
    pub fn order_by(mut self, path: FieldPath, direction: Direction) -> Self {
        self.order_by.push(OrderBy { path, direction });
        self
    }

    /// Set the limit
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the skip count
    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Run the query over `docs`
    ///
    /// Fails only if the filter cannot be compiled (unsupported operator or
    /// invalid pattern).
    pub fn execute<I>(&self, docs: I) -> Result<Vec<Document>>
    where
        I: IntoIterator<Item = Document>,
    {
        let filter = self.filter.compile()?;
        let mut matched: Vec<Document> = docs
            .into_iter()
            .filter(|doc| filter.matches(&DocumentView::new(&doc.key, &doc.value)))
            .collect();

        if !self.order_by.is_empty() {
            matched.sort_by(|a, b| self.compare(a, b));
        }

        let skip = self.skip.unwrap_or(0);
        let limit = self.limit.unwrap_or(usize::MAX);
        Ok(matched.into_iter().skip(skip).take(limit).collect())
    }

    fn compare(&self, a: &Document, b: &Document) -> Ordering {
        let view_a = DocumentView::new(&a.key, &a.value);
        let view_b = DocumentView::new(&b.key, &b.value);
        for order in &self.order_by {
            let left = order.path.resolve(&view_a);
            let right = order.path.resolve(&view_b);
            let ordering = compare_sort_values(left.as_deref(), right.as_deref());
            let ordering = match order.direction {
                Direction::Asc => ordering,
                Direction::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

fn kind_rank(value: Option<&Value>) -> u8 {
    match value {
        None => 0,
        Some(Value::Null) => 1,
        Some(Value::Bool(_)) => 2,
        Some(Value::Number(_)) => 3,
        Some(Value::String(_)) => 4,
        Some(Value::Array(_)) | Some(Value::Object(_)) => 5,
    }
}

fn compare_sort_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let (rank_a, rank_b) = (kind_rank(a), kind_rank(b));
    if rank_a != rank_b {
        return rank_a.cmp(&rank_b);
    }
    match (a, b) {
        (Some(x), Some(y)) => compare_same_kind(x, y).unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    }
}
