//! Structural diff and patch for whole documents
//!
//! A document's history is recorded as JSON-Patch style operations
//! (`add`, `replace`, `remove`) computed between its previous and new whole
//! value. Both values are wrapped in a synthetic object under the
//! [`ROOT_FIELD`] key, so a missing document is simply `{}`:
//!
//! | Old | New | Ops |
//! |-----|-----|-----|
//! | absent | `v` | `add /root` |
//! | `v` | absent | `remove /root` |
//! | `a` | `b` | ops under `/root/...` |
//! | equal | equal | none |
//!
//! Paths are RFC 6901 JSON pointers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::value::json_equal;

/// Name of the synthetic field every document is diffed under
pub const ROOT_FIELD: &str = "root";

/// A single structural patch operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOp {
    /// Insert a member or array element
    Add {
        /// JSON pointer to the new location
        path: String,
        /// Value to insert
        value: Value,
    },
    /// Overwrite an existing member or element
    Replace {
        /// JSON pointer to the replaced location
        path: String,
        /// Replacement value
        value: Value,
    },
    /// Delete an existing member or element
    Remove {
        /// JSON pointer to the removed location
        path: String,
    },
}

impl PatchOp {
    /// Pointer this operation targets
    pub fn path(&self) -> &str {
        match self {
            PatchOp::Add { path, .. } | PatchOp::Replace { path, .. } | PatchOp::Remove { path } => {
                path
            }
        }
    }
}

// =============================================================================
// JSON pointers
// =============================================================================

/// Escapes a JSON Pointer path component.
pub fn escape_component(component: &str) -> String {
    if !component.contains('/') && !component.contains('~') {
        return component.to_string();
    }
    component.replace('~', "~0").replace('/', "~1")
}

/// Unescapes a JSON Pointer path component.
pub fn unescape_component(component: &str) -> String {
    if !component.contains('~') {
        return component.to_string();
    }
    component.replace("~1", "/").replace("~0", "~")
}

/// Format path components into a JSON Pointer string.
pub fn format_pointer(path: &[String]) -> String {
    let mut out = String::new();
    for component in path {
        out.push('/');
        out.push_str(&escape_component(component));
    }
    out
}

/// Parse a JSON Pointer string into path components.
pub fn parse_pointer(pointer: &str) -> Result<Vec<String>> {
    if pointer.is_empty() {
        return Ok(Vec::new());
    }
    if !pointer.starts_with('/') {
        return Err(Error::patch(format!("invalid pointer '{}'", pointer)));
    }
    Ok(pointer[1..].split('/').map(unescape_component).collect())
}

// =============================================================================
// Diff
// =============================================================================

/// Compute the operations turning `old` into `new`
///
/// `None` stands for an absent (never written or deleted) document. Returns an
/// empty list iff the two are structurally equal.
pub fn diff(old: Option<&Value>, new: Option<&Value>) -> Vec<PatchOp> {
    let root = vec![ROOT_FIELD.to_string()];
    match (old, new) {
        (None, None) => Vec::new(),
        (None, Some(value)) => vec![PatchOp::Add {
            path: format_pointer(&root),
            value: value.clone(),
        }],
        (Some(_), None) => vec![PatchOp::Remove {
            path: format_pointer(&root),
        }],
        (Some(old), Some(new)) => {
            let mut ops = Vec::new();
            let mut path = root;
            diff_at_path(&mut ops, &mut path, old, new);
            ops
        }
    }
}

fn diff_at_path(ops: &mut Vec<PatchOp>, path: &mut Vec<String>, src: &Value, dst: &Value) {
    if json_equal(src, dst) {
        return;
    }
    match (src, dst) {
        (Value::Object(s), Value::Object(d)) => diff_obj(ops, path, s, d),
        (Value::Array(s), Value::Array(d)) => diff_arr(ops, path, s, d),
        _ => ops.push(PatchOp::Replace {
            path: format_pointer(path),
            value: dst.clone(),
        }),
    }
}

fn diff_obj(
    ops: &mut Vec<PatchOp>,
    path: &mut Vec<String>,
    src: &Map<String, Value>,
    dst: &Map<String, Value>,
) {
    for (key, src_val) in src {
        path.push(key.clone());
        match dst.get(key) {
            Some(dst_val) => diff_at_path(ops, path, src_val, dst_val),
            None => ops.push(PatchOp::Remove {
                path: format_pointer(path),
            }),
        }
        path.pop();
    }
    for (key, dst_val) in dst {
        if !src.contains_key(key) {
            path.push(key.clone());
            ops.push(PatchOp::Add {
                path: format_pointer(path),
                value: dst_val.clone(),
            });
            path.pop();
        }
    }
}

// Surplus elements are removed from the end backwards so earlier indices stay
// valid, shared indices are diffed in place, new elements are appended.
fn diff_arr(ops: &mut Vec<PatchOp>, path: &mut Vec<String>, src: &[Value], dst: &[Value]) {
    for i in (dst.len()..src.len()).rev() {
        path.push(i.to_string());
        ops.push(PatchOp::Remove {
            path: format_pointer(path),
        });
        path.pop();
    }
    for (i, (s, d)) in src.iter().zip(dst).enumerate() {
        path.push(i.to_string());
        diff_at_path(ops, path, s, d);
        path.pop();
    }
    for (i, d) in dst.iter().enumerate().skip(src.len()) {
        path.push(i.to_string());
        ops.push(PatchOp::Add {
            path: format_pointer(path),
            value: d.clone(),
        });
        path.pop();
    }
}

// =============================================================================
// Apply
// =============================================================================

/// Replay `ops` onto `base`, returning the resulting document
///
/// `None` in and out stands for an absent document.
pub fn apply(base: Option<Value>, ops: &[PatchOp]) -> Result<Option<Value>> {
    let mut wrapper = Map::new();
    if let Some(value) = base {
        wrapper.insert(ROOT_FIELD.to_string(), value);
    }
    let mut doc = Value::Object(wrapper);
    for op in ops {
        apply_op(&mut doc, op)?;
    }
    match doc {
        Value::Object(mut map) => Ok(map.remove(ROOT_FIELD)),
        _ => Err(Error::patch("patch replaced the document wrapper")),
    }
}

fn apply_op(doc: &mut Value, op: &PatchOp) -> Result<()> {
    let mut segments = parse_pointer(op.path())?;
    let last = segments
        .pop()
        .ok_or_else(|| Error::patch("operation targets the document wrapper"))?;
    let parent = resolve_mut(doc, &segments)
        .ok_or_else(|| Error::patch(format!("path not found: {}", op.path())))?;

    match (op, parent) {
        (PatchOp::Add { value, .. }, Value::Object(map)) => {
            map.insert(last, value.clone());
        }
        (PatchOp::Add { value, .. }, Value::Array(arr)) => {
            let index = if last == "-" {
                arr.len()
            } else {
                array_index(&last, arr.len() + 1, op.path())?
            };
            arr.insert(index, value.clone());
        }
        (PatchOp::Replace { value, .. }, Value::Object(map)) => match map.get_mut(&last) {
            Some(slot) => *slot = value.clone(),
            None => return Err(Error::patch(format!("path not found: {}", op.path()))),
        },
        (PatchOp::Replace { value, .. }, Value::Array(arr)) => {
            let index = array_index(&last, arr.len(), op.path())?;
            arr[index] = value.clone();
        }
        (PatchOp::Remove { .. }, Value::Object(map)) => {
            if map.remove(&last).is_none() {
                return Err(Error::patch(format!("path not found: {}", op.path())));
            }
        }
        (PatchOp::Remove { .. }, Value::Array(arr)) => {
            let index = array_index(&last, arr.len(), op.path())?;
            arr.remove(index);
        }
        _ => {
            return Err(Error::patch(format!(
                "cannot index into scalar at {}",
                op.path()
            )))
        }
    }
    Ok(())
}

fn resolve_mut<'a>(mut current: &'a mut Value, segments: &[String]) -> Option<&'a mut Value> {
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get_mut(segment)?,
            Value::Array(arr) => {
                let index: usize = segment.parse().ok()?;
                arr.get_mut(index)?
            }
            _ => return None,
        };
    }
    Some(current)
}

fn array_index(segment: &str, bound: usize, pointer: &str) -> Result<usize> {
    match segment.parse::<usize>() {
        Ok(index) if index < bound => Ok(index),
        _ => Err(Error::patch(format!("array index out of range: {}", pointer))),
    }
}
