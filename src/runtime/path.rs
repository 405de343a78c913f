//! Dotted/bracketed path resolution: `user.name`, `colors[0]`, `matrix[1][2].label`.
//!
//! Resolution never fails. Any missing link (unknown binding, missing property, bad or
//! out-of-range index, null intermediate) yields `Value::Null`.

use im::HashMap;

use crate::ast::value::Value;
use crate::runtime::accessors;

/// Resolves `path` against `bindings`.
pub fn resolve(bindings: &HashMap<String, Value>, path: &str) -> Value {
    resolve_opt(bindings, path).unwrap_or_default()
}

fn resolve_opt(bindings: &HashMap<String, Value>, path: &str) -> Option<Value> {
    let mut segments = split_segments(path).into_iter();
    let (head, indices) = split_indices(segments.next()?)?;
    let mut current = bindings.get(head)?.clone();
    current = apply_indices(current, &indices)?;

    for segment in segments {
        let (name, indices) = split_indices(segment)?;
        current = property(&current, name)?;
        current = apply_indices(current, &indices)?;
    }
    Some(current)
}

/// Property access: map key lookup, or an attribute read on an object value.
pub fn property(value: &Value, name: &str) -> Option<Value> {
    match value {
        Value::Map(map) => map.get(name).cloned(),
        Value::Object(obj) => accessors::read_attribute(obj.as_ref(), name),
        _ => None,
    }
}

/// Indexed access on a list; negative or out-of-range indices are `None`.
pub fn index(value: &Value, index: i64) -> Option<Value> {
    let Value::List(items) = value else {
        return None;
    };
    usize::try_from(index)
        .ok()
        .and_then(|i| items.get(i))
        .cloned()
}

fn apply_indices(mut current: Value, indices: &[&str]) -> Option<Value> {
    for raw in indices {
        if current.is_null() {
            return None;
        }
        let i = raw.trim().parse::<i64>().ok()?;
        current = index(&current, i)?;
    }
    Some(current)
}

/// Splits on `.` outside brackets.
fn split_segments(path: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in path.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            '.' if depth == 0 => {
                segments.push(&path[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    segments.push(&path[start..]);
    segments
}

/// `colors[0][1]` -> (`colors`, [`0`, `1`]). `None` for an empty name or unbalanced brackets.
fn split_indices(segment: &str) -> Option<(&str, Vec<&str>)> {
    let (name, mut rest) = match segment.find('[') {
        Some(i) => (segment[..i].trim(), &segment[i..]),
        None => (segment.trim(), ""),
    };
    if name.is_empty() {
        return None;
    }
    let mut indices = Vec::new();
    while !rest.is_empty() {
        let inner = rest.trim_start().strip_prefix('[')?;
        let close = inner.find(']')?;
        indices.push(&inner[..close]);
        rest = inner[close + 1..].trim_start();
    }
    Some((name, indices))
}
