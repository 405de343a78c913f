//! # Standard Filters
//!
//! Each filter receives the piped value as its first argument. Missing or null input yields the
//! empty string, except for `replace`, which hands back its input untouched.

use std::cmp::Ordering;

use unicode_segmentation::UnicodeSegmentation;

use crate::ast::value::Value;
use crate::engine::Engine;
use crate::errors::TemplateError;
use crate::stdlib::{int_arg, string_arg, subject, NativeFn};

pub fn register_filters(engine: &mut Engine) {
    engine
        .register_filter("join", FILTER_JOIN)
        .register_filter("truncate", FILTER_TRUNCATE)
        .register_filter("reverse", FILTER_REVERSE)
        .register_filter("replace", FILTER_REPLACE)
        .register_filter("capitalize", FILTER_CAPITALIZE)
        .register_filter("sort", FILTER_SORT)
        .register_filter("unique", FILTER_UNIQUE)
        .register_filter("round", FILTER_ROUND);
}

fn empty() -> Value {
    Value::String(String::new())
}

// ============================================================================
// STRINGS
// ============================================================================

/// Usage: <list> | join(<separator>="")
///
/// Non-list input is returned in its string form.
pub const FILTER_JOIN: NativeFn = |_, args| {
    let Some(value) = subject(args) else {
        return Ok(empty());
    };
    let separator = string_arg(args, 1, "");
    Ok(Value::String(match value {
        Value::List(items) => items
            .iter()
            .map(Value::to_string)
            .collect::<Vec<_>>()
            .join(&separator),
        other => other.to_string(),
    }))
};

/// Usage: <text> | truncate(<length>=50, <suffix>="...")
///
/// Lengths count grapheme clusters, so a cut never splits a visible character.
pub const FILTER_TRUNCATE: NativeFn = |_, args| {
    let Some(value) = subject(args) else {
        return Ok(empty());
    };
    let input = value.to_string();
    let length = usize::try_from(int_arg("truncate", args, 1, 50)?).unwrap_or(0);
    let suffix = string_arg(args, 2, "...");
    match input.grapheme_indices(true).nth(length) {
        None => Ok(Value::String(input)),
        Some((cut, _)) => Ok(Value::String(format!("{}{suffix}", &input[..cut]))),
    }
};

/// Usage: <text or list> | reverse
pub const FILTER_REVERSE: NativeFn = |_, args| match subject(args) {
    None => Ok(empty()),
    Some(Value::String(s)) => Ok(Value::String(s.graphemes(true).rev().collect())),
    Some(Value::List(items)) => Ok(Value::List(items.iter().rev().cloned().collect())),
    Some(other) => Ok(other.clone()),
};

/// Usage: <text> | replace(<from>, <to>)
pub const FILTER_REPLACE: NativeFn = |_, args| {
    let [input, from, to, ..] = args else {
        return Ok(args.first().cloned().unwrap_or_default());
    };
    Ok(Value::String(
        input.to_string().replace(&from.to_string(), &to.to_string()),
    ))
};

/// Usage: <text> | capitalize
///
/// Uppercases the first character only; the rest is left as is.
pub const FILTER_CAPITALIZE: NativeFn = |_, args| {
    let Some(value) = subject(args) else {
        return Ok(empty());
    };
    let s = value.to_string();
    let mut chars = s.chars();
    Ok(Value::String(match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => s,
    }))
};

// ============================================================================
// LISTS
// ============================================================================

/// Usage: <list> | sort
///
/// Values group by type (null, booleans, numbers, strings, lists, maps, objects). Within a
/// group the natural ordering applies, string forms otherwise. Stable.
pub const FILTER_SORT: NativeFn = |_, args| match subject(args) {
    None => Ok(empty()),
    Some(Value::List(items)) => {
        let mut sorted = items.clone();
        sorted.sort_by(sort_order);
        Ok(Value::List(sorted))
    }
    Some(other) => Ok(other.clone()),
};

fn sort_order(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (x, y) if x.is_number() && y.is_number() => {
            let (x, y) = (x.as_f64().unwrap_or_default(), y.as_f64().unwrap_or_default());
            x.total_cmp(&y)
        }
        _ => sort_rank(a).cmp(&sort_rank(b)).then_with(|| {
            a.natural_cmp(b)
                .unwrap_or_else(|| a.to_string().cmp(&b.to_string()))
        }),
    }
}

fn sort_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Int(_) | Value::Float(_) => 2,
        Value::String(_) => 3,
        Value::List(_) => 4,
        Value::Map(_) => 5,
        Value::Object(_) => 6,
    }
}

/// Usage: <list> | unique
///
/// Keeps the first occurrence of each value, in order.
pub const FILTER_UNIQUE: NativeFn = |_, args| match subject(args) {
    None => Ok(empty()),
    Some(Value::List(items)) => {
        let mut seen: Vec<Value> = Vec::with_capacity(items.len());
        for item in items {
            if !seen.contains(item) {
                seen.push(item.clone());
            }
        }
        Ok(Value::List(seen))
    }
    Some(other) => Ok(other.clone()),
};

// ============================================================================
// NUMBERS
// ============================================================================

/// Usage: <number> | round(<precision>=0)
///
/// Rounds half up at the given number of decimals. Always returns a Float.
pub const FILTER_ROUND: NativeFn = |_, args| {
    let Some(value) = subject(args) else {
        return Ok(empty());
    };
    let Some(number) = value.as_f64() else {
        return Err(TemplateError::custom(format!(
            "round: expected a number, got {}",
            value.type_name()
        )));
    };
    let precision = int_arg("round", args, 1, 0)?;
    let factor = 10f64.powi(precision.clamp(-300, 300) as i32);
    Ok(Value::Float((number * factor + 0.5).floor() / factor))
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;
    use crate::errors::SourceContext;
    use crate::runtime::context::RenderContext;
    use crate::runtime::registry::Registry;

    fn call(func: NativeFn, args: &[Value]) -> Result<Value, TemplateError> {
        let registry = Registry::new();
        let config = EngineConfig::default();
        let source = SourceContext::new("filter", "");
        let ctx = RenderContext::new(Default::default(), &registry, &config, &source);
        func(&ctx, args)
    }

    fn list(items: &[i64]) -> Value {
        Value::List(items.iter().copied().map(Value::Int).collect())
    }

    #[test]
    fn join_lists() {
        assert_eq!(
            call(FILTER_JOIN, &[list(&[1, 2, 3]), ", ".into()]).unwrap(),
            Value::from("1, 2, 3")
        );
        assert_eq!(call(FILTER_JOIN, &[list(&[1, 2])]).unwrap(), Value::from("12"));
        assert_eq!(call(FILTER_JOIN, &["abc".into(), "-".into()]).unwrap(), Value::from("abc"));
        assert_eq!(call(FILTER_JOIN, &[Value::Null]).unwrap(), Value::from(""));
    }

    #[test]
    fn truncate_by_graphemes() {
        assert_eq!(
            call(FILTER_TRUNCATE, &["Hello, world".into(), Value::Int(5)]).unwrap(),
            Value::from("Hello...")
        );
        assert_eq!(
            call(FILTER_TRUNCATE, &["short".into(), Value::Int(10)]).unwrap(),
            Value::from("short")
        );
        assert_eq!(
            call(FILTER_TRUNCATE, &["e\u{301}e\u{301}e\u{301}".into(), Value::Int(2), "~".into()]).unwrap(),
            Value::from("e\u{301}e\u{301}~")
        );
        assert!(call(FILTER_TRUNCATE, &["x".into(), "ten".into()]).is_err());
    }

    #[test]
    fn reverse_strings_and_lists() {
        assert_eq!(call(FILTER_REVERSE, &["abc".into()]).unwrap(), Value::from("cba"));
        assert_eq!(call(FILTER_REVERSE, &[list(&[1, 2, 3])]).unwrap(), list(&[3, 2, 1]));
        assert_eq!(call(FILTER_REVERSE, &[Value::Int(12)]).unwrap(), Value::Int(12));
    }

    #[test]
    fn replace_and_capitalize() {
        assert_eq!(
            call(FILTER_REPLACE, &["foo bar foo".into(), "foo".into(), "baz".into()]).unwrap(),
            Value::from("baz bar baz")
        );
        assert_eq!(
            call(FILTER_REPLACE, &["unchanged".into(), "x".into()]).unwrap(),
            Value::from("unchanged")
        );
        assert_eq!(call(FILTER_CAPITALIZE, &["hello world".into()]).unwrap(), Value::from("Hello world"));
        assert_eq!(call(FILTER_CAPITALIZE, &["".into()]).unwrap(), Value::from(""));
    }

    #[test]
    fn sort_and_unique() {
        assert_eq!(call(FILTER_SORT, &[list(&[3, 1, 2])]).unwrap(), list(&[1, 2, 3]));
        assert_eq!(
            call(FILTER_SORT, &[Value::from(vec!["pear", "apple"])]).unwrap(),
            Value::from(vec!["apple", "pear"])
        );
        assert_eq!(call(FILTER_UNIQUE, &[list(&[1, 2, 1, 3, 2])]).unwrap(), list(&[1, 2, 3]));
    }

    #[test]
    fn sort_groups_mixed_values_by_type() {
        let mixed = Value::List(vec![
            Value::Int(10),
            "9".into(),
            Value::Float(9.5),
            Value::Null,
            "10".into(),
            Value::Bool(true),
            Value::Float(f64::NAN),
            Value::Int(-1),
        ]);
        let sorted = call(FILTER_SORT, &[mixed]).unwrap();
        let Value::List(items) = sorted else {
            panic!("sort should return a list");
        };
        let rendered: Vec<String> = items.iter().map(Value::to_string).collect();
        assert_eq!(
            rendered,
            vec!["null", "true", "-1", "9.5", "10", "NaN", "10", "9"]
        );
    }

    #[test]
    fn sort_order_is_consistent_on_cycles() {
        let values = [Value::Int(10), Value::from("9"), Value::Float(9.5)];
        for a in &values {
            for b in &values {
                assert_eq!(sort_order(a, b), sort_order(b, a).reverse());
            }
        }
        assert_eq!(sort_order(&Value::Float(9.5), &Value::Int(10)), Ordering::Less);
        assert_eq!(sort_order(&Value::Int(10), &Value::from("9")), Ordering::Less);
        assert_eq!(sort_order(&Value::Float(9.5), &Value::from("9")), Ordering::Less);
    }

    #[test]
    fn round_half_up() {
        assert_eq!(call(FILTER_ROUND, &[Value::Float(3.14159), Value::Int(2)]).unwrap(), Value::Float(3.14));
        assert_eq!(call(FILTER_ROUND, &[Value::Float(2.5)]).unwrap(), Value::Float(3.0));
        assert_eq!(call(FILTER_ROUND, &[Value::Float(-2.5)]).unwrap(), Value::Float(-2.0));
        assert_eq!(call(FILTER_ROUND, &[Value::Int(7)]).unwrap(), Value::Float(7.0));
        assert!(call(FILTER_ROUND, &["x".into()]).is_err());
    }
}
