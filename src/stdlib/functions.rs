//! # Standard Functions
//!
//! Case conversion, sizes, defaults and numbers.

use rand::Rng;

use crate::ast::value::Value;
use crate::engine::Engine;
use crate::errors::TemplateError;
use crate::stdlib::{int_arg, subject, NativeFn};

pub fn register_functions(engine: &mut Engine) {
    engine
        .register_function("lower", FN_LOWER)
        .register_function("upper", FN_UPPER)
        .register_function("length", FN_LENGTH)
        .register_function("default", FN_DEFAULT)
        .register_function("randomInt", FN_RANDOM_INT)
        .register_function("abs", FN_ABS);
}

// ============================================================================
// STRINGS
// ============================================================================

/// Lowercases the string form of its argument.
///
/// Usage: lower(<value>)
///
/// Returns: a String; null or missing gives "".
pub const FN_LOWER: NativeFn = |_, args| {
    Ok(Value::String(
        subject(args).map(|v| v.to_string().to_lowercase()).unwrap_or_default(),
    ))
};

/// Uppercases the string form of its argument.
///
/// Usage: upper(<value>)
///
/// Returns: a String; null or missing gives "".
pub const FN_UPPER: NativeFn = |_, args| {
    Ok(Value::String(
        subject(args).map(|v| v.to_string().to_uppercase()).unwrap_or_default(),
    ))
};

// ============================================================================
// COLLECTIONS
// ============================================================================

/// Usage: length(<value>)
///
/// Returns: characters of a string, items of a list, entries of a map; 0 for anything else.
pub const FN_LENGTH: NativeFn = |_, args| {
    let length = match subject(args) {
        Some(Value::String(s)) => s.chars().count(),
        Some(Value::List(items)) => items.len(),
        Some(Value::Map(map)) => map.len(),
        _ => 0,
    };
    Ok(Value::from(length))
};

/// Usage: default(<value>, <fallback>)
///
/// Returns: <fallback> when <value> is null or the empty string, otherwise <value>.
pub const FN_DEFAULT: NativeFn = |_, args| {
    let value = args.first().cloned().unwrap_or_default();
    let Some(fallback) = args.get(1) else {
        return Ok(value);
    };
    match &value {
        Value::Null => Ok(fallback.clone()),
        Value::String(s) if s.is_empty() => Ok(fallback.clone()),
        _ => Ok(value),
    }
};

// ============================================================================
// NUMBERS
// ============================================================================

/// Uniform random integer in an inclusive range, drawn from the render's generator.
///
/// Usage: randomInt(<min>=0, <max>=100)
pub const FN_RANDOM_INT: NativeFn = |ctx, args| {
    let min = int_arg("randomInt", args, 0, 0)?;
    let max = int_arg("randomInt", args, 1, 100)?;
    if max < min {
        return Err(TemplateError::custom(format!(
            "randomInt: max ({max}) must not be less than min ({min})"
        )));
    }
    Ok(Value::Int(ctx.rng().gen_range(min..=max)))
};

/// Usage: abs(<number>)
///
/// Returns: the absolute value, keeping the numeric subtype; non-numbers pass through
/// unchanged, null or missing gives "".
pub const FN_ABS: NativeFn = |_, args| match subject(args) {
    None => Ok(Value::String(String::new())),
    Some(Value::Int(n)) => Ok(Value::Int(n.wrapping_abs())),
    Some(Value::Float(n)) => Ok(Value::Float(n.abs())),
    Some(other) => Ok(other.clone()),
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
        let config = EngineConfig {
            seed: Some(42),
            ..EngineConfig::default()
        };
        let source = SourceContext::new("fn", "");
        let ctx = RenderContext::new(Default::default(), &registry, &config, &source);
        func(&ctx, args)
    }

    #[test]
    fn case_conversion() {
        assert_eq!(call(FN_LOWER, &["HeLLo".into()]).unwrap(), Value::from("hello"));
        assert_eq!(call(FN_UPPER, &[Value::Int(5)]).unwrap(), Value::from("5"));
        assert_eq!(call(FN_UPPER, &[]).unwrap(), Value::from(""));
        assert_eq!(call(FN_LOWER, &[Value::Null]).unwrap(), Value::from(""));
    }

    #[test]
    fn length_of_values() {
        assert_eq!(call(FN_LENGTH, &["héllo".into()]).unwrap(), Value::Int(5));
        assert_eq!(call(FN_LENGTH, &[Value::from(vec![1, 2, 3])]).unwrap(), Value::Int(3));
        assert_eq!(call(FN_LENGTH, &[Value::Int(10)]).unwrap(), Value::Int(0));
        assert_eq!(call(FN_LENGTH, &[]).unwrap(), Value::Int(0));
    }

    #[test]
    fn default_replaces_null_and_empty() {
        assert_eq!(call(FN_DEFAULT, &[Value::Null, "d".into()]).unwrap(), Value::from("d"));
        assert_eq!(call(FN_DEFAULT, &["".into(), "d".into()]).unwrap(), Value::from("d"));
        assert_eq!(call(FN_DEFAULT, &[Value::Int(0), "d".into()]).unwrap(), Value::Int(0));
        assert_eq!(call(FN_DEFAULT, &["x".into()]).unwrap(), Value::from("x"));
    }

    #[test]
    fn random_int_is_in_range() {
        for _ in 0..20 {
            let n = call(FN_RANDOM_INT, &[Value::Int(3), Value::Int(5)])
                .unwrap()
                .as_i64()
                .unwrap();
            assert!((3..=5).contains(&n));
        }
        assert_eq!(
            call(FN_RANDOM_INT, &[Value::Int(7), Value::Int(7)]).unwrap(),
            Value::Int(7)
        );
        assert!(call(FN_RANDOM_INT, &[Value::Int(5), Value::Int(1)]).is_err());
        assert!(call(FN_RANDOM_INT, &["a".into()]).is_err());
    }

    #[test]
    fn abs_keeps_subtype() {
        assert_eq!(call(FN_ABS, &[Value::Int(-4)]).unwrap(), Value::Int(4));
        assert_eq!(call(FN_ABS, &[Value::Float(-1.5)]).unwrap(), Value::Float(1.5));
        assert_eq!(call(FN_ABS, &["x".into()]).unwrap(), Value::from("x"));
        assert_eq!(call(FN_ABS, &[]).unwrap(), Value::from(""));
    }
}
