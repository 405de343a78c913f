//! # Standard Functions and Filters
//!
//! Optional callables registered on an [`Engine`] with [`register_all`]. Nothing here is
//! installed implicitly.
//!
//! ## Module Structure
//!
//! - **`functions`**: `lower`, `upper`, `length`, `default`, `randomInt`, `abs`
//! - **`filters`**: `join`, `truncate`, `reverse`, `replace`, `capitalize`, `sort`, `unique`, `round`
//!
//! Every function is also reachable as a filter through the function fallback, so
//! `{{ name | upper }}` and `{{ upper(name) }}` are equivalent.
//!
//! ```rust
//! use stencil::{stdlib, Engine};
//!
//! let mut engine = Engine::new();
//! stdlib::register_all(&mut engine);
//! let out = engine.render("{{ 'hello' | capitalize }}", &Default::default()).unwrap();
//! assert_eq!(out, "Hello");
//! ```

pub mod filters;
pub mod functions;

use crate::ast::value::Value;
use crate::engine::Engine;
use crate::errors::TemplateError;
use crate::runtime::context::RenderContext;

/// Signature shared by every standard callable.
pub type NativeFn = fn(&RenderContext<'_>, &[Value]) -> Result<Value, TemplateError>;

pub fn register_all(engine: &mut Engine) {
    functions::register_functions(engine);
    filters::register_filters(engine);
}

// ============================================================================
// ARGUMENT HELPERS
// ============================================================================

/// The piped/first argument, or `None` when it is missing or null.
pub(crate) fn subject(args: &[Value]) -> Option<&Value> {
    args.first().filter(|v| !v.is_null())
}

/// Optional integer argument at `index`, with a default when absent.
pub(crate) fn int_arg(
    name: &str,
    args: &[Value],
    index: usize,
    default: i64,
) -> Result<i64, TemplateError> {
    match args.get(index) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => value.as_i64().ok_or_else(|| {
            TemplateError::custom(format!(
                "{name}: argument {} must be a number, got {}",
                index + 1,
                value.type_name()
            ))
        }),
    }
}

/// Optional string argument at `index` in canonical string form, with a default when absent.
pub(crate) fn string_arg(args: &[Value], index: usize, default: &str) -> String {
    match args.get(index) {
        Some(value) => value.to_string(),
        None => default.to_string(),
    }
}
