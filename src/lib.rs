//! # Stencil
//!
//! A template compiler and renderer. Sources mix literal text with `{{ expression }}` output
//! and `{% tag %}` control flow (`if`/`else`, `for ... in`, `set`, `raw`, `macro`). A source is
//! compiled once into an immutable [`Template`] and rendered any number of times, from any
//! number of threads, against a map of top-level variables.
//!
//! ```rust
//! use stencil::{Engine, Value};
//! use serde_json::json;
//!
//! let mut engine = Engine::new();
//! engine.register_filter("shout", |_ctx, args| {
//!     Ok(Value::from(format!("{}!", args[0].to_string().to_uppercase())))
//! });
//!
//! let template = engine
//!     .compile("{% for n in names %}{{ n | shout }}{% if not loop.last %}, {% endif %}{% endfor %}")
//!     .unwrap();
//! let out = template.render_value(&Value::from(json!({"names": ["ada", "bob"]}))).unwrap();
//! assert_eq!(out, "ADA!, BOB!");
//! ```
//!
//! ## Pipeline
//!
//! - [`syntax`]: source text to [`ast::Node`]s (parse errors carry position and snippet)
//! - [`runtime`]: node rendering, expression evaluation, path resolution, callables
//! - [`engine`]: configuration, registration and the compile/render entry points
//! - [`stdlib`]: optional standard functions and filters

pub mod ast;
pub mod engine;
pub mod errors;
pub mod runtime;
pub mod stdlib;
pub mod syntax;

pub use ast::value::{Accessor, Object, Value};
pub use engine::{Engine, EngineConfig, Template};
pub use errors::{ErrorCategory, ErrorKind, TemplateError};
pub use runtime::{RenderContext, Registry};
