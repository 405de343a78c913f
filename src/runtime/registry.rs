//! Named callables available to templates.
//!
//! Two namespaces: functions (`{{ name(args) }}`) and filters (`{{ value | name(args) }}`).
//! A filter lookup that misses falls back to the function namespace, so any function taking
//! the piped value as its first argument is usable as a filter.
//!
//! ```rust
//! use stencil::runtime::registry::Registry;
//! use stencil::Value;
//!
//! let mut registry = Registry::new();
//! registry.register_function("double", |_ctx, args| {
//!     Ok(Value::Int(args.first().and_then(Value::as_i64).unwrap_or(0) * 2))
//! });
//! assert!(registry.has_function("double"));
//! assert!(registry.filter("double").is_some());
//! ```

use std::fmt;
use std::sync::Arc;

use im::HashMap;

use crate::ast::value::Value;
use crate::errors::TemplateError;
use crate::runtime::context::RenderContext;

/// Callable signature: the active render context and the positional arguments.
pub type Function =
    Arc<dyn Fn(&RenderContext<'_>, &[Value]) -> Result<Value, TemplateError> + Send + Sync>;

#[derive(Clone, Default)]
pub struct Registry {
    functions: HashMap<String, Function>,
    filters: HashMap<String, Function>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a function.
    pub fn register_function<F>(&mut self, name: &str, func: F)
    where
        F: Fn(&RenderContext<'_>, &[Value]) -> Result<Value, TemplateError> + Send + Sync + 'static,
    {
        self.functions.insert(name.to_string(), Arc::new(func));
    }

    /// Registers (or replaces) a filter. The piped value arrives as the first argument.
    pub fn register_filter<F>(&mut self, name: &str, func: F)
    where
        F: Fn(&RenderContext<'_>, &[Value]) -> Result<Value, TemplateError> + Send + Sync + 'static,
    {
        self.filters.insert(name.to_string(), Arc::new(func));
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    /// Filter by name, falling back to the function of the same name.
    pub fn filter(&self, name: &str) -> Option<&Function> {
        self.filters.get(name).or_else(|| {
            let func = self.functions.get(name);
            if func.is_some() {
                tracing::trace!(filter = name, "filter resolved from function namespace");
            }
            func
        })
    }

    /// Filter registered under exactly `name`, without fallback.
    pub fn own_filter(&self, name: &str) -> Option<&Function> {
        self.filters.get(name)
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn has_filter(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    pub fn function_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn filter_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.filters.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.len() + self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty() && self.filters.is_empty()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("functions", &self.function_names())
            .field("filters", &self.filter_names())
            .finish()
    }
}
