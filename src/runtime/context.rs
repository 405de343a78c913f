//! Per-render state.
//!
//! A [`RenderContext`] owns the live bindings and the macro registry of one render call. Bindings
//! are an `im::HashMap`, so the copy taken for every macro invocation shares structure with the
//! caller instead of duplicating it. The registry, configuration and source are borrowed from
//! the compiled template and shared read-only.

use std::cell::{RefCell, RefMut};
use std::rc::Rc;
use std::sync::Arc;

use im::HashMap;
use miette::SourceSpan;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;

use crate::ast::value::Value;
use crate::ast::MacroDef;
use crate::engine::EngineConfig;
use crate::errors::{ErrorKind, ErrorReporting, SourceContext, TemplateError};
use crate::runtime::path;
use crate::runtime::registry::{Function, Registry};

// Using a concrete, seedable PRNG for determinism.
pub type TemplateRng = Xoshiro256StarStar;

/// Something invocable by name from an expression.
#[derive(Clone)]
pub enum Callable {
    Native(Function),
    Macro(Arc<MacroDef>),
}

pub struct RenderContext<'a> {
    bindings: HashMap<String, Value>,
    macros: HashMap<String, Arc<MacroDef>>,
    registry: &'a Registry,
    config: &'a EngineConfig,
    source: &'a SourceContext,
    depth: usize,
    rng: Rc<RefCell<TemplateRng>>,
}

impl<'a> RenderContext<'a> {
    pub fn new(
        bindings: HashMap<String, Value>,
        registry: &'a Registry,
        config: &'a EngineConfig,
        source: &'a SourceContext,
    ) -> Self {
        let rng = match config.seed {
            Some(seed) => TemplateRng::seed_from_u64(seed),
            None => TemplateRng::from_entropy(),
        };
        Self {
            bindings,
            macros: HashMap::new(),
            registry,
            config,
            source,
            depth: 0,
            rng: Rc::new(RefCell::new(rng)),
        }
    }

    // ------------------------------------------------------------------------
    // Bindings
    // ------------------------------------------------------------------------

    pub fn bindings(&self) -> &HashMap<String, Value> {
        &self.bindings
    }

    /// Top-level binding by exact name (no path resolution).
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    /// Binds `name`, returning the previous binding.
    pub fn set(&mut self, name: &str, value: Value) -> Option<Value> {
        self.bindings.insert(name.to_string(), value)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.bindings.remove(name)
    }

    /// Puts back a binding saved by [`RenderContext::set`]: re-binds it, or removes the name
    /// when it was absent.
    pub fn restore(&mut self, name: &str, saved: Option<Value>) {
        match saved {
            Some(value) => {
                self.bindings.insert(name.to_string(), value);
            }
            None => {
                self.bindings.remove(name);
            }
        }
    }

    /// Resolves a dotted/bracketed path; missing links yield `Value::Null`.
    pub fn resolve(&self, path: &str) -> Value {
        path::resolve(&self.bindings, path)
    }

    // ------------------------------------------------------------------------
    // Callables
    // ------------------------------------------------------------------------

    pub fn register_macro(&mut self, def: Arc<MacroDef>) {
        tracing::debug!(name = %def.name, params = def.params.len(), "registering macro");
        self.macros.insert(def.name.clone(), def);
    }

    pub fn has_macro(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    /// Function lookup: macros of this render shadow engine functions.
    pub fn function(&self, name: &str) -> Option<Callable> {
        if let Some(def) = self.macros.get(name) {
            return Some(Callable::Macro(Arc::clone(def)));
        }
        self.registry.function(name).cloned().map(Callable::Native)
    }

    /// Filter lookup: engine filters, then engine functions, then macros of this render.
    pub fn filter(&self, name: &str) -> Option<Callable> {
        if let Some(func) = self.registry.filter(name) {
            return Some(Callable::Native(Arc::clone(func)));
        }
        self.macros
            .get(name)
            .map(|def| Callable::Macro(Arc::clone(def)))
    }

    // ------------------------------------------------------------------------
    // Nesting
    // ------------------------------------------------------------------------

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Context for a macro invocation: a copy of the current bindings and macros one level
    /// deeper, sharing registry, configuration, source and random generator.
    pub fn nested(&self) -> Result<RenderContext<'a>, TemplateError> {
        let depth = self.depth + 1;
        if depth > self.config.max_depth {
            return Err(TemplateError::new(ErrorKind::RecursionLimit {
                limit: self.config.max_depth,
            }));
        }
        Ok(RenderContext {
            bindings: self.bindings.clone(),
            macros: self.macros.clone(),
            registry: self.registry,
            config: self.config,
            source: self.source,
            depth,
            rng: Rc::clone(&self.rng),
        })
    }

    // ------------------------------------------------------------------------
    // Shared services
    // ------------------------------------------------------------------------

    pub fn config(&self) -> &'a EngineConfig {
        self.config
    }

    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    pub fn source(&self) -> &'a SourceContext {
        self.source
    }

    /// The render's random generator, seeded from [`EngineConfig::seed`] when set.
    pub fn rng(&self) -> RefMut<'_, TemplateRng> {
        self.rng.borrow_mut()
    }

    /// Locates `err` at `span` unless it already carries a location.
    pub fn locate(&self, err: TemplateError, span: SourceSpan) -> TemplateError {
        err.located(self.source, span, self.config.snippet_radius)
    }
}

impl ErrorReporting for RenderContext<'_> {
    fn report(&self, kind: ErrorKind, span: SourceSpan) -> TemplateError {
        self.locate(TemplateError::new(kind), span)
    }
}
