//! Compile and render entry points.
//!
//! An [`Engine`] is configured up front (functions, filters, [`EngineConfig`]) and then compiles
//! sources into [`Template`]s. Each template keeps `Arc` snapshots of the registry and
//! configuration it was compiled with, so registering more callables later never changes an
//! already-compiled template. Templates are `Send + Sync` and may be rendered from any number
//! of threads at once; every render builds its own [`RenderContext`].

use std::sync::Arc;

use im::HashMap;
use serde::{Deserialize, Serialize};

use crate::ast::value::Value;
use crate::ast::Node;
use crate::errors::{SourceContext, TemplateError};
use crate::runtime::context::RenderContext;
use crate::runtime::eval::render_nodes;
use crate::runtime::registry::Registry;
use crate::syntax::{self, ParseContext};

/// Name given to templates compiled without an explicit one.
pub const DEFAULT_TEMPLATE_NAME: &str = "template";

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Engine settings. Deserializable, with every field optional:
///
/// ```rust
/// use stencil::EngineConfig;
/// let config: EngineConfig = serde_json::from_str(r#"{ "max_depth": 32 }"#).unwrap();
/// assert_eq!(config.max_depth, 32);
/// assert_eq!(config.loop_var, "loop");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum macro call nesting before a render fails with a recursion error.
    pub max_depth: usize,
    /// Bytes of source shown on each side of an error position.
    pub snippet_radius: usize,
    /// Name under which `for` loops expose their metadata record.
    pub loop_var: String,
    /// Seed for the per-render random generator; fresh entropy when unset.
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: 256,
            snippet_radius: 30,
            loop_var: "loop".to_string(),
            seed: None,
        }
    }
}

// ============================================================================
// ENGINE
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct Engine {
    registry: Arc<Registry>,
    config: Arc<EngineConfig>,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            registry: Arc::default(),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn register_function<F>(&mut self, name: &str, func: F) -> &mut Self
    where
        F: Fn(&RenderContext<'_>, &[Value]) -> Result<Value, TemplateError> + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.registry).register_function(name, func);
        self
    }

    pub fn register_filter<F>(&mut self, name: &str, func: F) -> &mut Self
    where
        F: Fn(&RenderContext<'_>, &[Value]) -> Result<Value, TemplateError> + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.registry).register_filter(name, func);
        self
    }

    pub fn compile(&self, source: &str) -> Result<Template, TemplateError> {
        self.compile_named(DEFAULT_TEMPLATE_NAME, source)
    }

    /// Compiles `source`; `name` identifies the template in diagnostics.
    pub fn compile_named(&self, name: &str, source: &str) -> Result<Template, TemplateError> {
        let source = SourceContext::new(name, source);
        let parse_ctx = ParseContext::new(source, self.config.snippet_radius);
        let nodes = syntax::parse(&parse_ctx)?;
        tracing::debug!(template = name, nodes = nodes.len(), "compiled template");
        Ok(Template {
            nodes: nodes.into(),
            source: parse_ctx.source,
            registry: Arc::clone(&self.registry),
            config: Arc::clone(&self.config),
        })
    }

    /// Compiles and renders in one step.
    pub fn render(
        &self,
        source: &str,
        vars: &HashMap<String, Value>,
    ) -> Result<String, TemplateError> {
        self.compile(source)?.render(vars)
    }
}

// ============================================================================
// TEMPLATE
// ============================================================================

/// A compiled template. Cheap to clone; the node tree is shared.
#[derive(Debug, Clone)]
pub struct Template {
    nodes: Arc<[Node]>,
    source: SourceContext,
    registry: Arc<Registry>,
    config: Arc<EngineConfig>,
}

impl Template {
    pub fn name(&self) -> &str {
        &self.source.name
    }

    pub fn source(&self) -> &SourceContext {
        &self.source
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Renders against `vars` as the top-level bindings.
    pub fn render(&self, vars: &HashMap<String, Value>) -> Result<String, TemplateError> {
        tracing::debug!(template = %self.source.name, vars = vars.len(), "render start");
        let mut ctx = RenderContext::new(vars.clone(), &self.registry, &self.config, &self.source);
        let mut out = String::new();
        render_nodes(&self.nodes, &mut ctx, &mut out)?;
        tracing::debug!(template = %self.source.name, bytes = out.len(), "render finished");
        Ok(out)
    }

    /// Renders against a map value; `Null` means no bindings.
    pub fn render_value(&self, vars: &Value) -> Result<String, TemplateError> {
        match vars {
            Value::Map(map) => self.render(map),
            Value::Null => self.render(&HashMap::new()),
            other => Err(TemplateError::custom(format!(
                "render context must be a map, got {}",
                other.type_name()
            ))),
        }
    }

    /// Renders against any serializable value that serializes to a map.
    pub fn render_serialize<T: Serialize + ?Sized>(&self, vars: &T) -> Result<String, TemplateError> {
        self.render_value(&Value::from_serialize(vars)?)
    }
}
