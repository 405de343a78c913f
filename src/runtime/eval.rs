//! Rendering of nodes and evaluation of expressions.
//!
//! Nodes render into a shared output buffer against a mutable [`RenderContext`]; expressions
//! evaluate against a shared one. Evaluation errors are created unlocated and picked up by the
//! node that triggered them, which attaches its tag span. Since the innermost node wins, an
//! error inside a macro body points at the failing node in the body, not at the call site.

use std::sync::Arc;

use im::HashMap;

use crate::ast::value::Value;
use crate::ast::{Expression, FilterRef, MacroDef, Node, Span};
use crate::errors::{ErrorKind, TemplateError};
use crate::runtime::context::{Callable, RenderContext};
use crate::runtime::ops;

type EvalResult<T = Value> = Result<T, TemplateError>;

// ============================================================================
// NODES
// ============================================================================

pub fn render_nodes(
    nodes: &[Node],
    ctx: &mut RenderContext<'_>,
    out: &mut String,
) -> EvalResult<()> {
    for node in nodes {
        render_node(node, ctx, out)?;
    }
    Ok(())
}

fn render_node(node: &Node, ctx: &mut RenderContext<'_>, out: &mut String) -> EvalResult<()> {
    match node {
        Node::Text(text) => {
            out.push_str(text);
            Ok(())
        }
        Node::Variable { expr, span } => {
            let value = eval_at(expr, ctx, *span)?;
            if !value.is_null() {
                out.push_str(&value.to_string());
            }
            Ok(())
        }
        Node::If {
            condition,
            true_branch,
            false_branch,
            span,
        } => {
            if eval_at(condition, ctx, *span)?.is_truthy() {
                render_nodes(true_branch, ctx, out)
            } else if let Some(false_branch) = false_branch {
                render_nodes(false_branch, ctx, out)
            } else {
                Ok(())
            }
        }
        Node::For {
            loop_var,
            source,
            body,
            span,
        } => {
            let Value::List(items) = eval_at(source, ctx, *span)? else {
                return Ok(());
            };
            render_loop(loop_var, items, body, ctx, out)
        }
        Node::Set { name, value, span } => {
            let value = eval_at(value, ctx, *span)?;
            ctx.set(name, value);
            Ok(())
        }
        Node::Macro(def) => {
            ctx.register_macro(Arc::clone(def));
            Ok(())
        }
    }
}

/// Binds the loop variable and the loop metadata per item, then restores both to their
/// pre-loop state whether or not the body failed.
fn render_loop(
    loop_var: &str,
    items: Vec<Value>,
    body: &[Node],
    ctx: &mut RenderContext<'_>,
    out: &mut String,
) -> EvalResult<()> {
    let meta_var = ctx.config().loop_var.clone();
    let saved_item = ctx.get(loop_var).cloned();
    let saved_meta = ctx.get(&meta_var).cloned();

    let length = items.len();
    let mut result = Ok(());
    for (index, item) in items.into_iter().enumerate() {
        ctx.set(&meta_var, loop_metadata(index, length));
        ctx.set(loop_var, item);
        result = render_nodes(body, ctx, out);
        if result.is_err() {
            break;
        }
    }

    ctx.restore(&meta_var, saved_meta);
    ctx.restore(loop_var, saved_item);
    result
}

fn loop_metadata(index: usize, length: usize) -> Value {
    let mut meta = HashMap::new();
    meta.insert("index".to_string(), Value::from(index));
    meta.insert("index1".to_string(), Value::from(index + 1));
    meta.insert("first".to_string(), Value::Bool(index == 0));
    meta.insert("last".to_string(), Value::Bool(index + 1 == length));
    meta.insert("length".to_string(), Value::from(length));
    Value::Map(meta)
}

fn eval_at(expr: &Expression, ctx: &RenderContext<'_>, span: Span) -> EvalResult {
    evaluate(expr, ctx).map_err(|err| ctx.locate(err, span.into()))
}

// ============================================================================
// EXPRESSIONS
// ============================================================================

pub fn evaluate(expr: &Expression, ctx: &RenderContext<'_>) -> EvalResult {
    match expr {
        Expression::Literal(value) => Ok(value.clone()),
        Expression::ObjectLiteral(entries) => {
            let mut map = HashMap::new();
            for (key, value) in entries {
                map.insert(key.clone(), evaluate(value, ctx)?);
            }
            Ok(Value::Map(map))
        }
        Expression::ArrayLiteral(items) => items
            .iter()
            .map(|item| evaluate(item, ctx))
            .collect::<EvalResult<Vec<_>>>()
            .map(Value::List),
        Expression::Variable(path) => Ok(ctx.resolve(path)),
        Expression::Call { name, args } => {
            let callable = ctx.function(name).ok_or_else(|| {
                TemplateError::new(ErrorKind::FunctionNotFound { name: name.clone() })
            })?;
            let args = evaluate_all(args, ctx)?;
            invoke(&callable, ctx, args)
        }
        Expression::Binary { op, left, right } => {
            let left = evaluate(left, ctx)?;
            let right = evaluate(right, ctx)?;
            ops::binary(*op, &left, &right)
        }
        Expression::Unary { op, operand } => ops::unary(*op, &evaluate(operand, ctx)?),
        Expression::Filtered { base, chain } => {
            let value = evaluate(base, ctx)?;
            chain
                .iter()
                .try_fold(value, |value, filter| apply_filter(filter, value, ctx))
        }
    }
}

fn evaluate_all(args: &[Expression], ctx: &RenderContext<'_>) -> EvalResult<Vec<Value>> {
    args.iter().map(|arg| evaluate(arg, ctx)).collect()
}

fn apply_filter(filter: &FilterRef, input: Value, ctx: &RenderContext<'_>) -> EvalResult {
    let callable = ctx.filter(&filter.name).ok_or_else(|| {
        TemplateError::new(ErrorKind::FilterNotFound {
            name: filter.name.clone(),
        })
    })?;
    let mut args = Vec::with_capacity(filter.args.len() + 1);
    args.push(input);
    for arg in &filter.args {
        args.push(evaluate(arg, ctx)?);
    }
    invoke(&callable, ctx, args)
}

fn invoke(callable: &Callable, ctx: &RenderContext<'_>, args: Vec<Value>) -> EvalResult {
    match callable {
        Callable::Native(func) => func(ctx, &args),
        Callable::Macro(def) => call_macro(def, ctx, args),
    }
}

/// Renders a macro body against a copy of the caller's bindings with the parameters bound
/// positionally. Missing arguments bind null; extra arguments are ignored.
pub fn call_macro(def: &MacroDef, caller: &RenderContext<'_>, args: Vec<Value>) -> EvalResult {
    let mut ctx = caller.nested()?;
    let mut args = args.into_iter();
    for param in &def.params {
        ctx.set(param, args.next().unwrap_or_default());
    }
    let mut out = String::new();
    render_nodes(&def.body, &mut ctx, &mut out)?;
    Ok(Value::String(out))
}
