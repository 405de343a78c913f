//! AST module for Stencil templates
//!
//! A compiled template is an ordered sequence of [`Node`]s. Nodes describe output structure,
//! [`Expression`]s describe values. Both are immutable once the parser returns them, so a
//! compiled tree can be shared read-only between any number of concurrent renders.

pub mod value;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use value::Value;

// ============================================================================
// SPANS
// ============================================================================

/// Byte range in the template source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

impl From<Span> for miette::SourceSpan {
    fn from(span: Span) -> Self {
        miette::SourceSpan::from(span.start..span.end)
    }
}

// ============================================================================
// NODES
// ============================================================================

/// A compiled unit of output structure.
///
/// Nodes that evaluate expressions carry the span of their tag so evaluation errors can be
/// reported against the template source.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Variable {
        expr: Expression,
        span: Span,
    },
    If {
        condition: Expression,
        true_branch: Vec<Node>,
        false_branch: Option<Vec<Node>>,
        span: Span,
    },
    For {
        loop_var: String,
        source: Expression,
        body: Vec<Node>,
        span: Span,
    },
    Set {
        name: String,
        value: Expression,
        span: Span,
    },
    Macro(Arc<MacroDef>),
}

/// Definition captured by a `{% macro %}` block.
///
/// Shared behind an `Arc` so the closure registered at render time refers to the compiled body
/// instead of copying it.
#[derive(Debug, Clone, PartialEq)]
pub struct MacroDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Node>,
    pub span: Span,
}

// ============================================================================
// EXPRESSIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Value),
    ObjectLiteral(Vec<(String, Expression)>),
    ArrayLiteral(Vec<Expression>),
    /// Dotted/bracketed path such as `user.colors[0]`, resolved at render time.
    Variable(String),
    Call {
        name: String,
        args: Vec<Expression>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
    },
    Filtered {
        base: Box<Expression>,
        chain: Vec<FilterRef>,
    },
}

/// One `| name(args)` segment of a filter chain.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterRef {
    pub name: String,
    pub args: Vec<Expression>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

impl BinaryOp {
    pub const fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Or => "or",
            BinaryOp::And => "and",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Neg,
}

impl UnaryOp {
    pub const fn symbol(&self) -> &'static str {
        match self {
            UnaryOp::Not => "not",
            UnaryOp::Neg => "-",
        }
    }
}

// ============================================================================
// PRETTY PRINTING
// ============================================================================

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(Value::String(s)) => write!(f, "{s:?}"),
            Expression::Literal(v) => write!(f, "{v}"),
            Expression::ObjectLiteral(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                write!(f, "}}")
            }
            Expression::ArrayLiteral(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Expression::Variable(path) => write!(f, "{path}"),
            Expression::Call { name, args } => {
                write!(f, "{name}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            Expression::Binary { op, left, right } => {
                write!(f, "({left} {} {right})", op.symbol())
            }
            Expression::Unary { op: UnaryOp::Not, operand } => write!(f, "(not {operand})"),
            Expression::Unary { op: UnaryOp::Neg, operand } => write!(f, "(-{operand})"),
            Expression::Filtered { base, chain } => {
                write!(f, "{base}")?;
                for filter in chain {
                    write!(f, " | {}", filter.name)?;
                    if !filter.args.is_empty() {
                        write!(f, "(")?;
                        for (i, arg) in filter.args.iter().enumerate() {
                            if i > 0 {
                                write!(f, ", ")?;
                            }
                            write!(f, "{arg}")?;
                        }
                        write!(f, ")")?;
                    }
                }
                Ok(())
            }
        }
    }
}
