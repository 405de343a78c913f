//! Stencil Error Handling
//!
//! Every failure surfaced by the engine is a [`TemplateError`]: the `kind` says what went wrong,
//! the optional source info says where, and the diagnostic info carries the code and help text
//! used by `miette` when the error is rendered as a report.
//!
//! Errors are never constructed field by field outside this module. Parse-time code goes
//! through the [`ErrorReporting`] implementation of the parser, render-time code through
//! [`TemplateError::new`] and the annotation helpers.

use std::fmt;
use std::sync::Arc;

use miette::{Diagnostic, LabeledSpan, NamedSource, SourceSpan};
use thiserror::Error;

// ============================================================================
// SOURCE CONTEXT
// ============================================================================

/// Template source with the name used in diagnostics.
#[derive(Debug, Clone)]
pub struct SourceContext {
    pub name: String,
    pub content: Arc<str>,
}

impl SourceContext {
    pub fn new(name: impl Into<String>, content: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Convert to NamedSource for use with miette error reporting
    pub fn to_named_source(&self) -> Arc<NamedSource<String>> {
        Arc::new(NamedSource::new(self.name.clone(), self.content.to_string()))
    }

    /// Bounded excerpt around `offset`, `radius` bytes on each side, clamped to char boundaries.
    pub fn snippet(&self, offset: usize, radius: usize) -> String {
        let content = &*self.content;
        let mut start = offset.saturating_sub(radius).min(content.len());
        while !content.is_char_boundary(start) {
            start -= 1;
        }
        let mut end = offset.saturating_add(radius).min(content.len());
        while !content.is_char_boundary(end) {
            end += 1;
        }
        format!("...{}", &content[start..end])
    }
}

// ============================================================================
// ERROR KINDS
// ============================================================================

/// What went wrong. Parse kinds come first, evaluation kinds after.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ErrorKind {
    // Parse errors - delimiters and tags
    #[error("tag not closed")]
    UnterminatedTag,
    #[error("variable tag not closed")]
    UnterminatedVariable,
    #[error("raw tag not closed with {{% endraw %}}")]
    UnterminatedRaw,
    #[error("invalid {tag} tag syntax, expected format: '{expected}'")]
    MalformedTag { tag: String, expected: String },
    #[error("expected tag: {tag}")]
    MissingEndTag { tag: String },
    #[error("unexpected tag: {tag}")]
    UnexpectedTag { tag: String },
    #[error("unknown tag: {tag}")]
    UnknownTag { tag: String },

    // Parse errors - expressions
    #[error("invalid number format: {literal}")]
    InvalidNumber { literal: String },
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("unexpected characters in expression: {remainder}")]
    UnexpectedCharacters { remainder: String },
    #[error("expected {expected}")]
    Expected { expected: String },
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("expected identifier")]
    ExpectedIdentifier,

    // Evaluation errors
    #[error("function not found: {name}")]
    FunctionNotFound { name: String },
    #[error("filter not found: {name}")]
    FilterNotFound { name: String },
    #[error("cannot {operation} non-numeric values. left value: {left} right value: {right}")]
    TypeMismatch {
        operation: String,
        left: String,
        right: String,
    },
    #[error("cannot negate non-numeric value. value: {value}")]
    NegateNonNumeric { value: String },
    #[error("cannot compare non-numeric or non-comparable values. left value: {left} right value: {right}")]
    CannotCompare { left: String, right: String },
    #[error("division by zero")]
    DivisionByZero,
    #[error("recursion limit of {limit} exceeded")]
    RecursionLimit { limit: usize },
    #[error("{message}")]
    Custom { message: String },
}

/// Coarse classification used by callers and test assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Parse,
    Eval,
}

impl ErrorCategory {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Parse => "parse",
            ErrorCategory::Eval => "eval",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ErrorKind {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnterminatedTag
            | Self::UnterminatedVariable
            | Self::UnterminatedRaw
            | Self::MalformedTag { .. }
            | Self::MissingEndTag { .. }
            | Self::UnexpectedTag { .. }
            | Self::UnknownTag { .. }
            | Self::InvalidNumber { .. }
            | Self::UnterminatedString
            | Self::UnexpectedCharacters { .. }
            | Self::Expected { .. }
            | Self::UnexpectedEnd
            | Self::ExpectedIdentifier => ErrorCategory::Parse,

            Self::FunctionNotFound { .. }
            | Self::FilterNotFound { .. }
            | Self::TypeMismatch { .. }
            | Self::NegateNonNumeric { .. }
            | Self::CannotCompare { .. }
            | Self::DivisionByZero
            | Self::RecursionLimit { .. }
            | Self::Custom { .. } => ErrorCategory::Eval,
        }
    }

    /// Get error code suffix for diagnostic codes
    pub const fn code_suffix(&self) -> &'static str {
        match self {
            Self::UnterminatedTag => "unterminated_tag",
            Self::UnterminatedVariable => "unterminated_variable",
            Self::UnterminatedRaw => "unterminated_raw",
            Self::MalformedTag { .. } => "malformed_tag",
            Self::MissingEndTag { .. } => "missing_end_tag",
            Self::UnexpectedTag { .. } => "unexpected_tag",
            Self::UnknownTag { .. } => "unknown_tag",
            Self::InvalidNumber { .. } => "invalid_number",
            Self::UnterminatedString => "unterminated_string",
            Self::UnexpectedCharacters { .. } => "unexpected_characters",
            Self::Expected { .. } => "expected",
            Self::UnexpectedEnd => "unexpected_end",
            Self::ExpectedIdentifier => "expected_identifier",
            Self::FunctionNotFound { .. } => "function_not_found",
            Self::FilterNotFound { .. } => "filter_not_found",
            Self::TypeMismatch { .. } => "type_mismatch",
            Self::NegateNonNumeric { .. } => "negate_non_numeric",
            Self::CannotCompare { .. } => "cannot_compare",
            Self::DivisionByZero => "division_by_zero",
            Self::RecursionLimit { .. } => "recursion_limit",
            Self::Custom { .. } => "custom",
        }
    }

    fn primary_label(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Parse => "near here",
            ErrorCategory::Eval => "while evaluating this",
        }
    }
}

// ============================================================================
// TEMPLATE ERROR
// ============================================================================

/// Where an error happened.
#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub source: Arc<NamedSource<String>>,
    pub primary_span: SourceSpan,
    /// Bounded excerpt of the source around the primary span.
    pub snippet: String,
}

/// The single error type of the engine.
#[derive(Debug, Clone)]
pub struct TemplateError {
    pub kind: ErrorKind,
    pub source_info: Option<SourceInfo>,
    pub help: Option<String>,
}

impl TemplateError {
    /// An error without location. Parse errors are located immediately through
    /// [`ErrorReporting`]; evaluation errors get the span of the failing node from the renderer.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            source_info: None,
            help: None,
        }
    }

    /// Error raised by a user-registered function or filter.
    pub fn custom(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Custom {
            message: message.into(),
        })
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    /// Byte offset of the primary span in the template source, if known.
    pub fn offset(&self) -> Option<usize> {
        self.source_info.as_ref().map(|info| info.primary_span.offset())
    }

    pub fn snippet(&self) -> Option<&str> {
        self.source_info.as_ref().map(|info| info.snippet.as_str())
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Attach a location unless one is already present; the innermost location wins.
    pub(crate) fn located(
        mut self,
        source: &SourceContext,
        span: SourceSpan,
        snippet_radius: usize,
    ) -> Self {
        if self.source_info.is_none() {
            self.source_info = Some(SourceInfo {
                source: source.to_named_source(),
                primary_span: span,
                snippet: source.snippet(span.offset(), snippet_radius),
            });
        }
        self
    }

    fn error_code(&self) -> String {
        format!(
            "stencil::{}::{}",
            self.category().as_str(),
            self.kind.code_suffix()
        )
    }
}

impl std::error::Error for TemplateError {}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.category() {
            ErrorCategory::Parse => write!(f, "Parse error: {}", self.kind)?,
            ErrorCategory::Eval => write!(f, "Evaluation error: {}", self.kind)?,
        }
        if let Some(info) = &self.source_info {
            write!(
                f,
                " (pos {}, near: \"{}\")",
                info.primary_span.offset(),
                info.snippet
            )?;
        }
        Ok(())
    }
}

impl Diagnostic for TemplateError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(self.error_code()))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn fmt::Display>)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let info = self.source_info.as_ref()?;
        let labels = vec![LabeledSpan::new_with_span(
            Some(self.kind.primary_label().to_string()),
            info.primary_span,
        )];
        Some(Box::new(labels.into_iter()))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        self.source_info
            .as_ref()
            .map(|info| &*info.source as &dyn miette::SourceCode)
    }
}

// ============================================================================
// CONTEXT-AWARE CONSTRUCTION
// ============================================================================

/// Context-aware error creation - each phase knows its source and how to locate errors.
pub trait ErrorReporting {
    fn report(&self, kind: ErrorKind, span: SourceSpan) -> TemplateError;

    fn malformed_tag(&self, tag: &str, expected: &str, span: SourceSpan) -> TemplateError {
        self.report(
            ErrorKind::MalformedTag {
                tag: tag.into(),
                expected: expected.into(),
            },
            span,
        )
    }

    fn expected(&self, expected: &str, span: SourceSpan) -> TemplateError {
        self.report(
            ErrorKind::Expected {
                expected: expected.into(),
            },
            span,
        )
    }
}

/// Single-point span at `offset`.
pub fn point(offset: usize) -> SourceSpan {
    SourceSpan::from(offset..offset)
}
