//! Template syntax: scanning, expression parsing and tag grammar.
//!
//! The parser is purely syntactic. It turns source text into [`crate::ast::Node`]s and reports
//! malformed input as parse-category [`TemplateError`]s located in the source.

pub mod expr;
pub mod parser;
pub mod scanner;

use miette::SourceSpan;

use crate::errors::{ErrorKind, ErrorReporting, SourceContext, TemplateError};

pub use parser::parse;

/// Error-creation context for the parse phase.
pub struct ParseContext {
    pub source: SourceContext,
    pub snippet_radius: usize,
}

impl ParseContext {
    pub fn new(source: SourceContext, snippet_radius: usize) -> Self {
        Self {
            source,
            snippet_radius,
        }
    }
}

impl ErrorReporting for ParseContext {
    fn report(&self, kind: ErrorKind, span: SourceSpan) -> TemplateError {
        TemplateError::new(kind).located(&self.source, span, self.snippet_radius)
    }
}
