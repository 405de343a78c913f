//! Template parser: literal text, `{{ expr }}` and `{% tag %}` into a [`Node`] tree.
//!
//! Block tags recurse through [`Parser::parse_nodes`] with a set of stop tags. A stop tag is
//! left unconsumed so the enclosing block can decide whether it is an `else` to take or a
//! mandatory closing tag to expect.

use std::sync::Arc;

use miette::SourceSpan;

use crate::ast::{MacroDef, Node, Span};
use crate::errors::{point, ErrorKind, ErrorReporting, TemplateError};
use crate::syntax::expr::parse_expression;
use crate::syntax::scanner::{
    subslice_offset, trim_with_offset, Scanner, TagSpan, TAG_OPEN, VARIABLE_CLOSE, VARIABLE_OPEN,
};
use crate::syntax::ParseContext;

const RAW_CLOSE: &str = "{% endraw %}";
const FOR_FORMAT: &str = "for item in list";
const SET_FORMAT: &str = "set var = expression";
const MACRO_FORMAT: &str = "macro macroName(param1, param2, ...)";

/// Parses a whole template into its top-level nodes.
pub fn parse(ctx: &ParseContext) -> Result<Vec<Node>, TemplateError> {
    let mut parser = Parser {
        scanner: Scanner::new(&ctx.source.content),
        ctx,
    };
    parser.parse_nodes(&[])
}

struct Parser<'a> {
    scanner: Scanner<'a>,
    ctx: &'a ParseContext,
}

impl<'a> Parser<'a> {
    /// Parses until input is exhausted or a tag named in `stop_tags` is reached.
    fn parse_nodes(&mut self, stop_tags: &[&str]) -> Result<Vec<Node>, TemplateError> {
        let mut nodes = Vec::new();
        while !self.scanner.is_at_end() {
            if self.scanner.at_variable() {
                nodes.push(self.parse_variable()?);
            } else if self.scanner.at_tag() {
                let tag = self.peek_tag()?;
                if stop_tags.contains(&tag.name) {
                    break;
                }
                nodes.push(self.parse_tag(tag)?);
            } else {
                nodes.push(Node::Text(self.scanner.take_text().to_string()));
            }
        }
        Ok(nodes)
    }

    fn parse_variable(&mut self) -> Result<Node, TemplateError> {
        let start = self.scanner.pos();
        let interior = start + VARIABLE_OPEN.len();
        let close = self
            .scanner
            .find_from(interior, VARIABLE_CLOSE)
            .ok_or_else(|| self.ctx.report(ErrorKind::UnterminatedVariable, point(start)))?;
        let end = close + VARIABLE_CLOSE.len();
        let (text, offset) = trim_with_offset(&self.scanner.input()[interior..close], interior);
        let expr = parse_expression(text, offset, self.ctx)?;
        self.scanner.advance_to(end);
        Ok(Node::Variable {
            expr,
            span: Span::new(start, end),
        })
    }

    fn peek_tag(&self) -> Result<TagSpan<'a>, TemplateError> {
        self.scanner
            .peek_tag()
            .ok_or_else(|| self.ctx.report(ErrorKind::UnterminatedTag, point(self.scanner.pos())))
    }

    fn parse_tag(&mut self, tag: TagSpan<'a>) -> Result<Node, TemplateError> {
        self.scanner.advance_to(tag.end);
        let span = Span::new(tag.start, tag.end);
        match tag.name {
            "if" => self.parse_if(tag, span),
            "for" => self.parse_for(tag, span),
            "set" => self.parse_set(tag, span),
            "raw" => self.parse_raw(tag),
            "macro" => self.parse_macro(tag, span),
            "else" | "endif" | "endfor" | "endmacro" | "endraw" => Err(self.ctx.report(
                ErrorKind::UnexpectedTag {
                    tag: tag.name.to_string(),
                },
                span.into(),
            )),
            other => Err(self.ctx.report(
                ErrorKind::UnknownTag {
                    tag: other.to_string(),
                },
                span.into(),
            )),
        }
    }

    fn parse_if(&mut self, tag: TagSpan<'a>, span: Span) -> Result<Node, TemplateError> {
        let condition = parse_expression(tag.args, tag.args_offset, self.ctx)?;
        let true_branch = self.parse_nodes(&["else", "endif"])?;
        let false_branch = if self.match_tag("else") {
            Some(self.parse_nodes(&["endif"])?)
        } else {
            None
        };
        self.expect_tag("endif", span)?;
        Ok(Node::If {
            condition,
            true_branch,
            false_branch,
            span,
        })
    }

    fn parse_for(&mut self, tag: TagSpan<'a>, span: Span) -> Result<Node, TemplateError> {
        let tokens: Vec<&str> = tag.args.split_whitespace().collect();
        let [loop_var, "in", source] = tokens.as_slice() else {
            return Err(self.ctx.malformed_tag("for", FOR_FORMAT, span.into()));
        };
        let source_offset = tag.args_offset + subslice_offset(tag.args, source);
        let source = parse_expression(source, source_offset, self.ctx)?;
        let body = self.parse_nodes(&["endfor"])?;
        self.expect_tag("endfor", span)?;
        Ok(Node::For {
            loop_var: loop_var.to_string(),
            source,
            body,
            span,
        })
    }

    fn parse_set(&mut self, tag: TagSpan<'a>, span: Span) -> Result<Node, TemplateError> {
        let Some((raw_name, raw_value)) = tag.args.split_once('=') else {
            return Err(self.ctx.malformed_tag("set", SET_FORMAT, span.into()));
        };
        let name = raw_name.trim();
        let (value, value_offset) =
            trim_with_offset(raw_value, tag.args_offset + raw_name.len() + 1);
        if name.is_empty() || value.is_empty() {
            return Err(self.ctx.malformed_tag("set", SET_FORMAT, span.into()));
        }
        let value = parse_expression(value, value_offset, self.ctx)?;
        Ok(Node::Set {
            name: name.to_string(),
            value,
            span,
        })
    }

    /// Everything up to the literal closing marker becomes one text node, unparsed.
    fn parse_raw(&mut self, tag: TagSpan<'a>) -> Result<Node, TemplateError> {
        let start = self.scanner.pos();
        let close = self
            .scanner
            .find_from(start, RAW_CLOSE)
            .ok_or_else(|| self.ctx.report(ErrorKind::UnterminatedRaw, point(tag.start)))?;
        let content = &self.scanner.input()[start..close];
        self.scanner.advance_to(close + RAW_CLOSE.len());
        Ok(Node::Text(content.to_string()))
    }

    fn parse_macro(&mut self, tag: TagSpan<'a>, span: Span) -> Result<Node, TemplateError> {
        let definition = tag.args.trim();
        let malformed = || self.ctx.malformed_tag("macro", MACRO_FORMAT, span.into());
        let paren = definition.find('(').ok_or_else(malformed)?;
        if !definition.ends_with(')') {
            return Err(malformed());
        }
        let name = definition[..paren].trim();
        if name.is_empty() {
            return Err(malformed());
        }
        let params = definition[paren + 1..definition.len() - 1]
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(String::from)
            .collect();
        let body = self.parse_nodes(&["endmacro"])?;
        self.expect_tag("endmacro", span)?;
        Ok(Node::Macro(Arc::new(MacroDef {
            name: name.to_string(),
            params,
            body,
            span,
        })))
    }

    /// Consumes the tag at the cursor if its keyword is `name`.
    fn match_tag(&mut self, name: &str) -> bool {
        match self.scanner.peek_tag() {
            Some(tag) if tag.name == name => {
                self.scanner.advance_to(tag.end);
                true
            }
            _ => false,
        }
    }

    fn expect_tag(&mut self, name: &str, opened: Span) -> Result<(), TemplateError> {
        if self.match_tag(name) {
            return Ok(());
        }
        let at = self.scanner.pos();
        let span: SourceSpan = if self.scanner.is_at_end() {
            opened.into()
        } else {
            point(at)
        };
        Err(self
            .ctx
            .report(ErrorKind::MissingEndTag { tag: name.into() }, span)
            .with_help(format!(
                "the block opened here must be closed with {TAG_OPEN} {name} %}}"
            )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::value::Value;
    use crate::ast::Expression;
    use crate::errors::{ErrorCategory, SourceContext};

    fn parse_src(src: &str) -> Result<Vec<Node>, TemplateError> {
        parse(&ParseContext::new(SourceContext::new("test", src), 30))
    }

    fn parse_ok(src: &str) -> Vec<Node> {
        parse_src(src).expect("template should parse")
    }

    fn parse_err(src: &str) -> ErrorKind {
        let err = parse_src(src).expect_err("template should fail to parse");
        assert_eq!(err.category(), ErrorCategory::Parse);
        err.kind
    }

    #[test]
    fn text_and_variables() {
        let nodes = parse_ok("Hello, {{ name }}!");
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0], Node::Text("Hello, ".into()));
        assert!(matches!(
            &nodes[1],
            Node::Variable { expr: Expression::Variable(p), span } if p == "name" && span.start == 7
        ));
        assert_eq!(nodes[2], Node::Text("!".into()));
    }

    #[test]
    fn if_else_branches() {
        let nodes = parse_ok("{% if age >= 18 %}Adult{% else %}Minor{% endif %}");
        let [Node::If {
            true_branch,
            false_branch,
            ..
        }] = nodes.as_slice()
        else {
            panic!("expected a single if node, got {nodes:?}");
        };
        assert_eq!(true_branch, &vec![Node::Text("Adult".into())]);
        assert_eq!(false_branch, &Some(vec![Node::Text("Minor".into())]));
    }

    #[test]
    fn if_without_else_has_no_false_branch() {
        let nodes = parse_ok("{% if x %}yes{% endif %}");
        assert!(matches!(
            nodes.as_slice(),
            [Node::If {
                false_branch: None,
                ..
            }]
        ));
    }

    #[test]
    fn nested_blocks() {
        let nodes = parse_ok(
            "{% for row in matrix %}{% for item in row %}{{ item }}{% endfor %}|{% endfor %}",
        );
        let [Node::For { body, loop_var, .. }] = nodes.as_slice() else {
            panic!("expected for node");
        };
        assert_eq!(loop_var, "row");
        assert!(matches!(&body[0], Node::For { loop_var, .. } if loop_var == "item"));
        assert_eq!(body[1], Node::Text("|".into()));
    }

    #[test]
    fn set_tag() {
        let nodes = parse_ok("{% set greeting = 'Hello' %}");
        assert_eq!(
            nodes[0],
            Node::Set {
                name: "greeting".into(),
                value: Expression::Literal(Value::from("Hello")),
                span: Span::new(0, 28),
            }
        );
    }

    #[test]
    fn set_value_offsets_point_into_source() {
        let src = "{% set x =  1 + %}";
        let err = parse_src(src).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnexpectedEnd);
        assert_eq!(err.offset(), Some(src.find('+').unwrap() + 1));
    }

    #[test]
    fn raw_block_is_verbatim() {
        let nodes = parse_ok("{% raw %}This is raw: {{ not processed }} {% if %}{% endraw %}!");
        assert_eq!(
            nodes,
            vec![
                Node::Text("This is raw: {{ not processed }} {% if %}".into()),
                Node::Text("!".into()),
            ]
        );
    }

    #[test]
    fn macro_definition() {
        let nodes = parse_ok("{% macro greet(name, greeting) %}{{ greeting }}, {{ name }}!{% endmacro %}");
        let [Node::Macro(def)] = nodes.as_slice() else {
            panic!("expected macro node");
        };
        assert_eq!(def.name, "greet");
        assert_eq!(def.params, vec!["name".to_string(), "greeting".to_string()]);
        assert_eq!(def.body.len(), 4);

        let nodes = parse_ok("{% macro hr() %}<hr>{% endmacro %}");
        let [Node::Macro(def)] = nodes.as_slice() else {
            panic!("expected macro node");
        };
        assert!(def.params.is_empty());
    }

    #[test]
    fn for_expression_offset() {
        let src = "{% for x in items[ %}{% endfor %}";
        let err = parse_src(src).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Expected { .. }));
        assert_eq!(err.offset(), Some(src.find("%}").unwrap() - 1));
    }

    #[test]
    fn delimiter_errors() {
        assert_eq!(parse_err("Hello {{ name"), ErrorKind::UnterminatedVariable);
        assert_eq!(parse_err("{% if x"), ErrorKind::UnterminatedTag);
        assert_eq!(parse_err("{% raw %}abc"), ErrorKind::UnterminatedRaw);
    }

    #[test]
    fn malformed_tag_shapes() {
        assert!(matches!(parse_err("{% for x items %}{% endfor %}"), ErrorKind::MalformedTag { tag, .. } if tag == "for"));
        assert!(matches!(parse_err("{% for x in a b %}{% endfor %}"), ErrorKind::MalformedTag { .. }));
        assert!(matches!(parse_err("{% for %}{% endfor %}"), ErrorKind::MalformedTag { .. }));
        assert!(matches!(parse_err("{% set x %}"), ErrorKind::MalformedTag { tag, .. } if tag == "set"));
        assert!(matches!(parse_err("{% set = 1 %}"), ErrorKind::MalformedTag { .. }));
        assert!(matches!(parse_err("{% set x = %}"), ErrorKind::MalformedTag { .. }));
        assert!(matches!(parse_err("{% macro greet %}{% endmacro %}"), ErrorKind::MalformedTag { tag, .. } if tag == "macro"));
        assert!(matches!(parse_err("{% macro greet(a %}{% endmacro %}"), ErrorKind::MalformedTag { .. }));
    }

    #[test]
    fn missing_closing_tags() {
        assert_eq!(
            parse_err("{% if x %}yes"),
            ErrorKind::MissingEndTag { tag: "endif".into() }
        );
        assert_eq!(
            parse_err("{% if x %}a{% else %}b"),
            ErrorKind::MissingEndTag { tag: "endif".into() }
        );
        assert_eq!(
            parse_err("{% for x in xs %}a"),
            ErrorKind::MissingEndTag { tag: "endfor".into() }
        );
        assert_eq!(
            parse_err("{% macro m() %}a"),
            ErrorKind::MissingEndTag { tag: "endmacro".into() }
        );
    }

    #[test]
    fn misplaced_and_unknown_tags() {
        assert_eq!(
            parse_err("{% endif %}"),
            ErrorKind::UnexpectedTag { tag: "endif".into() }
        );
        assert_eq!(
            parse_err("{% for x in xs %}{% else %}{% endfor %}"),
            ErrorKind::UnexpectedTag { tag: "else".into() }
        );
        assert_eq!(
            parse_err("{% if a %}{% else %}{% else %}{% endif %}"),
            ErrorKind::UnexpectedTag { tag: "else".into() }
        );
        assert_eq!(
            parse_err("{% include 'x' %}"),
            ErrorKind::UnknownTag { tag: "include".into() }
        );
    }

    #[test]
    fn errors_carry_snippet() {
        let err = parse_src("some text before {% bogus %} and after").unwrap_err();
        assert_eq!(err.offset(), Some(17));
        assert!(err.snippet().unwrap_or_default().contains("bogus"));
    }
}
