//! Expression parser.
//!
//! Precedence climbing over a single expression substring, loosest to tightest:
//!
//! ```text
//! filtered       := logical ('|' IDENT ('(' args ')')?)*
//! logical_or     := logical_and ('or' logical_and)*
//! logical_and    := equality ('and' equality)*
//! equality       := relational (('==' | '!=') relational)*
//! relational     := additive (('>=' | '<=' | '>' | '<') additive)*
//! additive       := multiplicative (('+' | '-') multiplicative)*
//! multiplicative := power (('*' | '/' | '%') power)*
//! power          := unary ('**' power)?            right-associative
//! unary          := ('not' | '-') unary | primary
//! primary        := '(' filtered ')' | object | array | STRING | NUMBER
//!                 | 'true' | 'false' | IDENT '(' args ')' | IDENT ('.' IDENT | '[' ... ']')*
//! ```
//!
//! Offsets in errors are absolute positions in the template source.

use crate::ast::value::Value;
use crate::ast::{BinaryOp, Expression, FilterRef, UnaryOp};
use crate::errors::{point, ErrorKind, ErrorReporting, TemplateError};

type ParseResult<T> = Result<T, TemplateError>;

/// Parses a complete expression, including an optional filter chain. Trailing input is an error.
pub fn parse_expression(
    input: &str,
    offset: usize,
    reporter: &dyn ErrorReporting,
) -> ParseResult<Expression> {
    let mut parser = ExprParser::new(input, offset, reporter);
    let expr = parser.parse_filtered()?;
    parser.skip_whitespace();
    if !parser.is_at_end() {
        return Err(parser.error_here(ErrorKind::UnexpectedCharacters {
            remainder: parser.rest().to_string(),
        }));
    }
    Ok(expr)
}

struct ExprParser<'a> {
    input: &'a str,
    pos: usize,
    offset: usize,
    reporter: &'a dyn ErrorReporting,
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

impl<'a> ExprParser<'a> {
    fn new(input: &'a str, offset: usize, reporter: &'a dyn ErrorReporting) -> Self {
        Self {
            input,
            pos: 0,
            offset,
            reporter,
        }
    }

    // ------------------------------------------------------------------------
    // Filters
    // ------------------------------------------------------------------------

    fn parse_filtered(&mut self) -> ParseResult<Expression> {
        let base = self.parse_or()?;
        let mut chain = Vec::new();
        while self.match_str("|") {
            let name = self.parse_identifier()?;
            let args = if self.match_str("(") {
                self.parse_arguments(")")?
            } else {
                Vec::new()
            };
            chain.push(FilterRef { name, args });
        }
        if chain.is_empty() {
            Ok(base)
        } else {
            Ok(Expression::Filtered {
                base: Box::new(base),
                chain,
            })
        }
    }

    /// Comma-separated expressions up to `close`; the opening delimiter is already consumed.
    fn parse_arguments(&mut self, close: &str) -> ParseResult<Vec<Expression>> {
        let mut args = Vec::new();
        if self.match_str(close) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_filtered()?);
            if self.match_str(close) {
                return Ok(args);
            }
            if !self.match_str(",") {
                return Err(self.expected(&format!("',' or '{close}'")));
            }
        }
    }

    // ------------------------------------------------------------------------
    // Binary precedence chain
    // ------------------------------------------------------------------------

    fn parse_or(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_and()?;
        while self.match_keyword("or") {
            let right = self.parse_and()?;
            expr = binary(BinaryOp::Or, expr, right);
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_equality()?;
        while self.match_keyword("and") {
            let right = self.parse_equality()?;
            expr = binary(BinaryOp::And, expr, right);
        }
        Ok(expr)
    }

    fn parse_equality(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_relational()?;
        loop {
            let op = if self.match_str("==") {
                BinaryOp::Eq
            } else if self.match_str("!=") {
                BinaryOp::Ne
            } else {
                break;
            };
            let right = self.parse_relational()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    fn parse_relational(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_additive()?;
        loop {
            let op = if self.match_str(">=") {
                BinaryOp::Ge
            } else if self.match_str("<=") {
                BinaryOp::Le
            } else if self.match_str(">") {
                BinaryOp::Gt
            } else if self.match_str("<") {
                BinaryOp::Lt
            } else {
                break;
            };
            let right = self.parse_additive()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    fn parse_additive(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_multiplicative()?;
        loop {
            let op = if self.match_str("+") {
                BinaryOp::Add
            } else if self.match_str("-") {
                BinaryOp::Sub
            } else {
                break;
            };
            let right = self.parse_multiplicative()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    fn parse_multiplicative(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_power()?;
        loop {
            let op = if self.match_str("*") {
                BinaryOp::Mul
            } else if self.match_str("/") {
                BinaryOp::Div
            } else if self.match_str("%") {
                BinaryOp::Mod
            } else {
                break;
            };
            let right = self.parse_power()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    fn parse_power(&mut self) -> ParseResult<Expression> {
        let expr = self.parse_unary()?;
        if self.match_str("**") {
            let right = self.parse_power()?;
            return Ok(binary(BinaryOp::Pow, expr, right));
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> ParseResult<Expression> {
        let op = if self.match_keyword("not") {
            UnaryOp::Not
        } else if self.match_str("-") {
            UnaryOp::Neg
        } else {
            return self.parse_primary();
        };
        let operand = self.parse_unary()?;
        Ok(Expression::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    // ------------------------------------------------------------------------
    // Primary forms
    // ------------------------------------------------------------------------

    fn parse_primary(&mut self) -> ParseResult<Expression> {
        self.skip_whitespace();
        let Some(ch) = self.peek_char() else {
            return Err(self.error_here(ErrorKind::UnexpectedEnd));
        };
        match ch {
            '{' => self.parse_object(),
            '[' => self.parse_array(),
            '(' => {
                self.bump(ch);
                let expr = self.parse_filtered()?;
                if !self.match_str(")") {
                    return Err(self.expected("')' after expression"));
                }
                Ok(expr)
            }
            '"' | '\'' => Ok(Expression::Literal(Value::String(self.parse_string()?))),
            c if c.is_ascii_digit() => self.parse_number(),
            _ => self.parse_identifier_expression(),
        }
    }

    fn parse_identifier_expression(&mut self) -> ParseResult<Expression> {
        let ident = self.parse_identifier()?;
        if self.match_str("(") {
            let args = self.parse_arguments(")")?;
            return Ok(Expression::Call { name: ident, args });
        }

        let mut path = ident;
        loop {
            self.skip_whitespace();
            match self.peek_char() {
                Some('.') => {
                    self.bump('.');
                    path.push('.');
                    path.push_str(&self.parse_identifier()?);
                }
                Some('[') => path.push_str(self.take_brackets()?),
                _ => break,
            }
        }

        match path.as_str() {
            "true" => Ok(Expression::Literal(Value::Bool(true))),
            "false" => Ok(Expression::Literal(Value::Bool(false))),
            _ => Ok(Expression::Variable(path)),
        }
    }

    /// Consumes a balanced `[...]` group verbatim; index text is interpreted at render time.
    fn take_brackets(&mut self) -> ParseResult<&'a str> {
        let start = self.pos;
        let mut depth = 0usize;
        for (i, c) in self.rest().char_indices() {
            match c {
                '[' => depth += 1,
                ']' => {
                    depth -= 1;
                    if depth == 0 {
                        self.pos = start + i + 1;
                        return Ok(&self.input[start..self.pos]);
                    }
                }
                _ => {}
            }
        }
        self.pos = self.input.len();
        Err(self.expected("']'"))
    }

    fn parse_string(&mut self) -> ParseResult<String> {
        let start = self.pos;
        let Some(quote) = self.peek_char() else {
            return Err(self.error_here(ErrorKind::UnexpectedEnd));
        };
        self.bump(quote);
        let mut out = String::new();
        let mut chars = self.rest().char_indices();
        while let Some((i, c)) = chars.next() {
            if c == quote {
                self.pos += i + c.len_utf8();
                return Ok(out);
            }
            if c == '\\' {
                match chars.next() {
                    Some((_, escaped)) => out.push(escaped),
                    None => break,
                }
            } else {
                out.push(c);
            }
        }
        Err(self.reporter.report(
            ErrorKind::UnterminatedString,
            point(self.offset + start),
        ))
    }

    fn parse_number(&mut self) -> ParseResult<Expression> {
        let start = self.pos;
        let len = self
            .rest()
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(self.rest().len());
        self.pos += len;
        let literal = &self.input[start..self.pos];
        let value = if literal.contains('.') {
            literal.parse::<f64>().ok().map(Value::Float)
        } else {
            literal.parse::<i64>().ok().map(Value::Int)
        };
        value.map(Expression::Literal).ok_or_else(|| {
            self.reporter.report(
                ErrorKind::InvalidNumber {
                    literal: literal.to_string(),
                },
                (self.offset + start..self.offset + self.pos).into(),
            )
        })
    }

    fn parse_identifier(&mut self) -> ParseResult<String> {
        self.skip_whitespace();
        let len = self
            .rest()
            .find(|c: char| !is_ident_char(c))
            .unwrap_or(self.rest().len());
        if len == 0 {
            return Err(self.error_here(ErrorKind::ExpectedIdentifier));
        }
        let ident = self.rest()[..len].to_string();
        self.pos += len;
        Ok(ident)
    }

    fn parse_object(&mut self) -> ParseResult<Expression> {
        self.bump('{');
        let mut entries = Vec::new();
        if self.match_str("}") {
            return Ok(Expression::ObjectLiteral(entries));
        }
        loop {
            self.skip_whitespace();
            let key = match self.peek_char() {
                Some('"') | Some('\'') => self.parse_string()?,
                _ => self.parse_identifier()?,
            };
            if !self.match_str(":") {
                return Err(self.expected("':' in object literal"));
            }
            let value = self.parse_filtered()?;
            entries.push((key, value));
            if self.match_str("}") {
                return Ok(Expression::ObjectLiteral(entries));
            }
            if !self.match_str(",") {
                return Err(self.expected("',' in object literal"));
            }
        }
    }

    fn parse_array(&mut self) -> ParseResult<Expression> {
        self.bump('[');
        let mut elements = Vec::new();
        if self.match_str("]") {
            return Ok(Expression::ArrayLiteral(elements));
        }
        loop {
            elements.push(self.parse_filtered()?);
            if self.match_str("]") {
                return Ok(Expression::ArrayLiteral(elements));
            }
            if !self.match_str(",") {
                return Err(self.expected("',' in array literal"));
            }
        }
    }

    // ------------------------------------------------------------------------
    // Cursor helpers
    // ------------------------------------------------------------------------

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self, c: char) {
        self.pos += c.len_utf8();
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn match_str(&mut self, s: &str) -> bool {
        self.skip_whitespace();
        if self.rest().starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    /// Matches `kw` only when it is not the prefix of a longer identifier.
    fn match_keyword(&mut self, kw: &str) -> bool {
        self.skip_whitespace();
        let rest = self.rest();
        if !rest.starts_with(kw) {
            return false;
        }
        if rest[kw.len()..].chars().next().is_some_and(is_ident_char) {
            return false;
        }
        self.pos += kw.len();
        true
    }

    fn error_here(&self, kind: ErrorKind) -> TemplateError {
        self.reporter.report(kind, point(self.offset + self.pos))
    }

    fn expected(&self, what: &str) -> TemplateError {
        self.reporter.expected(what, point(self.offset + self.pos))
    }
}

fn binary(op: BinaryOp, left: Expression, right: Expression) -> Expression {
    Expression::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ErrorCategory, SourceContext};
    use crate::syntax::ParseContext;

    fn parse(input: &str) -> ParseResult<Expression> {
        let ctx = ParseContext::new(SourceContext::new("expr", input), 30);
        parse_expression(input, 0, &ctx)
    }

    fn pretty(input: &str) -> String {
        parse(input).expect("expression should parse").to_string()
    }

    #[test]
    fn arithmetic_precedence() {
        assert_eq!(pretty("5 + 3 * 2"), "(5 + (3 * 2))");
        assert_eq!(pretty("(5 + 3) * 2"), "((5 + 3) * 2)");
        assert_eq!(pretty("10 - 4 - 3"), "((10 - 4) - 3)");
    }

    #[test]
    fn power_is_right_associative() {
        assert_eq!(pretty("2 ** 3 ** 2"), "(2 ** (3 ** 2))");
        assert_eq!(pretty("2 * 3 ** 2"), "(2 * (3 ** 2))");
    }

    #[test]
    fn logical_and_comparison_levels() {
        assert_eq!(
            pretty("user.age > 18 and user.active or admin"),
            "(((user.age > 18) and user.active) or admin)"
        );
        assert_eq!(pretty("a >= 1 == b <= 2"), "((a >= 1) == (b <= 2))");
        assert_eq!(pretty("not x == y"), "((not x) == y)");
    }

    #[test]
    fn keywords_require_word_boundary() {
        assert_eq!(pretty("order"), "order");
        assert_eq!(pretty("notes and android"), "(notes and android)");
        assert_eq!(pretty("or_else"), "or_else");
    }

    #[test]
    fn unary_minus_and_not() {
        assert_eq!(pretty("-x"), "(-x)");
        assert_eq!(pretty("5 - -3"), "(5 - (-3))");
        assert_eq!(pretty("not not flag"), "(not (not flag))");
    }

    #[test]
    fn literals() {
        assert_eq!(parse("42").unwrap(), Expression::Literal(Value::Int(42)));
        assert_eq!(parse("3.25").unwrap(), Expression::Literal(Value::Float(3.25)));
        assert_eq!(parse("true").unwrap(), Expression::Literal(Value::Bool(true)));
        assert_eq!(
            parse(r#"'it\'s "ok"'"#).unwrap(),
            Expression::Literal(Value::from("it's \"ok\""))
        );
        assert_eq!(
            parse(r#""a\nb""#).unwrap(),
            Expression::Literal(Value::from("anb"))
        );
    }

    #[test]
    fn paths_extend_with_dots_and_brackets() {
        assert_eq!(
            parse("user.colors[0]").unwrap(),
            Expression::Variable("user.colors[0]".into())
        );
        assert_eq!(
            parse("matrix[1][2]").unwrap(),
            Expression::Variable("matrix[1][2]".into())
        );
        assert_eq!(
            parse("a.b[0].c").unwrap(),
            Expression::Variable("a.b[0].c".into())
        );
    }

    #[test]
    fn calls_and_containers() {
        assert_eq!(pretty("upper(name)"), "upper(name)");
        assert_eq!(pretty("f()"), "f()");
        assert_eq!(pretty("f(1, 'a', g(x))"), "f(1, \"a\", g(x))");
        assert_eq!(pretty("[1, 2, [3]]"), "[1, 2, [3]]");
        assert_eq!(pretty("[]"), "[]");
        assert_eq!(
            pretty("{ name: 'Bob', \"age\": 22 }"),
            "{name: \"Bob\", age: 22}"
        );
        assert_eq!(pretty("{}"), "{}");
    }

    #[test]
    fn filter_chains() {
        assert_eq!(pretty("name | upper"), "name | upper");
        assert_eq!(
            pretty("items | join(', ') | truncate(10, '|')"),
            "items | join(\", \") | truncate(10, \"|\")"
        );
        assert_eq!(pretty("a + b | upper"), "(a + b) | upper");
        match parse("x | replace('a,b', 'c')").unwrap() {
            Expression::Filtered { chain, .. } => {
                assert_eq!(chain.len(), 1);
                assert_eq!(chain[0].args.len(), 2);
            }
            other => panic!("expected filtered expression, got {other:?}"),
        }
    }

    #[test]
    fn trailing_characters_are_rejected() {
        let err = parse("a b").unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Parse);
        assert_eq!(
            err.kind(),
            &ErrorKind::UnexpectedCharacters {
                remainder: "b".into()
            }
        );
        assert_eq!(err.offset(), Some(2));
    }

    #[test]
    fn malformed_input_errors() {
        assert_eq!(parse("").unwrap_err().kind(), &ErrorKind::UnexpectedEnd);
        assert_eq!(
            parse("'open").unwrap_err().kind(),
            &ErrorKind::UnterminatedString
        );
        assert_eq!(
            parse("1.2.3").unwrap_err().kind(),
            &ErrorKind::InvalidNumber {
                literal: "1.2.3".into()
            }
        );
        assert!(matches!(
            parse("(1 + 2").unwrap_err().kind(),
            ErrorKind::Expected { .. }
        ));
        assert!(matches!(
            parse("[1, 2").unwrap_err().kind(),
            ErrorKind::Expected { .. }
        ));
        assert!(matches!(
            parse("{a 1}").unwrap_err().kind(),
            ErrorKind::Expected { .. }
        ));
        assert!(matches!(
            parse("xs[0").unwrap_err().kind(),
            ErrorKind::Expected { .. }
        ));
        assert_eq!(
            parse("x |").unwrap_err().kind(),
            &ErrorKind::ExpectedIdentifier
        );
        assert!(matches!(
            parse("a = b").unwrap_err().kind(),
            ErrorKind::UnexpectedCharacters { .. }
        ));
    }

    #[test]
    fn error_offsets_are_absolute() {
        let source = "{{ 1 + }}";
        let ctx = ParseContext::new(SourceContext::new("t", source), 30);
        let err = parse_expression("1 +", 3, &ctx).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::UnexpectedEnd);
        assert_eq!(err.offset(), Some(6));
    }
}
