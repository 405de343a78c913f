//! Cursor over raw template source.
//!
//! The scanner only knows about the two opening delimiters and how to find closing markers.
//! It never interprets what is between them.

pub const VARIABLE_OPEN: &str = "{{";
pub const VARIABLE_CLOSE: &str = "}}";
pub const TAG_OPEN: &str = "{%";
pub const TAG_CLOSE: &str = "%}";

#[derive(Debug, Clone)]
pub struct Scanner<'a> {
    input: &'a str,
    pos: usize,
}

/// A `{% ... %}` span located ahead of the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagSpan<'a> {
    /// Offset of `{%`.
    pub start: usize,
    /// Offset just past `%}`.
    pub end: usize,
    /// Keyword before the first whitespace of the trimmed interior.
    pub name: &'a str,
    /// Remainder after the keyword, with its offset in the source.
    pub args: &'a str,
    pub args_offset: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    pub fn input(&self) -> &'a str {
        self.input
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    pub fn at_variable(&self) -> bool {
        self.peek(VARIABLE_OPEN)
    }

    pub fn at_tag(&self) -> bool {
        self.peek(TAG_OPEN)
    }

    pub fn peek(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    /// Offset of the next occurrence of `pattern` at or after `from`.
    pub fn find_from(&self, from: usize, pattern: &str) -> Option<usize> {
        self.input
            .get(from..)
            .and_then(|rest| rest.find(pattern))
            .map(|i| from + i)
    }

    /// Consumes literal text up to the next `{{` or `{%` (or the end of input).
    pub fn take_text(&mut self) -> &'a str {
        let start = self.pos;
        let mut search = start;
        let end = loop {
            match self.find_from(search, "{") {
                None => break self.input.len(),
                Some(i) => {
                    let rest = &self.input[i..];
                    if rest.starts_with(VARIABLE_OPEN) || rest.starts_with(TAG_OPEN) {
                        break i;
                    }
                    search = i + 1;
                }
            }
        };
        self.pos = end;
        &self.input[start..end]
    }

    /// Locates the tag starting at the cursor without consuming it.
    /// Returns `None` when the cursor is not at `{%` or the tag is never closed.
    pub fn peek_tag(&self) -> Option<TagSpan<'a>> {
        if !self.at_tag() {
            return None;
        }
        let interior_start = self.pos + TAG_OPEN.len();
        let close = self.find_from(interior_start, TAG_CLOSE)?;
        let (content, content_offset) = trim_with_offset(&self.input[interior_start..close], interior_start);
        let (name, args, args_offset) = match content.find(char::is_whitespace) {
            Some(i) => {
                let rest = &content[i..];
                let args = rest.trim_start();
                let skipped = rest.len() - args.len();
                (&content[..i], args, content_offset + i + skipped)
            }
            None => (content, "", content_offset + content.len()),
        };
        Some(TagSpan {
            start: self.pos,
            end: close + TAG_CLOSE.len(),
            name,
            args,
            args_offset,
        })
    }

    pub fn advance_to(&mut self, pos: usize) {
        self.pos = pos.min(self.input.len());
    }
}

/// Trims `s` and returns the trimmed slice with its absolute offset, given the offset of `s`.
pub fn trim_with_offset(s: &str, offset: usize) -> (&str, usize) {
    let start_trimmed = s.trim_start();
    let lead = s.len() - start_trimmed.len();
    (start_trimmed.trim_end(), offset + lead)
}

/// Byte offset of `child` inside `parent`; `child` must be a subslice of `parent`.
pub fn subslice_offset(parent: &str, child: &str) -> usize {
    (child.as_ptr() as usize).saturating_sub(parent.as_ptr() as usize)
}
