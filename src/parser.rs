//! Placeholder scanning for `${name}` and `${name:default}` tokens.
//!
//! Tokens do not nest: a token runs from `${` to the next `}`. The body is
//! split on the first `:` only, so `${url:http://host:80}` has the default
//! `http://host:80`. There is no escape sequence for a literal `${...}`.

const TOKEN_START: &str = "${";
const TOKEN_END: char = '}';
const DEFAULT_SEPARATOR: char = ':';

/// One placeholder occurrence within a scanned text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placeholder<'a> {
    /// Byte offset of `${` in the scanned text
    pub start: usize,
    /// Byte offset just past the closing `}`
    pub end: usize,
    /// The token exactly as written, used when it is left verbatim
    pub matched: &'a str,
    pub name: &'a str,
    /// `None` when no `:` is present; `Some("")` for `${name:}`
    pub default: Option<&'a str>,
}

impl<'a> Placeholder<'a> {
    fn from_span(text: &'a str, start: usize, end: usize) -> Option<Self> {
        let body = &text[start + TOKEN_START.len()..end - 1];
        let (name, default) = match body.split_once(DEFAULT_SEPARATOR) {
            Some((name, default)) => (name, Some(default)),
            None => (body, None),
        };
        if name.is_empty() {
            return None;
        }

        Some(Self {
            start,
            end,
            matched: &text[start..end],
            name,
            default,
        })
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

/// Lazy left-to-right iterator over the placeholders of a text.
#[derive(Debug, Clone)]
pub struct Placeholders<'a> {
    text: &'a str,
    cursor: usize,
}

impl<'a> Iterator for Placeholders<'a> {
    type Item = Placeholder<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(offset) = self.text[self.cursor..].find(TOKEN_START) {
            let start = self.cursor + offset;
            let body_start = start + TOKEN_START.len();
            let Some(close) = self.text[body_start..].find(TOKEN_END) else {
                break;
            };
            let end = body_start + close + 1;

            if let Some(placeholder) = Placeholder::from_span(self.text, start, end) {
                self.cursor = end;
                return Some(placeholder);
            }
            // `${}` or `${:x}` is literal text; rescan right after its `$`
            self.cursor = start + 1;
        }

        self.cursor = self.text.len();
        None
    }
}

/// Returns the placeholders of `text` in order of appearance.
pub fn placeholders(text: &str) -> Placeholders<'_> {
    Placeholders { text, cursor: 0 }
}
