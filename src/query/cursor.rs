//! Rewindable token cursor
//!
//! Builders try statement shapes one after another. [`TokenCursor::try_parse`]
//! records the position on a stack before a builder runs and restores it when
//! the builder gives up, so a failed attempt never leaves the cursor moved.

use super::lexer::{Token, TokenKind};

pub struct TokenCursor<'t> {
    tokens: &'t [Token],
    position: usize,
    marks: Vec<usize>,
}

impl<'t> TokenCursor<'t> {
    pub fn new(tokens: &'t [Token]) -> Self {
        TokenCursor {
            tokens,
            position: 0,
            marks: Vec::new(),
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_end(&self) -> bool {
        self.position >= self.tokens.len()
    }

    pub fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.position)
    }

    /// Run `build`; rewind to the starting position when it returns `None`
    pub fn try_parse<T>(&mut self, build: impl FnOnce(&mut Self) -> Option<T>) -> Option<T> {
        self.marks.push(self.position);
        let result = build(self);
        let start = self.marks.pop().unwrap_or(self.position);
        if result.is_none() {
            self.position = start;
        }
        result
    }

    /// Consume `symbol` if it is next
    pub fn accept_symbol(&mut self, symbol: &str) -> bool {
        self.accept(|t| t.is_symbol(symbol))
    }

    /// Consume `keyword` (case-insensitive) if it is next
    pub fn accept_keyword(&mut self, keyword: &str) -> bool {
        self.accept(|t| t.is_keyword(keyword))
    }

    /// Consume the first of `keywords` that is next and return it
    pub fn accept_any_keyword(&mut self, keywords: &[&'static str]) -> Option<&'static str> {
        let token = self.peek()?;
        let keyword = keywords.iter().copied().find(|k| token.is_keyword(k))?;
        self.position += 1;
        Some(keyword)
    }

    /// Consume a word token
    pub fn word(&mut self) -> Option<&'t str> {
        let token = self.peek().filter(|t| t.kind == TokenKind::Word)?;
        self.position += 1;
        Some(token.value.as_str())
    }

    /// Consume a word or quoted text token
    pub fn value(&mut self) -> Option<&'t str> {
        let token = self.peek().filter(|t| t.is_value())?;
        self.position += 1;
        Some(token.value.as_str())
    }

    fn accept(&mut self, pred: impl FnOnce(&Token) -> bool) -> bool {
        match self.peek() {
            Some(token) if pred(token) => {
                self.position += 1;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::lexer::tokenize;

    #[test]
    fn test_try_parse_rewinds_on_failure() {
        let tokens = tokenize("add node key=a;").unwrap();
        let mut cursor = TokenCursor::new(&tokens);

        let failed: Option<()> = cursor.try_parse(|c| {
            c.accept_keyword("add");
            c.accept_keyword("edge").then_some(())
        });
        assert!(failed.is_none());
        assert_eq!(cursor.position(), 0);

        let matched = cursor.try_parse(|c| {
            c.accept_keyword("ADD");
            c.accept_keyword("node").then_some(())
        });
        assert!(matched.is_some());
        assert_eq!(cursor.position(), 2);
    }

    #[test]
    fn test_nested_try_parse() {
        let tokens = tokenize("a b c").unwrap();
        let mut cursor = TokenCursor::new(&tokens);

        let outer = cursor.try_parse(|c| {
            c.word()?;
            let inner: Option<()> = c.try_parse(|c| {
                c.word()?;
                c.accept_symbol(";").then_some(())
            });
            assert!(inner.is_none());
            assert_eq!(c.position(), 1);
            c.word()
        });
        assert_eq!(outer, Some("b"));
        assert_eq!(cursor.position(), 2);
        assert_eq!(cursor.value(), Some("c"));
        assert!(cursor.is_end());
    }
}
