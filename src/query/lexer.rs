//! Statement tokenizer
//!
//! Turns raw statement text into a flat token stream using the pest grammar in
//! `statement.pest`. The builders never see pest pairs, only [`Token`]s.

use super::parser::{ParseError, ParseResult};
use pest::Parser;
use pest_derive::Parser;
use std::fmt;

#[derive(Parser)]
#[grammar = "query/statement.pest"]
struct StatementParser;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Punctuation and join arrows
    Symbol,
    /// Identifiers, keys, values and glob patterns
    Word,
    /// Quoted string, quotes stripped
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    /// Byte offset in the source text
    pub offset: usize,
}

impl Token {
    pub fn is_symbol(&self, symbol: &str) -> bool {
        self.kind == TokenKind::Symbol && self.value == symbol
    }

    /// Case-insensitive keyword match; keywords are always words
    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Word && self.value.eq_ignore_ascii_case(keyword)
    }

    /// Words and quoted text both carry values
    pub fn is_value(&self) -> bool {
        matches!(self.kind, TokenKind::Word | TokenKind::Text)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Text => write!(f, "'{}'", self.value),
            _ => write!(f, "{}", self.value),
        }
    }
}

/// Tokenize a whole batch
pub fn tokenize(text: &str) -> ParseResult<Vec<Token>> {
    let pairs = StatementParser::parse(Rule::tokens, text).map_err(ParseError::from)?;

    let mut tokens = Vec::new();
    for pair in pairs.flat_map(|p| p.into_inner()) {
        let offset = pair.as_span().start();
        let token = match pair.as_rule() {
            Rule::symbol => Token {
                kind: TokenKind::Symbol,
                value: pair.as_str().to_string(),
                offset,
            },
            Rule::word => Token {
                kind: TokenKind::Word,
                value: pair.as_str().to_string(),
                offset,
            },
            Rule::quoted => Token {
                kind: TokenKind::Text,
                value: pair
                    .into_inner()
                    .next()
                    .map(|inner| inner.as_str().to_string())
                    .unwrap_or_default(),
                offset,
            },
            _ => continue,
        };
        tokens.push(token);
    }

    Ok(tokens)
}
