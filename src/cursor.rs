//! Positional read access over a token sequence, shared by every grammar rule.

use crate::token::{Span, Token, TokenKind};
use thiserror::Error;

/// The first grammar violation found in a query block.
///
/// Parsing is all-or-nothing: once this is returned no query is produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ParsingError {
    pub message: String,
    /// Byte range of the offending token, if the error points at one.
    pub span: Option<Span>,
}

impl ParsingError {
    pub fn new(message: impl Into<String>, span: Option<Span>) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }

    pub fn at_position(message: impl Into<String>, span: Span) -> Self {
        Self::new(message, Some(span))
    }
}

pub struct TokenCursor<'t, 'a> {
    tokens: &'t [Token<'a>],
    position: usize,
}

impl<'t, 'a> TokenCursor<'t, 'a> {
    pub fn new(tokens: &'t [Token<'a>]) -> Self {
        Self {
            tokens,
            position: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// The token at the current position, `None` at end of input.
    pub fn current(&self) -> Option<&'t Token<'a>> {
        let tokens: &'t [Token<'a>] = self.tokens;
        tokens.get(self.position).filter(|token| !token.is_eof())
    }

    pub fn at_end(&self) -> bool {
        self.current().is_none()
    }

    /// True if the current token has `kind` and, if given, `value` (ignoring case).
    /// Never advances and never fails.
    pub fn peek(&self, kind: TokenKind, value: Option<&str>) -> bool {
        self.current().is_some_and(|token| token.is(kind, value))
    }

    pub fn peek_kind(&self, kind: TokenKind) -> bool {
        self.peek(kind, None)
    }

    pub fn peek_keyword(&self, keyword: &str) -> bool {
        self.peek(TokenKind::Keyword, Some(keyword))
    }

    /// True if the current token is one of the given keywords.
    pub fn peek_any_keyword(&self, keywords: &[&str]) -> bool {
        keywords.iter().any(|k| self.peek_keyword(k))
    }

    /// Consume the current token if it matches, otherwise fail naming what was expected.
    pub fn consume(
        &mut self,
        kind: TokenKind,
        value: Option<&str>,
    ) -> Result<&'t Token<'a>, ParsingError> {
        let token = self.consume_any()?;
        if token.is(kind, value) {
            Ok(token)
        } else {
            self.position -= 1;
            let expected = match value {
                Some(v) if kind == TokenKind::Keyword => format!("keyword {}", v.to_ascii_uppercase()),
                Some(v) => format!("{} \"{}\"", kind, v),
                None => kind.to_string(),
            };
            Err(self.error_at(format!("Expected {}, found {}", expected, token), token.span))
        }
    }

    pub fn consume_keyword(&mut self, keyword: &str) -> Result<&'t Token<'a>, ParsingError> {
        self.consume(TokenKind::Keyword, Some(keyword))
    }

    /// Consume whatever token is current.
    pub fn consume_any(&mut self) -> Result<&'t Token<'a>, ParsingError> {
        match self.current() {
            Some(token) => {
                self.position += 1;
                Ok(token)
            }
            None => Err(self.error("Unexpected end of input")),
        }
    }

    /// Span of the current token, or the end-of-input marker.
    pub fn current_span(&self) -> Option<Span> {
        self.tokens
            .get(self.position)
            .or_else(|| self.tokens.last())
            .map(|token| token.span)
    }

    /// Build an error located at the current token. Callers decide whether to return it.
    pub fn error(&self, message: impl Into<String>) -> ParsingError {
        ParsingError::new(message, self.current_span())
    }

    pub fn error_at(&self, message: impl Into<String>, span: Span) -> ParsingError {
        ParsingError::at_position(message, span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    #[test]
    fn test_peek_does_not_advance() {
        let tokens = tokenize("SORT time");
        let cursor = TokenCursor::new(&tokens);
        assert!(cursor.peek_keyword("sort"));
        assert!(cursor.peek(TokenKind::Keyword, Some("SORT")));
        assert!(!cursor.peek_kind(TokenKind::Word));
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn test_consume_advances_on_match() {
        let tokens = tokenize("SORT time");
        let mut cursor = TokenCursor::new(&tokens);
        assert_eq!(cursor.consume_keyword("SORT").unwrap().value, "SORT");
        assert_eq!(cursor.consume(TokenKind::Word, None).unwrap().value, "time");
        assert!(cursor.at_end());
    }

    #[test]
    fn test_consume_mismatch_reports_expected_and_found() {
        let tokens = tokenize("SORT 42");
        let mut cursor = TokenCursor::new(&tokens);
        cursor.consume_keyword("SORT").unwrap();
        let err = cursor.consume(TokenKind::Word, None).unwrap_err();
        assert_eq!(err.message, "Expected word, found number \"42\"");
        assert_eq!(err.span, Some(Span::new(5, 7)));
        // 失败时不推进
        assert_eq!(cursor.position(), 1);
    }

    #[test]
    fn test_end_of_input_is_distinct_state() {
        let tokens = tokenize("TODAY");
        let mut cursor = TokenCursor::new(&tokens);
        cursor.consume_any().unwrap();
        assert!(!cursor.peek_kind(TokenKind::Eof));
        assert!(!cursor.peek_kind(TokenKind::Keyword));
        let err = cursor.consume_any().unwrap_err();
        assert_eq!(err.message, "Unexpected end of input");
        assert_eq!(err.span, Some(Span::new(5, 5)));
    }

    #[test]
    fn test_error_does_not_advance() {
        let tokens = tokenize("TITLE");
        let cursor = TokenCursor::new(&tokens);
        let err = cursor.error("boom");
        assert_eq!(err.to_string(), "boom");
        assert_eq!(cursor.position(), 0);
    }
}
