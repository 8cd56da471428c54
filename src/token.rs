//! The token definition for the report query language.

use std::fmt;

/// A token is a single unit of the language, with a specific kind and location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    /// The source text of the token. For strings this is the content without quotes.
    pub value: &'a str,
    pub span: Span,
}

/// The kind of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Keyword,     // TYPE, BETWEEN, SORT, ...
    Word,        // project, summary, Acme-Corp
    Date,        // 2024-01-31
    Number,      // 42
    Operator,    // = != < > <= >=
    Punctuation, // , [ ] ( )
    String,      // "quoted" or 'quoted'
    Eof,         // End of input
}

/// Reserved words of the query language, matched case-insensitively.
pub const KEYWORDS: &[&str] = &[
    "TYPE",
    "BETWEEN",
    "FROM",
    "AND",
    "TO",
    "TODAY",
    "YESTERDAY",
    "THISWEEK",
    "LASTWEEK",
    "THISMONTH",
    "LASTMONTH",
    "THISYEAR",
    "PAST",
    "DAY",
    "DAYS",
    "WEEK",
    "WEEKS",
    "MONTH",
    "MONTHS",
    "WORKSPACE",
    "INCLUDE",
    "EXCLUDE",
    "PROJECTS",
    "CLIENTS",
    "TAGS",
    "GROUPBY",
    "GROUP",
    "BY",
    "SORT",
    "ASC",
    "DESC",
    "SHOW",
    "TITLE",
];

pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(word))
}

impl<'a> Token<'a> {
    pub fn new(kind: TokenKind, value: &'a str, span: Span) -> Self {
        Self { kind, value, span }
    }

    /// True if the token has the given kind and, when `value` is given, the same
    /// text ignoring ASCII case.
    pub fn is(&self, kind: TokenKind, value: Option<&str>) -> bool {
        self.kind == kind && value.map_or(true, |v| self.value.eq_ignore_ascii_case(v))
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Keyword => "keyword",
            TokenKind::Word => "word",
            TokenKind::Date => "date",
            TokenKind::Number => "number",
            TokenKind::Operator => "operator",
            TokenKind::Punctuation => "punctuation",
            TokenKind::String => "string",
            TokenKind::Eof => "end of input",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Eof => write!(f, "end of input"),
            TokenKind::Keyword => write!(f, "keyword {}", self.value.to_ascii_uppercase()),
            kind => write!(f, "{} \"{}\"", kind, self.value),
        }
    }
}

/// Represents a span in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// The starting byte offset.
    pub start: usize,
    /// The ending byte offset.
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}
