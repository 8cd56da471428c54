//! Report query language for the time-tracking note plugin.
//!
//! A query block written inside a note is tokenized, parsed into a [`Query`],
//! and finally planned into a [`ReportRequest`] for the report fetcher.

pub mod ast;
pub mod config;
pub mod cursor;
pub mod lexer;
pub mod parser;
pub mod report;
pub mod token;

pub use ast::Query;
pub use config::{ConfigError, PluginSettings};
pub use parser::{parse, Parser, ParserOptions, ParsingError};
pub use report::{ReportError, ReportRequest};
