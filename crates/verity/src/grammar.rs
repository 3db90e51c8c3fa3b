//! The interfaces a parser family exposes to the harness.
//!
//! The harness never lexes or parses anything itself: it constructs parsers
//! through a [`Grammar`], drives them through [`Parser`] and inspects the
//! resulting [`Tree`]s, their [`SourceMap`]s and the emitted diagnostics.

use std::fmt;

use crate::ContextFlags;
use crate::Diagnostics;
use crate::ParserState;
use crate::Span;
use crate::Version;
use crate::diagnostic::Arguments;

/// Represents a failure reported by a parser under test.
#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    /// The parser rejected the input as syntactically invalid.
    ///
    /// This is the only failure the harness treats as an expected outcome.
    #[error("syntax error: {0}")]
    Syntax(String),
    /// Any other failure of the parser.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ParseError {
    /// Determines if the error is a recognized syntax rejection.
    pub fn is_syntax(&self) -> bool {
        matches!(self, Self::Syntax(_))
    }
}

/// Represents the internal text encoding a parser uses for its source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Encoding {
    /// The source is processed as UTF-8.
    #[default]
    Utf8,
    /// The source is processed as a sequence of UTF-32 code points.
    Utf32,
}

/// Represents the source map (location) of a node.
pub trait SourceMap: fmt::Debug {
    /// Gets a named location field.
    ///
    /// Returns `None` if the map has no field with the given name, and
    /// `Some(None)` if the field exists but has no range.
    fn field(&self, name: &str) -> Option<Option<Span>>;

    /// Determines if the map can no longer change.
    fn is_frozen(&self) -> bool {
        true
    }
}

/// Represents a node of an abstract syntax tree.
///
/// Equality is expected to be deep structural equality of node types and
/// children that ignores locations and context snapshots.
pub trait Tree: PartialEq + fmt::Debug {
    /// The type of the node's source map.
    type Map: SourceMap;

    /// Gets the type token of the node (e.g. `send`).
    fn kind(&self) -> &str;

    /// Iterates the direct children of the node that are themselves nodes.
    ///
    /// Literal children (integers, symbols, etc.) are not visited.
    fn children(&self) -> impl Iterator<Item = &Self>;

    /// Gets the source map of the node.
    fn location(&self) -> Option<&Self::Map>;

    /// Gets the context flags recorded at the node.
    ///
    /// Only context probe call-sites record flags.
    fn context(&self) -> Option<&ContextFlags>;
}

/// Represents one parser instance of a specific grammar version.
pub trait Parser {
    /// The type of node the parser produces.
    type Node: Tree;

    /// Parses the given source.
    ///
    /// Returns `Ok(None)` if the source contains no statements.
    fn parse(&mut self, source: &str) -> Result<Option<Self::Node>, ParseError>;

    /// Sets the internal text encoding of the parser's lexer.
    fn set_encoding(&mut self, encoding: Encoding);

    /// Takes a snapshot of the parser's internal bookkeeping.
    fn state(&self) -> ParserState;
}

/// Represents a family of grammar-version-specific parsers.
pub trait Grammar {
    /// The type of parser in the family.
    type Parser: Parser;

    /// Gets the fixed set of supported versions in canonical order.
    fn versions(&self) -> &[Version];

    /// Creates a new parser for the given version that emits into the given
    /// diagnostics accumulator.
    ///
    /// Returns `None` if the version is not part of the family.
    fn create(&self, version: &Version, diagnostics: Diagnostics) -> Option<Self::Parser>;

    /// Renders the message for a diagnostic reason code.
    ///
    /// Returns `None` if the reason is unknown or an argument is missing.
    fn compile(&self, reason: &str, arguments: &Arguments) -> Option<String>;
}

/// The node type produced by a grammar's parsers.
pub type NodeOf<G> = <<G as Grammar>::Parser as Parser>::Node;
