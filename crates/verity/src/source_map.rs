//! Decoding of source map annotation blocks.
//!
//! An annotation block describes ranges of a code snippet, one range per
//! line, by drawing markers underneath the snippet:
//!
//! ```text
//! 10 + 20
//! ~~~~~~~ expression
//!    ^ operator
//!  ~~ expression (int)
//! ```
//!
//! Each line has the shape
//! `^(\s*)([~^]+|!)\s+([a-z_]+)(\s+\(([a-z_.\/0-9]+)\))?$`:
//!
//! * the leading whitespace is the start offset of the range;
//! * the run of `~` or `^` markers is its length, while a single `!` means
//!   the field is expected to have no range at all;
//! * the word that follows is the name of the location field;
//! * the optional parenthesized, dot-separated path selects the node the
//!   field belongs to. Each segment is a node type with an optional 1-based
//!   occurrence suffix (`send/2` is the second `send` child).
//!
//! A line may start with a `|` (after any whitespace) so that blocks can be
//! indented in Rust string literals; the pipe is stripped along with
//! trailing whitespace and blank lines are skipped.

use std::fmt;
use std::iter::FusedIterator;
use std::str::Lines;

use tracing::trace;

use crate::Error;
use crate::Result;
use crate::Span;

/// Represents one step of an AST path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// The node type to match.
    kind: String,
    /// The 0-based occurrence of the node type among the children.
    index: usize,
}

impl Step {
    /// Creates a new step selecting the first child of the given type.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            index: 0,
        }
    }

    /// Creates a new step selecting the `occurrence`-th (1-based) child of
    /// the given type.
    ///
    /// # Panics
    ///
    /// Panics if `occurrence` is zero.
    pub fn nth(kind: impl Into<String>, occurrence: usize) -> Self {
        assert!(occurrence > 0, "occurrences are 1-based");
        Self {
            kind: kind.into(),
            index: occurrence - 1,
        }
    }

    /// Gets the node type of the step.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Gets the 0-based occurrence index of the step.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.index == 0 {
            write!(f, "{kind}", kind = self.kind)
        } else {
            write!(f, "{kind}/{n}", kind = self.kind, n = self.index + 1)
        }
    }
}

/// Formats an AST path as it is written in an annotation.
pub(crate) struct DisplayPath<'a>(pub(crate) &'a [Step]);

impl fmt::Display for DisplayPath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "root");
        }

        for (i, step) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }

            write!(f, "{step}")?;
        }

        Ok(())
    }
}

/// Represents one decoded annotation line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    /// The described range; `None` for a `!` marker.
    range: Option<Span>,
    /// The name of the location field.
    field: String,
    /// The path to the annotated node.
    path: Vec<Step>,
    /// The line the annotation was decoded from.
    line: String,
}

impl Annotation {
    /// Gets the described range.
    ///
    /// Returns `None` if the annotation expects the field to have no range.
    pub fn range(&self) -> Option<Span> {
        self.range
    }

    /// Gets the name of the location field.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Gets the path to the annotated node.
    pub fn path(&self) -> &[Step] {
        &self.path
    }

    /// Gets the line the annotation was decoded from.
    pub fn line(&self) -> &str {
        &self.line
    }
}

/// An iterator over the annotations of a block.
///
/// Lines are decoded lazily; a malformed line yields an error that ends the
/// iteration.
#[derive(Debug, Clone)]
pub struct Annotations<'a> {
    /// The remaining lines of the block.
    lines: Lines<'a>,
    /// Whether a malformed line was encountered.
    failed: bool,
}

impl Iterator for Annotations<'_> {
    type Item = Result<Annotation>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        for raw in self.lines.by_ref() {
            let line = strip_continuation(raw).trim_end();
            if line.is_empty() {
                continue;
            }

            let result = decode(line).ok_or_else(|| Error::MalformedAnnotation {
                line: line.to_string(),
            });

            match &result {
                Ok(annotation) => trace!(?annotation, "decoded annotation"),
                Err(_) => self.failed = true,
            }

            return Some(result);
        }

        None
    }
}

impl FusedIterator for Annotations<'_> {}

/// Decodes an annotation block.
///
/// The returned iterator is lazy; decoding the same block again restarts
/// from its first line.
pub fn parse(block: &str) -> Annotations<'_> {
    Annotations {
        lines: block.lines(),
        failed: false,
    }
}

/// Removes a leading `|` (and the whitespace before it) from a line.
fn strip_continuation(line: &str) -> &str {
    let trimmed = line.trim_start_matches(is_space);
    trimmed.strip_prefix('|').unwrap_or(line)
}

/// Determines if a character is whitespace in the annotation grammar.
fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n' | '\x0B' | '\x0C')
}

/// Determines if a character may appear in a field name or node type.
fn is_word(c: char) -> bool {
    c.is_ascii_lowercase() || c == '_'
}

/// Determines if a character may appear in an AST path.
fn is_path(c: char) -> bool {
    is_word(c) || c.is_ascii_digit() || c == '.' || c == '/'
}

/// A cursor over the characters of a single line.
struct Cursor<'a> {
    /// The remaining text.
    rest: &'a str,
}

impl<'a> Cursor<'a> {
    /// Consumes the longest prefix matching the predicate.
    fn eat_while(&mut self, predicate: impl Fn(char) -> bool) -> &'a str {
        let end = self
            .rest
            .find(|c| !predicate(c))
            .unwrap_or(self.rest.len());
        let (eaten, rest) = self.rest.split_at(end);
        self.rest = rest;
        eaten
    }

    /// Consumes the given character if it is next.
    fn eat(&mut self, c: char) -> bool {
        match self.rest.strip_prefix(c) {
            Some(rest) => {
                self.rest = rest;
                true
            }
            None => false,
        }
    }

    /// Determines if the whole line has been consumed.
    fn is_done(&self) -> bool {
        self.rest.is_empty()
    }
}

/// Decodes a single non-blank line.
fn decode(line: &str) -> Option<Annotation> {
    let mut cursor = Cursor { rest: line };

    let start = cursor.eat_while(is_space).chars().count();
    let range = if cursor.eat('!') {
        None
    } else {
        let markers = cursor.eat_while(|c| c == '~' || c == '^');
        if markers.is_empty() {
            return None;
        }

        Some(Span::new(start, markers.len()))
    };

    if cursor.eat_while(is_space).is_empty() {
        return None;
    }

    let field = cursor.eat_while(is_word);
    if field.is_empty() {
        return None;
    }

    let mut path = Vec::new();
    if !cursor.is_done() {
        if cursor.eat_while(is_space).is_empty() || !cursor.eat('(') {
            return None;
        }

        let segments = cursor.eat_while(is_path);
        if segments.is_empty() || !cursor.eat(')') || !cursor.is_done() {
            return None;
        }

        path = segments
            .split('.')
            .map(decode_step)
            .collect::<Option<Vec<_>>>()?;
    }

    Some(Annotation {
        range,
        field: field.to_string(),
        path,
        line: line.to_string(),
    })
}

/// Decodes a single path segment such as `send` or `send/2`.
fn decode_step(segment: &str) -> Option<Step> {
    let (kind, occurrence) = match segment.split_once('/') {
        Some((kind, occurrence)) => (kind, Some(occurrence)),
        None => (segment, None),
    };

    if kind.is_empty() || kind.contains('/') {
        return None;
    }

    match occurrence {
        None => Some(Step::new(kind)),
        Some(occurrence) => match occurrence.parse::<usize>() {
            Ok(n) if n > 0 => Some(Step::nth(kind, n)),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    /// Decodes a block, panicking on malformed lines.
    fn decode_all(block: &str) -> Vec<Annotation> {
        parse(block).collect::<Result<_>>().unwrap()
    }

    #[test]
    fn decodes_ranges_and_fields() {
        let annotations = decode_all(
            "~~~~~~~ expression
                |   ^ operator",
        );

        assert_eq!(annotations.len(), 2);
        assert_eq!(annotations[0].range(), Some(Span::new(0, 7)));
        assert_eq!(annotations[0].field(), "expression");
        assert!(annotations[0].path().is_empty());
        assert_eq!(annotations[1].range(), Some(Span::new(3, 1)));
        assert_eq!(annotations[1].field(), "operator");
        assert_eq!(annotations[1].line(), "   ^ operator");
    }

    #[test]
    fn decodes_paths_with_occurrences() {
        let annotations = decode_all("  ~~ expression (send.int/2)");
        assert_eq!(annotations[0].range(), Some(Span::new(2, 2)));
        assert_eq!(
            annotations[0].path(),
            [Step::new("send"), Step::nth("int", 2)]
        );
        assert_eq!(annotations[0].path()[1].index(), 1);
        assert_eq!(
            DisplayPath(annotations[0].path()).to_string(),
            "send.int/2"
        );
    }

    #[test]
    fn bang_marker_has_no_range() {
        let annotations = decode_all("! begin (block)");
        assert_eq!(annotations[0].range(), None);
        assert_eq!(annotations[0].field(), "begin");
        assert_eq!(annotations[0].path(), [Step::new("block")]);
    }

    #[test]
    fn numeric_segments_are_accepted() {
        let annotations = decode_all("    ~~~~ highlights (0)");
        assert_eq!(annotations[0].path(), [Step::new("0")]);
    }

    #[test]
    fn blank_and_pipe_only_lines_are_skipped() {
        let annotations = decode_all("\n   |\n\n  ^ location\n   \n");
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].range(), Some(Span::new(2, 1)));
    }

    #[test]
    fn malformed_lines_name_the_line() {
        let mut annotations = parse("~ expression\nxyz not-a-field\n^ operator");
        assert!(annotations.next().unwrap().is_ok());

        let err = annotations.next().unwrap().unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot parse source map description line: \"xyz not-a-field\""
        );
        assert!(err.is_fixture_error());
        assert!(annotations.next().is_none());
    }

    #[test]
    fn rejects_malformed_shapes() {
        for line in [
            "~~~expression",
            "!! begin",
            "~! begin",
            "~ Expression",
            "~ expression(send)",
            "~ expression (Send)",
            "~ expression (send) trailing",
            "~ expression (send/0)",
            "~ expression (send/)",
            "~ expression (send..int)",
            "~ expression (send/1/2)",
            "~ expression ()",
        ] {
            assert!(
                matches!(
                    parse(line).next(),
                    Some(Err(Error::MalformedAnnotation { .. }))
                ),
                "`{line}` should be rejected"
            );
        }
    }

    #[test]
    fn decoding_restarts_from_the_first_line() {
        let block = "~ a\n ~ b";
        let first: Vec<_> = parse(block).map(|a| a.unwrap().field().to_string()).collect();
        let second: Vec<_> = parse(block).map(|a| a.unwrap().field().to_string()).collect();
        assert_eq!(first, ["a", "b"]);
        assert_eq!(first, second);
    }
}
