//! Definition of diagnostics emitted by parsers under test.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use codespan_reporting::diagnostic as codespan;
use codespan_reporting::files::SimpleFile;
use codespan_reporting::term;
use codespan_reporting::term::Config;
use codespan_reporting::term::termcolor::Buffer;
use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;

/// Represents a half-open span of source.
///
/// Offsets are counted in characters (Unicode scalar values), not bytes, so
/// that the columns of an annotation block line up with the snippet it
/// describes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Span {
    /// The start of the span.
    start: usize,
    /// The end of the span.
    end: usize,
}

impl Span {
    /// Creates a new span from the given start and length.
    pub const fn new(start: usize, len: usize) -> Self {
        Self {
            start,
            end: start + len,
        }
    }

    /// Creates a new span from the given start and noninclusive end.
    ///
    /// # Panics
    ///
    /// Panics if `end` is less than `start`.
    pub fn from_bounds(start: usize, end: usize) -> Self {
        assert!(end >= start, "span end {end} precedes start {start}");
        Self { start, end }
    }

    /// Gets the start of the span.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Gets the noninclusive end of the span.
    pub fn end(&self) -> usize {
        self.end
    }

    /// Gets the length of the span.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Determines if the span is empty.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Joins two spans into the smallest span covering both.
    pub fn join(self, other: Self) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Converts the span into a byte range of the given source.
    ///
    /// Offsets past the end of the source are clamped to its length.
    pub fn to_byte_range(self, source: &str) -> std::ops::Range<usize> {
        let byte = |offset: usize| {
            source
                .char_indices()
                .nth(offset)
                .map(|(i, _)| i)
                .unwrap_or(source.len())
        };

        byte(self.start)..byte(self.end)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{start}...{end}", start = self.start, end = self.end)
    }
}

/// Represents the level of a diagnostic.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Ord,
    PartialOrd,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Level {
    /// The diagnostic is informational.
    Note,
    /// The diagnostic is a warning; parsing continues.
    Warning,
    /// The diagnostic is an error.
    Error,
    /// The diagnostic is a fatal error.
    Fatal,
}

/// The named arguments interpolated into a diagnostic message.
///
/// Equality of arguments does not depend on insertion order.
pub type Arguments = IndexMap<String, String>;

/// Represents a diagnostic emitted by a parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// The level of the diagnostic.
    level: Level,
    /// The reason code of the diagnostic (e.g. `ambiguous_prefix`).
    reason: String,
    /// The arguments used to render the message.
    arguments: Arguments,
    /// The rendered message.
    message: String,
    /// The primary location of the diagnostic.
    location: Span,
    /// Additional highlighted ranges, in order.
    highlights: Vec<Span>,
}

impl Diagnostic {
    /// Creates a new diagnostic.
    ///
    /// The message is expected to be rendered from the reason and arguments
    /// by the parser family's message catalog.
    pub fn new(
        level: Level,
        reason: impl Into<String>,
        message: impl Into<String>,
        location: Span,
    ) -> Self {
        Self {
            level,
            reason: reason.into(),
            arguments: Arguments::new(),
            message: message.into(),
            location,
            highlights: Vec::new(),
        }
    }

    /// Sets the arguments of the diagnostic.
    pub fn with_arguments(mut self, arguments: Arguments) -> Self {
        self.arguments = arguments;
        self
    }

    /// Adds a highlighted range to the diagnostic.
    pub fn with_highlight(mut self, span: Span) -> Self {
        self.highlights.push(span);
        self
    }

    /// Gets the level of the diagnostic.
    pub fn level(&self) -> Level {
        self.level
    }

    /// Gets the reason code of the diagnostic.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Gets the arguments of the diagnostic.
    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    /// Gets the rendered message of the diagnostic.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Gets the primary location of the diagnostic.
    pub fn location(&self) -> Span {
        self.location
    }

    /// Gets the highlighted ranges of the diagnostic.
    pub fn highlights(&self) -> &[Span] {
        &self.highlights
    }

    /// Converts this diagnostic to a `codespan` [Diagnostic].
    ///
    /// The source is needed to translate character spans into byte ranges.
    ///
    /// [Diagnostic]: codespan_reporting::diagnostic::Diagnostic
    pub fn to_codespan(&self, source: &str) -> codespan::Diagnostic<()> {
        let diagnostic = match self.level {
            Level::Note => codespan::Diagnostic::note(),
            Level::Warning => codespan::Diagnostic::warning(),
            Level::Error | Level::Fatal => codespan::Diagnostic::error(),
        };

        let mut labels = vec![codespan::Label::primary(
            (),
            self.location.to_byte_range(source),
        )];
        labels.extend(
            self.highlights
                .iter()
                .map(|span| codespan::Label::secondary((), span.to_byte_range(source))),
        );

        diagnostic
            .with_code(self.reason.clone())
            .with_message(self.message.clone())
            .with_labels(labels)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{level}: {message} [{reason}] @ {location}",
            level = self.level,
            message = self.message,
            reason = self.reason,
            location = self.location
        )
    }
}

/// Renders diagnostics against their source for inclusion in a failure
/// message.
pub fn render(diagnostics: &[Diagnostic], source: &str) -> String {
    let file = SimpleFile::new("(snippet)", source);
    let mut buffer = Buffer::no_color();
    for diagnostic in diagnostics {
        if term::emit_to_write_style(
            &mut buffer,
            &Config::default(),
            &file,
            &diagnostic.to_codespan(source),
        )
        .is_err()
        {
            // Fall back to the plain rendering when the spans do not fit the
            // source.
            return diagnostics
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\n");
        }
    }

    String::from_utf8_lossy(buffer.as_slice()).into_owned()
}

/// An accumulator of the diagnostics emitted during a parse.
///
/// Clones share the same underlying storage: the harness keeps one handle and
/// gives a clone to every parser it constructs. The accumulator is
/// single-threaded.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics(Rc<RefCell<Vec<Diagnostic>>>);

impl Diagnostics {
    /// Creates a new, empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a diagnostic to the accumulator.
    pub fn emit(&self, diagnostic: Diagnostic) {
        self.0.borrow_mut().push(diagnostic);
    }

    /// Removes every accumulated diagnostic.
    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    /// Gets the number of accumulated diagnostics.
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    /// Determines if no diagnostics have been accumulated.
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Gets a copy of the accumulated diagnostics in emission order.
    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.0.borrow().clone()
    }
}

/// Represents the expectation of a single diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedDiagnostic {
    /// The expected level.
    pub level: Level,
    /// The expected reason code.
    pub reason: String,
    /// The expected arguments.
    #[serde(default)]
    pub arguments: Arguments,
}

impl ExpectedDiagnostic {
    /// Creates a new expectation with no arguments.
    pub fn new(level: Level, reason: impl Into<String>) -> Self {
        Self {
            level,
            reason: reason.into(),
            arguments: Arguments::new(),
        }
    }

    /// Adds an expected argument.
    pub fn with_argument(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.arguments.insert(name.into(), value.into());
        self
    }
}
