//! Errors reported by the harness.

use crate::ParseError;
use crate::Version;

/// Represents an error reported by the harness.
///
/// The variants fall into three groups:
///
/// * fixture errors, which indicate a broken test rather than a defect of the
///   parser under test (`MalformedAnnotation`, `PathNotFound`,
///   `UnrecognizedVersion`, `UnknownDiagnosticField`, `UnknownReason` and
///   `Fixture`);
/// * unexpected parser failures, annotated with the version that produced
///   them (`Parse`);
/// * assertion failures, which are defects of the parser under test
///   (`Mismatch` and `DirtyState`).
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A line of a source map annotation block could not be decoded.
    #[error("cannot parse source map description line: {line:?}")]
    MalformedAnnotation {
        /// The offending line.
        line: String,
    },
    /// An AST path did not resolve to a node.
    #[error("no entity with AST path `{path}` in:\n{tree}")]
    PathNotFound {
        /// The unresolved path.
        path: String,
        /// The rendered tree the path was resolved against.
        tree: String,
    },
    /// A version outside of the supported set was requested.
    #[error("unrecognized version `{0}`")]
    UnrecognizedVersion(String),
    /// A diagnostic annotation named a field other than `location` or
    /// `highlights`.
    #[error("unknown diagnostic range `{0}`")]
    UnknownDiagnosticField(String),
    /// The message catalog could not render a reason code.
    #[error("cannot render a message for reason `{0}`")]
    UnknownReason(String),
    /// A fixture file is malformed.
    #[error("invalid fixture: {0}")]
    Fixture(String),
    /// The parser failed unexpectedly.
    #[error("({version}) {source}")]
    Parse {
        /// The version of the failing parser.
        version: Version,
        /// The failure reported by the parser.
        #[source]
        source: ParseError,
    },
    /// A parse result did not match the expectation.
    #[error("({version}) {message}")]
    Mismatch {
        /// The version of the parser.
        version: Version,
        /// A description of what was compared.
        message: String,
    },
    /// A parser's bookkeeping was not reset after a successful parse.
    #[error("({version}) {message}")]
    DirtyState {
        /// The version of the parser.
        version: Version,
        /// A description of the structure that was not reset.
        message: String,
    },
}

impl Error {
    /// Creates a new mismatch error.
    pub(crate) fn mismatch(version: &Version, message: impl Into<String>) -> Self {
        Self::Mismatch {
            version: version.clone(),
            message: message.into(),
        }
    }

    /// Determines if the error indicates a broken test rather than a defect
    /// of the parser under test.
    pub fn is_fixture_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedAnnotation { .. }
                | Self::PathNotFound { .. }
                | Self::UnrecognizedVersion(_)
                | Self::UnknownDiagnosticField(_)
                | Self::UnknownReason(_)
                | Self::Fixture(_)
        )
    }
}

/// The result type for the harness.
pub type Result<T, E = Error> = std::result::Result<T, E>;
