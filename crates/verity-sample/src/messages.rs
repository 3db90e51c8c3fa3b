//! The diagnostic message catalog of the sample dialects.
//!
//! Messages are templates in which `%{name}` is replaced by the diagnostic
//! argument called `name`.

use verity::Arguments;
use verity::Diagnostic;
use verity::Level;
use verity::Span;

/// Represents the reason of a diagnostic.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum Reason {
    /// A `*` or `&` after a command name is read as an argument prefix.
    AmbiguousPrefix,
    /// A token that cannot appear at its position.
    UnexpectedToken,
    /// A character that starts no token.
    UnexpectedChar,
    /// A string literal that is never closed.
    UnterminatedString,
    /// A numbered parameter used in a block with ordinary parameters.
    OrdinaryParamDefined,
    /// A parameter or pattern variable bound twice.
    DuplicateVariableName,
    /// A hash pattern key given twice.
    DuplicatePatternKey,
    /// A class definition inside a method body.
    ClassInDef,
}

impl Reason {
    /// Gets the level of diagnostics with this reason.
    pub fn level(self) -> Level {
        match self {
            Self::AmbiguousPrefix => Level::Warning,
            _ => Level::Error,
        }
    }

    /// Gets the message template of the reason.
    pub fn template(self) -> &'static str {
        match self {
            Self::AmbiguousPrefix => "`%{prefix}' interpreted as argument prefix",
            Self::UnexpectedToken => "unexpected token %{token}",
            Self::UnexpectedChar => "unexpected `%{character}'",
            Self::UnterminatedString => "unterminated string meets end of file",
            Self::OrdinaryParamDefined => "ordinary parameter is defined",
            Self::DuplicateVariableName => "duplicated variable name %{name}",
            Self::DuplicatePatternKey => "duplicate hash pattern key %{name}",
            Self::ClassInDef => "class definition in method body",
        }
    }

    /// Renders the message of the reason.
    ///
    /// Returns `None` if an argument used by the template is missing.
    pub fn render(self, arguments: &Arguments) -> Option<String> {
        let mut message = String::new();
        let mut rest = self.template();
        while let Some(start) = rest.find("%{") {
            message.push_str(&rest[..start]);
            let tail = &rest[start + 2..];
            let end = tail.find('}')?;
            message.push_str(arguments.get(&tail[..end])?);
            rest = &tail[end + 1..];
        }

        message.push_str(rest);
        Some(message)
    }
}

/// Renders the message for a reason code.
///
/// Returns `None` if the reason is unknown or an argument is missing.
pub fn compile(reason: &str, arguments: &Arguments) -> Option<String> {
    reason.parse::<Reason>().ok()?.render(arguments)
}

/// Creates a diagnostic for a reason.
pub(crate) fn diagnostic(reason: Reason, arguments: Arguments, location: Span) -> Diagnostic {
    let message = reason
        .render(&arguments)
        .unwrap_or_else(|| reason.template().to_string());
    Diagnostic::new(reason.level(), reason.to_string(), message, location).with_arguments(arguments)
}

/// Builds diagnostic arguments from name and value pairs.
pub(crate) fn arguments<const N: usize>(pairs: [(&str, String); N]) -> Arguments {
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}
