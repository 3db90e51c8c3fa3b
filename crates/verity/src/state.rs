//! Snapshots of parser bookkeeping and the post-parse state auditor.

use tracing::trace;

use crate::ContextFlags;
use crate::Error;
use crate::Result;
use crate::Version;

/// A snapshot of a lexer's nested-scope bookkeeping.
///
/// Every value is the size (or depth) of the corresponding structure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LexerState {
    /// The depth of the condition bit stack.
    pub cond: usize,
    /// The depth of the command-argument bit stack.
    pub cmdarg: usize,
    /// The number of saved condition stacks.
    pub cond_stack: usize,
    /// The number of saved command-argument stacks.
    pub cmdarg_stack: usize,
    /// The number of open lambda literals.
    pub lambda_stack: usize,
    /// The parenthesis nesting depth.
    pub paren_nest: usize,
}

/// A snapshot of a parser's version-independent bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParserState {
    /// The lexer's bookkeeping.
    pub lexer: LexerState,
    /// The currently set context flags.
    pub context: ContextFlags,
    /// The number of open static (local variable) scopes.
    pub static_env: usize,
    /// The depth of the numbered-parameter stack.
    pub max_numparam_stack: usize,
    /// The depth of the current-argument stack.
    pub current_arg_stack: usize,
    /// The number of open pattern-variable scopes.
    pub pattern_variables: usize,
    /// The number of open pattern hash-key scopes.
    pub pattern_hash_keys: usize,
}

impl ParserState {
    /// Iterates the sized structures of the snapshot by name.
    fn structures(&self) -> [(&'static str, usize); 10] {
        [
            ("lexer.cmdarg", self.lexer.cmdarg),
            ("lexer.cond", self.lexer.cond),
            ("lexer.cmdarg_stack", self.lexer.cmdarg_stack),
            ("lexer.cond_stack", self.lexer.cond_stack),
            ("lexer.lambda_stack", self.lexer.lambda_stack),
            ("static_env", self.static_env),
            ("max_numparam_stack", self.max_numparam_stack),
            ("current_arg_stack", self.current_arg_stack),
            ("pattern_variables", self.pattern_variables),
            ("pattern_hash_keys", self.pattern_hash_keys),
        ]
    }
}

/// Checks that every structure of the snapshot is back to its initial state.
///
/// The first structure that is not reset is reported as a
/// [`DirtyState`](Error::DirtyState) error naming it.
pub fn audit(version: &Version, state: &ParserState) -> Result<()> {
    trace!(%version, ?state, "auditing parser state");

    let dirty = |message: String| Error::DirtyState {
        version: version.clone(),
        message,
    };

    if state.lexer.paren_nest != 0 {
        return Err(dirty(format!(
            "expected lexer.paren_nest to be 0 after parsing, found {depth}",
            depth = state.lexer.paren_nest
        )));
    }

    for (name, size) in state.structures() {
        if size != 0 {
            return Err(dirty(format!(
                "expected {name} to be empty after parsing, found {size} entries"
            )));
        }
    }

    if let Some(flag) = state.context.active().next() {
        return Err(dirty(format!(
            "expected context.{flag} to be `false` after parsing"
        )));
    }

    Ok(())
}
