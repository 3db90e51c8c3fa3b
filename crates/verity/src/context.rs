//! Parse-context flags shared by parsers and the state auditor.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use strum::EnumCount;
use strum::IntoEnumIterator;

/// Represents a boolean parse-context flag.
///
/// A flag is set while the parser is inside the corresponding syntactic
/// context.
// NOTE: the declaration order is the canonical iteration order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::EnumCount,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ContextFlag {
    /// Inside the operand of `defined?`.
    InDefined,
    /// Inside a keyword-argument-like position (e.g. a pattern).
    InKwarg,
    /// Inside a method's parameter list.
    InArgdef,
    /// Inside a method body.
    InDef,
    /// Inside a class body.
    InClass,
    /// Inside a block body.
    InBlock,
    /// Inside a lambda body.
    InLambda,
}

/// A set of context flags indexed by [`ContextFlag`].
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ContextFlags([bool; ContextFlag::COUNT]);

impl ContextFlags {
    /// Creates a set with every flag cleared.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the value of a flag.
    pub fn get(&self, flag: ContextFlag) -> bool {
        self.0[flag as usize]
    }

    /// Sets the value of a flag and returns its previous value.
    pub fn set(&mut self, flag: ContextFlag, value: bool) -> bool {
        std::mem::replace(&mut self.0[flag as usize], value)
    }

    /// Iterates the flags that are currently set, in canonical order.
    pub fn active(&self) -> impl Iterator<Item = ContextFlag> + '_ {
        ContextFlag::iter().filter(|flag| self.get(*flag))
    }

    /// Determines if every flag is cleared.
    pub fn is_clear(&self) -> bool {
        self.0.iter().all(|set| !set)
    }
}

impl FromIterator<ContextFlag> for ContextFlags {
    fn from_iter<T: IntoIterator<Item = ContextFlag>>(iter: T) -> Self {
        let mut flags = Self::new();
        for flag in iter {
            flags.set(flag, true);
        }

        flags
    }
}

impl From<&[ContextFlag]> for ContextFlags {
    fn from(flags: &[ContextFlag]) -> Self {
        flags.iter().copied().collect()
    }
}

impl fmt::Debug for ContextFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.active()).finish()
    }
}
