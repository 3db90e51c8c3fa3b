//! The version matrix runner and parser factory.

use tracing::debug;
use tracing::trace;

use crate::Diagnostics;
use crate::Error;
use crate::Grammar;
use crate::Result;
use crate::Version;

/// Drives a family of grammar-version-specific parsers.
///
/// The harness owns the parser family and the diagnostics accumulator that
/// every parser it constructs emits into. The accumulator is cleared before
/// each version's parser is constructed, so diagnostics never leak from one
/// version to the next.
#[derive(Debug)]
pub struct Harness<G> {
    /// The parser family.
    grammar: G,
    /// The accumulator shared with the current version's parser.
    diagnostics: Diagnostics,
}

impl<G: Grammar> Harness<G> {
    /// Creates a new harness for the given parser family.
    pub fn new(grammar: G) -> Self {
        Self {
            grammar,
            diagnostics: Diagnostics::new(),
        }
    }

    /// Gets the parser family.
    pub fn grammar(&self) -> &G {
        &self.grammar
    }

    /// Gets the diagnostics accumulated by the most recent parser.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Gets the supported versions in canonical order.
    pub fn versions(&self) -> &[Version] {
        self.grammar.versions()
    }

    /// Gets the supported versions, except the given ones, in canonical
    /// order.
    pub fn versions_except(&self, excluded: &[Version]) -> Vec<Version> {
        self.versions()
            .iter()
            .filter(|version| !excluded.contains(version))
            .cloned()
            .collect()
    }

    /// Creates a new parser for the given version.
    ///
    /// The parser emits into the harness's diagnostics accumulator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnrecognizedVersion`] if the version is not part of
    /// the family.
    pub fn parser_for(&self, version: &Version) -> Result<G::Parser> {
        if !self.versions().contains(version) {
            return Err(Error::UnrecognizedVersion(version.to_string()));
        }

        self.grammar
            .create(version, self.diagnostics.clone())
            .ok_or_else(|| Error::UnrecognizedVersion(version.to_string()))
    }

    /// Invokes the callback with a fresh parser for every requested version.
    ///
    /// Versions are visited in the family's canonical order; requested
    /// versions the family does not support are skipped. The accumulator is
    /// cleared before each parser is constructed.
    ///
    /// The first error returned by the callback aborts the iteration and is
    /// returned.
    pub fn with_versions<F>(&self, requested: &[Version], mut callback: F) -> Result<()>
    where
        F: FnMut(&Version, &mut G::Parser) -> Result<()>,
    {
        for version in requested {
            if !self.versions().contains(version) {
                trace!(%version, "skipping unsupported version");
            }
        }

        for version in self
            .versions()
            .iter()
            .filter(|version| requested.contains(version))
        {
            self.diagnostics.clear();
            let mut parser = self.parser_for(version)?;
            debug!(%version, "constructed parser");
            callback(version, &mut parser)?;
        }

        Ok(())
    }
}
