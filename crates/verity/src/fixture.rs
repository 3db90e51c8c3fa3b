//! Declarative fixture manifests.
//!
//! A manifest is a TOML document with one `[[case]]` table per assertion:
//!
//! ```toml
//! [[case]]
//! name = "integer addition"
//! code = "10 + 20"
//! source_maps = """
//! ~~~~~~~ expression
//!    ^ operator
//! """
//! expect = "parses"
//! ast = "(send (int 10) :+ (int 20))"
//! ```
//!
//! The `expect` key selects the assertion:
//!
//! * `parses` takes an optional `ast` (omitted expects no tree);
//! * `diagnoses` takes `level`, `reason` and `arguments`;
//! * `diagnoses_many` takes a `[[case.diagnostics]]` array;
//! * `clean` takes nothing;
//! * `context` takes `flags`.
//!
//! Every case may restrict its `versions`; unknown version names are
//! ignored.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;
use tracing::debug;
use tracing::trace;

use crate::Case;
use crate::ContextFlag;
use crate::Error;
use crate::ExpectedDiagnostic;
use crate::Grammar;
use crate::Harness;
use crate::Level;
use crate::NodeOf;
use crate::Result;
use crate::Version;
use crate::diagnostic::Arguments;

/// Represents the expected outcome of a fixture case.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "expect", rename_all = "snake_case")]
pub enum Expectation {
    /// The snippet parses into the given tree.
    Parses {
        /// The s-expression of the expected tree; `None` expects no tree.
        #[serde(default)]
        ast: Option<String>,
    },
    /// The snippet produces exactly one diagnostic.
    Diagnoses {
        /// The expected level.
        level: Level,
        /// The expected reason code.
        reason: String,
        /// The expected arguments.
        #[serde(default)]
        arguments: Arguments,
    },
    /// The snippet produces exactly the given diagnostics, in order.
    DiagnosesMany {
        /// The expected diagnostics.
        diagnostics: Vec<ExpectedDiagnostic>,
    },
    /// The snippet produces no diagnostics.
    Clean,
    /// The snippet's context probe sees exactly the given flags.
    Context {
        /// The expected flags.
        #[serde(default)]
        flags: Vec<ContextFlag>,
    },
}

/// Represents a single case of a fixture manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct FixtureCase {
    /// The name of the case.
    name: String,
    /// The code snippet.
    code: String,
    /// The targeted versions; all versions if omitted.
    #[serde(default)]
    versions: Option<Vec<Version>>,
    /// The source map annotation block.
    #[serde(default)]
    source_maps: String,
    /// The expected outcome.
    #[serde(flatten)]
    expectation: Expectation,
}

impl FixtureCase {
    /// Gets the name of the case.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the assertion input of the case.
    pub fn case(&self) -> Case<'_> {
        Case::builder(&self.code)
            .source_maps(&self.source_maps)
            .maybe_versions(self.versions.as_deref())
            .build()
    }

    /// Gets the expected outcome of the case.
    pub fn expectation(&self) -> &Expectation {
        &self.expectation
    }
}

/// The raw shape of a manifest.
#[derive(Debug, Default, Deserialize)]
struct Manifest {
    /// The cases in declaration order.
    #[serde(default, rename = "case")]
    cases: Vec<FixtureCase>,
}

/// A loaded fixture manifest.
#[derive(Debug, Default)]
pub struct Fixtures {
    /// The cases in declaration order.
    cases: Vec<FixtureCase>,
}

impl Fixtures {
    /// Loads a manifest from a file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("loading fixtures from {}", path.display());

        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Fixture(format!("cannot read `{path}`: {e}", path = path.display()))
        })?;

        contents.parse().map_err(|e| match e {
            Error::Fixture(message) => {
                Error::Fixture(format!("{path}: {message}", path = path.display()))
            }
            e => e,
        })
    }

    /// Gets the cases of the manifest in declaration order.
    pub fn cases(&self) -> &[FixtureCase] {
        &self.cases
    }
}

impl FromStr for Fixtures {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let manifest: Manifest =
            toml::from_str(s).map_err(|e| Error::Fixture(e.message().to_string()))?;

        let mut names = HashSet::new();
        for case in &manifest.cases {
            if !names.insert(case.name.as_str()) {
                return Err(Error::Fixture(format!(
                    "duplicate case name `{name}`",
                    name = case.name
                )));
            }
        }

        trace!("loaded {count} fixture case(s)", count = manifest.cases.len());
        Ok(Self {
            cases: manifest.cases,
        })
    }
}

impl<G> Harness<G>
where
    G: Grammar,
    NodeOf<G>: FromStr,
    <NodeOf<G> as FromStr>::Err: fmt::Display,
{
    /// Runs the assertion a fixture expectation describes.
    ///
    /// Expected trees are read with the node type's [`FromStr`]
    /// implementation.
    pub fn run_fixture<'a>(
        &self,
        case: impl Into<Case<'a>>,
        expectation: &Expectation,
    ) -> Result<()> {
        let case = case.into();
        match expectation {
            Expectation::Parses { ast } => {
                let expected = ast
                    .as_deref()
                    .map(|ast| {
                        ast.parse::<NodeOf<G>>().map_err(|e| {
                            Error::Fixture(format!("cannot read expected AST `{ast}`: {e}"))
                        })
                    })
                    .transpose()?;
                self.assert_parses(expected.as_ref(), case)
            }
            Expectation::Diagnoses {
                level,
                reason,
                arguments,
            } => {
                let expected = ExpectedDiagnostic {
                    level: *level,
                    reason: reason.clone(),
                    arguments: arguments.clone(),
                };
                self.assert_diagnoses(&expected, case)
            }
            Expectation::DiagnosesMany { diagnostics } => {
                self.assert_diagnoses_many(diagnostics, case)
            }
            Expectation::Clean => self.refute_diagnoses(case),
            Expectation::Context { flags } => self.assert_context(flags, case),
        }
    }
}
