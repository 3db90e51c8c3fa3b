//! A differential conformance harness for families of grammar-version-specific
//! parsers.
//!
//! A parser family implements [`Grammar`]: it declares a closed, ordered set
//! of [`Version`]s and constructs a [`Parser`] for each of them. A
//! [`Harness`] drives one fresh parser per targeted version and checks that
//! every one of them agrees with a single expectation:
//!
//! * [`Harness::assert_parses`] compares the parsed tree with an expected one
//!   and checks the source ranges described by an annotation block (see
//!   [`source_map`]);
//! * [`Harness::assert_diagnoses`] and [`Harness::assert_diagnoses_many`]
//!   compare the emitted diagnostics;
//! * [`Harness::refute_diagnoses`] checks that no diagnostics are emitted;
//! * [`Harness::assert_context`] compares the parse-context flags seen at a
//!   context probe.
//!
//! After every successful parse, the parser's bookkeeping must be back to its
//! initial state (see [`audit`]).
//!
//! ```text
//! harness.assert_parses(
//!     Some(&"(send (int 10) :+ (int 20))".parse()?),
//!     Case::builder("10 + 20").source_maps(
//!         "~~~~~~~ expression
//!         |   ^ operator",
//!     ).build(),
//! )?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![warn(rust_2021_compatibility)]
#![warn(missing_debug_implementations)]
#![warn(clippy::missing_docs_in_private_items)]
#![warn(rustdoc::broken_intra_doc_links)]

mod assert;
mod context;
mod diagnostic;
mod error;
#[cfg(test)]
mod fake;
pub mod fixture;
mod grammar;
mod harness;
pub mod path;
pub mod source_map;
mod state;
mod version;

pub use assert::Case;
pub use context::ContextFlag;
pub use context::ContextFlags;
pub use diagnostic::Arguments;
pub use diagnostic::Diagnostic;
pub use diagnostic::Diagnostics;
pub use diagnostic::ExpectedDiagnostic;
pub use diagnostic::Level;
pub use diagnostic::Span;
pub use diagnostic::render;
pub use error::Error;
pub use error::Result;
pub use grammar::Encoding;
pub use grammar::Grammar;
pub use grammar::NodeOf;
pub use grammar::ParseError;
pub use grammar::Parser;
pub use grammar::SourceMap;
pub use grammar::Tree;
pub use harness::Harness;
pub use state::LexerState;
pub use state::ParserState;
pub use state::audit;
pub use version::Version;
