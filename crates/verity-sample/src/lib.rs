//! A reference family of Ruby-like dialects for the `verity` harness.
//!
//! The family parses a small expression language in fifteen versions: the
//! numbered revisions `1.8` through `3.2` and the vendor dialects `mac` and
//! `ios`, which follow the `1.9` grammar. Versions differ in the syntax they
//! accept:
//!
//! * `->` lambda literals are available since `1.9`;
//! * `_1`..`_9` are numbered block parameters since `2.7`, and ordinary
//!   method calls before that;
//! * `case ... in` pattern matching is available since `2.7`.
//!
//! ```rust
//! use verity::Case;
//!
//! let harness = verity_sample::harness();
//! harness
//!     .assert_parses(
//!         Some(&"(send (int 10) :+ (int 20))".parse()?),
//!         Case::builder("10 + 20")
//!             .source_maps(
//!                 "~~~~~~~ expression
//!                 |   ^ operator",
//!             )
//!             .build(),
//!     )?;
//! # Ok::<_, anyhow::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![warn(rust_2021_compatibility)]
#![warn(missing_debug_implementations)]
#![warn(clippy::missing_docs_in_private_items)]
#![warn(rustdoc::broken_intra_doc_links)]

use tracing::debug;
use verity::Arguments;
use verity::Diagnostics;
use verity::Grammar;
use verity::Harness;
use verity::Version;

pub mod ast;
pub mod lexer;
pub mod messages;
mod parser;
mod version;

pub use parser::CONTEXT_PROBE;
pub use parser::Parser;
pub use version::ALL_VERSIONS;
pub use version::Features;
pub use version::NUMBERED_VERSIONS;
pub use version::features;
pub use version::since;
pub use version::until;

/// The sample dialect family.
#[derive(Debug, Clone, Copy, Default)]
pub struct Family;

impl Grammar for Family {
    type Parser = Parser;

    fn versions(&self) -> &[Version] {
        &ALL_VERSIONS
    }

    fn create(&self, version: &Version, diagnostics: Diagnostics) -> Option<Parser> {
        let features = features(version)?;
        debug!(%version, ?features, "creating sample parser");
        Some(Parser::new(version.clone(), features, diagnostics))
    }

    fn compile(&self, reason: &str, arguments: &Arguments) -> Option<String> {
        messages::compile(reason, arguments)
    }
}

/// Creates a harness for the sample dialect family.
pub fn harness() -> Harness<Family> {
    Harness::new(Family)
}
