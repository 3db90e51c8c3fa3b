//! Representation of grammar version identifiers.

use std::borrow::Borrow;
use std::borrow::Cow;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Represents an opaque grammar version identifier.
///
/// A parser family declares the closed set of versions it supports (see
/// [`Grammar::versions`](crate::Grammar::versions)); a version is only ever
/// compared by name and used as a key when constructing parsers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(Cow<'static, str>);

impl Version {
    /// Creates a new version from a static name.
    ///
    /// ```
    /// # use verity::Version;
    /// const V2_7: Version = Version::new("2.7");
    /// assert_eq!(V2_7.name(), "2.7");
    /// ```
    pub const fn new(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// Gets the name of the version.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{name}", name = self.0)
    }
}

impl From<String> for Version {
    fn from(name: String) -> Self {
        Self(Cow::Owned(name))
    }
}

impl From<&'static str> for Version {
    fn from(name: &'static str) -> Self {
        Self::new(name)
    }
}

impl Borrow<str> for Version {
    fn borrow(&self) -> &str {
        &self.0
    }
}
