//! The versions of the sample dialect family.

use verity::Error;
use verity::Result;
use verity::Version;

/// The numbered revisions, oldest first.
pub static NUMBERED_VERSIONS: [Version; 13] = [
    Version::new("1.8"),
    Version::new("1.9"),
    Version::new("2.0"),
    Version::new("2.1"),
    Version::new("2.2"),
    Version::new("2.3"),
    Version::new("2.4"),
    Version::new("2.5"),
    Version::new("2.6"),
    Version::new("2.7"),
    Version::new("3.0"),
    Version::new("3.1"),
    Version::new("3.2"),
];

/// Every supported version: the numbered revisions followed by the vendor
/// dialects.
pub static ALL_VERSIONS: [Version; 15] = [
    Version::new("1.8"),
    Version::new("1.9"),
    Version::new("2.0"),
    Version::new("2.1"),
    Version::new("2.2"),
    Version::new("2.3"),
    Version::new("2.4"),
    Version::new("2.5"),
    Version::new("2.6"),
    Version::new("2.7"),
    Version::new("3.0"),
    Version::new("3.1"),
    Version::new("3.2"),
    Version::new("mac"),
    Version::new("ios"),
];

/// The revision the vendor dialects are built on.
const DIALECT_BASE: &str = "1.9";

/// The first revision with lambda literals.
const LAMBDA_SINCE: &str = "1.9";

/// The first revision with numbered parameters and pattern matching.
const NUMBERED_PARAMS_SINCE: &str = "2.7";

/// The syntax features enabled in a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Features {
    /// Whether `->` lambda literals are supported.
    pub lambda: bool,
    /// Whether `_1`..`_9` are numbered block parameters.
    pub numbered_params: bool,
    /// Whether `case ... in` pattern matching is supported.
    pub pattern_matching: bool,
}

/// Gets the position of a numbered revision.
fn revision(name: &str) -> Option<usize> {
    NUMBERED_VERSIONS
        .iter()
        .position(|version| version.name() == name)
}

/// Gets the features of a version.
///
/// Returns `None` if the version is not part of the family.
pub fn features(version: &Version) -> Option<Features> {
    let base = match version.name() {
        "mac" | "ios" => DIALECT_BASE,
        name => name,
    };

    let index = revision(base)?;
    let since = |name| revision(name).is_some_and(|first| index >= first);
    Some(Features {
        lambda: since(LAMBDA_SINCE),
        numbered_params: since(NUMBERED_PARAMS_SINCE),
        pattern_matching: since(NUMBERED_PARAMS_SINCE),
    })
}

/// Gets the numbered revisions starting with the given one.
///
/// Vendor dialects are never included.
pub fn since(name: &str) -> Result<&'static [Version]> {
    let index = revision(name).ok_or_else(|| Error::UnrecognizedVersion(name.to_string()))?;
    Ok(&NUMBERED_VERSIONS[index..])
}

/// Gets the numbered revisions up to and including the given one.
///
/// Vendor dialects are never included.
pub fn until(name: &str) -> Result<&'static [Version]> {
    let index = revision(name).ok_or_else(|| Error::UnrecognizedVersion(name.to_string()))?;
    Ok(&NUMBERED_VERSIONS[..=index])
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn dialects_follow_their_base() {
        let mac = features(&Version::new("mac")).unwrap();
        assert_eq!(mac, features(&Version::new("1.9")).unwrap());
        assert!(mac.lambda);
        assert!(!mac.numbered_params);
    }

    #[test]
    fn features_by_revision() {
        assert!(!features(&Version::new("1.8")).unwrap().lambda);
        assert!(!features(&Version::new("2.6")).unwrap().pattern_matching);
        let modern = features(&Version::new("2.7")).unwrap();
        assert!(modern.numbered_params && modern.pattern_matching);
        assert_eq!(features(&Version::new("4.0")), None);
    }

    #[test]
    fn ranges_exclude_dialects() {
        assert_eq!(
            since("3.1").unwrap(),
            [Version::new("3.1"), Version::new("3.2")]
        );
        assert_eq!(until("1.9").unwrap().len(), 2);
        assert!(since("mac").is_err());
    }
}
