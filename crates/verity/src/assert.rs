//! The assertion forms of the harness.

use pretty_assertions::Comparison;
use tracing::debug;

use crate::ContextFlag;
use crate::ContextFlags;
use crate::Diagnostic;
use crate::Encoding;
use crate::Error;
use crate::ExpectedDiagnostic;
use crate::Grammar;
use crate::Harness;
use crate::NodeOf;
use crate::ParseError;
use crate::Parser;
use crate::Result;
use crate::SourceMap;
use crate::Span;
use crate::Tree;
use crate::Version;
use crate::audit;
use crate::diagnostic::render;
use crate::path;
use crate::source_map;
use crate::source_map::Annotation;
use crate::source_map::DisplayPath;

/// Represents the input of a single assertion.
///
/// A `&str` converts into a case with no source map annotations that targets
/// every supported version.
#[derive(Debug, Clone, bon::Builder)]
pub struct Case<'a> {
    /// The code snippet to parse.
    #[builder(start_fn)]
    code: &'a str,
    /// The source map annotation block describing the snippet.
    #[builder(default)]
    source_maps: &'a str,
    /// The targeted versions; `None` targets every supported version.
    versions: Option<&'a [Version]>,
}

impl<'a> Case<'a> {
    /// Gets the code snippet.
    pub fn code(&self) -> &'a str {
        self.code
    }

    /// Gets the source map annotation block.
    pub fn source_maps(&self) -> &'a str {
        self.source_maps
    }

    /// Gets the explicitly targeted versions.
    pub fn versions(&self) -> Option<&'a [Version]> {
        self.versions
    }

    /// Gets the targeted versions given the supported ones.
    fn targets(&self, supported: &[Version]) -> Vec<Version> {
        self.versions.unwrap_or(supported).to_vec()
    }

    /// Decodes the whole annotation block.
    fn annotations(&self) -> Result<Vec<Annotation>> {
        source_map::parse(self.source_maps).collect()
    }

    /// Fails if the case carries annotations the assertion cannot use.
    fn reject_annotations(&self, form: &str) -> Result<()> {
        if self.annotations()?.is_empty() {
            Ok(())
        } else {
            Err(Error::Fixture(format!(
                "`{form}` does not accept source map annotations"
            )))
        }
    }
}

impl<'a> From<&'a str> for Case<'a> {
    fn from(code: &'a str) -> Self {
        Self {
            code,
            source_maps: "",
            versions: None,
        }
    }
}

/// Describes an optional range for a failure message.
fn describe(range: Option<Span>) -> String {
    match range {
        Some(span) => span.to_string(),
        None => "no range".to_string(),
    }
}

/// Compares the range an annotation describes with the actual one.
fn compare_range(version: &Version, annotation: &Annotation, actual: Option<Span>) -> Result<()> {
    if annotation.range() == actual {
        return Ok(());
    }

    Err(Error::mismatch(
        version,
        format!(
            "range of `{field}` does not match `{line}`: expected {expected}, found {actual}",
            field = annotation.field(),
            line = annotation.line(),
            expected = describe(annotation.range()),
            actual = describe(actual),
        ),
    ))
}

/// Parses a snippet for a diagnostic assertion.
///
/// A syntax rejection is an acceptable outcome; a successful parse must leave
/// the parser clean.
fn parse_tolerantly<P: Parser>(version: &Version, parser: &mut P, code: &str) -> Result<()> {
    match parser.parse(code) {
        Ok(_) => audit(version, &parser.state()),
        Err(ParseError::Syntax(message)) => {
            debug!(%version, %message, "parser rejected the snippet");
            Ok(())
        }
        Err(source) => Err(Error::Parse {
            version: version.clone(),
            source,
        }),
    }
}

impl<G: Grammar> Harness<G> {
    /// Asserts that every targeted version parses the snippet into the
    /// expected tree (`None` expects no tree at all).
    ///
    /// Each annotation of the case is resolved to a node of the parsed tree
    /// whose frozen location must carry the annotated field with the
    /// annotated range. The check is repeated with the lexer processing the
    /// source as UTF-32.
    ///
    /// Versions that are not targeted must either reject the snippet with a
    /// syntax error or accept it; any other failure is an error.
    pub fn assert_parses<'a>(
        &self,
        expected: Option<&NodeOf<G>>,
        case: impl Into<Case<'a>>,
    ) -> Result<()> {
        let case = case.into();
        debug!(code = case.code, "asserting parse");

        let annotations = case.annotations()?;
        let targeted = case.targets(self.versions());

        self.with_versions(&targeted, |version, parser| {
            self.try_parsing(version, parser, expected, case.code, &annotations)
        })?;

        self.with_versions(&targeted, |version, parser| {
            parser.set_encoding(Encoding::Utf32);
            self.try_parsing(version, parser, expected, case.code, &annotations)
        })?;

        let untargeted = self.versions_except(&targeted);
        self.with_versions(&untargeted, |version, parser| {
            match parser.parse(case.code) {
                Ok(_) => audit(version, &parser.state()),
                Err(ParseError::Syntax(message)) => {
                    debug!(%version, %message, "untargeted version rejected the snippet");
                    Ok(())
                }
                Err(source) => Err(Error::Parse {
                    version: version.clone(),
                    source,
                }),
            }
        })
    }

    /// Parses the snippet with one parser and checks the tree, its source
    /// maps and the parser's final state.
    fn try_parsing(
        &self,
        version: &Version,
        parser: &mut G::Parser,
        expected: Option<&NodeOf<G>>,
        code: &str,
        annotations: &[Annotation],
    ) -> Result<()> {
        let parsed = parser.parse(code).map_err(|source| Error::Parse {
            version: version.clone(),
            source,
        })?;

        if parsed.as_ref() != expected {
            return Err(Error::mismatch(
                version,
                format!(
                    "AST does not match for `{code}`:\n{comparison}",
                    comparison = Comparison::new(&expected, &parsed.as_ref())
                ),
            ));
        }

        for annotation in annotations {
            let at = DisplayPath(annotation.path());
            let node = parsed
                .as_ref()
                .and_then(|root| path::resolve(root, annotation.path()))
                .ok_or_else(|| Error::PathNotFound {
                    path: at.to_string(),
                    tree: match &parsed {
                        Some(root) => format!("{root:?}"),
                        None => "(no tree)".to_string(),
                    },
                })?;

            let map = node.location().ok_or_else(|| {
                Error::mismatch(version, format!("node at `{at}` has no location"))
            })?;

            if !map.is_frozen() {
                return Err(Error::mismatch(
                    version,
                    format!("location of node at `{at}` is not frozen"),
                ));
            }

            let actual = map.field(annotation.field()).ok_or_else(|| {
                Error::mismatch(
                    version,
                    format!(
                        "location of node at `{at}` has no `{field}` field",
                        field = annotation.field()
                    ),
                )
            })?;

            compare_range(version, annotation, actual)?;
        }

        audit(version, &parser.state())
    }

    /// Asserts that every targeted version emits exactly the expected
    /// diagnostic for the snippet.
    ///
    /// Annotations describe the diagnostic's ranges: the `location` field is
    /// its location and the `highlights` field is one of its highlights,
    /// selected by the 0-based index in the annotation's path (`(0)` if
    /// omitted).
    pub fn assert_diagnoses<'a>(
        &self,
        expected: &ExpectedDiagnostic,
        case: impl Into<Case<'a>>,
    ) -> Result<()> {
        let case = case.into();
        debug!(code = case.code, reason = %expected.reason, "asserting diagnostic");

        let annotations = case.annotations()?;
        let targeted = case.targets(self.versions());
        self.with_versions(&targeted, |version, parser| {
            parse_tolerantly(version, parser, case.code)?;
            let emitted = self.expect_diagnostics(version, std::slice::from_ref(expected), case.code)?;
            for annotation in &annotations {
                let actual = diagnostic_range(version, &emitted[0], annotation)?;
                compare_range(version, annotation, actual)?;
            }

            Ok(())
        })
    }

    /// Asserts that every targeted version emits exactly the expected
    /// diagnostics for the snippet, in order.
    pub fn assert_diagnoses_many<'a>(
        &self,
        expected: &[ExpectedDiagnostic],
        case: impl Into<Case<'a>>,
    ) -> Result<()> {
        let case = case.into();
        debug!(code = case.code, count = expected.len(), "asserting diagnostics");

        case.reject_annotations("assert_diagnoses_many")?;
        let targeted = case.targets(self.versions());
        self.with_versions(&targeted, |version, parser| {
            parse_tolerantly(version, parser, case.code)?;
            self.expect_diagnostics(version, expected, case.code)
                .map(|_| ())
        })
    }

    /// Asserts that no targeted version emits any diagnostic for the
    /// snippet.
    pub fn refute_diagnoses<'a>(&self, case: impl Into<Case<'a>>) -> Result<()> {
        let case = case.into();
        debug!(code = case.code, "asserting no diagnostics");

        case.reject_annotations("refute_diagnoses")?;
        let targeted = case.targets(self.versions());
        self.with_versions(&targeted, |version, parser| {
            parse_tolerantly(version, parser, case.code)?;
            self.expect_diagnostics(version, &[], case.code).map(|_| ())
        })
    }

    /// Asserts that the context flags recorded at the snippet's single
    /// context probe are exactly the expected ones, in every targeted
    /// version.
    pub fn assert_context<'a>(
        &self,
        expected: &[ContextFlag],
        case: impl Into<Case<'a>>,
    ) -> Result<()> {
        let case = case.into();
        debug!(code = case.code, ?expected, "asserting context");

        case.reject_annotations("assert_context")?;
        let expected = ContextFlags::from(expected);
        let targeted = case.targets(self.versions());
        self.with_versions(&targeted, |version, parser| {
            let parsed = parser.parse(case.code).map_err(|source| Error::Parse {
                version: version.clone(),
                source,
            })?;

            let probes: Vec<_> = parsed
                .iter()
                .flat_map(|root| path::dive(root, |node| node.context().is_some()))
                .filter_map(|node| node.context())
                .collect();

            let actual = match probes[..] {
                [actual] => *actual,
                _ => {
                    return Err(Error::Fixture(format!(
                        "expected exactly one context probe in `{code}`, found {count}",
                        code = case.code,
                        count = probes.len()
                    )));
                }
            };

            if actual != expected {
                return Err(Error::mismatch(
                    version,
                    format!(
                        "context flags do not match for `{code}`:\n{comparison}",
                        code = case.code,
                        comparison = Comparison::new(&expected, &actual)
                    ),
                ));
            }

            audit(version, &parser.state())
        })
    }

    /// Compares the accumulated diagnostics with the expected ones.
    ///
    /// Returns the accumulated diagnostics.
    fn expect_diagnostics(
        &self,
        version: &Version,
        expected: &[ExpectedDiagnostic],
        code: &str,
    ) -> Result<Vec<Diagnostic>> {
        let emitted = self.diagnostics().snapshot();
        if emitted.len() != expected.len() {
            return Err(Error::mismatch(
                version,
                format!(
                    "expected {expected} diagnostic(s) for `{code}`, found {found}\n{rendered}",
                    expected = expected.len(),
                    found = emitted.len(),
                    rendered = render(&emitted, code)
                ),
            ));
        }

        for (index, (actual, expected)) in emitted.iter().zip(expected).enumerate() {
            self.compare_diagnostic(version, index, actual, expected)?;
        }

        Ok(emitted)
    }

    /// Compares one emitted diagnostic with its expectation.
    fn compare_diagnostic(
        &self,
        version: &Version,
        index: usize,
        actual: &Diagnostic,
        expected: &ExpectedDiagnostic,
    ) -> Result<()> {
        let mismatch = |what: &str, expected: &dyn std::fmt::Debug, found: &dyn std::fmt::Debug| {
            Error::mismatch(
                version,
                format!(
                    "{what} of diagnostic #{index} does not match: expected {expected:?}, found \
                     {found:?}"
                ),
            )
        };

        if actual.level() != expected.level {
            return Err(mismatch("level", &expected.level, &actual.level()));
        }

        if actual.reason() != expected.reason {
            return Err(mismatch("reason", &expected.reason, &actual.reason()));
        }

        if *actual.arguments() != expected.arguments {
            return Err(mismatch(
                "arguments",
                &expected.arguments,
                actual.arguments(),
            ));
        }

        let message = self
            .grammar()
            .compile(&expected.reason, &expected.arguments)
            .ok_or_else(|| Error::UnknownReason(expected.reason.clone()))?;
        if actual.message() != message {
            return Err(mismatch("message", &message, &actual.message()));
        }

        Ok(())
    }
}

/// Selects the range of a diagnostic an annotation describes.
fn diagnostic_range(
    version: &Version,
    diagnostic: &Diagnostic,
    annotation: &Annotation,
) -> Result<Option<Span>> {
    match annotation.field() {
        "location" => Ok(Some(diagnostic.location())),
        "highlights" => {
            let malformed = || Error::MalformedAnnotation {
                line: annotation.line().to_string(),
            };

            // The index is a single bare segment; occurrence suffixes and
            // nested segments have no meaning for highlights.
            let index = match annotation.path() {
                [] => 0,
                [step] if step.index() == 0 => {
                    step.kind().parse::<usize>().map_err(|_| malformed())?
                }
                _ => return Err(malformed()),
            };

            diagnostic
                .highlights()
                .get(index)
                .map(|span| Some(*span))
                .ok_or_else(|| {
                    Error::mismatch(
                        version,
                        format!(
                            "diagnostic has no highlight #{index} (it has {count})",
                            count = diagnostic.highlights().len()
                        ),
                    )
                })
        }
        other => Err(Error::UnknownDiagnosticField(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    use super::*;
    use crate::Level;
    use crate::ParserState;
    use crate::fake::FakeGrammar;
    use crate::fake::FakeNode;
    use crate::fake::warning;

    /// Builds the tree of `10 + 20`.
    fn addition() -> FakeNode {
        FakeNode::new(
            "send",
            vec![
                FakeNode::leaf("int").with_field("expression", Some(Span::new(0, 2))),
                FakeNode::leaf("int").with_field("expression", Some(Span::new(5, 2))),
            ],
        )
        .with_field("expression", Some(Span::new(0, 7)))
        .with_field("operator", Some(Span::new(3, 1)))
        .with_field("dot", None)
    }

    /// The annotations of `10 + 20`.
    const ADDITION_MAPS: &str = "
        |~~~~~~~ expression
        |   ^ operator
        |     ~~ expression (int/2)
        |! dot
    ";

    /// The expected `ambiguous_prefix` diagnostic.
    fn ambiguous() -> ExpectedDiagnostic {
        ExpectedDiagnostic::new(Level::Warning, "ambiguous_prefix").with_argument("prefix", "*")
    }

    #[test]
    fn parses_in_both_encodings() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let recorded = calls.clone();
        let harness = Harness::new(FakeGrammar::scripted(move |invocation| {
            recorded
                .borrow_mut()
                .push((invocation.version.clone(), invocation.encoding));
            Ok(Some(addition()))
        }));

        let case = Case::builder("10 + 20").source_maps(ADDITION_MAPS).build();
        harness.assert_parses(Some(&addition()), case).unwrap();

        let encodings: Vec<_> = calls.borrow().iter().map(|(_, e)| *e).collect();
        assert_eq!(
            encodings,
            [
                Encoding::Utf8,
                Encoding::Utf8,
                Encoding::Utf8,
                Encoding::Utf32,
                Encoding::Utf32,
                Encoding::Utf32
            ]
        );
    }

    #[test]
    fn encoding_dependent_trees_fail() {
        let harness = Harness::new(FakeGrammar::scripted(|invocation| {
            Ok(Some(match invocation.encoding {
                Encoding::Utf8 => FakeNode::leaf("int"),
                Encoding::Utf32 => FakeNode::leaf("str"),
            }))
        }));

        let err = harness
            .assert_parses(Some(&FakeNode::leaf("int")), "1")
            .unwrap_err();
        assert!(
            matches!(
                &err,
                Error::Mismatch { version, message }
                    if version.name() == "1.0" && message.starts_with("AST does not match for `1`")
            ),
            "{err}"
        );
    }

    #[test]
    fn tree_mismatch_names_the_version() {
        let harness = Harness::new(FakeGrammar::new(|version, _, _| {
            Ok(Some(if version.name() == "2.0" {
                FakeNode::leaf("float")
            } else {
                FakeNode::leaf("int")
            }))
        }));

        let err = harness
            .assert_parses(Some(&FakeNode::leaf("int")), "1")
            .unwrap_err();
        assert!(err.to_string().starts_with("(2.0) AST does not match"), "{err}");
    }

    #[test]
    fn no_tree_expectation() {
        let harness = Harness::new(FakeGrammar::new(|_, _, _| Ok(None)));
        harness.assert_parses(None, "").unwrap();

        let err = harness
            .assert_parses(Some(&FakeNode::leaf("nil")), "")
            .unwrap_err();
        assert!(matches!(err, Error::Mismatch { .. }));
    }

    #[test]
    fn range_mismatch_quotes_the_annotation() {
        let harness = Harness::new(FakeGrammar::new(|_, _, _| Ok(Some(addition()))));
        let case = Case::builder("10 + 20").source_maps("  ^ operator").build();
        let err = harness.assert_parses(Some(&addition()), case).unwrap_err();
        assert_eq!(
            err.to_string(),
            "(1.0) range of `operator` does not match `  ^ operator`: expected 2...3, found \
             3...4"
        );
    }

    #[test]
    fn unresolved_paths_are_fixture_errors() {
        let harness = Harness::new(FakeGrammar::new(|_, _, _| Ok(Some(addition()))));
        let case = Case::builder("10 + 20")
            .source_maps("~~ expression (int/3)")
            .build();
        let err = harness.assert_parses(Some(&addition()), case).unwrap_err();
        assert!(
            matches!(&err, Error::PathNotFound { path, .. } if path == "int/3"),
            "{err}"
        );
        assert!(err.is_fixture_error());
    }

    #[test]
    fn annotations_against_no_tree_are_fixture_errors() {
        let harness = Harness::new(FakeGrammar::new(|_, _, _| Ok(None)));
        let case = Case::builder("").source_maps("~ expression").build();
        let err = harness.assert_parses(None, case).unwrap_err();
        assert!(matches!(err, Error::PathNotFound { .. }));
    }

    #[test]
    fn missing_fields_and_thawed_maps_fail() {
        let harness = Harness::new(FakeGrammar::new(|_, _, _| Ok(Some(addition()))));
        let case = Case::builder("10 + 20").source_maps("~~ selector").build();
        let err = harness.assert_parses(Some(&addition()), case).unwrap_err();
        assert_eq!(
            err.to_string(),
            "(1.0) location of node at `root` has no `selector` field"
        );

        let harness = Harness::new(FakeGrammar::new(|_, _, _| {
            let mut node = addition();
            if let Some(map) = node.map.as_mut() {
                map.thawed = true;
            }
            Ok(Some(node))
        }));
        let case = Case::builder("10 + 20").source_maps("~~~~~~~ expression").build();
        let err = harness.assert_parses(Some(&addition()), case).unwrap_err();
        assert!(err.to_string().ends_with("is not frozen"), "{err}");
    }

    #[test]
    fn annotated_nodes_need_a_location() {
        let tree = || FakeNode::new("send", vec![FakeNode::leaf("lvar")]);
        let harness = Harness::new(FakeGrammar::new(move |_, _, _| Ok(Some(tree()))));

        let case = Case::builder("x").source_maps("^ name (lvar)").build();
        let err = harness.assert_parses(Some(&tree()), case).unwrap_err();
        assert!(!err.is_fixture_error());
        assert!(
            matches!(
                &err,
                Error::Mismatch { version, message }
                    if version.name() == "1.0" && message == "node at `lvar` has no location"
            ),
            "{err}"
        );
    }

    #[test]
    fn malformed_annotations_abort_before_parsing() {
        let harness = Harness::new(FakeGrammar::new(|_, _, _| Ok(Some(addition()))));
        let case = Case::builder("10 + 20")
            .source_maps("~~~~~~~ expression\nxyz not-a-field")
            .build();
        let err = harness.assert_parses(Some(&addition()), case).unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot parse source map description line: \"xyz not-a-field\""
        );
        assert!(harness.grammar().created().is_empty());
    }

    #[test]
    fn untargeted_versions_may_reject_or_accept() {
        let harness = Harness::new(FakeGrammar::new(|version, _, _| match version.name() {
            "1.0" => Err(ParseError::Syntax("unexpected token".to_string())),
            "2.0" => Ok(Some(FakeNode::leaf("lvar"))),
            _ => Ok(Some(FakeNode::leaf("int"))),
        }));

        let targeted = [Version::new("3.0")];
        let case = Case::builder("_1").versions(&targeted).build();
        harness
            .assert_parses(Some(&FakeNode::leaf("int")), case)
            .unwrap();
        assert_eq!(
            harness.grammar().created(),
            [
                Version::new("3.0"),
                Version::new("3.0"),
                Version::new("1.0"),
                Version::new("2.0")
            ]
        );
    }

    #[test]
    fn untargeted_internal_failures_are_reraised() {
        let harness = Harness::new(FakeGrammar::new(|version, _, _| match version.name() {
            "1.0" => Err(ParseError::Internal(anyhow::anyhow!("stack overflow"))),
            _ => Ok(Some(FakeNode::leaf("int"))),
        }));

        let targeted = [Version::new("2.0"), Version::new("3.0")];
        let case = Case::builder("1").versions(&targeted).build();
        let err = harness
            .assert_parses(Some(&FakeNode::leaf("int")), case)
            .unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
        assert_eq!(err.to_string(), "(1.0) stack overflow");
    }

    #[test]
    fn dirty_state_fails_every_form() {
        let harness = Harness::new(FakeGrammar::new(|_, _, _| Ok(None)).with_state(|_| {
            let mut state = ParserState::default();
            state.static_env = 1;
            state
        }));

        let err = harness.assert_parses(None, "").unwrap_err();
        assert_eq!(
            err.to_string(),
            "(1.0) expected static_env to be empty after parsing, found 1 entries"
        );
        assert!(matches!(
            harness.refute_diagnoses(""),
            Err(Error::DirtyState { .. })
        ));
    }

    #[test]
    fn diagnoses_with_ranges() {
        let harness = Harness::new(FakeGrammar::new(|_, _, diagnostics| {
            diagnostics.emit(warning(4).with_highlight(Span::new(4, 4)));
            Ok(Some(FakeNode::leaf("send")))
        }));

        let case = Case::builder("foo *bar")
            .source_maps(
                "    ^ location
                |    ~~~~ highlights (0)",
            )
            .build();
        harness.assert_diagnoses(&ambiguous(), case).unwrap();

        let case = Case::builder("foo *bar")
            .source_maps("    ~~~ highlights")
            .build();
        let err = harness.assert_diagnoses(&ambiguous(), case).unwrap_err();
        assert!(err.to_string().contains("expected 4...7, found 4...8"), "{err}");

        let case = Case::builder("foo *bar")
            .source_maps("    ~ highlights (1)")
            .build();
        let err = harness.assert_diagnoses(&ambiguous(), case).unwrap_err();
        assert!(err.to_string().contains("no highlight #1"), "{err}");
    }

    #[test]
    fn unknown_diagnostic_fields_are_fixture_errors() {
        let harness = Harness::new(FakeGrammar::new(|_, _, diagnostics| {
            diagnostics.emit(warning(4));
            Ok(None)
        }));

        let case = Case::builder("foo *bar").source_maps("    ^ operator").build();
        let err = harness.assert_diagnoses(&ambiguous(), case).unwrap_err();
        assert!(matches!(&err, Error::UnknownDiagnosticField(field) if field == "operator"));

        for source_maps in [
            "    ^ highlights (first)",
            "    ^ highlights (0/2)",
            "    ^ highlights (0.1)",
        ] {
            let case = Case::builder("foo *bar").source_maps(source_maps).build();
            let err = harness.assert_diagnoses(&ambiguous(), case).unwrap_err();
            assert!(
                matches!(&err, Error::MalformedAnnotation { line } if line == source_maps),
                "{err}"
            );
        }
    }

    #[test]
    fn diagnoses_through_syntax_errors() {
        let harness = Harness::new(FakeGrammar::new(|_, _, diagnostics| {
            diagnostics.emit(warning(4));
            Err(ParseError::Syntax("unexpected end of input".to_string()))
        }));

        harness.assert_diagnoses(&ambiguous(), "foo *").unwrap();
    }

    #[test]
    fn diagnostic_fields_are_compared_individually() {
        let harness = Harness::new(FakeGrammar::new(|_, _, diagnostics| {
            diagnostics.emit(warning(4));
            Ok(None)
        }));

        let expected = ExpectedDiagnostic::new(Level::Error, "ambiguous_prefix")
            .with_argument("prefix", "*");
        let err = harness.assert_diagnoses(&expected, "foo *bar").unwrap_err();
        assert_eq!(
            err.to_string(),
            "(1.0) level of diagnostic #0 does not match: expected Error, found Warning"
        );

        let expected = ambiguous().with_argument("prefix", "&");
        let err = harness.assert_diagnoses(&expected, "foo *bar").unwrap_err();
        assert!(err.to_string().contains("arguments of diagnostic #0"), "{err}");

        let expected = ExpectedDiagnostic::new(Level::Warning, "ambiguous_prefix");
        let err = harness.assert_diagnoses(&expected, "foo *bar").unwrap_err();
        assert!(err.to_string().contains("arguments"), "{err}");
    }

    #[test]
    fn messages_are_recomputed() {
        let harness = Harness::new(FakeGrammar::new(|_, _, diagnostics| {
            diagnostics.emit(
                Diagnostic::new(Level::Warning, "ambiguous_prefix", "wrong", Span::new(4, 1))
                    .with_arguments(ambiguous().arguments),
            );
            Ok(None)
        }));

        let err = harness.assert_diagnoses(&ambiguous(), "foo *bar").unwrap_err();
        assert!(err.to_string().contains("message of diagnostic #0"), "{err}");

        let harness = Harness::new(FakeGrammar::new(|_, _, diagnostics| {
            diagnostics.emit(Diagnostic::new(
                Level::Error,
                "mystery",
                "?",
                Span::new(0, 1),
            ));
            Ok(None)
        }));
        let err = harness
            .assert_diagnoses(&ExpectedDiagnostic::new(Level::Error, "mystery"), "?")
            .unwrap_err();
        assert!(matches!(&err, Error::UnknownReason(reason) if reason == "mystery"));
        assert!(err.is_fixture_error());
    }

    #[test]
    fn diagnoses_many_in_order() {
        let harness = Harness::new(FakeGrammar::new(|_, _, diagnostics| {
            diagnostics.emit(warning(4));
            diagnostics.emit(warning(9));
            Ok(None)
        }));

        harness
            .assert_diagnoses_many(&[ambiguous(), ambiguous()], "foo *bar, *baz")
            .unwrap();

        let err = harness
            .assert_diagnoses_many(&[ambiguous()], "foo *bar, *baz")
            .unwrap_err();
        assert!(
            err.to_string()
                .starts_with("(1.0) expected 1 diagnostic(s) for `foo *bar, *baz`, found 2"),
            "{err}"
        );

        let case = Case::builder("foo *bar, *baz")
            .source_maps("    ^ location")
            .build();
        let err = harness
            .assert_diagnoses_many(&[ambiguous(), ambiguous()], case)
            .unwrap_err();
        assert!(matches!(err, Error::Fixture(_)));
    }

    #[test]
    fn refutes_diagnostics() {
        let harness = Harness::new(FakeGrammar::new(|version, _, diagnostics| {
            if version.name() == "3.0" {
                diagnostics.emit(warning(4));
            }
            Ok(None)
        }));

        let early = [Version::new("1.0"), Version::new("2.0")];
        harness
            .refute_diagnoses(Case::builder("foo *bar").versions(&early).build())
            .unwrap();

        let err = harness.refute_diagnoses("foo *bar").unwrap_err();
        assert!(err.to_string().starts_with("(3.0) expected 0 diagnostic(s)"), "{err}");
    }

    #[test]
    fn compares_context_flags_as_sets() {
        let harness = Harness::new(FakeGrammar::new(|_, _, _| {
            let probe = FakeNode::leaf("send").with_context(ContextFlags::from(
                &[ContextFlag::InDef, ContextFlag::InBlock][..],
            ));
            let block = FakeNode::new("block", vec![probe]);
            Ok(Some(FakeNode::new("def", vec![block])))
        }));

        harness
            .assert_context(
                &[ContextFlag::InBlock, ContextFlag::InDef],
                "def m; tap { get_context }; end",
            )
            .unwrap();

        let err = harness
            .assert_context(&[ContextFlag::InDef], "def m; tap { get_context }; end")
            .unwrap_err();
        assert!(
            err.to_string()
                .starts_with("(1.0) context flags do not match"),
            "{err}"
        );
    }

    #[test]
    fn context_requires_a_single_probe() {
        let harness = Harness::new(FakeGrammar::new(|_, _, _| Ok(Some(FakeNode::leaf("int")))));
        let err = harness.assert_context(&[], "1").unwrap_err();
        assert!(matches!(err, Error::Fixture(_)));
    }

    #[test]
    #[traced_test]
    fn logs_accepted_rejections() {
        let harness = Harness::new(FakeGrammar::new(|version, _, _| match version.name() {
            "3.0" => Ok(Some(FakeNode::leaf("int"))),
            _ => Err(ParseError::Syntax("unexpected token".to_string())),
        }));

        let targeted = [Version::new("3.0")];
        harness
            .assert_parses(
                Some(&FakeNode::leaf("int")),
                Case::builder("1").versions(&targeted).build(),
            )
            .unwrap();
        assert!(logs_contain("asserting parse"));
        assert!(logs_contain("untargeted version rejected the snippet"));
    }
}
