//! A scripted parser family used by the harness's own tests.

use std::cell::RefCell;
use std::rc::Rc;
use std::str::FromStr;

use indexmap::IndexMap;

use crate::ContextFlags;
use crate::Diagnostic;
use crate::Diagnostics;
use crate::Encoding;
use crate::Grammar;
use crate::Level;
use crate::ParseError;
use crate::Parser;
use crate::ParserState;
use crate::SourceMap;
use crate::Span;
use crate::Tree;
use crate::Version;
use crate::diagnostic::Arguments;

/// The versions of the fake family.
static VERSIONS: [Version; 3] = [Version::new("1.0"), Version::new("2.0"), Version::new("3.0")];

/// A node of the fake family.
#[derive(Debug, Clone)]
pub(crate) struct FakeNode {
    /// The node type.
    pub(crate) kind: String,
    /// The child nodes.
    pub(crate) children: Vec<FakeNode>,
    /// The location of the node.
    pub(crate) map: Option<FakeMap>,
    /// The recorded context flags.
    pub(crate) context: Option<ContextFlags>,
}

impl FakeNode {
    /// Creates a node with children and no location.
    pub(crate) fn new(kind: &str, children: Vec<FakeNode>) -> Self {
        Self {
            kind: kind.to_string(),
            children,
            map: None,
            context: None,
        }
    }

    /// Creates a node without children.
    pub(crate) fn leaf(kind: &str) -> Self {
        Self::new(kind, Vec::new())
    }

    /// Sets a location field of the node.
    pub(crate) fn with_field(mut self, name: &'static str, span: Option<Span>) -> Self {
        self.map
            .get_or_insert_with(FakeMap::default)
            .fields
            .insert(name, span);
        self
    }

    /// Records context flags on the node.
    pub(crate) fn with_context(mut self, context: ContextFlags) -> Self {
        self.context = Some(context);
        self
    }
}

impl FromStr for FakeNode {
    type Err = String;

    /// Reads a childless node from its bare type.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !s.is_empty() && s.chars().all(|c| c.is_ascii_lowercase() || c == '_') {
            Ok(Self::leaf(s))
        } else {
            Err(format!("`{s}` is not a node type"))
        }
    }
}

impl PartialEq for FakeNode {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.children == other.children
    }
}

impl Tree for FakeNode {
    type Map = FakeMap;

    fn kind(&self) -> &str {
        &self.kind
    }

    fn children(&self) -> impl Iterator<Item = &Self> {
        self.children.iter()
    }

    fn location(&self) -> Option<&Self::Map> {
        self.map.as_ref()
    }

    fn context(&self) -> Option<&ContextFlags> {
        self.context.as_ref()
    }
}

/// The location of a fake node.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeMap {
    /// The location fields.
    pub(crate) fields: IndexMap<&'static str, Option<Span>>,
    /// Whether the map reports itself as mutable.
    pub(crate) thawed: bool,
}

impl SourceMap for FakeMap {
    fn field(&self, name: &str) -> Option<Option<Span>> {
        self.fields.get(name).copied()
    }

    fn is_frozen(&self) -> bool {
        !self.thawed
    }
}

/// The inputs of one scripted parse.
pub(crate) struct Invocation<'a> {
    /// The version of the parser.
    pub(crate) version: &'a Version,
    /// The source being parsed.
    pub(crate) source: &'a str,
    /// The encoding of the parser.
    pub(crate) encoding: Encoding,
    /// The accumulator the parser emits into.
    pub(crate) diagnostics: &'a Diagnostics,
}

/// The script that decides the outcome of a parse.
type Script = dyn Fn(&Invocation<'_>) -> Result<Option<FakeNode>, ParseError>;

/// The script that decides the bookkeeping left after a parse.
type StateScript = dyn Fn(&Version) -> ParserState;

/// A parser family whose parse results are scripted.
pub(crate) struct FakeGrammar {
    /// The script deciding parse results.
    script: Rc<Script>,
    /// The script deciding the post-parse state.
    state: Rc<StateScript>,
    /// The versions parsers were created for, in order.
    created: RefCell<Vec<Version>>,
}

impl std::fmt::Debug for FakeGrammar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeGrammar")
            .field("created", &self.created)
            .finish_non_exhaustive()
    }
}

impl FakeGrammar {
    /// Creates a family from a script ignoring the encoding.
    pub(crate) fn new(
        script: impl Fn(&Version, &str, &Diagnostics) -> Result<Option<FakeNode>, ParseError>
        + 'static,
    ) -> Self {
        Self::scripted(move |invocation| {
            script(
                invocation.version,
                invocation.source,
                invocation.diagnostics,
            )
        })
    }

    /// Creates a family from a script of whole invocations.
    pub(crate) fn scripted(
        script: impl Fn(&Invocation<'_>) -> Result<Option<FakeNode>, ParseError> + 'static,
    ) -> Self {
        Self {
            script: Rc::new(script),
            state: Rc::new(|_| ParserState::default()),
            created: RefCell::default(),
        }
    }

    /// Sets the bookkeeping parsers report after parsing.
    pub(crate) fn with_state(mut self, state: impl Fn(&Version) -> ParserState + 'static) -> Self {
        self.state = Rc::new(state);
        self
    }

    /// Gets the versions parsers were created for, in order.
    pub(crate) fn created(&self) -> Vec<Version> {
        self.created.borrow().clone()
    }
}

impl Grammar for FakeGrammar {
    type Parser = FakeParser;

    fn versions(&self) -> &[Version] {
        &VERSIONS
    }

    fn create(&self, version: &Version, diagnostics: Diagnostics) -> Option<Self::Parser> {
        self.created.borrow_mut().push(version.clone());
        Some(FakeParser {
            version: version.clone(),
            encoding: Encoding::default(),
            diagnostics,
            script: self.script.clone(),
            state: self.state.clone(),
        })
    }

    fn compile(&self, reason: &str, arguments: &Arguments) -> Option<String> {
        match reason {
            "ambiguous_prefix" => Some(format!(
                "`{prefix}' interpreted as argument prefix",
                prefix = arguments.get("prefix")?
            )),
            "unexpected_token" => Some(format!(
                "unexpected token {token}",
                token = arguments.get("token")?
            )),
            _ => None,
        }
    }
}

/// A parser of the fake family.
pub(crate) struct FakeParser {
    /// The version of the parser.
    version: Version,
    /// The current encoding.
    encoding: Encoding,
    /// The accumulator to emit into.
    diagnostics: Diagnostics,
    /// The script deciding parse results.
    script: Rc<Script>,
    /// The script deciding the post-parse state.
    state: Rc<StateScript>,
}

impl Parser for FakeParser {
    type Node = FakeNode;

    fn parse(&mut self, source: &str) -> Result<Option<FakeNode>, ParseError> {
        (self.script)(&Invocation {
            version: &self.version,
            source,
            encoding: self.encoding,
            diagnostics: &self.diagnostics,
        })
    }

    fn set_encoding(&mut self, encoding: Encoding) {
        self.encoding = encoding;
    }

    fn state(&self) -> ParserState {
        (self.state)(&self.version)
    }
}

/// Creates an `ambiguous_prefix` warning for a `*` at the given offset.
pub(crate) fn warning(offset: usize) -> Diagnostic {
    let mut arguments = Arguments::new();
    arguments.insert("prefix".to_string(), "*".to_string());
    Diagnostic::new(
        Level::Warning,
        "ambiguous_prefix",
        "`*' interpreted as argument prefix",
        Span::new(offset, 1),
    )
    .with_arguments(arguments)
}
