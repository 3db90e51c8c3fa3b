//! The abstract syntax tree of the sample dialects.
//!
//! Trees are written as s-expressions, one parenthesized list per node:
//!
//! ```text
//! (send (int 10) :+ (int 20))
//! (block (send nil :foo) (args (arg :x)) (lvar :x))
//! ```
//!
//! Literal children are integers, double quoted strings, symbols (`:name`)
//! and `nil` for an absent child.

use std::fmt;
use std::str::FromStr;

use verity::ContextFlags;
use verity::SourceMap;
use verity::Span;
use verity::Tree;

/// Represents the type of a node.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum Kind {
    /// An integer literal.
    Int,
    /// A string literal.
    Str,
    /// A symbol literal.
    Sym,
    /// The `nil` literal.
    Nil,
    /// The `true` literal.
    True,
    /// The `false` literal.
    False,
    /// The `self` keyword.
    #[strum(serialize = "self")]
    SelfValue,
    /// A constant reference.
    Const,
    /// A local variable reference.
    Lvar,
    /// A local variable assignment.
    Lvasgn,
    /// A method call, including binary and unary operators.
    Send,
    /// A short-circuiting `&&`.
    And,
    /// A short-circuiting `||`.
    Or,
    /// A statement sequence or a parenthesized expression.
    Begin,
    /// A call with a block, or a lambda literal.
    Block,
    /// A call with a block using numbered parameters.
    Numblock,
    /// A parameter list.
    Args,
    /// An ordinary parameter.
    Arg,
    /// The `->` of a lambda literal.
    Lambda,
    /// A splat argument.
    Splat,
    /// A block-pass argument.
    BlockPass,
    /// A method definition.
    Def,
    /// A class definition.
    Class,
    /// A `while` loop.
    While,
    /// A `defined?` expression.
    #[strum(serialize = "defined?")]
    Defined,
    /// A `case ... in` expression.
    CaseMatch,
    /// An `in` clause.
    InPattern,
    /// A variable binding pattern.
    MatchVar,
    /// A `{key: pattern}` pattern.
    HashPattern,
    /// A `key: pattern` pair.
    Pair,
}

/// Represents a child of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Child {
    /// A child node.
    Node(Node),
    /// An integer.
    Int(i64),
    /// An integer outside the range of `i64`, as its decimal text.
    BigInt(String),
    /// A string.
    Str(String),
    /// A symbol name, without the leading colon.
    Sym(String),
    /// An absent child.
    Nil,
}

impl Child {
    /// Creates an integer child from its decimal text.
    ///
    /// Returns `None` if the text is not an optionally negated run of
    /// digits.
    pub fn integer(text: &str) -> Option<Self> {
        let digits = text.strip_prefix('-').unwrap_or(text);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        Some(
            text.parse()
                .map(Self::Int)
                .unwrap_or_else(|_| Self::BigInt(text.to_string())),
        )
    }
}

impl From<Node> for Child {
    fn from(node: Node) -> Self {
        Self::Node(node)
    }
}

impl From<Option<Node>> for Child {
    fn from(node: Option<Node>) -> Self {
        node.map(Self::Node).unwrap_or(Self::Nil)
    }
}

impl fmt::Display for Child {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node(node) => fmt::Display::fmt(node, f),
            Self::Int(value) => write!(f, "{value}"),
            Self::BigInt(text) => write!(f, "{text}"),
            Self::Str(value) => write!(f, "{value:?}"),
            Self::Sym(name) => write!(f, ":{name}"),
            Self::Nil => write!(f, "nil"),
        }
    }
}

/// Represents the location of a node: a set of named, possibly absent,
/// ranges.
///
/// Every map has an `expression` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Map {
    /// The fields in declaration order.
    fields: Vec<(&'static str, Option<Span>)>,
}

impl Map {
    /// Creates a map whose expression covers the given span.
    pub fn new(expression: Span) -> Self {
        Self {
            fields: vec![("expression", Some(expression))],
        }
    }

    /// Creates a map without an expression range.
    pub fn empty() -> Self {
        Self {
            fields: vec![("expression", None)],
        }
    }

    /// Adds a field to the map.
    pub fn with(mut self, name: &'static str, span: Option<Span>) -> Self {
        self.fields.push((name, span));
        self
    }

    /// Gets the expression range.
    pub fn expression(&self) -> Option<Span> {
        self.fields[0].1
    }
}

impl SourceMap for Map {
    fn field(&self, name: &str) -> Option<Option<Span>> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, span)| *span)
    }
}

/// Represents a node of the tree.
#[derive(Clone)]
pub struct Node {
    /// The type of the node.
    kind: Kind,
    /// The children of the node.
    children: Vec<Child>,
    /// The location of the node.
    location: Option<Map>,
    /// The context flags recorded at a context probe.
    context: Option<ContextFlags>,
}

impl Node {
    /// Creates a node without a location.
    pub fn new(kind: Kind, children: Vec<Child>) -> Self {
        Self {
            kind,
            children,
            location: None,
            context: None,
        }
    }

    /// Sets the location of the node.
    pub fn at(mut self, location: Map) -> Self {
        self.location = Some(location);
        self
    }

    /// Records context flags on the node.
    pub fn with_context(mut self, context: ContextFlags) -> Self {
        self.context = Some(context);
        self
    }

    /// Gets the type of the node.
    pub fn node_kind(&self) -> Kind {
        self.kind
    }

    /// Gets all children of the node, literals included.
    pub fn all_children(&self) -> &[Child] {
        &self.children
    }

    /// Gets the expression range of the node.
    pub fn expression(&self) -> Option<Span> {
        self.location.as_ref().and_then(Map::expression)
    }

    /// Writes the node, optionally breaking child nodes onto indented lines.
    fn write(&self, f: &mut fmt::Formatter<'_>, indent: Option<usize>) -> fmt::Result {
        write!(f, "({kind}", kind = self.kind)?;
        for child in &self.children {
            match (child, indent) {
                (Child::Node(node), Some(depth)) => {
                    write!(f, "\n{pad:width$}", pad = "", width = (depth + 1) * 2)?;
                    node.write(f, Some(depth + 1))?;
                }
                (Child::Node(node), None) => {
                    f.write_str(" ")?;
                    node.write(f, None)?;
                }
                (child, _) => write!(f, " {child}")?,
            }
        }

        f.write_str(")")
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.children == other.children
    }
}

impl Eq for Node {}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write(f, None)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write(f, f.alternate().then_some(0))
    }
}

impl Tree for Node {
    type Map = Map;

    fn kind(&self) -> &str {
        self.kind.into()
    }

    fn children(&self) -> impl Iterator<Item = &Self> {
        self.children.iter().filter_map(|child| match child {
            Child::Node(node) => Some(node),
            _ => None,
        })
    }

    fn location(&self) -> Option<&Map> {
        self.location.as_ref()
    }

    fn context(&self) -> Option<&ContextFlags> {
        self.context.as_ref()
    }
}

/// Represents an error reading an s-expression.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} at offset {offset}")]
pub struct ReadError {
    /// What went wrong.
    message: String,
    /// The byte offset the error was found at.
    offset: usize,
}

/// Reads s-expressions.
struct Reader<'a> {
    /// The text being read.
    text: &'a str,
    /// The current byte offset.
    offset: usize,
}

impl<'a> Reader<'a> {
    /// Creates an error at the current offset.
    fn error(&self, message: impl Into<String>) -> ReadError {
        ReadError {
            message: message.into(),
            offset: self.offset,
        }
    }

    /// Gets the unread text.
    fn rest(&self) -> &'a str {
        let text = self.text;
        &text[self.offset..]
    }

    /// Skips whitespace.
    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        let skipped = rest.len() - rest.trim_start().len();
        self.offset += skipped;
    }

    /// Reads a node.
    fn node(&mut self) -> Result<Node, ReadError> {
        self.skip_whitespace();
        if !self.rest().starts_with('(') {
            return Err(self.error("expected `(`"));
        }

        self.offset += 1;
        let kind = self.atom();
        let kind = kind
            .parse::<Kind>()
            .map_err(|_| self.error(format!("unknown node type `{kind}`")))?;

        let mut children = Vec::new();
        loop {
            self.skip_whitespace();
            match self.rest().chars().next() {
                Some(')') => {
                    self.offset += 1;
                    return Ok(Node::new(kind, children));
                }
                Some('(') => children.push(Child::Node(self.node()?)),
                Some('"') => children.push(Child::Str(self.string()?)),
                Some(':') => {
                    self.offset += 1;
                    let name = self.atom();
                    if name.is_empty() {
                        return Err(self.error("expected a symbol name"));
                    }
                    children.push(Child::Sym(name.to_string()));
                }
                Some(_) => {
                    let atom = self.atom();
                    let child = match atom {
                        "nil" => Child::Nil,
                        _ => Child::integer(atom)
                            .ok_or_else(|| self.error(format!("unexpected `{atom}`")))?,
                    };
                    children.push(child);
                }
                None => return Err(self.error("expected `)`")),
            }
        }
    }

    /// Reads an unquoted atom.
    fn atom(&mut self) -> &'a str {
        let rest = self.rest();
        let len = rest
            .find(|c: char| c.is_whitespace() || c == '(' || c == ')')
            .unwrap_or(rest.len());
        self.offset += len;
        &rest[..len]
    }

    /// Reads a double quoted string.
    fn string(&mut self) -> Result<String, ReadError> {
        let mut value = String::new();
        let mut chars = self.rest().char_indices().skip(1);
        while let Some((index, c)) = chars.next() {
            match c {
                '"' => {
                    self.offset += index + 1;
                    return Ok(value);
                }
                '\\' => match chars.next() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, 't')) => value.push('\t'),
                    Some((_, c)) => value.push(c),
                    None => break,
                },
                c => value.push(c),
            }
        }

        Err(self.error("unterminated string"))
    }
}

impl FromStr for Node {
    type Err = ReadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut reader = Reader { text: s, offset: 0 };
        let node = reader.node()?;
        reader.skip_whitespace();
        if !reader.rest().is_empty() {
            return Err(reader.error("trailing input"));
        }

        Ok(node)
    }
}
