//! The parser of the sample dialects.
//!
//! A hand-written recursive descent parser. Every construct that opens a
//! nested scope pushes onto the parser's (or the lexer's) bookkeeping and
//! pops it again when the construct closes, so that a successful parse
//! always leaves the bookkeeping in its initial state.

use std::collections::HashSet;

use tracing::trace;
use verity::Arguments;
use verity::ContextFlag;
use verity::ContextFlags;
use verity::Diagnostics;
use verity::Encoding;
use verity::ParseError;
use verity::ParserState;
use verity::Span;
use verity::Version;

use crate::ast::Child;
use crate::ast::Kind;
use crate::ast::Map;
use crate::ast::Node;
use crate::lexer::LexError;
use crate::lexer::Lexer;
use crate::lexer::Token;
use crate::lexer::TokenKind;
use crate::messages::Reason;
use crate::messages::arguments;
use crate::messages::diagnostic;
use crate::version::Features;

/// The name of the method that records the parse context at its call-site.
pub const CONTEXT_PROBE: &str = "get_context";

/// The result type of parsing operations.
type Result<T> = std::result::Result<T, ParseError>;

/// Represents a local variable scope.
#[derive(Debug, Default)]
struct Scope {
    /// The variables declared in the scope.
    variables: HashSet<String>,
    /// Whether variables of the enclosing scope are visible.
    inherits: bool,
}

/// Represents the numbered parameter usage of a scope.
#[derive(Debug, Clone, Copy)]
enum NumberedParams {
    /// A method or class body; numbered parameters are unavailable.
    Closed,
    /// A block or lambda body.
    Block {
        /// The highest numbered parameter used so far.
        max: u8,
        /// Whether the block declares ordinary parameters.
        ordinary: bool,
    },
}

/// Gets the expression range of a parsed node.
fn expr(node: &Node) -> Span {
    node.expression().unwrap_or(Span::new(0, 0))
}

/// Gets the number of a numbered parameter name (`_1`..`_9`).
fn numbered_param(name: &str) -> Option<u8> {
    let digit = name.strip_prefix('_')?;
    match digit.as_bytes() {
        [d @ b'1'..=b'9'] => Some(d - b'0'),
        _ => None,
    }
}

/// Converts the text of an integer literal.
fn integer(text: &str) -> Result<Child> {
    Child::integer(text)
        .ok_or_else(|| anyhow::anyhow!("invalid integer literal `{text}`").into())
}

/// Decodes the body of a string literal.
fn unescape(text: &str) -> String {
    let body = &text[1..text.len() - 1];
    let mut value = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            value.push(c);
            continue;
        }

        match chars.next() {
            Some('n') => value.push('\n'),
            Some('t') => value.push('\t'),
            Some('\n') | None => {}
            Some(c) => value.push(c),
        }
    }

    value
}

/// Implements a parser of one sample dialect version.
#[derive(Debug)]
pub struct Parser {
    /// The version being parsed.
    version: Version,
    /// The syntax features of the version.
    features: Features,
    /// The accumulator diagnostics are emitted into.
    diagnostics: Diagnostics,
    /// The lexer and its bookkeeping.
    lexer: Lexer,
    /// The current parse context.
    context: ContextFlags,
    /// The local variable scopes.
    static_env: Vec<Scope>,
    /// The numbered parameter usage of each open scope.
    max_numparam_stack: Vec<NumberedParams>,
    /// The parameter currently being declared in each open parameter list.
    current_arg_stack: Vec<Option<String>>,
    /// The variables bound by each open pattern.
    pattern_variables: Vec<HashSet<String>>,
    /// The keys of each open hash pattern.
    pattern_hash_keys: Vec<HashSet<String>>,
}

impl Parser {
    /// Creates a new parser for a version.
    pub fn new(version: Version, features: Features, diagnostics: Diagnostics) -> Self {
        Self {
            version,
            features,
            diagnostics,
            lexer: Lexer::new(),
            context: ContextFlags::new(),
            static_env: Vec::new(),
            max_numparam_stack: Vec::new(),
            current_arg_stack: Vec::new(),
            pattern_variables: Vec::new(),
            pattern_hash_keys: Vec::new(),
        }
    }

    /// Gets the version being parsed.
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Resets the bookkeeping before a parse.
    fn reset(&mut self) {
        self.lexer.reset();
        self.context = ContextFlags::new();
        self.static_env.clear();
        self.max_numparam_stack.clear();
        self.current_arg_stack.clear();
        self.pattern_variables.clear();
        self.pattern_hash_keys.clear();
    }

    /// Emits an error diagnostic and creates the syntax error that aborts the
    /// parse.
    fn error(&self, reason: Reason, arguments: Arguments, span: Span) -> ParseError {
        let diagnostic = diagnostic(reason, arguments, span);
        let message = diagnostic.message().to_string();
        self.diagnostics.emit(diagnostic);
        ParseError::Syntax(message)
    }

    /// Converts a lexical error.
    fn lex_error(&self, error: LexError) -> ParseError {
        match error {
            LexError::UnexpectedChar { character, span } => self.error(
                Reason::UnexpectedChar,
                arguments([("character", character.to_string())]),
                span,
            ),
            LexError::UnterminatedString { span } => {
                self.error(Reason::UnterminatedString, Arguments::new(), span)
            }
        }
    }

    /// Determines if a name is a visible local variable.
    fn is_local(&self, name: &str) -> bool {
        for scope in self.static_env.iter().rev() {
            if scope.variables.contains(name) {
                return true;
            }

            if !scope.inherits {
                break;
            }
        }

        false
    }

    /// Declares a local variable in the innermost scope.
    fn declare(&mut self, name: &str) {
        if let Some(scope) = self.static_env.last_mut() {
            scope.variables.insert(name.to_string());
        }
    }
}

impl verity::Parser for Parser {
    type Node = Node;

    fn parse(&mut self, source: &str) -> Result<Option<Node>> {
        self.reset();
        trace!(version = %self.version, "parsing snippet");

        let tokens = self
            .lexer
            .tokenize(source)
            .map_err(|e| self.lex_error(e))?;

        let end = Span::new(source.chars().count(), 0);
        Session {
            parser: self,
            tokens,
            position: 0,
            end,
        }
        .program()
    }

    fn set_encoding(&mut self, encoding: Encoding) {
        self.lexer.set_encoding(encoding);
    }

    fn state(&self) -> ParserState {
        ParserState {
            lexer: self.lexer.state(),
            context: self.context,
            static_env: self.static_env.len(),
            max_numparam_stack: self.max_numparam_stack.len(),
            current_arg_stack: self.current_arg_stack.len(),
            pattern_variables: self.pattern_variables.len(),
            pattern_hash_keys: self.pattern_hash_keys.len(),
        }
    }
}

/// Gets the binding power of a binary operator.
fn precedence(kind: TokenKind) -> Option<u8> {
    match kind {
        TokenKind::OrOr => Some(1),
        TokenKind::AndAnd => Some(2),
        TokenKind::Equal | TokenKind::NotEqual => Some(3),
        TokenKind::Less | TokenKind::Greater | TokenKind::LessEqual | TokenKind::GreaterEqual => {
            Some(4)
        }
        TokenKind::Plus | TokenKind::Minus => Some(5),
        TokenKind::Star | TokenKind::Slash | TokenKind::Percent => Some(6),
        _ => None,
    }
}

/// A single parse of a token stream.
struct Session<'p, 'a> {
    /// The parser whose bookkeeping is used.
    parser: &'p mut Parser,
    /// The tokens of the source.
    tokens: Vec<Token<'a>>,
    /// The index of the next token.
    position: usize,
    /// The empty span at the end of the source.
    end: Span,
}

impl<'a> Session<'_, 'a> {
    /// Gets the next token.
    fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.position).copied()
    }

    /// Gets the token after the next one.
    fn peek_second(&self) -> Option<Token<'a>> {
        self.tokens.get(self.position + 1).copied()
    }

    /// Gets the kind of the next token.
    fn kind(&self) -> Option<TokenKind> {
        self.peek().map(|token| token.kind)
    }

    /// Determines if the next token is of the given kind.
    fn at(&self, kind: TokenKind) -> bool {
        self.kind() == Some(kind)
    }

    /// Determines if the next token is of the given kind and directly
    /// follows the previous token.
    fn at_adjacent(&self, kind: TokenKind) -> bool {
        self.peek()
            .is_some_and(|token| token.kind == kind && !token.spaced)
    }

    /// Consumes the next token.
    fn bump(&mut self) -> Result<Token<'a>> {
        let token = self.peek().ok_or_else(|| self.unexpected())?;
        self.position += 1;
        Ok(token)
    }

    /// Consumes the next token if it is of the given kind.
    fn eat(&mut self, kind: TokenKind) -> Option<Token<'a>> {
        let token = self.peek().filter(|token| token.kind == kind)?;
        self.position += 1;
        Some(token)
    }

    /// Consumes the next token, which must be of the given kind.
    fn expect(&mut self, kind: TokenKind) -> Result<Token<'a>> {
        self.eat(kind).ok_or_else(|| self.unexpected())
    }

    /// Reports the next token as unexpected.
    fn unexpected(&self) -> ParseError {
        let (token, span) = match self.peek() {
            Some(token) => (token.kind.describe(), token.span),
            None => ("$end", self.end),
        };

        self.parser.error(
            Reason::UnexpectedToken,
            arguments([("token", token.to_string())]),
            span,
        )
    }

    /// Skips line breaks.
    fn skip_newlines(&mut self) {
        while self.eat(TokenKind::Newline).is_some() {}
    }

    /// Skips line breaks and semicolons.
    fn skip_terminators(&mut self) {
        while matches!(
            self.kind(),
            Some(TokenKind::Newline | TokenKind::Semicolon)
        ) {
            self.position += 1;
        }
    }

    /// Runs a parsing function with context flags changed, restoring them
    /// afterwards.
    fn within<T>(
        &mut self,
        flags: &[(ContextFlag, bool)],
        parse: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let saved = self.parser.context;
        for (flag, value) in flags {
            self.parser.context.set(*flag, *value);
        }

        let result = parse(self);
        self.parser.context = saved;
        result
    }

    /// Parses the whole source.
    fn program(mut self) -> Result<Option<Node>> {
        self.parser.static_env.push(Scope::default());
        let body = self.statements(&[])?;
        self.parser.static_env.pop();
        Ok(self.sequence(body))
    }

    /// Parses statements up to (but not including) a terminator.
    fn statements(&mut self, terminators: &[TokenKind]) -> Result<Vec<Node>> {
        let mut body = Vec::new();
        loop {
            self.skip_terminators();
            match self.kind() {
                None => break,
                Some(kind) if terminators.contains(&kind) => break,
                _ => {}
            }

            body.push(self.expression()?);
            match self.kind() {
                None | Some(TokenKind::Newline | TokenKind::Semicolon) => {}
                Some(kind) if terminators.contains(&kind) => break,
                _ => return Err(self.unexpected()),
            }
        }

        Ok(body)
    }

    /// Folds a statement list into a single node.
    fn sequence(&self, mut body: Vec<Node>) -> Option<Node> {
        match body.len() {
            0 => None,
            1 => body.pop(),
            _ => {
                let span = expr(&body[0]).join(expr(&body[body.len() - 1]));
                Some(
                    Node::new(Kind::Begin, body.into_iter().map(Child::Node).collect()).at(
                        Map::new(span).with("begin", None).with("end", None),
                    ),
                )
            }
        }
    }

    /// Parses an expression.
    fn expression(&mut self) -> Result<Node> {
        if self.at(TokenKind::Identifier)
            && self
                .peek_second()
                .is_some_and(|token| token.kind == TokenKind::Assign)
        {
            return self.assignment();
        }

        self.binary(0)
    }

    /// Parses a local variable assignment.
    fn assignment(&mut self) -> Result<Node> {
        let name = self.bump()?;
        let operator = self.bump()?;
        self.skip_newlines();
        self.parser.declare(name.text);

        let value = self.expression()?;
        let span = name.span.join(expr(&value));
        Ok(Node::new(
            Kind::Lvasgn,
            vec![Child::Sym(name.text.to_string()), value.into()],
        )
        .at(Map::new(span)
            .with("name", Some(name.span))
            .with("operator", Some(operator.span))))
    }

    /// Parses binary operators binding tighter than `min`.
    fn binary(&mut self, min: u8) -> Result<Node> {
        let mut left = self.unary()?;
        while let Some(operator) = self.peek()
            && let Some(power) = precedence(operator.kind)
            && power > min
        {
            self.position += 1;
            self.skip_newlines();
            let right = self.binary(power)?;
            let span = expr(&left).join(expr(&right));
            left = match operator.kind {
                TokenKind::OrOr | TokenKind::AndAnd => {
                    let kind = if operator.kind == TokenKind::OrOr {
                        Kind::Or
                    } else {
                        Kind::And
                    };
                    Node::new(kind, vec![left.into(), right.into()])
                        .at(Map::new(span).with("operator", Some(operator.span)))
                }
                _ => Node::new(
                    Kind::Send,
                    vec![
                        left.into(),
                        Child::Sym(operator.text.to_string()),
                        right.into(),
                    ],
                )
                .at(Map::new(span)
                    .with("dot", None)
                    .with("selector", Some(operator.span))
                    .with("operator", Some(operator.span))
                    .with("begin", None)
                    .with("end", None)),
            };
        }

        Ok(left)
    }

    /// Parses a prefix operator.
    fn unary(&mut self) -> Result<Node> {
        let Some(operator) = self.peek() else {
            return Err(self.unexpected());
        };

        let selector = match operator.kind {
            TokenKind::Minus => "-@",
            TokenKind::Bang => "!",
            _ => return self.postfix(),
        };

        self.position += 1;
        if operator.kind == TokenKind::Minus
            && let Some(literal) = self.peek()
            && literal.kind == TokenKind::Integer
            && !literal.spaced
        {
            self.position += 1;
            let value = integer(&format!("-{text}", text = literal.text))?;
            return Ok(Node::new(Kind::Int, vec![value]).at(
                Map::new(operator.span.join(literal.span)).with("operator", Some(operator.span)),
            ));
        }

        let operand = self.unary()?;
        let span = operator.span.join(expr(&operand));
        Ok(Node::new(
            Kind::Send,
            vec![operand.into(), Child::Sym(selector.to_string())],
        )
        .at(Map::new(span)
            .with("dot", None)
            .with("selector", Some(operator.span))
            .with("begin", None)
            .with("end", None)))
    }

    /// Parses method calls on a receiver.
    fn postfix(&mut self) -> Result<Node> {
        let mut node = self.primary()?;
        while let Some(dot) = self.eat(TokenKind::Dot) {
            let selector = self.expect(TokenKind::Identifier)?;
            node = self.call(Some(node), Some(dot), selector)?;
        }

        Ok(node)
    }

    /// Parses a primary expression.
    fn primary(&mut self) -> Result<Node> {
        let Some(token) = self.peek() else {
            return Err(self.unexpected());
        };

        let simple =
            |kind: Kind| -> Result<Node> { Ok(Node::new(kind, Vec::new()).at(Map::new(token.span))) };
        match token.kind {
            TokenKind::Integer => {
                self.position += 1;
                let value = integer(token.text)?;
                Ok(Node::new(Kind::Int, vec![value])
                    .at(Map::new(token.span).with("operator", None)))
            }
            TokenKind::String => {
                self.position += 1;
                Ok(
                    Node::new(Kind::Str, vec![Child::Str(unescape(token.text))]).at(Map::new(
                        token.span,
                    )
                    .with("begin", Some(Span::new(token.span.start(), 1)))
                    .with("end", Some(Span::new(token.span.end() - 1, 1)))),
                )
            }
            TokenKind::Symbol => {
                self.position += 1;
                Ok(
                    Node::new(Kind::Sym, vec![Child::Sym(token.text[1..].to_string())]).at(
                        Map::new(token.span).with("begin", Some(Span::new(token.span.start(), 1))),
                    ),
                )
            }
            TokenKind::Nil => {
                self.position += 1;
                simple(Kind::Nil)
            }
            TokenKind::True => {
                self.position += 1;
                simple(Kind::True)
            }
            TokenKind::False => {
                self.position += 1;
                simple(Kind::False)
            }
            TokenKind::SelfValue => {
                self.position += 1;
                simple(Kind::SelfValue)
            }
            TokenKind::Constant => {
                self.position += 1;
                Ok(self.constant(token))
            }
            TokenKind::Identifier => self.identifier(),
            TokenKind::LParen => self.parenthesized(),
            TokenKind::Arrow if self.parser.features.lambda => self.lambda(),
            TokenKind::Def => self.method(),
            TokenKind::Class => self.class(),
            TokenKind::While => self.while_loop(),
            TokenKind::Defined => self.defined(),
            TokenKind::Case => self.case_match(),
            _ => Err(self.unexpected()),
        }
    }

    /// Creates a constant reference.
    fn constant(&self, token: Token<'a>) -> Node {
        Node::new(
            Kind::Const,
            vec![Child::Nil, Child::Sym(token.text.to_string())],
        )
        .at(Map::new(token.span).with("name", Some(token.span)))
    }

    /// Parses an identifier: a local variable, a numbered parameter or a
    /// method call without a receiver.
    fn identifier(&mut self) -> Result<Node> {
        let token = self.bump()?;
        if self.at_adjacent(TokenKind::LParen) {
            return self.call(None, None, token);
        }

        if self.parser.features.numbered_params
            && let Some(number) = numbered_param(token.text)
            && !self.parser.is_local(token.text)
            && let Some(NumberedParams::Block { ordinary, .. }) =
                self.parser.max_numparam_stack.last().copied()
        {
            if ordinary {
                return Err(self.parser.error(
                    Reason::OrdinaryParamDefined,
                    Arguments::new(),
                    token.span,
                ));
            }

            if let Some(NumberedParams::Block { max, .. }) =
                self.parser.max_numparam_stack.last_mut()
            {
                *max = (*max).max(number);
            }

            return Ok(self.variable(token));
        }

        if self.parser.is_local(token.text) {
            return Ok(self.variable(token));
        }

        self.call(None, None, token)
    }

    /// Creates a local variable reference.
    fn variable(&self, token: Token<'a>) -> Node {
        Node::new(Kind::Lvar, vec![Child::Sym(token.text.to_string())])
            .at(Map::new(token.span).with("name", Some(token.span)))
    }

    /// Determines if the next token starts the arguments of a command call
    /// (a call without parentheses).
    fn starts_command_args(&self) -> bool {
        let Some(token) = self.peek() else {
            return false;
        };

        if !token.spaced {
            return false;
        }

        match token.kind {
            TokenKind::Integer
            | TokenKind::String
            | TokenKind::Symbol
            | TokenKind::Identifier
            | TokenKind::Constant
            | TokenKind::Nil
            | TokenKind::True
            | TokenKind::False
            | TokenKind::SelfValue
            | TokenKind::Defined
            | TokenKind::LParen => true,
            TokenKind::Arrow => self.parser.features.lambda,
            TokenKind::Star | TokenKind::Ampersand | TokenKind::Minus | TokenKind::Bang => self
                .peek_second()
                .is_some_and(|next| !next.spaced && next.kind != TokenKind::Newline),
            _ => false,
        }
    }

    /// Parses a method call after its selector.
    fn call(
        &mut self,
        receiver: Option<Node>,
        dot: Option<Token<'a>>,
        selector: Token<'a>,
    ) -> Result<Node> {
        let context = (selector.text == CONTEXT_PROBE).then_some(self.parser.context);
        let start = receiver.as_ref().map(expr).unwrap_or(selector.span);

        let mut last = selector.span;
        let mut begin = None;
        let mut end = None;
        let mut arguments = Vec::new();
        if self.at_adjacent(TokenKind::LParen) {
            let open = self.bump()?;
            self.parser.lexer.open_paren();
            self.skip_newlines();
            if !self.at(TokenKind::RParen) {
                arguments = self.arguments(false)?;
                self.skip_newlines();
            }

            let close = self.expect(TokenKind::RParen)?;
            self.parser.lexer.close_paren();
            begin = Some(open.span);
            end = Some(close.span);
            last = close.span;
        } else if self.starts_command_args() {
            self.parser.lexer.push_cmdarg(true);
            arguments = self.arguments(true)?;
            self.parser.lexer.pop_cmdarg();
            if let Some(argument) = arguments.last() {
                last = expr(argument);
            }
        }

        let mut children = vec![
            Child::from(receiver),
            Child::Sym(selector.text.to_string()),
        ];
        children.extend(arguments.into_iter().map(Child::Node));

        let mut node = Node::new(Kind::Send, children).at(Map::new(start.join(last))
            .with("dot", dot.map(|dot| dot.span))
            .with("selector", Some(selector.span))
            .with("begin", begin)
            .with("end", end));
        if let Some(context) = context {
            node = node.with_context(context);
        }

        self.block(node)
    }

    /// Parses a comma separated argument list.
    fn arguments(&mut self, command: bool) -> Result<Vec<Node>> {
        let mut arguments = Vec::new();
        loop {
            let first = arguments.is_empty();
            arguments.push(self.argument(command && first)?);
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }

            self.skip_newlines();
        }

        Ok(arguments)
    }

    /// Parses a single argument.
    ///
    /// A `*` or `&` prefix on the first argument of a command call is
    /// reported as ambiguous.
    fn argument(&mut self, first_of_command: bool) -> Result<Node> {
        let kind = match self.kind() {
            Some(TokenKind::Star) => Kind::Splat,
            Some(TokenKind::Ampersand) => Kind::BlockPass,
            _ => return self.expression(),
        };

        let operator = self.bump()?;
        let operand = self.binary(0)?;
        if first_of_command {
            self.parser.diagnostics.emit(
                diagnostic(
                    Reason::AmbiguousPrefix,
                    arguments([("prefix", operator.text.to_string())]),
                    operator.span,
                )
                .with_highlight(expr(&operand)),
            );
        }

        let span = operator.span.join(expr(&operand));
        Ok(Node::new(kind, vec![operand.into()])
            .at(Map::new(span).with("operator", Some(operator.span))))
    }

    /// Parses the block attached to a call, if any.
    fn block(&mut self, call: Node) -> Result<Node> {
        let close = match self.kind() {
            Some(TokenKind::LBrace) => TokenKind::RBrace,
            Some(TokenKind::Do)
                if !self.parser.lexer.is_cond() && !self.parser.lexer.is_cmdarg() =>
            {
                TokenKind::End
            }
            _ => return Ok(call),
        };

        let open = self.bump()?;
        self.parser.lexer.save_stacks();
        self.parser.static_env.push(Scope {
            variables: HashSet::new(),
            inherits: true,
        });

        let (parameters, ordinary) = self.block_parameters()?;
        self.parser.max_numparam_stack.push(NumberedParams::Block { max: 0, ordinary });

        let body = self.within(
            &[(ContextFlag::InBlock, true), (ContextFlag::InLambda, false)],
            |session| session.statements(&[close]),
        )?;
        let close = self.expect(close)?;

        let numbered = self.parser.max_numparam_stack.pop();
        self.parser.static_env.pop();
        self.parser.lexer.restore_stacks();

        let span = expr(&call).join(close.span);
        Ok(self.closure(call, parameters, numbered, body, span, open, close))
    }

    /// Creates a block node.
    #[allow(clippy::too_many_arguments)]
    fn closure(
        &self,
        target: Node,
        parameters: Node,
        numbered: Option<NumberedParams>,
        body: Vec<Node>,
        span: Span,
        open: Token<'a>,
        close: Token<'a>,
    ) -> Node {
        let body = Child::from(self.sequence(body));
        let (kind, parameters) = match numbered {
            Some(NumberedParams::Block { max, .. }) if max > 0 => {
                (Kind::Numblock, Child::Int(i64::from(max)))
            }
            _ => (Kind::Block, Child::Node(parameters)),
        };

        Node::new(kind, vec![target.into(), parameters, body]).at(Map::new(span)
            .with("begin", Some(open.span))
            .with("end", Some(close.span)))
    }

    /// Parses the `|...|` parameters of a block.
    ///
    /// Returns the parameter list and whether it declares any parameter.
    fn block_parameters(&mut self) -> Result<(Node, bool)> {
        if let Some(token) = self.eat(TokenKind::OrOr) {
            let start = token.span.start();
            let node = Node::new(Kind::Args, Vec::new()).at(Map::new(token.span)
                .with("begin", Some(Span::new(start, 1)))
                .with("end", Some(Span::new(start + 1, 1))));
            return Ok((node, false));
        }

        let Some(open) = self.eat(TokenKind::Pipe) else {
            return Ok((empty_parameters(), false));
        };

        let parameters = self.within(&[(ContextFlag::InArgdef, true)], |session| {
            session.parameters(TokenKind::Pipe)
        })?;
        let close = self.expect(TokenKind::Pipe)?;

        let ordinary = !parameters.is_empty();
        let node = Node::new(Kind::Args, parameters.into_iter().map(Child::Node).collect()).at(
            Map::new(open.span.join(close.span))
                .with("begin", Some(open.span))
                .with("end", Some(close.span)),
        );
        Ok((node, ordinary))
    }

    /// Parses `(...)` parameters, or none.
    fn parenthesized_parameters(&mut self) -> Result<(Node, bool)> {
        let Some(open) = self.eat(TokenKind::LParen) else {
            return Ok((empty_parameters(), false));
        };

        self.parser.lexer.open_paren();
        let parameters = self.within(&[(ContextFlag::InArgdef, true)], |session| {
            session.parameters(TokenKind::RParen)
        })?;
        let close = self.expect(TokenKind::RParen)?;
        self.parser.lexer.close_paren();

        let ordinary = !parameters.is_empty();
        let node = Node::new(Kind::Args, parameters.into_iter().map(Child::Node).collect()).at(
            Map::new(open.span.join(close.span))
                .with("begin", Some(open.span))
                .with("end", Some(close.span)),
        );
        Ok((node, ordinary))
    }

    /// Parses comma separated parameter names up to a closing token.
    fn parameters(&mut self, close: TokenKind) -> Result<Vec<Node>> {
        self.parser.current_arg_stack.push(None);

        let mut seen = HashSet::new();
        let mut parameters = Vec::new();
        while !self.at(close) {
            let name = self.expect(TokenKind::Identifier)?;
            if !name.text.starts_with('_') && !seen.insert(name.text) {
                return Err(self.parser.error(
                    Reason::DuplicateVariableName,
                    arguments([("name", name.text.to_string())]),
                    name.span,
                ));
            }

            if let Some(current) = self.parser.current_arg_stack.last_mut() {
                *current = Some(name.text.to_string());
            }

            self.parser.declare(name.text);
            parameters.push(
                Node::new(Kind::Arg, vec![Child::Sym(name.text.to_string())])
                    .at(Map::new(name.span).with("name", Some(name.span))),
            );

            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }

        self.parser.current_arg_stack.pop();
        Ok(parameters)
    }

    /// Parses a lambda literal.
    fn lambda(&mut self) -> Result<Node> {
        let arrow = self.bump()?;
        self.parser.lexer.push_lambda();
        self.parser.static_env.push(Scope {
            variables: HashSet::new(),
            inherits: true,
        });

        let (parameters, ordinary) = self.parenthesized_parameters()?;
        self.parser.max_numparam_stack.push(NumberedParams::Block { max: 0, ordinary });

        let close = match self.kind() {
            Some(TokenKind::LBrace) => TokenKind::RBrace,
            Some(TokenKind::Do) => TokenKind::End,
            _ => return Err(self.unexpected()),
        };
        let open = self.bump()?;
        self.parser.lexer.pop_lambda();

        self.parser.lexer.save_stacks();
        let body = self.within(
            &[(ContextFlag::InLambda, true), (ContextFlag::InBlock, false)],
            |session| session.statements(&[close]),
        )?;
        let close = self.expect(close)?;
        self.parser.lexer.restore_stacks();

        let numbered = self.parser.max_numparam_stack.pop();
        self.parser.static_env.pop();

        let lambda = Node::new(Kind::Lambda, Vec::new()).at(Map::new(arrow.span));
        let span = arrow.span.join(close.span);
        Ok(self.closure(lambda, parameters, numbered, body, span, open, close))
    }

    /// Opens the scope of a method or class body.
    fn open_body(&mut self) {
        self.parser.lexer.save_stacks();
        self.parser.static_env.push(Scope::default());
        self.parser.max_numparam_stack.push(NumberedParams::Closed);
    }

    /// Closes the scope of a method or class body.
    fn close_body(&mut self) {
        self.parser.max_numparam_stack.pop();
        self.parser.static_env.pop();
        self.parser.lexer.restore_stacks();
    }

    /// Parses a method definition.
    fn method(&mut self) -> Result<Node> {
        let keyword = self.bump()?;
        let name = self.expect(TokenKind::Identifier)?;

        self.open_body();
        let (parameters, _) = self.parenthesized_parameters()?;
        let body = self.within(
            &[
                (ContextFlag::InDef, true),
                (ContextFlag::InClass, false),
                (ContextFlag::InBlock, false),
                (ContextFlag::InLambda, false),
            ],
            |session| session.statements(&[TokenKind::End]),
        )?;
        let end = self.expect(TokenKind::End)?;
        self.close_body();

        let body = Child::from(self.sequence(body));
        Ok(Node::new(
            Kind::Def,
            vec![Child::Sym(name.text.to_string()), parameters.into(), body],
        )
        .at(Map::new(keyword.span.join(end.span))
            .with("keyword", Some(keyword.span))
            .with("name", Some(name.span))
            .with("end", Some(end.span))))
    }

    /// Parses a class definition.
    fn class(&mut self) -> Result<Node> {
        let keyword = self.bump()?;
        if self.parser.context.get(ContextFlag::InDef) {
            return Err(self
                .parser
                .error(Reason::ClassInDef, Arguments::new(), keyword.span));
        }

        let name = self.expect(TokenKind::Constant)?;
        let constant = self.constant(name);

        self.open_body();
        let body = self.within(
            &[
                (ContextFlag::InClass, true),
                (ContextFlag::InDef, false),
                (ContextFlag::InBlock, false),
                (ContextFlag::InLambda, false),
            ],
            |session| session.statements(&[TokenKind::End]),
        )?;
        let end = self.expect(TokenKind::End)?;
        self.close_body();

        let body = Child::from(self.sequence(body));
        Ok(
            Node::new(Kind::Class, vec![constant.into(), Child::Nil, body]).at(Map::new(
                keyword.span.join(end.span),
            )
            .with("keyword", Some(keyword.span))
            .with("end", Some(end.span))),
        )
    }

    /// Parses a `while` loop.
    fn while_loop(&mut self) -> Result<Node> {
        let keyword = self.bump()?;
        self.parser.lexer.push_cond(true);
        let condition = self.expression()?;
        self.parser.lexer.pop_cond();

        let begin = self.eat(TokenKind::Do);
        if begin.is_none()
            && !matches!(
                self.kind(),
                Some(TokenKind::Newline | TokenKind::Semicolon)
            )
        {
            return Err(self.unexpected());
        }

        let body = self.statements(&[TokenKind::End])?;
        let end = self.expect(TokenKind::End)?;

        let body = Child::from(self.sequence(body));
        Ok(Node::new(Kind::While, vec![condition.into(), body]).at(Map::new(
            keyword.span.join(end.span),
        )
        .with("keyword", Some(keyword.span))
        .with("begin", begin.map(|token| token.span))
        .with("end", Some(end.span))))
    }

    /// Parses a `defined?` expression.
    fn defined(&mut self) -> Result<Node> {
        let keyword = self.bump()?;
        let Some(open) = self.eat(TokenKind::LParen) else {
            let operand = self.within(&[(ContextFlag::InDefined, true)], Self::expression)?;
            let span = keyword.span.join(expr(&operand));
            return Ok(Node::new(Kind::Defined, vec![operand.into()]).at(Map::new(span)
                .with("keyword", Some(keyword.span))
                .with("begin", None)
                .with("end", None)));
        };

        self.parser.lexer.open_paren();
        self.skip_newlines();
        let operand = self.within(&[(ContextFlag::InDefined, true)], Self::expression)?;
        self.skip_newlines();
        let close = self.expect(TokenKind::RParen)?;
        self.parser.lexer.close_paren();

        Ok(Node::new(Kind::Defined, vec![operand.into()]).at(Map::new(
            keyword.span.join(close.span),
        )
        .with("keyword", Some(keyword.span))
        .with("begin", Some(open.span))
        .with("end", Some(close.span))))
    }

    /// Parses a parenthesized statement list.
    fn parenthesized(&mut self) -> Result<Node> {
        let open = self.bump()?;
        self.parser.lexer.open_paren();
        let body = self.statements(&[TokenKind::RParen])?;
        let close = self.expect(TokenKind::RParen)?;
        self.parser.lexer.close_paren();

        Ok(
            Node::new(Kind::Begin, body.into_iter().map(Child::Node).collect()).at(Map::new(
                open.span.join(close.span),
            )
            .with("begin", Some(open.span))
            .with("end", Some(close.span))),
        )
    }

    /// Parses a `case ... in` expression.
    fn case_match(&mut self) -> Result<Node> {
        let keyword = self.bump()?;
        let subject = self.expression()?;
        self.skip_terminators();
        if !self.parser.features.pattern_matching || !self.at(TokenKind::In) {
            return Err(self.unexpected());
        }

        let mut children = vec![Child::Node(subject)];
        while self.at(TokenKind::In) {
            children.push(Child::Node(self.in_clause()?));
        }

        let otherwise = self.eat(TokenKind::Else);
        if otherwise.is_some() {
            let body = self.statements(&[TokenKind::End])?;
            children.push(Child::from(self.sequence(body)));
        } else {
            children.push(Child::Nil);
        }

        let end = self.expect(TokenKind::End)?;
        Ok(Node::new(Kind::CaseMatch, children).at(Map::new(keyword.span.join(end.span))
            .with("keyword", Some(keyword.span))
            .with("else", otherwise.map(|token| token.span))
            .with("end", Some(end.span))))
    }

    /// Parses an `in` clause.
    fn in_clause(&mut self) -> Result<Node> {
        let keyword = self.bump()?;
        self.parser.pattern_variables.push(HashSet::new());
        let pattern = self.within(&[(ContextFlag::InKwarg, true)], Self::pattern)?;
        self.parser.pattern_variables.pop();

        let then = self.eat(TokenKind::Then);
        if then.is_none()
            && !matches!(
                self.kind(),
                Some(TokenKind::Newline | TokenKind::Semicolon)
            )
        {
            return Err(self.unexpected());
        }

        let body = self.statements(&[TokenKind::In, TokenKind::Else, TokenKind::End])?;
        let last = body
            .last()
            .map(expr)
            .or(then.map(|token| token.span))
            .unwrap_or(expr(&pattern));

        let body = Child::from(self.sequence(body));
        Ok(
            Node::new(Kind::InPattern, vec![pattern.into(), Child::Nil, body]).at(Map::new(
                keyword.span.join(last),
            )
            .with("keyword", Some(keyword.span))
            .with("begin", then.map(|token| token.span))),
        )
    }

    /// Binds a pattern variable.
    fn bind(&mut self, name: &str, span: Span) -> Result<Node> {
        let fresh = name.starts_with('_')
            || self
                .parser
                .pattern_variables
                .last_mut()
                .is_none_or(|variables| variables.insert(name.to_string()));
        if !fresh {
            return Err(self.parser.error(
                Reason::DuplicateVariableName,
                arguments([("name", name.to_string())]),
                span,
            ));
        }

        self.parser.declare(name);
        Ok(Node::new(Kind::MatchVar, vec![Child::Sym(name.to_string())])
            .at(Map::new(span).with("name", Some(span))))
    }

    /// Parses a pattern.
    fn pattern(&mut self) -> Result<Node> {
        match self.kind() {
            Some(TokenKind::Identifier) => {
                let token = self.bump()?;
                self.bind(token.text, token.span)
            }
            Some(TokenKind::LBrace) => self.hash_pattern(),
            Some(
                TokenKind::Integer
                | TokenKind::String
                | TokenKind::Symbol
                | TokenKind::Nil
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Constant
                | TokenKind::Minus,
            ) => self.unary(),
            _ => Err(self.unexpected()),
        }
    }

    /// Parses a `{key: pattern}` hash pattern.
    fn hash_pattern(&mut self) -> Result<Node> {
        let open = self.bump()?;
        self.parser.pattern_hash_keys.push(HashSet::new());
        self.skip_newlines();

        let mut items = Vec::new();
        while let Some(label) = self.eat(TokenKind::Label) {
            let key = &label.text[..label.text.len() - 1];
            let key_span = Span::new(label.span.start(), label.span.len() - 1);
            let fresh = self
                .parser
                .pattern_hash_keys
                .last_mut()
                .is_none_or(|keys| keys.insert(key.to_string()));
            if !fresh {
                return Err(self.parser.error(
                    Reason::DuplicatePatternKey,
                    arguments([("name", key.to_string())]),
                    key_span,
                ));
            }

            if matches!(
                self.kind(),
                Some(TokenKind::Comma | TokenKind::RBrace | TokenKind::Newline)
            ) {
                items.push(Child::Node(self.bind(key, key_span)?));
            } else {
                let value = self.pattern()?;
                let symbol = Node::new(Kind::Sym, vec![Child::Sym(key.to_string())])
                    .at(Map::new(key_span).with("begin", None));
                let span = label.span.join(expr(&value));
                items.push(Child::Node(
                    Node::new(Kind::Pair, vec![symbol.into(), value.into()]).at(Map::new(span)
                        .with("operator", Some(Span::new(label.span.end() - 1, 1)))),
                ));
            }

            if self.eat(TokenKind::Comma).is_none() {
                break;
            }

            self.skip_newlines();
        }

        self.skip_newlines();
        let close = self.expect(TokenKind::RBrace)?;
        self.parser.pattern_hash_keys.pop();

        Ok(Node::new(Kind::HashPattern, items).at(Map::new(open.span.join(close.span))
            .with("begin", Some(open.span))
            .with("end", Some(close.span))))
    }
}

/// Creates an empty parameter list without delimiters.
fn empty_parameters() -> Node {
    Node::new(Kind::Args, Vec::new()).at(Map::empty().with("begin", None).with("end", None))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use verity::Parser as _;

    use super::*;
    use crate::version::features;

    /// Parses a snippet with the given version.
    fn parse(version: &'static str, source: &str) -> (Result<Option<Node>>, Parser) {
        let version = Version::new(version);
        let features = features(&version).unwrap();
        let mut parser = Parser::new(version, features, Diagnostics::new());
        let result = parser.parse(source);
        (result, parser)
    }

    /// Parses a snippet into its s-expression.
    fn sexp(version: &'static str, source: &str) -> String {
        let (result, parser) = parse(version, source);
        assert_eq!(parser.state(), ParserState::default(), "dirty state for `{source}`");
        result
            .unwrap()
            .map(|node| node.to_string())
            .unwrap_or_default()
    }

    #[test]
    fn operators_and_precedence() {
        assert_eq!(
            sexp("3.2", "1 + 2 * 3 == 7 && !x"),
            "(and (send (send (int 1) :+ (send (int 2) :* (int 3))) :== (int 7)) (send (send \
             nil :x) :!))"
        );
        assert_eq!(sexp("3.2", "-1 - -x"), "(send (int -1) :- (send (send nil :x) :-@))");
    }

    #[test]
    fn variables_and_calls() {
        assert_eq!(
            sexp("3.2", "a = 1; a.succ(a, *b)\nfoo a"),
            "(begin (lvasgn :a (int 1)) (send (lvar :a) :succ (lvar :a) (splat (send nil :b))) \
             (send nil :foo (lvar :a)))"
        );
        assert_eq!(sexp("3.2", ""), "");
        assert_eq!(sexp("3.2", "# nothing\n"), "");
    }

    #[test]
    fn literals() {
        assert_eq!(
            sexp("3.2", "nil; true; false; self; :sym; :+; \"a\\nb\"; Foo"),
            "(begin (nil) (true) (false) (self) (sym :sym) (sym :+) (str \"a\\nb\") (const nil \
             :Foo))"
        );
    }

    #[test]
    fn integers_outside_i64_are_kept_as_text() {
        assert_eq!(
            sexp("3.2", "99999999999999999999 + -99999999999999999999"),
            "(send (int 99999999999999999999) :+ (int -99999999999999999999))"
        );
        assert_eq!(
            sexp("3.2", "-9223372036854775808"),
            "(int -9223372036854775808)"
        );
    }

    #[test]
    fn do_binds_to_the_outer_command() {
        assert_eq!(
            sexp("3.2", "foo bar do end"),
            "(block (send nil :foo (send nil :bar)) (args) nil)"
        );
        assert_eq!(
            sexp("3.2", "foo bar { }"),
            "(send nil :foo (block (send nil :bar) (args) nil))"
        );
        assert_eq!(
            sexp("3.2", "while x do y end"),
            "(while (send nil :x) (send nil :y))"
        );
    }

    #[test]
    fn blocks_and_numbered_parameters() {
        assert_eq!(
            sexp("3.2", "foo { |x, y| x + y }"),
            "(block (send nil :foo) (args (arg :x) (arg :y)) (send (lvar :x) :+ (lvar :y)))"
        );
        assert_eq!(
            sexp("2.7", "foo { _1 + _2 }"),
            "(numblock (send nil :foo) 2 (send (lvar :_1) :+ (lvar :_2)))"
        );
        assert_eq!(
            sexp("2.6", "foo { _1 + 1 }"),
            "(block (send nil :foo) (args) (send (send nil :_1) :+ (int 1)))"
        );
        assert_eq!(sexp("3.2", "_1"), "(send nil :_1)");
    }

    #[test]
    fn lambdas_need_1_9() {
        assert_eq!(
            sexp("1.9", "->(x) { x }"),
            "(block (lambda) (args (arg :x)) (lvar :x))"
        );
        assert_eq!(sexp("mac", "-> do end"), "(block (lambda) (args) nil)");

        let (result, parser) = parse("1.8", "-> { }");
        assert!(result.unwrap_err().is_syntax());
        assert_eq!(
            parser.diagnostics.snapshot()[0].message(),
            "unexpected token tLAMBDA"
        );
    }

    #[test]
    fn definitions() {
        assert_eq!(
            sexp("3.2", "class Foo\n  def bar(a)\n    a\n  end\nend"),
            "(class (const nil :Foo) nil (def :bar (args (arg :a)) (lvar :a)))"
        );
        assert_eq!(
            sexp("3.2", "a = 1; def m; a; end"),
            "(begin (lvasgn :a (int 1)) (def :m (args) (send nil :a)))"
        );
    }

    #[test]
    fn pattern_matching() {
        assert_eq!(
            sexp("3.0", "case x\nin {a:, b: 1} then a\nin y\n  y\nelse\n  nil\nend"),
            "(case_match (send nil :x) (in_pattern (hash_pattern (match_var :a) (pair (sym :b) \
             (int 1))) nil (lvar :a)) (in_pattern (match_var :y) nil (lvar :y)) (nil))"
        );

        let (result, _) = parse("2.6", "case x\nin y\nend");
        assert!(result.unwrap_err().is_syntax());
    }

    #[test]
    fn error_diagnostics() {
        let cases = [
            ("foo { |a| _1 }", "ordinary_param_defined", "ordinary parameter is defined"),
            ("foo { |a, a| }", "duplicate_variable_name", "duplicated variable name a"),
            (
                "case 1\nin {a: x, a: y}\nend",
                "duplicate_pattern_key",
                "duplicate hash pattern key a",
            ),
            ("def f\n  class A; end\nend", "class_in_def", "class definition in method body"),
            ("1 +", "unexpected_token", "unexpected token $end"),
            ("x = \"oops", "unterminated_string", "unterminated string meets end of file"),
            ("x @", "unexpected_char", "unexpected `@'"),
        ];

        for (source, reason, message) in cases {
            let (result, parser) = parse("3.2", source);
            assert_eq!(
                result.unwrap_err().to_string(),
                format!("syntax error: {message}"),
                "for `{source}`"
            );
            let diagnostics = parser.diagnostics.snapshot();
            assert_eq!(diagnostics.len(), 1, "for `{source}`");
            assert_eq!(diagnostics[0].reason(), reason);
        }
    }

    #[test]
    fn ambiguous_prefix_warns_once() {
        let (result, parser) = parse("3.2", "foo *bar, *baz");
        assert_eq!(
            result.unwrap().unwrap().to_string(),
            "(send nil :foo (splat (send nil :bar)) (splat (send nil :baz)))"
        );

        let diagnostics = parser.diagnostics.snapshot();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].location(), Span::new(4, 1));
        assert_eq!(diagnostics[0].highlights(), [Span::new(5, 3)]);

        let (_, parser) = parse("3.2", "foo * bar");
        assert!(parser.diagnostics.is_empty());
    }

    #[test]
    fn context_probe_records_flags() {
        let (result, _) = parse("3.2", "def m\n  foo { get_context }\nend");
        let def = result.unwrap().unwrap();
        let probe = verity::path::dive(&def, |node| verity::Tree::context(node).is_some())
            .next()
            .unwrap();
        let flags: Vec<_> = verity::Tree::context(probe).unwrap().active().collect();
        assert_eq!(flags, [ContextFlag::InDef, ContextFlag::InBlock]);
    }
}
