//! The lexer of the sample dialects.
//!
//! Tokens are recognized with [`logos`] over the UTF-8 source. Spans are
//! reported in characters; how byte offsets are turned into character
//! offsets depends on the lexer's [`Encoding`].
//!
//! The lexer also owns the nested-scope bookkeeping the parser consults to
//! attach `do` keywords: the condition and command-argument bit stacks, the
//! stacks they are saved to when a new scope opens, the open lambda literals
//! and the parenthesis nesting depth.

use logos::Logos;
use verity::Encoding;
use verity::LexerState;
use verity::Span;

/// Represents the kind of a token.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Contiguous horizontal whitespace.
    #[regex(r"[ \t\r]+")]
    Whitespace,

    /// A line comment.
    #[regex(r"#[^\n]*", allow_greedy = true)]
    Comment,

    /// A line break.
    #[token("\n")]
    Newline,

    /// The `;` statement separator.
    #[token(";")]
    Semicolon,

    /// An integer literal.
    #[regex(r"[0-9]+")]
    Integer,

    /// A double quoted string literal.
    #[regex(r#""([^"\\]|\\[^\n]|\\\n)*""#)]
    String,

    /// A double quoted string literal without its closing quote.
    #[regex(r#""([^"\\]|\\[^\n]|\\\n)*"#)]
    UnterminatedString,

    /// A symbol literal.
    #[regex(r":[a-zA-Z_][a-zA-Z0-9_]*[?!=]?")]
    #[regex(r":(\+|-|\*|/|%|==|!=|<=|>=|<|>|!)")]
    Symbol,

    /// A hash key label such as `name:`.
    #[regex(r"[a-z_][a-zA-Z0-9_]*:")]
    Label,

    /// An identifier.
    #[regex(r"[a-z_][a-zA-Z0-9_]*[?!]?")]
    Identifier,

    /// A constant name.
    #[regex(r"[A-Z][a-zA-Z0-9_]*")]
    Constant,

    /// The `def` keyword.
    #[token("def")]
    Def,

    /// The `end` keyword.
    #[token("end")]
    End,

    /// The `class` keyword.
    #[token("class")]
    Class,

    /// The `do` keyword.
    #[token("do")]
    Do,

    /// The `while` keyword.
    #[token("while")]
    While,

    /// The `case` keyword.
    #[token("case")]
    Case,

    /// The `in` keyword.
    #[token("in")]
    In,

    /// The `then` keyword.
    #[token("then")]
    Then,

    /// The `else` keyword.
    #[token("else")]
    Else,

    /// The `defined?` keyword.
    #[token("defined?")]
    Defined,

    /// The `nil` keyword.
    #[token("nil")]
    Nil,

    /// The `true` keyword.
    #[token("true")]
    True,

    /// The `false` keyword.
    #[token("false")]
    False,

    /// The `self` keyword.
    #[token("self")]
    SelfValue,

    /// The `(` symbol.
    #[token("(")]
    LParen,

    /// The `)` symbol.
    #[token(")")]
    RParen,

    /// The `{` symbol.
    #[token("{")]
    LBrace,

    /// The `}` symbol.
    #[token("}")]
    RBrace,

    /// The `,` symbol.
    #[token(",")]
    Comma,

    /// The `.` symbol.
    #[token(".")]
    Dot,

    /// The `|` symbol.
    #[token("|")]
    Pipe,

    /// The `||` symbol.
    #[token("||")]
    OrOr,

    /// The `&&` symbol.
    #[token("&&")]
    AndAnd,

    /// The `&` symbol.
    #[token("&")]
    Ampersand,

    /// The `*` symbol.
    #[token("*")]
    Star,

    /// The `->` symbol.
    #[token("->")]
    Arrow,

    /// The `=` symbol.
    #[token("=")]
    Assign,

    /// The `==` symbol.
    #[token("==")]
    Equal,

    /// The `!=` symbol.
    #[token("!=")]
    NotEqual,

    /// The `<` symbol.
    #[token("<")]
    Less,

    /// The `>` symbol.
    #[token(">")]
    Greater,

    /// The `<=` symbol.
    #[token("<=")]
    LessEqual,

    /// The `>=` symbol.
    #[token(">=")]
    GreaterEqual,

    /// The `+` symbol.
    #[token("+")]
    Plus,

    /// The `-` symbol.
    #[token("-")]
    Minus,

    /// The `/` symbol.
    #[token("/")]
    Slash,

    /// The `%` symbol.
    #[token("%")]
    Percent,

    /// The `!` symbol.
    #[token("!")]
    Bang,
}

impl TokenKind {
    /// Describes the token kind in diagnostics.
    pub fn describe(self) -> &'static str {
        match self {
            Self::Whitespace => "tSPACE",
            Self::Comment => "tCOMMENT",
            Self::Newline => "tNL",
            Self::Semicolon => "tSEMI",
            Self::Integer => "tINTEGER",
            Self::String | Self::UnterminatedString => "tSTRING",
            Self::Symbol => "tSYMBOL",
            Self::Label => "tLABEL",
            Self::Identifier => "tIDENTIFIER",
            Self::Constant => "tCONSTANT",
            Self::Def => "kDEF",
            Self::End => "kEND",
            Self::Class => "kCLASS",
            Self::Do => "kDO",
            Self::While => "kWHILE",
            Self::Case => "kCASE",
            Self::In => "kIN",
            Self::Then => "kTHEN",
            Self::Else => "kELSE",
            Self::Defined => "kDEFINED",
            Self::Nil => "kNIL",
            Self::True => "kTRUE",
            Self::False => "kFALSE",
            Self::SelfValue => "kSELF",
            Self::LParen => "tLPAREN",
            Self::RParen => "tRPAREN",
            Self::LBrace => "tLCURLY",
            Self::RBrace => "tRCURLY",
            Self::Comma => "tCOMMA",
            Self::Dot => "tDOT",
            Self::Pipe => "tPIPE",
            Self::OrOr => "tOROP",
            Self::AndAnd => "tANDOP",
            Self::Ampersand => "tAMPER",
            Self::Star => "tSTAR",
            Self::Arrow => "tLAMBDA",
            Self::Assign => "tEQL",
            Self::Equal => "tEQ",
            Self::NotEqual => "tNEQ",
            Self::Less => "tLT",
            Self::Greater => "tGT",
            Self::LessEqual => "tLEQ",
            Self::GreaterEqual => "tGEQ",
            Self::Plus => "tPLUS",
            Self::Minus => "tMINUS",
            Self::Slash => "tDIVIDE",
            Self::Percent => "tPERCENT",
            Self::Bang => "tBANG",
        }
    }

    /// Determines if the token carries no meaning for the parser.
    fn is_trivia(self) -> bool {
        matches!(self, Self::Whitespace | Self::Comment)
    }
}

/// Represents a token of the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    /// The kind of the token.
    pub kind: TokenKind,
    /// The span of the token, in characters.
    pub span: Span,
    /// The text of the token.
    pub text: &'a str,
    /// Whether the token follows whitespace, a comment or a line break.
    pub spaced: bool,
}

/// Represents an error encountered while lexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexError {
    /// A character that starts no token.
    UnexpectedChar {
        /// The offending character.
        character: char,
        /// The span of the character.
        span: Span,
    },
    /// A string literal without its closing quote.
    UnterminatedString {
        /// The span of the opening quote.
        span: Span,
    },
}

/// Converts byte offsets of the source into character offsets.
enum Positions<'a> {
    /// Characters are counted on demand from the last converted offset.
    Utf8 {
        /// The source.
        source: &'a str,
        /// The last converted byte offset.
        byte: usize,
        /// The character offset of `byte`.
        offset: usize,
    },
    /// The source is transcoded into code points up front.
    Utf32 {
        /// The code points of the source.
        code_points: Vec<char>,
        /// The byte offset of every code point, followed by the length of
        /// the source.
        bytes: Vec<usize>,
    },
}

impl<'a> Positions<'a> {
    /// Creates the conversion for the given encoding.
    fn new(source: &'a str, encoding: Encoding) -> Self {
        match encoding {
            Encoding::Utf8 => Self::Utf8 {
                source,
                byte: 0,
                offset: 0,
            },
            Encoding::Utf32 => {
                let (mut bytes, code_points): (Vec<usize>, Vec<char>) = source.char_indices().unzip();
                bytes.push(source.len());
                Self::Utf32 { code_points, bytes }
            }
        }
    }

    /// Converts a byte offset into a character offset.
    fn offset(&mut self, to: usize) -> usize {
        match self {
            Self::Utf8 {
                source,
                byte,
                offset,
            } => {
                if to < *byte {
                    *byte = 0;
                    *offset = 0;
                }

                *offset += source[*byte..to].chars().count();
                *byte = to;
                *offset
            }
            Self::Utf32 { bytes, .. } => match bytes.binary_search(&to) {
                Ok(index) | Err(index) => index,
            },
        }
    }

    /// Converts a byte range into a character span.
    fn span(&mut self, range: std::ops::Range<usize>) -> Span {
        let start = self.offset(range.start);
        let end = self.offset(range.end);
        Span::from_bounds(start, end)
    }

    /// Gets the character at a character offset.
    fn character(&self, at: usize, text: &str) -> char {
        let character = match self {
            Self::Utf8 { .. } => text.chars().next(),
            Self::Utf32 { code_points, .. } => code_points.get(at).copied(),
        };

        character.unwrap_or_default()
    }
}

/// Implements the lexer of the sample dialects.
#[derive(Debug, Default)]
pub struct Lexer {
    /// The encoding used to compute positions.
    encoding: Encoding,
    /// The condition bit stack.
    cond: Vec<bool>,
    /// The command-argument bit stack.
    cmdarg: Vec<bool>,
    /// The saved condition stacks.
    cond_stack: Vec<Vec<bool>>,
    /// The saved command-argument stacks.
    cmdarg_stack: Vec<Vec<bool>>,
    /// The parenthesis depth at each open lambda literal.
    lambda_stack: Vec<usize>,
    /// The parenthesis nesting depth.
    paren_nest: usize,
}

impl Lexer {
    /// Creates a new lexer using UTF-8 positions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the encoding used to compute positions.
    pub fn set_encoding(&mut self, encoding: Encoding) {
        self.encoding = encoding;
    }

    /// Resets the bookkeeping to its initial state.
    pub fn reset(&mut self) {
        *self = Self {
            encoding: self.encoding,
            ..Self::default()
        };
    }

    /// Tokenizes a source.
    ///
    /// Whitespace and comments are dropped; they are only recorded in the
    /// `spaced` flag of the token that follows them.
    pub fn tokenize<'a>(&self, source: &'a str) -> Result<Vec<Token<'a>>, LexError> {
        let mut lexer = TokenKind::lexer(source);
        let mut positions = Positions::new(source, self.encoding);
        let mut tokens = Vec::new();
        let mut spaced = true;

        while let Some(result) = lexer.next() {
            let span = positions.span(lexer.span());
            match result {
                Ok(kind) if kind.is_trivia() => spaced = true,
                Ok(TokenKind::UnterminatedString) => {
                    return Err(LexError::UnterminatedString {
                        span: Span::new(span.start(), 1),
                    });
                }
                Ok(kind) => {
                    tokens.push(Token {
                        kind,
                        span,
                        text: lexer.slice(),
                        spaced,
                    });
                    spaced = kind == TokenKind::Newline;
                }
                Err(()) => {
                    return Err(LexError::UnexpectedChar {
                        character: positions.character(span.start(), lexer.slice()),
                        span: Span::new(span.start(), 1),
                    });
                }
            }
        }

        Ok(tokens)
    }

    /// Pushes onto the condition stack.
    pub fn push_cond(&mut self, active: bool) {
        self.cond.push(active);
    }

    /// Pops from the condition stack.
    pub fn pop_cond(&mut self) {
        self.cond.pop();
    }

    /// Determines if a loop condition is being read.
    pub fn is_cond(&self) -> bool {
        self.cond.last().copied().unwrap_or(false)
    }

    /// Pushes onto the command-argument stack.
    pub fn push_cmdarg(&mut self, active: bool) {
        self.cmdarg.push(active);
    }

    /// Pops from the command-argument stack.
    pub fn pop_cmdarg(&mut self) {
        self.cmdarg.pop();
    }

    /// Determines if command arguments are being read.
    pub fn is_cmdarg(&self) -> bool {
        self.cmdarg.last().copied().unwrap_or(false)
    }

    /// Saves the bit stacks when a new scope opens.
    pub fn save_stacks(&mut self) {
        self.cond_stack.push(std::mem::take(&mut self.cond));
        self.cmdarg_stack.push(std::mem::take(&mut self.cmdarg));
    }

    /// Restores the bit stacks when a scope closes.
    pub fn restore_stacks(&mut self) {
        self.cond = self.cond_stack.pop().unwrap_or_default();
        self.cmdarg = self.cmdarg_stack.pop().unwrap_or_default();
    }

    /// Records an opening parenthesis.
    pub fn open_paren(&mut self) {
        self.paren_nest += 1;
        self.cond.push(false);
        self.cmdarg.push(false);
    }

    /// Records a closing parenthesis.
    pub fn close_paren(&mut self) {
        self.paren_nest = self.paren_nest.saturating_sub(1);
        self.cond.pop();
        self.cmdarg.pop();
    }

    /// Records the start of a lambda literal.
    pub fn push_lambda(&mut self) {
        self.lambda_stack.push(self.paren_nest);
    }

    /// Records the start of a lambda literal's body.
    pub fn pop_lambda(&mut self) {
        self.lambda_stack.pop();
    }

    /// Takes a snapshot of the bookkeeping.
    pub fn state(&self) -> LexerState {
        LexerState {
            cond: self.cond.len(),
            cmdarg: self.cmdarg.len(),
            cond_stack: self.cond_stack.len(),
            cmdarg_stack: self.cmdarg_stack.len(),
            lambda_stack: self.lambda_stack.len(),
            paren_nest: self.paren_nest,
        }
    }
}
