//! Tokenizer — turns script source into a flat token sequence.
//!
//! Only lines that start with the code marker (`:`) are code; everything
//! else is a comment. Code lines are split on whitespace, except that a
//! double-quoted literal stays one token, quotes included. Block structure
//! is not represented here: it is implicit in the keyword tokens.

use std::ffi::OsString;
use std::ops::Index;
use std::path::{Path, PathBuf};

use crate::error::{Diagnostic, ScriptError, ScriptResult, SourceLoc};

/// First character of every code line.
pub const CODE_MARKER: char = ':';

/// Extension appended to a source identifier when the bare name does not exist.
pub const SOURCE_EXTENSION: &str = "ss";

const QUOTE: char = '"';

/// A single lexical unit with its provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    /// 1-based line number in the source.
    pub line_no: usize,
    /// Source identifier the token was read from.
    pub source: String,
}

impl Token {
    pub fn new(text: impl Into<String>, line_no: usize, source: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            line_no,
            source: source.into(),
        }
    }

    pub fn is(&self, keyword: &str) -> bool {
        self.text == keyword
    }
}

/// The loaded script: an append-only token arena addressed by index.
/// Built once, never mutated while the interpreter runs.
#[derive(Debug, Clone, Default)]
pub struct Program {
    tokens: Vec<Token>,
}

impl Program {
    /// Load and tokenize a script from a source identifier.
    pub fn load(source: &str) -> ScriptResult<Self> {
        let path = resolve_source(source);
        let text = std::fs::read_to_string(&path).map_err(|e| {
            Diagnostic::new(ScriptError::Load)
                .with_detail(format!("cannot read '{}': {e}", path.display()))
        })?;
        let program = Self::parse(source, &text)?;
        tracing::debug!(source, tokens = program.len(), "program loaded");
        Ok(program)
    }

    /// Tokenize marker-prefixed code lines from in-memory text.
    pub fn parse(source: &str, text: &str) -> ScriptResult<Self> {
        let tokens = Lexer::new(source, text).tokenize()?;
        Ok(Self { tokens })
    }

    /// Tokenize text where every line is code, without a marker.
    pub fn from_code(source: &str, text: &str) -> ScriptResult<Self> {
        let tokens = Lexer::new(source, text).without_marker().tokenize()?;
        Ok(Self { tokens })
    }

    pub fn get(&self, index: usize) -> Option<&Token> {
        self.tokens.get(index)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn last(&self) -> Option<&Token> {
        self.tokens.last()
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }
}

impl Index<usize> for Program {
    type Output = Token;

    fn index(&self, index: usize) -> &Token {
        &self.tokens[index]
    }
}

/// Resolve a source identifier to a file: the name as given if it exists,
/// otherwise the name with `.ss` appended. An existing extension is kept:
/// `level.1` resolves to `level.1.ss`.
pub fn resolve_source(source: &str) -> PathBuf {
    let given = Path::new(source);
    if given.is_file() {
        return given.to_path_buf();
    }
    let mut name = OsString::from(source);
    name.push(".");
    name.push(SOURCE_EXTENSION);
    PathBuf::from(name)
}

/// Strip the quote delimiters from a string literal token.
/// Unquoted text is returned unchanged.
pub fn string_literal(text: &str) -> &str {
    text.strip_prefix(QUOTE)
        .and_then(|rest| rest.strip_suffix(QUOTE))
        .unwrap_or(text)
}

pub struct Lexer<'a> {
    source: &'a str,
    text: &'a str,
    marker: Option<char>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str, text: &'a str) -> Self {
        Self {
            source,
            text,
            marker: Some(CODE_MARKER),
        }
    }

    /// Treat every line as code.
    pub fn without_marker(mut self) -> Self {
        self.marker = None;
        self
    }

    pub fn tokenize(&self) -> ScriptResult<Vec<Token>> {
        let mut tokens = Vec::new();
        for (index, line) in self.text.lines().enumerate() {
            let line_no = index + 1;
            let code = match self.marker {
                Some(marker) => match line.strip_prefix(marker) {
                    Some(code) => code,
                    None => continue,
                },
                None => line,
            };
            self.split_line(code, line_no, &mut tokens)?;
        }
        Ok(tokens)
    }

    fn split_line(&self, code: &str, line_no: usize, tokens: &mut Vec<Token>) -> ScriptResult<()> {
        let mut current = String::new();
        let mut quoted = false;

        for ch in code.chars() {
            if ch == QUOTE {
                quoted = !quoted;
                current.push(ch);
            } else if ch.is_whitespace() && !quoted {
                if !current.is_empty() {
                    tokens.push(Token::new(std::mem::take(&mut current), line_no, self.source));
                }
            } else {
                current.push(ch);
            }
        }

        if quoted {
            return Err(Diagnostic::new(ScriptError::Parse)
                .at(SourceLoc::new(line_no, self.source, current))
                .with_detail("Unterminated string literal."));
        }
        if !current.is_empty() {
            tokens.push(Token::new(current, line_no, self.source));
        }
        Ok(())
    }
}
