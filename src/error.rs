//! Script error kinds and diagnostic formatting.
//!
//! Every failure in the interpreter is fatal: it carries the offending
//! token's provenance, unwinds to the host through `?`, and ends the run.

use std::fmt;

use crate::lexer::Token;

/// Source location for error reporting: where the offending token came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLoc {
    pub line: usize,
    pub source: String,
    /// Literal text of the offending token.
    pub token: String,
}

impl SourceLoc {
    pub fn new(line: usize, source: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            line,
            source: source.into(),
            token: token.into(),
        }
    }
}

impl From<&Token> for SourceLoc {
    fn from(token: &Token) -> Self {
        Self::new(token.line_no, token.source.as_str(), token.text.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptError {
    /// Malformed token stream: missing keyword, unknown command,
    /// unterminated block, bad comparator or dimension syntax.
    Parse,
    /// Undeclared variable, constant, list, matrix or string.
    Reference,
    /// The cursor ran past the end of the token stream.
    Exhaustion,
    /// Division or remainder by zero.
    Arithmetic,
    /// Source file missing or unreadable.
    Load,
    /// A host I/O service failed.
    Host,
}

impl ScriptError {
    pub fn message(self) -> &'static str {
        match self {
            Self::Parse => "Parse error",
            Self::Reference => "Reference error",
            Self::Exhaustion => "No more tokens left",
            Self::Arithmetic => "Arithmetic error",
            Self::Load => "Cannot load source",
            Self::Host => "Failure in host service",
        }
    }
}

/// A fatal script error with location and context.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub error: ScriptError,
    pub location: Option<SourceLoc>,
    pub detail: Option<String>,
}

impl Diagnostic {
    pub fn new(error: ScriptError) -> Self {
        Self {
            error,
            location: None,
            detail: None,
        }
    }

    pub fn at(mut self, loc: impl Into<SourceLoc>) -> Self {
        self.location = Some(loc.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub(crate) fn parse(token: &Token, detail: impl Into<String>) -> Self {
        Self::new(ScriptError::Parse).at(token).with_detail(detail)
    }

    pub(crate) fn reference(token: &Token, detail: impl Into<String>) -> Self {
        Self::new(ScriptError::Reference).at(token).with_detail(detail)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error: {}", self.error.message())?;

        if let Some(ref detail) = self.detail {
            write!(f, ": {detail}")?;
        }

        if let Some(ref loc) = self.location {
            write!(f, "\n  Line No: {}", loc.line)?;
            write!(f, "\n  Source: {}", loc.source)?;
            write!(f, "\n  Token: {}", loc.token)?;
        }

        Ok(())
    }
}

impl std::error::Error for Diagnostic {}

/// Convenience alias.
pub type ScriptResult<T> = Result<T, Diagnostic>;
