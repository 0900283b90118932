//! Error types for the translation engine.
//!
//! This module defines all error types used throughout the engine,
//! organized by the phase that produces them.

use thiserror::Error;
use std::fmt;

/// Top-level error type for the engine.
#[derive(Error, Debug)]
pub enum LooptranError {
    /// Error while parsing a directive
    #[error("Directive error: {0}")]
    Directive(#[from] DirectiveError),

    /// Error while reading or writing the IR document
    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    /// Error while applying a transformation
    #[error("Transformation error: {0}")]
    Transform(#[from] TransformError),

    /// Error in the configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Internal engine error (IR invariant violation)
    #[error("Internal error: {0}")]
    Internal(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LooptranError {
    /// Create an internal error from any displayable context.
    pub fn internal(message: impl Into<String>) -> Self {
        LooptranError::Internal(message.into())
    }
}

/// Error while parsing a directive.
#[derive(Error, Debug, Clone)]
pub struct DirectiveError {
    /// The error message
    pub message: String,
    /// Source line of the pragma
    pub line: u32,
    /// The kind of directive error
    pub kind: DirectiveErrorKind,
}

impl DirectiveError {
    /// Create a new directive error.
    pub fn new(kind: DirectiveErrorKind, message: impl Into<String>, line: u32) -> Self {
        Self { message: message.into(), line, kind }
    }

    /// Attach the pragma line to an error raised before it was known.
    pub fn with_line(mut self, line: u32) -> Self {
        self.line = line;
        self
    }
}

impl fmt::Display for DirectiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line > 0 {
            write!(f, "{} (line {})", self.message, self.line)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveErrorKind {
    /// Directive keyword is not recognized
    UnknownDirective,
    /// Clause is not valid for this directive kind
    UnknownClause,
    /// A mandatory clause is missing
    MissingClause,
    /// A variable appears more than once in the mapping clauses
    DuplicateMapping,
    /// Clause arguments are malformed
    MalformedClause,
    /// Unexpected token in the directive text
    UnexpectedToken,
    /// Directive text ended prematurely
    UnexpectedEnd,
}

/// Error while reading or writing the IR document.
#[derive(Error, Debug)]
pub struct DocumentError {
    /// The error message
    pub message: String,
    /// The kind of document error
    pub kind: DocumentErrorKind,
}

impl DocumentError {
    /// Create a new document error.
    pub fn new(kind: DocumentErrorKind, message: impl Into<String>) -> Self {
        Self { message: message.into(), kind }
    }
}

impl fmt::Display for DocumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentErrorKind {
    /// Document is not a valid tree document
    Malformed,
    /// A required element is absent (program root, type table, ...)
    MissingElement,
}

/// Error while applying a transformation.
///
/// Analysis-stage failures are recorded as diagnostics on the program and
/// never surface as this type; a `TransformError` raised during the apply
/// phase is fatal for the whole pipeline.
#[derive(Error, Debug, Clone)]
pub struct TransformError {
    /// The error message
    pub message: String,
    /// The transformation that failed
    pub transformation: String,
    /// Source line of the triggering pragma (0 if none)
    pub line: u32,
    /// The kind of transformation error
    pub kind: TransformErrorKind,
}

impl TransformError {
    /// Create a new transformation error.
    pub fn new(
        kind: TransformErrorKind,
        transformation: impl Into<String>,
        message: impl Into<String>,
        line: u32,
    ) -> Self {
        Self {
            message: message.into(),
            transformation: transformation.into(),
            line,
            kind,
        }
    }
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {}", self.message, self.transformation)?;
        if self.line > 0 {
            write!(f, " (line {})", self.line)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformErrorKind {
    /// Mapping dimensionality exceeds the argument's declared rank
    IllegalMapping,
    /// Construct is recognized but not supported
    Unsupported,
    /// No loop matching the requested iteration range
    NoMatchingLoop,
    /// A type reference does not resolve in the type table
    UnresolvedType,
    /// A symbol reference does not resolve in any reachable table
    UnresolvedSymbol,
    /// A table key already exists (type, symbol or declaration table)
    DuplicateKey,
    /// Block start/end delimiters are unbalanced
    UnbalancedBlock,
}

/// Error in the configuration.
#[derive(Error, Debug, Clone)]
pub struct ConfigError {
    /// The error message
    pub message: String,
    /// The kind of configuration error
    pub kind: ConfigErrorKind,
}

impl ConfigError {
    /// Create a new configuration error.
    pub fn new(kind: ConfigErrorKind, message: impl Into<String>) -> Self {
        Self { message: message.into(), kind }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigErrorKind {
    /// Document does not match the configuration schema
    Malformed,
    /// Configuration version is below the engine version
    VersionMismatch,
    /// Two groups share a name, or a group is activated twice
    DuplicateGroup,
    /// A group references a transformation class the engine does not know
    UnknownClass,
    /// A group references a transformation absent from all sets
    UnknownTransformation,
    /// A referenced transformation set document cannot be found
    MissingSet,
    /// A translation-unit trigger is combined with a block transformation
    InvalidTrigger,
}

/// Result type using LooptranError.
pub type LooptranResult<T> = Result<T, LooptranError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directive_error_display() {
        let err = DirectiveError::new(
            DirectiveErrorKind::UnknownClause,
            "unknown clause 'collapse' for loop-fusion",
            12,
        );
        let s = format!("{}", err);
        assert!(s.contains("collapse"));
        assert!(s.contains("line 12"));
    }

    #[test]
    fn test_transform_error_display() {
        let err = TransformError::new(
            TransformErrorKind::IllegalMapping,
            "loop-extract",
            "mapping dimensions too big",
            7,
        );
        let s = format!("{}", err);
        assert!(s.contains("loop-extract"));
        assert!(s.contains("line 7"));
    }

    #[test]
    fn test_top_level_conversion() {
        let err: LooptranError = ConfigError::new(
            ConfigErrorKind::VersionMismatch,
            "configuration version 0.1 is below engine version 0.9",
        )
        .into();
        assert!(format!("{}", err).starts_with("Configuration error"));
    }
}
