//! Directive parsing: pragma text to structured directives.
//!
//! The engine's own pragmas start with the `claw` prefix; the accelerator
//! pragmas it emits use the `acc` prefix. [`parse_pragma`] recognizes the
//! engine prefix, strips it and parses the remainder.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::{Directive, DirectiveKind, MappingClause, MappingVar, RangeClause};
pub use parser::parse;

/// Pragma prefix of the directives this engine consumes.
pub const DIRECTIVE_PREFIX: &str = "claw";

/// Pragma prefix of the accelerator directives this engine emits.
pub const ACC_PREFIX: &str = "acc";

/// Whether the pragma text addresses this engine.
pub fn is_engine_pragma(text: &str) -> bool {
    strip_prefix(text).is_some()
}

/// Strip the engine prefix from pragma text.
pub fn strip_prefix(text: &str) -> Option<&str> {
    let trimmed = text.trim_start();
    let rest = trimmed.strip_prefix(DIRECTIVE_PREFIX)?;
    // The prefix must be a whole word: "clawless" is not ours.
    match rest.chars().next() {
        Some(c) if !c.is_whitespace() => None,
        _ => Some(rest.trim_start()),
    }
}

/// Parse pragma text carrying the engine prefix.
///
/// Returns `None` when the pragma addresses another tool.
pub fn parse_pragma(
    text: &str,
    line: u32,
) -> Option<Result<Directive, crate::utils::errors::DirectiveError>> {
    strip_prefix(text).map(|rest| parse(rest, line))
}
