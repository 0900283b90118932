//! # looptran - Directive-Driven Source-to-Source Transformation Engine
//!
//! looptran rewrites array-oriented numerical programs at the IR level:
//! it consumes a tree-shaped intermediate representation produced by a
//! front-end, applies a configured pipeline of transformations steered by
//! in-source directives, and emits an equivalent IR for a companion
//! back-end to render as source text.
//!
//! ## Architecture
//!
//! ```text
//! IR document → scan directives → analyze → pair → apply → IR document
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use looptran::prelude::*;
//!
//! let mut program = looptran::ir::read_program(&document)?;
//! let config = Configuration::builtin();
//! looptran::translate(&mut program, &config)?;
//! let output = looptran::ir::write_program(&program);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod directive;
pub mod engine;
pub mod ir;
pub mod utils;

// Re-export commonly used types
pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    pub use crate::config::{Configuration, GroupConfiguration, GroupKind, TriggerKind};
    pub use crate::directive::{Directive, DirectiveKind, MappingClause, RangeClause};
    pub use crate::engine::{TransformContext, Transformation, Transformer};
    pub use crate::ir::{
        read_program, write_program, Arena, IterationRange, NodeId, NodeKind, Program, Table,
    };
    pub use crate::utils::errors::*;
}

use crate::config::Configuration;
use crate::ir::Program;
use crate::utils::errors::LooptranResult;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Run the transformation pipeline over a program document.
///
/// Analysis failures are recorded as diagnostics on the program and do not
/// stop the pipeline; an error return means the pipeline aborted and the
/// document must not be emitted.
pub fn translate(program: &mut Program, config: &Configuration) -> LooptranResult<()> {
    let mut transformer = engine::Transformer::new(config);
    transformer.run(program)
}

/// Read a serialized document, transform it and return the program.
pub fn translate_document(input: &str, config: &Configuration) -> LooptranResult<Program> {
    let mut program = ir::read_program(input)?;
    translate(&mut program, config)?;
    Ok(program)
}
