//! Structured form of a parsed directive.

use crate::ir::range::IterationRange;
use std::fmt;

/// The kind of a directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveKind {
    /// Fuse the following loop with its group partner
    LoopFusion,
    /// Extract a loop out of the called function
    LoopExtract,
    /// Reorder the following loop nest
    LoopInterchange,
    /// Reshape array accesses in the following region
    ArrayTransform,
    /// Wrap the following statement in accelerator directives
    Parallelize,
    /// Delete the delimited statements
    Remove,
    /// Close a block directive
    End,
    /// Cache the delimited accesses
    Kcache,
}

impl DirectiveKind {
    /// Directive keyword as written in the source.
    pub fn keyword(&self) -> &'static str {
        match self {
            DirectiveKind::LoopFusion => "loop-fusion",
            DirectiveKind::LoopExtract => "loop-extract",
            DirectiveKind::LoopInterchange => "loop-interchange",
            DirectiveKind::ArrayTransform => "array-transform",
            DirectiveKind::Parallelize => "parallelize",
            DirectiveKind::Remove => "remove",
            DirectiveKind::End => "end",
            DirectiveKind::Kcache => "kcache",
        }
    }

    /// Resolve a keyword to a directive kind.
    pub fn from_keyword(keyword: &str) -> Option<DirectiveKind> {
        match keyword {
            "loop-fusion" => Some(DirectiveKind::LoopFusion),
            "loop-extract" => Some(DirectiveKind::LoopExtract),
            "loop-interchange" => Some(DirectiveKind::LoopInterchange),
            "array-transform" => Some(DirectiveKind::ArrayTransform),
            "parallelize" => Some(DirectiveKind::Parallelize),
            "remove" => Some(DirectiveKind::Remove),
            "end" => Some(DirectiveKind::End),
            "kcache" => Some(DirectiveKind::Kcache),
            _ => None,
        }
    }
}

impl fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.keyword())
    }
}

/// A loop iteration range supplied by a directive clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeClause {
    /// Induction variable name
    pub induction: String,
    /// Lower bound expression text
    pub lower: String,
    /// Upper bound expression text
    pub upper: String,
    /// Step expression text, `1` when omitted
    pub step: String,
}

impl RangeClause {
    /// Whether this clause describes the same iteration space as a loop.
    pub fn matches(&self, range: &IterationRange) -> bool {
        self.induction == range.induction
            && self.lower == range.lower
            && self.upper == range.upper
            && self.step == range.step
    }
}

impl fmt::Display for RangeClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={}:{}:{}",
            self.induction, self.lower, self.upper, self.step
        )
    }
}

/// One variable of a mapping clause.
///
/// `a/b` pairs the call-site name `a` with the callee parameter name `b`;
/// a bare name uses the same name on both sides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingVar {
    /// Name at the call site
    pub arg: String,
    /// Name inside the called function
    pub fct: String,
}

impl MappingVar {
    /// Create a mapping variable with identical names on both sides.
    pub fn same(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            arg: name.clone(),
            fct: name,
        }
    }

    /// Create a mapping variable pairing a call-site name with a callee name.
    pub fn pair(arg: impl Into<String>, fct: impl Into<String>) -> Self {
        Self {
            arg: arg.into(),
            fct: fct.into(),
        }
    }
}

impl fmt::Display for MappingVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.arg == self.fct {
            write!(f, "{}", self.arg)
        } else {
            write!(f, "{}/{}", self.arg, self.fct)
        }
    }
}

/// One `map(<mapped>:<mapping>)` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingClause {
    /// Array variables being mapped
    pub mapped: Vec<MappingVar>,
    /// Subscript variables mapping them
    pub mapping: Vec<MappingVar>,
}

impl MappingClause {
    /// Number of dimensions consumed by this mapping.
    pub fn mapped_dimensions(&self) -> usize {
        self.mapping.len()
    }
}

impl fmt::Display for MappingClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mapped: Vec<String> = self.mapped.iter().map(|v| v.to_string()).collect();
        let mapping: Vec<String> = self.mapping.iter().map(|v| v.to_string()).collect();
        write!(f, "{}:{}", mapped.join(","), mapping.join(","))
    }
}

/// A parsed directive: kind plus clause values.
#[derive(Debug, Clone, Default)]
pub struct Directive {
    /// Directive kind, `None` only for the default-constructed placeholder
    pub kind: Option<DirectiveKind>,
    /// Source line of the pragma
    pub line: u32,
    /// Iteration range clause
    pub range: Option<RangeClause>,
    /// Mapping clauses, in source order
    pub mappings: Vec<MappingClause>,
    /// Group label
    pub group: Option<String>,
    /// Fusion flag (extraction chains into a fusion)
    pub fusion: bool,
    /// Parallel accelerator flag
    pub parallel: bool,
    /// Additional accelerator option text
    pub acc: Option<String>,
    /// Induction name list (interchange order)
    pub names: Vec<String>,
    /// Keyword closed by an `end` directive
    pub end_target: Option<DirectiveKind>,
}

impl Directive {
    /// Create an empty directive of the given kind.
    pub fn new(kind: DirectiveKind, line: u32) -> Self {
        Self {
            kind: Some(kind),
            line,
            ..Self::default()
        }
    }

    /// Whether this is a default-constructed placeholder with no content.
    pub fn is_placeholder(&self) -> bool {
        self.kind.is_none()
    }

    /// Group label, empty string when absent.
    pub fn group_label(&self) -> &str {
        self.group.as_deref().unwrap_or("")
    }
}
