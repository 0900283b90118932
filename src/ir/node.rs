//! Node kinds and attribute names of the IR tree.
//!
//! The IR exchanged with the front- and back-end is a kinded tree; every
//! element kind the engine manipulates has a variant here, and kinds it
//! does not know pass through untouched as [`NodeKind::Other`].

use std::fmt;

/// The kind of an IR node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Program root element
    Program,
    /// Type table of the program
    TypeTable,
    /// Basic (scalar or array) type entry
    BasicType,
    /// Function type entry
    FunctionType,
    /// Global symbol table
    GlobalSymbols,
    /// Global declaration table
    GlobalDeclarations,
    /// Function definition
    FunctionDefinition,
    /// Name element (function name, declared name)
    Name,
    /// Function-local symbol table
    Symbols,
    /// Function-local declaration table
    Declarations,
    /// Formal parameter list
    Params,
    /// Executable body
    Body,
    /// Pragma statement
    Pragma,
    /// Do statement (counted loop)
    DoStatement,
    /// Expression statement
    ExprStatement,
    /// Assignment statement
    AssignStatement,
    /// Function call expression
    FunctionCall,
    /// Argument list of a function call
    Arguments,
    /// Variable use
    Var,
    /// Variable reference wrapper
    VarRef,
    /// Array reference expression
    ArrayRef,
    /// One subscript of an array reference
    ArrayIndex,
    /// Iteration range of a do statement
    IndexRange,
    /// Lower bound of an index range
    LowerBound,
    /// Upper bound of an index range
    UpperBound,
    /// Step of an index range
    Step,
    /// Variable declaration
    VarDecl,
    /// Symbol table entry
    Id,
    /// Integer constant
    IntConstant,
    /// Any element kind the engine does not interpret
    Other(String),
}

impl NodeKind {
    /// Wire name of this kind in the serialized tree document.
    pub fn as_str(&self) -> &str {
        match self {
            NodeKind::Program => "XcodeProgram",
            NodeKind::TypeTable => "typeTable",
            NodeKind::BasicType => "FbasicType",
            NodeKind::FunctionType => "FfunctionType",
            NodeKind::GlobalSymbols => "globalSymbols",
            NodeKind::GlobalDeclarations => "globalDeclarations",
            NodeKind::FunctionDefinition => "FfunctionDefinition",
            NodeKind::Name => "name",
            NodeKind::Symbols => "symbols",
            NodeKind::Declarations => "declarations",
            NodeKind::Params => "params",
            NodeKind::Body => "body",
            NodeKind::Pragma => "FpragmaStatement",
            NodeKind::DoStatement => "FdoStatement",
            NodeKind::ExprStatement => "exprStatement",
            NodeKind::AssignStatement => "FassignStatement",
            NodeKind::FunctionCall => "functionCall",
            NodeKind::Arguments => "arguments",
            NodeKind::Var => "Var",
            NodeKind::VarRef => "varRef",
            NodeKind::ArrayRef => "FarrayRef",
            NodeKind::ArrayIndex => "arrayIndex",
            NodeKind::IndexRange => "indexRange",
            NodeKind::LowerBound => "lowerBound",
            NodeKind::UpperBound => "upperBound",
            NodeKind::Step => "step",
            NodeKind::VarDecl => "varDecl",
            NodeKind::Id => "id",
            NodeKind::IntConstant => "FintConstant",
            NodeKind::Other(name) => name,
        }
    }

    /// Resolve a wire name to a kind. Unknown names become [`NodeKind::Other`].
    pub fn from_name(name: &str) -> NodeKind {
        match name {
            "XcodeProgram" => NodeKind::Program,
            "typeTable" => NodeKind::TypeTable,
            "FbasicType" => NodeKind::BasicType,
            "FfunctionType" => NodeKind::FunctionType,
            "globalSymbols" => NodeKind::GlobalSymbols,
            "globalDeclarations" => NodeKind::GlobalDeclarations,
            "FfunctionDefinition" => NodeKind::FunctionDefinition,
            "name" => NodeKind::Name,
            "symbols" => NodeKind::Symbols,
            "declarations" => NodeKind::Declarations,
            "params" => NodeKind::Params,
            "body" => NodeKind::Body,
            "FpragmaStatement" => NodeKind::Pragma,
            "FdoStatement" => NodeKind::DoStatement,
            "exprStatement" => NodeKind::ExprStatement,
            "FassignStatement" => NodeKind::AssignStatement,
            "functionCall" => NodeKind::FunctionCall,
            "arguments" => NodeKind::Arguments,
            "Var" => NodeKind::Var,
            "varRef" => NodeKind::VarRef,
            "FarrayRef" => NodeKind::ArrayRef,
            "arrayIndex" => NodeKind::ArrayIndex,
            "indexRange" => NodeKind::IndexRange,
            "lowerBound" => NodeKind::LowerBound,
            "upperBound" => NodeKind::UpperBound,
            "step" => NodeKind::Step,
            "varDecl" => NodeKind::VarDecl,
            "id" => NodeKind::Id,
            "FintConstant" => NodeKind::IntConstant,
            other => NodeKind::Other(other.to_string()),
        }
    }

    /// Whether nodes of this kind appear as executable statements in a body.
    pub fn is_statement(&self) -> bool {
        matches!(
            self,
            NodeKind::Pragma
                | NodeKind::DoStatement
                | NodeKind::ExprStatement
                | NodeKind::AssignStatement
        )
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Attribute names used on IR nodes.
pub mod attr {
    /// Type key referencing the type table
    pub const TYPE: &str = "type";
    /// Scope of a symbol: local, global or param
    pub const SCOPE: &str = "scope";
    /// Source line number
    pub const LINENO: &str = "lineno";
    /// Source file name
    pub const FILE: &str = "file";
    /// Element type referenced by a basic type
    pub const REF: &str = "ref";
    /// Dimension count of a basic type
    pub const DIMENSIONS: &str = "dimensions";
    /// Return type of a function type
    pub const RETURN_TYPE: &str = "return_type";
    /// Storage class of a symbol table entry
    pub const SCLASS: &str = "sclass";
}

/// Scope attribute values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Function-local symbol
    Local,
    /// Global symbol
    Global,
    /// Formal parameter
    Param,
}

impl Scope {
    /// Wire value of this scope.
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Local => "local",
            Scope::Global => "global",
            Scope::Param => "param",
        }
    }

    /// Resolve a wire value to a scope.
    pub fn from_name(value: &str) -> Option<Scope> {
        match value {
            "local" => Some(Scope::Local),
            "global" => Some(Scope::Global),
            "param" => Some(Scope::Param),
            _ => None,
        }
    }
}
