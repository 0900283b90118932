//! The program document: arena, table roots and the diagnostic surface.

use crate::ir::arena::{Arena, NodeId};
use crate::ir::node::NodeKind;
use crate::ir::tables::Table;
use crate::utils::errors::{DocumentError, DocumentErrorKind};

/// A recorded diagnostic: message plus the source lines it refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Human-readable message
    pub message: String,
    /// Source lines the message refers to
    pub lines: Vec<u32>,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.lines.is_empty() {
            write!(f, "{}", self.message)
        } else {
            let lines: Vec<String> = self.lines.iter().map(|l| l.to_string()).collect();
            write!(f, "{} (line {})", self.message, lines.join(", "))
        }
    }
}

/// A complete program document.
///
/// The document exclusively owns all nodes; the type table and the global
/// symbol and declaration tables are indices into that ownership. Function
/// definitions live under the global declaration table.
#[derive(Debug, Clone)]
pub struct Program {
    /// The node arena
    pub arena: Arena,
    root: NodeId,
    type_table: Table,
    global_symbols: Table,
    global_declarations: NodeId,
    errors: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,
}

impl Program {
    /// Create an empty program with its three table roots.
    pub fn new() -> Self {
        let mut arena = Arena::new();
        let root = arena.alloc(NodeKind::Program);
        let type_table = arena.alloc(NodeKind::TypeTable);
        let global_symbols = arena.alloc(NodeKind::GlobalSymbols);
        let global_declarations = arena.alloc(NodeKind::GlobalDeclarations);
        arena.append(root, type_table).ok();
        arena.append(root, global_symbols).ok();
        arena.append(root, global_declarations).ok();
        Self {
            arena,
            root,
            type_table: Table::new(type_table),
            global_symbols: Table::new(global_symbols),
            global_declarations,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Wrap an arena whose root was produced by the front-end.
    ///
    /// Fails when the root is not a program element or one of the three
    /// table roots is absent.
    pub fn from_parts(arena: Arena, root: NodeId) -> Result<Self, DocumentError> {
        if arena.kind(root) != &NodeKind::Program {
            return Err(DocumentError::new(
                DocumentErrorKind::Malformed,
                format!("document root is {}, not a program", arena.kind(root)),
            ));
        }
        let type_table = arena.find(root, &NodeKind::TypeTable).ok_or_else(|| {
            DocumentError::new(DocumentErrorKind::MissingElement, "program has no type table")
        })?;
        let global_symbols = arena.find(root, &NodeKind::GlobalSymbols).ok_or_else(|| {
            DocumentError::new(
                DocumentErrorKind::MissingElement,
                "program has no global symbol table",
            )
        })?;
        let global_declarations =
            arena.find(root, &NodeKind::GlobalDeclarations).ok_or_else(|| {
                DocumentError::new(
                    DocumentErrorKind::MissingElement,
                    "program has no global declaration table",
                )
            })?;
        Ok(Self {
            arena,
            root,
            type_table: Table::new(type_table),
            global_symbols: Table::new(global_symbols),
            global_declarations,
            errors: Vec::new(),
            warnings: Vec::new(),
        })
    }

    /// The program root node.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The type table.
    pub fn type_table(&self) -> Table {
        self.type_table
    }

    /// The global symbol table.
    pub fn global_symbols(&self) -> Table {
        self.global_symbols
    }

    /// The global declaration table node (holds function definitions).
    pub fn global_declarations(&self) -> NodeId {
        self.global_declarations
    }

    /// All function definitions, in document order.
    pub fn functions(&self) -> Vec<NodeId> {
        self.arena
            .find_all(self.global_declarations, &NodeKind::FunctionDefinition)
    }

    /// Find a function definition by name.
    pub fn find_function(&self, name: &str) -> Option<NodeId> {
        self.functions()
            .into_iter()
            .find(|&fct| self.function_name(fct) == Some(name))
    }

    /// Name of a function definition.
    pub fn function_name<'a>(&'a self, fct: NodeId) -> Option<&'a str> {
        let name = self
            .arena
            .node(fct)
            .children()
            .iter()
            .copied()
            .find(|&c| self.arena.kind(c) == &NodeKind::Name)?;
        self.arena.text(name)
    }

    /// Name node of a function definition.
    pub fn function_name_node(&self, fct: NodeId) -> Option<NodeId> {
        self.arena
            .node(fct)
            .children()
            .iter()
            .copied()
            .find(|&c| self.arena.kind(c) == &NodeKind::Name)
    }

    /// Local symbol table of a function, when present.
    pub fn function_symbols(&self, fct: NodeId) -> Option<Table> {
        self.arena
            .node(fct)
            .children()
            .iter()
            .copied()
            .find(|&c| self.arena.kind(c) == &NodeKind::Symbols)
            .map(Table::new)
    }

    /// Local declaration table of a function, when present.
    pub fn function_declarations(&self, fct: NodeId) -> Option<Table> {
        self.arena
            .node(fct)
            .children()
            .iter()
            .copied()
            .find(|&c| self.arena.kind(c) == &NodeKind::Declarations)
            .map(Table::new)
    }

    /// Body of a function definition.
    pub fn function_body(&self, fct: NodeId) -> Option<NodeId> {
        self.arena
            .node(fct)
            .children()
            .iter()
            .copied()
            .find(|&c| self.arena.kind(c) == &NodeKind::Body)
    }

    /// All pragma statements, in document order.
    pub fn pragmas(&self) -> Vec<NodeId> {
        self.arena.find_all(self.root, &NodeKind::Pragma)
    }

    /// Record an error against a source line.
    ///
    /// Empty messages and zero lines are silently ignored.
    pub fn add_error(&mut self, message: &str, line: u32) {
        if let Some(diag) = Self::make_diagnostic(message, &[line]) {
            self.errors.push(diag);
        }
    }

    /// Record an error against several source lines.
    pub fn add_error_lines(&mut self, message: &str, lines: &[u32]) {
        if let Some(diag) = Self::make_diagnostic(message, lines) {
            self.errors.push(diag);
        }
    }

    /// Record a warning against a source line.
    ///
    /// Empty messages and zero lines are silently ignored.
    pub fn add_warning(&mut self, message: &str, line: u32) {
        if let Some(diag) = Self::make_diagnostic(message, &[line]) {
            self.warnings.push(diag);
        }
    }

    /// Record a warning against several source lines.
    pub fn add_warning_lines(&mut self, message: &str, lines: &[u32]) {
        if let Some(diag) = Self::make_diagnostic(message, lines) {
            self.warnings.push(diag);
        }
    }

    fn make_diagnostic(message: &str, lines: &[u32]) -> Option<Diagnostic> {
        if message.is_empty() {
            return None;
        }
        let lines: Vec<u32> = lines.iter().copied().filter(|&l| l > 0).collect();
        if lines.is_empty() {
            return None;
        }
        Some(Diagnostic {
            message: message.to_string(),
            lines,
        })
    }

    /// Recorded errors, in order.
    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    /// Recorded warnings, in order.
    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    /// Whether any error was recorded.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder;

    #[test]
    fn test_empty_program_shape() {
        let program = Program::new();
        assert_eq!(program.arena.kind(program.root()), &NodeKind::Program);
        assert!(program.functions().is_empty());
        assert!(program.pragmas().is_empty());
    }

    #[test]
    fn test_diagnostic_filter() {
        let mut program = Program::new();
        program.add_error("", 0);
        program.add_error("", 12);
        program.add_error("message without line", 0);
        program.add_error_lines("message without lines", &[]);
        program.add_error_lines("zeros only", &[0, 0]);
        assert!(program.errors().is_empty());

        program.add_error("real error", 3);
        assert_eq!(program.errors().len(), 1);

        program.add_warning("", 0);
        program.add_warning_lines("", &[1, 2]);
        assert!(program.warnings().is_empty());
        program.add_warning("real warning", 4);
        assert_eq!(program.warnings().len(), 1);
        assert!(!format!("{}", &program.warnings()[0]).is_empty());
    }

    #[test]
    fn test_find_function() {
        let mut program = Program::new();
        let fct = program.arena.alloc(NodeKind::FunctionDefinition);
        let name = builder::name(&mut program.arena, "f", "F1");
        let body = program.arena.alloc(NodeKind::Body);
        program.arena.append(fct, name).unwrap();
        program.arena.append(fct, body).unwrap();
        let decls = program.global_declarations();
        program.arena.append(decls, fct).unwrap();

        assert_eq!(program.find_function("f"), Some(fct));
        assert_eq!(program.find_function("g"), None);
        assert_eq!(program.function_name(fct), Some("f"));
        assert_eq!(program.function_body(fct), Some(body));
    }
}
