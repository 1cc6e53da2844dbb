//! Per-file symbol table and the lexical scope stack.
//!
//! Symbols live in one arena per file. The scope stack only exists while an
//! analysis pass walks a method body; scopes are created at class boundary,
//! method body, lambda body and each block body. Lookup walks from the
//! innermost frame outward; anything not found locally is the semantic
//! model's job (class members, base chain, globals).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::parser::NodeId;

use super::providers::ParamInfo;
use super::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SymbolId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymbolKind {
    Variable,
    Constant,
    Parameter,
    Method,
    Signal,
    Enum,
    EnumValue,
    InnerClass,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    /// The declared (annotated) type; inference may refine it.
    pub declared_type: Option<Type>,
    /// The declaration node, for go-to-definition and rename.
    pub declaration: NodeId,
    /// Parameter list for methods and signals, with default-present flags.
    pub parameters: Vec<ParamInfo>,
}

/// The symbols of one file plus the reference-info records binding
/// identifier nodes back to their declarations.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    members: HashMap<String, SymbolId>,
    references: HashMap<SymbolId, Vec<NodeId>>,
    by_declaration: HashMap<NodeId, SymbolId>,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable::default()
    }

    pub fn add(&mut self, symbol: Symbol) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        self.by_declaration.insert(symbol.declaration, id);
        self.symbols.push(symbol);
        id
    }

    /// Register a class-level member. The first declaration of a name wins,
    /// matching the single-answer lookup contract.
    pub fn add_member(&mut self, symbol: Symbol) -> SymbolId {
        let name = symbol.name.clone();
        let id = self.add(symbol);
        self.members.entry(name).or_insert(id);
        id
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0 as usize]
    }

    pub fn symbol_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.0 as usize]
    }

    pub fn member(&self, name: &str) -> Option<SymbolId> {
        self.members.get(name).copied()
    }

    pub fn members(&self) -> impl Iterator<Item = (&String, &SymbolId)> {
        self.members.iter()
    }

    pub fn symbol_of_declaration(&self, declaration: NodeId) -> Option<SymbolId> {
        self.by_declaration.get(&declaration).copied()
    }

    pub fn record_reference(&mut self, id: SymbolId, node: NodeId) {
        self.references.entry(id).or_default().push(node);
    }

    /// All identifier nodes in this file bound to `id`.
    pub fn references_of(&self, id: SymbolId) -> &[NodeId] {
        self.references
            .get(&id)
            .map(|refs| refs.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// The transient scope stack used while walking one method. Innermost frame
/// at the end; lookup walks backwards.
#[derive(Debug, Clone, Default)]
pub struct ScopeStack {
    frames: Vec<HashMap<String, SymbolId>>,
}

impl ScopeStack {
    pub fn new() -> ScopeStack {
        ScopeStack {
            frames: vec![HashMap::new()],
        }
    }

    pub fn enter(&mut self) {
        self.frames.push(HashMap::new());
    }

    pub fn exit(&mut self) {
        self.frames.pop();
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn declare(&mut self, name: impl Into<String>, id: SymbolId) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.into(), id);
        }
    }

    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(name).copied())
    }
}

/// Outcome of a name lookup, per the documented order. Lookup never yields
/// more than one answer; the first hit wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Declared in this file.
    Local(SymbolId),
    /// Known through a runtime provider (base member, global class,
    /// built-in); carries the name it resolved under and its type if known.
    External(String, Option<Type>),
    Unresolved,
}

impl Resolution {
    pub fn is_unresolved(&self) -> bool {
        matches!(self, Resolution::Unresolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbol(name: &str, kind: SymbolKind, declaration: u32) -> Symbol {
        Symbol {
            name: name.into(),
            kind,
            declared_type: None,
            declaration: NodeId(declaration),
            parameters: vec![],
        }
    }

    #[test]
    fn test_scope_shadowing_and_exit() {
        let mut table = SymbolTable::new();
        let outer = table.add(symbol("x", SymbolKind::Variable, 1));
        let inner = table.add(symbol("x", SymbolKind::Variable, 2));

        let mut scopes = ScopeStack::new();
        scopes.declare("x", outer);
        scopes.enter();
        scopes.declare("x", inner);
        assert_eq!(scopes.lookup("x"), Some(inner));
        scopes.exit();
        assert_eq!(scopes.lookup("x"), Some(outer));
    }

    #[test]
    fn test_first_member_wins() {
        let mut table = SymbolTable::new();
        let first = table.add_member(symbol("speed", SymbolKind::Variable, 1));
        let _second = table.add_member(symbol("speed", SymbolKind::Variable, 2));
        assert_eq!(table.member("speed"), Some(first));
    }

    #[test]
    fn test_reference_records() {
        let mut table = SymbolTable::new();
        let id = table.add(symbol("speed", SymbolKind::Variable, 1));
        table.record_reference(id, NodeId(10));
        table.record_reference(id, NodeId(20));
        assert_eq!(table.references_of(id), &[NodeId(10), NodeId(20)]);
        assert_eq!(table.symbol_of_declaration(NodeId(1)), Some(id));
    }
}
