//! The concrete syntax tree.
//!
//! Nodes live in one arena owned by [`SyntaxTree`]; a [`NodeId`] is a plain
//! index handle. Each node carries a [`Form`]: the ordered list of its
//! children (tokens and child nodes, semantic and interstitial alike) plus a
//! slot table mapping the node's expected children to positions in that
//! list, plus the state its handler finished in. Parent references are
//! relation-only back-references; ownership runs strictly parent to child
//! through the arena.
//!
//! Serializing a tree concatenates the literal text of its tokens in
//! traversal order, which reproduces the parsed source byte for byte.

use serde::{Deserialize, Serialize};

use crate::lexer::{Token, TokenKind};

use super::nodes::NodeKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Named slots shared across node kinds. A slot records where in a form's
/// ordered child list an expected child landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(usize)]
pub enum Slot {
    Keyword = 0,
    Name,
    Type,
    Value,
    Condition,
    Target,
    Collection,
    Params,
    ReturnType,
    Body,
    Operator,
    Lhs,
    Rhs,
    Callee,
    Index,
    Key,
    ElseValue,
}

/// Coarse handler state a form was left in when its node completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum FormState {
    Empty = 0,
    Started,
    HeaderDone,
    BodyDone,
    Complete,
    /// The handler gave up on part of this node's expected children.
    Recovered,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Child {
    Token(Token),
    Node(NodeId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Form {
    pub children: Vec<Child>,
    slots: Vec<Option<usize>>,
    pub state: u16,
}

impl Form {
    fn new() -> Form {
        Form {
            children: vec![],
            slots: vec![],
            state: FormState::Empty as u16,
        }
    }

    pub fn slot(&self, slot: Slot) -> Option<&Child> {
        let index = (*self.slots.get(slot as usize)?)?;
        self.children.get(index)
    }

    pub fn slot_index(&self, slot: Slot) -> Option<usize> {
        *self.slots.get(slot as usize)?
    }

    fn set_slot(&mut self, slot: Slot, child_index: usize) {
        let index = slot as usize;
        if self.slots.len() <= index {
            self.slots.resize(index + 1, None);
        }
        self.slots[index] = Some(child_index);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxNode {
    pub kind: NodeKind,
    pub form: Form,
    pub parent: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxTree {
    nodes: Vec<SyntaxNode>,
    root: NodeId,
}

impl SyntaxTree {
    pub fn new() -> SyntaxTree {
        SyntaxTree {
            nodes: vec![],
            root: NodeId(0),
        }
    }

    pub fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(SyntaxNode {
            kind,
            form: Form::new(),
            parent: None,
        });
        id
    }

    pub fn set_root(&mut self, root: NodeId) {
        self.root = root;
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &SyntaxNode {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut SyntaxNode {
        &mut self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn set_state(&mut self, id: NodeId, state: FormState) {
        self.node_mut(id).form.state = state as u16;
    }

    /// Append a token to a node's form. Returns its child index.
    pub fn push_token(&mut self, id: NodeId, token: Token) -> usize {
        let form = &mut self.node_mut(id).form;
        form.children.push(Child::Token(token));
        form.children.len() - 1
    }

    /// Append a child node to a parent's form and set the back-reference.
    /// Ownership is strictly tree-shaped: a node is attached exactly once.
    pub fn push_node(&mut self, parent: NodeId, child: NodeId) -> usize {
        debug_assert!(
            self.node(child).parent.is_none(),
            "node {child:?} already has a parent"
        );
        self.node_mut(child).parent = Some(parent);
        let form = &mut self.node_mut(parent).form;
        form.children.push(Child::Node(child));
        form.children.len() - 1
    }

    pub fn assign_slot(&mut self, id: NodeId, slot: Slot, child_index: usize) {
        self.node_mut(id).form.set_slot(slot, child_index);
    }

    pub fn push_token_slot(&mut self, id: NodeId, slot: Slot, token: Token) -> usize {
        let index = self.push_token(id, token);
        self.assign_slot(id, slot, index);
        index
    }

    pub fn push_node_slot(&mut self, parent: NodeId, slot: Slot, child: NodeId) -> usize {
        let index = self.push_node(parent, child);
        self.assign_slot(parent, slot, index);
        index
    }

    pub fn slot(&self, id: NodeId, slot: Slot) -> Option<&Child> {
        self.node(id).form.slot(slot)
    }

    pub fn slot_token(&self, id: NodeId, slot: Slot) -> Option<&Token> {
        match self.slot(id, slot)? {
            Child::Token(token) => Some(token),
            Child::Node(_) => None,
        }
    }

    /// Mutable access to a slot token. Reserved for the sanctioned token
    /// edits: rename transformations and indentation conversion.
    pub fn slot_token_mut(&mut self, id: NodeId, slot: Slot) -> Option<&mut Token> {
        let index = match self.node(id).form.slot(slot)? {
            Child::Token(_) => {
                let slots = &self.node(id).form;
                slots.slot_index(slot)?
            }
            Child::Node(_) => return None,
        };
        match self.node_mut(id).form.children.get_mut(index) {
            Some(Child::Token(token)) => Some(token),
            _ => None,
        }
    }

    pub fn slot_node(&self, id: NodeId, slot: Slot) -> Option<NodeId> {
        match self.slot(id, slot)? {
            Child::Node(node) => Some(*node),
            Child::Token(_) => None,
        }
    }

    /// Direct child nodes, in form order, skipping interstitial tokens.
    pub fn child_nodes(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.node(id).form.children.iter().filter_map(|c| match c {
            Child::Node(node) => Some(*node),
            Child::Token(_) => None,
        })
    }

    pub fn children_of_kind<'a>(
        &'a self,
        id: NodeId,
        kind: &'a NodeKind,
    ) -> impl Iterator<Item = NodeId> + 'a {
        self.child_nodes(id).filter(move |c| self.kind(*c) == kind)
    }

    /// The first token under a node, trivia included.
    pub fn first_token(&self, id: NodeId) -> Option<&Token> {
        for child in &self.node(id).form.children {
            match child {
                Child::Token(token) => return Some(token),
                Child::Node(node) => {
                    if let Some(token) = self.first_token(*node) {
                        return Some(token);
                    }
                }
            }
        }
        None
    }

    pub fn last_token(&self, id: NodeId) -> Option<&Token> {
        for child in self.node(id).form.children.iter().rev() {
            match child {
                Child::Token(token) => return Some(token),
                Child::Node(node) => {
                    if let Some(token) = self.last_token(*node) {
                        return Some(token);
                    }
                }
            }
        }
        None
    }

    /// Start of the first non-trivia token under a node, falling back to any
    /// token. Used to position diagnostics.
    pub fn start_position(&self, id: NodeId) -> (usize, usize) {
        self.tokens_of(id)
            .find(|t| !t.is_trivia())
            .or_else(|| self.first_token(id))
            .map(|t| (t.line, t.column))
            .unwrap_or((1, 0))
    }

    pub fn end_position(&self, id: NodeId) -> (usize, usize) {
        let mut end = None;
        for token in self.tokens_of(id) {
            if !token.is_trivia() {
                end = Some(token.end_position());
            }
        }
        end.or_else(|| self.last_token(id).map(|t| t.end_position()))
            .unwrap_or((1, 0))
    }

    /// Lazy forward iterator over every token of the whole tree.
    pub fn tokens(&self) -> Tokens<'_> {
        self.tokens_of(self.root)
    }

    /// Lazy forward iterator over the tokens under one node.
    pub fn tokens_of(&self, id: NodeId) -> Tokens<'_> {
        Tokens {
            tree: self,
            stack: vec![(id, 0)],
        }
    }

    /// Lazy view over the invalid tokens of the tree.
    pub fn invalid_tokens(&self) -> impl Iterator<Item = &Token> {
        self.tokens().filter(|t| t.kind == TokenKind::Invalid)
    }

    /// Visit every token of every form mutably, in arena order. Used by the
    /// formatter's in-place token rewrites (indentation conversion).
    pub fn for_each_token_mut(&mut self, mut f: impl FnMut(&mut Token)) {
        for node in &mut self.nodes {
            for child in &mut node.form.children {
                if let Child::Token(token) = child {
                    f(token);
                }
            }
        }
    }

    /// Remove token children of one node by index, keeping the slot table
    /// consistent. `indices` must be sorted ascending.
    pub fn remove_token_children(&mut self, id: NodeId, indices: &[usize]) {
        if indices.is_empty() {
            return;
        }
        let form = &mut self.node_mut(id).form;
        for &index in indices.iter().rev() {
            if matches!(form.children.get(index), Some(Child::Token(_))) {
                form.children.remove(index);
                for slot in form.slots.iter_mut() {
                    match slot {
                        Some(s) if *s == index => *slot = None,
                        Some(s) if *s > index => *s -= 1,
                        _ => {}
                    }
                }
            }
        }
    }

    /// Insert a token child at `index` in a node's form, keeping the slot
    /// table consistent.
    pub fn insert_token_child(&mut self, id: NodeId, index: usize, token: Token) {
        let form = &mut self.node_mut(id).form;
        let index = index.min(form.children.len());
        form.children.insert(index, Child::Token(token));
        for slot in form.slots.iter_mut() {
            if let Some(s) = slot {
                if *s >= index {
                    *s += 1;
                }
            }
        }
    }

    /// Reproduce the source text this tree was parsed from.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for token in self.tokens() {
            out.push_str(&token.text);
        }
        out
    }
}

impl Default for SyntaxTree {
    fn default() -> Self {
        SyntaxTree::new()
    }
}

/// Depth-first token cursor. Finite and forward-only; the tree itself can be
/// re-iterated any number of times.
pub struct Tokens<'a> {
    tree: &'a SyntaxTree,
    stack: Vec<(NodeId, usize)>,
}

impl<'a> Iterator for Tokens<'a> {
    type Item = &'a Token;

    fn next(&mut self) -> Option<&'a Token> {
        loop {
            let (node, index) = self.stack.last_mut()?;
            let form = &self.tree.node(*node).form;
            match form.children.get(*index) {
                None => {
                    self.stack.pop();
                }
                Some(Child::Token(token)) => {
                    *index += 1;
                    return Some(token);
                }
                Some(Child::Node(child)) => {
                    *index += 1;
                    let child = *child;
                    self.stack.push((child, 0));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::TokenKind;

    fn token(text: &str) -> Token {
        Token::new(TokenKind::Identifier, text, 1, 0)
    }

    #[test]
    fn test_serialize_in_form_order() {
        let mut tree = SyntaxTree::new();
        let root = tree.alloc(NodeKind::ClassDecl);
        tree.set_root(root);
        let child = tree.alloc(NodeKind::PassStmt);
        tree.push_token(root, token("a"));
        tree.push_node(root, child);
        tree.push_token(child, token("b"));
        tree.push_token(root, token("c"));

        assert_eq!(tree.serialize(), "abc");
    }

    #[test]
    fn test_parent_back_reference() {
        let mut tree = SyntaxTree::new();
        let root = tree.alloc(NodeKind::ClassDecl);
        tree.set_root(root);
        let child = tree.alloc(NodeKind::PassStmt);
        tree.push_node(root, child);

        assert_eq!(tree.node(child).parent, Some(root));
        assert_eq!(tree.node(root).parent, None);
    }

    #[test]
    fn test_slot_lookup() {
        let mut tree = SyntaxTree::new();
        let root = tree.alloc(NodeKind::VariableDecl);
        tree.set_root(root);
        tree.push_token(root, token("leading"));
        tree.push_token_slot(root, Slot::Name, token("speed"));

        let name = tree.slot_token(root, Slot::Name).unwrap();
        assert_eq!(name.text, "speed");
        assert!(tree.slot(root, Slot::Value).is_none());
    }

    #[test]
    fn test_tokens_iterator_is_depth_first() {
        let mut tree = SyntaxTree::new();
        let root = tree.alloc(NodeKind::ClassDecl);
        tree.set_root(root);
        let inner = tree.alloc(NodeKind::ExprStmt);
        let leaf = tree.alloc(NodeKind::ExprNumber);
        tree.push_token(root, token("1"));
        tree.push_node(root, inner);
        tree.push_node(inner, leaf);
        tree.push_token(leaf, token("2"));
        tree.push_token(inner, token("3"));
        tree.push_token(root, token("4"));

        let texts: Vec<_> = tree.tokens().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["1", "2", "3", "4"]);
    }
}
