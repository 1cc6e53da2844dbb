//! The statements traverser.
//!
//! Flow-sensitive analyses need to know when traversal enters and leaves a
//! conditional region. This traverser visits the statements of one method
//! (or any statement list) and calls `before_branch`/`after_branch` around
//! every if-branch, elif-branch, else-branch, for-body, while-body and
//! match-case body, in source order.

use crate::parser::{NodeId, NodeKind, Slot, SyntaxTree};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchKind {
    If,
    Elif,
    Else,
    ForBody,
    WhileBody,
    MatchCase,
}

pub trait StatementVisitor {
    /// Called for every statement before any of its branch bodies.
    fn on_statement(&mut self, tree: &SyntaxTree, node: NodeId) {
        let _ = (tree, node);
    }

    fn before_branch(&mut self, tree: &SyntaxTree, kind: BranchKind, branch: NodeId) {
        let _ = (tree, kind, branch);
    }

    fn after_branch(&mut self, tree: &SyntaxTree, kind: BranchKind, branch: NodeId) {
        let _ = (tree, kind, branch);
    }
}

/// Traverse the statements of `list` (a `StatementList` node).
pub fn traverse_statements(tree: &SyntaxTree, list: NodeId, visitor: &mut dyn StatementVisitor) {
    let statements: Vec<NodeId> = tree.child_nodes(list).collect();
    for statement in statements {
        visit_statement(tree, statement, visitor);
    }
}

/// Traverse the body of a method declaration.
pub fn traverse_method(tree: &SyntaxTree, method: NodeId, visitor: &mut dyn StatementVisitor) {
    if let Some(body) = tree.slot_node(method, Slot::Body) {
        traverse_statements(tree, body, visitor);
    }
}

fn visit_statement(tree: &SyntaxTree, node: NodeId, visitor: &mut dyn StatementVisitor) {
    visitor.on_statement(tree, node);

    match tree.kind(node) {
        NodeKind::IfStmt => {
            for branch in tree.child_nodes(node).collect::<Vec<_>>() {
                let kind = match tree.kind(branch) {
                    NodeKind::IfBranch => BranchKind::If,
                    NodeKind::ElifBranch => BranchKind::Elif,
                    NodeKind::ElseBranch => BranchKind::Else,
                    _ => continue,
                };
                visit_branch(tree, kind, branch, visitor);
            }
        }
        NodeKind::ForStmt => visit_branch(tree, BranchKind::ForBody, node, visitor),
        NodeKind::WhileStmt => visit_branch(tree, BranchKind::WhileBody, node, visitor),
        NodeKind::MatchStmt => {
            if let Some(cases) = tree.slot_node(node, Slot::Body) {
                for case in tree.child_nodes(cases).collect::<Vec<_>>() {
                    if tree.kind(case) == &NodeKind::MatchCase {
                        visit_branch(tree, BranchKind::MatchCase, case, visitor);
                    }
                }
            }
        }
        _ => {}
    }
}

fn visit_branch(
    tree: &SyntaxTree,
    kind: BranchKind,
    branch: NodeId,
    visitor: &mut dyn StatementVisitor,
) {
    visitor.before_branch(tree, kind, branch);
    if let Some(body) = tree.slot_node(branch, Slot::Body) {
        traverse_statements(tree, body, visitor);
    }
    visitor.after_branch(tree, kind, branch);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[derive(Default)]
    struct BranchRecorder {
        events: Vec<String>,
    }

    impl StatementVisitor for BranchRecorder {
        fn on_statement(&mut self, tree: &SyntaxTree, node: NodeId) {
            self.events.push(format!("stmt:{:?}", tree.kind(node)));
        }

        fn before_branch(&mut self, _tree: &SyntaxTree, kind: BranchKind, _branch: NodeId) {
            self.events.push(format!("enter:{kind:?}"));
        }

        fn after_branch(&mut self, _tree: &SyntaxTree, kind: BranchKind, _branch: NodeId) {
            self.events.push(format!("leave:{kind:?}"));
        }
    }

    #[test]
    fn test_branch_hook_order() {
        let source = "func f():\n\tif a:\n\t\tpass\n\telif b:\n\t\tpass\n\telse:\n\t\tpass\n";
        let outcome = parse(source);
        let body = outcome
            .tree
            .slot_node(outcome.tree.root(), Slot::Body)
            .unwrap();
        let method = outcome.tree.child_nodes(body).next().unwrap();

        let mut recorder = BranchRecorder::default();
        traverse_method(&outcome.tree, method, &mut recorder);

        let branches: Vec<_> = recorder
            .events
            .iter()
            .filter(|e| e.starts_with("enter:"))
            .collect();
        assert_eq!(branches, vec!["enter:If", "enter:Elif", "enter:Else"]);
    }

    #[test]
    fn test_match_case_hooks() {
        let source = "func f():\n\tmatch x:\n\t\t1:\n\t\t\tpass\n\t\t_:\n\t\t\tpass\n";
        let outcome = parse(source);
        let body = outcome
            .tree
            .slot_node(outcome.tree.root(), Slot::Body)
            .unwrap();
        let method = outcome.tree.child_nodes(body).next().unwrap();

        let mut recorder = BranchRecorder::default();
        traverse_method(&outcome.tree, method, &mut recorder);

        let cases = recorder
            .events
            .iter()
            .filter(|e| *e == "enter:MatchCase")
            .count();
        assert_eq!(cases, 2);
    }
}
