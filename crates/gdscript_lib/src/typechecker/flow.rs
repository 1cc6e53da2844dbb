//! Flow-sensitive type narrowing.
//!
//! Walks one method with the statements traverser and tracks, per local
//! variable, the type in effect at each statement. `x is T` narrows `x` to
//! `T` inside the guarded branch; each elif starts from the widened state;
//! assignments inside a branch merge back through the common-supertype rule
//! when the branch closes. This is an approximation, not path-sensitive
//! constraint tracking.

use std::collections::HashMap;

use crate::parser::{BinaryOp, NodeId, NodeKind, Slot, SyntaxTree};
use crate::walker::statements::{traverse_method, BranchKind, StatementVisitor};

use super::{type_from_node, SemanticModel, Type};

/// Narrowed types per statement: the environment in effect when execution
/// reaches each statement.
#[derive(Debug, Clone, Default)]
pub struct FlowTypes {
    at_statement: HashMap<NodeId, HashMap<String, Type>>,
}

impl FlowTypes {
    /// The type `name` has when execution reaches `statement`.
    pub fn type_at(&self, statement: NodeId, name: &str) -> Option<&Type> {
        self.at_statement.get(&statement)?.get(name)
    }

    pub fn names_at(&self, statement: NodeId) -> Option<&HashMap<String, Type>> {
        self.at_statement.get(&statement)
    }
}

/// Analyze one method declaration.
pub fn analyze_method(model: &SemanticModel, method: NodeId) -> FlowTypes {
    let mut analyzer = FlowAnalyzer {
        model,
        frames: vec![Frame::default()],
        result: FlowTypes::default(),
    };

    // seed the environment with the parameters
    if let Some(params) = model.tree().slot_node(method, Slot::Params) {
        for param in model.tree().child_nodes(params) {
            if model.tree().kind(param) != &NodeKind::Parameter {
                continue;
            }
            let Some(name) = model.tree().slot_token(param, Slot::Name) else {
                continue;
            };
            let ty = model
                .tree()
                .slot_node(param, Slot::Type)
                .and_then(|n| type_from_node(model.tree(), n))
                .unwrap_or(Type::Variant);
            analyzer.insert(name.text.clone(), ty);
        }
    }

    traverse_method(model.tree(), method, &mut analyzer);
    analyzer.result
}

#[derive(Debug, Clone, Default)]
struct Frame {
    env: HashMap<String, Type>,
    /// Variables assigned inside this frame, for the merge on close.
    assigned: HashMap<String, Type>,
}

struct FlowAnalyzer<'m> {
    model: &'m SemanticModel,
    frames: Vec<Frame>,
    result: FlowTypes,
}

impl<'m> FlowAnalyzer<'m> {
    fn insert(&mut self, name: String, ty: Type) {
        if let Some(frame) = self.frames.last_mut() {
            frame.env.insert(name, ty);
        }
    }

    fn lookup(&self, name: &str) -> Option<&Type> {
        self.frames.iter().rev().find_map(|f| f.env.get(name))
    }

    fn snapshot(&self) -> HashMap<String, Type> {
        let mut flat = HashMap::new();
        for frame in &self.frames {
            for (name, ty) in &frame.env {
                flat.insert(name.clone(), ty.clone());
            }
        }
        flat
    }

    fn record_assignment(&mut self, name: String, ty: Type) {
        if let Some(frame) = self.frames.last_mut() {
            frame.env.insert(name.clone(), ty.clone());
            frame.assigned.insert(name, ty);
        }
    }

    /// The `x is T` pattern in a branch condition.
    fn narrowing_of(&self, condition: NodeId) -> Option<(String, Type)> {
        let tree = self.model.tree();
        if tree.kind(condition) != &NodeKind::ExprBinary(BinaryOp::Is) {
            return None;
        }
        let lhs = tree.slot_node(condition, Slot::Lhs)?;
        if tree.kind(lhs) != &NodeKind::ExprIdentifier {
            return None;
        }
        let name = tree.slot_token(lhs, Slot::Name)?.text.clone();
        let rhs = tree.slot_node(condition, Slot::Rhs)?;
        let ty = type_from_node(tree, rhs)?;
        Some((name, ty))
    }
}

impl<'m> StatementVisitor for FlowAnalyzer<'m> {
    fn on_statement(&mut self, tree: &SyntaxTree, node: NodeId) {
        // record the environment in effect *entering* the statement
        self.result.at_statement.insert(node, self.snapshot());

        match tree.kind(node) {
            NodeKind::VariableDecl => {
                let Some(name) = tree.slot_token(node, Slot::Name) else {
                    return;
                };
                let declared = tree
                    .slot_node(node, Slot::Type)
                    .and_then(|n| type_from_node(tree, n));
                let ty = declared.unwrap_or_else(|| {
                    tree.slot_node(node, Slot::Value)
                        .map(|v| self.model.infer_type(v).ty)
                        .unwrap_or(Type::Variant)
                });
                self.insert(name.text.clone(), ty);
            }
            NodeKind::ExprStmt => {
                let Some(value) = tree.slot_node(node, Slot::Value) else {
                    return;
                };
                if let NodeKind::ExprBinary(op) = tree.kind(value) {
                    if !op.is_assignment() {
                        return;
                    }
                    let Some(lhs) = tree.slot_node(value, Slot::Lhs) else {
                        return;
                    };
                    if tree.kind(lhs) != &NodeKind::ExprIdentifier {
                        return;
                    }
                    let Some(name) = tree.slot_token(lhs, Slot::Name) else {
                        return;
                    };
                    let ty = tree
                        .slot_node(value, Slot::Rhs)
                        .map(|rhs| self.model.infer_type(rhs).ty)
                        .unwrap_or(Type::Variant);
                    self.record_assignment(name.text.clone(), ty);
                }
            }
            _ => {}
        }
    }

    fn before_branch(&mut self, tree: &SyntaxTree, kind: BranchKind, branch: NodeId) {
        let mut frame = Frame::default();
        if matches!(kind, BranchKind::If | BranchKind::Elif) {
            if let Some(condition) = tree.slot_node(branch, Slot::Condition) {
                if let Some((name, ty)) = self.narrowing_of(condition) {
                    frame.env.insert(name, ty);
                }
            }
        }
        self.frames.push(frame);
    }

    fn after_branch(&mut self, _tree: &SyntaxTree, _kind: BranchKind, _branch: NodeId) {
        let Some(closed) = self.frames.pop() else {
            return;
        };
        // merge branch assignments into the surviving environment
        for (name, branch_ty) in closed.assigned {
            let merged = match self.lookup(&name) {
                Some(outer) => self.model.common_supertype(outer, &branch_ty),
                None => branch_ty,
            };
            if let Some(frame) = self.frames.last_mut() {
                frame.env.insert(name, merged);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::typechecker::{
        BuiltinProvider, CompositeProvider, SemanticContext, SemanticModel,
    };
    use std::sync::Arc;

    fn model_of(source: &str) -> SemanticModel {
        let outcome = parse(source);
        let ctx = SemanticContext {
            providers: Arc::new(CompositeProvider::new(vec![Arc::new(BuiltinProvider)])),
            ..Default::default()
        };
        SemanticModel::build(outcome.tree, ctx)
    }

    fn first_method(model: &SemanticModel) -> NodeId {
        let body = model
            .tree()
            .slot_node(model.tree().root(), Slot::Body)
            .unwrap();
        model
            .tree()
            .child_nodes(body)
            .find(|n| model.tree().kind(*n) == &NodeKind::MethodDecl)
            .unwrap()
    }

    fn statements_of_kind(model: &SemanticModel, kind: &NodeKind) -> Vec<NodeId> {
        (0..model.tree().len() as u32)
            .map(NodeId)
            .filter(|id| model.tree().kind(*id) == kind)
            .collect()
    }

    #[test]
    fn test_is_guard_narrows_inside_branch() {
        let source =
            "func f(x):\n\tif x is Sprite2D:\n\t\tpass\n\tpass\n";
        let model = model_of(source);
        let flow = analyze_method(&model, first_method(&model));

        let passes = statements_of_kind(&model, &NodeKind::PassStmt);
        assert_eq!(passes.len(), 2);
        // inside the branch the guard holds
        assert_eq!(
            flow.type_at(passes[0], "x"),
            Some(&Type::named("Sprite2D"))
        );
        // after the branch it is widened back to the declared Variant
        assert_eq!(flow.type_at(passes[1], "x"), Some(&Type::Variant));
    }

    #[test]
    fn test_assignment_updates_branch_env_and_merges() {
        let source = "func f():\n\tvar x = 1\n\tif c:\n\t\tx = 2.0\n\tpass\n";
        let model = model_of(source);
        let flow = analyze_method(&model, first_method(&model));

        let passes = statements_of_kind(&model, &NodeKind::PassStmt);
        // after merging int with the branch float, the union widens
        assert_eq!(flow.type_at(passes[0], "x"), Some(&Type::float()));
    }

    #[test]
    fn test_declaration_seeds_environment() {
        let source = "func f():\n\tvar s = \"hi\"\n\tpass\n";
        let model = model_of(source);
        let flow = analyze_method(&model, first_method(&model));
        let passes = statements_of_kind(&model, &NodeKind::PassStmt);
        assert_eq!(flow.type_at(passes[0], "s"), Some(&Type::string()));
    }
}
