//! Static string extraction.
//!
//! Inference frequently needs the literal value of a string argument: a
//! node path in `get_node("Foo")`, a method name in `Callable(self, "foo")`,
//! a resource path in `preload(...)`. The recognized forms are: a string
//! literal, a `StringName` literal, a reference to a constant whose
//! initializer is a string literal, a local whose type was inferred from a
//! string literal, and the concatenation of two such values.

use unescape::unescape;

use crate::parser::{NodeId, NodeKind, Slot};

use super::scope::{Resolution, SymbolKind};
use super::SemanticModel;

const MAX_EXTRACTION_DEPTH: u32 = 16;

impl SemanticModel {
    /// The statically known string value of an expression, if any.
    pub fn static_string(&self, node: NodeId) -> Option<String> {
        self.static_string_in(node, 0)
    }

    fn static_string_in(&self, node: NodeId, depth: u32) -> Option<String> {
        if depth > MAX_EXTRACTION_DEPTH {
            return None;
        }
        let tree = self.tree();
        match tree.kind(node) {
            NodeKind::ExprString => {
                let raw = match tree.slot_token(node, Slot::Value) {
                    Some(part) => part.text.as_str(),
                    // an empty literal has boundaries but no part
                    None => "",
                };
                Some(unescape(raw).unwrap_or_else(|| raw.to_string()))
            }
            NodeKind::ExprStringName | NodeKind::ExprNodePath => {
                let inner = tree.slot_node(node, Slot::Value)?;
                self.static_string_in(inner, depth + 1)
            }
            NodeKind::ExprBracketed => {
                let inner = tree.slot_node(node, Slot::Value)?;
                self.static_string_in(inner, depth + 1)
            }
            NodeKind::ExprIdentifier => {
                let Resolution::Local(id) = self.resolve(node) else {
                    return None;
                };
                let symbol = self.table().symbol(id);
                if !matches!(symbol.kind, SymbolKind::Constant | SymbolKind::Variable) {
                    return None;
                }
                // a declared non-String type rules the value out
                if symbol
                    .declared_type
                    .as_ref()
                    .is_some_and(|t| !t.is_string())
                {
                    return None;
                }
                let value = tree.slot_node(symbol.declaration, Slot::Value)?;
                self.static_string_in(value, depth + 1)
            }
            NodeKind::ExprBinary(crate::parser::BinaryOp::Add) => {
                let lhs = tree.slot_node(node, Slot::Lhs)?;
                let rhs = tree.slot_node(node, Slot::Rhs)?;
                let mut value = self.static_string_in(lhs, depth + 1)?;
                value.push_str(&self.static_string_in(rhs, depth + 1)?);
                Some(value)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::parser::{parse, NodeId, NodeKind};
    use crate::typechecker::{
        BuiltinProvider, CompositeProvider, SemanticContext, SemanticModel,
    };

    fn model_of(source: &str) -> SemanticModel {
        let outcome = parse(source);
        let ctx = SemanticContext {
            providers: Arc::new(CompositeProvider::new(vec![Arc::new(BuiltinProvider)])),
            ..Default::default()
        };
        SemanticModel::build(outcome.tree, ctx)
    }

    fn last_initializer(model: &SemanticModel) -> NodeId {
        let body = model
            .tree()
            .slot_node(model.tree().root(), crate::parser::Slot::Body)
            .unwrap();
        let decl = model
            .tree()
            .child_nodes(body)
            .filter(|n| model.tree().kind(*n) == &NodeKind::VariableDecl)
            .last()
            .unwrap();
        model
            .tree()
            .slot_node(decl, crate::parser::Slot::Value)
            .unwrap()
    }

    #[test]
    fn test_string_literal() {
        let model = model_of("var x = \"hello\"\n");
        assert_eq!(
            model.static_string(last_initializer(&model)),
            Some("hello".into())
        );
    }

    #[test]
    fn test_escapes_are_decoded() {
        let model = model_of("var x = \"a\\nb\"\n");
        assert_eq!(
            model.static_string(last_initializer(&model)),
            Some("a\nb".into())
        );
    }

    #[test]
    fn test_string_name_literal() {
        let model = model_of("var x = &\"jump\"\n");
        assert_eq!(
            model.static_string(last_initializer(&model)),
            Some("jump".into())
        );
    }

    #[test]
    fn test_const_reference() {
        let model = model_of("const PATH = \"res://a.gd\"\nvar x = PATH\n");
        assert_eq!(
            model.static_string(last_initializer(&model)),
            Some("res://a.gd".into())
        );
    }

    #[test]
    fn test_concatenation() {
        let model = model_of("const BASE = \"res://\"\nvar x = BASE + \"a.gd\"\n");
        assert_eq!(
            model.static_string(last_initializer(&model)),
            Some("res://a.gd".into())
        );
    }

    #[test]
    fn test_dynamic_value_is_rejected() {
        let model = model_of("var x = str(1)\n");
        assert_eq!(model.static_string(last_initializer(&model)), None);
    }
}
