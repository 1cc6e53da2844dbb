//! The type inference engine.
//!
//! Recursive, scope-aware type assignment for expressions. Every answer is
//! an [`InferredType`] with a confidence grade; `Variant` at `Unknown`
//! confidence is the honest fallback for cycles, depth exhaustion and
//! anything the providers cannot answer.

use std::collections::HashSet;

use crate::lexer::{Keyword, TokenKind};
use crate::parser::{BinaryOp, Child, NodeId, NodeKind, Slot, UnaryOp};

use super::providers::RuntimeTypeProvider;
use super::scope::{Resolution, SymbolKind};
use super::types::{Confidence, InferenceReason, InferredType, Type};
use super::{type_from_node, MemberKind, SemanticModel};

/// Fixed recursion bound of a single inference call stack.
pub const MAX_INFER_DEPTH: u32 = 50;

struct InferCtx {
    depth: u32,
    in_progress: HashSet<NodeId>,
}

impl SemanticModel {
    /// Infer the type of an expression node. Results are cached per node
    /// identity and invalidated when the file changes.
    pub fn infer_type(&self, node: NodeId) -> InferredType {
        if let Some(hit) = self.type_cache.borrow().get(&node) {
            return hit.clone();
        }
        let mut ctx = InferCtx {
            depth: 0,
            in_progress: HashSet::new(),
        };
        let result = self.infer_in(node, &mut ctx);
        self.type_cache.borrow_mut().insert(node, result.clone());
        result
    }

    fn infer_in(&self, node: NodeId, ctx: &mut InferCtx) -> InferredType {
        if ctx.depth >= MAX_INFER_DEPTH {
            return InferredType::unknown(InferenceReason::DepthExceeded);
        }
        if !ctx.in_progress.insert(node) {
            return InferredType::unknown(InferenceReason::Cycle);
        }
        ctx.depth += 1;
        let result = self.infer_node(node, ctx);
        ctx.depth -= 1;
        ctx.in_progress.remove(&node);
        result
    }

    fn infer_node(&self, node: NodeId, ctx: &mut InferCtx) -> InferredType {
        let tree = self.tree();
        match tree.kind(node).clone() {
            NodeKind::ExprNumber => {
                let text = tree
                    .slot_token(node, Slot::Value)
                    .map(|t| t.text.as_str())
                    .unwrap_or("");
                let is_float = !text.starts_with("0x")
                    && !text.starts_with("0b")
                    && text.contains(['.', 'e', 'E']);
                let ty = if is_float { Type::float() } else { Type::int() };
                InferredType::certain(ty, InferenceReason::Literal)
            }
            NodeKind::ExprString => {
                InferredType::certain(Type::string(), InferenceReason::Literal)
            }
            NodeKind::ExprStringName => {
                InferredType::certain(Type::named("StringName"), InferenceReason::Literal)
            }
            NodeKind::ExprNodePath => {
                InferredType::certain(Type::named("NodePath"), InferenceReason::Literal)
            }
            NodeKind::ExprLambda => {
                InferredType::certain(Type::named("Callable"), InferenceReason::Literal)
            }
            NodeKind::ExprBracketed => match tree.slot_node(node, Slot::Value) {
                Some(inner) => self.infer_in(inner, ctx),
                None => InferredType::unknown(InferenceReason::Fallback),
            },
            NodeKind::ExprIdentifier => self.infer_identifier(node, ctx),
            NodeKind::ExprMember => self.infer_member(node, ctx),
            NodeKind::ExprCall => self.infer_call(node, ctx),
            NodeKind::ExprIndexer => self.infer_indexer(node, ctx),
            NodeKind::ExprUnary(op) => self.infer_unary(node, op, ctx),
            NodeKind::ExprBinary(op) => self.infer_binary(node, op, ctx),
            NodeKind::ExprTernary => self.infer_ternary(node, ctx),
            NodeKind::ExprArrayInit => self.infer_array(node, ctx),
            NodeKind::ExprDictInit => InferredType::new(
                Type::Dictionary(None),
                Confidence::High,
                InferenceReason::Literal,
            ),
            NodeKind::ExprGetNode | NodeKind::ExprUniqueNode => self.infer_get_node(node),
            _ => InferredType::unknown(InferenceReason::Fallback),
        }
    }

    fn infer_identifier(&self, node: NodeId, ctx: &mut InferCtx) -> InferredType {
        let tree = self.tree();
        let Some(token) = tree.slot_token(node, Slot::Name) else {
            return InferredType::unknown(InferenceReason::Fallback);
        };

        if let TokenKind::Keyword(keyword) = &token.kind {
            return match keyword {
                Keyword::True | Keyword::False => {
                    InferredType::certain(Type::boolean(), InferenceReason::Literal)
                }
                Keyword::Null => InferredType::certain(Type::Null, InferenceReason::Literal),
                Keyword::SelfKw => InferredType::new(
                    self.self_type(),
                    Confidence::High,
                    InferenceReason::Resolved,
                ),
                Keyword::Super => InferredType::new(
                    Type::named(self.base_class_name()),
                    Confidence::High,
                    InferenceReason::Resolved,
                ),
                _ => InferredType::unknown(InferenceReason::Fallback),
            };
        }

        match self.resolve(node) {
            Resolution::Local(id) => {
                let symbol = self.table().symbol(id);
                match symbol.kind {
                    SymbolKind::Method => InferredType::new(
                        Type::named("Callable"),
                        Confidence::High,
                        InferenceReason::Resolved,
                    ),
                    SymbolKind::Signal => InferredType::certain(
                        Type::named("Signal"),
                        InferenceReason::Resolved,
                    ),
                    SymbolKind::Enum => InferredType::new(
                        Type::Dictionary(None),
                        Confidence::High,
                        InferenceReason::Resolved,
                    ),
                    SymbolKind::EnumValue => {
                        InferredType::certain(Type::int(), InferenceReason::Resolved)
                    }
                    SymbolKind::InnerClass => InferredType::new(
                        symbol
                            .declared_type
                            .clone()
                            .unwrap_or(Type::named("GDScript")),
                        Confidence::High,
                        InferenceReason::Resolved,
                    ),
                    SymbolKind::Variable | SymbolKind::Constant | SymbolKind::Parameter => {
                        if let Some(declared) = &symbol.declared_type {
                            return InferredType::certain(
                                declared.clone(),
                                InferenceReason::Declared,
                            );
                        }
                        self.infer_declaration_value(symbol.declaration, symbol.kind, ctx)
                    }
                }
            }
            Resolution::External(_, Some(ty)) => {
                InferredType::new(ty, Confidence::High, InferenceReason::ProviderLookup)
            }
            Resolution::External(_, None) => InferredType::new(
                Type::Variant,
                Confidence::Low,
                InferenceReason::ProviderLookup,
            ),
            Resolution::Unresolved => InferredType::unknown(InferenceReason::Fallback),
        }
    }

    /// Infer the type a declaration gives its name when no annotation is
    /// present: the initializer for variables, the iterated element for
    /// loop variables.
    fn infer_declaration_value(
        &self,
        declaration: NodeId,
        kind: SymbolKind,
        ctx: &mut InferCtx,
    ) -> InferredType {
        let tree = self.tree();
        match tree.kind(declaration) {
            NodeKind::ForStmt => {
                let Some(collection) = tree.slot_node(declaration, Slot::Collection) else {
                    return InferredType::unknown(InferenceReason::Fallback);
                };
                let collection = self.infer_in(collection, ctx);
                match collection.ty.element_type() {
                    Some(element) => InferredType::new(
                        element,
                        collection.confidence.min(Confidence::Medium),
                        InferenceReason::Resolved,
                    ),
                    None => InferredType::new(
                        Type::Variant,
                        Confidence::Low,
                        InferenceReason::Fallback,
                    ),
                }
            }
            _ => match tree.slot_node(declaration, Slot::Value) {
                Some(value) => {
                    let inferred = self.infer_in(value, ctx);
                    InferredType::new(
                        inferred.ty,
                        inferred.confidence.min(Confidence::High),
                        InferenceReason::Resolved,
                    )
                }
                None if kind == SymbolKind::Parameter => InferredType::new(
                    Type::Variant,
                    Confidence::Low,
                    InferenceReason::Fallback,
                ),
                None => InferredType::unknown(InferenceReason::Fallback),
            },
        }
    }

    fn infer_member(&self, node: NodeId, ctx: &mut InferCtx) -> InferredType {
        let tree = self.tree();
        let Some(name) = tree.slot_token(node, Slot::Name).map(|t| t.text.clone()) else {
            return InferredType::unknown(InferenceReason::Fallback);
        };
        let Some(target) = tree.slot_node(node, Slot::Target) else {
            return InferredType::unknown(InferenceReason::Fallback);
        };

        let member = if self.is_self_reference(target) {
            self.member_of_self(&name)
        } else {
            let receiver = self.infer_in(target, ctx);
            if receiver.ty.is_variant() {
                return InferredType::new(
                    Type::Variant,
                    Confidence::Low,
                    InferenceReason::Fallback,
                );
            }
            self.providers().member_on_chain(&receiver.ty.name(), &name)
        };

        match member {
            Some(member) => {
                let ty = match member.kind {
                    MemberKind::Method => Type::named("Callable"),
                    MemberKind::Signal => Type::named("Signal"),
                    _ => member.return_type.unwrap_or(Type::Variant),
                };
                InferredType::new(ty, Confidence::High, InferenceReason::ProviderLookup)
            }
            None => InferredType::new(Type::Variant, Confidence::Low, InferenceReason::Fallback),
        }
    }

    fn infer_call(&self, node: NodeId, ctx: &mut InferCtx) -> InferredType {
        let tree = self.tree();
        let Some(callee) = tree.slot_node(node, Slot::Callee) else {
            return InferredType::unknown(InferenceReason::Fallback);
        };

        match tree.kind(callee) {
            NodeKind::ExprIdentifier => {
                let Some(name) = tree.slot_token(callee, Slot::Name).map(|t| t.text.clone())
                else {
                    return InferredType::unknown(InferenceReason::Fallback);
                };

                if name == "preload" || name == "load" {
                    return self.infer_resource_load(node);
                }

                match self.resolve(callee) {
                    Resolution::Local(id) => {
                        let symbol = self.table().symbol(id);
                        match symbol.kind {
                            SymbolKind::Method => match &symbol.declared_type {
                                Some(ret) => InferredType::certain(
                                    ret.clone(),
                                    InferenceReason::Resolved,
                                ),
                                None => InferredType::new(
                                    Type::Variant,
                                    Confidence::Medium,
                                    InferenceReason::Resolved,
                                ),
                            },
                            _ => InferredType::new(
                                Type::Variant,
                                Confidence::Low,
                                InferenceReason::Fallback,
                            ),
                        }
                    }
                    Resolution::External(_, _) => {
                        // constructor call of an engine or project type
                        if self.providers().is_known_type(&name) {
                            return InferredType::certain(
                                Type::named(name),
                                InferenceReason::Resolved,
                            );
                        }
                        match self.providers().get_global_function(&name) {
                            Some(function) => InferredType::new(
                                function.return_type.unwrap_or(Type::Variant),
                                Confidence::High,
                                InferenceReason::ProviderLookup,
                            ),
                            None => InferredType::new(
                                Type::Variant,
                                Confidence::Low,
                                InferenceReason::Fallback,
                            ),
                        }
                    }
                    Resolution::Unresolved => {
                        InferredType::unknown(InferenceReason::Fallback)
                    }
                }
            }
            NodeKind::ExprMember => {
                let Some(member_name) =
                    tree.slot_token(callee, Slot::Name).map(|t| t.text.clone())
                else {
                    return InferredType::unknown(InferenceReason::Fallback);
                };
                let Some(target) = tree.slot_node(callee, Slot::Target) else {
                    return InferredType::unknown(InferenceReason::Fallback);
                };

                // T.new() constructs an instance of T
                if member_name == "new" {
                    if let Some(constructed) = self.constructed_type(target) {
                        return InferredType::certain(constructed, InferenceReason::Resolved);
                    }
                }

                // ResourceLoader.load("res://...") with a static argument
                if member_name == "load" && self.is_type_reference(target, "ResourceLoader") {
                    return self.infer_resource_load(node);
                }

                let member = if self.is_self_reference(target) {
                    self.member_of_self(&member_name)
                } else {
                    let receiver = self.infer_in(target, ctx);
                    if receiver.ty.is_variant() {
                        return InferredType::new(
                            Type::Variant,
                            Confidence::Low,
                            InferenceReason::Fallback,
                        );
                    }
                    self.providers()
                        .member_on_chain(&receiver.ty.name(), &member_name)
                };

                match member {
                    Some(member) if member.kind == MemberKind::Method => InferredType::new(
                        member.return_type.unwrap_or(Type::Variant),
                        Confidence::High,
                        InferenceReason::ProviderLookup,
                    ),
                    _ => InferredType::new(
                        Type::Variant,
                        Confidence::Low,
                        InferenceReason::Fallback,
                    ),
                }
            }
            _ => InferredType::new(Type::Variant, Confidence::Low, InferenceReason::Fallback),
        }
    }

    /// What type a `T.new()` receiver constructs, when `T` names a type.
    fn constructed_type(&self, target: NodeId) -> Option<Type> {
        let tree = self.tree();
        if tree.kind(target) != &NodeKind::ExprIdentifier {
            return None;
        }
        let name = &tree.slot_token(target, Slot::Name)?.text;
        match self.resolve(target) {
            Resolution::Local(id) => {
                let symbol = self.table().symbol(id);
                (symbol.kind == SymbolKind::InnerClass).then(|| Type::named(name.clone()))
            }
            Resolution::External(_, _) => self
                .providers()
                .is_known_type(name)
                .then(|| Type::named(name.clone())),
            Resolution::Unresolved => None,
        }
    }

    fn is_type_reference(&self, node: NodeId, type_name: &str) -> bool {
        self.tree().kind(node) == &NodeKind::ExprIdentifier
            && self
                .tree()
                .slot_token(node, Slot::Name)
                .is_some_and(|t| t.text == type_name)
    }

    /// The type of `preload(path)` / `load(path)` when the argument is a
    /// statically known string.
    fn infer_resource_load(&self, call: NodeId) -> InferredType {
        let Some(argument) = self.call_arguments(call).first().copied() else {
            return InferredType::new(
                Type::named("Resource"),
                Confidence::Low,
                InferenceReason::Fallback,
            );
        };
        let Some(path) = self.static_string(argument) else {
            return InferredType::new(
                Type::named("Resource"),
                Confidence::Low,
                InferenceReason::Fallback,
            );
        };
        self.resource_type_of_path(&path)
    }

    pub(crate) fn resource_type_of_path(&self, path: &str) -> InferredType {
        if path.ends_with(".gd") {
            if let Some(registry) = &self.context().registry {
                if let Some(class) = registry.class_at_path(path) {
                    return InferredType::certain(
                        Type::named(class.name.clone()),
                        InferenceReason::Resolved,
                    );
                }
            }
            return InferredType::new(
                Type::named("GDScript"),
                Confidence::Medium,
                InferenceReason::Resolved,
            );
        }
        if path.ends_with(".tscn") || path.ends_with(".scn") {
            return InferredType::certain(
                Type::named("PackedScene"),
                InferenceReason::Resolved,
            );
        }
        if [".png", ".jpg", ".jpeg", ".svg", ".webp"]
            .iter()
            .any(|ext| path.ends_with(ext))
        {
            return InferredType::new(
                Type::named("Texture2D"),
                Confidence::Medium,
                InferenceReason::Resolved,
            );
        }
        InferredType::new(
            Type::named("Resource"),
            Confidence::Medium,
            InferenceReason::Resolved,
        )
    }

    fn infer_indexer(&self, node: NodeId, ctx: &mut InferCtx) -> InferredType {
        let tree = self.tree();
        let Some(target) = tree.slot_node(node, Slot::Target) else {
            return InferredType::unknown(InferenceReason::Fallback);
        };
        let receiver = self.infer_in(target, ctx);
        match receiver.ty.element_type() {
            Some(element) => InferredType::new(
                element,
                receiver.confidence.min(Confidence::High),
                InferenceReason::OperatorTable,
            ),
            None => InferredType::new(Type::Variant, Confidence::Low, InferenceReason::Fallback),
        }
    }

    fn infer_unary(&self, node: NodeId, op: UnaryOp, ctx: &mut InferCtx) -> InferredType {
        match op {
            UnaryOp::Not => InferredType::certain(Type::boolean(), InferenceReason::OperatorTable),
            UnaryOp::BitNot => InferredType::certain(Type::int(), InferenceReason::OperatorTable),
            UnaryOp::Await => {
                InferredType::new(Type::Variant, Confidence::Low, InferenceReason::Fallback)
            }
            UnaryOp::Minus | UnaryOp::Plus => {
                let Some(value) = self.tree().slot_node(node, Slot::Value) else {
                    return InferredType::unknown(InferenceReason::Fallback);
                };
                let operand = self.infer_in(value, ctx);
                if operand.ty.is_numeric() || operand.ty.is_vector() {
                    InferredType::new(
                        operand.ty,
                        operand.confidence,
                        InferenceReason::OperatorTable,
                    )
                } else {
                    InferredType::new(
                        Type::Variant,
                        Confidence::Medium,
                        InferenceReason::OperatorTable,
                    )
                }
            }
        }
    }

    fn infer_binary(&self, node: NodeId, op: BinaryOp, ctx: &mut InferCtx) -> InferredType {
        let tree = self.tree();

        if op == BinaryOp::As {
            return match tree
                .slot_node(node, Slot::Rhs)
                .and_then(|rhs| type_from_node(tree, rhs))
            {
                Some(ty) => InferredType::certain(ty, InferenceReason::Declared),
                None => InferredType::unknown(InferenceReason::Fallback),
            };
        }

        if matches!(
            op,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::Less
                | BinaryOp::LessOrEqual
                | BinaryOp::Greater
                | BinaryOp::GreaterOrEqual
                | BinaryOp::In
                | BinaryOp::Is
                | BinaryOp::And
                | BinaryOp::Or
        ) {
            return InferredType::certain(Type::boolean(), InferenceReason::OperatorTable);
        }

        if matches!(
            op,
            BinaryOp::ShiftLeft
                | BinaryOp::ShiftRight
                | BinaryOp::BitAnd
                | BinaryOp::BitXor
                | BinaryOp::BitOr
        ) {
            return InferredType::new(
                Type::int(),
                Confidence::High,
                InferenceReason::OperatorTable,
            );
        }

        let lhs = tree
            .slot_node(node, Slot::Lhs)
            .map(|n| self.infer_in(n, ctx));
        let rhs = tree
            .slot_node(node, Slot::Rhs)
            .map(|n| self.infer_in(n, ctx));

        if op.is_assignment() {
            return match rhs {
                Some(rhs) => InferredType::new(rhs.ty, Confidence::Low, InferenceReason::Resolved),
                None => InferredType::unknown(InferenceReason::Fallback),
            };
        }

        let (Some(lhs), Some(rhs)) = (lhs, rhs) else {
            return InferredType::unknown(InferenceReason::Fallback);
        };
        let confidence = lhs.confidence.min(rhs.confidence).min(Confidence::High);

        let ty = arithmetic_result(op, &lhs.ty, &rhs.ty);
        match ty {
            Some(ty) => InferredType::new(ty, confidence, InferenceReason::OperatorTable),
            None => InferredType::new(
                Type::Variant,
                Confidence::Medium,
                InferenceReason::OperatorTable,
            ),
        }
    }

    fn infer_ternary(&self, node: NodeId, ctx: &mut InferCtx) -> InferredType {
        let tree = self.tree();
        let then = tree
            .slot_node(node, Slot::Value)
            .map(|n| self.infer_in(n, ctx));
        let alt = tree
            .slot_node(node, Slot::ElseValue)
            .map(|n| self.infer_in(n, ctx));
        let (Some(then), Some(alt)) = (then, alt) else {
            return InferredType::unknown(InferenceReason::Fallback);
        };
        let confidence = then.confidence.min(alt.confidence).min(Confidence::High);
        InferredType::new(
            self.common_supertype(&then.ty, &alt.ty),
            confidence,
            InferenceReason::OperatorTable,
        )
    }

    fn infer_array(&self, node: NodeId, ctx: &mut InferCtx) -> InferredType {
        let tree = self.tree();
        let elements: Vec<InferredType> = tree
            .child_nodes(node)
            .filter(|c| tree.kind(*c).is_expression())
            .collect::<Vec<_>>()
            .into_iter()
            .map(|c| self.infer_in(c, ctx))
            .collect();

        if elements.is_empty() {
            return InferredType::new(
                Type::Array(None),
                Confidence::High,
                InferenceReason::Literal,
            );
        }
        let first = &elements[0];
        let uniform = elements
            .iter()
            .all(|e| e.ty == first.ty && e.confidence >= Confidence::High);
        let ty = if uniform {
            Type::Array(Some(Box::new(first.ty.clone())))
        } else {
            Type::Array(None)
        };
        InferredType::new(ty, Confidence::High, InferenceReason::Literal)
    }

    fn infer_get_node(&self, node: NodeId) -> InferredType {
        let path = self.node_path_text(node);
        if let (Some(path), Some(scenes)) = (path, &self.context().scene_types) {
            if let Some(ty) = scenes.node_type(self.context().owning_scene.as_deref(), &path) {
                return InferredType::certain(ty, InferenceReason::SceneLookup);
            }
        }
        InferredType::new(
            Type::named("Node"),
            Confidence::Low,
            InferenceReason::Fallback,
        )
    }

    /// The textual path of a `$…`/`%…` expression: either the identifier
    /// segments or the quoted string.
    pub fn node_path_text(&self, node: NodeId) -> Option<String> {
        let tree = self.tree();
        if let Some(string) = tree.slot_node(node, Slot::Value) {
            return self.static_string(string);
        }
        let mut path = String::new();
        for child in &tree.node(node).form.children {
            if let Child::Token(token) = child {
                match &token.kind {
                    TokenKind::Identifier | TokenKind::Number => path.push_str(&token.text),
                    TokenKind::Punct(crate::lexer::Punct::Divide) => path.push('/'),
                    _ => {}
                }
            }
        }
        (!path.is_empty()).then_some(path)
    }

    /// The narrowest type both inputs are assignable to, `Variant` when
    /// the branches share nothing.
    pub fn common_supertype(&self, a: &Type, b: &Type) -> Type {
        if a == b {
            return a.clone();
        }
        if matches!(a, Type::Null) {
            return b.clone();
        }
        if matches!(b, Type::Null) {
            return a.clone();
        }
        if a.is_numeric() && b.is_numeric() {
            return Type::float();
        }
        if self.providers().is_assignable_to(a, b) {
            return b.clone();
        }
        if self.providers().is_assignable_to(b, a) {
            return a.clone();
        }
        Type::Variant
    }
}

/// Result table for the arithmetic-shaped operators.
fn arithmetic_result(op: BinaryOp, lhs: &Type, rhs: &Type) -> Option<Type> {
    let both_numeric = lhs.is_numeric() && rhs.is_numeric();

    match op {
        BinaryOp::Add => {
            if lhs.is_string() && rhs.is_string() {
                return Some(Type::string());
            }
            if lhs.is_array() && rhs.is_array() {
                // the wider of the two array types
                return Some(match (lhs, rhs) {
                    (Type::Array(Some(a)), Type::Array(Some(b))) if a == b => lhs.clone(),
                    _ => Type::Array(None),
                });
            }
            if lhs.is_vector() && lhs == rhs {
                return Some(lhs.clone());
            }
            both_numeric.then(|| widen_numeric(lhs, rhs))
        }
        BinaryOp::Subtract => {
            if lhs.is_vector() && lhs == rhs {
                return Some(lhs.clone());
            }
            both_numeric.then(|| widen_numeric(lhs, rhs))
        }
        BinaryOp::Multiply => {
            if lhs.is_vector() && rhs.is_numeric() {
                return Some(lhs.clone());
            }
            if lhs.is_numeric() && rhs.is_vector() {
                return Some(rhs.clone());
            }
            both_numeric.then(|| widen_numeric(lhs, rhs))
        }
        BinaryOp::Divide => {
            if lhs.is_vector() && rhs.is_numeric() {
                return Some(lhs.clone());
            }
            both_numeric.then(|| widen_numeric(lhs, rhs))
        }
        BinaryOp::Modulo => {
            if lhs.is_string() {
                // format operator
                return Some(Type::string());
            }
            both_numeric.then(|| widen_numeric(lhs, rhs))
        }
        BinaryOp::Power => both_numeric.then(|| widen_numeric(lhs, rhs)),
        _ => None,
    }
}

fn widen_numeric(lhs: &Type, rhs: &Type) -> Type {
    if lhs == &Type::float() || rhs == &Type::float() {
        Type::float()
    } else {
        Type::int()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::typechecker::{
        BuiltinProvider, CompositeProvider, SceneTypeMap, SemanticContext, SemanticModel,
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

    fn find_kind(model: &SemanticModel, kind: &NodeKind) -> NodeId {
        (0..model.tree().len() as u32)
            .map(NodeId)
            .find(|id| model.tree().kind(*id) == kind)
            .expect("node kind not found")
    }

    fn initializer_type(source: &str) -> InferredType {
        let model = model_of(source);
        let body = model
            .tree()
            .slot_node(model.tree().root(), Slot::Body)
            .unwrap();
        let decl = model
            .tree()
            .child_nodes(body)
            .filter(|n| model.tree().kind(*n) == &NodeKind::VariableDecl)
            .last()
            .unwrap();
        let value = model.tree().slot_node(decl, Slot::Value).unwrap();
        model.infer_type(value)
    }

    #[test]
    fn test_integer_literal() {
        let inferred = initializer_type("var x = 10\n");
        assert_eq!(inferred.ty, Type::int());
        assert!(inferred.confidence >= Confidence::High);
    }

    #[test]
    fn test_float_literal_forms() {
        for source in ["var x = 1.5\n", "var x = 1e3\n", "var x = 2.5e-1\n"] {
            assert_eq!(initializer_type(source).ty, Type::float(), "for {source}");
        }
        // hex digits contain letters that must not read as an exponent
        assert_eq!(initializer_type("var x = 0xE1\n").ty, Type::int());
    }

    #[test]
    fn test_string_and_friends() {
        assert_eq!(initializer_type("var x = \"hi\"\n").ty, Type::string());
        assert_eq!(
            initializer_type("var x = &\"hi\"\n").ty,
            Type::named("StringName")
        );
        assert_eq!(
            initializer_type("var x = ^\"a/b\"\n").ty,
            Type::named("NodePath")
        );
    }

    #[test]
    fn test_arithmetic_widening() {
        assert_eq!(initializer_type("var x = 1 + 2\n").ty, Type::int());
        assert_eq!(initializer_type("var x = 1 + 2.0\n").ty, Type::float());
        assert_eq!(initializer_type("var x = 1 < 2\n").ty, Type::boolean());
        assert_eq!(
            initializer_type("var x = \"a\" + \"b\"\n").ty,
            Type::string()
        );
    }

    #[test]
    fn test_identifier_reference_type() {
        // the initializer of x references the annotated y
        let inferred = initializer_type("var y: int = 1\nvar x = y\n");
        assert_eq!(inferred.ty, Type::int());
    }

    #[test]
    fn test_constructor_and_member() {
        assert_eq!(
            initializer_type("var x = Vector2(1, 2)\n").ty,
            Type::named("Vector2")
        );
        assert_eq!(
            initializer_type("var v = Vector2(1, 2)\nvar x = v.length()\n").ty,
            Type::float()
        );
    }

    #[test]
    fn test_indexer_rules() {
        assert_eq!(
            initializer_type("var a: Array[int] = []\nvar x = a[0]\n").ty,
            Type::int()
        );
        assert_eq!(
            initializer_type("var b: PackedByteArray\nvar x = b[0]\n").ty,
            Type::int()
        );
        assert_eq!(
            initializer_type("var v := Vector2(0, 0)\nvar x = v[0]\n").ty,
            Type::float()
        );
    }

    #[test]
    fn test_cycle_yields_unknown() {
        let model = model_of("var a = b\nvar b = a\n");
        let body = model
            .tree()
            .slot_node(model.tree().root(), Slot::Body)
            .unwrap();
        let decl = model
            .tree()
            .child_nodes(body)
            .find(|n| model.tree().kind(*n) == &NodeKind::VariableDecl)
            .unwrap();
        let value = model.tree().slot_node(decl, Slot::Value).unwrap();
        let inferred = model.infer_type(value);
        assert_eq!(inferred.ty, Type::Variant);
        assert_eq!(inferred.confidence, Confidence::Unknown);
    }

    #[test]
    fn test_scene_lookup() {
        let outcome = parse("@onready var sprite = $Body/Sprite2D\n");
        let mut scenes = SceneTypeMap::new();
        scenes.insert("res://main.tscn", "Body/Sprite2D", "Sprite2D");
        let ctx = SemanticContext {
            providers: Arc::new(CompositeProvider::new(vec![Arc::new(BuiltinProvider)])),
            scene_types: Some(Arc::new(scenes)),
            owning_scene: Some("res://main.tscn".into()),
            ..Default::default()
        };
        let model = SemanticModel::build(outcome.tree, ctx);
        let get_node = find_kind(&model, &NodeKind::ExprGetNode);
        let inferred = model.infer_type(get_node);
        assert_eq!(inferred.ty, Type::named("Sprite2D"));
        assert_eq!(inferred.confidence, Confidence::Certain);
    }

    #[test]
    fn test_get_node_without_scene_falls_back() {
        let model = model_of("var sprite = $Sprite2D\n");
        let get_node = find_kind(&model, &NodeKind::ExprGetNode);
        let inferred = model.infer_type(get_node);
        assert_eq!(inferred.ty, Type::named("Node"));
        assert_eq!(inferred.confidence, Confidence::Low);
    }

    #[test]
    fn test_ternary_supertype() {
        assert_eq!(
            initializer_type("var x = 1 if c else 2.0\n").ty,
            Type::float()
        );
        assert_eq!(
            initializer_type("var x = 1 if c else \"s\"\n").ty,
            Type::Variant
        );
    }

    #[test]
    fn test_preload_scene() {
        assert_eq!(
            initializer_type("var x = preload(\"res://a.tscn\")\n").ty,
            Type::named("PackedScene")
        );
    }
}
