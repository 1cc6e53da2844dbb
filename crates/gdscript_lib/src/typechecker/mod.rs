//! # Typechecker Module
//!
//! The semantic model of one GDScript file: symbols, scopes, runtime type
//! providers, type inference and flow narrowing.
//!
//! ## Architecture Overview
//!
//! ```text
//! CST  →  Binder  →  SymbolTable + Resolutions  →  Inference  →  Types
//!          (scopes)     (per identifier)           (on demand)
//! ```
//!
//! ### Stage 1: Binding
//! A single deterministic walk collects class members (shallow pass, so
//! forward references work), then binds every identifier in method bodies
//! against the scope stack: parameters, block locals, outer blocks, class
//! members, the base-class chain, the project `class_name` registry and
//! finally the engine built-ins. The first hit wins and repeated lookups
//! return the same answer.
//!
//! ### Stage 2: Inference
//! Types are inferred on demand per expression node and cached by node
//! identity. Results carry a [`Confidence`] grade instead of pretending to
//! be a sound type system; `Variant` is the top type and the fallback for
//! cycles and depth exhaustion.
//!
//! ### Error Handling
//! The model never rejects a file. Unresolved names and argument
//! mismatches surface as data the validator turns into diagnostics.

pub mod flow;
mod inference;
pub mod providers;
pub mod scope;
pub mod strings;
pub mod types;

pub use inference::MAX_INFER_DEPTH;
pub use providers::{
    AutoloadProvider, BuiltinProvider, ClassRegistry, CompositeProvider, MemberInfo, MemberKind,
    ParamInfo, ProjectClass, RuntimeTypeProvider, SceneTypeMap, SceneTypeSource, TypeInfo,
};
pub use scope::{Resolution, ScopeStack, Symbol, SymbolId, SymbolKind, SymbolTable};
pub use types::{Confidence, InferenceReason, InferredType, Type};

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use crate::lexer::TokenKind;
use crate::parser::{AccessorKind, NodeId, NodeKind, Slot, SyntaxTree};

/// Base class every script without an `extends` clause gets.
pub const DEFAULT_BASE_CLASS: &str = "RefCounted";

/// What a file's `extends` clause names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtendsTarget {
    Named(String),
    Path(String),
}

/// Everything a semantic model needs from outside the file.
#[derive(Clone, Default)]
pub struct SemanticContext {
    pub providers: Arc<CompositeProvider>,
    pub registry: Option<Arc<ClassRegistry>>,
    pub scene_types: Option<Arc<dyn SceneTypeSource>>,
    /// The scene that instantiates this script, if known.
    pub owning_scene: Option<String>,
}

/// A problem with one call site, produced by the argument analyzer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgumentIssue {
    CountMismatch {
        callee: String,
        expected_min: usize,
        expected_max: Option<usize>,
        actual: usize,
    },
    TypeMismatch {
        callee: String,
        index: usize,
        expected: Type,
        actual: Type,
    },
}

/// Pluggable provider of expected-vs-actual diffs per call site. The
/// semantic model implements it itself; validators may swap in another.
pub trait ArgumentTypeAnalyzer {
    fn check_call(&self, call: NodeId) -> Vec<ArgumentIssue>;
}

/// Result of an incremental semantic update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemanticUpdate {
    /// The class's member-signature surface changed; dependents must be
    /// re-analyzed.
    pub signatures_changed: bool,
}

pub struct SemanticModel {
    tree: SyntaxTree,
    ctx: SemanticContext,
    table: SymbolTable,
    resolutions: HashMap<NodeId, Resolution>,
    /// Member maps per class node, innermost classes included.
    member_maps: HashMap<NodeId, HashMap<String, SymbolId>>,
    class_name: Option<String>,
    extends_target: Option<ExtendsTarget>,
    pub(crate) type_cache: RefCell<HashMap<NodeId, InferredType>>,
}

impl SemanticModel {
    pub fn build(tree: SyntaxTree, ctx: SemanticContext) -> SemanticModel {
        // resolve an extends-by-path up front so the binder walks the right
        // base chain (the registry knows which class lives at the path)
        let path_base = tree
            .slot_node(tree.root(), Slot::Body)
            .into_iter()
            .flat_map(|body| tree.child_nodes(body))
            .find(|n| tree.kind(*n) == &NodeKind::ExtendsAttr)
            .and_then(|n| extends_target_of(&tree, n))
            .and_then(|target| match target {
                ExtendsTarget::Path(path) => ctx
                    .registry
                    .as_ref()
                    .and_then(|r| r.class_at_path(&path))
                    .map(|c| c.name.clone()),
                ExtendsTarget::Named(_) => None,
            });

        let (table, resolutions, member_maps, class_name, extends_target) = {
            let mut binder = Binder {
                tree: &tree,
                providers: ctx.providers.clone(),
                table: SymbolTable::new(),
                resolutions: HashMap::new(),
                member_maps: HashMap::new(),
                member_stack: vec![],
                scopes: ScopeStack::new(),
                class_name: None,
                extends_target: None,
                base_chain_start: path_base,
            };
            binder.bind_class(tree.root(), true);
            (
                binder.table,
                binder.resolutions,
                binder.member_maps,
                binder.class_name,
                binder.extends_target,
            )
        };

        let mut model = SemanticModel {
            tree,
            ctx,
            table,
            resolutions,
            member_maps,
            class_name,
            extends_target,
            type_cache: RefCell::new(HashMap::new()),
        };
        model.resolve_extends_path();
        model
    }

    /// When the file extends a script by resource path, resolve the path to
    /// a registered class so the base chain works.
    fn resolve_extends_path(&mut self) {
        if let (Some(ExtendsTarget::Path(path)), Some(registry)) =
            (self.extends_target.clone(), self.ctx.registry.clone())
        {
            if let Some(class) = registry.class_at_path(&path) {
                self.extends_target = Some(ExtendsTarget::Named(class.name.clone()));
            }
        }
    }

    pub fn tree(&self) -> &SyntaxTree {
        &self.tree
    }

    pub fn table(&self) -> &SymbolTable {
        &self.table
    }

    pub fn providers(&self) -> &CompositeProvider {
        &self.ctx.providers
    }

    pub fn context(&self) -> &SemanticContext {
        &self.ctx
    }

    pub fn class_name(&self) -> Option<&str> {
        self.class_name.as_deref()
    }

    pub fn extends_target(&self) -> Option<&ExtendsTarget> {
        self.extends_target.as_ref()
    }

    /// The base-class name symbol lookup continues into.
    pub fn base_class_name(&self) -> String {
        match &self.extends_target {
            Some(ExtendsTarget::Named(name)) => name.clone(),
            Some(ExtendsTarget::Path(_)) | None => DEFAULT_BASE_CLASS.to_string(),
        }
    }

    /// The type of `self` inside this file.
    pub fn self_type(&self) -> Type {
        match &self.class_name {
            Some(name) => Type::named(name.clone()),
            None => Type::named(self.base_class_name()),
        }
    }

    /// Member symbols of one class node: the file root or an inner class.
    pub fn members_of_class(&self, class: NodeId) -> Vec<SymbolId> {
        let Some(members) = self.member_maps.get(&class) else {
            return vec![];
        };
        let mut ids: Vec<SymbolId> = members.values().copied().collect();
        ids.sort_by_key(|id| id.0);
        ids
    }

    /// Resolution of an identifier node. Stable: repeated calls on the same
    /// tree return the same answer.
    pub fn resolve(&self, node: NodeId) -> Resolution {
        self.resolutions
            .get(&node)
            .cloned()
            .unwrap_or(Resolution::Unresolved)
    }

    pub fn resolutions(&self) -> &HashMap<NodeId, Resolution> {
        &self.resolutions
    }

    /// Turn a type node of the CST into a semantic type.
    pub fn type_from_node(&self, node: NodeId) -> Option<Type> {
        type_from_node(&self.tree, node)
    }

    /// The member surface this class publishes to the `class_name` registry.
    pub fn exported_members(&self) -> Vec<MemberInfo> {
        let mut members = vec![];
        for (_, id) in self.table.members() {
            let symbol = self.table.symbol(*id);
            let kind = match symbol.kind {
                SymbolKind::Variable => MemberKind::Property,
                SymbolKind::Constant => MemberKind::Constant,
                SymbolKind::Method => MemberKind::Method,
                SymbolKind::Signal => MemberKind::Signal,
                SymbolKind::Enum | SymbolKind::EnumValue => MemberKind::EnumValue,
                SymbolKind::InnerClass => MemberKind::Constant,
                SymbolKind::Parameter => continue,
            };
            members.push(MemberInfo {
                name: symbol.name.clone(),
                kind,
                return_type: symbol.declared_type.clone(),
                parameters: symbol.parameters.clone(),
                variadic: false,
            });
        }
        members.sort_by(|a, b| a.name.cmp(&b.name));
        members
    }

    /// Member lookup against `self`'s class: own members first, then the
    /// base chain through the providers.
    pub fn member_of_self(&self, name: &str) -> Option<MemberInfo> {
        if let Some(id) = self.table.member(name) {
            let symbol = self.table.symbol(id);
            return Some(MemberInfo {
                name: symbol.name.clone(),
                kind: match symbol.kind {
                    SymbolKind::Method => MemberKind::Method,
                    SymbolKind::Signal => MemberKind::Signal,
                    SymbolKind::Constant => MemberKind::Constant,
                    SymbolKind::Enum | SymbolKind::EnumValue => MemberKind::EnumValue,
                    _ => MemberKind::Property,
                },
                return_type: symbol.declared_type.clone(),
                parameters: symbol.parameters.clone(),
                variadic: false,
            });
        }
        self.ctx
            .providers
            .member_on_chain(&self.base_class_name(), name)
    }

    /// Rename a declaration and every in-file reference bound to it. This
    /// is one of the two sanctioned token mutations.
    pub fn rename(&mut self, declaration: NodeId, new_name: &str) -> bool {
        let Some(symbol_id) = self.table.symbol_of_declaration(declaration) else {
            return false;
        };
        if self.tree.slot_token(declaration, Slot::Name).is_none() {
            return false;
        }
        if let Some(token) = self.tree.slot_token_mut(declaration, Slot::Name) {
            token.text = new_name.to_string();
        }
        for reference in self.table.references_of(symbol_id).to_vec() {
            if let Some(token) = self.tree.slot_token_mut(reference, Slot::Name) {
                token.text = new_name.to_string();
            }
        }
        self.table.symbol_mut(symbol_id).name = new_name.to_string();
        self.type_cache.borrow_mut().clear();
        true
    }

    /// Incremental semantic update: adopt `new_tree` without a project
    /// round-trip. Falls back to a full rebind internally; the interesting
    /// output is whether dependents are affected.
    pub fn update(&mut self, new_tree: SyntaxTree) -> SemanticUpdate {
        let old_surface = self.exported_members();
        let ctx = self.ctx.clone();
        *self = SemanticModel::build(new_tree, ctx);
        let signatures_changed = old_surface != self.exported_members();
        SemanticUpdate { signatures_changed }
    }
}

impl ArgumentTypeAnalyzer for SemanticModel {
    fn check_call(&self, call: NodeId) -> Vec<ArgumentIssue> {
        let Some((callee_name, signature)) = self.callee_signature(call) else {
            return vec![];
        };

        let arguments = self.call_arguments(call);
        let required = signature
            .parameters
            .iter()
            .filter(|p| !p.has_default)
            .count();
        let maximum = if signature.variadic {
            None
        } else {
            Some(signature.parameters.len())
        };

        let mut issues = vec![];
        if arguments.len() < required
            || maximum.is_some_and(|max| arguments.len() > max)
        {
            issues.push(ArgumentIssue::CountMismatch {
                callee: callee_name.clone(),
                expected_min: required,
                expected_max: maximum,
                actual: arguments.len(),
            });
        }

        for (index, argument) in arguments.iter().enumerate() {
            let Some(parameter) = signature.parameters.get(index) else {
                break;
            };
            let Some(expected) = &parameter.ty else {
                continue;
            };
            if expected.is_variant() {
                continue;
            }
            let actual = self.infer_type(*argument);
            if actual.confidence < Confidence::High {
                continue;
            }
            if !self.ctx.providers.is_assignable_to(&actual.ty, expected) {
                issues.push(ArgumentIssue::TypeMismatch {
                    callee: callee_name.clone(),
                    index,
                    expected: expected.clone(),
                    actual: actual.ty,
                });
            }
        }
        issues
    }
}

impl SemanticModel {
    /// Positional argument expressions of a call node.
    pub fn call_arguments(&self, call: NodeId) -> Vec<NodeId> {
        let callee = self.tree.slot_node(call, Slot::Callee);
        self.tree
            .child_nodes(call)
            .filter(|child| Some(*child) != callee)
            .filter(|child| {
                self.tree.kind(*child).is_expression() || self.tree.kind(*child) == &NodeKind::DictEntry
            })
            .collect()
    }

    fn callee_signature(&self, call: NodeId) -> Option<(String, MemberInfo)> {
        let callee = self.tree.slot_node(call, Slot::Callee)?;
        match self.tree.kind(callee) {
            NodeKind::ExprIdentifier => {
                let name = self.tree.slot_token(callee, Slot::Name)?.text.clone();
                match self.resolve(callee) {
                    Resolution::Local(id) => {
                        let symbol = self.table.symbol(id);
                        if symbol.kind != SymbolKind::Method {
                            return None;
                        }
                        Some((
                            name.clone(),
                            MemberInfo {
                                name,
                                kind: MemberKind::Method,
                                return_type: symbol.declared_type.clone(),
                                parameters: symbol.parameters.clone(),
                                variadic: false,
                            },
                        ))
                    }
                    Resolution::External(_, _) => {
                        let function = self.ctx.providers.get_global_function(&name)?;
                        Some((name, function))
                    }
                    Resolution::Unresolved => None,
                }
            }
            NodeKind::ExprMember => {
                let member_name = self.tree.slot_token(callee, Slot::Name)?.text.clone();
                let target = self.tree.slot_node(callee, Slot::Target)?;
                let member = if self.is_self_reference(target) {
                    self.member_of_self(&member_name)?
                } else {
                    let receiver = self.infer_type(target);
                    if receiver.ty.is_variant() || receiver.confidence < Confidence::Medium {
                        return None;
                    }
                    self.ctx
                        .providers
                        .member_on_chain(&receiver.ty.name(), &member_name)?
                };
                if member.kind != MemberKind::Method {
                    return None;
                }
                Some((member_name, member))
            }
            _ => None,
        }
    }

    pub(crate) fn is_self_reference(&self, node: NodeId) -> bool {
        self.tree.kind(node) == &NodeKind::ExprIdentifier
            && matches!(
                self.tree.slot_token(node, Slot::Name).map(|t| &t.kind),
                Some(TokenKind::Keyword(crate::lexer::Keyword::SelfKw))
            )
    }
}

/// Convert a type node into a semantic type, independent of any model.
pub fn type_from_node(tree: &SyntaxTree, node: NodeId) -> Option<Type> {
    match tree.kind(node) {
        NodeKind::TypeSingle => {
            let name = &tree.slot_token(node, Slot::Name)?.text;
            Some(Type::named(name.clone()))
        }
        NodeKind::TypeArray => {
            let element = tree
                .slot_node(node, Slot::Value)
                .and_then(|n| type_from_node(tree, n));
            Some(Type::Array(element.map(Box::new)))
        }
        NodeKind::TypeDict => {
            let key = tree
                .slot_node(node, Slot::Key)
                .and_then(|n| type_from_node(tree, n));
            let value = tree
                .slot_node(node, Slot::Value)
                .and_then(|n| type_from_node(tree, n));
            match (key, value) {
                (Some(key), Some(value)) => Some(Type::Dictionary(Some(Box::new((key, value))))),
                _ => Some(Type::Dictionary(None)),
            }
        }
        NodeKind::TypeSub => {
            // flatten Outer.Inner to a dotted name
            let outer = tree
                .slot_node(node, Slot::Target)
                .and_then(|n| type_from_node(tree, n))?;
            let inner = &tree.slot_token(node, Slot::Name)?.text;
            Some(Type::Named(format!("{}.{}", outer.name(), inner)))
        }
        NodeKind::TypeStringPath => None,
        _ => None,
    }
}

// ---- the binder ---------------------------------------------------------

struct Binder<'t> {
    tree: &'t SyntaxTree,
    providers: Arc<CompositeProvider>,
    table: SymbolTable,
    resolutions: HashMap<NodeId, Resolution>,
    member_maps: HashMap<NodeId, HashMap<String, SymbolId>>,
    /// Innermost class last; resolution walks it backwards.
    member_stack: Vec<NodeId>,
    scopes: ScopeStack,
    class_name: Option<String>,
    extends_target: Option<ExtendsTarget>,
    base_chain_start: Option<String>,
}

impl<'t> Binder<'t> {
    fn bind_class(&mut self, class: NodeId, top_level: bool) {
        let Some(body) = self.tree.slot_node(class, Slot::Body) else {
            return;
        };

        // shallow pass: register every member so forward references bind
        let mut members: HashMap<String, SymbolId> = HashMap::new();
        for member in self.tree.child_nodes(body) {
            self.collect_member(member, &mut members, top_level);
        }
        self.member_maps.insert(class, members);
        self.member_stack.push(class);

        // deep pass: initializers and bodies
        for member in self.tree.child_nodes(body).collect::<Vec<_>>() {
            self.bind_member(member);
        }
        self.member_stack.pop();
    }

    fn collect_member(
        &mut self,
        member: NodeId,
        members: &mut HashMap<String, SymbolId>,
        top_level: bool,
    ) {
        let tree = self.tree;
        match tree.kind(member) {
            NodeKind::VariableDecl => {
                let Some(name) = tree.slot_token(member, Slot::Name) else {
                    return;
                };
                let is_const = matches!(
                    tree.slot_token(member, Slot::Keyword).map(|t| &t.kind),
                    Some(TokenKind::Keyword(crate::lexer::Keyword::Const))
                );
                let declared_type = tree
                    .slot_node(member, Slot::Type)
                    .and_then(|n| type_from_node(tree, n));
                let id = self.table.add_member(Symbol {
                    name: name.text.clone(),
                    kind: if is_const {
                        SymbolKind::Constant
                    } else {
                        SymbolKind::Variable
                    },
                    declared_type,
                    declaration: member,
                    parameters: vec![],
                });
                members.entry(name.text.clone()).or_insert(id);
            }
            NodeKind::MethodDecl => {
                let Some(name) = tree.slot_token(member, Slot::Name) else {
                    return;
                };
                let parameters = self.parameter_infos(member);
                let return_type = tree
                    .slot_node(member, Slot::ReturnType)
                    .and_then(|n| type_from_node(tree, n));
                let id = self.table.add_member(Symbol {
                    name: name.text.clone(),
                    kind: SymbolKind::Method,
                    declared_type: return_type,
                    declaration: member,
                    parameters,
                });
                members.entry(name.text.clone()).or_insert(id);
            }
            NodeKind::SignalDecl => {
                let Some(name) = tree.slot_token(member, Slot::Name) else {
                    return;
                };
                let parameters = self.parameter_infos(member);
                let id = self.table.add_member(Symbol {
                    name: name.text.clone(),
                    kind: SymbolKind::Signal,
                    declared_type: Some(Type::named("Signal")),
                    declaration: member,
                    parameters,
                });
                members.entry(name.text.clone()).or_insert(id);
            }
            NodeKind::EnumDecl => {
                if let Some(name) = tree.slot_token(member, Slot::Name) {
                    let id = self.table.add_member(Symbol {
                        name: name.text.clone(),
                        kind: SymbolKind::Enum,
                        declared_type: Some(Type::Dictionary(None)),
                        declaration: member,
                        parameters: vec![],
                    });
                    members.entry(name.text.clone()).or_insert(id);
                }
                // anonymous enum variants become class-level constants
                if tree.slot_token(member, Slot::Name).is_none() {
                    for variant in tree.child_nodes(member).collect::<Vec<_>>() {
                        if tree.kind(variant) != &NodeKind::EnumVariant {
                            continue;
                        }
                        let Some(name) = tree.slot_token(variant, Slot::Name) else {
                            continue;
                        };
                        let id = self.table.add_member(Symbol {
                            name: name.text.clone(),
                            kind: SymbolKind::EnumValue,
                            declared_type: Some(Type::int()),
                            declaration: variant,
                            parameters: vec![],
                        });
                        members.entry(name.text.clone()).or_insert(id);
                    }
                }
            }
            NodeKind::ClassDecl => {
                if let Some(name) = tree.slot_token(member, Slot::Name) {
                    let id = self.table.add_member(Symbol {
                        name: name.text.clone(),
                        kind: SymbolKind::InnerClass,
                        declared_type: Some(Type::named(name.text.clone())),
                        declaration: member,
                        parameters: vec![],
                    });
                    members.entry(name.text.clone()).or_insert(id);
                }
            }
            NodeKind::ClassNameAttr if top_level => {
                if let Some(name) = tree.slot_token(member, Slot::Name) {
                    self.class_name = Some(name.text.clone());
                }
            }
            NodeKind::ExtendsAttr if top_level => {
                self.extends_target = extends_target_of(tree, member);
                if let Some(ExtendsTarget::Named(name)) = &self.extends_target {
                    self.base_chain_start = Some(name.clone());
                }
            }
            _ => {}
        }
    }

    fn parameter_infos(&self, declaration: NodeId) -> Vec<ParamInfo> {
        let tree = self.tree;
        let Some(params) = tree.slot_node(declaration, Slot::Params) else {
            return vec![];
        };
        tree.child_nodes(params)
            .filter(|p| tree.kind(*p) == &NodeKind::Parameter)
            .filter_map(|p| {
                let name = tree.slot_token(p, Slot::Name)?.text.clone();
                Some(ParamInfo {
                    name,
                    ty: tree
                        .slot_node(p, Slot::Type)
                        .and_then(|n| type_from_node(tree, n)),
                    has_default: tree.slot(p, Slot::Value).is_some(),
                })
            })
            .collect()
    }

    fn bind_member(&mut self, member: NodeId) {
        match self.tree.kind(member) {
            NodeKind::MethodDecl => self.bind_method(member),
            NodeKind::ClassDecl => self.bind_class(member, false),
            NodeKind::VariableDecl => {
                if let Some(value) = self.tree.slot_node(member, Slot::Value) {
                    self.bind_expr(value);
                }
                self.bind_accessors(member);
            }
            NodeKind::EnumDecl => {
                for variant in self.tree.child_nodes(member).collect::<Vec<_>>() {
                    if let Some(value) = self.tree.slot_node(variant, Slot::Value) {
                        self.bind_expr(value);
                    }
                }
            }
            NodeKind::Annotation => {
                for argument in self.expression_children(member) {
                    self.bind_expr(argument);
                }
            }
            // plain statements at class level are tolerated by the parser;
            // bind them so their identifiers resolve
            _ => self.bind_statement(member),
        }
    }

    fn bind_accessors(&mut self, variable: NodeId) {
        let accessors: Vec<NodeId> = {
            let direct = self.tree.child_nodes(variable);
            let mut found: Vec<NodeId> = direct
                .filter(|n| matches!(self.tree.kind(*n), NodeKind::PropertyAccessor(_)))
                .collect();
            if let Some(body) = self.tree.slot_node(variable, Slot::Body) {
                found.extend(
                    self.tree
                        .child_nodes(body)
                        .filter(|n| matches!(self.tree.kind(*n), NodeKind::PropertyAccessor(_))),
                );
            }
            found
        };

        for accessor in accessors {
            self.scopes.enter();
            if let NodeKind::PropertyAccessor(AccessorKind::Set) = self.tree.kind(accessor) {
                for info in self.parameter_infos(accessor) {
                    let id = self.table.add(Symbol {
                        name: info.name.clone(),
                        kind: SymbolKind::Parameter,
                        declared_type: info.ty.clone(),
                        declaration: accessor,
                        parameters: vec![],
                    });
                    self.scopes.declare(info.name, id);
                }
            }
            if let Some(target) = self.tree.slot_node(accessor, Slot::Target) {
                self.bind_expr(target);
            }
            if let Some(body) = self.tree.slot_node(accessor, Slot::Body) {
                self.bind_statements(body);
            }
            self.scopes.exit();
        }
    }

    fn bind_method(&mut self, method: NodeId) {
        self.scopes.enter();
        if let Some(params) = self.tree.slot_node(method, Slot::Params) {
            for param in self.tree.child_nodes(params).collect::<Vec<_>>() {
                if self.tree.kind(param) != &NodeKind::Parameter {
                    continue;
                }
                if let Some(value) = self.tree.slot_node(param, Slot::Value) {
                    self.bind_expr(value);
                }
                let Some(name) = self.tree.slot_token(param, Slot::Name) else {
                    continue;
                };
                let declared_type = self
                    .tree
                    .slot_node(param, Slot::Type)
                    .and_then(|n| type_from_node(self.tree, n));
                let name = name.text.clone();
                let id = self.table.add(Symbol {
                    name: name.clone(),
                    kind: SymbolKind::Parameter,
                    declared_type,
                    declaration: param,
                    parameters: vec![],
                });
                self.scopes.declare(name, id);
            }
        }
        if let Some(body) = self.tree.slot_node(method, Slot::Body) {
            self.bind_statements(body);
        }
        self.scopes.exit();
    }

    fn bind_statements(&mut self, list: NodeId) {
        for statement in self.tree.child_nodes(list).collect::<Vec<_>>() {
            self.bind_statement(statement);
        }
    }

    fn bind_statement(&mut self, statement: NodeId) {
        let tree = self.tree;
        match tree.kind(statement) {
            NodeKind::VariableDecl => {
                if let Some(value) = tree.slot_node(statement, Slot::Value) {
                    self.bind_expr(value);
                }
                if self.scopes.depth() > 1 || self.member_stack.is_empty() {
                    // a local: visible only after its declaration
                    if let Some(name) = tree.slot_token(statement, Slot::Name) {
                        let is_const = matches!(
                            tree.slot_token(statement, Slot::Keyword).map(|t| &t.kind),
                            Some(TokenKind::Keyword(crate::lexer::Keyword::Const))
                        );
                        let declared_type = tree
                            .slot_node(statement, Slot::Type)
                            .and_then(|n| type_from_node(tree, n));
                        let name = name.text.clone();
                        let id = self.table.add(Symbol {
                            name: name.clone(),
                            kind: if is_const {
                                SymbolKind::Constant
                            } else {
                                SymbolKind::Variable
                            },
                            declared_type,
                            declaration: statement,
                            parameters: vec![],
                        });
                        self.scopes.declare(name, id);
                    }
                }
                self.bind_accessors(statement);
            }
            NodeKind::IfStmt => {
                for branch in tree.child_nodes(statement).collect::<Vec<_>>() {
                    if let Some(condition) = tree.slot_node(branch, Slot::Condition) {
                        self.bind_expr(condition);
                    }
                    if let Some(body) = tree.slot_node(branch, Slot::Body) {
                        self.scopes.enter();
                        self.bind_statements(body);
                        self.scopes.exit();
                    }
                }
            }
            NodeKind::WhileStmt => {
                if let Some(condition) = tree.slot_node(statement, Slot::Condition) {
                    self.bind_expr(condition);
                }
                if let Some(body) = tree.slot_node(statement, Slot::Body) {
                    self.scopes.enter();
                    self.bind_statements(body);
                    self.scopes.exit();
                }
            }
            NodeKind::ForStmt => {
                if let Some(collection) = tree.slot_node(statement, Slot::Collection) {
                    self.bind_expr(collection);
                }
                self.scopes.enter();
                if let Some(name) = tree.slot_token(statement, Slot::Target) {
                    let declared_type = tree
                        .slot_node(statement, Slot::Type)
                        .and_then(|n| type_from_node(tree, n));
                    let name = name.text.clone();
                    let id = self.table.add(Symbol {
                        name: name.clone(),
                        kind: SymbolKind::Variable,
                        declared_type,
                        declaration: statement,
                        parameters: vec![],
                    });
                    self.scopes.declare(name, id);
                }
                if let Some(body) = tree.slot_node(statement, Slot::Body) {
                    self.bind_statements(body);
                }
                self.scopes.exit();
            }
            NodeKind::MatchStmt => {
                if let Some(value) = tree.slot_node(statement, Slot::Value) {
                    self.bind_expr(value);
                }
                let Some(cases) = tree.slot_node(statement, Slot::Body) else {
                    return;
                };
                for case in tree.child_nodes(cases).collect::<Vec<_>>() {
                    self.scopes.enter();
                    for pattern in tree.child_nodes(case).collect::<Vec<_>>() {
                        match tree.kind(pattern) {
                            NodeKind::VariableDecl => {
                                if let Some(name) = tree.slot_token(pattern, Slot::Name) {
                                    let name = name.text.clone();
                                    let id = self.table.add(Symbol {
                                        name: name.clone(),
                                        kind: SymbolKind::Variable,
                                        declared_type: None,
                                        declaration: pattern,
                                        parameters: vec![],
                                    });
                                    self.scopes.declare(name, id);
                                }
                            }
                            kind if kind.is_expression() => self.bind_expr(pattern),
                            _ => {}
                        }
                    }
                    if let Some(body) = tree.slot_node(case, Slot::Body) {
                        self.bind_statements(body);
                    }
                    self.scopes.exit();
                }
            }
            NodeKind::ReturnStmt | NodeKind::ExprStmt => {
                if let Some(value) = tree.slot_node(statement, Slot::Value) {
                    self.bind_expr(value);
                }
            }
            NodeKind::MethodDecl => self.bind_method(statement),
            NodeKind::PropertyAccessor(_) => {
                // handled through bind_accessors when reachable from a
                // variable; orphans still get their bodies bound
                self.scopes.enter();
                if let Some(body) = tree.slot_node(statement, Slot::Body) {
                    self.bind_statements(body);
                }
                self.scopes.exit();
            }
            _ => {
                for child in self.expression_children(statement) {
                    self.bind_expr(child);
                }
            }
        }
    }

    fn expression_children(&self, node: NodeId) -> Vec<NodeId> {
        self.tree
            .child_nodes(node)
            .filter(|c| {
                self.tree.kind(*c).is_expression() || self.tree.kind(*c) == &NodeKind::DictEntry
            })
            .collect()
    }

    fn bind_expr(&mut self, node: NodeId) {
        let tree = self.tree;
        match tree.kind(node) {
            NodeKind::ExprIdentifier => {
                let Some(token) = tree.slot_token(node, Slot::Name) else {
                    return;
                };
                if matches!(token.kind, TokenKind::Keyword(_)) {
                    return;
                }
                let name = token.text.clone();
                let resolution = self.resolve_name(&name);
                if let Resolution::Local(id) = &resolution {
                    self.table.record_reference(*id, node);
                }
                self.resolutions.insert(node, resolution);
            }
            NodeKind::ExprLambda => {
                self.scopes.enter();
                if let Some(params) = tree.slot_node(node, Slot::Params) {
                    for param in tree.child_nodes(params).collect::<Vec<_>>() {
                        if tree.kind(param) != &NodeKind::Parameter {
                            continue;
                        }
                        if let Some(name) = tree.slot_token(param, Slot::Name) {
                            let declared_type = tree
                                .slot_node(param, Slot::Type)
                                .and_then(|n| type_from_node(tree, n));
                            let name = name.text.clone();
                            let id = self.table.add(Symbol {
                                name: name.clone(),
                                kind: SymbolKind::Parameter,
                                declared_type,
                                declaration: param,
                                parameters: vec![],
                            });
                            self.scopes.declare(name, id);
                        }
                    }
                }
                if let Some(body) = tree.slot_node(node, Slot::Body) {
                    self.bind_statements(body);
                }
                self.scopes.exit();
            }
            NodeKind::ExprMember => {
                // only the receiver is a scope reference; the member name
                // resolves against the receiver's type later
                if let Some(target) = tree.slot_node(node, Slot::Target) {
                    self.bind_expr(target);
                }
            }
            NodeKind::ExprGetNode | NodeKind::ExprUniqueNode => {
                // node paths are scene references, not identifiers
            }
            _ => {
                for child in tree.child_nodes(node).collect::<Vec<_>>() {
                    let kind = tree.kind(child);
                    if kind.is_expression() || kind == &NodeKind::DictEntry {
                        self.bind_expr(child);
                    } else if kind == &NodeKind::StatementList {
                        self.bind_statements(child);
                    }
                }
            }
        }
    }

    /// The documented lookup order, first hit wins.
    fn resolve_name(&mut self, name: &str) -> Resolution {
        // (1)-(3) parameters and block locals, innermost outward
        if let Some(id) = self.scopes.lookup(name) {
            return Resolution::Local(id);
        }
        // (4) enclosing class members, innermost class outward
        for class in self.member_stack.iter().rev() {
            if let Some(id) = self.member_maps.get(class).and_then(|m| m.get(name)) {
                return Resolution::Local(*id);
            }
        }
        // (5) base-class chain
        if let Some(base) = &self.base_chain_start {
            if let Some(member) = self.providers.member_on_chain(base, name) {
                let ty = member_value_type(&member);
                return Resolution::External(name.to_string(), ty);
            }
        } else if let Some(member) = self.providers.member_on_chain(DEFAULT_BASE_CLASS, name) {
            let ty = member_value_type(&member);
            return Resolution::External(name.to_string(), ty);
        }
        // (6) project globals and autoloads
        if let Some(ty) = self.providers.get_global_class(name) {
            return Resolution::External(name.to_string(), Some(ty));
        }
        // (7) runtime built-ins: types and global functions
        if self.providers.is_known_type(name) {
            return Resolution::External(name.to_string(), Some(Type::named(name)));
        }
        if self.providers.get_global_function(name).is_some() {
            return Resolution::External(name.to_string(), Some(Type::named("Callable")));
        }
        // (8) unresolved
        Resolution::Unresolved
    }
}

/// What value type a member lookup yields when used as a bare name.
fn member_value_type(member: &MemberInfo) -> Option<Type> {
    match member.kind {
        MemberKind::Method => Some(Type::named("Callable")),
        MemberKind::Signal => Some(Type::named("Signal")),
        _ => member.return_type.clone(),
    }
}

/// Extract the extends target of an `ExtendsAttr` node.
pub fn extends_target_of(tree: &SyntaxTree, node: NodeId) -> Option<ExtendsTarget> {
    let target = tree.slot_node(node, Slot::Target)?;
    match tree.kind(target) {
        NodeKind::TypeSingle | NodeKind::TypeSub => {
            type_from_node(tree, target).map(|t| ExtendsTarget::Named(t.name()))
        }
        NodeKind::TypeStringPath => {
            let string = tree.slot_node(target, Slot::Value)?;
            let part = tree.slot_token(string, Slot::Value)?;
            Some(ExtendsTarget::Path(part.text.clone()))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn model_of(source: &str) -> SemanticModel {
        let outcome = parse(source);
        let ctx = SemanticContext {
            providers: Arc::new(CompositeProvider::new(vec![Arc::new(BuiltinProvider)])),
            ..Default::default()
        };
        SemanticModel::build(outcome.tree, ctx)
    }

    fn identifiers_named<'a>(model: &'a SemanticModel, name: &'a str) -> Vec<NodeId> {
        (0..model.tree().len() as u32)
            .map(NodeId)
            .filter(|id| {
                model.tree().kind(*id) == &NodeKind::ExprIdentifier
                    && model
                        .tree()
                        .slot_token(*id, Slot::Name)
                        .is_some_and(|t| t.text == name)
            })
            .collect()
    }

    #[test]
    fn test_class_member_resolves() {
        let model = model_of("var x = 10\n\nfunc f():\n\treturn x\n");
        let uses = identifiers_named(&model, "x");
        assert_eq!(uses.len(), 1);
        assert!(matches!(model.resolve(uses[0]), Resolution::Local(_)));
    }

    #[test]
    fn test_parameter_shadows_member() {
        let model = model_of("var x = 10\n\nfunc f(x):\n\treturn x\n");
        let uses = identifiers_named(&model, "x");
        let Resolution::Local(id) = model.resolve(uses[0]) else {
            panic!("unexpected resolution");
        };
        assert_eq!(model.table().symbol(id).kind, SymbolKind::Parameter);
    }

    #[test]
    fn test_local_declared_after_use_is_not_visible() {
        let model = model_of("func f():\n\tprint(y)\n\tvar y = 1\n");
        let uses = identifiers_named(&model, "y");
        assert_eq!(model.resolve(uses[0]), Resolution::Unresolved);
    }

    #[test]
    fn test_base_chain_member_is_external() {
        let model = model_of("extends Node2D\n\nfunc f():\n\treturn position\n");
        let uses = identifiers_named(&model, "position");
        let Resolution::External(name, ty) = model.resolve(uses[0]) else {
            panic!("expected an external resolution");
        };
        assert_eq!(name, "position");
        assert_eq!(ty, Some(Type::named("Vector2")));
    }

    #[test]
    fn test_builtin_function_resolves() {
        let model = model_of("func f():\n\tprint(1)\n");
        let uses = identifiers_named(&model, "print");
        assert!(matches!(model.resolve(uses[0]), Resolution::External(_, _)));
    }

    #[test]
    fn test_unknown_name_is_unresolved() {
        let model = model_of("func f():\n\treturn frobnicate\n");
        let uses = identifiers_named(&model, "frobnicate");
        assert_eq!(model.resolve(uses[0]), Resolution::Unresolved);
    }

    #[test]
    fn test_resolution_is_stable() {
        let model = model_of("var x = 1\n\nfunc f():\n\treturn x\n");
        let uses = identifiers_named(&model, "x");
        assert_eq!(model.resolve(uses[0]), model.resolve(uses[0]));
    }

    #[test]
    fn test_rename_rewrites_references() {
        let mut model = model_of("var speed = 10\n\nfunc f():\n\treturn speed\n");
        let declaration = model
            .table()
            .member("speed")
            .map(|id| model.table().symbol(id).declaration)
            .unwrap();
        assert!(model.rename(declaration, "velocity"));
        let text = model.tree().serialize();
        assert_eq!(text, "var velocity = 10\n\nfunc f():\n\treturn velocity\n");
    }

    #[test]
    fn test_exported_members_surface() {
        let model = model_of(
            "class_name Player\nextends Node2D\n\nsignal died\nvar health: int = 3\nfunc hit(damage: int) -> void:\n\tpass\n",
        );
        assert_eq!(model.class_name(), Some("Player"));
        let members = model.exported_members();
        let names: Vec<_> = members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["died", "health", "hit"]);
        let hit = members.iter().find(|m| m.name == "hit").unwrap();
        assert_eq!(hit.kind, MemberKind::Method);
        assert_eq!(hit.parameters.len(), 1);
        assert_eq!(hit.return_type, Some(Type::Void));
    }

    #[test]
    fn test_argument_type_mismatch_detected() {
        let model = model_of(
            "func f(x: int) -> void:\n\tpass\n\nfunc g():\n\tf(\"hello\")\n",
        );
        let call = (0..model.tree().len() as u32)
            .map(NodeId)
            .find(|id| model.tree().kind(*id) == &NodeKind::ExprCall)
            .unwrap();
        let issues = model.check_call(call);
        assert_eq!(issues.len(), 1);
        let ArgumentIssue::TypeMismatch {
            expected, actual, ..
        } = &issues[0]
        else {
            panic!("expected a type mismatch");
        };
        assert_eq!(expected, &Type::int());
        assert_eq!(actual, &Type::string());
    }

    #[test]
    fn test_argument_count_mismatch_detected() {
        let model = model_of("func f(x: int) -> void:\n\tpass\n\nfunc g():\n\tf()\n");
        let call = (0..model.tree().len() as u32)
            .map(NodeId)
            .find(|id| model.tree().kind(*id) == &NodeKind::ExprCall)
            .unwrap();
        let issues = model.check_call(call);
        assert!(matches!(issues[0], ArgumentIssue::CountMismatch { .. }));
    }

    #[test]
    fn test_variadic_global_accepts_anything() {
        let model = model_of("func g():\n\tprint(1, 2, 3, \"x\")\n");
        let call = (0..model.tree().len() as u32)
            .map(NodeId)
            .find(|id| model.tree().kind(*id) == &NodeKind::ExprCall)
            .unwrap();
        assert!(model.check_call(call).is_empty());
    }
}
