//! The inter-file dependency graph.
//!
//! Tracked edges are `extends` targets and statically resolvable
//! `preload`/`load`/`ResourceLoader.load` calls that point at `.gd` files.
//! Both directions are kept: `depends_on` for extraction, `dependents` for
//! invalidation. All mutation happens under one write lock; readers take
//! the same lock for short critical sections.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;

use crate::parser::{NodeId, NodeKind, Slot};
use crate::typechecker::{ExtendsTarget, SemanticModel};

use super::paths::is_resource_path;

#[derive(Debug, Default)]
struct GraphInner {
    depends_on: HashMap<String, HashSet<String>>,
    dependents: HashMap<String, HashSet<String>>,
}

#[derive(Debug, Default)]
pub struct DependencyGraph {
    inner: RwLock<GraphInner>,
}

impl DependencyGraph {
    pub fn new() -> DependencyGraph {
        DependencyGraph::default()
    }

    /// Replace the outgoing edges of `file`, updating the reverse side.
    pub fn set_dependencies(&self, file: &str, dependencies: HashSet<String>) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());

        if let Some(previous) = inner.depends_on.remove(file) {
            for dependency in previous {
                if let Some(backs) = inner.dependents.get_mut(&dependency) {
                    backs.remove(file);
                }
            }
        }
        for dependency in &dependencies {
            inner
                .dependents
                .entry(dependency.clone())
                .or_default()
                .insert(file.to_string());
        }
        inner.depends_on.insert(file.to_string(), dependencies);
    }

    /// Drop a deleted file from both directions.
    pub fn remove_file(&self, file: &str) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if let Some(dependencies) = inner.depends_on.remove(file) {
            for dependency in dependencies {
                if let Some(backs) = inner.dependents.get_mut(&dependency) {
                    backs.remove(file);
                }
            }
        }
        inner.dependents.remove(file);
        for dependencies in inner.depends_on.values_mut() {
            dependencies.remove(file);
        }
    }

    pub fn dependencies_of(&self, file: &str) -> HashSet<String> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.depends_on.get(file).cloned().unwrap_or_default()
    }

    pub fn dependents_of(&self, file: &str) -> HashSet<String> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.dependents.get(file).cloned().unwrap_or_default()
    }

    /// Every file that transitively depends on `file`.
    pub fn dependents_closure(&self, file: &str) -> HashSet<String> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let mut closure = HashSet::new();
        let mut queue: Vec<&String> = inner
            .dependents
            .get(file)
            .into_iter()
            .flatten()
            .collect();
        while let Some(next) = queue.pop() {
            if closure.insert(next.clone()) {
                queue.extend(inner.dependents.get(next).into_iter().flatten());
            }
        }
        closure
    }

    /// The reverse graph as a sorted adjacency list, for persistence.
    pub fn dependents_adjacency(&self) -> BTreeMap<String, Vec<String>> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner
            .dependents
            .iter()
            .map(|(file, backs)| {
                let mut backs: Vec<String> = backs.iter().cloned().collect();
                backs.sort();
                (file.clone(), backs)
            })
            .collect()
    }

    /// Rebuild the forward edges from a persisted reverse adjacency list.
    pub fn load_dependents_adjacency(&self, adjacency: BTreeMap<String, Vec<String>>) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.depends_on.clear();
        inner.dependents.clear();
        for (file, backs) in adjacency {
            for dependent in backs {
                inner
                    .depends_on
                    .entry(dependent.clone())
                    .or_default()
                    .insert(file.clone());
                inner
                    .dependents
                    .entry(file.clone())
                    .or_default()
                    .insert(dependent);
            }
        }
    }
}

/// The `.gd` files a parsed file depends on: the `extends` target plus every
/// statically resolvable resource load of a script.
pub fn extract_dependencies(model: &SemanticModel) -> HashSet<String> {
    let mut dependencies = HashSet::new();

    match model.extends_target() {
        Some(ExtendsTarget::Path(path)) if path.ends_with(".gd") => {
            dependencies.insert(path.clone());
        }
        Some(ExtendsTarget::Named(name)) => {
            if let Some(registry) = &model.context().registry {
                if let Some(path) = registry.path_of(name) {
                    dependencies.insert(path.to_string());
                }
            }
        }
        _ => {}
    }

    let tree = model.tree();
    for id in 0..tree.len() as u32 {
        let node = NodeId(id);
        if tree.kind(node) != &NodeKind::ExprCall {
            continue;
        }
        if !is_resource_load(model, node) {
            continue;
        }
        let Some(argument) = model.call_arguments(node).first().copied() else {
            continue;
        };
        let Some(path) = model.static_string(argument) else {
            continue;
        };
        if is_resource_path(&path) && path.ends_with(".gd") {
            dependencies.insert(path);
        }
    }
    dependencies
}

fn is_resource_load(model: &SemanticModel, call: NodeId) -> bool {
    let tree = model.tree();
    let Some(callee) = tree.slot_node(call, Slot::Callee) else {
        return false;
    };
    match tree.kind(callee) {
        NodeKind::ExprIdentifier => matches!(
            tree.slot_token(callee, Slot::Name).map(|t| t.text.as_str()),
            Some("preload") | Some("load")
        ),
        NodeKind::ExprMember => {
            let is_load = tree
                .slot_token(callee, Slot::Name)
                .is_some_and(|t| t.text == "load");
            let target_is_loader = tree
                .slot_node(callee, Slot::Target)
                .and_then(|t| tree.slot_token(t, Slot::Name))
                .is_some_and(|t| t.text == "ResourceLoader");
            is_load && target_is_loader
        }
        _ => false,
    }
}
