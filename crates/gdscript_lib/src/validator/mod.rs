//! # Validator Module
//!
//! Configurable semantic validation of one parsed file.
//!
//! ```text
//! SemanticModel  →  validate(options)  →  Vec<Diagnostic>
//! ```
//!
//! The passes are independent and individually toggled through
//! [`ValidationOptions`]: indentation consistency, scope (undefined
//! identifiers), argument count/type mismatches, and inheritance-chain
//! resolution. The argument-type pass is off by default because it leans on
//! the inference engine; it consults the pluggable
//! [`ArgumentTypeAnalyzer`], which the semantic model itself implements.
//! The runtime type provider the passes consult lives in the model's
//! [`SemanticContext`].

mod indentation;

pub use indentation::check_indentation;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::diagnostics::{Diagnostic, DiagnosticKind, Severity};
use crate::parser::{NodeId, NodeKind, Slot};
use crate::typechecker::{
    ArgumentIssue, ArgumentTypeAnalyzer, ExtendsTarget, Resolution, RuntimeTypeProvider,
    SemanticModel,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOptions {
    pub check_indentation: bool,
    pub check_scope: bool,
    /// Depends on type inference; off unless the caller opts in.
    pub check_argument_types: bool,
    /// Severity of `GD3002` findings; `GD3001` count mismatches are always
    /// warnings.
    pub argument_type_severity: Severity,
}

impl Default for ValidationOptions {
    fn default() -> ValidationOptions {
        ValidationOptions {
            check_indentation: true,
            check_scope: true,
            check_argument_types: false,
            argument_type_severity: Severity::Warning,
        }
    }
}

/// Run the enabled passes; the model doubles as the argument analyzer.
pub fn validate(model: &SemanticModel, options: &ValidationOptions) -> Vec<Diagnostic> {
    validate_with_analyzer(model, options, model)
}

/// Run the enabled passes with an externally supplied argument analyzer.
pub fn validate_with_analyzer(
    model: &SemanticModel,
    options: &ValidationOptions,
    analyzer: &dyn ArgumentTypeAnalyzer,
) -> Vec<Diagnostic> {
    let mut diagnostics = vec![];

    if options.check_indentation {
        diagnostics.extend(check_indentation(model.tree()));
    }
    if options.check_scope {
        diagnostics.extend(check_scope(model));
    }
    if options.check_argument_types {
        diagnostics.extend(check_arguments(model, options, analyzer));
    }
    diagnostics.extend(check_inheritance(model));

    diagnostics.sort_by_key(|d| (d.start_line, d.start_column, d.code.clone()));
    diagnostics
}

fn check_scope(model: &SemanticModel) -> Vec<Diagnostic> {
    let tree = model.tree();
    let mut diagnostics = vec![];
    let mut nodes: Vec<(&NodeId, &Resolution)> = model.resolutions().iter().collect();
    nodes.sort_by_key(|(id, _)| **id);

    for (node, resolution) in nodes {
        if !resolution.is_unresolved() {
            continue;
        }
        let Some(name) = tree.slot_token(*node, Slot::Name) else {
            continue;
        };
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::UndefinedIdentifier,
            format!("identifier '{}' is not declared in the current scope", name.text),
            (name.line, name.column),
            name.end_position(),
        ));
    }
    diagnostics
}

fn check_arguments(
    model: &SemanticModel,
    options: &ValidationOptions,
    analyzer: &dyn ArgumentTypeAnalyzer,
) -> Vec<Diagnostic> {
    let tree = model.tree();
    let mut diagnostics = vec![];

    for id in 0..tree.len() as u32 {
        let node = NodeId(id);
        if tree.kind(node) != &NodeKind::ExprCall {
            continue;
        }
        for issue in analyzer.check_call(node) {
            let start = tree.start_position(node);
            let end = tree.end_position(node);
            match issue {
                ArgumentIssue::CountMismatch {
                    callee,
                    expected_min,
                    expected_max,
                    actual,
                } => {
                    let expected = match expected_max {
                        Some(max) if max == expected_min => format!("{expected_min}"),
                        Some(max) => format!("{expected_min} to {max}"),
                        None => format!("at least {expected_min}"),
                    };
                    diagnostics.push(Diagnostic::new(
                        DiagnosticKind::ArgumentCountMismatch,
                        format!(
                            "'{callee}' expects {expected} argument(s) but got {actual}"
                        ),
                        start,
                        end,
                    ));
                }
                ArgumentIssue::TypeMismatch {
                    callee,
                    index,
                    expected,
                    actual,
                } => {
                    diagnostics.push(
                        Diagnostic::new(
                            DiagnosticKind::ArgumentTypeMismatch,
                            format!(
                                "argument {} of '{callee}' expects {expected} but got {actual}",
                                index + 1
                            ),
                            start,
                            end,
                        )
                        .with_severity(options.argument_type_severity),
                    );
                }
            }
        }
    }
    diagnostics
}

fn check_inheritance(model: &SemanticModel) -> Vec<Diagnostic> {
    let tree = model.tree();
    let mut diagnostics = vec![];

    let extends_node = tree
        .slot_node(tree.root(), Slot::Body)
        .into_iter()
        .flat_map(|body| tree.child_nodes(body))
        .find(|n| tree.kind(*n) == &NodeKind::ExtendsAttr);

    let Some(extends_node) = extends_node else {
        return diagnostics;
    };
    let start = tree.start_position(extends_node);
    let end = tree.end_position(extends_node);

    match model.extends_target() {
        Some(ExtendsTarget::Named(base)) => {
            if !model.providers().is_known_type(base) {
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::UnknownBaseClass,
                    format!("base class '{base}' cannot be resolved"),
                    start,
                    end,
                ));
                return diagnostics;
            }

            // follow the chain with a visited set; a revisit is a cycle
            let mut visited: HashSet<String> = HashSet::new();
            if let Some(own) = model.class_name() {
                visited.insert(own.to_string());
            }
            let mut current = Some(base.clone());
            while let Some(name) = current {
                if !visited.insert(name.clone()) {
                    diagnostics.push(Diagnostic::new(
                        DiagnosticKind::ExtendsCycle,
                        format!("inheritance chain through '{name}' forms a cycle"),
                        start,
                        end,
                    ));
                    break;
                }
                current = model.providers().get_base_type(&name);
            }
        }
        Some(ExtendsTarget::Path(path)) => {
            // unresolved path stays a hint-level finding; the file may not
            // be part of the loaded project
            if model.context().registry.is_some() {
                diagnostics.push(
                    Diagnostic::new(
                        DiagnosticKind::UnknownBaseClass,
                        format!("script at '{path}' is not part of the analyzed project"),
                        start,
                        end,
                    )
                    .with_severity(Severity::Hint),
                );
            }
        }
        None => {}
    }
    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::typechecker::{
        BuiltinProvider, ClassRegistry, CompositeProvider, ProjectClass, SemanticContext,
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

    #[test]
    fn test_undefined_identifier() {
        let model = model_of("func f():\n\treturn missing_name\n");
        let diagnostics = validate(&model, &ValidationOptions::default());
        assert!(diagnostics.iter().any(|d| d.code == "GD1001"));
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("missing_name")));
    }

    #[test]
    fn test_scope_check_can_be_disabled() {
        let model = model_of("func f():\n\treturn missing_name\n");
        let options = ValidationOptions {
            check_scope: false,
            ..Default::default()
        };
        let diagnostics = validate(&model, &options);
        assert!(!diagnostics.iter().any(|d| d.code == "GD1001"));
    }

    #[test]
    fn test_argument_type_mismatch_message_names_both_types() {
        let model = model_of(
            "func f(x: int) -> void:\n\tpass\n\nfunc g():\n\tf(\"hello\")\n",
        );
        let options = ValidationOptions {
            check_argument_types: true,
            ..Default::default()
        };
        let diagnostics = validate(&model, &options);
        let mismatch = diagnostics
            .iter()
            .find(|d| d.code == "GD3002")
            .expect("no argument type mismatch reported");
        assert!(mismatch.message.contains("String"));
        assert!(mismatch.message.contains("int"));
        assert_eq!(mismatch.severity, Severity::Warning);
    }

    #[test]
    fn test_argument_checks_off_by_default() {
        let model = model_of(
            "func f(x: int) -> void:\n\tpass\n\nfunc g():\n\tf(\"hello\")\n",
        );
        let diagnostics = validate(&model, &ValidationOptions::default());
        assert!(!diagnostics.iter().any(|d| d.code == "GD3002"));
    }

    #[test]
    fn test_unknown_base_class() {
        let model = model_of("extends NoSuchClass\n");
        let diagnostics = validate(&model, &ValidationOptions::default());
        assert!(diagnostics.iter().any(|d| d.code == "GD2002"));
    }

    #[test]
    fn test_extends_cycle_detected() {
        let mut registry = ClassRegistry::new();
        registry.insert(ProjectClass {
            name: "A".into(),
            base: Some("B".into()),
            path: "res://a.gd".into(),
            members: vec![],
        });
        registry.insert(ProjectClass {
            name: "B".into(),
            base: Some("A".into()),
            path: "res://b.gd".into(),
            members: vec![],
        });
        let registry = Arc::new(registry);
        let providers = Arc::new(CompositeProvider::new(vec![
            registry.clone() as Arc<dyn RuntimeTypeProvider>,
            Arc::new(BuiltinProvider),
        ]));

        let outcome = parse("class_name A\nextends B\n");
        let ctx = SemanticContext {
            providers,
            registry: Some(registry),
            ..Default::default()
        };
        let model = SemanticModel::build(outcome.tree, ctx);
        let diagnostics = validate(&model, &ValidationOptions::default());
        assert!(diagnostics.iter().any(|d| d.code == "GD2001"));
    }

    #[test]
    fn test_clean_file_is_quiet() {
        let model = model_of(
            "extends Node2D\n\nvar speed := 200.0\n\nfunc _ready():\n\tposition = Vector2(0, 0)\n",
        );
        let diagnostics = validate(&model, &ValidationOptions::default());
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
    }
}
