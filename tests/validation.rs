//! Validator behavior over whole files: scope checks, indentation checks,
//! argument checks and inheritance resolution.

use std::sync::Arc;

use gdscript_lib::diagnostics::Severity;
use gdscript_lib::parser::parse;
use gdscript_lib::typechecker::{
    BuiltinProvider, CompositeProvider, SemanticContext, SemanticModel,
};
use gdscript_lib::validator::{validate, ValidationOptions};

fn diagnostics_for(source: &str, options: &ValidationOptions) -> Vec<gdscript_lib::Diagnostic> {
    let outcome = parse(source);
    let ctx = SemanticContext {
        providers: Arc::new(CompositeProvider::new(vec![Arc::new(BuiltinProvider)])),
        ..Default::default()
    };
    let model = SemanticModel::build(outcome.tree, ctx);
    validate(&model, options)
}

#[test]
fn scenario_argument_type_mismatch() {
    let source = "func f(x: int) -> void:\n\tpass\n\nfunc g():\n\tf(\"hello\")\n";
    let options = ValidationOptions {
        check_argument_types: true,
        ..Default::default()
    };
    let diagnostics = diagnostics_for(source, &options);

    let mismatch = diagnostics
        .iter()
        .find(|d| d.code == "GD3002")
        .expect("expected an argument type mismatch");
    assert!(mismatch.message.contains("String"));
    assert!(mismatch.message.contains("int"));
    assert_eq!(mismatch.severity, Severity::Warning);
}

#[test]
fn scenario_tab_then_space_indentation() {
    let source = "func test():\n\t var x = 1\n";
    let outcome = parse(source);
    // the variable is still parsed and placed in the method body
    assert_eq!(outcome.tree.serialize(), source);

    let diagnostics = diagnostics_for(source, &ValidationOptions::default());
    let inconsistent: Vec<_> = diagnostics.iter().filter(|d| d.code == "GD6001").collect();
    assert_eq!(inconsistent.len(), 1);
    assert_eq!(inconsistent[0].severity, Severity::Warning);
}

#[test]
fn argument_type_severity_is_configurable() {
    let source = "func f(x: int) -> void:\n\tpass\n\nfunc g():\n\tf(\"hello\")\n";
    let options = ValidationOptions {
        check_argument_types: true,
        argument_type_severity: Severity::Error,
        ..Default::default()
    };
    let diagnostics = diagnostics_for(source, &options);
    let mismatch = diagnostics.iter().find(|d| d.code == "GD3002").unwrap();
    assert_eq!(mismatch.severity, Severity::Error);
}

#[test]
fn undefined_identifier_has_position() {
    let diagnostics = diagnostics_for(
        "func f():\n\treturn mystery\n",
        &ValidationOptions::default(),
    );
    let undefined = diagnostics.iter().find(|d| d.code == "GD1001").unwrap();
    assert_eq!(undefined.start_line, 2);
    assert_eq!(undefined.start_column, 8);
    assert_eq!(undefined.end_column, 15);
}

#[test]
fn diagnostics_serialize_in_wire_shape() {
    let diagnostics = diagnostics_for(
        "func f():\n\treturn mystery\n",
        &ValidationOptions::default(),
    );
    let json = serde_json::to_value(&diagnostics[0]).unwrap();
    assert_eq!(json["code"], "GD1001");
    assert_eq!(json["severity"], 1);
    assert_eq!(json["source"], "validator");
    assert!(json["message"].as_str().unwrap().contains("mystery"));
}

#[test]
fn inherited_members_resolve_through_the_chain() {
    // queue_free lives on Node; Sprite2D extends Node2D extends CanvasItem
    // extends Node
    let diagnostics = diagnostics_for(
        "extends Sprite2D\n\nfunc f():\n\tqueue_free()\n\tposition = Vector2(1, 1)\n\tvisible = false\n",
        &ValidationOptions::default(),
    );
    assert!(diagnostics.is_empty(), "{diagnostics:?}");
}

#[test]
fn validation_is_deterministic() {
    let source = "func f():\n\treturn a + b + c\n";
    let first = diagnostics_for(source, &ValidationOptions::default());
    let second = diagnostics_for(source, &ValidationOptions::default());
    assert_eq!(first, second);
}
