//! Whole-project incremental analysis: caching, dependency invalidation,
//! cross-file inheritance and persisted state.

use gdscript_lib::project::{AnalyzerConfig, CancellationToken, Project};

fn project_with(files: &[(&str, &str)]) -> Project {
    let mut project = Project::new("/tmp/gdscript-tools-it");
    for (path, text) in files {
        project.add_source(*path, *text);
    }
    project
}

#[test]
fn scenario_mutual_extends_cycle() {
    // A extends B, B extends A: at least one cycle diagnostic and no hang
    let mut project = project_with(&[
        ("res://a.gd", "class_name MutA\nextends MutB\n\nvar x = 1\n"),
        ("res://b.gd", "class_name MutB\nextends MutA\n\nvar y = 2\n"),
    ]);
    let report = project.analyze(&AnalyzerConfig::default(), &CancellationToken::new());

    let cycle_count = report
        .diagnostics
        .values()
        .flatten()
        .filter(|d| d.code == "GD2001")
        .count();
    assert!(cycle_count >= 1, "{:?}", report.diagnostics);
}

#[test]
fn inheritance_members_span_files() {
    let mut project = project_with(&[
        (
            "res://animal.gd",
            "class_name ItAnimal\nextends Node\n\nvar legs: int = 4\n\nfunc speak() -> String:\n\treturn \"...\"\n",
        ),
        (
            "res://dog.gd",
            "class_name ItDog\nextends ItAnimal\n\nfunc describe() -> String:\n\treturn speak() + str(legs)\n",
        ),
        (
            "res://puppy.gd",
            "extends ItDog\n\nfunc f():\n\treturn describe() + speak()\n",
        ),
    ]);
    let report = project.analyze(&AnalyzerConfig::default(), &CancellationToken::new());
    assert_eq!(report.total_count(), 0, "{:?}", report.diagnostics);
}

#[test]
fn only_changed_files_are_reanalyzed() {
    let mut project = project_with(&[
        ("res://a.gd", "var a = 1\n"),
        ("res://b.gd", "var b = 2\n"),
        ("res://c.gd", "var c = 3\n"),
    ]);
    let config = AnalyzerConfig::default();
    let first = project.analyze(&config, &CancellationToken::new());
    assert_eq!(first.analyzed.len(), 3);

    project.add_source("res://b.gd", "var b = 20\n");
    let second = project.analyze(&config, &CancellationToken::new());
    assert_eq!(second.analyzed, vec!["res://b.gd"]);
    assert_eq!(second.from_cache.len(), 2);
}

#[test]
fn preload_edges_invalidate_loaders() {
    let mut project = project_with(&[
        ("res://util.gd", "class_name ItUtil\nextends Node\n"),
        (
            "res://user.gd",
            "extends Node\nvar helper = preload(\"res://util.gd\")\n",
        ),
    ]);
    let config = AnalyzerConfig::default();
    project.analyze(&config, &CancellationToken::new());

    assert_eq!(
        project.affected_by("res://util.gd"),
        vec!["res://user.gd".to_string()]
    );

    project.add_source("res://util.gd", "class_name ItUtil\nextends Node2D\n");
    let report = project.analyze(&config, &CancellationToken::new());
    assert!(report.analyzed.contains(&"res://user.gd".to_string()));
}

#[test]
fn per_file_errors_do_not_abort_the_batch() {
    let mut project = project_with(&[
        ("res://broken.gd", "func ((((\n\t\t??\n"),
        ("res://fine.gd", "var x = 1\n"),
    ]);
    let report = project.analyze(&AnalyzerConfig::default(), &CancellationToken::new());
    assert_eq!(report.analyzed.len(), 2);
    assert!(report.failed.is_empty());
    // the broken file has findings, the fine one has none
    assert!(!report.diagnostics["res://broken.gd"].is_empty());
    assert!(report.diagnostics["res://fine.gd"].is_empty());
}

#[test]
fn persisted_state_survives_a_new_project_instance() {
    let dir = tempfile::tempdir().unwrap();
    let config = AnalyzerConfig::default();
    let files = [
        ("res://a.gd", "var x = unknown_name\n"),
        ("res://b.gd", "var y = 2\n"),
    ];

    let mut project = project_with(&files);
    let first = project.analyze(&config, &CancellationToken::new());
    assert_eq!(first.analyzed.len(), 2);
    project.persist(dir.path()).unwrap();

    let mut restored = project_with(&files);
    assert!(restored.load_persisted(dir.path()));
    let second = restored.analyze(&config, &CancellationToken::new());
    assert!(second.analyzed.is_empty());
    assert_eq!(second.from_cache.len(), 2);
    // cached diagnostics come back verbatim
    assert!(second.diagnostics["res://a.gd"]
        .iter()
        .any(|d| d.code == "GD1001"));
}

#[test]
fn semantic_update_reports_signature_changes() {
    use gdscript_lib::parser::parse;
    use gdscript_lib::typechecker::{SemanticContext, SemanticModel};

    let outcome = parse("class_name UpA\n\nfunc f(x: int) -> int:\n\treturn x\n");
    let mut model = SemanticModel::build(outcome.tree, SemanticContext::default());

    // a body-only edit leaves the member surface alone
    let body_edit = parse("class_name UpA\n\nfunc f(x: int) -> int:\n\treturn x + 1\n");
    assert!(!model.update(body_edit.tree).signatures_changed);

    // a signature edit affects dependents
    let signature_edit = parse("class_name UpA\n\nfunc f(x: float) -> int:\n\treturn 0\n");
    assert!(model.update(signature_edit.tree).signatures_changed);
}

#[test]
fn autoloads_resolve_as_globals() {
    let mut project = project_with(&[(
        "res://game.gd",
        "extends Node\n\nfunc f():\n\tEvents.queue_free()\n",
    )]);
    project.set_autoload("Events", gdscript_lib::typechecker::Type::named("Node"));
    let report = project.analyze(&AnalyzerConfig::default(), &CancellationToken::new());
    assert_eq!(report.total_count(), 0, "{:?}", report.diagnostics);
}
