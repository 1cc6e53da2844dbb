//! # Project Module
//!
//! The incremental, parallel, whole-project analyzer.
//!
//! ## Architecture Overview
//!
//! ```text
//! sources  →  class_name registry  →  per-file tasks (parallel)  →  report
//!                (providers)            cache + dependency graph
//! ```
//!
//! ### Lifecycle
//! Construct, load sources, build the registry, analyze, optionally
//! persist, dispose. The registry and provider chain are installed between
//! batches and read-only while tasks run.
//!
//! ### Incrementality
//! Results are cached under `(path, sha256(content))`. A changed file
//! invalidates itself plus the transitive closure of its dependents in the
//! dependency graph (`extends` edges and static `preload`/`load` edges).
//! Unchanged files answer from the cache without re-parsing.
//!
//! ### Isolation
//! Per-file failures never fail the batch: I/O errors are logged and the
//! file skipped, a panicking task is caught at the task boundary and the
//! file reported as unanalyzed, and a task that exceeds the per-file
//! timeout is recorded as timed-out with its previous cache entry left
//! intact. Cancellation is cooperative at per-file boundaries.

mod cache;
mod dependencies;
mod paths;

pub use cache::{
    hash_content, load_state, save_state, CacheEntry, DiagnosticCache, PersistedState,
    TOOL_VERSION,
};
pub use dependencies::{extract_dependencies, DependencyGraph};
pub use paths::{default_excludes, enumerate_scripts, is_resource_path, ProjectPaths};

use std::collections::{BTreeMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::diagnostics::Diagnostic;
use crate::parser::parse;
use crate::typechecker::{
    AutoloadProvider, BuiltinProvider, ClassRegistry, CompositeProvider, ProjectClass,
    RuntimeTypeProvider, SceneTypeSource, SemanticContext, SemanticModel, Type,
};
use crate::validator::{validate, ValidationOptions};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Worker threads for the batch; 0 means the library default.
    pub max_parallelism: usize,
    /// Per-file budget; an over-budget result is discarded.
    pub file_timeout: Duration,
    pub validation: ValidationOptions,
    pub excludes: Vec<String>,
}

impl Default for AnalyzerConfig {
    fn default() -> AnalyzerConfig {
        AnalyzerConfig {
            max_parallelism: 0,
            file_timeout: Duration::from_secs(30),
            validation: ValidationOptions::default(),
            excludes: default_excludes(),
        }
    }
}

/// Cooperative cancellation, checked at per-file boundaries.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> CancellationToken {
        CancellationToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnalysisReport {
    /// Per-file diagnostics, keyed by project-relative path.
    pub diagnostics: BTreeMap<String, Vec<Diagnostic>>,
    pub analyzed: Vec<String>,
    pub from_cache: Vec<String>,
    pub timed_out: Vec<String>,
    /// Files whose analysis task failed internally; reported unanalyzed.
    pub failed: Vec<String>,
    pub cancelled: bool,
}

impl AnalysisReport {
    pub fn error_count(&self) -> usize {
        self.diagnostics
            .values()
            .flatten()
            .filter(|d| d.is_error())
            .count()
    }

    pub fn total_count(&self) -> usize {
        self.diagnostics.values().map(|d| d.len()).sum()
    }
}

enum TaskOutcome {
    Completed {
        diagnostics: Vec<Diagnostic>,
        dependencies: HashSet<String>,
    },
    TimedOut,
    Failed,
    Cancelled,
}

pub struct Project {
    paths: ProjectPaths,
    sources: BTreeMap<String, String>,
    registry: Arc<ClassRegistry>,
    providers: Arc<CompositeProvider>,
    autoloads: AutoloadProvider,
    scene_types: Option<Arc<dyn SceneTypeSource>>,
    owning_scenes: BTreeMap<String, String>,
    graph: DependencyGraph,
    cache: DiagnosticCache,
}

impl Project {
    pub fn new(root: impl AsRef<Path>) -> Project {
        Project {
            paths: ProjectPaths::new(root.as_ref()),
            sources: BTreeMap::new(),
            registry: Arc::new(ClassRegistry::new()),
            providers: Arc::new(CompositeProvider::new(vec![Arc::new(BuiltinProvider)])),
            autoloads: AutoloadProvider::new(),
            scene_types: None,
            owning_scenes: BTreeMap::new(),
            graph: DependencyGraph::new(),
            cache: DiagnosticCache::new(),
        }
    }

    pub fn paths(&self) -> &ProjectPaths {
        &self.paths
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn registry(&self) -> &Arc<ClassRegistry> {
        &self.registry
    }

    /// Read every matching `.gd` file under the project root. I/O failures
    /// are logged and the file skipped; the batch continues.
    pub fn load_sources(&mut self, config: &AnalyzerConfig) {
        for resource in enumerate_scripts(self.paths.root(), &config.excludes) {
            let Some(path) = self.paths.resolve(&resource) else {
                continue;
            };
            match std::fs::read_to_string(&path) {
                Ok(text) => {
                    self.sources.insert(resource, text);
                }
                Err(error) => {
                    log::error!("failed to read {}: {error}", path.display());
                }
            }
        }
    }

    /// Install or replace a source in memory.
    pub fn add_source(&mut self, resource: impl Into<String>, text: impl Into<String>) {
        self.sources.insert(resource.into(), text.into());
    }

    /// Remove a file: sources, cache entry and both graph directions go;
    /// the files that depended on it are returned for re-analysis.
    pub fn remove_source(&mut self, resource: &str) -> Vec<String> {
        let mut affected: Vec<String> = self.graph.dependents_closure(resource).into_iter().collect();
        affected.sort();
        self.sources.remove(resource);
        self.cache.remove(resource);
        self.graph.remove_file(resource);
        self.registry_mut().remove_path(resource);
        affected
    }

    /// Files affected by a change to `resource` (excluding the file itself).
    pub fn affected_by(&self, resource: &str) -> Vec<String> {
        let mut affected: Vec<String> = self.graph.dependents_closure(resource).into_iter().collect();
        affected.sort();
        affected
    }

    pub fn set_autoload(&mut self, name: impl Into<String>, ty: Type) {
        self.autoloads.insert(name, ty);
    }

    pub fn set_scene_types(&mut self, scenes: Arc<dyn SceneTypeSource>) {
        self.scene_types = Some(scenes);
    }

    /// Record which scene instantiates a script, for `$NodePath` typing.
    pub fn set_owning_scene(&mut self, script: impl Into<String>, scene: impl Into<String>) {
        self.owning_scenes.insert(script.into(), scene.into());
    }

    fn registry_mut(&mut self) -> &mut ClassRegistry {
        Arc::make_mut(&mut self.registry)
    }

    /// Rebuild the project-global `class_name` registry and the provider
    /// chain. Runs between batches; analysis tasks see it read-only.
    pub fn build_registry(&mut self) {
        let builtin_ctx = SemanticContext {
            providers: Arc::new(CompositeProvider::new(vec![Arc::new(BuiltinProvider)])),
            ..Default::default()
        };

        let mut registry = ClassRegistry::new();
        let mut path_bases: Vec<(String, String)> = vec![];
        for (resource, text) in &self.sources {
            let outcome = parse(text);
            let model = SemanticModel::build(outcome.tree, builtin_ctx.clone());
            let Some(class_name) = model.class_name() else {
                continue;
            };
            let base = match model.extends_target() {
                Some(crate::typechecker::ExtendsTarget::Named(name)) => Some(name.clone()),
                Some(crate::typechecker::ExtendsTarget::Path(path)) => {
                    path_bases.push((class_name.to_string(), path.clone()));
                    None
                }
                None => None,
            };
            registry.insert(ProjectClass {
                name: class_name.to_string(),
                base,
                path: resource.clone(),
                members: model.exported_members(),
            });
        }

        // second pass: resolve extends-by-path now that every class is known
        for (class_name, base_path) in path_bases {
            let base = registry.class_at_path(&base_path).map(|c| c.name.clone());
            if let (Some(base), Some(class)) = (base, registry.get(&class_name).cloned()) {
                registry.insert(ProjectClass {
                    base: Some(base),
                    ..class
                });
            }
        }

        let registry = Arc::new(registry);
        self.registry = registry.clone();
        self.providers = Arc::new(CompositeProvider::new(vec![
            registry as Arc<dyn RuntimeTypeProvider>,
            Arc::new(self.autoloads.clone()),
            Arc::new(BuiltinProvider),
        ]));
    }

    fn context_for(&self, resource: &str) -> SemanticContext {
        SemanticContext {
            providers: self.providers.clone(),
            registry: Some(self.registry.clone()),
            scene_types: self.scene_types.clone(),
            owning_scene: self.owning_scenes.get(resource).cloned(),
        }
    }

    /// Build the semantic model of one loaded file with the installed
    /// providers; the entry point for callers that want more than
    /// diagnostics (rename, flow analysis, go-to-definition).
    pub fn model_of(&self, resource: &str) -> Option<SemanticModel> {
        let text = self.sources.get(resource)?;
        let outcome = parse(text);
        Some(SemanticModel::build(outcome.tree, self.context_for(resource)))
    }

    /// Analyze the project incrementally.
    pub fn analyze(&mut self, config: &AnalyzerConfig, cancel: &CancellationToken) -> AnalysisReport {
        self.build_registry();

        let hashes: BTreeMap<String, String> = self
            .sources
            .iter()
            .map(|(path, text)| (path.clone(), hash_content(text.as_bytes())))
            .collect();

        // a file runs when its own content changed or a dependency did
        let changed: Vec<String> = hashes
            .iter()
            .filter(|(path, hash)| self.cache.get(path, hash).is_none())
            .map(|(path, _)| path.clone())
            .collect();
        let mut affected: HashSet<String> = changed.iter().cloned().collect();
        for path in &changed {
            affected.extend(self.graph.dependents_closure(path));
        }
        let mut to_run: Vec<String> = affected
            .into_iter()
            .filter(|path| self.sources.contains_key(path))
            .collect();
        to_run.sort();

        let mut report = AnalysisReport::default();
        for (path, hash) in &hashes {
            if to_run.contains(path) {
                continue;
            }
            if let Some(entry) = self.cache.get(path, hash) {
                report.diagnostics.insert(path.clone(), entry.diagnostics);
                report.from_cache.push(path.clone());
            }
        }

        let outcomes = self.run_batch(&to_run, config, cancel);

        for (path, outcome) in to_run.iter().zip(outcomes) {
            match outcome {
                TaskOutcome::Completed {
                    diagnostics,
                    dependencies,
                } => {
                    let entry = CacheEntry::new(
                        path.clone(),
                        hashes.get(path).cloned().unwrap_or_default(),
                        diagnostics.clone(),
                        dependencies.iter().cloned().collect(),
                    );
                    self.cache.publish(entry);
                    self.graph.set_dependencies(path, dependencies);
                    report.diagnostics.insert(path.clone(), diagnostics);
                    report.analyzed.push(path.clone());
                }
                TaskOutcome::TimedOut => {
                    log::warn!("analysis of {path} exceeded the per-file timeout");
                    report.timed_out.push(path.clone());
                    if let Some(previous) = self.cache.get_any(path) {
                        report
                            .diagnostics
                            .insert(path.clone(), previous.diagnostics);
                    }
                }
                TaskOutcome::Failed => {
                    log::error!("analysis of {path} failed internally; file left unanalyzed");
                    report.failed.push(path.clone());
                }
                TaskOutcome::Cancelled => {
                    report.cancelled = true;
                }
            }
        }
        report
    }

    fn run_batch(
        &self,
        to_run: &[String],
        config: &AnalyzerConfig,
        cancel: &CancellationToken,
    ) -> Vec<TaskOutcome> {
        let task = |path: &String| -> TaskOutcome {
            if cancel.is_cancelled() {
                return TaskOutcome::Cancelled;
            }
            let Some(text) = self.sources.get(path) else {
                return TaskOutcome::Failed;
            };
            let started = Instant::now();
            let context = self.context_for(path);
            let validation = config.validation.clone();
            let result = catch_unwind(AssertUnwindSafe(|| {
                analyze_one(text, context, &validation)
            }));
            match result {
                Err(_) => TaskOutcome::Failed,
                Ok((diagnostics, dependencies)) => {
                    if started.elapsed() > config.file_timeout {
                        TaskOutcome::TimedOut
                    } else {
                        TaskOutcome::Completed {
                            diagnostics,
                            dependencies,
                        }
                    }
                }
            }
        };

        if config.max_parallelism > 0 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(config.max_parallelism)
                .build()
            {
                Ok(pool) => pool.install(|| to_run.par_iter().map(task).collect()),
                Err(error) => {
                    log::warn!("falling back to the global thread pool: {error}");
                    to_run.par_iter().map(task).collect()
                }
            }
        } else {
            to_run.par_iter().map(task).collect()
        }
    }

    /// Persist the incremental state under `dir`.
    pub fn persist(&self, dir: &Path) -> std::io::Result<()> {
        let state = PersistedState {
            version: TOOL_VERSION.to_string(),
            project: self.paths.root().to_string_lossy().into_owned(),
            entries: self.cache.snapshot(),
            dependents: self.graph.dependents_adjacency(),
        };
        save_state(dir, &state)
    }

    /// Restore persisted state; a version mismatch starts clean.
    pub fn load_persisted(&mut self, dir: &Path) -> bool {
        let project = self.paths.root().to_string_lossy().into_owned();
        match load_state(dir, &project) {
            Some(state) => {
                self.cache.load(state.entries);
                self.graph.load_dependents_adjacency(state.dependents);
                true
            }
            None => false,
        }
    }
}

/// One per-file task: parse, bind, validate, extract dependencies.
fn analyze_one(
    text: &str,
    context: SemanticContext,
    validation: &ValidationOptions,
) -> (Vec<Diagnostic>, HashSet<String>) {
    let outcome = parse(text);
    let mut diagnostics = outcome.diagnostics;
    let model = SemanticModel::build(outcome.tree, context);
    diagnostics.extend(validate(&model, validation));
    diagnostics.sort_by_key(|d| (d.start_line, d.start_column, d.code.clone()));
    let dependencies = extract_dependencies(&model);
    (diagnostics, dependencies)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project_with(files: &[(&str, &str)]) -> Project {
        let mut project = Project::new("/tmp/gdscript-tools-test");
        for (path, text) in files {
            project.add_source(*path, *text);
        }
        project
    }

    #[test]
    fn test_analyze_clean_project() {
        let mut project = project_with(&[(
            "res://player.gd",
            "extends Node2D\n\nfunc _ready():\n\tposition = Vector2(0, 0)\n",
        )]);
        let report = project.analyze(&AnalyzerConfig::default(), &CancellationToken::new());
        assert_eq!(report.analyzed, vec!["res://player.gd"]);
        assert_eq!(report.error_count(), 0);
        assert_eq!(report.total_count(), 0);
    }

    #[test]
    fn test_second_run_hits_cache() {
        let mut project = project_with(&[("res://a.gd", "var x = missing\n")]);
        let config = AnalyzerConfig::default();
        let first = project.analyze(&config, &CancellationToken::new());
        assert_eq!(first.analyzed.len(), 1);
        assert_eq!(first.total_count(), 1);

        let second = project.analyze(&config, &CancellationToken::new());
        assert!(second.analyzed.is_empty());
        assert_eq!(second.from_cache, vec!["res://a.gd"]);
        assert_eq!(second.total_count(), 1);
    }

    #[test]
    fn test_change_invalidates_dependents() {
        let mut project = project_with(&[
            ("res://base.gd", "class_name TestBase\nextends Node\n\nfunc helper() -> int:\n\treturn 1\n"),
            ("res://child.gd", "extends TestBase\n\nfunc f():\n\treturn helper()\n"),
        ]);
        let config = AnalyzerConfig::default();
        let first = project.analyze(&config, &CancellationToken::new());
        assert_eq!(first.analyzed.len(), 2);
        assert_eq!(first.total_count(), 0, "{:?}", first.diagnostics);

        // editing the base re-analyzes the child as well
        project.add_source(
            "res://base.gd",
            "class_name TestBase\nextends Node\n\nfunc helper2() -> int:\n\treturn 1\n",
        );
        let second = project.analyze(&config, &CancellationToken::new());
        assert!(second.analyzed.contains(&"res://base.gd".to_string()));
        assert!(second.analyzed.contains(&"res://child.gd".to_string()));
        // the child now calls a method that no longer exists
        assert!(second.diagnostics["res://child.gd"]
            .iter()
            .any(|d| d.code == "GD1001"));
    }

    #[test]
    fn test_extends_cycle_across_files() {
        let mut project = project_with(&[
            ("res://a.gd", "class_name CycleA\nextends CycleB\n"),
            ("res://b.gd", "class_name CycleB\nextends CycleA\n"),
        ]);
        let report = project.analyze(&AnalyzerConfig::default(), &CancellationToken::new());
        let cycles: usize = report
            .diagnostics
            .values()
            .flatten()
            .filter(|d| d.code == "GD2001")
            .count();
        assert!(cycles >= 1, "{:?}", report.diagnostics);
    }

    #[test]
    fn test_cancellation_skips_files() {
        let mut project = project_with(&[("res://a.gd", "var x = 1\n")]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = project.analyze(&AnalyzerConfig::default(), &cancel);
        assert!(report.cancelled);
        assert!(report.analyzed.is_empty());
    }

    #[test]
    fn test_removed_file_reports_dependents() {
        let mut project = project_with(&[
            ("res://base.gd", "class_name RmBase\nextends Node\n"),
            ("res://child.gd", "extends RmBase\n"),
        ]);
        let config = AnalyzerConfig::default();
        project.analyze(&config, &CancellationToken::new());

        let affected = project.remove_source("res://base.gd");
        assert_eq!(affected, vec!["res://child.gd"]);
    }

    #[test]
    fn test_persistence_roundtrip_through_project() {
        let dir = tempfile::tempdir().unwrap();
        let config = AnalyzerConfig::default();

        let mut project = project_with(&[("res://a.gd", "var x = 1\n")]);
        project.analyze(&config, &CancellationToken::new());
        project.persist(dir.path()).unwrap();

        let mut restored = project_with(&[("res://a.gd", "var x = 1\n")]);
        assert!(restored.load_persisted(dir.path()));
        let report = restored.analyze(&config, &CancellationToken::new());
        assert!(report.analyzed.is_empty(), "{:?}", report.analyzed);
        assert_eq!(report.from_cache, vec!["res://a.gd"]);
    }

    #[test]
    fn test_parallelism_is_deterministic_per_file() {
        let files: Vec<(String, String)> = (0..24)
            .map(|i| {
                (
                    format!("res://f{i}.gd"),
                    format!("var x{i} = {i}\nvar bad = missing_{i}\n"),
                )
            })
            .collect();
        let mut project = Project::new("/tmp/gdscript-tools-par");
        for (path, text) in &files {
            project.add_source(path.clone(), text.clone());
        }
        let config = AnalyzerConfig {
            max_parallelism: 4,
            ..Default::default()
        };
        let report = project.analyze(&config, &CancellationToken::new());
        assert_eq!(report.analyzed.len(), 24);
        for (path, _) in &files {
            assert_eq!(report.diagnostics[path].len(), 1, "for {path}");
        }
    }
}
