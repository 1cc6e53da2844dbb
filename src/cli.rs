//! Command-line surface: `check` emits one diagnostic stream over a file or
//! directory, `format` rewrites or verifies formatting. Exit code 0 means no
//! errors (and no warnings/hints when the corresponding promotion flag is
//! set); non-zero otherwise.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;

use gdscript_lib::diagnostics::{Diagnostic, Severity};
use gdscript_lib::formatter::{format_source, FormatterOptions, IndentStylePref};
use gdscript_lib::project::{AnalyzerConfig, CancellationToken, Project};
use gdscript_lib::validator::ValidationOptions;

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log more than warnings and errors.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse and validate a script or a project directory.
    Check {
        /// A `.gd` file or a project directory.
        path: PathBuf,

        /// Emit diagnostics as JSON lines instead of colored text.
        #[arg(long)]
        json: bool,

        /// Non-zero exit code when warnings are present.
        #[arg(long)]
        fail_on_warning: bool,

        /// Non-zero exit code when hints or infos are present.
        #[arg(long)]
        fail_on_hint: bool,

        /// Enable the inference-backed argument-type pass.
        #[arg(long)]
        check_argument_types: bool,

        /// Glob-ish patterns to skip (defaults: `.godot/**`, `addons/**`).
        #[arg(long)]
        exclude: Vec<String>,

        /// Persist and reuse incremental state in this directory.
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Worker threads for the analysis batch.
        #[arg(short, long)]
        jobs: Option<usize>,
    },
    /// Reformat a script or a project directory.
    Format {
        /// A `.gd` file or a project directory.
        path: PathBuf,

        /// Rewrite files in place (otherwise a single file prints to
        /// stdout).
        #[arg(long)]
        write: bool,

        /// Only verify; non-zero exit code when a file would change.
        #[arg(long)]
        check: bool,

        /// Indent with spaces instead of tabs.
        #[arg(long)]
        use_spaces: bool,

        /// Spaces per indentation level in spaces mode.
        #[arg(long, default_value_t = 4)]
        indent_size: usize,
    },
}

pub fn run() -> i32 {
    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    if let Err(error) = simple_logger::SimpleLogger::new().with_level(level).init() {
        eprintln!("failed to initialize logging: {error}");
    }

    match dispatch(cli.command) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("{} {error:#}", "error:".red().bold());
            2
        }
    }
}

fn dispatch(command: Command) -> Result<i32> {
    match command {
        Command::Check {
            path,
            json,
            fail_on_warning,
            fail_on_hint,
            check_argument_types,
            exclude,
            cache_dir,
            jobs,
        } => check(
            &path,
            json,
            fail_on_warning,
            fail_on_hint,
            check_argument_types,
            exclude,
            cache_dir,
            jobs,
        ),
        Command::Format {
            path,
            write,
            check,
            use_spaces,
            indent_size,
        } => format(&path, write, check, use_spaces, indent_size),
    }
}

#[allow(clippy::too_many_arguments)]
fn check(
    path: &Path,
    json: bool,
    fail_on_warning: bool,
    fail_on_hint: bool,
    check_argument_types: bool,
    exclude: Vec<String>,
    cache_dir: Option<PathBuf>,
    jobs: Option<usize>,
) -> Result<i32> {
    let mut config = AnalyzerConfig {
        validation: ValidationOptions {
            check_argument_types,
            ..Default::default()
        },
        ..Default::default()
    };
    if !exclude.is_empty() {
        config.excludes = exclude;
    }
    if let Some(jobs) = jobs {
        config.max_parallelism = jobs;
    }

    let mut project = if path.is_dir() {
        let mut project = Project::new(path);
        project.load_sources(&config);
        project
    } else {
        let root = path.parent().unwrap_or(Path::new("."));
        let mut project = Project::new(root);
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        project.add_source(format!("res://{name}"), text);
        project
    };

    if let Some(dir) = &cache_dir {
        project.load_persisted(dir);
    }

    let report = project.analyze(&config, &CancellationToken::new());

    if let Some(dir) = &cache_dir {
        if let Err(error) = project.persist(dir) {
            log::error!("failed to persist incremental state: {error}");
        }
    }

    let mut warnings = 0usize;
    let mut errors = 0usize;
    let mut hints = 0usize;
    for (file, diagnostics) in &report.diagnostics {
        for diagnostic in diagnostics {
            match diagnostic.severity {
                Severity::Error => errors += 1,
                Severity::Warning => warnings += 1,
                Severity::Info | Severity::Hint => hints += 1,
            }
            if json {
                println!(
                    "{}",
                    serde_json::to_string(&WireDiagnostic { file, diagnostic })?
                );
            } else {
                print_diagnostic(file, diagnostic);
            }
        }
    }

    for file in &report.failed {
        eprintln!("{} {file} was not analyzed", "warning:".yellow().bold());
    }
    for file in &report.timed_out {
        eprintln!("{} {file} timed out", "warning:".yellow().bold());
    }

    if !json {
        let checked = report.analyzed.len() + report.from_cache.len();
        eprintln!(
            "{checked} file(s) checked, {errors} error(s), {warnings} warning(s), {hints} hint(s)"
        );
    }

    let failing = errors > 0
        || (fail_on_warning && warnings > 0)
        || (fail_on_hint && hints > 0)
        || !report.failed.is_empty();
    Ok(if failing { 1 } else { 0 })
}

#[derive(serde::Serialize)]
struct WireDiagnostic<'a> {
    file: &'a str,
    #[serde(flatten)]
    diagnostic: &'a Diagnostic,
}

fn print_diagnostic(file: &str, diagnostic: &Diagnostic) {
    let severity = match diagnostic.severity {
        Severity::Error => "error".red().bold(),
        Severity::Warning => "warning".yellow().bold(),
        Severity::Info => "info".cyan().bold(),
        Severity::Hint => "hint".dimmed(),
    };
    println!(
        "{file}:{}:{}: {severity}[{}] {}",
        diagnostic.start_line, diagnostic.start_column, diagnostic.code, diagnostic.message
    );
}

fn format(path: &Path, write: bool, check: bool, use_spaces: bool, indent_size: usize) -> Result<i32> {
    let options = FormatterOptions {
        indent_style: if use_spaces {
            IndentStylePref::Spaces
        } else {
            IndentStylePref::Tabs
        },
        indent_size,
        ..Default::default()
    };

    let files: Vec<PathBuf> = if path.is_dir() {
        gdscript_lib::project::enumerate_scripts(path, &gdscript_lib::project::default_excludes())
            .iter()
            .filter_map(|resource| {
                gdscript_lib::project::ProjectPaths::new(path).resolve(resource)
            })
            .collect()
    } else {
        vec![path.to_path_buf()]
    };

    if path.is_dir() && !write && !check {
        anyhow::bail!("formatting a directory requires --write or --check");
    }

    let mut would_change = 0usize;
    for file in &files {
        let source = std::fs::read_to_string(file)
            .with_context(|| format!("cannot read {}", file.display()))?;
        let formatted = format_source(&source, &options);

        if check {
            if formatted != source {
                println!("{} would be reformatted", file.display());
                would_change += 1;
            }
        } else if write {
            if formatted != source {
                std::fs::write(file, &formatted)
                    .with_context(|| format!("cannot write {}", file.display()))?;
                would_change += 1;
                log::debug!("reformatted {}", file.display());
            }
        } else {
            print!("{formatted}");
        }
    }

    if check && would_change > 0 {
        eprintln!("{would_change} file(s) would be reformatted");
        return Ok(1);
    }
    Ok(0)
}
