//! Resource paths and project enumeration.
//!
//! `res://…` paths are project-relative; conversion to file-system paths is
//! the only place the project root is consulted. Enumeration honors a
//! configurable exclude list of glob-ish patterns.

use std::path::{Path, PathBuf};

use regex::Regex;
use walkdir::WalkDir;

pub const RESOURCE_PREFIX: &str = "res://";

/// Patterns excluded from analysis unless the caller overrides them.
pub fn default_excludes() -> Vec<String> {
    vec![".godot/**".into(), "addons/**".into()]
}

pub fn is_resource_path(path: &str) -> bool {
    path.starts_with(RESOURCE_PREFIX)
}

#[derive(Debug, Clone)]
pub struct ProjectPaths {
    root: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: impl Into<PathBuf>) -> ProjectPaths {
        ProjectPaths { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `res://scripts/a.gd` → `<root>/scripts/a.gd`.
    pub fn resolve(&self, resource: &str) -> Option<PathBuf> {
        let relative = resource.strip_prefix(RESOURCE_PREFIX)?;
        Some(self.root.join(relative))
    }

    /// `<root>/scripts/a.gd` → `res://scripts/a.gd`.
    pub fn to_resource(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let mut resource = String::from(RESOURCE_PREFIX);
        resource.push_str(&relative.to_string_lossy().replace('\\', "/"));
        Some(resource)
    }
}

/// Compile one exclude pattern (`.godot/**`, `addons/*`, literal paths)
/// into a regex over forward-slashed relative paths.
fn compile_pattern(pattern: &str) -> Option<Regex> {
    let mut regex = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    regex.push_str(".*");
                } else {
                    regex.push_str("[^/]*");
                }
            }
            '?' => regex.push_str("[^/]"),
            c => regex.push_str(&regex::escape(&c.to_string())),
        }
    }
    regex.push('$');
    Regex::new(&regex).ok()
}

/// Enumerate the `.gd` files under `root`, returned as sorted
/// project-relative `res://` paths.
pub fn enumerate_scripts(root: &Path, excludes: &[String]) -> Vec<String> {
    let patterns: Vec<Regex> = excludes.iter().filter_map(|p| compile_pattern(p)).collect();
    let paths = ProjectPaths::new(root);

    let mut scripts = vec![];
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                log::warn!("skipping unreadable directory entry: {error}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension().and_then(|e| e.to_str()) != Some("gd") {
            continue;
        }
        let Some(resource) = paths.to_resource(entry.path()) else {
            continue;
        };
        let relative = resource.trim_start_matches(RESOURCE_PREFIX);
        if patterns.iter().any(|p| p.is_match(relative)) {
            continue;
        }
        scripts.push(resource);
    }
    scripts.sort();
    scripts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_roundtrip() {
        let paths = ProjectPaths::new("/tmp/project");
        let resolved = paths.resolve("res://scripts/a.gd").unwrap();
        assert_eq!(resolved, PathBuf::from("/tmp/project/scripts/a.gd"));
        assert_eq!(
            paths.to_resource(&resolved),
            Some("res://scripts/a.gd".into())
        );
    }

    #[test]
    fn test_exclude_patterns() {
        let pattern = compile_pattern("addons/**").unwrap();
        assert!(pattern.is_match("addons/tool/plugin.gd"));
        assert!(!pattern.is_match("scripts/addons.gd"));

        let single = compile_pattern("*.gd").unwrap();
        assert!(single.is_match("a.gd"));
        assert!(!single.is_match("dir/a.gd"));
    }

    #[test]
    fn test_enumerate_scripts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("scripts")).unwrap();
        std::fs::create_dir_all(dir.path().join("addons/x")).unwrap();
        std::fs::write(dir.path().join("main.gd"), "pass\n").unwrap();
        std::fs::write(dir.path().join("scripts/a.gd"), "pass\n").unwrap();
        std::fs::write(dir.path().join("scripts/readme.md"), "").unwrap();
        std::fs::write(dir.path().join("addons/x/tool.gd"), "pass\n").unwrap();

        let scripts = enumerate_scripts(dir.path(), &default_excludes());
        assert_eq!(scripts, vec!["res://main.gd", "res://scripts/a.gd"]);
    }
}
