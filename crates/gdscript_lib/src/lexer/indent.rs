//! Indentation model.
//!
//! Indentation is an ordered sequence of units where each unit is either a
//! tab or a fixed-width group of spaces. A run keeps the literal pattern so
//! reserialization reproduces the original bytes, plus a derived unit count
//! (the depth) and a classifier describing which style the run uses.

use serde::{Deserialize, Serialize};

/// Which style an indentation run is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndentStyle {
    Tabs,
    Spaces,
    /// Both tabs and spaces occur within the same run.
    Mixed,
}

/// A single maximal run of leading whitespace on one line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndentRun {
    /// Number of indentation units (the block depth this run encodes).
    pub units: usize,
    pub style: IndentStyle,
    /// Width of one space group, when the run is space based.
    pub space_width: usize,
}

impl IndentRun {
    /// Classify a literal whitespace pattern. `space_width` is the number of
    /// spaces that count as one unit; a trailing partial group still counts
    /// as a unit so that a half-indented line lands inside the deeper block
    /// (the validator reports it separately).
    pub fn from_pattern(pattern: &str, space_width: usize) -> IndentRun {
        let tabs = pattern.chars().filter(|c| *c == '\t').count();
        let spaces = pattern.chars().filter(|c| *c == ' ').count();

        let style = match (tabs, spaces) {
            (0, 0) | (_, 0) => IndentStyle::Tabs,
            (0, _) => IndentStyle::Spaces,
            _ => IndentStyle::Mixed,
        };

        let width = space_width.max(1);
        let units = tabs + spaces.div_ceil(width);

        IndentRun {
            units,
            style,
            space_width: width,
        }
    }

    /// Render `units` worth of indentation in the given style.
    pub fn render(units: usize, style: IndentStyle, space_width: usize) -> String {
        match style {
            IndentStyle::Tabs | IndentStyle::Mixed => "\t".repeat(units),
            IndentStyle::Spaces => " ".repeat(units * space_width.max(1)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tab_run() {
        let run = IndentRun::from_pattern("\t\t", 4);
        assert_eq!(run.units, 2);
        assert_eq!(run.style, IndentStyle::Tabs);
    }

    #[test]
    fn test_space_run() {
        let run = IndentRun::from_pattern("        ", 4);
        assert_eq!(run.units, 2);
        assert_eq!(run.style, IndentStyle::Spaces);
    }

    #[test]
    fn test_partial_space_group_rounds_up() {
        let run = IndentRun::from_pattern("      ", 4);
        assert_eq!(run.units, 2);
    }

    #[test]
    fn test_mixed_run() {
        let run = IndentRun::from_pattern("\t    ", 4);
        assert_eq!(run.units, 2);
        assert_eq!(run.style, IndentStyle::Mixed);
    }

    #[test]
    fn test_render_roundtrip_depth() {
        let rendered = IndentRun::render(3, IndentStyle::Spaces, 2);
        let run = IndentRun::from_pattern(&rendered, 2);
        assert_eq!(run.units, 3);
    }
}
