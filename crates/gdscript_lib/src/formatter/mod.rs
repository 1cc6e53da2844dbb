//! # Formatter Module
//!
//! The format rule pipeline and the string-level post-pass.
//!
//! ```text
//! CST  →  rules (mutate in place)  →  serialize  →  post-pass  →  text
//! ```
//!
//! Rules transform indentation, whitespace and blank lines only; this is
//! not an auto-wrapper. The whole pipeline is idempotent: formatting the
//! output of a format changes nothing. Fixes that are awkward to express
//! structurally (trailing-newline handling, line-ending conversion) run on
//! the serialized string afterwards.

mod rules;

pub use rules::{
    default_rules, BlankLinesRule, FormatRule, IndentationRule, SpacingRule,
    TrailingWhitespaceRule,
};

use serde::{Deserialize, Serialize};

use crate::parser::{parse, SyntaxTree};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndentStylePref {
    Tabs,
    Spaces,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineEndingStyle {
    Lf,
    Crlf,
    Platform,
}

impl LineEndingStyle {
    fn as_str(&self) -> &'static str {
        match self {
            LineEndingStyle::Lf => "\n",
            LineEndingStyle::Crlf => "\r\n",
            LineEndingStyle::Platform => {
                if cfg!(windows) {
                    "\r\n"
                } else {
                    "\n"
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatterOptions {
    pub indent_style: IndentStylePref,
    pub indent_size: usize,
    pub line_endings: LineEndingStyle,
    pub blank_lines_between_functions: usize,
    pub blank_lines_after_class_declaration: usize,
    pub blank_lines_between_member_groups: usize,
    pub spaces_around_operators: bool,
    pub space_after_comma: bool,
    pub space_around_colon: bool,
    pub spaces_inside_brackets: bool,
    pub remove_trailing_whitespace: bool,
    pub ensure_trailing_newline: bool,
    pub collapse_trailing_newlines: bool,
    /// Tracked for diagnostics; lines are never wrapped automatically.
    pub max_line_length: usize,
}

impl Default for FormatterOptions {
    fn default() -> FormatterOptions {
        FormatterOptions {
            indent_style: IndentStylePref::Tabs,
            indent_size: 4,
            line_endings: LineEndingStyle::Lf,
            blank_lines_between_functions: 1,
            blank_lines_after_class_declaration: 1,
            blank_lines_between_member_groups: 1,
            spaces_around_operators: true,
            space_after_comma: true,
            space_around_colon: false,
            spaces_inside_brackets: false,
            remove_trailing_whitespace: true,
            ensure_trailing_newline: true,
            collapse_trailing_newlines: true,
            max_line_length: 100,
        }
    }
}

/// Apply the default-enabled rules (plus nothing else) to a tree in place.
pub fn format_tree(tree: &mut SyntaxTree, options: &FormatterOptions) {
    for rule in default_rules() {
        if rule.enabled_by_default() {
            rule.apply(tree, options);
        }
    }
}

/// Apply an explicit rule list to a tree in place.
pub fn format_tree_with(
    tree: &mut SyntaxTree,
    options: &FormatterOptions,
    rules: &[Box<dyn FormatRule>],
) {
    for rule in rules {
        rule.apply(tree, options);
    }
}

/// Format source text end to end: parse, run the pipeline, serialize, and
/// apply the string-level fixes.
pub fn format_source(source: &str, options: &FormatterOptions) -> String {
    let mut outcome = parse(source);
    format_tree(&mut outcome.tree, options);
    post_process(outcome.tree.serialize(), options)
}

/// String-level fixes after serialization: collapse runs of trailing
/// newlines, guarantee a final newline, and convert line endings.
pub fn post_process(text: String, options: &FormatterOptions) -> String {
    let mut text = text;

    if options.collapse_trailing_newlines {
        let trimmed_len = text.trim_end_matches(['\n', '\r']).len();
        if trimmed_len < text.len() {
            text.truncate(trimmed_len);
            text.push('\n');
        }
    }

    if options.ensure_trailing_newline && !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }

    // normalize to LF first so CRLF conversion cannot double up
    let normalized = text.replace("\r\n", "\n");
    match options.line_endings.as_str() {
        "\n" => normalized,
        ending => normalized.replace('\n', ending),
    }
}

/// Lines longer than `max_line_length`, reported but never rewritten.
pub fn overlong_lines(text: &str, options: &FormatterOptions) -> Vec<(usize, usize)> {
    text.lines()
        .enumerate()
        .filter_map(|(index, line)| {
            let width = line.chars().count();
            (width > options.max_line_length).then_some((index + 1, width))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pipeline_converts_indentation() {
        let options = FormatterOptions {
            indent_style: IndentStylePref::Spaces,
            indent_size: 2,
            ..Default::default()
        };
        let formatted = format_source("func f():\n\tif a:\n\t\tpass\n", &options);
        assert_eq!(formatted, "func f():\n  if a:\n    pass\n");
    }

    #[test]
    fn test_format_is_idempotent() {
        let sources = [
            "func f():\n\tif a:\n\t\tpass   \n\n\n\n",
            "var x=1\nfunc f():\n    pass",
            "extends Node\n\nvar a = [1,\n\t2]\n",
        ];
        for source in sources {
            for options in [
                FormatterOptions::default(),
                FormatterOptions {
                    indent_style: IndentStylePref::Spaces,
                    indent_size: 4,
                    ..Default::default()
                },
            ] {
                let once = format_source(source, &options);
                let twice = format_source(&once, &options);
                assert_eq!(once, twice, "pipeline not idempotent for {source:?}");
            }
        }
    }

    #[test]
    fn test_trailing_newline_handling() {
        let options = FormatterOptions::default();
        assert_eq!(
            format_source("var x = 1", &options),
            "var x = 1\n"
        );
        assert_eq!(
            format_source("var x = 1\n\n\n", &options),
            "var x = 1\n"
        );
    }

    #[test]
    fn test_line_ending_conversion() {
        let options = FormatterOptions {
            line_endings: LineEndingStyle::Crlf,
            ..Default::default()
        };
        assert_eq!(
            format_source("var x = 1\nvar y = 2\n", &options),
            "var x = 1\r\nvar y = 2\r\n"
        );

        let back = FormatterOptions {
            line_endings: LineEndingStyle::Lf,
            ..Default::default()
        };
        assert_eq!(
            format_source("var x = 1\r\nvar y = 2\r\n", &back),
            "var x = 1\nvar y = 2\n"
        );
    }

    #[test]
    fn test_untouched_text_round_trips() {
        // a file already in the target style comes back byte-identical
        let source = "extends Node2D\n\nfunc _ready():\n\tposition = Vector2(0, 0)\n";
        let formatted = format_source(source, &FormatterOptions::default());
        assert_eq!(formatted, source);
    }

    #[test]
    fn test_overlong_lines_tracked_not_wrapped() {
        let options = FormatterOptions {
            max_line_length: 10,
            ..Default::default()
        };
        let text = "var a = 1\nvar really_long_name = 12345\n";
        let formatted = format_source(text, &options);
        assert_eq!(formatted, text);
        let overlong = overlong_lines(&formatted, &options);
        assert_eq!(overlong.len(), 1);
        assert_eq!(overlong[0].0, 2);
    }
}
