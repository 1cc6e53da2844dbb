//! The format rules.
//!
//! Each rule is a small object with a stable id, mutating the tree in
//! place. Rules must be idempotent: applying a rule to its own output
//! changes nothing.

use crate::lexer::{IndentRun, IndentStyle, Punct, Token, TokenKind};
use crate::parser::{Child, NodeId, NodeKind, SyntaxTree};

use super::{FormatterOptions, IndentStylePref};

pub trait FormatRule {
    /// Stable machine id of the form `GDF00n`.
    fn id(&self) -> &'static str;
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn enabled_by_default(&self) -> bool {
        true
    }
    fn apply(&self, tree: &mut SyntaxTree, options: &FormatterOptions);
}

/// The shipped pipeline, in application order.
pub fn default_rules() -> Vec<Box<dyn FormatRule>> {
    vec![
        Box::new(IndentationRule),
        Box::new(BlankLinesRule),
        Box::new(SpacingRule),
        Box::new(TrailingWhitespaceRule),
    ]
}

/// GDF001: rewrite every indentation run into the configured style without
/// changing its depth.
pub struct IndentationRule;

impl FormatRule for IndentationRule {
    fn id(&self) -> &'static str {
        "GDF001"
    }

    fn name(&self) -> &'static str {
        "indentation"
    }

    fn description(&self) -> &'static str {
        "Convert indentation between tabs and spaces, preserving depth"
    }

    fn apply(&self, tree: &mut SyntaxTree, options: &FormatterOptions) {
        let style = match options.indent_style {
            IndentStylePref::Tabs => IndentStyle::Tabs,
            IndentStylePref::Spaces => IndentStyle::Spaces,
        };
        let width = options.indent_size.max(1);

        tree.for_each_token_mut(|token| {
            if let TokenKind::Indent(run) = &token.kind {
                let pattern = IndentRun::render(run.units, style, width);
                if token.text != pattern {
                    token.text = pattern.clone();
                }
                token.kind = TokenKind::Indent(IndentRun::from_pattern(&pattern, width));
            }
        });
    }
}

/// GDF002: normalize the number of blank lines between class-level
/// functions. Off by default.
pub struct BlankLinesRule;

impl FormatRule for BlankLinesRule {
    fn id(&self) -> &'static str {
        "GDF002"
    }

    fn name(&self) -> &'static str {
        "blank-lines"
    }

    fn description(&self) -> &'static str {
        "Keep a fixed number of blank lines between class-level functions"
    }

    fn enabled_by_default(&self) -> bool {
        false
    }

    fn apply(&self, tree: &mut SyntaxTree, options: &FormatterOptions) {
        let Some(body) = tree.slot_node(tree.root(), crate::parser::Slot::Body) else {
            return;
        };
        let wanted = options.blank_lines_between_functions;

        // find interstitial newline runs that sit before a MethodDecl; one
        // edit per iteration keeps index bookkeeping trivial
        loop {
            let mut edit: Option<(usize, usize, bool)> = None; // (start, count, grow)
            {
                let form = &tree.node(body).form;
                let mut run_start = None;
                let mut run_len = 0usize;
                let mut seen_member = false;
                for (index, child) in form.children.iter().enumerate() {
                    match child {
                        Child::Token(token) if token.kind == TokenKind::Newline => {
                            if run_start.is_none() {
                                run_start = Some(index);
                            }
                            run_len += 1;
                        }
                        Child::Node(node) => {
                            if seen_member
                                && tree.kind(*node) == &NodeKind::MethodDecl
                                && run_len != wanted
                            {
                                // run_len newline tokens = run_len blank
                                // lines between the previous member and this
                                let start = run_start.unwrap_or(index);
                                edit = Some((start, run_len, run_len < wanted));
                                break;
                            }
                            seen_member = true;
                            run_start = None;
                            run_len = 0;
                        }
                        Child::Token(_) => {
                            run_start = None;
                            run_len = 0;
                        }
                    }
                }
            }

            match edit {
                None => return,
                Some((start, count, grow)) => {
                    if grow {
                        tree.insert_token_child(
                            body,
                            start,
                            Token::new(TokenKind::Newline, "\n", 0, 0),
                        );
                    } else {
                        let last = start + count - 1;
                        tree.remove_token_children(body, &[last]);
                    }
                }
            }
        }
    }
}

/// GDF003: spacing around binary operators and after commas. Off by
/// default; keeping it idempotent across nested expression lists costs more
/// than the default pipeline wants to pay.
pub struct SpacingRule;

impl FormatRule for SpacingRule {
    fn id(&self) -> &'static str {
        "GDF003"
    }

    fn name(&self) -> &'static str {
        "spacing"
    }

    fn description(&self) -> &'static str {
        "Insert spaces around operators and after commas"
    }

    fn enabled_by_default(&self) -> bool {
        false
    }

    fn apply(&self, tree: &mut SyntaxTree, options: &FormatterOptions) {
        for id in 0..tree.len() as u32 {
            let node = NodeId(id);
            let kind = tree.kind(node).clone();

            if options.spaces_around_operators {
                if let NodeKind::ExprBinary(_) = kind {
                    if let Some(operator) = tree.node(node).form.slot_index(crate::parser::Slot::Operator)
                    {
                        ensure_space_around(tree, node, operator);
                    }
                }
            }

            if options.space_after_comma
                && matches!(
                    kind,
                    NodeKind::ExprCall
                        | NodeKind::ExprArrayInit
                        | NodeKind::ExprDictInit
                        | NodeKind::ParameterList
                )
            {
                ensure_space_after_commas(tree, node);
            }
        }
    }
}

fn is_space(child: Option<&Child>) -> bool {
    matches!(child, Some(Child::Token(token)) if token.kind == TokenKind::Space)
}

fn space_token() -> Token {
    Token::new(TokenKind::Space, " ", 0, 0)
}

fn ensure_space_around(tree: &mut SyntaxTree, node: NodeId, operator: usize) {
    let after_missing = !is_space(tree.node(node).form.children.get(operator + 1));
    if after_missing {
        tree.insert_token_child(node, operator + 1, space_token());
    }
    let before_missing = operator > 0 && !is_space(tree.node(node).form.children.get(operator - 1));
    if before_missing {
        tree.insert_token_child(node, operator, space_token());
    }
}

fn ensure_space_after_commas(tree: &mut SyntaxTree, node: NodeId) {
    let mut index = 0;
    loop {
        let form = &tree.node(node).form;
        if index >= form.children.len() {
            return;
        }
        let is_comma = matches!(
            form.children.get(index),
            Some(Child::Token(token)) if token.kind == TokenKind::Punct(Punct::Comma)
        );
        if is_comma {
            let next = form.children.get(index + 1);
            let next_is_space = is_space(next);
            let next_is_newline = matches!(
                next,
                Some(Child::Token(token))
                    if matches!(token.kind, TokenKind::Newline | TokenKind::Indent(_))
            );
            if !next_is_space && !next_is_newline && next.is_some() {
                tree.insert_token_child(node, index + 1, space_token());
            }
        }
        index += 1;
    }
}

/// GDF004: drop runs of spaces and tabs that sit directly before a newline
/// or the end of the file. Collection and removal are separate passes so
/// the traversal never mutates what it iterates.
pub struct TrailingWhitespaceRule;

impl FormatRule for TrailingWhitespaceRule {
    fn id(&self) -> &'static str {
        "GDF004"
    }

    fn name(&self) -> &'static str {
        "trailing-whitespace"
    }

    fn description(&self) -> &'static str {
        "Remove whitespace at line ends"
    }

    fn apply(&self, tree: &mut SyntaxTree, options: &FormatterOptions) {
        if !options.remove_trailing_whitespace {
            return;
        }

        // pass 1: token positions in serialized order
        let positions = token_positions(tree);

        // pass 2: mark whitespace runs whose successor is a newline or EOF
        let mut to_remove: Vec<(NodeId, usize)> = vec![];
        let mut run: Vec<(NodeId, usize)> = vec![];
        for (node, index, kind) in &positions {
            match kind {
                TokenKind::Space | TokenKind::Indent(_) => run.push((*node, *index)),
                TokenKind::Newline => {
                    to_remove.append(&mut run);
                }
                _ => run.clear(),
            }
        }
        to_remove.append(&mut run); // trailing run at EOF

        // pass 3: apply, grouped per node, descending indices
        let mut by_node: std::collections::HashMap<NodeId, Vec<usize>> =
            std::collections::HashMap::new();
        for (node, index) in to_remove {
            by_node.entry(node).or_default().push(index);
        }
        for (node, mut indices) in by_node {
            indices.sort_unstable();
            tree.remove_token_children(node, &indices);
        }
    }
}

/// Every token of the tree in serialized (depth-first) order, with its
/// owning node and child index.
fn token_positions(tree: &SyntaxTree) -> Vec<(NodeId, usize, TokenKind)> {
    let mut out = vec![];
    collect_positions(tree, tree.root(), &mut out);
    out
}

fn collect_positions(tree: &SyntaxTree, node: NodeId, out: &mut Vec<(NodeId, usize, TokenKind)>) {
    for (index, child) in tree.node(node).form.children.iter().enumerate() {
        match child {
            Child::Token(token) => out.push((node, index, token.kind.clone())),
            Child::Node(child) => collect_positions(tree, *child, out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatter::FormatterOptions;
    use crate::parser::parse;

    #[test]
    fn test_indentation_rule_converts_tabs_to_spaces() {
        let mut outcome = parse("func f():\n\tif a:\n\t\tpass\n");
        let options = FormatterOptions {
            indent_style: IndentStylePref::Spaces,
            indent_size: 4,
            ..Default::default()
        };
        IndentationRule.apply(&mut outcome.tree, &options);
        assert_eq!(
            outcome.tree.serialize(),
            "func f():\n    if a:\n        pass\n"
        );
    }

    #[test]
    fn test_indentation_rule_preserves_depth_both_ways() {
        let source = "func f():\n    if a:\n        pass\n";
        let mut outcome = parse(source);
        let options = FormatterOptions {
            indent_style: IndentStylePref::Tabs,
            ..Default::default()
        };
        IndentationRule.apply(&mut outcome.tree, &options);
        assert_eq!(outcome.tree.serialize(), "func f():\n\tif a:\n\t\tpass\n");
    }

    #[test]
    fn test_trailing_whitespace_removed() {
        let mut outcome = parse("var x = 1   \nfunc f():\t\n\tpass  \n");
        TrailingWhitespaceRule.apply(&mut outcome.tree, &FormatterOptions::default());
        assert_eq!(
            outcome.tree.serialize(),
            "var x = 1\nfunc f():\n\tpass\n"
        );
    }

    #[test]
    fn test_trailing_whitespace_keeps_blank_line_structure() {
        let mut outcome = parse("var x = 1\n   \nvar y = 2\n");
        TrailingWhitespaceRule.apply(&mut outcome.tree, &FormatterOptions::default());
        assert_eq!(outcome.tree.serialize(), "var x = 1\n\nvar y = 2\n");
    }

    #[test]
    fn test_spacing_rule_is_idempotent() {
        let mut outcome = parse("var x = 1+2*3\n");
        let options = FormatterOptions {
            spaces_around_operators: true,
            ..Default::default()
        };
        SpacingRule.apply(&mut outcome.tree, &options);
        let once = outcome.tree.serialize();
        SpacingRule.apply(&mut outcome.tree, &options);
        assert_eq!(outcome.tree.serialize(), once);
        assert_eq!(once, "var x = 1 + 2 * 3\n");
    }

    #[test]
    fn test_blank_lines_between_functions() {
        let mut outcome = parse("func a():\n\tpass\nfunc b():\n\tpass\n");
        let options = FormatterOptions {
            blank_lines_between_functions: 1,
            ..Default::default()
        };
        BlankLinesRule.apply(&mut outcome.tree, &options);
        assert_eq!(
            outcome.tree.serialize(),
            "func a():\n\tpass\n\nfunc b():\n\tpass\n"
        );
        // idempotent
        BlankLinesRule.apply(&mut outcome.tree, &options);
        assert_eq!(
            outcome.tree.serialize(),
            "func a():\n\tpass\n\nfunc b():\n\tpass\n"
        );
    }
}
