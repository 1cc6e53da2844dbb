//! Indentation consistency checks.
//!
//! The block structure was already decided by the parser; this pass walks
//! the statement lists again and reports where the written indentation
//! disagrees with it. A block's classifier (tabs or spaces) is established
//! by its first non-empty line; every later line of the block is judged
//! against it.

use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::lexer::{IndentRun, IndentStyle, Token, TokenKind};
use crate::parser::{Child, NodeId, NodeKind, Slot, SyntaxTree};

pub fn check_indentation(tree: &SyntaxTree) -> Vec<Diagnostic> {
    let mut diagnostics = vec![];
    if let Some(body) = tree.slot_node(tree.root(), Slot::Body) {
        check_list(tree, body, 0, &mut diagnostics);
    }
    diagnostics
}

fn leading_indent(tree: &SyntaxTree, statement: NodeId) -> Option<(&Token, IndentRun)> {
    match tree.node(statement).form.children.first()? {
        Child::Token(token) => match &token.kind {
            TokenKind::Indent(run) => Some((token, run.clone())),
            _ => None,
        },
        Child::Node(_) => None,
    }
}

fn check_list(tree: &SyntaxTree, list: NodeId, depth: usize, diagnostics: &mut Vec<Diagnostic>) {
    let mut block_style: Option<IndentStyle> = None;

    for statement in tree.child_nodes(list) {
        let indent = leading_indent(tree, statement);

        match &indent {
            None => {
                if depth > 0 {
                    // flattened content of an over-deep nest, or a parser
                    // recovery; only depth 0 legitimately has no indent
                    diagnostics.push(Diagnostic::new(
                        DiagnosticKind::DedentMismatch,
                        format!("expected an indentation of depth {depth}"),
                        tree.start_position(statement),
                        tree.start_position(statement),
                    ));
                }
            }
            Some((token, run)) => {
                let start = (token.line, token.column);
                let end = token.end_position();

                if run.style == IndentStyle::Mixed {
                    diagnostics.push(Diagnostic::new(
                        DiagnosticKind::InconsistentIndentation,
                        "line mixes tabs and spaces in its indentation",
                        start,
                        end,
                    ));
                    // unit count of a mixed run is unreliable, skip the
                    // depth checks for this line
                    descend(tree, statement, depth, diagnostics);
                    continue;
                } else {
                    match block_style {
                        None => block_style = Some(run.style),
                        Some(style) if style != run.style => {
                            diagnostics.push(Diagnostic::new(
                                DiagnosticKind::InconsistentIndentation,
                                format!(
                                    "line is indented with {} but this block uses {}",
                                    style_name(run.style),
                                    style_name(style)
                                ),
                                start,
                                end,
                            ));
                        }
                        Some(_) => {}
                    }
                }

                if run.units > depth {
                    let kind = if run.units - depth > 1 {
                        DiagnosticKind::IndentationJump
                    } else {
                        DiagnosticKind::UnexpectedIndent
                    };
                    diagnostics.push(Diagnostic::new(
                        kind,
                        format!(
                            "line is indented {} levels deep inside a block of depth {depth}",
                            run.units
                        ),
                        start,
                        end,
                    ));
                } else if run.units < depth {
                    diagnostics.push(Diagnostic::new(
                        DiagnosticKind::DedentMismatch,
                        format!(
                            "dedent to depth {} does not match the enclosing block depth {depth}",
                            run.units
                        ),
                        start,
                        end,
                    ));
                }
            }
        }

        descend(tree, statement, depth, diagnostics);
    }
}

fn descend(tree: &SyntaxTree, statement: NodeId, depth: usize, diagnostics: &mut Vec<Diagnostic>) {
    match tree.kind(statement) {
        NodeKind::IfStmt => {
            for branch in tree.child_nodes(statement) {
                check_block_of(tree, branch, depth, diagnostics);
            }
        }
        NodeKind::MethodDecl
        | NodeKind::ForStmt
        | NodeKind::WhileStmt
        | NodeKind::ClassDecl
        | NodeKind::PropertyAccessor(_)
        | NodeKind::IfBranch
        | NodeKind::ElifBranch
        | NodeKind::ElseBranch => check_block_of(tree, statement, depth, diagnostics),
        NodeKind::MatchStmt => {
            if let Some(cases) = tree.slot_node(statement, Slot::Body) {
                if tree.child_nodes(cases).next().is_none() {
                    diagnostics.push(Diagnostic::new(
                        DiagnosticKind::MissingIndentedBlock,
                        "match statement has no cases",
                        tree.start_position(statement),
                        tree.end_position(statement),
                    ));
                }
                check_list(tree, cases, depth + 1, diagnostics);
                for case in tree.child_nodes(cases) {
                    if tree.kind(case) == &NodeKind::MatchCase {
                        check_block_of(tree, case, depth + 1, diagnostics);
                    }
                }
            }
        }
        NodeKind::VariableDecl => {
            // property accessor block; the list recursion also descends
            // into each accessor's own body
            if let Some(body) = tree.slot_node(statement, Slot::Body) {
                check_list(tree, body, depth + 1, diagnostics);
            }
        }
        _ => {}
    }
}

fn check_block_of(
    tree: &SyntaxTree,
    header: NodeId,
    depth: usize,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let Some(body) = tree.slot_node(header, Slot::Body) else {
        return;
    };
    if tree.child_nodes(body).next().is_none() {
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::MissingIndentedBlock,
            "block header has an empty body",
            tree.start_position(header),
            tree.end_position(header),
        ));
        return;
    }
    check_list(tree, body, depth + 1, diagnostics);
}

fn style_name(style: IndentStyle) -> &'static str {
    match style {
        IndentStyle::Tabs => "tabs",
        IndentStyle::Spaces => "spaces",
        IndentStyle::Mixed => "mixed whitespace",
    }
}
