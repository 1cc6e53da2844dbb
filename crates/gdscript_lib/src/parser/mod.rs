//! # Parser Module
//!
//! This module builds the lossless concrete syntax tree for GDScript
//! source text.
//!
//! ## Architecture Overview
//!
//! ```text
//! Source Code  →  Token Stream  →  Reading Stack  →  Concrete Syntax Tree
//!    (String)       (lexer)       (node handlers)      (forms + slots)
//! ```
//!
//! Parsing is a pushdown process: the character-stream tokenizer produces
//! the lossless token stream, and a stack of per-node-kind handlers (the
//! functions in `builder.rs` and `expression.rs`) consumes it. Exactly one
//! handler consumes each token and every token lands in exactly one form,
//! in stream order. Indentation drives block structure: when a statement
//! list sees a new line it compares the line's indentation depth against
//! its own. Deeper lines become child blocks of the previous statement,
//! equal lines become siblings, and shallower lines complete the list and
//! re-dispatch to the enclosing handler.
//!
//! ### Key Components
//! - **SyntaxTree / Form / Slot**: the arena CST and per-node child tables
//! - **Parser**: the reading-stack driver
//! - **NodeKind**: the node families, with the operator precedence table
//!
//! ### Error Handling
//! [`parse`] never fails. Content the grammar does not recognize stays in
//! the tree as preserved tokens and is reported through [`Diagnostic`]
//! records; internal invariants are checked with plain `debug_assert!` and
//! cannot be triggered by input.

mod builder;
mod expression;
pub mod nodes;
mod tree;

pub use builder::MAX_BLOCK_DEPTH;
pub use expression::MAX_EXPR_DEPTH;
pub use nodes::{AccessorKind, BinaryOp, NodeKind, UnaryOp};
pub use tree::{Child, Form, FormState, NodeId, Slot, SyntaxNode, SyntaxTree, Tokens};

use crate::diagnostics::Diagnostic;
use crate::lexer::{LexOutput, Lexer};

/// Everything one parse produces: the tree plus the findings collected by
/// the tokenizer and the handlers.
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub tree: SyntaxTree,
    pub diagnostics: Vec<Diagnostic>,
}

/// Parse a whole file. The root node is the file's top-level class.
pub fn parse(source: &str) -> ParseOutcome {
    let LexOutput {
        tokens,
        diagnostics,
    } = Lexer::new(source).lex();
    let (tree, diagnostics) = builder::Parser::new(tokens, diagnostics).run();
    ParseOutcome { tree, diagnostics }
}
