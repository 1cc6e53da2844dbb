//! The reading stack: node handlers driven by the token stream.
//!
//! Each parse function owns one node kind and behaves as that node's
//! handler: it consumes tokens into the node's form, fills slots, and
//! delegates to child handlers. Every token of the stream lands in exactly
//! one form, in stream order, which keeps the tree lossless by
//! construction. Nothing here ever fails on input; unexpected tokens are
//! preserved in place and reported as diagnostics.

use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::lexer::{Keyword, Punct, Token, TokenKind};

use super::nodes::{AccessorKind, NodeKind};
use super::tree::{FormState, NodeId, Slot, SyntaxTree};

/// Nesting bound for indented blocks; deeper lines are absorbed into the
/// innermost list at the bound and flagged by the indentation validator.
pub const MAX_BLOCK_DEPTH: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LineEnd {
    /// The line is fully consumed.
    Done,
    /// More constructs follow on the same line.
    More,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineStart {
    Eof,
    /// Blank or comment-only line; does not affect block structure.
    Blank,
    Content { units: usize },
}

pub(crate) struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    pub(crate) tree: SyntaxTree,
    pub(crate) diagnostics: Vec<Diagnostic>,
    /// Trivia of blank lines waiting for the list that accepts the next
    /// statement (or the root at end of input).
    pending: Vec<Token>,
    /// While positive, newlines and indentation are interstitial.
    pub(crate) bracket_depth: usize,
    /// Indentation units of the line currently being parsed.
    pub(crate) line_depth: usize,
}

impl Parser {
    pub(crate) fn new(tokens: Vec<Token>, diagnostics: Vec<Diagnostic>) -> Parser {
        Parser {
            tokens,
            pos: 0,
            tree: SyntaxTree::new(),
            diagnostics,
            pending: vec![],
            bracket_depth: 0,
            line_depth: 0,
        }
    }

    pub(crate) fn run(mut self) -> (SyntaxTree, Vec<Diagnostic>) {
        let root = self.tree.alloc(NodeKind::ClassDecl);
        self.tree.set_root(root);
        let body = self.tree.alloc(NodeKind::StatementList);
        self.tree.push_node_slot(root, Slot::Body, body);

        self.parse_statement_list(body, 0);
        self.flush_pending(body);

        // Defensive: anything the list loop did not claim is still preserved.
        while self.pos < self.tokens.len() {
            let token = self.bump_raw();
            self.tree.push_token(body, token);
        }

        self.tree.set_state(root, FormState::Complete);
        (self.tree, self.diagnostics)
    }

    // ---- raw cursor ----------------------------------------------------

    fn peek_token(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    pub(crate) fn peek_kind(&self) -> Option<TokenKind> {
        self.peek_token().map(|t| t.kind.clone())
    }

    pub(crate) fn at_eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn at_line_boundary(&self) -> bool {
        self.pos == 0
            || matches!(
                self.tokens.get(self.pos - 1).map(|t| &t.kind),
                Some(TokenKind::Newline)
            )
    }

    pub(crate) fn bump_raw(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        self.pos += 1;
        token
    }

    pub(crate) fn push_next(&mut self, node: NodeId) -> Token {
        let token = self.bump_raw();
        if let TokenKind::Indent(run) = &token.kind {
            self.line_depth = run.units;
        }
        self.tree.push_token(node, token.clone());
        token
    }

    pub(crate) fn push_next_slot(&mut self, node: NodeId, slot: Slot) -> Token {
        let token = self.bump_raw();
        let index = self.tree.push_token(node, token.clone());
        self.tree.assign_slot(node, slot, index);
        token
    }

    // ---- trivia --------------------------------------------------------

    /// True when the backslash at `index` is a line continuation.
    fn is_continuation(&self, index: usize) -> bool {
        let mut i = index + 1;
        while matches!(self.tokens.get(i).map(|t| &t.kind), Some(TokenKind::Space)) {
            i += 1;
        }
        matches!(
            self.tokens.get(i).map(|t| &t.kind),
            Some(TokenKind::Newline) | None
        )
    }

    /// Consume spaces, comments, continuations and (inside brackets)
    /// newlines into `node`.
    pub(crate) fn eat_trivia(&mut self, node: NodeId) {
        loop {
            let Some(token) = self.peek_token() else {
                return;
            };
            match &token.kind {
                TokenKind::Space | TokenKind::Comment => {
                    self.push_next(node);
                }
                TokenKind::Newline | TokenKind::Indent(_) if self.bracket_depth > 0 => {
                    self.push_next(node);
                }
                TokenKind::Punct(Punct::Backslash) if self.is_continuation(self.pos) => {
                    self.push_next(node);
                    while matches!(self.peek_kind(), Some(TokenKind::Space)) {
                        self.push_next(node);
                    }
                    if matches!(self.peek_kind(), Some(TokenKind::Newline)) {
                        self.push_next(node);
                    }
                    if matches!(self.peek_kind(), Some(TokenKind::Indent(_))) {
                        self.push_next(node);
                    }
                }
                _ => return,
            }
        }
    }

    /// Peek the next token that `eat_trivia` would not consume.
    pub(crate) fn peek_significant(&self) -> Option<&Token> {
        let mut i = self.pos;
        loop {
            let token = self.tokens.get(i)?;
            match &token.kind {
                TokenKind::Space | TokenKind::Comment => i += 1,
                TokenKind::Newline | TokenKind::Indent(_) if self.bracket_depth > 0 => i += 1,
                TokenKind::Punct(Punct::Backslash) if self.is_continuation(i) => {
                    i += 1;
                    while matches!(self.tokens.get(i).map(|t| &t.kind), Some(TokenKind::Space)) {
                        i += 1;
                    }
                    if matches!(self.tokens.get(i).map(|t| &t.kind), Some(TokenKind::Newline)) {
                        i += 1;
                    }
                    if matches!(
                        self.tokens.get(i).map(|t| &t.kind),
                        Some(TokenKind::Indent(_))
                    ) {
                        i += 1;
                    }
                }
                _ => return Some(token),
            }
        }
    }

    pub(crate) fn peek_sig_kind(&self) -> Option<TokenKind> {
        self.peek_significant().map(|t| t.kind.clone())
    }

    /// The significant token after the next one; used for two-token
    /// lookahead decisions.
    pub(crate) fn peek_sig_kind_at(&self, skip: usize) -> Option<TokenKind> {
        let mut remaining = skip;
        let mut i = self.pos;
        loop {
            let token = self.tokens.get(i)?;
            let significant = !matches!(
                token.kind,
                TokenKind::Space | TokenKind::Comment | TokenKind::Newline | TokenKind::Indent(_)
            );
            if significant {
                if remaining == 0 {
                    return Some(token.kind.clone());
                }
                remaining -= 1;
            } else if matches!(token.kind, TokenKind::Newline) && self.bracket_depth == 0 {
                return None;
            }
            i += 1;
        }
    }

    fn flush_pending(&mut self, node: NodeId) {
        for token in std::mem::take(&mut self.pending) {
            self.tree.push_token(node, token);
        }
    }

    // ---- line structure ------------------------------------------------

    fn peek_line(&self) -> LineStart {
        let mut i = self.pos;
        let mut units = 0;
        match self.tokens.get(i) {
            None => return LineStart::Eof,
            Some(token) => {
                if let TokenKind::Indent(run) = &token.kind {
                    units = run.units;
                    i += 1;
                }
            }
        }
        match self.tokens.get(i).map(|t| &t.kind) {
            None | Some(TokenKind::Newline) | Some(TokenKind::Comment) => LineStart::Blank,
            Some(_) => LineStart::Content { units },
        }
    }

    fn buffer_blank_line(&mut self) {
        while let Some(token) = self.peek_token() {
            let is_newline = token.kind == TokenKind::Newline;
            let token = self.bump_raw();
            self.pending.push(token);
            if is_newline {
                return;
            }
        }
    }

    /// The statement-list handler: accepts sibling lines at (or beyond) the
    /// expected depth, buffers blank lines, and completes on a dedent,
    /// re-dispatching to the enclosing handler.
    pub(crate) fn parse_statement_list(&mut self, list: NodeId, depth: usize) {
        self.tree.set_state(list, FormState::Started);
        loop {
            match self.peek_line() {
                LineStart::Eof => break,
                LineStart::Blank => self.buffer_blank_line(),
                LineStart::Content { units } => {
                    if units < depth {
                        break;
                    }
                    self.flush_pending(list);
                    self.parse_line(list, depth);
                }
            }
        }
        self.tree.set_state(list, FormState::Complete);
    }

    fn parse_line(&mut self, list: NodeId, depth: usize) {
        let mut leading = None;
        if matches!(self.peek_kind(), Some(TokenKind::Indent(_))) {
            let token = self.bump_raw();
            if let TokenKind::Indent(run) = &token.kind {
                self.line_depth = run.units;
            }
            leading = Some(token);
        } else {
            self.line_depth = 0;
        }

        loop {
            let end = self.parse_statement(list, depth, leading.take());
            if end == LineEnd::Done || self.at_eof() {
                return;
            }
        }
    }

    // ---- statement dispatch --------------------------------------------

    fn start_statement(
        &mut self,
        list: NodeId,
        kind: NodeKind,
        leading: Option<Token>,
    ) -> NodeId {
        let node = self.tree.alloc(kind);
        if let Some(token) = leading {
            self.tree.push_token(node, token);
        }
        self.tree.push_node(list, node);
        self.tree.set_state(node, FormState::Started);
        node
    }

    fn parse_statement(
        &mut self,
        list: NodeId,
        depth: usize,
        leading: Option<Token>,
    ) -> LineEnd {
        let Some(token) = self.peek_significant() else {
            // Nothing but trivia left on the line.
            let node = self.start_statement(list, NodeKind::PassStmt, leading);
            return self.finish_line(node);
        };

        match token.kind.clone() {
            TokenKind::Keyword(Keyword::Class)
                if matches!(self.peek_sig_kind_at(1), Some(TokenKind::Identifier)) =>
            {
                self.parse_inner_class(list, depth, leading)
            }
            TokenKind::Keyword(Keyword::ClassName) => self.parse_class_name(list, leading),
            TokenKind::Keyword(Keyword::Extends) => self.parse_extends(list, leading),
            TokenKind::Keyword(Keyword::Tool) => {
                let node = self.start_statement(list, NodeKind::ToolAttr, leading);
                self.eat_trivia(node);
                self.push_next_slot(node, Slot::Keyword);
                self.complete(node);
                self.finish_line(node)
            }
            TokenKind::Keyword(Keyword::Signal) => self.parse_signal(list, leading),
            TokenKind::Keyword(Keyword::Enum) => self.parse_enum(list, leading),
            TokenKind::Keyword(Keyword::Var) | TokenKind::Keyword(Keyword::Const) => {
                self.parse_variable(list, depth, leading)
            }
            TokenKind::Keyword(Keyword::Static)
                if matches!(
                    self.peek_sig_kind_at(1),
                    Some(TokenKind::Keyword(Keyword::Var)) | Some(TokenKind::Keyword(Keyword::Const))
                ) =>
            {
                self.parse_variable(list, depth, leading)
            }
            TokenKind::Keyword(Keyword::Static) | TokenKind::Keyword(Keyword::Func) => {
                self.parse_method(list, depth, leading)
            }
            TokenKind::Keyword(Keyword::If) => self.parse_if(list, depth, leading),
            TokenKind::Keyword(Keyword::Elif) | TokenKind::Keyword(Keyword::Else) => {
                self.parse_orphan_branch(list, depth, leading)
            }
            TokenKind::Keyword(Keyword::While) => self.parse_while(list, depth, leading),
            TokenKind::Keyword(Keyword::For) => self.parse_for(list, depth, leading),
            TokenKind::Keyword(Keyword::Match) => self.parse_match(list, depth, leading),
            TokenKind::Keyword(Keyword::Return) => {
                let node = self.start_statement(list, NodeKind::ReturnStmt, leading);
                self.eat_trivia(node);
                self.push_next_slot(node, Slot::Keyword);
                if !self.line_is_over() {
                    if let Some(value) = self.parse_expression() {
                        self.tree.push_node_slot(node, Slot::Value, value);
                    }
                }
                self.complete(node);
                self.finish_line(node)
            }
            TokenKind::Keyword(Keyword::Break) => self.parse_leaf_statement(list, NodeKind::BreakStmt, leading),
            TokenKind::Keyword(Keyword::Continue) => {
                self.parse_leaf_statement(list, NodeKind::ContinueStmt, leading)
            }
            TokenKind::Keyword(Keyword::Pass) => self.parse_leaf_statement(list, NodeKind::PassStmt, leading),
            TokenKind::Punct(Punct::At) => self.parse_annotation(list, leading),
            _ => {
                let node = self.start_statement(list, NodeKind::ExprStmt, leading);
                match self.parse_expression() {
                    Some(value) => {
                        self.tree.push_node_slot(node, Slot::Value, value);
                    }
                    None => self.recover_token(node),
                }
                self.complete(node);
                self.finish_line(node)
            }
        }
    }

    fn parse_leaf_statement(
        &mut self,
        list: NodeId,
        kind: NodeKind,
        leading: Option<Token>,
    ) -> LineEnd {
        let node = self.start_statement(list, kind, leading);
        self.eat_trivia(node);
        self.push_next_slot(node, Slot::Keyword);
        self.complete(node);
        self.finish_line(node)
    }

    fn complete(&mut self, node: NodeId) {
        self.tree.set_state(node, FormState::Complete);
    }

    /// True when only trivia remains before the end of the current line.
    fn line_is_over(&self) -> bool {
        match self.peek_sig_kind() {
            None => true,
            Some(TokenKind::Newline) => true,
            _ => false,
        }
    }

    /// Consume one unexpected significant token into `node` and report it.
    pub(crate) fn recover_token(&mut self, node: NodeId) {
        self.eat_trivia(node);
        if self.at_eof() {
            return;
        }
        let token = self.bump_raw();
        self.diagnostics.push(Diagnostic::new(
            DiagnosticKind::InvalidToken,
            format!("unexpected '{}'", token.text),
            (token.line, token.column),
            token.end_position(),
        ));
        self.tree.push_token(node, token);
        self.tree.set_state(node, FormState::Recovered);
    }

    /// Consume the rest of the current line into `node`.
    fn finish_line(&mut self, node: NodeId) -> LineEnd {
        if self.at_line_boundary() {
            return LineEnd::Done;
        }
        let mut reported = false;
        loop {
            let Some(token) = self.peek_token() else {
                return LineEnd::Done;
            };
            match &token.kind {
                TokenKind::Space | TokenKind::Comment => {
                    self.push_next(node);
                }
                TokenKind::Newline => {
                    self.push_next(node);
                    return LineEnd::Done;
                }
                TokenKind::Punct(Punct::Semicolon) => {
                    self.push_next(node);
                    return LineEnd::More;
                }
                TokenKind::Punct(Punct::Backslash) if self.is_continuation(self.pos) => {
                    self.eat_trivia(node);
                }
                _ => {
                    let unexpected = token.clone();
                    if !reported {
                        reported = true;
                        self.diagnostics.push(Diagnostic::new(
                            DiagnosticKind::InvalidToken,
                            format!("unexpected '{}' after statement", unexpected.text),
                            (unexpected.line, unexpected.column),
                            unexpected.end_position(),
                        ));
                    }
                    self.push_next(node);
                }
            }
        }
    }

    // ---- blocks ---------------------------------------------------------

    /// Parse `":" <inline statements | newline + indented list>` into the
    /// Body slot of `node`. `depth` is the depth of the header line.
    fn parse_block(&mut self, node: NodeId, depth: usize) -> LineEnd {
        self.eat_trivia(node);
        if matches!(self.peek_kind(), Some(TokenKind::Punct(Punct::Colon))) {
            self.push_next(node);
        } else {
            let position = self.tree.end_position(node);
            self.diagnostics.push(Diagnostic::new(
                DiagnosticKind::InvalidToken,
                "expected ':' before a block",
                position,
                position,
            ));
        }
        self.tree.set_state(node, FormState::HeaderDone);

        // trailing comment of the header line stays on the header
        while matches!(
            self.peek_kind(),
            Some(TokenKind::Space) | Some(TokenKind::Comment)
        ) {
            self.push_next(node);
        }

        let list = self.tree.alloc(NodeKind::StatementList);
        match self.peek_kind() {
            None => {
                self.tree.push_node_slot(node, Slot::Body, list);
            }
            Some(TokenKind::Newline) => {
                self.push_next(node);
                self.tree.push_node_slot(node, Slot::Body, list);
                let child_depth = depth + 1;
                if child_depth <= MAX_BLOCK_DEPTH {
                    self.parse_statement_list(list, child_depth);
                }
            }
            Some(_) => {
                // inline body on the header line
                self.tree.push_node_slot(node, Slot::Body, list);
                loop {
                    let end = self.parse_statement(list, depth, None);
                    if end == LineEnd::Done || self.at_eof() {
                        break;
                    }
                }
            }
        }
        self.tree.set_state(node, FormState::BodyDone);
        self.complete(node);
        LineEnd::Done
    }

    // ---- declarations ---------------------------------------------------

    fn parse_inner_class(&mut self, list: NodeId, depth: usize, leading: Option<Token>) -> LineEnd {
        let node = self.start_statement(list, NodeKind::ClassDecl, leading);
        self.eat_trivia(node);
        self.push_next_slot(node, Slot::Keyword);
        self.eat_trivia(node);
        if matches!(self.peek_kind(), Some(TokenKind::Identifier)) {
            self.push_next_slot(node, Slot::Name);
        }
        self.eat_trivia(node);
        if matches!(self.peek_kind(), Some(TokenKind::Keyword(Keyword::Extends))) {
            self.push_next(node);
            if let Some(target) = self.parse_type_node() {
                self.tree.push_node_slot(node, Slot::Target, target);
            }
        }
        self.parse_block(node, depth)
    }

    fn parse_class_name(&mut self, list: NodeId, leading: Option<Token>) -> LineEnd {
        let node = self.start_statement(list, NodeKind::ClassNameAttr, leading);
        self.eat_trivia(node);
        self.push_next_slot(node, Slot::Keyword);
        self.eat_trivia(node);
        if matches!(self.peek_kind(), Some(TokenKind::Identifier)) {
            self.push_next_slot(node, Slot::Name);
        } else {
            self.recover_token(node);
        }
        self.eat_trivia(node);
        if matches!(self.peek_kind(), Some(TokenKind::Punct(Punct::Comma))) {
            // legacy icon path form: class_name Foo, "res://icon.png"
            self.push_next(node);
            if let Some(value) = self.parse_expression() {
                self.tree.push_node_slot(node, Slot::Value, value);
            }
            self.eat_trivia(node);
        }
        if matches!(self.peek_kind(), Some(TokenKind::Keyword(Keyword::Extends))) {
            // single-line form: class_name Foo extends Node
            self.push_next(node);
            if let Some(target) = self.parse_type_node() {
                self.tree.push_node_slot(node, Slot::Target, target);
            }
        }
        self.complete(node);
        self.finish_line(node)
    }

    fn parse_extends(&mut self, list: NodeId, leading: Option<Token>) -> LineEnd {
        let node = self.start_statement(list, NodeKind::ExtendsAttr, leading);
        self.eat_trivia(node);
        self.push_next_slot(node, Slot::Keyword);
        match self.parse_type_node() {
            Some(target) => {
                self.tree.push_node_slot(node, Slot::Target, target);
            }
            None => self.recover_token(node),
        }
        self.complete(node);
        self.finish_line(node)
    }

    fn parse_signal(&mut self, list: NodeId, leading: Option<Token>) -> LineEnd {
        let node = self.start_statement(list, NodeKind::SignalDecl, leading);
        self.eat_trivia(node);
        self.push_next_slot(node, Slot::Keyword);
        self.eat_trivia(node);
        if matches!(self.peek_kind(), Some(TokenKind::Identifier)) {
            self.push_next_slot(node, Slot::Name);
        } else {
            self.recover_token(node);
        }
        if matches!(self.peek_sig_kind(), Some(TokenKind::Punct(Punct::LParen))) {
            let params = self.parse_parameter_list();
            self.tree.push_node_slot(node, Slot::Params, params);
        }
        self.complete(node);
        self.finish_line(node)
    }

    fn parse_enum(&mut self, list: NodeId, leading: Option<Token>) -> LineEnd {
        let node = self.start_statement(list, NodeKind::EnumDecl, leading);
        self.eat_trivia(node);
        self.push_next_slot(node, Slot::Keyword);
        self.eat_trivia(node);
        if matches!(self.peek_kind(), Some(TokenKind::Identifier)) {
            self.push_next_slot(node, Slot::Name);
        }
        self.eat_trivia(node);
        if matches!(self.peek_kind(), Some(TokenKind::Punct(Punct::LBrace))) {
            self.push_next(node);
            self.bracket_depth += 1;
            loop {
                self.eat_trivia(node);
                match self.peek_kind() {
                    None => break,
                    Some(TokenKind::Punct(Punct::RBrace)) => {
                        self.push_next(node);
                        break;
                    }
                    Some(TokenKind::Punct(Punct::Comma)) => {
                        self.push_next(node);
                    }
                    Some(TokenKind::Identifier) => {
                        let variant = self.tree.alloc(NodeKind::EnumVariant);
                        self.push_next_slot(variant, Slot::Name);
                        self.eat_trivia(variant);
                        if matches!(self.peek_kind(), Some(TokenKind::Punct(Punct::Assign))) {
                            self.push_next(variant);
                            if let Some(value) = self.parse_expression() {
                                self.tree.push_node_slot(variant, Slot::Value, value);
                            }
                        }
                        self.tree.push_node(node, variant);
                    }
                    Some(_) => self.recover_token(node),
                }
            }
            self.bracket_depth -= 1;
        } else {
            self.recover_token(node);
        }
        self.complete(node);
        self.finish_line(node)
    }

    fn parse_variable(&mut self, list: NodeId, depth: usize, leading: Option<Token>) -> LineEnd {
        let node = self.start_statement(list, NodeKind::VariableDecl, leading);
        self.eat_trivia(node);
        if matches!(self.peek_kind(), Some(TokenKind::Keyword(Keyword::Static))) {
            self.push_next(node);
            self.eat_trivia(node);
        }
        self.push_next_slot(node, Slot::Keyword);
        self.eat_trivia(node);
        if matches!(self.peek_kind(), Some(TokenKind::Identifier)) {
            self.push_next_slot(node, Slot::Name);
        } else {
            self.recover_token(node);
        }

        self.eat_trivia(node);
        match self.peek_kind() {
            Some(TokenKind::Punct(Punct::Colon)) => {
                // either a typed declaration or a property section directly
                if !matches!(self.peek_sig_kind_at(1), None | Some(TokenKind::Newline)) {
                    self.push_next(node);
                    if let Some(ty) = self.parse_type_node() {
                        self.tree.push_node_slot(node, Slot::Type, ty);
                    }
                    self.eat_trivia(node);
                    if matches!(self.peek_kind(), Some(TokenKind::Punct(Punct::Assign))) {
                        self.push_next(node);
                        match self.parse_expression() {
                            Some(value) => {
                                self.tree.push_node_slot(node, Slot::Value, value);
                            }
                            None => self.recover_token(node),
                        }
                    }
                }
            }
            Some(TokenKind::Punct(Punct::ColonAssign)) | Some(TokenKind::Punct(Punct::Assign)) => {
                self.push_next(node);
                match self.parse_expression() {
                    Some(value) => {
                        self.tree.push_node_slot(node, Slot::Value, value);
                    }
                    None => self.recover_token(node),
                }
            }
            _ => {}
        }

        // optional property section: `: get = _g, set = _s` or an indented
        // accessor block
        self.eat_trivia(node);
        if matches!(self.peek_kind(), Some(TokenKind::Punct(Punct::Colon))) {
            return self.parse_property_section(node, depth);
        }
        self.complete(node);
        self.finish_line(node)
    }

    fn parse_property_section(&mut self, node: NodeId, depth: usize) -> LineEnd {
        self.push_next(node); // the colon
        while matches!(
            self.peek_kind(),
            Some(TokenKind::Space) | Some(TokenKind::Comment)
        ) {
            self.push_next(node);
        }

        match self.peek_kind() {
            Some(TokenKind::Newline) | None => {
                if matches!(self.peek_kind(), Some(TokenKind::Newline)) {
                    self.push_next(node);
                }
                let list = self.tree.alloc(NodeKind::StatementList);
                self.tree.push_node_slot(node, Slot::Body, list);
                self.parse_accessor_block(list, depth + 1);
                self.complete(node);
                LineEnd::Done
            }
            Some(_) => {
                // inline form: get = getter, set = setter
                loop {
                    self.eat_trivia(node);
                    match self.peek_kind() {
                        Some(TokenKind::Identifier) => {
                            let kind = match self.peek_token().map(|t| t.text.as_str()) {
                                Some("set") => AccessorKind::Set,
                                _ => AccessorKind::Get,
                            };
                            let accessor = self.tree.alloc(NodeKind::PropertyAccessor(kind));
                            self.push_next_slot(accessor, Slot::Keyword);
                            self.eat_trivia(accessor);
                            if matches!(self.peek_kind(), Some(TokenKind::Punct(Punct::Assign))) {
                                self.push_next(accessor);
                                match self.parse_expression() {
                                    Some(target) => {
                                        self.tree.push_node_slot(accessor, Slot::Target, target);
                                    }
                                    None => self.recover_token(accessor),
                                }
                            }
                            self.tree.push_node(node, accessor);
                        }
                        Some(TokenKind::Punct(Punct::Comma)) => {
                            self.push_next(node);
                        }
                        _ => break,
                    }
                }
                self.complete(node);
                self.finish_line(node)
            }
        }
    }

    fn parse_accessor_block(&mut self, list: NodeId, depth: usize) {
        self.tree.set_state(list, FormState::Started);
        loop {
            match self.peek_line() {
                LineStart::Eof => break,
                LineStart::Blank => self.buffer_blank_line(),
                LineStart::Content { units } => {
                    if units < depth {
                        break;
                    }
                    self.flush_pending(list);
                    let mut leading = None;
                    if matches!(self.peek_kind(), Some(TokenKind::Indent(_))) {
                        leading = Some(self.bump_raw());
                        if let Some(TokenKind::Indent(run)) = leading.as_ref().map(|t| t.kind.clone())
                        {
                            self.line_depth = run.units;
                        }
                    }
                    let is_accessor = matches!(
                        self.peek_significant().map(|t| t.text.as_str()),
                        Some("get") | Some("set")
                    );
                    if is_accessor {
                        self.parse_accessor(list, depth, leading);
                    } else {
                        loop {
                            let end = self.parse_statement(list, depth, leading.take());
                            if end == LineEnd::Done || self.at_eof() {
                                break;
                            }
                        }
                    }
                }
            }
        }
        self.tree.set_state(list, FormState::Complete);
    }

    fn parse_accessor(&mut self, list: NodeId, depth: usize, leading: Option<Token>) {
        let kind = match self.peek_significant().map(|t| t.text.as_str()) {
            Some("set") => AccessorKind::Set,
            _ => AccessorKind::Get,
        };
        let node = self.start_statement(list, NodeKind::PropertyAccessor(kind), leading);
        self.eat_trivia(node);
        self.push_next_slot(node, Slot::Keyword);
        if matches!(self.peek_sig_kind(), Some(TokenKind::Punct(Punct::LParen))) {
            let params = self.parse_parameter_list();
            self.tree.push_node_slot(node, Slot::Params, params);
        }
        self.parse_block(node, depth);
    }

    fn parse_method(&mut self, list: NodeId, depth: usize, leading: Option<Token>) -> LineEnd {
        let node = self.start_statement(list, NodeKind::MethodDecl, leading);
        self.eat_trivia(node);
        if matches!(self.peek_kind(), Some(TokenKind::Keyword(Keyword::Static))) {
            self.push_next(node);
            self.eat_trivia(node);
        }
        if matches!(self.peek_kind(), Some(TokenKind::Keyword(Keyword::Func))) {
            self.push_next_slot(node, Slot::Keyword);
        } else {
            self.recover_token(node);
        }
        self.eat_trivia(node);
        if matches!(self.peek_kind(), Some(TokenKind::Identifier)) {
            self.push_next_slot(node, Slot::Name);
        }
        if matches!(self.peek_sig_kind(), Some(TokenKind::Punct(Punct::LParen))) {
            let params = self.parse_parameter_list();
            self.tree.push_node_slot(node, Slot::Params, params);
        }
        self.eat_trivia(node);
        if matches!(self.peek_kind(), Some(TokenKind::Punct(Punct::Arrow))) {
            self.push_next(node);
            if let Some(ty) = self.parse_type_node() {
                self.tree.push_node_slot(node, Slot::ReturnType, ty);
            }
        }
        self.parse_block(node, depth)
    }

    pub(crate) fn parse_parameter_list(&mut self) -> NodeId {
        let list = self.tree.alloc(NodeKind::ParameterList);
        self.eat_trivia(list);
        if matches!(self.peek_kind(), Some(TokenKind::Punct(Punct::LParen))) {
            self.push_next(list);
        }
        self.bracket_depth += 1;
        loop {
            self.eat_trivia(list);
            match self.peek_kind() {
                None => break,
                Some(TokenKind::Punct(Punct::RParen)) => {
                    self.push_next(list);
                    break;
                }
                Some(TokenKind::Punct(Punct::Comma)) => {
                    self.push_next(list);
                }
                Some(TokenKind::Identifier) => {
                    let param = self.tree.alloc(NodeKind::Parameter);
                    self.push_next_slot(param, Slot::Name);
                    self.eat_trivia(param);
                    if matches!(self.peek_kind(), Some(TokenKind::Punct(Punct::Colon))) {
                        self.push_next(param);
                        if let Some(ty) = self.parse_type_node() {
                            self.tree.push_node_slot(param, Slot::Type, ty);
                        }
                        self.eat_trivia(param);
                    }
                    if matches!(
                        self.peek_kind(),
                        Some(TokenKind::Punct(Punct::Assign))
                            | Some(TokenKind::Punct(Punct::ColonAssign))
                    ) {
                        self.push_next(param);
                        if let Some(value) = self.parse_expression() {
                            self.tree.push_node_slot(param, Slot::Value, value);
                        }
                    }
                    self.tree.push_node(list, param);
                }
                Some(_) => self.recover_token(list),
            }
        }
        self.bracket_depth -= 1;
        list
    }

    // ---- flow statements -------------------------------------------------

    fn parse_if(&mut self, list: NodeId, depth: usize, leading: Option<Token>) -> LineEnd {
        let node = self.start_statement(list, NodeKind::IfStmt, leading);

        let branch = self.tree.alloc(NodeKind::IfBranch);
        self.tree.push_node(node, branch);
        self.eat_trivia(branch);
        self.push_next_slot(branch, Slot::Keyword);
        match self.parse_expression() {
            Some(cond) => {
                self.tree.push_node_slot(branch, Slot::Condition, cond);
            }
            None => self.recover_token(branch),
        }
        self.parse_block(branch, depth);

        // elif / else continuations at the same depth belong to this if
        loop {
            match self.peek_line() {
                LineStart::Blank => self.buffer_blank_line(),
                LineStart::Content { units } if units == depth => {
                    let continuation = {
                        let mut i = self.pos;
                        if matches!(
                            self.tokens.get(i).map(|t| &t.kind),
                            Some(TokenKind::Indent(_))
                        ) {
                            i += 1;
                        }
                        match self.tokens.get(i).map(|t| &t.kind) {
                            Some(TokenKind::Keyword(Keyword::Elif)) => Some(Keyword::Elif),
                            Some(TokenKind::Keyword(Keyword::Else)) => Some(Keyword::Else),
                            _ => None,
                        }
                    };
                    match continuation {
                        None => break,
                        Some(keyword) => {
                            self.flush_pending(node);
                            let mut leading = None;
                            if matches!(self.peek_kind(), Some(TokenKind::Indent(_))) {
                                leading = Some(self.bump_raw());
                            }
                            let kind = match keyword {
                                Keyword::Elif => NodeKind::ElifBranch,
                                _ => NodeKind::ElseBranch,
                            };
                            let branch = self.tree.alloc(kind);
                            if let Some(token) = leading {
                                self.tree.push_token(branch, token);
                            }
                            self.tree.push_node(node, branch);
                            self.eat_trivia(branch);
                            self.push_next_slot(branch, Slot::Keyword);
                            if keyword == Keyword::Elif {
                                match self.parse_expression() {
                                    Some(cond) => {
                                        self.tree.push_node_slot(branch, Slot::Condition, cond);
                                    }
                                    None => self.recover_token(branch),
                                }
                            }
                            self.parse_block(branch, depth);
                        }
                    }
                }
                _ => break,
            }
        }
        self.complete(node);
        LineEnd::Done
    }

    /// An `elif`/`else` line with no `if` to attach to. Parsed in place so
    /// the text survives, reported as unexpected.
    fn parse_orphan_branch(&mut self, list: NodeId, depth: usize, leading: Option<Token>) -> LineEnd {
        let is_elif = matches!(self.peek_sig_kind(), Some(TokenKind::Keyword(Keyword::Elif)));
        let kind = if is_elif {
            NodeKind::ElifBranch
        } else {
            NodeKind::ElseBranch
        };
        let node = self.start_statement(list, kind, leading);
        self.eat_trivia(node);
        let keyword = self.push_next_slot(node, Slot::Keyword);
        self.diagnostics.push(Diagnostic::new(
            DiagnosticKind::InvalidToken,
            format!("'{}' without a preceding 'if' branch", keyword.text),
            (keyword.line, keyword.column),
            keyword.end_position(),
        ));
        if is_elif {
            match self.parse_expression() {
                Some(cond) => {
                    self.tree.push_node_slot(node, Slot::Condition, cond);
                }
                None => self.recover_token(node),
            }
        }
        self.parse_block(node, depth)
    }

    fn parse_while(&mut self, list: NodeId, depth: usize, leading: Option<Token>) -> LineEnd {
        let node = self.start_statement(list, NodeKind::WhileStmt, leading);
        self.eat_trivia(node);
        self.push_next_slot(node, Slot::Keyword);
        match self.parse_expression() {
            Some(cond) => {
                self.tree.push_node_slot(node, Slot::Condition, cond);
            }
            None => self.recover_token(node),
        }
        self.parse_block(node, depth)
    }

    fn parse_for(&mut self, list: NodeId, depth: usize, leading: Option<Token>) -> LineEnd {
        let node = self.start_statement(list, NodeKind::ForStmt, leading);
        self.eat_trivia(node);
        self.push_next_slot(node, Slot::Keyword);
        self.eat_trivia(node);
        if matches!(self.peek_kind(), Some(TokenKind::Identifier)) {
            self.push_next_slot(node, Slot::Target);
        } else {
            self.recover_token(node);
        }
        self.eat_trivia(node);
        if matches!(self.peek_kind(), Some(TokenKind::Punct(Punct::Colon))) {
            // typed loop variable
            self.push_next(node);
            if let Some(ty) = self.parse_type_node() {
                self.tree.push_node_slot(node, Slot::Type, ty);
            }
            self.eat_trivia(node);
        }
        if matches!(self.peek_kind(), Some(TokenKind::Keyword(Keyword::In))) {
            self.push_next(node);
        }
        match self.parse_expression() {
            Some(collection) => {
                self.tree.push_node_slot(node, Slot::Collection, collection);
            }
            None => self.recover_token(node),
        }
        self.parse_block(node, depth)
    }

    fn parse_match(&mut self, list: NodeId, depth: usize, leading: Option<Token>) -> LineEnd {
        let node = self.start_statement(list, NodeKind::MatchStmt, leading);
        self.eat_trivia(node);
        self.push_next_slot(node, Slot::Keyword);
        match self.parse_expression() {
            Some(value) => {
                self.tree.push_node_slot(node, Slot::Value, value);
            }
            None => self.recover_token(node),
        }

        self.eat_trivia(node);
        if matches!(self.peek_kind(), Some(TokenKind::Punct(Punct::Colon))) {
            self.push_next(node);
        }
        while matches!(
            self.peek_kind(),
            Some(TokenKind::Space) | Some(TokenKind::Comment)
        ) {
            self.push_next(node);
        }
        if matches!(self.peek_kind(), Some(TokenKind::Newline)) {
            self.push_next(node);
        }

        let cases = self.tree.alloc(NodeKind::StatementList);
        self.tree.push_node_slot(node, Slot::Body, cases);
        let case_depth = depth + 1;
        self.tree.set_state(cases, FormState::Started);
        loop {
            match self.peek_line() {
                LineStart::Eof => break,
                LineStart::Blank => self.buffer_blank_line(),
                LineStart::Content { units } => {
                    if units < case_depth {
                        break;
                    }
                    self.flush_pending(cases);
                    self.parse_match_case(cases, case_depth);
                }
            }
        }
        self.tree.set_state(cases, FormState::Complete);
        self.complete(node);
        LineEnd::Done
    }

    fn parse_match_case(&mut self, list: NodeId, depth: usize) {
        let mut leading = None;
        if matches!(self.peek_kind(), Some(TokenKind::Indent(_))) {
            let token = self.bump_raw();
            if let TokenKind::Indent(run) = &token.kind {
                self.line_depth = run.units;
            }
            leading = Some(token);
        }
        let node = self.start_statement(list, NodeKind::MatchCase, leading);

        loop {
            self.eat_trivia(node);
            match self.peek_kind() {
                None
                | Some(TokenKind::Punct(Punct::Colon))
                | Some(TokenKind::Newline) => break,
                Some(TokenKind::Punct(Punct::Comma)) => {
                    self.push_next(node);
                }
                Some(TokenKind::Keyword(Keyword::Var)) => {
                    // binding pattern
                    let binding = self.tree.alloc(NodeKind::VariableDecl);
                    self.push_next_slot(binding, Slot::Keyword);
                    self.eat_trivia(binding);
                    if matches!(self.peek_kind(), Some(TokenKind::Identifier)) {
                        self.push_next_slot(binding, Slot::Name);
                    }
                    self.tree.push_node(node, binding);
                }
                Some(_) => match self.parse_expression() {
                    Some(pattern) => {
                        self.tree.push_node(node, pattern);
                    }
                    None => self.recover_token(node),
                },
            }
        }
        self.parse_block(node, depth);
    }

    // ---- annotations -----------------------------------------------------

    fn parse_annotation(&mut self, list: NodeId, leading: Option<Token>) -> LineEnd {
        let node = self.start_statement(list, NodeKind::Annotation, leading);
        self.eat_trivia(node);
        self.push_next(node); // '@'
        match self.peek_kind() {
            // `@tool` and friends lex as keywords, still annotation names
            Some(TokenKind::Identifier) | Some(TokenKind::Keyword(_)) => {
                self.push_next_slot(node, Slot::Name);
            }
            _ => self.recover_token(node),
        }
        if matches!(self.peek_sig_kind(), Some(TokenKind::Punct(Punct::LParen))) {
            self.eat_trivia(node);
            self.push_next(node);
            self.bracket_depth += 1;
            loop {
                self.eat_trivia(node);
                match self.peek_kind() {
                    None => break,
                    Some(TokenKind::Punct(Punct::RParen)) => {
                        self.push_next(node);
                        break;
                    }
                    Some(TokenKind::Punct(Punct::Comma)) => {
                        self.push_next(node);
                    }
                    Some(_) => match self.parse_expression() {
                        Some(argument) => {
                            self.tree.push_node(node, argument);
                        }
                        None => self.recover_token(node),
                    },
                }
            }
            self.bracket_depth -= 1;
        }
        self.complete(node);

        // an annotation may share its line with the declaration it annotates
        self.eat_trivia(node);
        match self.peek_kind() {
            Some(TokenKind::Newline) | None => self.finish_line(node),
            Some(TokenKind::Punct(Punct::Semicolon)) => self.finish_line(node),
            Some(_) => LineEnd::More,
        }
    }
}
