//! Expression parsing.
//!
//! Precedence climbing over the token stream with the fixed operator table
//! from [`super::nodes`]. Every operand and operator token is appended to
//! the form of the node that owns it, so expression subtrees serialize back
//! to their exact source text. A hard recursion bound keeps pathological
//! nesting from exhausting the stack; past the bound the remainder of the
//! expression is preserved as unexpected tokens.

use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::lexer::{Keyword, Punct, TokenKind};

use super::builder::Parser;
use super::nodes::{BinaryOp, NodeKind, UnaryOp, NOT_PRECEDENCE, TERNARY_PRECEDENCE, UNARY_PRECEDENCE};
use super::tree::{NodeId, Slot};

/// Maximum expression nesting before the parser bails out of a subtree.
pub const MAX_EXPR_DEPTH: u32 = 200;

/// Minimum precedence that excludes assignment; used for list elements
/// where `=` is a separator, never an operator.
const NO_ASSIGN: u8 = 2;

impl Parser {
    pub(crate) fn parse_expression(&mut self) -> Option<NodeId> {
        self.parse_expr_prec(0, 0)
    }

    fn parse_expr_prec(&mut self, min_prec: u8, depth: u32) -> Option<NodeId> {
        if depth > MAX_EXPR_DEPTH {
            let position = self
                .peek_significant()
                .map(|t| (t.line, t.column))
                .unwrap_or((1, 0));
            self.diagnostics.push(Diagnostic::new(
                DiagnosticKind::ExpressionTooDeep,
                "expression nests too deeply",
                position,
                position,
            ));
            return None;
        }

        let mut lhs = self.parse_prefix(depth)?;

        loop {
            let Some(kind) = self.peek_sig_kind() else {
                break;
            };

            // ternary: `value if condition else alternative`
            if kind == TokenKind::Keyword(Keyword::If) {
                if TERNARY_PRECEDENCE < min_prec {
                    break;
                }
                let node = self.tree.alloc(NodeKind::ExprTernary);
                self.tree.push_node_slot(node, Slot::Value, lhs);
                self.eat_trivia(node);
                self.push_next_slot(node, Slot::Keyword);
                match self.parse_expr_prec(TERNARY_PRECEDENCE + 1, depth + 1) {
                    Some(cond) => {
                        self.tree.push_node_slot(node, Slot::Condition, cond);
                    }
                    None => self.recover_token(node),
                }
                self.eat_trivia(node);
                if matches!(self.peek_sig_kind(), Some(TokenKind::Keyword(Keyword::Else))) {
                    self.eat_trivia(node);
                    self.push_next(node);
                    match self.parse_expr_prec(TERNARY_PRECEDENCE, depth + 1) {
                        Some(alt) => {
                            self.tree.push_node_slot(node, Slot::ElseValue, alt);
                        }
                        None => self.recover_token(node),
                    }
                } else {
                    let position = self.tree.end_position(node);
                    self.diagnostics.push(Diagnostic::new(
                        DiagnosticKind::InvalidToken,
                        "ternary expression is missing its 'else' branch",
                        position,
                        position,
                    ));
                }
                lhs = node;
                continue;
            }

            let op = match &kind {
                TokenKind::Punct(punct) => BinaryOp::from_punct(*punct),
                TokenKind::Keyword(keyword) => BinaryOp::from_keyword(*keyword),
                _ => None,
            };
            let Some(op) = op else {
                break;
            };

            let precedence = op.precedence();
            if precedence < min_prec {
                break;
            }

            let node = self.tree.alloc(NodeKind::ExprBinary(op));
            self.tree.push_node_slot(node, Slot::Lhs, lhs);
            self.eat_trivia(node);
            self.push_next_slot(node, Slot::Operator);

            let next_min = if op.is_right_associative() {
                precedence
            } else {
                precedence + 1
            };
            let rhs = if op == BinaryOp::Is || op == BinaryOp::As {
                // the right operand is a type, not a value
                self.parse_type_node()
            } else {
                self.parse_expr_prec(next_min, depth + 1)
            };
            match rhs {
                Some(rhs) => {
                    self.tree.push_node_slot(node, Slot::Rhs, rhs);
                }
                None => {
                    let position = self.tree.end_position(node);
                    self.diagnostics.push(Diagnostic::new(
                        DiagnosticKind::InvalidToken,
                        "expected an expression after the operator",
                        position,
                        position,
                    ));
                }
            }
            lhs = node;
        }

        Some(lhs)
    }

    fn parse_prefix(&mut self, depth: u32) -> Option<NodeId> {
        let token = self.peek_significant()?;

        let unary = match &token.kind {
            TokenKind::Punct(Punct::Minus) => Some((UnaryOp::Minus, UNARY_PRECEDENCE)),
            TokenKind::Punct(Punct::Plus) => Some((UnaryOp::Plus, UNARY_PRECEDENCE)),
            TokenKind::Punct(Punct::Tilde) => Some((UnaryOp::BitNot, UNARY_PRECEDENCE)),
            TokenKind::Punct(Punct::Bang) => Some((UnaryOp::Not, UNARY_PRECEDENCE)),
            TokenKind::Keyword(Keyword::Not) => Some((UnaryOp::Not, NOT_PRECEDENCE)),
            TokenKind::Keyword(Keyword::Await) => Some((UnaryOp::Await, UNARY_PRECEDENCE)),
            _ => None,
        };

        if let Some((op, precedence)) = unary {
            let node = self.tree.alloc(NodeKind::ExprUnary(op));
            self.eat_trivia(node);
            self.push_next_slot(node, Slot::Operator);
            match self.parse_expr_prec(precedence, depth + 1) {
                Some(value) => {
                    self.tree.push_node_slot(node, Slot::Value, value);
                }
                None => {
                    let position = self.tree.end_position(node);
                    self.diagnostics.push(Diagnostic::new(
                        DiagnosticKind::InvalidToken,
                        "expected an operand",
                        position,
                        position,
                    ));
                }
            }
            return Some(node);
        }

        self.parse_postfix(depth)
    }

    fn parse_postfix(&mut self, depth: u32) -> Option<NodeId> {
        let mut node = self.parse_primary(depth)?;

        loop {
            let Some(kind) = self.peek_sig_kind() else {
                break;
            };
            match &kind {
                TokenKind::Punct(Punct::LParen) => {
                    let call = self.tree.alloc(NodeKind::ExprCall);
                    self.tree.push_node_slot(call, Slot::Callee, node);
                    self.eat_trivia(call);
                    self.push_next(call);
                    self.bracket_depth += 1;
                    self.parse_expression_list(call, Punct::RParen, depth);
                    self.bracket_depth -= 1;
                    node = call;
                }
                TokenKind::Punct(Punct::LBracket) => {
                    let indexer = self.tree.alloc(NodeKind::ExprIndexer);
                    self.tree.push_node_slot(indexer, Slot::Target, node);
                    self.eat_trivia(indexer);
                    self.push_next(indexer);
                    self.bracket_depth += 1;
                    match self.parse_expr_prec(0, depth + 1) {
                        Some(index) => {
                            self.tree.push_node_slot(indexer, Slot::Index, index);
                        }
                        None => self.recover_token(indexer),
                    }
                    self.eat_trivia(indexer);
                    if matches!(self.peek_kind(), Some(TokenKind::Punct(Punct::RBracket))) {
                        self.push_next(indexer);
                    }
                    self.bracket_depth -= 1;
                    node = indexer;
                }
                TokenKind::Punct(Punct::Dot) => {
                    let member = self.tree.alloc(NodeKind::ExprMember);
                    self.tree.push_node_slot(member, Slot::Target, node);
                    self.eat_trivia(member);
                    self.push_next(member);
                    self.eat_trivia(member);
                    match self.peek_kind() {
                        Some(TokenKind::Identifier) | Some(TokenKind::Keyword(_)) => {
                            self.push_next_slot(member, Slot::Name);
                        }
                        _ => {
                            let position = self.tree.end_position(member);
                            self.diagnostics.push(Diagnostic::new(
                                DiagnosticKind::InvalidToken,
                                "expected a member name after '.'",
                                position,
                                position,
                            ));
                        }
                    }
                    node = member;
                }
                _ => break,
            }
        }

        Some(node)
    }

    /// Parse comma-separated expressions (plus the closing punctuator) into
    /// `node`'s form. Elements land as plain children.
    fn parse_expression_list(&mut self, node: NodeId, close: Punct, depth: u32) {
        loop {
            self.eat_trivia(node);
            match self.peek_kind() {
                None => return,
                Some(TokenKind::Punct(p)) if p == close => {
                    self.push_next(node);
                    return;
                }
                Some(TokenKind::Punct(Punct::Comma)) => {
                    self.push_next(node);
                }
                Some(_) => match self.parse_expr_prec(NO_ASSIGN, depth + 1) {
                    Some(element) => {
                        self.tree.push_node(node, element);
                    }
                    None => self.recover_token(node),
                },
            }
        }
    }

    fn parse_primary(&mut self, depth: u32) -> Option<NodeId> {
        let token = self.peek_significant()?;

        match token.kind.clone() {
            TokenKind::Number => {
                let node = self.tree.alloc(NodeKind::ExprNumber);
                self.eat_trivia(node);
                self.push_next_slot(node, Slot::Value);
                Some(node)
            }
            TokenKind::Identifier
            | TokenKind::Keyword(Keyword::SelfKw)
            | TokenKind::Keyword(Keyword::Super)
            | TokenKind::Keyword(Keyword::True)
            | TokenKind::Keyword(Keyword::False)
            | TokenKind::Keyword(Keyword::Null) => {
                let node = self.tree.alloc(NodeKind::ExprIdentifier);
                self.eat_trivia(node);
                self.push_next_slot(node, Slot::Name);
                Some(node)
            }
            TokenKind::QuoteOpen(_) => Some(self.parse_string_expr()),
            TokenKind::Keyword(Keyword::Func) => Some(self.parse_lambda(depth)),
            TokenKind::Punct(Punct::LParen) => {
                let node = self.tree.alloc(NodeKind::ExprBracketed);
                self.eat_trivia(node);
                self.push_next(node);
                self.bracket_depth += 1;
                match self.parse_expr_prec(0, depth + 1) {
                    Some(inner) => {
                        self.tree.push_node_slot(node, Slot::Value, inner);
                    }
                    None => self.recover_token(node),
                }
                self.eat_trivia(node);
                if matches!(self.peek_kind(), Some(TokenKind::Punct(Punct::RParen))) {
                    self.push_next(node);
                }
                self.bracket_depth -= 1;
                Some(node)
            }
            TokenKind::Punct(Punct::LBracket) => {
                let node = self.tree.alloc(NodeKind::ExprArrayInit);
                self.eat_trivia(node);
                self.push_next(node);
                self.bracket_depth += 1;
                self.parse_expression_list(node, Punct::RBracket, depth);
                self.bracket_depth -= 1;
                Some(node)
            }
            TokenKind::Punct(Punct::LBrace) => Some(self.parse_dict_init(depth)),
            TokenKind::Punct(Punct::Dollar) => Some(self.parse_get_node(NodeKind::ExprGetNode)),
            TokenKind::Punct(Punct::Mod) => Some(self.parse_get_node(NodeKind::ExprUniqueNode)),
            TokenKind::Punct(Punct::Caret) => Some(self.parse_prefixed_string(NodeKind::ExprNodePath)),
            TokenKind::Punct(Punct::Ampersand) => {
                Some(self.parse_prefixed_string(NodeKind::ExprStringName))
            }
            _ => None,
        }
    }

    fn parse_string_expr(&mut self) -> NodeId {
        let node = self.tree.alloc(NodeKind::ExprString);
        self.eat_trivia(node);
        self.push_next(node); // opening quote
        if matches!(self.peek_kind(), Some(TokenKind::StringPart)) {
            self.push_next_slot(node, Slot::Value);
        }
        if matches!(self.peek_kind(), Some(TokenKind::QuoteClose(_))) {
            self.push_next(node);
        }
        node
    }

    /// `$Path/To/Node`, `$"named path"`, `%UniqueName`, `%"unique name"`.
    fn parse_get_node(&mut self, kind: NodeKind) -> NodeId {
        let node = self.tree.alloc(kind);
        self.eat_trivia(node);
        self.push_next(node); // '$' or '%'
        match self.peek_kind() {
            Some(TokenKind::QuoteOpen(_)) => {
                let path = self.parse_string_expr();
                self.tree.push_node_slot(node, Slot::Value, path);
            }
            Some(TokenKind::Identifier) => {
                self.push_next_slot(node, Slot::Name);
                // deeper path segments
                while matches!(self.peek_kind(), Some(TokenKind::Punct(Punct::Divide)))
                    && matches!(
                        self.peek_sig_kind_at(1),
                        Some(TokenKind::Identifier) | Some(TokenKind::Number)
                    )
                {
                    self.push_next(node);
                    self.push_next(node);
                }
            }
            _ => {
                let position = self.tree.end_position(node);
                self.diagnostics.push(Diagnostic::new(
                    DiagnosticKind::InvalidToken,
                    "expected a node path",
                    position,
                    position,
                ));
            }
        }
        node
    }

    /// `^"node/path"` and `&"string name"`.
    fn parse_prefixed_string(&mut self, kind: NodeKind) -> NodeId {
        let node = self.tree.alloc(kind);
        self.eat_trivia(node);
        self.push_next(node);
        if matches!(self.peek_kind(), Some(TokenKind::QuoteOpen(_))) {
            let inner = self.parse_string_expr();
            self.tree.push_node_slot(node, Slot::Value, inner);
        } else {
            let position = self.tree.end_position(node);
            self.diagnostics.push(Diagnostic::new(
                DiagnosticKind::InvalidToken,
                "expected a string literal",
                position,
                position,
            ));
        }
        node
    }

    fn parse_dict_init(&mut self, depth: u32) -> NodeId {
        let node = self.tree.alloc(NodeKind::ExprDictInit);
        self.eat_trivia(node);
        self.push_next(node); // '{'
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
                Some(_) => {
                    let entry = self.tree.alloc(NodeKind::DictEntry);
                    match self.parse_expr_prec(NO_ASSIGN, depth + 1) {
                        Some(key) => {
                            self.tree.push_node_slot(entry, Slot::Key, key);
                        }
                        None => self.recover_token(entry),
                    }
                    self.eat_trivia(entry);
                    // both `key: value` and Lua-style `key = value`
                    if matches!(
                        self.peek_kind(),
                        Some(TokenKind::Punct(Punct::Colon)) | Some(TokenKind::Punct(Punct::Assign))
                    ) {
                        self.push_next(entry);
                        match self.parse_expr_prec(NO_ASSIGN, depth + 1) {
                            Some(value) => {
                                self.tree.push_node_slot(entry, Slot::Value, value);
                            }
                            None => self.recover_token(entry),
                        }
                    }
                    self.tree.push_node(node, entry);
                }
            }
        }
        self.bracket_depth -= 1;
        node
    }

    fn parse_lambda(&mut self, depth: u32) -> NodeId {
        let node = self.tree.alloc(NodeKind::ExprLambda);
        self.eat_trivia(node);
        self.push_next_slot(node, Slot::Keyword);
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
            self.eat_trivia(node);
        }
        if matches!(self.peek_kind(), Some(TokenKind::Punct(Punct::Colon))) {
            self.push_next(node);
        }

        // body: inline statement on the same line, or an indented block
        while matches!(
            self.peek_kind(),
            Some(TokenKind::Space) | Some(TokenKind::Comment)
        ) {
            self.push_next(node);
        }
        let list = self.tree.alloc(NodeKind::StatementList);
        match self.peek_kind() {
            Some(TokenKind::Newline) => {
                self.push_next(node);
                self.tree.push_node_slot(node, Slot::Body, list);
                let body_depth = self.line_depth + 1;
                let saved = self.bracket_depth;
                self.bracket_depth = 0;
                self.parse_statement_list(list, body_depth);
                self.bracket_depth = saved;
            }
            _ => {
                self.tree.push_node_slot(node, Slot::Body, list);
                self.parse_inline_lambda_statement(list, depth);
            }
        }
        node
    }

    /// A single statement on the lambda's own line, without consuming the
    /// line terminator (the enclosing expression continues after it).
    fn parse_inline_lambda_statement(&mut self, list: NodeId, depth: u32) {
        match self.peek_sig_kind() {
            Some(TokenKind::Keyword(Keyword::Return)) => {
                let stmt = self.tree.alloc(NodeKind::ReturnStmt);
                self.tree.push_node(list, stmt);
                self.eat_trivia(stmt);
                self.push_next_slot(stmt, Slot::Keyword);
                let can_have_value = !matches!(
                    self.peek_sig_kind(),
                    None | Some(TokenKind::Newline)
                        | Some(TokenKind::Punct(Punct::RParen))
                        | Some(TokenKind::Punct(Punct::RBracket))
                        | Some(TokenKind::Punct(Punct::RBrace))
                        | Some(TokenKind::Punct(Punct::Comma))
                );
                if can_have_value {
                    if let Some(value) = self.parse_expr_prec(NO_ASSIGN, depth + 1) {
                        self.tree.push_node_slot(stmt, Slot::Value, value);
                    }
                }
            }
            Some(TokenKind::Keyword(Keyword::Pass)) => {
                let stmt = self.tree.alloc(NodeKind::PassStmt);
                self.tree.push_node(list, stmt);
                self.eat_trivia(stmt);
                self.push_next_slot(stmt, Slot::Keyword);
            }
            _ => {
                let stmt = self.tree.alloc(NodeKind::ExprStmt);
                self.tree.push_node(list, stmt);
                match self.parse_expr_prec(NO_ASSIGN, depth + 1) {
                    Some(value) => {
                        self.tree.push_node_slot(stmt, Slot::Value, value);
                    }
                    None => self.recover_token(stmt),
                }
            }
        }
    }

    // ---- type nodes ------------------------------------------------------

    pub(crate) fn parse_type_node(&mut self) -> Option<NodeId> {
        let token = self.peek_significant()?;
        match token.kind.clone() {
            TokenKind::QuoteOpen(_) => {
                let node = self.tree.alloc(NodeKind::TypeStringPath);
                let inner = self.parse_string_expr();
                self.tree.push_node_slot(node, Slot::Value, inner);
                Some(node)
            }
            TokenKind::Identifier => {
                let name = token.text.clone();
                let node = self.tree.alloc(NodeKind::TypeSingle);
                self.eat_trivia(node);
                self.push_next_slot(node, Slot::Name);

                if name == "Array"
                    && matches!(self.peek_sig_kind(), Some(TokenKind::Punct(Punct::LBracket)))
                {
                    self.tree.node_mut(node).kind = NodeKind::TypeArray;
                    self.eat_trivia(node);
                    self.push_next(node);
                    self.bracket_depth += 1;
                    if let Some(element) = self.parse_type_node() {
                        self.tree.push_node_slot(node, Slot::Value, element);
                    }
                    self.eat_trivia(node);
                    if matches!(self.peek_kind(), Some(TokenKind::Punct(Punct::RBracket))) {
                        self.push_next(node);
                    }
                    self.bracket_depth -= 1;
                    return Some(node);
                }

                if name == "Dictionary"
                    && matches!(self.peek_sig_kind(), Some(TokenKind::Punct(Punct::LBracket)))
                {
                    self.tree.node_mut(node).kind = NodeKind::TypeDict;
                    self.eat_trivia(node);
                    self.push_next(node);
                    self.bracket_depth += 1;
                    if let Some(key) = self.parse_type_node() {
                        self.tree.push_node_slot(node, Slot::Key, key);
                    }
                    self.eat_trivia(node);
                    if matches!(self.peek_kind(), Some(TokenKind::Punct(Punct::Comma))) {
                        self.push_next(node);
                    }
                    if let Some(value) = self.parse_type_node() {
                        self.tree.push_node_slot(node, Slot::Value, value);
                    }
                    self.eat_trivia(node);
                    if matches!(self.peek_kind(), Some(TokenKind::Punct(Punct::RBracket))) {
                        self.push_next(node);
                    }
                    self.bracket_depth -= 1;
                    return Some(node);
                }

                // nested types: Outer.Inner(.Deeper)
                let mut current = node;
                while matches!(self.peek_sig_kind(), Some(TokenKind::Punct(Punct::Dot)))
                    && matches!(self.peek_sig_kind_at(1), Some(TokenKind::Identifier))
                {
                    let sub = self.tree.alloc(NodeKind::TypeSub);
                    self.tree.push_node_slot(sub, Slot::Target, current);
                    self.eat_trivia(sub);
                    self.push_next(sub);
                    self.eat_trivia(sub);
                    self.push_next_slot(sub, Slot::Name);
                    current = sub;
                }
                Some(current)
            }
            _ => None,
        }
    }
}
