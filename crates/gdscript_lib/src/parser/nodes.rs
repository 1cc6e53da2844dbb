//! Node families of the concrete syntax tree and the operator tables.

use serde::{Deserialize, Serialize};

use crate::lexer::{Keyword, Punct};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessorKind {
    Get,
    Set,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Minus,
    Plus,
    BitNot,
    /// Covers both `not` and `!`.
    Not,
    Await,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Power,
    Multiply,
    Divide,
    Modulo,
    Add,
    Subtract,
    ShiftLeft,
    ShiftRight,
    BitAnd,
    BitXor,
    BitOr,
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    In,
    Is,
    As,
    And,
    Or,
    Assign,
    AddAssign,
    SubtractAssign,
    MultiplyAssign,
    DivideAssign,
    ModuloAssign,
    PowerAssign,
    AndAssign,
    OrAssign,
    XorAssign,
    ShiftLeftAssign,
    ShiftRightAssign,
}

/// Precedence rank of the ternary `a if c else b` operator; kept here so the
/// expression parser and the binary table agree.
pub const TERNARY_PRECEDENCE: u8 = 2;

/// Rank at which prefix `not` binds.
pub const NOT_PRECEDENCE: u8 = 5;

/// Rank of the ordinary prefix operators (`-`, `+`, `~`, `!`, `await`).
pub const UNARY_PRECEDENCE: u8 = 14;

impl BinaryOp {
    /// Fixed precedence table, higher binds tighter.
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOp::Assign
            | BinaryOp::AddAssign
            | BinaryOp::SubtractAssign
            | BinaryOp::MultiplyAssign
            | BinaryOp::DivideAssign
            | BinaryOp::ModuloAssign
            | BinaryOp::PowerAssign
            | BinaryOp::AndAssign
            | BinaryOp::OrAssign
            | BinaryOp::XorAssign
            | BinaryOp::ShiftLeftAssign
            | BinaryOp::ShiftRightAssign => 1,
            BinaryOp::Or => 3,
            BinaryOp::And => 4,
            BinaryOp::In | BinaryOp::Is | BinaryOp::As => 6,
            BinaryOp::Equal
            | BinaryOp::NotEqual
            | BinaryOp::Less
            | BinaryOp::LessOrEqual
            | BinaryOp::Greater
            | BinaryOp::GreaterOrEqual => 7,
            BinaryOp::BitOr => 8,
            BinaryOp::BitXor => 9,
            BinaryOp::BitAnd => 10,
            BinaryOp::ShiftLeft | BinaryOp::ShiftRight => 11,
            BinaryOp::Add | BinaryOp::Subtract => 12,
            BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Modulo => 13,
            BinaryOp::Power => 15,
        }
    }

    pub fn is_right_associative(&self) -> bool {
        matches!(self, BinaryOp::Power) || self.is_assignment()
    }

    pub fn is_assignment(&self) -> bool {
        matches!(
            self,
            BinaryOp::Assign
                | BinaryOp::AddAssign
                | BinaryOp::SubtractAssign
                | BinaryOp::MultiplyAssign
                | BinaryOp::DivideAssign
                | BinaryOp::ModuloAssign
                | BinaryOp::PowerAssign
                | BinaryOp::AndAssign
                | BinaryOp::OrAssign
                | BinaryOp::XorAssign
                | BinaryOp::ShiftLeftAssign
                | BinaryOp::ShiftRightAssign
        )
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::Less
                | BinaryOp::LessOrEqual
                | BinaryOp::Greater
                | BinaryOp::GreaterOrEqual
        )
    }

    pub fn from_punct(punct: Punct) -> Option<BinaryOp> {
        Some(match punct {
            Punct::Power => BinaryOp::Power,
            Punct::Times => BinaryOp::Multiply,
            Punct::Divide => BinaryOp::Divide,
            Punct::Mod => BinaryOp::Modulo,
            Punct::Plus => BinaryOp::Add,
            Punct::Minus => BinaryOp::Subtract,
            Punct::ShiftLeft => BinaryOp::ShiftLeft,
            Punct::ShiftRight => BinaryOp::ShiftRight,
            Punct::Ampersand => BinaryOp::BitAnd,
            Punct::Caret => BinaryOp::BitXor,
            Punct::Pipe => BinaryOp::BitOr,
            Punct::Equal => BinaryOp::Equal,
            Punct::NotEqual => BinaryOp::NotEqual,
            Punct::Less => BinaryOp::Less,
            Punct::LessOrEqual => BinaryOp::LessOrEqual,
            Punct::Greater => BinaryOp::Greater,
            Punct::GreaterOrEqual => BinaryOp::GreaterOrEqual,
            Punct::AmpAmp => BinaryOp::And,
            Punct::PipePipe => BinaryOp::Or,
            Punct::Assign => BinaryOp::Assign,
            Punct::PlusAssign => BinaryOp::AddAssign,
            Punct::MinusAssign => BinaryOp::SubtractAssign,
            Punct::TimesAssign => BinaryOp::MultiplyAssign,
            Punct::DivideAssign => BinaryOp::DivideAssign,
            Punct::ModAssign => BinaryOp::ModuloAssign,
            Punct::PowerAssign => BinaryOp::PowerAssign,
            Punct::AndAssign => BinaryOp::AndAssign,
            Punct::OrAssign => BinaryOp::OrAssign,
            Punct::XorAssign => BinaryOp::XorAssign,
            Punct::ShiftLeftAssign => BinaryOp::ShiftLeftAssign,
            Punct::ShiftRightAssign => BinaryOp::ShiftRightAssign,
            _ => return None,
        })
    }

    pub fn from_keyword(keyword: Keyword) -> Option<BinaryOp> {
        Some(match keyword {
            Keyword::And => BinaryOp::And,
            Keyword::Or => BinaryOp::Or,
            Keyword::In => BinaryOp::In,
            Keyword::Is => BinaryOp::Is,
            Keyword::As => BinaryOp::As,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    /// A class declaration; the file root is the top-level class.
    ClassDecl,
    ExtendsAttr,
    ClassNameAttr,
    ToolAttr,
    Annotation,
    SignalDecl,
    EnumDecl,
    EnumVariant,
    VariableDecl,
    PropertyAccessor(AccessorKind),
    MethodDecl,
    ParameterList,
    Parameter,
    StatementList,
    IfStmt,
    IfBranch,
    ElifBranch,
    ElseBranch,
    ForStmt,
    WhileStmt,
    MatchStmt,
    MatchCase,
    ReturnStmt,
    BreakStmt,
    ContinueStmt,
    PassStmt,
    ExprStmt,
    ExprIdentifier,
    ExprNumber,
    ExprString,
    ExprBracketed,
    ExprUnary(UnaryOp),
    ExprBinary(BinaryOp),
    ExprCall,
    ExprIndexer,
    ExprMember,
    ExprTernary,
    ExprLambda,
    ExprArrayInit,
    ExprDictInit,
    DictEntry,
    ExprGetNode,
    ExprUniqueNode,
    ExprNodePath,
    ExprStringName,
    TypeSingle,
    TypeArray,
    TypeDict,
    TypeSub,
    TypeStringPath,
}

impl NodeKind {
    pub fn is_expression(&self) -> bool {
        matches!(
            self,
            NodeKind::ExprIdentifier
                | NodeKind::ExprNumber
                | NodeKind::ExprString
                | NodeKind::ExprBracketed
                | NodeKind::ExprUnary(_)
                | NodeKind::ExprBinary(_)
                | NodeKind::ExprCall
                | NodeKind::ExprIndexer
                | NodeKind::ExprMember
                | NodeKind::ExprTernary
                | NodeKind::ExprLambda
                | NodeKind::ExprArrayInit
                | NodeKind::ExprDictInit
                | NodeKind::ExprGetNode
                | NodeKind::ExprUniqueNode
                | NodeKind::ExprNodePath
                | NodeKind::ExprStringName
        )
    }

    pub fn is_statement(&self) -> bool {
        matches!(
            self,
            NodeKind::IfStmt
                | NodeKind::ForStmt
                | NodeKind::WhileStmt
                | NodeKind::MatchStmt
                | NodeKind::ReturnStmt
                | NodeKind::BreakStmt
                | NodeKind::ContinueStmt
                | NodeKind::PassStmt
                | NodeKind::ExprStmt
                | NodeKind::VariableDecl
        )
    }

    pub fn is_type(&self) -> bool {
        matches!(
            self,
            NodeKind::TypeSingle
                | NodeKind::TypeArray
                | NodeKind::TypeDict
                | NodeKind::TypeSub
                | NodeKind::TypeStringPath
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_ordering() {
        assert!(BinaryOp::Power.precedence() > BinaryOp::Multiply.precedence());
        assert!(BinaryOp::Multiply.precedence() > BinaryOp::Add.precedence());
        assert!(BinaryOp::Add.precedence() > BinaryOp::ShiftLeft.precedence());
        assert!(BinaryOp::ShiftLeft.precedence() > BinaryOp::BitAnd.precedence());
        assert!(BinaryOp::BitAnd.precedence() > BinaryOp::BitXor.precedence());
        assert!(BinaryOp::BitXor.precedence() > BinaryOp::BitOr.precedence());
        assert!(BinaryOp::BitOr.precedence() > BinaryOp::Equal.precedence());
        assert!(BinaryOp::Equal.precedence() > BinaryOp::Is.precedence());
        assert!(BinaryOp::Is.precedence() > BinaryOp::And.precedence());
        assert!(BinaryOp::And.precedence() > BinaryOp::Or.precedence());
        assert!(BinaryOp::Or.precedence() > TERNARY_PRECEDENCE);
        assert!(TERNARY_PRECEDENCE > BinaryOp::Assign.precedence());
    }

    #[test]
    fn test_associativity() {
        assert!(BinaryOp::Power.is_right_associative());
        assert!(BinaryOp::Assign.is_right_associative());
        assert!(!BinaryOp::Add.is_right_associative());
    }
}
