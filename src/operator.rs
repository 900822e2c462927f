use std::fmt::Display;

use crate::tokenizer::TokenType;

/// Binary priorities, tightest first. Prefix operators bind tighter still.
pub const LOWEST_BINARY_PRIORITY: u8 = 3;
pub const HIGHEST_BINARY_PRIORITY: u8 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    BitwiseAnd,
    And,
    BitwiseOr,
    Or,
    Xor,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    NotEqual,
    /// `a[b]` and `a.b`
    Index,
}

impl BinaryOperator {
    pub fn from_token(token_type: &TokenType) -> Option<Self> {
        let op = match token_type {
            TokenType::BitwiseAnd => BinaryOperator::BitwiseAnd,
            TokenType::And => BinaryOperator::And,
            TokenType::BitwiseOr => BinaryOperator::BitwiseOr,
            TokenType::Or => BinaryOperator::Or,
            TokenType::Caret => BinaryOperator::Xor,
            TokenType::Plus => BinaryOperator::Add,
            TokenType::Minus => BinaryOperator::Subtract,
            TokenType::Star => BinaryOperator::Multiply,
            TokenType::Slash => BinaryOperator::Divide,
            TokenType::Percent => BinaryOperator::Modulo,
            TokenType::EqualEqual => BinaryOperator::Equal,
            TokenType::Greater => BinaryOperator::Greater,
            TokenType::GreaterEqual => BinaryOperator::GreaterEqual,
            TokenType::Less => BinaryOperator::Less,
            TokenType::LessEqual => BinaryOperator::LessEqual,
            TokenType::BangEqual => BinaryOperator::NotEqual,
            _ => return None,
        };
        Some(op)
    }

    /// Lower binds tighter. `Index` is a postfix form and has no level.
    pub fn priority(&self) -> u8 {
        match self {
            BinaryOperator::Multiply | BinaryOperator::Divide | BinaryOperator::Modulo => 3,
            BinaryOperator::Add | BinaryOperator::Subtract => 4,
            BinaryOperator::Greater
            | BinaryOperator::GreaterEqual
            | BinaryOperator::Less
            | BinaryOperator::LessEqual => 6,
            BinaryOperator::Equal | BinaryOperator::NotEqual => 7,
            BinaryOperator::BitwiseAnd => 8,
            BinaryOperator::Xor => 9,
            BinaryOperator::BitwiseOr => 10,
            BinaryOperator::And => 11,
            BinaryOperator::Or => 12,
            BinaryOperator::Index => 1,
        }
    }

    /// Name of the global function implementing the operator.
    pub fn function_name(&self) -> &'static str {
        match self {
            BinaryOperator::BitwiseAnd => "__bitwise_and",
            BinaryOperator::And => "__and",
            BinaryOperator::BitwiseOr => "__bitwise_or",
            BinaryOperator::Or => "__or",
            BinaryOperator::Xor => "__xor",
            BinaryOperator::Add => "__add",
            BinaryOperator::Subtract => "__sub",
            BinaryOperator::Multiply => "__mul",
            BinaryOperator::Divide => "__div",
            BinaryOperator::Modulo => "__mod",
            BinaryOperator::Equal => "__equel",
            BinaryOperator::Greater => "__greater",
            BinaryOperator::GreaterEqual => "__greater_equel",
            BinaryOperator::Less => "__less",
            BinaryOperator::LessEqual => "__less_equel",
            BinaryOperator::NotEqual => "__not_equel",
            BinaryOperator::Index => "__get_member",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::BitwiseAnd => "&",
            BinaryOperator::And => "&&",
            BinaryOperator::BitwiseOr => "|",
            BinaryOperator::Or => "||",
            BinaryOperator::Xor => "^",
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::Equal => "==",
            BinaryOperator::Greater => ">",
            BinaryOperator::GreaterEqual => ">=",
            BinaryOperator::Less => "<",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::Index => "[]",
        }
    }
}

impl Display for BinaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    BitwiseNot,
    Not,
    Positive,
    Negative,
}

impl UnaryOperator {
    pub fn from_token(token_type: &TokenType) -> Option<Self> {
        let op = match token_type {
            TokenType::Tilde => UnaryOperator::BitwiseNot,
            TokenType::Bang => UnaryOperator::Not,
            TokenType::Plus => UnaryOperator::Positive,
            TokenType::Minus => UnaryOperator::Negative,
            _ => return None,
        };
        Some(op)
    }

    pub fn function_name(&self) -> &'static str {
        match self {
            UnaryOperator::BitwiseNot => "__bitwise_not",
            UnaryOperator::Not => "__not",
            UnaryOperator::Positive => "__positive",
            UnaryOperator::Negative => "__negative",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOperator::BitwiseNot => "~",
            UnaryOperator::Not => "!",
            UnaryOperator::Positive => "+",
            UnaryOperator::Negative => "-",
        }
    }
}

impl Display for UnaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}
