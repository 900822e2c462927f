use std::{fmt::Display, rc::Rc};

use crate::{
    operator::{BinaryOperator, UnaryOperator},
    tokenizer::{escape_string, fmt_float},
};

/// A parsed source unit. Calling it runs the top-level block.
#[derive(Debug, Clone)]
pub struct Chunk(pub Block);

#[derive(Debug, Clone, Default)]
pub struct Block(pub Vec<Statement>);

#[derive(Debug, Clone)]
pub enum Statement {
    Expression(Expression),
    VarDeclaration(Vec<String>, Vec<Expression>),
    Assignment(Vec<AssignTarget>, Vec<Expression>),
    Function(Rc<Function>),
    Return(Vec<Expression>),
    Block(Block),
    If(IfStatement),
    While(Expression, Block),
    For(Vec<String>, Expression, Block),
    Break,
}

#[derive(Debug, Clone)]
pub struct IfStatement {
    pub condition: Expression,
    pub then_branch: Block,
    pub else_branch: Option<ElseBranch>,
}

#[derive(Debug, Clone)]
pub enum ElseBranch {
    If(Box<IfStatement>),
    Else(Block),
}

#[derive(Debug)]
pub struct Function {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: Block,
}

#[derive(Debug, Clone)]
pub enum AssignTarget {
    Variable(String),
    Index {
        container: Expression,
        key: Expression,
    },
}

#[derive(Debug, Clone)]
pub enum Expression {
    Literal(Literal),
    Identifier(String),
    Array(Vec<Expression>),
    Map(Vec<(Expression, Expression)>),
    Function(Rc<Function>),
    If(Box<IfStatement>),
    Call(Box<Expression>, Vec<Expression>),
    Binary(Box<Expression>, BinaryOperator, Box<Expression>),
    Unary(UnaryOperator, Box<Expression>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Expression {
    pub fn index(container: Expression, key: Expression) -> Self {
        Expression::Binary(Box::new(container), BinaryOperator::Index, Box::new(key))
    }

    /// Converts an already parsed expression into an assignment target, if
    /// it denotes a place.
    pub fn into_assign_target(self) -> Result<AssignTarget, Expression> {
        match self {
            Expression::Identifier(name) => Ok(AssignTarget::Variable(name)),
            Expression::Binary(container, BinaryOperator::Index, key) => {
                Ok(AssignTarget::Index {
                    container: *container,
                    key: *key,
                })
            }
            other => Err(other),
        }
    }
}

fn write_list<T: Display>(f: &mut std::fmt::Formatter<'_>, items: &[T]) -> std::fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

// Postfix forms only attach to identifiers and parenthesized expressions.
fn write_postfix_base(f: &mut std::fmt::Formatter<'_>, expr: &Expression) -> std::fmt::Result {
    match expr {
        Expression::Identifier(_) | Expression::Call(..) | Expression::Binary(..) => {
            write!(f, "{expr}")
        }
        _ => write!(f, "({expr})"),
    }
}

fn write_operand(f: &mut std::fmt::Formatter<'_>, expr: &Expression) -> std::fmt::Result {
    match expr {
        Expression::Array(_) | Expression::Map(_) | Expression::Function(_) | Expression::If(_) => {
            write!(f, "({expr})")
        }
        _ => write!(f, "{expr}"),
    }
}

impl Display for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for statement in &self.0 .0 {
            writeln!(f, "{statement}")?;
        }
        Ok(())
    }
}

impl Display for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{{")?;
        for statement in &self.0 {
            writeln!(f, "{statement}")?;
        }
        write!(f, "}}")
    }
}

impl Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Statement::Expression(expr) => write!(f, "{expr};"),
            Statement::VarDeclaration(names, exprs) => {
                write!(f, "var ")?;
                write_list(f, names)?;
                if !exprs.is_empty() {
                    write!(f, " = ")?;
                    write_list(f, exprs)?;
                }
                write!(f, ";")
            }
            Statement::Assignment(targets, exprs) => {
                write_list(f, targets)?;
                write!(f, " = ")?;
                write_list(f, exprs)?;
                write!(f, ";")
            }
            Statement::Function(function) => write!(f, "{function}"),
            Statement::Return(exprs) => {
                if exprs.is_empty() {
                    write!(f, "return;")
                } else {
                    write!(f, "return ")?;
                    write_list(f, exprs)?;
                    write!(f, ";")
                }
            }
            Statement::Block(block) => write!(f, "{block}"),
            Statement::If(if_statement) => write!(f, "{if_statement}"),
            Statement::While(condition, body) => write!(f, "while ({condition}) {body}"),
            Statement::For(names, iterable, body) => {
                write!(f, "for (")?;
                write_list(f, names)?;
                write!(f, " in {iterable}) {body}")
            }
            Statement::Break => write!(f, "break;"),
        }
    }
}

impl Display for IfStatement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "if ({}) {}", self.condition, self.then_branch)?;
        match &self.else_branch {
            Some(ElseBranch::If(elif)) => write!(f, " else {elif}"),
            Some(ElseBranch::Else(block)) => write!(f, " else {block}"),
            None => Ok(()),
        }
    }
}

impl Display for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "func")?;
        if let Some(name) = &self.name {
            write!(f, " {name}")?;
        }
        write!(f, "(")?;
        write_list(f, &self.params)?;
        write!(f, ") {}", self.body)
    }
}

impl Display for AssignTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssignTarget::Variable(name) => write!(f, "{name}"),
            AssignTarget::Index { container, key } => {
                write_postfix_base(f, container)?;
                write!(f, "[{key}]")
            }
        }
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expression::Literal(literal) => write!(f, "{literal}"),
            Expression::Identifier(name) => write!(f, "{name}"),
            Expression::Array(items) => {
                write!(f, "[")?;
                write_list(f, items)?;
                write!(f, "]")
            }
            Expression::Map(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "[{key}] = {value}")?;
                }
                write!(f, "}}")
            }
            Expression::Function(function) => write!(f, "{function}"),
            Expression::If(if_statement) => write!(f, "{if_statement}"),
            Expression::Call(callee, args) => {
                write_postfix_base(f, callee)?;
                write!(f, "(")?;
                write_list(f, args)?;
                write!(f, ")")
            }
            Expression::Binary(container, BinaryOperator::Index, key) => {
                write_postfix_base(f, container)?;
                write!(f, "[{key}]")
            }
            Expression::Binary(left, op, right) => {
                write!(f, "(")?;
                write_operand(f, left)?;
                write!(f, " {op} ")?;
                write_operand(f, right)?;
                write!(f, ")")
            }
            Expression::Unary(op, operand) => match operand.as_ref() {
                Expression::Unary(..) | Expression::Literal(_) | Expression::Identifier(_) => {
                    write!(f, "{op}{operand}")
                }
                _ => write!(f, "{op}({operand})"),
            },
        }
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Nil => write!(f, "nil"),
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Int(i) => write!(f, "{i}"),
            Literal::Float(x) => write!(f, "{}", fmt_float(*x)),
            Literal::String(s) => write!(f, "{}", escape_string(s)),
        }
    }
}
