mod callable;
mod environment;
mod scope;
mod value;

use std::{cell::RefCell, collections::BTreeMap, fmt::Display, rc::Rc};

use crate::ast::{AssignTarget, Block, ElseBranch, Expression, Function, IfStatement, Literal, Statement};

pub use self::{
    callable::{BuiltinFn, Callable, NativeFn},
    environment::{Environment, LoadError, CHUNK_ARGS, LOADED_MODULES},
    scope::Scope,
    value::{Array, Dict, Value},
};

#[derive(Debug)]
pub struct ExecutionError {
    pub kind: ExecutionErrorKind,
    /// Innermost statement that was executing when the error was raised.
    pub statement: Option<String>,
}

impl Display for ExecutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.statement {
            Some(statement) => write!(f, "Error executing statement: {statement} - {}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for ExecutionError {}

impl From<ExecutionErrorKind> for ExecutionError {
    fn from(kind: ExecutionErrorKind) -> Self {
        Self {
            kind,
            statement: None,
        }
    }
}

impl From<std::io::Error> for ExecutionError {
    fn from(err: std::io::Error) -> Self {
        ExecutionErrorKind::Io(err).into()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutionErrorKind {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0} expects {1} arguments, got {2}")]
    InvalidArgumentCount(&'static str, String, usize),
    #[error("Invalid operands for {0}: {1}")]
    InvalidOperands(&'static str, String),
    #[error("{0} cannot be called")]
    NotCallable(&'static str),
    #[error("Array key must be an integer, got {0}")]
    ArrayKeyNotInteger(&'static str),
    #[error("Index {0} out of range for length {1}")]
    IndexOutOfRange(i64, usize),
    #[error("Cannot remove from an empty array")]
    EmptyArray,
    #[error("Cannot index into {0}")]
    NotIndexable(&'static str),
    #[error("Cannot assign into {0}")]
    InvalidAssignTarget(&'static str),
    #[error("Cannot iterate over {0}")]
    NotIterable(&'static str),
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Invalid range: {0}")]
    InvalidRange(&'static str),
    #[error("Unexpected {0} outside of a loop")]
    UnexpectedControlFlow(&'static str),
}

impl ExecutionErrorKind {
    pub fn invalid_operands(name: &'static str, args: &[Value]) -> Self {
        let types = args
            .iter()
            .map(Value::type_name)
            .collect::<Vec<_>>()
            .join(", ");
        ExecutionErrorKind::InvalidOperands(name, types)
    }
}

/// How a statement finished.
#[derive(Debug)]
pub enum Flow {
    Normal,
    Return(Vec<Value>),
    Break,
}

enum Place {
    Variable(String),
    Index { container: Value, key: Value },
}

pub struct Interpreter<'env> {
    env: &'env mut Environment,
    scope: Rc<RefCell<Scope>>,
}

impl<'env> Interpreter<'env> {
    pub fn new(env: &'env mut Environment, scope: Rc<RefCell<Scope>>) -> Self {
        Self { env, scope }
    }

    /// Runs a function or chunk body in the current frame and collects its
    /// return values.
    pub fn call_body(&mut self, body: &Block) -> Result<Vec<Value>, ExecutionError> {
        match self.execute_statements(&body.0)? {
            Flow::Normal => Ok(Vec::new()),
            Flow::Return(values) => Ok(values),
            Flow::Break => Err(ExecutionErrorKind::UnexpectedControlFlow("break").into()),
        }
    }

    fn execute_in_scope<T>(
        &mut self,
        scope: Rc<RefCell<Scope>>,
        f: impl FnOnce(&mut Self) -> T,
    ) -> T {
        let previous = std::mem::replace(&mut self.scope, scope);
        let result = f(self);
        self.scope = previous;
        result
    }

    fn child_scope(&self) -> Rc<RefCell<Scope>> {
        Scope::boxed(Some(self.scope.clone()))
    }

    fn execute_block(&mut self, block: &Block) -> Result<Flow, ExecutionError> {
        let scope = self.child_scope();
        self.execute_in_scope(scope, |this| this.execute_statements(&block.0))
    }

    fn execute_statements(&mut self, statements: &[Statement]) -> Result<Flow, ExecutionError> {
        for statement in statements {
            match self.execute(statement)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn execute(&mut self, statement: &Statement) -> Result<Flow, ExecutionError> {
        #[cfg(feature = "trace")]
        tracing::trace!(%statement, "execute");

        self.execute_statement(statement).map_err(|mut err| {
            if err.statement.is_none() {
                err.statement = Some(statement.to_string());
            }
            err
        })
    }

    fn execute_statement(&mut self, statement: &Statement) -> Result<Flow, ExecutionError> {
        match statement {
            Statement::Expression(expr) => {
                self.evaluate(expr)?;
            }
            Statement::VarDeclaration(names, exprs) => {
                let mut values = self.evaluate_list(exprs)?.into_iter();
                let mut scope = self.scope.borrow_mut();
                for name in names {
                    scope.declare(name.clone(), values.next().unwrap_or(Value::Nil));
                }
            }
            Statement::Assignment(targets, exprs) => {
                let places = targets
                    .iter()
                    .map(|target| self.place(target))
                    .collect::<Result<Vec<_>, _>>()?;
                let mut values = self.evaluate_list(exprs)?.into_iter();
                for place in places {
                    self.store(place, values.next().unwrap_or(Value::Nil))?;
                }
            }
            Statement::Function(decl) => {
                self.define(decl);
            }
            Statement::Return(exprs) => return Ok(Flow::Return(self.evaluate_list(exprs)?)),
            Statement::Block(block) => return self.execute_block(block),
            Statement::If(if_statement) => return self.execute_if(if_statement),
            Statement::While(condition, body) => {
                while self.evaluate_single(condition)?.is_truthy() {
                    match self.execute_block(body)? {
                        Flow::Normal => {}
                        Flow::Break => break,
                        flow => return Ok(flow),
                    }
                }
            }
            Statement::For(names, iterable, body) => return self.execute_for(names, iterable, body),
            Statement::Break => return Ok(Flow::Break),
        }
        Ok(Flow::Normal)
    }

    fn execute_if(&mut self, if_statement: &IfStatement) -> Result<Flow, ExecutionError> {
        if self.evaluate_single(&if_statement.condition)?.is_truthy() {
            return self.execute_block(&if_statement.then_branch);
        }
        match &if_statement.else_branch {
            Some(ElseBranch::If(elif)) => self.execute_if(elif),
            Some(ElseBranch::Else(block)) => self.execute_block(block),
            None => Ok(Flow::Normal),
        }
    }

    fn execute_for(
        &mut self,
        names: &[String],
        iterable: &Expression,
        body: &Block,
    ) -> Result<Flow, ExecutionError> {
        // Iterate over a snapshot so the body may mutate the collection.
        let items = match self.evaluate_single(iterable)? {
            Value::Array(array) => {
                let items = array.borrow();
                items
                    .iter()
                    .map(|item| (item.clone(), None))
                    .collect::<Vec<_>>()
            }
            Value::Dict(dict) => {
                let entries = dict.borrow();
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), Some(value.clone())))
                    .collect()
            }
            other => return Err(ExecutionErrorKind::NotIterable(other.type_name()).into()),
        };

        let vars = self.child_scope();
        self.execute_in_scope(vars.clone(), |this| {
            for (first, second) in items {
                {
                    let mut vars = vars.borrow_mut();
                    let mut bound = std::iter::once(first).chain(second);
                    for name in names {
                        vars.declare(name.clone(), bound.next().unwrap_or(Value::Nil));
                    }
                }
                match this.execute_block(body)? {
                    Flow::Normal => {}
                    Flow::Break => break,
                    flow => return Ok(flow),
                }
            }
            Ok(Flow::Normal)
        })
    }

    fn closure(&self, decl: &Rc<Function>) -> Value {
        Value::Function(Rc::new(Callable::Closure {
            decl: decl.clone(),
            scope: self.scope.clone(),
        }))
    }

    /// A named function is also assigned to its name, whether it appears as
    /// a statement or inside an expression.
    fn define(&mut self, decl: &Rc<Function>) -> Value {
        let closure = self.closure(decl);
        if let Some(name) = &decl.name {
            self.assign(name, closure.clone());
        }
        closure
    }

    fn lookup(&self, name: &str) -> Value {
        let local = self.scope.borrow().get(name);
        local.unwrap_or_else(|| self.env.get_global(name))
    }

    fn assign(&mut self, name: &str, value: Value) {
        let assigned = self.scope.borrow_mut().assign_variable(name, &value);
        if assigned.is_none() {
            self.env.assign_global(name, value);
        }
    }

    fn place(&mut self, target: &AssignTarget) -> Result<Place, ExecutionError> {
        match target {
            AssignTarget::Variable(name) => Ok(Place::Variable(name.clone())),
            AssignTarget::Index { container, key } => Ok(Place::Index {
                container: self.evaluate_single(container)?,
                key: self.evaluate_single(key)?,
            }),
        }
    }

    fn store(&mut self, place: Place, value: Value) -> Result<(), ExecutionError> {
        match place {
            Place::Variable(name) => self.assign(&name, value),
            Place::Index { container, key } => match &container {
                Value::Array(_) => {
                    let index = key
                        .as_int()
                        .ok_or(ExecutionErrorKind::ArrayKeyNotInteger(key.type_name()))?;
                    container.set_index(index, value)?;
                }
                Value::Dict(_) => container.dict_set(key, value)?,
                other => {
                    return Err(ExecutionErrorKind::InvalidAssignTarget(other.type_name()).into())
                }
            },
        }
        Ok(())
    }

    fn call_operator(
        &mut self,
        name: &'static str,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, ExecutionError> {
        let function = self.lookup(name);
        self.env.call(&function, args)
    }

    fn evaluate_single(&mut self, expr: &Expression) -> Result<Value, ExecutionError> {
        Ok(self.evaluate(expr)?.into_iter().next().unwrap_or(Value::Nil))
    }

    /// Every expression contributes its first value; the last one also
    /// contributes the rest of its values.
    fn evaluate_list(&mut self, exprs: &[Expression]) -> Result<Vec<Value>, ExecutionError> {
        let mut values = Vec::with_capacity(exprs.len());
        let mut rest = Vec::new();
        for expr in exprs {
            let mut results = self.evaluate(expr)?.into_iter();
            values.push(results.next().unwrap_or(Value::Nil));
            rest = results.collect();
        }
        values.append(&mut rest);
        Ok(values)
    }

    fn evaluate(&mut self, expr: &Expression) -> Result<Vec<Value>, ExecutionError> {
        let value = match expr {
            Expression::Literal(literal) => match literal {
                Literal::Nil => Value::Nil,
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Int(i) => Value::Int(*i),
                Literal::Float(x) => Value::Float(*x),
                Literal::String(s) => Value::String(s.clone()),
            },
            Expression::Identifier(name) => self.lookup(name),
            Expression::Array(items) => Value::from(self.evaluate_list(items)?),
            Expression::Map(entries) => {
                let mut map = BTreeMap::new();
                for (key, value) in entries {
                    let key = self.evaluate_single(key)?;
                    let value = self.evaluate_single(value)?;
                    if !value.is_nil() {
                        map.insert(key, value);
                    }
                }
                Value::from(map)
            }
            Expression::Function(decl) => self.define(decl),
            Expression::If(if_statement) => {
                return match self.execute_if(if_statement)? {
                    Flow::Normal => Ok(Vec::new()),
                    Flow::Return(values) => Ok(values),
                    Flow::Break => {
                        Err(ExecutionErrorKind::UnexpectedControlFlow("break").into())
                    }
                }
            }
            Expression::Call(callee, args) => {
                let function = self.evaluate_single(callee)?;
                let args = self.evaluate_list(args)?;
                return self.env.call(&function, args);
            }
            Expression::Binary(left, op, right) => {
                let left = self.evaluate_single(left)?;
                let right = self.evaluate_single(right)?;
                return self.call_operator(op.function_name(), vec![left, right]);
            }
            Expression::Unary(op, operand) => {
                let operand = self.evaluate_single(operand)?;
                return self.call_operator(op.function_name(), vec![operand]);
            }
        };
        Ok(vec![value])
    }
}
