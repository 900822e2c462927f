use std::{cell::RefCell, fmt::Debug, rc::Rc};

use crate::ast::{Chunk, Function};

use super::{
    environment::{Environment, CHUNK_ARGS},
    scope::Scope,
    value::Value,
    ExecutionError, Interpreter,
};

/// Signature shared by every builtin.
pub type BuiltinFn = fn(&mut Environment, Vec<Value>) -> Result<Vec<Value>, ExecutionError>;

pub type NativeFn = Box<dyn Fn(&mut Environment, Vec<Value>) -> Result<Vec<Value>, ExecutionError>>;

pub enum Callable {
    /// A `func` together with the frame it was created in.
    Closure {
        decl: Rc<Function>,
        scope: Rc<RefCell<Scope>>,
    },
    /// A compiled source unit. Its arguments are bound to `args`.
    Chunk(Rc<Chunk>),
    Native(NativeFn),
}

impl Debug for Callable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Callable::Closure { decl, scope } => f
                .debug_struct("Closure")
                .field("name", &decl.name)
                .field("params", &decl.params)
                .field("scope", &scope.as_ptr())
                .finish(),
            Callable::Chunk(_) => f.debug_struct("Chunk").finish_non_exhaustive(),
            Callable::Native(_) => f.debug_struct("Native").finish_non_exhaustive(),
        }
    }
}

impl Callable {
    pub fn call(
        &self,
        env: &mut Environment,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, ExecutionError> {
        match self {
            Callable::Closure { decl, scope } => {
                let frame = Scope::boxed(Some(scope.clone()));
                {
                    let mut frame = frame.borrow_mut();
                    let mut args = args.into_iter();
                    for param in &decl.params {
                        frame.declare(param.clone(), args.next().unwrap_or(Value::Nil));
                    }
                }
                Interpreter::new(env, frame).call_body(&decl.body)
            }
            Callable::Chunk(chunk) => {
                let frame = Scope::boxed(None);
                frame
                    .borrow_mut()
                    .declare(CHUNK_ARGS.to_string(), Value::from(args));
                Interpreter::new(env, frame).call_body(&chunk.0)
            }
            Callable::Native(f) => f(env, args),
        }
    }
}
