pub mod ast;
pub mod builtins;
pub mod operator;
pub mod parser;
pub mod source;
pub mod span;
pub mod tokenizer;
pub mod tree_walk_interpreter;

pub use tree_walk_interpreter::{Environment, ExecutionError, LoadError, Value};

/// Anything that can go wrong running a chunk from source.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}
