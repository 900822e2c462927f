use std::{
    cell::RefCell,
    fmt::Debug,
    io::Write,
    path::{Path, PathBuf},
    rc::Rc,
};

use rustc_hash::FxHashMap;

use crate::{
    builtins,
    parser::{ParseError, Parser},
    source::{self, DecodeError},
    tokenizer::Tokenizer,
    Error,
};

use super::{
    callable::{BuiltinFn, Callable},
    value::Value,
    ExecutionError, ExecutionErrorKind,
};

/// Name a chunk binds its call arguments to.
pub const CHUNK_ARGS: &str = "args";
/// Global dict caching the results of `import`.
pub const LOADED_MODULES: &str = "__loaded";

const STRING_MODULE: &str = "<string>";

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Cannot decode {}: {source}", .path.display())]
    Decode { path: PathBuf, source: DecodeError },
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Host context shared by every chunk: the globals, the output sink and
/// the root that `import` resolves against.
pub struct Environment {
    globals: FxHashMap<String, Value>,
    stdout: Rc<RefCell<dyn Write>>,
    module_root: PathBuf,
}

impl Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names = self.globals.keys().collect::<Vec<_>>();
        names.sort();
        f.debug_struct("Environment")
            .field("globals", &names)
            .field("module_root", &self.module_root)
            .finish()
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new(Rc::new(RefCell::new(std::io::stdout())))
    }
}

impl Environment {
    pub fn new(stdout: Rc<RefCell<dyn Write>>) -> Self {
        let mut env = Self::bare(stdout);
        builtins::register(&mut env);
        env
    }

    /// An environment with no builtins at all, not even the operators.
    pub fn bare(stdout: Rc<RefCell<dyn Write>>) -> Self {
        Self {
            globals: FxHashMap::default(),
            stdout,
            module_root: PathBuf::from("."),
        }
    }

    pub fn with_module_root(mut self, module_root: impl Into<PathBuf>) -> Self {
        self.module_root = module_root.into();
        self
    }

    pub fn module_root(&self) -> &Path {
        &self.module_root
    }

    pub fn stdout(&self) -> Rc<RefCell<dyn Write>> {
        self.stdout.clone()
    }

    pub fn compile(
        &self,
        chars: impl Iterator<Item = char>,
        module: &str,
    ) -> Result<Value, ParseError> {
        let chunk = Parser::new(Tokenizer::new(chars, module)).parse()?;
        tracing::debug!(module, statements = chunk.0 .0.len(), "compiled chunk");
        Ok(Value::Function(Rc::new(Callable::Chunk(Rc::new(chunk)))))
    }

    pub fn try_load_string(&self, text: &str) -> Result<Value, LoadError> {
        Ok(self.compile(text.chars(), STRING_MODULE)?)
    }

    /// Reads and decodes a source file.
    pub fn read_source(path: &Path) -> Result<String, LoadError> {
        let bytes = std::fs::read(path).map_err(|err| LoadError::Io {
            path: path.to_path_buf(),
            source: err,
        })?;
        source::decode(&bytes).map_err(|err| LoadError::Decode {
            path: path.to_path_buf(),
            source: err,
        })
    }

    pub fn try_load_file(&self, path: impl AsRef<Path>) -> Result<Value, LoadError> {
        let path = path.as_ref();
        let text = Self::read_source(path)?;
        Ok(self.compile(text.chars(), &path.display().to_string())?)
    }

    /// Like [`Environment::try_load_string`], but logs the failure and
    /// yields nil.
    pub fn load_string(&self, text: &str) -> Value {
        self.try_load_string(text).unwrap_or_else(|err| {
            tracing::error!("Error in loadstring: {err}");
            Value::Nil
        })
    }

    pub fn load_file(&self, path: impl AsRef<Path>) -> Value {
        let path = path.as_ref();
        self.try_load_file(path).unwrap_or_else(|err| {
            tracing::error!(path = %path.display(), "Error in loadfile: {err}");
            Value::Nil
        })
    }

    pub fn do_string(&mut self, text: &str, args: Vec<Value>) -> Result<Vec<Value>, Error> {
        let chunk = self.try_load_string(text)?;
        Ok(self.call(&chunk, args)?)
    }

    pub fn do_file(&mut self, path: impl AsRef<Path>, args: Vec<Value>) -> Result<Vec<Value>, Error> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "running file");
        let chunk = self.try_load_file(path)?;
        Ok(self.call(&chunk, args)?)
    }

    pub fn register_builtins<'a>(
        &mut self,
        builtins: impl IntoIterator<Item = (&'a str, BuiltinFn)>,
    ) {
        for (name, function) in builtins {
            self.globals.insert(name.to_string(), Value::native(function));
        }
    }

    pub fn get_global(&self, name: &str) -> Value {
        self.globals.get(name).cloned().unwrap_or(Value::Nil)
    }

    /// Binds a global and returns the value. Assigning nil unbinds it.
    pub fn assign_global(&mut self, name: impl Into<String>, value: Value) -> Value {
        let name = name.into();
        if value.is_nil() {
            self.globals.remove(&name);
        } else {
            self.globals.insert(name, value.clone());
        }
        value
    }

    pub fn call(&mut self, function: &Value, args: Vec<Value>) -> Result<Vec<Value>, ExecutionError> {
        match function {
            Value::Function(callable) => callable.call(self, args),
            other => Err(ExecutionErrorKind::NotCallable(other.type_name()).into()),
        }
    }
}
