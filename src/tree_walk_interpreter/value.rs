use std::{
    cell::RefCell,
    cmp::Ordering,
    collections::BTreeMap,
    fmt::{Debug, Display},
    rc::Rc,
};

use crate::tokenizer::fmt_float;

use super::{
    callable::Callable, environment::Environment, ExecutionError, ExecutionErrorKind,
};

pub type Array = Rc<RefCell<Vec<Value>>>;
pub type Dict = Rc<RefCell<BTreeMap<Value, Value>>>;

/// A runtime value. Arrays, dicts and functions are shared by reference;
/// everything else is copied on assignment.
#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Array),
    Dict(Dict),
    Function(Rc<Callable>),
}

impl Value {
    pub fn native(
        f: impl Fn(&mut Environment, Vec<Value>) -> Result<Vec<Value>, ExecutionError> + 'static,
    ) -> Self {
        Value::Function(Rc::new(Callable::Native(Box::new(f))))
    }

    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "str",
            Value::Array(_) => "array",
            Value::Dict(_) => "dict",
            Value::Function(_) => "func",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Nil => 0,
            Value::Bool(_) => 1,
            Value::Int(_) => 2,
            Value::Float(_) => 3,
            Value::String(_) => 4,
            Value::Array(_) => 5,
            Value::Dict(_) => 6,
            Value::Function(_) => 7,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Ints widen to floats.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Value::Dict(dict) => Some(dict),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Rc<Callable>> {
        match self {
            Value::Function(function) => Some(function),
            _ => None,
        }
    }

    fn expect_array(&self) -> Result<&Array, ExecutionErrorKind> {
        self.as_array()
            .ok_or_else(|| ExecutionErrorKind::NotIndexable(self.type_name()))
    }

    /// Stores `value` at `index`, padding the array with nils when the
    /// index is past the end.
    pub fn set_index(&self, index: i64, value: Value) -> Result<(), ExecutionErrorKind> {
        let array = self.expect_array()?;
        let mut items = array.borrow_mut();
        let len = items.len();
        let Some(slot) = usize::try_from(index).ok() else {
            return Err(ExecutionErrorKind::IndexOutOfRange(index, len));
        };
        if slot >= len {
            let grown = slot
                .checked_add(1)
                .ok_or(ExecutionErrorKind::IndexOutOfRange(index, len))?;
            items
                .try_reserve(grown - len)
                .map_err(|_| ExecutionErrorKind::IndexOutOfRange(index, len))?;
            items.resize(grown, Value::Nil);
        }
        items[slot] = value;
        Ok(())
    }

    pub fn insert_at(&self, index: i64, value: Value) -> Result<(), ExecutionErrorKind> {
        let array = self.expect_array()?;
        let mut items = array.borrow_mut();
        match usize::try_from(index) {
            Ok(i) if i <= items.len() => {
                items.insert(i, value);
                Ok(())
            }
            _ => Err(ExecutionErrorKind::IndexOutOfRange(index, items.len())),
        }
    }

    pub fn remove_range(&self, index: i64, count: i64) -> Result<(), ExecutionErrorKind> {
        let array = self.expect_array()?;
        let mut items = array.borrow_mut();
        let len = items.len();
        let (Ok(start), Ok(count)) = (usize::try_from(index), usize::try_from(count)) else {
            return Err(ExecutionErrorKind::IndexOutOfRange(index, len));
        };
        match start.checked_add(count) {
            Some(end) if end <= len => {
                items.drain(start..end);
                Ok(())
            }
            _ => Err(ExecutionErrorKind::IndexOutOfRange(index, len)),
        }
    }

    /// Upserts `key`; a nil value erases the entry instead.
    pub fn dict_set(&self, key: Value, value: Value) -> Result<(), ExecutionErrorKind> {
        let dict = self
            .as_dict()
            .ok_or_else(|| ExecutionErrorKind::NotIndexable(self.type_name()))?;
        let mut entries = dict.borrow_mut();
        if value.is_nil() {
            entries.remove(&key);
        } else {
            entries.insert(key, value);
        }
        Ok(())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b).unwrap_or_else(|| a.total_cmp(b)),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Array(a), Value::Array(b)) => Rc::as_ptr(a).cmp(&Rc::as_ptr(b)),
            (Value::Dict(a), Value::Dict(b)) => Rc::as_ptr(a).cmp(&Rc::as_ptr(b)),
            (Value::Function(a), Value::Function(b)) => Rc::as_ptr(a).cmp(&Rc::as_ptr(b)),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{}", fmt_float(*x)),
            Value::String(s) => write!(f, "{s}"),
            Value::Array(array) => write!(f, "array: {:p}", Rc::as_ptr(array)),
            Value::Dict(dict) => write!(f, "dict: {:p}", Rc::as_ptr(dict)),
            Value::Function(function) => write!(f, "function: {:p}", Rc::as_ptr(function)),
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s:?}"),
            _ => write!(f, "{self}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }
}

impl From<BTreeMap<Value, Value>> for Value {
    fn from(entries: BTreeMap<Value, Value>) -> Self {
        Value::Dict(Rc::new(RefCell::new(entries)))
    }
}
