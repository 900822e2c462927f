use std::{cell::RefCell, rc::Rc};

use rustc_hash::FxHashMap;

use super::value::Value;

/// One frame of lexical bindings. Frames chain to their parent; the root
/// of every chain is the environment's globals, which live outside it.
#[derive(Debug, Default)]
pub struct Scope {
    variables: FxHashMap<String, Value>,
    parent: Option<Rc<RefCell<Scope>>>,
}

impl Scope {
    pub fn boxed(parent: Option<Rc<RefCell<Scope>>>) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::new(parent)))
    }

    pub fn new(parent: Option<Rc<RefCell<Scope>>>) -> Self {
        Self {
            variables: FxHashMap::default(),
            parent,
        }
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.variables.get(name) {
            Some(value.clone())
        } else if let Some(parent) = &self.parent {
            parent.borrow().get(name)
        } else {
            None
        }
    }

    /// Binds `name` in this frame, shadowing any outer binding.
    pub fn declare(&mut self, name: String, value: Value) {
        self.variables.insert(name, value);
    }

    /// Rebinds the innermost existing `name`. Returns `None` when no frame
    /// in the chain binds it.
    pub fn assign_variable(&mut self, name: &str, value: &Value) -> Option<Value> {
        if let Some(slot) = self.variables.get_mut(name) {
            *slot = value.clone();
            Some(value.clone())
        } else if let Some(parent) = &self.parent {
            parent.borrow_mut().assign_variable(name, value)
        } else {
            None
        }
    }
}
