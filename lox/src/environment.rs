use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{InternalError, RuntimeError};
use crate::value::Value;

/// One lexical scope. Frames are shared, never copied: the call stack and
/// any closure created inside a frame hold the same `Rc`.
#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment>>) -> Self {
        Self {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    pub fn define(&mut self, name: &str, value: Value) -> Result<(), RuntimeError> {
        if self.values.contains_key(name) {
            return Err(RuntimeError::DuplicateDefinition(name.to_string()));
        }
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    /// Binds without the duplicate check, for frames the interpreter builds
    /// itself (globals, bound methods).
    pub fn insert(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Looks in this frame only.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.values.get(name).cloned()
    }

    /// Updates the nearest frame that defines `name`.
    pub fn assign(&mut self, name: &str, value: Value) -> Result<(), RuntimeError> {
        if let Some(slot) = self.values.get_mut(name) {
            *slot = value;
            return Ok(());
        }

        match &self.enclosing {
            Some(enclosing) => enclosing.borrow_mut().assign(name, value),
            None => Err(RuntimeError::UndefinedVariable(name.to_string())),
        }
    }

    pub fn ancestor(
        env: &Rc<RefCell<Environment>>,
        distance: usize,
    ) -> Option<Rc<RefCell<Environment>>> {
        let mut current = Rc::clone(env);
        for _ in 0..distance {
            let parent = current.borrow().enclosing.clone()?;
            current = parent;
        }
        Some(current)
    }

    pub fn get_at(
        env: &Rc<RefCell<Environment>>,
        name: &str,
        distance: usize,
    ) -> Result<Value, InternalError> {
        let frame = Self::ancestor(env, distance).ok_or_else(|| {
            InternalError::ScopeChainTooShort {
                name: name.to_string(),
                distance,
            }
        })?;
        let value = frame.borrow().get(name);
        value.ok_or_else(|| InternalError::UnboundAtDistance {
            name: name.to_string(),
            distance,
        })
    }

    pub fn assign_at(
        env: &Rc<RefCell<Environment>>,
        name: &str,
        value: Value,
        distance: usize,
    ) -> Result<(), InternalError> {
        let frame = Self::ancestor(env, distance).ok_or_else(|| {
            InternalError::ScopeChainTooShort {
                name: name.to_string(),
                distance,
            }
        })?;
        let mut frame = frame.borrow_mut();
        match frame.values.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(InternalError::UnboundAtDistance {
                name: name.to_string(),
                distance,
            }),
        }
    }

    /// Names bound in this frame, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.values.keys().cloned().collect();
        names.sort();
        names
    }
}
