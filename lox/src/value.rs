use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::{INITIALIZER_NAME, THIS_NAME};
use crate::ast::FunctionDecl;
use crate::environment::Environment;
use crate::error::RuntimeError;
use crate::token::{Literal, format_number};

#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    String(String),
    Callable(Callable),
    Instance(Rc<Instance>),
}

impl Value {
    /// `false` and `nil` are falsy, everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Callable(Callable::Class(_)) => "class",
            Value::Callable(_) => "function",
            Value::Instance(_) => "instance",
        }
    }
}

impl From<Literal> for Value {
    fn from(lit: Literal) -> Self {
        match lit {
            Literal::Number(n) => Value::Number(n),
            Literal::String(s) => Value::String(s),
            Literal::Bool(b) => Value::Bool(b),
            Literal::Nil => Value::Nil,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Callable(a), Value::Callable(b)) => a.same(b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::String(s) => write!(f, "{}", s),
            Value::Callable(callable) => write!(f, "{}", callable),
            Value::Instance(instance) => write!(f, "<{} instance>", instance.class.name),
        }
    }
}

/// Everything that can appear in callee position.
#[derive(Debug, Clone)]
pub enum Callable {
    Function(Rc<Function>),
    Lambda(Rc<Lambda>),
    Native(Rc<NativeFunction>),
    Class(Rc<Class>),
}

impl Callable {
    pub fn arity(&self) -> usize {
        match self {
            Callable::Function(f) => f.declaration.params.len(),
            Callable::Lambda(l) => l.declaration.params.len(),
            Callable::Native(n) => n.arity,
            Callable::Class(c) => c.arity(),
        }
    }

    pub fn name(&self) -> String {
        match self {
            Callable::Function(f) => f.declaration.name.lexeme.clone(),
            Callable::Lambda(_) => "lambda".to_string(),
            Callable::Native(n) => n.name.to_string(),
            Callable::Class(c) => c.name.clone(),
        }
    }

    /// Identity comparison: two callables are equal only if they are the
    /// same object.
    fn same(&self, other: &Callable) -> bool {
        match (self, other) {
            (Callable::Function(a), Callable::Function(b)) => Rc::ptr_eq(a, b),
            (Callable::Lambda(a), Callable::Lambda(b)) => Rc::ptr_eq(a, b),
            (Callable::Native(a), Callable::Native(b)) => Rc::ptr_eq(a, b),
            (Callable::Class(a), Callable::Class(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Function(func) => write!(f, "<fn {}>", func.declaration.name.lexeme),
            Callable::Lambda(_) => write!(f, "<lambda>"),
            Callable::Native(native) => write!(f, "<native fn {}>", native.name),
            Callable::Class(class) => write!(f, "<class {}>", class.name),
        }
    }
}

#[derive(Debug)]
pub struct Function {
    pub declaration: Rc<FunctionDecl>,
    pub closure: Rc<RefCell<Environment>>,
    pub is_initializer: bool,
}

impl Function {
    /// A copy of this method whose closure has `this` bound to `instance`.
    pub fn bind(&self, instance: Rc<Instance>) -> Function {
        let mut env = Environment::with_enclosing(Rc::clone(&self.closure));
        env.insert(THIS_NAME, Value::Instance(instance));
        Function {
            declaration: Rc::clone(&self.declaration),
            closure: Rc::new(RefCell::new(env)),
            is_initializer: self.is_initializer,
        }
    }
}

#[derive(Debug)]
pub struct Lambda {
    pub declaration: Rc<FunctionDecl>,
    pub closure: Rc<RefCell<Environment>>,
}

pub type NativeFn = fn(&[Value]) -> Result<Value, RuntimeError>;

pub struct NativeFunction {
    pub name: &'static str,
    pub arity: usize,
    pub func: NativeFn,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

#[derive(Debug)]
pub struct Class {
    pub name: String,
    pub superclass: Option<Rc<Class>>,
    pub methods: HashMap<String, Rc<Function>>,
}

impl Class {
    /// Find a method in this class or its superclass chain
    pub fn find_method(&self, name: &str) -> Option<Rc<Function>> {
        if let Some(method) = self.methods.get(name) {
            return Some(Rc::clone(method));
        }

        self.superclass
            .as_ref()
            .and_then(|superclass| superclass.find_method(name))
    }

    pub fn arity(&self) -> usize {
        self.find_method(INITIALIZER_NAME)
            .map_or(0, |init| init.declaration.params.len())
    }
}

#[derive(Debug)]
pub struct Instance {
    pub class: Rc<Class>,
    pub fields: RefCell<HashMap<String, Value>>,
}

impl Instance {
    pub fn new(class: Rc<Class>) -> Self {
        Self {
            class,
            fields: RefCell::new(HashMap::new()),
        }
    }

    /// Fields shadow methods. Methods come back bound to this instance.
    pub fn get(self: &Rc<Self>, name: &str) -> Result<Value, RuntimeError> {
        if let Some(value) = self.fields.borrow().get(name) {
            return Ok(value.clone());
        }

        match self.class.find_method(name) {
            Some(method) => Ok(Value::Callable(Callable::Function(Rc::new(
                method.bind(Rc::clone(self)),
            )))),
            None => Err(RuntimeError::UndefinedProperty(name.to_string())),
        }
    }

    pub fn set(&self, name: &str, value: Value) {
        self.fields.borrow_mut().insert(name.to_string(), value);
    }
}
