use std::collections::HashMap;

use tracing::{debug, trace};

use crate::ast::{Expr, ExprId, FunctionDecl, Stmt};
use crate::error::{LoxError, StaticError};
use crate::token::Token;
use crate::{INITIALIZER_NAME, THIS_NAME};

/// Maps each variable-referencing expression to the number of scopes to
/// walk up from the current one. No entry means global.
pub type Resolutions = HashMap<ExprId, usize>;

/// Tracks function context for validation (return statements)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
enum FunctionType {
    #[default]
    None,
    Function,
    Method,
    Initializer,
}

/// Tracks class context for validation (`this` usage)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
enum ClassType {
    #[default]
    None,
    Class,
}

#[derive(Default)]
pub struct Resolver {
    /// Stack of scopes. Each scope maps a name to whether it is initialized.
    scopes: Vec<HashMap<String, bool>>,
    resolutions: Resolutions,
    current_function: FunctionType,
    current_class: ClassType,
    loop_depth: usize,
    errors: Vec<LoxError>,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a whole program, collecting every static error.
    pub fn resolve(mut self, statements: &[Stmt]) -> Result<Resolutions, Vec<LoxError>> {
        for stmt in statements {
            self.resolve_stmt(stmt);
        }

        debug!(
            resolved = self.resolutions.len(),
            errors = self.errors.len(),
            "resolved program"
        );

        if self.errors.is_empty() {
            Ok(self.resolutions)
        } else {
            Err(self.errors)
        }
    }

    fn error(&mut self, kind: StaticError, line: usize) {
        self.errors.push(LoxError::Static { kind, line });
    }

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &Token) {
        let Some(scope) = self.scopes.last_mut() else {
            return;
        };
        if scope.contains_key(&name.lexeme) {
            self.error(
                StaticError::DuplicateDeclaration(name.lexeme.clone()),
                name.line,
            );
            return;
        }
        scope.insert(name.lexeme.clone(), false);
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), true);
        }
    }

    fn resolve_local(&mut self, id: ExprId, name: &str) {
        for (index, scope) in self.scopes.iter().enumerate().rev() {
            if scope.contains_key(name) {
                let distance = self.scopes.len() - 1 - index;
                trace!(name, id, distance, "resolved local");
                self.resolutions.insert(id, distance);
                return;
            }
        }
        // Not found: global, looked up by name at runtime
    }

    /// Reading a local inside its own initializer.
    fn check_self_reference(&mut self, name: &Token) {
        if self
            .scopes
            .last()
            .and_then(|scope| scope.get(&name.lexeme))
            .is_some_and(|initialized| !initialized)
        {
            self.error(
                StaticError::SelfReferencingInitializer(name.lexeme.clone()),
                name.line,
            );
        }
    }

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block { statements } => {
                self.begin_scope();
                for s in statements {
                    self.resolve_stmt(s);
                }
                self.end_scope();
            }
            Stmt::Var { name, initializer } => {
                self.declare(name);
                if let Some(init) = initializer {
                    self.resolve_expr(init);
                }
                self.define(name);
            }
            Stmt::Print { expression } => {
                if let Some(expr) = expression {
                    self.resolve_expr(expr);
                }
            }
            Stmt::Expression { expression } => {
                self.resolve_expr(expression);
            }
            Stmt::Function(declaration) => {
                self.declare(&declaration.name);
                self.define(&declaration.name);
                self.resolve_function(declaration, FunctionType::Function);
            }
            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    self.error(StaticError::ReturnOutsideFunction, keyword.line);
                }
                if let Some(v) = value {
                    self.resolve_expr(v);
                }
            }
            Stmt::If {
                condition,
                then_branch,
                elif_branches,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);
                for branch in elif_branches {
                    self.resolve_expr(&branch.condition);
                    self.resolve_stmt(&branch.body);
                }
                if let Some(eb) = else_branch {
                    self.resolve_stmt(eb);
                }
            }
            Stmt::While { condition, body } => {
                self.resolve_expr(condition);
                self.resolve_loop_body(body);
            }
            Stmt::For {
                initializer,
                condition,
                increment,
                body,
            } => {
                self.begin_scope();
                if let Some(init) = initializer {
                    self.resolve_stmt(init);
                }
                if let Some(cond) = condition {
                    self.resolve_expr(cond);
                }
                if let Some(inc) = increment {
                    self.resolve_expr(inc);
                }
                self.resolve_loop_body(body);
                self.end_scope();
            }
            Stmt::Break { keyword } | Stmt::Continue { keyword } => {
                if self.loop_depth == 0 {
                    let word = if matches!(stmt, Stmt::Break { .. }) {
                        "break"
                    } else {
                        "continue"
                    };
                    self.error(StaticError::LoopControlOutsideLoop(word), keyword.line);
                }
            }
            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                self.declare(name);
                self.define(name);

                if let Some(superclass_expr) = superclass {
                    if let Expr::Variable {
                        name: superclass_name,
                        ..
                    } = superclass_expr
                        && superclass_name.lexeme == name.lexeme
                    {
                        self.error(
                            StaticError::ClassInheritsFromItself(name.lexeme.clone()),
                            superclass_name.line,
                        );
                    }
                    self.resolve_expr(superclass_expr);
                }

                let enclosing_class = std::mem::replace(&mut self.current_class, ClassType::Class);

                // Every method closes over a scope holding `this`
                self.begin_scope();
                if let Some(scope) = self.scopes.last_mut() {
                    scope.insert(THIS_NAME.to_string(), true);
                }

                for method in methods {
                    let fn_type = if method.name.lexeme == INITIALIZER_NAME {
                        FunctionType::Initializer
                    } else {
                        FunctionType::Method
                    };
                    self.resolve_function(method, fn_type);
                }

                self.end_scope();
                self.current_class = enclosing_class;
            }
        }
    }

    fn resolve_loop_body(&mut self, body: &Stmt) {
        self.loop_depth += 1;
        self.resolve_stmt(body);
        self.loop_depth -= 1;
    }

    fn resolve_function(&mut self, declaration: &FunctionDecl, fn_type: FunctionType) {
        let enclosing_function = std::mem::replace(&mut self.current_function, fn_type);
        // A loop around the declaration does not make `break` legal inside it
        let enclosing_loop_depth = std::mem::take(&mut self.loop_depth);

        self.begin_scope();
        for param in &declaration.params {
            self.declare(param);
            self.define(param);
        }
        for stmt in &declaration.body {
            self.resolve_stmt(stmt);
        }
        self.end_scope();

        self.loop_depth = enclosing_loop_depth;
        self.current_function = enclosing_function;
    }

    fn resolve_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Variable { id, name } => {
                self.check_self_reference(name);
                self.resolve_local(*id, &name.lexeme);
            }
            Expr::Assign { id, name, value } => {
                self.resolve_expr(value);
                self.resolve_local(*id, &name.lexeme);
            }
            Expr::Update { id, name, .. } => {
                self.check_self_reference(name);
                self.resolve_local(*id, &name.lexeme);
            }
            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }
            Expr::Unary { right, .. } => {
                self.resolve_expr(right);
            }
            Expr::Grouping { expression } => {
                self.resolve_expr(expression);
            }
            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);
                for arg in arguments {
                    self.resolve_expr(arg);
                }
            }
            Expr::Lambda { declaration } => {
                self.resolve_function(declaration, FunctionType::Function);
            }
            Expr::Literal { .. } => {}
            Expr::Get { object, .. } => {
                self.resolve_expr(object);
            }
            Expr::Set { object, value, .. } => {
                self.resolve_expr(value);
                self.resolve_expr(object);
            }
            Expr::This { id, keyword } => {
                if self.current_class == ClassType::None {
                    self.error(StaticError::ThisOutsideClass, keyword.line);
                    return;
                }
                self.resolve_local(*id, THIS_NAME);
            }
        }
    }
}

/// Resolve `program`, reporting whether it is free of static errors. Each
/// error is logged; callers that need them use [`Resolver::resolve`].
pub fn resolve(program: &[Stmt]) -> (Resolutions, bool) {
    match Resolver::new().resolve(program) {
        Ok(resolutions) => (resolutions, true),
        Err(errors) => {
            for error in &errors {
                debug!(%error, "static error");
            }
            (Resolutions::new(), false)
        }
    }
}
