use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::ast::{Expr, ExprId, FunctionDecl, Stmt};
use crate::environment::Environment;
use crate::error::{InternalError, LoxError, RuntimeError};
use crate::natives;
use crate::resolver::Resolutions;
use crate::stack::ensure_sufficient_stack;
use crate::token::{Token, TokenType};
use crate::value::{Callable, Class, Function, Instance, Lambda, Value};
use crate::{Config, INITIALIZER_NAME, THIS_NAME};

/// How a statement finished. Anything other than `Normal` unwinds to the
/// nearest loop (`Break`, `Continue`) or call (`Return`).
#[derive(Debug, Clone, PartialEq)]
enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

impl Flow {
    fn signal_name(&self) -> &'static str {
        match self {
            Flow::Normal => "normal",
            Flow::Break => "break",
            Flow::Continue => "continue",
            Flow::Return(_) => "return",
        }
    }
}

pub struct Interpreter {
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    resolutions: Resolutions,
    config: Config,
    call_depth: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Interpreter {
    pub fn new(config: Config) -> Self {
        let mut globals = Environment::new();
        for native in natives::all() {
            globals.insert(native.name, Value::Callable(Callable::Native(Rc::new(native))));
        }
        let globals = Rc::new(RefCell::new(globals));

        Self {
            environment: Rc::clone(&globals),
            globals,
            resolutions: HashMap::new(),
            config,
            call_depth: 0,
        }
    }

    /// Names defined in the global environment, sorted.
    pub fn global_names(&self) -> Vec<String> {
        self.globals.borrow().names()
    }

    /// Run a resolved program. Resolutions accumulate across calls so that
    /// closures created by earlier programs keep working.
    ///
    /// In REPL mode a program made of a single expression statement yields
    /// that expression's value.
    pub fn interpret(
        &mut self,
        program: &[Stmt],
        resolutions: Resolutions,
        repl_mode: bool,
        output: &mut dyn Write,
    ) -> Result<Option<Value>, LoxError> {
        debug!(statements = program.len(), repl_mode, "interpreting");
        self.resolutions.extend(resolutions);

        if repl_mode && let [Stmt::Expression { expression }] = program {
            return self.evaluate(expression, output).map(Some);
        }

        for stmt in program {
            match self.execute(stmt, output)? {
                Flow::Normal => {}
                signal => return Err(InternalError::SignalEscaped(signal.signal_name()).into()),
            }
        }
        Ok(None)
    }

    /// Swap in `environment` for the duration of `f`, restoring the previous
    /// one on every exit path.
    fn in_environment<T>(
        &mut self,
        environment: Rc<RefCell<Environment>>,
        f: impl FnOnce(&mut Self) -> T,
    ) -> T {
        let previous = std::mem::replace(&mut self.environment, environment);
        let result = f(self);
        self.environment = previous;
        result
    }

    fn child_environment(&self) -> Rc<RefCell<Environment>> {
        Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(
            &self.environment,
        ))))
    }

    fn execute_statements(
        &mut self,
        statements: &[Stmt],
        output: &mut dyn Write,
    ) -> Result<Flow, LoxError> {
        for stmt in statements {
            match self.execute(stmt, output)? {
                Flow::Normal => {}
                signal => return Ok(signal),
            }
        }
        Ok(Flow::Normal)
    }

    fn define(&mut self, name: &Token, value: Value) -> Result<(), LoxError> {
        self.environment
            .borrow_mut()
            .define(&name.lexeme, value)
            .map_err(|kind| LoxError::runtime(kind, name.line))
    }

    fn execute(&mut self, stmt: &Stmt, output: &mut dyn Write) -> Result<Flow, LoxError> {
        ensure_sufficient_stack(|| self.execute_stmt(stmt, output))
    }

    fn execute_stmt(&mut self, stmt: &Stmt, output: &mut dyn Write) -> Result<Flow, LoxError> {
        match stmt {
            Stmt::Expression { expression } => {
                self.evaluate(expression, output)?;
                Ok(Flow::Normal)
            }
            Stmt::Print { expression } => {
                match expression {
                    Some(expr) => {
                        let value = self.evaluate(expr, output)?;
                        writeln!(output, "{}", value).map_err(LoxError::Output)?;
                    }
                    None => writeln!(output).map_err(LoxError::Output)?,
                }
                Ok(Flow::Normal)
            }
            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr, output)?,
                    None => Value::Nil,
                };
                self.define(name, value)?;
                Ok(Flow::Normal)
            }
            Stmt::Block { statements } => {
                let env = self.child_environment();
                self.in_environment(env, |i| i.execute_statements(statements, output))
            }
            Stmt::If {
                condition,
                then_branch,
                elif_branches,
                else_branch,
            } => {
                if self.evaluate(condition, output)?.is_truthy() {
                    return self.execute(then_branch, output);
                }
                for branch in elif_branches {
                    if self.evaluate(&branch.condition, output)?.is_truthy() {
                        return self.execute(&branch.body, output);
                    }
                }
                match else_branch {
                    Some(else_stmt) => self.execute(else_stmt, output),
                    None => Ok(Flow::Normal),
                }
            }
            Stmt::While { condition, body } => {
                while self.evaluate(condition, output)?.is_truthy() {
                    match self.execute(body, output)? {
                        Flow::Normal | Flow::Continue => {}
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::For {
                initializer,
                condition,
                increment,
                body,
            } => {
                let env = self.child_environment();
                self.in_environment(env, |i| {
                    i.execute_for(
                        initializer.as_deref(),
                        condition.as_ref(),
                        increment.as_ref(),
                        body,
                        output,
                    )
                })
            }
            Stmt::Break { .. } => Ok(Flow::Break),
            Stmt::Continue { .. } => Ok(Flow::Continue),
            Stmt::Function(declaration) => {
                let function = Function {
                    declaration: Rc::clone(declaration),
                    closure: Rc::clone(&self.environment),
                    is_initializer: false,
                };
                let value = Value::Callable(Callable::Function(Rc::new(function)));
                self.define(&declaration.name, value)?;
                Ok(Flow::Normal)
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr, output)?,
                    None => Value::Nil,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                let superclass = match superclass {
                    Some(expr) => match self.evaluate(expr, output)? {
                        Value::Callable(Callable::Class(class)) => Some(class),
                        _ => {
                            let line = match expr {
                                Expr::Variable { name, .. } => name.line,
                                _ => name.line,
                            };
                            return Err(LoxError::runtime(RuntimeError::SuperclassNotClass, line));
                        }
                    },
                    None => None,
                };

                let methods: HashMap<String, Rc<Function>> = methods
                    .iter()
                    .map(|method| {
                        let function = Function {
                            declaration: Rc::clone(method),
                            closure: Rc::clone(&self.environment),
                            is_initializer: method.name.lexeme == INITIALIZER_NAME,
                        };
                        (method.name.lexeme.clone(), Rc::new(function))
                    })
                    .collect();

                trace!(
                    class = %name.lexeme,
                    methods = methods.len(),
                    superclass = ?superclass.as_ref().map(|s| &s.name),
                    "defined class"
                );

                let class = Class {
                    name: name.lexeme.clone(),
                    superclass,
                    methods,
                };
                self.define(name, Value::Callable(Callable::Class(Rc::new(class))))?;
                Ok(Flow::Normal)
            }
        }
    }

    fn execute_for(
        &mut self,
        initializer: Option<&Stmt>,
        condition: Option<&Expr>,
        increment: Option<&Expr>,
        body: &Stmt,
        output: &mut dyn Write,
    ) -> Result<Flow, LoxError> {
        if let Some(init) = initializer {
            self.execute(init, output)?;
        }

        loop {
            if let Some(cond) = condition
                && !self.evaluate(cond, output)?.is_truthy()
            {
                break;
            }

            match self.execute(body, output)? {
                Flow::Normal | Flow::Continue => {}
                Flow::Break => break,
                Flow::Return(value) => return Ok(Flow::Return(value)),
            }

            if let Some(inc) = increment {
                self.evaluate(inc, output)?;
            }
        }

        Ok(Flow::Normal)
    }

    fn evaluate(&mut self, expr: &Expr, output: &mut dyn Write) -> Result<Value, LoxError> {
        ensure_sufficient_stack(|| self.evaluate_expr(expr, output))
    }

    fn evaluate_expr(&mut self, expr: &Expr, output: &mut dyn Write) -> Result<Value, LoxError> {
        match expr {
            Expr::Literal { value } => Ok(Value::from(value.clone())),
            Expr::Grouping { expression } => self.evaluate(expression, output),
            Expr::Variable { id, name } => self.look_up_variable(*id, &name.lexeme, name.line),
            Expr::This { id, keyword } => self.look_up_variable(*id, THIS_NAME, keyword.line),
            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value, output)?;
                self.assign_variable(*id, name, value.clone())?;
                Ok(value)
            }
            Expr::Update {
                id,
                name,
                operator,
                prefix,
            } => {
                let old = match self.look_up_variable(*id, &name.lexeme, name.line)? {
                    Value::Number(n) => n,
                    other => {
                        return Err(LoxError::runtime(
                            RuntimeError::TypeError(format!(
                                "Operand of '{}' must be a number, not {}",
                                operator.lexeme,
                                other.type_name()
                            )),
                            operator.line,
                        ));
                    }
                };
                let new = if operator.token_type == TokenType::PlusPlus {
                    old + 1.0
                } else {
                    old - 1.0
                };
                self.assign_variable(*id, name, Value::Number(new))?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
            Expr::Unary { operator, right } => {
                let right = self.evaluate(right, output)?;
                match operator.token_type {
                    TokenType::Minus => match right {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        other => Err(LoxError::runtime(
                            RuntimeError::TypeError(format!(
                                "Operand of '-' must be a number, not {}",
                                other.type_name()
                            )),
                            operator.line,
                        )),
                    },
                    _ => Ok(Value::Bool(!right.is_truthy())),
                }
            }
            Expr::Binary {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left, output)?;
                let right = self.evaluate(right, output)?;
                binary(operator, left, right)
            }
            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left, output)?;
                let short_circuits = if operator.token_type == TokenType::Or {
                    left.is_truthy()
                } else {
                    !left.is_truthy()
                };
                if short_circuits {
                    Ok(left)
                } else {
                    self.evaluate(right, output)
                }
            }
            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee = self.evaluate(callee, output)?;
                let arguments = arguments
                    .iter()
                    .map(|arg| self.evaluate(arg, output))
                    .collect::<Result<Vec<_>, _>>()?;

                let callable = match callee {
                    Value::Callable(callable) => callable,
                    other => {
                        return Err(LoxError::runtime(
                            RuntimeError::NotCallable(other.type_name()),
                            paren.line,
                        ));
                    }
                };

                if arguments.len() != callable.arity() {
                    return Err(LoxError::runtime(
                        RuntimeError::ArityMismatch {
                            name: callable.name(),
                            expected: callable.arity(),
                            got: arguments.len(),
                        },
                        paren.line,
                    ));
                }

                self.call(&callable, arguments, paren.line, output)
            }
            Expr::Get { object, name } => match self.evaluate(object, output)? {
                Value::Instance(instance) => instance
                    .get(&name.lexeme)
                    .map_err(|kind| LoxError::runtime(kind, name.line)),
                other => Err(LoxError::runtime(
                    RuntimeError::NotAnInstance(other.type_name()),
                    name.line,
                )),
            },
            Expr::Set {
                object,
                name,
                value,
            } => {
                let instance = match self.evaluate(object, output)? {
                    Value::Instance(instance) => instance,
                    other => {
                        return Err(LoxError::runtime(
                            RuntimeError::NotAnInstance(other.type_name()),
                            name.line,
                        ));
                    }
                };
                let value = self.evaluate(value, output)?;
                instance.set(&name.lexeme, value.clone());
                Ok(value)
            }
            Expr::Lambda { declaration } => Ok(Value::Callable(Callable::Lambda(Rc::new(
                Lambda {
                    declaration: Rc::clone(declaration),
                    closure: Rc::clone(&self.environment),
                },
            )))),
        }
    }

    fn look_up_variable(&self, id: ExprId, name: &str, line: usize) -> Result<Value, LoxError> {
        match self.resolutions.get(&id) {
            Some(&distance) => Ok(Environment::get_at(&self.environment, name, distance)?),
            None => self.globals.borrow().get(name).ok_or_else(|| {
                LoxError::runtime(RuntimeError::UndefinedVariable(name.to_string()), line)
            }),
        }
    }

    fn assign_variable(&mut self, id: ExprId, name: &Token, value: Value) -> Result<(), LoxError> {
        match self.resolutions.get(&id) {
            Some(&distance) => {
                Environment::assign_at(&self.environment, &name.lexeme, value, distance)?;
                Ok(())
            }
            None => self
                .globals
                .borrow_mut()
                .assign(&name.lexeme, value)
                .map_err(|kind| LoxError::runtime(kind, name.line)),
        }
    }

    /// Invoke a callable whose arity has already been checked.
    fn call(
        &mut self,
        callable: &Callable,
        arguments: Vec<Value>,
        line: usize,
        output: &mut dyn Write,
    ) -> Result<Value, LoxError> {
        if self.call_depth >= self.config.max_call_depth {
            return Err(LoxError::runtime(
                RuntimeError::StackOverflow(self.config.max_call_depth),
                line,
            ));
        }

        trace!(callee = %callable, args = arguments.len(), depth = self.call_depth, "call");

        self.call_depth += 1;
        let result = self.invoke(callable, arguments, line, output);
        self.call_depth -= 1;
        result
    }

    fn invoke(
        &mut self,
        callable: &Callable,
        arguments: Vec<Value>,
        line: usize,
        output: &mut dyn Write,
    ) -> Result<Value, LoxError> {
        match callable {
            Callable::Function(function) => {
                let value =
                    self.call_declaration(&function.declaration, &function.closure, arguments, output)?;
                if function.is_initializer {
                    return Ok(Environment::get_at(&function.closure, THIS_NAME, 0)?);
                }
                Ok(value)
            }
            Callable::Lambda(lambda) => {
                self.call_declaration(&lambda.declaration, &lambda.closure, arguments, output)
            }
            Callable::Native(native) => {
                (native.func)(&arguments).map_err(|kind| LoxError::runtime(kind, line))
            }
            Callable::Class(class) => {
                let instance = Rc::new(Instance::new(Rc::clone(class)));
                trace!(class = %class.name, "constructing instance");
                if let Some(initializer) = class.find_method(INITIALIZER_NAME) {
                    let bound = initializer.bind(Rc::clone(&instance));
                    self.call_declaration(&bound.declaration, &bound.closure, arguments, output)?;
                }
                Ok(Value::Instance(instance))
            }
        }
    }

    /// Bind parameters in a fresh frame under `closure` and run the body.
    fn call_declaration(
        &mut self,
        declaration: &FunctionDecl,
        closure: &Rc<RefCell<Environment>>,
        arguments: Vec<Value>,
        output: &mut dyn Write,
    ) -> Result<Value, LoxError> {
        let mut env = Environment::with_enclosing(Rc::clone(closure));
        for (param, argument) in declaration.params.iter().zip(arguments) {
            env.define(&param.lexeme, argument)
                .map_err(|kind| LoxError::runtime(kind, param.line))?;
        }

        let flow = self.in_environment(Rc::new(RefCell::new(env)), |i| {
            i.execute_statements(&declaration.body, output)
        })?;

        match flow {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Nil),
            signal => Err(InternalError::SignalEscaped(signal.signal_name()).into()),
        }
    }
}

fn type_error(operator: &Token, message: &str, left: &Value, right: &Value) -> LoxError {
    LoxError::runtime(
        RuntimeError::TypeError(format!(
            "Operands of '{}' must be {}, not {} and {}",
            operator.lexeme,
            message,
            left.type_name(),
            right.type_name()
        )),
        operator.line,
    )
}

fn binary(operator: &Token, left: Value, right: Value) -> Result<Value, LoxError> {
    match operator.token_type {
        TokenType::EqualEqual => return Ok(Value::Bool(left == right)),
        TokenType::BangEqual => return Ok(Value::Bool(left != right)),
        _ => {}
    }

    match (operator.token_type, &left, &right) {
        (TokenType::Plus, Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
        (TokenType::Plus, Value::String(a), Value::String(b)) => {
            Ok(Value::String(format!("{}{}", a, b)))
        }
        (TokenType::Plus, _, _) => Err(type_error(
            operator,
            "two numbers or two strings",
            &left,
            &right,
        )),
        (TokenType::Slash, Value::Number(_), Value::Number(b)) if *b == 0.0 => Err(
            LoxError::runtime(RuntimeError::DivisionByZero, operator.line),
        ),
        (TokenType::Minus | TokenType::Star | TokenType::Slash, Value::Number(a), Value::Number(b)) => {
            Ok(Value::Number(match operator.token_type {
                TokenType::Minus => a - b,
                TokenType::Star => a * b,
                _ => a / b,
            }))
        }
        (TokenType::Minus | TokenType::Star | TokenType::Slash, _, _) => {
            Err(type_error(operator, "numbers", &left, &right))
        }
        (_, Value::Number(a), Value::Number(b)) => Ok(Value::Bool(compare(operator, a, b))),
        (_, Value::String(a), Value::String(b)) => Ok(Value::Bool(compare(operator, a, b))),
        _ => Err(type_error(
            operator,
            "two numbers or two strings",
            &left,
            &right,
        )),
    }
}

fn compare<T: PartialOrd + ?Sized>(operator: &Token, a: &T, b: &T) -> bool {
    match operator.token_type {
        TokenType::Greater => a > b,
        TokenType::GreaterEqual => a >= b,
        TokenType::Less => a < b,
        _ => a <= b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::resolver::Resolver;
    use crate::scanner::Scanner;
    use pretty_assertions::assert_eq;

    struct Session {
        interpreter: Interpreter,
        next_id: ExprId,
    }

    impl Session {
        fn new(config: Config) -> Self {
            Self {
                interpreter: Interpreter::new(config),
                next_id: 0,
            }
        }

        fn run_mode(
            &mut self,
            source: &str,
            repl_mode: bool,
        ) -> (Result<Option<Value>, LoxError>, String) {
            let tokens = Scanner::new(source).scan_all().unwrap();
            let mut parser = Parser::with_first_id(tokens, self.next_id);
            let program = parser.parse().unwrap();
            self.next_id = parser.next_id();
            let resolutions = Resolver::new().resolve(&program).unwrap();
            let mut output = Vec::new();
            let result = self
                .interpreter
                .interpret(&program, resolutions, repl_mode, &mut output);
            (result, String::from_utf8(output).unwrap())
        }

        fn run(&mut self, source: &str) -> (Result<Option<Value>, LoxError>, String) {
            self.run_mode(source, false)
        }
    }

    fn output(source: &str) -> String {
        let (result, output) = Session::new(Config::default()).run(source);
        result.unwrap();
        output
    }

    fn runtime_error(source: &str) -> (RuntimeError, usize) {
        match Session::new(Config::default()).run(source).0 {
            Err(LoxError::Runtime { kind, line }) => (kind, line),
            other => panic!("Expected runtime error, got {:?}", other),
        }
    }

    #[test]
    fn prints_values() {
        assert_eq!(output("print 1 + 2; print \"a\" + \"b\"; print nil; print;"), "3\nab\nnil\n\n");
    }

    #[test]
    fn arithmetic_and_precedence() {
        assert_eq!(output("print 2 + 3 * 4 - 6 / 2; print -(1 + 1);"), "11\n-2\n");
    }

    #[test]
    fn comparisons_on_numbers_and_strings() {
        assert_eq!(
            output("print 1 < 2; print 2 <= 1; print \"apple\" < \"banana\"; print \"b\" >= \"a\";"),
            "true\nfalse\ntrue\ntrue\n"
        );
    }

    #[test]
    fn equality_never_errors_across_types() {
        assert_eq!(
            output("print 1 == \"1\"; print nil == false; print \"a\" != \"a\"; print nil == nil;"),
            "false\nfalse\nfalse\ntrue\n"
        );
    }

    #[test]
    fn truthiness_of_zero_and_empty_string() {
        assert_eq!(output("print !0; print !\"\"; print !nil;"), "false\nfalse\ntrue\n");
    }

    #[test]
    fn logical_operators_return_an_operand() {
        assert_eq!(
            output("print nil or \"x\"; print 1 or 2; print nil and 1; print 1 and 2;"),
            "x\n1\nnil\n2\n"
        );
    }

    #[test]
    fn logical_operators_short_circuit() {
        assert_eq!(
            output("var hit = false; fun touch() { hit = true; return true; } false and touch(); true or touch(); print hit;"),
            "false\n"
        );
    }

    #[test]
    fn division_by_zero_is_an_error() {
        assert_eq!(runtime_error("print 1 / 0;"), (RuntimeError::DivisionByZero, 1));
    }

    #[test]
    fn adding_number_and_string_is_a_type_error() {
        let (kind, line) = runtime_error("\n1 + \"a\";");
        assert_eq!(line, 2);
        assert_eq!(
            kind,
            RuntimeError::TypeError(
                "Operands of '+' must be two numbers or two strings, not number and string"
                    .to_string()
            )
        );
    }

    #[test]
    fn comparing_mixed_types_is_a_type_error() {
        assert!(matches!(runtime_error("1 < \"2\";").0, RuntimeError::TypeError(_)));
    }

    #[test]
    fn negating_a_string_is_a_type_error() {
        assert!(matches!(runtime_error("-\"a\";").0, RuntimeError::TypeError(_)));
    }

    #[test]
    fn undefined_global_is_an_error() {
        assert_eq!(
            runtime_error("print missing;"),
            (RuntimeError::UndefinedVariable("missing".to_string()), 1)
        );
        assert_eq!(
            runtime_error("missing = 1;"),
            (RuntimeError::UndefinedVariable("missing".to_string()), 1)
        );
    }

    #[test]
    fn global_self_reference_fails_at_runtime() {
        assert_eq!(
            runtime_error("var a = a;"),
            (RuntimeError::UndefinedVariable("a".to_string()), 1)
        );
    }

    #[test]
    fn redefining_a_global_is_an_error() {
        assert_eq!(
            runtime_error("var a = 1;\nvar a = 2;"),
            (RuntimeError::DuplicateDefinition("a".to_string()), 2)
        );
    }

    #[test]
    fn shadowing_in_blocks() {
        assert_eq!(
            output("var x = 1; { var x = 2; print x; } print x;"),
            "2\n1\n"
        );
    }

    #[test]
    fn block_assignment_updates_outer_variable() {
        assert_eq!(output("var x = 1; { x = 5; } print x;"), "5\n");
    }

    #[test]
    fn environment_is_restored_after_error_in_block() {
        let mut session = Session::new(Config::default());
        let (result, _) = session.run("var x = \"global\"; { var x = \"local\"; 1 / 0; }");
        assert!(result.is_err());
        let (result, output) = session.run("print x;");
        result.unwrap();
        assert_eq!(output, "global\n");
    }

    #[test]
    fn runtime_error_keeps_prior_mutations() {
        let mut session = Session::new(Config::default());
        let (result, output) = session.run("var n = 1; print n; n = 2; n / 0; n = 3;");
        assert!(result.is_err());
        assert_eq!(output, "1\n");
        let (_, output) = session.run("print n;");
        assert_eq!(output, "2\n");
    }

    #[test]
    fn if_elif_else_takes_first_truthy_branch() {
        let source = "
            fun pick(n) {
                if (n == 1) return \"one\";
                elif (n == 2) return \"two\";
                elif (n == 2) return \"again\";
                else return \"many\";
            }
            print pick(1); print pick(2); print pick(3);
        ";
        assert_eq!(output(source), "one\ntwo\nmany\n");
    }

    #[test]
    fn if_without_else_does_nothing_when_false() {
        assert_eq!(output("if (nil) print 1; print 2;"), "2\n");
    }

    #[test]
    fn while_loop_runs_until_condition_is_falsy() {
        assert_eq!(output("var i = 0; while (i < 3) { print i; i = i + 1; }"), "0\n1\n2\n");
    }

    #[test]
    fn for_loop_with_continue_and_break() {
        let source = "for (var i = 0; i < 5; i = i + 1) { if (i == 2) continue; if (i == 4) break; print i; }";
        assert_eq!(output(source), "0\n1\n3\n");
    }

    #[test]
    fn for_loop_variable_does_not_leak() {
        let (kind, _) = runtime_error("for (var i = 0; i < 1; i++) {} print i;");
        assert_eq!(kind, RuntimeError::UndefinedVariable("i".to_string()));
    }

    #[test]
    fn for_loop_without_condition_runs_until_break() {
        assert_eq!(output("var n = 0; for (;;) { n++; if (n == 3) break; } print n;"), "3\n");
    }

    #[test]
    fn continue_in_while_skips_rest_of_body() {
        let source = "var i = 0; while (i < 4) { i = i + 1; if (i == 2) continue; print i; }";
        assert_eq!(output(source), "1\n3\n4\n");
    }

    #[test]
    fn break_only_leaves_innermost_loop() {
        let source = "
            for (var i = 0; i < 2; i++) {
                while (true) { break; }
                print i;
            }
        ";
        assert_eq!(output(source), "0\n1\n");
    }

    #[test]
    fn return_unwinds_through_loops() {
        let source = "
            fun find() {
                for (var i = 0; i < 10; i++) {
                    while (true) { if (i == 3) return i; break; }
                }
                return -1;
            }
            print find();
        ";
        assert_eq!(output(source), "3\n");
    }

    #[test]
    fn function_without_return_yields_nil() {
        assert_eq!(output("fun f() {} print f();"), "nil\n");
    }

    #[test]
    fn update_operators_prefix_and_postfix() {
        assert_eq!(
            output("var i = 1; print i++; print i; print ++i; print i--; print --i;"),
            "1\n2\n3\n3\n1\n"
        );
    }

    #[test]
    fn update_requires_a_number() {
        assert!(matches!(runtime_error("var s = \"a\"; s++;").0, RuntimeError::TypeError(_)));
    }

    #[test]
    fn closures_capture_their_environment() {
        let source = "
            fun counter() {
                var count = 0;
                fun inc() { count = count + 1; return count; }
                return inc;
            }
            var c = counter();
            print c(); print c();
            var d = counter();
            print d();
        ";
        assert_eq!(output(source), "1\n2\n1\n");
    }

    #[test]
    fn closure_observes_mutation_before_block_ends() {
        let source = "
            var show;
            {
                var message = \"before\";
                show = fun () { return message; };
                message = \"after\";
            }
            print show();
        ";
        assert_eq!(output(source), "after\n");
    }

    #[test]
    fn closure_keeps_lexical_binding_when_global_is_added_later() {
        let source = "
            var a = \"global\";
            {
                fun show() { print a; }
                show();
                var a = \"block\";
                show();
            }
        ";
        assert_eq!(output(source), "global\nglobal\n");
    }

    #[test]
    fn lambdas_are_first_class() {
        let source = "
            fun apply(f, x) { return f(x); }
            print apply(fun (n) { return n * 2; }, 21);
            var add = fun (a, b) { return a + b; };
            print add;
        ";
        assert_eq!(output(source), "42\n<lambda>\n");
    }

    #[test]
    fn recursion() {
        let source = "fun fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); } print fib(15);";
        assert_eq!(output(source), "610\n");
    }

    #[test]
    fn calling_a_non_callable_is_an_error() {
        assert_eq!(
            runtime_error("var x = 1;\nx();"),
            (RuntimeError::NotCallable("number"), 2)
        );
    }

    #[test]
    fn arity_mismatch_happens_before_body_runs() {
        let mut session = Session::new(Config::default());
        let (result, output) = session.run(
            "var calls = 0; fun add(a, b) { calls = calls + 1; print \"ran\"; return a + b; } add(1);",
        );
        assert!(matches!(
            result,
            Err(LoxError::Runtime {
                kind: RuntimeError::ArityMismatch {
                    expected: 2,
                    got: 1,
                    ..
                },
                ..
            })
        ));
        assert_eq!(output, "");

        let (result, _) = session.run("add(1, 2, 3);");
        assert!(result.is_err());
        let (_, output) = session.run("print calls;");
        assert_eq!(output, "0\n");
    }

    #[test]
    fn arguments_are_evaluated_before_callability_check() {
        let (result, output) = Session::new(Config::default())
            .run("fun loud() { print \"arg\"; return 1; } var n = 2; n(loud());");
        assert!(result.is_err());
        assert_eq!(output, "arg\n");
    }

    #[test]
    fn deep_recursion_is_a_stack_overflow() {
        let mut session = Session::new(Config { max_call_depth: 25 });
        let (result, _) = session.run("fun down(n) { return down(n + 1); } down(0);");
        assert!(matches!(
            result,
            Err(LoxError::Runtime {
                kind: RuntimeError::StackOverflow(25),
                ..
            })
        ));
        // depth bookkeeping unwinds with the error
        let (result, output) = session.run("fun one() { return 1; } print one();");
        result.unwrap();
        assert_eq!(output, "1\n");
    }

    #[test]
    fn natives_are_defined_globally() {
        assert_eq!(output("print str(12) + \"!\"; print clock;"), "12!\n<native fn clock>\n");
        assert!(output("print clock() > 0;").starts_with("true"));
    }

    #[test]
    fn native_error_carries_call_line() {
        let (kind, line) = runtime_error("\n\nsleep(\"x\");");
        assert!(matches!(kind, RuntimeError::Native(_)));
        assert_eq!(line, 3);
    }

    #[test]
    fn class_with_initializer_and_methods() {
        let source = "
            class Point {
                init(x, y) { this.x = x; this.y = y; }
                sum() { return this.x + this.y; }
            }
            var p = Point(1, 2);
            print p.sum();
            print p;
            print Point;
        ";
        assert_eq!(output(source), "3\n<Point instance>\n<class Point>\n");
    }

    #[test]
    fn inherited_method_binds_this_to_subclass_instance() {
        let source = "
            class A { init(v) { this.v = v; } get() { return this.v; } }
            class B < A {}
            var b = B(5);
            print b.get();
            print b;
        ";
        assert_eq!(output(source), "5\n<B instance>\n");
    }

    #[test]
    fn subclass_overrides_superclass_method() {
        let source = "
            class A { name() { return \"A\"; } }
            class B < A { name() { return \"B\"; } }
            print B().name(); print A().name();
        ";
        assert_eq!(output(source), "B\nA\n");
    }

    #[test]
    fn constructor_always_yields_this() {
        let source = "
            class C { init() { return; } }
            var c = C();
            c.tag = \"ok\";
            print c.tag;
            print c.init() == c;
        ";
        assert_eq!(output(source), "ok\ntrue\n");
    }

    #[test]
    fn class_arity_follows_initializer() {
        assert!(matches!(
            runtime_error("class P { init(a) {} } P();").0,
            RuntimeError::ArityMismatch {
                expected: 1,
                got: 0,
                ..
            }
        ));
        assert!(matches!(
            runtime_error("class Q {} Q(1);").0,
            RuntimeError::ArityMismatch {
                expected: 0,
                got: 1,
                ..
            }
        ));
    }

    #[test]
    fn bound_method_remembers_its_instance() {
        let source = "
            class Greeter { init(n) { this.n = n; } hi() { return \"hi \" + this.n; } }
            var hi = Greeter(\"bob\").hi;
            print hi();
        ";
        assert_eq!(output(source), "hi bob\n");
    }

    #[test]
    fn fields_are_per_instance() {
        let source = "
            class Box {}
            var a = Box(); var b = Box();
            a.v = 1; b.v = 2;
            print a.v; print b.v; print a == b; print a == a;
        ";
        assert_eq!(output(source), "1\n2\nfalse\ntrue\n");
    }

    #[test]
    fn undefined_property_is_an_error() {
        assert_eq!(
            runtime_error("class A {} A().missing;"),
            (RuntimeError::UndefinedProperty("missing".to_string()), 1)
        );
    }

    #[test]
    fn property_access_on_non_instance_is_an_error() {
        assert_eq!(
            runtime_error("var n = 1; n.x;"),
            (RuntimeError::NotAnInstance("number"), 1)
        );
        assert_eq!(
            runtime_error("\"s\".x = 1;"),
            (RuntimeError::NotAnInstance("string"), 1)
        );
    }

    #[test]
    fn superclass_must_be_a_class() {
        assert_eq!(
            runtime_error("var NotClass = 1;\nclass B < NotClass {}"),
            (RuntimeError::SuperclassNotClass, 2)
        );
    }

    #[test]
    fn repl_mode_surfaces_single_expression_value() {
        let mut session = Session::new(Config::default());
        let (result, output) = session.run_mode("1 + 2;", true);
        assert_eq!(result.unwrap(), Some(Value::Number(3.0)));
        assert_eq!(output, "");

        let (result, _) = session.run_mode("var x = 1;", true);
        assert_eq!(result.unwrap(), None);

        let (result, _) = session.run_mode("1; 2;", true);
        assert_eq!(result.unwrap(), None);
    }

    #[test]
    fn closures_survive_across_separate_programs() {
        let mut session = Session::new(Config::default());
        session
            .run("fun make() { var n = 0; return fun () { n = n + 1; return n; }; } var next = make();")
            .0
            .unwrap();
        session.run("{ var pad = 1; }").0.unwrap();
        let (result, output) = session.run("print next(); print next();");
        result.unwrap();
        assert_eq!(output, "1\n2\n");
    }

    #[test]
    fn global_names_lists_natives_and_definitions() {
        let mut session = Session::new(Config::default());
        session.run("var zebra = 1; fun apple() {}").0.unwrap();
        assert_eq!(
            session.interpreter.global_names(),
            vec!["apple", "clock", "sleep", "str", "zebra"]
        );
    }

    #[test]
    fn escaped_signal_is_internal_error() {
        let mut interpreter = Interpreter::default();
        let tokens = Scanner::new("break;").scan_all().unwrap();
        let program = Parser::new(tokens).parse().unwrap();
        let result = interpreter.interpret(&program, Resolutions::new(), false, &mut Vec::new());
        assert!(matches!(
            result,
            Err(LoxError::Internal(InternalError::SignalEscaped("break")))
        ));
    }

    #[test]
    fn mismatched_resolution_is_internal_error() {
        let mut interpreter = Interpreter::default();
        let tokens = Scanner::new("var a = 1; print a;").scan_all().unwrap();
        let program = Parser::new(tokens).parse().unwrap();
        let bogus: Resolutions = [(0, 4)].into_iter().collect();
        let result = interpreter.interpret(&program, bogus, false, &mut Vec::new());
        assert!(matches!(
            result,
            Err(LoxError::Internal(InternalError::ScopeChainTooShort { .. }))
        ));
    }
}
