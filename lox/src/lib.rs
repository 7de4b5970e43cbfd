mod ast;
mod environment;
mod error;
mod interpreter;
mod natives;
mod parser;
mod resolver;
mod scanner;
mod stack;
mod token;
mod value;

use std::fs;
use std::io::Write;
use std::path::Path;

use tracing::debug;

pub use ast::{ElifBranch, Expr, ExprId, FunctionDecl, Stmt};
pub use error::{InternalError, LoxError, RuntimeError, StaticError};
pub use interpreter::Interpreter;
pub use parser::Parser;
pub use resolver::{Resolutions, Resolver, resolve};
pub use scanner::{KEYWORDS, Scanner, is_identifier_char};
pub use token::{Literal, Token, TokenType};
pub use value::{Callable, Value};

/// Name of the method run when a class is called.
pub const INITIALIZER_NAME: &str = "init";

/// Name under which a bound method sees its instance.
pub const THIS_NAME: &str = "this";

pub const DEFAULT_MAX_CALL_DEPTH: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Nested calls allowed before a `StackOverflow` runtime error.
    pub max_call_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

/// A session: one global environment that persists across every piece of
/// source it runs.
pub struct Lox {
    interpreter: Interpreter,
    next_id: ExprId,
}

impl Default for Lox {
    fn default() -> Self {
        Self::new()
    }
}

impl Lox {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            interpreter: Interpreter::new(config),
            next_id: 0,
        }
    }

    /// Globals defined so far, including natives. Used for REPL completion.
    pub fn global_names(&self) -> Vec<String> {
        self.interpreter.global_names()
    }

    /// Scan, parse and resolve. Nothing runs if any phase reports errors.
    fn compile(&mut self, source: &str) -> Result<(Vec<Stmt>, Resolutions), Vec<LoxError>> {
        let tokens = Scanner::new(source).scan_all()?;

        let mut parser = Parser::with_first_id(tokens, self.next_id);
        let parsed = parser.parse();
        self.next_id = parser.next_id();
        let statements = parsed?;

        let resolutions = Resolver::new().resolve(&statements)?;
        debug!(
            statements = statements.len(),
            next_id = self.next_id,
            "compiled source"
        );
        Ok((statements, resolutions))
    }

    /// Run a program. Returns every compile-time error, or the runtime error
    /// that stopped execution; empty on success.
    pub fn run<O: Write>(&mut self, source: &str, mut stdout: O) -> Vec<LoxError> {
        let (statements, resolutions) = match self.compile(source) {
            Ok(compiled) => compiled,
            Err(errors) => return errors,
        };

        match self
            .interpreter
            .interpret(&statements, resolutions, false, &mut stdout)
        {
            Ok(_) => Vec::new(),
            Err(e) => vec![e],
        }
    }

    /// Run one REPL entry. A lone expression statement yields its value.
    pub fn run_repl_line<O: Write>(
        &mut self,
        source: &str,
        mut stdout: O,
    ) -> Result<Option<Value>, Vec<LoxError>> {
        let (statements, resolutions) = self.compile(source)?;
        self.interpreter
            .interpret(&statements, resolutions, true, &mut stdout)
            .map_err(|e| vec![e])
    }

    pub fn run_file<O: Write>(&mut self, path: impl AsRef<Path>, stdout: O) -> Vec<LoxError> {
        match fs::read_to_string(path) {
            Ok(source) => self.run(&source, stdout),
            Err(e) => vec![e.into()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str) -> (Vec<LoxError>, String) {
        let mut lox = Lox::new();
        let mut stdout = Vec::new();
        let errors = lox.run(source, &mut stdout);
        (errors, String::from_utf8(stdout).unwrap())
    }

    #[test]
    fn run_empty_source_returns_no_errors() {
        assert!(run("").0.is_empty());
    }

    #[test]
    fn run_comment_only_returns_no_errors() {
        assert!(run("// just a comment").0.is_empty());
    }

    #[test]
    fn run_executes_print_statement() {
        let (errors, output) = run("print 1 + 2;");
        assert!(errors.is_empty());
        assert_eq!(output, "3\n");
    }

    #[test]
    fn run_returns_every_scanner_error() {
        let (errors, _) = run("@$");
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| matches!(e, LoxError::Scan { .. })));
    }

    #[test]
    fn run_returns_parser_error() {
        let (errors, _) = run("1 +");
        assert_eq!(errors.len(), 1);
        assert!(matches!(&errors[0], LoxError::Parse { .. }));
    }

    #[test]
    fn static_errors_prevent_execution() {
        let (errors, output) = run("print \"side effect\";\n{ var a = a; }\nreturn 1;");
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| matches!(e, LoxError::Static { .. })));
        assert_eq!(output, "");
    }

    #[test]
    fn runtime_error_stops_after_prior_output() {
        let (errors, output) = run("print 1;\nprint -\"x\";\nprint 2;");
        assert_eq!(output, "1\n");
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].to_string(),
            "[Line 2] Runtime Error: Operand of '-' must be a number, not string"
        );
    }

    #[test]
    fn session_persists_variables_across_runs() {
        let mut lox = Lox::new();
        assert!(lox.run("var x = 42;", Vec::new()).is_empty());

        let mut stdout = Vec::new();
        assert!(lox.run("print x;", &mut stdout).is_empty());
        assert_eq!(String::from_utf8(stdout).unwrap(), "42\n");
    }

    #[test]
    fn errors_dont_affect_subsequent_runs() {
        let mut lox = Lox::new();
        assert_eq!(lox.run("@", Vec::new()).len(), 1);

        let mut stdout = Vec::new();
        assert!(lox.run("print 42;", &mut stdout).is_empty());
        assert_eq!(String::from_utf8(stdout).unwrap(), "42\n");
    }

    #[test]
    fn local_closure_from_earlier_run_still_resolves() {
        let mut lox = Lox::new();
        let setup = "
            var counter;
            {
                var i = 0;
                fun count() { i = i + 1; return i; }
                counter = count;
            }
        ";
        assert!(lox.run(setup, Vec::new()).is_empty());
        assert!(lox.run("{ var unrelated = 0; print unrelated; }", Vec::new()).is_empty());

        let mut stdout = Vec::new();
        assert!(lox.run("print counter(); print counter();", &mut stdout).is_empty());
        assert_eq!(String::from_utf8(stdout).unwrap(), "1\n2\n");
    }

    #[test]
    fn repl_line_surfaces_expression_value() {
        let mut lox = Lox::new();
        assert_eq!(
            lox.run_repl_line("\"a\" + \"b\";", Vec::new()).unwrap(),
            Some(Value::String("ab".to_string()))
        );
        assert_eq!(lox.run_repl_line("var y = 1;", Vec::new()).unwrap(), None);
        assert_eq!(
            lox.run_repl_line("y;", Vec::new()).unwrap(),
            Some(Value::Number(1.0))
        );
    }

    #[test]
    fn repl_line_reports_errors() {
        let mut lox = Lox::new();
        let errors = lox.run_repl_line("1 / 0;", Vec::new()).unwrap_err();
        assert!(matches!(
            &errors[0],
            LoxError::Runtime {
                kind: RuntimeError::DivisionByZero,
                ..
            }
        ));
    }

    #[test]
    fn run_file_reads_script() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.lox");
        std::fs::write(&path, "var greeting = \"hello\";\nprint greeting;\n").unwrap();

        let mut lox = Lox::new();
        let mut stdout = Vec::new();
        assert!(lox.run_file(&path, &mut stdout).is_empty());
        assert_eq!(String::from_utf8(stdout).unwrap(), "hello\n");
    }

    #[test]
    fn run_file_reports_missing_script() {
        let mut lox = Lox::new();
        let errors = lox.run_file("/definitely/not/here.lox", Vec::new());
        assert!(matches!(&errors[0], LoxError::Io(_)));
    }

    #[test]
    fn global_names_include_natives() {
        let mut lox = Lox::new();
        lox.run("fun greet() {}", Vec::new());
        let names = lox.global_names();
        assert!(names.contains(&"greet".to_string()));
        assert!(names.contains(&"clock".to_string()));
    }

    #[test]
    fn config_limits_call_depth() {
        let mut lox = Lox::with_config(Config { max_call_depth: 10 });
        let errors = lox.run("fun f(n) { return f(n + 1); }\nf(0);", Vec::new());
        assert_eq!(
            errors[0].to_string(),
            "[Line 1] Runtime Error: Stack overflow: more than 10 nested calls"
        );
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failed_print_is_an_output_error() {
        let mut lox = Lox::new();
        let errors = lox.run("print \"lost\";", ClosedPipe);
        assert_eq!(errors.len(), 1);
        assert!(matches!(&errors[0], LoxError::Output(_)));
        assert!(errors[0].to_string().starts_with("Could not write output"));
    }

    #[test]
    fn default_config_allows_moderate_recursion() {
        let (errors, output) =
            run("fun sum(n) { if (n == 0) return 0; return n + sum(n - 1); } print sum(50);");
        assert!(errors.is_empty());
        assert_eq!(output, "1275\n");
    }
}
