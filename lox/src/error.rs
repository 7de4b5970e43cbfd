use thiserror::Error;

/// Errors found by the resolver before anything runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StaticError {
    #[error("Variable '{0}' is already declared in this scope")]
    DuplicateDeclaration(String),

    #[error("Cannot read local variable '{0}' in its own initializer")]
    SelfReferencingInitializer(String),

    #[error("Cannot use '{0}' outside of a loop")]
    LoopControlOutsideLoop(&'static str),

    #[error("Cannot return from top-level code")]
    ReturnOutsideFunction,

    #[error("Cannot use 'this' outside of a class method")]
    ThisOutsideClass,

    #[error("Class '{0}' cannot inherit from itself")]
    ClassInheritsFromItself(String),
}

/// Errors raised while executing. The first one aborts the run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("Undefined variable '{0}'")]
    UndefinedVariable(String),

    #[error("Cannot redefine variable '{0}', it has already been defined")]
    DuplicateDefinition(String),

    #[error("{0}")]
    TypeError(String),

    #[error("Cannot divide by zero")]
    DivisionByZero,

    #[error("Can only call functions, lambdas and classes, not {0}")]
    NotCallable(&'static str),

    #[error("{name} expected {expected} argument(s) but got {got}")]
    ArityMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("Undefined property '{0}'")]
    UndefinedProperty(String),

    #[error("Only instances have properties, not {0}")]
    NotAnInstance(&'static str),

    #[error("Superclass must be a class")]
    SuperclassNotClass,

    #[error("Stack overflow: more than {0} nested calls")]
    StackOverflow(usize),

    #[error("{0}")]
    Native(String),
}

/// Disagreements between resolver and interpreter. These are bugs in the
/// interpreter, never the script's fault.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InternalError {
    #[error("scope chain ended before reaching distance {distance} for '{name}'")]
    ScopeChainTooShort { name: String, distance: usize },

    #[error("'{name}' is not bound at distance {distance}")]
    UnboundAtDistance { name: String, distance: usize },

    #[error("'{0}' escaped to top level")]
    SignalEscaped(&'static str),
}

#[derive(Debug, Error)]
pub enum LoxError {
    #[error("Could not read script: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not write output: {0}")]
    Output(std::io::Error),

    #[error("[Line {line}] Scanning Error: {message}")]
    Scan { message: String, line: usize },

    #[error("[Line {line}] Parsing Error: {message}")]
    Parse { message: String, line: usize },

    #[error("[Line {line}] Static Error: {kind}")]
    Static { kind: StaticError, line: usize },

    #[error("[Line {line}] Runtime Error: {kind}")]
    Runtime { kind: RuntimeError, line: usize },

    #[error("Internal Error: {0}")]
    Internal(InternalError),
}

impl LoxError {
    pub fn runtime(kind: RuntimeError, line: usize) -> Self {
        LoxError::Runtime { kind, line }
    }

    /// Source line the error points at, if it has one.
    pub fn line(&self) -> Option<usize> {
        match self {
            LoxError::Scan { line, .. }
            | LoxError::Parse { line, .. }
            | LoxError::Static { line, .. }
            | LoxError::Runtime { line, .. } => Some(*line),
            LoxError::Io(_) | LoxError::Output(_) | LoxError::Internal(_) => None,
        }
    }

    /// True for errors that stop a program before it starts running.
    pub fn is_compile_time(&self) -> bool {
        matches!(
            self,
            LoxError::Scan { .. } | LoxError::Parse { .. } | LoxError::Static { .. }
        )
    }
}

impl From<InternalError> for LoxError {
    fn from(err: InternalError) -> Self {
        LoxError::Internal(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn io_error_converts_to_lox_error() {
        let io_err = Error::new(ErrorKind::NotFound, "file not found");
        let lox_err: LoxError = io_err.into();
        assert!(matches!(lox_err, LoxError::Io(_)));
        assert_eq!(lox_err.line(), None);
    }

    #[test]
    fn output_error_is_not_a_read_failure() {
        let err = LoxError::Output(Error::new(ErrorKind::BrokenPipe, "pipe closed"));
        assert_eq!(err.to_string(), "Could not write output: pipe closed");
        assert_eq!(err.line(), None);
        assert!(!err.is_compile_time());
    }

    #[test]
    fn static_error_has_phase_and_line() {
        let err = LoxError::Static {
            kind: StaticError::SelfReferencingInitializer("a".to_string()),
            line: 3,
        };
        assert_eq!(
            err.to_string(),
            "[Line 3] Static Error: Cannot read local variable 'a' in its own initializer"
        );
    }

    #[test]
    fn runtime_error_has_phase_and_line() {
        let err = LoxError::runtime(RuntimeError::DivisionByZero, 7);
        assert_eq!(err.to_string(), "[Line 7] Runtime Error: Cannot divide by zero");
        assert_eq!(err.line(), Some(7));
    }

    #[test]
    fn arity_mismatch_names_the_callable() {
        let err = RuntimeError::ArityMismatch {
            name: "add".to_string(),
            expected: 2,
            got: 1,
        };
        assert_eq!(err.to_string(), "add expected 2 argument(s) but got 1");
    }

    #[test]
    fn internal_error_is_distinct_from_user_errors() {
        let err: LoxError = InternalError::SignalEscaped("break").into();
        assert_eq!(err.to_string(), "Internal Error: 'break' escaped to top level");
        assert!(!err.is_compile_time());
        assert_eq!(err.line(), None);
    }

    #[test]
    fn parse_error_is_compile_time() {
        let err = LoxError::Parse {
            message: "Expect ';' after value".to_string(),
            line: 1,
        };
        assert!(err.is_compile_time());
    }
}
