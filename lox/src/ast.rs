use std::fmt;
use std::rc::Rc;

use crate::token::{Literal, Token};

/// Identity of a variable-referencing expression. The resolver keys its
/// distances by this id; the parser hands out ids that are unique for the
/// whole session.
pub type ExprId = usize;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal {
        value: Literal,
    },
    Grouping {
        expression: Box<Expr>,
    },
    Variable {
        id: ExprId,
        name: Token,
    },
    Assign {
        id: ExprId,
        name: Token,
        value: Box<Expr>,
    },
    Unary {
        operator: Token,
        right: Box<Expr>,
    },
    Binary {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },
    Logical {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        paren: Token,
        arguments: Vec<Expr>,
    },
    Get {
        object: Box<Expr>,
        name: Token,
    },
    Set {
        object: Box<Expr>,
        name: Token,
        value: Box<Expr>,
    },
    Lambda {
        declaration: Rc<FunctionDecl>,
    },
    This {
        id: ExprId,
        keyword: Token,
    },
    /// `++x`, `x++`, `--x` and `x--`. `operator` is `PlusPlus` or `MinusMinus`.
    Update {
        id: ExprId,
        name: Token,
        operator: Token,
        prefix: bool,
    },
}

/// Shared by named functions, methods and lambdas. For a lambda `name` is
/// the `fun` keyword token.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: Token,
    pub params: Vec<Token>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElifBranch {
    pub condition: Expr,
    pub body: Stmt,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expression {
        expression: Expr,
    },
    Print {
        expression: Option<Expr>,
    },
    Var {
        name: Token,
        initializer: Option<Expr>,
    },
    Block {
        statements: Vec<Stmt>,
    },
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        elif_branches: Vec<ElifBranch>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        condition: Expr,
        body: Box<Stmt>,
    },
    For {
        initializer: Option<Box<Stmt>>,
        condition: Option<Expr>,
        increment: Option<Expr>,
        body: Box<Stmt>,
    },
    Break {
        keyword: Token,
    },
    Continue {
        keyword: Token,
    },
    Function(Rc<FunctionDecl>),
    Return {
        keyword: Token,
        value: Option<Expr>,
    },
    Class {
        name: Token,
        superclass: Option<Expr>,
        methods: Vec<Rc<FunctionDecl>>,
    },
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal { value } => match value {
                Literal::String(s) => write!(f, "\"{}\"", s),
                other => write!(f, "{}", other),
            },
            Expr::Grouping { expression } => write!(f, "(group {})", expression),
            Expr::Variable { name, .. } => write!(f, "{}", name.lexeme),
            Expr::Assign { name, value, .. } => write!(f, "(= {} {})", name.lexeme, value),
            Expr::Unary { operator, right } => write!(f, "({} {})", operator.lexeme, right),
            Expr::Binary {
                left,
                operator,
                right,
            }
            | Expr::Logical {
                left,
                operator,
                right,
            } => write!(f, "({} {} {})", operator.lexeme, left, right),
            Expr::Call {
                callee, arguments, ..
            } => {
                write!(f, "(call {}", callee)?;
                for arg in arguments {
                    write!(f, " {}", arg)?;
                }
                write!(f, ")")
            }
            Expr::Get { object, name } => write!(f, "(. {} {})", object, name.lexeme),
            Expr::Set {
                object,
                name,
                value,
            } => write!(f, "(.= {} {} {})", object, name.lexeme, value),
            Expr::Lambda { declaration } => {
                let params: Vec<&str> = declaration
                    .params
                    .iter()
                    .map(|p| p.lexeme.as_str())
                    .collect();
                write!(f, "(lambda ({}))", params.join(" "))
            }
            Expr::This { .. } => write!(f, "this"),
            Expr::Update {
                name,
                operator,
                prefix,
                ..
            } => {
                if *prefix {
                    write!(f, "({}pre {})", operator.lexeme, name.lexeme)
                } else {
                    write!(f, "({}post {})", operator.lexeme, name.lexeme)
                }
            }
        }
    }
}
