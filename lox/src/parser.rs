use std::rc::Rc;

use crate::ast::{ElifBranch, Expr, ExprId, FunctionDecl, Stmt};
use crate::error::LoxError;
use crate::token::{Literal, Token, TokenType};

const MAX_ARGUMENTS: usize = 255;

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    errors: Vec<LoxError>,
    next_id: ExprId,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self::with_first_id(tokens, 0)
    }

    /// Start numbering expression ids at `first_id`, so that several parses
    /// in one session never hand out the same id twice.
    pub fn with_first_id(tokens: Vec<Token>, first_id: ExprId) -> Self {
        Self {
            tokens,
            current: 0,
            errors: Vec::new(),
            next_id: first_id,
        }
    }

    /// The id the next variable-referencing expression would receive.
    pub fn next_id(&self) -> ExprId {
        self.next_id
    }

    pub fn parse(&mut self) -> Result<Vec<Stmt>, Vec<LoxError>> {
        let mut statements = Vec::new();
        while !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }

        if self.errors.is_empty() {
            Ok(statements)
        } else {
            Err(std::mem::take(&mut self.errors))
        }
    }

    fn fresh_id(&mut self) -> ExprId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn declaration(&mut self) -> Option<Stmt> {
        let result = if self.match_types(&[TokenType::Class]) {
            self.class_declaration()
        } else if self.check(TokenType::Fun) && self.check_next(TokenType::Identifier) {
            self.advance();
            self.function("function").map(Stmt::Function)
        } else if self.match_types(&[TokenType::Var]) {
            self.var_declaration()
        } else {
            self.statement()
        };

        match result {
            Ok(stmt) => Some(stmt),
            Err(e) => {
                self.errors.push(e);
                self.synchronize();
                None
            }
        }
    }

    fn class_declaration(&mut self) -> Result<Stmt, LoxError> {
        let name = self
            .consume(TokenType::Identifier, "Expect class name")?
            .clone();

        let superclass = if self.match_types(&[TokenType::Less]) {
            let superclass_name = self
                .consume(TokenType::Identifier, "Expect superclass name")?
                .clone();
            Some(Expr::Variable {
                id: self.fresh_id(),
                name: superclass_name,
            })
        } else {
            None
        };

        self.consume(TokenType::LeftBrace, "Expect '{' before class body")?;

        let mut methods = Vec::new();
        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            methods.push(self.function("method")?);
        }

        self.consume(TokenType::RightBrace, "Expect '}' after class body")?;

        Ok(Stmt::Class {
            name,
            superclass,
            methods,
        })
    }

    fn function(&mut self, kind: &str) -> Result<Rc<FunctionDecl>, LoxError> {
        let name = self
            .consume(TokenType::Identifier, &format!("Expect {} name", kind))?
            .clone();
        self.consume(
            TokenType::LeftParen,
            &format!("Expect '(' after {} name", kind),
        )?;
        let params = self.parameters()?;
        self.consume(
            TokenType::LeftBrace,
            &format!("Expect '{{' before {} body", kind),
        )?;
        let body = self.block_statements()?;
        Ok(Rc::new(FunctionDecl { name, params, body }))
    }

    /// Parameter list after the opening parenthesis, consuming the closing one.
    fn parameters(&mut self) -> Result<Vec<Token>, LoxError> {
        let mut params = Vec::new();
        if !self.check(TokenType::RightParen) {
            loop {
                if params.len() >= MAX_ARGUMENTS {
                    let line = self.peek().line;
                    self.errors.push(LoxError::Parse {
                        message: format!("Can't have more than {} parameters", MAX_ARGUMENTS),
                        line,
                    });
                }
                params.push(
                    self.consume(TokenType::Identifier, "Expect parameter name")?
                        .clone(),
                );
                if !self.match_types(&[TokenType::Comma]) {
                    break;
                }
            }
        }
        self.consume(TokenType::RightParen, "Expect ')' after parameters")?;
        Ok(params)
    }

    fn var_declaration(&mut self) -> Result<Stmt, LoxError> {
        let name = self
            .consume(TokenType::Identifier, "Expect variable name")?
            .clone();

        let initializer = if self.match_types(&[TokenType::Equal]) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(
            TokenType::Semicolon,
            "Expect ';' after variable declaration",
        )?;
        Ok(Stmt::Var { name, initializer })
    }

    fn statement(&mut self) -> Result<Stmt, LoxError> {
        if self.match_types(&[TokenType::Break]) {
            let keyword = self.previous().clone();
            self.consume(TokenType::Semicolon, "Expect ';' after 'break'")?;
            Ok(Stmt::Break { keyword })
        } else if self.match_types(&[TokenType::Continue]) {
            let keyword = self.previous().clone();
            self.consume(TokenType::Semicolon, "Expect ';' after 'continue'")?;
            Ok(Stmt::Continue { keyword })
        } else if self.match_types(&[TokenType::For]) {
            self.for_statement()
        } else if self.match_types(&[TokenType::If]) {
            self.if_statement()
        } else if self.match_types(&[TokenType::Print]) {
            self.print_statement()
        } else if self.match_types(&[TokenType::Return]) {
            self.return_statement()
        } else if self.match_types(&[TokenType::While]) {
            self.while_statement()
        } else if self.match_types(&[TokenType::LeftBrace]) {
            Ok(Stmt::Block {
                statements: self.block_statements()?,
            })
        } else {
            self.expression_statement()
        }
    }

    fn for_statement(&mut self) -> Result<Stmt, LoxError> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'for'")?;

        let initializer = if self.match_types(&[TokenType::Semicolon]) {
            None
        } else if self.match_types(&[TokenType::Var]) {
            Some(Box::new(self.var_declaration()?))
        } else {
            Some(Box::new(self.expression_statement()?))
        };

        let condition = if self.check(TokenType::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenType::Semicolon, "Expect ';' after loop condition")?;

        let increment = if self.check(TokenType::RightParen) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenType::RightParen, "Expect ')' after for clauses")?;

        let body = Box::new(self.statement()?);

        Ok(Stmt::For {
            initializer,
            condition,
            increment,
            body,
        })
    }

    fn if_statement(&mut self) -> Result<Stmt, LoxError> {
        let condition = self.parenthesized_condition("if")?;
        let then_branch = Box::new(self.statement()?);

        let mut elif_branches = Vec::new();
        while self.match_types(&[TokenType::Elif]) {
            let condition = self.parenthesized_condition("elif")?;
            let body = self.statement()?;
            elif_branches.push(ElifBranch { condition, body });
        }

        let else_branch = if self.match_types(&[TokenType::Else]) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            elif_branches,
            else_branch,
        })
    }

    fn parenthesized_condition(&mut self, keyword: &str) -> Result<Expr, LoxError> {
        self.consume(
            TokenType::LeftParen,
            &format!("Expect '(' after '{}'", keyword),
        )?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after condition")?;
        Ok(condition)
    }

    fn print_statement(&mut self) -> Result<Stmt, LoxError> {
        if self.match_types(&[TokenType::Semicolon]) {
            return Ok(Stmt::Print { expression: None });
        }
        let expression = self.expression()?;
        self.consume(TokenType::Semicolon, "Expect ';' after value")?;
        Ok(Stmt::Print {
            expression: Some(expression),
        })
    }

    fn return_statement(&mut self) -> Result<Stmt, LoxError> {
        let keyword = self.previous().clone();
        let value = if self.check(TokenType::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenType::Semicolon, "Expect ';' after return value")?;
        Ok(Stmt::Return { keyword, value })
    }

    fn while_statement(&mut self) -> Result<Stmt, LoxError> {
        let condition = self.parenthesized_condition("while")?;
        let body = Box::new(self.statement()?);
        Ok(Stmt::While { condition, body })
    }

    /// Statements up to and including the closing brace.
    fn block_statements(&mut self) -> Result<Vec<Stmt>, LoxError> {
        let mut statements = Vec::new();
        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }
        self.consume(TokenType::RightBrace, "Expect '}' after block")?;
        Ok(statements)
    }

    fn expression_statement(&mut self) -> Result<Stmt, LoxError> {
        let expression = self.expression()?;
        self.consume(TokenType::Semicolon, "Expect ';' after expression")?;
        Ok(Stmt::Expression { expression })
    }

    fn expression(&mut self) -> Result<Expr, LoxError> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr, LoxError> {
        let expr = self.or()?;

        if self.match_types(&[TokenType::Equal]) {
            let equals = self.previous().clone();
            let value = Box::new(self.assignment()?);

            return match expr {
                Expr::Variable { id, name } => Ok(Expr::Assign { id, name, value }),
                Expr::Get { object, name } => Ok(Expr::Set {
                    object,
                    name,
                    value,
                }),
                other => {
                    // Report without unwinding; the parser is not confused.
                    self.errors.push(LoxError::Parse {
                        message: "Invalid assignment target".to_string(),
                        line: equals.line,
                    });
                    Ok(other)
                }
            };
        }

        Ok(expr)
    }

    fn or(&mut self) -> Result<Expr, LoxError> {
        let mut expr = self.and()?;
        while self.match_types(&[TokenType::Or]) {
            let operator = self.previous().clone();
            let right = self.and()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn and(&mut self) -> Result<Expr, LoxError> {
        let mut expr = self.equality()?;
        while self.match_types(&[TokenType::And]) {
            let operator = self.previous().clone();
            let right = self.equality()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn binary_level(
        &mut self,
        operators: &[TokenType],
        next: fn(&mut Self) -> Result<Expr, LoxError>,
    ) -> Result<Expr, LoxError> {
        let mut expr = next(self)?;
        while self.match_types(operators) {
            let operator = self.previous().clone();
            let right = next(self)?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr, LoxError> {
        self.binary_level(
            &[TokenType::BangEqual, TokenType::EqualEqual],
            Self::comparison,
        )
    }

    fn comparison(&mut self) -> Result<Expr, LoxError> {
        self.binary_level(
            &[
                TokenType::Greater,
                TokenType::GreaterEqual,
                TokenType::Less,
                TokenType::LessEqual,
            ],
            Self::term,
        )
    }

    fn term(&mut self) -> Result<Expr, LoxError> {
        self.binary_level(&[TokenType::Minus, TokenType::Plus], Self::factor)
    }

    fn factor(&mut self) -> Result<Expr, LoxError> {
        self.binary_level(&[TokenType::Slash, TokenType::Star], Self::unary)
    }

    fn unary(&mut self) -> Result<Expr, LoxError> {
        if self.match_types(&[TokenType::Bang, TokenType::Minus]) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            return Ok(Expr::Unary {
                operator,
                right: Box::new(right),
            });
        }

        if self.match_types(&[TokenType::PlusPlus, TokenType::MinusMinus]) {
            let operator = self.previous().clone();
            let name = self
                .consume(
                    TokenType::Identifier,
                    &format!("Expect variable name after '{}'", operator.lexeme),
                )?
                .clone();
            return Ok(Expr::Update {
                id: self.fresh_id(),
                name,
                operator,
                prefix: true,
            });
        }

        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, LoxError> {
        let expr = self.call()?;

        if self.match_types(&[TokenType::PlusPlus, TokenType::MinusMinus]) {
            let operator = self.previous().clone();
            return match expr {
                Expr::Variable { id, name } => Ok(Expr::Update {
                    id,
                    name,
                    operator,
                    prefix: false,
                }),
                other => {
                    self.errors.push(LoxError::Parse {
                        message: format!("Invalid operand for '{}'", operator.lexeme),
                        line: operator.line,
                    });
                    Ok(other)
                }
            };
        }

        Ok(expr)
    }

    fn call(&mut self) -> Result<Expr, LoxError> {
        let mut expr = self.primary()?;

        loop {
            if self.match_types(&[TokenType::LeftParen]) {
                expr = self.finish_call(expr)?;
            } else if self.match_types(&[TokenType::Dot]) {
                let name = self
                    .consume(TokenType::Identifier, "Expect property name after '.'")?
                    .clone();
                expr = Expr::Get {
                    object: Box::new(expr),
                    name,
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr, LoxError> {
        let mut arguments = Vec::new();
        if !self.check(TokenType::RightParen) {
            loop {
                if arguments.len() >= MAX_ARGUMENTS {
                    let line = self.peek().line;
                    self.errors.push(LoxError::Parse {
                        message: format!("Can't have more than {} arguments", MAX_ARGUMENTS),
                        line,
                    });
                }
                arguments.push(self.expression()?);
                if !self.match_types(&[TokenType::Comma]) {
                    break;
                }
            }
        }

        let paren = self
            .consume(TokenType::RightParen, "Expect ')' after arguments")?
            .clone();

        Ok(Expr::Call {
            callee: Box::new(callee),
            paren,
            arguments,
        })
    }

    fn primary(&mut self) -> Result<Expr, LoxError> {
        if self.match_types(&[TokenType::False, TokenType::True, TokenType::Nil]) {
            let value = self.previous().literal.clone().unwrap_or(Literal::Nil);
            return Ok(Expr::Literal { value });
        }

        if self.match_types(&[TokenType::Number, TokenType::String]) {
            let value = self.previous().literal.clone().unwrap_or(Literal::Nil);
            return Ok(Expr::Literal { value });
        }

        if self.match_types(&[TokenType::This]) {
            return Ok(Expr::This {
                id: self.fresh_id(),
                keyword: self.previous().clone(),
            });
        }

        if self.match_types(&[TokenType::Identifier]) {
            return Ok(Expr::Variable {
                id: self.fresh_id(),
                name: self.previous().clone(),
            });
        }

        if self.match_types(&[TokenType::Fun]) {
            let keyword = self.previous().clone();
            self.consume(TokenType::LeftParen, "Expect '(' after 'fun'")?;
            let params = self.parameters()?;
            self.consume(TokenType::LeftBrace, "Expect '{' before lambda body")?;
            let body = self.block_statements()?;
            return Ok(Expr::Lambda {
                declaration: Rc::new(FunctionDecl {
                    name: keyword,
                    params,
                    body,
                }),
            });
        }

        if self.match_types(&[TokenType::LeftParen]) {
            let expression = self.expression()?;
            self.consume(TokenType::RightParen, "Expect ')' after expression")?;
            return Ok(Expr::Grouping {
                expression: Box::new(expression),
            });
        }

        let token = self.peek();
        let at = if token.token_type == TokenType::Eof {
            "end".to_string()
        } else {
            format!("'{}'", token.lexeme)
        };
        Err(LoxError::Parse {
            message: format!("Expect expression at {}", at),
            line: token.line,
        })
    }

    fn match_types(&mut self, types: &[TokenType]) -> bool {
        if types.iter().any(|t| self.check(*t)) {
            self.advance();
            return true;
        }
        false
    }

    fn consume(&mut self, token_type: TokenType, message: &str) -> Result<&Token, LoxError> {
        if self.check(token_type) {
            return Ok(self.advance());
        }
        Err(LoxError::Parse {
            message: message.to_string(),
            line: self.peek().line,
        })
    }

    /// Discard tokens until a likely statement boundary.
    fn synchronize(&mut self) {
        self.advance();

        while !self.is_at_end() {
            if self.previous().token_type == TokenType::Semicolon {
                return;
            }

            match self.peek().token_type {
                TokenType::Class
                | TokenType::Fun
                | TokenType::Var
                | TokenType::For
                | TokenType::If
                | TokenType::While
                | TokenType::Print
                | TokenType::Return
                | TokenType::Break
                | TokenType::Continue => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn check(&self, token_type: TokenType) -> bool {
        !self.is_at_end() && self.peek().token_type == token_type
    }

    fn check_next(&self, token_type: TokenType) -> bool {
        self.tokens
            .get(self.current + 1)
            .is_some_and(|t| t.token_type == token_type)
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.tokens.len() || self.peek().token_type == TokenType::Eof
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }
}
