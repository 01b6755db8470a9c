//! Парсер BlockScript (рекурсивный спуск).

use crate::ast::{
    Assignment, BinaryOp, Block, Call, Expr, ExprKind, ForStmt, FunctionDecl, IfStmt, Import,
    Literal, Param, PrimitiveType, Program, Stmt, StmtKind, UnaryOp, VarDecl, WhileStmt,
};

use super::error::ParseError;
use super::lexer::Lexer;
use super::token::{Keyword, Span, Spanned, Token};

/// Уровни приоритета бинарных операторов, от низшего к высшему.
const PRECEDENCE: &[&[&str]] = &[
    &["||"],
    &["&&"],
    &["|"],
    &["&"],
    &["==", "!="],
    &["<", ">", "<=", ">="],
    &["+", "-"],
    &["*", "/", "%"],
];

/// Составные операторы присваивания и соответствующие бинарные операции.
const COMPOUND_ASSIGN: &[(&str, BinaryOp)] = &[
    ("+=", BinaryOp::Add),
    ("-=", BinaryOp::Sub),
    ("*=", BinaryOp::Mul),
    ("/=", BinaryOp::Div),
    ("|=", BinaryOp::BitOr),
    ("&=", BinaryOp::BitAnd),
];

/// Парсер BlockScript.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    /// Span последнего потреблённого токена.
    prev_span: Span,
}

impl<'a> Parser<'a> {
    /// Создать новый парсер.
    pub fn new(source: &'a str) -> Self {
        Self {
            lexer: Lexer::new(source),
            prev_span: Span::default(),
        }
    }

    /// Разобрать весь файл.
    pub fn parse_program(&mut self, file: &str) -> Result<Program, ParseError> {
        let mut statements = Vec::new();
        while !self.at_eof()? {
            statements.push(self.parse_stmt()?);
        }
        Ok(Program {
            file: file.to_string(),
            statements,
        })
    }

    fn peek(&mut self) -> Result<&Spanned<Token>, ParseError> {
        self.lexer.peek_token()
    }

    fn advance(&mut self) -> Result<Spanned<Token>, ParseError> {
        let token = self.lexer.next_token()?;
        self.prev_span = token.span;
        Ok(token)
    }

    fn at_eof(&mut self) -> Result<bool, ParseError> {
        Ok(self.peek()?.value == Token::Eof)
    }

    fn check_punct(&mut self, punct: &str) -> Result<bool, ParseError> {
        Ok(self.peek()?.value.is_punct(punct))
    }

    fn check_keyword(&mut self, keyword: Keyword) -> Result<bool, ParseError> {
        Ok(self.peek()?.value.is_keyword(keyword))
    }

    /// Потребить пунктуацию, если она следующая.
    fn eat_punct(&mut self, punct: &str) -> Result<bool, ParseError> {
        if self.check_punct(punct)? {
            self.advance()?;
            return Ok(true);
        }
        Ok(false)
    }

    fn expect_punct(&mut self, punct: &str) -> Result<Span, ParseError> {
        let token = self.advance()?;
        if token.value.is_punct(punct) {
            Ok(token.span)
        } else {
            Err(ParseError::unexpected_token(
                token.span,
                format!("'{}'", punct),
                &token.value,
            ))
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Result<Span, ParseError> {
        let token = self.advance()?;
        if token.value.is_keyword(keyword) {
            Ok(token.span)
        } else {
            Err(ParseError::unexpected_token(
                token.span,
                format!("'{}'", keyword.as_str()),
                &token.value,
            ))
        }
    }

    fn expect_ident(&mut self) -> Result<(String, Span), ParseError> {
        let token = self.advance()?;
        match token.value {
            Token::Ident(name) => Ok((name, token.span)),
            other => Err(ParseError::unexpected_token(token.span, "identifier", &other)),
        }
    }

    fn parse_type(&mut self) -> Result<PrimitiveType, ParseError> {
        let (name, span) = self.expect_ident()?;
        PrimitiveType::from_name(&name).ok_or(ParseError::UnknownType { span, name })
    }

    fn stmt(&self, kind: StmtKind, start: Span) -> Stmt {
        Stmt {
            kind,
            span: start.merge(self.prev_span),
        }
    }

    // ========== Инструкции ==========

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        stacker::maybe_grow(256 * 1024, 8 * 1024 * 1024, || self.parse_stmt_inner())
    }

    fn parse_stmt_inner(&mut self) -> Result<Stmt, ParseError> {
        let token = self.peek()?.clone();
        let start = token.span;
        match token.value {
            Token::Keyword(Keyword::Var | Keyword::Let | Keyword::Const) => {
                let decl = self.parse_var_decl()?;
                self.expect_punct(";")?;
                Ok(self.stmt(decl, start))
            }
            Token::Keyword(Keyword::Fn | Keyword::Export) => self.parse_function(),
            Token::Keyword(Keyword::Import) => self.parse_import(),
            Token::Keyword(Keyword::If) => self.parse_if(),
            Token::Keyword(Keyword::While) => {
                self.advance()?;
                self.expect_punct("(")?;
                let test = self.parse_expr()?;
                self.expect_punct(")")?;
                let body = self.parse_block()?;
                Ok(self.stmt(StmtKind::While(WhileStmt { test, body }), start))
            }
            Token::Keyword(Keyword::For) => self.parse_for(),
            Token::Keyword(Keyword::Break) => {
                self.advance()?;
                self.expect_punct(";")?;
                Ok(self.stmt(StmtKind::Break, start))
            }
            Token::Keyword(Keyword::Continue) => {
                self.advance()?;
                self.expect_punct(";")?;
                Ok(self.stmt(StmtKind::Continue, start))
            }
            Token::Keyword(Keyword::Return) => {
                self.advance()?;
                let value = if self.check_punct(";")? {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect_punct(";")?;
                Ok(self.stmt(StmtKind::Return(value), start))
            }
            Token::Keyword(Keyword::Exit) => {
                let value = self.parse_builtin_arg()?;
                Ok(self.stmt(StmtKind::Exit(value), start))
            }
            Token::Keyword(Keyword::Print) => {
                let value = self.parse_builtin_arg()?;
                Ok(self.stmt(StmtKind::Print(value), start))
            }
            Token::Punct("{") => {
                let block = self.parse_block()?;
                Ok(self.stmt(StmtKind::Block(block), start))
            }
            Token::Ident(_) => {
                let (name, span) = self.expect_ident()?;
                let kind = if self.check_punct("(")? {
                    StmtKind::Call(self.parse_call_args(name)?)
                } else {
                    self.parse_assignment_rest(name, span)?
                };
                self.expect_punct(";")?;
                Ok(self.stmt(kind, start))
            }
            other => Err(ParseError::unexpected_token(start, "statement", &other)),
        }
    }

    /// `exit(expr);` и `print(expr);`
    fn parse_builtin_arg(&mut self) -> Result<Expr, ParseError> {
        self.advance()?;
        self.expect_punct("(")?;
        let value = self.parse_expr()?;
        self.expect_punct(")")?;
        self.expect_punct(";")?;
        Ok(value)
    }

    fn parse_var_decl(&mut self) -> Result<StmtKind, ParseError> {
        self.advance()?;
        let (name, _) = self.expect_ident()?;
        let ty = if self.eat_punct(":")? {
            Some(self.parse_type()?)
        } else {
            None
        };
        let init = if self.eat_punct("=")? {
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(StmtKind::VarDecl(VarDecl { name, ty, init }))
    }

    /// Присваивание после уже прочитанного идентификатора.
    /// `x += e` разворачивается в `x = x + e`.
    fn parse_assignment_rest(&mut self, name: String, span: Span) -> Result<StmtKind, ParseError> {
        let token = self.advance()?;
        if token.value.is_punct("=") {
            let value = self.parse_expr()?;
            return Ok(StmtKind::Assign(Assignment { name, value }));
        }
        let op = COMPOUND_ASSIGN
            .iter()
            .find(|(symbol, _)| token.value.is_punct(symbol))
            .map(|(_, op)| *op)
            .ok_or_else(|| ParseError::unexpected_token(token.span, "assignment", &token.value))?;
        let rhs = self.parse_expr()?;
        let value = Expr::new(
            ExprKind::Binary {
                op,
                lhs: Box::new(Expr::new(ExprKind::Variable(name.clone()), span)),
                rhs: Box::new(rhs),
            },
            span.merge(self.prev_span),
        );
        Ok(StmtKind::Assign(Assignment { name, value }))
    }

    fn parse_function(&mut self) -> Result<Stmt, ParseError> {
        let start = self.peek()?.span;
        let exported = self.check_keyword(Keyword::Export)?;
        if exported {
            self.advance()?;
        }
        self.expect_keyword(Keyword::Fn)?;
        let (name, _) = self.expect_ident()?;
        self.expect_punct("(")?;
        let mut params = Vec::new();
        if !self.check_punct(")")? {
            loop {
                let (param, span) = self.expect_ident()?;
                self.expect_punct(":")?;
                let ty = self.parse_type()?;
                params.push(Param {
                    name: param,
                    ty,
                    span: span.merge(self.prev_span),
                });
                if !self.eat_punct(",")? {
                    break;
                }
            }
        }
        self.expect_punct(")")?;
        let return_type = if self.eat_punct(":")? {
            self.parse_type()?
        } else {
            PrimitiveType::Void
        };
        let body = self.parse_block()?;
        Ok(self.stmt(
            StmtKind::Function(FunctionDecl {
                name,
                params,
                return_type,
                body,
                exported,
            }),
            start,
        ))
    }

    fn parse_import(&mut self) -> Result<Stmt, ParseError> {
        let start = self.expect_keyword(Keyword::Import)?;
        self.expect_punct("{")?;
        let mut symbols = vec![self.expect_ident()?.0];
        while self.eat_punct(",")? {
            symbols.push(self.expect_ident()?.0);
        }
        self.expect_punct("}")?;
        self.expect_keyword(Keyword::From)?;
        let token = self.advance()?;
        let path = match token.value {
            Token::String(path) => path,
            other => return Err(ParseError::unexpected_token(token.span, "module path", &other)),
        };
        self.eat_punct(";")?;
        Ok(self.stmt(StmtKind::Import(Import { symbols, path }), start))
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        let start = self.expect_keyword(Keyword::If)?;
        self.expect_punct("(")?;
        let test = self.parse_expr()?;
        self.expect_punct(")")?;
        let consequent = self.parse_block()?;
        let alternate = if self.check_keyword(Keyword::Else)? {
            self.advance()?;
            if self.check_keyword(Keyword::If)? {
                let nested = self.parse_if()?;
                let span = nested.span;
                Some(Block {
                    statements: vec![nested],
                    span,
                })
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };
        Ok(self.stmt(
            StmtKind::If(IfStmt {
                test,
                consequent,
                alternate,
            }),
            start,
        ))
    }

    fn parse_for(&mut self) -> Result<Stmt, ParseError> {
        let start = self.expect_keyword(Keyword::For)?;
        self.expect_punct("(")?;

        let init = if self.check_punct(";")? {
            None
        } else {
            let init_start = self.peek()?.span;
            let kind = if self.check_keyword(Keyword::Var)?
                || self.check_keyword(Keyword::Let)?
                || self.check_keyword(Keyword::Const)?
            {
                self.parse_var_decl()?
            } else {
                let (name, span) = self.expect_ident()?;
                self.parse_assignment_rest(name, span)?
            };
            Some(Box::new(self.stmt(kind, init_start)))
        };
        self.expect_punct(";")?;

        let test = if self.check_punct(";")? {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect_punct(";")?;

        let update = if self.check_punct(")")? {
            None
        } else {
            let update_start = self.peek()?.span;
            let (name, span) = self.expect_ident()?;
            let kind = self.parse_assignment_rest(name, span)?;
            Some(Box::new(self.stmt(kind, update_start)))
        };
        self.expect_punct(")")?;

        let body = self.parse_block()?;
        Ok(self.stmt(
            StmtKind::For(ForStmt {
                init,
                test,
                update,
                body,
            }),
            start,
        ))
    }

    fn parse_block(&mut self) -> Result<Block, ParseError> {
        let start = self.expect_punct("{")?;
        let mut statements = Vec::new();
        while !self.check_punct("}")? {
            if self.at_eof()? {
                let span = self.peek()?.span;
                return Err(ParseError::UnexpectedEof {
                    span,
                    message: "expected '}'".to_string(),
                });
            }
            statements.push(self.parse_stmt()?);
        }
        let end = self.expect_punct("}")?;
        Ok(Block {
            statements,
            span: start.merge(end),
        })
    }

    // ========== Выражения ==========

    /// Разобрать выражение.
    pub fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        stacker::maybe_grow(256 * 1024, 8 * 1024 * 1024, || self.parse_binary(0))
    }

    fn parse_binary(&mut self, level: usize) -> Result<Expr, ParseError> {
        let Some(ops) = PRECEDENCE.get(level) else {
            return self.parse_unary();
        };
        let mut lhs = self.parse_binary(level + 1)?;
        loop {
            let op = match &self.peek()?.value {
                Token::Punct(p) if ops.contains(p) => BinaryOp::from_symbol(p),
                _ => None,
            };
            let Some(op) = op else { break };
            self.advance()?;
            let rhs = self.parse_binary(level + 1)?;
            let span = lhs.span.merge(rhs.span);
            lhs = Expr::new(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            );
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let token = self.peek()?.clone();
        let op = match token.value {
            Token::Punct("-") => UnaryOp::Neg,
            Token::Punct("!") => UnaryOp::Not,
            _ => return self.parse_primary(),
        };
        self.advance()?;
        let operand = stacker::maybe_grow(256 * 1024, 8 * 1024 * 1024, || self.parse_unary())?;
        let span = token.span.merge(operand.span);
        Ok(Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.advance()?;
        let span = token.span;
        let kind = match token.value {
            Token::Int(n) => ExprKind::Literal(Literal::Int(n)),
            Token::Float(f) => ExprKind::Literal(Literal::Float(f)),
            Token::String(s) => ExprKind::Literal(Literal::String(s)),
            Token::Keyword(Keyword::True) => ExprKind::Literal(Literal::Bool(true)),
            Token::Keyword(Keyword::False) => ExprKind::Literal(Literal::Bool(false)),
            Token::Ident(name) => {
                if self.check_punct("(")? {
                    ExprKind::Call(self.parse_call_args(name)?)
                } else {
                    ExprKind::Variable(name)
                }
            }
            Token::Punct("(") => {
                let inner = self.parse_expr()?;
                let end = self.expect_punct(")")?;
                return Ok(Expr::new(inner.kind, span.merge(end)));
            }
            other => return Err(ParseError::unexpected_token(span, "expression", &other)),
        };
        Ok(Expr::new(kind, span.merge(self.prev_span)))
    }

    /// Аргументы вызова: `( expr, ... )`.
    fn parse_call_args(&mut self, name: String) -> Result<Call, ParseError> {
        self.expect_punct("(")?;
        let mut args = Vec::new();
        if !self.check_punct(")")? {
            loop {
                args.push(self.parse_expr()?);
                if !self.eat_punct(",")? {
                    break;
                }
            }
        }
        self.expect_punct(")")?;
        Ok(Call { name, args })
    }
}
