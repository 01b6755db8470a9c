//! Ошибки парсера.

use super::token::{Span, Token};
use thiserror::Error;

/// Ошибка парсинга.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Неожиданный токен.
    #[error("{}:{}: expected {expected}, found '{found}'", span.line, span.column)]
    UnexpectedToken {
        span: Span,
        expected: String,
        found: String,
    },

    /// Неожиданный конец ввода.
    #[error("{}:{}: unexpected end of input: {message}", span.line, span.column)]
    UnexpectedEof { span: Span, message: String },

    /// Неверный литерал.
    #[error("{}:{}: invalid literal: {message}", span.line, span.column)]
    InvalidLiteral { span: Span, message: String },

    /// Ошибка лексера.
    #[error("{}:{}: unexpected character", span.line, span.column)]
    LexerError { span: Span },

    /// Неизвестный тип.
    #[error("{}:{}: unknown type '{name}'", span.line, span.column)]
    UnknownType { span: Span, name: String },
}

impl ParseError {
    /// Создать ошибку "неожиданный токен".
    pub fn unexpected_token(span: Span, expected: impl Into<String>, found: &Token) -> Self {
        if matches!(found, Token::Eof) {
            return Self::UnexpectedEof {
                span,
                message: format!("expected {}", expected.into()),
            };
        }
        Self::UnexpectedToken {
            span,
            expected: expected.into(),
            found: found.to_string(),
        }
    }

    /// Получить позицию ошибки.
    pub fn span(&self) -> Span {
        match self {
            Self::UnexpectedToken { span, .. } => *span,
            Self::UnexpectedEof { span, .. } => *span,
            Self::InvalidLiteral { span, .. } => *span,
            Self::LexerError { span } => *span,
            Self::UnknownType { span, .. } => *span,
        }
    }
}
