//! Определения ошибок для BSC.

use std::fmt;

use thiserror::Error;

use crate::parser::error::ParseError;
use crate::parser::token::Span;

/// Основной тип `Result` для библиотеки.
pub type BsResult<T> = Result<T, BsError>;

/// Перечисление всех возможных ошибок.
#[derive(Error, Debug)]
pub enum BsError {
    #[error("{file}: syntax error: {source}")]
    Syntax { file: String, source: ParseError },

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("required tool '{0}' was not found on PATH")]
    ToolchainUnavailable(String),

    #[error("{tool} failed ({status})\n{output}")]
    ToolchainFailure {
        tool: String,
        status: String,
        output: String,
    },

    #[error("IO error: {0}")]
    Io(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl BsError {
    /// Обернуть ошибку парсера, указав файл.
    pub fn syntax(file: impl Into<String>, source: ParseError) -> Self {
        Self::Syntax {
            file: file.into(),
            source,
        }
    }
}

impl From<std::io::Error> for BsError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Категория ошибки понижения (lowering).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompileErrorKind {
    UndeclaredIdentifier,
    DuplicateDeclaration,
    /// `break`/`continue` вне цикла, `return` вне функции.
    InvalidControlFlow,
    UnsupportedOperator,
    /// Конструкция, для которой у бэкенда нет правила понижения.
    UnsupportedConstruct,
    ArityMismatch,
    ModuleNotFound,
    CircularImport,
    Internal,
}

impl CompileErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UndeclaredIdentifier => "undeclared identifier",
            Self::DuplicateDeclaration => "duplicate declaration",
            Self::InvalidControlFlow => "invalid control flow",
            Self::UnsupportedOperator => "unsupported operator",
            Self::UnsupportedConstruct => "unsupported construct",
            Self::ArityMismatch => "arity mismatch",
            Self::ModuleNotFound => "module not found",
            Self::CircularImport => "circular import",
            Self::Internal => "internal error",
        }
    }
}

impl fmt::Display for CompileErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ошибка компиляции с позицией исходного узла AST.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{file}:{line}:{column}: {kind}: {message}")]
pub struct CompileError {
    pub kind: CompileErrorKind,
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub message: String,
}

impl CompileError {
    /// Создать ошибку для узла с данным span.
    pub fn new(
        kind: CompileErrorKind,
        file: impl Into<String>,
        span: Span,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            file: file.into(),
            line: span.line,
            column: span.column,
            message: message.into(),
        }
    }
}
