//! Токены и позиции для парсера BlockScript.

use serde::{Deserialize, Serialize};

/// Позиция в исходном коде.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    /// Начальная позиция (байт).
    pub start: usize,
    /// Конечная позиция (байт).
    pub end: usize,
    /// Строка начала (с 1).
    pub line: u32,
    /// Колонка начала (с 1).
    pub column: u32,
}

impl Span {
    /// Создать новый Span.
    pub fn new(start: usize, end: usize, line: u32, column: u32) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }

    /// Объединить два Span. Строка и колонка берутся у более раннего.
    pub fn merge(self, other: Span) -> Span {
        let first = if self.start <= other.start { self } else { other };
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            line: first.line,
            column: first.column,
        }
    }
}

/// Токен с позицией.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub value: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(value: T, span: Span) -> Self {
        Self { value, span }
    }
}

/// Ключевые слова языка.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Var,
    Let,
    Const,
    Fn,
    Export,
    Import,
    From,
    If,
    Else,
    While,
    For,
    Break,
    Continue,
    Return,
    Exit,
    Print,
    True,
    False,
}

impl Keyword {
    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Var => "var",
            Keyword::Let => "let",
            Keyword::Const => "const",
            Keyword::Fn => "fn",
            Keyword::Export => "export",
            Keyword::Import => "import",
            Keyword::From => "from",
            Keyword::If => "if",
            Keyword::Else => "else",
            Keyword::While => "while",
            Keyword::For => "for",
            Keyword::Break => "break",
            Keyword::Continue => "continue",
            Keyword::Return => "return",
            Keyword::Exit => "exit",
            Keyword::Print => "print",
            Keyword::True => "true",
            Keyword::False => "false",
        }
    }
}

/// Типы токенов.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Целое число
    Int(i64),
    /// Число с плавающей точкой
    Float(f64),
    /// Строковый литерал (без кавычек, как есть)
    String(String),
    /// Идентификатор
    Ident(String),
    /// Ключевое слово
    Keyword(Keyword),
    /// Пунктуация и операторы (`(`, `+=`, `&&`, ...)
    Punct(&'static str),

    /// Конец файла
    Eof,
}

impl Token {
    /// Проверить, является ли токен данной пунктуацией.
    pub fn is_punct(&self, punct: &str) -> bool {
        matches!(self, Token::Punct(p) if *p == punct)
    }

    /// Проверить, является ли токен данным ключевым словом.
    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        matches!(self, Token::Keyword(k) if *k == keyword)
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Int(n) => write!(f, "{}", n),
            Token::Float(n) => write!(f, "{}", n),
            Token::String(s) => write!(f, "\"{}\"", s),
            Token::Ident(s) => write!(f, "{}", s),
            Token::Keyword(k) => write!(f, "{}", k.as_str()),
            Token::Punct(p) => write!(f, "{}", p),
            Token::Eof => write!(f, "EOF"),
        }
    }
}
