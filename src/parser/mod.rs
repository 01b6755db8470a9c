//! Парсер исходного кода BlockScript.
//!
//! # Синтаксис
//!
//! ```text
//! // Переменные
//! var x: int32 = 10;
//! let y = x * 2;
//! x += 1;
//!
//! // Управление
//! if (x > 5) { print(x); } else { exit(1); }
//! while (x < 100) { x = x * 2; }
//! for (var i = 0; i < 10; i += 1) { if (i == 5) { break; } }
//!
//! // Функции и модули
//! import { add } from "math";
//! export fn square(n: int64): int64 { return n * n; }
//! exit(square(3));
//! ```
//!
//! # Пример
//!
//! ```rust
//! use bsc::parser::parse;
//!
//! let program = parse("exit(69);", "main.bs").unwrap();
//! assert_eq!(program.statements.len(), 1);
//! ```

pub mod error;
pub mod lexer;
pub mod parser;
pub mod token;

pub use error::ParseError;
pub use lexer::Lexer;
pub use parser::Parser;
pub use token::{Span, Spanned, Token};

use log::debug;

use crate::ast::Program;
use crate::error::{BsError, BsResult};

/// Разобрать исходный файл в AST.
///
/// `file` используется только для диагностики.
pub fn parse(source: &str, file: &str) -> BsResult<Program> {
    debug!("parsing {}", file);
    let program = Parser::new(source)
        .parse_program(file)
        .map_err(|e| BsError::syntax(file, e))?;
    debug!("parsed {}: {} statements", file, program.statements.len());
    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reports_file() {
        let err = parse("exit(;", "broken.bs").unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("broken.bs: syntax error: 1:6"), "{}", message);
    }

    #[test]
    fn test_parse_program() {
        let program = parse("var a = 10; var b = 14; exit(a + b);", "sum.bs").unwrap();
        assert_eq!(program.file, "sum.bs");
        assert_eq!(program.statements.len(), 3);
    }
}
