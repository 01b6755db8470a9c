//! # BlockScript Compiler
//!
//! Компилятор языка BlockScript (`.bs`) с двумя бэкендами.
//!
//! ## Основные модули
//!
//! - [`parser`] - лексер на logos и парсер с рекурсивным спуском
//! - [`ast`] - AST: инструкции и выражения
//! - [`native_backend`] - генерация NASM для x86-64 Linux
//! - [`native`] - распределитель стековых кадров и встроенные подпрограммы
//! - [`ssa_backend`] - построение SSA IR для QBE
//! - [`ssa`] - модель IR и её печать
//! - [`modules`] - разрешение и компоновка импортов
//! - [`compiler`] - конвейер сборки и вызов внешних инструментов
//! - [`project`] - настройки `project.json`
//!
//! ## Пример
//!
//! ```rust
//! use bsc::compiler::{compile_source, Backend, CompileOptions};
//!
//! let options = CompileOptions {
//!     backend: Backend::Ssa,
//!     ..CompileOptions::default()
//! };
//! let artifact = compile_source("exit(40 + 2);", "main.bs", &options).unwrap();
//! assert!(artifact.text.contains("export function w $main()"));
//! ```

// === Фронтенд ===
pub mod ast;
pub mod error;
pub mod parser;

// === Бэкенды ===
pub mod native;
pub mod native_backend;
pub mod ssa;
pub mod ssa_backend;

// === Сборка ===
pub mod compiler;
pub mod modules;
pub mod project;
pub mod toolchain;

// === Re-exports для удобства ===
pub use ast::Program;
pub use compiler::{compile_file, compile_source, Backend, CompileOptions};
pub use error::{BsError, BsResult, CompileError, CompileErrorKind};
pub use native_backend::NativeGenerator;
pub use parser::parse;
pub use ssa_backend::IrBuilder;
