//! Система модулей BlockScript.
//!
//! ## Синтаксис
//!
//! ```text
//! // math.bs: модуль содержит только объявления
//! export fn square(n: int32): int32 { return n * n; }
//!
//! // main.bs
//! import { square } from "math";
//! exit(square(7));
//! ```
//!
//! Путь ищется сначала в корне библиотеки, затем в каталоге входного
//! файла; расширение `.bs` добавляется, если его нет.

mod linker;
mod resolver;

pub use linker::ModuleLinker;
pub use resolver::{ModuleResolver, DEFAULT_EXTENSION};

use std::collections::HashMap;

/// Сигнатура функции, видимая вызывающему коду.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub params: usize,
    pub returns_value: bool,
}

/// Функции, которые модуль предоставляет импортирующим.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleInterface {
    pub functions: HashMap<String, Signature>,
}
