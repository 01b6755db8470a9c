//! Распределитель стековых кадров для x86-64.
//!
//! Отслеживает логическую глубину стека операндов (`stack_size`) и
//! вычисляет смещения переменных относительно `rbp` текущего кадра.
//! Локальные переменные лежат по отрицательным смещениям, параметры
//! (и переменные внешних кадров) по положительным.

use std::collections::HashMap;
use std::fmt::Write;

use thiserror::Error;

use crate::error::CompileErrorKind;

/// Размер машинного слова в байтах.
pub const WORD: i64 = 8;

/// Ошибки распределителя.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("'{0}' is already declared in this scope")]
    DuplicateDeclaration(String),

    #[error("'{0}' is not declared")]
    UndeclaredIdentifier(String),

    #[error("no active stack frame")]
    NoActiveFrame,
}

impl FrameError {
    pub fn kind(&self) -> CompileErrorKind {
        match self {
            Self::DuplicateDeclaration(_) => CompileErrorKind::DuplicateDeclaration,
            Self::UndeclaredIdentifier(_) => CompileErrorKind::UndeclaredIdentifier,
            Self::NoActiveFrame => CompileErrorKind::Internal,
        }
    }
}

/// Переменная в стеке.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackVariable {
    /// Значение `stack_size` в момент привязки.
    pub at: i64,
    pub size: i64,
}

/// Лексическая область внутри кадра.
#[derive(Debug, Default)]
struct Scope {
    variables: HashMap<String, StackVariable>,
    /// Глубина стека при открытии области.
    depth: i64,
}

/// Стековый кадр одной активации функции (или точки входа).
#[derive(Debug)]
pub struct StackFrame {
    scopes: Vec<Scope>,
    /// Значение `stack_size` сразу после `push rbp`.
    pub start: i64,
}

/// Результат поиска переменной.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    /// Смещение относительно `rbp` текущего кадра.
    pub offset: i64,
    /// Индекс кадра, в котором объявлена переменная.
    pub frame: usize,
}

impl Slot {
    /// Операнд памяти для NASM: `QWORD [rbp - 8]`.
    pub fn operand(&self) -> String {
        if self.offset < 0 {
            format!("QWORD [rbp - {}]", -self.offset)
        } else {
            format!("QWORD [rbp + {}]", self.offset)
        }
    }
}

/// Распределитель стековых кадров.
#[derive(Debug, Default)]
pub struct FrameAllocator {
    frames: Vec<StackFrame>,
    stack_size: i64,
}

impl FrameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Текущая логическая глубина стека в байтах.
    pub fn stack_size(&self) -> i64 {
        self.stack_size
    }

    /// Количество активных кадров.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn push(&mut self, size: i64) {
        self.stack_size += size;
    }

    pub fn pop(&mut self, size: i64) {
        self.stack_size -= size;
    }

    /// Установить глубину стека (после явного `add rsp`).
    pub fn reset_to(&mut self, depth: i64) {
        self.stack_size = depth;
    }

    /// Открыть кадр: пролог `push rbp; mov rbp, rsp`.
    pub fn start_frame(&mut self, out: &mut String) {
        let _ = writeln!(out, "    push rbp");
        let _ = writeln!(out, "    mov rbp, rsp");
        self.push(WORD);
        self.frames.push(StackFrame {
            scopes: vec![Scope {
                variables: HashMap::new(),
                depth: self.stack_size,
            }],
            start: self.stack_size,
        });
    }

    /// Закрыть кадр: эпилог `mov rsp, rbp; pop rbp`.
    pub fn close_frame(&mut self, out: &mut String) {
        Self::emit_epilogue(out);
        self.pop_frame();
    }

    /// Снять кадр без генерации кода. Глубина стека возвращается к
    /// значению до `start_frame`.
    pub fn pop_frame(&mut self) {
        if let Some(frame) = self.frames.pop() {
            self.stack_size = frame.start - WORD;
        }
    }

    /// Эпилог без изменения учёта (для `return` внутри тела).
    pub fn emit_epilogue(out: &mut String) {
        let _ = writeln!(out, "    mov rsp, rbp");
        let _ = writeln!(out, "    pop rbp");
    }

    /// Зарезервировать `size` байт и привязать к ним имя.
    pub fn declare(&mut self, name: &str, size: i64) -> Result<(), FrameError> {
        self.push(size);
        self.bind(name, size)
    }

    /// Привязать имя к значению на вершине стека.
    pub fn bind(&mut self, name: &str, size: i64) -> Result<(), FrameError> {
        let at = self.stack_size;
        let scope = self
            .frames
            .last_mut()
            .and_then(|frame| frame.scopes.last_mut())
            .ok_or(FrameError::NoActiveFrame)?;
        if scope.variables.contains_key(name) {
            return Err(FrameError::DuplicateDeclaration(name.to_string()));
        }
        scope
            .variables
            .insert(name.to_string(), StackVariable { at, size });
        Ok(())
    }

    /// Привязать параметр `nth` из `count`. Аргументы кладёт вызывающий,
    /// поэтому они лежат над адресом возврата.
    pub fn declare_param(&mut self, name: &str, count: usize, nth: usize) -> Result<(), FrameError> {
        let frame = self.frames.last_mut().ok_or(FrameError::NoActiveFrame)?;
        let at = frame.start - (count - nth) as i64 * WORD;
        let scope = frame.scopes.last_mut().ok_or(FrameError::NoActiveFrame)?;
        if scope.variables.contains_key(name) {
            return Err(FrameError::DuplicateDeclaration(name.to_string()));
        }
        scope
            .variables
            .insert(name.to_string(), StackVariable { at, size: WORD });
        Ok(())
    }

    /// Найти переменную, от внутренней области к внешней.
    pub fn lookup(&self, name: &str) -> Result<Slot, FrameError> {
        let current = self.frames.last().ok_or(FrameError::NoActiveFrame)?;
        for (index, frame) in self.frames.iter().enumerate().rev() {
            for scope in frame.scopes.iter().rev() {
                if let Some(var) = scope.variables.get(name) {
                    let rel = current.start - var.at;
                    // Между кадрами лежит адрес возврата, не учтённый в stack_size.
                    let offset = if rel > 0 { rel + WORD } else { rel };
                    return Ok(Slot {
                        offset,
                        frame: index,
                    });
                }
            }
        }
        Err(FrameError::UndeclaredIdentifier(name.to_string()))
    }

    /// Открыть блочную область в текущем кадре.
    pub fn open_scope(&mut self) -> Result<(), FrameError> {
        let depth = self.stack_size;
        let frame = self.frames.last_mut().ok_or(FrameError::NoActiveFrame)?;
        frame.scopes.push(Scope {
            variables: HashMap::new(),
            depth,
        });
        Ok(())
    }

    /// Закрыть блочную область. Возвращает число байт, которые нужно
    /// снять со стека (`add rsp, n`).
    pub fn close_scope(&mut self) -> Result<i64, FrameError> {
        let frame = self.frames.last_mut().ok_or(FrameError::NoActiveFrame)?;
        let scope = frame.scopes.pop().ok_or(FrameError::NoActiveFrame)?;
        let released = self.stack_size - scope.depth;
        self.stack_size = scope.depth;
        Ok(released)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offset(sm: &FrameAllocator, name: &str) -> i64 {
        sm.lookup(name).unwrap().offset
    }

    #[test]
    fn test_local_offsets_survive_nested_frame() {
        let mut sm = FrameAllocator::new();
        sm.start_frame(&mut String::new());
        sm.declare("x", WORD).unwrap();
        sm.declare("y", WORD).unwrap();
        assert_eq!(offset(&sm, "x"), -8);
        assert_eq!(offset(&sm, "y"), -16);

        sm.start_frame(&mut String::new());
        assert_eq!(offset(&sm, "x"), 24);
        assert_eq!(offset(&sm, "y"), 16);

        sm.close_frame(&mut String::new());
        assert_eq!(offset(&sm, "x"), -8);
        assert_eq!(offset(&sm, "y"), -16);
    }

    #[test]
    fn test_frame_prologue_and_epilogue() {
        let mut sm = FrameAllocator::new();
        let mut out = String::new();
        sm.start_frame(&mut out);
        sm.close_frame(&mut out);
        assert_eq!(
            out,
            "    push rbp\n    mov rbp, rsp\n    mov rsp, rbp\n    pop rbp\n"
        );
        assert_eq!(sm.stack_size(), 0);
        assert_eq!(sm.depth(), 0);
    }

    #[test]
    fn test_params_have_positive_offsets() {
        let mut sm = FrameAllocator::new();
        sm.start_frame(&mut String::new());
        sm.declare_param("a", 2, 0).unwrap();
        sm.declare_param("b", 2, 1).unwrap();
        assert_eq!(offset(&sm, "a"), 24);
        assert_eq!(offset(&sm, "b"), 16);
        sm.declare("local", WORD).unwrap();
        assert_eq!(offset(&sm, "local"), -8);
    }

    #[test]
    fn test_duplicate_in_same_scope() {
        let mut sm = FrameAllocator::new();
        sm.start_frame(&mut String::new());
        sm.declare("x", WORD).unwrap();
        assert_eq!(
            sm.declare("x", WORD),
            Err(FrameError::DuplicateDeclaration("x".to_string()))
        );
    }

    #[test]
    fn test_block_scope_shadowing() {
        let mut sm = FrameAllocator::new();
        sm.start_frame(&mut String::new());
        sm.declare("x", WORD).unwrap();

        sm.open_scope().unwrap();
        sm.declare("x", WORD).unwrap();
        sm.declare("inner", WORD).unwrap();
        assert_eq!(offset(&sm, "x"), -16);
        assert_eq!(sm.close_scope().unwrap(), 16);

        assert_eq!(offset(&sm, "x"), -8);
        assert_eq!(
            sm.lookup("inner"),
            Err(FrameError::UndeclaredIdentifier("inner".to_string()))
        );
        assert_eq!(sm.stack_size(), 16);
    }

    #[test]
    fn test_lookup_reports_frame_index() {
        let mut sm = FrameAllocator::new();
        sm.start_frame(&mut String::new());
        sm.declare("outer", WORD).unwrap();
        sm.start_frame(&mut String::new());
        sm.declare("inner", WORD).unwrap();
        assert_eq!(sm.lookup("outer").unwrap().frame, 0);
        assert_eq!(sm.lookup("inner").unwrap().frame, 1);
    }

    #[test]
    fn test_without_frame() {
        let mut sm = FrameAllocator::new();
        assert_eq!(sm.declare("x", WORD), Err(FrameError::NoActiveFrame));
        assert_eq!(sm.lookup("x"), Err(FrameError::NoActiveFrame));
    }

    #[test]
    fn test_slot_operand() {
        let local = Slot { offset: -16, frame: 0 };
        let param = Slot { offset: 24, frame: 0 };
        assert_eq!(local.operand(), "QWORD [rbp - 16]");
        assert_eq!(param.operand(), "QWORD [rbp + 24]");
    }
}
