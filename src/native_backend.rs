//! Модуль `native_backend`
//!
//! Генерация ассемблера x86-64 (синтаксис NASM, ELF64) из AST.
//!
//! Все промежуточные значения проходят через стек операндов: каждое
//! выражение оставляет ровно одно слово на вершине стека. Переменная
//! не копируется при объявлении: значение инициализатора уже лежит в
//! стеке и становится её ячейкой.

use std::collections::HashMap;
use std::fmt::Write;

use log::debug;

use crate::ast::{
    BinaryOp, Block, Call, Expr, ExprKind, ForStmt, FunctionDecl, IfStmt, Literal, Program,
    Stmt, StmtKind, UnaryOp, WhileStmt,
};
use crate::error::{CompileError, CompileErrorKind};
use crate::modules::Signature;
use crate::native::frame::{FrameAllocator, FrameError, WORD};
use crate::native::runtime::{RuntimeGenerator, PRINT_SYMBOL};
use crate::parser::token::Span;

/// Активный цикл: метки переходов и глубина стека на входе.
#[derive(Debug, Clone)]
struct LoopContext {
    continue_label: String,
    end_label: String,
    depth: i64,
}

/// Компилируемая функция.
#[derive(Debug, Clone, Copy)]
struct FunctionContext {
    params: usize,
    returns_value: bool,
}

/// Генератор NASM для x86-64 Linux.
pub struct NativeGenerator {
    file: String,
    frames: FrameAllocator,
    /// Код точки входа `_start`.
    entry: String,
    /// Код функций.
    functions: String,
    in_function: bool,
    label_count: usize,
    /// Глубина вложенности блоков (0 = верхний уровень файла).
    nesting: usize,
    loops: Vec<LoopContext>,
    signatures: HashMap<String, Signature>,
    current_fn: Option<FunctionContext>,
    uses_print: bool,
}

impl NativeGenerator {
    /// Создать генератор для файла `file` (имя нужно для диагностики).
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            frames: FrameAllocator::new(),
            entry: String::new(),
            functions: String::new(),
            in_function: false,
            label_count: 0,
            nesting: 0,
            loops: Vec::new(),
            signatures: HashMap::new(),
            current_fn: None,
            uses_print: false,
        }
    }

    /// Скомпилировать программу в текст ассемблера.
    pub fn compile(mut self, program: &Program) -> Result<String, CompileError> {
        debug!(
            "native: lowering {} ({} statements)",
            self.file,
            program.statements.len()
        );
        self.collect_signatures(program)?;

        let has_main = self.signatures.contains_key("main");
        let mut executable = program
            .statements
            .iter()
            .filter(|s| !matches!(s.kind, StmtKind::Function(_) | StmtKind::Import(_)));
        if let (true, Some(stmt)) = (has_main, executable.next()) {
            return Err(self.error(
                CompileErrorKind::DuplicateDeclaration,
                stmt.span,
                "top-level statements conflict with an explicit 'main' function",
            ));
        }

        self.entry.push_str("_start:\n");
        self.frames.start_frame(&mut self.entry);
        for stmt in &program.statements {
            self.lower_stmt(stmt)?;
        }

        if let Some(main) = self.signatures.get("main").copied() {
            self.emit("call bs_main");
            if !main.returns_value {
                self.emit("mov rax, 0");
            }
            self.emit("mov rdi, rax");
            self.emit("mov rax, 60");
            self.emit("syscall");
            self.frames.pop_frame();
        } else {
            self.frames.close_frame(&mut self.entry);
            self.emit("mov rax, 60");
            self.emit("mov rdi, 0");
            self.emit("syscall");
        }

        let mut out = String::from("global _start\n\nsection .text\n\n");
        out.push_str(&self.entry);
        if !self.functions.is_empty() {
            out.push('\n');
            out.push_str(&self.functions);
        }
        out.push_str(&RuntimeGenerator::routines(self.uses_print));
        Ok(out)
    }

    fn collect_signatures(&mut self, program: &Program) -> Result<(), CompileError> {
        for stmt in &program.statements {
            if let StmtKind::Function(func) = &stmt.kind {
                if self.signatures.contains_key(&func.name) {
                    return Err(self.error(
                        CompileErrorKind::DuplicateDeclaration,
                        stmt.span,
                        format!("function '{}' is already declared", func.name),
                    ));
                }
                if func.name == "main" && !func.params.is_empty() {
                    return Err(self.error(
                        CompileErrorKind::ArityMismatch,
                        stmt.span,
                        "'main' must not take parameters",
                    ));
                }
                self.signatures.insert(
                    func.name.clone(),
                    Signature {
                        params: func.params.len(),
                        returns_value: func.returns_value(),
                    },
                );
            }
        }
        Ok(())
    }

    // ========== Вывод ==========

    fn out(&mut self) -> &mut String {
        if self.in_function {
            &mut self.functions
        } else {
            &mut self.entry
        }
    }

    fn emit(&mut self, instr: impl AsRef<str>) {
        let _ = writeln!(self.out(), "    {}", instr.as_ref());
    }

    fn label(&mut self, name: &str) {
        let _ = writeln!(self.out(), "{}:", name);
    }

    fn push_reg(&mut self, reg: &str) {
        self.emit(format!("push {}", reg));
        self.frames.push(WORD);
    }

    fn pop_reg(&mut self, reg: &str) {
        self.emit(format!("pop {}", reg));
        self.frames.pop(WORD);
    }

    /// Снять со стека `bytes` байт без изменения учёта.
    fn release(&mut self, bytes: i64) {
        if bytes > 0 {
            self.emit(format!("add rsp, {}", bytes));
        }
    }

    fn next_label(&mut self) -> usize {
        self.label_count += 1;
        self.label_count
    }

    fn error(&self, kind: CompileErrorKind, span: Span, message: impl Into<String>) -> CompileError {
        CompileError::new(kind, &self.file, span, message)
    }

    fn frame_error(&self, err: FrameError, span: Span) -> CompileError {
        self.error(err.kind(), span, err.to_string())
    }

    /// Ячейка переменной. Функции видят только собственный кадр.
    fn slot_operand(&self, name: &str, span: Span) -> Result<String, CompileError> {
        let slot = self
            .frames
            .lookup(name)
            .map_err(|e| self.frame_error(e, span))?;
        if slot.frame + 1 != self.frames.depth() {
            return Err(self.error(
                CompileErrorKind::UndeclaredIdentifier,
                span,
                format!("'{}' is not declared in this function", name),
            ));
        }
        Ok(slot.operand())
    }

    // ========== Инструкции ==========

    fn lower_stmt(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        stacker::maybe_grow(256 * 1024, 8 * 1024 * 1024, || self.lower_stmt_inner(stmt))
    }

    fn lower_stmt_inner(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        let span = stmt.span;
        match &stmt.kind {
            StmtKind::VarDecl(decl) => {
                match &decl.init {
                    Some(init) => self.lower_expr(init)?,
                    None => self.lower_expr(&Expr::int(0, span))?,
                }
                self.frames
                    .bind(&decl.name, WORD)
                    .map_err(|e| self.frame_error(e, span))
            }
            StmtKind::Assign(assign) => {
                let target = self.slot_operand(&assign.name, span)?;
                self.lower_expr(&assign.value)?;
                self.pop_reg("rax");
                self.emit(format!("mov {}, rax", target));
                Ok(())
            }
            StmtKind::Function(func) => self.lower_function(func, span),
            StmtKind::Import(_) => Err(self.error(
                CompileErrorKind::UnsupportedConstruct,
                span,
                "imports are only supported by the ssa backend",
            )),
            StmtKind::If(if_stmt) => self.lower_if(if_stmt),
            StmtKind::While(while_stmt) => self.lower_while(while_stmt),
            StmtKind::For(for_stmt) => self.lower_for(for_stmt),
            StmtKind::Block(block) => self.lower_block(block),
            StmtKind::Break | StmtKind::Continue => {
                let is_break = matches!(stmt.kind, StmtKind::Break);
                let Some(ctx) = self.loops.last().cloned() else {
                    let word = if is_break { "break" } else { "continue" };
                    return Err(self.error(
                        CompileErrorKind::InvalidControlFlow,
                        span,
                        format!("'{}' outside of a loop", word),
                    ));
                };
                self.release(self.frames.stack_size() - ctx.depth);
                let target = if is_break {
                    ctx.end_label
                } else {
                    ctx.continue_label
                };
                self.emit(format!("jmp {}", target));
                Ok(())
            }
            StmtKind::Return(value) => self.lower_return(value.as_ref(), span),
            StmtKind::Exit(value) => {
                self.lower_expr(value)?;
                self.emit("mov rax, 60");
                self.pop_reg("rdi");
                self.emit("syscall");
                Ok(())
            }
            StmtKind::Print(value) => {
                self.lower_expr(value)?;
                self.emit(format!("call {}", PRINT_SYMBOL));
                // Процедура снимает аргумент сама.
                self.frames.pop(WORD);
                self.uses_print = true;
                Ok(())
            }
            StmtKind::Call(call) => self.lower_call(call, span, false),
        }
    }

    fn lower_block(&mut self, block: &Block) -> Result<(), CompileError> {
        self.frames
            .open_scope()
            .map_err(|e| self.frame_error(e, block.span))?;
        self.nesting += 1;
        for stmt in &block.statements {
            self.lower_stmt(stmt)?;
        }
        self.nesting -= 1;
        let released = self
            .frames
            .close_scope()
            .map_err(|e| self.frame_error(e, block.span))?;
        self.release(released);
        Ok(())
    }

    fn lower_if(&mut self, stmt: &IfStmt) -> Result<(), CompileError> {
        let id = self.next_label();
        let else_label = format!("if_{}_else", id);
        let end_label = format!("if_{}_end", id);

        self.lower_expr(&stmt.test)?;
        self.pop_reg("rax");
        self.emit("cmp rax, 0");
        self.emit(format!("je {}", else_label));
        self.lower_block(&stmt.consequent)?;
        self.emit(format!("jmp {}", end_label));
        self.label(&else_label);
        if let Some(alternate) = &stmt.alternate {
            self.lower_block(alternate)?;
        }
        self.label(&end_label);
        Ok(())
    }

    fn lower_while(&mut self, stmt: &WhileStmt) -> Result<(), CompileError> {
        let id = self.next_label();
        let head = format!("loop_{}_head", id);
        let end = format!("loop_{}_end", id);
        let depth = self.frames.stack_size();

        self.label(&head);
        self.lower_condition(&stmt.test, &end)?;
        self.loops.push(LoopContext {
            continue_label: head.clone(),
            end_label: end.clone(),
            depth,
        });
        let body = self.lower_block(&stmt.body);
        self.loops.pop();
        body?;
        self.unwind_to(depth);
        self.emit(format!("jmp {}", head));
        self.label(&end);
        Ok(())
    }

    fn lower_for(&mut self, stmt: &ForStmt) -> Result<(), CompileError> {
        let id = self.next_label();
        let head = format!("loop_{}_head", id);
        let next = format!("loop_{}_next", id);
        let end = format!("loop_{}_end", id);

        // Переменная из init видна только внутри цикла.
        let span = stmt.body.span;
        self.frames
            .open_scope()
            .map_err(|e| self.frame_error(e, span))?;
        if let Some(init) = &stmt.init {
            self.lower_stmt(init)?;
        }
        let depth = self.frames.stack_size();

        self.label(&head);
        if let Some(test) = &stmt.test {
            self.lower_condition(test, &end)?;
        }
        self.loops.push(LoopContext {
            continue_label: next.clone(),
            end_label: end.clone(),
            depth,
        });
        let body = self.lower_block(&stmt.body);
        self.loops.pop();
        body?;
        self.label(&next);
        if let Some(update) = &stmt.update {
            self.lower_stmt(update)?;
        }
        self.unwind_to(depth);
        self.emit(format!("jmp {}", head));
        self.label(&end);

        let released = self
            .frames
            .close_scope()
            .map_err(|e| self.frame_error(e, span))?;
        self.release(released);
        Ok(())
    }

    /// Вычислить условие и выйти на `target`, если оно ложно.
    fn lower_condition(&mut self, test: &Expr, target: &str) -> Result<(), CompileError> {
        self.lower_expr(test)?;
        self.pop_reg("rax");
        self.emit("test rax, rax");
        self.emit(format!("jz {}", target));
        Ok(())
    }

    /// Снять рост стека, накопленный телом цикла.
    fn unwind_to(&mut self, depth: i64) {
        while self.frames.stack_size() > depth {
            self.pop_reg("rax");
        }
    }

    fn lower_function(&mut self, func: &FunctionDecl, span: Span) -> Result<(), CompileError> {
        if self.nesting > 0 || self.in_function {
            return Err(self.error(
                CompileErrorKind::UnsupportedConstruct,
                span,
                format!("function '{}' must be declared at the top level", func.name),
            ));
        }
        debug!("native: function {}", func.name);

        let saved_loops = std::mem::take(&mut self.loops);
        self.in_function = true;
        self.current_fn = Some(FunctionContext {
            params: func.params.len(),
            returns_value: func.returns_value(),
        });

        let result = self.lower_function_body(func);

        self.in_function = false;
        self.current_fn = None;
        self.loops = saved_loops;
        result
    }

    fn lower_function_body(&mut self, func: &FunctionDecl) -> Result<(), CompileError> {
        self.label(&format!("bs_{}", func.name));
        self.frames.start_frame(&mut self.functions);
        let count = func.params.len();
        for (nth, param) in func.params.iter().enumerate() {
            self.frames
                .declare_param(&param.name, count, nth)
                .map_err(|e| self.frame_error(e, param.span))?;
        }

        self.nesting += 1;
        for stmt in &func.body.statements {
            self.lower_stmt(stmt)?;
        }
        self.nesting -= 1;

        let ends_with_return = matches!(
            func.body.statements.last().map(|s| &s.kind),
            Some(StmtKind::Return(_))
        );
        if !ends_with_return {
            self.emit("mov rax, 0");
            self.emit_return(count);
        }
        self.frames.pop_frame();
        Ok(())
    }

    fn emit_return(&mut self, params: usize) {
        FrameAllocator::emit_epilogue(self.out());
        if params == 0 {
            self.emit("ret");
        } else {
            self.emit(format!("ret {}", params as i64 * WORD));
        }
    }

    fn lower_return(&mut self, value: Option<&Expr>, span: Span) -> Result<(), CompileError> {
        let Some(ctx) = self.current_fn else {
            return Err(self.error(
                CompileErrorKind::InvalidControlFlow,
                span,
                "'return' outside of a function",
            ));
        };
        match (value, ctx.returns_value) {
            (Some(value), true) => {
                self.lower_expr(value)?;
                self.pop_reg("rax");
            }
            (None, false) => {}
            (Some(_), false) => {
                return Err(self.error(
                    CompileErrorKind::InvalidControlFlow,
                    span,
                    "a void function cannot return a value",
                ))
            }
            (None, true) => {
                return Err(self.error(
                    CompileErrorKind::InvalidControlFlow,
                    span,
                    "missing return value",
                ))
            }
        }
        self.emit_return(ctx.params);
        Ok(())
    }

    fn lower_call(&mut self, call: &Call, span: Span, want_value: bool) -> Result<(), CompileError> {
        let Some(sig) = self.signatures.get(&call.name).copied() else {
            return Err(self.error(
                CompileErrorKind::UndeclaredIdentifier,
                span,
                format!("function '{}' is not declared", call.name),
            ));
        };
        if sig.params != call.args.len() {
            return Err(self.error(
                CompileErrorKind::ArityMismatch,
                span,
                format!(
                    "'{}' expects {} arguments, got {}",
                    call.name,
                    sig.params,
                    call.args.len()
                ),
            ));
        }
        if want_value && !sig.returns_value {
            return Err(self.error(
                CompileErrorKind::UnsupportedConstruct,
                span,
                format!("'{}' does not return a value", call.name),
            ));
        }

        for arg in &call.args {
            self.lower_expr(arg)?;
        }
        self.emit(format!("call bs_{}", call.name));
        // Аргументы снимает вызываемая функция.
        self.frames.pop(sig.params as i64 * WORD);
        if want_value {
            self.push_reg("rax");
        }
        Ok(())
    }

    // ========== Выражения ==========

    fn lower_expr(&mut self, expr: &Expr) -> Result<(), CompileError> {
        stacker::maybe_grow(256 * 1024, 8 * 1024 * 1024, || self.lower_expr_inner(expr))
    }

    fn lower_expr_inner(&mut self, expr: &Expr) -> Result<(), CompileError> {
        match &expr.kind {
            ExprKind::Literal(literal) => {
                let Some(value) = literal.as_int() else {
                    return Err(self.error(
                        CompileErrorKind::UnsupportedConstruct,
                        expr.span,
                        "string literals are not supported by the native backend",
                    ));
                };
                self.emit(format!("mov rax, {}", value));
                self.push_reg("rax");
            }
            ExprKind::Variable(name) => {
                let source = self.slot_operand(name, expr.span)?;
                self.emit(format!("mov rax, {}", source));
                self.push_reg("rax");
            }
            ExprKind::Binary { op, lhs, rhs } => {
                if is_string(lhs) || is_string(rhs) {
                    return Err(self.error(
                        CompileErrorKind::UnsupportedOperator,
                        expr.span,
                        format!("operator '{}' cannot be applied to strings", op.symbol()),
                    ));
                }
                self.lower_expr(lhs)?;
                self.lower_expr(rhs)?;
                self.pop_reg("rbx");
                self.pop_reg("rax");
                for instr in binary_instrs(*op) {
                    self.emit(instr);
                }
                self.push_reg("rax");
            }
            ExprKind::Unary { op, operand } => {
                self.lower_expr(operand)?;
                self.pop_reg("rax");
                match op {
                    UnaryOp::Neg => self.emit("neg rax"),
                    UnaryOp::Not => {
                        self.emit("test rax, rax");
                        self.emit("sete al");
                        self.emit("movzx rax, al");
                    }
                }
                self.push_reg("rax");
            }
            ExprKind::Call(call) => self.lower_call(call, expr.span, true)?,
        }
        Ok(())
    }
}

fn is_string(expr: &Expr) -> bool {
    matches!(expr.kind, ExprKind::Literal(Literal::String(_)))
}

/// Инструкции для `rax = rax OP rbx`.
fn binary_instrs(op: BinaryOp) -> Vec<&'static str> {
    match op {
        BinaryOp::Add => vec!["add rax, rbx"],
        BinaryOp::Sub => vec!["sub rax, rbx"],
        BinaryOp::Mul => vec!["imul rax, rbx"],
        BinaryOp::Div => vec!["cqo", "idiv rbx"],
        BinaryOp::Rem => vec!["cqo", "idiv rbx", "mov rax, rdx"],
        BinaryOp::BitAnd => vec!["and rax, rbx"],
        BinaryOp::BitOr => vec!["or rax, rbx"],
        BinaryOp::And | BinaryOp::Or => {
            let combine = if op == BinaryOp::And {
                "and al, bl"
            } else {
                "or al, bl"
            };
            vec![
                "test rax, rax",
                "setne al",
                "test rbx, rbx",
                "setne bl",
                combine,
                "movzx rax, al",
            ]
        }
        BinaryOp::Eq => compare("sete al"),
        BinaryOp::Ne => compare("setne al"),
        BinaryOp::Lt => compare("setl al"),
        BinaryOp::Gt => compare("setg al"),
        BinaryOp::Le => compare("setle al"),
        BinaryOp::Ge => compare("setge al"),
    }
}

fn compare(set: &'static str) -> Vec<&'static str> {
    vec!["cmp rax, rbx", set, "movzx rax, al"]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn compile(source: &str) -> Result<String, CompileError> {
        let program = parse(source, "test.bs").unwrap();
        NativeGenerator::new("test.bs").compile(&program)
    }

    fn compile_err(source: &str) -> CompileError {
        compile(source).unwrap_err()
    }

    #[test]
    fn test_exit_literal() {
        let asm = compile("exit(69);").unwrap();
        assert!(asm.starts_with("global _start\n"));
        assert!(asm.contains(
            "_start:\n    push rbp\n    mov rbp, rsp\n    mov rax, 69\n    push rax\n    mov rax, 60\n    pop rdi\n    syscall\n"
        ));
        assert!(asm.trim_end().ends_with("mov rdi, 0\n    syscall"));
    }

    #[test]
    fn test_binary_pops_right_then_left() {
        let asm = compile("exit(7 - 2);").unwrap();
        assert!(asm.contains(
            "    mov rax, 7\n    push rax\n    mov rax, 2\n    push rax\n    pop rbx\n    pop rax\n    sub rax, rbx\n    push rax\n"
        ));
    }

    #[test]
    fn test_declaration_uses_pushed_value() {
        let asm = compile("var a = 10; var b = 14; exit(a + b);").unwrap();
        assert!(asm.contains("mov rax, QWORD [rbp - 8]"));
        assert!(asm.contains("mov rax, QWORD [rbp - 16]"));
    }

    #[test]
    fn test_assignment_stores_to_slot() {
        let asm = compile("var x = 1; x = 5;").unwrap();
        assert!(asm.contains("    pop rax\n    mov QWORD [rbp - 8], rax\n"));
    }

    #[test]
    fn test_comparison_sequence() {
        let asm = compile("exit(1 <= 2);").unwrap();
        assert!(asm.contains("    cmp rax, rbx\n    setle al\n    movzx rax, al\n"));
    }

    #[test]
    fn test_if_labels_are_unique() {
        let asm = compile("if (1) { exit(1); } if (0) { exit(2); } else { exit(3); }").unwrap();
        assert!(asm.contains("je if_1_else"));
        assert!(asm.contains("if_1_end:"));
        assert!(asm.contains("je if_2_else"));
        assert!(asm.contains("if_2_end:"));
    }

    #[test]
    fn test_block_scope_releases_slots() {
        let asm = compile("var x = 1; { var x = 2; var y = 3; } exit(x);").unwrap();
        assert!(asm.contains("add rsp, 16"));
        // После закрытия блока снова видна внешняя x.
        assert!(asm.contains("    mov rax, QWORD [rbp - 8]\n    push rax\n    mov rax, 60\n"));
    }

    #[test]
    fn test_while_loop_shape() {
        let asm = compile("var i = 0; while (i < 3) { i += 1; } exit(i);").unwrap();
        assert!(asm.contains("loop_1_head:"));
        assert!(asm.contains("jz loop_1_end"));
        assert!(asm.contains("jmp loop_1_head"));
        assert!(asm.contains("loop_1_end:"));
    }

    #[test]
    fn test_break_unwinds_block_variables() {
        let asm = compile("while (1) { var t = 1; break; }").unwrap();
        assert!(asm.contains("    add rsp, 8\n    jmp loop_1_end\n"));
    }

    #[test]
    fn test_for_continue_targets_update() {
        let asm = compile("for (var i = 0; i < 3; i += 1) { continue; }").unwrap();
        assert!(asm.contains("jmp loop_1_next"));
        assert!(asm.contains("loop_1_next:"));
    }

    #[test]
    fn test_function_with_params() {
        let asm = compile("fn add(a: int64, b: int64): int64 { return a + b; } exit(add(1, 2));")
            .unwrap();
        assert!(asm.contains("bs_add:\n    push rbp\n    mov rbp, rsp\n"));
        assert!(asm.contains("mov rax, QWORD [rbp + 24]"));
        assert!(asm.contains("mov rax, QWORD [rbp + 16]"));
        assert!(asm.contains("ret 16"));
        assert!(asm.contains("    call bs_add\n    push rax\n"));
        // Функции идут после точки входа.
        assert!(asm.find("_start:").unwrap() < asm.find("bs_add:").unwrap());
    }

    #[test]
    fn test_implicit_return() {
        let asm = compile("fn noop() { } noop();").unwrap();
        assert!(asm.contains("bs_noop:\n    push rbp\n    mov rbp, rsp\n    mov rax, 0\n    mov rsp, rbp\n    pop rbp\n    ret\n"));
    }

    #[test]
    fn test_explicit_main_is_called() {
        let asm = compile("fn main(): int64 { return 3; }").unwrap();
        assert!(asm.contains("    call bs_main\n    mov rdi, rax\n"));
    }

    #[test]
    fn test_print_appends_routine() {
        let asm = compile("print(42);").unwrap();
        assert!(asm.contains("call __bs_print"));
        assert!(asm.contains("__bs_print:"));
        assert!(!compile("exit(0);").unwrap().contains("__bs_print"));
    }

    #[test]
    fn test_undeclared_identifier() {
        let err = compile_err("exit(nope);");
        assert_eq!(err.kind, CompileErrorKind::UndeclaredIdentifier);
        assert_eq!((err.line, err.column), (1, 6));
    }

    #[test]
    fn test_assign_to_undeclared() {
        let err = compile_err("x = 1;");
        assert_eq!(err.kind, CompileErrorKind::UndeclaredIdentifier);
    }

    #[test]
    fn test_duplicate_declaration() {
        let err = compile_err("var x = 1;\nvar x = 2;");
        assert_eq!(err.kind, CompileErrorKind::DuplicateDeclaration);
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_break_outside_loop() {
        assert_eq!(
            compile_err("break;").kind,
            CompileErrorKind::InvalidControlFlow
        );
        assert_eq!(
            compile_err("if (1) { continue; }").kind,
            CompileErrorKind::InvalidControlFlow
        );
    }

    #[test]
    fn test_return_outside_function() {
        assert_eq!(
            compile_err("return 1;").kind,
            CompileErrorKind::InvalidControlFlow
        );
    }

    #[test]
    fn test_function_cannot_see_entry_variables() {
        let err = compile_err("var g = 1; fn f(): int64 { return g; } exit(f());");
        assert_eq!(err.kind, CompileErrorKind::UndeclaredIdentifier);
    }

    #[test]
    fn test_arity_mismatch() {
        let err = compile_err("fn f(a: int64): int64 { return a; } exit(f(1, 2));");
        assert_eq!(err.kind, CompileErrorKind::ArityMismatch);
    }

    #[test]
    fn test_void_call_as_value() {
        let err = compile_err("fn f() { } exit(f());");
        assert_eq!(err.kind, CompileErrorKind::UnsupportedConstruct);
    }

    #[test]
    fn test_string_rejected() {
        assert_eq!(
            compile_err(r#"var s = "hi";"#).kind,
            CompileErrorKind::UnsupportedConstruct
        );
        assert_eq!(
            compile_err(r#"exit("a" + 1);"#).kind,
            CompileErrorKind::UnsupportedOperator
        );
    }

    #[test]
    fn test_import_rejected() {
        let err = compile_err(r#"import { f } from "lib";"#);
        assert_eq!(err.kind, CompileErrorKind::UnsupportedConstruct);
    }

    #[test]
    fn test_nested_function_rejected() {
        let err = compile_err("if (1) { fn f() { } }");
        assert_eq!(err.kind, CompileErrorKind::UnsupportedConstruct);
    }

    #[test]
    fn test_main_with_top_level_statements() {
        let err = compile_err("fn main(): int64 { return 0; } exit(1);");
        assert_eq!(err.kind, CompileErrorKind::DuplicateDeclaration);
    }
}
