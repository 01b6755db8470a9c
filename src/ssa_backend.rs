//! Модуль `ssa_backend`
//!
//! Построение SSA IR (вход QBE) из AST.
//!
//! Построитель держит стек буферов инструкций. Составные конструкции
//! (условие, тело ветки, шаг цикла) собираются в отдельном буфере и
//! затем упаковываются в одну инструкцию `If`/`While`/`For`, которая
//! добавляется во внешний буфер.
//!
//! Каждое понижение выражения возвращает свой временный регистр
//! напрямую; имена регистров идут по кругу `a`..`z`.

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::ast::{
    BinaryOp, Block, Call, Expr, ExprKind, ForStmt, FunctionDecl, IfStmt, Import, Literal,
    Program, Stmt, StmtKind, UnaryOp, WhileStmt,
};
use crate::error::{BsResult, CompileError, CompileErrorKind};
use crate::modules::{ModuleInterface, ModuleLinker, Signature};
use crate::parser::token::Span;
use crate::ssa::ir::{
    Callee, Instr, IrFunction, IrModule, IrParam, IrProgram, IrType, Label, LiteralValue,
    Operand, StackSlot, Temp,
};

/// Буфер инструкций одного уровня вложенности.
#[derive(Debug, Default)]
struct InstrFrame {
    instrs: Vec<Instr>,
    /// Последняя инструкция завершает блок (`jmp`/`ret`).
    terminated: bool,
}

/// Метки активного цикла.
#[derive(Debug, Clone)]
struct LoopLabels {
    continue_label: Label,
    break_label: Label,
}

/// Компилируемая функция.
#[derive(Debug, Clone, Copy)]
struct FunctionContext {
    returns_value: bool,
    /// Точка входа всегда возвращает код выхода.
    exit_code: bool,
    /// Неявный `main` из инструкций верхнего уровня.
    implicit: bool,
}

/// Построитель IR для одного файла.
pub struct IrBuilder<'l> {
    file: String,
    linker: &'l mut ModuleLinker,
    is_entry: bool,
    frames: Vec<InstrFrame>,
    last_temp: Option<char>,
    /// Регистры, значение которых ещё не прочитано.
    live: HashSet<char>,
    counter: usize,
    loop_labels: Option<LoopLabels>,
    scopes: Vec<HashMap<String, StackSlot>>,
    /// Ячейки текущей функции.
    slots: Vec<StackSlot>,
    /// Сколько раз имя уже объявлялось в текущей функции.
    declared: HashMap<String, usize>,
    signatures: HashMap<String, Signature>,
    current_fn: Option<FunctionContext>,
    functions: Vec<IrFunction>,
}

impl<'l> IrBuilder<'l> {
    /// Создать построитель. `is_entry` означает корневой модуль, в
    /// котором инструкции верхнего уровня образуют `main`.
    pub fn new(file: impl Into<String>, linker: &'l mut ModuleLinker, is_entry: bool) -> Self {
        Self {
            file: file.into(),
            linker,
            is_entry,
            frames: Vec::new(),
            last_temp: None,
            live: HashSet::new(),
            counter: 0,
            loop_labels: None,
            scopes: Vec::new(),
            slots: Vec::new(),
            declared: HashMap::new(),
            signatures: HashMap::new(),
            current_fn: None,
            functions: Vec::new(),
        }
    }

    /// Понизить файл в модуль IR. Возвращает модуль и его интерфейс
    /// (функции, доступные для импорта).
    pub fn build(mut self, program: &Program) -> BsResult<(IrModule, ModuleInterface)> {
        debug!(
            "ssa: lowering {} ({} statements)",
            self.file,
            program.statements.len()
        );
        let interface = self.collect_signatures(program)?;

        for stmt in &program.statements {
            if let StmtKind::Import(import) = &stmt.kind {
                self.lower_import(import, stmt.span)?;
            }
        }
        self.check_clashes(program)?;

        let executable: Vec<&Stmt> = program
            .statements
            .iter()
            .filter(|s| !matches!(s.kind, StmtKind::Function(_) | StmtKind::Import(_)))
            .collect();
        if let Some(stmt) = executable.first() {
            if !self.is_entry {
                return Err(self
                    .error(
                        CompileErrorKind::UnsupportedConstruct,
                        stmt.span,
                        "an imported module may only contain declarations",
                    )
                    .into());
            }
            if interface.functions.contains_key("main") {
                return Err(self
                    .error(
                        CompileErrorKind::DuplicateDeclaration,
                        stmt.span,
                        "top-level statements conflict with an explicit 'main' function",
                    )
                    .into());
            }
        }

        for stmt in &program.statements {
            if let StmtKind::Function(func) = &stmt.kind {
                self.lower_function(func)?;
            }
        }

        if self.is_entry && !interface.functions.contains_key("main") {
            self.lower_entry(&executable)?;
        }

        let module = IrModule {
            file: self.file,
            functions: self.functions,
        };
        Ok((module, interface))
    }

    fn collect_signatures(&mut self, program: &Program) -> Result<ModuleInterface, CompileError> {
        let mut interface = ModuleInterface::default();
        for stmt in &program.statements {
            let StmtKind::Function(func) = &stmt.kind else {
                continue;
            };
            if interface.functions.contains_key(&func.name) {
                return Err(self.error(
                    CompileErrorKind::DuplicateDeclaration,
                    stmt.span,
                    format!("function '{}' is already declared", func.name),
                ));
            }
            if func.name == "main" {
                if !self.is_entry {
                    return Err(self.error(
                        CompileErrorKind::UnsupportedConstruct,
                        stmt.span,
                        "'main' can only be declared in the entry module",
                    ));
                }
                if !func.params.is_empty() {
                    return Err(self.error(
                        CompileErrorKind::ArityMismatch,
                        stmt.span,
                        "'main' must not take parameters",
                    ));
                }
            }
            interface.functions.insert(
                func.name.clone(),
                Signature {
                    params: func.params.len(),
                    returns_value: func.returns_value(),
                },
            );
        }
        self.signatures = interface.functions.clone();
        Ok(interface)
    }

    fn lower_import(&mut self, import: &Import, span: Span) -> BsResult<()> {
        let interface = self.linker.import(&import.path, &self.file, span)?;
        for symbol in &import.symbols {
            let Some(sig) = interface.functions.get(symbol) else {
                return Err(self
                    .error(
                        CompileErrorKind::UndeclaredIdentifier,
                        span,
                        format!("module '{}' has no function '{}'", import.path, symbol),
                    )
                    .into());
            };
            if self.signatures.contains_key(symbol) {
                return Err(self
                    .error(
                        CompileErrorKind::DuplicateDeclaration,
                        span,
                        format!("'{}' is already declared", symbol),
                    )
                    .into());
            }
            self.signatures.insert(symbol.clone(), *sig);
        }
        Ok(())
    }

    /// Имена функций не должны совпадать с функциями уже понижённых
    /// модулей: все модули печатаются в один файл IR.
    fn check_clashes(&self, program: &Program) -> Result<(), CompileError> {
        for stmt in &program.statements {
            let StmtKind::Function(func) = &stmt.kind else {
                continue;
            };
            if let Some(other) = self.linker.defined_in(&func.name) {
                return Err(self.error(
                    CompileErrorKind::DuplicateDeclaration,
                    stmt.span,
                    format!("function '{}' is also defined in {}", func.name, other),
                ));
            }
        }
        Ok(())
    }

    // ========== Функции ==========

    /// Сбросить состояние перед новой функцией.
    fn begin_function(&mut self, ctx: FunctionContext) {
        self.frames = vec![InstrFrame::default()];
        self.scopes = vec![HashMap::new()];
        self.slots.clear();
        self.declared.clear();
        self.live.clear();
        self.loop_labels = None;
        self.current_fn = Some(ctx);
    }

    /// Завершить функцию: добавить `ret`, если управление доходит до конца.
    fn finish_function(&mut self) -> Vec<Instr> {
        let needs_return = self.frames.last().map_or(true, |f| !f.terminated);
        if needs_return {
            let value = self
                .current_fn
                .filter(|ctx| ctx.returns_value || ctx.exit_code)
                .map(|_| Operand::Const(0));
            self.emit(Instr::Return(value));
        }
        self.current_fn = None;
        self.scopes.clear();
        self.frames.pop().map(|f| f.instrs).unwrap_or_default()
    }

    fn lower_function(&mut self, func: &FunctionDecl) -> BsResult<()> {
        debug!("ssa: function {}", func.name);
        let is_main = func.name == "main";
        self.begin_function(FunctionContext {
            returns_value: func.returns_value(),
            exit_code: is_main,
            implicit: false,
        });

        let mut params = Vec::with_capacity(func.params.len());
        for param in &func.params {
            let slot = self.declare(&param.name, param.span)?;
            self.emit(Instr::Store {
                ty: IrType::Word,
                value: Operand::Arg(param.name.clone()),
                slot,
            });
            params.push(IrParam {
                name: param.name.clone(),
                ty: IrType::Word,
            });
        }

        for stmt in &func.body.statements {
            self.lower_stmt(stmt)?;
        }

        let body = self.finish_function();
        let return_type = (func.returns_value() || is_main).then_some(IrType::Word);
        self.functions.push(IrFunction {
            name: func.name.clone(),
            exported: func.exported || is_main,
            return_type,
            params,
            slots: std::mem::take(&mut self.slots),
            body,
        });
        Ok(())
    }

    /// Неявная точка входа из инструкций верхнего уровня.
    fn lower_entry(&mut self, statements: &[&Stmt]) -> BsResult<()> {
        self.begin_function(FunctionContext {
            returns_value: false,
            exit_code: true,
            implicit: true,
        });
        for stmt in statements {
            self.lower_stmt(stmt)?;
        }
        let body = self.finish_function();
        self.functions.push(IrFunction {
            name: "main".to_string(),
            exported: true,
            return_type: Some(IrType::Word),
            params: Vec::new(),
            slots: std::mem::take(&mut self.slots),
            body,
        });
        Ok(())
    }

    // ========== Буферы и имена ==========

    fn emit(&mut self, instr: Instr) {
        self.release_operands(&instr);
        if self.frames.is_empty() {
            self.frames.push(InstrFrame::default());
        }
        let needs_label = self
            .frames
            .last()
            .is_some_and(|f| f.terminated && !matches!(instr, Instr::Label(_)));
        if needs_label {
            // После перехода QBE ждёт новую метку.
            let label = Label::new("dead", self.next_counter());
            self.push_instr(Instr::Label(label));
        }
        self.push_instr(instr);
    }

    fn push_instr(&mut self, instr: Instr) {
        if let Some(frame) = self.frames.last_mut() {
            frame.terminated = instr.is_terminator();
            frame.instrs.push(instr);
        }
    }

    fn push_frame(&mut self) {
        self.frames.push(InstrFrame::default());
    }

    fn pop_frame(&mut self) -> InstrFrame {
        self.frames.pop().unwrap_or_default()
    }

    fn is_terminated(&self) -> bool {
        self.frames.last().is_some_and(|f| f.terminated)
    }

    /// Следующий свободный регистр по кругу `a`..`z`.
    ///
    /// Регистр занят, пока его значение не прочитано инструкцией.
    fn next_temp(&mut self, span: Span) -> Result<Temp, CompileError> {
        let start = self.last_temp.map_or(0, |c| (c as u8 - b'a' + 1) % 26);
        let free = (0..26)
            .map(|step| (b'a' + (start + step) % 26) as char)
            .find(|c| !self.live.contains(c));
        let Some(next) = free else {
            return Err(self.error(
                CompileErrorKind::UnsupportedConstruct,
                span,
                "expression needs more than 26 intermediate values",
            ));
        };
        self.live.insert(next);
        self.last_temp = Some(next);
        Ok(Temp(next))
    }

    fn release(&mut self, operand: &Operand) {
        if let Operand::Temp(temp) = operand {
            self.live.remove(&temp.0);
        }
    }

    /// Освободить регистры, которые читает инструкция.
    fn release_operands(&mut self, instr: &Instr) {
        match instr {
            Instr::Binary { lhs, rhs, .. } => {
                self.release(lhs);
                self.release(rhs);
            }
            Instr::Call { args, .. } => {
                for (_, arg) in args {
                    self.release(arg);
                }
            }
            Instr::Store { value, .. } | Instr::Return(Some(value)) => self.release(value),
            Instr::If { test, .. } | Instr::While { test, .. } => {
                self.live.remove(&test.0);
            }
            Instr::For {
                condition: Some((_, test)),
                ..
            } => {
                self.live.remove(&test.0);
            }
            _ => {}
        }
    }

    fn next_counter(&mut self) -> usize {
        self.counter += 1;
        self.counter
    }

    fn error(&self, kind: CompileErrorKind, span: Span, message: impl Into<String>) -> CompileError {
        CompileError::new(kind, &self.file, span, message)
    }

    /// Объявить переменную в текущей области.
    fn declare(&mut self, name: &str, span: Span) -> Result<StackSlot, CompileError> {
        if self.scopes.last().is_some_and(|s| s.contains_key(name)) {
            return Err(self.error(
                CompileErrorKind::DuplicateDeclaration,
                span,
                format!("'{}' is already declared in this scope", name),
            ));
        }
        let count = self.declared.entry(name.to_string()).or_insert(0);
        let slot_name = if *count == 0 {
            format!("p_{}", name)
        } else {
            format!("p_{}.{}", name, count)
        };
        *count += 1;

        let slot = StackSlot {
            name: slot_name,
            ty: IrType::Word,
        };
        self.slots.push(slot.clone());
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), slot.clone());
        }
        Ok(slot)
    }

    fn lookup(&self, name: &str, span: Span) -> Result<StackSlot, CompileError> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .cloned()
            .ok_or_else(|| {
                self.error(
                    CompileErrorKind::UndeclaredIdentifier,
                    span,
                    format!("'{}' is not declared", name),
                )
            })
    }

    // ========== Инструкции ==========

    fn lower_stmt(&mut self, stmt: &Stmt) -> BsResult<()> {
        stacker::maybe_grow(256 * 1024, 8 * 1024 * 1024, || self.lower_stmt_inner(stmt))
    }

    fn lower_stmt_inner(&mut self, stmt: &Stmt) -> BsResult<()> {
        let span = stmt.span;
        match &stmt.kind {
            StmtKind::VarDecl(decl) => {
                let value = match &decl.init {
                    Some(init) => self.lower_expr(init)?,
                    None => self.lower_expr(&Expr::int(0, span))?,
                };
                let slot = self.declare(&decl.name, span)?;
                self.emit(Instr::Store {
                    ty: IrType::Word,
                    value: value.into(),
                    slot,
                });
            }
            StmtKind::Assign(assign) => {
                let slot = self.lookup(&assign.name, span)?;
                let value = self.lower_expr(&assign.value)?;
                self.emit(Instr::Store {
                    ty: IrType::Word,
                    value: value.into(),
                    slot,
                });
            }
            StmtKind::Function(func) => {
                return Err(self
                    .error(
                        CompileErrorKind::UnsupportedConstruct,
                        span,
                        format!("function '{}' must be declared at the top level", func.name),
                    )
                    .into())
            }
            StmtKind::Import(_) => {
                return Err(self
                    .error(
                        CompileErrorKind::UnsupportedConstruct,
                        span,
                        "imports are only allowed at the top level",
                    )
                    .into())
            }
            StmtKind::If(if_stmt) => self.lower_if(if_stmt)?,
            StmtKind::While(while_stmt) => self.lower_while(while_stmt)?,
            StmtKind::For(for_stmt) => self.lower_for(for_stmt)?,
            StmtKind::Block(block) => self.lower_block(block)?,
            StmtKind::Break | StmtKind::Continue => {
                let is_break = matches!(stmt.kind, StmtKind::Break);
                let Some(labels) = self.loop_labels.clone() else {
                    let word = if is_break { "break" } else { "continue" };
                    return Err(self
                        .error(
                            CompileErrorKind::InvalidControlFlow,
                            span,
                            format!("'{}' outside of a loop", word),
                        )
                        .into());
                };
                let target = if is_break {
                    labels.break_label
                } else {
                    labels.continue_label
                };
                self.emit(Instr::Jump(target));
            }
            StmtKind::Return(value) => self.lower_return(value.as_ref(), span)?,
            StmtKind::Exit(value) => self.lower_builtin("exit", value)?,
            StmtKind::Print(value) => self.lower_builtin("print", value)?,
            StmtKind::Call(call) => {
                // Результат вызова-инструкции никто не читает.
                if let Some(temp) = self.lower_call(call, span, false)? {
                    self.live.remove(&temp.0);
                }
            }
        }
        Ok(())
    }

    fn lower_block(&mut self, block: &Block) -> BsResult<()> {
        self.scopes.push(HashMap::new());
        let result = block
            .statements
            .iter()
            .try_for_each(|stmt| self.lower_stmt(stmt));
        self.scopes.pop();
        result
    }

    fn lower_builtin(&mut self, name: &str, value: &Expr) -> BsResult<()> {
        let arg = self.lower_expr(value)?;
        self.emit(Instr::Call {
            dest: None,
            callee: Callee::External(name.to_string()),
            args: vec![(IrType::Word, arg.into())],
        });
        Ok(())
    }

    fn lower_if(&mut self, stmt: &IfStmt) -> BsResult<()> {
        let id = self.next_counter();

        self.push_frame();
        let test = self.lower_expr(&stmt.test);
        let condition = self.pop_frame().instrs;
        let test = test?;

        self.push_frame();
        let then_result = self.lower_block(&stmt.consequent);
        if stmt.alternate.is_some() && !self.is_terminated() {
            self.emit(Instr::Jump(Label::new("end", id)));
        }
        let then_body = self.pop_frame().instrs;
        then_result?;

        let else_body = match &stmt.alternate {
            Some(alternate) => {
                self.push_frame();
                let result = self.lower_block(alternate);
                let body = self.pop_frame().instrs;
                result?;
                Some(body)
            }
            None => None,
        };

        self.emit(Instr::If {
            id,
            condition,
            test,
            then_body,
            else_body,
        });
        Ok(())
    }

    /// Понизить тело цикла с заданными метками `break`/`continue`.
    fn lower_loop_body(&mut self, body: &Block, labels: LoopLabels) -> BsResult<()> {
        let saved = self.loop_labels.replace(labels);
        let result = self.lower_block(body);
        self.loop_labels = saved;
        result
    }

    fn lower_while(&mut self, stmt: &WhileStmt) -> BsResult<()> {
        let id = self.next_counter();

        self.push_frame();
        let test = self.lower_expr(&stmt.test);
        let condition = self.pop_frame().instrs;
        let test = test?;

        self.push_frame();
        let result = self.lower_loop_body(
            &stmt.body,
            LoopLabels {
                continue_label: Label::new("loop", id),
                break_label: Label::new("end", id),
            },
        );
        if !self.is_terminated() {
            self.emit(Instr::Jump(Label::new("loop", id)));
        }
        let body = self.pop_frame().instrs;
        result?;

        self.emit(Instr::While {
            id,
            condition,
            test,
            body,
        });
        Ok(())
    }

    fn lower_for(&mut self, stmt: &ForStmt) -> BsResult<()> {
        // Переменная из init видна только внутри цикла.
        self.scopes.push(HashMap::new());
        let result = self.lower_for_inner(stmt);
        self.scopes.pop();
        result
    }

    fn lower_for_inner(&mut self, stmt: &ForStmt) -> BsResult<()> {
        if let Some(init) = &stmt.init {
            self.lower_stmt(init)?;
        }
        let id = self.next_counter();

        let condition = match &stmt.test {
            Some(test) => {
                self.push_frame();
                let temp = self.lower_expr(test);
                let instrs = self.pop_frame().instrs;
                Some((instrs, temp?))
            }
            None => None,
        };

        self.push_frame();
        let result = self.lower_loop_body(
            &stmt.body,
            LoopLabels {
                continue_label: Label::new("next", id),
                break_label: Label::new("end", id),
            },
        );
        let body = self.pop_frame().instrs;
        result?;

        self.push_frame();
        let result = match &stmt.update {
            Some(update) => self.lower_stmt(update),
            None => Ok(()),
        };
        if !self.is_terminated() {
            self.emit(Instr::Jump(Label::new("loop", id)));
        }
        let update = self.pop_frame().instrs;
        result?;

        self.emit(Instr::For {
            id,
            condition,
            body,
            update,
        });
        Ok(())
    }

    fn lower_return(&mut self, value: Option<&Expr>, span: Span) -> BsResult<()> {
        let Some(ctx) = self.current_fn.filter(|ctx| !ctx.implicit) else {
            return Err(self
                .error(
                    CompileErrorKind::InvalidControlFlow,
                    span,
                    "'return' outside of a function",
                )
                .into());
        };
        let operand = match (value, ctx.returns_value) {
            (Some(value), true) => Some(self.lower_expr(value)?.into()),
            (None, false) => ctx.exit_code.then_some(Operand::Const(0)),
            (Some(_), false) => {
                return Err(self
                    .error(
                        CompileErrorKind::InvalidControlFlow,
                        span,
                        "a void function cannot return a value",
                    )
                    .into())
            }
            (None, true) => {
                return Err(self
                    .error(
                        CompileErrorKind::InvalidControlFlow,
                        span,
                        "missing return value",
                    )
                    .into())
            }
        };
        self.emit(Instr::Return(operand));
        Ok(())
    }

    fn lower_call(&mut self, call: &Call, span: Span, want_value: bool) -> BsResult<Option<Temp>> {
        let Some(sig) = self.signatures.get(&call.name).copied() else {
            return Err(self
                .error(
                    CompileErrorKind::UndeclaredIdentifier,
                    span,
                    format!("function '{}' is not declared", call.name),
                )
                .into());
        };
        if sig.params != call.args.len() {
            return Err(self
                .error(
                    CompileErrorKind::ArityMismatch,
                    span,
                    format!(
                        "'{}' expects {} arguments, got {}",
                        call.name,
                        sig.params,
                        call.args.len()
                    ),
                )
                .into());
        }
        if want_value && !sig.returns_value {
            return Err(self
                .error(
                    CompileErrorKind::UnsupportedConstruct,
                    span,
                    format!("'{}' does not return a value", call.name),
                )
                .into());
        }

        let mut args = Vec::with_capacity(call.args.len());
        for arg in &call.args {
            let temp = self.lower_expr(arg)?;
            args.push((IrType::Word, temp.into()));
        }
        let dest = if sig.returns_value {
            Some(self.next_temp(span)?)
        } else {
            None
        };
        self.emit(Instr::Call {
            dest: dest.map(|t| (t, IrType::Word)),
            callee: Callee::User(call.name.clone()),
            args,
        });
        Ok(dest)
    }

    // ========== Выражения ==========

    fn lower_expr(&mut self, expr: &Expr) -> BsResult<Temp> {
        stacker::maybe_grow(256 * 1024, 8 * 1024 * 1024, || self.lower_expr_inner(expr))
    }

    fn lower_expr_inner(&mut self, expr: &Expr) -> BsResult<Temp> {
        match &expr.kind {
            ExprKind::Literal(literal) => {
                let value = match literal {
                    Literal::String(text) => LiteralValue::Text(text.clone()),
                    other => LiteralValue::Int(other.as_int().unwrap_or_default()),
                };
                let dest = self.next_temp(expr.span)?;
                self.emit(Instr::Literal {
                    dest,
                    ty: IrType::Word,
                    value,
                });
                Ok(dest)
            }
            ExprKind::Variable(name) => {
                let slot = self.lookup(name, expr.span)?;
                let dest = self.next_temp(expr.span)?;
                self.emit(Instr::Load {
                    dest,
                    ty: IrType::Word,
                    slot,
                });
                Ok(dest)
            }
            ExprKind::Binary { op, lhs, rhs } => {
                if is_string(lhs) || is_string(rhs) {
                    return Err(self
                        .error(
                            CompileErrorKind::UnsupportedOperator,
                            expr.span,
                            format!("operator '{}' cannot be applied to strings", op.symbol()),
                        )
                        .into());
                }
                let lhs = self.lower_expr(lhs)?;
                let rhs = self.lower_expr(rhs)?;
                Ok(self.lower_binary(*op, lhs, rhs, expr.span)?)
            }
            ExprKind::Unary { op, operand } => {
                let value = self.lower_expr(operand)?;
                let (opcode, lhs, rhs) = match op {
                    UnaryOp::Neg => ("sub", Operand::Const(0), value.into()),
                    UnaryOp::Not => ("ceqw", value.into(), Operand::Const(0)),
                };
                Ok(self.binary(opcode, lhs, rhs, expr.span)?)
            }
            ExprKind::Call(call) => {
                let temp = self.lower_call(call, expr.span, true)?;
                temp.ok_or_else(|| {
                    self.error(
                        CompileErrorKind::Internal,
                        expr.span,
                        "call produced no value",
                    )
                    .into()
                })
            }
        }
    }

    fn lower_binary(
        &mut self,
        op: BinaryOp,
        lhs: Temp,
        rhs: Temp,
        span: Span,
    ) -> Result<Temp, CompileError> {
        let opcode = match op {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::Rem => "rem",
            BinaryOp::BitAnd => "and",
            BinaryOp::BitOr => "or",
            BinaryOp::Eq => "ceqw",
            BinaryOp::Ne => "cnew",
            BinaryOp::Lt => "csltw",
            BinaryOp::Gt => "csgtw",
            BinaryOp::Le => "cslew",
            BinaryOp::Ge => "csgew",
            BinaryOp::And | BinaryOp::Or => {
                // Логические операции над нормализованными 0/1.
                let l = self.binary("cnew", lhs.into(), Operand::Const(0), span)?;
                let r = self.binary("cnew", rhs.into(), Operand::Const(0), span)?;
                let opcode = if op == BinaryOp::And { "and" } else { "or" };
                return self.binary(opcode, l.into(), r.into(), span);
            }
        };
        self.binary(opcode, lhs.into(), rhs.into(), span)
    }

    fn binary(
        &mut self,
        op: &'static str,
        lhs: Operand,
        rhs: Operand,
        span: Span,
    ) -> Result<Temp, CompileError> {
        let dest = self.next_temp(span)?;
        self.emit(Instr::Binary {
            dest,
            ty: IrType::Word,
            op,
            lhs,
            rhs,
        });
        Ok(dest)
    }
}

fn is_string(expr: &Expr) -> bool {
    matches!(expr.kind, ExprKind::Literal(Literal::String(_)))
}

/// Понизить корневую программу вместе с импортами.
pub fn compile(program: &Program, linker: &mut ModuleLinker) -> BsResult<IrProgram> {
    let (module, _) = IrBuilder::new(&program.file, linker, true).build(program)?;
    Ok(IrProgram {
        imports: std::mem::take(linker).into_modules(),
        module,
    })
}
