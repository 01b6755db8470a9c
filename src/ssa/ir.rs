//! Модель SSA IR (входной язык QBE) и её текстовое представление.
//!
//! Печать детерминирована: функции идут в порядке объявления,
//! инструкции в порядке списка, импортированные модули перед
//! импортирующим. Принтер ничего не переупорядочивает и не сливает.

use std::fmt;

/// Отступ инструкций внутри функции.
pub const INDENT: &str = "  ";

/// Базовые типы QBE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrType {
    /// 32-битное слово.
    Word,
    /// 64-битное слово (указатели).
    Long,
}

impl IrType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IrType::Word => "w",
            IrType::Long => "l",
        }
    }

    pub fn bytes(&self) -> usize {
        match self {
            IrType::Word => 4,
            IrType::Long => 8,
        }
    }
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Временное значение `%a`..`%z`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Temp(pub char);

impl fmt::Display for Temp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Операнд инструкции.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Temp(Temp),
    Const(i64),
    /// Входной параметр функции, `%arg_<name>`.
    Arg(String),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Temp(t) => write!(f, "{}", t),
            Operand::Const(n) => write!(f, "{}", n),
            Operand::Arg(name) => write!(f, "%arg_{}", name),
        }
    }
}

impl From<Temp> for Operand {
    fn from(t: Temp) -> Self {
        Operand::Temp(t)
    }
}

/// Метка блока `@<prefix>_<id>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub prefix: &'static str,
    pub id: usize,
}

impl Label {
    pub fn new(prefix: &'static str, id: usize) -> Self {
        Self { prefix, id }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}_{}", self.prefix, self.id)
    }
}

/// Ячейка стека переменной, `%<name>`. Память выделяется в `@start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackSlot {
    pub name: String,
    pub ty: IrType,
}

impl fmt::Display for StackSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.name)
    }
}

/// Вызываемая функция.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callee {
    /// Пользовательская функция (имя искажается, кроме `main`).
    User(String),
    /// Внешний символ (`exit`, `print`).
    External(String),
}

impl fmt::Display for Callee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callee::User(name) => write!(f, "${}", mangle(name)),
            Callee::External(name) => write!(f, "${}", name),
        }
    }
}

/// Имя символа пользовательской функции.
pub fn mangle(name: &str) -> String {
    if name == "main" {
        name.to_string()
    } else {
        format!("bs_{}", name)
    }
}

/// Значение литерала.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiteralValue {
    Int(i64),
    /// Строковый литерал печатается как есть.
    Text(String),
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralValue::Int(n) => write!(f, "{}", n),
            LiteralValue::Text(s) => f.write_str(s),
        }
    }
}

/// Инструкция IR.
#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    /// `%t =w copy <value>`
    Literal {
        dest: Temp,
        ty: IrType,
        value: LiteralValue,
    },
    /// `%t =w loadw %slot`
    Load {
        dest: Temp,
        ty: IrType,
        slot: StackSlot,
    },
    /// `%t =w <op> <lhs>, <rhs>`
    Binary {
        dest: Temp,
        ty: IrType,
        op: &'static str,
        lhs: Operand,
        rhs: Operand,
    },
    /// `[%t =w] call $f(w %a, ...)`
    Call {
        dest: Option<(Temp, IrType)>,
        callee: Callee,
        args: Vec<(IrType, Operand)>,
    },
    /// `storew <value>, %slot`
    Store {
        ty: IrType,
        value: Operand,
        slot: StackSlot,
    },
    Return(Option<Operand>),
    Jump(Label),
    Label(Label),
    /// Условие с ветками. Без `else` переход идёт сразу на `end`.
    If {
        id: usize,
        condition: Vec<Instr>,
        test: Temp,
        then_body: Vec<Instr>,
        else_body: Option<Vec<Instr>>,
    },
    While {
        id: usize,
        condition: Vec<Instr>,
        test: Temp,
        body: Vec<Instr>,
    },
    /// Цикл `for`: условие может отсутствовать.
    For {
        id: usize,
        condition: Option<(Vec<Instr>, Temp)>,
        body: Vec<Instr>,
        update: Vec<Instr>,
    },
}

impl Instr {
    /// Завершает ли инструкция базовый блок.
    pub fn is_terminator(&self) -> bool {
        matches!(self, Instr::Return(_) | Instr::Jump(_))
    }

    /// Используется ли внешний символ `name` (включая вложенные инструкции).
    pub fn calls_external(&self, name: &str) -> bool {
        match self {
            Instr::Call {
                callee: Callee::External(callee),
                ..
            } => callee == name,
            Instr::If {
                condition,
                then_body,
                else_body,
                ..
            } => {
                any_calls(condition, name)
                    || any_calls(then_body, name)
                    || else_body.as_ref().is_some_and(|b| any_calls(b, name))
            }
            Instr::While {
                condition, body, ..
            } => any_calls(condition, name) || any_calls(body, name),
            Instr::For {
                condition,
                body,
                update,
                ..
            } => {
                condition.as_ref().is_some_and(|(c, _)| any_calls(c, name))
                    || any_calls(body, name)
                    || any_calls(update, name)
            }
            _ => false,
        }
    }
}

fn any_calls(instrs: &[Instr], name: &str) -> bool {
    instrs.iter().any(|i| i.calls_external(name))
}

fn write_all(f: &mut fmt::Formatter<'_>, instrs: &[Instr]) -> fmt::Result {
    for instr in instrs {
        write!(f, "{}", instr)?;
    }
    Ok(())
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::Literal { dest, ty, value } => {
                writeln!(f, "{INDENT}{} ={} copy {}", dest, ty, value)
            }
            Instr::Load { dest, ty, slot } => {
                writeln!(f, "{INDENT}{} ={} load{} {}", dest, ty, ty, slot)
            }
            Instr::Binary {
                dest,
                ty,
                op,
                lhs,
                rhs,
            } => writeln!(f, "{INDENT}{} ={} {} {}, {}", dest, ty, op, lhs, rhs),
            Instr::Call { dest, callee, args } => {
                f.write_str(INDENT)?;
                if let Some((temp, ty)) = dest {
                    write!(f, "{} ={} ", temp, ty)?;
                }
                write!(f, "call {}(", callee)?;
                for (i, (ty, arg)) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{} {}", ty, arg)?;
                }
                writeln!(f, ")")
            }
            Instr::Store { ty, value, slot } => {
                writeln!(f, "{INDENT}store{} {}, {}", ty, value, slot)
            }
            Instr::Return(None) => writeln!(f, "{INDENT}ret"),
            Instr::Return(Some(value)) => writeln!(f, "{INDENT}ret {}", value),
            Instr::Jump(label) => writeln!(f, "{INDENT}jmp {}", label),
            Instr::Label(label) => writeln!(f, "{}", label),
            Instr::If {
                id,
                condition,
                test,
                then_body,
                else_body,
            } => {
                let when = Label::new("when", *id);
                let then = Label::new("then", *id);
                let end = Label::new("end", *id);
                write_all(f, condition)?;
                let otherwise = if else_body.is_some() { &then } else { &end };
                writeln!(f, "{INDENT}jnz {}, {}, {}", test, when, otherwise)?;
                writeln!(f, "{}", when)?;
                write_all(f, then_body)?;
                if let Some(else_body) = else_body {
                    writeln!(f, "{}", then)?;
                    write_all(f, else_body)?;
                }
                writeln!(f, "{}", end)
            }
            Instr::While {
                id,
                condition,
                test,
                body,
            } => {
                let head = Label::new("loop", *id);
                let start = Label::new("body", *id);
                let end = Label::new("end", *id);
                writeln!(f, "{}", head)?;
                write_all(f, condition)?;
                writeln!(f, "{INDENT}jnz {}, {}, {}", test, start, end)?;
                writeln!(f, "{}", start)?;
                write_all(f, body)?;
                writeln!(f, "{}", end)
            }
            Instr::For {
                id,
                condition,
                body,
                update,
            } => {
                let head = Label::new("loop", *id);
                let start = Label::new("body", *id);
                let next = Label::new("next", *id);
                let end = Label::new("end", *id);
                writeln!(f, "{}", head)?;
                if let Some((condition, test)) = condition {
                    write_all(f, condition)?;
                    writeln!(f, "{INDENT}jnz {}, {}, {}", test, start, end)?;
                }
                writeln!(f, "{}", start)?;
                write_all(f, body)?;
                writeln!(f, "{}", next)?;
                write_all(f, update)?;
                writeln!(f, "{}", end)
            }
        }
    }
}

/// Параметр функции.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrParam {
    pub name: String,
    pub ty: IrType,
}

/// Функция IR.
#[derive(Debug, Clone, PartialEq)]
pub struct IrFunction {
    pub name: String,
    pub exported: bool,
    /// `None` для void.
    pub return_type: Option<IrType>,
    pub params: Vec<IrParam>,
    /// Ячейки переменных, выделяемые в `@start`.
    pub slots: Vec<StackSlot>,
    pub body: Vec<Instr>,
}

impl fmt::Display for IrFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.exported {
            f.write_str("export ")?;
        }
        f.write_str("function ")?;
        if let Some(ty) = self.return_type {
            write!(f, "{} ", ty)?;
        }
        write!(f, "${}(", mangle(&self.name))?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} {}", param.ty, Operand::Arg(param.name.clone()))?;
        }
        writeln!(f, ") {{")?;
        writeln!(f, "@start")?;
        for slot in &self.slots {
            writeln!(f, "{INDENT}{} =l alloc4 {}", slot, slot.ty.bytes())?;
        }
        write_all(f, &self.body)?;
        writeln!(f, "}}")
    }
}

/// Модуль IR: функции одного файла.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IrModule {
    /// Исходный файл (для диагностики и журнала).
    pub file: String,
    pub functions: Vec<IrFunction>,
}

impl IrModule {
    pub fn calls_external(&self, name: &str) -> bool {
        self.functions
            .iter()
            .any(|func| any_calls(&func.body, name))
    }
}

impl fmt::Display for IrModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for func in &self.functions {
            write!(f, "{}", func)?;
        }
        Ok(())
    }
}

/// Результат компиляции: основной модуль и импортированные модули в
/// порядке зависимостей (самые глубокие первыми).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IrProgram {
    pub imports: Vec<IrModule>,
    pub module: IrModule,
}

impl IrProgram {
    pub fn into_parts(self) -> (IrModule, Vec<IrModule>) {
        (self.module, self.imports)
    }

    /// Нужна ли программе функция `print` из C-рантайма.
    pub fn uses_print(&self) -> bool {
        self.imports
            .iter()
            .chain(std::iter::once(&self.module))
            .any(|m| m.calls_external("print"))
    }
}

impl fmt::Display for IrProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for module in &self.imports {
            write!(f, "{}", module)?;
        }
        write!(f, "{}", self.module)
    }
}
