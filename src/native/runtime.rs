//! Встроенные ассемблерные процедуры.
//!
//! Добавляются в конец сгенерированного файла только если программа
//! их использует.

/// Имя процедуры печати числа.
pub const PRINT_SYMBOL: &str = "__bs_print";

/// Печать знакового 64-битного числа и перевода строки через `write`.
///
/// Аргумент передаётся через стек, процедура снимает его сама (`ret 8`).
const PRINT_ROUTINE: &str = "\
__bs_print:
    push rbp
    mov rbp, rsp
    sub rsp, 32
    mov rax, QWORD [rbp + 16]
    lea rsi, [rbp - 1]
    mov byte [rsi], 10
    mov rcx, 1
    mov r8, rax
    test rax, rax
    jns .digits
    neg rax
.digits:
    xor rdx, rdx
    mov r9, 10
    div r9
    add dl, '0'
    dec rsi
    mov byte [rsi], dl
    inc rcx
    test rax, rax
    jnz .digits
    test r8, r8
    jns .write
    dec rsi
    mov byte [rsi], '-'
    inc rcx
.write:
    mov rax, 1
    mov rdi, 1
    mov rdx, rcx
    syscall
    mov rsp, rbp
    pop rbp
    ret 8
";

/// Генератор встроенных процедур.
pub struct RuntimeGenerator;

impl RuntimeGenerator {
    /// Текст процедур, нужных программе.
    pub fn routines(uses_print: bool) -> String {
        let mut out = String::new();
        if uses_print {
            out.push('\n');
            out.push_str(PRINT_ROUTINE);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routines_only_when_used() {
        assert!(RuntimeGenerator::routines(false).is_empty());
        let text = RuntimeGenerator::routines(true);
        assert!(text.contains(&format!("{}:", PRINT_SYMBOL)));
        assert!(text.trim_end().ends_with("ret 8"));
    }
}
