//! C-рантайм для SSA бэкенда.
//!
//! QBE не знает ничего о вводе-выводе, поэтому `print` реализуется
//! маленьким файлом на C, который компонуется вместе с программой.

/// Исходный код рантайма.
pub fn c_runtime() -> &'static str {
    "#include <stdio.h>\n\
     \n\
     void print(int value) {\n    printf(\"%d\\n\", value);\n}\n"
}
