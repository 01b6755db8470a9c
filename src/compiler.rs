//! Модуль `compiler`
//!
//! Конвейер сборки: чтение исходника, разбор, понижение выбранным
//! бэкендом, запись текстового артефакта и вызов внешних инструментов.
//!
//! Понижение выполняется целиком до того, как трогается выходной
//! каталог: при ошибке компиляции на диске ничего не меняется.

use std::ffi::OsStr;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::ValueEnum;
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{BsError, BsResult};
use crate::modules::{ModuleLinker, ModuleResolver};
use crate::native_backend::NativeGenerator;
use crate::parser;
use crate::ssa::runtime::c_runtime;
use crate::ssa_backend;
use crate::toolchain;

/// Бэкенд кодогенерации.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// x86-64 NASM + ld.
    #[default]
    Native,
    /// SSA IR + qbe + cc.
    Ssa,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Native => "native",
            Backend::Ssa => "ssa",
        }
    }

    /// Расширение текстового артефакта.
    pub fn extension(&self) -> &'static str {
        match self {
            Backend::Native => "asm",
            Backend::Ssa => "ssa",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = BsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "native" | "asm" => Ok(Backend::Native),
            "ssa" | "qbe" => Ok(Backend::Ssa),
            other => Err(BsError::Config(format!("unknown backend '{}'", other))),
        }
    }
}

/// Имена внешних инструментов.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tools {
    pub assembler: String,
    pub linker: String,
    pub qbe: String,
    pub cc: String,
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            assembler: "nasm".to_string(),
            linker: "ld".to_string(),
            qbe: "qbe".to_string(),
            cc: "cc".to_string(),
        }
    }
}

/// Параметры компиляции.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub backend: Backend,
    pub out_dir: PathBuf,
    pub artifact_name: String,
    /// Корень библиотеки: первый путь поиска модулей.
    pub library_root: Option<PathBuf>,
    pub search_paths: Vec<PathBuf>,
    pub tools: Tools,
    /// Только записать текстовый артефакт, без вызова инструментов.
    pub emit_only: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            out_dir: PathBuf::from("build"),
            artifact_name: "out".to_string(),
            library_root: None,
            search_paths: Vec::new(),
            tools: Tools::default(),
            emit_only: false,
        }
    }
}

impl CompileOptions {
    fn artifact(&self, suffix: &str) -> PathBuf {
        self.out_dir.join(format!("{}{}", self.artifact_name, suffix))
    }

    /// Пути поиска модулей для входного файла `file`.
    fn resolver_for(&self, file: &Path) -> ModuleResolver {
        let mut paths = Vec::new();
        if let Some(root) = &self.library_root {
            paths.push(root.clone());
        }
        let dir = file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        paths.push(dir);
        let mut resolver = ModuleResolver::with_search_paths(paths);
        for path in &self.search_paths {
            resolver.add_search_path(path.clone());
        }
        resolver
    }
}

/// Результат понижения: текст для внешнего инструмента.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub backend: Backend,
    /// Ассемблер NASM или SSA IR.
    pub text: String,
    /// C-рантайм, если программа вызывает `print` (только SSA).
    pub runtime: Option<String>,
}

/// Файлы, созданные сборкой.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildOutput {
    pub artifact: PathBuf,
    /// Исполняемый файл; `None` при `emit_only`.
    pub executable: Option<PathBuf>,
}

/// Понизить исходный текст выбранным бэкендом, не касаясь выходного
/// каталога.
pub fn compile_source(source: &str, file: &str, options: &CompileOptions) -> BsResult<Artifact> {
    info!("compiling {} with the {} backend", file, options.backend);
    let program = parser::parse(source, file)?;

    match options.backend {
        Backend::Native => {
            let text = NativeGenerator::new(file).compile(&program)?;
            Ok(Artifact {
                backend: Backend::Native,
                text,
                runtime: None,
            })
        }
        Backend::Ssa => {
            let path = Path::new(file);
            let mut linker = ModuleLinker::new(options.resolver_for(path));
            linker.enter_root(path);
            let ir = ssa_backend::compile(&program, &mut linker)?;
            let runtime = ir.uses_print().then(|| c_runtime().to_string());
            Ok(Artifact {
                backend: Backend::Ssa,
                text: ir.to_string(),
                runtime,
            })
        }
    }
}

/// Скомпилировать файл в исполняемый файл.
pub fn compile_file(path: &Path, options: &CompileOptions) -> BsResult<BuildOutput> {
    let source = fs::read_to_string(path)
        .map_err(|e| BsError::Io(format!("{}: {}", path.display(), e)))?;
    let artifact = compile_source(&source, &path.display().to_string(), options)?;

    prepare_out_dir(&options.out_dir)?;
    let text_path = options.artifact(&format!(".{}", artifact.backend.extension()));
    fs::write(&text_path, &artifact.text)?;
    info!("wrote {}", text_path.display());

    let runtime_path = match &artifact.runtime {
        Some(runtime) => {
            let path = options.artifact("_rt.c");
            fs::write(&path, runtime)?;
            info!("wrote {}", path.display());
            Some(path)
        }
        None => None,
    };

    if options.emit_only {
        return Ok(BuildOutput {
            artifact: text_path,
            executable: None,
        });
    }

    let executable = options.artifact("");
    match artifact.backend {
        Backend::Native => {
            let object = options.artifact(".o");
            toolchain::run(
                &options.tools.assembler,
                [
                    OsStr::new("-felf64"),
                    OsStr::new("-o"),
                    object.as_os_str(),
                    text_path.as_os_str(),
                ],
            )?;
            toolchain::run(
                &options.tools.linker,
                [OsStr::new("-o"), executable.as_os_str(), object.as_os_str()],
            )?;
        }
        Backend::Ssa => {
            let assembly = options.artifact(".s");
            toolchain::run(
                &options.tools.qbe,
                [OsStr::new("-o"), assembly.as_os_str(), text_path.as_os_str()],
            )?;
            let mut args = vec![
                OsStr::new("-o"),
                executable.as_os_str(),
                assembly.as_os_str(),
            ];
            if let Some(runtime) = &runtime_path {
                args.push(runtime.as_os_str());
            }
            toolchain::run(&options.tools.cc, args)?;
        }
    }
    info!("built {}", executable.display());

    Ok(BuildOutput {
        artifact: text_path,
        executable: Some(executable),
    })
}

/// Очистить и заново создать выходной каталог.
fn prepare_out_dir(dir: &Path) -> BsResult<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompileErrorKind;
    use log::warn;
    use std::process::Command;
    use tempfile::tempdir;

    fn options(dir: &Path, backend: Backend) -> CompileOptions {
        CompileOptions {
            backend,
            out_dir: dir.join("build"),
            ..CompileOptions::default()
        }
    }

    /// Инструменты бэкенда, которых нет в `PATH`.
    fn missing_tools(backend: Backend) -> Vec<String> {
        let tools = Tools::default();
        let needed = match backend {
            Backend::Native => [tools.assembler, tools.linker],
            Backend::Ssa => [tools.qbe, tools.cc],
        };
        needed
            .into_iter()
            .filter(|tool| !toolchain::is_available(tool))
            .collect()
    }

    /// Собрать и запустить программу; `None`, если инструментов нет.
    fn run_program(source: &str, backend: Backend) -> Option<i32> {
        let missing = missing_tools(backend);
        if !missing.is_empty() {
            warn!("skipping {} run: {} not on PATH", backend, missing.join(", "));
            eprintln!(
                "skipping {} exit-code check, {} not on PATH",
                backend,
                missing.join(", ")
            );
            return None;
        }
        let dir = tempdir().unwrap();
        let entry = dir.path().join("main.bs");
        fs::write(&entry, source).unwrap();
        let output = compile_file(&entry, &options(dir.path(), backend)).unwrap();
        let status = Command::new(output.executable.unwrap()).status().unwrap();
        status.code()
    }

    const PROGRAMS: &[(&str, i32)] = &[
        ("exit(0);", 0),
        ("exit(69);", 69),
        ("var x = 10; exit(x);", 10),
        ("var a = 10; var b = 14; exit(a + b);", 24),
        ("exit(300);", 44),
        ("exit(17 / 5 + 17 % 5);", 5),
        ("var n = 3; if (n > 2) { exit(100); } exit(1);", 100),
        ("var i = 0; var s = 0; while (i < 10) { i += 1; if (i % 2 == 0) { continue; } s += i; } exit(s);", 25),
        ("var s = 0; for (var i = 1; i <= 10; i += 1) { if (i == 6) { break; } s += i; } exit(s);", 15),
        ("var x = 1; { var x = 2; x = 5; } exit(x);", 1),
        ("fn fib(n: int32): int32 { if (n < 2) { return n; } return fib(n - 1) + fib(n - 2); } exit(fib(9));", 34),
        ("fn fact(n: int32): int32 { var r = 1; while (n > 1) { r *= n; n -= 1; } return r; } exit(fact(4));", 24),
        ("fn gcd(a: int32, b: int32): int32 { while (b != 0) { var t = a % b; a = b; b = t; } return a; } exit(gcd(42, 56));", 14),
        ("fn main(): int32 { return 8; }", 8),
        ("exit(!0 + (3 > 2 && 1 < 0) + (0 || 5));", 2),
    ];

    #[test]
    fn test_native_exit_codes() {
        for (source, expected) in PROGRAMS {
            if let Some(code) = run_program(source, Backend::Native) {
                assert_eq!(code, *expected, "native: {}", source);
            }
        }
    }

    #[test]
    fn test_ssa_exit_codes() {
        for (source, expected) in PROGRAMS {
            if let Some(code) = run_program(source, Backend::Ssa) {
                assert_eq!(code, *expected, "ssa: {}", source);
            }
        }
    }

    #[test]
    fn test_missing_tools_are_reported() {
        for backend in [Backend::Native, Backend::Ssa] {
            for tool in missing_tools(backend) {
                assert!(!toolchain::is_available(&tool));
            }
        }
    }

    #[test]
    fn test_backends_agree() {
        let source = "var a = 7; var b = 3; exit(a * b - a / b + a % b);";
        let native = run_program(source, Backend::Native);
        let ssa = run_program(source, Backend::Ssa);
        if let (Some(native), Some(ssa)) = (native, ssa) {
            assert_eq!(native, ssa);
            assert_eq!(native, 20);
        }
    }

    #[test]
    fn test_emit_only_writes_artifacts() {
        let dir = tempdir().unwrap();
        let entry = dir.path().join("main.bs");
        fs::write(&entry, "print(42);").unwrap();

        let mut opts = options(dir.path(), Backend::Ssa);
        opts.emit_only = true;
        opts.artifact_name = "prog".to_string();
        let output = compile_file(&entry, &opts).unwrap();
        assert_eq!(output.artifact, dir.path().join("build/prog.ssa"));
        assert!(output.executable.is_none());
        let text = fs::read_to_string(&output.artifact).unwrap();
        assert!(text.contains("call $print(w %a)"));
        assert!(dir.path().join("build/prog_rt.c").is_file());

        opts.backend = Backend::Native;
        let output = compile_file(&entry, &opts).unwrap();
        let text = fs::read_to_string(output.artifact).unwrap();
        assert!(text.starts_with("global _start\n"));
        // Каталог пересоздаётся: файлы прошлой сборки удалены.
        assert!(!dir.path().join("build/prog.ssa").exists());
    }

    #[test]
    fn test_failed_lowering_leaves_out_dir() {
        let dir = tempdir().unwrap();
        let entry = dir.path().join("main.bs");
        fs::write(&entry, "exit(y);").unwrap();
        let opts = options(dir.path(), Backend::Native);
        fs::create_dir_all(&opts.out_dir).unwrap();
        fs::write(opts.out_dir.join("keep.txt"), "x").unwrap();

        match compile_file(&entry, &opts) {
            Err(BsError::Compile(err)) => {
                assert_eq!(err.kind, CompileErrorKind::UndeclaredIdentifier)
            }
            other => panic!("Expected compile error, got {:?}", other),
        }
        assert!(opts.out_dir.join("keep.txt").exists());
    }

    #[test]
    fn test_ssa_imports_are_linked() {
        let dir = tempdir().unwrap();
        let lib = dir.path().join("lib");
        fs::create_dir(&lib).unwrap();
        fs::write(lib.join("math.bs"), "export fn sq(n: int32): int32 { return n * n; }").unwrap();
        fs::write(
            dir.path().join("twice.bs"),
            "import { sq } from \"math\";\nfn quad(n: int32): int32 { return sq(sq(n)); }",
        )
        .unwrap();
        let source = "import { sq } from \"math\";\nimport { quad } from \"./twice\";\nexit(sq(3) + quad(2));";
        let file = dir.path().join("main.bs").display().to_string();

        let opts = CompileOptions {
            backend: Backend::Ssa,
            library_root: Some(lib),
            ..CompileOptions::default()
        };
        let artifact = compile_source(source, &file, &opts).unwrap();
        assert_eq!(artifact.text.matches("function w $bs_sq(").count(), 1);
        assert!(artifact.text.find("$bs_sq(").unwrap() < artifact.text.find("$bs_quad(").unwrap());
        assert!(artifact.text.contains("export function w $main()"));
        assert!(artifact.runtime.is_none());
    }

    #[test]
    fn test_native_rejects_imports() {
        let opts = CompileOptions::default();
        match compile_source("import { f } from \"m\";", "main.bs", &opts) {
            Err(BsError::Compile(err)) => {
                assert_eq!(err.kind, CompileErrorKind::UnsupportedConstruct)
            }
            other => panic!("Expected compile error, got {:?}", other),
        }
    }

    #[test]
    fn test_syntax_error_names_file() {
        let opts = CompileOptions::default();
        let err = compile_source("var = 1;", "bad.bs", &opts).unwrap_err();
        assert!(matches!(err, BsError::Syntax { ref file, .. } if file == "bad.bs"));
    }

    #[test]
    fn test_backend_parsing() {
        assert_eq!("native".parse::<Backend>().unwrap(), Backend::Native);
        assert_eq!("qbe".parse::<Backend>().unwrap(), Backend::Ssa);
        assert!("llvm".parse::<Backend>().is_err());
        assert_eq!(Backend::Ssa.to_string(), "ssa");
        assert_eq!(Backend::Native.extension(), "asm");
    }
}
