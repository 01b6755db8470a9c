//! Компоновщик модулей.
//!
//! Загружает импортированные файлы, понижает их в IR отдельным
//! построителем и хранит готовые модули в порядке зависимостей.
//! Каждый файл понижается один раз за компиляцию.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use crate::error::{BsResult, CompileError, CompileErrorKind};
use crate::parser::{self, Span};
use crate::ssa::ir::IrModule;
use crate::ssa_backend::IrBuilder;

use super::{ModuleInterface, ModuleResolver};

/// Компоновщик модулей.
#[derive(Debug)]
pub struct ModuleLinker {
    /// Резолвер путей
    resolver: ModuleResolver,
    /// Уже понижённые модули: канонический путь -> интерфейс
    loaded: HashMap<PathBuf, ModuleInterface>,
    /// Модули в процессе загрузки (для детекции циклов)
    loading: HashSet<PathBuf>,
    /// Понижённые модули, самые глубокие первыми
    modules: Vec<IrModule>,
    /// Функции всех понижённых модулей: имя -> файл
    symbols: HashMap<String, String>,
}

impl ModuleLinker {
    pub fn new(resolver: ModuleResolver) -> Self {
        Self {
            resolver,
            loaded: HashMap::new(),
            loading: HashSet::new(),
            modules: Vec::new(),
            symbols: HashMap::new(),
        }
    }

    /// Отметить корневой файл, чтобы импорт обратно в него был циклом.
    pub fn enter_root(&mut self, path: &Path) {
        self.loading.insert(canonical(path));
    }

    /// Импортировать модуль по пути из `import`.
    ///
    /// `from_file` и `span` нужны для разрешения относительных путей и
    /// диагностики.
    pub fn import(
        &mut self,
        module_path: &str,
        from_file: &str,
        span: Span,
    ) -> BsResult<ModuleInterface> {
        let path = self
            .resolver
            .resolve(module_path, Some(Path::new(from_file)))
            .ok_or_else(|| {
                CompileError::new(
                    CompileErrorKind::ModuleNotFound,
                    from_file,
                    span,
                    format!("cannot find module '{}'", module_path),
                )
            })?;
        let key = canonical(&path);

        if self.loading.contains(&key) {
            return Err(CompileError::new(
                CompileErrorKind::CircularImport,
                from_file,
                span,
                format!("'{}' is already being imported", module_path),
            )
            .into());
        }
        if let Some(interface) = self.loaded.get(&key) {
            return Ok(interface.clone());
        }

        self.loading.insert(key.clone());
        let file = path.display().to_string();
        info!("linking {}", file);
        let source = fs::read_to_string(&path)?;
        let program = parser::parse(&source, &file)?;
        let (module, interface) = IrBuilder::new(&file, self, false).build(&program)?;
        for func in &module.functions {
            self.symbols.insert(func.name.clone(), module.file.clone());
        }
        self.modules.push(module);
        self.loading.remove(&key);
        self.loaded.insert(key, interface.clone());
        Ok(interface)
    }

    /// Файл уже понижённого модуля, в котором определена функция `name`.
    ///
    /// Все модули попадают в один файл IR, поэтому имя функции должно
    /// быть уникальным во всей программе.
    pub fn defined_in(&self, name: &str) -> Option<&str> {
        self.symbols.get(name).map(String::as_str)
    }

    /// Количество уже понижённых модулей.
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Забрать модули в порядке зависимостей.
    pub fn into_modules(self) -> Vec<IrModule> {
        self.modules
    }
}

impl Default for ModuleLinker {
    fn default() -> Self {
        Self::new(ModuleResolver::default())
    }
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BsError;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, source: &str) -> PathBuf {
        let path = dir.join(name);
        File::create(&path)
            .unwrap()
            .write_all(source.as_bytes())
            .unwrap();
        path
    }

    fn linker(dir: &Path) -> ModuleLinker {
        ModuleLinker::new(ModuleResolver::with_search_paths(vec![dir.to_path_buf()]))
    }

    fn import_kind(result: BsResult<ModuleInterface>) -> CompileErrorKind {
        match result {
            Err(BsError::Compile(err)) => err.kind,
            other => panic!("Expected compile error, got {:?}", other),
        }
    }

    #[test]
    fn test_import_lowers_module_once() {
        let dir = tempdir().unwrap();
        write(dir.path(), "math.bs", "fn sq(n: int32): int32 { return n * n; }");
        let main = dir.path().join("main.bs");
        let from = main.display().to_string();

        let mut linker = linker(dir.path());
        let interface = linker.import("math", &from, Span::default()).unwrap();
        assert_eq!(interface.functions["sq"].params, 1);
        assert!(interface.functions["sq"].returns_value);

        linker.import("math", &from, Span::default()).unwrap();
        assert_eq!(linker.module_count(), 1);
    }

    #[test]
    fn test_nested_imports_deepest_first() {
        let dir = tempdir().unwrap();
        write(dir.path(), "base.bs", "fn one(): int32 { return 1; }");
        write(
            dir.path(),
            "mid.bs",
            "import { one } from \"base\";\nfn two(): int32 { return one() + one(); }",
        );
        let from = dir.path().join("main.bs").display().to_string();

        let mut linker = linker(dir.path());
        linker.import("mid", &from, Span::default()).unwrap();
        let modules = linker.into_modules();
        assert_eq!(modules.len(), 2);
        assert!(modules[0].file.ends_with("base.bs"));
        assert!(modules[1].file.ends_with("mid.bs"));
    }

    #[test]
    fn test_module_not_found() {
        let dir = tempdir().unwrap();
        let from = dir.path().join("main.bs").display().to_string();
        let mut linker = linker(dir.path());
        assert_eq!(
            import_kind(linker.import("missing", &from, Span::new(0, 1, 3, 1))),
            CompileErrorKind::ModuleNotFound
        );
    }

    #[test]
    fn test_circular_import() {
        let dir = tempdir().unwrap();
        write(dir.path(), "a.bs", "import { fb } from \"b\";\nfn fa() { }");
        write(dir.path(), "b.bs", "import { fa } from \"a\";\nfn fb() { }");
        let from = dir.path().join("main.bs").display().to_string();

        let mut linker = linker(dir.path());
        assert_eq!(
            import_kind(linker.import("a", &from, Span::default())),
            CompileErrorKind::CircularImport
        );
    }

    #[test]
    fn test_import_of_root_is_circular() {
        let dir = tempdir().unwrap();
        let main = write(dir.path(), "main.bs", "exit(0);");
        write(dir.path(), "lib.bs", "import { x } from \"main\";\nfn f() { }");

        let mut linker = linker(dir.path());
        linker.enter_root(&main);
        let from = main.display().to_string();
        assert_eq!(
            import_kind(linker.import("lib", &from, Span::default())),
            CompileErrorKind::CircularImport
        );
    }

    #[test]
    fn test_same_function_in_two_modules() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            "a.bs",
            "fn helper(): int32 { return 1; }\nfn fa(): int32 { return helper(); }",
        );
        write(
            dir.path(),
            "b.bs",
            "fn helper(): int32 { return 2; }\nfn fb(): int32 { return helper(); }",
        );
        let from = dir.path().join("main.bs").display().to_string();

        let mut linker = linker(dir.path());
        linker.import("a", &from, Span::default()).unwrap();
        assert!(linker.defined_in("helper").unwrap().ends_with("a.bs"));
        assert_eq!(
            import_kind(linker.import("b", &from, Span::default())),
            CompileErrorKind::DuplicateDeclaration
        );
    }

    #[test]
    fn test_syntax_error_in_import() {
        let dir = tempdir().unwrap();
        write(dir.path(), "bad.bs", "fn (");
        let from = dir.path().join("main.bs").display().to_string();
        let mut linker = linker(dir.path());
        match linker.import("bad", &from, Span::default()) {
            Err(BsError::Syntax { file, .. }) => assert!(file.ends_with("bad.bs")),
            other => panic!("Expected syntax error, got {:?}", other),
        }
    }
}
