//! Разрешение путей модулей.
//!
//! Отвечает за поиск файлов модулей по пути из `import` и разрешение
//! относительных путей.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Расширение исходных файлов по умолчанию.
pub const DEFAULT_EXTENSION: &str = "bs";

/// Резолвер модулей.
#[derive(Debug)]
pub struct ModuleResolver {
    /// Пути поиска, по порядку (корень библиотеки первым).
    search_paths: Vec<PathBuf>,
    /// Кэш разрешённых путей
    cache: HashMap<String, PathBuf>,
    /// Расширение файлов модулей
    extension: String,
}

impl ModuleResolver {
    /// Создать новый резолвер.
    pub fn new() -> Self {
        Self::with_search_paths(vec![PathBuf::from(".")])
    }

    /// Создать резолвер с путями поиска.
    pub fn with_search_paths(paths: Vec<PathBuf>) -> Self {
        Self {
            search_paths: paths,
            cache: HashMap::new(),
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }

    /// Добавить путь поиска.
    pub fn add_search_path(&mut self, path: PathBuf) {
        if !self.search_paths.contains(&path) {
            self.search_paths.push(path);
        }
    }

    /// Очистить кэш.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Получить все пути поиска.
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Разрешить путь импорта в путь к файлу.
    ///
    /// Пути `./x` и `../x` отсчитываются от каталога импортирующего
    /// файла, остальные ищутся в путях поиска.
    pub fn resolve(&mut self, module_path: &str, from_file: Option<&Path>) -> Option<PathBuf> {
        if module_path.starts_with("./") || module_path.starts_with("../") {
            let base = from_file
                .and_then(Path::parent)
                .unwrap_or_else(|| Path::new("."));
            return self.candidate(base, module_path);
        }

        if let Some(path) = self.cache.get(module_path) {
            return Some(path.clone());
        }

        let found = self
            .search_paths
            .iter()
            .find_map(|dir| self.candidate(dir, module_path))?;
        self.cache.insert(module_path.to_string(), found.clone());
        Some(found)
    }

    /// Файл модуля в каталоге, с расширением по умолчанию если его нет.
    fn candidate(&self, dir: &Path, module_path: &str) -> Option<PathBuf> {
        let mut path = dir.join(module_path);
        if path.extension().is_none() {
            path.set_extension(&self.extension);
        }
        path.is_file().then_some(path)
    }
}

impl Default for ModuleResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_resolver_creation() {
        let resolver = ModuleResolver::new();
        assert_eq!(resolver.search_paths().len(), 1);
    }

    #[test]
    fn test_resolve_appends_extension() {
        let dir = tempdir().unwrap();
        let module_path = dir.path().join("math.bs");
        File::create(&module_path)
            .unwrap()
            .write_all(b"fn one(): int32 { return 1; }")
            .unwrap();

        let mut resolver = ModuleResolver::with_search_paths(vec![dir.path().to_path_buf()]);
        assert_eq!(resolver.resolve("math", None), Some(module_path.clone()));
        assert_eq!(resolver.resolve("math.bs", None), Some(module_path));
    }

    #[test]
    fn test_search_order() {
        let lib = tempdir().unwrap();
        let local = tempdir().unwrap();
        File::create(lib.path().join("util.bs")).unwrap();
        File::create(local.path().join("util.bs")).unwrap();

        let mut resolver = ModuleResolver::with_search_paths(vec![
            lib.path().to_path_buf(),
            local.path().to_path_buf(),
        ]);
        assert_eq!(
            resolver.resolve("util", None),
            Some(lib.path().join("util.bs"))
        );
    }

    #[test]
    fn test_resolve_relative() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("src");
        fs::create_dir(&nested).unwrap();
        File::create(dir.path().join("shared.bs")).unwrap();
        let importer = nested.join("main.bs");

        let mut resolver = ModuleResolver::with_search_paths(vec![]);
        assert_eq!(
            resolver.resolve("../shared", Some(&importer)),
            Some(nested.join("../shared.bs"))
        );
        assert_eq!(resolver.resolve("./shared", Some(&importer)), None);
    }

    #[test]
    fn test_resolve_not_found() {
        let mut resolver = ModuleResolver::new();
        assert!(resolver.resolve("nonexistent_module_xyz", None).is_none());
    }

    #[test]
    fn test_cache() {
        let dir = tempdir().unwrap();
        File::create(dir.path().join("cached.bs")).unwrap();

        let mut resolver = ModuleResolver::with_search_paths(vec![dir.path().to_path_buf()]);
        let _ = resolver.resolve("cached", None);
        assert!(resolver.cache.contains_key("cached"));

        resolver.clear_cache();
        assert!(!resolver.cache.contains_key("cached"));
    }
}
