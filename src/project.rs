//! Настройки проекта (`project.json`).
//!
//! ```json
//! {
//!   "name": "hello",
//!   "version": "0.1.0",
//!   "entry": "src/main.bs",
//!   "buildDir": "build",
//!   "artifactName": "out",
//!   "backend": "native"
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use crate::compiler::{Backend, CompileOptions};
use crate::error::{BsError, BsResult};

/// Имя файла настроек.
pub const PROJECT_FILE: &str = "project.json";

const MAIN_TEMPLATE: &str = "// Точка входа\n\nvar answer = 42;\nexit(answer);\n";

/// Содержимое `project.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSettings {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_entry")]
    pub entry: String,
    #[serde(default = "default_build_dir")]
    pub build_dir: String,
    #[serde(default = "default_artifact_name")]
    pub artifact_name: String,
    #[serde(default)]
    pub backend: Backend,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library_root: Option<String>,
    /// Именованные команды оболочки (не исполняются компилятором).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub commands: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deps: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

fn default_entry() -> String {
    "src/main.bs".to_string()
}

fn default_build_dir() -> String {
    "build".to_string()
}

fn default_artifact_name() -> String {
    "out".to_string()
}

fn default_commands() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("build".to_string(), "bsc compile src/main.bs".to_string()),
        (
            "run".to_string(),
            "bsc compile src/main.bs && ./build/out".to_string(),
        ),
    ])
}

impl ProjectSettings {
    /// Настройки нового проекта.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            version: default_version(),
            entry: default_entry(),
            build_dir: default_build_dir(),
            artifact_name: default_artifact_name(),
            backend: Backend::default(),
            library_root: None,
            commands: default_commands(),
            deps: Vec::new(),
            license: None,
        }
    }

    /// Загрузить настройки из файла.
    pub fn load(path: impl AsRef<Path>) -> BsResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| BsError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Найти `project.json` в каталоге, если он есть.
    pub fn find(dir: &Path) -> BsResult<Option<Self>> {
        let path = dir.join(PROJECT_FILE);
        if path.is_file() {
            Self::load(path).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Сохранить настройки в файл.
    pub fn save(&self, path: impl AsRef<Path>) -> BsResult<()> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| BsError::Config(e.to_string()))?;
        fs::write(path.as_ref(), content + "\n")?;
        Ok(())
    }

    /// Создать каталог проекта `parent/name` с настройками и `src/main.bs`.
    pub fn init(parent: &Path, name: &str) -> BsResult<PathBuf> {
        let dir = parent.join(name);
        if dir.exists() {
            return Err(BsError::Config(format!(
                "directory '{}' already exists",
                dir.display()
            )));
        }

        let settings = Self::new(name);
        fs::create_dir_all(dir.join("src"))?;
        settings.save(dir.join(PROJECT_FILE))?;
        fs::write(dir.join(&settings.entry), MAIN_TEMPLATE)?;
        info!("created project {}", dir.display());
        Ok(dir)
    }

    /// Параметры компиляции относительно каталога проекта `root`.
    pub fn compile_options(&self, root: &Path) -> CompileOptions {
        CompileOptions {
            backend: self.backend,
            out_dir: root.join(&self.build_dir),
            artifact_name: self.artifact_name.clone(),
            library_root: self.library_root.as_ref().map(|p| root.join(p)),
            ..CompileOptions::default()
        }
    }

    /// Путь к входному файлу.
    pub fn entry_path(&self, root: &Path) -> PathBuf {
        root.join(&self.entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_init_creates_layout() {
        let dir = tempdir().unwrap();
        let project = ProjectSettings::init(dir.path(), "hello").unwrap();

        assert!(project.join("src/main.bs").is_file());
        let settings = ProjectSettings::load(project.join(PROJECT_FILE)).unwrap();
        assert_eq!(settings, ProjectSettings::new("hello"));

        let source = fs::read_to_string(project.join("src/main.bs")).unwrap();
        assert!(crate::parser::parse(&source, "main.bs").is_ok());
    }

    #[test]
    fn test_init_refuses_existing_directory() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("taken")).unwrap();
        assert!(matches!(
            ProjectSettings::init(dir.path(), "taken"),
            Err(BsError::Config(_))
        ));
    }

    #[test]
    fn test_camel_case_fields() {
        let json = r#"{
            "name": "demo",
            "buildDir": "target",
            "artifactName": "demo",
            "backend": "ssa",
            "libraryRoot": "lib",
            "deps": ["math"]
        }"#;
        let settings: ProjectSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.build_dir, "target");
        assert_eq!(settings.backend, Backend::Ssa);
        assert_eq!(settings.entry, "src/main.bs");
        assert_eq!(settings.deps, vec!["math".to_string()]);
        assert!(settings.commands.is_empty());

        let out = serde_json::to_string(&settings).unwrap();
        assert!(out.contains("\"buildDir\":\"target\""));
        assert!(!out.contains("license"));
    }

    #[test]
    fn test_load_layout_written_by_init() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(PROJECT_FILE);
        fs::write(
            &path,
            r#"{
    "name": "hello",
    "version": "0.1.0",
    "entry": "src/main.bs",
    "buildDir": "build",
    "artifactName": "out",
    "commands": {
        "build": "bsc compile src/main.bs",
        "run": "bsc compile src/main.bs && ./build/out"
    },
    "deps": [],
    "license": ""
}"#,
        )
        .unwrap();

        let settings = ProjectSettings::load(&path).unwrap();
        assert_eq!(settings.name, "hello");
        assert!(settings.deps.is_empty());
        assert_eq!(settings.commands["build"], "bsc compile src/main.bs");
        assert_eq!(settings.backend, Backend::Native);
        assert_eq!(settings.license.as_deref(), Some(""));
    }

    #[test]
    fn test_compile_options_from_settings() {
        let mut settings = ProjectSettings::new("demo");
        settings.library_root = Some("lib".to_string());
        let root = Path::new("/work/demo");
        let options = settings.compile_options(root);
        assert_eq!(options.out_dir, root.join("build"));
        assert_eq!(options.artifact_name, "out");
        assert_eq!(options.library_root, Some(root.join("lib")));
        assert_eq!(settings.entry_path(root), root.join("src/main.bs"));
    }

    #[test]
    fn test_find_and_invalid_json() {
        let dir = tempdir().unwrap();
        assert!(ProjectSettings::find(dir.path()).unwrap().is_none());
        fs::write(dir.path().join(PROJECT_FILE), "{ not json").unwrap();
        assert!(matches!(
            ProjectSettings::find(dir.path()),
            Err(BsError::Config(_))
        ));
    }
}
