//! Внешние инструменты сборки.
//!
//! Ассемблер, компоновщик, компилятор QBE и драйвер C ищутся в `PATH`
//! до запуска; вызов блокирующий, вывод процесса прикладывается к
//! ошибке.

use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, info};

use crate::error::{BsError, BsResult};

/// Найти исполняемый файл в `PATH`.
///
/// Имя с разделителем пути (`./tools/nasm`) проверяется как есть.
pub fn find_tool(tool: &str) -> BsResult<PathBuf> {
    let direct = Path::new(tool);
    if direct.components().count() > 1 {
        return if is_executable(direct) {
            Ok(direct.to_path_buf())
        } else {
            Err(BsError::ToolchainUnavailable(tool.to_string()))
        };
    }

    env::var_os("PATH")
        .and_then(|paths| {
            env::split_paths(&paths)
                .map(|dir| dir.join(tool))
                .find(|candidate| is_executable(candidate))
        })
        .ok_or_else(|| BsError::ToolchainUnavailable(tool.to_string()))
}

/// Обычный файл с правом на исполнение.
#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Доступен ли инструмент.
pub fn is_available(tool: &str) -> bool {
    find_tool(tool).is_ok()
}

/// Запустить инструмент и дождаться завершения.
///
/// Ненулевой код возврата превращается в `ToolchainFailure` с
/// объединённым stdout и stderr.
pub fn run<I, S>(tool: &str, args: I) -> BsResult<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let program = find_tool(tool)?;
    let args: Vec<S> = args.into_iter().collect();
    info!(
        "running {} {}",
        tool,
        args.iter()
            .map(|a| a.as_ref().to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    );

    let output = Command::new(&program).args(&args).output()?;
    if output.status.success() {
        debug!("{} finished", tool);
        return Ok(());
    }

    let mut captured = String::from_utf8_lossy(&output.stdout).into_owned();
    captured.push_str(&String::from_utf8_lossy(&output.stderr));
    Err(BsError::ToolchainFailure {
        tool: tool.to_string(),
        status: output.status.to_string(),
        output: captured,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_tool() {
        match find_tool("bsc-no-such-tool-xyz") {
            Err(BsError::ToolchainUnavailable(tool)) => assert_eq!(tool, "bsc-no-such-tool-xyz"),
            other => panic!("Expected ToolchainUnavailable, got {:?}", other),
        }
        assert!(!is_available("bsc-no-such-tool-xyz"));
    }

    #[test]
    fn test_run_missing_tool_is_unavailable() {
        let result = run("bsc-no-such-tool-xyz", ["--version"]);
        assert!(matches!(result, Err(BsError::ToolchainUnavailable(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_executable_file_is_unavailable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("fake-nasm");
        std::fs::write(&tool, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o644)).unwrap();
        let name = tool.display().to_string();
        assert!(matches!(
            find_tool(&name),
            Err(BsError::ToolchainUnavailable(_))
        ));

        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();
        assert_eq!(find_tool(&name).unwrap(), tool);
    }

    #[cfg(unix)]
    #[test]
    fn test_run_reports_failure_output() {
        if !is_available("sh") {
            return;
        }
        match run("sh", ["-c", "echo oops >&2; exit 3"]) {
            Err(BsError::ToolchainFailure {
                tool,
                status,
                output,
            }) => {
                assert_eq!(tool, "sh");
                assert!(status.contains('3'));
                assert!(output.contains("oops"));
            }
            other => panic!("Expected ToolchainFailure, got {:?}", other),
        }
        assert!(run("sh", ["-c", "exit 0"]).is_ok());
    }
}
