//! BlockScript Compiler
//!
//! # Использование
//!
//! ```bash
//! # Создать проект
//! bsc init hello
//!
//! # Собрать входной файл из project.json
//! bsc compile
//!
//! # Собрать файл через QBE
//! bsc compile src/main.bs --backend ssa --out-dir build --name app
//! ```

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use bsc::compiler::{compile_file, Backend, CompileOptions};
use bsc::error::{BsError, BsResult};
use bsc::project::ProjectSettings;
use clap::{Parser, Subcommand};
use colored::Colorize;

/// BlockScript Compiler
#[derive(Parser)]
#[command(name = "bsc")]
#[command(version)]
#[command(about = "Compiler for the BlockScript language", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new project
    Init {
        /// Project name
        name: String,
    },

    /// Compile a source file into an executable
    Compile {
        /// Entry file (defaults to `entry` from project.json)
        entry: Option<PathBuf>,

        /// Code generation backend
        #[arg(short, long, value_enum)]
        backend: Option<Backend>,

        /// Output directory (cleared before writing)
        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        /// Artifact file name
        #[arg(short, long)]
        name: Option<String>,

        /// Library root searched first for imports
        #[arg(long)]
        lib: Option<PathBuf>,

        /// Write the assembly/IR only, do not run external tools
        #[arg(long)]
        emit_only: bool,
    },
}

fn init_logger(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}

fn init(name: &str) -> BsResult<()> {
    let dir = ProjectSettings::init(&env::current_dir()?, name)?;
    println!("{} Created project '{}'", "✓".green(), name);
    println!("  {}", format!("{}/project.json", dir.display()).dimmed());
    println!("  {}", format!("{}/src/main.bs", dir.display()).dimmed());
    Ok(())
}

fn compile(
    entry: Option<PathBuf>,
    backend: Option<Backend>,
    out_dir: Option<PathBuf>,
    name: Option<String>,
    lib: Option<PathBuf>,
    emit_only: bool,
) -> BsResult<()> {
    let cwd = env::current_dir()?;
    let settings = ProjectSettings::find(&cwd)?;

    let mut options = settings
        .as_ref()
        .map_or_else(CompileOptions::default, |s| s.compile_options(&cwd));
    let entry = entry
        .or_else(|| settings.as_ref().map(|s| s.entry_path(&cwd)))
        .ok_or_else(|| {
            BsError::Config("no entry file given and no project.json found".to_string())
        })?;

    if let Some(backend) = backend {
        options.backend = backend;
    }
    if let Some(out_dir) = out_dir {
        options.out_dir = out_dir;
    }
    if let Some(name) = name {
        options.artifact_name = name;
    }
    if lib.is_some() {
        options.library_root = lib;
    }
    options.emit_only = emit_only;

    let output = compile_file(&entry, &options)?;
    match output.executable {
        Some(executable) => println!("{} Built {}", "✓".green(), executable.display()),
        None => println!("{} Wrote {}", "✓".green(), output.artifact.display()),
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let result = match cli.command {
        Commands::Init { name } => init(&name),
        Commands::Compile {
            entry,
            backend,
            out_dir,
            name,
            lib,
            emit_only,
        } => compile(entry, backend, out_dir, name, lib, emit_only),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
