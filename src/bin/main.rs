use std::{
    error::Error,
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::Parser;
use log::{info, LevelFilter};
use queso::{
    codegen::{self, Options},
    diagnostic, pipeline,
};

/// Compiles a queso program into a WebAssembly module that runs under WASI.
#[derive(Parser)]
#[command(version)]
struct Cli {
    /// Source file to compile.
    input: PathBuf,

    /// Where to write the module. Defaults to the input path with a `.wasm`
    /// extension.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the resolved tree instead of compiling.
    #[arg(long)]
    emit_ast: bool,

    /// Initial memory size, in 64 KiB pages.
    #[arg(long, default_value_t = 1)]
    initial_pages: u32,

    /// Memory never grows past this many pages.
    #[arg(long, default_value_t = 16)]
    maximum_pages: u32,

    /// Lowest address of the heap.
    #[arg(long, default_value_t = 8192)]
    heap_base: u32,

    /// Export the runtime routines along with `_start`.
    #[arg(long)]
    export_runtime: bool,

    /// More logging. Repeat for more detail.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    if let Err(error) = simple_logger::SimpleLogger::new()
        .with_level(level)
        .env()
        .init()
    {
        eprintln!("failed to set up logging: {error}");
    }

    match run(&cli) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode, Box<dyn Error>> {
    let path = cli.input.display().to_string();
    let src = fs::read_to_string(&cli.input)?;

    if cli.emit_ast {
        let analysis = pipeline::analyze(&src);
        print!("{}", analysis.tree());
        return Ok(report(&path, &src, &analysis.diagnostics));
    }

    let options = Options {
        initial_pages: cli.initial_pages,
        maximum_pages: Some(cli.maximum_pages),
        heap_base: cli.heap_base,
        export_runtime: cli.export_runtime,
    };
    let bytes = match pipeline::compile(&src, &options) {
        Ok(bytes) => bytes,
        Err(pipeline::Error::Diagnostics(diagnostics)) => {
            return Ok(report(&path, &src, &diagnostics));
        }
        Err(pipeline::Error::Codegen(error)) => return Ok(codegen_failed(&error)),
    };

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output(&cli.input));
    fs::write(&output, &bytes)?;
    info!("wrote {} bytes to {}", bytes.len(), output.display());
    Ok(ExitCode::SUCCESS)
}

fn report(path: &str, src: &str, diagnostics: &[diagnostic::Diagnostic]) -> ExitCode {
    if diagnostics.is_empty() {
        return ExitCode::SUCCESS;
    }
    for d in diagnostics {
        eprintln!("{}", diagnostic::render(path, src, d));
    }
    eprintln!("aborting due to {} previous error(s)", diagnostics.len());
    ExitCode::from(1)
}

fn codegen_failed(error: &codegen::Error) -> ExitCode {
    eprintln!("error: {error}");
    ExitCode::from(2)
}

fn default_output(input: &Path) -> PathBuf {
    input.with_extension("wasm")
}
