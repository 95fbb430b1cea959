use clap::Parser;
use genkei::prelude::*;
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Generates a project skeleton from an archetype script
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the main script JSON document
    script_path: String,

    /// Path to a run configuration JSON file
    #[arg(short, long)]
    config: Option<String>,

    /// External input value, as `path=value`; may be repeated
    #[arg(short = 'D', value_name = "PATH=VALUE")]
    define: Vec<String>,

    /// Prompt for inputs that have no external value or preset
    #[arg(short, long)]
    interactive: bool,

    /// Flatten the call graph before running
    #[arg(long)]
    compile: bool,

    /// Replace method names with numeric ids (implies --compile)
    #[arg(long)]
    obfuscate: bool,

    /// Print the scope tree after the run
    #[arg(long)]
    print_scope: bool,

    /// Print the walked script tree
    #[arg(long)]
    print_ast: bool,

    /// Write the compiled script to this file (implies --compile)
    #[arg(long, value_name = "FILE")]
    emit_compiled: Option<String>,
}

/// Reads answers from stdin.
struct StdinPrompter;

impl Prompter for StdinPrompter {
    fn ask(&mut self, request: &InputRequest) -> std::result::Result<String, RunError> {
        if let Some(help) = &request.help {
            println!("  {}", help);
        }
        for (i, option) in request.options.iter().enumerate() {
            let label = option.label.as_deref().unwrap_or(&option.value);
            println!("  {}) {}", i + 1, label);
        }
        prompt_for_input(request.display_label(), request.default.as_ref())
    }

    fn invalid(&mut self, _request: &InputRequest, message: &str) -> std::result::Result<(), RunError> {
        eprintln!("  Invalid answer: {}", message);
        Ok(())
    }
}

fn prompt_for_input(prompt_text: &str, default: Option<&Value>) -> std::result::Result<String, RunError> {
    let mut line = String::new();
    let default_prompt = default.map_or("".to_string(), |d| format!(" [default: {}]", d));

    print!("> {}{}: ", prompt_text, default_prompt);
    io::stdout()
        .flush()
        .map_err(|e| RunError::Prompt(e.to_string()))?;

    let read = io::stdin()
        .read_line(&mut line)
        .map_err(|e| RunError::Prompt(e.to_string()))?;
    if read == 0 {
        return Err(RunError::Prompt("standard input closed".to_string()));
    }
    Ok(line.trim().to_string())
}

#[derive(Serialize)]
struct Plan<'a> {
    model: &'a MergedModel,
    outputs: &'a [OutputFile],
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_env("GENKEI_LOG"))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let total_start = Instant::now();

    let config = match &cli.config {
        Some(path) => RunConfig::from_file(path).unwrap_or_else(|e| exit_with_error(&e.to_string())),
        None => RunConfig::default(),
    };

    let script_path = Path::new(&cli.script_path);
    let base = config
        .script_dir
        .clone()
        .map(|dir| Path::new(&dir).to_path_buf())
        .or_else(|| script_path.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    let identity = script_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_else(|| exit_with_error("Script path has no file name"))
        .to_string();

    let loader = DirectoryLoader::new(&base);
    let script = loader
        .load(&identity)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to load script: {}", e)));

    let mut options = config.compile;
    if cli.compile || cli.obfuscate || cli.emit_compiled.is_some() {
        let mut compile = options.unwrap_or_default();
        compile.obfuscate |= cli.obfuscate;
        options = Some(compile);
    }

    if let (Some(path), Some(compile)) = (&cli.emit_compiled, options) {
        let compiled = ScriptCompiler::builder(&loader)
            .options(compile)
            .build()
            .compile(&script)
            .unwrap_or_else(|e| exit_with_error(&format!("Compilation failed: {}", e)));
        CompiledScript::new(&script.identity, compile.obfuscate, compiled)
            .save(path)
            .unwrap_or_else(|e| exit_with_error(&format!("Could not save compiled script: {}", e)));
        eprintln!("Compiled script written to {}", path);
    }

    let mut builder = Generator::builder((*script).clone())
        .loader(&loader)
        .config(&config)
        .unwrap_or_else(|e| exit_with_error(&e.to_string()));
    for define in &cli.define {
        let Some((path, value)) = define.split_once('=') else {
            exit_with_error(&format!("Expected PATH=VALUE, found '{}'", define));
        };
        builder = builder.external(path.trim(), value);
    }
    if let Some(compile) = options {
        builder = builder.compile(compile);
    }
    if cli.interactive || config.interactive {
        builder = builder.interactive(StdinPrompter);
    }

    let mut renderer = CollectingRenderer::new();
    let report = builder
        .build()
        .run(&mut renderer)
        .unwrap_or_else(|e| exit_with_error(&format!("Generation failed: {}", e)));

    if cli.print_ast {
        eprintln!("{}", DisplayNode { node: &report.root });
    }
    if cli.print_scope {
        eprintln!("{}", ScopePrinter::new(&report.scope));
    }

    let plan = Plan {
        model: &report.model,
        outputs: &report.outputs,
    };
    let json = serde_json::to_string_pretty(&plan)
        .unwrap_or_else(|e| exit_with_error(&format!("Could not serialize the result: {}", e)));
    println!("{}", json);
    eprintln!("Finished in {:?}", total_start.elapsed());
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("\nError: {}", message);
    std::process::exit(1);
}
