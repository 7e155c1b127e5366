use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use xsa_core::{
    Analysis, DialectConfig, Severity, SymbolNode, collect_global_declarations, resolve, tokenize,
};

#[derive(Debug, Parser)]
#[command(
    name = "xsa",
    author,
    version,
    about = "Static analyzer for XSLT-style documents with embedded XPath",
    long_about = None
)]
struct CliArgs {
    /// Dialect configuration (TOML). Defaults to the XSLT 3.0 tables.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Emit machine-readable JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Analyze a document and report diagnostics.
    Check {
        file: PathBuf,
        /// Extra documents whose declarations are treated as imported.
        #[arg(long = "with", value_name = "FILE")]
        with: Vec<PathBuf>,
    },
    /// Print the document outline.
    Outline { file: PathBuf },
    /// Dump the flat token stream.
    Tokens { file: PathBuf },
    /// List the document's global declarations.
    Decls { file: PathBuf },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();
    match run(args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

fn run(args: CliArgs) -> Result<ExitCode> {
    let config = load_config(args.config.as_deref())?;
    match args.command {
        Commands::Check { file, with } => check(&file, &with, &config, args.json),
        Commands::Outline { file } => {
            let text = read(&file)?;
            let analysis = analyze(&text, &[], &config);
            if args.json {
                println!("{}", serde_json::to_string_pretty(&analysis.symbols)?);
            } else {
                for symbol in &analysis.symbols {
                    print_symbol(symbol, 0);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Tokens { file } => {
            let text = read(&file)?;
            let tokens = tokenize(&text, &config);
            if args.json {
                println!("{}", serde_json::to_string_pretty(&tokens)?);
            } else {
                for token in &tokens {
                    let error = match token.error {
                        Some(e) => format!("  !{e:?}"),
                        None => String::new(),
                    };
                    println!(
                        "{}:{}\t{:?}\t{}{}",
                        token.line, token.start_col, token.kind, token.value, error
                    );
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Decls { file } => {
            let text = read(&file)?;
            let decls = collect_global_declarations(&text, &config);
            if args.json {
                println!("{}", serde_json::to_string_pretty(&decls)?);
            } else {
                for decl in &decls {
                    let arity = match decl.arity {
                        Some(n) => format!("/{n}"),
                        None => String::new(),
                    };
                    println!(
                        "{}\t{:?}\t{}{}",
                        decl.defining_token.span(),
                        decl.kind,
                        decl.name,
                        arity
                    );
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn check(file: &Path, with: &[PathBuf], config: &DialectConfig, json: bool) -> Result<ExitCode> {
    let text = read(file)?;
    let mut imported = Vec::new();
    for path in with {
        let other = read(path)?;
        imported.extend(collect_global_declarations(&other, config));
    }
    debug!(imported = imported.len(), "collected imported declarations");

    let analysis = analyze(&text, &imported, config);
    if json {
        println!("{}", serde_json::to_string_pretty(&analysis.diagnostics)?);
    } else {
        for diagnostic in &analysis.diagnostics {
            println!("{}: {}", file.display(), diagnostic);
        }
    }
    let failed = analysis
        .diagnostics
        .iter()
        .any(|d| d.severity == Severity::Error);
    Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

fn analyze(text: &str, imported: &[xsa_core::GlobalDeclaration], config: &DialectConfig) -> Analysis {
    let locals = collect_global_declarations(text, config);
    let mut tokens = tokenize(text, config);
    resolve(&mut tokens, &locals, imported, config)
}

fn load_config(path: Option<&Path>) -> Result<DialectConfig> {
    match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("cannot read config {}", path.display()))?;
            DialectConfig::from_toml_str(&text)
        }
        None => Ok(DialectConfig::default()),
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))
}

fn print_symbol(symbol: &SymbolNode, depth: usize) {
    println!(
        "{}{}  [{}]",
        "  ".repeat(depth),
        symbol.display_name(),
        symbol.range
    );
    for child in &symbol.children {
        print_symbol(child, depth + 1);
    }
}
