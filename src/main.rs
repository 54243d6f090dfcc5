//! nrql CLI
//!
//! Command-line interface for the NRQL parser:
//! - Parse a query and print its AST as JSON
//! - Print a query in canonical form
//! - Check a file of queries, one per line
//! - Generate a default config file

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nrql::config::{generate_default_config, Config, LoggingConfig};
use nrql::{parse_with, ParseOptions, Query, QueryError};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "nrql")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Parse NRQL analytics queries into a JSON syntax tree")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: ~/.config/nrql/config.toml, /etc/nrql/config.toml, ./nrql.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse a query and print the AST as JSON
    Parse {
        /// Query text (default: read from stdin)
        query: Option<String>,
        /// Print the JSON on a single line
        #[arg(long)]
        compact: bool,
    },

    /// Print a query in canonical form
    Format {
        /// Query text (default: read from stdin)
        query: Option<String>,
    },

    /// Parse every query in a file, one per line
    Check {
        /// File of queries; blank and comment-only lines are skipped
        path: PathBuf,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = Config::resolve(cli.config.as_deref())?;
    init_logging(&config.logging);

    let options = config.parse_options();
    tracing::debug!(?options, "nrql v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Parse { query, compact } => {
            let text = query_text(query)?;
            let ast = match parse_with(&text, &options) {
                Ok(ast) => ast,
                Err(e) => return Ok(syntax_error(&e)),
            };
            println!("{}", render_json(&ast, config.output.pretty && !compact)?);
        }

        Commands::Format { query } => {
            let text = query_text(query)?;
            match parse_with(&text, &options) {
                Ok(ast) => println!("{}", ast),
                Err(e) => return Ok(syntax_error(&e)),
            }
        }

        Commands::Check { path } => return check_file(&path, &options),

        Commands::Config { output } => {
            let content = generate_default_config();
            match output {
                Some(path) => {
                    std::fs::write(&path, content)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Config written to {}", path.display());
                }
                None => print!("{}", content),
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn init_logging(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    // Logs go to stderr so stdout stays machine-readable
    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
    }
}

/// The query argument, or all of stdin
fn query_text(arg: Option<String>) -> Result<String> {
    match arg {
        Some(query) => Ok(query),
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read query from stdin")?;
            Ok(buf)
        }
    }
}

fn syntax_error(e: &QueryError) -> ExitCode {
    eprintln!(
        "Syntax error at line {} column {} : {}",
        e.line(),
        e.column(),
        e.message()
    );
    ExitCode::FAILURE
}

fn render_json(query: &Query, pretty: bool) -> Result<String> {
    if !pretty {
        return Ok(serde_json::to_string(query)?);
    }

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    query.serialize(&mut ser)?;
    Ok(String::from_utf8(buf)?)
}

fn check_file(path: &Path, options: &ParseOptions) -> Result<ExitCode> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    let mut total = 0usize;
    let mut failed = 0usize;

    for (index, line) in content.lines().enumerate() {
        if is_skippable(line) {
            continue;
        }

        total += 1;
        if let Err(e) = parse_with(line, options) {
            failed += 1;
            eprintln!(
                "{}:{}: column {}: {}",
                path.display(),
                index + 1,
                e.column(),
                e.message()
            );
        }
    }

    println!("{} queries checked, {} failed", total, failed);
    tracing::info!(total, failed, "check complete");

    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Blank lines and lines holding only a comment
fn is_skippable(line: &str) -> bool {
    let line = line.trim_start();
    line.is_empty() || line.starts_with('#') || line.starts_with("--") || line.starts_with("//")
}
