#![forbid(unsafe_code)]

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use cinder_ast::Program;
use cinder_core::{CheckerConfig, runtime_type_constructors};
use cinder_parse::ParseConfig;
use miette::{IntoDiagnostic, NamedSource};
use tracing::{debug, info_span};

mod manifest;
mod report;
mod tracing_config;

use report::{BuiltinReport, CheckReport, FileReport};

const SOURCE_EXTENSION: &str = "cdc";

#[derive(Parser, Debug)]
#[command(name = "cinder", version, about = "Static checker for resource-oriented contracts")]
struct Cli {
    /// Project config file. Defaults to the nearest `Cinder.toml` above the first input.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Format {
    /// Rendered diagnostics on stderr
    Text,
    /// A JSON report on stdout
    Json,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Parse and type-check source files
    Check {
        /// Input .cdc files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Allow the `Any` type in annotations. Overrides `Cinder.toml`.
        #[arg(long)]
        any: bool,

        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// List the built-in run-time type constructors
    Builtins {
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
}

fn main() -> miette::Result<()> {
    tracing_config::init_tracing();
    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Check { paths, any, format } => {
            let resolved = match &cli.config {
                Some(path) => manifest::load_manifest_file(path)?,
                None => manifest::load_resolved_manifest(&paths[0])?,
            };
            debug!(manifest = ?resolved.manifest_path, "resolved project config");
            let checker_config = resolved.checker_config(any);
            check(&paths, &resolved.parse, &checker_config, format)
        }
        Cmd::Builtins { format } => builtins(format),
    }
}

struct Source {
    path: PathBuf,
    text: String,
}

fn check(
    paths: &[PathBuf],
    parse_config: &ParseConfig,
    checker_config: &CheckerConfig,
    format: Format,
) -> miette::Result<()> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            collect_sources(path, &mut files)?;
        } else {
            files.push(path.clone());
        }
    }

    let mut sources = Vec::with_capacity(files.len());
    for path in files {
        let text = fs::read_to_string(&path).into_diagnostic()?;
        sources.push(Source { path, text });
    }

    // Parse everything first so that well-formed files can be checked together.
    let mut reports: Vec<Option<FileReport>> = Vec::with_capacity(sources.len());
    let mut parsed: Vec<(usize, Program)> = Vec::new();
    for (index, source) in sources.iter().enumerate() {
        let _span = info_span!("parse", path = %source.path.display()).entered();
        match cinder_parse::parse_source_with_config(&source.text, parse_config) {
            Ok(program) => {
                parsed.push((index, program));
                reports.push(None);
            }
            Err(err) => {
                if format == Format::Text {
                    eprintln!("{:?}", err.with_source_code(named(source)));
                    reports.push(None);
                } else {
                    reports.push(Some(FileReport::parse_failure(&source.path, &err)));
                }
            }
        }
    }

    let (indices, programs): (Vec<usize>, Vec<Program>) = parsed.into_iter().unzip();
    let results = cinder_core::check_programs(&programs, checker_config);

    let mut failed = sources.len() - programs.len();
    for (index, (checker, result)) in indices.into_iter().zip(results) {
        let source = &sources[index];
        if result.is_err() {
            failed += 1;
        }
        match format {
            Format::Text => {
                if let Err(err) = result {
                    for error in err.errors {
                        let report = miette::Report::new(error).with_source_code(named(source));
                        eprintln!("{report:?}");
                    }
                }
            }
            Format::Json => {
                reports[index] = Some(FileReport::checked(
                    &source.path,
                    &result,
                    checker.elaboration(),
                ));
            }
        }
    }

    if format == Format::Json {
        let report = CheckReport::new(
            checker_config.location.clone(),
            reports.into_iter().flatten().collect(),
        );
        let json = serde_json::to_string_pretty(&report).into_diagnostic()?;
        println!("{json}");
    } else if failed == 0 {
        println!("checked {} file(s)", sources.len());
    }

    if failed > 0 {
        return Err(miette::miette!(
            "{failed} of {} file(s) failed to check",
            sources.len()
        ));
    }
    Ok(())
}

fn builtins(format: Format) -> miette::Result<()> {
    let reports: Vec<BuiltinReport> = runtime_type_constructors()
        .iter()
        .map(BuiltinReport::from)
        .collect();
    match format {
        Format::Json => {
            let json = serde_json::to_string_pretty(&reports).into_diagnostic()?;
            println!("{json}");
        }
        Format::Text => {
            for report in reports {
                println!("{}: {}", report.name, report.signature);
                println!("    {}", report.description);
            }
        }
    }
    Ok(())
}

fn collect_sources(dir: &Path, out: &mut Vec<PathBuf>) -> miette::Result<()> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).into_diagnostic()? {
        entries.push(entry.into_diagnostic()?.path());
    }
    entries.sort();
    for p in entries {
        if p.is_dir() {
            collect_sources(&p, out)?;
        } else if p.extension().and_then(|e| e.to_str()) == Some(SOURCE_EXTENSION) {
            out.push(p);
        }
    }
    Ok(())
}

fn named(source: &Source) -> NamedSource<String> {
    NamedSource::new(source.path.display().to_string(), source.text.clone())
}
