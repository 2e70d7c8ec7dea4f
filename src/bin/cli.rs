// CLI binary: prints diagnostics and exits non-zero instead of propagating errors.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use datascript::dsl::lexer;
use datascript::error::BuildError;
use datascript::settings::{self, BuildSettings};
use datascript::{compile_files, paths, write_project, BuildOutcome};

// ── CLI argument parsing ─────────────────────────────────────────

#[derive(Parser)]
#[command(name = "datascript-cli", about = "Compile datascript sources into function packs", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output raw JSON instead of formatted text
    #[arg(long, global = true)]
    json: bool,
}

#[derive(clap::Args)]
struct BuildArgs {
    /// Source files, compiled into one namespace
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Settings file (default: datascript.json next to the first source)
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    namespace: Option<String>,

    #[arg(long)]
    objective: Option<String>,

    /// Static registry JSON for id and NBT validation
    #[arg(long)]
    registry: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile sources and write the output tree
    Build {
        #[command(flatten)]
        args: BuildArgs,

        /// Output directory (overrides the settings file)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Compile sources and report diagnostics without writing anything
    Check {
        #[command(flatten)]
        args: BuildArgs,
    },
    /// Print the token stream of a source file
    Tokens { file: PathBuf },
    /// Print the JSON schema of the settings file
    ConfigSchema,
}

// ── Settings ─────────────────────────────────────────────────────

fn resolve_settings(args: &BuildArgs) -> Result<BuildSettings, BuildError> {
    let config = args.config.clone().unwrap_or_else(|| {
        let dir = args
            .files
            .first()
            .and_then(|f| f.parent())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        paths::settings_path(&dir)
    });
    let mut settings = settings::load_settings(&config)?;
    if let Some(namespace) = &args.namespace {
        settings.namespace.clone_from(namespace);
    }
    if let Some(objective) = &args.objective {
        settings.objective.clone_from(objective);
    }
    if let Some(registry) = &args.registry {
        settings.registry = Some(registry.clone());
    }
    settings.validate()?;
    Ok(settings)
}

// ── Output ───────────────────────────────────────────────────────

fn print_outcome(outcome: &BuildOutcome, raw_json: bool) {
    if raw_json {
        let files: Vec<serde_json::Value> = outcome
            .reports
            .iter()
            .map(|r| {
                serde_json::json!({
                    "path": r.path.display().to_string(),
                    "diagnostics": r.diagnostics,
                })
            })
            .collect();
        let json = serde_json::json!({
            "files": files,
            "errors": outcome.error_count(),
            "functions": outcome.project.function_count(),
        });
        println!("{}", serde_json::to_string_pretty(&json).unwrap_or_default());
    } else {
        for report in &outcome.reports {
            for line in report.rendered() {
                eprintln!("{line}");
            }
        }
    }
}

fn run(cli: Cli) -> Result<(), BuildError> {
    match cli.command {
        Commands::Build { args, out } => {
            let mut settings = resolve_settings(&args)?;
            if let Some(out) = out {
                settings.output_dir = out;
            }
            let outcome = compile_files(&args.files, &settings)?;
            print_outcome(&outcome, cli.json);
            let written = write_project(&outcome.project, &settings.output_dir)?;
            if !cli.json {
                println!("Wrote {written} file(s) to {}", settings.output_dir.display());
            }
            let errors = outcome.error_count();
            if errors > 0 {
                return Err(BuildError::Compile { errors });
            }
        }
        Commands::Check { args } => {
            let settings = resolve_settings(&args)?;
            let outcome = compile_files(&args.files, &settings)?;
            print_outcome(&outcome, cli.json);
            let errors = outcome.error_count();
            if errors > 0 {
                return Err(BuildError::Compile { errors });
            }
        }
        Commands::Tokens { file } => {
            let source = std::fs::read_to_string(&file)?;
            let (tokens, errors) = lexer::lex(&source);
            for token in &tokens {
                println!("{:>5}..{:<5} {:?}", token.span.start, token.span.end, token.token);
            }
            for e in &errors {
                eprintln!("{}: {}", file.display(), e.format_with_source(&source));
            }
            let errors = errors.iter().filter(|e| e.is_error()).count();
            if errors > 0 {
                return Err(BuildError::Compile { errors });
            }
        }
        Commands::ConfigSchema => println!("{}", settings::settings_schema()?),
    }
    Ok(())
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "datascript=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        error!("{e}");
        process::exit(1);
    }
}
