//! CLI entrypoint for agent-orchestra
//!
//! Loads the layered configuration, wires the engine through
//! [`EngineBuilder`] and runs one task against a scripted model.

mod commands;
mod progress;

use anyhow::{Context, Result, bail};
use clap::Parser;
use colored::Colorize;
use commands::{Cli, Command, ConfigAction, OutputFormat, RunArgs};
use orchestra_application::RunOptions;
use orchestra_domain::Severity;
use orchestra_infrastructure::{
    ConfigLoader, EchoTool, EngineBuilder, FileConfig, FileTool, ScriptedModel,
};
use progress::ConsoleProgress;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_deref())?
    };

    let log_file = cli.log_file.clone().or_else(|| config.logging.log_file.clone());
    let _guard = init_logging(cli.verbose, log_file.as_deref())?;

    match cli.command {
        Command::Config { action } => {
            let explicit = if cli.no_config {
                None
            } else {
                Some(cli.config.as_deref())
            };
            config_command(action, &config, explicit)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Run(args) => run_command(args, &config).await,
    }
}

/// stderr logging, plus a daily-rotated file when a path is given.
///
/// RUST_LOG takes precedence over `-v`. The returned guard flushes the file
/// writer and must outlive every log call.
fn init_logging(verbose: u8, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = match path.parent() {
                Some(p) if !p.as_os_str().is_empty() => p,
                _ => Path::new("."),
            };
            let name = path
                .file_name()
                .with_context(|| format!("log file has no file name: {}", path.display()))?;
            std::fs::create_dir_all(dir)
                .with_context(|| format!("cannot create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Ok(guard)
}

/// `explicit` is `None` when configuration files are disabled
fn config_command(
    action: ConfigAction,
    config: &FileConfig,
    explicit: Option<Option<&Path>>,
) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let text = toml::to_string_pretty(config).context("cannot render configuration")?;
            print!("{}", text);
        }
        ConfigAction::Validate => {
            let issues = config.validate();
            if issues.is_empty() {
                println!("{}", "Configuration is valid".green());
                return Ok(());
            }
            for issue in &issues {
                if issue.severity == Severity::Error {
                    println!("{}", issue.to_string().red());
                } else {
                    println!("{}", issue.to_string().yellow());
                }
            }
            let errors = issues.iter().filter(|i| i.severity == Severity::Error).count();
            if errors > 0 {
                bail!("{} configuration error(s)", errors);
            }
        }
        ConfigAction::Sources => {
            let Some(path) = explicit else {
                println!("Configuration files disabled (--no-config)");
                return Ok(());
            };
            for source in ConfigLoader::sources(path) {
                let mark = if source.found {
                    "[FOUND]".green()
                } else {
                    "[     ]".dimmed()
                };
                println!("{} {:<12} {}", mark, source.kind.to_string(), source.location);
            }
        }
    }
    Ok(())
}

async fn run_command(args: RunArgs, config: &FileConfig) -> Result<ExitCode> {
    let model = ScriptedModel::from_file(&args.script)?;

    let builder = EngineBuilder::from_file_config(config)
        .with_tool(Arc::new(EchoTool::new()))
        .with_tool(Arc::new(FileTool::new(&args.workspace)));
    let errors = builder.errors();
    if !errors.is_empty() {
        for issue in &errors {
            eprintln!("{}", issue.to_string().red());
        }
        bail!("cannot start engine: {} configuration error(s)", errors.len());
    }

    let engine = Arc::new(builder.build(Arc::new(model)));

    let interrupt = engine.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted");
            interrupt.shutdown();
        }
    });

    let mut options = RunOptions::new();
    if let Some(max) = args.max_iterations {
        options = options.with_max_iterations(max);
    }
    if !args.quiet {
        options = options.with_observer(Arc::new(ConsoleProgress));
    }

    info!(task = %args.task, "Starting run");
    let out = engine.run(&args.task, &config.task_context(), options).await?;
    engine.shutdown();

    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&out)?),
        OutputFormat::Text => match (&out.output, &out.failure) {
            (Some(answer), _) => println!("{}", answer),
            (None, Some(failure)) => eprintln!("{} {}", "Task failed:".red().bold(), failure),
            (None, None) => eprintln!("{} {}", "Task failed:".red().bold(), out.terminated_reason),
        },
    }

    Ok(if out.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
