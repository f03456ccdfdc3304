//! CLI command definitions

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for run results
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// The final answer, or the failure
    Text,
    /// The whole run result as JSON
    Json,
}

/// CLI arguments for orchestra
#[derive(Parser, Debug)]
#[command(name = "orchestra")]
#[command(
    author,
    version,
    about = "Agent orchestration engine with tool calls, recovery and consensus"
)]
#[command(long_about = r#"
Runs an agent task through the orchestration engine: a reasoning loop that
calls tools in parallel under resource budgets, recovers from tool failures
and can delegate to peer agents.

Configuration files are loaded from (in priority order):
1. ORCHESTRA_* env vars   e.g. ORCHESTRA_AGENT__MAX_ITERATIONS=5
2. --config <path>        Explicit config file
3. ./orchestra.toml       Project-level config
4. ~/.config/agent-orchestra/config.toml   Global config

Example:
  orchestra run --script replies.json "Summarise notes.txt"
  orchestra config validate
  orchestra config show
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace); RUST_LOG wins when set
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long, global = true)]
    pub no_config: bool,

    /// Also write diagnostic logs to this file (rotated daily)
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one task to completion
    Run(RunArgs),

    /// Inspect the configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// The task for the agent
    pub task: String,

    /// JSON list of model replies to play back instead of a live model
    #[arg(long, value_name = "PATH")]
    pub script: PathBuf,

    /// Lower the iteration ceiling for this run
    #[arg(long, value_name = "N")]
    pub max_iterations: Option<usize>,

    /// Root directory for the `files` tool
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub workspace: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Suppress progress output
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum ConfigAction {
    /// Print the merged configuration as TOML
    Show,
    /// Report every configuration problem; fails on errors
    Validate,
    /// List configuration sources in priority order
    Sources,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_arguments() {
        let cli = Cli::try_parse_from([
            "orchestra",
            "-vv",
            "run",
            "--script",
            "r.json",
            "--max-iterations",
            "3",
            "do it",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.task, "do it");
                assert_eq!(args.max_iterations, Some(3));
                assert!(matches!(args.output, OutputFormat::Text));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_config_subcommand_with_global_flag() {
        let cli = Cli::try_parse_from(["orchestra", "config", "validate", "--config", "x.toml"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Command::Config {
                action: ConfigAction::Validate
            }
        ));
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
    }

    #[test]
    fn test_run_requires_script() {
        assert!(Cli::try_parse_from(["orchestra", "run", "task"]).is_err());
    }
}
