//! Command-line interface definitions using clap.

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing::Level;

use crate::synth::SynthesisOptions;

/// Generates a consistent multi-process worker topology: per-worker configs,
/// a shared config patch, a reverse-proxy routing table and a supervisor
/// spec.
#[derive(Parser, Debug)]
#[command(name = "topogen")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors.
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    pub quiet: bool,

    /// Disable colored output.
    #[arg(long, env = "NO_COLOR", global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Synthesize the worker topology and write all artifacts.
    Generate(GenerateArgs),

    /// List the registered worker types.
    Workers(WorkersArgs),

    /// Generate shell completions.
    Completions(CompletionsArgs),
}

/// Arguments for the generate command.
#[derive(Parser, Debug)]
pub struct GenerateArgs {
    /// Comma-separated worker types, '*' for all registered types, or unset
    /// for a main-process-only topology.
    #[arg(short, long, env = "TOPOGEN_WORKERS")]
    pub workers: Option<String>,

    /// Path to the base homeserver config.
    #[arg(long, env = "TOPOGEN_CONFIG_PATH", default_value = "/data/homeserver.yaml")]
    pub config_path: PathBuf,

    /// Data directory holding logs and user-facing config files.
    #[arg(long, env = "TOPOGEN_DATA_DIR", default_value = "/data")]
    pub data_dir: PathBuf,

    /// Directory for per-worker configs and the shared patch.
    #[arg(long, env = "TOPOGEN_WORKERS_DIR", default_value = "/conf/workers")]
    pub workers_dir: PathBuf,

    /// Path of the generated reverse-proxy config.
    #[arg(
        long,
        env = "TOPOGEN_PROXY_CONF",
        default_value = "/etc/nginx/conf.d/matrix-synapse.conf"
    )]
    pub proxy_conf: PathBuf,

    /// Path of the generated supervisor config.
    #[arg(
        long,
        env = "TOPOGEN_SUPERVISOR_CONF",
        default_value = "/etc/supervisor/conf.d/supervisord.conf"
    )]
    pub supervisor_conf: PathBuf,

    /// Print the artifacts to stdout instead of writing them.
    #[arg(long)]
    pub dry_run: bool,
}

impl GenerateArgs {
    /// Convert CLI arguments into synthesis options.
    pub fn to_options(&self) -> SynthesisOptions {
        SynthesisOptions {
            workers: self.workers.clone(),
            base_config: self.config_path.clone(),
            data_dir: self.data_dir.clone(),
            workers_dir: self.workers_dir.clone(),
            proxy_conf: self.proxy_conf.clone(),
            supervisor_conf: self.supervisor_conf.clone(),
        }
    }
}

/// Arguments for the workers command.
#[derive(Parser, Debug)]
pub struct WorkersArgs {
    /// Emit the registry as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for shell completions.
#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for.
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate and print completions to stdout.
    pub fn generate(&self) {
        clap_complete::generate(
            self.shell,
            &mut Cli::command(),
            "topogen",
            &mut std::io::stdout(),
        );
    }
}

impl Cli {
    /// Log level derived from the -v/-q flags.
    pub fn log_level(&self) -> Level {
        if self.quiet {
            Level::ERROR
        } else {
            match self.verbose {
                0 => Level::INFO,
                1 => Level::DEBUG,
                _ => Level::TRACE,
            }
        }
    }
}
