//! topogen - worker topology generator
//!
//! Turns a declarative worker-type request into a mutually consistent set of
//! deployment artifacts: a shared config patch, per-worker descriptors, a
//! reverse-proxy routing table and a process-supervision spec.

mod cli;
mod descriptor;
mod error;
mod logging;
mod plan;
mod registry;
mod routes;
mod shared;
mod supervise;
mod synth;

use anyhow::Result;
use clap::Parser;
use owo_colors::{OwoColorize, Stream::Stderr};

use cli::{Cli, Commands};
use registry::Registry;

fn main() {
    let cli = Cli::parse();

    if cli.no_color {
        owo_colors::set_override(false);
    }

    logging::init(
        logging::LogConfig::default()
            .with_level(cli.log_level())
            .with_env_overrides(),
    );

    let result = match &cli.command {
        Commands::Generate(args) => cmd_generate(args),
        Commands::Workers(args) => cmd_workers(args),
        Commands::Completions(args) => {
            args.generate();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!(
            "{}: {}",
            "error"
                .if_supports_color(Stderr, |text| text.red())
                .if_supports_color(Stderr, |text| text.bold()),
            e
        );
        for cause in e.chain().skip(1) {
            eprintln!(
                "  {}: {}",
                "caused by".if_supports_color(Stderr, |text| text.yellow()),
                cause
            );
        }
        std::process::exit(1);
    }
}

/// Run the synthesis pipeline, or print the artifacts when --dry-run is set.
fn cmd_generate(args: &cli::GenerateArgs) -> Result<()> {
    let registry = Registry::builtin();
    let opts = args.to_options();

    if args.dry_run {
        if !opts.base_config.exists() {
            return Err(error::TopogenError::MissingBaseConfig(opts.base_config).into());
        }
        let paths = synth::ArtifactPaths::from(&opts);
        let request = plan::WorkerRequest::parse(opts.workers.as_deref());
        let listeners = shared::read_base_listeners(&paths.base_config)?;
        let artifacts = synth::build_artifacts(&registry, &request, listeners, &paths)?;

        println!("# --- {} (appended)", paths.shared_patch.display());
        print!("{}", artifacts.shared_patch);
        println!("# --- {}", paths.proxy_conf.display());
        print!("{}", artifacts.routing_table);
        println!("# --- {}", paths.supervisor_conf.display());
        print!("{}", artifacts.supervision);
        for descriptor in &artifacts.descriptors {
            println!("# --- {}", paths.worker_config(&descriptor.name).display());
            print!("{}", serde_yaml::to_string(descriptor)?);
        }
        return Ok(());
    }

    let artifacts = synth::generate(&registry, &opts)?;
    for (name, port) in &artifacts.workers {
        println!("{name}: {port}");
    }
    Ok(())
}

/// List the registered worker types.
fn cmd_workers(args: &cli::WorkersArgs) -> Result<()> {
    let registry = Registry::builtin();

    if args.json {
        println!("{}", serde_json::to_string_pretty(registry.definitions())?);
        return Ok(());
    }

    for def in registry.definitions() {
        println!(
            "{:<20} {:<32} {} endpoint(s)",
            def.name,
            def.app,
            def.endpoint_patterns.len()
        );
    }
    Ok(())
}
