mod logging;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{CommandFactory, Parser, Subcommand};
use log::{debug, error, info};
use pluggate_core::constants::APP_NAME;
use pluggate_core::utils::fs::find_plugin_archives;
use pluggate_core::{ConfigError, PluginManager, PluginRegistry, RegistryConfig};

/// Pluggate: validate and register plugin archives
#[derive(Parser, Debug)]
#[command(name = APP_NAME, author, version, about, long_about = None)]
struct CliArgs {
    /// Print "pong" and exit; a quick check that the binary runs
    #[arg(long)]
    ping: bool,

    /// Registry configuration file (.json, .toml, .yaml or .yml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Install plugin archives in the given order
    Install {
        /// Archives to install; directories are searched for archives
        #[arg(required = true, value_name = "ARCHIVE|DIR")]
        archives: Vec<PathBuf>,

        /// Give up on a single archive after this many milliseconds
        #[arg(long, value_name = "MS", value_parser = clap::value_parser!(u64).range(1..))]
        timeout_ms: Option<u64>,
    },
    /// Print the descriptor of an archive as JSON without installing it
    Inspect {
        /// The archive to read
        archive: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    if args.ping {
        println!("pong");
        return ExitCode::SUCCESS;
    }

    if let Err(e) = logging::init_logging() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match args.command {
        Some(Commands::Install { archives, timeout_ms }) => install(&config, &archives, timeout_ms).await,
        Some(Commands::Inspect { archive }) => inspect(&config, &archive),
        None => {
            // Help goes to stdout; a missing command is still a usage error.
            let _ = CliArgs::command().print_help();
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<RegistryConfig, ConfigError> {
    match path {
        Some(path) => {
            let config = RegistryConfig::load(path)?;
            debug!("Loaded configuration from {}: {:?}", path.display(), config);
            Ok(config)
        }
        None => Ok(RegistryConfig::default()),
    }
}

/// Replace each directory argument by the archives found below it.
fn expand_inputs(inputs: &[PathBuf], extension: &str) -> std::io::Result<Vec<PathBuf>> {
    let mut archives = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let found = find_plugin_archives(input, extension)?;
            info!("Found {} plugin archives in {}", found.len(), input.display());
            archives.extend(found);
        } else {
            archives.push(input.clone());
        }
    }
    Ok(archives)
}

async fn install(config: &RegistryConfig, inputs: &[PathBuf], timeout_ms: Option<u64>) -> ExitCode {
    let mut manager = match PluginManager::from_config(config) {
        Ok(manager) => manager,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(ms) = timeout_ms {
        manager = manager.with_timeout(Duration::from_millis(ms));
    }

    let archives = match expand_inputs(inputs, &manager.registry().layout().extension) {
        Ok(archives) => archives,
        Err(e) => {
            error!("Failed to search for plugin archives: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if archives.is_empty() {
        eprintln!("No plugin archives found");
        return ExitCode::FAILURE;
    }

    let results = manager.install_in_order(archives).await;
    let mut failures = 0;
    for (path, result) in &results {
        match result {
            Ok(plugin) => println!(
                "installed {} {} ({}) from {}",
                plugin.name(),
                plugin.version_string(),
                plugin.id(),
                path.display()
            ),
            Err(e) => {
                failures += 1;
                eprintln!("failed {}: {}", path.display(), e);
            }
        }
    }
    println!("{} of {} plugins installed", results.len() - failures, results.len());

    if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn inspect(config: &RegistryConfig, archive: &Path) -> ExitCode {
    let registry = match PluginRegistry::from_config(config) {
        Ok(registry) => registry,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let descriptor = match registry.load_descriptor(archive) {
        Ok(descriptor) => descriptor,
        Err(e) => {
            eprintln!("failed {}: {}", archive.display(), e);
            return ExitCode::FAILURE;
        }
    };
    match serde_json::to_string_pretty(&descriptor) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to serialize the descriptor: {}", e);
            ExitCode::FAILURE
        }
    }
}
