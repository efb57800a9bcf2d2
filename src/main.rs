//! gg-store command line entry point.
//!
//! ## CLI Subcommands
//!
//! - `gg-store-cli list [NAME] [--json]` - List committed artifacts
//! - `gg-store-cli get TAG [--json]` - Show one manifest
//! - `gg-store-cli path TAG` - Print an artifact directory
//! - `gg-store-cli verify TAG` - Recompute and compare the payload digest
//! - `gg-store-cli check TAG` - Check requirements against the environment
//! - `gg-store-cli import-project NAME DIR` - Import a project directory
//! - `gg-store-cli config show|defaults|validate`

use std::path::Path;
use std::process::ExitCode;

use gg_store::adapters::builtin_registry;
use gg_store::cli::{config_cmd, models_cmd, EXIT_USAGE};
use gg_store::config::{self as store_config, StoreConfig};
use gg_store::models::{adapter, ModelStore};
use gg_store::telemetry;

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("help");

    let code = match command {
        "help" | "--help" | "-h" => {
            print_usage();
            0
        }
        "version" | "--version" | "-V" => {
            println!("gg-store {}", env!("CARGO_PKG_VERSION"));
            0
        }
        "config" => match args.get(2).map(|s| s.as_str()).unwrap_or("show") {
            "show" => config_cmd::run_show(),
            "defaults" => {
                config_cmd::run_defaults();
                0
            }
            "validate" => config_cmd::run_validate(),
            other => {
                eprintln!("Unknown config subcommand: {}", other);
                print_usage();
                EXIT_USAGE
            }
        },
        "list" | "get" | "path" | "verify" | "check" | "import-project" => {
            match open_store() {
                Ok(store) => run_store_command(&store, command, &args[2..]).await,
                Err(code) => code,
            }
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            EXIT_USAGE
        }
    };

    ExitCode::from(code.clamp(0, 255) as u8)
}

/// Load config, start logging and build the store. Errors map to exit code 2.
fn open_store() -> Result<ModelStore, i32> {
    let config: StoreConfig = store_config::load().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        EXIT_USAGE
    })?;

    if let Err(e) = telemetry::init_logging(&config.log) {
        eprintln!("Logging setup failed: {}", e);
        return Err(EXIT_USAGE);
    }
    telemetry::describe_metrics();

    let registry = builtin_registry(config.packages.iter().cloned())
        .and_then(adapter::install_global)
        .map_err(|e| {
            eprintln!("Configuration error: {}", e);
            EXIT_USAGE
        })?;

    Ok(ModelStore::from_config(&config, registry))
}

async fn run_store_command(store: &ModelStore, command: &str, rest: &[String]) -> i32 {
    let json = rest.iter().any(|a| a == "--json");
    let positional: Vec<&str> = rest
        .iter()
        .map(String::as_str)
        .filter(|a| !a.starts_with("--"))
        .collect();

    match (command, positional.as_slice()) {
        ("list", []) => models_cmd::run_list(store, None, json).await,
        ("list", [name]) => models_cmd::run_list(store, Some(*name), json).await,
        ("get", [tag]) => models_cmd::run_get(store, tag, json).await,
        ("path", [tag]) => models_cmd::run_path(store, tag).await,
        ("verify", [tag]) => models_cmd::run_verify(store, tag).await,
        ("check", [tag]) => models_cmd::run_check(store, tag).await,
        ("import-project", [name, dir]) => {
            models_cmd::run_import_project(store, name, Path::new(dir)).await
        }
        _ => {
            eprintln!("Invalid arguments for {}", command);
            print_usage();
            EXIT_USAGE
        }
    }
}

fn print_usage() {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        "gg-store - Tag-indexed model artifact store v{}

USAGE:
    gg-store-cli <COMMAND> [ARGS] [OPTIONS]

COMMANDS:
    list [NAME]              List committed artifacts, newest first per name
    get TAG                  Show the manifest of TAG
    path TAG                 Print the directory of TAG
    verify TAG               Recompute the payload digest and compare
    check TAG                Check requirements against the environment
    import-project NAME DIR  Import DIR as a new project artifact
    config show              Show effective configuration
    config defaults          Show default configuration
    config validate          Validate configuration
    version                  Show version information
    help                     Show this help message

OPTIONS:
    --json   Print manifests as JSON (list, get)

TAGS:
    name            Newest artifact of name (same as name:latest)
    name:version    One exact artifact

ENVIRONMENT:
    GG_STORE_CONFIG          TOML config file
    GG_STORE_HOME            Store root directory (default: ./model-store)
    GG_STORE_VERIFY_ON_LOAD  Re-check digests on load (default: false)
    GG_STORE_PACKAGES        Extra available packages, name==version,...
    GG_STORE_LOG_LEVEL       Log filter (default: info)
    GG_STORE_LOG_FORMAT      json or pretty (default: json)
    GG_STORE_LOG_FILE        Write logs to this file instead of stderr

EXIT CODES:
    0  Success
    1  Failure
    2  Usage or configuration error
    4  Artifact not found
",
        version
    );
}
