mod activate;
mod cli;
mod config;
mod env_store;
mod error;
mod extract;
mod fetch;
mod fs_util;
mod http;
mod install;
mod platform;
mod prompt;
mod registry;
mod resolve;
mod types;


use activate::Activator;
use anyhow::{anyhow, Result};
use chrono::{DateTime, Local};
use clap::Parser;
use cli::{Cli, Commands, ConfigAction};
use config::{
    effective_settings, get_setting, load_config, normalize_key, save_config, set_setting,
    unset_setting, Layout, SETTING_KEYS,
};
use env_store::FileEnvStore;
use http::{HttpClient, ReqwestClient};
use install::Installer;
use prompt::{Decider, Fixed, TerminalDecider};
use registry::Registry;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use types::PvmSettings;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = setup_logging(&cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config()?;
    let settings = effective_settings(&config);
    let layout = Layout::from_settings(&settings);

    let decider: Box<dyn Decider> = if cli.yes {
        Box::new(Fixed(true))
    } else {
        Box::new(TerminalDecider::default())
    };

    match cli.command {
        Commands::Version => {
            println!("pvm {}", cli::get_version());
        }

        Commands::Config { action } => {
            handle_config(action, &settings)?;
        }

        Commands::List => {
            layout.ensure()?;
            list_installed(&layout, &activator(&layout, &settings));
        }

        Commands::Current => match activator(&layout, &settings).current() {
            Some(active) => println!("{}", active),
            None => println!("No PHP version is active. Run `pvm use <version>` to pick one."),
        },

        Commands::Check => {
            let http = ReqwestClient::new(&settings)?;
            check_available(&http, &settings).await?;
        }

        Commands::Install { spec, no_use } => {
            layout.ensure()?;
            let http: Arc<dyn HttpClient> = Arc::new(ReqwestClient::new(&settings)?);
            let installer = Installer::new(http, &settings, &layout);
            let installed = installer.install(&spec, decider.as_ref()).await?;

            if no_use {
                println!("Installed {}. Run `pvm use {}` to activate it.", installed.dir_name, installed.spec);
            } else {
                let previous = activator(&layout, &settings).activate(&installed)?;
                println!("{}", switch_summary(previous.as_ref(), &installed.dir_name));
            }
        }

        Commands::Use { spec } => {
            layout.ensure()?;
            let http: Arc<dyn HttpClient> = Arc::new(ReqwestClient::new(&settings)?);
            let installer = Installer::new(http, &settings, &layout);
            let report = activator(&layout, &settings)
                .use_spec(&spec, installer.registry(), &installer, decider.as_ref())
                .await?;

            println!(
                "{}",
                switch_summary(report.previous.as_ref(), &report.activated.dir_name)
            );
        }
    }

    Ok(())
}

fn activator(layout: &Layout, settings: &PvmSettings) -> Activator {
    let mut store = FileEnvStore::new(layout.env_state_file());
    if settings.update_profile {
        let profile = settings
            .shell_profile
            .as_ref()
            .map(PathBuf::from)
            .or_else(env_store::default_profile);
        if let Some(profile) = profile {
            store = store.with_profile(profile);
        }
    }
    Activator::new(layout, Box::new(store), settings.spawn_shell)
}

fn switch_summary(previous: Option<&types::ActiveVersion>, dir_name: &str) -> String {
    match previous {
        Some(previous) => format!("Switched from {} to {}", previous, dir_name),
        None => format!("Now using {}", dir_name),
    }
}

fn setup_logging(cli: &Cli) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if cli.quiet {
        "error"
    } else if cli.verbose == 0 {
        "warn"
    } else if cli.verbose == 1 {
        "info"
    } else {
        "debug"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("Could not set up logging: {}", e))
}

fn handle_config(action: ConfigAction, settings: &PvmSettings) -> Result<()> {
    match action {
        ConfigAction::Get { key } => {
            if let Some(key) = key {
                let value = get_setting(settings, &key).ok_or_else(|| {
                    anyhow!(
                        "'{}' is not a valid configuration setting. Valid settings: {}",
                        key,
                        SETTING_KEYS.join(", ")
                    )
                })?;
                println!("{}", value);
            } else {
                println!("--- pvm Settings ---");
                print_settings(settings);
            }
        }
        ConfigAction::Set { args } => {
            let (key, value) = match args.as_slice() {
                [pair] => pair
                    .split_once('=')
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .ok_or_else(|| anyhow!("Invalid format. Use 'key=value' or 'key value'."))?,
                [key, rest @ ..] => (key.clone(), rest.join(" ")),
                [] => return Err(anyhow!("Invalid format. Use 'key=value' or 'key value'.")),
            };
            let mut config = load_config()?;
            set_setting(&mut config.settings, &key, &value)?;
            save_config(&config)?;
            tracing::info!("Setting '{}' updated to '{}'", normalize_key(&key), value);
        }
        ConfigAction::Unset { key } => {
            let mut config = load_config()?;
            unset_setting(&mut config.settings, &key)?;
            save_config(&config)?;
            tracing::info!("Setting '{}' unset", normalize_key(&key));
        }
        ConfigAction::Show { format } => match format.as_str() {
            "json" => println!("{}", serde_json::to_string_pretty(settings)?),
            "yaml" => print!("{}", serde_yaml::to_string(settings)?),
            "plain" => print_settings(settings),
            other => return Err(anyhow!("Unknown format '{}'. Use json, yaml or plain.", other)),
        },
    }
    Ok(())
}

fn print_settings(settings: &PvmSettings) {
    for key in SETTING_KEYS {
        println!("  {}: {}", key, get_setting(settings, key).unwrap_or_default());
    }
}

fn list_installed(layout: &Layout, activator: &Activator) {
    let registry = Registry::new(layout);
    let listing = registry.list_installed();
    let current = activator.current();
    let active_dir = current.as_ref().and_then(|a| a.dir_name());

    println!("--- Installed PHP Versions ---");
    if listing.mapped.is_empty() && listing.unmapped.is_empty() {
        println!("  No PHP versions installed yet.");
        return;
    }

    for entry in &listing.mapped {
        let marker = if active_dir == Some(entry.dir_name.as_str()) { "*" } else { " " };
        if entry.exists {
            let path = registry.root().join(&entry.dir_name);
            println!("  {} {} => {}  {}", marker, entry.spec, entry.dir_name, describe_dir(&path));
        } else {
            println!("  {} {} => {}  (missing)", marker, entry.spec, entry.dir_name);
        }
    }

    if !listing.unmapped.is_empty() {
        println!("\n  Not in the registry:");
        for dir_name in &listing.unmapped {
            let marker = if active_dir == Some(dir_name.as_str()) { "*" } else { " " };
            let path = registry.root().join(dir_name);
            println!("  {} {}  {}", marker, dir_name, describe_dir(&path));
        }
    }

    if let Some(types::ActiveVersion::Unmanaged { path }) = &current {
        println!("\n  Active PHP is not managed by pvm: {}", path.display());
    }
    println!("------------------------------");
}

fn describe_dir(path: &Path) -> String {
    let size = format_size(fs_util::dir_size(path));
    match fs::metadata(path).and_then(|m| m.modified()) {
        Ok(modified) => {
            let modified: DateTime<Local> = modified.into();
            format!("({}, {})", size, modified.format("%Y-%m-%d %H:%M"))
        }
        Err(_) => format!("({})", size),
    }
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

async fn check_available(http: &dyn HttpClient, settings: &PvmSettings) -> Result<()> {
    let series = resolve::fetch_available_versions(http, &settings.release_url).await?;
    if series.is_empty() {
        println!("No PHP releases found at {}", settings.release_url);
        return Ok(());
    }

    println!("--- Available PHP Versions ---");
    for (key, versions) in series.iter().rev() {
        let listed: Vec<String> = versions.iter().rev().map(|v| v.to_string()).collect();
        println!("  {}.{}: {}", key.major, key.minor, listed.join(", "));
    }
    println!("------------------------------");
    println!("Install with `pvm install <major.minor>` or pin a patch release with `pvm install <major.minor.patch>`.");
    Ok(())
}
