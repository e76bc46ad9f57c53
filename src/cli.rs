use clap::{Parser, Subcommand};

pub fn get_version() -> &'static str {
    const BASE_VERSION: &str = env!("CARGO_PKG_VERSION");

    // Release builds are tagged
    if let Some(tag) = option_env!("PVM_GIT_TAG") {
        return tag;
    }

    let commit = option_env!("PVM_GIT_COMMIT").unwrap_or("unknown");
    let branch = option_env!("PVM_GIT_BRANCH").unwrap_or("unknown");

    // Computed once at startup
    let version = format!("v{}-{} ({})", BASE_VERSION, commit, branch);
    Box::leak(version.into_boxed_str())
}

#[derive(Parser)]
#[command(name = "pvm")]
#[command(about = "A PHP version manager for Windows release builds")]
#[command(version = get_version(), propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (use multiple times for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Reduce output to errors only
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Answer yes to every confirmation prompt
    #[arg(short, long, global = true)]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List installed PHP versions
    List,

    /// Download and install a PHP version
    #[command(after_help = "Examples:\n  pvm install 8.2\n  pvm install 8.2.4 --no-use\n  pvm -y install 7.4")]
    Install {
        /// Version to install (e.g., '8.2' or '8.2.4')
        spec: String,
        /// Do not activate the version after installing it
        #[arg(long)]
        no_use: bool,
    },

    /// Make an installed PHP version the active one
    Use {
        /// Version to activate (e.g., '8.2')
        spec: String,
    },

    /// Show the active PHP version
    Current,

    /// List PHP versions published upstream
    Check,

    /// Manage pvm's configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show the current version
    Version,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a configuration setting
    Get {
        /// Key to get (if omitted, shows all settings)
        key: Option<String>,
    },
    /// Set a configuration setting
    Set {
        /// Key and value (e.g., 'home-dir=D:\pvm' or 'home-dir D:\pvm')
        #[arg(trailing_var_arg = true, required = true)]
        args: Vec<String>,
    },
    /// Unset a configuration setting (restores the default)
    Unset {
        /// Key to unset (e.g., 'release-url')
        key: String,
    },
    /// Show full configuration
    Show {
        /// Output format (json, yaml, plain)
        #[arg(long, default_value = "json")]
        format: String,
    },
}
