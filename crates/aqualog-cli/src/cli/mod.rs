//! CLI entry and dispatch.

use anyhow::{Context, Result};
use aqualog_core::config::Config;
use clap::Parser;

mod commands;

#[derive(Parser)]
#[command(name = "aqualog")]
#[command(version)]
#[command(about = "Hydration tracking CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Log in with email and password
    Login {
        /// Account email address
        #[arg(long)]
        email: String,
        /// Password (read from stdin when omitted)
        #[arg(long)]
        password: Option<String>,
    },

    /// Create an account (logs in on success)
    Register {
        /// Display name
        #[arg(long)]
        name: String,
        /// Account email address
        #[arg(long)]
        email: String,
        /// Password (read from stdin when omitted)
        #[arg(long)]
        password: Option<String>,
    },

    /// Log out (clear the stored credential)
    Logout,

    /// Show the current session
    Whoami,

    /// Track today's water intake
    Water {
        #[command(subcommand)]
        command: WaterCommands,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum WaterCommands {
    /// Show today's intake
    Show,
    /// Add glasses to today's count and save
    Add {
        /// Number of glasses to add
        #[arg(value_name = "GLASSES", default_value_t = 1)]
        glasses: u32,
    },
    /// Remove glasses from today's count and save
    Sub {
        /// Number of glasses to remove
        #[arg(value_name = "GLASSES", default_value_t = 1)]
        glasses: u32,
    },
    /// Set today's count and save
    Set {
        /// Glass count (clamped to the daily goal)
        #[arg(value_name = "GLASSES")]
        glasses: u32,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    init_tracing();

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli).await })
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env("AQUALOG_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn dispatch(cli: Cli) -> Result<()> {
    let config = Config::load().context("load config")?;
    let base_url = config.effective_base_url()?;

    match cli.command {
        Commands::Login { email, password } => {
            commands::auth::login(&base_url, &email, password).await
        }
        Commands::Register {
            name,
            email,
            password,
        } => commands::auth::register(&base_url, &name, &email, password).await,
        Commands::Logout => commands::auth::logout(&base_url),
        Commands::Whoami => commands::auth::whoami(&base_url).await,

        Commands::Water { command } => match command {
            WaterCommands::Show => commands::water::show(&base_url).await,
            WaterCommands::Add { glasses } => {
                let delta = i32::try_from(glasses).context("glass count too large")?;
                commands::water::adjust(&base_url, delta).await
            }
            WaterCommands::Sub { glasses } => {
                let delta = i32::try_from(glasses).context("glass count too large")?;
                commands::water::adjust(&base_url, -delta).await
            }
            WaterCommands::Set { glasses } => commands::water::set(&base_url, glasses).await,
        },

        Commands::Config { command } => match command {
            ConfigCommands::Path => commands::config::path(),
            ConfigCommands::Init => commands::config::init(),
        },
    }
}
