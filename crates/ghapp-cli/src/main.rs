//! ghapp CLI - act as a GitHub App and its installations from the command line.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ghapp_core::{AppConfig, Config};
use ghapp_github::Client;
use tracing_subscriber::EnvFilter;

/// Keys listed by `ghapp config show`.
const APP_KEYS: &[&str] = &[
    "app.app_id",
    "app.private_key_path",
    "app.base_url",
    "app.insecure_skip_verify",
];

#[derive(Parser)]
#[command(name = "ghapp")]
#[command(author, version, about = "ghapp - GitHub App and installation client", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// GitHub App ID
    #[arg(long, global = true)]
    app_id: Option<u64>,

    /// Path to the App's PEM private key
    #[arg(long, global = true)]
    private_key: Option<PathBuf>,

    /// API base URL (GitHub Enterprise, e.g. https://ghe.example.com/api/v3)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Skip TLS certificate verification
    #[arg(long, global = true)]
    insecure: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the authenticated App
    App,

    /// List installations of the App
    Installations,

    /// List repositories an installation can access
    Repos {
        /// Installation ID
        #[arg(short, long)]
        installation: u64,
    },

    /// Print an access token for an installation
    Token {
        /// Installation ID
        #[arg(short, long)]
        installation: u64,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Get a configuration value (e.g. app.app_id)
    Get { key: String },

    /// Set a configuration value (e.g. app.base_url https://ghe.example.com/api/v3)
    Set { key: String, value: String },
}

/// App settings given on the command line.
#[derive(Debug, Default)]
struct AppOverrides {
    app_id: Option<u64>,
    private_key: Option<PathBuf>,
    base_url: Option<String>,
    insecure: bool,
}

impl AppOverrides {
    fn from_cli(cli: &Cli) -> Self {
        Self {
            app_id: cli.app_id,
            private_key: cli.private_key.clone(),
            base_url: cli.base_url.clone(),
            insecure: cli.insecure,
        }
    }

    /// Apply the overrides on top of the config file's `[app]` section.
    fn resolve(self, config: &Config) -> Result<AppConfig> {
        let mut app = config.app.clone().unwrap_or_default();
        if let Some(app_id) = self.app_id {
            app.app_id = app_id;
        }
        if let Some(private_key) = self.private_key {
            app.private_key_path = private_key;
        }
        if let Some(base_url) = self.base_url {
            app.base_url = Some(base_url);
        }
        if self.insecure {
            app.insecure_skip_verify = true;
        }

        app.validate()
            .context("GitHub App is not configured; use `ghapp config set` or --app-id/--private-key")?;
        Ok(app)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => Config::config_path()?,
    };
    let mut config = Config::load_from(&config_path)?;

    let overrides = AppOverrides::from_cli(&cli);
    match cli.command {
        Some(Commands::Config { command }) => run_config(command, &mut config, &config_path)?,
        Some(command) => {
            let app = overrides.resolve(&config)?;
            let client = Client::from_config(&app)?;
            run_api(command, &client).await?;
        }
        None => {
            println!("ghapp - GitHub App and installation client");
            println!("Run with --help for usage information");
        }
    }

    Ok(())
}

async fn run_api(command: Commands, client: &Client) -> Result<()> {
    match command {
        Commands::App => {
            let app = client.get_app().await?;
            println!("{} (id {})", app.name, app.id);
            if let Some(slug) = &app.slug {
                println!("slug: {}", slug);
            }
            if let Some(owner) = &app.owner {
                println!("owner: {}", owner.login);
            }
            if let Some(count) = app.installations_count {
                println!("installations: {}", count);
            }
            println!("url: {}", app.html_url);
        }
        Commands::Installations => {
            for installation in client.list_installations().await? {
                let account = installation
                    .account
                    .as_ref()
                    .map(|a| a.login.as_str())
                    .unwrap_or("-");
                println!(
                    "{}\t{}\t{}",
                    installation.id,
                    account,
                    installation.repository_selection.as_deref().unwrap_or("-")
                );
            }
        }
        Commands::Repos { installation } => {
            let repos = client
                .installation(installation)
                .list_installation_repositories()
                .await?;
            for repo in repos {
                let visibility = if repo.private { "private" } else { "public" };
                println!("{}\t{}", repo.full_name, visibility);
            }
        }
        Commands::Token { installation } => {
            let token = client.installation_transport(installation).token().await?;
            println!("{}", token);
        }
        Commands::Config { .. } => anyhow::bail!("config commands do not use the API"),
    }

    Ok(())
}

fn run_config(command: ConfigCommands, config: &mut Config, path: &Path) -> Result<()> {
    match command {
        ConfigCommands::Show => {
            println!("# {}", path.display());
            for key in APP_KEYS {
                if let Some(value) = config.get(key)? {
                    println!("{} = {}", key, value);
                }
            }
        }
        ConfigCommands::Get { key } => match config.get(&key)? {
            Some(value) => println!("{}", value),
            None => anyhow::bail!("{} is not set", key),
        },
        ConfigCommands::Set { key, value } => {
            config.set(&key, &value)?;
            config.save_to(path)?;
            tracing::info!(key = %key, "Configuration updated");
        }
    }

    Ok(())
}
