//! promptrelay - Prompt relay with ordered multi-provider LLM fallback
//!
//! A small server that frames a prompt with a mode's system instruction and
//! returns the first reply any configured provider manages to produce.

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use promptrelay::config::{Config, KeySource};

#[derive(Parser)]
#[command(name = "promptrelay")]
#[command(about = "Prompt relay with ordered multi-provider LLM fallback")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relay server
    Serve {
        /// Path to configuration file (built-in provider catalog when omitted)
        #[arg(short, long)]
        config: Option<String>,

        /// Override listen address
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// Validate configuration and report which providers have keys
    Check {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Show registered providers in fallback order
    Providers {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<String>,
    },
}

impl Commands {
    fn config_path(&self) -> Option<&str> {
        match self {
            Commands::Serve { config, .. }
            | Commands::Check { config }
            | Commands::Providers { config } => config.as_deref(),
        }
    }
}

fn load_config(path: Option<&str>) -> promptrelay::Result<(Config, Vec<(String, KeySource)>)> {
    let loaded = match path {
        Some(path) => Config::from_file_with_env(path)?,
        None => Config::from_env()?,
    };
    Ok(loaded)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let loaded = load_config(cli.command.config_path());

    let level = loaded
        .as_ref()
        .map(|(config, _)| config.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("promptrelay={},tower_http=info", level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let (mut config, key_sources) = loaded?;

    match cli.command {
        Commands::Serve { config: path, listen } => {
            tracing::info!(
                config = %path.as_deref().unwrap_or("<built-in>"),
                "Loaded configuration"
            );

            for (name, source) in &key_sources {
                if *source == KeySource::None {
                    tracing::warn!(provider = %name, "No API key found, provider skipped");
                }
            }

            if let Some(addr) = listen {
                tracing::info!(listen = %addr, "Override listen address");
                config.server.listen = addr;
            }

            promptrelay::proxy::run_server(config).await
        }

        Commands::Check { .. } => {
            let total = config.providers.len();
            let mut configured = 0;

            for (provider, (_, source)) in config.providers.iter().zip(&key_sources) {
                if provider.is_configured() {
                    configured += 1;
                    let masked: Vec<String> =
                        provider.api_keys.iter().map(|k| k.masked()).collect();
                    println!(
                        "ok       {:<16} {} key(s) [{}] via {}",
                        provider.name,
                        provider.api_keys.len(),
                        masked.join(", "),
                        source
                    );
                } else {
                    println!("missing  {:<16} not configured", provider.name);
                }
            }

            println!("\n{}/{} providers configured", configured, total);

            if configured == 0 {
                anyhow::bail!("No API providers configured - add at least one API key");
            }
            Ok(())
        }

        Commands::Providers { .. } => {
            for (priority, provider) in config.configured_providers().enumerate() {
                println!(
                    "{}. {} ({}) models: {}",
                    priority + 1,
                    provider.display_name,
                    provider.kind,
                    provider.models.join(", ")
                );
            }
            Ok(())
        }
    }
}
