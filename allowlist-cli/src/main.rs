use allowlist_core::config::ConfigValidator;
use allowlist_core::{AllowlistReconciler, AtlasClient, Config, ConfigLoader};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::filter::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "atlas-allowlist")]
#[command(about = "Manage Atlas project IP allowlist entries")]
#[command(version)]
struct Cli {
    /// Config file path
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Override the API base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Bearer token for the API
    #[arg(long, env = "ATLAS_ACCESS_TOKEN", hide_env_values = true, global = true)]
    access_token: Option<String>,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an entry and wait until the service reports it
    Create {
        #[command(flatten)]
        target: Target,

        /// Free-form comment stored with the entry
        #[arg(long)]
        comment: Option<String>,
    },
    /// Read the entry behind a state id
    Read { state_id: String },
    /// Delete the entry behind a state id and confirm it is gone
    Delete { state_id: String },
    /// Adopt an existing entry from `{project_id}-{entry}`
    Import { import_id: String },
    /// Look up a single entry without tracking it
    Lookup {
        #[command(flatten)]
        target: Target,
    },
    /// Create every entry declared in the config file
    Apply,
}

/// Project and address of one entry; exactly one address field is expected
#[derive(Args, Debug)]
struct Target {
    #[arg(long, short = 'p')]
    project_id: String,

    #[arg(long)]
    cidr_block: Option<String>,

    #[arg(long)]
    ip_address: Option<String>,

    #[arg(long)]
    aws_security_group: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing_subscriber::filter::LevelFilter::DEBUG
    } else {
        tracing_subscriber::filter::LevelFilter::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&cli)?;
    let client = AtlasClient::new(&config.api).context("Failed to build API client")?;
    let reconciler = AllowlistReconciler::with_policies(client, config.retry.policies());

    let output = match cli.command {
        Command::Create { target, comment } => {
            let id = reconciler
                .create_from_fields(
                    &target.project_id,
                    target.cidr_block.as_deref(),
                    target.ip_address.as_deref(),
                    target.aws_security_group.as_deref(),
                    comment.as_deref(),
                )
                .await?;
            let entry = reconciler.read(&id).await?;
            json!({ "id": id.encode(), "entry": entry })
        }
        Command::Read { state_id } => {
            let entry = reconciler.read_state(&state_id).await?;
            if entry.is_none() {
                warn!(state_id = %state_id, "Entry no longer exists; drop it from local state");
            }
            json!({ "id": state_id, "entry": entry })
        }
        Command::Delete { state_id } => {
            reconciler.delete_state(&state_id).await?;
            json!({ "id": state_id, "deleted": true })
        }
        Command::Import { import_id } => {
            let id = reconciler.import(&import_id).await?;
            let entry = reconciler.read(&id).await?;
            json!({ "id": id.encode(), "entry": entry })
        }
        Command::Lookup { target } => {
            let found = reconciler
                .lookup(
                    &target.project_id,
                    target.cidr_block.as_deref(),
                    target.ip_address.as_deref(),
                    target.aws_security_group.as_deref(),
                )
                .await?;
            serde_json::to_value(found)?
        }
        Command::Apply => {
            let mut created = Map::new();
            for (name, entry) in &config.entries {
                let request = entry
                    .to_request()
                    .with_context(|| format!("Invalid entry {}", name))?;
                let id = reconciler
                    .create(&request)
                    .await
                    .with_context(|| format!("Failed to apply entry {}", name))?;
                info!(name = %name, id = %id, "Entry applied");
                created.insert(name.clone(), Value::String(id.encode()));
            }
            Value::Object(created)
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Config file values, with command line flags layered on top
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = ConfigLoader::load_or_default(cli.config.clone())
        .context("Failed to load configuration")?;

    if let Some(base_url) = &cli.base_url {
        config.api.base_url = base_url.clone();
    }
    if let Some(token) = &cli.access_token {
        config.api.access_token = Some(token.clone());
    }

    ConfigValidator::validate(&config).context("Invalid configuration")?;
    Ok(config)
}
