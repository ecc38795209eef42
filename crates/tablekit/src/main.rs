use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use clap::Parser;
use serde::Deserialize;
use tablekit::storage::{AwsConfig, DynamoDbStore};
use tablekit::{Context, EntitySchema, Store, StoreError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Tablekit - Provision tables for typed entity schemas
#[derive(Parser, Debug)]
#[command(name = "tablekit")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Print the tables and indexes a schema file describes.
    Plan(PlanCommand),

    /// Create every table a schema file describes.
    #[command(long_about = "Create every table a schema file describes.

Tables that already exist are skipped. Each table is created with on-demand
billing and the command waits until it and its indexes are active.

Environment variables:
  AWS_ENDPOINT_URL    - Use local DynamoDB (e.g., http://localhost:8000)
  AWS_REGION          - AWS region (defaults to us-east-1)
  AWS_PROFILE         - AWS profile to use for credentials")]
    CreateTables(CreateTablesCommand),
}

#[derive(Debug, clap::Args)]
struct SchemaArgs {
    /// JSON file with one entity schema or a list of them.
    #[arg(long, value_name = "FILE")]
    schema: PathBuf,

    /// Prefix prepended to every table name.
    #[arg(long, env = "TABLEKIT_TABLE_PREFIX", default_value = "")]
    prefix: String,
}

#[derive(Debug, clap::Args)]
struct PlanCommand {
    #[command(flatten)]
    schema: SchemaArgs,
}

#[derive(Debug, clap::Args)]
struct CreateTablesCommand {
    #[command(flatten)]
    schema: SchemaArgs,

    /// Custom endpoint URL (for local DynamoDB).
    #[arg(long, env = "AWS_ENDPOINT_URL")]
    endpoint_url: Option<String>,

    /// AWS region.
    #[arg(long, env = "AWS_REGION", default_value = "us-east-1")]
    region: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SchemaFile {
    Many(Vec<EntitySchema>),
    One(EntitySchema),
}

fn load_schemas(path: &Path) -> Result<Vec<EntitySchema>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read schema file {}", path.display()))?;
    let file: SchemaFile = serde_json::from_str(&text)
        .with_context(|| format!("Invalid schema file {}", path.display()))?;
    Ok(match file {
        SchemaFile::Many(schemas) => schemas,
        SchemaFile::One(schema) => vec![schema],
    })
}

fn plan(command: &PlanCommand) -> Result<()> {
    for schema in load_schemas(&command.schema.schema)? {
        let table_name = schema.table_name(&command.schema.prefix);
        for line in schema.describe(&table_name) {
            println!("{line}");
        }
        println!();
    }
    Ok(())
}

async fn create_tables(command: &CreateTablesCommand) -> Result<()> {
    let schemas = load_schemas(&command.schema.schema)?;
    let mut aws = AwsConfig::default().with_region(&command.region);
    if let Some(endpoint_url) = &command.endpoint_url {
        aws = aws.with_endpoint_url(endpoint_url);
    }
    tracing::info!(target = %aws.target_display(), "Provisioning tables");

    let store = DynamoDbStore::from_config(&aws).await;
    let (ctx, handle) = Context::with_cancel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.cancel();
        }
    });

    for schema in &schemas {
        let table_name = schema.table_name(&command.schema.prefix);
        match ctx.run(store.create_table(&table_name, schema)).await? {
            Ok(()) => tracing::info!(table = %table_name, "Created table"),
            Err(StoreError::ResourceInUse(_)) => {
                tracing::info!(table = %table_name, "Table already exists, skipping")
            }
            Err(err) => {
                return Err(err).with_context(|| format!("Failed to create table {table_name}"))
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tablekit=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match &cli.command {
        Commands::Plan(command) => plan(command),
        Commands::CreateTables(command) => create_tables(command).await,
    }
}
