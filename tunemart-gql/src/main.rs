//! tunemart - command-line client for the Tunemart marketplace API
//!
//! Runs GraphQL documents against the configured backend, including
//! multipart uploads, and manages the locally stored session.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use tunemart_common::config::{ClientConfig, ConfigOverrides, LoggingConfig, TomlConfig};
use tunemart_gql::documents::tracks::tracks_query_options;
use tunemart_gql::documents::PageInput;
use tunemart_gql::{
    FileSession, GraphqlClient, GraphqlQuery, QueryCache, SessionContext, UploadFile,
    VariableTree,
};

#[derive(Debug, Parser)]
#[command(name = "tunemart", version, about = "Tunemart marketplace GraphQL client")]
struct Cli {
    /// Backend base URL (overrides TUNEMART_ENDPOINT and config.toml)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Folder holding the stored session
    #[arg(long, global = true)]
    root_folder: Option<PathBuf>,

    /// Config file (default: <config dir>/tunemart/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a GraphQL document read from a file
    Query {
        document: PathBuf,
        /// Variables as a JSON object
        #[arg(long)]
        vars: Option<String>,
    },
    /// Run a GraphQL mutation with file attachments
    Upload {
        document: PathBuf,
        /// Variables as a JSON object
        #[arg(long)]
        vars: Option<String>,
        /// Attach a file at a variable path, e.g. `createRequest.file=./brief.pdf`
        #[arg(long = "attach", value_parser = parse_attachment, required = true)]
        attachments: Vec<(String, PathBuf)>,
    },
    /// List tracks
    Tracks {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        take: u32,
        #[arg(long)]
        search: Option<String>,
    },
    /// Store an access token
    Login {
        #[arg(long, env = "TUNEMART_ACCESS_TOKEN")]
        token: String,
    },
    /// Forget the stored session
    Logout,
}

fn parse_attachment(raw: &str) -> std::result::Result<(String, PathBuf), String> {
    let (path, file) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected PATH=FILE, got '{}'", raw))?;
    if path.is_empty() || file.is_empty() {
        return Err(format!("expected PATH=FILE, got '{}'", raw));
    }
    Ok((path.to_string(), PathBuf::from(file)))
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Cannot open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

fn parse_vars(raw: Option<&str>) -> Result<Option<Value>> {
    raw.map(|text| serde_json::from_str::<Value>(text).context("--vars must be valid JSON"))
        .transpose()
}

async fn read_document(path: &Path) -> Result<GraphqlQuery> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Cannot read GraphQL document {}", path.display()))?;
    Ok(GraphqlQuery::new(text))
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The log level and file live in the config, so the load outcome is
    // reported once the subscriber exists
    let (toml_config, config_source) = TomlConfig::locate_and_load(cli.config.as_deref());
    init_tracing(&toml_config.logging)?;
    info!("Starting tunemart v{}", env!("CARGO_PKG_VERSION"));
    config_source.log();

    let overrides = ConfigOverrides {
        endpoint: cli.endpoint.clone(),
        root_folder: cli.root_folder.clone(),
    };
    let config = ClientConfig::resolve(&overrides, &toml_config)?;
    debug!(endpoint = %config.endpoint_str(), root = %config.root_folder.display(), "Resolved configuration");

    let session = Arc::new(FileSession::open(config.session_file()).await);

    match cli.command {
        Command::Login { token } => {
            session.set_token(&token).await?;
            println!("Session saved to {}", session.path().display());
        }
        Command::Logout => {
            session.clear_session().await?;
            println!("Signed out");
        }
        Command::Query { document, vars } => {
            let query = read_document(&document).await?;
            let variables = parse_vars(vars.as_deref())?;
            let client = GraphqlClient::from_config(&config, session.clone())?;
            let data: Value = client.execute_query(&query, variables.as_ref()).await?;
            print_json(&data)?;
        }
        Command::Upload {
            document,
            vars,
            attachments,
        } => {
            let query = read_document(&document).await?;
            let mut variables: VariableTree<UploadFile> =
                parse_vars(vars.as_deref())?.unwrap_or_else(|| Value::Object(Default::default())).into();
            for (path, file) in &attachments {
                let upload = UploadFile::from_path(file)
                    .await
                    .with_context(|| format!("Cannot read attachment {}", file.display()))?;
                variables.insert_at(path, upload.into())?;
            }

            let client = GraphqlClient::from_config(&config, session.clone())?;
            let data: Value = client.execute_with_file_upload(&query, variables).await?;
            print_json(&data)?;
        }
        Command::Tracks { page, take, search } => {
            let client = GraphqlClient::from_config(&config, session.clone())?;
            let cache = QueryCache::new(client);
            let data = cache
                .fetch(&tracks_query_options(PageInput::page(page, take), search))
                .await?;

            println!("{} tracks (page {})", data.tracks.total_count, page);
            for track in &data.tracks.items {
                println!(
                    "{:<26} {:<40} {:<24} {:>8}",
                    track.id, track.name, track.artist.stage_name, track.stream_count
                );
            }
        }
    }

    Ok(())
}
