use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use drive_open_config::Settings;
use drive_open_services::sdk::native::native_bundle;
use drive_open_services::session::FileStorage;
use drive_open_services::wait::{BoundedWait, WaitOutcome};
use drive_open_services::{DeepLinkOutcome, DriveSession};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "drive-open", version, about = "Open Google Drive files through a persisted session")]
struct Cli {
    /// Directory holding the persisted token (defaults to the platform data dir).
    #[arg(long, global = true)]
    storage_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Report whether the persisted session is still valid.
    Status,
    /// Handle a Drive "open with" URL.
    Open {
        url: String,
        /// Save the opened file's content here.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print a file's metadata.
    Info { file_id: String },
    /// Download a file's content.
    Fetch {
        file_id: String,
        #[arg(long)]
        out: PathBuf,
    },
    /// Print a file's web content link.
    Link { file_id: String },
    /// List CAD files.
    List {
        #[arg(long)]
        page_token: Option<String>,
    },
    /// Revoke and forget the persisted token.
    SignOut,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file (silently ignore if missing)
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "drive_open_services=debug,drive_open_cli=info".into()
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let settings = Settings::load()?;

    let storage_dir = resolve_storage_dir(cli.storage_dir, &settings)?;
    info!(dir = %storage_dir.display(), "Using token storage");

    let http = reqwest::Client::new();
    let session = DriveSession::new(
        settings.clone(),
        native_bundle(&settings, http.clone()),
        Arc::new(FileStorage::new(storage_dir)),
        http,
    );

    match cli.command {
        Command::Status => {
            let restored = session.auth.restore_auth().await;
            println!(
                "{}",
                if restored { "authenticated" } else { "signed out" }
            );
        }
        Command::Open { url, out } => {
            let report = session.mount(&url).await;
            let Some(handle) = report.deep_link else {
                bail!("URL carries no action/fileId/fileName/mimeType parameters");
            };
            match handle.await? {
                DeepLinkOutcome::Opened { file, source } => {
                    info!(?source, "Resolved file");
                    println!("{}", serde_json::to_string_pretty(&file)?);
                    if let Some(out) = out {
                        let bytes = session.files.get_file_content(&file.id).await?;
                        tokio::fs::write(&out, &bytes)
                            .await
                            .with_context(|| format!("Failed to write {}", out.display()))?;
                        info!(bytes = bytes.len(), path = %out.display(), "Saved file");
                    }
                }
                DeepLinkOutcome::Ignored => warn!("Action is not an open request"),
            }
        }
        Command::Info { file_id } => {
            ensure_session(&session).await?;
            let file = session.files.get_file_details(&file_id).await?;
            println!("{}", serde_json::to_string_pretty(&file)?);
        }
        Command::Fetch { file_id, out } => {
            ensure_session(&session).await?;
            let bytes = session.files.get_file_content(&file_id).await?;
            tokio::fs::write(&out, &bytes)
                .await
                .with_context(|| format!("Failed to write {}", out.display()))?;
            info!(bytes = bytes.len(), path = %out.display(), "Saved file");
        }
        Command::Link { file_id } => {
            ensure_session(&session).await?;
            println!("{}", session.files.get_file_download_url(&file_id).await?);
        }
        Command::List { page_token } => {
            ensure_session(&session).await?;
            let page = session.files.list_files(page_token.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&page)?);
        }
        Command::SignOut => {
            session.auth.restore_auth().await;
            session.auth.sign_out().await;
        }
    }

    Ok(())
}

/// Restores the persisted session, or authorizes a fresh one.
async fn ensure_session(session: &DriveSession) -> anyhow::Result<()> {
    if session.auth.restore_auth().await {
        return Ok(());
    }

    session.auth.authenticate().await;
    let wait = BoundedWait::from_settings(&session.settings.deep_link);
    if let WaitOutcome::TimedOut { attempts } = session.auth.wait_for_token(wait).await {
        warn!(attempts, "No access token after polling");
    }
    if !session.state.is_authenticated() {
        bail!(
            "Not authenticated. Set DRIVE_OPEN__GOOGLE__CLIENT_ID, DRIVE_OPEN__GOOGLE__API_KEY \
             and DRIVE_OPEN__IDENTITY__ACCESS_TOKEN."
        );
    }
    Ok(())
}

fn resolve_storage_dir(flag: Option<PathBuf>, settings: &Settings) -> anyhow::Result<PathBuf> {
    if let Some(dir) = flag.or_else(|| settings.storage.dir.as_ref().map(PathBuf::from)) {
        return Ok(dir);
    }
    ProjectDirs::from("com", "drive-open", "drive-open")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .context("Could not determine a data directory; pass --storage-dir")
}
