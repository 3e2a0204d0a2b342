use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gaze_core::OnnxAnalyzer;
use gaze_gallery::SqliteStore;
use gaze_service::{spawn_engine, Config, FaceService};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "gaze", about = "Gaze face enrollment and recognition CLI")]
struct Cli {
    /// Account the gallery belongs to.
    #[arg(short, long)]
    account: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll a reference face image under a label
    Enroll {
        /// Label for this gallery entry (e.g., "alice_1")
        #[arg(short, long)]
        label: String,
        /// Image file (raw PNG/JPEG or a data-URI/base64 text file)
        image: PathBuf,
    },
    /// Recognize every face in an image against the account's gallery
    Recognize {
        /// Image file to probe with
        image: PathBuf,
    },
    /// List enrolled labels
    List,
    /// Remove an enrolled entry
    Remove {
        /// Label to remove
        #[arg(short, long)]
        label: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    let analyzer = OnnxAnalyzer::load(
        &config.detector_model_path(),
        &config.embedder_model_path(),
        config.pad_factor,
    )
    .context("loading ONNX models")?;

    let store = SqliteStore::open(&config.db_path)
        .with_context(|| format!("opening gallery database {}", config.db_path.display()))?;

    let service = FaceService::new(
        spawn_engine(analyzer),
        Arc::new(store),
        config.recognition_threshold,
        config.deadline,
    );

    match cli.command {
        Commands::Enroll { label, image } => {
            let payload = std::fs::read(&image)
                .with_context(|| format!("reading {}", image.display()))?;
            let outcome = service.enroll(&cli.account, &label, &payload).await?;
            println!("{}", serde_json::json!({
                "worked": outcome.accepted(),
                "outcome": outcome,
            }));
        }
        Commands::Recognize { image } => {
            let payload = std::fs::read(&image)
                .with_context(|| format!("reading {}", image.display()))?;
            let results = service.recognize(&cli.account, &payload).await?;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        Commands::List => {
            let labels = service.list_enrolled(&cli.account).await?;
            println!("{}", serde_json::to_string(&labels)?);
        }
        Commands::Remove { label } => {
            let removed = service.unenroll(&cli.account, &label).await?;
            println!("{}", serde_json::json!({ "worked": removed }));
        }
    }

    Ok(())
}
