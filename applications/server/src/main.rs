/// Mastering Server - two-pass loudness mastering over HTTP
use anyhow::Context;
use clap::{Parser, Subcommand};
use mastering_core::{JobStatus, SpecOverrides, PRESETS};
use mastering_server::{
    api::{self, mastering::JobResult},
    config::ServerConfig,
    jobs::{JobInput, MasteringRequest},
    services::FfmpegExecutor,
    state::AppState,
};
use std::{net::SocketAddr, path::PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "mastering-server")]
#[command(about = "Two-pass audio mastering server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Configuration file path
        #[arg(short, long, env = "MASTERING_CONFIG")]
        config: Option<PathBuf>,
    },
    /// List the built-in presets
    Presets,
    /// Master a single file and print the result as JSON
    Master {
        /// Input audio file
        input: PathBuf,
        /// Preset name
        #[arg(short, long)]
        preset: Option<String>,
        /// Setting overrides as a JSON object
        #[arg(short, long)]
        settings: Option<String>,
        /// Where to copy the finished master
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Configuration file path
        #[arg(short, long, env = "MASTERING_CONFIG")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mastering_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config } => {
            serve(config).await?;
        }
        Commands::Presets => {
            print_presets();
        }
        Commands::Master {
            input,
            preset,
            settings,
            output,
            config,
        } => {
            master_file(input, preset, settings, output, config).await?;
        }
    }

    Ok(())
}

async fn serve(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    // Load configuration
    let config = ServerConfig::load(config_path.as_deref())?;
    config.validate()?;

    tracing::info!("Starting Mastering Server");
    tracing::info!("Host: {}", config.server.host);
    tracing::info!("Port: {}", config.server.port);

    let addr = SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));

    let executor = FfmpegExecutor::new(config.engine.ffmpeg_path.clone(), config.engine.timeout());
    match executor.version().await {
        Ok(version) => tracing::info!("DSP engine: {}", version),
        Err(e) => tracing::warn!("DSP engine not available, jobs will fail: {}", e),
    }

    let app_state = AppState::from_config(config).await?;

    let app = api::router(app_state);

    tracing::info!("Server listening on {}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn print_presets() {
    println!(
        "{:<10} {:>8} {:>9} {:>6} {:>7}  DESCRIPTION",
        "NAME", "LUFS", "TRUE PK", "LRA", "WIDTH"
    );
    for preset in PRESETS {
        println!(
            "{:<10} {:>8.1} {:>9.1} {:>6.1} {:>6.0}%  {}",
            preset.name,
            preset.loudness_target_lufs,
            preset.true_peak_ceiling_db,
            preset.loudness_range_lu,
            preset.stereo_width_percent,
            preset.description
        );
    }
}

async fn master_file(
    input: PathBuf,
    preset: Option<String>,
    settings: Option<String>,
    output: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut config = ServerConfig::load(config_path.as_deref())?;
    // One-off runs keep the master on this machine
    config.storage.remote = None;
    config.engine.workers = 1;
    config.validate()?;

    let overrides = SpecOverrides::from_json(settings.as_deref().unwrap_or_default())?;
    let app_state = AppState::from_config(config).await?;

    let job = app_state
        .queue
        .submit_and_wait(MasteringRequest {
            input: JobInput::LocalFile(input),
            preset,
            overrides,
            project_name: None,
            track_name: None,
        })
        .await?;

    let failed = job.status == JobStatus::Failed;
    let artifact = job.output_artifact_ref.clone();
    println!("{}", serde_json::to_string_pretty(&JobResult::from(job))?);

    if failed {
        anyhow::bail!("Mastering failed");
    }

    if let (Some(destination), Some(artifact)) = (output, artifact) {
        let filename = artifact.rsplit('/').next().unwrap_or_default();
        let source = app_state.file_storage.get_output_path(filename)?;
        tokio::fs::copy(&source, &destination)
            .await
            .with_context(|| format!("Failed to copy master to {}", destination.display()))?;
        tracing::info!("Master written to {}", destination.display());
    }

    Ok(())
}
