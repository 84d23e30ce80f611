use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use shorts_compositor::{
    blueprint::{AssetMap, Blueprint},
    composition::{Assembler, AssemblyRequest},
    config::Config,
};

#[derive(Parser)]
#[command(
    name = "shorts-compositor",
    version,
    about = "Assemble vertical short videos synchronized to a voice track",
    long_about = "Shorts-Compositor builds a 9:16 video from a scene blueprint, per-scene media, a narration track and mood music. Missing or broken scene media is replaced by placeholders; only a missing voice track is fatal."
)]
struct Cli {
    /// Scene blueprint (JSON)
    #[arg(short, long, required_unless_present = "print_config")]
    blueprint: Option<PathBuf>,

    /// Scene id to media file map (JSON object)
    #[arg(short, long, required_unless_present = "print_config")]
    assets: Option<PathBuf>,

    /// Voice track that sets the video length (WAV, MP3, FLAC, OGG, M4A)
    #[arg(long, required_unless_present = "print_config")]
    voice: Option<PathBuf>,

    /// Music mood (chill, upbeat, dramatic, phonk, corporate); overrides the blueprint
    #[arg(short, long)]
    mood: Option<String>,

    /// Watermark text drawn when no logo is given
    #[arg(short, long)]
    watermark: Option<String>,

    /// Logo image pinned to a top corner
    #[arg(short, long)]
    logo: Option<PathBuf>,

    /// Configuration file (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    // Load configuration
    let config = match &cli.config {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Config::from_file(config_path)?
        }
        None => {
            info!("Using default configuration");
            Config::default()
        }
    };

    if cli.print_config {
        println!("{}", config.to_toml()?);
        return Ok(());
    }

    info!("Starting Shorts-Compositor v{}", env!("CARGO_PKG_VERSION"));

    let blueprint_path = cli.blueprint.context("--blueprint is required")?;
    let assets_path = cli.assets.context("--assets is required")?;
    let voice_path = cli.voice.context("--voice is required")?;

    let blueprint = Blueprint::from_file(&blueprint_path)
        .with_context(|| format!("Failed to load blueprint {:?}", blueprint_path))?;
    let assets = AssetMap::from_file(&assets_path)
        .with_context(|| format!("Failed to load asset map {:?}", assets_path))?;

    info!(
        "Blueprint: {} scenes, {} with media",
        blueprint.scene_count(),
        assets.len()
    );

    let mut request = AssemblyRequest::new(blueprint, assets, voice_path);
    request.music_mood = cli.mood;
    request.watermark_text = cli.watermark;
    request.logo_path = cli.logo;

    let assembler = Assembler::new(config);
    let report = match assembler.assemble(request).await {
        Ok(report) => report,
        Err(failure) => {
            eprintln!("❌ {}", failure.user_message());
            return Err(failure.into());
        }
    };

    println!("{}", report.output_path.display());
    for degradation in &report.degradations {
        eprintln!("⚠️  {}", degradation);
    }

    Ok(())
}
