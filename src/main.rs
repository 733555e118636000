//! AEF Tile Distribution CLI
//!
//! Distribute AlphaEarth embedding tiles into a global 5°×5° grid of folders.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use aef_distribute::{extract, init_rayon, io, pipeline, run_pipeline, vis, Config, FootprintIndex, WorldGrid};

#[derive(Parser)]
#[command(name = "aef-distribute")]
#[command(about = "Distribute AEF tiles into a 5x5 degree grid of folders", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml", global = true)]
    config: PathBuf,

    /// Override worker thread count
    #[arg(long, global = true)]
    workers: Option<usize>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the distribution pipeline (default if no command specified)
    Run,

    /// Analyze the work without moving anything
    Analyze,

    /// Validate configuration
    Validate,

    /// Generate a sample configuration file
    GenerateConfig {
        /// Output path for configuration file
        #[arg(short, long, default_value = "config.yaml")]
        output: PathBuf,
    },

    /// Extract downloaded archives into the extraction tree
    Extract {
        /// Destination sub-namespace under the extraction root
        #[arg(long)]
        name: String,

        /// Directory of downloaded archives (default: <base>/zips)
        #[arg(long)]
        source: Option<PathBuf>,
    },

    /// Render coverage images for one extracted export directory
    Visualize {
        /// Extracted directory name under the extraction root
        #[arg(long)]
        dir: String,

        /// Output directory (default: <base>/merged_files_vis/<dir>)
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        None | Some(Commands::Run) => {
            run_command(cli.config, cli.workers)?;
        }

        Some(Commands::Analyze) => {
            analyze_command(cli.config)?;
        }

        Some(Commands::Validate) => {
            validate_command(cli.config)?;
        }

        Some(Commands::GenerateConfig { output }) => {
            generate_config_command(output)?;
        }

        Some(Commands::Extract { name, source }) => {
            extract_command(cli.config, name, source)?;
        }

        Some(Commands::Visualize { dir, output }) => {
            visualize_command(cli.config, dir, output)?;
        }
    }

    Ok(())
}

fn run_command(config_path: PathBuf, workers: Option<usize>) -> Result<()> {
    let mut config = Config::from_file(&config_path)?;

    // Apply overrides
    if let Some(w) = workers {
        config.processing.workers = Some(w);
    }

    config.validate()?;
    init_rayon(config.processing.workers)?;

    run_pipeline(&config)?;
    Ok(())
}

fn analyze_command(config_path: PathBuf) -> Result<()> {
    let config = Config::from_file(&config_path)?;
    config.validate()?;

    let (footprints, load_stats) = FootprintIndex::load(&config.paths.extracted())?;
    let grid = WorldGrid::build();
    let listings = io::scan_tiles(&config.paths.tiles())?;
    let table = pipeline::merge::merge(&grid, &footprints, &listings);
    let pending = pipeline::relocate::plan_moves(&table);

    println!("\n=== Work Analysis ===");
    println!("{}", load_stats);
    println!("Grid cells: {}", grid.len());
    println!("{}", listings.stats);
    println!("{}", table.stats);
    println!("Pending moves: {}", pending.len());
    println!("=====================\n");

    Ok(())
}

fn validate_command(config_path: PathBuf) -> Result<()> {
    let config = Config::from_file(&config_path)?;
    config.validate()?;
    println!("Configuration is valid");
    Ok(())
}

fn extract_command(config_path: PathBuf, name: String, source: Option<PathBuf>) -> Result<()> {
    let config = Config::from_file(&config_path)?;
    config.validate()?;

    let source = source.unwrap_or_else(|| config.paths.zips());
    let destination = config.paths.extracted().join(&name);

    tracing::info!(
        "Extracting archives from {} into {}",
        source.display(),
        destination.display()
    );
    let stats = extract::extract_archives(&source, &destination)?;
    tracing::info!("{}", stats);
    Ok(())
}

fn visualize_command(config_path: PathBuf, dir: String, output: Option<PathBuf>) -> Result<()> {
    let config = Config::from_file(&config_path)?;
    config.validate()?;

    let tiles_dir = config.paths.extracted().join(&dir);
    let out_dir = output.unwrap_or_else(|| config.paths.vis().join(&dir));

    let stats = vis::visualize_dir(&tiles_dir, &out_dir)?;
    tracing::info!("{}", stats);
    println!("Visualization complete. All files saved to {}", out_dir.display());
    Ok(())
}

fn generate_config_command(output: PathBuf) -> Result<()> {
    // Generate a commented YAML config
    let yaml = r#"# AEF Tile Distribution Configuration

# === PATHS: Directory layout ===
paths:
  # Root directory of the embedding data share.
  # Everything below defaults to a conventional subdirectory of it.
  base: "/nas/alphaearth"

  # Extracted archives (each with a metadata/ subdirectory of CSVs)
  # extracted: "/nas/alphaearth/GEE_extracted"

  # Tile staging root; organized tiles live at <tiles>/<year>/<grid_folder>/
  # tiles: "/nas/alphaearth/AEF_tiles"

  # Persisted artifacts (the merged coverage snapshot lives here)
  # metadata: "/nas/alphaearth/metadata"

  # Downloaded archives consumed by `extract`
  # zips: "/nas/alphaearth/zips"

  # Coverage images written by `visualize`
  # vis: "/nas/alphaearth/merged_files_vis"

# === PROCESSING: Performance tuning ===
processing:
  # Worker threads for the I/O pool (omit for number of CPUs)
  workers: 16
"#;

    std::fs::write(&output, yaml)?;
    println!("Generated sample configuration at: {}", output.display());

    Ok(())
}
