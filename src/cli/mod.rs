//! Command-line interface for the multi-frame pipeline.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::core::loaders::{ensure_directory, DatasetPaths, SingleFrameDataset};
use crate::processors::reorganize::{build_multi_frame, reorganize_dataset};
use crate::visualization::{plot_image_with_labels, plot_multi_frame_row, LabeledSample};
use crate::PipelineConfig;

#[derive(Parser)]
#[command(name = "multiframe-pipeline")]
#[command(about = "Single-frame to multi-frame training data reorganization", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pair each sample with its track history and write the multi-frame dataset
    Reorganize {
        /// Directory holding the single-frame attribute files and descriptor
        #[arg(long = "single_frame_dir", default_value = "./training_data")]
        single_frame_dir: PathBuf,
        /// Existing directory to write the multi-frame files into
        #[arg(long = "output_dir", default_value = "./output")]
        output_dir: PathBuf,
    },

    /// Render one single-frame sample with its labels (PNG)
    ShowSample {
        /// Directory holding the single-frame attribute files and descriptor
        #[arg(long = "single_frame_dir", default_value = "./training_data")]
        single_frame_dir: PathBuf,
        /// Sample index
        #[arg(long)]
        index: usize,
        /// Output PNG path (defaults to sample_<index>.png)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Draw face outlines instead of ratio colors
        #[arg(long)]
        no_ratios: bool,
    },

    /// Render every frame of one clustered row with its labels (PNG per frame)
    ShowWindow {
        /// Directory holding the single-frame attribute files and descriptor
        #[arg(long = "single_frame_dir", default_value = "./training_data")]
        single_frame_dir: PathBuf,
        /// Clustered row index
        #[arg(long)]
        row: usize,
        /// Existing directory for the figures
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 39 {
            format!("{}...", value.chars().take(36).collect::<String>())
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

fn load_config(path: Option<&Path>) -> PipelineConfig {
    match path {
        Some(path) => match PipelineConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!("Failed to load config from {}: {}, using defaults", path.display(), e);
                PipelineConfig::default()
            }
        },
        None => PipelineConfig::default(),
    }
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    let config = load_config(cli.config.as_deref());

    let (name, result) = match cli.command {
        Commands::Reorganize { single_frame_dir, output_dir } => (
            "Reorganization",
            cmd_reorganize(&single_frame_dir, &output_dir, &config),
        ),
        Commands::ShowSample { single_frame_dir, index, output, no_ratios } => (
            "Sample rendering",
            cmd_show_sample(&single_frame_dir, index, output, no_ratios, &config),
        ),
        Commands::ShowWindow { single_frame_dir, row, output_dir } => (
            "Window rendering",
            cmd_show_window(&single_frame_dir, row, &output_dir, &config),
        ),
    };

    if let Err(e) = result {
        error!("{} failed: {:#}", name, e);
        std::process::exit(1);
    }
}

fn cmd_reorganize(single_frame_dir: &Path, output_dir: &Path, config: &PipelineConfig) -> Result<()> {
    let start = Instant::now();

    println!("Reorganizing single-frame dataset...");
    println!("Input directory: {}", single_frame_dir.display());
    println!("Output directory: {}", output_dir.display());
    println!("History depth: {}", config.reorganize.history_depth);

    let paths = DatasetPaths::validate(single_frame_dir, output_dir)?;

    let spinner = create_spinner("Pairing and clustering frames...");
    let result = reorganize_dataset(&paths, &config.reorganize);
    spinner.finish_and_clear();
    let summary = result?;

    let written: Vec<String> = summary
        .written
        .iter()
        .filter_map(|p| p.file_name())
        .map(|name| name.to_string_lossy().to_string())
        .collect();

    print_summary(
        "Reorganization Complete",
        &[
            ("Input directory", single_frame_dir.display().to_string()),
            ("Output directory", output_dir.display().to_string()),
            ("Samples", summary.samples.to_string()),
            ("Tracks", summary.tracks.to_string()),
            ("Rows written", summary.rows.to_string()),
            ("Frames per row", (summary.history_depth + 1).to_string()),
            ("Files", written.join(", ")),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );

    Ok(())
}

fn cmd_show_sample(
    single_frame_dir: &Path,
    index: usize,
    output: Option<PathBuf>,
    no_ratios: bool,
    config: &PipelineConfig,
) -> Result<()> {
    let start = Instant::now();

    let output_path = output.unwrap_or_else(|| PathBuf::from(format!("sample_{}.png", index)));

    let spinner = create_spinner("Loading single-frame dataset...");
    let dataset = SingleFrameDataset::load(single_frame_dir);
    spinner.finish_and_clear();
    let dataset = dataset
        .with_context(|| format!("loading dataset from {}", single_frame_dir.display()))?;

    let sample = LabeledSample::from_single_frame(&dataset, index, !no_ratios)
        .with_context(|| format!("extracting sample {}", index))?;

    plot_image_with_labels(&output_path, &sample, &config.visualization)
        .with_context(|| format!("rendering {}", output_path.display()))?;

    print_summary(
        "Sample Rendered",
        &[
            ("Input directory", single_frame_dir.display().to_string()),
            ("Sample", index.to_string()),
            ("Caption", sample.caption()),
            ("Output PNG", output_path.display().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );

    Ok(())
}

fn cmd_show_window(
    single_frame_dir: &Path,
    row: usize,
    output_dir: &Path,
    config: &PipelineConfig,
) -> Result<()> {
    let start = Instant::now();

    ensure_directory(output_dir)?;

    let spinner = create_spinner("Loading and clustering dataset...");
    let multi = SingleFrameDataset::load(single_frame_dir)
        .with_context(|| format!("loading dataset from {}", single_frame_dir.display()))
        .and_then(|dataset| {
            build_multi_frame(&dataset, &config.reorganize).context("building multi-frame rows")
        });
    spinner.finish_and_clear();
    let multi = multi?;

    let window = multi
        .windows()
        .get(row)
        .with_context(|| format!("row {} out of range for {} rows", row, multi.num_rows()))?;
    let sources: Vec<String> = window.newest_first().map(|i| i.to_string()).collect();

    let written = plot_multi_frame_row(output_dir, &multi, row, true, &config.visualization)
        .with_context(|| format!("rendering row {}", row))?;

    print_summary(
        "Window Rendered",
        &[
            ("Input directory", single_frame_dir.display().to_string()),
            ("Row", row.to_string()),
            ("Track id", window.track_id().to_string()),
            ("Source samples", sources.join(", ")),
            ("Figures", written.len().to_string()),
            ("Output directory", output_dir.display().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_reorganize_defaults() {
        let cli = Cli::try_parse_from(["multiframe-pipeline", "reorganize"]).unwrap();

        match cli.command {
            Commands::Reorganize { single_frame_dir, output_dir } => {
                assert_eq!(single_frame_dir, PathBuf::from("./training_data"));
                assert_eq!(output_dir, PathBuf::from("./output"));
            }
            _ => panic!("expected reorganize"),
        }
    }

    #[test]
    fn test_underscore_flags_and_global_options() {
        let cli = Cli::try_parse_from([
            "multiframe-pipeline",
            "reorganize",
            "--single_frame_dir",
            "in",
            "--output_dir",
            "out",
            "-vv",
            "-c",
            "pipeline.yaml",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("pipeline.yaml")));
        assert!(matches!(
            cli.command,
            Commands::Reorganize { ref single_frame_dir, .. } if single_frame_dir == Path::new("in")
        ));
    }

    #[test]
    fn test_show_sample_args() {
        let cli = Cli::try_parse_from([
            "multiframe-pipeline",
            "show-sample",
            "--index",
            "3",
            "--no-ratios",
        ])
        .unwrap();

        match cli.command {
            Commands::ShowSample { index, output, no_ratios, .. } => {
                assert_eq!(index, 3);
                assert!(output.is_none());
                assert!(no_ratios);
            }
            _ => panic!("expected show-sample"),
        }
    }

    #[test]
    fn test_missing_config_falls_back_to_defaults() {
        let config = load_config(Some(Path::new("does/not/exist.yaml")));
        assert_eq!(config.reorganize.history_depth, 1);
    }
}
