//! Beltline CLI

use anyhow::{Context, Result};
use bl_core::{Ensemble, TiePolicy};
use bl_inference::limits::{self, UpperLimitConfig};
use bl_inference::{ConfidenceBelt, MaximumLikelihoodEstimator};
use bl_model::{CountingModel, Workspace};
use bl_viz::{BeltCurveArtifact, UpperLimitHistArtifact, svg};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "beltline")]
#[command(about = "Beltline - Toy-based frequentist upper limits with expected bands")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum EnsembleArg {
    /// Fluctuate global observables per toy
    Unconditional,
    /// Hold global observables fixed
    Conditional,
}

impl From<EnsembleArg> for Ensemble {
    fn from(value: EnsembleArg) -> Self {
        match value {
            EnsembleArg::Unconditional => Ensemble::Unconditional,
            EnsembleArg::Conditional => Ensemble::Conditional,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum TiePolicyArg {
    /// Accept a grid point when q <= threshold
    Inclusive,
    /// Accept a grid point only when q < threshold
    Strict,
}

impl From<TiePolicyArg> for TiePolicy {
    fn from(value: TiePolicyArg) -> Self {
        match value {
            TiePolicyArg::Inclusive => TiePolicy::Inclusive,
            TiePolicyArg::Strict => TiePolicy::Strict,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build a confidence belt and persist it as JSON
    Belt {
        /// Input workspace (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file for the belt (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Confidence level
        #[arg(long, default_value = "0.95")]
        confidence_level: f64,

        /// Number of POI scan points over the POI bounds
        #[arg(long, default_value = "20")]
        scan_points: usize,

        /// Multiplier on the default per-point toy count (50 / (1 - CL))
        #[arg(long, default_value = "1.0")]
        toys_factor: f64,

        /// Global-observable treatment in toy generation
        #[arg(long, value_enum, default_value_t = EnsembleArg::Unconditional)]
        ensemble: EnsembleArg,

        /// Base random seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Threads (0 = auto). Use 1 for deterministic parity.
        #[arg(long, default_value = "1")]
        threads: usize,
    },

    /// Compute the observed upper limit, CLb, and expected bands
    Limit {
        /// Input workspace (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Reuse a previously built belt (JSON) instead of rebuilding it
        #[arg(long)]
        belt: Option<PathBuf>,

        /// Output file for the report (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Confidence level
        #[arg(long, default_value = "0.95")]
        confidence_level: f64,

        /// Number of POI scan points over the POI bounds
        #[arg(long, default_value = "20")]
        scan_points: usize,

        /// Multiplier on the default per-point toy count (50 / (1 - CL))
        #[arg(long, default_value = "1.0")]
        toys_factor: f64,

        /// Number of background-only toys for CLb and the expected bands
        #[arg(long, default_value = "200")]
        band_toys: usize,

        /// Global-observable treatment in toy generation
        #[arg(long, value_enum, default_value_t = EnsembleArg::Unconditional)]
        ensemble: EnsembleArg,

        /// Tie policy for interval extraction
        #[arg(long, value_enum, default_value_t = TiePolicyArg::Inclusive)]
        tie_policy: TiePolicyArg,

        /// Base random seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Write belt.svg and upper_limits.svg into this directory
        #[arg(long)]
        svg_dir: Option<PathBuf>,

        /// Bins for the upper-limit histogram artifact
        #[arg(long, default_value = "100")]
        hist_bins: usize,

        /// Threads (0 = auto). Use 1 for deterministic parity.
        #[arg(long, default_value = "1")]
        threads: usize,
    },

    /// Print version information
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_max_level(cli.log_level).with_target(false).init();

    match cli.command {
        Commands::Belt {
            input,
            output,
            confidence_level,
            scan_points,
            toys_factor,
            ensemble,
            seed,
            threads,
        } => cmd_belt(
            &input,
            output.as_ref(),
            confidence_level,
            scan_points,
            toys_factor,
            ensemble.into(),
            seed,
            threads,
        ),
        Commands::Limit {
            input,
            belt,
            output,
            confidence_level,
            scan_points,
            toys_factor,
            band_toys,
            ensemble,
            tie_policy,
            seed,
            svg_dir,
            hist_bins,
            threads,
        } => cmd_limit(
            &input,
            belt.as_ref(),
            output.as_ref(),
            UpperLimitConfig {
                confidence_level,
                n_scan_points: scan_points,
                toys_factor,
                n_band_toys: band_toys,
                ensemble: ensemble.into(),
                tie_policy: tie_policy.into(),
                seed,
            },
            svg_dir.as_ref(),
            hist_bins,
            threads,
        ),
        Commands::Version => {
            println!("beltline {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn setup_threads(threads: usize) {
    if threads > 0 {
        let _ = rayon::ThreadPoolBuilder::new().num_threads(threads).build_global();
    }
}

fn load_model(input: &Path) -> Result<CountingModel> {
    tracing::info!(path = %input.display(), "loading workspace");
    let bytes = std::fs::read(input)
        .with_context(|| format!("failed to read workspace {}", input.display()))?;
    let ws: Workspace = serde_json::from_slice(&bytes)
        .with_context(|| format!("failed to parse workspace {}", input.display()))?;
    let model = CountingModel::from_workspace(&ws)?;
    tracing::info!(parameters = model.n_params(), "workspace loaded");
    Ok(model)
}

fn write_json<T: serde::Serialize>(value: &T, output: Option<&PathBuf>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{}", json),
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_belt(
    input: &Path,
    output: Option<&PathBuf>,
    confidence_level: f64,
    scan_points: usize,
    toys_factor: f64,
    ensemble: Ensemble,
    seed: u64,
    threads: usize,
) -> Result<()> {
    setup_threads(threads);
    let model = load_model(input)?;
    let mle = MaximumLikelihoodEstimator::new();

    let config = UpperLimitConfig {
        confidence_level,
        n_scan_points: scan_points,
        toys_factor,
        ensemble,
        seed,
        ..UpperLimitConfig::default()
    };
    let belt = limits::build_model_belt(&mle, &model, &config)?;
    tracing::info!(points = belt.points.len(), "belt built");

    write_json(&belt, output)
}

fn cmd_limit(
    input: &Path,
    belt_path: Option<&PathBuf>,
    output: Option<&PathBuf>,
    config: UpperLimitConfig,
    svg_dir: Option<&PathBuf>,
    hist_bins: usize,
    threads: usize,
) -> Result<()> {
    setup_threads(threads);
    let model = load_model(input)?;
    let mle = MaximumLikelihoodEstimator::new();

    let report = match belt_path {
        Some(path) => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("failed to read belt {}", path.display()))?;
            let belt: ConfidenceBelt = serde_json::from_slice(&bytes)
                .with_context(|| format!("failed to parse belt {}", path.display()))?;
            limits::upper_limit_with_bands_using_belt(&mle, &model, belt, &config)?
        }
        None => limits::upper_limit_with_bands(&mle, &model, &config)?,
    };
    tracing::info!(
        observed = ?report.observed,
        clb_strict = ?report.clb_strict,
        "limit analysis complete"
    );

    if let Some(dir) = svg_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        let belt_svg = svg::render_belt_curve(&BeltCurveArtifact::from_belt(&report.belt));
        std::fs::write(dir.join("belt.svg"), belt_svg)?;
        let hist_svg = svg::render_upper_limit_hist(&UpperLimitHistArtifact::from_report(
            &report, hist_bins,
        ));
        std::fs::write(dir.join("upper_limits.svg"), hist_svg)?;
    }

    write_json(&report, output)
}
