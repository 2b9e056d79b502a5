//! sbnsyst CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sbn_core::{Slice, Systematic};
use sbn_osc::SensitivityConfig;
use sbn_syst::{ManifestFile, SystCatalog, UniverseRegistry, UniverseWeight, WeightSyst};
use std::path::PathBuf;
use std::sync::Arc;

mod input;

#[derive(Parser)]
#[command(name = "sbnsyst")]
#[command(about = "SBN systematic-universe reweighting and oscillation sensitivity")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the supported weight systematics
    Systs {
        /// Universe manifest (JSON)
        #[arg(short, long)]
        universes: PathBuf,

        /// Output file (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Weight event records in one systematic universe
    Weight {
        /// Universe manifest (JSON)
        #[arg(short, long)]
        universes: PathBuf,

        /// Event records (JSON array of slices)
        #[arg(short, long)]
        events: PathBuf,

        /// Comma-separated systematic names
        #[arg(long, value_delimiter = ',', required = true)]
        systs: Vec<String>,

        /// Universe index
        #[arg(long, default_value = "0")]
        universe: usize,

        /// Also report per-systematic weights for a continuous shift (sigma)
        #[arg(long)]
        sigma: Option<f64>,

        /// Output file (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Chi-square oscillation sensitivity
    Sensitivity {
        /// Sensitivity configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Selected events, covariance and optional data (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file; overrides `output_file` from the configuration.
        /// Defaults to stdout if neither is set.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Threads (0 = auto)
        #[arg(long, default_value = "0")]
        threads: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Systs { universes, output } => cmd_systs(&universes, output.as_ref()),
        Commands::Weight { universes, events, systs, universe, sigma, output } => {
            cmd_weight(&universes, &events, systs, universe, sigma, output.as_ref())
        }
        Commands::Sensitivity { config, input, output, threads } => {
            cmd_sensitivity(&config, &input, output, threads)
        }
    }
}

fn load_registry(path: &PathBuf) -> Result<Arc<UniverseRegistry>> {
    tracing::info!(path = %path.display(), "loading universe manifest");
    let reg = sbn_syst::registry::install_global(&ManifestFile::new(path))
        .with_context(|| format!("loading universes from {}", path.display()))?;
    tracing::info!(knobs = reg.len(), "universe registry ready");
    Ok(reg)
}

fn cmd_systs(universes: &PathBuf, output: Option<&PathBuf>) -> Result<()> {
    let reg = load_registry(universes)?;
    let catalog = SystCatalog::new(reg.clone());

    let systs: Vec<serde_json::Value> = catalog
        .weight_systs()
        .iter()
        .map(|s| {
            serde_json::json!({
                "name": s.short_name(),
                "latex": s.latex_name(),
                "knob": s.knob_name(),
                "n_universes": reg.n_universes(s.knob_name()).ok(),
            })
        })
        .collect();

    let output_json = serde_json::json!({
        "n_knobs": reg.len(),
        "n_genie": catalog.genie_systs().len(),
        "n_flux": catalog.flux_systs().len(),
        "systs": systs,
    });
    write_json(output, output_json)
}

fn cmd_weight(
    universes: &PathBuf,
    events: &PathBuf,
    systs: Vec<String>,
    universe: usize,
    sigma: Option<f64>,
    output: Option<&PathBuf>,
) -> Result<()> {
    let reg = load_registry(universes)?;
    let json = std::fs::read_to_string(events)
        .with_context(|| format!("reading {}", events.display()))?;
    let slices: Vec<Slice> = serde_json::from_str(&json)?;

    let combined = UniverseWeight::new(systs.iter().cloned(), universe, reg.clone())?;
    let weights =
        slices.iter().map(|sr| combined.weight(sr)).collect::<sbn_core::Result<Vec<_>>>()?;

    let mut output_json = serde_json::json!({
        "systs": systs,
        "universe": universe,
        "weights": weights,
    });

    if let Some(sigma) = sigma {
        let catalog = SystCatalog::new(reg.clone());
        let mut shifted = serde_json::Map::new();
        for name in &systs {
            let syst = match catalog.find(name) {
                Some(s) => Arc::clone(s),
                None => Arc::new(WeightSyst::new(name.clone(), reg.clone())),
            };
            let ws = slices
                .iter()
                .map(|sr| {
                    let mut w = 1.0;
                    syst.shift(sigma, sr, &mut w).map(|_| w)
                })
                .collect::<sbn_core::Result<Vec<_>>>()?;
            shifted.insert(name.clone(), serde_json::json!(ws));
        }
        output_json["sigma"] = serde_json::json!(sigma);
        output_json["shifted"] = serde_json::Value::Object(shifted);
    }

    tracing::info!(events = slices.len(), "weighted events");
    write_json(output, output_json)
}

fn cmd_sensitivity(
    config: &PathBuf,
    input: &PathBuf,
    output: Option<PathBuf>,
    threads: usize,
) -> Result<()> {
    if threads > 0 {
        // Best-effort; if a global pool already exists, keep going.
        let _ = rayon::ThreadPoolBuilder::new().num_threads(threads).build_global();
    }

    let mut cfg = SensitivityConfig::from_json_file(config)
        .with_context(|| format!("loading {}", config.display()))?;
    if output.is_some() {
        cfg.output_file = output;
    }
    let to_stdout = cfg.output_file.is_none();

    let mut sens = input::SensitivityInput::from_json_file(input)?.into_sensitivity(cfg)?;
    let out = sens.finalize()?;
    for c in &out.contours {
        tracing::info!(label = %c.label, chi2 = c.chi2, points = c.len(), "contour");
    }

    if to_stdout {
        write_json(None, serde_json::to_value(out)?)?;
    }
    Ok(())
}

fn write_json(output: Option<&PathBuf>, value: serde_json::Value) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&value)?)?;
    } else {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}
