//! `soil-carbon`: command-line host for the soil carbon presentation.
//!
//! Reads attribute grids from a `<CODE>/<BAND>.json` directory, drives a
//! presentation session and writes the displayed layer as a PNG with its
//! legend on stdout.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use soil_core::surface::Frame;
use soil_core::{
    AttributeSource, Extent, Grid, JsonDirSource, LayerRegistry, PresentationController, PresentationStore, SessionConfig,
    SoilAttribute,
};

#[derive(Parser, Debug)]
#[command(name = "soil-carbon", about = "Soil carbon sequestration potential viewer")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the selectable layers in display order.
    Layers {
        /// Session configuration JSON.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Display one layer: print its legend and optionally write it as a PNG.
    Show {
        /// Directory holding `<CODE>/<BAND>.json` grids.
        #[arg(short, long, default_value = "data/soil")]
        data_dir: PathBuf,

        /// Session configuration JSON.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Layer label; the composite score when omitted.
        #[arg(short, long)]
        layer: Option<String>,

        /// PNG file to write the displayed layer to.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the displayed value at LON,LAT. Repeatable.
        #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
        inspect: Vec<(f64, f64)>,
    },

    /// Write a synthetic set of soil grids to try the viewer with.
    Demo {
        /// Output directory.
        #[arg(short, long, default_value = "data/soil")]
        out: PathBuf,

        #[arg(long, default_value_t = 170)]
        width: usize,

        #[arg(long, default_value_t = 220)]
        height: usize,

        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

fn parse_point(text: &str) -> Result<(f64, f64), String> {
    let (lon, lat) = text.split_once(',').ok_or_else(|| format!("expected LON,LAT, got {text:?}"))?;
    let lon = lon.trim().parse::<f64>().map_err(|e| format!("bad longitude {lon:?}: {e}"))?;
    let lat = lat.trim().parse::<f64>().map_err(|e| format!("bad latitude {lat:?}: {e}"))?;
    Ok((lon, lat))
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::Layers { config } => list_layers(config.as_deref()),
        Command::Show { data_dir, config, layer, output, inspect } => {
            show(&data_dir, config.as_deref(), layer.as_deref(), output.as_deref(), &inspect)
        }
        Command::Demo { out, width, height, seed } => write_demo(&out, width, height, seed),
    }
}

fn load_config(path: Option<&Path>) -> Result<SessionConfig> {
    match path {
        Some(p) => SessionConfig::load(p).with_context(|| format!("loading session config {}", p.display())),
        None => Ok(SessionConfig::default()),
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

fn list_layers(config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    let definition = config.score_definition()?;
    let registry = LayerRegistry::standard(&definition.mode().scale())?;

    for layer in registry.all() {
        let kind = match layer.source_spec() {
            Some(spec) => format!("{}/{}", spec.code, spec.band),
            None => "composite".to_string(),
        };
        println!("{:<32} {:<24} {}", layer.label, kind, layer.unit);
    }
    Ok(())
}

fn show(
    data_dir: &Path,
    config: Option<&Path>,
    layer: Option<&str>,
    output: Option<&Path>,
    points: &[(f64, f64)],
) -> Result<()> {
    let config = load_config(config)?;
    let source = JsonDirSource::new(data_dir);
    let store = PresentationStore::new();

    let mut controller = PresentationController::from_config(
        &config,
        Arc::new(source) as Arc<dyn AttributeSource>,
        Box::new(store.clone()),
        Box::new(store.clone()),
    )
    .with_context(|| format!("starting session over {}", data_dir.display()))?;

    if let Some(label) = layer {
        controller.select(label).with_context(|| format!("selecting layer {label:?}"))?;
    }

    let shown = store.snapshot().ok_or_else(|| anyhow!("nothing was displayed"))?;
    println!("{}", shown.legend.to_text());

    for &(lon, lat) in points {
        match controller.inspect(lon, lat) {
            Some(v) => {
                let band = controller
                    .registry()
                    .find_by_label(controller.current_label().unwrap_or_default())
                    .ok()
                    .filter(|cfg| cfg.is_composite())
                    .and_then(|_| controller.score_scale().band_name(f64::from(v)));
                match band {
                    Some(name) => println!("{lon:.4},{lat:.4}: {v:.3} ({name})"),
                    None => println!("{lon:.4},{lat:.4}: {v:.3}"),
                }
            }
            None => println!("{lon:.4},{lat:.4}: no data"),
        }
    }

    if let Some(path) = output {
        write_png(&shown.frame, path)?;
        info!(path = %path.display(), layer = %shown.frame.title, "wrote frame");
    }
    Ok(())
}

fn write_png(frame: &Frame, path: &Path) -> Result<()> {
    let (w, h) = (frame.grid.width, frame.grid.height);
    let img = image::RgbaImage::from_raw(w as u32, h as u32, frame.to_rgba())
        .ok_or_else(|| anyhow!("frame buffer does not match {w}x{h}"))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    img.save(path).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

// ── Demo data ─────────────────────────────────────────────────────────────────

/// Plausible range per attribute: (code, band, low, high).
const DEMO_LAYERS: [(&str, &str, f32, f32); 5] = [
    ("CLY", "CLY_000_005_EV", 5.0, 45.0),
    ("AWC", "AWC_000_005_EV", 3.0, 22.0),
    ("DES", "DES_000_200_EV", 0.2, 1.8),
    ("BDW", "BDW_000_005_EV", 1.0, 1.8),
    ("SOC", "SOC_000_005_EV", 0.2, 4.5),
];

/// Fraction of cells left undefined, standing in for ocean and gaps.
const DEMO_NODATA: f32 = 0.03;

fn write_demo(out: &Path, width: usize, height: usize, seed: u64) -> Result<()> {
    if width == 0 || height == 0 {
        bail!("demo grid must be at least 1x1, got {width}x{height}");
    }
    let extent = Extent::default();
    let mut rng = StdRng::seed_from_u64(seed);
    let mask: Vec<bool> = (0..width * height).map(|_| rng.gen::<f32>() < DEMO_NODATA).collect();
    let source = JsonDirSource::new(out);

    for (i, &(code, band, low, high)) in DEMO_LAYERS.iter().enumerate() {
        // Each attribute varies along its own diagonal with per-cell jitter.
        let phase = i as f32 * 0.7;
        let mut data = Vec::with_capacity(width * height);
        for row in 0..height {
            for col in 0..width {
                if mask[row * width + col] {
                    data.push(f32::NAN);
                    continue;
                }
                let u = col as f32 / width as f32;
                let v = row as f32 / height as f32;
                let t = (0.5 + 0.5 * ((u * 3.0 + v * 2.0 + phase) * std::f32::consts::PI).sin()).clamp(0.0, 1.0);
                let jitter = rng.gen_range(-0.08f32..0.08);
                data.push(low + (high - low) * (t + jitter).clamp(0.0, 1.0));
            }
        }
        let grid = Grid::new(data, width, height, extent)?;
        source.store(code, band, &grid).with_context(|| format!("writing {code}/{band}"))?;
        debug!(code, band, "wrote demo grid");
    }

    info!(dir = %out.display(), width, height, seed, "demo data written");
    println!(
        "wrote {} grids to {} (composite inputs: {})",
        DEMO_LAYERS.len(),
        out.display(),
        SoilAttribute::ALL.map(|a| a.to_string()).join(", ")
    );
    Ok(())
}
