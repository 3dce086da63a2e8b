//! Batch converter: LSM/TIFF confocal stacks → normalized NPZ bundles.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

use voxelscope::convert::{
    convert_file, discover::discover_files, output_bundle_path, ConvertOptions, ConvertSummary,
};
use voxelscope::data::model::ChannelMap;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Convert LSM (and optionally TIFF) stacks into NPZ bundles (r, g, b + meta.json) for the volume viewer."
)]
struct Args {
    /// Path to a single file OR a folder to process
    input: PathBuf,

    /// Output NPZ path (for a single file) OR output folder (for batch)
    output: PathBuf,

    /// XY downsample factor (recommended 1–16); higher = faster/smaller,
    /// lower = sharper XY at higher memory cost
    #[arg(long, default_value_t = 6, value_parser = clap::value_parser!(u32).range(1..))]
    ds: u32,

    /// Gaussian background sigma in pixels (recommended 0–50); 0 disables
    /// background subtraction
    #[arg(long, default_value_t = 12.0)]
    sigma: f64,

    /// Channel map 'r,g,b' = source indices; e.g. 2,0,1 means
    /// Red←Ch2, Green←Ch0, Blue←Ch1
    #[arg(long, default_value = "2,0,1")]
    map: String,

    /// Recurse into subfolders (only relevant when input is a folder)
    #[arg(long)]
    recursive: bool,

    /// Also include .tif/.tiff files (default processes only .lsm)
    #[arg(long)]
    include_tiff: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let map: ChannelMap = args.map.parse()?;
    let opts = ConvertOptions {
        ds: args.ds,
        sigma: args.sigma,
        map,
    };

    if !args.input.exists() {
        bail!("input path does not exist: {}", args.input.display());
    }

    let files = discover_files(&args.input, args.include_tiff, args.recursive)?;
    if files.is_empty() {
        bail!("no matching files under {}", args.input.display());
    }

    if args.input.is_file() {
        let out = output_bundle_path(&args.input, &args.output);
        let summary = convert_file(&args.input, &out, &opts)
            .with_context(|| format!("converting {}", args.input.display()))?;
        report_ok(&args.input, &out, &summary, &opts);
    } else {
        std::fs::create_dir_all(&args.output)
            .with_context(|| format!("creating {}", args.output.display()))?;

        let mut failed = 0usize;
        for path in &files {
            let out = output_bundle_path(path, &args.output);
            match convert_file(path, &out, &opts) {
                Ok(summary) => report_ok(path, &out, &summary, &opts),
                Err(e) => {
                    failed += 1;
                    log::error!("[ERR] {}: {e:#}", path.display());
                }
            }
        }
        println!(
            "Converted {}/{} file(s) into {}",
            files.len() - failed,
            files.len(),
            args.output.display()
        );
    }

    Ok(())
}

fn report_ok(input: &std::path::Path, output: &std::path::Path, summary: &ConvertSummary, opts: &ConvertOptions) {
    let (z, y, x) = summary.shape;
    let (vx, vy, vz) = summary.voxel_um;
    println!(
        "[OK] {} -> {}  |  Z×Y×X={z}×{y}×{x}  |  voxel µm=({vx:.3},{vy:.3},{vz:.3})  |  map={}",
        input.display(),
        output.display(),
        opts.map
    );
}
