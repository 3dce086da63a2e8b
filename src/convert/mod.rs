/// Conversion layer: acquisition stacks → normalized bundles.
///
/// ```text
///  .lsm / .tif stack
///        │
///        ▼
///   ┌──────────┐
///   │  source   │  decode pages → Array4<f32> (Z,C,Y,X) + voxel µm
///   └──────────┘
///        │  per mapped channel
///        ▼
///   ┌──────────┐
///   │ pipeline  │  background subtract → percentile norm → XY stride
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  writer   │  r/g/b.npy + meta.json → .npz archive
///   └──────────┘
/// ```
pub mod discover;
pub mod pipeline;
pub mod source;
pub mod writer;

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::data::model::{BundleError, BundleMeta, ChannelMap, VolumeBundle};

// ---------------------------------------------------------------------------
// Options and orchestration
// ---------------------------------------------------------------------------

/// Knobs for one conversion run. Defaults match the acquisition scripts
/// this tool replaces.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// XY downsample factor (≥ 1).
    pub ds: u32,
    /// Gaussian background sigma in pixels; 0 disables subtraction.
    pub sigma: f64,
    /// Source channel indices for output R, G, B.
    pub map: ChannelMap,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        ConvertOptions {
            ds: 6,
            sigma: 12.0,
            map: ChannelMap::default(),
        }
    }
}

/// What a successful conversion produced, for logging.
#[derive(Debug)]
pub struct ConvertSummary {
    /// Output volume shape (Z, Y, X).
    pub shape: (usize, usize, usize),
    /// Source voxel spacing in µm.
    pub voxel_um: (f64, f64, f64),
}

/// Convert one stack into a bundle on disk.
///
/// Fails before any processing when the source has fewer than three
/// channels or the channel map points outside the source.
pub fn convert_file(input: &Path, output: &Path, opts: &ConvertOptions) -> Result<ConvertSummary> {
    let src = source::read_source(input)?;

    let channels = src.channel_count();
    if channels < 3 {
        return Err(BundleError::TooFewChannels(channels).into());
    }
    opts.map.validate(channels)?;

    let r = pipeline::process_channel(src.channel(opts.map.red()), opts.sigma, opts.ds);
    let g = pipeline::process_channel(src.channel(opts.map.green()), opts.sigma, opts.ds);
    let b = pipeline::process_channel(src.channel(opts.map.blue()), opts.sigma, opts.ds);

    let meta = BundleMeta {
        vx_um: src.vx_um,
        vy_um: src.vy_um,
        vz_um: src.vz_um,
        ds: opts.ds,
        sigma: opts.sigma,
        file: input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        channel_map: opts.map,
    };

    let bundle = VolumeBundle::new(r, g, b, meta)?;
    writer::write_bundle(output, &bundle)?;

    Ok(ConvertSummary {
        shape: bundle.shape(),
        voxel_um: (src.vx_um, src.vy_um, src.vz_um),
    })
}

/// Resolve the bundle path for a single-file conversion: a `.npz` output
/// is taken literally, anything else is treated as a directory receiving
/// `<input stem>.npz`.
pub fn output_bundle_path(input: &Path, output: &Path) -> PathBuf {
    let is_npz = output
        .extension()
        .map(|e| e.eq_ignore_ascii_case("npz"))
        .unwrap_or(false);
    if output.is_dir() || !is_npz {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "bundle".to_string());
        output.join(format!("{stem}.npz"))
    } else {
        output.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn npz_output_is_taken_literally() {
        let out = output_bundle_path(Path::new("in/stack.lsm"), Path::new("out/b.npz"));
        assert_eq!(out, PathBuf::from("out/b.npz"));
    }

    #[test]
    fn directory_output_gets_stem_name() {
        let out = output_bundle_path(Path::new("in/stack.lsm"), Path::new("out"));
        assert_eq!(out, PathBuf::from("out/stack.npz"));
    }
}
