use std::fmt;
use std::str::FromStr;

use ndarray::Array3;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ChannelMap – which source channel feeds each output color
// ---------------------------------------------------------------------------

/// Assignment of source channel indices to the output R, G, B roles.
///
/// Parsed from CLI text like `"2,0,1"` (output Red ← source channel 2,
/// Green ← 0, Blue ← 1). Indices are validated against the channel count
/// of the actual volume before any processing starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelMap(pub [usize; 3]);

impl Default for ChannelMap {
    fn default() -> Self {
        // Matches the long-standing acquisition convention for these stacks.
        ChannelMap([2, 0, 1])
    }
}

impl ChannelMap {
    /// Source index for the output red channel.
    pub fn red(&self) -> usize {
        self.0[0]
    }

    /// Source index for the output green channel.
    pub fn green(&self) -> usize {
        self.0[1]
    }

    /// Source index for the output blue channel.
    pub fn blue(&self) -> usize {
        self.0[2]
    }

    /// Check every mapped index against the source channel count.
    pub fn validate(&self, channel_count: usize) -> Result<(), BundleError> {
        for &idx in &self.0 {
            if idx >= channel_count {
                return Err(BundleError::ChannelMapOutOfRange {
                    index: idx,
                    channels: channel_count,
                });
            }
        }
        Ok(())
    }
}

impl FromStr for ChannelMap {
    type Err = BundleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(BundleError::ChannelMapSyntax(s.to_string()));
        }
        let mut indices = [0usize; 3];
        for (slot, part) in indices.iter_mut().zip(&parts) {
            *slot = part
                .parse::<usize>()
                .map_err(|_| BundleError::ChannelMapSyntax(s.to_string()))?;
        }
        Ok(ChannelMap(indices))
    }
}

impl fmt::Display for ChannelMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.0[0], self.0[1], self.0[2])
    }
}

// ---------------------------------------------------------------------------
// BundleMeta – the meta.json record inside the archive
// ---------------------------------------------------------------------------

/// Geometry and conversion parameters persisted alongside the volumes.
///
/// Voxel sizes are micrometers. The stored `ds` lets the viewer restore
/// the physical aspect ratio: X/Y spacing must be multiplied by `ds`
/// because the converter keeps only every `ds`-th pixel per output voxel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleMeta {
    pub vx_um: f64,
    pub vy_um: f64,
    pub vz_um: f64,
    pub ds: u32,
    pub sigma: f64,
    /// Source file name (not the full path).
    pub file: String,
    pub channel_map: ChannelMap,
}

impl BundleMeta {
    /// Voxel spacing (x, y, z) in µm with the downsample correction applied.
    pub fn corrected_spacing(&self) -> (f64, f64, f64) {
        let ds = self.ds as f64;
        (self.vx_um * ds, self.vy_um * ds, self.vz_um)
    }
}

// ---------------------------------------------------------------------------
// VolumeBundle – three normalized channel volumes + metadata
// ---------------------------------------------------------------------------

/// The complete loaded bundle: three equally shaped Z×Y×X volumes with
/// values in [0, 1], plus the conversion metadata. Immutable once built.
#[derive(Debug, Clone)]
pub struct VolumeBundle {
    pub r: Array3<f32>,
    pub g: Array3<f32>,
    pub b: Array3<f32>,
    pub meta: BundleMeta,
}

impl VolumeBundle {
    /// Build a bundle, verifying the three volumes share one shape.
    pub fn new(
        r: Array3<f32>,
        g: Array3<f32>,
        b: Array3<f32>,
        meta: BundleMeta,
    ) -> Result<Self, BundleError> {
        if r.dim() != g.dim() || r.dim() != b.dim() {
            return Err(BundleError::ShapeMismatch {
                r: r.dim(),
                g: g.dim(),
                b: b.dim(),
            });
        }
        Ok(VolumeBundle { r, g, b, meta })
    }

    /// Shared volume shape as (Z, Y, X).
    pub fn shape(&self) -> (usize, usize, usize) {
        self.r.dim()
    }

    /// The three channel volumes in R, G, B order.
    pub fn channels(&self) -> [&Array3<f32>; 3] {
        [&self.r, &self.g, &self.b]
    }
}

// ---------------------------------------------------------------------------
// BundleError
// ---------------------------------------------------------------------------

/// Everything that can go wrong while parsing, validating, or loading a
/// bundle. Conversion-side failures use `anyhow` at the orchestration
/// layer; these are the structured cases the viewer reports verbatim.
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("channel map must be three comma-separated indices, got '{0}'")]
    ChannelMapSyntax(String),

    #[error("channel map index {index} out of range (source has {channels} channels)")]
    ChannelMapOutOfRange { index: usize, channels: usize },

    #[error("source has {0} channels, need at least 3")]
    TooFewChannels(usize),

    #[error("bundle member '{0}' is missing")]
    MissingMember(&'static str),

    #[error("channel volumes disagree in shape: r={r:?} g={g:?} b={b:?}")]
    ShapeMismatch {
        r: (usize, usize, usize),
        g: (usize, usize, usize),
        b: (usize, usize, usize),
    },

    #[error("reading bundle archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("reading NPY member: {0}")]
    Npy(#[from] ndarray_npy::ReadNpyError),

    #[error("parsing meta.json: {0}")]
    Meta(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn meta() -> BundleMeta {
        BundleMeta {
            vx_um: 0.2,
            vy_um: 0.2,
            vz_um: 1.0,
            ds: 6,
            sigma: 12.0,
            file: "stack.lsm".to_string(),
            channel_map: ChannelMap::default(),
        }
    }

    #[test]
    fn channel_map_parses_and_displays() {
        let map: ChannelMap = "2, 0,1".parse().unwrap();
        assert_eq!(map, ChannelMap([2, 0, 1]));
        assert_eq!(map.to_string(), "2,0,1");
    }

    #[test]
    fn channel_map_rejects_bad_syntax() {
        assert!("1,2".parse::<ChannelMap>().is_err());
        assert!("1,2,3,4".parse::<ChannelMap>().is_err());
        assert!("a,b,c".parse::<ChannelMap>().is_err());
        assert!("-1,0,1".parse::<ChannelMap>().is_err());
    }

    #[test]
    fn channel_map_validates_range() {
        let map = ChannelMap([2, 0, 1]);
        assert!(map.validate(3).is_ok());
        let err = map.validate(2).unwrap_err();
        assert!(matches!(
            err,
            BundleError::ChannelMapOutOfRange {
                index: 2,
                channels: 2
            }
        ));
    }

    #[test]
    fn bundle_rejects_mismatched_shapes() {
        let a = Array3::<f32>::zeros((2, 4, 4));
        let b = Array3::<f32>::zeros((2, 4, 4));
        let c = Array3::<f32>::zeros((2, 4, 5));
        assert!(VolumeBundle::new(a, b, c, meta()).is_err());
    }

    #[test]
    fn corrected_spacing_scales_xy_only() {
        let m = meta();
        let (vx, vy, vz) = m.corrected_spacing();
        assert_eq!(vx, 0.2 * 6.0);
        assert_eq!(vy, 0.2 * 6.0);
        assert_eq!(vz, 1.0);
    }

    #[test]
    fn meta_json_round_trip() {
        let m = meta();
        let text = serde_json::to_string(&m).unwrap();
        let back: BundleMeta = serde_json::from_str(&text).unwrap();
        assert_eq!(m, back);
    }
}
