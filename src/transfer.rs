use eframe::egui::{Color32, ColorImage};
use ndarray::{Array2, Array3, Axis};

use crate::data::model::{BundleMeta, VolumeBundle};

// ---------------------------------------------------------------------------
// Tone mapping
// ---------------------------------------------------------------------------

/// Global contrast/gamma transform applied uniformly to all channels
/// before compositing: `v' = clip((v − lo)/(hi − lo), 0, 1)^gamma`.
/// Identity at (lo=0, hi=1, gamma=1).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneParams {
    pub lo: f32,
    pub hi: f32,
    pub gamma: f32,
}

impl Default for ToneParams {
    fn default() -> Self {
        ToneParams {
            lo: 0.0,
            hi: 1.0,
            gamma: 1.0,
        }
    }
}

impl ToneParams {
    pub fn apply(&self, v: f32) -> f32 {
        let window = self.hi - self.lo;
        if window <= 0.0 {
            // Degenerate window: hard threshold at lo.
            return if v >= self.lo { 1.0 } else { 0.0 };
        }
        let t = ((v - self.lo) / window).clamp(0.0, 1.0);
        t.powf(self.gamma)
    }
}

// ---------------------------------------------------------------------------
// Per-channel settings
// ---------------------------------------------------------------------------

/// User-adjustable rendering controls for one output channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelSettings {
    pub visible: bool,
    pub tint: Color32,
    /// Tone-mapped values below this are dropped entirely.
    pub threshold: f32,
    pub opacity: f32,
}

impl ChannelSettings {
    /// Defaults for output channel `idx` (0 = R, 1 = G, 2 = B).
    pub fn for_channel(idx: usize) -> Self {
        let tint = match idx {
            0 => Color32::from_rgb(255, 64, 64),
            1 => Color32::from_rgb(64, 255, 64),
            _ => Color32::from_rgb(80, 128, 255),
        };
        ChannelSettings {
            visible: true,
            tint,
            threshold: 0.0,
            opacity: 1.0,
        }
    }
}

// ---------------------------------------------------------------------------
// View selection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    /// A single plane at the current slice index.
    Slice,
    /// Maximum-intensity projection along the view axis.
    Projection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewAxis {
    Z,
    Y,
    X,
}

impl ViewAxis {
    pub fn label(&self) -> &'static str {
        match self {
            ViewAxis::Z => "Z",
            ViewAxis::Y => "Y",
            ViewAxis::X => "X",
        }
    }

    fn index(&self) -> usize {
        match self {
            ViewAxis::Z => 0,
            ViewAxis::Y => 1,
            ViewAxis::X => 2,
        }
    }

    /// Extent of the volume along this axis.
    pub fn len(&self, shape: (usize, usize, usize)) -> usize {
        [shape.0, shape.1, shape.2][self.index()]
    }
}

/// Extract the 2-D plane a channel contributes to the current view,
/// rows = image rows, columns = image columns.
fn channel_plane(volume: &Array3<f32>, axis: ViewAxis, mode: ViewMode, index: usize) -> Array2<f32> {
    let ax = Axis(axis.index());
    match mode {
        ViewMode::Slice => {
            let clamped = index.min(volume.len_of(ax).saturating_sub(1));
            volume.index_axis(ax, clamped).to_owned()
        }
        ViewMode::Projection => volume.fold_axis(ax, f32::NEG_INFINITY, |&acc, &v| acc.max(v)),
    }
}

// ---------------------------------------------------------------------------
// Compositing
// ---------------------------------------------------------------------------

/// Composite the bundle into an RGBA image for the current view.
///
/// Channels are tone-mapped, thresholded, scaled by opacity, multiplied
/// into their tint, and summed additively with clamping.
pub fn render_view(
    bundle: &VolumeBundle,
    axis: ViewAxis,
    mode: ViewMode,
    slice_index: usize,
    channels: &[ChannelSettings; 3],
    tone: &ToneParams,
) -> ColorImage {
    let planes: Vec<Option<Array2<f32>>> = bundle
        .channels()
        .iter()
        .zip(channels.iter())
        .map(|(&volume, settings)| {
            settings
                .visible
                .then(|| channel_plane(volume, axis, mode, slice_index))
        })
        .collect();

    let (height, width) = planes
        .iter()
        .flatten()
        .next()
        .map(|p| p.dim())
        .unwrap_or_else(|| {
            // All channels hidden: keep the view's natural dimensions.
            channel_plane(&bundle.r, axis, mode, slice_index).dim()
        });

    let mut pixels = vec![Color32::BLACK; width * height];
    for (plane, settings) in planes.iter().zip(channels.iter()) {
        let Some(plane) = plane else { continue };
        for ((y, x), &v) in plane.indexed_iter() {
            let mapped = tone.apply(v);
            if mapped < settings.threshold {
                continue;
            }
            let weight = mapped * settings.opacity;
            let px = &mut pixels[y * width + x];
            let add = |base: u8, tint: u8| -> u8 {
                let sum = base as f32 + tint as f32 * weight;
                sum.min(255.0) as u8
            };
            *px = Color32::from_rgb(
                add(px.r(), settings.tint.r()),
                add(px.g(), settings.tint.g()),
                add(px.b(), settings.tint.b()),
            );
        }
    }

    ColorImage {
        size: [width, height],
        pixels,
    }
}

/// Physical extent (width µm, height µm) of the displayed plane, with
/// the stored downsample factor folded into X/Y spacing so the aspect
/// ratio matches the specimen regardless of resolution reduction.
pub fn plane_size_um(shape: (usize, usize, usize), meta: &BundleMeta, axis: ViewAxis) -> (f64, f64) {
    let (nz, ny, nx) = shape;
    let (vx, vy, vz) = meta.corrected_spacing();
    match axis {
        ViewAxis::Z => (nx as f64 * vx, ny as f64 * vy),
        ViewAxis::Y => (nx as f64 * vx, nz as f64 * vz),
        ViewAxis::X => (ny as f64 * vy, nz as f64 * vz),
    }
}

// ---------------------------------------------------------------------------
// Histograms
// ---------------------------------------------------------------------------

/// Fixed-bin histogram of a channel volume over [0, 1].
pub fn histogram(volume: &Array3<f32>, bins: usize) -> Vec<u32> {
    let mut counts = vec![0u32; bins.max(1)];
    let n = counts.len();
    for &v in volume.iter() {
        let bin = ((v.clamp(0.0, 1.0) * n as f32) as usize).min(n - 1);
        counts[bin] += 1;
    }
    counts
}
