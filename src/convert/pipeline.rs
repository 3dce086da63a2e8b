use ndarray::{s, Array2, Array3, ArrayView2, ArrayView3, Axis};

// ---------------------------------------------------------------------------
// Per-channel processing pipeline
// ---------------------------------------------------------------------------
//
// Each selected source channel goes through three steps, slice by slice:
//   1. Gaussian background subtraction (σ in pixels, 0 disables)
//   2. robust percentile normalization to [0, 1]
//   3. XY stride downsampling by an integer factor (Z untouched)

/// Percentile window used for normalization.
const LO_PERCENTILE: f64 = 0.5;
const HI_PERCENTILE: f64 = 99.5;

/// Run the full pipeline on one channel volume (Z, Y, X).
pub fn process_channel(channel: ArrayView3<'_, f32>, sigma: f64, ds: u32) -> Array3<f32> {
    let (nz, ny, nx) = channel.dim();
    let mut cleaned = Array3::<f32>::zeros((nz, ny, nx));
    for (z, plane) in channel.axis_iter(Axis(0)).enumerate() {
        let sub = subtract_background(plane, sigma);
        let norm = normalize_slice(sub.view());
        cleaned.index_axis_mut(Axis(0), z).assign(&norm);
    }
    downsample_xy(&cleaned, ds)
}

// ---------------------------------------------------------------------------
// Background subtraction
// ---------------------------------------------------------------------------

/// Estimate the background as a Gaussian-blurred copy of the slice,
/// subtract it, and floor at zero. `sigma <= 0` disables subtraction.
pub fn subtract_background(img: ArrayView2<'_, f32>, sigma: f64) -> Array2<f32> {
    if sigma <= 0.0 {
        return img.to_owned();
    }
    let bg = gaussian_blur(img, sigma);
    let mut out = img.to_owned();
    out.zip_mut_with(&bg, |v, &b| {
        *v = (*v - b).max(0.0);
    });
    out
}

/// Separable Gaussian blur with reflect boundary handling.
/// Kernel radius is ⌊4σ + 0.5⌋ (4σ truncation).
pub fn gaussian_blur(img: ArrayView2<'_, f32>, sigma: f64) -> Array2<f32> {
    let kernel = gaussian_kernel(sigma);
    let rows = convolve_rows(img, &kernel);
    let cols = convolve_rows(rows.t(), &kernel);
    cols.t().to_owned()
}

fn gaussian_kernel(sigma: f64) -> Vec<f32> {
    let radius = (4.0 * sigma + 0.5).floor().max(0.0) as usize;
    if radius == 0 {
        return vec![1.0];
    }
    let mut weights = Vec::with_capacity(2 * radius + 1);
    let denom = 2.0 * sigma * sigma;
    for k in -(radius as i64)..=(radius as i64) {
        let x = k as f64;
        weights.push((-x * x / denom).exp());
    }
    let sum: f64 = weights.iter().sum();
    weights.iter().map(|w| (w / sum) as f32).collect()
}

/// Convolve every row of `img` with `kernel`, reflecting at the edges
/// (half-sample symmetry: d c b a | a b c d | d c b a).
fn convolve_rows(img: ArrayView2<'_, f32>, kernel: &[f32]) -> Array2<f32> {
    let (ny, nx) = img.dim();
    let radius = (kernel.len() / 2) as i64;
    let mut out = Array2::<f32>::zeros((ny, nx));
    for y in 0..ny {
        let row = img.row(y);
        for x in 0..nx {
            let mut acc = 0.0f32;
            for (ki, &w) in kernel.iter().enumerate() {
                let src = reflect_index(x as i64 + ki as i64 - radius, nx as i64);
                acc += w * row[src];
            }
            out[[y, x]] = acc;
        }
    }
    out
}

fn reflect_index(mut i: i64, n: i64) -> usize {
    debug_assert!(n > 0);
    loop {
        if i < 0 {
            i = -i - 1;
        } else if i >= n {
            i = 2 * n - i - 1;
        } else {
            return i as usize;
        }
    }
}

// ---------------------------------------------------------------------------
// Percentile normalization
// ---------------------------------------------------------------------------

/// Rescale a slice so its 0.5th/99.5th percentiles map to 0/1, clamping
/// outside. A degenerate window (hi == lo) yields an all-zero slice.
pub fn normalize_slice(img: ArrayView2<'_, f32>) -> Array2<f32> {
    let mut sorted: Vec<f32> = img.iter().copied().collect();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let lo = percentile(&sorted, LO_PERCENTILE);
    let hi = percentile(&sorted, HI_PERCENTILE);

    if hi == lo {
        return Array2::zeros(img.dim());
    }
    let scale = 1.0 / (hi - lo);
    img.mapv(|v| ((v - lo) * scale).clamp(0.0, 1.0))
}

/// Linear-interpolation percentile over pre-sorted values (the numpy
/// convention: rank `p/100 · (n − 1)`).
pub fn percentile(sorted: &[f32], p: f64) -> f32 {
    assert!(!sorted.is_empty(), "percentile of empty slice");
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let below = rank.floor() as usize;
    let above = rank.ceil() as usize;
    let frac = (rank - below as f64) as f32;
    sorted[below] + (sorted[above] - sorted[below]) * frac
}

// ---------------------------------------------------------------------------
// XY downsampling
// ---------------------------------------------------------------------------

/// Keep every `ds`-th pixel in Y and X (stride sampling, not averaging),
/// leaving Z untouched. Output dims are `ceil(dim / ds)`.
pub fn downsample_xy(stack: &Array3<f32>, ds: u32) -> Array3<f32> {
    let step = ds.max(1) as isize;
    stack.slice(s![.., ..;step, ..;step]).to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Array3};

    #[test]
    fn downsample_shape_is_ceil() {
        let stack = Array3::<f32>::zeros((4, 10, 11));
        let out = downsample_xy(&stack, 3);
        // ceil(10/3) = 4, ceil(11/3) = 4, Z unchanged
        assert_eq!(out.dim(), (4, 4, 4));

        let out = downsample_xy(&stack, 1);
        assert_eq!(out.dim(), (4, 10, 11));
    }

    #[test]
    fn downsample_takes_strided_samples() {
        let stack = Array3::from_shape_fn((1, 4, 4), |(_, y, x)| (y * 4 + x) as f32);
        let out = downsample_xy(&stack, 2);
        assert_eq!(out.dim(), (1, 2, 2));
        assert_eq!(out[[0, 0, 0]], 0.0);
        assert_eq!(out[[0, 0, 1]], 2.0);
        assert_eq!(out[[0, 1, 0]], 8.0);
        assert_eq!(out[[0, 1, 1]], 10.0);
    }

    #[test]
    fn normalize_constant_slice_is_zero() {
        let img = Array2::<f32>::from_elem((8, 8), 42.0);
        let out = normalize_slice(img.view());
        assert!(out.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn normalize_output_is_in_unit_range() {
        let img = Array2::from_shape_fn((32, 32), |(y, x)| (y * 32 + x) as f32);
        let out = normalize_slice(img.view());
        assert!(out.iter().all(|&v| (0.0..=1.0).contains(&v)));
        // The window is robust, so the bulk spans nearly the full range.
        let max = out.iter().cloned().fold(f32::MIN, f32::max);
        let min = out.iter().cloned().fold(f32::MAX, f32::min);
        assert_eq!(max, 1.0);
        assert_eq!(min, 0.0);
    }

    #[test]
    fn percentile_matches_numpy_convention() {
        let sorted = [1.0f32, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&sorted, 0.0), 1.0);
        assert_eq!(percentile(&sorted, 100.0), 4.0);
        assert_eq!(percentile(&sorted, 50.0), 2.5);
    }

    #[test]
    fn zero_sigma_disables_subtraction() {
        let img = Array2::from_shape_fn((6, 6), |(y, x)| (y + x) as f32);
        let out = subtract_background(img.view(), 0.0);
        assert_eq!(out, img);
    }

    #[test]
    fn blur_preserves_constant_images() {
        let img = Array2::<f32>::from_elem((9, 9), 5.0);
        let out = gaussian_blur(img.view(), 2.0);
        for &v in out.iter() {
            assert!((v - 5.0).abs() < 1e-4);
        }
    }

    #[test]
    fn subtraction_floors_at_zero() {
        // A flat image equals its own background, so everything clamps to 0.
        let img = Array2::<f32>::from_elem((9, 9), 3.0);
        let out = subtract_background(img.view(), 2.0);
        assert!(out.iter().all(|&v| v >= 0.0));
        assert!(out.iter().all(|&v| v < 1e-3));
    }

    #[test]
    fn process_channel_end_to_end_shape() {
        let channel = Array3::from_shape_fn((3, 20, 30), |(z, y, x)| (z + y * x) as f32);
        let out = process_channel(channel.view(), 2.0, 6);
        // ceil(20/6) = 4, ceil(30/6) = 5
        assert_eq!(out.dim(), (3, 4, 5));
        assert!(out.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn reflect_index_mirrors_edges() {
        assert_eq!(reflect_index(-1, 4), 0);
        assert_eq!(reflect_index(-2, 4), 1);
        assert_eq!(reflect_index(4, 4), 3);
        assert_eq!(reflect_index(5, 4), 2);
        assert_eq!(reflect_index(2, 4), 2);
    }
}
