use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{bail, Context, Result};
use ndarray::{Array3, Array4, Axis};
use tiff::decoder::ifd::Value;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;

// ---------------------------------------------------------------------------
// Source volume
// ---------------------------------------------------------------------------

/// A decoded acquisition stack, axes (Z, C, Y, X), plus physical voxel
/// spacing in micrometers.
pub struct SourceVolume {
    pub data: Array4<f32>,
    pub vx_um: f64,
    pub vy_um: f64,
    pub vz_um: f64,
}

impl SourceVolume {
    pub fn channel_count(&self) -> usize {
        self.data.dim().1
    }

    /// View of one channel as (Z, Y, X).
    pub fn channel(&self, c: usize) -> ndarray::ArrayView3<'_, f32> {
        self.data.index_axis(Axis(1), c)
    }
}

/// Private Zeiss tag holding the CZ_LSMINFO struct.
const TAG_CZ_LSMINFO: u16 = 34412;

/// Byte offsets of VoxelSizeX/Y/Z (f64 LE, meters) inside CZ_LSMINFO.
const VOXEL_SIZE_OFFSETS: [usize; 3] = [40, 48, 56];

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Decode an LSM or multi-page TIFF stack into a [`SourceVolume`].
///
/// Every full-resolution page becomes one Z plane; reduced-resolution
/// pages (LSM embeds a thumbnail IFD after each plane) are skipped, as is
/// anything whose dimensions differ from the first page. Channels come
/// from the samples-per-pixel of each page, in either chunky or planar
/// layout.
pub fn read_source(path: &Path) -> Result<SourceVolume> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut decoder = Decoder::new(BufReader::new(file))
        .with_context(|| format!("decoding {}", path.display()))?
        .with_limits(Limits::unlimited());

    let (width, height) = decoder.dimensions().context("reading page dimensions")?;

    // Voxel geometry lives in the first IFD; missing metadata falls back
    // to 1 µm so plain TIFF stacks stay loadable.
    let (vx_um, vy_um, vz_um) = lsm_voxel_sizes(&mut decoder);

    let mut planes: Vec<Array3<f32>> = Vec::new();
    let mut channels: Option<usize> = None;

    loop {
        if is_full_resolution_page(&mut decoder, width, height) {
            let samples = tag_u32(&mut decoder, Tag::SamplesPerPixel).unwrap_or(1) as usize;
            let planar = tag_u32(&mut decoder, Tag::PlanarConfiguration).unwrap_or(1);

            match channels {
                None => channels = Some(samples),
                Some(c) if c != samples => {
                    bail!(
                        "{}: pages disagree on channel count ({c} vs {samples})",
                        path.display()
                    )
                }
                Some(_) => {}
            }

            let buf = decode_samples(decoder.read_image().context("decoding page")?);
            let expected = width as usize * height as usize * samples;
            if buf.len() != expected {
                bail!(
                    "{}: page has {} samples, expected {expected} for {width}×{height}×{samples}",
                    path.display(),
                    buf.len()
                );
            }
            planes.push(split_channels(
                &buf,
                samples,
                height as usize,
                width as usize,
                planar == 2,
            ));
        }

        if !decoder.more_images() {
            break;
        }
        decoder.next_image().context("advancing to next page")?;
    }

    if planes.is_empty() {
        bail!("{}: no image planes found", path.display());
    }

    let nc = channels.unwrap_or(1);
    let (nz, ny, nx) = (planes.len(), height as usize, width as usize);
    let mut data = Array4::<f32>::zeros((nz, nc, ny, nx));
    for (z, plane) in planes.into_iter().enumerate() {
        data.index_axis_mut(Axis(0), z).assign(&plane);
    }

    Ok(SourceVolume {
        data,
        vx_um,
        vy_um,
        vz_um,
    })
}

/// True when the current page matches the stack dimensions and is not a
/// reduced-resolution (thumbnail) subfile.
fn is_full_resolution_page<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
    width: u32,
    height: u32,
) -> bool {
    let reduced = tag_u32(decoder, Tag::NewSubfileType)
        .map(|v| v & 1 != 0)
        .unwrap_or(false);
    if reduced {
        return false;
    }
    match decoder.dimensions() {
        Ok((w, h)) => w == width && h == height,
        Err(_) => false,
    }
}

/// Reshape one decoded page into (C, Y, X), handling both sample layouts.
fn split_channels(buf: &[f32], nc: usize, ny: usize, nx: usize, planar: bool) -> Array3<f32> {
    let mut out = Array3::<f32>::zeros((nc, ny, nx));
    if planar {
        // Plane-by-plane: all of channel 0, then channel 1, ...
        for c in 0..nc {
            let base = c * ny * nx;
            for y in 0..ny {
                for x in 0..nx {
                    out[[c, y, x]] = buf[base + y * nx + x];
                }
            }
        }
    } else {
        // Chunky: samples interleaved per pixel.
        for y in 0..ny {
            for x in 0..nx {
                let base = (y * nx + x) * nc;
                for c in 0..nc {
                    out[[c, y, x]] = buf[base + c];
                }
            }
        }
    }
    out
}

/// Widen any decoded sample type to f32. Intensities are normalized
/// later, so relative magnitudes are all that matters here.
fn decode_samples(result: DecodingResult) -> Vec<f32> {
    match result {
        DecodingResult::U8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::F32(v) => v,
        DecodingResult::F64(v) => v.into_iter().map(|x| x as f32).collect(),
    }
}

/// Read a small unsigned tag from the current IFD, tolerating absence.
fn tag_u32<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>, tag: Tag) -> Option<u32> {
    decoder
        .find_tag(tag)
        .ok()
        .flatten()
        .and_then(|v| v.into_u32().ok())
}

/// Extract voxel sizes (µm) from the CZ_LSMINFO private tag. Anything
/// missing, short, or non-physical falls back to 1.0 µm per axis.
fn lsm_voxel_sizes<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> (f64, f64, f64) {
    let bytes = decoder
        .find_tag(Tag::Unknown(TAG_CZ_LSMINFO))
        .ok()
        .flatten()
        .and_then(value_to_bytes);

    let mut sizes = [1.0f64; 3];
    if let Some(bytes) = bytes {
        for (axis, &off) in VOXEL_SIZE_OFFSETS.iter().enumerate() {
            if bytes.len() >= off + 8 {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&bytes[off..off + 8]);
                let meters = f64::from_le_bytes(raw);
                if meters.is_finite() && meters > 0.0 {
                    sizes[axis] = meters * 1e6;
                }
            }
        }
    }
    (sizes[0], sizes[1], sizes[2])
}

fn value_to_bytes(value: Value) -> Option<Vec<u8>> {
    match value {
        Value::Byte(b) => Some(vec![b]),
        Value::List(list) => list
            .into_iter()
            .map(|v| match v {
                Value::Byte(b) => Some(b),
                _ => None,
            })
            .collect(),
        _ => None,
    }
}
