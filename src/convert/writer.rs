use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use ndarray::Array3;
use ndarray_npy::WriteNpyExt;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::data::model::VolumeBundle;

// ---------------------------------------------------------------------------
// Bundle writing
// ---------------------------------------------------------------------------

/// Persist a bundle as a deflated ZIP archive with NPY v1.0 members plus
/// `meta.json`. Parent directories are created as needed.
pub fn write_bundle(path: &Path, bundle: &VolumeBundle) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    write_volume(&mut zip, options, "r.npy", &bundle.r)?;
    write_volume(&mut zip, options, "g.npy", &bundle.g)?;
    write_volume(&mut zip, options, "b.npy", &bundle.b)?;

    zip.start_file("meta.json", options)
        .context("starting meta.json member")?;
    let meta = serde_json::to_vec(&bundle.meta).context("encoding meta.json")?;
    zip.write_all(&meta).context("writing meta.json member")?;

    zip.finish().context("finalizing bundle archive")?;
    Ok(())
}

fn write_volume<W: Write + std::io::Seek>(
    zip: &mut ZipWriter<W>,
    options: FileOptions,
    name: &str,
    volume: &Array3<f32>,
) -> Result<()> {
    zip.start_file(name, options)
        .with_context(|| format!("starting {name} member"))?;
    volume
        .write_npy(zip)
        .with_context(|| format!("writing {name} member"))?;
    Ok(())
}
