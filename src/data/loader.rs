use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use ndarray::Array3;
use ndarray_npy::ReadNpyExt;
use zip::result::ZipError;
use zip::ZipArchive;

use super::model::{BundleError, BundleMeta, VolumeBundle};

// ---------------------------------------------------------------------------
// Bundle loading
// ---------------------------------------------------------------------------

/// Load a converted bundle from disk.
///
/// The archive layout is fixed: three NPY v1.0 members `r.npy`, `g.npy`,
/// `b.npy` (f32, C-order, Z×Y×X) plus a `meta.json` record. Any missing
/// member, undecodable array, or shape disagreement between the three
/// volumes is a hard load failure; nothing partial is returned.
pub fn load_bundle(path: &Path) -> Result<VolumeBundle, BundleError> {
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;

    let meta = read_meta(&mut archive)?;
    let r = read_volume(&mut archive, "r.npy")?;
    let g = read_volume(&mut archive, "g.npy")?;
    let b = read_volume(&mut archive, "b.npy")?;

    VolumeBundle::new(r, g, b, meta)
}

fn read_meta<R: std::io::Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
) -> Result<BundleMeta, BundleError> {
    let member = match archive.by_name("meta.json") {
        Ok(m) => m,
        Err(ZipError::FileNotFound) => return Err(BundleError::MissingMember("meta.json")),
        Err(e) => return Err(e.into()),
    };
    Ok(serde_json::from_reader(member)?)
}

fn read_volume<R: std::io::Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    name: &'static str,
) -> Result<Array3<f32>, BundleError> {
    let member = match archive.by_name(name) {
        Ok(m) => m,
        Err(ZipError::FileNotFound) => return Err(BundleError::MissingMember(name)),
        Err(e) => return Err(e.into()),
    };
    Ok(Array3::<f32>::read_npy(member)?)
}
