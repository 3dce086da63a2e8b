//! End-to-end conversion tests over synthetic TIFF stacks.

use std::fs::File;
use std::io::Write;

use ndarray::Array3;
use ndarray_npy::WriteNpyExt;
use tiff::encoder::{colortype, TiffEncoder};

use voxelscope::convert::{convert_file, ConvertOptions};
use voxelscope::data::loader::load_bundle;
use voxelscope::data::model::{BundleError, ChannelMap};

/// Write a multi-page RGB8 stack where, per pixel (y, x):
///   channel 0 = x gradient, channel 1 = constant, channel 2 = y gradient.
fn write_rgb_stack(path: &std::path::Path, nz: usize, ny: usize, nx: usize) {
    let mut file = File::create(path).unwrap();
    let mut encoder = TiffEncoder::new(&mut file).unwrap();
    for _z in 0..nz {
        let mut data = Vec::with_capacity(ny * nx * 3);
        for y in 0..ny {
            for x in 0..nx {
                data.push((x * 8 % 256) as u8);
                data.push(100u8);
                data.push((y * 8 % 256) as u8);
            }
        }
        encoder
            .write_image::<colortype::RGB8>(nx as u32, ny as u32, &data)
            .unwrap();
    }
}

fn write_gray_stack(path: &std::path::Path, nz: usize, ny: usize, nx: usize) {
    let mut file = File::create(path).unwrap();
    let mut encoder = TiffEncoder::new(&mut file).unwrap();
    for _z in 0..nz {
        let data = vec![50u8; ny * nx];
        encoder
            .write_image::<colortype::Gray8>(nx as u32, ny as u32, &data)
            .unwrap();
    }
}

#[test]
fn convert_then_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("stack.lsm");
    let output = dir.path().join("stack.npz");
    write_rgb_stack(&input, 3, 20, 16);

    let opts = ConvertOptions {
        ds: 3,
        sigma: 0.0,
        map: ChannelMap([2, 0, 1]),
    };
    let summary = convert_file(&input, &output, &opts).unwrap();
    // ceil(20/3) = 7, ceil(16/3) = 6; Z untouched
    assert_eq!(summary.shape, (3, 7, 6));

    let bundle = load_bundle(&output).unwrap();
    assert_eq!(bundle.shape(), (3, 7, 6));
    assert_eq!(bundle.meta.ds, 3);
    assert_eq!(bundle.meta.sigma, 0.0);
    assert_eq!(bundle.meta.file, "stack.lsm");
    assert_eq!(bundle.meta.channel_map, ChannelMap([2, 0, 1]));
    // Plain TIFF carries no LSM geometry: 1 µm fallback.
    assert_eq!(bundle.meta.vx_um, 1.0);
    assert_eq!(bundle.meta.vz_um, 1.0);

    for volume in bundle.channels() {
        assert!(volume.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    // Output blue came from the constant source channel 1: its percentile
    // window is degenerate, so the whole volume normalizes to zero.
    assert!(bundle.b.iter().all(|&v| v == 0.0));
    // Output red came from the y gradient: it spans (nearly) the full
    // range. The stride may drop the exact-1.0 row, hence the margin.
    assert!(bundle.r.iter().any(|&v| v == 0.0));
    assert!(bundle.r.iter().cloned().fold(f32::MIN, f32::max) > 0.9);
    // Rows of the x-gradient (green) volume vary along X only.
    let g0 = bundle.g.index_axis(ndarray::Axis(0), 0);
    for row in g0.rows() {
        assert!((row[0] - g0[[0, 0]]).abs() < 1e-6);
    }
}

#[test]
fn background_subtraction_path_stays_in_range() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("stack.lsm");
    let output = dir.path().join("stack.npz");
    write_rgb_stack(&input, 2, 24, 24);

    let opts = ConvertOptions {
        ds: 2,
        sigma: 3.0,
        map: ChannelMap([0, 1, 2]),
    };
    convert_file(&input, &output, &opts).unwrap();

    let bundle = load_bundle(&output).unwrap();
    assert_eq!(bundle.shape(), (2, 12, 12));
    for volume in bundle.channels() {
        assert!(volume.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }
}

#[test]
fn too_few_channels_fails_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("mono.lsm");
    let output = dir.path().join("mono.npz");
    write_gray_stack(&input, 2, 8, 8);

    let err = convert_file(&input, &output, &ConvertOptions::default()).unwrap_err();
    let bundle_err = err.downcast_ref::<BundleError>().unwrap();
    assert!(matches!(bundle_err, BundleError::TooFewChannels(1)));
    assert!(!output.exists());
}

#[test]
fn out_of_range_map_is_rejected_before_processing() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("stack.lsm");
    let output = dir.path().join("stack.npz");
    write_rgb_stack(&input, 1, 8, 8);

    let opts = ConvertOptions {
        map: ChannelMap([0, 1, 3]),
        ..Default::default()
    };
    let err = convert_file(&input, &output, &opts).unwrap_err();
    let bundle_err = err.downcast_ref::<BundleError>().unwrap();
    assert!(matches!(
        bundle_err,
        BundleError::ChannelMapOutOfRange {
            index: 3,
            channels: 3
        }
    ));
    assert!(!output.exists());
}

#[test]
fn bundle_with_missing_member_fails_to_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.npz");

    let file = File::create(&path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::FileOptions::default();

    let volume = Array3::<f32>::zeros((1, 2, 2));
    zip.start_file("r.npy", options).unwrap();
    volume.write_npy(&mut zip).unwrap();
    zip.start_file("g.npy", options).unwrap();
    volume.write_npy(&mut zip).unwrap();
    // b.npy deliberately absent
    zip.start_file("meta.json", options).unwrap();
    zip.write_all(
        br#"{"vx_um":1.0,"vy_um":1.0,"vz_um":1.0,"ds":1,"sigma":0.0,"file":"x.lsm","channel_map":[2,0,1]}"#,
    )
    .unwrap();
    zip.finish().unwrap();

    let err = load_bundle(&path).unwrap_err();
    assert!(matches!(err, BundleError::MissingMember("b.npy")));
}

#[test]
fn bundle_with_mismatched_shapes_fails_to_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mismatch.npz");

    let file = File::create(&path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::FileOptions::default();

    zip.start_file("r.npy", options).unwrap();
    Array3::<f32>::zeros((1, 2, 2)).write_npy(&mut zip).unwrap();
    zip.start_file("g.npy", options).unwrap();
    Array3::<f32>::zeros((1, 2, 2)).write_npy(&mut zip).unwrap();
    zip.start_file("b.npy", options).unwrap();
    Array3::<f32>::zeros((1, 2, 3)).write_npy(&mut zip).unwrap();
    zip.start_file("meta.json", options).unwrap();
    zip.write_all(
        br#"{"vx_um":1.0,"vy_um":1.0,"vz_um":1.0,"ds":1,"sigma":0.0,"file":"x.lsm","channel_map":[2,0,1]}"#,
    )
    .unwrap();
    zip.finish().unwrap();

    let err = load_bundle(&path).unwrap_err();
    assert!(matches!(err, BundleError::ShapeMismatch { .. }));
}
