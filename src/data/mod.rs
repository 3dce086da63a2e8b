/// Data layer: bundle types and loading.
///
/// Architecture:
/// ```text
///  .npz bundle (r.npy, g.npy, b.npy, meta.json)
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  unzip + parse members → VolumeBundle
///   └──────────┘
///        │
///        ▼
///   ┌──────────────┐
///   │ VolumeBundle  │  3 × Array3<f32> (Z×Y×X, [0,1]) + BundleMeta
///   └──────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ transfer  │  tone mapping + compositing → rendered image
///   └──────────┘
/// ```

pub mod loader;
pub mod model;
