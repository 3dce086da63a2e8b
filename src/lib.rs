//! Confocal stack converter and volumetric viewer.
//!
//! The crate ships two binaries: `lsm2npz` converts Zeiss LSM (and
//! optionally plain TIFF) stacks into compact normalized NPZ bundles,
//! and `voxelscope` views those bundles interactively with per-channel
//! transfer-function controls.

pub mod app;
pub mod convert;
pub mod data;
pub mod state;
pub mod transfer;
pub mod ui;
