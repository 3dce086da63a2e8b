use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glob::{glob_with, MatchOptions};

// ---------------------------------------------------------------------------
// Input discovery
// ---------------------------------------------------------------------------

/// Expand an input path into the sorted list of stack files to convert.
///
/// A file input is returned as-is. For a directory, `.lsm` files match by
/// default and `include_tiff` adds `.tif`/`.tiff`; extensions match
/// case-insensitively. `recursive` walks subdirectories, otherwise only
/// direct children are considered.
pub fn discover_files(root: &Path, include_tiff: bool, recursive: bool) -> Result<Vec<PathBuf>> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }

    let mut exts: Vec<&str> = vec!["lsm"];
    if include_tiff {
        exts.push("tif");
        exts.push("tiff");
    }

    let options = MatchOptions {
        case_sensitive: false,
        ..Default::default()
    };

    let mut files = Vec::new();
    for ext in exts {
        let pattern = if recursive {
            root.join("**").join(format!("*.{ext}"))
        } else {
            root.join(format!("*.{ext}"))
        };
        let pattern = pattern
            .to_str()
            .with_context(|| format!("non-UTF-8 path: {}", root.display()))?
            .to_string();

        for entry in glob_with(&pattern, options).context("building glob pattern")? {
            let path = entry.context("walking input directory")?;
            if path.is_file() {
                files.push(path);
            }
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}
