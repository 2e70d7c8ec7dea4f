//! Centralized path definitions for config files and build output.
//!
//! This module is the single source of truth for leaf filenames, directory
//! names and path-building functions. No other module should hard-code these
//! strings.

use std::path::{Path, PathBuf};

// ── Leaf filenames ───────────────────────────────────────────────

pub const SETTINGS_FILE: &str = "datascript.json";
pub const SOURCE_EXTENSION: &str = "ds";

// ── Output layout ────────────────────────────────────────────────

pub const DATA_DIR: &str = "data";
pub const FUNCTION_CATEGORY: &str = "function";
pub const FUNCTION_EXTENSION: &str = "mcfunction";
pub const TAG_NAMESPACE: &str = "minecraft";
pub const FUNCTION_TAG_CATEGORY: &str = "tags/function";
pub const TAG_EXTENSION: &str = "json";

// ── Functions ────────────────────────────────────────────────────

/// `datascript.json` next to the sources in `dir`.
pub fn settings_path(dir: &Path) -> PathBuf {
    dir.join(SETTINGS_FILE)
}

/// `<root>/data/<namespace>/<category>/<path>.<extension>`
pub fn asset_path(root: &Path, namespace: &str, category: &str, path: &str, extension: &str) -> PathBuf {
    let mut out = root.join(DATA_DIR).join(namespace);
    for part in category.split('/') {
        out.push(part);
    }
    out.push(format!("{path}.{extension}"));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_path_layout() {
        let p = asset_path(Path::new("out"), "pack", "tags/function", "load", "json");
        assert_eq!(p, Path::new("out/data/pack/tags/function/load.json"));
    }

    #[test]
    fn dotted_paths_keep_their_stem() {
        let p = asset_path(Path::new("out"), "pack", "function", "v1.2/run.fast", "mcfunction");
        assert_eq!(p, Path::new("out/data/pack/function/v1.2/run.fast.mcfunction"));
    }
}
