//! Filesystem helpers for materializing booster content.

use std::path::Path;

use walkdir::WalkDir;

use crate::error::Result;

/// Files never copied when materializing an entry's content into a
/// target directory: version-control metadata, CI config and OS
/// artifacts. Matched case-insensitively against file names.
pub const EXCLUDED_PROJECT_FILES: [&str; 6] = [
    ".git",
    ".travis",
    ".travis.yml",
    ".ds_store",
    ".obsidian",
    ".gitmodules",
];

fn is_excluded(name: &str) -> bool {
    EXCLUDED_PROJECT_FILES
        .iter()
        .any(|candidate| name.eq_ignore_ascii_case(candidate))
}

/// Copies the tree at `source` into `target`, skipping the excluded
/// file list (directories matched by the list are pruned wholesale).
pub fn copy_excluding(source: &Path, target: &Path) -> Result<()> {
    let walker = WalkDir::new(source).into_iter().filter_entry(|entry| {
        entry
            .file_name()
            .to_str()
            .map(|name| !is_excluded(name))
            .unwrap_or(true)
    });

    for entry in walker {
        let entry = entry.map_err(std::io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .expect("walkdir stays under source");
        let destination = target.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&destination)?;
        } else {
            if let Some(parent) = destination.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &destination)?;
        }
    }
    Ok(())
}

/// Strips the final extension from a path string, if any.
/// `"a/b/booster.yaml"` becomes `"a/b/booster"`.
pub fn remove_file_extension(path: &str) -> String {
    let file_start = path.rfind(['/', '\\']).map_or(0, |i| i + 1);
    match path[file_start..].rfind('.') {
        Some(dot) if dot > 0 => path[..file_start + dot].to_string(),
        _ => path.to_string(),
    }
}
