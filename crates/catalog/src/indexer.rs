//! Descriptor tree traversal.
//!
//! Walks the catalog tree depth-first, folding `common.yaml`
//! ancestors into every descendant before the descendant's own
//! descriptor is merged on top, and derives a stable id for each
//! leaf. Runs on a blocking worker; the coordinator owns scheduling.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::booster::Booster;
use crate::data::DataMap;
use crate::error::{CatalogError, Result};
use crate::files::remove_file_extension;

/// Directory under the catalog root where fetched booster content is
/// materialized, one subdirectory per entry id.
pub(crate) const CLONED_BOOSTERS_DIR: &str = ".boosters";

const COMMON_DESCRIPTOR_FILE: &str = "common.yaml";
const DESCRIPTOR_SUFFIXES: [&str; 2] = ["booster.yaml", "booster.yml"];

/// Closure applied to every parsed data map before an entry is built.
pub type Transformer = Arc<dyn Fn(DataMap) -> DataMap + Send + Sync>;

pub(crate) struct IndexOptions {
    /// Comma-separated environment names folded over every entry.
    pub environment: Option<String>,
    pub transformer: Transformer,
}

/// Walks the descriptor tree under `catalog_root`, handing every
/// indexed booster to `sink` as soon as it is complete.
///
/// Parse errors skip the offending file; enumeration errors and an
/// observed `cancel` signal abort the whole pass.
pub(crate) fn index_catalog(
    catalog_root: &Path,
    options: &IndexOptions,
    cancel: &AtomicBool,
    sink: &mut dyn FnMut(Booster),
) -> Result<()> {
    // A root that cannot be enumerated fails the whole pass; it must
    // never masquerade as a successfully indexed empty catalog.
    if !fs::metadata(catalog_root)?.is_dir() {
        return Err(CatalogError::InvalidPath(format!(
            "Not a directory: {}",
            catalog_root.display()
        )));
    }
    let common = Booster::default();
    index_path(catalog_root, catalog_root, &common, options, cancel, sink)
}

fn index_path(
    catalog_root: &Path,
    path: &Path,
    common: &Booster,
    options: &IndexOptions,
    cancel: &AtomicBool,
    sink: &mut dyn FnMut(Booster),
) -> Result<()> {
    if cancel.load(Ordering::Relaxed) {
        return Err(CatalogError::Interrupted);
    }

    // Anything starting with "." is invisible to the indexer. The
    // root itself is exempt so a hidden checkout directory still works.
    if path != catalog_root {
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if name.starts_with('.') {
                return Ok(());
            }
        }
    }

    if path.is_dir() {
        // A `common.yaml` at this level merges into the inherited
        // entry before we descend, so children inherit the merged
        // ancestor rather than the original.
        let common_file = path.join(COMMON_DESCRIPTOR_FILE);
        let active_common = if common_file.is_file() {
            match read_booster(&common_file, options) {
                Ok(local_common) => common.merged(&local_common),
                Err(err) => {
                    log::error!("Error while reading {}: {err}", common_file.display());
                    common.clone()
                }
            }
        } else {
            common.clone()
        };

        // Name-sorted traversal keeps passes deterministic.
        let mut entries: Vec<_> = fs::read_dir(path)?
            .collect::<std::io::Result<Vec<_>>>()?
            .into_iter()
            .map(|e| e.path())
            .collect();
        entries.sort();

        for entry in entries {
            index_path(catalog_root, &entry, &active_common, options, cancel, sink)?;
        }
    } else if is_descriptor_file(path) {
        if let Some(booster) = index_booster(common, catalog_root, path, options) {
            let booster = match &options.environment {
                Some(environment) if !environment.is_empty() => environment
                    .split(',')
                    .map(str::trim)
                    .filter(|env| !env.is_empty())
                    .fold(booster, |b, env| b.for_environment(env)),
                _ => booster,
            };
            sink(booster);
        }
    }

    Ok(())
}

fn is_descriptor_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let lowered = name.to_lowercase();
    DESCRIPTOR_SUFFIXES
        .iter()
        .any(|suffix| lowered.ends_with(suffix))
}

/// Parses one leaf descriptor and combines it with its active
/// ancestor. Returns `None` (after logging) when the file cannot be
/// parsed; one bad descriptor never fails the pass.
fn index_booster(
    common: &Booster,
    catalog_root: &Path,
    file: &Path,
    options: &IndexOptions,
) -> Option<Booster> {
    log::info!("Indexing {} ...", file.display());
    let booster = match read_booster(file, options) {
        Ok(b) => b,
        Err(err) => {
            log::error!("Error while reading {}: {err}", file.display());
            return None;
        }
    };

    let mut booster = common.merged(&booster);
    let relative = file.strip_prefix(catalog_root).unwrap_or(file);
    let id = make_booster_id(relative);
    booster.set_content_path(catalog_root.join(CLONED_BOOSTERS_DIR).join(&id));
    booster.set_id(id);
    booster.set_descriptor_from_path(relative);
    Some(booster)
}

// The relative descriptor path, lower-cased, extension stripped and
// path separators turned into underscores, gives a stable unique id.
// Eg. "http-crud/vertx/booster.yaml" becomes "http-crud_vertx_booster".
fn make_booster_id(relative_path: &Path) -> String {
    let lowered = relative_path.to_string_lossy().to_lowercase();
    remove_file_extension(&lowered)
        .replace(['/', '\\'], "_")
}

fn read_booster(file: &Path, options: &IndexOptions) -> Result<Booster> {
    let raw = fs::read_to_string(file)?;
    let value: serde_json::Value = serde_yaml::from_str(&raw)
        .map_err(|e| CatalogError::Metadata(format!("{}: {e}", file.display())))?;
    let data = match value {
        serde_json::Value::Object(map) => map,
        other => {
            return Err(CatalogError::Metadata(format!(
                "{}: expected a mapping, got {other}",
                file.display()
            )))
        }
    };
    Ok(Booster::from_data((options.transformer)(data)))
}
