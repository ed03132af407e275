//! The catalog entry: one booster describing a starter-project
//! template, its source-fetch coordinates and free-form metadata.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use crate::data::{self, DataMap};
use crate::taxonomy::{Mission, Runtime, Version};

const KEY_METADATA: &str = "metadata";
const KEY_ENVIRONMENT: &str = "environment";

/// Records where in the descriptor tree an entry was defined.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Descriptor {
    /// File name of the descriptor (`booster.yaml`).
    pub name: String,
    /// Path segments of the directory holding the descriptor,
    /// relative to the catalog root.
    pub path: Vec<String>,
}

impl Descriptor {
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.path.is_empty()
    }
}

/// A single catalog entry.
///
/// Identity is the `id` alone: two boosters with equal ids compare
/// equal and sort identically no matter what else differs, so a
/// snapshot behaves as a set keyed by id.
#[derive(Debug, Clone, Default)]
pub struct Booster {
    id: String,
    data: DataMap,
    descriptor: Descriptor,
    content_path: Option<PathBuf>,
    applied_environment: Option<String>,
    mission: Option<Mission>,
    runtime: Option<Runtime>,
    version: Option<Version>,
}

impl PartialEq for Booster {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Booster {}

impl PartialOrd for Booster {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Booster {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl Booster {
    /// Builds a booster from parsed descriptor data. The data is
    /// pushed through the merge engine so it is normalized the same
    /// way inherited data is (lists copied, explicit nulls dropped).
    pub fn from_data(data: DataMap) -> Self {
        let mut booster = Self::default();
        data::merge_maps(&mut booster.data, &data);
        booster
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    /// Read-only view of the merged descriptor data.
    pub fn data(&self) -> &DataMap {
        &self.data
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn content_path(&self) -> Option<&Path> {
        self.content_path.as_deref()
    }

    pub(crate) fn set_content_path(&mut self, path: PathBuf) {
        self.content_path = Some(path);
    }

    /// Set when this entry is an environment-specialized derivative
    /// of a base entry.
    pub fn applied_environment(&self) -> Option<&str> {
        self.applied_environment.as_deref()
    }

    pub fn mission(&self) -> Option<&Mission> {
        self.mission.as_ref()
    }

    pub fn runtime(&self) -> Option<&Runtime> {
        self.runtime.as_ref()
    }

    pub fn version(&self) -> Option<&Version> {
        self.version.as_ref()
    }

    pub(crate) fn set_categories(&mut self, mission: Mission, runtime: Runtime, version: Version) {
        self.mission = Some(mission);
        self.runtime = Some(runtime);
        self.version = Some(version);
    }

    pub fn name(&self) -> String {
        self.data
            .get("name")
            .and_then(data::scalar_to_string)
            .unwrap_or_else(|| self.id.clone())
    }

    pub fn description(&self) -> String {
        self.data
            .get("description")
            .and_then(data::scalar_to_string)
            .unwrap_or_else(|| "No description available".to_string())
    }

    /// Entries marked `ignore: true` are indexed but excluded from
    /// queries and listener notifications.
    pub fn is_ignore(&self) -> bool {
        match self.data.get("ignore") {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    pub fn git_repo(&self) -> Option<String> {
        data::data_value(&self.data, "source/git/url").and_then(data::scalar_to_string)
    }

    pub fn git_ref(&self) -> Option<String> {
        data::data_value(&self.data, "source/git/ref").and_then(data::scalar_to_string)
    }

    /// The named environment overlays declared by this entry.
    pub fn environments(&self) -> Option<&DataMap> {
        match self.data.get(KEY_ENVIRONMENT) {
            Some(Value::Object(map)) => Some(map),
            _ => None,
        }
    }

    /// The free-form `metadata` sub-tree, when present.
    pub fn metadata(&self) -> Option<&DataMap> {
        match self.data.get(KEY_METADATA) {
            Some(Value::Object(map)) => Some(map),
            _ => None,
        }
    }

    /// Looks up a `/`-separated key path inside the metadata
    /// sub-tree, e.g. `app/launcher/runsOn`.
    pub fn metadata_value(&self, key: &str) -> Option<&Value> {
        self.metadata().and_then(|m| data::data_value(m, key))
    }

    /// Boolean metadata lookup with a default for absent keys.
    /// Accepts `true`/`false` both as booleans and as strings.
    pub fn metadata_bool(&self, key: &str, default: bool) -> bool {
        match self.metadata_value(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            Some(_) => default,
            None => default,
        }
    }

    pub(crate) fn set_descriptor_from_path(&mut self, relative_path: &Path) {
        let name = relative_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let path = relative_path
            .parent()
            .map(|dir| {
                dir.components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        self.descriptor = Descriptor { name, path };
    }

    /// Merges `other` into `self`: data trees go through the merge
    /// engine, non-data fields use last-non-empty-wins.
    pub(crate) fn merge(&mut self, other: &Booster) {
        data::merge_maps(&mut self.data, &other.data);
        if !other.id.is_empty() {
            self.id = other.id.clone();
        }
        if other.content_path.is_some() {
            self.content_path = other.content_path.clone();
        }
        if !other.descriptor.is_empty() {
            self.descriptor = other.descriptor.clone();
        }
        if other.mission.is_some() {
            self.mission = other.mission.clone();
        }
        if other.runtime.is_some() {
            self.runtime = other.runtime.clone();
        }
        if other.version.is_some() {
            self.version = other.version.clone();
        }
    }

    /// Returns a fresh booster combining `self` and `other`, in that
    /// order. `a.merged(b)` then merging an overlay on top composes
    /// the inheritance chain `merge(merge(common, own), overlay)`.
    pub fn merged(&self, other: &Booster) -> Booster {
        let mut merged = Booster::default();
        merged.merge(self);
        merged.merge(other);
        merged
    }

    /// Returns a version of this booster specialized for the named
    /// environment. If the environment overlay is absent or empty the
    /// booster is returned unchanged.
    pub fn for_environment(&self, environment_name: &str) -> Booster {
        let overlay = self
            .environments()
            .and_then(|envs| match envs.get(environment_name) {
                Some(Value::Object(map)) if !map.is_empty() => Some(map.clone()),
                _ => None,
            });
        let Some(overlay) = overlay else {
            return self.clone();
        };

        let mut merged = self.merged(&Booster::from_data(overlay));
        merged.applied_environment = Some(environment_name.to_string());
        // The derivative needs its own identity and content slot.
        merged.id = format!("{}_{}", merged.id, environment_name);
        if let Some(path) = merged.content_path.take() {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let suffixed = format!("{file_name}_{environment_name}");
            merged.content_path = Some(match path.parent() {
                Some(parent) => parent.join(suffixed),
                None => PathBuf::from(suffixed),
            });
        }
        merged
    }

    /// Flattened view for external reporting: the data tree with the
    /// resolved mission/runtime/version ids injected as top-level
    /// string keys.
    pub fn exportable_data(&self) -> DataMap {
        let mut exp = self.data.clone();
        if let Some(mission) = &self.mission {
            exp.insert("mission".to_string(), Value::String(mission.id.clone()));
        }
        if let Some(runtime) = &self.runtime {
            exp.insert("runtime".to_string(), Value::String(runtime.id.clone()));
        }
        if let Some(version) = &self.version {
            exp.insert("version".to_string(), Value::String(version.id.clone()));
        }
        exp
    }
}
