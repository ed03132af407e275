//! Mission / runtime / version classification.
//!
//! Boosters are classified along three axes: the *mission* (what the
//! booster demonstrates), the *runtime* (the technology it runs on)
//! and the *version* (which implementation of that runtime). The
//! classification metadata is supplied externally; entries whose
//! declared ids have no match get placeholder categories so indexing
//! never stalls on incomplete metadata.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use crate::booster::Booster;
use crate::data::{scalar_to_string, DataMap};
use crate::Snapshot;

const KEY_SUGGESTED: &str = "suggested";
const KEY_PIPELINE_PLATFORM: &str = "pipelinePlatform";
const DEFAULT_PIPELINE_PLATFORM: &str = "maven";

/// Id used when an entry declares no classification key at all.
const MISSING_ID: &str = "<<missing>>";

/// A certain feature or idea that a booster tries to demonstrate.
#[derive(Debug, Clone, Serialize)]
pub struct Mission {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub metadata: DataMap,
}

/// The technology used to develop and execute a booster's code.
#[derive(Debug, Clone, Serialize)]
pub struct Runtime {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub metadata: DataMap,
    pub icon: Option<String>,
    pub versions: HashMap<String, Version>,
}

/// A specific implementation of a [`Runtime`].
#[derive(Debug, Clone, Serialize)]
pub struct Version {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub metadata: DataMap,
}

impl Default for Mission {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            description: None,
            metadata: DataMap::new(),
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            description: None,
            metadata: DataMap::new(),
            icon: None,
            versions: HashMap::new(),
        }
    }
}

impl Default for Version {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            description: None,
            metadata: DataMap::new(),
        }
    }
}

macro_rules! category_identity {
    ($ty:ident) => {
        impl $ty {
            /// Placeholder category: the raw id doubles as the name and
            /// there is no description. Downstream validation can use
            /// `name == id && description.is_none()` to flag entries
            /// whose metadata was missing.
            pub fn placeholder(id: impl Into<String>) -> Self {
                let id = id.into();
                Self {
                    name: id.clone(),
                    id,
                    ..Self::default()
                }
            }

            pub fn is_suggested(&self) -> bool {
                matches!(self.metadata.get(KEY_SUGGESTED), Some(Value::Bool(true)))
            }
        }

        // Category identity is the id alone; name, description and
        // metadata never participate in equality.
        impl PartialEq for $ty {
            fn eq(&self, other: &Self) -> bool {
                self.id == other.id
            }
        }

        impl Eq for $ty {}

        impl std::hash::Hash for $ty {
            fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
                self.id.hash(state);
            }
        }
    };
}

category_identity!(Mission);
category_identity!(Runtime);
category_identity!(Version);

impl Runtime {
    /// Build platform used by pipelines targeting this runtime.
    pub fn pipeline_platform(&self) -> String {
        self.metadata
            .get(KEY_PIPELINE_PLATFORM)
            .and_then(scalar_to_string)
            .unwrap_or_else(|| DEFAULT_PIPELINE_PLATFORM.to_string())
    }
}

/// Parsed classification document.
#[derive(Debug, Default)]
pub struct TaxonomyMaps {
    pub missions: HashMap<String, Mission>,
    pub runtimes: HashMap<String, Runtime>,
}

/// Where an entry's classification keys come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClassificationSource {
    /// Keys read from the entry's `metadata` sub-tree
    /// (`mission`/`runtime`/`version`).
    #[default]
    Metadata,
    /// Keys derived from the first three descriptor path segments
    /// (`<mission>/<runtime>/<version>/booster.yaml` catalog layout).
    DescriptorPath,
}

/// Parses the `{missions: [...], runtimes: [...]}` document into
/// lookup maps. Malformed individual records are logged and skipped;
/// a document of the wrong overall shape yields empty maps.
pub fn process_metadata(doc: &Value) -> TaxonomyMaps {
    let mut maps = TaxonomyMaps::default();

    if let Some(Value::Array(missions)) = doc.get("missions") {
        for entry in missions {
            match parse_mission(entry) {
                Some(m) => {
                    maps.missions.insert(m.id.clone(), m);
                }
                None => log::warn!("Skipping malformed mission record: {entry}"),
            }
        }
    }

    if let Some(Value::Array(runtimes)) = doc.get("runtimes") {
        for entry in runtimes {
            match parse_runtime(entry) {
                Some(r) => {
                    maps.runtimes.insert(r.id.clone(), r);
                }
                None => log::warn!("Skipping malformed runtime record: {entry}"),
            }
        }
    }

    maps
}

fn parse_common(entry: &Value) -> Option<(String, String, Option<String>, DataMap)> {
    // Ids are string keys; records with a missing or non-string id
    // are malformed and get skipped.
    let id = match entry.get("id") {
        Some(Value::String(s)) => s.clone(),
        _ => return None,
    };
    let name = entry
        .get("name")
        .and_then(scalar_to_string)
        .unwrap_or_else(|| id.clone());
    let description = entry.get("description").and_then(scalar_to_string);
    let metadata = match entry.get("metadata") {
        Some(Value::Object(map)) => map.clone(),
        _ => DataMap::new(),
    };
    Some((id, name, description, metadata))
}

fn parse_mission(entry: &Value) -> Option<Mission> {
    let (id, name, description, metadata) = parse_common(entry)?;
    Some(Mission {
        id,
        name,
        description,
        metadata,
    })
}

fn parse_version(entry: &Value) -> Option<Version> {
    let (id, name, description, metadata) = parse_common(entry)?;
    Some(Version {
        id,
        name,
        description,
        metadata,
    })
}

fn parse_runtime(entry: &Value) -> Option<Runtime> {
    let (id, name, description, metadata) = parse_common(entry)?;
    let icon = entry.get("icon").and_then(scalar_to_string);
    let mut versions = HashMap::new();
    if let Some(Value::Array(list)) = entry.get("versions") {
        for version in list {
            match parse_version(version) {
                Some(v) => {
                    versions.insert(v.id.clone(), v);
                }
                None => log::warn!("Skipping malformed version record: {version}"),
            }
        }
    }
    Some(Runtime {
        id,
        name,
        description,
        metadata,
        icon,
        versions,
    })
}

/// Second indexing pass: attaches mission/runtime/version categories
/// to every entry of the candidate set.
///
/// `doc` is the classification document, or `None` when the metadata
/// source is absent or failed; in that case every entry resolves via
/// placeholders.
pub fn resolve(boosters: &mut Snapshot, doc: Option<&Value>, source: ClassificationSource) {
    let maps = doc.map(process_metadata).unwrap_or_default();

    for booster in boosters.values_mut() {
        let (mission_id, runtime_id, version_id) = classification_keys(booster, source);

        let runtime = maps.runtimes.get(&runtime_id).cloned().unwrap_or_else(|| {
            log::warn!("Runtime '{runtime_id}' not found in metadata");
            Runtime::placeholder(&runtime_id)
        });

        let version = runtime.versions.get(&version_id).cloned().unwrap_or_else(|| {
            log::warn!(
                "Version '{version_id}' not found in Runtime '{}' metadata",
                runtime.id
            );
            Version::placeholder(&version_id)
        });

        let mission = maps.missions.get(&mission_id).cloned().unwrap_or_else(|| {
            log::warn!("Mission '{mission_id}' not found in metadata");
            Mission::placeholder(&mission_id)
        });

        booster.set_categories(mission, runtime, version);
    }
}

fn classification_keys(booster: &Booster, source: ClassificationSource) -> (String, String, String) {
    let missing = || MISSING_ID.to_string();
    match source {
        ClassificationSource::Metadata => (
            booster
                .metadata_value("mission")
                .and_then(scalar_to_string)
                .unwrap_or_else(missing),
            booster
                .metadata_value("runtime")
                .and_then(scalar_to_string)
                .unwrap_or_else(missing),
            booster
                .metadata_value("version")
                .and_then(scalar_to_string)
                .unwrap_or_else(missing),
        ),
        ClassificationSource::DescriptorPath => {
            let path = booster.descriptor().path.as_slice();
            let segment = |i: usize| path.get(i).cloned().unwrap_or_else(missing);
            (segment(0), segment(1), segment(2))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample_metadata() -> Value {
        json!({
            "missions": [
                {"id": "rest-http", "name": "REST API Level 0",
                 "description": "Map business operations to HTTP",
                 "metadata": {"suggested": true}},
                {"id": "configmap", "name": "Externalized Configuration",
                 "description": "Externalize configuration"},
                {"id": 42}
            ],
            "runtimes": [
                {"id": "vert.x", "name": "Eclipse Vert.x",
                 "description": "A reactive toolkit",
                 "icon": "data:image/svg+xml;base64,...",
                 "versions": [
                     {"id": "community", "name": "3.5.0.Final (Community)"},
                     {"id": "redhat", "name": "3.5.0 (RHOAR)"}
                 ]},
                {"id": "spring-boot", "name": "Spring Boot",
                 "metadata": {"suggested": true, "pipelinePlatform": "maven"}}
            ]
        })
    }

    #[test]
    fn processes_missions_and_runtimes() {
        let maps = process_metadata(&sample_metadata());

        // The record without a string id is skipped, not fatal.
        assert_eq!(maps.missions.len(), 2);
        assert_eq!(maps.runtimes.len(), 2);
        assert_eq!(maps.missions["rest-http"].is_suggested(), true);
        assert_eq!(maps.missions["configmap"].is_suggested(), false);
        assert_eq!(maps.runtimes["vert.x"].versions.len(), 2);
        assert_eq!(
            maps.runtimes["vert.x"].versions["community"].name,
            "3.5.0.Final (Community)"
        );
        assert!(maps.runtimes["vert.x"].icon.is_some());
    }

    #[test]
    fn pipeline_platform_defaults_to_maven() {
        let maps = process_metadata(&sample_metadata());

        assert_eq!(maps.runtimes["vert.x"].pipeline_platform(), "maven");
        assert_eq!(maps.runtimes["spring-boot"].pipeline_platform(), "maven");
    }

    #[test]
    fn category_equality_is_by_id_alone() {
        let a = Runtime::placeholder("vert.x");
        let b = &process_metadata(&sample_metadata()).runtimes["vert.x"];

        assert_eq!(&a, b);
    }

    #[test]
    fn placeholder_carries_detectable_signal() {
        let m = Mission::placeholder("unknown");

        assert_eq!(m.name, m.id);
        assert_eq!(m.description, None);
    }

    #[test]
    fn resolve_attaches_placeholders_for_unknown_ids() {
        let booster = Booster::from_data(
            json!({"metadata": {"mission": "rest-http", "runtime": "node", "version": "lts"}})
                .as_object()
                .cloned()
                .unwrap(),
        );
        let mut snapshot = Snapshot::new();
        snapshot.insert("b".to_string(), booster);

        resolve(&mut snapshot, Some(&sample_metadata()), ClassificationSource::Metadata);

        let resolved = &snapshot["b"];
        let runtime = resolved.runtime().unwrap();
        assert_eq!(runtime.id, "node");
        assert_eq!(runtime.name, "node");
        assert_eq!(runtime.description, None);
        // The known mission resolves to the real record.
        assert_eq!(resolved.mission().unwrap().name, "REST API Level 0");
    }

    #[test]
    fn resolve_without_document_uses_placeholders_throughout() {
        let booster = Booster::from_data(
            json!({"metadata": {"runtime": "vert.x"}})
                .as_object()
                .cloned()
                .unwrap(),
        );
        let mut snapshot = Snapshot::new();
        snapshot.insert("b".to_string(), booster);

        resolve(&mut snapshot, None, ClassificationSource::Metadata);

        let resolved = &snapshot["b"];
        assert_eq!(resolved.runtime().unwrap().name, "vert.x");
        assert_eq!(resolved.mission().unwrap().id, "<<missing>>");
    }

    #[test]
    fn resolve_can_classify_by_descriptor_path() {
        let mut booster = Booster::from_data(DataMap::new());
        booster.set_descriptor_from_path(std::path::Path::new(
            "rest-http/vert.x/community/booster.yaml",
        ));
        let mut snapshot = Snapshot::new();
        snapshot.insert("b".to_string(), booster);

        resolve(
            &mut snapshot,
            Some(&sample_metadata()),
            ClassificationSource::DescriptorPath,
        );

        let resolved = &snapshot["b"];
        assert_eq!(resolved.mission().unwrap().id, "rest-http");
        assert_eq!(resolved.runtime().unwrap().id, "vert.x");
        assert_eq!(resolved.version().unwrap().id, "community");
    }
}
