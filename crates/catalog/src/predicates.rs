//! Composable query predicates over catalog entries.
//!
//! Every combinator returns a plain `Fn(&Booster) -> bool`, so
//! callers compose them with closures and `&&`. A `None` parameter
//! always yields an unconstrained predicate.

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;
use serde_json::Value;

use crate::booster::Booster;
use crate::data::{self, scalar_to_string, to_string_list};
use crate::error::{CatalogError, Result};
use crate::taxonomy::{Mission, Runtime, Version};

/// Metadata key holding the cluster types an entry supports.
const RUNS_ON_KEY: &str = "app/launcher/runsOn";

/// Pluggable scripted predicate: an externally supplied closure
/// evaluated with the entry as its context. The catalog core ships no
/// expression evaluator; hosts that want one wrap it in this type.
pub type ScriptPredicate = Arc<dyn Fn(&Booster) -> bool + Send + Sync>;

pub fn with_mission(mission: Option<&Mission>) -> impl Fn(&Booster) -> bool {
    let id = mission.map(|m| m.id.clone());
    move |b| match &id {
        None => true,
        Some(id) => b.mission().map_or(false, |m| &m.id == id),
    }
}

pub fn with_runtime(runtime: Option<&Runtime>) -> impl Fn(&Booster) -> bool {
    let id = runtime.map(|r| r.id.clone());
    move |b| match &id {
        None => true,
        Some(id) => b.runtime().map_or(false, |r| &r.id == id),
    }
}

pub fn with_version(version: Option<&Version>) -> impl Fn(&Booster) -> bool {
    let id = version.map(|v| v.id.clone());
    move |b| match &id {
        None => true,
        Some(id) => b.version().map_or(false, |v| &v.id == id),
    }
}

/// Regex full-match on the resolved runtime id. An entry with no
/// resolved runtime passes: a pattern cannot contradict an
/// unresolved dimension.
pub fn with_runtime_matching(pattern: Option<&str>) -> Result<impl Fn(&Booster) -> bool> {
    let regex = compile_full_match(pattern)?;
    Ok(move |b: &Booster| match (&regex, b.runtime()) {
        (None, _) | (_, None) => true,
        (Some(re), Some(r)) => re.is_match(&r.id),
    })
}

/// Regex full-match on the resolved version id; see
/// [`with_runtime_matching`] for the `None` semantics.
pub fn with_version_matching(pattern: Option<&str>) -> Result<impl Fn(&Booster) -> bool> {
    let regex = compile_full_match(pattern)?;
    Ok(move |b: &Booster| match (&regex, b.version()) {
        (None, _) | (_, None) => true,
        (Some(re), Some(v)) => re.is_match(&v.id),
    })
}

fn compile_full_match(pattern: Option<&str>) -> Result<Option<Regex>> {
    pattern
        .map(|p| {
            Regex::new(&format!("^(?:{p})$"))
                .map_err(|e| CatalogError::Metadata(format!("invalid pattern '{p}': {e}")))
        })
        .transpose()
}

/// Matches entries that support the requested cluster type according
/// to their declared `runsOn` list. A `None`/empty request always
/// passes.
pub fn with_runs_on(cluster_type: Option<&str>) -> impl Fn(&Booster) -> bool {
    let cluster = cluster_type
        .filter(|c| !c.is_empty())
        .map(str::to_string);
    move |b| match &cluster {
        None => true,
        Some(cluster) => check_category(&to_string_list(b.metadata_value(RUNS_ON_KEY)), cluster),
    }
}

/// Matches entries whose metadata `app/<application>/enabled` flag is
/// not `false` (absent means enabled). A `None` application always
/// passes.
pub fn with_app_enabled(application: Option<&str>) -> impl Fn(&Booster) -> bool {
    let key = application.map(|app| format!("app/{app}/enabled"));
    move |b| match &key {
        None => true,
        Some(key) => b.metadata_bool(key, true),
    }
}

/// Matches entries whose attributes equal (case-insensitively) at
/// least one acceptable value for every given path. An empty wanted
/// value means `"true"`; an unresolvable path yields the sentinel
/// `"false"`.
pub fn with_parameters(parameters: HashMap<String, Vec<String>>) -> impl Fn(&Booster) -> bool {
    move |b| {
        parameters.iter().all(|(path, values)| {
            let actual = resolve_path(b, path);
            values
                .iter()
                .map(|v| if v.is_empty() { "true" } else { v.as_str() })
                .any(|v| v.eq_ignore_ascii_case(&actual))
        })
    }
}

/// Wraps a host-supplied script predicate; `None` is unconstrained.
pub fn with_script(script: Option<ScriptPredicate>) -> impl Fn(&Booster) -> bool {
    move |b| match &script {
        None => true,
        Some(script) => script(b),
    }
}

/// Checks a category name against a declared supported list,
/// left to right:
/// - `all` / `*` / exact (case-insensitive) match: supported
/// - `none` / `!*` / `!<name>` match: not supported
/// - otherwise the default applies: `false` as soon as the list
///   contains any non-negated entry, `true` for an empty or
///   all-negated list.
pub fn check_category(supported: &[String], category: &str) -> bool {
    let mut default_result = true;
    for entry in supported {
        if !entry.starts_with('!') {
            default_result = false;
        }
        if entry.eq_ignore_ascii_case("all")
            || entry.eq_ignore_ascii_case("*")
            || entry.eq_ignore_ascii_case(category)
        {
            return true;
        }
        if entry.eq_ignore_ascii_case("none")
            || entry.eq_ignore_ascii_case("!*")
            || (entry.starts_with('!') && entry[1..].eq_ignore_ascii_case(category))
        {
            return false;
        }
    }
    default_result
}

/// Resolves a dotted (or `/`-separated) path against an entry: its
/// data tree plus the small set of derived attributes. Anything that
/// cannot be resolved to a scalar becomes the sentinel `"false"`.
fn resolve_path(booster: &Booster, path: &str) -> String {
    let segments: Vec<&str> = path
        .split(['.', '/'])
        .filter(|s| !s.is_empty())
        .collect();
    let Some((&head, rest)) = segments.split_first() else {
        return "false".to_string();
    };

    let value = match head {
        "id" => rest.is_empty().then(|| booster.id().to_string()),
        "name" => rest.is_empty().then(|| booster.name()),
        "description" => rest.is_empty().then(|| booster.description()),
        "appliedEnvironment" => booster
            .applied_environment()
            .filter(|_| rest.is_empty())
            .map(str::to_string),
        "mission" => category_field(booster.mission().map(|m| (&m.id, &m.name)), rest),
        "runtime" => category_field(booster.runtime().map(|r| (&r.id, &r.name)), rest),
        "version" => category_field(booster.version().map(|v| (&v.id, &v.name)), rest),
        "runsOn" => booster
            .metadata_value(RUNS_ON_KEY)
            .filter(|_| rest.is_empty())
            .and_then(runs_on_to_string),
        "metadata" => booster
            .metadata_value(&rest.join("/"))
            .and_then(scalar_to_string),
        _ => data::data_value(booster.data(), &segments.join("/")).and_then(scalar_to_string),
    };

    value.unwrap_or_else(|| "false".to_string())
}

fn category_field(category: Option<(&String, &String)>, rest: &[&str]) -> Option<String> {
    let (id, name) = category?;
    match rest {
        [] | ["id"] => Some(id.clone()),
        ["name"] => Some(name.clone()),
        _ => None,
    }
}

fn runs_on_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Array(_) => Some(to_string_list(Some(value)).join(",")),
        other => scalar_to_string(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn booster_with_metadata(metadata: Value) -> Booster {
        Booster::from_data(
            json!({"metadata": metadata})
                .as_object()
                .cloned()
                .expect("object"),
        )
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn check_category_truth_table() {
        assert_eq!(check_category(&[], "foobar"), true);
        assert_eq!(check_category(&strings(&["all"]), "foobar"), true);
        assert_eq!(check_category(&strings(&["foobar"]), "foobar"), true);
        assert_eq!(check_category(&strings(&["!foobar"]), "foobar"), false);
        assert_eq!(check_category(&strings(&["none"]), "foobar"), false);
        assert_eq!(check_category(&strings(&["foobar", "none"]), "foobar"), true);
        assert_eq!(check_category(&strings(&["!foobar", "all"]), "foobar"), false);
        assert_eq!(check_category(&strings(&["foobar", "!foobar"]), "foobar"), true);
        assert_eq!(check_category(&strings(&["!foobar", "foobar"]), "foobar"), false);
        assert_eq!(check_category(&strings(&["baz"]), "foobar"), false);
        assert_eq!(check_category(&strings(&["!baz"]), "foobar"), true);
        assert_eq!(check_category(&strings(&["baz", "none"]), "foobar"), false);
        assert_eq!(check_category(&strings(&["baz", "all"]), "foobar"), true);
        assert_eq!(check_category(&strings(&["!baz", "none"]), "foobar"), false);
        assert_eq!(check_category(&strings(&["!baz", "all"]), "foobar"), true);
    }

    #[test]
    fn runs_on_reads_declared_cluster_list() {
        let b = booster_with_metadata(json!({"app": {"launcher": {"runsOn": ["oso", "!prod"]}}}));

        assert!(with_runs_on(None)(&b));
        assert!(with_runs_on(Some(""))(&b));
        assert!(with_runs_on(Some("oso"))(&b));
        assert!(!with_runs_on(Some("prod"))(&b));
        assert!(!with_runs_on(Some("stage"))(&b));

        let unrestricted = booster_with_metadata(json!({}));
        assert!(with_runs_on(Some("stage"))(&unrestricted));
    }

    #[test]
    fn params_default_value_means_true() {
        let pred = with_parameters(HashMap::from([(
            "metadata.istio".to_string(),
            vec![String::new()],
        )]));

        assert!(pred(&booster_with_metadata(json!({"istio": "true"}))));
        assert!(!pred(&booster_with_metadata(json!({"istio": "false"}))));
    }

    #[test]
    fn params_nested_paths_resolve() {
        let pred = with_parameters(HashMap::from([(
            "metadata.osio.enabled".to_string(),
            vec!["true".to_string()],
        )]));

        assert!(pred(&booster_with_metadata(json!({"osio": {"enabled": "true"}}))));
        assert!(pred(&booster_with_metadata(json!({"osio": {"enabled": true}}))));
        assert!(!pred(&booster_with_metadata(json!({"osio": {"enabled": false}}))));
    }

    #[test]
    fn params_any_of_multiple_values_matches() {
        let pred = with_parameters(HashMap::from([(
            "metadata.level".to_string(),
            vec!["novice".to_string(), "advanced".to_string()],
        )]));

        assert!(pred(&booster_with_metadata(json!({"level": "novice"}))));
        assert!(pred(&booster_with_metadata(json!({"level": "Advanced"}))));
        assert!(!pred(&booster_with_metadata(json!({"level": "expert"}))));
    }

    #[test]
    fn params_missing_path_is_false_sentinel() {
        let pred = with_parameters(HashMap::from([(
            "foo.bar".to_string(),
            vec![String::new()],
        )]));

        assert!(!pred(&booster_with_metadata(json!({"dummy": "dummy"}))));
    }

    #[test]
    fn params_resolve_derived_fields() {
        let mut b = booster_with_metadata(json!({}));
        b.set_id("my_booster");
        b.set_categories(
            Mission::placeholder("rest-http"),
            Runtime::placeholder("vert.x"),
            Version::placeholder("community"),
        );

        let pred = with_parameters(HashMap::from([
            ("id".to_string(), vec!["my_booster".to_string()]),
            ("runtime".to_string(), vec!["vert.x".to_string()]),
            ("version.id".to_string(), vec!["community".to_string()]),
        ]));
        assert!(pred(&b));
    }

    #[test]
    fn exact_category_predicates_ignore_none() {
        let mut b = booster_with_metadata(json!({}));
        b.set_categories(
            Mission::placeholder("rest-http"),
            Runtime::placeholder("vert.x"),
            Version::placeholder("community"),
        );

        assert!(with_mission(None)(&b));
        assert!(with_mission(Some(&Mission::placeholder("rest-http")))(&b));
        assert!(!with_mission(Some(&Mission::placeholder("configmap")))(&b));
        assert!(with_runtime(Some(&Runtime::placeholder("vert.x")))(&b));
        assert!(!with_version(Some(&Version::placeholder("redhat")))(&b));
    }

    #[test]
    fn pattern_predicates_full_match_only() {
        let mut b = booster_with_metadata(json!({}));
        b.set_categories(
            Mission::placeholder("rest-http"),
            Runtime::placeholder("vert.x"),
            Version::placeholder("community"),
        );

        assert!(with_runtime_matching(Some("vert\\..*")).unwrap()(&b));
        assert!(!with_runtime_matching(Some("vert")).unwrap()(&b));
        assert!(with_runtime_matching(None).unwrap()(&b));
        assert!(with_version_matching(Some("comm.*")).unwrap()(&b));

        // An unresolved dimension cannot be contradicted.
        let unresolved = booster_with_metadata(json!({}));
        assert!(with_runtime_matching(Some("x.*")).unwrap()(&unresolved));

        assert!(with_runtime_matching(Some("(")).is_err());
    }

    #[test]
    fn app_enabled_defaults_to_true() {
        let b = booster_with_metadata(json!({"app": {"osio": {"enabled": false}}}));

        assert!(with_app_enabled(None)(&b));
        assert!(!with_app_enabled(Some("osio"))(&b));
        assert!(with_app_enabled(Some("launcher"))(&b));
    }

    #[test]
    fn script_hook_is_optional() {
        let b = booster_with_metadata(json!({"istio": "true"}));

        assert!(with_script(None)(&b));
        let hook: ScriptPredicate = Arc::new(|b| b.metadata_bool("istio", false));
        assert!(with_script(Some(hook))(&b));
        let hook: ScriptPredicate = Arc::new(|_| false);
        assert!(!with_script(Some(hook))(&b));
    }
}
