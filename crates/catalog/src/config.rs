//! Environment-variable configuration for catalog deployments.

pub const DEFAULT_CATALOG_REPOSITORY: &str =
    "https://github.com/fabric8-launcher/launcher-booster-catalog.git";
pub const DEFAULT_CATALOG_REF: &str = "master";

const REPOSITORY_VAR: &str = "BOOSTER_CATALOG_REPOSITORY";
const REF_VAR: &str = "BOOSTER_CATALOG_REF";
const ENVIRONMENT_VAR: &str = "BOOSTER_CATALOG_ENVIRONMENT";

/// Git URI of the descriptor tree to index.
pub fn catalog_repository() -> String {
    pick(std::env::var(REPOSITORY_VAR).ok(), DEFAULT_CATALOG_REPOSITORY)
}

/// Ref (branch/tag) of the descriptor tree to index.
pub fn catalog_ref() -> String {
    pick(std::env::var(REF_VAR).ok(), DEFAULT_CATALOG_REF)
}

/// Comma-separated environment overlay names, if configured.
pub fn environment_filter() -> Option<String> {
    std::env::var(ENVIRONMENT_VAR)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn pick(raw: Option<String>, default: &str) -> String {
    match raw.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => v,
        _ => default.to_string(),
    }
}
