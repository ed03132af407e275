use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use booster_catalog::{
    config, Booster, BoosterCatalog, CatalogError, ContentFetcher, LocalDescriptorSource,
    LocalMetadataSource,
};
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "booster-cat")]
#[command(about = "Index and inspect booster catalogs", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for output)
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List the entries of a catalog tree
    List(ListArgs),

    /// Check a catalog tree for incomplete or broken entries
    Validate(ValidateArgs),
}

#[derive(Args)]
struct CatalogArgs {
    /// Path to the root of the descriptor tree
    catalog: PathBuf,

    /// Classification metadata document (defaults to metadata.json
    /// under the catalog root, when present)
    #[arg(long)]
    metadata: Option<PathBuf>,

    /// Comma-separated environment overlay names to apply
    /// (defaults to BOOSTER_CATALOG_ENVIRONMENT)
    #[arg(long)]
    environment: Option<String>,
}

#[derive(Args)]
struct ListArgs {
    #[command(flatten)]
    catalog: CatalogArgs,

    /// Include entries marked as ignored
    #[arg(long)]
    all: bool,

    /// Output entries as a JSON array instead of a table
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ValidateArgs {
    #[command(flatten)]
    catalog: CatalogArgs,
}

/// The CLI only inspects descriptor trees; booster content is never
/// materialized.
struct NoContentFetcher;

#[async_trait]
impl ContentFetcher for NoContentFetcher {
    async fn fetch(&self, booster: &Booster) -> booster_catalog::Result<PathBuf> {
        Err(CatalogError::Fetch(format!(
            "content fetching is not available for '{}'",
            booster.id()
        )))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Stderr)
        .init();

    match cli.command {
        Commands::List(args) => run_list(args).await,
        Commands::Validate(args) => run_validate(args).await,
    }
}

/// Indexed catalog plus whether a classification document was found.
async fn build_catalog(args: &CatalogArgs) -> Result<(BoosterCatalog, bool)> {
    let mut builder = BoosterCatalog::builder()
        .source(LocalDescriptorSource::new(&args.catalog))
        .fetcher(NoContentFetcher);

    let metadata = args
        .metadata
        .clone()
        .or_else(|| default_metadata_path(&args.catalog));
    let has_metadata = metadata.is_some();
    if let Some(path) = metadata {
        log::debug!("Using classification metadata from {}", path.display());
        builder = builder.metadata_source(LocalMetadataSource::new(path));
    }

    if let Some(environment) = args.environment.clone().or_else(config::environment_filter) {
        builder = builder.environment(environment);
    }

    let catalog = builder.build()?;
    catalog
        .index()
        .await
        .map_err(|e| anyhow::anyhow!(e))
        .with_context(|| format!("Failed to index catalog at {}", args.catalog.display()))?;
    Ok((catalog, has_metadata))
}

fn default_metadata_path(catalog_root: &Path) -> Option<PathBuf> {
    let path = catalog_root.join("metadata.json");
    path.is_file().then_some(path)
}

async fn run_list(args: ListArgs) -> Result<()> {
    let (catalog, _) = build_catalog(&args.catalog).await?;
    let snapshot = catalog.snapshot();
    let boosters: Vec<&Booster> = snapshot
        .values()
        .filter(|b| args.all || !b.is_ignore())
        .collect();

    if args.json {
        let exported: Vec<_> = boosters.iter().map(|b| b.exportable_data()).collect();
        println!("{}", serde_json::to_string_pretty(&exported)?);
        return Ok(());
    }

    for booster in &boosters {
        let taxonomy = [
            booster.mission().map(|m| m.id.as_str()),
            booster.runtime().map(|r| r.id.as_str()),
            booster.version().map(|v| v.id.as_str()),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join("/");
        println!("{}\t{}\t{}", booster.id(), taxonomy, booster.name());
    }
    log::info!("{} boosters listed", boosters.len());
    Ok(())
}

async fn run_validate(args: ValidateArgs) -> Result<()> {
    let (catalog, has_metadata) = build_catalog(&args.catalog).await?;
    let snapshot = catalog.snapshot();

    let mut problem_count = 0usize;
    for booster in snapshot.values() {
        let problems = entry_problems(booster, has_metadata);
        problem_count += problems.len();
        for problem in problems {
            println!("{}: {problem}", booster.id());
        }
    }

    if problem_count > 0 {
        log::error!(
            "Found {problem_count} problem(s) across {} boosters",
            snapshot.len()
        );
        std::process::exit(1);
    }
    log::info!("All {} boosters are valid", snapshot.len());
    Ok(())
}

/// Everything worth flagging about one entry: incomplete descriptor
/// fields and, when a classification document was available, taxonomy
/// ids that resolved to placeholders.
fn entry_problems(booster: &Booster, check_taxonomy: bool) -> Vec<String> {
    let mut problems = Vec::new();

    if !booster.data().contains_key("name") {
        problems.push("missing 'name'".to_string());
    }
    if !booster.data().contains_key("description") {
        problems.push("missing 'description'".to_string());
    }
    if booster.git_repo().is_none() {
        problems.push("missing 'source/git/url'".to_string());
    }
    if !check_taxonomy {
        return problems;
    }

    // A placeholder category means the declared id had no match in
    // the classification metadata.
    if let Some(mission) = booster.mission() {
        if mission.name == mission.id && mission.description.is_none() {
            problems.push(format!("unknown mission '{}'", mission.id));
        }
    }
    if let Some(runtime) = booster.runtime() {
        if runtime.name == runtime.id && runtime.description.is_none() {
            problems.push(format!("unknown runtime '{}'", runtime.id));
        }
    }

    problems
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn booster(value: serde_json::Value) -> Booster {
        Booster::from_data(value.as_object().cloned().unwrap())
    }

    #[test]
    fn complete_entry_has_no_problems() {
        let b = booster(serde_json::json!({
            "name": "Foo",
            "description": "A booster",
            "source": {"git": {"url": "https://example.com/foo.git"}}
        }));

        assert_eq!(entry_problems(&b, true), Vec::<String>::new());
    }

    #[test]
    fn incomplete_entry_is_flagged_per_field() {
        let b = booster(serde_json::json!({"metadata": {}}));

        assert_eq!(
            entry_problems(&b, false),
            vec![
                "missing 'name'".to_string(),
                "missing 'description'".to_string(),
                "missing 'source/git/url'".to_string(),
            ]
        );
    }
}
