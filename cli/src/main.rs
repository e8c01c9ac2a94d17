use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use store_ladder_catalog::{
    LadderConfig, MAPPING_SUFFIX, ResourceDirectory, SOURCE_EXTENSION, compile_all,
};
use store_ladder_engine::{
    MigrationExecutor, MigrationOutcome, Migrator, TransformationResolver, VersionCatalog,
    default_scratch_dir,
};
use store_ladder_sqlite::{SqliteBackend, SqliteStore};
use tracing::debug;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "ladder.yml";

#[derive(Debug, Parser)]
#[command(name = "store-ladder")]
#[command(about = "Progressive schema migration for on-disk stores")]
struct Cli {
    /// Log engine progress at debug level (RUST_LOG overrides).
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the store's detected version and whether it needs migrating.
    Status(ConfigArgs),
    /// List the migration steps without touching the store.
    Plan(ConfigArgs),
    /// Migrate the store to the latest model version.
    Migrate(ConfigArgs),
    /// Compile source models into the precompiled artifact form.
    Compile(CompileArgs),
    /// Create an empty store at a model version.
    Init(InitArgs),
}

#[derive(Debug, Args)]
struct ConfigArgs {
    /// Path to the ladder configuration file.
    #[arg(long, default_value = DEFAULT_CONFIG)]
    config: PathBuf,
}

#[derive(Debug, Args)]
struct CompileArgs {
    /// Source model files and/or directories containing them.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
    /// Output directory (default: the configured model directory).
    #[arg(long)]
    output: Option<PathBuf>,
    /// Path to the ladder configuration file.
    #[arg(long, default_value = DEFAULT_CONFIG)]
    config: PathBuf,
}

#[derive(Debug, Args)]
struct InitArgs {
    /// Model version to create the store at (default: latest).
    #[arg(long)]
    version: Option<u32>,
    /// Path to the ladder configuration file.
    #[arg(long, default_value = DEFAULT_CONFIG)]
    config: PathBuf,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::Status(args) => run_status(args),
        Command::Plan(args) => run_plan(args),
        Command::Migrate(args) => run_migrate(args),
        Command::Compile(args) => run_compile(args),
        Command::Init(args) => run_init(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

// ---------------------------------------------------------------------------
// status / plan / migrate
// ---------------------------------------------------------------------------

fn run_status(args: ConfigArgs) -> Result<(), String> {
    let config = load_config(&args.config)?;
    let migrator = build_migrator(&config)?;
    let catalog = migrator.catalog();

    println!("Store: {}", config.store_path.display());
    println!(
        "Catalog: {} version(s), latest {}",
        catalog.versions().len(),
        catalog.latest_version()
    );
    let check = migrator.check().map_err(|e| e.to_string())?;
    println!("Status: {check}");
    Ok(())
}

fn run_plan(args: ConfigArgs) -> Result<(), String> {
    let config = load_config(&args.config)?;
    let migrator = build_migrator(&config)?;

    let steps = migrator.plan().map_err(|e| e.to_string())?;
    if steps.is_empty() {
        let check = migrator.check().map_err(|e| e.to_string())?;
        println!("Nothing to migrate ({check}).");
        return Ok(());
    }

    println!("Migration plan ({} step(s)):", steps.len());
    for step in &steps {
        println!(
            "  {} -> {} ({} mapping, {} entity mapping(s))",
            step.source_version(),
            step.destination_version(),
            step.origin().as_str(),
            step.mapping().entity_mappings.len()
        );
    }
    Ok(())
}

fn run_migrate(args: ConfigArgs) -> Result<(), String> {
    let config = load_config(&args.config)?;
    let migrator = build_migrator(&config)?;

    let report = match migrator.migrate().map_err(|e| e.to_string())? {
        MigrationOutcome::NotNeeded(check) => {
            println!("Nothing to migrate ({check}).");
            return Ok(());
        }
        MigrationOutcome::Migrated(report) => report,
    };

    println!(
        "Migrated '{}' from version {} to {} in {} ms.",
        config.store_path.display(),
        report.from_version,
        report.to_version,
        report.duration_ms
    );
    for step in &report.steps {
        println!("  step {} -> {}: {} ms", step.from, step.to, step.duration_ms);
    }
    if !report.warnings.is_empty() {
        eprintln!("{} warning(s) emitted during migration:", report.warnings.len());
        for warning in &report.warnings {
            eprintln!("  {warning}");
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// compile / init
// ---------------------------------------------------------------------------

fn run_compile(args: CompileArgs) -> Result<(), String> {
    let output = match args.output {
        Some(output) => output,
        None => load_config(&args.config)?.model_directory,
    };
    let paths = collect_model_paths(&args.inputs)?;

    let results = compile_all(&paths, &output);
    let mut failures = Vec::new();
    for (input, result) in &results {
        match result {
            Ok(path) => debug!(input = %input.display(), output = %path.display(), "compiled"),
            Err(err) => failures.push(format!("{}: {err}", input.display())),
        }
    }

    println!(
        "Compiled {} of {} model(s) into '{}'.",
        results.len() - failures.len(),
        results.len(),
        output.display()
    );
    if failures.is_empty() {
        Ok(())
    } else {
        Err(format!(
            "{} model(s) failed to compile:\n  {}",
            failures.len(),
            failures.join("\n  ")
        ))
    }
}

fn run_init(args: InitArgs) -> Result<(), String> {
    let config = load_config(&args.config)?;
    let catalog = load_catalog(&config)?;
    let version = match args.version {
        Some(number) => catalog
            .version(number)
            .ok_or_else(|| format!("Version {number} is not in the catalog"))?,
        None => catalog.latest_version(),
    };

    if let Some(parent) = config.store_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|err| {
                format!("Failed to create store directory '{}': {err}", parent.display())
            })?;
        }
    }

    SqliteStore::create(&config.store_path, version.model())
        .and_then(SqliteStore::close)
        .map_err(|e| format!("Failed to create store: {e}"))?;
    println!(
        "Created store '{}' at {version}.",
        config.store_path.display()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn load_config(path: &Path) -> Result<LadderConfig, String> {
    LadderConfig::load(path)
        .map_err(|err| format!("Failed to load config '{}': {err}", path.display()))
}

fn load_catalog(config: &LadderConfig) -> Result<VersionCatalog, String> {
    let resources = ResourceDirectory::new(&config.model_directory);
    VersionCatalog::load(&resources, &config.model_name, config.latest_version)
        .map_err(|e| e.to_string())
}

fn build_migrator(
    config: &LadderConfig,
) -> Result<Migrator<ResourceDirectory, SqliteBackend>, String> {
    let catalog = load_catalog(config)?;

    let mut resolver = TransformationResolver::new(ResourceDirectory::new(&config.model_directory));
    if let Some(namespace) = &config.namespace {
        resolver = resolver.with_namespace(namespace);
    }
    let scratch = config
        .scratch_directory
        .clone()
        .unwrap_or_else(default_scratch_dir);

    Ok(Migrator::new(config.store_handle(), catalog, resolver, SqliteBackend::new())
        .with_executor(MigrationExecutor::new(scratch)))
}

/// Expands inputs into the source model files to compile, skipping mapping files.
fn collect_model_paths(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, String> {
    let is_model = |path: &Path| {
        path.extension() == Some(OsStr::new(SOURCE_EXTENSION))
            && !path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(MAPPING_SUFFIX))
    };

    let mut paths = BTreeSet::new();
    for input in inputs {
        if input.is_dir() {
            let entries = fs::read_dir(input)
                .map_err(|err| format!("Failed to read '{}': {err}", input.display()))?;
            for entry in entries {
                let path = entry
                    .map_err(|err| format!("Failed to read '{}': {err}", input.display()))?
                    .path();
                if is_model(&path) {
                    paths.insert(path);
                }
            }
            continue;
        }

        if input.is_file() {
            if !is_model(input) {
                return Err(format!(
                    "Model file '{}' must end in .{SOURCE_EXTENSION}",
                    input.display()
                ));
            }
            paths.insert(input.clone());
            continue;
        }

        return Err(format!("Model path '{}' does not exist", input.display()));
    }

    if paths.is_empty() {
        return Err("No source models found in the given inputs".to_string());
    }
    Ok(paths.into_iter().collect())
}

