//! petabtests CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pt_core::{CaseId, FormatVersion, ModelFormat};
use pt_suite::{Candidate, Driver, FailurePolicy, SuiteConfig, evaluate_case};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "petabtests")]
#[command(about = "PEtab test suite - generate and evaluate conformance cases")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    /// Suite config (YAML). Defaults to ./petabtests.yaml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the cases directory from the config.
    #[arg(long, global = true)]
    cases_dir: Option<PathBuf>,

    /// Override the default-model directory from the config.
    #[arg(long, global = true)]
    models_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate problem and solution files for every case
    Create {
        /// Stop at the first failing case instead of skipping it.
        #[arg(long)]
        fail_fast: bool,

        /// Afterwards, fail if the generated files differ from git.
        #[arg(long)]
        check: bool,

        /// Output file for the report (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete generated (`_`-prefixed) files from every case directory
    Clear,

    /// List case ids per PEtab version and model format
    List {
        /// Restrict to one PEtab version (e.g. v2.0.0)
        #[arg(long)]
        petab_version: Option<FormatVersion>,

        /// Restrict to one model format (sbml, pysb)
        #[arg(long)]
        format: Option<ModelFormat>,
    },

    /// Compare a tool's results for one case with the reference solution
    Evaluate {
        /// PEtab version of the case (e.g. v2.0.0)
        #[arg(long)]
        petab_version: FormatVersion,

        /// Model format of the case (sbml, pysb)
        #[arg(long)]
        format: ModelFormat,

        /// Case id
        #[arg(long = "case")]
        case_id: CaseId,

        /// Result manifest: chi2, llh, simulation_files (relative to it)
        #[arg(short, long)]
        result: PathBuf,

        /// Output file for the report (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print version information
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut config = SuiteConfig::load(cli.config.as_deref()).context("failed to load config")?;
    if let Some(dir) = cli.cases_dir {
        config.cases_dir = dir;
    }
    if let Some(dir) = cli.models_dir {
        config.models_dir = dir;
    }

    match cli.command {
        Commands::Create { fail_fast, check, output } => {
            if fail_fast {
                config.failure_policy = FailurePolicy::Abort;
            }
            cmd_create(config, check, output.as_ref())
        }
        Commands::Clear => cmd_clear(config),
        Commands::List { petab_version, format } => cmd_list(config, petab_version, format),
        Commands::Evaluate { petab_version, format, case_id, result, output } => {
            cmd_evaluate(config, petab_version, format, case_id, &result, output.as_ref())
        }
        Commands::Version => {
            println!("petabtests {}", pt_core::VERSION);
            Ok(())
        }
    }
}

fn write_json(output: Option<&PathBuf>, value: serde_json::Value) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&value)?)?;
    } else {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}

fn cmd_create(config: SuiteConfig, check: bool, output: Option<&PathBuf>) -> Result<()> {
    let driver = Driver::new(config)?;
    let report = driver.create()?;
    write_json(output, serde_json::to_value(&report)?)?;

    if !report.is_success() {
        anyhow::bail!("{} case(s) failed to generate", report.failed.len());
    }
    if check {
        let clean = driver.check_up_to_date().context("up-to-date check failed")?;
        if !clean {
            anyhow::bail!(
                "generated cases differ from the committed ones under {}",
                driver.config().cases_dir.display()
            );
        }
        tracing::info!("generated cases are up to date");
    }
    Ok(())
}

fn cmd_clear(config: SuiteConfig) -> Result<()> {
    let removed = Driver::new(config)?.clear()?;
    write_json(None, serde_json::json!({ "removed": removed }))
}

fn cmd_list(
    config: SuiteConfig,
    version: Option<FormatVersion>,
    format: Option<ModelFormat>,
) -> Result<()> {
    let driver = Driver::new(config)?;
    let mut suites = Vec::new();
    for &v in &driver.config().versions {
        if version.is_some_and(|want| want != v) {
            continue;
        }
        for &f in &driver.config().formats {
            if format.is_some_and(|want| want != f) {
                continue;
            }
            let ids: Vec<String> = driver.list_cases(v, f)?.iter().map(ToString::to_string).collect();
            suites.push(serde_json::json!({
                "version": v.dir_name(),
                "format": f.as_str(),
                "cases": ids,
            }));
        }
    }
    write_json(None, serde_json::Value::Array(suites))
}

fn cmd_evaluate(
    config: SuiteConfig,
    version: FormatVersion,
    format: ModelFormat,
    id: CaseId,
    result: &PathBuf,
    output: Option<&PathBuf>,
) -> Result<()> {
    let driver = Driver::new(config)?;
    let reference = driver
        .materializer()
        .load_solution(id, format, version)
        .with_context(|| format!("no reference solution for {version}/{format}/{id}"))?;
    let candidate = Candidate::read(result)
        .with_context(|| format!("failed to read result {}", result.display()))?;

    let report = evaluate_case(&candidate, &reference)?;
    tracing::info!(passed = report.passed(), distance = ?report.simulation_distance, "evaluated");

    let mut value = serde_json::to_value(&report)?;
    if let Some(obj) = value.as_object_mut() {
        obj.insert("case".to_string(), serde_json::json!(id.to_string()));
        obj.insert("version".to_string(), serde_json::json!(version.dir_name()));
        obj.insert("format".to_string(), serde_json::json!(format.as_str()));
        obj.insert("passed".to_string(), serde_json::json!(report.passed()));
    }
    write_json(output, value)?;

    if !report.passed() {
        anyhow::bail!("case {id} failed evaluation");
    }
    Ok(())
}
