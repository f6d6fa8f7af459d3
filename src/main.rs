use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::json;

use sepsis_vignette::config::{Backend, ServiceConfig, DEFAULT_MAX_CONCURRENT};
use sepsis_vignette::pipeline::{CaseInput, PipelineError, ScoreReport, ScoringPipeline};

#[derive(Parser, Debug)]
#[command(
    about = "Extract pediatric sepsis variables from case narratives and compute Phoenix scores",
    version
)]
struct Args {
    /// Narrative text file; `-` or omitted reads stdin.
    #[arg(value_name = "FILE")]
    narrative: Option<PathBuf>,

    #[arg(long = "patient-id", default_value_t = 1)]
    patient_id: i64,

    /// JSONL file of `{"patient_id": .., "narrative": ..}` cases.
    #[arg(long = "batch", value_name = "FILE", conflicts_with = "narrative")]
    batch: Option<PathBuf>,

    /// openai | ollama | rules (default: SEPSIS_BACKEND, else openai).
    #[arg(long = "backend")]
    backend: Option<Backend>,

    #[arg(long = "model")]
    model: Option<String>,

    #[arg(long = "base-url")]
    base_url: Option<String>,

    /// Seconds before an extraction call is abandoned.
    #[arg(long = "timeout")]
    timeout: Option<u64>,

    #[arg(long = "token-budget")]
    token_budget: Option<u64>,

    /// Write per-case prompts, replies and reports under this directory.
    #[arg(long = "dump-dir", value_name = "DIR")]
    dump_dir: Option<PathBuf>,

    #[arg(long = "max-concurrent", default_value_t = DEFAULT_MAX_CONCURRENT)]
    max_concurrent: usize,

    #[arg(long = "pretty", default_value_t = false)]
    pretty: bool,
}

fn main() -> Result<()> {
    sepsis_vignette::init_tracing();
    let args = Args::parse();

    let config = service_config(&args)?;
    let pipeline = ScoringPipeline::from_config(&config)
        .with_context(|| format!("Failed to configure the {} backend", config.backend))?
        .with_max_concurrent(args.max_concurrent);

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let result = match &args.batch {
        Some(path) => {
            let cases = read_batch(path)?;
            runtime.block_on(run_batch(&pipeline, cases, args.pretty))
        }
        None => {
            let narrative = read_narrative(args.narrative.as_ref())?;
            runtime.block_on(run_single(&pipeline, &narrative, args.patient_id, args.pretty))
        }
    };
    drop(runtime);
    result
}

/// Environment first, flags on top. Switching backend by flag resets the
/// endpoint and model to that backend's defaults unless given explicitly.
fn service_config(args: &Args) -> Result<ServiceConfig> {
    let mut config = ServiceConfig::from_env().context("Invalid environment configuration")?;

    if let Some(backend) = args.backend {
        if backend != config.backend {
            let defaults = ServiceConfig::for_backend(backend);
            config.backend = backend;
            config.base_url = defaults.base_url;
            config.model = defaults.model;
        }
    }
    if let Some(model) = &args.model {
        config.model = model.clone();
    }
    if let Some(url) = &args.base_url {
        config.base_url = url.clone();
    }
    if let Some(secs) = args.timeout {
        config.timeout_secs = secs;
    }
    if args.token_budget.is_some() {
        config.token_budget = args.token_budget;
    }
    if args.dump_dir.is_some() {
        config.dump_dir = args.dump_dir.clone();
    }
    Ok(config)
}

fn read_narrative(path: Option<&PathBuf>) -> Result<String> {
    match path {
        Some(p) if p.as_os_str() != "-" => std::fs::read_to_string(p)
            .with_context(|| format!("Failed to read narrative {}", p.display())),
        _ => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read narrative from stdin")?;
            Ok(text)
        }
    }
}

fn read_batch(path: &Path) -> Result<Vec<CaseInput>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open batch {}", path.display()))?;
    let mut cases = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {}", idx + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        let case: CaseInput = serde_json::from_str(&line)
            .with_context(|| format!("Invalid case on line {}", idx + 1))?;
        cases.push(case);
    }
    Ok(cases)
}

async fn run_single(
    pipeline: &ScoringPipeline,
    narrative: &str,
    patient_id: i64,
    pretty: bool,
) -> Result<()> {
    match pipeline.run(narrative, patient_id).await {
        Ok(report) => print_json(&report_json(&report), pretty),
        Err(e) => {
            if let Some(raw) = e.raw_output() {
                eprintln!("--- raw service output ---\n{raw}\n---");
            }
            Err(e).with_context(|| format!("Case {patient_id} could not be scored"))
        }
    }
}

async fn run_batch(pipeline: &ScoringPipeline, cases: Vec<CaseInput>, pretty: bool) -> Result<()> {
    let ids: Vec<i64> = cases.iter().map(|c| c.patient_id).collect();
    let results = pipeline.run_batch(cases).await;

    let mut failed = 0usize;
    for (patient_id, result) in ids.into_iter().zip(&results) {
        let value = match result {
            Ok(report) => report_json(report),
            Err(e) => {
                failed += 1;
                failure_json(patient_id, e)
            }
        };
        print_json(&value, pretty)?;
    }

    let usage = pipeline.adapter().usage();
    eprintln!("{}", serde_json::to_string(&json!({ "usage": usage }))?);

    if failed > 0 {
        bail!("{failed} of {} cases failed", results.len());
    }
    Ok(())
}

fn report_json(report: &ScoreReport) -> serde_json::Value {
    serde_json::to_value(report).unwrap_or_else(|e| json!({ "error": e.to_string() }))
}

fn failure_json(patient_id: i64, error: &PipelineError) -> serde_json::Value {
    json!({
        "patient_id": patient_id,
        "error": error.to_string(),
        "transient": error.is_transient(),
        "raw_output": error.raw_output(),
    })
}

fn print_json(value: &serde_json::Value, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    let mut out = std::io::stdout().lock();
    writeln!(out, "{text}").context("Failed to write output")?;
    Ok(())
}
