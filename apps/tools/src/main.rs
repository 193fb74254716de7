use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    time::Instant,
};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use client_core::{
    orchestrator::{run_guided_flow, GuidedRun, GuidedRunForm, RunState},
    settings::{load_settings, BaseUrlStore, SETTINGS_FILE},
    DispatchApi, DispatchClient,
};
use serde::Serialize;
use shared::scenario::Scenario;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Runs the guided end-to-end flow for each scenario in turn against a live
/// backend and writes a JSON report.
#[derive(Parser, Debug)]
struct Cli {
    #[arg(long)]
    api_base: Option<String>,
    /// Scenarios to run, in order; all three when omitted.
    #[arg(long = "scenario")]
    scenarios: Vec<Scenario>,
    /// Base form; its scenario is replaced per run.
    #[arg(long)]
    form: Option<PathBuf>,
    #[arg(long)]
    report: Option<PathBuf>,
    /// Skip the health check before the first run.
    #[arg(long)]
    no_health_check: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RunReport {
    scenario: Scenario,
    duration_ms: u128,
    run: GuidedRun,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchReport {
    api_base: String,
    started_at: DateTime<Utc>,
    passed: usize,
    failed: usize,
    runs: Vec<RunReport>,
}

fn base_form(path: Option<&PathBuf>) -> Result<GuidedRunForm> {
    let Some(path) = path else {
        return Ok(GuidedRunForm::default());
    };
    let raw = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid run form {}", path.display()))
}

async fn run_batch(
    api: &dyn DispatchApi,
    api_base: String,
    form: &GuidedRunForm,
    scenarios: &[Scenario],
) -> BatchReport {
    let mut report = BatchReport {
        api_base,
        started_at: Utc::now(),
        passed: 0,
        failed: 0,
        runs: Vec::with_capacity(scenarios.len()),
    };
    for &scenario in scenarios {
        let form = GuidedRunForm {
            scenario,
            ..form.clone()
        };
        let started = Instant::now();
        let run = run_guided_flow(api, &form).await;
        let duration_ms = started.elapsed().as_millis();
        if run.state == RunState::Sucesso {
            report.passed += 1;
            info!(%scenario, duration_ms = duration_ms as u64, summary = %run.summary(), "scenario passed");
        } else {
            report.failed += 1;
            error!(%scenario, error = run.error.as_deref().unwrap_or("-"), "scenario failed");
        }
        report.runs.push(RunReport {
            scenario,
            duration_ms,
            run,
        });
    }
    report
}

/// Writes the report to `path`, or to `stdout` when none is given. Nothing
/// else goes to `stdout`.
fn write_report(report: &BatchReport, path: Option<&Path>, stdout: &mut impl Write) -> Result<()> {
    let serialized = serde_json::to_string_pretty(report)?;
    match path {
        Some(path) => {
            fs::write(path, &serialized).with_context(|| format!("failed to write {}", path.display()))
        }
        None => {
            writeln!(stdout, "{serialized}")?;
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let early = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("warn"))
        .with_writer(io::stderr)
        .finish();
    let mut settings =
        tracing::subscriber::with_default(early, || load_settings(&PathBuf::from(SETTINGS_FILE)));
    if let Some(api_base) = cli.api_base.clone() {
        settings.api_base_url = Some(api_base);
    }
    let filter = EnvFilter::try_new(&settings.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let api_base = match BaseUrlStore::open_default() {
        Ok(store) => settings.resolve_base_url(&store),
        Err(_) => settings
            .api_base_url
            .clone()
            .unwrap_or_else(|| client_core::settings::DEFAULT_API_BASE.to_string()),
    };
    let client = DispatchClient::new(&api_base)?;
    if !cli.no_health_check {
        let health = client
            .health()
            .await
            .with_context(|| format!("backend at {api_base} is not answering"))?;
        info!(status = %health.status, "backend reachable");
    }

    let form = base_form(cli.form.as_ref())?;
    let scenarios = if cli.scenarios.is_empty() {
        Scenario::ALL.to_vec()
    } else {
        cli.scenarios.clone()
    };
    let report = run_batch(&client, api_base, &form, &scenarios).await;

    write_report(&report, cli.report.as_deref(), &mut io::stdout().lock())?;
    info!(passed = report.passed, failed = report.failed, "batch finished");
    if report.failed > 0 {
        bail!("{} of {} scenarios failed", report.failed, report.runs.len());
    }
    Ok(())
}
