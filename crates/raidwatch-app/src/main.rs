//! Reads newline-delimited JSON reports from stdin and runs them through
//! the pipeline:
//!
//! ```text
//! {"id": "1042", "text": "{\"events\": [...]}", "reply_to": null}
//! ```

use std::io::{self, BufRead};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use raidwatch_app::classifier::{JsonEventsClassifier, Report};
use raidwatch_app::config::{AppConfig, Args};
use raidwatch_app::history::History;
use raidwatch_app::notify::{spawn_notice_sink, LogNoticeSink};
use raidwatch_app::pipeline::{spawn_pipeline, Outcome, PipelineCommand, PipelineParts};
use raidwatch_app::renderer::JsonPayloadRenderer;
use raidwatch_geo::{JsonlAudit, MapTilerProvider, ViewComputer};
use raidwatch_state::JsonFileStore;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_args(Args::parse()).context("invalid configuration")?;

    let geocoder = MapTilerProvider::new(config.maptiler_key.clone())
        .context("failed to build geocoding client")?;
    let audit = JsonlAudit::open(&config.audit_file)
        .with_context(|| format!("failed to open audit log {}", config.audit_file.display()))?;
    let history = History::open(&config.artifacts_dir)
        .with_context(|| format!("failed to open history in {}", config.artifacts_dir.display()))?;

    let parts = PipelineParts {
        classifier: Box::new(JsonEventsClassifier),
        geocoder: Box::new(geocoder),
        audit: Box::new(audit),
        renderer: Box::new(JsonPayloadRenderer::new(&config.artifacts_dir)),
        history: Some(history),
        view: ViewComputer::new(config.view.clone()),
        styling: config.styling.clone(),
        models: config.models.clone(),
    };
    let pipeline = spawn_pipeline(JsonFileStore::new(&config.state_file), config.expiry, parts)
        .context("failed to start pipeline")?;
    let notices = spawn_notice_sink(pipeline.notices, LogNoticeSink)?;
    let outcomes_rx = pipeline.outcomes;
    let outcomes = std::thread::Builder::new()
        .name("raidwatch-outcomes".into())
        .spawn(move || outcomes_rx.iter().for_each(|o| log_outcome(&o)))?;

    info!(
        state = %config.state_file.display(),
        expiry_secs = config.expiry.as_secs(),
        "RAIDWATCH started; reading reports from stdin"
    );

    for line in io::stdin().lock().lines() {
        let line = line.context("failed to read stdin")?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Report>(&line) {
            Ok(report) => pipeline
                .commands
                .send(PipelineCommand::Report(report))
                .map_err(|_| anyhow!("pipeline stopped unexpectedly"))?,
            Err(e) => warn!(error = %e, "Skipping unreadable report line"),
        }
    }

    info!("Input closed; shutting down");
    let _ = pipeline.commands.send(PipelineCommand::Shutdown);
    drop(pipeline.commands);
    for (name, thread) in [("pipeline", pipeline.thread), ("outcomes", outcomes), ("notices", notices)] {
        thread.join().map_err(|_| anyhow!("{name} thread panicked"))?;
    }
    Ok(())
}

fn log_outcome(outcome: &Outcome) {
    match outcome {
        Outcome::Map {
            report_id,
            artifact,
            plotted,
            unplottable,
        } => info!(
            report = %report_id,
            artifact = %artifact.display(),
            plotted,
            unplottable,
            "Map ready"
        ),
        Outcome::AllClear { report_id } => {
            info!(report = %report_id, "Status update: all clear, no active threats tracked")
        }
        Outcome::NoMap { report_id } => {
            warn!(report = %report_id, "No map and not an all-clear; nothing to publish")
        }
        Outcome::Expired { cleared } => info!(cleared, "Idle timeout: airspace clear"),
        Outcome::Duplicate { .. } | Outcome::NoEvents { .. } => {}
    }
}
