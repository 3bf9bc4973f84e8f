//! Pipeline thread: the single owner of the state manager.
//!
//! Reports and idle-timer ticks arrive on one `mpsc` channel and are handled
//! strictly in order, so a batch and a timer firing never interleave.
//! Outcomes go out on a second channel.

use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;

use chrono::Utc;
use tracing::{error, info, warn};

use raidwatch_core::constants::RECENT_REPORT_WINDOW;
use raidwatch_core::events::ExpiryNotice;
use raidwatch_geo::{plan_map, GeocodeAudit, GeocodePass, GeocodingProvider, ViewComputer};
use raidwatch_state::{ExpiryTick, ExpiryTimer, StateManager, StateStore};

use crate::classifier::{Classification, Classifier, Report};
use crate::config::{MapStyling, ModelCatalog};
use crate::history::{History, MapRecord, ReportRecord};
use crate::renderer::{MapPayload, MapRenderer};

/// Classifier output recorded for entries the pipeline writes itself.
const SYSTEM_GENERATED: &str = "SYSTEM_GENERATED";
/// Map log error for a pass where no group could be geocoded.
const NO_COORDINATES: &str = "No valid coordinates";

/// Messages accepted by the pipeline thread.
#[derive(Debug)]
pub enum PipelineCommand {
    Report(Report),
    Expired(ExpiryTick),
    Shutdown,
}

impl From<ExpiryTick> for PipelineCommand {
    fn from(tick: ExpiryTick) -> Self {
        PipelineCommand::Expired(tick)
    }
}

/// Result of handling one command.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Report id was already processed recently.
    Duplicate { report_id: String },
    /// Classifier produced nothing actionable; state untouched.
    NoEvents { report_id: String },
    /// The batch resolved every tracked group.
    AllClear { report_id: String },
    Map {
        report_id: String,
        artifact: PathBuf,
        plotted: usize,
        unplottable: usize,
    },
    /// Groups remain but no map could be produced.
    NoMap { report_id: String },
    /// Idle timeout cleared the state.
    Expired { cleared: usize },
}

/// Ids of the most recently processed reports, oldest evicted first.
#[derive(Debug)]
pub struct RecentReports {
    order: VecDeque<String>,
    seen: HashSet<String>,
    capacity: usize,
}

impl RecentReports {
    pub fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    /// Remember `id`. Returns false if it was already remembered.
    pub fn insert(&mut self, id: &str) -> bool {
        if self.seen.contains(id) {
            return false;
        }
        self.seen.insert(id.to_string());
        self.order.push_back(id.to_string());
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.seen.remove(&evicted);
            }
        }
        true
    }
}

/// Collaborators the pipeline drives.
pub struct PipelineParts {
    pub classifier: Box<dyn Classifier>,
    pub geocoder: Box<dyn GeocodingProvider>,
    pub audit: Box<dyn GeocodeAudit>,
    pub renderer: Box<dyn MapRenderer>,
    pub history: Option<History>,
    pub view: ViewComputer,
    pub styling: MapStyling,
    pub models: ModelCatalog,
}

pub struct Pipeline<S: StateStore> {
    manager: StateManager<S>,
    parts: PipelineParts,
    recent: RecentReports,
}

impl<S: StateStore> Pipeline<S> {
    pub fn new(manager: StateManager<S>, parts: PipelineParts) -> Self {
        Self {
            manager,
            parts,
            recent: RecentReports::new(RECENT_REPORT_WINDOW),
        }
    }

    pub fn manager(&self) -> &StateManager<S> {
        &self.manager
    }

    pub fn handle_report(&mut self, report: &Report) -> Outcome {
        let report_id = report.id.clone();
        if !self.recent.insert(&report.id) {
            info!(report = %report_id, "Report already processed; skipping");
            return Outcome::Duplicate { report_id };
        }

        let Classification { events, raw } =
            match self.parts.classifier.classify(report, &self.manager.snapshot()) {
                Ok(classification) => classification,
                Err(e) => {
                    warn!(report = %report_id, error = %e, "Classification failed; treating as no events");
                    Classification {
                        events: Vec::new(),
                        raw: format!("CLASSIFIER_ERROR: {e}"),
                    }
                }
            };
        if let Some(history) = &self.parts.history {
            history.record_report(&ReportRecord {
                report_id: report_id.clone(),
                text: report.text.clone(),
                reply_to: report.reply_to.clone(),
                events: events.clone(),
                classifier_output: raw,
                timestamp: Utc::now(),
            });
        }

        if events.is_empty() {
            info!(report = %report_id, "No actionable events; state and timer untouched");
            return Outcome::NoEvents { report_id };
        }

        let batch = self.manager.update_state(&events);
        info!(
            report = %report_id,
            events = events.len(),
            kind = ?batch.kind,
            groups = batch.groups,
            "Applied report"
        );
        if self.manager.groups().is_empty() {
            info!(report = %report_id, "All clear; no active threats tracked");
            return Outcome::AllClear { report_id };
        }
        self.render(report_id)
    }

    /// Apply an idle-timer tick. `None` when the tick was stale.
    ///
    /// A clearing tick is recorded in the report log as a system entry
    /// holding one `landed` event per cleared group.
    pub fn handle_expiry(&mut self, tick: ExpiryTick) -> Option<Outcome> {
        let events = self.manager.landed_events();
        if !self.manager.handle_expiry(tick) {
            return None;
        }
        if let Some(history) = &self.parts.history {
            let now = Utc::now();
            history.record_report(&ReportRecord {
                report_id: format!("timeout_{}", now.timestamp_millis()),
                text: String::new(),
                reply_to: None,
                events: events.clone(),
                classifier_output: SYSTEM_GENERATED.into(),
                timestamp: now,
            });
        }
        Some(Outcome::Expired {
            cleared: events.len(),
        })
    }

    fn render(&self, report_id: String) -> Outcome {
        let parts = &self.parts;
        let pass = GeocodePass::new(report_id.clone(), parts.geocoder.as_ref(), parts.audit.as_ref());
        let Some(plan) = plan_map(self.manager.groups(), &pass, &parts.view) else {
            if let Some(history) = &parts.history {
                history.record_map(&MapRecord {
                    pass_id: report_id.clone(),
                    artifact: None,
                    objects: Vec::new(),
                    view: None,
                    error: Some(NO_COORDINATES.into()),
                    timestamp: Utc::now(),
                });
            }
            return Outcome::NoMap { report_id };
        };

        let payload = MapPayload {
            pass_id: &report_id,
            objects: &plan.objects,
            view: &plan.view,
            styling: &parts.styling,
            model_paths: &parts.models,
            generated_at: Utc::now(),
        };
        let (artifact, failure) = match parts.renderer.render(&payload) {
            Ok(path) => (Some(path), None),
            Err(e) => {
                error!(report = %report_id, error = %e, "Map rendering failed");
                (None, Some(e.to_string()))
            }
        };
        if let Some(history) = &parts.history {
            history.record_map(&MapRecord {
                pass_id: report_id.clone(),
                artifact: artifact.clone(),
                objects: plan.objects.clone(),
                view: Some(plan.view),
                error: failure,
                timestamp: Utc::now(),
            });
        }

        match artifact {
            Some(artifact) => Outcome::Map {
                report_id,
                artifact,
                plotted: plan.objects.len(),
                unplottable: plan.unplottable,
            },
            None => Outcome::NoMap { report_id },
        }
    }
}

/// Handles to a running pipeline.
pub struct PipelineHandle {
    pub commands: Sender<PipelineCommand>,
    pub outcomes: Receiver<Outcome>,
    pub notices: Receiver<ExpiryNotice>,
    pub thread: JoinHandle<()>,
}

/// Build the state manager on a fresh command channel and start the
/// pipeline thread.
pub fn spawn_pipeline<S: StateStore + 'static>(
    store: S,
    expiry: std::time::Duration,
    parts: PipelineParts,
) -> std::io::Result<PipelineHandle> {
    let (cmd_tx, cmd_rx) = mpsc::channel::<PipelineCommand>();
    let (outcome_tx, outcome_rx) = mpsc::channel::<Outcome>();
    let (notice_tx, notice_rx) = mpsc::channel::<ExpiryNotice>();

    let timer = ExpiryTimer::spawn(expiry, cmd_tx.clone())?;
    let manager = StateManager::new(store, timer, notice_tx);
    let pipeline = Pipeline::new(manager, parts);

    let thread = std::thread::Builder::new()
        .name("raidwatch-pipeline".into())
        .spawn(move || run_pipeline(pipeline, cmd_rx, outcome_tx))?;

    Ok(PipelineHandle {
        commands: cmd_tx,
        outcomes: outcome_rx,
        notices: notice_rx,
        thread,
    })
}

/// Runs until `Shutdown`. The idle timer holds a command sender for as long
/// as the pipeline owns it, so the channel never disconnects on its own.
fn run_pipeline<S: StateStore>(
    mut pipeline: Pipeline<S>,
    cmd_rx: Receiver<PipelineCommand>,
    outcome_tx: Sender<Outcome>,
) {
    for cmd in cmd_rx.iter() {
        let outcome = match cmd {
            PipelineCommand::Report(report) => Some(pipeline.handle_report(&report)),
            PipelineCommand::Expired(tick) => pipeline.handle_expiry(tick),
            PipelineCommand::Shutdown => break,
        };
        if let Some(outcome) = outcome {
            let _ = outcome_tx.send(outcome);
        }
    }
    info!("Pipeline stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use raidwatch_core::enums::Category;
    use raidwatch_core::types::GeoPoint;
    use raidwatch_geo::{GeocodeError, TracingAudit};
    use raidwatch_state::MemoryStore;

    use crate::classifier::JsonEventsClassifier;
    use crate::history::read_records;
    use crate::renderer::RenderError;

    struct Gazetteer(HashMap<&'static str, GeoPoint>);

    impl GeocodingProvider for Gazetteer {
        fn forward_geocode(
            &self,
            name: &str,
            _languages: &[&str],
            _countries: &[&str],
        ) -> Result<Vec<GeoPoint>, GeocodeError> {
            Ok(self.0.get(name).copied().into_iter().collect())
        }
    }

    #[derive(Clone, Default)]
    struct RecordingRenderer {
        rendered: Arc<Mutex<Vec<(String, usize)>>>,
        fail: bool,
    }

    impl MapRenderer for RecordingRenderer {
        fn render(&self, payload: &MapPayload<'_>) -> Result<PathBuf, RenderError> {
            if self.fail {
                return Err(RenderError::Io {
                    path: PathBuf::from("unwritable"),
                    source: std::io::Error::other("disk full"),
                });
            }
            self.rendered
                .lock()
                .unwrap()
                .push((payload.pass_id.to_string(), payload.objects.len()));
            Ok(PathBuf::from(format!("map_{}.json", payload.pass_id)))
        }
    }

    fn parts(renderer: RecordingRenderer) -> PipelineParts {
        PipelineParts {
            classifier: Box::new(JsonEventsClassifier),
            geocoder: Box::new(Gazetteer(HashMap::from([
                ("Sumy", GeoPoint::new(34.8, 50.9)),
                ("Poltava", GeoPoint::new(34.55, 49.59)),
                ("Odesa", GeoPoint::new(30.73, 46.48)),
            ]))),
            audit: Box::new(TracingAudit),
            renderer: Box::new(renderer),
            history: None,
            view: ViewComputer::default(),
            styling: MapStyling::default(),
            models: ModelCatalog::default(),
        }
    }

    fn pipeline(renderer: RecordingRenderer) -> (Pipeline<MemoryStore>, Receiver<PipelineCommand>) {
        pipeline_with(parts(renderer))
    }

    fn pipeline_with(parts: PipelineParts) -> (Pipeline<MemoryStore>, Receiver<PipelineCommand>) {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (notice_tx, _notice_rx) = mpsc::channel();
        let timer = ExpiryTimer::spawn(Duration::from_secs(3600), cmd_tx).unwrap();
        let manager = StateManager::new(MemoryStore::new(), timer, notice_tx);
        (Pipeline::new(manager, parts), cmd_rx)
    }

    fn logged_parts(renderer: RecordingRenderer, dir: &std::path::Path) -> PipelineParts {
        PipelineParts {
            history: Some(History::open(dir).unwrap()),
            ..parts(renderer)
        }
    }

    fn report(id: &str, text: &str) -> Report {
        Report {
            id: id.into(),
            text: text.into(),
            reply_to: None,
        }
    }

    const LAUNCH: &str = r#"{"events": [{"event": "launch", "details": {"quantity": 3, "item": "shahed", "from": "Sumy", "to": "Poltava"}}]}"#;

    #[test]
    fn test_report_produces_map() {
        let renderer = RecordingRenderer::default();
        let (mut pipeline, _cmds) = pipeline(renderer.clone());

        let outcome = pipeline.handle_report(&report("100", LAUNCH));

        assert_eq!(
            outcome,
            Outcome::Map {
                report_id: "100".into(),
                artifact: PathBuf::from("map_100.json"),
                plotted: 1,
                unplottable: 0,
            }
        );
        assert_eq!(*renderer.rendered.lock().unwrap(), vec![("100".to_string(), 1)]);
        assert_eq!(pipeline.manager().groups()[0].category, Category::Shahed);
    }

    #[test]
    fn test_duplicate_report_skipped() {
        let renderer = RecordingRenderer::default();
        let (mut pipeline, _cmds) = pipeline(renderer.clone());
        pipeline.handle_report(&report("100", LAUNCH));

        let outcome = pipeline.handle_report(&report("100", LAUNCH));
        assert_eq!(outcome, Outcome::Duplicate { report_id: "100".into() });
        assert_eq!(pipeline.manager().groups().len(), 1);
        assert_eq!(renderer.rendered.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_no_events_leaves_timer_alone() {
        let (mut pipeline, _cmds) = pipeline(RecordingRenderer::default());
        pipeline.handle_report(&report("1", LAUNCH));
        let generation = pipeline.manager().generation();

        let outcome = pipeline.handle_report(&report("2", "stay safe"));
        assert_eq!(outcome, Outcome::NoEvents { report_id: "2".into() });
        assert_eq!(pipeline.manager().generation(), generation);

        let outcome = pipeline.handle_report(&report("3", r#"{"events": []}"#));
        assert_eq!(outcome, Outcome::NoEvents { report_id: "3".into() });
    }

    #[test]
    fn test_landing_everything_is_all_clear() {
        let renderer = RecordingRenderer::default();
        let (mut pipeline, _cmds) = pipeline(renderer.clone());
        pipeline.handle_report(&report("1", LAUNCH));

        let outcome = pipeline.handle_report(&report(
            "2",
            r#"{"events": [{"event": "landed", "details": {"item": "shahed", "location": "Poltava"}}]}"#,
        ));
        assert_eq!(outcome, Outcome::AllClear { report_id: "2".into() });
        assert_eq!(renderer.rendered.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_unplottable_state_is_no_map() {
        let (mut pipeline, _cmds) = pipeline(RecordingRenderer::default());
        let outcome = pipeline.handle_report(&report(
            "1",
            r#"{"events": [{"event": "launch", "details": {"item": "rocket", "from": "Atlantis", "to": "Lemuria"}}]}"#,
        ));
        assert_eq!(outcome, Outcome::NoMap { report_id: "1".into() });
        assert_eq!(pipeline.manager().groups().len(), 1);
    }

    #[test]
    fn test_unplottable_pass_logs_failure_marker() {
        let dir = tempfile::tempdir().unwrap();
        let (mut pipeline, _cmds) = pipeline_with(logged_parts(RecordingRenderer::default(), dir.path()));
        let outcome = pipeline.handle_report(&report(
            "1",
            r#"{"events": [{"event": "launch", "details": {"item": "rocket", "from": "Atlantis", "to": "Lemuria"}}]}"#,
        ));
        assert_eq!(outcome, Outcome::NoMap { report_id: "1".into() });

        let maps: Vec<MapRecord> = read_records(&dir.path().join("maps.jsonl")).unwrap();
        assert_eq!(maps.len(), 1);
        assert_eq!(maps[0].pass_id, "1");
        assert_eq!(maps[0].artifact, None);
        assert_eq!(maps[0].view, None);
        assert_eq!(maps[0].error.as_deref(), Some("No valid coordinates"));
    }

    #[test]
    fn test_rendered_and_failed_passes_are_logged() {
        let dir = tempfile::tempdir().unwrap();
        let (mut pipeline, _cmds) = pipeline_with(logged_parts(RecordingRenderer::default(), dir.path()));
        pipeline.handle_report(&report("1", LAUNCH));

        let failing = RecordingRenderer {
            fail: true,
            ..Default::default()
        };
        let (mut pipeline, _cmds) = pipeline_with(logged_parts(failing, dir.path()));
        pipeline.handle_report(&report("2", LAUNCH));

        let maps: Vec<MapRecord> = read_records(&dir.path().join("maps.jsonl")).unwrap();
        assert_eq!(maps.len(), 2);
        assert_eq!(maps[0].artifact, Some(PathBuf::from("map_1.json")));
        assert_eq!(maps[0].error, None);
        assert_eq!(maps[0].objects.len(), 1);
        assert!(maps[0].view.is_some());
        assert_eq!(maps[1].artifact, None);
        assert!(maps[1].error.as_deref().unwrap().contains("disk full"));
        assert!(maps[1].view.is_some());
    }

    #[test]
    fn test_render_failure_is_no_map() {
        let renderer = RecordingRenderer {
            fail: true,
            ..Default::default()
        };
        let (mut pipeline, _cmds) = pipeline(renderer);
        let outcome = pipeline.handle_report(&report("1", LAUNCH));
        assert_eq!(outcome, Outcome::NoMap { report_id: "1".into() });
    }

    #[test]
    fn test_expiry_through_pipeline() {
        let (mut pipeline, _cmds) = pipeline(RecordingRenderer::default());
        pipeline.handle_report(&report("1", LAUNCH));

        let stale = ExpiryTick {
            generation: pipeline.manager().generation() - 1,
        };
        assert_eq!(pipeline.handle_expiry(stale), None);

        let current = ExpiryTick {
            generation: pipeline.manager().generation(),
        };
        assert_eq!(pipeline.handle_expiry(current), Some(Outcome::Expired { cleared: 1 }));
        assert!(pipeline.manager().groups().is_empty());
    }

    #[test]
    fn test_expiry_is_logged_as_system_report() {
        let dir = tempfile::tempdir().unwrap();
        let (mut pipeline, _cmds) = pipeline_with(logged_parts(RecordingRenderer::default(), dir.path()));
        pipeline.handle_report(&report("1", LAUNCH));

        let stale = ExpiryTick {
            generation: pipeline.manager().generation() - 1,
        };
        pipeline.handle_expiry(stale);
        let current = ExpiryTick {
            generation: pipeline.manager().generation(),
        };
        pipeline.handle_expiry(current);

        let reports: Vec<ReportRecord> = read_records(&dir.path().join("reports.jsonl")).unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].report_id, "1");
        let timeout = &reports[1];
        assert!(timeout.report_id.starts_with("timeout_"));
        assert_eq!(timeout.classifier_output, "SYSTEM_GENERATED");
        assert_eq!(
            timeout.events,
            vec![raidwatch_core::events::Event::landed(3, Category::Shahed, "Poltava")]
        );
    }

    #[test]
    fn test_recent_reports_window() {
        let mut recent = RecentReports::new(2);
        assert!(recent.insert("a"));
        assert!(recent.insert("b"));
        assert!(!recent.insert("a"));
        assert!(recent.insert("c"));
        // "a" fell out of the window.
        assert!(recent.insert("a"));
        assert!(!recent.insert("c"));
    }

    #[test]
    fn test_spawned_pipeline_expires_idle_state() {
        let handle = spawn_pipeline(
            MemoryStore::new(),
            Duration::from_millis(200),
            parts(RecordingRenderer::default()),
        )
        .unwrap();

        handle
            .commands
            .send(PipelineCommand::Report(report("1", LAUNCH)))
            .unwrap();
        let first = handle.outcomes.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(first, Outcome::Map { .. }));

        let second = handle.outcomes.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(second, Outcome::Expired { cleared: 1 });
        let notice = handle.notices.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(notice.events, vec![raidwatch_core::events::Event::landed(3, Category::Shahed, "Poltava")]);

        handle.commands.send(PipelineCommand::Shutdown).unwrap();
        handle.thread.join().unwrap();
    }
}
