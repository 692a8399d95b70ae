//! Main orchestrator for slice preview runs.
//!
//! Sequences slice extraction and rendering, owns the per-run working
//! directory, tracks run state, and reports progress and failures to the
//! display sink.
//!
//! One orchestrator runs one pipeline at a time. Independent concurrent runs
//! use separate orchestrators; if they share a sink, their events interleave
//! with no ordering between runs and the last event delivered wins.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::{ProcessRunner, TokioProcessRunner};
use crate::display::DisplaySink;
use crate::domain::{ArtifactReference, Notification, PipelineRequest, Run, RunState};

use super::error::PipelineError;
use super::render::RenderStage;
use super::settings::PipelineSettings;
use super::slice::SliceExtractionStage;
use super::workdir::WorkingDirectory;

/// Slice -> render pipeline orchestrator
pub struct Orchestrator {
    runner: Arc<dyn ProcessRunner>,
    sink: Arc<dyn DisplaySink>,
    settings: PipelineSettings,
    state: Mutex<RunState>,
    in_flight: AtomicBool,
}

impl Orchestrator {
    /// Create an orchestrator that runs real processes
    pub fn new(settings: PipelineSettings, sink: Arc<dyn DisplaySink>) -> Self {
        Self::with_runner(Arc::new(TokioProcessRunner::new()), settings, sink)
    }

    /// Create an orchestrator with a custom process runner
    pub fn with_runner(
        runner: Arc<dyn ProcessRunner>,
        settings: PipelineSettings,
        sink: Arc<dyn DisplaySink>,
    ) -> Self {
        Self {
            runner,
            sink,
            settings,
            state: Mutex::new(RunState::Idle),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// State of the current (or most recent) run
    pub fn state(&self) -> RunState {
        *self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Execute one slice preview run.
    ///
    /// Fails fast with [`PipelineError::RunInFlight`] if this orchestrator is
    /// already running; that rejection touches neither the sink nor the state.
    #[instrument(skip(self, request), fields(line = request.target_line().get()))]
    pub async fn run(&self, request: PipelineRequest) -> Result<Run, PipelineError> {
        let _in_flight =
            InFlightGuard::acquire(&self.in_flight).ok_or(PipelineError::RunInFlight)?;

        let mut run = Run::new(Uuid::new_v4());
        info!(run_id = %run.id, "Starting slice preview");

        self.advance(&mut run, RunState::Slicing);
        self.sink.show_loading();

        let workdir = match WorkingDirectory::create(
            &self.settings.workdir_prefix,
            self.settings.temp_root.as_deref(),
        ) {
            Ok(workdir) => workdir,
            Err(e) => return Err(self.fail(&mut run, PipelineError::WorkingDirectory(e))),
        };
        run.workdir = Some(workdir.path().to_path_buf());

        match self.execute(&mut run, &request, &workdir).await {
            Ok(artifact) => {
                let locator = artifact.locator();
                let kept = workdir.persist();

                self.advance(&mut run, RunState::Succeeded);
                run.succeed(artifact);
                self.sink.show_artifact(&locator);
                self.sink.clear_log();

                info!(
                    run_id = %run.id,
                    %locator,
                    workdir = %kept.display(),
                    "Run completed successfully"
                );
                Ok(run)
            }
            Err(e) => {
                if self.settings.keep_failed_workdir {
                    let kept = workdir.persist();
                    info!(
                        run_id = %run.id,
                        workdir = %kept.display(),
                        "Keeping failed run directory"
                    );
                }
                Err(self.fail(&mut run, e))
            }
        }
    }

    /// Slice then render; render only starts once slicing has finished
    async fn execute(
        &self,
        run: &mut Run,
        request: &PipelineRequest,
        workdir: &WorkingDirectory,
    ) -> Result<ArtifactReference, PipelineError> {
        let slice = SliceExtractionStage::new(self.runner.as_ref(), &self.settings);
        let scene_path = workdir.scene_path();

        self.sink.notify(Notification::info(format!(
            "Running command: {}",
            slice.invocation(request, &scene_path)
        )));
        let scene_path = slice.run(request, &scene_path).await?;

        self.advance(run, RunState::Rendering);

        let render = RenderStage::new(self.runner.as_ref(), &self.settings, self.sink.as_ref());
        render
            .run(&scene_path, workdir.path(), request.environment())
            .await
    }

    /// Move to Failed and surface the error: a one-line notification plus the
    /// captured stderr appended to the log
    fn fail(&self, run: &mut Run, error: PipelineError) -> PipelineError {
        error!(run_id = %run.id, stage = ?error.stage(), error = %error, "Run failed");

        self.advance(run, RunState::Failed);
        run.fail(error.to_string());

        self.sink.notify(Notification::error(error.to_string()));
        if let Some(stderr) = error.stderr().filter(|s| !s.is_empty()) {
            self.sink.append_log(stderr);
        }

        error
    }

    fn advance(&self, run: &mut Run, next: RunState) {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if !state.can_advance_to(next) {
            warn!(from = ?*state, to = ?next, "Unexpected run state transition");
        }

        *state = next;
        run.state = next;
    }
}

/// Marks an orchestrator busy for the lifetime of one run
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
