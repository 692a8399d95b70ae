//! Pipeline Integration Tests
//!
//! Drives the orchestrator with a scripted process runner to check stage
//! sequencing, working-directory isolation, artifact delivery, and failure
//! reporting.

use std::io;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use slice_preview::adapters::{Invocation, OutputChunk, ProcessRunner, RunOptions, RunnerError};
use slice_preview::core::{Orchestrator, PipelineError, PipelineSettings};
use slice_preview::display::MemorySink;
use slice_preview::domain::{
    ArtifactReference, DisplayEvent, PipelineRequest, RunState, StageResult,
};
use tempfile::TempDir;
use tokio::sync::Notify;

const TRANSFORMER: &str = "/ext/python/transformer.py";
const SOURCE: &str = "from manim import *

class Intro(Scene):
    def construct(self):
        self.play(Create(Square()))
";

/// One recorded process invocation
#[derive(Debug, Clone)]
struct Call {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    input: Option<String>,
}

impl Call {
    fn is_slice(&self) -> bool {
        self.args.iter().any(|arg| arg == TRANSFORMER)
    }
}

#[derive(Debug, Clone, Copy)]
enum SliceBehavior {
    Succeed,
    ExitNonZero,
    SucceedWithoutFile,
    LaunchFailure,
}

#[derive(Debug, Clone)]
enum RenderBehavior {
    /// Exit 0 after writing these files into the quality directory
    Succeed(Vec<&'static str>),
    /// Exit 0 but create the quality directory only
    SucceedEmptyDir,
    /// Exit 0 without creating any output directory
    SucceedWithoutOutput,
    /// Exit 0 with a warning on stderr and no output directory
    SucceedWithWarning,
    /// Exit non-zero with a traceback
    ExitNonZero,
}

/// Process runner that plays the transformer and the render engine
struct ScriptedRunner {
    slice: SliceBehavior,
    renders: Mutex<Vec<RenderBehavior>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedRunner {
    fn new(slice: SliceBehavior, render: RenderBehavior) -> Arc<Self> {
        Self::with_renders(slice, vec![render])
    }

    /// Successive renders follow `renders` in order; the last one repeats
    fn with_renders(slice: SliceBehavior, renders: Vec<RenderBehavior>) -> Arc<Self> {
        Arc::new(Self {
            slice,
            renders: Mutex::new(renders),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn slice_calls(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_slice).collect()
    }

    fn render_calls(&self) -> Vec<Call> {
        self.calls().into_iter().filter(|c| !c.is_slice()).collect()
    }

    fn next_render(&self) -> RenderBehavior {
        let mut renders = self.renders.lock().unwrap();
        if renders.len() > 1 {
            renders.remove(0)
        } else {
            renders[0].clone()
        }
    }

    fn slice(
        &self,
        invocation: &Invocation,
        on_output: &(dyn Fn(OutputChunk) + Send + Sync),
    ) -> Result<StageResult, RunnerError> {
        let output_path = PathBuf::from(&invocation.args[invocation.args.len() - 2]);

        match self.slice {
            SliceBehavior::Succeed => {
                on_output(OutputChunk::Stderr("sliced\n".to_string()));
                std::fs::write(&output_path, "class Slice(Scene):\n    pass\n").unwrap();
                Ok(exit(0, "", "sliced\n"))
            }
            SliceBehavior::ExitNonZero => Ok(exit(1, "", "SyntaxError: invalid syntax\n")),
            SliceBehavior::SucceedWithoutFile => Ok(exit(0, "", "")),
            SliceBehavior::LaunchFailure => Err(RunnerError::Launch {
                command: invocation.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
            }),
        }
    }

    fn render(
        &self,
        invocation: &Invocation,
        cwd: &Path,
        on_output: &(dyn Fn(OutputChunk) + Send + Sync),
    ) -> StageResult {
        let scene = invocation.args.last().unwrap();
        let stem = Path::new(scene).file_stem().unwrap();
        let quality_dir = cwd.join("media").join("videos").join(stem).join("480p15");

        on_output(OutputChunk::Stdout("Rendering frame 1\n".to_string()));

        match self.next_render() {
            RenderBehavior::Succeed(files) => {
                std::fs::create_dir_all(quality_dir.join("partial_movie_files")).unwrap();
                for file in files {
                    std::fs::write(quality_dir.join(file), b"mp4").unwrap();
                }
                exit(0, "Rendering frame 1\n", "")
            }
            RenderBehavior::SucceedEmptyDir => {
                std::fs::create_dir_all(&quality_dir).unwrap();
                exit(0, "Rendering frame 1\n", "")
            }
            RenderBehavior::SucceedWithoutOutput => exit(0, "Rendering frame 1\n", ""),
            RenderBehavior::SucceedWithWarning => {
                on_output(OutputChunk::Stderr("ffmpeg: codec missing\n".to_string()));
                exit(0, "Rendering frame 1\n", "ffmpeg: codec missing\n")
            }
            RenderBehavior::ExitNonZero => {
                on_output(OutputChunk::Stderr("ValueError: bad color\n".to_string()));
                exit(1, "Rendering frame 1\n", "ValueError: bad color\n")
            }
        }
    }
}

fn exit(code: i32, stdout: &str, stderr: &str) -> StageResult {
    StageResult {
        exit_code: code,
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(
        &self,
        invocation: &Invocation,
        options: RunOptions,
        on_output: &(dyn Fn(OutputChunk) + Send + Sync),
    ) -> Result<StageResult, RunnerError> {
        let call = Call {
            program: invocation.program.clone(),
            args: invocation.args.clone(),
            cwd: options.cwd.clone(),
            input: options.input_text.clone(),
        };
        self.calls.lock().unwrap().push(call.clone());

        if call.is_slice() {
            self.slice(invocation, on_output)
        } else {
            let cwd = options.cwd.expect("render must run in the working directory");
            Ok(self.render(invocation, &cwd, on_output))
        }
    }
}

struct Fixture {
    temp: TempDir,
    sink: Arc<MemorySink>,
}

impl Fixture {
    fn new() -> Self {
        Self {
            temp: TempDir::new().unwrap(),
            sink: Arc::new(MemorySink::new()),
        }
    }

    fn settings(&self) -> PipelineSettings {
        PipelineSettings::default()
            .transformer(TRANSFORMER)
            .temp_root(self.temp.path())
    }

    fn orchestrator(&self, runner: Arc<ScriptedRunner>) -> Orchestrator {
        Orchestrator::with_runner(runner, self.settings(), self.sink.clone())
    }

    fn run_dirs(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.temp.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect()
    }
}

fn request(line: u32) -> PipelineRequest {
    PipelineRequest::new(SOURCE, NonZeroU32::new(line).unwrap())
}

#[tokio::test]
async fn test_render_runs_once_in_workdir_with_base_name() {
    let fixture = Fixture::new();
    let runner = ScriptedRunner::new(
        SliceBehavior::Succeed,
        RenderBehavior::Succeed(vec!["Intro.mp4"]),
    );
    let orchestrator = fixture.orchestrator(runner.clone());

    let run = orchestrator.run(request(5)).await.unwrap();
    let workdir = run.workdir.clone().unwrap();

    let slices = runner.slice_calls();
    assert_eq!(slices.len(), 1);
    assert_eq!(slices[0].program, "python");
    assert_eq!(
        slices[0].args,
        vec![
            TRANSFORMER.to_string(),
            workdir.join("temp_scene.py").to_string_lossy().into_owned(),
            "5".to_string(),
        ]
    );
    assert_eq!(slices[0].input.as_deref(), Some(SOURCE));

    let renders = runner.render_calls();
    assert_eq!(renders.len(), 1);
    assert_eq!(renders[0].program, "manim");
    assert_eq!(renders[0].cwd.as_deref(), Some(workdir.as_path()));
    assert_eq!(renders[0].args.last().unwrap(), "temp_scene.py");
    assert!(!Path::new(renders[0].args.last().unwrap()).is_absolute());
    assert!(renders[0].input.is_none());

    // Slice must finish before render starts
    let calls = runner.calls();
    assert!(calls[0].is_slice());
    assert!(!calls[1].is_slice());
}

#[tokio::test]
async fn test_single_video_is_shown() {
    let fixture = Fixture::new();
    let runner = ScriptedRunner::new(
        SliceBehavior::Succeed,
        RenderBehavior::Succeed(vec!["Intro.mp4"]),
    );
    let orchestrator = fixture.orchestrator(runner);

    let run = orchestrator.run(request(5)).await.unwrap();
    let workdir = run.workdir.clone().unwrap();
    let expected = workdir.join("media/videos/temp_scene/480p15/Intro.mp4");

    assert_eq!(run.state, RunState::Succeeded);
    assert_eq!(orchestrator.state(), RunState::Succeeded);
    assert_eq!(run.artifact.as_ref().unwrap().path(), expected.as_path());
    assert_eq!(
        fixture.sink.artifacts(),
        vec![ArtifactReference::new(&expected).locator()]
    );

    // Loading first; the artifact is followed by a log clear
    let events = fixture.sink.events();
    assert_eq!(events.first(), Some(&DisplayEvent::Loading));
    assert_eq!(
        &events[events.len() - 2..],
        &[
            DisplayEvent::artifact(ArtifactReference::new(&expected).locator()),
            DisplayEvent::LogCleared,
        ]
    );

    // Render output streamed while running
    assert!(fixture.sink.log_text().contains("Rendering frame 1"));
    assert!(fixture.sink.errors().is_empty());

    // The artifact must outlive the run
    assert!(expected.exists());
}

#[tokio::test]
async fn test_running_command_notification() {
    let fixture = Fixture::new();
    let runner = ScriptedRunner::new(
        SliceBehavior::Succeed,
        RenderBehavior::Succeed(vec!["Intro.mp4"]),
    );
    let orchestrator = fixture.orchestrator(runner);

    orchestrator.run(request(3)).await.unwrap();

    let notifications = fixture.sink.notifications();
    assert_eq!(notifications.len(), 1);
    assert!(notifications[0]
        .message
        .starts_with("Running command: python /ext/python/transformer.py"));
    assert!(notifications[0].message.ends_with(" 3"));
}

#[tokio::test]
async fn test_slice_failure_skips_render() {
    let fixture = Fixture::new();
    let runner = ScriptedRunner::new(
        SliceBehavior::ExitNonZero,
        RenderBehavior::Succeed(vec!["Intro.mp4"]),
    );
    let orchestrator = fixture.orchestrator(runner.clone());

    let err = orchestrator.run(request(5)).await.unwrap_err();

    assert!(matches!(err, PipelineError::SliceExtractionFailed { .. }));
    assert!(runner.render_calls().is_empty());
    assert_eq!(orchestrator.state(), RunState::Failed);

    // One-line notification plus the full stderr in the log
    let errors = fixture.sink.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("Slice extraction failed"));
    assert!(errors[0].contains("SyntaxError"));
    assert!(fixture.sink.log_text().contains("SyntaxError: invalid syntax"));
    assert!(fixture.sink.artifacts().is_empty());

    // Failed run directories are cleaned up
    assert!(fixture.run_dirs().is_empty());
}

#[tokio::test]
async fn test_slice_success_without_file_is_a_slice_error() {
    let fixture = Fixture::new();
    let runner = ScriptedRunner::new(
        SliceBehavior::SucceedWithoutFile,
        RenderBehavior::Succeed(vec!["Intro.mp4"]),
    );
    let orchestrator = fixture.orchestrator(runner.clone());

    let err = orchestrator.run(request(5)).await.unwrap_err();

    match err {
        PipelineError::SliceExtractionFailed { ref stderr } => {
            assert!(stderr.contains("did not write"));
            assert!(stderr.contains("temp_scene.py"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(runner.render_calls().is_empty());
}

#[tokio::test]
async fn test_launch_failure_names_command() {
    let fixture = Fixture::new();
    let runner = ScriptedRunner::new(
        SliceBehavior::LaunchFailure,
        RenderBehavior::Succeed(vec!["Intro.mp4"]),
    );
    let orchestrator = fixture.orchestrator(runner.clone());

    let err = orchestrator
        .run(request(5).with_environment(Some("envA")))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Launch { .. }));
    assert!(runner.render_calls().is_empty());

    let errors = fixture.sink.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("conda run -n envA python"));
    assert!(errors[0].contains("No such file or directory"));
}

#[tokio::test]
async fn test_render_failure_reports_stderr() {
    let fixture = Fixture::new();
    let runner = ScriptedRunner::new(SliceBehavior::Succeed, RenderBehavior::ExitNonZero);
    let orchestrator = fixture.orchestrator(runner);

    let err = orchestrator.run(request(5)).await.unwrap_err();

    assert!(matches!(err, PipelineError::RenderFailed { exit_code: 1, .. }));
    assert!(fixture.sink.artifacts().is_empty());
    assert!(fixture.sink.errors()[0].contains("ValueError: bad color"));

    // Streamed live, then appended again so it stays visible
    assert_eq!(
        fixture.sink.log_text().matches("ValueError: bad color").count(),
        2
    );
    assert_eq!(
        fixture.sink.events().last(),
        Some(&DisplayEvent::log("ValueError: bad color\n"))
    );
}

#[tokio::test]
async fn test_missing_output_dir_is_artifact_not_found() {
    let fixture = Fixture::new();
    let runner = ScriptedRunner::new(
        SliceBehavior::Succeed,
        RenderBehavior::SucceedWithoutOutput,
    );
    let orchestrator = fixture.orchestrator(runner);

    let err = orchestrator.run(request(5)).await.unwrap_err();

    assert!(matches!(err, PipelineError::ArtifactNotFound { .. }));
    assert!(fixture.sink.artifacts().is_empty());
    assert_eq!(orchestrator.state(), RunState::Failed);
}

#[tokio::test]
async fn test_missing_video_reports_render_stderr() {
    let fixture = Fixture::new();
    let runner = ScriptedRunner::new(SliceBehavior::Succeed, RenderBehavior::SucceedWithWarning);
    let orchestrator = fixture.orchestrator(runner);

    let err = orchestrator.run(request(5)).await.unwrap_err();

    match &err {
        PipelineError::ArtifactNotFound { stderr, .. } => {
            assert_eq!(stderr, "ffmpeg: codec missing\n");
        }
        other => panic!("unexpected error: {other}"),
    }

    let errors = fixture.sink.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("no video file was found"));
    assert!(errors[0].contains("ffmpeg: codec missing"));

    // Streamed live, then appended again after the error notification
    let events = fixture.sink.events();
    assert_eq!(
        events.last(),
        Some(&DisplayEvent::log("ffmpeg: codec missing\n"))
    );
    assert_eq!(
        fixture.sink.log_text().matches("ffmpeg: codec missing").count(),
        2
    );
}

#[tokio::test]
async fn test_empty_output_dir_is_artifact_not_found() {
    let fixture = Fixture::new();
    let runner = ScriptedRunner::new(SliceBehavior::Succeed, RenderBehavior::SucceedEmptyDir);
    let orchestrator = fixture.orchestrator(runner);

    let err = orchestrator.run(request(5)).await.unwrap_err();

    assert!(matches!(err, PipelineError::ArtifactNotFound { .. }));
    assert!(!fixture
        .sink
        .events()
        .iter()
        .any(|event| matches!(event, DisplayEvent::ArtifactReady { .. })));
}

#[tokio::test]
async fn test_multiple_videos_pick_first_by_name() {
    let fixture = Fixture::new();
    let runner = ScriptedRunner::new(
        SliceBehavior::Succeed,
        RenderBehavior::Succeed(vec!["Outro.mp4", "Intro.mp4"]),
    );
    let orchestrator = fixture.orchestrator(runner);

    let run = orchestrator.run(request(5)).await.unwrap();

    assert!(run.artifact.unwrap().path().ends_with("Intro.mp4"));
}

#[tokio::test]
async fn test_back_to_back_runs_are_isolated() {
    let fixture = Fixture::new();
    let runner = ScriptedRunner::with_renders(
        SliceBehavior::Succeed,
        vec![
            RenderBehavior::Succeed(vec!["Intro.mp4"]),
            RenderBehavior::SucceedWithoutOutput,
        ],
    );
    let orchestrator = fixture.orchestrator(runner.clone());

    let first = orchestrator.run(request(5)).await.unwrap();
    let second = orchestrator.run(request(5)).await.unwrap_err();

    // Run 1's video is still on disk, but run 2 never sees it
    assert!(first.artifact.unwrap().path().exists());
    assert!(matches!(second, PipelineError::ArtifactNotFound { .. }));

    let renders = runner.render_calls();
    assert_eq!(renders.len(), 2);
    assert_ne!(renders[0].cwd, renders[1].cwd);
    assert_eq!(fixture.sink.artifacts().len(), 1);
}

#[tokio::test]
async fn test_environment_prefixes_both_commands() {
    let fixture = Fixture::new();
    let runner = ScriptedRunner::new(
        SliceBehavior::Succeed,
        RenderBehavior::Succeed(vec!["Intro.mp4"]),
    );
    let orchestrator = fixture.orchestrator(runner.clone());

    let run = orchestrator
        .run(request(9).with_environment(Some("envA")))
        .await
        .unwrap();
    let scene = run.workdir.unwrap().join("temp_scene.py");

    let slice = &runner.slice_calls()[0];
    assert_eq!(slice.program, "conda");
    assert_eq!(
        slice.args,
        vec![
            "run".to_string(),
            "-n".to_string(),
            "envA".to_string(),
            "python".to_string(),
            TRANSFORMER.to_string(),
            scene.to_string_lossy().into_owned(),
            "9".to_string(),
        ]
    );

    let render = &runner.render_calls()[0];
    assert_eq!(render.program, "conda");
    assert_eq!(
        render.args,
        vec!["run", "-n", "envA", "manim", "-pql", "temp_scene.py"]
    );
}

#[tokio::test]
async fn test_no_environment_invokes_tools_directly() {
    let fixture = Fixture::new();
    let runner = ScriptedRunner::new(
        SliceBehavior::Succeed,
        RenderBehavior::Succeed(vec!["Intro.mp4"]),
    );
    let orchestrator = fixture.orchestrator(runner.clone());

    orchestrator
        .run(request(9).with_environment(Some("  ")))
        .await
        .unwrap();

    assert_eq!(runner.slice_calls()[0].program, "python");
    let render = &runner.render_calls()[0];
    assert_eq!(render.program, "manim");
    assert_eq!(render.args, vec!["-pql", "temp_scene.py"]);
}

#[tokio::test]
async fn test_keep_failed_workdir() {
    let fixture = Fixture::new();
    let runner = ScriptedRunner::new(
        SliceBehavior::ExitNonZero,
        RenderBehavior::SucceedWithoutOutput,
    );
    let orchestrator = Orchestrator::with_runner(
        runner,
        fixture.settings().keep_failed_workdir(true),
        fixture.sink.clone(),
    );

    orchestrator.run(request(5)).await.unwrap_err();

    assert_eq!(fixture.run_dirs().len(), 1);
}

#[tokio::test]
async fn test_concurrent_orchestrators_share_a_sink() {
    let fixture = Fixture::new();
    let first = fixture.orchestrator(ScriptedRunner::new(
        SliceBehavior::Succeed,
        RenderBehavior::Succeed(vec!["Intro.mp4"]),
    ));
    let second = fixture.orchestrator(ScriptedRunner::new(
        SliceBehavior::Succeed,
        RenderBehavior::Succeed(vec!["Outro.mp4"]),
    ));

    let (a, b) = tokio::join!(first.run(request(5)), second.run(request(7)));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.state, RunState::Succeeded);
    assert_eq!(b.state, RunState::Succeeded);
    assert_ne!(a.workdir, b.workdir);
    assert_eq!(fixture.run_dirs().len(), 2);

    // Both runs land on the one sink, in no fixed order between runs
    let events = fixture.sink.events();
    let loading = events
        .iter()
        .filter(|event| **event == DisplayEvent::Loading)
        .count();
    assert_eq!(loading, 2);

    let mut artifacts = fixture.sink.artifacts();
    artifacts.sort();
    let mut expected = vec![
        a.artifact.unwrap().locator(),
        b.artifact.unwrap().locator(),
    ];
    expected.sort();
    assert_eq!(artifacts, expected);
}

/// Runner that blocks until released, to hold a run in flight
struct GatedRunner {
    started: Arc<Notify>,
    release: Arc<Notify>,
}

#[async_trait]
impl ProcessRunner for GatedRunner {
    async fn run(
        &self,
        _invocation: &Invocation,
        _options: RunOptions,
        _on_output: &(dyn Fn(OutputChunk) + Send + Sync),
    ) -> Result<StageResult, RunnerError> {
        self.started.notify_one();
        self.release.notified().await;
        Ok(exit(1, "", "released\n"))
    }
}

#[tokio::test]
async fn test_second_run_on_same_orchestrator_is_rejected() {
    let fixture = Fixture::new();
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let runner = Arc::new(GatedRunner {
        started: started.clone(),
        release: release.clone(),
    });
    let orchestrator = Arc::new(Orchestrator::with_runner(
        runner,
        fixture.settings(),
        fixture.sink.clone(),
    ));

    let first = tokio::spawn({
        let orchestrator = orchestrator.clone();
        async move { orchestrator.run(request(5)).await }
    });

    started.notified().await;
    assert_eq!(orchestrator.state(), RunState::Slicing);

    let err = orchestrator.run(request(5)).await.unwrap_err();
    assert!(matches!(err, PipelineError::RunInFlight));

    release.notify_one();
    let first = first.await.unwrap();
    assert!(matches!(first, Err(PipelineError::SliceExtractionFailed { .. })));

    // The rejected run left no trace on the sink
    let loading = fixture
        .sink
        .events()
        .iter()
        .filter(|event| **event == DisplayEvent::Loading)
        .count();
    assert_eq!(loading, 1);

    // Free again once the first run finished
    release.notify_one();
    assert!(orchestrator.run(request(5)).await.is_err());
}
