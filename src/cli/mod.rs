//! Command-line interface for slice-preview.
//!
//! The CLI is the trigger: it reads a scene script and cursor line, checks
//! the language, and hands a request to the orchestrator with a terminal or
//! JSON-lines display sink.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config::{self, ResolvedConfig};
use crate::core::{Orchestrator, PipelineSettings, RenderStage, SliceExtractionStage};
use crate::display::{ConsoleSink, DisplaySink, JsonLinesSink, MemorySink, SinkFormat};
use crate::domain::{PipelineRequest, TriggerInput};

/// slice-preview - render the animation slice under the cursor
#[derive(Parser, Debug)]
#[command(name = "slice-preview")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by commands that build a pipeline
#[derive(clap::Args, Debug, Clone)]
pub struct ToolArgs {
    /// Named execution environment (overrides config)
    #[arg(short, long, env = config::ENV_ENVIRONMENT)]
    pub env: Option<String>,

    /// Transformer script path (overrides config)
    #[arg(long)]
    pub transformer: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render the slice around a line of a scene script
    Render {
        /// Scene script (reads from stdin if not provided)
        file: Option<PathBuf>,

        /// 1-based line the slice is centered on
        #[arg(short, long)]
        line: u32,

        /// Read the script from stdin
        #[arg(long)]
        stdin: bool,

        /// Language id of the script (derived from the file extension if omitted)
        #[arg(long)]
        language: Option<String>,

        /// How to display progress and results
        #[arg(short, long, value_enum, default_value_t = SinkFormat::Console)]
        format: SinkFormat,

        #[command(flatten)]
        tools: ToolArgs,
    },

    /// Print the commands a render would run, without running them
    Plan {
        /// 1-based line the slice is centered on
        #[arg(short, long)]
        line: u32,

        #[command(flatten)]
        tools: ToolArgs,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Render {
                file,
                line,
                stdin,
                language,
                format,
                tools,
            } => render(file, line, stdin, language, format, tools).await,
            Commands::Plan { line, tools } => plan(line, tools),
            Commands::Config => show_config(),
        }
    }
}

/// Apply CLI overrides on top of the resolved configuration
fn pipeline_settings(
    config: &ResolvedConfig,
    tools: &ToolArgs,
) -> (PipelineSettings, Option<String>) {
    let mut settings = config.settings.clone();
    if let Some(ref transformer) = tools.transformer {
        settings.transformer = transformer.clone();
    }

    let environment = tools.env.clone().or_else(|| config.environment.clone());
    (settings, environment)
}

/// Language id for a script path, by extension
fn language_for_path(path: &Path) -> Option<&'static str> {
    match path.extension()?.to_str()? {
        "py" | "pyw" => Some("python"),
        _ => None,
    }
}

async fn render(
    file: Option<PathBuf>,
    line: u32,
    stdin: bool,
    language: Option<String>,
    format: SinkFormat,
    tools: ToolArgs,
) -> Result<()> {
    let config = config::config()?;
    let (settings, environment) = pipeline_settings(config, &tools);

    let text = match (&file, stdin) {
        (Some(path), false) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read script: {}", path.display()))?,
        (None, _) | (_, true) => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read script from stdin")?;
            buffer
        }
    };

    let language_id = language
        .or_else(|| {
            file.as_deref()
                .and_then(language_for_path)
                .map(str::to_string)
        })
        .unwrap_or_else(|| "plaintext".to_string());

    let request = PipelineRequest::from_trigger(TriggerInput {
        text,
        line,
        language_id,
        environment,
    })?;

    let sink: Arc<dyn DisplaySink> = match format {
        SinkFormat::Console => Arc::new(ConsoleSink::new()),
        SinkFormat::Jsonl => Arc::new(JsonLinesSink::stdout()),
    };

    let orchestrator = Orchestrator::new(settings, sink);
    let run = orchestrator.run(request).await?;

    if let Some(ref artifact) = run.artifact {
        tracing::info!(run_id = %run.id, path = %artifact.path().display(), "Video ready");
    }

    Ok(())
}

fn plan(line: u32, tools: ToolArgs) -> Result<()> {
    let config = config::config()?;
    let (settings, environment) = pipeline_settings(config, &tools);

    let request = PipelineRequest::from_trigger(TriggerInput {
        text: String::new(),
        line,
        language_id: crate::domain::SUPPORTED_LANGUAGE.to_string(),
        environment,
    })?;

    // Nothing runs, so the stages only need something to hold on to
    let runner = crate::adapters::TokioProcessRunner::new();
    let sink = MemorySink::new();
    let scene_path = PathBuf::from("<workdir>").join(crate::core::SCENE_FILE_NAME);

    let slice = SliceExtractionStage::new(&runner, &settings);
    let render = RenderStage::new(&runner, &settings, &sink);

    println!("slice:  {}", slice.invocation(&request, &scene_path));
    println!(
        "render: {}  (cwd: <workdir>)",
        render.invocation(&scene_path, request.environment())
    );

    Ok(())
}

fn show_config() -> Result<()> {
    let config = config::config()?;

    println!("Configuration");
    println!("=============\n");

    match config.config_file {
        Some(ref path) => println!("Config file:  {}", path.display()),
        None => println!("Config file:  (none, using defaults)"),
    }

    let settings = &config.settings;
    println!(
        "Environment:  {}",
        config.environment.as_deref().unwrap_or("(none, direct invocation)")
    );
    println!("Launcher:     {}", settings.launcher);
    println!("Interpreter:  {}", settings.interpreter);
    println!("Transformer:  {}", settings.transformer.display());
    if settings.transformer_missing() {
        println!(
            "              warning: not found from {}; set tools.transformer \
             or SLICE_PREVIEW_TRANSFORMER to the script's absolute path",
            std::env::current_dir()
                .map(|dir| dir.display().to_string())
                .unwrap_or_else(|_| "the current directory".to_string())
        );
    }
    println!("Renderer:     {}", settings.renderer);
    println!("Workdir:      {}*", settings.workdir_prefix);
    if let Some(ref root) = settings.temp_root {
        println!("Workdir root: {}", root.display());
    }
    println!("Keep failed:  {}", settings.keep_failed_workdir);

    Ok(())
}
