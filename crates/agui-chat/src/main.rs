//! Sends one prompt to an OpenAI-compatible backend and prints the streamed reply.

mod config;
mod observability;
mod transcript;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use agui_stream::vendors::openai::OpenAiSource;
use agui_stream::{EventSequencer, Message, RunId, RunInput, ThreadId};
use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt as _;

use crate::config::AppConfig;
use crate::observability::LogOptions;
use crate::transcript::Transcript;

const DEFAULT_PROMPT: &str = "What can you tell me about the Agent User Interaction Protocol? Please response in Traditional Chinese.";

#[derive(Parser, Debug)]
#[command(name = "agui-chat")]
#[command(version)]
#[command(about = "Stream a chat completion as AG-UI events")]
struct Cli {
    /// Prompt sent as the user message
    #[arg(default_value = DEFAULT_PROMPT)]
    prompt: String,

    /// Run identifier echoed in RUN_STARTED / RUN_FINISHED
    #[arg(long, value_name = "ID", default_value = "run1")]
    run_id: String,

    /// Thread identifier (generated when omitted)
    #[arg(long, value_name = "ID")]
    thread_id: Option<String>,

    /// Optional system prompt placed before the user message
    #[arg(long)]
    system: Option<String>,

    /// Model name (overrides OPENAI_MODEL)
    #[arg(long)]
    model: Option<String>,

    /// API key (overrides OPENAI_API_KEY; `ollama` selects a local server)
    #[arg(long)]
    api_key: Option<String>,

    #[command(flatten)]
    log: LogArgs,
}

/// Diagnostics flags; logs never go to stdout.
#[derive(clap::Args, Debug, Clone, Default)]
struct LogArgs {
    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,

    /// Write logs as JSON lines to this file instead of stderr
    #[arg(long, value_name = "PATH", env = "AGUI_JSON_LOG_PATH")]
    log_json: Option<PathBuf>,
}

impl From<&LogArgs> for LogOptions {
    fn from(args: &LogArgs) -> Self {
        LogOptions {
            verbosity: args.verbose,
            quiet: args.quiet,
            json_path: args.log_json.clone(),
        }
    }
}

impl Cli {
    fn history(&self) -> Vec<Message> {
        let mut history = Vec::with_capacity(2);
        if let Some(system) = self.system.as_deref().filter(|s| !s.trim().is_empty()) {
            history.push(Message::system("0", system));
        }
        history.push(Message::user("1", self.prompt.as_str()));
        history
    }

    fn run_input(&self) -> Result<RunInput> {
        let mut input = RunInput::new(RunId::parse(self.run_id.as_str())?);
        if let Some(thread_id) = &self.thread_id {
            input = input.thread_id(ThreadId::parse(thread_id.as_str())?);
        }
        Ok(input)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    config::load_env();
    let cli = Cli::parse();
    let _log_guard = match observability::init_observability(&LogOptions::from(&cli.log)) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("agui-chat: logging disabled: {err:#}");
            None
        }
    };

    match run(cli).await {
        Ok(message) => {
            println!("{message}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "run failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<String> {
    let config = AppConfig::resolve(cli.model.clone(), cli.api_key.clone())?;
    let source = OpenAiSource::new(config.client).context("building completion source")?;
    let sequencer = EventSequencer::builder(Arc::new(source))
        .model(config.model)
        .messages(cli.history())
        .build()?;

    let input = cli.run_input()?;
    let mut events = sequencer.start(input);
    tracing::info!(run_id = %events.run_id(), model = %sequencer.model(), "run started");

    let abort = events.abort_handle();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, aborting run");
            abort.abort();
        }
    });

    let mut transcript = Transcript::new();
    let mut finished = false;
    while let Some(item) = events.next().await {
        match item {
            Ok(event) => {
                tracing::debug!(kind = event.kind().as_str(), "event");
                transcript.push(&event);
                finished |= event.is_terminal();
            }
            Err(failure) => {
                transcript.reset();
                ctrl_c.abort();
                return Err(failure).context("stream failed");
            }
        }
    }
    ctrl_c.abort();

    if !finished {
        transcript.reset();
        anyhow::bail!("run cancelled before completion");
    }

    tracing::info!(fragments = transcript.fragments(), "stream complete");
    Ok(transcript.take())
}
