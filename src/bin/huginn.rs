//! huginn: prompt assistant CLI
//!
//! Runs the orchestrator against the providers in the configuration file
//! and prints each result as JSON.

use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use huginn::config::Config;
use huginn::version::BuildInfo;
use huginn::{ClarifyingAnswer, FieldContext, Huginn};
use serde::Serialize;
use tracing::info;

/// Huginn prompt assistant
#[derive(Parser)]
#[command(name = "huginn")]
#[command(version = huginn::version::PKG_VERSION)]
#[command(about = "Analyse and improve prompts with a local language model")]
struct Args {
    /// Config file (default: ~/.huginn/config.toml, then /etc/huginn/config.toml)
    #[arg(short, long, env = "HUGINN_CONFIG")]
    config: Option<PathBuf>,

    /// Type of the field the prompt was typed into
    #[arg(long, global = true, default_value = "textarea")]
    field_type: String,

    /// Placeholder text of the field
    #[arg(long, global = true)]
    placeholder: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show providers, the active selection and cache state
    Status,

    /// Show build information
    Version,

    /// Analyse a prompt for vagueness
    Analyze {
        /// Prompt text (or omit to read from stdin)
        prompt: Option<String>,
    },

    /// Generate clarifying questions for a prompt
    Questions {
        /// Prompt text (or omit to read from stdin)
        prompt: Option<String>,
    },

    /// Rewrite a prompt using answers to clarifying questions
    Optimize {
        /// Prompt text (or omit to read from stdin)
        prompt: Option<String>,
        /// Answered question as "question=answer" (repeatable)
        #[arg(short, long = "answer", value_parser = parse_answer)]
        answers: Vec<ClarifyingAnswer>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: huginn=info; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("huginn=info")),
        )
        .init();

    let args = Args::parse();
    info!(version = %BuildInfo::current(), "huginn starting");
    let config = Config::load(args.config.as_deref())?;
    let assistant = Huginn::builder().from_config(&config).build()?;

    let mut progress = assistant.subscribe_progress();
    let reporter = tokio::spawn(async move {
        while let Ok(event) = progress.recv().await {
            info!(
                provider = %event.provider,
                percent = (event.loaded * 100.0).round() as u32,
                "downloading model"
            );
        }
    });

    let mut field = FieldContext::new(args.field_type);
    if let Some(placeholder) = args.placeholder {
        field = field.placeholder(placeholder);
    }

    let outcome = match args.command {
        Command::Status => print_json(&assistant.status().await),
        Command::Version => print_json(&BuildInfo::current()),
        Command::Analyze { prompt } => {
            let prompt = resolve_text(prompt, "analyze")?;
            match assistant.analyze_prompt(&prompt, &field).await {
                Ok(result) => print_json(&result),
                Err(e) => Err(e.into()),
            }
        }
        Command::Questions { prompt } => {
            let prompt = resolve_text(prompt, "questions")?;
            match assistant.generate_clarifying_questions(&prompt, &field).await {
                Ok(result) => print_json(&result),
                Err(e) => Err(e.into()),
            }
        }
        Command::Optimize { prompt, answers } => {
            let prompt = resolve_text(prompt, "optimize")?;
            match assistant.optimize_with_context(&prompt, &answers, &field).await {
                Ok(result) => print_json(&result),
                Err(e) => Err(e.into()),
            }
        }
    };

    assistant.destroy().await;
    reporter.abort();
    outcome
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Parse `question=answer`.
fn parse_answer(raw: &str) -> Result<ClarifyingAnswer, String> {
    match raw.split_once('=') {
        Some((question, answer)) if !question.trim().is_empty() => {
            Ok(ClarifyingAnswer::new(question.trim(), answer.trim()))
        }
        _ => Err(format!("expected \"question=answer\", got {raw:?}")),
    }
}

/// Resolve text input from an optional CLI argument and/or stdin.
///
/// - arg only → arg
/// - stdin only → stdin
/// - both → `"{arg}\n\n{stdin}"`
/// - neither → error
fn resolve_text(arg: Option<String>, command: &str) -> Result<String, Box<dyn std::error::Error>> {
    let stdin_is_pipe = !io::stdin().is_terminal();
    let stdin_text = if stdin_is_pipe {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        let trimmed = buf.trim().to_string();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    } else {
        None
    };

    match (arg, stdin_text) {
        (Some(a), Some(s)) => Ok(format!("{a}\n\n{s}")),
        (Some(a), None) => Ok(a),
        (None, Some(s)) => Ok(s),
        (None, None) => {
            Err(format!("{command}: no input provided (pass text as argument or via stdin)").into())
        }
    }
}
