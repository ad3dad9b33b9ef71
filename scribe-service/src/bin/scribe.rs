use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::*;
use error_common::CodedError;
use logger_redacted::LoggerConfig;
use serde::Deserialize;
use tracing::info;

use scribe_service::{
    AudioClip, AudioEncoding, FormSchema, ProcessEnv, ProviderConfig, QuotaContext, QuotaSnapshot,
    ScribeService, TranscriptionRequest, ENV_TNC,
};

/// Care Scribe voice-to-form transcription
#[derive(Parser, Debug)]
#[command(name = "scribe", version)]
#[command(about = "Transcribe clinical audio and fill form fields through OpenAI, Azure OpenAI or Google Vertex AI")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Load environment variables from this file instead of ./.env
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Transcribe one or more audio files and print the result as JSON
    Transcribe(TranscribeArgs),
    /// Resolve the provider configuration and print it without secrets
    CheckConfig,
}

#[derive(Args, Debug)]
struct TranscribeArgs {
    /// Audio file, repeat for several clips (transcribed in order)
    #[arg(long = "audio", required_unless_present = "transcript_file", num_args = 1..)]
    audio: Vec<PathBuf>,

    /// Transcript from an earlier run; skips audio transcription
    #[arg(long)]
    transcript_file: Option<PathBuf>,

    /// Audio encoding, guessed from the file extension when omitted
    #[arg(long)]
    encoding: Option<String>,

    /// Form schema (JSON array of questionnaires)
    #[arg(long)]
    schema: Option<PathBuf>,

    /// Typed notes sent along with the transcript
    #[arg(long)]
    text: Option<String>,

    /// File holding a prompt that replaces the built-in one
    #[arg(long)]
    prompt_file: Option<PathBuf>,

    /// Chat model, `model` or `provider/model`
    #[arg(long)]
    chat_model: Option<String>,

    #[arg(long)]
    audio_model: Option<String>,

    #[arg(long)]
    temperature: Option<f32>,

    /// JSON file with `user` and `facility` quota snapshots; terms are read from SCRIBE_TNC
    #[arg(long)]
    quota: Option<PathBuf>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
}

#[derive(Debug, Deserialize)]
struct QuotaFile {
    user: Option<QuotaSnapshot>,
    facility: Option<QuotaSnapshot>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    match &cli.env_file {
        Some(path) => {
            dotenvy::from_path(path).with_context(|| format!("failed to load {}", path.display()))?;
        }
        None => {
            // A missing ./.env is fine
            dotenvy::dotenv().ok();
        }
    }

    let mut logger = LoggerConfig::from_env();
    if cli.verbose {
        logger = logger.with_level("debug");
    }
    logger_redacted::init(&logger)?;

    match cli.command {
        Command::Transcribe(args) => run_transcribe(args).await,
        Command::CheckConfig => check_config(),
    }
}

async fn run_transcribe(args: TranscribeArgs) -> Result<ExitCode> {
    let forced_encoding = args
        .encoding
        .as_deref()
        .map(str::parse::<AudioEncoding>)
        .transpose()?;

    let mut clips = Vec::with_capacity(args.audio.len());
    for path in &args.audio {
        let encoding = match forced_encoding {
            Some(encoding) => encoding,
            None => encoding_from_path(path)?,
        };
        let data = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        clips.push(AudioClip::new(data, encoding));
    }

    let mut request = TranscriptionRequest::new(clips);
    if let Some(path) = &args.schema {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let value = serde_json::from_str(&raw)
            .with_context(|| format!("{} is not valid JSON", path.display()))?;
        request = request.with_schema(FormSchema::from_json(value)?);
    }
    if let Some(path) = &args.transcript_file {
        let transcript = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        request = request.with_transcript(transcript);
    }
    if let Some(text) = args.text {
        request = request.with_text(text);
    }
    if let Some(path) = &args.prompt_file {
        let prompt = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        request = request.with_prompt(prompt);
    }
    if let Some(model) = args.chat_model {
        request = request.with_chat_model(model);
    }
    if let Some(model) = args.audio_model {
        request = request.with_audio_model(model);
    }
    if let Some(temperature) = args.temperature {
        request = request.with_temperature(temperature);
    }
    if let Some(path) = &args.quota {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let file: QuotaFile = serde_json::from_str(&raw)
            .with_context(|| format!("{} is not a valid quota file", path.display()))?;
        request = request.with_quota(QuotaContext {
            user: file.user,
            facility: file.facility,
            terms: std::env::var(ENV_TNC).unwrap_or_default(),
        });
    }

    let config = ProviderConfig::from_env()?;
    let http = reqwest::Client::builder()
        .user_agent(concat!("care-scribe/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")?;
    let service = ScribeService::new().with_http_client(http);

    match service.transcribe(request, &config).await {
        Ok(result) => {
            print_json(&result, args.pretty)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(error) => {
            error.log("scribe transcribe");
            eprintln!("{} [{}] {}", "error:".bright_red(), error.code(), error);
            match error.into_partial_result() {
                Some(partial) => {
                    print_json(&partial, args.pretty)?;
                    Ok(ExitCode::from(2))
                }
                None => Ok(ExitCode::FAILURE),
            }
        }
    }
}

fn check_config() -> Result<ExitCode> {
    let resolved = ProviderConfig::new().resolve(&ProcessEnv)?;
    let summary = resolved.summary();
    info!(provider = %summary.provider, "configuration resolved");

    println!("{}", "Care Scribe configuration".bright_cyan());
    println!("  provider:        {}", summary.provider.to_string().bright_white());
    println!("  endpoint:        {}", summary.endpoint);
    println!("  credentials:     {}", summary.credentials);
    println!("  chat model:      {}", summary.chat_model);
    println!(
        "  audio model:     {}",
        summary.audio_model.as_deref().unwrap_or("(chat model)")
    );
    println!("  request timeout: {}s", summary.request_timeout_secs);
    match summary.max_fields_per_request {
        Some(max) => println!("  fields/request:  {}", max),
        None => println!("  fields/request:  unlimited"),
    }
    println!("{}", "configuration OK".bright_green());
    Ok(ExitCode::SUCCESS)
}

fn encoding_from_path(path: &Path) -> Result<AudioEncoding> {
    match path.to_str().and_then(AudioEncoding::from_path) {
        Some(encoding) => Ok(encoding),
        None => bail!(
            "cannot tell the audio encoding of {}, pass --encoding",
            path.display()
        ),
    }
}

fn print_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", out);
    Ok(())
}
