use anyhow::Result;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use np_inference::{ChatModel, InferenceConfig, LexiconScorer};
use np_pipeline::Pipeline;
use np_sources::{GoogleNewsSource, SourceConfig};
use np_speech::{GoogleSpeech, SpeechConfig};
use np_web::{create_app, AppState};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Durations like "30s", "2m", "1h"; a bare number means seconds.
#[derive(Debug, Clone, Copy)]
struct HumanDuration(Duration);

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut total_seconds = 0u64;
        let mut current_number = String::new();
        let mut has_unit = false;

        for c in s.chars() {
            if c.is_ascii_digit() {
                current_number.push(c);
            } else if let Ok(num) = current_number.parse::<u64>() {
                match c {
                    's' => total_seconds += num,
                    'm' => total_seconds += num * 60,
                    'h' => total_seconds += num * 3600,
                    _ => return Err(format!("Invalid duration unit: {}", c)),
                }
                current_number.clear();
                has_unit = true;
            } else if !c.is_whitespace() {
                return Err(format!("Invalid character in duration: {}", c));
            }
        }

        if !current_number.is_empty() {
            match current_number.parse::<u64>() {
                Ok(num) => total_seconds += num,
                Err(_) => return Err("Invalid number in duration".to_string()),
            }
            has_unit = true;
        }

        if !has_unit {
            return Err("Duration must include a number".to_string());
        }

        Ok(HumanDuration(Duration::from_secs(total_seconds)))
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// OpenAI-compatible chat endpoint (falls back to LLM_BASE_URL)
    #[arg(long)]
    model_url: Option<String>,

    /// Model name (falls back to LLM_MODEL)
    #[arg(long)]
    model_name: Option<String>,

    /// Maximum articles per run (falls back to MAX_ARTICLES)
    #[arg(long)]
    max_articles: Option<usize>,

    /// Timeout for each generative call
    #[arg(long, default_value = "60s")]
    inference_timeout: HumanDuration,

    /// Timeout for each page fetch/validation call
    #[arg(long, default_value = "5s")]
    fetch_timeout: HumanDuration,

    /// Timeout for each translation/synthesis call
    #[arg(long, default_value = "30s")]
    speech_timeout: HumanDuration,

    /// Concurrent enrichment tasks per run
    #[arg(long, default_value_t = 10)]
    max_concurrency: usize,

    /// Directory served under /static, where audio files land
    #[arg(long, default_value = "static")]
    static_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 8000)]
        port: u16,
    },
    /// Run one analysis and print its events to stdout
    Analyze { company: String },
}

fn build_pipeline(cli: &Cli) -> Result<Pipeline> {
    let max_articles = cli
        .max_articles
        .or_else(|| env_var("MAX_ARTICLES")?.parse().ok())
        .unwrap_or(5);

    let source = GoogleNewsSource::new(SourceConfig {
        max_articles,
        request_timeout: cli.fetch_timeout.0,
        ..SourceConfig::default()
    })?;

    let defaults = InferenceConfig::default();
    let model = ChatModel::new(InferenceConfig {
        api_key: env_var("LLM_API_KEY"),
        model: cli
            .model_name
            .clone()
            .or_else(|| env_var("LLM_MODEL"))
            .unwrap_or(defaults.model),
        base_url: cli
            .model_url
            .clone()
            .or_else(|| env_var("LLM_BASE_URL"))
            .unwrap_or(defaults.base_url),
        request_timeout: cli.inference_timeout.0,
    })?;

    let speech = GoogleSpeech::new(SpeechConfig {
        static_dir: cli.static_dir.clone(),
        request_timeout: cli.speech_timeout.0,
        ..SpeechConfig::default()
    })?;

    Ok(Pipeline::new(
        Arc::new(source),
        Arc::new(model),
        Arc::new(LexiconScorer::new()),
        Arc::new(speech),
    )
    .with_max_concurrency(cli.max_concurrency))
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let pipeline = build_pipeline(&cli)?;

    match cli.command {
        Commands::Serve { host, port } => {
            let state = AppState {
                pipeline: Arc::new(pipeline),
                static_dir: cli.static_dir.clone(),
            };
            let app = create_app(state);
            let addr = format!("{}:{}", host, port);
            info!(addr = %addr, "🚀 News sentiment server starting");
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            axum::serve(listener, app).await?;
        }
        Commands::Analyze { company } => {
            let mut events = Box::pin(pipeline.run(company));
            while let Some(event) = events.next().await {
                println!("{}", event.to_json_line());
            }
        }
    }

    Ok(())
}
