use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use docchat_core::{
    Answer, AskError, CharacterNgramEmbedder, DiskIndex, DocumentSession, Embedder,
    LanguageModel, OpenAiChatModel, OpenAiConfig, OpenAiEmbedder, RagSettings,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "docchat", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// API key for the OpenAI-compatible provider
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, default_value = "")]
    api_key: String,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, env = "OPENAI_BASE_URL", default_value = docchat_core::openai::DEFAULT_BASE_URL)]
    base_url: String,

    /// Embedding model name
    #[arg(long, env = "EMBEDDING_MODEL", default_value = docchat_core::openai::DEFAULT_EMBEDDING_MODEL)]
    embedding_model: String,

    /// Chat model name
    #[arg(long, env = "CHAT_MODEL", default_value = docchat_core::openai::DEFAULT_CHAT_MODEL)]
    chat_model: String,

    /// Embedding backend
    #[arg(long, value_enum, default_value_t = EmbedderKind::Openai)]
    embedder: EmbedderKind,

    /// Segment size in characters
    #[arg(long, env = "CHUNK_SIZE", default_value_t = docchat_core::config::DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Characters shared by consecutive segments
    #[arg(long, env = "CHUNK_OVERLAP", default_value_t = docchat_core::config::DEFAULT_CHUNK_OVERLAP)]
    chunk_overlap: usize,

    /// Number of segments retrieved per question
    #[arg(long, env = "TOP_K", default_value_t = docchat_core::config::DEFAULT_TOP_K)]
    top_k: usize,

    /// Directory holding the persisted vector index
    #[arg(long, env = "VECTOR_DB_PATH", default_value = docchat_core::config::DEFAULT_INDEX_PATH)]
    index_path: PathBuf,

    /// Timeout for each provider request, in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS")]
    request_timeout_secs: Option<u64>,
}

#[derive(Clone, Copy, ValueEnum)]
enum EmbedderKind {
    /// OpenAI-compatible embeddings endpoint
    Openai,
    /// Offline character-trigram hashing
    Ngram,
}

#[derive(Subcommand)]
enum Command {
    /// Load a .txt or .pdf file as the active document.
    Ingest {
        file: PathBuf,
        /// Force the format instead of using the extension (plain-text, paginated-text).
        #[arg(long)]
        format: Option<String>,
    },
    /// Ask a question about the active document.
    Ask { question: String },
    /// Show whether a document is loaded.
    Status,
    /// Drop the active document and its index.
    Reset,
    /// Interactive question loop, optionally loading a file first.
    Chat { file: Option<PathBuf> },
}

impl Cli {
    fn settings(&self) -> RagSettings {
        RagSettings {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            top_k: self.top_k,
            index_path: self.index_path.clone(),
            ..RagSettings::default()
        }
    }

    fn provider_config(&self) -> OpenAiConfig {
        let mut config = OpenAiConfig::new(self.api_key.clone())
            .with_base_url(self.base_url.clone())
            .with_embedding_model(self.embedding_model.clone())
            .with_chat_model(self.chat_model.clone());
        if let Some(secs) = self.request_timeout_secs {
            config = config.with_request_timeout(Duration::from_secs(secs));
        }
        config
    }

    fn providers(&self) -> anyhow::Result<(Arc<dyn Embedder>, Arc<dyn LanguageModel>)> {
        let config = self.provider_config();
        let embedder: Arc<dyn Embedder> = match self.embedder {
            EmbedderKind::Openai => Arc::new(OpenAiEmbedder::new(config.clone())?),
            EmbedderKind::Ngram => Arc::new(CharacterNgramEmbedder::default()),
        };
        let model: Arc<dyn LanguageModel> = Arc::new(OpenAiChatModel::new(config)?);
        Ok((embedder, model))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        index_path = %cli.index_path.display(),
        "docchat boot"
    );

    match &cli.command {
        Command::Ingest { file, format } => {
            let session = open_session(&cli).await?;
            ingest_file(&session, file, format.as_deref()).await?;
        }
        Command::Ask { question } => {
            let session = open_session(&cli).await?;
            match session.ask(question).await {
                Ok(answer) => print_answer(&answer),
                Err(error) => return Err(explain_ask_error(error)),
            }
        }
        Command::Status => print_status(&open_session(&cli).await?).await,
        Command::Reset => reset_even_if_corrupt(&cli).await?,
        Command::Chat { file } => {
            let session = open_session(&cli).await?;
            if let Some(file) = file {
                ingest_file(&session, file, None).await?;
            }
            chat_loop(&session).await?;
        }
    }

    Ok(())
}

async fn open_session(cli: &Cli) -> anyhow::Result<DocumentSession> {
    let (embedder, model) = cli.providers()?;
    Ok(DocumentSession::open(embedder, model, cli.settings()).await?)
}

async fn reset_even_if_corrupt(cli: &Cli) -> anyhow::Result<()> {
    match open_session(cli).await {
        Ok(session) => session.reset().await?,
        Err(error) => {
            warn!(%error, "index could not be opened; removing it directly");
            DiskIndex::purge(&cli.index_path).await?;
        }
    }
    println!("document cleared");
    Ok(())
}

async fn ingest_file(
    session: &DocumentSession,
    file: &Path,
    format: Option<&str>,
) -> anyhow::Result<()> {
    let name = file
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow::anyhow!("path has no file name: {}", file.display()))?
        .to_string();
    let bytes = tokio::fs::read(file).await?;

    let report = session.ingest_upload(&name, bytes, format).await?;
    println!(
        "{} processed: {} segments created at {}",
        report.document.name,
        report.segment_count,
        report.document.ingested_at.to_rfc3339()
    );
    Ok(())
}

fn print_answer(answer: &Answer) {
    println!("{}", answer.text);
    if !answer.sources.is_empty() {
        println!();
        println!("sources:");
        for (position, source) in answer.sources.iter().enumerate() {
            println!("  [{}] {}", position + 1, source.replace('\n', " "));
        }
    }
}

fn explain_ask_error(error: AskError) -> anyhow::Error {
    if error.is_state_error() {
        anyhow::anyhow!("{error}")
    } else {
        anyhow::anyhow!("{error}; try again later")
    }
}

async fn print_status(session: &DocumentSession) {
    let status = session.status().await;
    match (status.loaded, status.name, status.segment_count) {
        (true, Some(name), Some(count)) => println!("loaded: {name} ({count} segments)"),
        _ => println!("no document loaded"),
    }
}

async fn chat_loop(session: &DocumentSession) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/status" => print_status(session).await,
            "/reset" => {
                session.reset().await?;
                println!("document cleared");
            }
            question => match session.ask(question).await {
                Ok(answer) => print_answer(&answer),
                Err(error) => println!("error: {}", explain_ask_error(error)),
            },
        }
    }

    Ok(())
}
