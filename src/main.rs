use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use agent_rag::core::config::AppPaths;
use agent_rag::core::logging;
use agent_rag::rag::{NewDocument, RagConfigurationUpdate, TrainingDocument};
use agent_rag::state::AppState;

#[derive(Parser)]
#[command(name = "agent-rag", version, about = "Index documents and retrieve context for chat agents")]
struct Cli {
    /// Data directory (defaults to $AGENT_RAG_DATA_DIR or the platform data dir).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload a UTF-8 text file for an agent and index it.
    Index {
        #[arg(long)]
        agent: String,
        file: PathBuf,
    },
    /// Print the prompt that would be sent to the language model.
    Query {
        #[arg(long)]
        agent: String,
        message: String,
        /// Print the ranked chunks and their scores instead of the prompt.
        #[arg(long)]
        scores: bool,
    },
    /// Manage an agent's documents.
    #[command(subcommand)]
    Docs(DocsCommand),
    /// Show or change an agent's RAG configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Delete every document, chunk and configuration of an agent.
    Purge {
        #[arg(long)]
        agent: String,
    },
}

#[derive(Subcommand)]
enum DocsCommand {
    List {
        #[arg(long)]
        agent: String,
    },
    Delete { document_id: String },
    /// Re-index a document, replacing its chunks.
    Reprocess { document_id: String },
}

#[derive(Subcommand)]
enum ConfigCommand {
    Show {
        #[arg(long)]
        agent: String,
    },
    Set(ConfigSetArgs),
    /// Print the effective application settings (secrets redacted).
    Settings,
}

#[derive(Args)]
struct ConfigSetArgs {
    #[arg(long)]
    agent: String,
    #[arg(long)]
    enabled: Option<bool>,
    #[arg(long)]
    chunk_size: Option<usize>,
    #[arg(long)]
    chunk_overlap: Option<usize>,
    #[arg(long)]
    top_k: Option<usize>,
    #[arg(long)]
    threshold: Option<f64>,
    #[arg(long)]
    embedding_model: Option<String>,
}

impl From<ConfigSetArgs> for RagConfigurationUpdate {
    fn from(args: ConfigSetArgs) -> Self {
        RagConfigurationUpdate {
            enabled: args.enabled,
            chunk_size: args.chunk_size,
            chunk_overlap: args.chunk_overlap,
            top_k: args.top_k,
            similarity_threshold: args.threshold,
            embedding_model: args.embedding_model,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let paths = Arc::new(match cli.data_dir {
        Some(dir) => AppPaths::with_data_dir(dir),
        None => AppPaths::new(),
    });
    let state = AppState::initialize(paths)
        .await
        .context("Failed to initialize")?;
    logging::init(&state.paths, &state.settings.logging);

    run(&state, cli.command).await
}

async fn run(state: &AppState, command: Command) -> anyhow::Result<()> {
    let rag = &state.rag;

    match command {
        Command::Index { agent, file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let file_name = file
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| file.display().to_string());
            let file_type = file
                .extension()
                .map(|e| e.to_string_lossy().to_string())
                .unwrap_or_else(|| "txt".to_string());

            let upload = NewDocument {
                file_name,
                file_type,
                file_size: content.len() as u64,
                content,
            };
            let document = rag.upload_and_process(&agent, upload).await?;
            print_document(&document);
        }
        Command::Query {
            agent,
            message,
            scores,
        } => {
            if scores {
                for (rank, rc) in rag.retrieve(&agent, &message).await?.iter().enumerate() {
                    println!(
                        "#{} score={:.4} document={} chunk={}",
                        rank + 1,
                        rc.score,
                        rc.chunk.document_id,
                        rc.chunk.chunk_index
                    );
                    println!("{}\n", rc.chunk.content);
                }
            } else {
                println!("{}", rag.prepare_prompt(&agent, &message).await);
            }
        }
        Command::Docs(DocsCommand::List { agent }) => {
            for document in rag.list_documents(&agent).await? {
                print_document(&document);
            }
        }
        Command::Docs(DocsCommand::Delete { document_id }) => {
            rag.delete_document(&document_id).await?;
            println!("deleted {}", document_id);
        }
        Command::Docs(DocsCommand::Reprocess { document_id }) => {
            let document = rag.reprocess_document(&document_id).await?;
            print_document(&document);
        }
        Command::Config(ConfigCommand::Show { agent }) => {
            let config = rag.get_configuration(&agent).await?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Command::Config(ConfigCommand::Set(args)) => {
            let agent = args.agent.clone();
            let config = rag.update_configuration(&agent, &args.into()).await?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Command::Config(ConfigCommand::Settings) => {
            let settings = serde_json::to_value(state.settings.as_ref())?;
            let redacted = state.config.redact_sensitive_values(&settings);
            println!("{}", serde_json::to_string_pretty(&redacted)?);
        }
        Command::Purge { agent } => {
            let removed = rag.delete_agent(&agent).await?;
            println!("removed {} document(s) for {}", removed, agent);
        }
    }

    Ok(())
}

fn print_document(document: &TrainingDocument) {
    println!(
        "{}  {:<10}  chunks={:<4}  {}",
        document.id, document.status, document.chunk_count, document.file_name
    );
}
