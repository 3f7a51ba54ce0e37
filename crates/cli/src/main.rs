use clap::{Parser, Subcommand};
use corep_core::ingest::ingest_directory;
use corep_core::{CoreConfig, DocumentStore, QueryService, Retriever, TemplateCatalog};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "corep")]
#[command(about = "COREP regulatory reporting assistant CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Re-ingest every .txt/.md document in a folder into the document store
    Ingest {
        /// Folder holding the regulatory documents (and an optional sources.yaml)
        dir: PathBuf,
        /// Snapshot path (defaults to COREP_STORE_PATH)
        #[arg(long)]
        store: Option<PathBuf>,
    },
    /// Show chunk counts per source
    Stats {
        #[arg(long)]
        store: Option<PathBuf>,
    },
    /// List available templates
    Templates,
    /// Run a query locally and print the populated template
    Query {
        #[arg(long)]
        question: String,
        #[arg(long)]
        scenario: String,
        #[arg(long, default_value = "C_01.00")]
        template: String,
        #[arg(long)]
        store: Option<PathBuf>,
        /// Print the full response as JSON
        #[arg(long)]
        json: bool,
    },
}

fn config_with(store: Option<PathBuf>) -> anyhow::Result<CoreConfig> {
    let config = CoreConfig::from_env()?;
    Ok(match store {
        Some(path) => config.with_store_path(path),
        None => config,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("corep=info".parse()?))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Ingest { dir, store }) => {
            let config = config_with(store)?;
            let embedder = config.embedder()?;
            let mut document_store = DocumentStore::new(embedder.model_id());
            let counts = ingest_directory(&dir, &mut document_store, embedder.as_ref()).await?;
            document_store.save(config.store_path())?;

            for (source, chunks) in &counts {
                println!("{source}: {chunks} chunks");
            }
            println!(
                "Stored {} chunks in {}",
                document_store.len(),
                config.store_path().display()
            );
        }
        Some(Commands::Stats { store }) => {
            let config = config_with(store)?;
            let embedder = config.embedder()?;
            let document_store =
                DocumentStore::load_or_empty(config.store_path(), embedder.as_ref()).await?;

            if document_store.is_empty() {
                println!("Document store is empty.");
            } else {
                println!("Embedding model: {}", document_store.embedding_model());
                for (source, chunks) in document_store.source_counts() {
                    println!("{source}: {chunks} chunks");
                }
                println!("Total: {} chunks", document_store.len());
            }
        }
        Some(Commands::Templates) => {
            for template in TemplateCatalog::builtin()?.list_templates() {
                println!("{}  {}  {}", template.code, template.name, template.description);
            }
        }
        Some(Commands::Query {
            question,
            scenario,
            template,
            store,
            json,
        }) => {
            let config = config_with(store)?;
            let embedder = config.embedder()?;
            let document_store =
                DocumentStore::load_or_empty(config.store_path(), embedder.as_ref()).await?;
            let service = QueryService::new(
                Arc::new(TemplateCatalog::builtin()?),
                Retriever::new(Arc::new(document_store), embedder),
                config.reasoner()?,
                config.max_retrieval_results(),
                config.reasoning_deadline(),
            );

            let res = service
                .run(&api_shared::QueryReq {
                    question,
                    scenario,
                    template_code: template,
                })
                .await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&res)?);
            } else {
                println!("{}", res.formatted_output);
                println!("Validation flags:");
                if res.validation_flags.is_empty() {
                    println!("  (none)");
                }
                for flag in &res.validation_flags {
                    println!("  - {flag}");
                }
                println!("\nAudit log:");
                for entry in &res.audit_log {
                    println!("  - {entry}");
                }
            }
        }
        None => {
            println!("Use 'corep --help' for commands");
        }
    }

    Ok(())
}
