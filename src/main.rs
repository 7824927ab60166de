use std::path::PathBuf;
use std::sync::Arc;

use anyhow::bail;
use clap::Parser;

use apiforge_core::agent::{Agent, QueryOutcome};
use apiforge_core::config::Config;
use apiforge_core::dataset;
use apiforge_core::output::OutputWriter;
use apiforge_core::tools::generator::Generator;
use apiforge_core::tools::retriever::{Retriever, to_index_doc};
use apiforge_llm::any::AnyProvider;
#[cfg(feature = "mock")]
use apiforge_llm::mock::MockProvider;
use apiforge_llm::openai::OpenAiProvider;
use apiforge_llm::provider::LlmProvider;
use apiforge_memory::InMemoryVectorStore;
use apiforge_memory::index::{DocIndex, IndexDoc};

/// Answer payment API questions with retrieval-grounded code snippets.
#[derive(Debug, Parser)]
#[command(name = "apiforge", version)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "apiforge.toml")]
    config: PathBuf,

    /// Override the dataset path from the config.
    #[arg(long)]
    dataset: Option<PathBuf>,

    /// Override the output directory from the config.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Queries to process, replacing the configured list.
    queries: Vec<String>,
}

fn build_provider(config: &Config) -> anyhow::Result<AnyProvider> {
    match config.llm.provider.as_str() {
        "openai" => Ok(AnyProvider::OpenAi(OpenAiProvider::new(
            config.llm.api_key.clone(),
            config.llm.base_url.clone(),
            config.llm.model.clone(),
            Some(config.llm.embedding_model.clone()),
        ))),
        #[cfg(feature = "mock")]
        "mock" => Ok(AnyProvider::Mock(
            MockProvider::default().with_embedding(vec![1.0, 0.0, 0.0, 0.0]),
        )),
        other => bail!("unknown LLM provider: {other}"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let mut config = Config::load(&cli.config)?;
    if let Some(dataset) = cli.dataset {
        config.dataset.path = dataset.display().to_string();
    }
    if let Some(out) = cli.out {
        config.output.dir = out.display().to_string();
    }
    if !cli.queries.is_empty() {
        config.queries = cli.queries;
    }

    let provider = Arc::new(build_provider(&config)?);
    if !provider.supports_embeddings() {
        bail!(
            "provider {} has no embedding model configured",
            provider.name()
        );
    }

    let report = dataset::load_or_placeholder(config.dataset.path.as_ref());
    tracing::info!(
        "loaded {} API entries ({} rows skipped)",
        report.entries.len(),
        report.skipped
    );

    let mut index = DocIndex::new(
        Box::new(InMemoryVectorStore::new()),
        Box::new(provider.embed_fn()),
    );
    let docs: Vec<IndexDoc> = report.entries.iter().map(to_index_doc).collect();
    let build = index.build(&docs).await?;
    tracing::info!(
        "indexed {} entries ({} excluded after embedding failures)",
        build.indexed,
        build.failed
    );

    let retriever = Retriever::new(index, config.retrieval.top_k);
    let generator = Generator::new(Arc::clone(&provider));
    let mut agent = Agent::new(retriever, generator, config.retrieval.max_iterations);
    let mut writer = OutputWriter::new(&config.output.dir);

    for query in &config.queries {
        tracing::info!("processing query: {query}");
        match agent.run_query(query).await {
            Ok(QueryOutcome::Answered(result)) => {
                if result.synthetic {
                    tracing::warn!("query {query:?} produced a placeholder result");
                }
                writer.write_document(&result);
            }
            Ok(QueryOutcome::IterationLimit) => {
                tracing::warn!("query {query:?} hit the tool iteration limit, skipping document");
            }
            Err(e) => {
                tracing::error!("query {query:?} failed: {e:#}");
            }
        }
    }

    if writer.written().is_empty() {
        tracing::warn!("no documents written, skipping archive");
    } else {
        let archive = writer.bundle_archive(&config.output.archive)?;
        tracing::info!("session archive written to {}", archive.display());
    }

    Ok(())
}
