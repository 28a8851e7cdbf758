//! hypoforge CLI — hypothesis generation from gene-level model outputs.
//!
//! Usage:
//!   hypoforge run --genes TP53:down --genes BRCA1:down \
//!       --disease "triple negative breast cancer" --target "cisplatin resistance" \
//!       --corpus abstracts.jsonl --output hypotheses.csv
//!   hypoforge preview --genes TP53:down --disease ... --target ...
//!   hypoforge init-config config.yaml

use clap::{Parser, Subcommand};
use hypoforge::episode::{EpisodeConfig, EpisodeController};
use hypoforge::guardrail::{BlocklistGuardrail, Guardrail};
use hypoforge::model::{Context, GeneSignal};
use hypoforge::prompt::PromptAssembler;
use hypoforge::provider::ModelProvider;
use hypoforge::retriever::{Retriever, StaticRetriever};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "hypoforge",
    version,
    about = "Iterative hypothesis generation with self-critique"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct ContextArgs {
    /// Gene signal as SYMBOL:direction, repeatable (e.g. --genes TP53:down)
    #[arg(long = "genes", required = true)]
    genes: Vec<String>,
    /// Disease the samples came from
    #[arg(long)]
    disease: String,
    /// Target variable the statistical model predicted
    #[arg(long)]
    target: String,
    /// Free-text notes appended to the prompt framing
    #[arg(long)]
    notes: Option<String>,
    /// Known hypothesis to exclude, repeatable
    #[arg(long = "known")]
    known: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an episode and write the aggregated hypotheses as CSV
    Run {
        #[command(flatten)]
        context: ContextArgs,
        /// JSON-lines corpus of literature abstracts ({"id", "text"} per line)
        #[arg(long)]
        corpus: Option<PathBuf>,
        /// YAML config file; defaults apply for fields it omits
        #[arg(long)]
        config: Option<PathBuf>,
        /// Output CSV path
        #[arg(long, default_value = "hypotheses.csv")]
        output: PathBuf,
        /// Model name for the chat-completion provider
        #[arg(long, default_value = "gpt-4o")]
        model: String,
        /// Blocked term for the local guardrail, repeatable
        #[arg(long = "block")]
        block: Vec<String>,
        /// Override: hypotheses drafted per episode
        #[arg(long)]
        slate_size: Option<usize>,
        /// Override: drafting cycles per lineage
        #[arg(long)]
        max_rounds: Option<u32>,
        /// Override: minimum novelty score for acceptance (1-10)
        #[arg(long)]
        novelty_threshold: Option<u8>,
    },
    /// Print the assembled generation prompt without calling any model
    Preview {
        #[command(flatten)]
        context: ContextArgs,
        /// YAML config file
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Write a config file populated with the defaults
    InitConfig {
        /// Destination path
        path: PathBuf,
    },
}

fn build_context(args: &ContextArgs) -> Context {
    let genes = args.genes.iter().map(|g| GeneSignal::parse(g)).collect();
    let mut context = Context::new(genes, &args.disease, &args.target);
    if let Some(notes) = &args.notes {
        context = context.with_notes(notes);
    }
    if !args.known.is_empty() {
        context = context.with_known_hypotheses(args.known.clone());
    }
    context
}

fn load_config(path: Option<&PathBuf>) -> Result<EpisodeConfig, String> {
    match path {
        Some(path) => EpisodeConfig::from_yaml_file(path)
            .map_err(|e| format!("cannot load config '{}': {}", path.display(), e)),
        None => Ok(EpisodeConfig::default()),
    }
}

#[cfg(feature = "openai")]
fn build_provider(model: &str) -> Result<Arc<dyn ModelProvider>, String> {
    let api_key = std::env::var("OPENAI_API_KEY")
        .map_err(|_| "OPENAI_API_KEY is not set".to_string())?;
    Ok(Arc::new(hypoforge::provider::OpenAiProvider::new(
        api_key, model,
    )))
}

#[cfg(not(feature = "openai"))]
fn build_provider(_model: &str) -> Result<Arc<dyn ModelProvider>, String> {
    Err("this build has no model provider; rebuild with --features openai".to_string())
}

#[cfg(feature = "embeddings")]
fn build_retriever(corpus: Option<&PathBuf>) -> Result<Arc<dyn Retriever>, String> {
    let Some(path) = corpus else {
        return Ok(Arc::new(StaticRetriever::empty()));
    };
    let snapshot = hypoforge::retriever::CorpusSnapshot::load(path)
        .map_err(|e| format!("cannot load corpus '{}': {}", path.display(), e))?;
    let embedder = hypoforge::retriever::FastEmbedEmbedder::default_model()
        .map_err(|e| format!("cannot initialize embedder: {}", e))?;
    let retriever = hypoforge::retriever::CorpusRetriever::build(&snapshot, Arc::new(embedder))
        .map_err(|e| format!("cannot index corpus: {}", e))?;
    eprintln!("Indexed {} abstracts from '{}'", snapshot.len(), path.display());
    Ok(Arc::new(retriever))
}

#[cfg(not(feature = "embeddings"))]
fn build_retriever(corpus: Option<&PathBuf>) -> Result<Arc<dyn Retriever>, String> {
    if corpus.is_some() {
        return Err(
            "this build has no embedder for --corpus; rebuild with --features embeddings"
                .to_string(),
        );
    }
    Ok(Arc::new(StaticRetriever::empty()))
}

#[allow(clippy::too_many_arguments)]
async fn cmd_run(
    context: ContextArgs,
    corpus: Option<PathBuf>,
    config_path: Option<PathBuf>,
    output: PathBuf,
    model: String,
    block: Vec<String>,
    slate_size: Option<usize>,
    max_rounds: Option<u32>,
    novelty_threshold: Option<u8>,
) -> i32 {
    let mut config = match load_config(config_path.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    if let Some(slate_size) = slate_size {
        config.slate_size = slate_size;
    }
    if let Some(max_rounds) = max_rounds {
        config.max_rounds = max_rounds;
    }
    if let Some(novelty_threshold) = novelty_threshold {
        config.novelty_threshold = novelty_threshold;
    }

    let provider = match build_provider(&model) {
        Ok(provider) => provider,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let retriever = match build_retriever(corpus.as_ref()) {
        Ok(retriever) => retriever,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let guardrail: Option<Arc<dyn Guardrail>> = if block.is_empty() {
        None
    } else {
        Some(Arc::new(BlocklistGuardrail::new(block)))
    };

    let controller = match EpisodeController::with_guardrail(provider, retriever, config, guardrail)
    {
        Ok(controller) => controller,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let report = match controller.run(build_context(&context)).await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    if let Err(e) = report.write_csv(&output) {
        eprintln!("Error: cannot write '{}': {}", output.display(), e);
        return 1;
    }
    println!(
        "Wrote {} hypotheses ({} fully accepted) to '{}'",
        report.records.len(),
        report.accepted_count(),
        output.display()
    );
    for failure in &report.failures {
        eprintln!("Warning: lineage {} produced no row: {}", failure.index, failure.reason);
    }
    0
}

fn cmd_preview(context: ContextArgs, config_path: Option<PathBuf>) -> i32 {
    let config = match load_config(config_path.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let assembler = PromptAssembler::new(config.passage_budget);
    let prompt = assembler.build_generate(&build_context(&context), &[], config.slate_size);
    println!("{}", prompt);
    0
}

fn cmd_init_config(path: &PathBuf) -> i32 {
    let config = EpisodeConfig::default();
    let yaml = match serde_yaml::to_string(&config) {
        Ok(yaml) => yaml,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    if let Err(e) = std::fs::write(path, yaml) {
        eprintln!("Error: cannot write '{}': {}", path.display(), e);
        return 1;
    }
    println!("Wrote default config to '{}'", path.display());
    0
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("hypoforge=info")),
        )
        .init();

    let cli = Cli::parse();
    let code = match cli.command {
        Commands::Run {
            context,
            corpus,
            config,
            output,
            model,
            block,
            slate_size,
            max_rounds,
            novelty_threshold,
        } => {
            cmd_run(
                context,
                corpus,
                config,
                output,
                model,
                block,
                slate_size,
                max_rounds,
                novelty_threshold,
            )
            .await
        }
        Commands::Preview { context, config } => cmd_preview(context, config),
        Commands::InitConfig { path } => cmd_init_config(&path),
    };
    std::process::exit(code);
}
