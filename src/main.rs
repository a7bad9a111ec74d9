use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use whoishiring::config::{Config, LlmExtractionConfig};
use whoishiring::crawler::{BrowserConfig, CacheMode, CrawlerRunConfig, HttpCrawler, PageCrawler};
use whoishiring::extraction::{ExtractionTask, LlmExtractionStrategy, build_extraction_client};
use whoishiring::logging;
use whoishiring::processing::{
    FieldPriority, PersistOutcome, Preprocessor, RawExtraction, write_valid_jobs,
};

#[derive(Parser)]
#[command(
    name = "whoishiring",
    about = "Crawl hiring threads, extract job postings, and prepare them for embedding"
)]
struct Cli {
    /// Log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Crawl a page and print it as markdown.
    Crawl {
        /// Page to crawl; defaults to TARGET_URL.
        #[arg(long)]
        url: Option<String>,
    },
    /// Crawl a hiring page, extract postings with an LLM, and save the valid ones.
    Extract {
        #[arg(long, value_enum, default_value = "jobs-local")]
        task: ExtractionTask,
        /// Destination file; defaults to JOBS_OUTPUT_PATH.
        #[arg(long)]
        output: Option<PathBuf>,
        /// LLM settings file; defaults to EXTRACT_LLM_CONFIG.
        #[arg(long)]
        llm_config: Option<PathBuf>,
    },
    /// Turn a saved jobs file into cleaned documents.
    Preprocess {
        /// Jobs file; defaults to JOBS_OUTPUT_PATH.
        #[arg(long)]
        input: Option<PathBuf>,
        /// Comma separated field order, e.g. `company_location,job_description`.
        #[arg(long)]
        priority: Option<FieldPriority>,
        /// Number of documents to print.
        #[arg(long, default_value_t = 3)]
        samples: usize,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);
    if let Err(err) = run(cli).await {
        tracing::error!(error = %format!("{err:#}"), "Command failed");
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load().context("failed to load configuration")?;
    match cli.command {
        Command::Crawl { url } => crawl(&config, url, cli.verbose).await,
        Command::Extract {
            task,
            output,
            llm_config,
        } => extract(&config, task, output, llm_config, cli.verbose).await,
        Command::Preprocess {
            input,
            priority,
            samples,
        } => preprocess(&config, input, priority, samples),
    }
}

async fn crawl(config: &Config, url: Option<String>, verbose: bool) -> Result<()> {
    let url = match url {
        Some(url) => url,
        None => config.require_url("TARGET_URL")?.to_string(),
    };
    let crawler = HttpCrawler::new(&BrowserConfig::from_config(config, verbose))?;
    let run_config = CrawlerRunConfig::default()
        .cache_mode(CacheMode::Bypass)
        .page_timeout(config.page_timeout);

    let result = crawler.crawl(&url, &run_config).await;
    if !result.success {
        return Err(anyhow!(
            "crawl of {url} failed: {}",
            result.error_message.unwrap_or_default()
        ));
    }
    println!("{}", result.markdown);
    Ok(())
}

async fn extract(
    config: &Config,
    task: ExtractionTask,
    output: Option<PathBuf>,
    llm_config: Option<PathBuf>,
    verbose: bool,
) -> Result<()> {
    let url = config.require_url(task.url_variable())?.to_string();
    let settings_path = llm_config.unwrap_or_else(|| config.llm_config_path.clone());
    let settings = LlmExtractionConfig::load(&settings_path)
        .with_context(|| format!("failed to load LLM settings from {}", settings_path.display()))?
        .with_provider(config.target_model.as_deref());
    let provider = settings.provider_spec()?;
    tracing::info!(%settings, ?task, url = %url, "Starting extraction");

    let client = build_extraction_client(&provider, &settings)?;
    let strategy = LlmExtractionStrategy::new(
        client,
        provider,
        task.schema(),
        task.instruction(),
        settings.params,
    );
    let crawler = HttpCrawler::new(&BrowserConfig::from_config(config, verbose))?;
    let run_config = CrawlerRunConfig::for_jobs(config).extraction_strategy(Arc::new(strategy));

    let result = crawler.crawl(&url, &run_config).await;
    if !result.success {
        return Err(anyhow!(
            "crawl of {url} failed: {}",
            result.error_message.unwrap_or_default()
        ));
    }

    let raw = RawExtraction::Text(result.extracted_content.unwrap_or_else(|| "[]".into()));
    let output = output.unwrap_or_else(|| config.jobs_output_path.clone());
    match write_valid_jobs(&raw, &output) {
        PersistOutcome::Written { count } => {
            tracing::info!(count, path = %output.display(), "Extraction complete");
            Ok(())
        }
        PersistOutcome::Fallback { error } => {
            tracing::warn!(%error, path = %output.display(), "Saved raw extraction output instead");
            Ok(())
        }
        PersistOutcome::Failed { error } => {
            Err(anyhow!("could not write {}: {error}", output.display()))
        }
    }
}

fn preprocess(
    config: &Config,
    input: Option<PathBuf>,
    priority: Option<FieldPriority>,
    samples: usize,
) -> Result<()> {
    let input = input.unwrap_or_else(|| config.jobs_output_path.clone());
    let preprocessor = Preprocessor::new(priority.unwrap_or_default());
    let documents = preprocessor
        .preprocess(&input)
        .with_context(|| format!("failed to preprocess {}", input.display()))?;

    println!("Processed {} documents", documents.len());
    for (index, document) in documents.iter().take(samples).enumerate() {
        println!("\n--- Document {} ---\n{document}", index + 1);
    }
    Ok(())
}
