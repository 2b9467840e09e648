use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use media_indexer::search::{self, ImageQuery};
use media_indexer::{Dependencies, IndexerConfig, IndexingError};
use media_indexer_pipeline::consumer::ResumeToken;
use media_indexer_pipeline::{IngestSummary, LoadStrategy};
use media_indexer_repository::MissingPolicy;

#[derive(Parser)]
#[command(name = "media-indexer")]
#[command(about = "Ingest media metadata into the search index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a dataset dump into the index
    IngestDump {
        /// Dump directory (defaults to DUMP_PATH)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Stop after this many records
        #[arg(long)]
        max_num: Option<usize>,

        /// Keep the current index instead of recreating it
        #[arg(long)]
        keep_index: bool,

        /// Load strategy (strict|concurrent)
        #[arg(long)]
        strategy: Option<LoadStrategy>,
    },
    /// Load artifacts from the event stream
    IngestStream {
        /// Start from partition:offset instead of the beginning of the topic
        #[arg(long)]
        resume_token: Option<ResumeToken>,

        /// Exit the process after a transport failure
        #[arg(long)]
        force_exit: bool,

        /// Stop once every partition is drained instead of waiting for new events
        #[arg(long)]
        stop_at_eof: bool,
    },
    /// Find images similar to a local image file
    SearchByImage {
        file: PathBuf,

        #[arg(long, default_value_t = 5)]
        limit: usize,

        #[arg(long)]
        index_name: Option<String>,

        #[arg(long)]
        doc_type: Option<String>,
    },
    /// Print the effective configuration
    Config,
    /// Delete the index
    DeleteIndex {
        #[arg(long)]
        index_name: Option<String>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    match run(cli.command).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "media-indexer failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands) -> Result<ExitCode, IndexingError> {
    let mut config = IndexerConfig::from_env()?;

    match command {
        Commands::IngestDump {
            path,
            max_num,
            keep_index,
            strategy,
        } => {
            if let Some(strategy) = strategy {
                config.load_strategy = strategy;
            }
            let path = path.unwrap_or_else(|| config.dump_path.clone());

            let deps = Dependencies::new(config).await?;
            let summary = deps
                .orchestrator
                .ingest_dump(path, max_num, !keep_index)
                .await?;
            Ok(report(&summary))
        }
        Commands::IngestStream {
            resume_token,
            force_exit,
            stop_at_eof,
        } => {
            config.force_exit |= force_exit;
            config.stream_stop_at_eof |= stop_at_eof;

            let deps = Dependencies::new(config).await?;
            let adapter = deps.stream_adapter(resume_token).await?;
            let summary = deps.orchestrator.ingest_stream(adapter).await?;
            Ok(report(&summary))
        }
        Commands::SearchByImage {
            file,
            limit,
            index_name,
            doc_type,
        } => {
            let query = ImageQuery {
                limit,
                index_name: index_name.unwrap_or_else(|| config.index_name.clone()),
                doc_type: doc_type.unwrap_or_else(|| config.doc_type.clone()),
            };
            let results =
                search::search_by_image(&config.search_url, &file, &query, config.thumbnail_config())
                    .await?;
            println!("{}", serde_json::to_string_pretty(&results)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config.to_masked_json())?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::DeleteIndex { index_name } => {
            if let Some(name) = index_name {
                config.index_name = name;
            }

            let deps = Dependencies::new(config).await?;
            let manager = deps.orchestrator.manager();
            if manager.delete_index(MissingPolicy::Ignore).await? {
                println!("Deleted index {}", manager.index_name());
            } else {
                println!("Index {} does not exist", manager.index_name());
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Print a run summary; aborted runs exit non-zero.
fn report(summary: &IngestSummary) -> ExitCode {
    println!("Inserted:  {}", summary.inserted);
    println!("Failed:    {}", summary.failed);
    if let Some(total) = summary.indexed_total {
        println!("In index:  {}", total);
    }
    if let Some(stats) = summary.stream {
        println!(
            "Stream:    {} received, {} forwarded, {} skipped, {} dead-lettered",
            stats.received, stats.forwarded, stats.skipped, stats.dead_lettered
        );
    }
    if let Some(e) = &summary.first_error {
        println!("First error: {}", e);
    }

    if summary.aborted {
        warn!("Run aborted before the input was exhausted");
        ExitCode::FAILURE
    } else {
        info!("Run complete");
        ExitCode::SUCCESS
    }
}
