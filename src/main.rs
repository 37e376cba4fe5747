use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use fsd_enricher::app::ports::{EvidenceSink, FieldNormalizer, ResearchAdapter};
use fsd_enricher::config::PipelineConfig;
use fsd_enricher::dataset::check_schema;
use fsd_enricher::infra::dataset_json::{load_dataset, save_dataset};
use fsd_enricher::infra::evidence::JsonFileEvidenceSink;
use fsd_enricher::infra::normalizer::ZaFieldNormalizer;
use fsd_enricher::infra::research::{HttpResearchAdapter, OfflineResearchAdapter};
use fsd_enricher::logging;
use fsd_enricher::pipeline::PipelineOrchestrator;

#[derive(Parser)]
#[command(name = "fsd_enricher")]
#[command(about = "Flight school directory contact enrichment pipeline")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enrich a dataset and write the updated copy plus evidence ledger
    Enrich {
        /// Input dataset (JSON array of records)
        #[arg(long)]
        input: PathBuf,
        /// Where to write the enriched dataset
        #[arg(long)]
        output: PathBuf,
        /// Directory for the evidence ledger
        #[arg(long, default_value = "output")]
        evidence_dir: PathBuf,
        /// Optional TOML config file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Override the configured lookup concurrency
        #[arg(long)]
        concurrency: Option<usize>,
        /// Override the configured research endpoint
        #[arg(long)]
        endpoint: Option<String>,
    },
    /// Check that a dataset exposes the required columns
    Validate {
        /// Input dataset (JSON array of records)
        #[arg(long)]
        input: PathBuf,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<PipelineConfig> {
    match path {
        Some(path) => Ok(PipelineConfig::load(path)?),
        None => Ok(PipelineConfig::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();

    match cli.command {
        Commands::Enrich {
            input,
            output,
            evidence_dir,
            config,
            concurrency,
            endpoint,
        } => {
            let mut config = load_config(config.as_ref())?;
            if let Some(concurrency) = concurrency {
                config.concurrency = concurrency;
            }
            if let Some(endpoint) = endpoint {
                config.research_endpoint = Some(endpoint);
            }

            let mut table = load_dataset(&input)?;
            info!(rows = table.row_count(), input = %input.display(), "Loaded dataset");

            let adapter: Arc<dyn ResearchAdapter> = match config.research_endpoint.as_deref() {
                Some(endpoint) => Arc::new(HttpResearchAdapter::new(endpoint)),
                None => {
                    println!("ℹ️  No research endpoint configured; running offline");
                    Arc::new(OfflineResearchAdapter)
                }
            };
            let evidence_sink: Arc<dyn EvidenceSink> =
                Arc::new(JsonFileEvidenceSink::new(&evidence_dir));
            let normalizer: Arc<dyn FieldNormalizer> = Arc::new(ZaFieldNormalizer::new());

            let orchestrator =
                PipelineOrchestrator::new(adapter, evidence_sink, normalizer, config);

            println!("🚀 Enriching {} rows...", table.row_count());
            match orchestrator.run(&mut table).await {
                Ok(report) => {
                    save_dataset(&table, &output)?;
                    let metrics = report.metrics;
                    println!("\n📊 Enrichment results (run {}):", report.run_id);
                    println!("   Rows:               {}", metrics.rows_total);
                    println!("   Processed:          {}", report.processed_rows);
                    println!("   Enriched:           {}", metrics.enriched_rows);
                    println!("   Verified:           {}", metrics.verified_rows);
                    println!("   Quality rejections: {}", metrics.quality_rejections);
                    println!("   Adapter failures:   {}", metrics.adapter_failures);
                    println!("   Sanity findings:    {}", metrics.sanity_issues);
                    println!("   Output file:        {}", output.display());

                    if !report.rollbacks.is_empty() {
                        println!("\n⚠️  Rejected changes:");
                        for action in &report.rollbacks {
                            println!(
                                "   - {} (row {}): {}",
                                action.organisation, action.row_id, action.reason
                            );
                        }
                    }
                }
                Err(e) => {
                    error!("Enrichment run failed: {}", e);
                    println!("❌ Enrichment run failed: {e}");
                    std::process::exit(1);
                }
            }
        }
        Commands::Validate { input } => {
            let table = load_dataset(&input)?;
            match check_schema(&table) {
                Ok(()) => {
                    println!(
                        "✅ Dataset exposes all required columns ({} rows)",
                        table.row_count()
                    );
                }
                Err(e) => {
                    println!("❌ {e}");
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
