/// Demo: run the enrichment pipeline end to end against an in-memory
/// dataset and fixture research findings.
/// Flow: dataset → lookups → row merge → sanity → quality gate → commit
use fsd_enricher::{
    app::ports::{AdapterError, EvidenceSink, FieldNormalizer, ResearchAdapter},
    config::PipelineConfig,
    constants::{
        COL_CONTACT_EMAIL, COL_CONTACT_NUMBER, COL_CONTACT_PERSON, COL_NAME, COL_PROVINCE,
        COL_STATUS, COL_WEBSITE,
    },
    dataset::ColumnTable,
    domain::ResearchFinding,
    infra::{
        evidence::MemoryEvidenceSink, normalizer::ZaFieldNormalizer,
        research::FixtureResearchAdapter,
    },
    logging,
    pipeline::PipelineOrchestrator,
};
use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

/// Wraps the fixture adapter with a jittered delay so the bounded worker
/// pool actually interleaves lookups.
struct SlowAdapter {
    inner: FixtureResearchAdapter,
}

#[async_trait]
impl ResearchAdapter for SlowAdapter {
    async fn lookup(
        &self,
        name: &str,
        province: &str,
    ) -> Result<ResearchFinding, AdapterError> {
        let jitter_ms = rand::thread_rng().gen_range(10..60);
        tokio::time::sleep(Duration::from_millis(jitter_ms)).await;
        self.inner.lookup(name, province).await
    }
}

fn demo_dataset() -> ColumnTable {
    ColumnTable::from_text_columns(vec![
        (
            COL_NAME,
            vec![
                "Aero Academy",
                "Cloudbase Flight School",
                "Karoo Wings",
                "aero academy",
                "Highveld Aviation",
            ],
        ),
        (COL_PROVINCE, vec!["Gauteng", "WC", "Northern Cape", "Gauteng", "gp"]),
        (
            COL_STATUS,
            vec!["Candidate", "Candidate", "Candidate", "Candidate", "Candidate"],
        ),
        (COL_WEBSITE, vec!["", "https://cloudbase.co.za", "", "", ""]),
        (COL_CONTACT_PERSON, vec!["", "", "", "", ""]),
        (COL_CONTACT_NUMBER, vec!["", "011 555 0100", "not a number", "", ""]),
        (COL_CONTACT_EMAIL, vec!["", "", "", "", ""]),
    ])
    .expect("demo dataset is well formed")
}

fn demo_findings() -> Vec<(String, ResearchFinding)> {
    vec![
        (
            // Well-evidenced website: accepted
            "Aero Academy".to_string(),
            ResearchFinding {
                website_url: Some("https://aeroacademy.co.za".to_string()),
                contact_person: Some("Thandi Ngwenya".to_string()),
                sources: vec![
                    "https://aeroacademy.co.za".to_string(),
                    "https://caa.co.za/ato-register".to_string(),
                ],
                confidence: Some(88),
                notes: Some("Matched ATO register entry".to_string()),
                ..ResearchFinding::default()
            },
        ),
        (
            // Single-source contact change: rejected by the gate
            "Karoo Wings".to_string(),
            ResearchFinding {
                contact_email: Some("fly@karoowings.co.za".to_string()),
                sources: vec!["https://karoowings.co.za".to_string()],
                confidence: Some(90),
                ..ResearchFinding::default()
            },
        ),
        (
            // Scheme-less website: sanity checker rewrites it
            "Highveld Aviation".to_string(),
            ResearchFinding {
                website_url: Some("highveld-aviation.co.za".to_string()),
                sources: vec![
                    "highveld-aviation.co.za".to_string(),
                    "https://www.gov.za/aviation-directory".to_string(),
                ],
                confidence: Some(82),
                ..ResearchFinding::default()
            },
        ),
    ]
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging();
    dotenv::dotenv().ok();

    let mut table = demo_dataset();
    let adapter = Arc::new(SlowAdapter {
        inner: FixtureResearchAdapter::new(demo_findings()),
    });
    let evidence_sink = Arc::new(MemoryEvidenceSink::new());
    let normalizer: Arc<dyn FieldNormalizer> = Arc::new(ZaFieldNormalizer::new());

    let orchestrator = PipelineOrchestrator::new(
        adapter,
        Arc::clone(&evidence_sink) as Arc<dyn EvidenceSink>,
        normalizer,
        PipelineConfig::default(),
    );

    println!("🚀 Running demo enrichment over {} rows...", table.row_count());
    let report = orchestrator.run(&mut table).await?;

    println!("\n📊 Metrics:");
    println!("   Rows:               {}", report.metrics.rows_total);
    println!("   Enriched:           {}", report.metrics.enriched_rows);
    println!("   Verified:           {}", report.metrics.verified_rows);
    println!("   Quality rejections: {}", report.metrics.quality_rejections);
    println!("   Sanity findings:    {}", report.metrics.sanity_issues);

    println!("\n📋 Final rows:");
    for idx in 0..table.row_count() {
        println!(
            "   {} | {} | {} | {} | {}",
            table.text(idx, COL_NAME)?,
            table.text(idx, COL_PROVINCE)?,
            table.text(idx, COL_STATUS)?,
            table.text(idx, COL_WEBSITE)?,
            table.text(idx, COL_CONTACT_NUMBER)?,
        );
    }

    println!("\n🧾 Evidence ledger:");
    for entry in evidence_sink.entries() {
        println!(
            "   row {} | {} | confidence {} | {}",
            entry.row_id, entry.organisation, entry.confidence, entry.changes
        );
    }

    if !report.rollbacks.is_empty() {
        println!("\n⚠️  Rollback plan:");
        for action in &report.rollbacks {
            println!(
                "   row {} | {} | columns {:?}\n     reason: {}",
                action.row_id, action.organisation, action.columns, action.reason
            );
        }
    }

    Ok(())
}
