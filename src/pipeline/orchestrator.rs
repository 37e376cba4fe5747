use crate::app::ports::{AdapterError, EvidenceSink, FieldNormalizer, ResearchAdapter};
use crate::config::PipelineConfig;
use crate::constants::{
    COL_CONTACT_EMAIL, COL_CONTACT_NUMBER, COL_CONTACT_PERSON, COL_NAME, COL_PROVINCE, COL_STATUS,
    COL_WEBSITE,
};
use crate::dataset::{check_schema, ColumnTable, RawRow};
use crate::domain::{OrgStatus, OrganisationRecord, ResearchFinding};
use crate::error::Result;
use crate::pipeline::processing::changes::{EvidenceRecord, RollbackAction};
use crate::pipeline::processing::quality_gate::QualityGate;
use crate::pipeline::processing::row::{QualityIssueRecord, RowProcessor, RowResult};
use crate::pipeline::processing::sanity::SanityCheckFinding;
use chrono::Utc;
use metrics::{counter, histogram};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Counters summarizing one enrichment run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PipelineMetrics {
    pub rows_total: u64,
    pub enriched_rows: u64,
    pub verified_rows: u64,
    pub issues_found: u64,
    pub adapter_failures: u64,
    pub sanity_issues: u64,
    pub quality_rejections: u64,
    pub quality_issues: u64,
}

/// Everything a run produced besides the updated dataset.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub run_id: Uuid,
    pub metrics: PipelineMetrics,
    /// Rows actually committed; equals rows_total unless cancelled
    pub processed_rows: usize,
    pub sanity_findings: Vec<SanityCheckFinding>,
    pub quality_issues: Vec<QualityIssueRecord>,
    pub rollbacks: Vec<RollbackAction>,
}

/// Cooperative cancellation for a running pipeline: stops new lookups while
/// already-completed rows still commit in order.
#[derive(Debug, Clone, Default)]
pub struct RunCancellation {
    flag: Arc<AtomicBool>,
}

impl RunCancellation {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

type LookupOutcome = std::result::Result<ResearchFinding, AdapterError>;

/// Drives RowProcessor across every row of a dataset. Lookups run on a
/// bounded worker pool; dataset commits and ledger appends happen in
/// original row order through this single writer.
pub struct PipelineOrchestrator {
    adapter: Arc<dyn ResearchAdapter>,
    evidence_sink: Arc<dyn EvidenceSink>,
    normalizer: Arc<dyn FieldNormalizer>,
    config: PipelineConfig,
    cancellation: RunCancellation,
}

impl PipelineOrchestrator {
    pub fn new(
        adapter: Arc<dyn ResearchAdapter>,
        evidence_sink: Arc<dyn EvidenceSink>,
        normalizer: Arc<dyn FieldNormalizer>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            adapter,
            evidence_sink,
            normalizer,
            config,
            cancellation: RunCancellation::default(),
        }
    }

    /// Handle for cancelling this orchestrator's runs.
    pub fn cancellation(&self) -> RunCancellation {
        self.cancellation.clone()
    }

    /// Run the full enrichment pass over a dataset. Always completes with a
    /// report and full ledgers; only a schema failure prevents a start.
    #[instrument(skip(self, table), fields(rows = table.row_count()))]
    pub async fn run(&self, table: &mut ColumnTable) -> Result<PipelineReport> {
        check_schema(table)?;

        let run_id = Uuid::new_v4();
        let run_started = Utc::now();
        let started = std::time::Instant::now();
        let rows_total = table.row_count();
        info!(%run_id, rows_total, "Starting enrichment run");
        counter!("fsd_enrichment_runs_total").increment(1);

        let mut originals: Vec<(String, RawRow, OrganisationRecord)> =
            Vec::with_capacity(rows_total);
        for idx in 0..rows_total {
            let name = table.text(idx, COL_NAME)?;
            let raw = table.raw_row(idx)?;
            let original = OrganisationRecord::from_raw(&name, &raw);
            originals.push((name, raw, original));
        }

        let mut lookups = self.run_lookups(&originals).await;

        let row_processor = RowProcessor::new(
            Arc::clone(&self.normalizer),
            QualityGate::with_config(self.config.gate_config()),
            run_started,
        );

        let mut metrics = PipelineMetrics {
            rows_total: rows_total as u64,
            ..PipelineMetrics::default()
        };
        let mut evidence: Vec<EvidenceRecord> = Vec::new();
        let mut sanity_findings: Vec<SanityCheckFinding> = Vec::new();
        let mut quality_issues: Vec<QualityIssueRecord> = Vec::new();
        let mut rollbacks: Vec<RollbackAction> = Vec::new();

        // Drain completed lookups in row order; the first gap ends the run.
        let mut committed = 0usize;
        for idx in 0..rows_total {
            let outcome = match lookups.remove(&idx) {
                Some(Some(outcome)) => outcome,
                _ => {
                    info!(
                        committed,
                        rows_total, "Run stopped before completion; committing finished prefix"
                    );
                    break;
                }
            };

            let (name, raw, original) = &originals[idx];
            let finding = match outcome {
                Ok(finding) => finding,
                Err(e) => {
                    metrics.adapter_failures += 1;
                    counter!("fsd_adapter_failures_total").increment(1);
                    warn!(row = idx, organisation = %name, error = %e, "Research lookup failed; continuing with empty finding");
                    ResearchFinding::with_note(format!("Research lookup failed: {e}"))
                }
            };

            let result = row_processor.process(idx, original, raw, &finding);

            if idx != committed {
                // Out-of-order commits corrupt the ledgers; this is a bug,
                // not a recoverable condition.
                panic!("row commit out of order: expected {committed}, got {idx}");
            }
            self.commit_row(table, idx, &result)?;
            committed += 1;

            metrics.issues_found += result.issue_count as u64;
            metrics.sanity_issues += result.sanity_findings.len() as u64;
            metrics.quality_issues += result.quality_issues.len() as u64;
            if result.updated {
                metrics.enriched_rows += 1;
            }
            if result.final_record.status == OrgStatus::Verified {
                metrics.verified_rows += 1;
            }
            if !result.accepted {
                metrics.quality_rejections += 1;
                counter!("fsd_quality_rejections_total").increment(1);
            }

            if let Some(entry) = result.evidence {
                evidence.push(entry);
            }
            if let Some(action) = result.rollback {
                rollbacks.push(action);
            }
            sanity_findings.extend(result.sanity_findings);
            quality_issues.extend(result.quality_issues);
            counter!("fsd_rows_processed_total").increment(1);
        }

        // Whole-dataset duplicate detection runs over every row, committed
        // or not, so a cancelled run still reports duplicate names.
        let duplicates = detect_duplicates(&originals);
        metrics.sanity_issues += duplicates.len() as u64;
        sanity_findings.extend(duplicates);

        self.evidence_sink.record(&evidence).await?;

        let duration_secs = started.elapsed().as_secs_f64();
        histogram!("fsd_run_duration_seconds").record(duration_secs);
        info!(
            %run_id,
            rows_total,
            committed,
            enriched = metrics.enriched_rows,
            rejected = metrics.quality_rejections,
            adapter_failures = metrics.adapter_failures,
            "Enrichment run complete"
        );

        Ok(PipelineReport {
            run_id,
            metrics,
            processed_rows: committed,
            sanity_findings,
            quality_issues,
            rollbacks,
        })
    }

    /// Fan lookups out over the bounded worker pool and buffer results by
    /// row index. Only this step may block on I/O.
    async fn run_lookups(
        &self,
        originals: &[(String, RawRow, OrganisationRecord)],
    ) -> BTreeMap<usize, Option<LookupOutcome>> {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let timeout_secs = self.config.lookup_timeout_secs;
        let mut join_set = JoinSet::new();

        for (idx, (name, _, original)) in originals.iter().enumerate() {
            let adapter = Arc::clone(&self.adapter);
            let semaphore = Arc::clone(&semaphore);
            let cancellation = self.cancellation.clone();
            let name = name.clone();
            let province = original.province.as_str().to_string();

            join_set.spawn(async move {
                if cancellation.is_cancelled() {
                    return (idx, None);
                }
                let permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (idx, None),
                };
                if cancellation.is_cancelled() {
                    return (idx, None);
                }
                let outcome = match tokio::time::timeout(
                    Duration::from_secs(timeout_secs),
                    adapter.lookup(&name, &province),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(AdapterError::Timeout(timeout_secs)),
                };
                drop(permit);
                (idx, Some(outcome))
            });
        }

        let mut lookups: BTreeMap<usize, Option<LookupOutcome>> = BTreeMap::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((idx, outcome)) => {
                    lookups.insert(idx, outcome);
                }
                Err(e) => {
                    // The affected index stays absent and truncates the
                    // committed prefix.
                    error!(error = %e, "Lookup task failed to join");
                }
            }
        }
        lookups
    }

    /// Write one finalized record back into the dataset. Non-null fields
    /// overwrite; sanity-cleared columns are blanked afterwards.
    fn commit_row(&self, table: &mut ColumnTable, idx: usize, result: &RowResult) -> Result<()> {
        let record = &result.final_record;
        if let Some(website) = record.website_url.as_deref() {
            table.set_text(idx, COL_WEBSITE, website)?;
        }
        if let Some(person) = record.contact_person.as_deref() {
            table.set_text(idx, COL_CONTACT_PERSON, person)?;
        }
        if let Some(number) = record.contact_number.as_deref() {
            table.set_text(idx, COL_CONTACT_NUMBER, number)?;
        }
        if let Some(email) = record.contact_email.as_deref() {
            table.set_text(idx, COL_CONTACT_EMAIL, email)?;
        }
        table.set_text(idx, COL_STATUS, record.status.as_str())?;
        table.set_text(idx, COL_PROVINCE, record.province.as_str())?;

        for column in &result.columns_to_clear {
            table.blank(idx, column)?;
        }
        Ok(())
    }
}

/// Case-insensitive, trimmed duplicate detection over organisation names:
/// every row sharing a name that occurs at least twice gets one finding.
fn detect_duplicates(
    originals: &[(String, RawRow, OrganisationRecord)],
) -> Vec<SanityCheckFinding> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for (name, _, _) in originals {
        let key = name.trim().to_lowercase();
        if key.is_empty() {
            continue;
        }
        *counts.entry(key).or_insert(0) += 1;
    }

    originals
        .iter()
        .enumerate()
        .filter(|(_, (name, _, _))| {
            counts
                .get(&name.trim().to_lowercase())
                .is_some_and(|&count| count >= 2)
        })
        .map(|(idx, (name, _, _))| SanityCheckFinding {
            row_id: idx,
            organisation: name.trim().to_string(),
            issue: "duplicate_organisation".to_string(),
            remediation: "Merge or disambiguate duplicate organisation entries".to_string(),
        })
        .collect()
}
