use crate::domain::{OrgStatus, Province, ResearchFinding};
use crate::error::Result;
use crate::pipeline::processing::changes::EvidenceRecord;
use async_trait::async_trait;
use thiserror::Error;

/// A research lookup that could not produce a finding. Recoverable per row:
/// the orchestrator counts it and substitutes an empty finding.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdapterError {
    #[error("research request failed: {0}")]
    Request(String),

    #[error("research lookup timed out after {0}s")]
    Timeout(u64),

    #[error("research response malformed: {0}")]
    Malformed(String),
}

/// Supplies externally researched candidate data for one organisation.
#[async_trait]
pub trait ResearchAdapter: Send + Sync {
    async fn lookup(
        &self,
        name: &str,
        province: &str,
    ) -> std::result::Result<ResearchFinding, AdapterError>;
}

/// Persists the evidence ledger. Called once per run with the full batch.
#[async_trait]
pub trait EvidenceSink: Send + Sync {
    async fn record(&self, entries: &[EvidenceRecord]) -> Result<()>;
}

/// Field-level normalization and derivation rules. Synchronous and pure;
/// row processing never performs I/O through this seam.
pub trait FieldNormalizer: Send + Sync {
    /// Map free text to a canonical province, or Unknown.
    fn normalize_province(&self, raw: &str) -> Province;

    /// Canonicalize a phone number to E.164. Issues are non-empty exactly
    /// when the value fails validation (and the normalized value is None).
    fn normalize_phone(&self, raw: &str) -> (Option<String>, Vec<String>);

    /// Validate an email address. May report "MX lookup unavailable", which
    /// callers filter out before treating the address as invalid.
    fn validate_email(&self, raw: &str, org_domain: &str) -> (Option<String>, Vec<String>);

    /// Normalize a URL or host to a comparable domain key.
    fn canonical_domain(&self, url: &str) -> Option<String>;

    /// Derive the curation status from the record's evidence profile.
    fn determine_status(
        &self,
        has_website: bool,
        has_named_contact: bool,
        phone_issues: &[String],
        email_issues: &[String],
        has_multiple_sources: bool,
    ) -> OrgStatus;

    /// Fallback confidence when research supplies none.
    fn confidence_for_status(&self, status: OrgStatus, issue_count: usize) -> u8;
}
