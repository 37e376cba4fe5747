use crate::app::ports::FieldNormalizer;
use crate::constants::MX_UNAVAILABLE_ISSUE;
use crate::dataset::RawRow;
use crate::domain::{OrgStatus, OrganisationRecord, ResearchFinding};
use crate::pipeline::processing::changes::{
    build_rollback, describe_changes, diff_records, EvidenceRecord, RollbackAction,
};
use crate::pipeline::processing::quality_gate::{GateContext, QualityGate, Severity};
use crate::pipeline::processing::sanity::{run_sanity_checks, SanityCheckFinding};
use crate::pipeline::processing::sources::{merge_sources, tally_sources};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// A quality finding ledgered against a rejected row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityIssueRecord {
    pub row_id: usize,
    pub organisation: String,
    pub code: String,
    pub severity: Severity,
    pub message: String,
    pub remediation: Option<String>,
}

/// Everything one row's processing produced: the record to commit plus all
/// side-channel artifacts for the run ledgers.
#[derive(Debug, Clone)]
pub struct RowResult {
    pub final_record: OrganisationRecord,
    /// True when the gate accepted a non-empty change set
    pub updated: bool,
    /// False only when the gate rejected the change set
    pub accepted: bool,
    pub confidence: u8,
    pub evidence: Option<EvidenceRecord>,
    pub rollback: Option<RollbackAction>,
    pub sanity_findings: Vec<SanityCheckFinding>,
    pub quality_issues: Vec<QualityIssueRecord>,
    pub columns_to_clear: Vec<String>,
    /// Validation issue strings observed while merging
    pub issue_count: usize,
}

/// Transforms one (original record, research finding) pair into a final
/// record. Pure given its collaborators: raises no new error classes, and
/// adapter failures are handled one level up.
pub struct RowProcessor {
    normalizer: Arc<dyn FieldNormalizer>,
    gate: QualityGate,
    run_timestamp: DateTime<Utc>,
}

fn trimmed_non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl RowProcessor {
    pub fn new(
        normalizer: Arc<dyn FieldNormalizer>,
        gate: QualityGate,
        run_timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            normalizer,
            gate,
            run_timestamp,
        }
    }

    pub fn process(
        &self,
        row_id: usize,
        original: &OrganisationRecord,
        raw: &RawRow,
        finding: &ResearchFinding,
    ) -> RowResult {
        let normalizer = self.normalizer.as_ref();

        // Step 1: clone the original; the proposed record never aliases it.
        let mut proposed = original.clone();
        proposed.province = normalizer.normalize_province(&raw.province);

        // Step 2: merge candidate sources and score the evidence.
        let original_sources: Vec<String> =
            original.website_url.iter().cloned().collect();
        let mut sources = merge_sources(original.website_url.as_deref(), finding);
        let tally = tally_sources(normalizer, &original_sources, &sources);

        // Step 3: adopt the researched website only when the record has
        // none or the canonical domain actually moves.
        if let Some(found_website) = trimmed_non_empty(finding.website_url.as_deref()) {
            let adopt = match proposed.website_url.as_deref() {
                None | Some("") => true,
                Some(current) => {
                    normalizer.canonical_domain(found_website)
                        != normalizer.canonical_domain(current)
                }
            };
            if adopt {
                proposed.website_url = Some(found_website.to_string());
            }
        }

        // Step 4: a named contact is only filled in, never replaced.
        if proposed.contact_person.is_none() {
            if let Some(person) = trimmed_non_empty(finding.contact_person.as_deref()) {
                proposed.contact_person = Some(person.to_string());
            }
        }

        // Step 5: phone and email go through the validators; failed
        // normalization clears a previously held value.
        let mut phone_issues: Vec<String> = Vec::new();
        let phone_candidate = trimmed_non_empty(finding.contact_phone.as_deref())
            .map(str::to_string)
            .or_else(|| proposed.contact_number.clone());
        if let Some(candidate) = phone_candidate {
            let (normalized, issues) = normalizer.normalize_phone(&candidate);
            phone_issues = issues;
            match normalized {
                Some(value) if !value.is_empty() => {
                    if proposed.contact_number.as_deref() != Some(value.as_str()) {
                        proposed.contact_number = Some(value);
                    }
                }
                _ => {
                    if proposed.contact_number.is_some() {
                        proposed.contact_number = None;
                    }
                }
            }
        }

        let mut email_issues: Vec<String> = Vec::new();
        let email_candidate = trimmed_non_empty(finding.contact_email.as_deref())
            .map(str::to_string)
            .or_else(|| proposed.contact_email.clone());
        if let Some(candidate) = email_candidate {
            let org_domain = proposed
                .website_url
                .as_deref()
                .and_then(|w| normalizer.canonical_domain(w))
                .unwrap_or_default();
            let (validated, issues) = normalizer.validate_email(&candidate, &org_domain);
            email_issues = issues;
            match validated {
                Some(value) if !value.is_empty() => {
                    if proposed.contact_email.as_deref() != Some(value.as_str()) {
                        proposed.contact_email = Some(value);
                    }
                }
                _ => {
                    if proposed.contact_email.is_some() {
                        proposed.contact_email = None;
                    }
                }
            }
        }

        // An unavailable MX check never makes an email invalid.
        let filtered_email_issues: Vec<String> = email_issues
            .iter()
            .filter(|issue| issue.as_str() != MX_UNAVAILABLE_ISSUE)
            .cloned()
            .collect();

        // Step 6: derive status. Compliance holds are never recomputed.
        if original.status != OrgStatus::DoNotContact {
            proposed.status = normalizer.determine_status(
                proposed.website_url.is_some(),
                proposed.contact_person.is_some(),
                &phone_issues,
                &filtered_email_issues,
                tally.total >= 2,
            );
        }

        // Step 7: sanity pass may remediate the proposed record in place.
        let sanity = run_sanity_checks(
            row_id,
            original,
            &mut proposed,
            &mut sources,
            &phone_issues,
            &filtered_email_issues,
        );

        // Step 8: diff the snapshots.
        let changes = diff_records(original, &proposed);
        let issue_count = phone_issues.len() + filtered_email_issues.len();

        // Steps 9-10: gate a non-empty change set and finalize.
        if changes.is_empty() {
            debug!(row_id, organisation = %original.name, "No changes proposed");
            return RowResult {
                final_record: proposed,
                updated: false,
                accepted: true,
                confidence: 0,
                evidence: None,
                rollback: None,
                sanity_findings: sanity.findings,
                quality_issues: Vec::new(),
                columns_to_clear: sanity.columns_to_clear,
                issue_count,
            };
        }

        let decision = self.gate.evaluate(
            normalizer,
            GateContext {
                original,
                proposed: &proposed,
                changes: &changes,
                finding,
                sources: &tally,
                phone_issues: &phone_issues,
                email_issues: &filtered_email_issues,
            },
        );

        let mut notes: Vec<String> = Vec::new();
        if let Some(note) = trimmed_non_empty(finding.notes.as_deref()) {
            notes.push(note.to_string());
        }
        notes.extend(finding.investigation_notes.iter().cloned());
        notes.extend(sanity.notes.iter().cloned());

        let (final_record, updated, confidence, rollback, quality_issues) = if decision.accepted {
            let confidence = finding.confidence.unwrap_or_else(|| {
                normalizer.confidence_for_status(proposed.status, issue_count)
            });
            debug!(
                row_id,
                organisation = %original.name,
                changed = changes.len(),
                confidence,
                "Change set accepted"
            );
            (proposed.clone(), true, confidence, None, Vec::new())
        } else {
            notes.push("Change rejected by quality gate".to_string());
            let issues: Vec<QualityIssueRecord> = decision
                .findings
                .iter()
                .map(|f| QualityIssueRecord {
                    row_id,
                    organisation: original.name.clone(),
                    code: f.code.clone(),
                    severity: f.severity,
                    message: f.message.clone(),
                    remediation: f.remediation.clone(),
                })
                .collect();
            let rollback = build_rollback(row_id, &original.name, &changes, &decision.findings);
            let fallback = decision
                .fallback_record
                .clone()
                .unwrap_or_else(|| original.clone());
            debug!(
                row_id,
                organisation = %original.name,
                findings = decision.findings.len(),
                "Change set rejected"
            );
            (fallback, false, 0, Some(rollback), issues)
        };

        let evidence = EvidenceRecord {
            row_id,
            organisation: original.name.clone(),
            changes: describe_changes(raw, &proposed),
            sources: sources.clone(),
            notes: notes.join("; "),
            confidence,
            timestamp: self.run_timestamp,
        };

        RowResult {
            final_record,
            updated,
            accepted: decision.accepted,
            confidence,
            evidence: Some(evidence),
            rollback,
            sanity_findings: sanity.findings,
            quality_issues,
            columns_to_clear: sanity.columns_to_clear,
            issue_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::normalizer::ZaFieldNormalizer;

    fn create_processor() -> RowProcessor {
        RowProcessor::new(
            Arc::new(ZaFieldNormalizer::new()),
            QualityGate::new(),
            Utc::now(),
        )
    }

    fn create_test_row() -> (OrganisationRecord, RawRow) {
        let raw = RawRow {
            province: "Gauteng".into(),
            status: "Candidate".into(),
            ..RawRow::default()
        };
        let original = OrganisationRecord::from_raw("Aero Academy", &raw);
        (original, raw)
    }

    #[test]
    fn single_source_website_is_rejected_with_rollback() {
        // Scenario: new website backed by one source only
        let (original, raw) = create_test_row();
        let finding = ResearchFinding {
            website_url: Some("https://x.gov.za".to_string()),
            sources: vec!["https://x.gov.za".to_string()],
            confidence: Some(90),
            ..ResearchFinding::default()
        };

        let result = create_processor().process(0, &original, &raw, &finding);

        assert!(!result.accepted);
        assert!(!result.updated);
        assert_eq!(result.confidence, 0);
        assert_eq!(result.final_record.status, OrgStatus::NeedsReview);
        assert_eq!(result.final_record.website_url, None);

        let rollback = result.rollback.unwrap();
        assert_eq!(rollback.columns, vec!["Website URL".to_string()]);
        assert_eq!(
            rollback.previous_values.get("Website URL").map(String::as_str),
            Some("")
        );
        assert!(result
            .quality_issues
            .iter()
            .any(|i| i.code == "insufficient_evidence"));

        let evidence = result.evidence.unwrap();
        assert!(evidence.changes.contains("Website URL -> https://x.gov.za"));
        assert!(evidence.notes.contains("Change rejected by quality gate"));
    }

    #[test]
    fn two_source_website_is_accepted() {
        // Scenario: same change, second independent source
        let (original, raw) = create_test_row();
        let finding = ResearchFinding {
            website_url: Some("https://x.gov.za".to_string()),
            sources: vec!["https://x.gov.za".to_string(), "https://y.co.za".to_string()],
            confidence: Some(90),
            ..ResearchFinding::default()
        };

        let result = create_processor().process(0, &original, &raw, &finding);

        assert!(result.accepted);
        assert!(result.updated);
        assert_eq!(result.confidence, 90);
        assert_eq!(result.final_record.website_url.as_deref(), Some("https://x.gov.za"));
        assert!(result.rollback.is_none());
        assert!(result.quality_issues.is_empty());
    }

    #[test]
    fn phone_is_normalized_into_the_change_set() {
        let raw = RawRow {
            province: "Gauteng".into(),
            status: "Candidate".into(),
            contact_number: "011 555 0100".into(),
            website_url: "https://aero.co.za".into(),
            ..RawRow::default()
        };
        let original = OrganisationRecord::from_raw("Aero Academy", &raw);
        // Fresh official backing so the normalized number passes the gate
        let finding = ResearchFinding {
            sources: vec![
                "https://caa.co.za/register".to_string(),
                "https://y.co.za".to_string(),
            ],
            ..ResearchFinding::default()
        };

        let result = create_processor().process(0, &original, &raw, &finding);

        assert!(result.accepted);
        assert_eq!(
            result.final_record.contact_number.as_deref(),
            Some("+27115550100")
        );
        let evidence = result.evidence.unwrap();
        assert!(evidence.changes.contains("Contact Number -> +27115550100"));
    }

    #[test]
    fn unparseable_phone_is_cleared_with_finding() {
        let raw = RawRow {
            province: "Gauteng".into(),
            status: "Candidate".into(),
            contact_number: "invalid".into(),
            ..RawRow::default()
        };
        let original = OrganisationRecord::from_raw("Aero Academy", &raw);
        let finding = ResearchFinding::default();

        let result = create_processor().process(0, &original, &raw, &finding);

        assert_eq!(result.final_record.contact_number, None);
        assert!(result
            .sanity_findings
            .iter()
            .any(|f| f.issue == "contact_number_invalid"));
        assert_eq!(result.columns_to_clear, vec!["Contact Number".to_string()]);
    }

    #[test]
    fn schemeless_website_from_research_is_rewritten() {
        let (original, raw) = create_test_row();
        let finding = ResearchFinding {
            website_url: Some("test.co.za".to_string()),
            sources: vec!["test.co.za".to_string(), "https://caa.co.za/register".to_string()],
            confidence: Some(85),
            ..ResearchFinding::default()
        };

        let result = create_processor().process(0, &original, &raw, &finding);

        assert!(result.accepted);
        assert_eq!(
            result.final_record.website_url.as_deref(),
            Some("https://test.co.za")
        );
        assert!(result
            .sanity_findings
            .iter()
            .any(|f| f.issue == "website_url_missing_scheme"));
        let evidence = result.evidence.unwrap();
        assert!(evidence.sources.contains(&"https://test.co.za".to_string()));
    }

    #[test]
    fn row_without_changes_produces_no_evidence() {
        let raw = RawRow {
            province: "Gauteng".into(),
            status: "Candidate".into(),
            website_url: "https://aero.co.za".into(),
            ..RawRow::default()
        };
        let original = OrganisationRecord::from_raw("Aero Academy", &raw);
        // A candidate with a website and no further evidence stays put
        let finding = ResearchFinding {
            website_url: Some("https://aero.co.za".to_string()),
            ..ResearchFinding::default()
        };

        let result = create_processor().process(0, &original, &raw, &finding);

        assert!(result.evidence.is_none());
        assert!(!result.updated);
        assert_eq!(result.confidence, 0);
        assert_eq!(result.final_record, original);
    }

    #[test]
    fn compliance_hold_status_is_preserved(){
        let raw = RawRow {
            province: "Gauteng".into(),
            status: "Do Not Contact (Compliance)".into(),
            website_url: "https://aero.co.za".into(),
            ..RawRow::default()
        };
        let original = OrganisationRecord::from_raw("Aero Academy", &raw);
        let finding = ResearchFinding {
            contact_person: Some("Thandi Ngwenya".to_string()),
            sources: vec![
                "https://caa.co.za/register".to_string(),
                "https://y.co.za".to_string(),
            ],
            confidence: Some(95),
            ..ResearchFinding::default()
        };

        let result = create_processor().process(0, &original, &raw, &finding);

        assert_eq!(result.final_record.status, OrgStatus::DoNotContact);
    }

    #[test]
    fn contact_person_is_not_replaced() {
        let raw = RawRow {
            province: "Gauteng".into(),
            status: "Candidate".into(),
            contact_person: "Sipho Dlamini".into(),
            ..RawRow::default()
        };
        let original = OrganisationRecord::from_raw("Aero Academy", &raw);
        let finding = ResearchFinding {
            contact_person: Some("Thandi Ngwenya".to_string()),
            ..ResearchFinding::default()
        };

        let result = create_processor().process(0, &original, &raw, &finding);

        assert_eq!(
            result.final_record.contact_person.as_deref(),
            Some("Sipho Dlamini")
        );
    }
}
