use crate::app::ports::FieldNormalizer;
use crate::constants::{COL_CONTACT_EMAIL, COL_CONTACT_NUMBER, COL_CONTACT_PERSON, COL_WEBSITE};
use crate::domain::{OrgStatus, OrganisationRecord, ResearchFinding};
use crate::pipeline::processing::changes::ChangeSet;
use crate::pipeline::processing::sources::SourceTally;
use serde::{Deserialize, Serialize};

/// Thresholds for the accept/reject decision.
#[derive(Debug, Clone)]
pub struct QualityGateConfig {
    /// Minimum research confidence for high-risk changes
    pub min_confidence: u8,
    /// Require an official register source for high-risk changes
    pub require_official_source: bool,
}

impl Default for QualityGateConfig {
    fn default() -> Self {
        Self {
            min_confidence: 70,
            require_official_source: true,
        }
    }
}

/// Severity of a quality finding. Only blocking findings reject a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Block,
    Warn,
}

/// One rule violation found while evaluating a change set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityFinding {
    pub code: String,
    pub severity: Severity,
    pub message: String,
    pub remediation: Option<String>,
}

impl QualityFinding {
    fn block(code: &str, message: String, remediation: &str) -> Self {
        Self {
            code: code.to_string(),
            severity: Severity::Block,
            message,
            remediation: Some(remediation.to_string()),
        }
    }

    fn warn(code: &str, message: String, remediation: &str) -> Self {
        Self {
            code: code.to_string(),
            severity: Severity::Warn,
            message,
            remediation: Some(remediation.to_string()),
        }
    }
}

/// Verdict on one row's change set. `fallback_record` is present exactly
/// when the change is rejected; its status is forced to Needs Review unless
/// it already was.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityGateDecision {
    pub accepted: bool,
    pub findings: Vec<QualityFinding>,
    pub fallback_record: Option<OrganisationRecord>,
}

impl QualityGateDecision {
    pub fn blocking_findings(&self) -> Vec<&QualityFinding> {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Block)
            .collect()
    }
}

/// Everything the gate needs to judge one row. Validation issue lists are
/// the ones RowProcessor observed while merging (emails already filtered of
/// the MX-unavailable marker).
pub struct GateContext<'a> {
    pub original: &'a OrganisationRecord,
    pub proposed: &'a OrganisationRecord,
    pub changes: &'a ChangeSet,
    pub finding: &'a ResearchFinding,
    pub sources: &'a SourceTally,
    pub phone_issues: &'a [String],
    pub email_issues: &'a [String],
}

/// Accept/reject decision engine guarding writes to curated fields.
/// Evaluation accumulates: every applicable rule runs and appends before
/// the verdict is computed, so co-occurring violations all surface.
pub struct QualityGate {
    config: QualityGateConfig,
}

impl QualityGate {
    pub fn new() -> Self {
        Self {
            config: QualityGateConfig::default(),
        }
    }

    pub fn with_config(config: QualityGateConfig) -> Self {
        Self { config }
    }

    /// High-risk columns whose change is meaningful and carries a non-empty
    /// new value. Website changes only count when the canonical domain
    /// actually moves; contact changes only count when a value is written.
    fn meaningful_high_risk_columns(
        &self,
        normalizer: &dyn FieldNormalizer,
        ctx: &GateContext<'_>,
    ) -> Vec<&'static str> {
        let mut columns = Vec::new();

        if let Some(change) = ctx.changes.get(COL_WEBSITE) {
            if !change.new.is_empty() {
                let old_domain = normalizer.canonical_domain(&change.old);
                let new_domain = normalizer.canonical_domain(&change.new);
                if old_domain != new_domain {
                    columns.push(COL_WEBSITE);
                }
            }
        }
        for column in [COL_CONTACT_PERSON, COL_CONTACT_NUMBER, COL_CONTACT_EMAIL] {
            if let Some(change) = ctx.changes.get(column) {
                if !change.new.is_empty() {
                    columns.push(column);
                }
            }
        }
        columns
    }

    /// Evaluate one row's change set. All applicable rules run; the verdict
    /// is issued only after every finding has been collected.
    pub fn evaluate(
        &self,
        normalizer: &dyn FieldNormalizer,
        ctx: GateContext<'_>,
    ) -> QualityGateDecision {
        let mut findings = Vec::new();

        let high_risk = self.meaningful_high_risk_columns(normalizer, &ctx);
        if !high_risk.is_empty() {
            self.check_evidence(&ctx, &mut findings);
            self.check_confidence(&ctx, &mut findings);
        }
        self.check_phone(&ctx, &mut findings);
        self.check_email(&ctx, &mut findings);
        self.check_website_domain(normalizer, &ctx, &mut findings);

        let accepted = findings.iter().all(|f| f.severity != Severity::Block);
        let fallback_record = if accepted {
            None
        } else {
            Some(fallback_record(ctx.original))
        };

        QualityGateDecision {
            accepted,
            findings,
            fallback_record,
        }
    }

    fn check_evidence(&self, ctx: &GateContext<'_>, findings: &mut Vec<QualityFinding>) {
        let sources = ctx.sources;
        if sources.total < 2 {
            findings.push(QualityFinding::block(
                "insufficient_evidence",
                format!(
                    "Only {} unique source(s) support the proposed change; at least 2 are required",
                    sources.total
                ),
                "Gather a second independent source before applying the change",
            ));
        }
        if sources.fresh == 0 {
            findings.push(QualityFinding::block(
                "no_fresh_evidence",
                "All supporting sources were already attached to the record".to_string(),
                "Find a source not previously linked to this organisation",
            ));
        }
        if self.config.require_official_source {
            if sources.official == 0 {
                findings.push(QualityFinding::block(
                    "missing_official_source",
                    "No official register or regulator source supports the change".to_string(),
                    "Cross-check the organisation against an official register such as caa.co.za",
                ));
            } else if sources.official_fresh == 0 {
                findings.push(QualityFinding::block(
                    "official_source_not_fresh",
                    "Official sources are present but none are newly discovered".to_string(),
                    "Re-verify the change against a fresh official source",
                ));
            }
        } else if sources.official == 0 {
            // Downgraded rather than dropped when official sourcing is optional
            findings.push(QualityFinding::warn(
                "missing_official_source",
                "No official register or regulator source supports the change".to_string(),
                "Cross-check the organisation against an official register such as caa.co.za",
            ));
        }
    }

    fn check_confidence(&self, ctx: &GateContext<'_>, findings: &mut Vec<QualityFinding>) {
        if let Some(confidence) = ctx.finding.confidence {
            if confidence < self.config.min_confidence {
                findings.push(QualityFinding::block(
                    "low_confidence",
                    format!(
                        "Research confidence {} is below the minimum of {}",
                        confidence, self.config.min_confidence
                    ),
                    "Re-run research or verify the change manually",
                ));
            }
        }
    }

    fn check_phone(&self, ctx: &GateContext<'_>, findings: &mut Vec<QualityFinding>) {
        let proposed_phone = ctx.proposed.contact_number.as_deref().unwrap_or_default();
        if !ctx.phone_issues.is_empty()
            && !proposed_phone.is_empty()
            && ctx.changes.contains(COL_CONTACT_NUMBER)
        {
            findings.push(QualityFinding::block(
                "invalid_phone",
                format!(
                    "Proposed contact number failed validation: {}",
                    ctx.phone_issues.join("; ")
                ),
                "Source a phone number that validates as a South African number",
            ));
        }
    }

    fn check_email(&self, ctx: &GateContext<'_>, findings: &mut Vec<QualityFinding>) {
        let proposed_email = ctx.proposed.contact_email.as_deref().unwrap_or_default();
        if !ctx.email_issues.is_empty()
            && !proposed_email.is_empty()
            && ctx.changes.contains(COL_CONTACT_EMAIL)
        {
            let mut unique: Vec<&str> = ctx.email_issues.iter().map(|s| s.as_str()).collect();
            unique.sort();
            unique.dedup();
            findings.push(QualityFinding::block(
                "invalid_email",
                format!("Proposed email address failed validation: {}", unique.join("; ")),
                "Source a deliverable email address for the organisation",
            ));
        }
    }

    fn check_website_domain(
        &self,
        normalizer: &dyn FieldNormalizer,
        ctx: &GateContext<'_>,
        findings: &mut Vec<QualityFinding>,
    ) {
        let Some(change) = ctx.changes.get(COL_WEBSITE) else {
            return;
        };
        let old_domain = normalizer.canonical_domain(&change.old).unwrap_or_default();
        let new_domain = normalizer.canonical_domain(&change.new).unwrap_or_default();
        if !old_domain.is_empty()
            && !new_domain.is_empty()
            && old_domain != new_domain
            && ctx.sources.official == 0
        {
            findings.push(QualityFinding::block(
                "website_domain_unverified",
                format!(
                    "Website domain would change from {old_domain} to {new_domain} without an official source"
                ),
                "Verify the new domain against an official register before replacing it",
            ));
        }
    }
}

impl Default for QualityGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministic fallback for rejected changes: the original record with
/// its status forced to Needs Review (no-op if already there).
pub fn fallback_record(original: &OrganisationRecord) -> OrganisationRecord {
    let mut fallback = original.clone();
    if fallback.status != OrgStatus::NeedsReview {
        fallback.status = OrgStatus::NeedsReview;
    }
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Province;
    use crate::infra::normalizer::ZaFieldNormalizer;
    use crate::pipeline::processing::changes::diff_records;
    use crate::pipeline::processing::sources::{merge_sources, tally_sources};

    fn create_test_record() -> OrganisationRecord {
        OrganisationRecord {
            name: "Aero Academy".to_string(),
            province: Province::Gauteng,
            status: OrgStatus::Candidate,
            website_url: None,
            contact_person: None,
            contact_number: None,
            contact_email: None,
        }
    }

    struct GateFixture {
        original: OrganisationRecord,
        proposed: OrganisationRecord,
        finding: ResearchFinding,
        changes: ChangeSet,
        tally: SourceTally,
        phone_issues: Vec<String>,
        email_issues: Vec<String>,
    }

    impl GateFixture {
        fn new(proposed: OrganisationRecord, finding: ResearchFinding) -> Self {
            let normalizer = ZaFieldNormalizer::new();
            let original = create_test_record();
            let changes = diff_records(&original, &proposed);
            let merged = merge_sources(original.website_url.as_deref(), &finding);
            let tally = tally_sources(&normalizer, &[], &merged);
            Self {
                original,
                proposed,
                finding,
                changes,
                tally,
                phone_issues: Vec::new(),
                email_issues: Vec::new(),
            }
        }

        fn evaluate(&self, gate: &QualityGate) -> QualityGateDecision {
            let normalizer = ZaFieldNormalizer::new();
            gate.evaluate(
                &normalizer,
                GateContext {
                    original: &self.original,
                    proposed: &self.proposed,
                    changes: &self.changes,
                    finding: &self.finding,
                    sources: &self.tally,
                    phone_issues: &self.phone_issues,
                    email_issues: &self.email_issues,
                },
            )
        }
    }

    fn codes(decision: &QualityGateDecision) -> Vec<&str> {
        decision.findings.iter().map(|f| f.code.as_str()).collect()
    }

    #[test]
    fn single_source_change_is_blocked() {
        // Scenario: a new website backed by one official source only
        let mut proposed = create_test_record();
        proposed.website_url = Some("https://x.gov.za".to_string());
        let finding = ResearchFinding {
            website_url: Some("https://x.gov.za".to_string()),
            sources: vec!["https://x.gov.za".to_string()],
            confidence: Some(90),
            ..ResearchFinding::default()
        };

        let fixture = GateFixture::new(proposed, finding);
        let decision = fixture.evaluate(&QualityGate::new());

        assert!(!decision.accepted);
        assert!(codes(&decision).contains(&"insufficient_evidence"));
        let fallback = decision.fallback_record.unwrap();
        assert_eq!(fallback.status, OrgStatus::NeedsReview);
        assert_eq!(fallback.website_url, None);
    }

    #[test]
    fn two_sources_with_fresh_official_pass() {
        // Scenario: same change with a second independent source
        let mut proposed = create_test_record();
        proposed.website_url = Some("https://x.gov.za".to_string());
        let finding = ResearchFinding {
            website_url: Some("https://x.gov.za".to_string()),
            sources: vec!["https://x.gov.za".to_string(), "https://y.co.za".to_string()],
            confidence: Some(90),
            ..ResearchFinding::default()
        };

        let fixture = GateFixture::new(proposed, finding);
        let decision = fixture.evaluate(&QualityGate::new());

        assert!(decision.accepted);
        assert!(decision.fallback_record.is_none());
    }

    #[test]
    fn gate_accumulates_co_occurring_violations() {
        // One finding violating evidence count, freshness, and phone rules
        let normalizer = ZaFieldNormalizer::new();
        let original = OrganisationRecord {
            website_url: Some("https://aero.co.za".to_string()),
            ..create_test_record()
        };
        let mut proposed = original.clone();
        proposed.contact_number = Some("12345".to_string());

        let finding = ResearchFinding {
            contact_phone: Some("12345".to_string()),
            ..ResearchFinding::default()
        };
        let changes = diff_records(&original, &proposed);
        let merged = merge_sources(original.website_url.as_deref(), &finding);
        let original_sources = vec!["https://aero.co.za".to_string()];
        let tally = tally_sources(&normalizer, &original_sources, &merged);
        let phone_issues = vec!["'12345' is not a valid South African phone number".to_string()];

        let decision = QualityGate::new().evaluate(
            &normalizer,
            GateContext {
                original: &original,
                proposed: &proposed,
                changes: &changes,
                finding: &finding,
                sources: &tally,
                phone_issues: &phone_issues,
                email_issues: &[],
            },
        );

        assert!(!decision.accepted);
        let found = codes(&decision);
        assert!(found.contains(&"insufficient_evidence"));
        assert!(found.contains(&"no_fresh_evidence"));
        assert!(found.contains(&"invalid_phone"));
    }

    #[test]
    fn official_rules_are_mutually_exclusive() {
        let normalizer = ZaFieldNormalizer::new();
        // Official source present but already attached to the record
        let original = OrganisationRecord {
            website_url: Some("https://school.gov.za".to_string()),
            ..create_test_record()
        };
        let mut proposed = original.clone();
        proposed.contact_person = Some("Thandi Ngwenya".to_string());

        let finding = ResearchFinding {
            contact_person: Some("Thandi Ngwenya".to_string()),
            sources: vec![
                "https://school.gov.za".to_string(),
                "https://flightschools.example.com".to_string(),
            ],
            ..ResearchFinding::default()
        };
        let changes = diff_records(&original, &proposed);
        let merged = merge_sources(original.website_url.as_deref(), &finding);
        let original_sources = vec!["https://school.gov.za".to_string()];
        let tally = tally_sources(&normalizer, &original_sources, &merged);

        let decision = QualityGate::new().evaluate(
            &normalizer,
            GateContext {
                original: &original,
                proposed: &proposed,
                changes: &changes,
                finding: &finding,
                sources: &tally,
                phone_issues: &[],
                email_issues: &[],
            },
        );

        let found = codes(&decision);
        assert!(found.contains(&"official_source_not_fresh"));
        assert!(!found.contains(&"missing_official_source"));
    }

    #[test]
    fn low_confidence_blocks_high_risk_changes() {
        let mut proposed = create_test_record();
        proposed.contact_email = Some("info@aero.co.za".to_string());
        let finding = ResearchFinding {
            contact_email: Some("info@aero.co.za".to_string()),
            sources: vec!["https://caa.co.za".to_string(), "https://y.co.za".to_string()],
            confidence: Some(40),
            ..ResearchFinding::default()
        };

        let fixture = GateFixture::new(proposed, finding);
        let decision = fixture.evaluate(&QualityGate::new());

        assert!(!decision.accepted);
        assert!(codes(&decision).contains(&"low_confidence"));
    }

    #[test]
    fn status_only_changes_skip_evidence_rules() {
        let mut proposed = create_test_record();
        proposed.status = OrgStatus::NeedsReview;
        let fixture = GateFixture::new(proposed, ResearchFinding::default());
        let decision = fixture.evaluate(&QualityGate::new());

        assert!(decision.accepted);
        assert!(decision.findings.is_empty());
    }

    #[test]
    fn same_domain_website_rewrite_is_not_high_risk() {
        let normalizer = ZaFieldNormalizer::new();
        let original = OrganisationRecord {
            website_url: Some("aero.co.za".to_string()),
            ..create_test_record()
        };
        let mut proposed = original.clone();
        proposed.website_url = Some("https://aero.co.za".to_string());

        let changes = diff_records(&original, &proposed);
        let finding = ResearchFinding::default();
        let merged = merge_sources(original.website_url.as_deref(), &finding);
        let original_sources = vec!["aero.co.za".to_string()];
        let tally = tally_sources(&normalizer, &original_sources, &merged);

        let decision = QualityGate::new().evaluate(
            &normalizer,
            GateContext {
                original: &original,
                proposed: &proposed,
                changes: &changes,
                finding: &finding,
                sources: &tally,
                phone_issues: &[],
                email_issues: &[],
            },
        );

        assert!(decision.accepted);
    }

    #[test]
    fn domain_move_without_official_source_is_flagged() {
        let normalizer = ZaFieldNormalizer::new();
        let original = OrganisationRecord {
            website_url: Some("https://old-aero.co.za".to_string()),
            ..create_test_record()
        };
        let mut proposed = original.clone();
        proposed.website_url = Some("https://new-aero.co.za".to_string());

        let finding = ResearchFinding {
            website_url: Some("https://new-aero.co.za".to_string()),
            sources: vec!["https://new-aero.co.za".to_string(), "https://listing.example.com".to_string()],
            confidence: Some(95),
            ..ResearchFinding::default()
        };
        let changes = diff_records(&original, &proposed);
        let merged = merge_sources(original.website_url.as_deref(), &finding);
        let original_sources = vec!["https://old-aero.co.za".to_string()];
        let tally = tally_sources(&normalizer, &original_sources, &merged);

        let decision = QualityGate::new().evaluate(
            &normalizer,
            GateContext {
                original: &original,
                proposed: &proposed,
                changes: &changes,
                finding: &finding,
                sources: &tally,
                phone_issues: &[],
                email_issues: &[],
            },
        );

        assert!(!decision.accepted);
        let found = codes(&decision);
        assert!(found.contains(&"website_domain_unverified"));
        // missing_official_source accumulates alongside, not instead
        assert!(found.contains(&"missing_official_source"));
    }

    #[test]
    fn fallback_keeps_existing_needs_review_status() {
        let original = OrganisationRecord {
            status: OrgStatus::NeedsReview,
            ..create_test_record()
        };
        let fallback = fallback_record(&original);
        assert_eq!(fallback.status, OrgStatus::NeedsReview);
        assert_eq!(fallback, original);
    }

    #[test]
    fn optional_official_sourcing_downgrades_to_warning() {
        let mut proposed = create_test_record();
        proposed.contact_person = Some("Thandi Ngwenya".to_string());
        let finding = ResearchFinding {
            contact_person: Some("Thandi Ngwenya".to_string()),
            sources: vec![
                "https://flightschools.example.com".to_string(),
                "https://directory.example.com".to_string(),
            ],
            ..ResearchFinding::default()
        };

        let fixture = GateFixture::new(proposed, finding);
        let gate = QualityGate::with_config(QualityGateConfig {
            min_confidence: 70,
            require_official_source: false,
        });
        let decision = fixture.evaluate(&gate);

        assert!(decision.accepted);
        let warning = decision
            .findings
            .iter()
            .find(|f| f.code == "missing_official_source")
            .unwrap();
        assert_eq!(warning.severity, Severity::Warn);
    }
}
