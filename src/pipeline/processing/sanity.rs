use crate::constants::{COL_CONTACT_EMAIL, COL_CONTACT_NUMBER};
use crate::domain::{OrganisationRecord, Province};
use serde::{Deserialize, Serialize};

/// A malformed-field observation for one row. Does not block acceptance,
/// but the checks may remediate the proposed record before diffing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SanityCheckFinding {
    pub row_id: usize,
    pub organisation: String,
    pub issue: String,
    pub remediation: String,
}

/// What a sanity pass did to the proposed record.
#[derive(Debug, Clone, Default)]
pub struct SanityOutcome {
    pub notes: Vec<String>,
    pub findings: Vec<SanityCheckFinding>,
    pub columns_to_clear: Vec<String>,
}

/// Detect and auto-remediate obviously malformed derived fields on the
/// proposed record. Checks run in order and each mutates state the next
/// one consumes.
pub fn run_sanity_checks(
    row_id: usize,
    original: &OrganisationRecord,
    proposed: &mut OrganisationRecord,
    sources: &mut [String],
    phone_issues: &[String],
    email_issues: &[String],
) -> SanityOutcome {
    let mut outcome = SanityOutcome::default();
    let organisation = proposed.name.clone();

    // 1. Website URL without a scheme: default to https and keep the
    //    source list in step with the rewrite.
    if let Some(website) = proposed.website_url.clone() {
        let trimmed = website.trim();
        if !trimmed.is_empty() && !trimmed.contains("://") {
            let rewritten = format!("https://{trimmed}");
            for source in sources.iter_mut() {
                if source == &website {
                    *source = rewritten.clone();
                }
            }
            proposed.website_url = Some(rewritten.clone());
            outcome
                .notes
                .push(format!("Rewrote website URL '{website}' as '{rewritten}'"));
            outcome.findings.push(SanityCheckFinding {
                row_id,
                organisation: organisation.clone(),
                issue: "website_url_missing_scheme".to_string(),
                remediation: "Confirm the site is reachable over https".to_string(),
            });
        }
    }

    // 2. A phone number that existed before processing but failed
    //    normalization leaves a stale dataset cell; blank it.
    let had_phone = original.contact_number.is_some();
    let phone_now_empty = proposed
        .contact_number
        .as_deref()
        .map(|v| v.trim().is_empty())
        .unwrap_or(true);
    if had_phone && phone_now_empty && !phone_issues.is_empty() {
        proposed.contact_number = None;
        outcome.columns_to_clear.push(COL_CONTACT_NUMBER.to_string());
        outcome.notes.push(format!(
            "Cleared contact number '{}' that failed validation",
            original.contact_number.as_deref().unwrap_or_default()
        ));
        outcome.findings.push(SanityCheckFinding {
            row_id,
            organisation: organisation.clone(),
            issue: "contact_number_invalid".to_string(),
            remediation: "Source a valid contact number for the organisation".to_string(),
        });
    }

    // 3. Same pattern for the email address.
    let had_email = original.contact_email.is_some();
    let email_now_empty = proposed
        .contact_email
        .as_deref()
        .map(|v| v.trim().is_empty())
        .unwrap_or(true);
    if had_email && email_now_empty && !email_issues.is_empty() {
        proposed.contact_email = None;
        outcome.columns_to_clear.push(COL_CONTACT_EMAIL.to_string());
        outcome.notes.push(format!(
            "Cleared contact email '{}' that failed validation",
            original.contact_email.as_deref().unwrap_or_default()
        ));
        outcome.findings.push(SanityCheckFinding {
            row_id,
            organisation: organisation.clone(),
            issue: "contact_email_invalid".to_string(),
            remediation: "Source a deliverable email address for the organisation".to_string(),
        });
    }

    // 4. Unknown province is informational only.
    if proposed.province == Province::Unknown {
        outcome.findings.push(SanityCheckFinding {
            row_id,
            organisation,
            issue: "province_unknown".to_string(),
            remediation: "Manually assign a province to the organisation".to_string(),
        });
    }

    outcome
}
