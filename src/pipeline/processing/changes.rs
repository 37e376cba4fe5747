use crate::constants::{
    COL_CONTACT_EMAIL, COL_CONTACT_NUMBER, COL_CONTACT_PERSON, COL_PROVINCE, COL_STATUS,
    COL_WEBSITE,
};
use crate::dataset::RawRow;
use crate::domain::OrganisationRecord;
use crate::pipeline::processing::quality_gate::{QualityFinding, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One column-level change between the original and proposed snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub column: String,
    pub old: String,
    pub new: String,
}

/// Column-level change set in fixed field order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    entries: Vec<FieldChange>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.entries.iter().any(|c| c.column == column)
    }

    pub fn get(&self, column: &str) -> Option<&FieldChange> {
        self.entries.iter().find(|c| c.column == column)
    }

    pub fn entries(&self) -> &[FieldChange] {
        &self.entries
    }

    pub fn columns(&self) -> Vec<&str> {
        self.entries.iter().map(|c| c.column.as_str()).collect()
    }
}

/// Audit-log entry describing what changed on a row, with what support.
/// Exactly one is written per row that had any attempted change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub row_id: usize,
    pub organisation: String,
    pub changes: String,
    pub sources: Vec<String>,
    pub notes: String,
    pub confidence: u8,
    pub timestamp: DateTime<Utc>,
}

/// Instructions for undoing a rejected change. Produced only on rejection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackAction {
    pub row_id: usize,
    pub organisation: String,
    pub columns: Vec<String>,
    pub previous_values: BTreeMap<String, String>,
    pub reason: String,
}

/// Diff two record snapshots into a column-level change set. Empty and null
/// string forms are equivalent, so clearing an absent field is not a change.
pub fn diff_records(original: &OrganisationRecord, proposed: &OrganisationRecord) -> ChangeSet {
    let mut entries = Vec::new();
    for ((column, old), (_, new)) in original.field_map().into_iter().zip(proposed.field_map()) {
        if old != new {
            entries.push(FieldChange {
                column: column.to_string(),
                old,
                new,
            });
        }
    }
    ChangeSet { entries }
}

/// Human-readable description of what a record changes relative to the raw
/// dataset row: `"Column -> value"` per differing non-empty column, joined
/// by `"; "`, or `"No changes"`.
pub fn describe_changes(raw: &RawRow, record: &OrganisationRecord) -> String {
    let display: [(&str, String, &str); 6] = [
        (
            COL_WEBSITE,
            record.website_url.clone().unwrap_or_default(),
            raw.website_url.as_str(),
        ),
        (
            COL_CONTACT_PERSON,
            record.contact_person.clone().unwrap_or_default(),
            raw.contact_person.as_str(),
        ),
        (
            COL_CONTACT_NUMBER,
            record.contact_number.clone().unwrap_or_default(),
            raw.contact_number.as_str(),
        ),
        (
            COL_CONTACT_EMAIL,
            record.contact_email.clone().unwrap_or_default(),
            raw.contact_email.as_str(),
        ),
        (COL_STATUS, record.status.as_str().to_string(), raw.status.as_str()),
        (
            COL_PROVINCE,
            record.province.as_str().to_string(),
            raw.province.as_str(),
        ),
    ];

    let described: Vec<String> = display
        .into_iter()
        .filter(|(_, new, old)| !new.is_empty() && new != old.trim())
        .map(|(column, new, _)| format!("{column} -> {new}"))
        .collect();

    if described.is_empty() {
        "No changes".to_string()
    } else {
        described.join("; ")
    }
}

/// Build the rollback action for a rejected change set. Columns are sorted
/// lexicographically and the reason joins the blocking messages, with any
/// remediation guidance appended once, sorted and de-duplicated.
pub fn build_rollback(
    row_id: usize,
    organisation: &str,
    changes: &ChangeSet,
    findings: &[QualityFinding],
) -> RollbackAction {
    let mut columns: Vec<String> = changes.columns().iter().map(|c| c.to_string()).collect();
    columns.sort();

    let previous_values: BTreeMap<String, String> = changes
        .entries()
        .iter()
        .map(|c| (c.column.clone(), c.old.clone()))
        .collect();

    let blocking: Vec<&QualityFinding> = findings
        .iter()
        .filter(|f| f.severity == Severity::Block)
        .collect();

    let messages: Vec<&str> = blocking
        .iter()
        .map(|f| f.message.as_str())
        .filter(|m| !m.is_empty())
        .collect();
    let mut reason = if messages.is_empty() {
        "Quality gate rejection".to_string()
    } else {
        messages.join("; ")
    };

    let mut remediations: Vec<&str> = blocking
        .iter()
        .filter_map(|f| f.remediation.as_deref())
        .filter(|r| !r.is_empty())
        .collect();
    remediations.sort();
    remediations.dedup();
    if !remediations.is_empty() {
        reason.push_str(". Remediation: ");
        reason.push_str(&remediations.join("; "));
    }

    RollbackAction {
        row_id,
        organisation: organisation.to_string(),
        columns,
        previous_values,
        reason,
    }
}
