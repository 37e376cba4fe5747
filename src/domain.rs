use crate::constants::{
    COL_CONTACT_EMAIL, COL_CONTACT_NUMBER, COL_CONTACT_PERSON, COL_NAME, COL_PROVINCE, COL_STATUS,
    COL_WEBSITE,
};
use crate::dataset::RawRow;
use serde::{Deserialize, Serialize};

/// South African province assigned to an organisation record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Province {
    Gauteng,
    WesternCape,
    KwaZuluNatal,
    EasternCape,
    FreeState,
    Limpopo,
    Mpumalanga,
    NorthWest,
    NorthernCape,
    Unknown,
}

impl Province {
    pub const ALL: [Province; 9] = [
        Province::Gauteng,
        Province::WesternCape,
        Province::KwaZuluNatal,
        Province::EasternCape,
        Province::FreeState,
        Province::Limpopo,
        Province::Mpumalanga,
        Province::NorthWest,
        Province::NorthernCape,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Province::Gauteng => "Gauteng",
            Province::WesternCape => "Western Cape",
            Province::KwaZuluNatal => "KwaZulu-Natal",
            Province::EasternCape => "Eastern Cape",
            Province::FreeState => "Free State",
            Province::Limpopo => "Limpopo",
            Province::Mpumalanga => "Mpumalanga",
            Province::NorthWest => "North West",
            Province::NorthernCape => "Northern Cape",
            Province::Unknown => "Unknown",
        }
    }

    /// Parse a canonical province label; anything else reads as Unknown.
    /// Free-text cleanup belongs to the normalizer, not to dataset reads.
    pub fn from_label(label: &str) -> Province {
        let trimmed = label.trim();
        Province::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(trimmed))
            .unwrap_or(Province::Unknown)
    }
}

impl std::fmt::Display for Province {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Curation status of an organisation record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrgStatus {
    Verified,
    Candidate,
    NeedsReview,
    DoNotContact,
}

impl OrgStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrgStatus::Verified => "Verified",
            OrgStatus::Candidate => "Candidate",
            OrgStatus::NeedsReview => "Needs Review",
            OrgStatus::DoNotContact => "Do Not Contact (Compliance)",
        }
    }

    /// Parse a status label from the dataset; unrecognised labels read as
    /// Candidate so a run never stalls on a typo in a curated sheet.
    pub fn from_label(label: &str) -> OrgStatus {
        let trimmed = label.trim();
        [
            OrgStatus::Verified,
            OrgStatus::Candidate,
            OrgStatus::NeedsReview,
            OrgStatus::DoNotContact,
        ]
        .into_iter()
        .find(|s| s.as_str().eq_ignore_ascii_case(trimmed))
        .unwrap_or(OrgStatus::Candidate)
    }
}

impl std::fmt::Display for OrgStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One organisation row as the pipeline sees it. Two snapshots exist per
/// row: the immutable original and the cloned proposed record; a final
/// record is selected after gating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganisationRecord {
    pub name: String,
    pub province: Province,
    pub status: OrgStatus,
    pub website_url: Option<String>,
    pub contact_person: Option<String>,
    pub contact_number: Option<String>,
    pub contact_email: Option<String>,
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl OrganisationRecord {
    /// Build the original snapshot from a raw dataset row.
    pub fn from_raw(name: &str, raw: &RawRow) -> Self {
        Self {
            name: name.trim().to_string(),
            province: Province::from_label(&raw.province),
            status: OrgStatus::from_label(&raw.status),
            website_url: non_empty(&raw.website_url),
            contact_person: non_empty(&raw.contact_person),
            contact_number: non_empty(&raw.contact_number),
            contact_email: non_empty(&raw.contact_email),
        }
    }

    /// Field map in the fixed order used for diffing. Empty and null are
    /// equivalent, so optional fields read as "".
    pub fn field_map(&self) -> Vec<(&'static str, String)> {
        vec![
            (COL_NAME, self.name.clone()),
            (COL_WEBSITE, self.website_url.clone().unwrap_or_default()),
            (
                COL_CONTACT_PERSON,
                self.contact_person.clone().unwrap_or_default(),
            ),
            (
                COL_CONTACT_NUMBER,
                self.contact_number.clone().unwrap_or_default(),
            ),
            (
                COL_CONTACT_EMAIL,
                self.contact_email.clone().unwrap_or_default(),
            ),
            (COL_STATUS, self.status.as_str().to_string()),
            (COL_PROVINCE, self.province.as_str().to_string()),
        ]
    }

}

/// Externally researched candidate data for one organisation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchFinding {
    #[serde(default)]
    pub website_url: Option<String>,
    #[serde(default)]
    pub contact_person: Option<String>,
    #[serde(default)]
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub confidence: Option<u8>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub investigation_notes: Vec<String>,
    #[serde(default)]
    pub alternate_names: Vec<String>,
    #[serde(default)]
    pub physical_address: Option<String>,
}

impl ResearchFinding {
    /// The empty finding substituted when a lookup cannot be made; the note
    /// explains why so the evidence ledger stays honest.
    pub fn with_note(note: impl Into<String>) -> Self {
        Self {
            notes: Some(note.into()),
            ..Self::default()
        }
    }
}
