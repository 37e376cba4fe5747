/// Column name constants to ensure consistency across the codebase
/// These constants define the dataset columns the enrichment pipeline reads
/// and writes.

// Dataset column names
pub const COL_NAME: &str = "Organisation Name";
pub const COL_PROVINCE: &str = "Province";
pub const COL_STATUS: &str = "Status";
pub const COL_WEBSITE: &str = "Website URL";
pub const COL_CONTACT_PERSON: &str = "Contact Person";
pub const COL_CONTACT_NUMBER: &str = "Contact Number";
pub const COL_CONTACT_EMAIL: &str = "Contact Email Address";

/// Columns every input dataset must expose before a run may start
pub const REQUIRED_COLUMNS: [&str; 7] = [
    COL_NAME,
    COL_PROVINCE,
    COL_STATUS,
    COL_WEBSITE,
    COL_CONTACT_PERSON,
    COL_CONTACT_NUMBER,
    COL_CONTACT_EMAIL,
];

/// Columns whose values the quality gate treats as high-risk to overwrite
pub const HIGH_RISK_COLUMNS: [&str; 4] = [
    COL_WEBSITE,
    COL_CONTACT_PERSON,
    COL_CONTACT_NUMBER,
    COL_CONTACT_EMAIL,
];

/// Substrings that mark a source URL as an official register/regulator
pub const OFFICIAL_SOURCE_KEYWORDS: [&str; 5] =
    [".gov.za", "caa.co.za", ".ac.za", ".org.za", ".mil.za"];

/// Synthetic source attached when a record has no sources at all
pub const PLACEHOLDER_SOURCE: &str = "internal://record";

/// Email issue emitted when deliverability cannot be checked; filtered out
/// before an email is treated as invalid.
pub const MX_UNAVAILABLE_ISSUE: &str = "MX lookup unavailable";
