use crate::app::ports::FieldNormalizer;
use crate::constants::MX_UNAVAILABLE_ISSUE;
use crate::domain::{OrgStatus, Province};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use url::Url;

static PROVINCE_ALIASES: Lazy<HashMap<&'static str, Province>> = Lazy::new(|| {
    HashMap::from([
        ("gauteng", Province::Gauteng),
        ("gp", Province::Gauteng),
        ("western cape", Province::WesternCape),
        ("wc", Province::WesternCape),
        ("kwazulu-natal", Province::KwaZuluNatal),
        ("kwazulu natal", Province::KwaZuluNatal),
        ("kzn", Province::KwaZuluNatal),
        ("eastern cape", Province::EasternCape),
        ("ec", Province::EasternCape),
        ("free state", Province::FreeState),
        ("fs", Province::FreeState),
        ("limpopo", Province::Limpopo),
        ("lp", Province::Limpopo),
        ("mpumalanga", Province::Mpumalanga),
        ("mp", Province::Mpumalanga),
        ("north west", Province::NorthWest),
        ("north-west", Province::NorthWest),
        ("nw", Province::NorthWest),
        ("northern cape", Province::NorthernCape),
        ("nc", Province::NorthernCape),
    ])
});

static PHONE_E164_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+27\d{9}$").unwrap());

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$").unwrap());

/// South African field rules: province aliases, +27 E.164 phones, syntactic
/// email validation, and domain canonicalization.
#[derive(Debug, Clone, Default)]
pub struct ZaFieldNormalizer;

impl ZaFieldNormalizer {
    pub fn new() -> Self {
        Self
    }
}

impl FieldNormalizer for ZaFieldNormalizer {
    fn normalize_province(&self, raw: &str) -> Province {
        let key = raw.trim().to_lowercase();
        PROVINCE_ALIASES
            .get(key.as_str())
            .copied()
            .unwrap_or(Province::Unknown)
    }

    fn normalize_phone(&self, raw: &str) -> (Option<String>, Vec<String>) {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return (None, Vec::new());
        }
        let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
        let candidate = if digits.len() == 11 && digits.starts_with("27") {
            format!("+{digits}")
        } else if digits.len() == 10 && digits.starts_with('0') {
            format!("+27{}", &digits[1..])
        } else {
            return (
                None,
                vec![format!(
                    "'{trimmed}' is not a valid South African phone number"
                )],
            );
        };

        if PHONE_E164_RE.is_match(&candidate) {
            (Some(candidate), Vec::new())
        } else {
            (
                None,
                vec![format!(
                    "'{trimmed}' is not a valid South African phone number"
                )],
            )
        }
    }

    fn validate_email(&self, raw: &str, org_domain: &str) -> (Option<String>, Vec<String>) {
        let email = raw.trim().to_lowercase();
        if email.is_empty() {
            return (None, Vec::new());
        }
        if !EMAIL_RE.is_match(&email) {
            return (
                None,
                vec![format!("'{}' is not a valid email address", raw.trim())],
            );
        }

        // No DNS is performed here. An address on the organisation's own
        // domain is vouched for by the website; everything else carries the
        // MX marker, which callers filter before treating it as invalid.
        let email_domain = email.rsplit('@').next().unwrap_or_default();
        let issues = if !org_domain.is_empty() && email_domain == org_domain {
            Vec::new()
        } else {
            vec![MX_UNAVAILABLE_ISSUE.to_string()]
        };
        (Some(email), issues)
    }

    fn canonical_domain(&self, raw: &str) -> Option<String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        let parsed = Url::parse(trimmed)
            .or_else(|_| Url::parse(&format!("https://{trimmed}")))
            .ok()?;
        let host = parsed.host_str()?.to_lowercase();
        let host = host.strip_prefix("www.").unwrap_or(&host);
        if host.is_empty() {
            None
        } else {
            Some(host.to_string())
        }
    }

    fn determine_status(
        &self,
        has_website: bool,
        has_named_contact: bool,
        phone_issues: &[String],
        email_issues: &[String],
        has_multiple_sources: bool,
    ) -> OrgStatus {
        if !phone_issues.is_empty() || !email_issues.is_empty() {
            return OrgStatus::NeedsReview;
        }
        if has_website && has_named_contact && has_multiple_sources {
            return OrgStatus::Verified;
        }
        if has_website || has_named_contact {
            return OrgStatus::Candidate;
        }
        OrgStatus::NeedsReview
    }

    fn confidence_for_status(&self, status: OrgStatus, issue_count: usize) -> u8 {
        let base: i32 = match status {
            OrgStatus::Verified => 90,
            OrgStatus::Candidate => 65,
            OrgStatus::NeedsReview => 40,
            OrgStatus::DoNotContact => 0,
        };
        (base - 10 * issue_count as i32).clamp(0, 100) as u8
    }
}
