use crate::app::ports::FieldNormalizer;
use crate::constants::{OFFICIAL_SOURCE_KEYWORDS, PLACEHOLDER_SOURCE};
use crate::domain::ResearchFinding;
use std::collections::HashSet;

/// Evidence-quality tally over a record's unique sources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceTally {
    /// Unique sources supporting the record
    pub total: usize,
    /// Unique sources not already attached to the original record
    pub fresh: usize,
    /// Unique sources matching the official register keyword list
    pub official: usize,
    /// Unique sources that are both official and fresh
    pub official_fresh: usize,
}

/// Merge the candidate source list for a row: original website first, then
/// the finding's website if distinct, then the finding's sources, keeping
/// first-seen order. An empty merge yields the placeholder source.
pub fn merge_sources(original_website: Option<&str>, finding: &ResearchFinding) -> Vec<String> {
    let mut merged: Vec<String> = Vec::new();
    let push_unique = |candidate: &str, merged: &mut Vec<String>| {
        let trimmed = candidate.trim();
        if trimmed.is_empty() {
            return;
        }
        if !merged.iter().any(|s| s == trimmed) {
            merged.push(trimmed.to_string());
        }
    };

    if let Some(website) = original_website {
        push_unique(website, &mut merged);
    }
    if let Some(website) = finding.website_url.as_deref() {
        push_unique(website, &mut merged);
    }
    for source in &finding.sources {
        push_unique(source, &mut merged);
    }

    if merged.is_empty() {
        merged.push(PLACEHOLDER_SOURCE.to_string());
    }
    merged
}

fn canonical_key(normalizer: &dyn FieldNormalizer, source: &str) -> String {
    match normalizer.canonical_domain(source) {
        Some(domain) if !domain.is_empty() => domain,
        _ => source.trim().to_lowercase(),
    }
}

fn is_official(source: &str) -> bool {
    let lowered = source.to_lowercase();
    OFFICIAL_SOURCE_KEYWORDS.iter().any(|kw| lowered.contains(kw))
}

/// Classify the merged source list against the record's original sources.
/// Pure function of the two lists; each unique source counts once.
pub fn tally_sources(
    normalizer: &dyn FieldNormalizer,
    original_sources: &[String],
    merged: &[String],
) -> SourceTally {
    let original_keys: HashSet<String> = original_sources
        .iter()
        .map(|s| canonical_key(normalizer, s))
        .collect();

    let mut tally = SourceTally::default();
    let mut seen: HashSet<String> = HashSet::new();
    for source in merged {
        let key = canonical_key(normalizer, source);
        if !seen.insert(key.clone()) {
            continue;
        }
        tally.total += 1;
        let official = is_official(source);
        let fresh = !original_keys.contains(&key);
        if official {
            tally.official += 1;
        }
        if fresh {
            tally.fresh += 1;
        }
        if official && fresh {
            tally.official_fresh += 1;
        }
    }
    tally
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::normalizer::ZaFieldNormalizer;

    fn finding_with_sources(website: Option<&str>, sources: &[&str]) -> ResearchFinding {
        ResearchFinding {
            website_url: website.map(|s| s.to_string()),
            sources: sources.iter().map(|s| s.to_string()).collect(),
            ..ResearchFinding::default()
        }
    }

    #[test]
    fn merge_keeps_first_seen_order_and_dedupes() {
        let finding = finding_with_sources(
            Some("https://aero.co.za"),
            &["https://caa.co.za/register", "https://aero.co.za"],
        );
        let merged = merge_sources(Some("https://aero.co.za"), &finding);
        assert_eq!(
            merged,
            vec![
                "https://aero.co.za".to_string(),
                "https://caa.co.za/register".to_string()
            ]
        );
    }

    #[test]
    fn merge_synthesizes_placeholder_when_empty() {
        let finding = ResearchFinding::default();
        assert_eq!(merge_sources(None, &finding), vec![PLACEHOLDER_SOURCE.to_string()]);
    }

    #[test]
    fn tally_single_official_source() {
        // Scenario: one new official source only
        let normalizer = ZaFieldNormalizer::new();
        let finding = finding_with_sources(Some("https://x.gov.za"), &["https://x.gov.za"]);
        let merged = merge_sources(None, &finding);
        let tally = tally_sources(&normalizer, &[], &merged);
        assert_eq!(tally, SourceTally { total: 1, fresh: 1, official: 1, official_fresh: 1 });
    }

    #[test]
    fn tally_mixed_sources() {
        let normalizer = ZaFieldNormalizer::new();
        let finding = finding_with_sources(
            Some("https://x.gov.za"),
            &["https://x.gov.za", "https://y.co.za"],
        );
        let merged = merge_sources(None, &finding);
        let tally = tally_sources(&normalizer, &[], &merged);
        assert_eq!(tally, SourceTally { total: 2, fresh: 2, official: 1, official_fresh: 1 });
    }

    #[test]
    fn tally_marks_original_sources_stale() {
        let normalizer = ZaFieldNormalizer::new();
        let original = vec!["https://aero.co.za".to_string()];
        let finding = finding_with_sources(None, &["https://www.aero.co.za/contact", "https://caa.co.za"]);
        let merged = merge_sources(Some("https://aero.co.za"), &finding);
        let tally = tally_sources(&normalizer, &original, &merged);
        // www/path variants collapse onto the original domain key
        assert_eq!(tally.total, 2);
        assert_eq!(tally.fresh, 1);
        assert_eq!(tally.official, 1);
        assert_eq!(tally.official_fresh, 1);
    }

    #[test]
    fn tally_counts_duplicate_domains_once() {
        let normalizer = ZaFieldNormalizer::new();
        let finding = finding_with_sources(
            None,
            &["https://caa.co.za/a", "https://caa.co.za/b", "caa.co.za"],
        );
        let merged = merge_sources(None, &finding);
        let tally = tally_sources(&normalizer, &[], &merged);
        assert_eq!(tally.total, 1);
    }

    #[test]
    fn placeholder_source_is_not_official() {
        let normalizer = ZaFieldNormalizer::new();
        let merged = merge_sources(None, &ResearchFinding::default());
        let tally = tally_sources(&normalizer, &[], &merged);
        assert_eq!(tally, SourceTally { total: 1, fresh: 1, official: 0, official_fresh: 0 });
    }
}
