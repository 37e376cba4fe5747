use crate::app::ports::{AdapterError, ResearchAdapter};
use crate::domain::ResearchFinding;
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::debug;

/// Research adapter backed by a JSON lookup endpoint.
pub struct HttpResearchAdapter {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpResearchAdapter {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl ResearchAdapter for HttpResearchAdapter {
    async fn lookup(
        &self,
        name: &str,
        province: &str,
    ) -> std::result::Result<ResearchFinding, AdapterError> {
        debug!(organisation = name, province, "Looking up research endpoint");
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("name", name), ("province", province)])
            .send()
            .await
            .map_err(|e| AdapterError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AdapterError::Request(format!(
                "research endpoint returned {}",
                response.status()
            )));
        }

        response
            .json::<ResearchFinding>()
            .await
            .map_err(|e| AdapterError::Malformed(e.to_string()))
    }
}

/// Adapter used when no research endpoint is configured: every row proceeds
/// with an empty finding that says so.
pub struct OfflineResearchAdapter;

#[async_trait]
impl ResearchAdapter for OfflineResearchAdapter {
    async fn lookup(
        &self,
        _name: &str,
        _province: &str,
    ) -> std::result::Result<ResearchFinding, AdapterError> {
        Ok(ResearchFinding::with_note(
            "Research adapter disabled; no lookup performed",
        ))
    }
}

/// In-memory findings keyed by organisation name, for demos and tests.
pub struct FixtureResearchAdapter {
    findings: HashMap<String, ResearchFinding>,
}

impl FixtureResearchAdapter {
    pub fn new(entries: Vec<(String, ResearchFinding)>) -> Self {
        let findings = entries
            .into_iter()
            .map(|(name, finding)| (name.trim().to_lowercase(), finding))
            .collect();
        Self { findings }
    }
}

#[async_trait]
impl ResearchAdapter for FixtureResearchAdapter {
    async fn lookup(
        &self,
        name: &str,
        _province: &str,
    ) -> std::result::Result<ResearchFinding, AdapterError> {
        match self.findings.get(&name.trim().to_lowercase()) {
            Some(finding) => Ok(finding.clone()),
            None => Ok(ResearchFinding::with_note(format!(
                "No research results for '{}'",
                name.trim()
            ))),
        }
    }
}
