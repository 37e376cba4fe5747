use crate::error::{EnricherError, Result};
use crate::pipeline::processing::quality_gate::QualityGateConfig;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Runtime configuration for an enrichment run.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Maximum number of research lookups in flight at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Per-lookup timeout in seconds
    #[serde(default = "default_lookup_timeout_secs")]
    pub lookup_timeout_secs: u64,
    /// Minimum research confidence accepted for high-risk changes
    #[serde(default = "default_min_confidence")]
    pub min_confidence: u8,
    /// Whether high-risk changes require an official register source
    #[serde(default = "default_require_official_source")]
    pub require_official_source: bool,
    /// Optional HTTP endpoint for the research adapter
    #[serde(default)]
    pub research_endpoint: Option<String>,
}

fn default_concurrency() -> usize {
    4
}

fn default_lookup_timeout_secs() -> u64 {
    20
}

fn default_min_confidence() -> u8 {
    70
}

fn default_require_official_source() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            lookup_timeout_secs: default_lookup_timeout_secs(),
            min_confidence: default_min_confidence(),
            require_official_source: default_require_official_source(),
            research_endpoint: None,
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(path).map_err(|e| {
            EnricherError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let config: PipelineConfig = toml::from_str(&config_content)?;
        Ok(config)
    }

    /// Quality gate thresholds derived from this configuration
    pub fn gate_config(&self) -> QualityGateConfig {
        QualityGateConfig {
            min_confidence: self.min_confidence,
            require_official_source: self.require_official_source,
        }
    }
}
