use crate::app::ports::EvidenceSink;
use crate::error::Result;
use crate::pipeline::processing::changes::EvidenceRecord;
use async_trait::async_trait;
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;

/// Persists each run's evidence batch as pretty-printed JSON in a
/// timestamped file under the output directory.
pub struct JsonFileEvidenceSink {
    output_dir: PathBuf,
}

impl JsonFileEvidenceSink {
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl EvidenceSink for JsonFileEvidenceSink {
    async fn record(&self, entries: &[EvidenceRecord]) -> Result<()> {
        fs::create_dir_all(&self.output_dir)?;

        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let filename = format!("evidence_{timestamp}.json");
        let filepath = self.output_dir.join(filename);

        let json_content = serde_json::to_string_pretty(entries)?;
        fs::write(&filepath, json_content)?;

        info!(
            "Saved {} evidence records to {}",
            entries.len(),
            filepath.display()
        );
        Ok(())
    }
}

/// In-memory sink for development and testing.
#[derive(Default)]
pub struct MemoryEvidenceSink {
    entries: Mutex<Vec<EvidenceRecord>>,
}

impl MemoryEvidenceSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<EvidenceRecord> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl EvidenceSink for MemoryEvidenceSink {
    async fn record(&self, entries: &[EvidenceRecord]) -> Result<()> {
        self.entries.lock().unwrap().extend_from_slice(entries);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_entry() -> EvidenceRecord {
        EvidenceRecord {
            row_id: 0,
            organisation: "Aero Academy".to_string(),
            changes: "Website URL -> https://aero.co.za".to_string(),
            sources: vec!["https://aero.co.za".to_string()],
            notes: String::new(),
            confidence: 80,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn file_sink_writes_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFileEvidenceSink::new(dir.path());

        sink.record(&[create_test_entry()]).await.unwrap();

        let files: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
        let content = fs::read_to_string(files[0].as_ref().unwrap().path()).unwrap();
        let parsed: Vec<EvidenceRecord> = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].organisation, "Aero Academy");
    }

    #[tokio::test]
    async fn memory_sink_accumulates() {
        let sink = MemoryEvidenceSink::new();
        sink.record(&[create_test_entry()]).await.unwrap();
        assert_eq!(sink.entries().len(), 1);
    }
}
