//! Test harness for isolated engine runs.

#![allow(dead_code)]

use std::sync::Arc;

use tempfile::TempDir;

use contentflow::billing::LedgerEntry;
use contentflow::config::EngineConfig;
use contentflow::model::{LedgerEntryType, StepKind};
use contentflow::provider::{MockImageProvider, MockTextProvider, Providers};
use contentflow::versioning::StepHistory;
use contentflow::ContentEngine;

use super::builders::AGENCY;

pub struct TestHarness {
    /// Keeps the database directory alive for the harness lifetime.
    temp_dir: TempDir,
    pub engine: ContentEngine,
    pub text: Arc<MockTextProvider>,
    pub image: Arc<MockImageProvider>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Engine over `config`, with the database placed in a fresh temp dir.
    pub fn with_config(config: EngineConfig) -> Self {
        Self::build(config, MockTextProvider::new())
    }

    /// Default engine whose text model answers from `text`.
    pub fn with_text(text: MockTextProvider) -> Self {
        Self::build(EngineConfig::default(), text)
    }

    fn build(mut config: EngineConfig, text: MockTextProvider) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("data").join("contentflow.db");
        config.database_path = Some(db_path.to_string_lossy().into_owned());

        let text = Arc::new(text);
        let image = Arc::new(MockImageProvider::new());
        let providers = Providers::new(text.clone(), image.clone());
        let engine = ContentEngine::open(config, providers).expect("Failed to open engine");

        Self {
            temp_dir,
            engine,
            text,
            image,
        }
    }

    /// A harness whose default agency holds `amount` billing tokens.
    pub fn funded(amount: i64) -> Self {
        let harness = Self::new();
        harness.fund(AGENCY, amount);
        harness
    }

    pub fn fund(&self, agency_id: &str, amount: i64) {
        self.engine
            .meter()
            .credit(agency_id, amount, LedgerEntryType::Purchase, "test top-up", None)
            .expect("Failed to fund agency");
    }

    pub fn balance(&self, agency_id: &str) -> i64 {
        self.engine.meter().balance(agency_id).unwrap()
    }

    pub fn ledger(&self, agency_id: &str) -> Vec<LedgerEntry> {
        self.engine.meter().entries(agency_id).unwrap()
    }

    pub fn usage_entries(&self, agency_id: &str) -> Vec<LedgerEntry> {
        self.ledger(agency_id)
            .into_iter()
            .filter(|e| e.entry_type == LedgerEntryType::Usage)
            .collect()
    }

    pub fn history(&self, job_id: &str, step: StepKind) -> StepHistory {
        self.engine
            .versions()
            .get_step_history(job_id, step)
            .unwrap()
    }

    pub fn full_history(&self, job_id: &str, step: StepKind) -> StepHistory {
        self.engine
            .versions()
            .get_step_history_including_deleted(job_id, step)
            .unwrap()
    }
}
