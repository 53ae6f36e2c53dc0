//! Batch Report
//!
//! JSON summary of a run: per-item status, artifact digests and the final
//! output. `report_hash` covers everything else in the report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::BatchConfig;
use crate::hashing::{report_digest, sha256_hex};
use crate::pipeline::{BatchOutcome, ItemStatus, OutputArtifact};
use crate::ENGINE_VERSION;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactSummary {
    pub filename: String,
    pub mime_type: String,
    pub size: usize,
    pub sha256: String,
}

impl ArtifactSummary {
    pub fn of(artifact: &OutputArtifact) -> Self {
        Self {
            filename: artifact.filename.clone(),
            mime_type: artifact.mime_type.clone(),
            size: artifact.bytes.len(),
            sha256: sha256_hex(&artifact.bytes),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemReport {
    pub name: String,
    pub status: ItemStatus,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub artifact: Option<ArtifactSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub run_id: String,
    pub engine_version: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub config: BatchConfig,
    pub items: Vec<ItemReport>,
    #[serde(default)]
    pub output: Option<ArtifactSummary>,
    pub report_hash: String,
}

impl BatchReport {
    pub fn new(
        config: BatchConfig,
        outcome: &BatchOutcome,
        started_at: DateTime<Utc>,
    ) -> Result<Self, serde_json::Error> {
        let items = outcome
            .results
            .iter()
            .map(|r| ItemReport {
                name: r.item.name.clone(),
                status: r.item.status,
                detail: r.item.detail.clone(),
                artifact: r.artifact.clone(),
            })
            .collect();

        let mut report = Self {
            run_id: Uuid::new_v4().to_string(),
            engine_version: ENGINE_VERSION.to_string(),
            started_at,
            finished_at: Utc::now(),
            config,
            items,
            output: outcome.output.as_ref().map(ArtifactSummary::of),
            report_hash: String::new(), // Computed after
        };
        report.report_hash = report_digest(&report)?;
        Ok(report)
    }

    pub fn all_succeeded(&self) -> bool {
        self.items.iter().all(|i| i.status == ItemStatus::Done)
    }
}
