//! The memory bridge: best-effort retrieval and persistence.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use mender_core::config::MemoryConfig;
use mender_core::task::{Solution, TaskContext};
use mender_llm::Embedder;

use crate::store::{MemoryRecord, RecordStore};

/// A past case returned by similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarCase {
    pub content: String,
    pub metadata: HashMap<String, serde_json::Value>,
    pub similarity: f32,
}

/// Memory subsystem health for the status surfaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryStats {
    pub total_records: usize,
    pub status: String,
}

/// Mediates similarity search and persistence of past solutions.
///
/// Every underlying failure is caught here: search degrades to `None`,
/// store degrades to `false`. A broken memory subsystem must never abort a
/// debugging run.
pub struct MemoryBridge {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn RecordStore>,
    config: MemoryConfig,
}

impl MemoryBridge {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn RecordStore>,
        config: MemoryConfig,
    ) -> Self {
        Self {
            embedder,
            store,
            config,
        }
    }

    /// Search for similar past cases, ranked by cosine similarity.
    ///
    /// Results below the configured similarity threshold are excluded and
    /// the list is capped at `max_results`. Returns `None` when memory is
    /// disabled, nothing matches, or anything underneath fails.
    pub async fn search_similar(&self, bug_report: &str) -> Option<Vec<SimilarCase>> {
        if !self.config.enabled {
            return None;
        }

        let query = match self.embedder.embed(bug_report).await {
            Ok(vector) if !vector.is_empty() => vector,
            Ok(_) => return None,
            Err(e) => {
                warn!(error = %e, "Memory search skipped: embedding failed");
                return None;
            }
        };

        let records = match self.store.load_all().await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Memory search skipped: store failed");
                return None;
            }
        };

        let mut scored: Vec<SimilarCase> = records
            .into_iter()
            .map(|record| SimilarCase {
                similarity: cosine_similarity(&query, &record.embedding),
                content: record.content,
                metadata: record.metadata,
            })
            .filter(|case| case.similarity >= self.config.similarity_threshold)
            .collect();

        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(self.config.max_results);

        if scored.is_empty() {
            None
        } else {
            info!(count = scored.len(), "Found similar past solutions");
            Some(scored)
        }
    }

    /// Persist a successful solution for future retrieval.
    ///
    /// Returns whether the record was stored; failures are logged, never
    /// propagated.
    pub async fn store_solution(
        &self,
        bug_report: &str,
        solution: &Solution,
        context: &TaskContext,
    ) -> bool {
        if !self.config.enabled {
            return false;
        }

        let solution_json = match serde_json::to_string_pretty(solution) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Memory store skipped: solution not serializable");
                return false;
            }
        };

        let content = format!(
            "## Bug Report\n{}\n\n## Solution\n{}\n\n## Context\nTask ID: {}\nIterations: {}\nSuccess: true\n",
            bug_report, solution_json, context.task_id, context.iteration
        );

        let test_passed = context
            .test_results
            .as_ref()
            .map(|report| !report.content.to_uppercase().contains("FAIL"))
            .unwrap_or(false);

        let mut metadata = HashMap::new();
        metadata.insert(
            "task_id".to_string(),
            serde_json::Value::from(context.task_id.clone()),
        );
        metadata.insert(
            "iterations".to_string(),
            serde_json::Value::from(context.iteration),
        );
        metadata.insert(
            "plan_steps".to_string(),
            serde_json::Value::from(context.plan.as_ref().map_or(0, Vec::len)),
        );
        metadata.insert(
            "patches_applied".to_string(),
            serde_json::Value::from(context.proposed_patches.len()),
        );
        metadata.insert(
            "test_passed".to_string(),
            serde_json::Value::from(test_passed),
        );

        let embedding = match self.embedder.embed(&content).await {
            Ok(vector) if !vector.is_empty() => vector,
            Ok(_) => return false,
            Err(e) => {
                warn!(error = %e, "Memory store skipped: embedding failed");
                return false;
            }
        };

        let record = MemoryRecord::new(content, metadata, embedding);
        match self.store.insert(&record).await {
            Ok(()) => {
                info!(record_id = %record.id, task_id = %context.task_id, "Stored solution in memory");
                true
            }
            Err(e) => {
                warn!(error = %e, "Memory store failed");
                false
            }
        }
    }

    /// Record count + health for the status surfaces.
    pub async fn stats(&self) -> MemoryStats {
        match self.store.count().await {
            Ok(total_records) => MemoryStats {
                total_records,
                status: "healthy".to_string(),
            },
            Err(e) => MemoryStats {
                total_records: 0,
                status: format!("error: {}", e),
            },
        }
    }
}

/// Cosine similarity between two vectors; 0.0 for mismatched or empty input.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
