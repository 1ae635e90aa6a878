use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use super::{cosine_similarity, filter_matches, sort_hits, SearchParams, VectorStore, VectorStoreStats};
use crate::error::CoreResult;
use crate::types::{SearchHit, VectorRecord};

/// Brute-force in-memory variant (§4.B `flat-in-memory`). O(n) scan per
/// query; adequate for the core's own test fixtures and small deployments,
/// matching the teacher's `ml::bi_encoder` placeholder-everything posture.
pub struct FlatVectorStore {
    dim: usize,
    records: RwLock<HashMap<String, VectorRecord>>,
}

impl FlatVectorStore {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            records: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl VectorStore for FlatVectorStore {
    async fn initialize(&self) -> CoreResult<()> {
        Ok(())
    }

    async fn upsert(&self, records: Vec<VectorRecord>) -> CoreResult<()> {
        let mut guard = self.records.write().unwrap();
        for record in records {
            guard.insert(record.id.clone(), record);
        }
        Ok(())
    }

    async fn delete(&self, ids: &[String]) -> CoreResult<()> {
        let mut guard = self.records.write().unwrap();
        for id in ids {
            guard.remove(id);
        }
        Ok(())
    }

    async fn search(&self, vector: &[f32], params: SearchParams) -> CoreResult<Vec<SearchHit>> {
        let guard = self.records.read().unwrap();
        let mut hits: Vec<SearchHit> = guard
            .values()
            .filter(|r| params.filter.is_empty() || filter_matches(&r.metadata, &params.filter))
            .map(|r| SearchHit {
                id: r.id.clone(),
                score: cosine_similarity(vector, &r.vector).clamp(0.0, 1.0),
                metadata: if params.include_metadata {
                    r.metadata.clone()
                } else {
                    Default::default()
                },
            })
            .filter(|hit| params.score_threshold.map(|t| hit.score >= t).unwrap_or(true))
            .collect();

        sort_hits(&mut hits);
        hits.truncate(params.top_k.max(1));
        Ok(hits)
    }

    async fn stats(&self) -> CoreResult<VectorStoreStats> {
        let guard = self.records.read().unwrap();
        Ok(VectorStoreStats {
            vector_count: guard.len() as u64,
            dim: self.dim,
            index_tag: "flat-in-memory".to_string(),
            last_updated: Utc::now(),
            bytes: Some((guard.len() * self.dim * 4) as u64),
        })
    }
}
