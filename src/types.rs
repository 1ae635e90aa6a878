use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

/// Opaque JSON-like metadata attached to a Vector Record / Search Hit. Only
/// the fields with defined semantics (sourceId, contentId, title, excerpt,
/// url, category, tags, createdAt, modifiedAt, text) are interpreted by the
/// core; everything else passes through untouched.
pub type Metadata = HashMap<String, JsonValue>;

/// Filter comparison operators recognized by query filters and the vector
/// store adapter's native filter translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
    In,
    Contains,
}

/// A single (field, operator, value) filter clause.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub operator: FilterOperator,
    pub value: JsonValue,
}

impl Filter {
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: JsonValue) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }
}

/// A natural-language query submitted to the processor. Immutable after
/// construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub id: Uuid,
    pub text: String,
    #[serde(default)]
    pub context: Option<Metadata>,
    #[serde(default)]
    pub filters: Option<Vec<Filter>>,
    #[serde(default)]
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Query {
    /// Construct a Query, trimming the text and enforcing the 1..10_000
    /// character non-empty-after-trim invariant.
    pub fn new(
        text: impl Into<String>,
        context: Option<Metadata>,
        filters: Option<Vec<Filter>>,
        user_id: Option<String>,
    ) -> CoreResult<Self> {
        let trimmed = text.into().trim().to_string();
        if trimmed.is_empty() {
            return Err(CoreError::Validation("query text is empty".to_string()));
        }
        if trimmed.chars().count() > 10_000 {
            return Err(CoreError::Validation(
                "query text exceeds 10000 characters".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            text: trimmed,
            context,
            filters,
            user_id,
            created_at: Utc::now(),
        })
    }
}

/// Intent classification bucket assigned during parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Question,
    Search,
    General,
}

/// Derived, transient parse of a Query. Owned by the processor during one
/// invocation; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedQuery {
    pub original_text: String,
    pub normalized_text: String,
    pub intent: Intent,
    pub entities: Vec<String>,
    pub filters: Vec<Filter>,
}

/// Derived from a ParsedQuery plus the Query's context bag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Optimization {
    pub expanded_terms: Vec<String>,
    pub synonyms: Vec<String>,
    pub effective_filters: Vec<Filter>,
    pub boost: HashMap<String, f32>,
}

impl Optimization {
    /// Every boost weight must be a positive finite number.
    pub fn validate(&self) -> CoreResult<()> {
        for (name, weight) in &self.boost {
            if !weight.is_finite() || *weight <= 0.0 {
                return Err(CoreError::Validation(format!(
                    "boost weight for '{name}' must be a positive finite number"
                )));
            }
        }
        Ok(())
    }
}

/// (id, vector, metadata) as owned by the vector store. The core never
/// mutates metadata it did not itself create.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: Metadata,
}

/// A transient per-query search hit: id, normalized similarity score in
/// [0,1], metadata. Named `SearchHit` (not `SearchResult`) to avoid
/// colliding with `error::CoreResult`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
    pub metadata: Metadata,
}

/// Decomposed ranking-factor breakdown attached to a Ranked Result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RankingFactors {
    pub semantic: f32,
    pub keyword: Option<f32>,
    pub metadata: Option<f32>,
    pub recency: Option<f32>,
}

/// A Search Hit extended with decomposed score components. Invariant:
/// `final_score <= 1.0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedResult {
    pub id: String,
    pub metadata: Metadata,
    pub vector_score: f32,
    pub keyword_score: Option<f32>,
    pub final_score: f32,
    pub factors: RankingFactors,
}

impl RankedResult {
    pub fn from_hit(hit: SearchHit) -> Self {
        Self {
            id: hit.id,
            metadata: hit.metadata,
            vector_score: hit.score,
            keyword_score: None,
            final_score: hit.score,
            factors: RankingFactors {
                semantic: hit.score,
                ..Default::default()
            },
        }
    }
}

/// A citation record carried into the final synthesized response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceReference {
    pub source_id: String,
    pub content_id: String,
    pub title: Option<String>,
    pub url: Option<String>,
    pub excerpt: String,
    pub relevance_score: f32,
}

/// Citation rendering style, configured on the Response Generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CitationStyle {
    Inline,
    Numbered,
    Footnote,
}

/// The final synthesized answer to a Query. Persisted in the cache for the
/// configured query-result TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub id: Uuid,
    pub response_text: String,
    pub sources: Vec<SourceReference>,
    pub confidence: f32,
    pub processing_time_ms: u64,
    pub cached: bool,
}

impl QueryResult {
    /// Sentinel result returned on a fatal internal failure, after cache
    /// lookup and any recoverable error handling: empty sources, zero
    /// confidence, apology text, never cached.
    pub fn sentinel(query_id: Uuid, processing_time_ms: u64) -> Self {
        Self {
            id: query_id,
            response_text:
                "I wasn't able to process this query due to an internal error.".to_string(),
            sources: Vec::new(),
            confidence: 0.0,
            processing_time_ms,
            cached: false,
        }
    }
}

/// Per-in-flight-query bookkeeping. Lives in the admission table while a
/// query executes; removed on completion or cancellation.
#[derive(Debug, Clone)]
pub struct SearchContext {
    pub query_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub partial_results: Vec<RankedResult>,
    pub partial_errors: Vec<String>,
    pub cached: bool,
    pub cancel_token: tokio_util::sync::CancellationToken,
}

impl SearchContext {
    pub fn new(query_id: Uuid) -> Self {
        Self {
            query_id,
            started_at: Utc::now(),
            partial_results: Vec::new(),
            partial_errors: Vec::new(),
            cached: false,
            cancel_token: tokio_util::sync::CancellationToken::new(),
        }
    }
}

/// A single cache entry: payload plus bookkeeping used for stats and
/// eviction policy decisions. Owned by the cache store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub payload: JsonValue,
    pub inserted_at: DateTime<Utc>,
    pub ttl_secs: u64,
    pub access_count: u64,
    pub last_access: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(payload: JsonValue, ttl_secs: u64) -> Self {
        let now = Utc::now();
        Self {
            payload,
            inserted_at: now,
            ttl_secs,
            access_count: 0,
            last_access: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        let age = Utc::now().signed_duration_since(self.inserted_at);
        age.num_seconds() >= self.ttl_secs as i64
    }

    pub fn touch(&mut self) {
        self.access_count += 1;
        self.last_access = Utc::now();
    }
}

/// Popularity bookkeeping kept by cache warming, per query fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageStats {
    pub fingerprint: String,
    pub count: u64,
    pub last_accessed: DateTime<Utc>,
    pub avg_latency_ms: f64,
    pub sources: Vec<String>,
}

impl UsageStats {
    pub fn new(fingerprint: impl Into<String>, latency_ms: f64, sources: Vec<String>) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            count: 1,
            last_accessed: Utc::now(),
            avg_latency_ms: latency_ms,
            sources,
        }
    }

    /// Record another hit, folding the new latency into an exponential
    /// moving average (alpha = 0.3, matching the teacher's cache-hit-ratio
    /// smoothing convention).
    pub fn record(&mut self, latency_ms: f64, sources: &[String]) {
        const ALPHA: f64 = 0.3;
        self.count += 1;
        self.last_accessed = Utc::now();
        self.avg_latency_ms = ALPHA * latency_ms + (1.0 - ALPHA) * self.avg_latency_ms;
        for s in sources {
            if !self.sources.contains(s) {
                self.sources.push(s.clone());
            }
        }
    }

    pub fn popularity_score(&self, now: DateTime<Utc>) -> f64 {
        let age_secs = (now - self.last_accessed).num_seconds().max(0) as f64;
        self.count as f64 / (age_secs + 1.0)
    }
}
