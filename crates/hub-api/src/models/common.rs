//! Request and response DTOs for the evaluation API

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use shared::error::{Result, ServiceError};
use shared::models::{BenchmarkStatusEvent, EvaluationJob, JobState};
use shared::providers::{BenchmarkFilter, BenchmarkListing, ProviderDescriptor};

/// Standard error response: `{message, code, trace}`
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
    pub code: String,
    /// Request correlation id echoed from `X-Global-Transaction-Id`
    pub trace: String,
}

impl ErrorResponse {
    pub fn new(
        message: impl Into<String>,
        code: impl Into<String>,
        trace: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
            trace: trace.into(),
        }
    }
}

/// Pagination envelope of a list response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
    pub total: i64,
}

/// Paginated job listing
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct JobListResponse {
    pub page: Page,
    pub items: Vec<EvaluationJob>,
}

/// Query parameters for the job listing
#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub status_filter: Option<String>,
}

fn default_limit() -> i64 {
    20
}

impl ListJobsQuery {
    /// Validate the page bounds and parse the optional status filter
    pub fn validate(&self) -> Result<Option<JobState>> {
        if self.limit < 1 || self.limit > 100 {
            return Err(ServiceError::validation("limit must be between 1 and 100"));
        }
        if self.offset < 0 {
            return Err(ServiceError::validation("offset must be non-negative"));
        }
        self.status_filter
            .as_deref()
            .map(str::parse::<JobState>)
            .transpose()
    }
}

/// Query parameters for job deletion
#[derive(Debug, Deserialize)]
pub struct DeleteJobQuery {
    #[serde(default)]
    pub hard_delete: bool,
}

/// Request body of the worker callback endpoint
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateEvaluationJobRequest {
    pub benchmark_status_event: BenchmarkStatusEvent,
}

/// Query parameters for the benchmark catalog listing
#[derive(Debug, Default, Deserialize)]
pub struct BenchmarksQuery {
    #[serde(default)]
    pub provider_id: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Comma-separated tag list; all tags must match
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

impl BenchmarksQuery {
    pub fn to_filter(&self) -> BenchmarkFilter {
        BenchmarkFilter {
            provider_id: self.provider_id.clone(),
            category: self.category.clone(),
            tags: self
                .tags
                .as_deref()
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|t| !t.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
            id: self.id.clone(),
        }
    }
}

/// Provider catalog listing
#[derive(Debug, Serialize, ToSchema)]
pub struct ProvidersResponse {
    pub providers: Vec<ProviderDescriptor>,
}

/// Benchmark catalog listing
#[derive(Debug, Serialize, ToSchema)]
pub struct BenchmarksResponse {
    pub benchmarks: Vec<BenchmarkListing>,
}

/// Health check response
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub version: String,
}
