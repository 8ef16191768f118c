//! Provider registry
//!
//! Benchmark providers and their catalogs are loaded once at startup from a
//! YAML file and read concurrently without locks afterward. The registry is
//! handed to consumers by injection; there is no module-level global.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use utoipa::ToSchema;

use crate::error::{Result, ServiceError};

/// Runtime hints for launching a provider's worker image
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProviderRuntimeSpec {
    /// Worker container image
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_request: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_request: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_limit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_limit: Option<String>,
}

/// One benchmark offered by a provider
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BenchmarkDescriptor {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Default parameters merged under a job's per-benchmark parameters
    #[serde(default)]
    #[schema(value_type = Object)]
    pub parameters: HashMap<String, Value>,
}

/// A benchmark provider and its catalog
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProviderDescriptor {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<ProviderRuntimeSpec>,
    #[serde(default)]
    pub benchmarks: Vec<BenchmarkDescriptor>,
}

/// A catalog entry qualified with its provider id
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BenchmarkListing {
    pub provider_id: String,
    #[serde(flatten)]
    pub benchmark: BenchmarkDescriptor,
}

/// Filters accepted by the benchmark catalog listing
#[derive(Debug, Clone, Default)]
pub struct BenchmarkFilter {
    pub provider_id: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub id: Option<String>,
}

/// Immutable in-memory provider catalog
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    providers: Vec<ProviderDescriptor>,
    index: HashMap<String, usize>,
}

impl ProviderRegistry {
    /// Build a registry from descriptors, rejecting duplicate provider ids
    pub fn new(providers: Vec<ProviderDescriptor>) -> Result<Self> {
        let mut index = HashMap::with_capacity(providers.len());
        for (i, provider) in providers.iter().enumerate() {
            if index.insert(provider.id.clone(), i).is_some() {
                return Err(ServiceError::config(format!(
                    "Duplicate provider id in catalog: {}",
                    provider.id
                )));
            }
        }
        Ok(Self { providers, index })
    }

    /// Load the catalog from a YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ServiceError::config(format!("Failed to read provider catalog {path}: {e}"))
        })?;
        Self::from_yaml(&raw)
    }

    /// Parse a catalog from YAML text
    pub fn from_yaml(raw: &str) -> Result<Self> {
        #[derive(Deserialize)]
        struct Catalog {
            #[serde(default)]
            providers: Vec<ProviderDescriptor>,
        }
        let catalog: Catalog = serde_yaml::from_str(raw)
            .map_err(|e| ServiceError::config(format!("Invalid provider catalog: {e}")))?;
        Self::new(catalog.providers)
    }

    pub fn get(&self, id: &str) -> Option<&ProviderDescriptor> {
        self.index.get(id).map(|i| &self.providers[*i])
    }

    pub fn providers(&self) -> &[ProviderDescriptor] {
        &self.providers
    }

    /// Find a provider's catalog entry for a benchmark id
    pub fn benchmark(&self, provider_id: &str, id: &str) -> Option<&BenchmarkDescriptor> {
        self.get(provider_id)
            .and_then(|p| p.benchmarks.iter().find(|b| b.id == id))
    }

    /// List catalog entries matching the filter
    pub fn benchmarks(&self, filter: &BenchmarkFilter) -> Vec<BenchmarkListing> {
        self.providers
            .iter()
            .filter(|p| {
                filter
                    .provider_id
                    .as_ref()
                    .map(|id| &p.id == id)
                    .unwrap_or(true)
            })
            .flat_map(|p| {
                p.benchmarks
                    .iter()
                    .filter(|b| filter.id.as_ref().map(|id| &b.id == id).unwrap_or(true))
                    .filter(|b| {
                        filter
                            .category
                            .as_ref()
                            .map(|c| b.category.as_ref() == Some(c))
                            .unwrap_or(true)
                    })
                    .filter(|b| filter.tags.iter().all(|t| b.tags.contains(t)))
                    .map(|b| BenchmarkListing {
                        provider_id: p.id.clone(),
                        benchmark: b.clone(),
                    })
            })
            .collect()
    }
}
