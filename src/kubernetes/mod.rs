// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Cluster access for the checks
//!
//! The checks only need three capabilities from the control plane: the
//! published API surface (for resolving kind names), `list` and `get`.
//! They are expressed by the [`ClusterApi`] trait so the pipeline can run
//! against the real cluster ([`KubeCluster`]) or an in-memory fake in tests.

mod client;
pub mod discovery;
#[cfg(test)]
pub mod fake;
mod fetcher;

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

pub use client::KubeCluster;
pub use discovery::{CatalogEntry, GroupVersions, discover, resolve};
pub use fetcher::ResourceFetcher;

use crate::error::FetchError;

/// Fully-qualified location of a resource type on the API server
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceAddress {
    /// API group (empty string for core v1)
    pub group: String,
    pub version: String,
    pub kind: String,
    /// Plural resource name used in URLs (e.g. "pods")
    pub plural: String,
    pub namespaced: bool,
}

impl ResourceAddress {
    /// Get the full API group/version string
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

impl fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}.{}", self.plural, self.version)
        } else {
            write!(f, "{}.{}.{}", self.plural, self.version, self.group)
        }
    }
}

/// Parameters to push down to the Kubernetes API
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApiFilters {
    /// Label selector string (e.g., "app=nginx,version=v1")
    pub label_selector: Option<String>,
    /// Field selector string (e.g., "status.phase=Running")
    pub field_selector: Option<String>,
}

impl ApiFilters {
    /// Build filters from raw flag values; empty strings mean "no filter"
    pub fn new(label_selector: &str, field_selector: &str) -> Self {
        let non_empty = |s: &str| {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        };
        Self {
            label_selector: non_empty(label_selector),
            field_selector: non_empty(field_selector),
        }
    }

    pub fn has_selector(&self) -> bool {
        self.label_selector.is_some() || self.field_selector.is_some()
    }
}

/// The control-plane capabilities the checks depend on.
///
/// Implementations perform exactly one attempt per call; retries and
/// deadlines belong to the transport underneath.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// List every API group with its served versions, preferred version first.
    /// The core group is reported with an empty name.
    async fn api_groups(&self) -> Result<Vec<GroupVersions>, FetchError>;

    /// List the resource types served by one group version
    async fn api_resources(&self, group: &str, version: &str)
    -> Result<Vec<CatalogEntry>, FetchError>;

    /// List objects; `namespace: None` means all namespaces
    async fn list(
        &self,
        address: &ResourceAddress,
        namespace: Option<&str>,
        filters: &ApiFilters,
    ) -> Result<Vec<serde_json::Value>, FetchError>;

    /// Get a single named object
    async fn get(
        &self,
        address: &ResourceAddress,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<serde_json::Value, FetchError>;
}
