// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Retrieval of resolved resources as untyped JSON documents

use serde_json::Value;
use tracing::debug;

use super::{ApiFilters, ClusterApi, ResourceAddress};
use crate::error::FetchError;

/// Lists or gets objects of a resolved resource type.
///
/// Namespace handling follows kubectl: an empty namespace means every
/// namespace, and cluster-scoped resources ignore the namespace entirely.
pub struct ResourceFetcher<'a> {
    cluster: &'a dyn ClusterApi,
}

impl<'a> ResourceFetcher<'a> {
    pub fn new(cluster: &'a dyn ClusterApi) -> Self {
        Self { cluster }
    }

    fn scope<'n>(address: &ResourceAddress, namespace: &'n str) -> Option<&'n str> {
        let namespace = namespace.trim();
        if !address.namespaced {
            if !namespace.is_empty() {
                debug!(
                    resource = %address,
                    namespace = %namespace,
                    "Ignoring namespace for cluster-scoped resource"
                );
            }
            return None;
        }
        (!namespace.is_empty()).then_some(namespace)
    }

    /// List every object matching the selectors
    pub async fn list(
        &self,
        address: &ResourceAddress,
        namespace: &str,
        filters: &ApiFilters,
    ) -> Result<Vec<Value>, FetchError> {
        let scope = Self::scope(address, namespace);
        debug!(
            resource = %address,
            namespace = ?scope,
            label_selector = ?filters.label_selector,
            field_selector = ?filters.field_selector,
            "Listing resources"
        );

        let mut items = self.cluster.list(address, scope, filters).await?;

        // List responses omit apiVersion and kind on the items
        let api_version = address.api_version();
        for item in &mut items {
            if let Value::Object(map) = item {
                map.entry("apiVersion")
                    .or_insert_with(|| Value::String(api_version.clone()));
                map.entry("kind")
                    .or_insert_with(|| Value::String(address.kind.clone()));
            }
        }

        debug!(resource = %address, count = items.len(), "Listed resources");
        Ok(items)
    }

    /// Get a single named object
    pub async fn get(
        &self,
        address: &ResourceAddress,
        namespace: &str,
        name: &str,
    ) -> Result<Value, FetchError> {
        let scope = Self::scope(address, namespace);
        debug!(resource = %address, namespace = ?scope, name = %name, "Getting resource");
        self.cluster.get(address, scope, name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kubernetes::fake::{FakeCluster, pod};
    use serde_json::json;

    fn pods() -> ResourceAddress {
        ResourceAddress {
            group: String::new(),
            version: "v1".to_string(),
            kind: "Pod".to_string(),
            plural: "pods".to_string(),
            namespaced: true,
        }
    }

    fn nodes() -> ResourceAddress {
        ResourceAddress {
            group: String::new(),
            version: "v1".to_string(),
            kind: "Node".to_string(),
            plural: "nodes".to_string(),
            namespaced: false,
        }
    }

    fn cluster() -> FakeCluster {
        FakeCluster::new()
            .with_object("", "pods", pod("default", "web-1", "Running"))
            .with_object("", "pods", pod("default", "web-2", "Pending"))
            .with_object("", "pods", pod("kube-system", "dns-1", "Running"))
            .with_object("", "nodes", json!({"metadata": {"name": "node-1"}}))
    }

    #[tokio::test]
    async fn test_list_cluster_wide_and_namespaced() {
        let cluster = cluster();
        let fetcher = ResourceFetcher::new(&cluster);

        let all = fetcher.list(&pods(), "", &ApiFilters::default()).await.unwrap();
        assert_eq!(all.len(), 3);

        let default = fetcher
            .list(&pods(), "default", &ApiFilters::default())
            .await
            .unwrap();
        assert_eq!(default.len(), 2);
    }

    #[tokio::test]
    async fn test_list_injects_api_version_and_kind() {
        let cluster = cluster();
        let fetcher = ResourceFetcher::new(&cluster);

        let items = fetcher
            .list(&pods(), "kube-system", &ApiFilters::default())
            .await
            .unwrap();
        assert_eq!(items[0]["apiVersion"], "v1");
        assert_eq!(items[0]["kind"], "Pod");
    }

    #[tokio::test]
    async fn test_namespace_ignored_for_cluster_scoped() {
        let cluster = cluster();
        let fetcher = ResourceFetcher::new(&cluster);

        let items = fetcher
            .list(&nodes(), "default", &ApiFilters::default())
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["metadata"]["name"], "node-1");
    }

    #[tokio::test]
    async fn test_selectors_pass_through() {
        let cluster = cluster();
        let fetcher = ResourceFetcher::new(&cluster);

        let running = fetcher
            .list(&pods(), "", &ApiFilters::new("", "status.phase=Running"))
            .await
            .unwrap();
        assert_eq!(running.len(), 2);

        let web = fetcher
            .list(&pods(), "", &ApiFilters::new("app=web", "status.phase!=Running"))
            .await
            .unwrap();
        assert_eq!(web.len(), 1);
        assert_eq!(web[0]["metadata"]["name"], "web-2");
    }

    #[tokio::test]
    async fn test_invalid_selector_surfaces_from_cluster() {
        let cluster = cluster();
        let fetcher = ResourceFetcher::new(&cluster);

        let err = fetcher
            .list(&pods(), "", &ApiFilters::new("app", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidSelector(_)));
    }

    #[tokio::test]
    async fn test_get_named_object() {
        let cluster = cluster();
        let fetcher = ResourceFetcher::new(&cluster);

        let object = fetcher.get(&pods(), "kube-system", "dns-1").await.unwrap();
        assert_eq!(object["status"]["phase"], "Running");

        let err = fetcher.get(&pods(), "default", "dns-1").await.unwrap_err();
        assert_eq!(
            err,
            FetchError::NotFound {
                kind: "Pod".to_string(),
                name: "dns-1".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let cluster = FakeCluster::new().with_unreachable_api("connection refused");
        let fetcher = ResourceFetcher::new(&cluster);

        let err = fetcher
            .list(&pods(), "", &ApiFilters::default())
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::TransportFailure("connection refused".to_string()));
    }
}
