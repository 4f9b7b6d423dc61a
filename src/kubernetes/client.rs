// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! kube-rs backed implementation of [`ClusterApi`]

use anyhow::{Context, Result};
use async_trait::async_trait;
use kube::api::{ApiResource, DynamicObject, ListParams, ObjectList};
use kube::config::KubeConfigOptions;
use kube::{Api, Client, Config};
use std::time::Duration;
use tracing::{debug, trace};

use super::{ApiFilters, CatalogEntry, ClusterApi, GroupVersions, ResourceAddress};
use crate::error::FetchError;

/// Timeout for connecting to K8s API
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for reading K8s API responses
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Page size for paginated list requests
const PAGE_SIZE: u32 = 500;

/// Connection to a single cluster
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    /// Connect using the given kubeconfig context, or infer the configuration
    /// (in-cluster service account first, then the default kubeconfig context)
    pub async fn connect(context: Option<&str>) -> Result<Self> {
        let mut config = match context {
            Some(ctx) => Config::from_kubeconfig(&KubeConfigOptions {
                context: Some(ctx.to_string()),
                ..Default::default()
            })
            .await
            .with_context(|| format!("Failed to load kubeconfig for context '{}'", ctx))?,
            None => Config::infer()
                .await
                .context("Failed to infer Kubernetes client configuration")?,
        };

        config.connect_timeout = Some(CONNECT_TIMEOUT);
        config.read_timeout = Some(READ_TIMEOUT);

        debug!(cluster_url = %config.cluster_url, "Connecting to cluster");
        let client = Client::try_from(config).context("Failed to create Kubernetes client")?;
        Ok(Self { client })
    }

    fn api(&self, address: &ResourceAddress, namespace: Option<&str>) -> Api<DynamicObject> {
        let ar = ApiResource {
            group: address.group.clone(),
            version: address.version.clone(),
            api_version: address.api_version(),
            kind: address.kind.clone(),
            plural: address.plural.clone(),
        };
        match namespace {
            Some(ns) if address.namespaced => Api::namespaced_with(self.client.clone(), ns, &ar),
            _ => Api::all_with(self.client.clone(), &ar),
        }
    }

    /// Build ListParams from API filters (label selectors, field selectors)
    fn build_list_params(filters: &ApiFilters) -> ListParams {
        let mut params = ListParams::default();

        if let Some(ref label_sel) = filters.label_selector {
            params = params.labels(label_sel);
        }

        if let Some(ref field_sel) = filters.field_selector {
            params = params.fields(field_sel);
        }

        trace!(
            label_selector = ?filters.label_selector,
            field_selector = ?filters.field_selector,
            "Built ListParams"
        );

        params
    }

    /// List all pages, following continue tokens
    async fn list_all(
        api: &Api<DynamicObject>,
        base_params: &ListParams,
    ) -> Result<Vec<DynamicObject>, kube::Error> {
        let mut all_items: Vec<DynamicObject> = Vec::new();
        let mut continue_token: Option<String> = None;
        let mut page_count = 0u32;

        loop {
            let mut params = base_params.clone().limit(PAGE_SIZE);
            if let Some(ref token) = continue_token {
                params = params.continue_token(token);
            }

            let list: ObjectList<DynamicObject> = api.list(&params).await?;
            all_items.extend(list.items);
            page_count += 1;

            match list.metadata.continue_ {
                Some(token) if !token.is_empty() => continue_token = Some(token),
                _ => break,
            }
        }

        if page_count > 1 {
            debug!(pages = page_count, total_items = all_items.len(), "Pagination complete");
        }

        Ok(all_items)
    }
}

/// Map a kube error onto the fetch taxonomy
fn classify_error(
    err: kube::Error,
    address: &ResourceAddress,
    name: Option<&str>,
    filters: Option<&ApiFilters>,
) -> FetchError {
    match &err {
        kube::Error::Api(resp) if resp.code == 404 => match name {
            Some(name) => FetchError::NotFound {
                kind: address.kind.clone(),
                name: name.to_string(),
            },
            None => FetchError::TransportFailure(format!("{} is not served: {}", address, resp.message)),
        },
        kube::Error::Api(resp)
            if resp.code == 400
                && (resp.message.contains("selector")
                    || filters.is_some_and(ApiFilters::has_selector)) =>
        {
            FetchError::InvalidSelector(resp.message.clone())
        }
        _ => FetchError::TransportFailure(err.to_string()),
    }
}

fn discovery_error(err: kube::Error) -> FetchError {
    FetchError::TransportFailure(err.to_string())
}

#[async_trait]
impl ClusterApi for KubeCluster {
    async fn api_groups(&self) -> Result<Vec<GroupVersions>, FetchError> {
        let core = self
            .client
            .list_core_api_versions()
            .await
            .map_err(discovery_error)?;
        let mut groups = vec![GroupVersions {
            name: String::new(),
            versions: core.versions,
        }];

        let list = self.client.list_api_groups().await.map_err(discovery_error)?;
        for group in list.groups {
            let mut versions: Vec<String> = group.versions.into_iter().map(|v| v.version).collect();
            if let Some(preferred) = group.preferred_version.map(|p| p.version) {
                versions.sort_by_key(|v| *v != preferred);
            }
            groups.push(GroupVersions {
                name: group.name,
                versions,
            });
        }

        Ok(groups)
    }

    async fn api_resources(
        &self,
        group: &str,
        version: &str,
    ) -> Result<Vec<CatalogEntry>, FetchError> {
        let list = if group.is_empty() {
            self.client.list_core_api_resources(version).await
        } else {
            self.client
                .list_api_group_resources(&format!("{}/{}", group, version))
                .await
        }
        .map_err(discovery_error)?;

        Ok(list
            .resources
            .into_iter()
            .map(|r| CatalogEntry {
                group: group.to_string(),
                version: version.to_string(),
                kind: r.kind,
                plural: r.name,
                singular: r.singular_name,
                short_names: r.short_names.unwrap_or_default(),
                namespaced: r.namespaced,
            })
            .collect())
    }

    async fn list(
        &self,
        address: &ResourceAddress,
        namespace: Option<&str>,
        filters: &ApiFilters,
    ) -> Result<Vec<serde_json::Value>, FetchError> {
        let api = self.api(address, namespace);
        let params = Self::build_list_params(filters);

        let items = Self::list_all(&api, &params)
            .await
            .map_err(|e| classify_error(e, address, None, Some(filters)))?;

        items
            .into_iter()
            .map(|item| {
                serde_json::to_value(item)
                    .map_err(|e| FetchError::TransportFailure(format!("malformed object: {}", e)))
            })
            .collect()
    }

    async fn get(
        &self,
        address: &ResourceAddress,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<serde_json::Value, FetchError> {
        // A namespaced get needs a namespace; fall back to the client default
        let api = match namespace {
            None if address.namespaced => {
                let ar = ApiResource {
                    group: address.group.clone(),
                    version: address.version.clone(),
                    api_version: address.api_version(),
                    kind: address.kind.clone(),
                    plural: address.plural.clone(),
                };
                Api::default_namespaced_with(self.client.clone(), &ar)
            }
            _ => self.api(address, namespace),
        };

        let object = api
            .get(name)
            .await
            .map_err(|e| classify_error(e, address, Some(name), None))?;
        serde_json::to_value(object)
            .map_err(|e| FetchError::TransportFailure(format!("malformed object: {}", e)))
    }
}
