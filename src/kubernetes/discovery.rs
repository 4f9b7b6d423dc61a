// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Resource discovery for Kubernetes clusters.
//!
//! Discovers all available resources (including CRDs) at runtime using
//! the Kubernetes discovery API, then resolves a human-typed kind name
//! such as `Pod`, `deploy` or `Certificate.cert-manager.io` to the
//! [`ResourceAddress`] the fetcher needs.

use tracing::{debug, warn};

use super::{ClusterApi, ResourceAddress};
use crate::error::{FetchError, ResolutionError};

/// Versions served by one API group, preferred version first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupVersions {
    /// Group name (empty string for the core group)
    pub name: String,
    pub versions: Vec<String>,
}

/// One resource type served by a group version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub group: String,
    pub version: String,
    pub kind: String,
    /// Plural resource name (e.g. "deployments", "pods/log" for subresources)
    pub plural: String,
    pub singular: String,
    pub short_names: Vec<String>,
    pub namespaced: bool,
}

impl CatalogEntry {
    fn is_subresource(&self) -> bool {
        self.plural.contains('/')
    }

    /// Match on plural, singular or short name (kubectl-style)
    fn matches_name(&self, name: &str) -> bool {
        self.plural.eq_ignore_ascii_case(name)
            || self.singular.eq_ignore_ascii_case(name)
            || self.short_names.iter().any(|s| s.eq_ignore_ascii_case(name))
    }

    fn address(&self) -> ResourceAddress {
        ResourceAddress {
            group: self.group.clone(),
            version: self.version.clone(),
            kind: self.kind.clone(),
            plural: self.plural.clone(),
            namespaced: self.namespaced,
        }
    }
}

/// A group version whose resource list could not be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedGroup {
    pub group: String,
    pub group_version: String,
    pub error: String,
}

/// Everything the cluster published during one discovery pass.
///
/// Discovery keeps going when individual group versions fail, so the catalog
/// may be partial; failures are kept alongside so resolution can tell
/// "not served" apart from "could not ask".
#[derive(Debug, Clone, Default)]
pub struct ApiCatalog {
    entries: Vec<CatalogEntry>,
    failed: Vec<FailedGroup>,
}

impl ApiCatalog {
    /// Add a resource; subresources are not addressable on their own and are skipped
    pub fn add(&mut self, entry: CatalogEntry) {
        if !entry.is_subresource() {
            self.entries.push(entry);
        }
    }

    pub fn add_failure(&mut self, failure: FailedGroup) {
        self.failed.push(failure);
    }

    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Human-readable group name; the core group has no name of its own
fn group_label(group: &str) -> &str {
    if group.is_empty() { "core" } else { group }
}

/// Discover every group version the cluster serves.
///
/// Only a failure to list the groups themselves is fatal; a failing group
/// version (typically an unavailable aggregated API) is recorded and skipped.
pub async fn discover(cluster: &dyn ClusterApi) -> Result<ApiCatalog, FetchError> {
    let groups = cluster.api_groups().await?;
    let mut catalog = ApiCatalog::default();

    for group in &groups {
        for version in &group.versions {
            match cluster.api_resources(&group.name, version).await {
                Ok(resources) => {
                    for entry in resources {
                        catalog.add(entry);
                    }
                }
                Err(e) => {
                    let group_version = if group.name.is_empty() {
                        version.clone()
                    } else {
                        format!("{}/{}", group.name, version)
                    };
                    warn!(
                        group_version = %group_version,
                        error = %e,
                        "Discovery failed for API group version"
                    );
                    catalog.add_failure(FailedGroup {
                        group: group.name.clone(),
                        group_version,
                        error: e.to_string(),
                    });
                }
            }
        }
    }

    debug!(
        groups = groups.len(),
        resources = catalog.entries.len(),
        failed = catalog.failed.len(),
        "Discovery complete"
    );

    Ok(catalog)
}

/// Split `Kind.group` into kind and optional group; `core` names the legacy group
fn parse_group_kind(kind_name: &str) -> (&str, Option<&str>) {
    match kind_name.trim().split_once('.') {
        Some((kind, "core")) => (kind, Some("")),
        Some((kind, group)) => (kind, Some(group)),
        None => (kind_name.trim(), None),
    }
}

/// Resolve a kind name against a discovered catalog.
///
/// Kind matches outrank plural/singular/short-name matches. Within one group
/// the first entry wins, which is the preferred version because discovery
/// visits it first. Matches in more than one group are ambiguous unless the
/// caller qualified the kind with a group.
pub fn resolve(catalog: &ApiCatalog, kind_name: &str) -> Result<ResourceAddress, ResolutionError> {
    let (kind, group) = parse_group_kind(kind_name);

    let in_scope: Vec<&CatalogEntry> = catalog
        .entries
        .iter()
        .filter(|e| group.is_none_or(|g| e.group == g))
        .collect();

    let mut candidates: Vec<&CatalogEntry> = in_scope
        .iter()
        .copied()
        .filter(|e| e.kind.eq_ignore_ascii_case(kind))
        .collect();
    if candidates.is_empty() {
        candidates = in_scope
            .iter()
            .copied()
            .filter(|e| e.matches_name(kind))
            .collect();
    }

    // One candidate per group, keeping the preferred version
    let mut per_group: Vec<&CatalogEntry> = Vec::new();
    for entry in candidates {
        if !per_group.iter().any(|e| e.group == entry.group) {
            per_group.push(entry);
        }
    }

    match per_group.as_slice() {
        [entry] => {
            if catalog.is_partial() {
                warn!(
                    kind = %kind_name,
                    failed = catalog.failed.len(),
                    "Resolved against a partial API catalog"
                );
            }
            debug!(
                kind = %kind_name,
                group = %group_label(&entry.group),
                version = %entry.version,
                plural = %entry.plural,
                "Resolved resource kind"
            );
            Ok(entry.address())
        }
        [] => {
            let failed: Vec<String> = catalog
                .failed
                .iter()
                .filter(|f| group.is_none_or(|g| f.group == g))
                .map(|f| format!("{} ({})", f.group_version, f.error))
                .collect();
            if failed.is_empty() {
                Err(ResolutionError::NotFound {
                    kind: kind_name.to_string(),
                })
            } else {
                Err(ResolutionError::DiscoveryPartialFailure {
                    kind: kind_name.to_string(),
                    failed,
                })
            }
        }
        entries => {
            let mut groups: Vec<String> = entries
                .iter()
                .map(|e| group_label(&e.group).to_string())
                .collect();
            groups.sort();
            Err(ResolutionError::Ambiguous {
                kind: kind_name.to_string(),
                groups,
            })
        }
    }
}
