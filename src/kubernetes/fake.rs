// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! In-memory cluster used by tests

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

use super::{ApiFilters, CatalogEntry, ClusterApi, GroupVersions, ResourceAddress};
use crate::error::FetchError;

/// Build a catalog entry with the singular name derived from the kind
pub fn entry(group: &str, version: &str, kind: &str, plural: &str, namespaced: bool) -> CatalogEntry {
    CatalogEntry {
        group: group.to_string(),
        version: version.to_string(),
        kind: kind.to_string(),
        plural: plural.to_string(),
        singular: kind.to_lowercase(),
        short_names: vec![],
        namespaced,
    }
}

/// Minimal pod document
pub fn pod(namespace: &str, name: &str, phase: &str) -> Value {
    serde_json::json!({
        "metadata": {
            "name": name,
            "namespace": namespace,
            "labels": {"app": name.split('-').next().unwrap_or(name)}
        },
        "spec": {"nodeName": "node-1"},
        "status": {"phase": phase}
    })
}

#[derive(Default)]
pub struct FakeCluster {
    groups: Vec<GroupVersions>,
    resources: Vec<CatalogEntry>,
    failing: HashMap<(String, String), String>,
    unreachable: Option<String>,
    objects: Vec<(String, String, Value)>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    fn register_version(&mut self, group: &str, version: &str) {
        match self.groups.iter_mut().find(|g| g.name == group) {
            Some(g) if !g.versions.iter().any(|v| v == version) => {
                g.versions.push(version.to_string())
            }
            Some(_) => {}
            None => self.groups.push(GroupVersions {
                name: group.to_string(),
                versions: vec![version.to_string()],
            }),
        }
    }

    pub fn with_resource(mut self, entry: CatalogEntry) -> Self {
        self.register_version(&entry.group, &entry.version);
        self.resources.push(entry);
        self
    }

    pub fn with_failing_group(mut self, group: &str, version: &str, error: &str) -> Self {
        self.register_version(group, version);
        self.failing
            .insert((group.to_string(), version.to_string()), error.to_string());
        self
    }

    /// Every request fails as if the API server were down
    pub fn with_unreachable_api(mut self, error: &str) -> Self {
        self.unreachable = Some(error.to_string());
        self
    }

    pub fn with_object(mut self, group: &str, plural: &str, object: Value) -> Self {
        self.objects
            .push((group.to_string(), plural.to_string(), object));
        self
    }

    fn check_reachable(&self) -> Result<(), FetchError> {
        match &self.unreachable {
            Some(e) => Err(FetchError::TransportFailure(e.clone())),
            None => Ok(()),
        }
    }

    fn objects_of<'a>(&'a self, address: &'a ResourceAddress) -> impl Iterator<Item = &'a Value> {
        self.objects
            .iter()
            .filter(move |(g, p, _)| *g == address.group && *p == address.plural)
            .map(|(_, _, v)| v)
    }
}

fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |v, key| v.get(key))
}

/// Equality-based selector matching; `lookup_key` maps a selector key to a value
fn selector_matches(
    selector: &str,
    lookup_key: impl Fn(&str) -> Option<String>,
) -> Result<bool, FetchError> {
    for requirement in selector.split(',').map(str::trim) {
        let (key, expected, negate) = if let Some((k, v)) = requirement.split_once("!=") {
            (k, v, true)
        } else if let Some((k, v)) = requirement.split_once("==") {
            (k, v, false)
        } else if let Some((k, v)) = requirement.split_once('=') {
            (k, v, false)
        } else {
            return Err(FetchError::InvalidSelector(format!(
                "unable to parse requirement: {}",
                requirement
            )));
        };
        if key.trim().is_empty() {
            return Err(FetchError::InvalidSelector(format!(
                "empty key in requirement: {}",
                requirement
            )));
        }
        let actual = lookup_key(key.trim());
        let equal = actual.as_deref() == Some(expected.trim());
        if equal == negate {
            return Ok(false);
        }
    }
    Ok(true)
}

fn object_matches(object: &Value, filters: &ApiFilters) -> Result<bool, FetchError> {
    if let Some(labels) = &filters.label_selector {
        let matched = selector_matches(labels, |key| {
            object["metadata"]["labels"][key].as_str().map(String::from)
        })?;
        if !matched {
            return Ok(false);
        }
    }
    if let Some(fields) = &filters.field_selector {
        let matched = selector_matches(fields, |path| {
            lookup(object, path).map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
        })?;
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn api_groups(&self) -> Result<Vec<GroupVersions>, FetchError> {
        self.check_reachable()?;
        Ok(self.groups.clone())
    }

    async fn api_resources(
        &self,
        group: &str,
        version: &str,
    ) -> Result<Vec<CatalogEntry>, FetchError> {
        self.check_reachable()?;
        if let Some(error) = self.failing.get(&(group.to_string(), version.to_string())) {
            return Err(FetchError::TransportFailure(error.clone()));
        }
        Ok(self
            .resources
            .iter()
            .filter(|e| e.group == group && e.version == version)
            .cloned()
            .collect())
    }

    async fn list(
        &self,
        address: &ResourceAddress,
        namespace: Option<&str>,
        filters: &ApiFilters,
    ) -> Result<Vec<Value>, FetchError> {
        self.check_reachable()?;
        let mut items = Vec::new();
        for object in self.objects_of(address) {
            if let Some(ns) = namespace
                && object["metadata"]["namespace"].as_str() != Some(ns)
            {
                continue;
            }
            if object_matches(object, filters)? {
                items.push(object.clone());
            }
        }
        Ok(items)
    }

    async fn get(
        &self,
        address: &ResourceAddress,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Value, FetchError> {
        self.check_reachable()?;
        let namespace = if address.namespaced {
            Some(namespace.unwrap_or("default"))
        } else {
            None
        };
        self.objects_of(address)
            .find(|o| {
                o["metadata"]["name"].as_str() == Some(name)
                    && namespace.is_none_or(|ns| o["metadata"]["namespace"].as_str() == Some(ns))
            })
            .cloned()
            .ok_or_else(|| FetchError::NotFound {
                kind: address.kind.clone(),
                name: name.to_string(),
            })
    }
}
