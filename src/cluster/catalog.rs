// Copyright 2025 Kraze Maintainers.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Component C: Resource Catalog. Wraps [`kube::discovery::Discovery`] so
//! every applier can turn a `(group, version, kind)` triple into an
//! [`ApiResource`]/[`Scope`] pair without repeating the discovery walk.

use crate::shared::error::{KrazeError, Result};
use kube::core::GroupVersionKind;
use kube::discovery::{ApiCapabilities, ApiResource, Discovery, Scope};
use kube::Client;

/// Kinds that are always cluster-scoped. Used as a fallback when a CRD
/// has not yet registered with the discovery API (freshly applied in the
/// same run) and discovery has not been refreshed.
const CLUSTER_SCOPED_KINDS: &[&str] = &[
    "Namespace",
    "Node",
    "PersistentVolume",
    "ClusterRole",
    "ClusterRoleBinding",
    "CustomResourceDefinition",
    "StorageClass",
    "VolumeAttachment",
    "APIService",
    "MutatingWebhookConfiguration",
    "ValidatingWebhookConfiguration",
    "PriorityClass",
    "RuntimeClass",
    "CSIDriver",
    "CSINode",
    "IngressClass",
];

pub struct Catalog {
    client: Client,
    discovery: Discovery,
}

impl Catalog {
    pub async fn discover(client: &Client) -> Result<Self> {
        let discovery = Discovery::new(client.clone())
            .run()
            .await
            .map_err(|e| KrazeError::ApiError(format!("resource discovery failed: {e}")))?;
        Ok(Self {
            client: client.clone(),
            discovery,
        })
    }

    pub async fn refresh(&mut self) -> Result<()> {
        self.discovery = Discovery::new(self.client.clone())
            .run()
            .await
            .map_err(|e| KrazeError::ApiError(format!("resource discovery refresh failed: {e}")))?;
        Ok(())
    }

    /// Resolves a GVK, falling back to a best-guess `ApiResource` built
    /// from naive pluralization for CRDs discovery hasn't seen yet.
    pub fn resolve(&self, gvk: &GroupVersionKind) -> Result<(ApiResource, ApiCapabilities)> {
        if let Some(found) = self.discovery.resolve_gvk(gvk) {
            return Ok(found);
        }

        let scope = if CLUSTER_SCOPED_KINDS.contains(&gvk.kind.as_str()) {
            Scope::Cluster
        } else {
            Scope::Namespaced
        };

        let plural = naive_plural(&gvk.kind);
        let api_resource = ApiResource::from_gvk_with_plural(gvk, &plural);
        let capabilities = ApiCapabilities {
            scope,
            subresources: Vec::new(),
            operations: Vec::new(),
        };
        Ok((api_resource, capabilities))
    }
}

fn naive_plural(kind: &str) -> String {
    let lower = kind.to_lowercase();
    if lower.ends_with('s') || lower.ends_with("ch") || lower.ends_with("sh") || lower.ends_with('x') {
        format!("{lower}es")
    } else if let Some(stem) = lower.strip_suffix('y') {
        if stem.ends_with(['a', 'e', 'i', 'o', 'u']) {
            format!("{lower}s")
        } else {
            format!("{stem}ies")
        }
    } else {
        format!("{lower}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pluralizes_common_kinds() {
        assert_eq!(naive_plural("Deployment"), "deployments");
        assert_eq!(naive_plural("Ingress"), "ingresses");
        assert_eq!(naive_plural("NetworkPolicy"), "networkpolicies");
        assert_eq!(naive_plural("Gateway"), "gateways");
    }

    #[test]
    fn known_cluster_scoped_kinds_are_recognized() {
        assert!(CLUSTER_SCOPED_KINDS.contains(&"CustomResourceDefinition"));
        assert!(!CLUSTER_SCOPED_KINDS.contains(&"Deployment"));
    }
}
