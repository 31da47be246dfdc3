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

//! Component H: Config Checksum Injector. Hashes the config-bearing
//! resources applied for a service and stamps the digest onto its
//! workloads so a pod template spec changes (and rolls) when only a
//! mounted ConfigMap or Secret changed.

use crate::cluster::Resource;
use crate::shared::error::warn;
use kube::api::{Api, DynamicObject, Patch, PatchParams};
use kube::Client;
use sha2::{Digest, Sha256};
use serde_json::json;

pub const CONFIG_HASH_ANNOTATION: &str = "kraze.dev/config-hash";
const PATCH_MANAGER: &str = "kraze";

/// Computes the digest over every ConfigMap/Secret in `resources`, in
/// encounter order. Returns `None` if no config-bearing resource exists.
pub fn compute_digest(resources: &[Resource]) -> Option<String> {
    let mut body = String::new();
    for resource in resources {
        if resource.kind() != "ConfigMap" && resource.kind() != "Secret" {
            continue;
        }
        let json = serde_json::to_value(&resource.object).ok()?;
        let data = json.get("data").cloned().unwrap_or(serde_json::Value::Null);
        let string_data = json.get("stringData").cloned().unwrap_or(serde_json::Value::Null);

        if !data.is_null() {
            body.push_str(&serde_json::to_string(&data).ok()?);
            body.push('\n');
        }
        if !string_data.is_null() {
            body.push_str(&serde_json::to_string(&string_data).ok()?);
            body.push('\n');
        }
    }

    if body.is_empty() {
        return None;
    }

    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    Some(hex::encode(hasher.finalize()))
}

/// Best-effort merge patch of `kraze.dev/config-hash` onto every
/// Deployment/StatefulSet/DaemonSet in `resources`. Failures are logged
/// and never propagated — a hash-stamp miss is not fatal to the install.
pub async fn inject(client: &Client, catalog: &crate::cluster::Catalog, resources: &[Resource], digest: &str) {
    for resource in resources {
        if !matches!(resource.kind(), "Deployment" | "StatefulSet" | "DaemonSet") {
            continue;
        }

        let (api_resource, capabilities) = match catalog.resolve(&resource.gvk) {
            Ok(r) => r,
            Err(e) => {
                warn("config-checksum", format!("resolving {}: {e}", resource.display_name()));
                continue;
            }
        };

        let api: Api<DynamicObject> = if capabilities.scope == kube::discovery::Scope::Namespaced {
            let ns = resource.namespace().unwrap_or("default");
            Api::namespaced_with(client.clone(), ns, &api_resource)
        } else {
            Api::all_with(client.clone(), &api_resource)
        };

        let patch = json!({
            "spec": {
                "template": {
                    "metadata": {
                        "annotations": {
                            CONFIG_HASH_ANNOTATION: digest
                        }
                    }
                }
            }
        });

        let params = PatchParams {
            field_manager: Some(PATCH_MANAGER.to_string()),
            ..Default::default()
        };
        if let Err(e) = api.patch(resource.name(), &params, &Patch::Merge(&patch)).await {
            warn(
                "config-checksum",
                format!("patching {} with config hash: {e}", resource.display_name()),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::api::DynamicObject;

    fn configmap(data: serde_json::Value) -> Resource {
        let obj: DynamicObject = serde_json::from_value(serde_json::json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": { "name": "app-config" },
            "data": data,
        }))
        .unwrap();
        Resource::new(
            obj,
            kube::core::GroupVersionKind { group: String::new(), version: "v1".to_string(), kind: "ConfigMap".to_string() },
        )
    }

    #[test]
    fn empty_resource_list_yields_no_digest() {
        assert!(compute_digest(&[]).is_none());
    }

    #[test]
    fn digest_is_stable_for_identical_input() {
        let a = configmap(serde_json::json!({"key": "value"}));
        let b = configmap(serde_json::json!({"key": "value"}));
        assert_eq!(compute_digest(&[a]), compute_digest(&[b]));
    }

    #[test]
    fn digest_changes_with_content() {
        let a = configmap(serde_json::json!({"key": "value"}));
        let b = configmap(serde_json::json!({"key": "other"}));
        assert_ne!(compute_digest(&[a]), compute_digest(&[b]));
    }

    #[test]
    fn non_config_resources_are_ignored() {
        let obj: DynamicObject = serde_json::from_value(serde_json::json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": { "name": "app" },
        }))
        .unwrap();
        let resource = Resource::new(
            obj,
            kube::core::GroupVersionKind { group: "apps".to_string(), version: "v1".to_string(), kind: "Deployment".to_string() },
        );
        assert!(compute_digest(&[resource]).is_none());
    }
}
