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

//! Component E: Apply Engine. Takes raw YAML documents, resolves each to
//! a concrete API endpoint via the [`Catalog`], stamps tracking labels,
//! and performs idempotent Server-Side Apply.

use crate::cluster::{Catalog, Resource};
use crate::shared::error::{KrazeError, Result};
use backon::{ExponentialBuilder, Retryable};
use kube::api::{Api, DeleteParams, DynamicObject, PostParams, PropagationPolicy};
use kube::core::{GroupVersionKind, ObjectMeta, TypeMeta};
use kube::Client;
use std::collections::BTreeMap;

pub const FIELD_MANAGER: &str = "kraze";
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const SERVICE_LABEL: &str = "kraze.service";

const DEFAULT_NAMESPACES: &[&str] = &["default", "kube-system", "kube-public", "kube-node-lease"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyAction {
    Created,
    Configured,
}

#[derive(Debug, Clone)]
pub struct AppliedResource {
    pub display_name: String,
    pub action: ApplyAction,
}

pub struct Applier<'a> {
    client: Client,
    catalog: &'a Catalog,
    service_name: String,
}

impl<'a> Applier<'a> {
    pub fn new(client: Client, catalog: &'a Catalog, service_name: impl Into<String>) -> Self {
        Self {
            client,
            catalog,
            service_name: service_name.into(),
        }
    }

    /// Parses a raw document, stamps tracking labels, and applies it in
    /// `default_namespace` unless the document already names one.
    pub async fn apply_document(&self, doc: &str, default_namespace: &str) -> Result<AppliedResource> {
        let resource = self.prepare(doc, default_namespace)?;
        self.ensure_namespace(&resource).await?;
        self.apply_resource(&resource).await
    }

    fn prepare(&self, doc: &str, default_namespace: &str) -> Result<Resource> {
        let mut object: DynamicObject = serde_yaml::from_str(doc)?;

        let type_meta: TypeMeta = object
            .types
            .clone()
            .ok_or_else(|| KrazeError::ApiError("document missing apiVersion/kind".to_string()))?;
        let gvk = gvk_from_type_meta(&type_meta);

        let (_api_resource, capabilities) = self.catalog.resolve(&gvk)?;
        if capabilities.scope == kube::discovery::Scope::Namespaced && object.metadata.namespace.is_none() {
            object.metadata.namespace = Some(default_namespace.to_string());
        }

        stamp_labels(&mut object.metadata, &self.service_name);

        Ok(Resource::new(object, gvk))
    }

    async fn ensure_namespace(&self, resource: &Resource) -> Result<()> {
        let Some(ns) = resource.namespace() else {
            return Ok(());
        };
        if DEFAULT_NAMESPACES.contains(&ns) {
            return Ok(());
        }

        use k8s_openapi::api::core::v1::Namespace;
        let api: Api<Namespace> = Api::all(self.client.clone());
        let namespace = Namespace {
            metadata: ObjectMeta {
                name: Some(ns.to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        match api.create(&PostParams::default(), &namespace).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(e)) if e.code == 409 => Ok(()),
            Err(e) => Err(KrazeError::ApiError(format!("creating namespace '{ns}': {e}"))),
        }
    }

    /// Look up the resource by name. If not found, create it. If found,
    /// copy the existing resource version onto the candidate and update
    /// it (optimistic concurrency). A 409 on update means someone else
    /// raced us to the resourceVersion; re-read and retry.
    async fn apply_resource(&self, resource: &Resource) -> Result<AppliedResource> {
        let api = self.api_for(resource);
        let name = resource.name().to_string();
        let object = resource.object.clone();

        let attempt = || {
            let api = api.clone();
            let object = object.clone();
            let name = name.clone();
            async move {
                match api.get_opt(&name).await? {
                    Some(existing) => {
                        let mut candidate = object;
                        candidate.metadata.resource_version = existing.metadata.resource_version;
                        let updated = api.replace(&name, &PostParams::default(), &candidate).await?;
                        Ok((ApplyAction::Configured, updated))
                    }
                    None => {
                        let created = api.create(&PostParams::default(), &object).await?;
                        Ok((ApplyAction::Created, created))
                    }
                }
            }
        };

        let (action, _) = attempt
            .retry(&ExponentialBuilder::default().with_max_times(3))
            .when(|e: &kube::Error| matches!(e, kube::Error::Api(resp) if resp.code == 409))
            .await
            .map_err(|e| KrazeError::ApiError(format!("applying {}: {e}", resource.display_name())))?;

        Ok(AppliedResource {
            display_name: resource.display_name(),
            action,
        })
    }

    pub async fn delete_document(&self, doc: &str, default_namespace: &str) -> Result<bool> {
        let resource = self.prepare(doc, default_namespace)?;
        self.delete_resource(&resource).await
    }

    async fn delete_resource(&self, resource: &Resource) -> Result<bool> {
        let api = self.api_for(resource);
        let params = DeleteParams {
            propagation_policy: Some(PropagationPolicy::Background),
            ..Default::default()
        };
        match api.delete(resource.name(), &params).await {
            Ok(_) => Ok(true),
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(false),
            Err(e) => Err(KrazeError::ApiError(format!("deleting {}: {e}", resource.display_name()))),
        }
    }

    fn api_for(&self, resource: &Resource) -> Api<DynamicObject> {
        let (api_resource, capabilities) = self
            .catalog
            .resolve(&resource.gvk)
            .expect("resolved once already during prepare");
        if capabilities.scope == kube::discovery::Scope::Namespaced {
            let ns = resource.namespace().unwrap_or("default");
            Api::namespaced_with(self.client.clone(), ns, &api_resource)
        } else {
            Api::all_with(self.client.clone(), &api_resource)
        }
    }
}

fn stamp_labels(meta: &mut ObjectMeta, service_name: &str) {
    let labels = meta.labels.get_or_insert_with(BTreeMap::new);
    labels.insert(MANAGED_BY_LABEL.to_string(), "kraze".to_string());
    labels.insert(SERVICE_LABEL.to_string(), service_name.to_string());
}

fn gvk_from_type_meta(tm: &TypeMeta) -> GroupVersionKind {
    match tm.api_version.rsplit_once('/') {
        Some((group, version)) => GroupVersionKind {
            group: group.to_string(),
            version: version.to_string(),
            kind: tm.kind.clone(),
        },
        None => GroupVersionKind {
            group: String::new(),
            version: tm.api_version.clone(),
            kind: tm.kind.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_group_and_version() {
        let tm = TypeMeta {
            api_version: "apps/v1".to_string(),
            kind: "Deployment".to_string(),
        };
        let gvk = gvk_from_type_meta(&tm);
        assert_eq!(gvk.group, "apps");
        assert_eq!(gvk.version, "v1");
    }

    #[test]
    fn parses_core_group() {
        let tm = TypeMeta {
            api_version: "v1".to_string(),
            kind: "ConfigMap".to_string(),
        };
        let gvk = gvk_from_type_meta(&tm);
        assert_eq!(gvk.group, "");
        assert_eq!(gvk.version, "v1");
    }

    #[test]
    fn stamps_tracking_labels() {
        let mut meta = ObjectMeta::default();
        stamp_labels(&mut meta, "redis");
        let labels = meta.labels.unwrap();
        assert_eq!(labels.get(MANAGED_BY_LABEL).unwrap(), "kraze");
        assert_eq!(labels.get(SERVICE_LABEL).unwrap(), "redis");
    }
}
