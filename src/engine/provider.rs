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

//! Polymorphic dispatch over the two service kinds. The Reconciler picks
//! a provider per service once, at construction, and never branches on
//! `ServiceKind` again.

use crate::cluster::{Catalog, Resource};
use crate::config::model::{ChartSpec, ManifestsSpec, ServiceDescriptor, ServiceStatus};
use crate::engine::{apply, chart, checksum, release};
use crate::manifests::pipeline;
use crate::shared::error::Result;
use async_trait::async_trait;
use kube::core::GroupVersionKind;
use kube::Client;
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait ServiceProvider: Send + Sync {
    async fn install(&self, cancel: &CancellationToken) -> Result<()>;
    async fn uninstall(&self) -> Result<()>;
    async fn status(&self) -> Result<ServiceStatus>;
}

pub fn for_descriptor<'a>(
    descriptor: &'a ServiceDescriptor,
    client: Client,
    catalog: &'a Catalog,
) -> Box<dyn ServiceProvider + 'a> {
    match &descriptor.kind {
        crate::config::model::ServiceKind::Chart(spec) => Box::new(ChartProvider {
            descriptor,
            spec,
            client,
            catalog,
        }),
        crate::config::model::ServiceKind::Manifests(spec) => Box::new(ManifestsProvider {
            descriptor,
            spec,
            client,
            catalog,
        }),
    }
}

struct ManifestsProvider<'a> {
    descriptor: &'a ServiceDescriptor,
    spec: &'a ManifestsSpec,
    client: Client,
    catalog: &'a Catalog,
}

#[async_trait]
impl<'a> ServiceProvider for ManifestsProvider<'a> {
    async fn install(&self, cancel: &CancellationToken) -> Result<()> {
        let docs = pipeline::load_all(&self.spec.paths).await?;
        let applier = apply::Applier::new(self.client.clone(), self.catalog, &self.descriptor.name);

        let mut applied = Vec::new();
        for doc in &docs {
            let result = applier.apply_document(doc, &self.descriptor.namespace).await?;
            applied.push(result);
        }

        let resources = parse_for_checksum(&docs, &self.descriptor.namespace);
        if let Some(digest) = checksum::compute_digest(&resources) {
            checksum::inject(&self.client, self.catalog, &resources, &digest).await;
        }

        if let Some(wait) = &self.descriptor.wait {
            if wait.enabled {
                wait_on_workloads(&self.client, self.catalog, &resources, wait.timeout, cancel).await?;
            }
        }
        Ok(())
    }

    async fn uninstall(&self) -> Result<()> {
        let docs = pipeline::load_all(&self.spec.paths).await?;
        let applier = apply::Applier::new(self.client.clone(), self.catalog, &self.descriptor.name);
        for doc in &docs {
            if let Err(e) = applier.delete_document(doc, &self.descriptor.namespace).await {
                crate::shared::error::warn("uninstall", format!("{}: {e}", self.descriptor.name));
            }
        }
        Ok(())
    }

    async fn status(&self) -> Result<ServiceStatus> {
        status_from_tracked_workloads(&self.client, self.catalog, &self.descriptor.namespace, &self.descriptor.name).await
    }
}

struct ChartProvider<'a> {
    descriptor: &'a ServiceDescriptor,
    spec: &'a ChartSpec,
    client: Client,
    catalog: &'a Catalog,
}

#[async_trait]
impl<'a> ServiceProvider for ChartProvider<'a> {
    async fn install(&self, cancel: &CancellationToken) -> Result<()> {
        let resolved = chart::resolve(self.spec).await?;
        let values = chart::assemble_values(self.spec)?;
        let manifest = render_static_manifest(&resolved.root)?;

        let store = release::ReleaseStore::new(self.client.clone(), self.descriptor.namespace.clone());
        let release_name = &self.descriptor.name;
        let previous = store.latest(release_name).await?;
        let next_version = previous.map(|p| p.version + 1).unwrap_or(1);

        let record = release::ReleaseRecord {
            name: release_name.clone(),
            version: next_version,
            chart: self.spec.chart.clone(),
            chart_version: self.spec.version.clone(),
            manifest: manifest.clone(),
            values,
        };

        let docs = pipeline::split_documents(&manifest);
        let applier = apply::Applier::new(self.client.clone(), self.catalog, &self.descriptor.name);
        for doc in &docs {
            applier.apply_document(doc, &self.descriptor.namespace).await?;
        }

        store.store(&record).await?;

        let resources = parse_for_checksum(&docs, &self.descriptor.namespace);
        if let Some(digest) = checksum::compute_digest(&resources) {
            checksum::inject(&self.client, self.catalog, &resources, &digest).await;
        }

        if let Some(wait) = &self.descriptor.wait {
            if wait.enabled {
                wait_on_workloads(&self.client, self.catalog, &resources, wait.timeout, cancel).await?;
            }
        }
        Ok(())
    }

    async fn uninstall(&self) -> Result<()> {
        let store = release::ReleaseStore::new(self.client.clone(), self.descriptor.namespace.clone());
        let keep_crds = self.descriptor.keep_crds.unwrap_or(false);

        if let Some(record) = store.latest(&self.descriptor.name).await? {
            let docs = pipeline::split_documents(&record.manifest);
            let crd_names = crds_to_delete(&record.manifest, keep_crds);

            let applier = apply::Applier::new(self.client.clone(), self.catalog, &self.descriptor.name);
            for doc in &docs {
                if let Err(e) = applier.delete_document(doc, &self.descriptor.namespace).await {
                    crate::shared::error::warn("uninstall", format!("{}: {e}", self.descriptor.name));
                }
            }

            if !keep_crds {
                for crd_name in crd_names {
                    let gvk = GroupVersionKind {
                        group: "apiextensions.k8s.io".to_string(),
                        version: "v1".to_string(),
                        kind: "CustomResourceDefinition".to_string(),
                    };
                    if let Ok((api_resource, _)) = self.catalog.resolve(&gvk) {
                        let api: kube::Api<kube::api::DynamicObject> =
                            kube::Api::all_with(self.client.clone(), &api_resource);
                        let _ = api.delete(&crd_name, &Default::default()).await;
                    }
                }
            }
        }
        Ok(())
    }

    async fn status(&self) -> Result<ServiceStatus> {
        let store = release::ReleaseStore::new(self.client.clone(), self.descriptor.namespace.clone());
        match store.latest(&self.descriptor.name).await? {
            Some(record) => Ok(ServiceStatus {
                installed: true,
                ready: true,
                message: format!("release revision {}", record.version),
            }),
            None => Ok(ServiceStatus {
                installed: false,
                ready: false,
                message: "not installed".to_string(),
            }),
        }
    }
}

/// Reads every `.yaml`/`.yml` file under `root/templates` (falling back
/// to `root` itself) and concatenates them. Chart templates are treated
/// as already-rendered static content — Go-template expression
/// evaluation is out of scope (spec Non-goal: rendering from scratch).
fn render_static_manifest(root: &std::path::Path) -> Result<String> {
    let templates_dir = root.join("templates");
    let scan_dir = if templates_dir.is_dir() { templates_dir } else { root.to_path_buf() };

    let mut entries: Vec<_> = std::fs::read_dir(&scan_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
                .unwrap_or(false)
        })
        .collect();
    entries.sort();

    let mut manifest = String::new();
    for entry in entries {
        manifest.push_str(&std::fs::read_to_string(entry)?);
        manifest.push_str("\n---\n");
    }
    Ok(manifest)
}

/// CRD names to delete after an uninstall: none when `keep_crds` is
/// set, otherwise every CRD named in the release's last manifest.
fn crds_to_delete(manifest: &str, keep_crds: bool) -> Vec<String> {
    if keep_crds {
        Vec::new()
    } else {
        extract_crd_names(manifest)
    }
}

/// Simple line scan for `kind: CustomResourceDefinition` documents and
/// their `metadata.name`, matching the spec's stated extraction method.
fn extract_crd_names(manifest: &str) -> Vec<String> {
    let mut names = Vec::new();
    for doc in pipeline::split_documents(manifest) {
        if doc.lines().any(|l| l.trim() == "kind: CustomResourceDefinition") {
            if let Ok(value) = serde_yaml::from_str::<serde_yaml::Value>(&doc) {
                if let Some(name) = value.get("metadata").and_then(|m| m.get("name")).and_then(|n| n.as_str()) {
                    names.push(name.to_string());
                }
            }
        }
    }
    names
}

/// Lists the tracked Deployments/StatefulSets/DaemonSets/Jobs/Pods for
/// `service_name` (by the `kraze.service` label) and derives an
/// installed/ready status from their current cluster state, reusing the
/// same per-kind readiness predicate the Waiter polls on.
async fn status_from_tracked_workloads(
    client: &Client,
    catalog: &Catalog,
    namespace: &str,
    service_name: &str,
) -> Result<ServiceStatus> {
    let selector = format!("{}={service_name}", apply::SERVICE_LABEL);
    let mut total = 0usize;
    let mut not_ready: Vec<String> = Vec::new();

    for gvk in crate::engine::wait::workload_gvks() {
        let Ok((api_resource, _capabilities)) = catalog.resolve(&gvk) else {
            continue;
        };
        let api: kube::Api<kube::api::DynamicObject> = kube::Api::namespaced_with(client.clone(), namespace, &api_resource);
        let list = api
            .list(&kube::api::ListParams::default().labels(&selector))
            .await
            .map_err(|e| crate::shared::error::KrazeError::ApiError(format!("listing {}: {e}", gvk.kind)))?;

        for item in &list.items {
            total += 1;
            if !crate::engine::wait::is_ready(&gvk.kind, item)? {
                let name = item.metadata.name.clone().unwrap_or_default();
                not_ready.push(format!("{} '{name}'", gvk.kind));
            }
        }
    }

    if total == 0 {
        return Ok(ServiceStatus {
            installed: false,
            ready: false,
            message: "not installed".to_string(),
        });
    }

    if not_ready.is_empty() {
        Ok(ServiceStatus {
            installed: true,
            ready: true,
            message: format!("{total} workload(s) ready"),
        })
    } else {
        Ok(ServiceStatus {
            installed: true,
            ready: false,
            message: format!("waiting on: {}", not_ready.join(", ")),
        })
    }
}

fn parse_for_checksum(docs: &[String], default_namespace: &str) -> Vec<Resource> {
    docs.iter()
        .filter_map(|doc| {
            let object: kube::api::DynamicObject = serde_yaml::from_str(doc).ok()?;
            let type_meta = object.types.clone()?;
            let gvk = match type_meta.api_version.rsplit_once('/') {
                Some((g, v)) => GroupVersionKind { group: g.to_string(), version: v.to_string(), kind: type_meta.kind },
                None => GroupVersionKind { group: String::new(), version: type_meta.api_version, kind: type_meta.kind },
            };
            let mut object = object;
            if object.metadata.namespace.is_none() {
                object.metadata.namespace = Some(default_namespace.to_string());
            }
            Some(Resource::new(object, gvk))
        })
        .collect()
}

async fn wait_on_workloads(
    client: &Client,
    catalog: &Catalog,
    resources: &[Resource],
    timeout: std::time::Duration,
    cancel: &CancellationToken,
) -> Result<()> {
    let waiter = crate::engine::wait::Waiter::new(client.clone(), catalog);
    for resource in resources {
        waiter
            .wait_ready(&resource.gvk, resource.name(), resource.namespace(), timeout, cancel)
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn extract_crd_names_finds_crd_documents() {
        let manifest = "\
apiVersion: apiextensions.k8s.io/v1
kind: CustomResourceDefinition
metadata:
  name: widgets.example.com
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: unrelated
";
        let names = extract_crd_names(manifest);
        assert_eq!(names, vec!["widgets.example.com"]);
    }

    /// S6 — uninstall with keep_crds=true skips CRD extraction entirely,
    /// so no CRD deletes are ever issued for that release.
    #[test]
    fn keep_crds_flag_skips_crd_extraction() {
        let manifest = "\
apiVersion: apiextensions.k8s.io/v1
kind: CustomResourceDefinition
metadata:
  name: widgets.example.com
";
        assert!(crds_to_delete(manifest, true).is_empty());
        assert_eq!(crds_to_delete(manifest, false), vec!["widgets.example.com"]);
    }

    #[test]
    fn extract_crd_names_ignores_non_crd_documents() {
        let manifest = "\
apiVersion: apps/v1
kind: Deployment
metadata:
  name: app
";
        assert!(extract_crd_names(manifest).is_empty());
    }

    #[test]
    fn render_static_manifest_concatenates_yaml_files_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let templates = dir.path().join("templates");
        fs::create_dir(&templates).unwrap();
        fs::write(templates.join("a-configmap.yaml"), "kind: ConfigMap\nmetadata:\n  name: a\n").unwrap();
        fs::write(templates.join("b-service.yaml"), "kind: Service\nmetadata:\n  name: b\n").unwrap();

        let manifest = render_static_manifest(dir.path()).unwrap();
        let a_pos = manifest.find("name: a").unwrap();
        let b_pos = manifest.find("name: b").unwrap();
        assert!(a_pos < b_pos);
        assert!(manifest.contains("---"));
    }

    #[test]
    fn render_static_manifest_falls_back_to_root_without_templates_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("only.yaml"), "kind: ConfigMap\nmetadata:\n  name: only\n").unwrap();

        let manifest = render_static_manifest(dir.path()).unwrap();
        assert!(manifest.contains("name: only"));
    }
}
