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

//! Component A: Config Loader. Reads a document from disk, substitutes
//! environment references, decodes into the [`Bundle`] model, resolves
//! relative paths against the document's directory, and validates.

use crate::config::env_subst;
use crate::config::model::*;
use crate::config::wire::*;
use crate::shared::duration;
use crate::shared::error::{FieldError, KrazeError, Result};
use std::path::{Path, PathBuf};

pub fn load(path: impl AsRef<Path>) -> Result<Bundle> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)?;
    let base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    load_str(&raw, &base_dir)
}

pub fn load_str(raw: &str, base_dir: &Path) -> Result<Bundle> {
    let substituted = env_subst::substitute(raw);
    let wire: BundleWire = serde_yaml::from_str(&substituted)?;

    let mut errors: Vec<FieldError> = Vec::new();

    let cluster_wire = wire.cluster.unwrap_or_default();
    let cluster_name = cluster_wire.name.clone().unwrap_or_default();
    if cluster_name.trim().is_empty() {
        errors.push(FieldError::new("cluster.name", "cluster name is required"));
    }

    let enabled_names: std::collections::HashSet<String> = wire.services.keys().cloned().collect();

    let mut services = std::collections::HashMap::new();
    for (name, service_wire) in wire.services.into_iter() {
        match lower_service(&name, service_wire, base_dir, &enabled_names) {
            Ok(descriptor) => {
                services.insert(name, descriptor);
            }
            Err(mut field_errors) => errors.append(&mut field_errors),
        }
    }

    if !errors.is_empty() {
        return Err(KrazeError::InvalidConfig(errors));
    }

    let cluster = ClusterDescriptor {
        name: cluster_name,
        version: cluster_wire.version,
        nodes: cluster_wire
            .config
            .into_iter()
            .map(|n| NodeSpec {
                role: n.role,
                replicas: n.replicas,
                extra_port_mappings: n.extra_port_mappings,
                extra_mounts: n.extra_mounts,
                labels: n.labels,
            })
            .collect(),
        networking: cluster_wire.networking.map(|n| NetworkingSpec {
            disable_default_cni: n.disable_default_cni,
            pod_subnet: n.pod_subnet,
            service_subnet: n.service_subnet,
        }),
        preload_images: cluster_wire.preload_images,
        external: cluster_wire.external.map(|e| ExternalClusterRef {
            enabled: e.enabled,
            kubeconfig: e.kubeconfig,
            context: e.context,
        }),
    };

    Ok(Bundle { cluster, services })
}

fn lower_service(
    name: &str,
    wire: ServiceWire,
    base_dir: &Path,
    enabled_names: &std::collections::HashSet<String>,
) -> std::result::Result<ServiceDescriptor, Vec<FieldError>> {
    let mut errors = Vec::new();
    let field = |suffix: &str| format!("services.{}.{}", name, suffix);

    for dep in &wire.depends_on {
        if !enabled_names.contains(dep) {
            errors.push(FieldError::new(
                field("depends_on"),
                format!("service '{}' depends on unknown or disabled service '{}'", name, dep),
            ));
        }
    }

    let wait = match (wire.wait, wire.wait_timeout.as_deref()) {
        (None, None) => None,
        (enabled, timeout_str) => {
            let enabled = enabled.unwrap_or(true);
            let timeout = match timeout_str {
                Some(s) => match duration::parse(s) {
                    Ok(d) => d,
                    Err(e) => {
                        errors.push(FieldError::new(field("wait_timeout"), e));
                        duration::DEFAULT_WAIT_TIMEOUT
                    }
                },
                None => duration::DEFAULT_WAIT_TIMEOUT,
            };
            Some(WaitSpec { enabled, timeout })
        }
    };

    let kind_str = wire.kind.clone().unwrap_or_default();
    let kind = match kind_str.as_str() {
        "helm" => lower_chart(name, &wire, base_dir, &mut errors),
        "manifests" => lower_manifests(name, &wire, base_dir, &mut errors),
        other => {
            errors.push(FieldError::new(
                field("type"),
                format!("unknown service kind '{}' (expected 'helm' or 'manifests')", other),
            ));
            None
        }
    };

    if !errors.is_empty() {
        return Err(errors);
    }

    let kind = kind.expect("kind is Some whenever errors is empty");

    Ok(ServiceDescriptor {
        name: name.to_string(),
        namespace: wire.namespace.unwrap_or_else(|| "default".to_string()),
        create_namespace: wire.create_namespace.unwrap_or(true),
        depends_on: wire.depends_on,
        labels: wire.labels,
        wait,
        keep_crds: wire.keep_crds,
        kind,
    })
}

fn lower_chart(
    name: &str,
    wire: &ServiceWire,
    base_dir: &Path,
    errors: &mut Vec<FieldError>,
) -> Option<ServiceKind> {
    let field = |suffix: &str| format!("services.{}.{}", name, suffix);

    let local = wire.path.clone();
    let remote = wire.repo.clone();

    let source = match (&local, &remote) {
        (Some(p), None) => ChartSource::Local(resolve_path(base_dir, p)),
        (None, Some(r)) => ChartSource::Repo(r.clone()),
        (None, None) => {
            errors.push(FieldError::new(
                field("repo"),
                "chart service requires exactly one of 'path' or 'repo'",
            ));
            return None;
        }
        (Some(_), Some(_)) => {
            errors.push(FieldError::new(
                field("repo"),
                "chart service must not set both 'path' and 'repo'",
            ));
            return None;
        }
    };

    if matches!(source, ChartSource::Repo(_)) && wire.chart.as_deref().unwrap_or("").is_empty() {
        errors.push(FieldError::new(field("chart"), "remote chart requires a chart name"));
    }

    let values_files = wire.values.as_ref().map(|v| match v {
        ValuesWire::One(s) => vec![resolve_path(base_dir, s)],
        ValuesWire::Many(list) => list.iter().map(|p| resolve_path(base_dir, p)).collect(),
    });

    if values_files.as_ref().is_some_and(|v| !v.is_empty()) && wire.values_inline.is_some() {
        errors.push(FieldError::new(
            field("values"),
            "'values' and 'values_inline' are mutually exclusive",
        ));
    }

    Some(ServiceKind::Chart(ChartSpec {
        source,
        chart: wire.chart.clone(),
        version: wire.version.clone(),
        values: ValuesSource(values_files.unwrap_or_default()),
        values_inline: wire.values_inline.clone(),
    }))
}

fn lower_manifests(
    name: &str,
    wire: &ServiceWire,
    base_dir: &Path,
    errors: &mut Vec<FieldError>,
) -> Option<ServiceKind> {
    let field = |suffix: &str| format!("services.{}.{}", name, suffix);

    let mut paths: Vec<String> = Vec::new();
    if let Some(p) = &wire.path {
        paths.push(p.clone());
    }
    if let Some(list) = &wire.paths {
        paths.extend(list.iter().cloned());
    }

    if paths.is_empty() {
        errors.push(FieldError::new(field("paths"), "manifests service requires at least one path"));
        return None;
    }

    let resolved = paths.iter().map(|p| resolve_path(base_dir, p)).collect();
    Some(ServiceKind::Manifests(ManifestsSpec { paths: resolved }))
}

/// Resolves a possibly-relative path against `base_dir`. Absolute paths
/// and `http(s)://`/`oci://` references pass through unchanged.
pub fn resolve_path(base_dir: &Path, raw: &str) -> String {
    if raw.starts_with("http://")
        || raw.starts_with("https://")
        || raw.starts_with("oci://")
        || Path::new(raw).is_absolute()
    {
        raw.to_string()
    } else {
        base_dir.join(raw).to_string_lossy().into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fails_without_cluster_name() {
        let doc = "cluster:\n  name: \"\"\nservices: {}\n";
        let err = load_str(doc, Path::new(".")).unwrap_err();
        match err {
            KrazeError::InvalidConfig(errs) => {
                assert!(errs.iter().any(|e| e.field == "cluster.name"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn values_and_inline_are_mutually_exclusive() {
        let doc = r#"
cluster:
  name: test
services:
  app:
    type: helm
    repo: bitnami
    chart: redis
    values: [base.yaml]
    values_inline: |
      foo: bar
"#;
        let err = load_str(doc, Path::new(".")).unwrap_err();
        match err {
            KrazeError::InvalidConfig(errs) => {
                assert!(errs.iter().any(|e| e.field == "services.app.values"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_dependency_is_rejected() {
        let doc = r#"
cluster:
  name: test
services:
  api:
    type: manifests
    path: manifests/
    depends_on: [redis]
"#;
        let err = load_str(doc, Path::new(".")).unwrap_err();
        match err {
            KrazeError::InvalidConfig(errs) => {
                assert!(errs.iter().any(|e| e.field == "services.api.depends_on"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn env_substitution_runs_before_parsing() {
        let doc = "cluster:\n  name: cluster-${ENV:-production}\nservices: {}\n";
        let bundle = load_str(doc, Path::new(".")).unwrap();
        assert_eq!(bundle.cluster.name, "cluster-production");
    }

    #[test]
    fn minimal_chart_service_loads() {
        let doc = r#"
cluster:
  name: test
services:
  redis:
    type: helm
    repo: bitnami
    chart: redis
    namespace: data
"#;
        let bundle = load_str(doc, Path::new(".")).unwrap();
        let svc = bundle.service("redis").unwrap();
        assert_eq!(svc.namespace, "data");
        match &svc.kind {
            ServiceKind::Chart(spec) => {
                assert_eq!(spec.chart.as_deref(), Some("redis"));
                assert!(matches!(spec.source, ChartSource::Repo(ref r) if r == "bitnami"));
            }
            _ => panic!("expected chart service"),
        }
    }
}
