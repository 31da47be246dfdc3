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

//! End-to-end scenario tests exercising the Config Loader through the
//! Reconciler's planning stage (expansion + ordering + provider
//! construction). None of these hit a live cluster — the apply/wait/
//! release legs are covered by unit tests alongside the code that
//! issues the actual API calls. S1–S4 live here; S5 (pod failure
//! diagnostics) and S6 (keep_crds skips CRD extraction) name
//! cluster-interacting legs this file's planning-stage harness can't
//! reach, so they're covered as unit tests next to `wait.rs`/
//! `provider.rs` instead — see those files' `#[cfg(test)]` modules.

use kraze::config::model::{ChartSource, ServiceKind};
use kraze::reconcile::graph;
use std::path::Path;

/// S1 — minimal install: a single chart service with a repo source
/// loads into a fully-formed descriptor ready for the apply engine.
#[test]
fn s1_minimal_chart_service_resolves_into_a_deployable_descriptor() {
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
    let bundle = kraze::config::loader::load_str(doc, Path::new(".")).unwrap();
    let redis = bundle.service("redis").unwrap();
    assert_eq!(redis.namespace, "data");
    assert!(redis.create_namespace);
    match &redis.kind {
        ServiceKind::Chart(spec) => {
            assert!(matches!(&spec.source, ChartSource::Repo(r) if r == "bitnami"));
            assert_eq!(spec.chart.as_deref(), Some("redis"));
        }
        other => panic!("expected a chart service, got {other:?}"),
    }

    let order = graph::topological_sort(&bundle, &["redis".to_string()]).unwrap();
    assert_eq!(order, vec!["redis"]);
}

/// S2 — dependencies: `api` depends on both `redis` and `postgres`.
/// Expanding from `api` pulls in the full closure, and the emitted
/// order places both dependencies before `api`.
#[test]
fn s2_dependency_expansion_and_ordering() {
    let doc = r#"
cluster:
  name: test
services:
  redis:
    type: helm
    repo: bitnami
    chart: redis
  postgres:
    type: helm
    repo: bitnami
    chart: postgresql
  api:
    type: manifests
    path: api.yaml
    depends_on: [redis, postgres]
"#;
    let bundle = kraze::config::loader::load_str(doc, Path::new(".")).unwrap();

    let expanded = graph::expand_with_dependencies(&bundle, &["api".to_string()]);
    let expanded_set: std::collections::HashSet<_> = expanded.iter().cloned().collect();
    assert_eq!(
        expanded_set,
        ["redis", "postgres", "api"].iter().map(|s| s.to_string()).collect()
    );

    let order = graph::topological_sort(&bundle, &expanded).unwrap();
    let api_pos = order.iter().position(|n| n == "api").unwrap();
    let redis_pos = order.iter().position(|n| n == "redis").unwrap();
    let postgres_pos = order.iter().position(|n| n == "postgres").unwrap();
    assert!(redis_pos < api_pos);
    assert!(postgres_pos < api_pos);
}

/// S3 — env substitution: an unset `${ENV}` falls back to its default
/// before the document is parsed.
#[test]
fn s3_env_substitution_applies_defaults_before_parsing() {
    std::env::remove_var("ENV");
    let doc = "cluster:\n  name: cluster-${ENV:-production}\nservices: {}\n";
    let bundle = kraze::config::loader::load_str(doc, Path::new(".")).unwrap();
    assert_eq!(bundle.cluster.name, "cluster-production");
}

/// S4 — values merging: `override.yaml`'s `image.tag` wins, but
/// `image.repo` from `base.yaml` survives the merge.
#[test]
fn s4_chart_values_deep_merge_left_to_right() {
    let dir = tempfile::tempdir().unwrap();
    let base_path = dir.path().join("base.yaml");
    let override_path = dir.path().join("override.yaml");
    std::fs::write(&base_path, "image:\n  tag: v1\n  repo: r\n").unwrap();
    std::fs::write(&override_path, "image:\n  tag: v2\n").unwrap();

    let doc = format!(
        "cluster:\n  name: test\nservices:\n  app:\n    type: helm\n    repo: bitnami\n    chart: app\n    values: [{}, {}]\n",
        base_path.display(),
        override_path.display()
    );
    let bundle = kraze::config::loader::load_str(&doc, dir.path()).unwrap();
    let app = bundle.service("app").unwrap();
    let spec = match &app.kind {
        ServiceKind::Chart(spec) => spec,
        other => panic!("expected a chart service, got {other:?}"),
    };

    let merged = kraze::engine::chart::assemble_values(spec).unwrap();
    assert_eq!(merged["image"]["tag"], "v2");
    assert_eq!(merged["image"]["repo"], "r");
}

/// A cycle among the requested subset is rejected rather than silently
/// producing a partial order.
#[test]
fn dependency_cycle_is_rejected_as_invalid_config() {
    let doc = r#"
cluster:
  name: test
services:
  a:
    type: manifests
    path: a.yaml
    depends_on: [b]
  b:
    type: manifests
    path: b.yaml
    depends_on: [a]
"#;
    // The loader only checks that dependency names resolve; cycles are
    // caught later, at reconcile time, over the requested subset.
    let bundle = kraze::config::loader::load_str(doc, Path::new(".")).unwrap();
    let err = graph::topological_sort(&bundle, &["a".to_string(), "b".to_string()]).unwrap_err();
    assert!(matches!(err, kraze::KrazeError::InvalidConfig(_)));
}
