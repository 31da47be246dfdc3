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

//! Dependency graph operations shared by [`super::Reconciler`]: depth
//! -first reflexive-transitive closure and a cycle-detecting topological
//! sort.

use crate::config::Bundle;
use crate::shared::error::{FieldError, KrazeError, Result};
use std::collections::HashSet;

/// Depth-first closure over `roots`, following each service's
/// `depends_on` edges. The result always contains `roots`.
pub fn expand_with_dependencies(bundle: &Bundle, roots: &[String]) -> Vec<String> {
    let mut visited = HashSet::new();
    let mut order = Vec::new();

    fn visit(bundle: &Bundle, name: &str, visited: &mut HashSet<String>, order: &mut Vec<String>) {
        if !visited.insert(name.to_string()) {
            return;
        }
        if let Some(descriptor) = bundle.service(name) {
            for dep in &descriptor.depends_on {
                visit(bundle, dep, visited, order);
            }
        }
        order.push(name.to_string());
    }

    for root in roots {
        visit(bundle, root, &mut visited, &mut order);
    }
    order
}

/// Topologically sorts `names` by each service's `depends_on` edges
/// (dependencies first). Fails with `InvalidConfig` on a cycle.
pub fn topological_sort(bundle: &Bundle, names: &[String]) -> Result<Vec<String>> {
    #[derive(PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    let included: HashSet<&str> = names.iter().map(String::as_str).collect();
    let mut marks: std::collections::HashMap<String, Mark> = std::collections::HashMap::new();
    let mut order = Vec::new();

    fn visit(
        bundle: &Bundle,
        name: &str,
        included: &HashSet<&str>,
        marks: &mut std::collections::HashMap<String, Mark>,
        order: &mut Vec<String>,
    ) -> Result<()> {
        match marks.get(name) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                return Err(KrazeError::InvalidConfig(vec![FieldError::new(
                    "services",
                    format!("dependency cycle detected involving '{name}'"),
                )]))
            }
            None => {}
        }

        marks.insert(name.to_string(), Mark::Visiting);
        if let Some(descriptor) = bundle.service(name) {
            for dep in &descriptor.depends_on {
                if included.contains(dep.as_str()) {
                    visit(bundle, dep, included, marks, order)?;
                }
            }
        }
        marks.insert(name.to_string(), Mark::Done);
        order.push(name.to_string());
        Ok(())
    }

    for name in names {
        visit(bundle, name, &included, &mut marks, &mut order)?;
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader;
    use std::path::Path;

    fn bundle_with(doc: &str) -> Bundle {
        loader::load_str(doc, Path::new(".")).unwrap()
    }

    #[test]
    fn expand_includes_transitive_dependencies() {
        let bundle = bundle_with(
            r#"
cluster:
  name: test
services:
  db:
    type: manifests
    path: db.yaml
  cache:
    type: manifests
    path: cache.yaml
    depends_on: [db]
  api:
    type: manifests
    path: api.yaml
    depends_on: [cache]
"#,
        );
        let expanded = expand_with_dependencies(&bundle, &["api".to_string()]);
        assert_eq!(expanded, vec!["db", "cache", "api"]);
    }

    #[test]
    fn topological_sort_orders_dependencies_first() {
        let bundle = bundle_with(
            r#"
cluster:
  name: test
services:
  db:
    type: manifests
    path: db.yaml
  api:
    type: manifests
    path: api.yaml
    depends_on: [db]
"#,
        );
        let names = vec!["api".to_string(), "db".to_string()];
        let sorted = topological_sort(&bundle, &names).unwrap();
        assert_eq!(sorted, vec!["db", "api"]);
    }

    #[test]
    fn topological_sort_detects_cycles() {
        let mut services = std::collections::HashMap::new();
        services.insert(
            "a".to_string(),
            crate::config::model::ServiceDescriptor {
                name: "a".to_string(),
                namespace: "default".to_string(),
                create_namespace: true,
                depends_on: vec!["b".to_string()],
                labels: Default::default(),
                wait: None,
                keep_crds: None,
                kind: crate::config::model::ServiceKind::Manifests(crate::config::model::ManifestsSpec {
                    paths: vec!["a.yaml".to_string()],
                }),
            },
        );
        services.insert(
            "b".to_string(),
            crate::config::model::ServiceDescriptor {
                name: "b".to_string(),
                namespace: "default".to_string(),
                create_namespace: true,
                depends_on: vec!["a".to_string()],
                labels: Default::default(),
                wait: None,
                keep_crds: None,
                kind: crate::config::model::ServiceKind::Manifests(crate::config::model::ManifestsSpec {
                    paths: vec!["b.yaml".to_string()],
                }),
            },
        );
        let bundle = Bundle {
            cluster: crate::config::model::ClusterDescriptor {
                name: "test".to_string(),
                version: None,
                nodes: Vec::new(),
                networking: None,
                preload_images: Vec::new(),
                external: None,
            },
            services,
        };
        let names = vec!["a".to_string(), "b".to_string()];
        let err = topological_sort(&bundle, &names).unwrap_err();
        assert!(matches!(err, KrazeError::InvalidConfig(_)));
    }
}
