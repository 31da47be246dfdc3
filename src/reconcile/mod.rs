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

//! Component J: Reconciler. The top-level driver — expands the
//! requested service set, orders it, and dispatches each service to its
//! provider in that order (reversed on uninstall).

pub mod graph;

use crate::cluster::Session;
use crate::config::model::ServiceStatus;
use crate::config::Bundle;
use crate::engine;
use crate::shared::error::{KrazeError, Result};
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// How the requested set of service names is expanded before ordering.
#[derive(Debug, Clone)]
pub enum Selection {
    /// Empty = every service in the bundle.
    All,
    /// Named services plus their transitive dependencies.
    WithDependencies(Vec<String>),
    /// Exactly the named services, dependencies not pulled in.
    NoDependencies(Vec<String>),
    /// Services whose labels match every `key=value` selector.
    Labels(Vec<(String, String)>),
}

pub struct Reconciler<'a> {
    bundle: &'a Bundle,
    session: &'a Session,
}

impl<'a> Reconciler<'a> {
    pub fn new(bundle: &'a Bundle, session: &'a Session) -> Self {
        Self { bundle, session }
    }

    /// Names a [`Selection`] resolves to, independent of topological order.
    /// Exposed so callers can act on the affected set without re-deriving it
    /// (e.g. the `down` command's namespace cleanup policy).
    pub fn resolve_selection(&self, selection: &Selection) -> Vec<String> {
        match selection {
            Selection::All => self.bundle.service_names().map(str::to_string).collect(),
            Selection::WithDependencies(names) => graph::expand_with_dependencies(self.bundle, names),
            Selection::NoDependencies(names) => names.clone(),
            Selection::Labels(selectors) => self
                .bundle
                .service_names()
                .filter(|name| {
                    let descriptor = self.bundle.service(name).expect("name came from bundle");
                    selectors
                        .iter()
                        .all(|(key, value)| descriptor.labels.get(key).map(String::as_str) == Some(value.as_str()))
                })
                .map(str::to_string)
                .collect(),
        }
    }

    fn ordered(&self, selection: &Selection) -> Result<Vec<String>> {
        let names = self.resolve_selection(selection);
        graph::topological_sort(self.bundle, &names)
    }

    pub async fn install(&self, selection: Selection, cancel: &CancellationToken) -> Result<()> {
        let order = self.ordered(&selection)?;
        for name in order {
            if cancel.is_cancelled() {
                return Err(KrazeError::NotReady("installation cancelled".to_string()));
            }
            let descriptor = self
                .bundle
                .service(&name)
                .expect("name came from topological sort over this bundle");

            info!(service = %name, "installing service");
            let provider = engine::for_descriptor(descriptor, self.session.client(), self.session.catalog());
            provider
                .install(cancel)
                .await
                .map_err(|e| KrazeError::Service { name: name.clone(), source: Box::new(e) })?;
        }
        Ok(())
    }

    pub async fn uninstall(&self, selection: Selection) -> Result<()> {
        let mut order = self.ordered(&selection)?;
        order.reverse();
        for name in order {
            let descriptor = self
                .bundle
                .service(&name)
                .expect("name came from topological sort over this bundle");

            info!(service = %name, "uninstalling service");
            let provider = engine::for_descriptor(descriptor, self.session.client(), self.session.catalog());
            if let Err(e) = provider.uninstall().await {
                crate::shared::error::warn("uninstall", format!("service '{name}': {e}"));
            }
        }
        Ok(())
    }

    pub async fn status(&self, selection: Selection) -> Result<HashMap<String, ServiceStatus>> {
        let order = self.ordered(&selection)?;
        let mut statuses = HashMap::new();
        for name in order {
            let descriptor = self.bundle.service(&name).expect("name came from topological sort");
            let provider = engine::for_descriptor(descriptor, self.session.client(), self.session.catalog());
            let status = provider.status().await.unwrap_or_else(|e| ServiceStatus {
                installed: false,
                ready: false,
                message: e.to_string(),
            });
            statuses.insert(name, status);
        }
        Ok(statuses)
    }
}
