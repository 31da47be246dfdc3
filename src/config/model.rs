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

//! The validated, immutable configuration model. Built once by
//! [`crate::config::loader::load`] and never mutated afterwards.

use std::collections::HashMap;
use std::time::Duration;

/// The top-level parsed and validated configuration document.
#[derive(Debug, Clone)]
pub struct Bundle {
    pub cluster: ClusterDescriptor,
    pub services: HashMap<String, ServiceDescriptor>,
}

impl Bundle {
    pub fn service(&self, name: &str) -> Option<&ServiceDescriptor> {
        self.services.get(name)
    }

    pub fn service_names(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(|s| s.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ClusterDescriptor {
    pub name: String,
    pub version: Option<String>,
    pub nodes: Vec<NodeSpec>,
    pub networking: Option<NetworkingSpec>,
    pub preload_images: Vec<String>,
    pub external: Option<ExternalClusterRef>,
}

#[derive(Debug, Clone)]
pub struct NodeSpec {
    pub role: String,
    pub replicas: u32,
    pub extra_port_mappings: Vec<String>,
    pub extra_mounts: Vec<String>,
    pub labels: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct NetworkingSpec {
    pub disable_default_cni: bool,
    pub pod_subnet: Option<String>,
    pub service_subnet: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ExternalClusterRef {
    pub enabled: bool,
    pub kubeconfig: Option<String>,
    pub context: Option<String>,
}

/// A named deployable unit: either a packaged chart or a set of raw
/// manifests. The kind-specific fields live inside the enum so illegal
/// combinations (a manifests service carrying chart fields) cannot be
/// represented once the loader has lowered the wire document into this
/// type.
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    pub name: String,
    pub namespace: String,
    pub create_namespace: bool,
    pub depends_on: Vec<String>,
    pub labels: HashMap<String, String>,
    pub wait: Option<WaitSpec>,
    pub keep_crds: Option<bool>,
    pub kind: ServiceKind,
}

#[derive(Debug, Clone)]
pub struct WaitSpec {
    pub enabled: bool,
    pub timeout: Duration,
}

impl Default for WaitSpec {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout: crate::shared::duration::DEFAULT_WAIT_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ServiceKind {
    Chart(ChartSpec),
    Manifests(ManifestsSpec),
}

#[derive(Debug, Clone)]
pub struct ChartSpec {
    pub source: ChartSource,
    pub chart: Option<String>,
    pub version: Option<String>,
    pub values: ValuesSource,
    pub values_inline: Option<String>,
}

#[derive(Debug, Clone)]
pub enum ChartSource {
    Local(String),
    Repo(String),
}

#[derive(Debug, Clone)]
pub struct ManifestsSpec {
    pub paths: Vec<String>,
}

/// The `values` field decodes from either a single string or a sequence
/// of strings; internally it is always the list form.
#[derive(Debug, Clone, Default)]
pub struct ValuesSource(pub Vec<String>);

impl ValuesSource {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn paths(&self) -> &[String] {
        &self.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct ServiceStatus {
    pub installed: bool,
    pub ready: bool,
    pub message: String,
}
