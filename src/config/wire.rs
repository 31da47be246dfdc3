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

//! The as-written shape of the configuration document (§6). Every field
//! is optional at this layer; [`crate::config::loader`] is responsible
//! for turning this into a validated [`crate::config::model::Bundle`].

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Deserialize, Default)]
pub struct BundleWire {
    pub cluster: Option<ClusterWire>,
    #[serde(default)]
    pub services: BTreeMap<String, ServiceWire>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ClusterWire {
    pub name: Option<String>,
    pub version: Option<String>,
    #[serde(default)]
    pub config: Vec<NodeWire>,
    pub networking: Option<NetworkingWire>,
    #[serde(default)]
    pub preload_images: Vec<String>,
    pub external: Option<ExternalWire>,
}

#[derive(Debug, Deserialize, Default)]
pub struct NodeWire {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub replicas: u32,
    #[serde(default)]
    pub extra_port_mappings: Vec<String>,
    #[serde(default)]
    pub extra_mounts: Vec<String>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct NetworkingWire {
    #[serde(default)]
    pub disable_default_cni: bool,
    pub pod_subnet: Option<String>,
    pub service_subnet: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ExternalWire {
    #[serde(default)]
    pub enabled: bool,
    pub kubeconfig: Option<String>,
    pub context: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ServiceWire {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub namespace: Option<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    pub create_namespace: Option<bool>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    pub wait: Option<bool>,
    pub wait_timeout: Option<String>,
    pub keep_crds: Option<bool>,

    // chart fields
    pub repo: Option<String>,
    pub chart: Option<String>,
    pub version: Option<String>,
    pub values: Option<ValuesWire>,
    pub values_inline: Option<String>,

    // manifests / local chart fields
    pub path: Option<String>,
    pub paths: Option<Vec<String>>,
}

/// Accepts either a single string or a sequence of strings for `values`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ValuesWire {
    One(String),
    Many(Vec<String>),
}

impl ValuesWire {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            ValuesWire::One(s) => vec![s],
            ValuesWire::Many(v) => v,
        }
    }
}
