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

//! Component B: Cluster Session. Resolves a [`kube::Client`] from an
//! explicit kubeconfig path, an explicit context, or the ambient
//! environment (`KUBECONFIG` / in-cluster service account), and exposes
//! it alongside the discovery-backed [`crate::cluster::catalog::Catalog`].

use crate::cluster::catalog::Catalog;
use crate::shared::error::{KrazeError, Result};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};

/// Connection parameters supplied on the command line or taken from a
/// service descriptor's `external` block.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub kubeconfig: Option<String>,
    pub context: Option<String>,
    /// Skip TLS certificate verification. Only meaningful for local
    /// ephemeral clusters (kind/minikube) whose API server presents a
    /// self-signed cert not yet trusted by the kubeconfig's CA bundle.
    pub insecure_skip_tls_verify: bool,
}

/// A live connection to a cluster plus its memoized discovery catalog.
pub struct Session {
    client: Client,
    catalog: Catalog,
}

impl Session {
    pub async fn connect(options: &SessionOptions) -> Result<Self> {
        let client = if options.kubeconfig.is_none() && options.context.is_none() && !options.insecure_skip_tls_verify {
            Client::try_default()
                .await
                .map_err(|e| KrazeError::ApiUnavailable(e.to_string()))?
        } else {
            let raw = match &options.kubeconfig {
                Some(path) => Kubeconfig::read_from(path)
                    .map_err(|e| KrazeError::ApiUnavailable(format!("reading kubeconfig '{}': {}", path, e)))?,
                None => Kubeconfig::read()
                    .map_err(|e| KrazeError::ApiUnavailable(format!("reading kubeconfig: {}", e)))?,
            };
            let config_options = KubeConfigOptions {
                context: options.context.clone(),
                cluster: None,
                user: None,
            };
            let mut config = Config::from_custom_kubeconfig(raw, &config_options)
                .await
                .map_err(|e| KrazeError::ApiUnavailable(e.to_string()))?;
            if options.insecure_skip_tls_verify {
                config.accept_invalid_certs = true;
            }
            Client::try_from(config).map_err(|e| KrazeError::ApiUnavailable(e.to_string()))?
        };

        let catalog = Catalog::discover(&client).await?;
        Ok(Self { client, catalog })
    }

    pub fn client(&self) -> Client {
        self.client.clone()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }
}
