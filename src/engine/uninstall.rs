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

//! Component I (namespace half): the caller-invoked namespace cleanup
//! policy run after a service (or the whole bundle) has been
//! uninstalled. Per-service resource/release teardown lives in
//! [`crate::engine::provider`]; this module only decides whether a
//! namespace is safe to delete afterwards.

use crate::shared::error::{KrazeError, Result};
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, PersistentVolumeClaim, Pod, Secret, ServiceAccount};
use kube::api::{Api, DeleteParams, ListParams};
use kube::Client;

const SYSTEM_NAMESPACES: &[&str] = &["default", "kube-system", "kube-public", "kube-node-lease"];

pub async fn cleanup_namespace(client: &Client, namespace: &str, delete_pvcs_first: bool) -> Result<bool> {
    if SYSTEM_NAMESPACES.contains(&namespace) {
        return Err(KrazeError::ApiError(format!(
            "refusing to delete system namespace '{namespace}'"
        )));
    }

    if !is_empty_of_user_resources(client, namespace).await? {
        return Ok(false);
    }

    if delete_pvcs_first {
        let pvcs: Api<PersistentVolumeClaim> = Api::namespaced(client.clone(), namespace);
        for pvc in pvcs.list(&ListParams::default()).await.map_err(api_err(namespace))?.items {
            if let Some(name) = &pvc.metadata.name {
                let _ = pvcs.delete(name, &DeleteParams::default()).await;
            }
        }
    }

    let namespaces: Api<Namespace> = Api::all(client.clone());
    match namespaces.delete(namespace, &DeleteParams::default()).await {
        Ok(_) => Ok(true),
        Err(kube::Error::Api(e)) if e.code == 404 => Ok(true),
        Err(e) => Err(KrazeError::ApiError(format!("deleting namespace '{namespace}': {e}"))),
    }
}

async fn is_empty_of_user_resources(client: &Client, namespace: &str) -> Result<bool> {
    let pods: Api<Pod> = Api::namespaced(client.clone(), namespace);
    for pod in pods.list(&ListParams::default()).await.map_err(api_err(namespace))?.items {
        if pod.metadata.deletion_timestamp.is_none() {
            return Ok(false);
        }
    }

    let service_accounts: Api<ServiceAccount> = Api::namespaced(client.clone(), namespace);
    for sa in service_accounts.list(&ListParams::default()).await.map_err(api_err(namespace))?.items {
        if sa.metadata.name.as_deref() != Some("default") {
            return Ok(false);
        }
    }

    let configmaps: Api<ConfigMap> = Api::namespaced(client.clone(), namespace);
    for cm in configmaps.list(&ListParams::default()).await.map_err(api_err(namespace))?.items {
        if cm.metadata.name.as_deref() != Some("kube-root-ca.crt") {
            return Ok(false);
        }
    }

    let secrets: Api<Secret> = Api::namespaced(client.clone(), namespace);
    for secret in secrets.list(&ListParams::default()).await.map_err(api_err(namespace))?.items {
        if !is_ignorable_secret(&secret) {
            return Ok(false);
        }
    }

    Ok(true)
}

fn is_ignorable_secret(secret: &k8s_openapi::api::core::v1::Secret) -> bool {
    if secret.type_.as_deref() == Some("kubernetes.io/service-account-token") {
        return true;
    }
    let name = secret.metadata.name.as_deref().unwrap_or_default().to_lowercase();
    name.contains("webhook") || name.contains("-ca") || name.contains("-tls")
}

fn api_err(namespace: &str) -> impl Fn(kube::Error) -> KrazeError + '_ {
    move |e| KrazeError::ApiError(format!("inspecting namespace '{namespace}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignores_service_account_token_secrets() {
        let secret = k8s_openapi::api::core::v1::Secret {
            type_: Some("kubernetes.io/service-account-token".to_string()),
            ..Default::default()
        };
        assert!(is_ignorable_secret(&secret));
    }

    #[test]
    fn ignores_webhook_and_tls_secrets_by_name() {
        let mut secret = k8s_openapi::api::core::v1::Secret::default();
        secret.metadata.name = Some("my-webhook-certs".to_string());
        assert!(is_ignorable_secret(&secret));

        secret.metadata.name = Some("app-tls".to_string());
        assert!(is_ignorable_secret(&secret));
    }

    #[test]
    fn does_not_ignore_arbitrary_secrets() {
        let mut secret = k8s_openapi::api::core::v1::Secret::default();
        secret.metadata.name = Some("app-credentials".to_string());
        assert!(!is_ignorable_secret(&secret));
    }

    #[test]
    fn system_namespaces_are_listed() {
        assert!(SYSTEM_NAMESPACES.contains(&"kube-system"));
        assert!(!SYSTEM_NAMESPACES.contains(&"my-app"));
    }
}
