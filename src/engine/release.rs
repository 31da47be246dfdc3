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

//! Release tracking for chart services. Uses Helm's own storage
//! convention — a `sh.helm.release.v1.<name>.v<revision>` Secret holding
//! a gzip+base64 JSON release record — so `helm list`/`helm history`
//! remain accurate for a chart we install without the Helm SDK.

use crate::shared::error::{KrazeError, Result};
use base64::Engine;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, ObjectMeta, Patch, PatchParams, PostParams};
use kube::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Read, Write};

const FIELD_MANAGER: &str = "kraze";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ReleaseRecord {
    pub name: String,
    pub version: u32,
    pub chart: Option<String>,
    pub chart_version: Option<String>,
    pub manifest: String,
    pub values: serde_json::Value,
}

pub struct ReleaseStore {
    client: Client,
    namespace: String,
}

impl ReleaseStore {
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }

    /// Returns the latest release revision, if any (limit 1 per spec).
    pub async fn latest(&self, release_name: &str) -> Result<Option<ReleaseRecord>> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &self.namespace);
        let selector = format!("owner=kraze,name={release_name}");
        let list = api
            .list(&kube::api::ListParams::default().labels(&selector))
            .await
            .map_err(|e| KrazeError::ApiError(format!("listing releases for '{release_name}': {e}")))?;

        let mut latest: Option<(u32, ReleaseRecord)> = None;
        for secret in list.items {
            if let Some(record) = decode_secret(&secret)? {
                if latest.as_ref().map(|(v, _)| record.version > *v).unwrap_or(true) {
                    latest = Some((record.version, record));
                }
            }
        }
        Ok(latest.map(|(_, r)| r))
    }

    /// Persists a new revision for `record`, incrementing past whatever
    /// `latest` previously returned.
    pub async fn store(&self, record: &ReleaseRecord) -> Result<()> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &self.namespace);
        let secret_name = format!("sh.helm.release.v1.{}.v{}", record.name, record.version);

        let mut labels = BTreeMap::new();
        labels.insert("owner".to_string(), "kraze".to_string());
        labels.insert("name".to_string(), record.name.clone());
        labels.insert("version".to_string(), record.version.to_string());

        let mut data = BTreeMap::new();
        data.insert("release".to_string(), k8s_openapi::ByteString(encode_release(record)?));

        let secret = Secret {
            metadata: ObjectMeta {
                name: Some(secret_name.clone()),
                namespace: Some(self.namespace.clone()),
                labels: Some(labels),
                ..Default::default()
            },
            type_: Some("helm.sh/release.v1".to_string()),
            data: Some(data),
            ..Default::default()
        };

        match api.create(&PostParams::default(), &secret).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(e)) if e.code == 409 => {
                let params = PatchParams {
                    field_manager: Some(FIELD_MANAGER.to_string()),
                    force: true,
                    ..Default::default()
                };
                api.patch(&secret_name, &params, &Patch::Apply(&secret))
                    .await
                    .map_err(|e| KrazeError::ApiError(format!("storing release '{secret_name}': {e}")))?;
                Ok(())
            }
            Err(e) => Err(KrazeError::ApiError(format!("storing release '{secret_name}': {e}"))),
        }
    }
}

fn decode_secret(secret: &Secret) -> Result<Option<ReleaseRecord>> {
    let Some(data) = &secret.data else { return Ok(None) };
    let Some(blob) = data.get("release") else { return Ok(None) };
    let record: ReleaseRecord = decode_release(&blob.0)?;
    Ok(Some(record))
}

fn encode_release(record: &ReleaseRecord) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(record)?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    let gzipped = encoder.finish()?;
    let b64 = base64::engine::general_purpose::STANDARD.encode(gzipped);
    Ok(b64.into_bytes())
}

fn decode_release(stored: &[u8]) -> Result<ReleaseRecord> {
    let gzipped = base64::engine::general_purpose::STANDARD
        .decode(stored)
        .map_err(|e| KrazeError::ApiError(format!("decoding release record: {e}")))?;
    let mut decoder = GzDecoder::new(gzipped.as_slice());
    let mut json = Vec::new();
    decoder.read_to_end(&mut json)?;
    Ok(serde_json::from_slice(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_round_trips_through_gzip_base64() {
        let record = ReleaseRecord {
            name: "redis".to_string(),
            version: 1,
            chart: Some("redis".to_string()),
            chart_version: Some("18.0.0".to_string()),
            manifest: "apiVersion: v1\nkind: ConfigMap\n".to_string(),
            values: serde_json::json!({"replicaCount": 3}),
        };
        let encoded = encode_release(&record).unwrap();
        let decoded = decode_release(&encoded).unwrap();
        assert_eq!(decoded.name, "redis");
        assert_eq!(decoded.version, 1);
        assert_eq!(decoded.values, serde_json::json!({"replicaCount": 3}));
    }
}
