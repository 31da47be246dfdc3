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

//! Component F: Chart Engine. Resolves a chart location to a directory
//! on disk (local passthrough, OCI registry pull, or HTTP(S) repository
//! index + tarball download), then assembles its values document.

use crate::config::model::{ChartSource, ChartSpec};
use crate::shared::error::{KrazeError, Result};
use serde_json::Value;
use serde_yaml::Value as YamlValue;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A resolved chart directory. Holds the `TempDir` guard (when the chart
/// was pulled) so it lives as long as the chart root is in use.
pub struct ResolvedChart {
    pub root: PathBuf,
    _temp: Option<TempDir>,
}

pub async fn resolve(spec: &ChartSpec) -> Result<ResolvedChart> {
    match &spec.source {
        ChartSource::Local(path) => Ok(ResolvedChart {
            root: PathBuf::from(path),
            _temp: None,
        }),
        ChartSource::Repo(repo) if repo.starts_with("oci://") => pull_oci(repo, spec).await,
        ChartSource::Repo(repo) => pull_http_repo(repo, spec).await,
    }
}

async fn pull_oci(repo: &str, spec: &ChartSpec) -> Result<ResolvedChart> {
    use oci_distribution::client::{ClientConfig, ClientProtocol};
    use oci_distribution::manifest::OciManifest;
    use oci_distribution::secrets::RegistryAuth;
    use oci_distribution::{Client as OciClient, Reference};

    let chart_name = spec
        .chart
        .as_deref()
        .ok_or_else(|| KrazeError::ApiError("OCI chart requires a chart name".to_string()))?;
    let image = format!(
        "{}/{}{}",
        repo.trim_start_matches("oci://").trim_end_matches('/'),
        chart_name,
        spec.version.as_deref().map(|v| format!(":{v}")).unwrap_or_default()
    );

    let reference: Reference = image
        .parse()
        .map_err(|e| KrazeError::RemoteFetch(format!("invalid OCI reference '{image}': {e}")))?;

    let client_config = ClientConfig {
        protocol: ClientProtocol::Https,
        ..Default::default()
    };
    let client = OciClient::new(client_config);
    let auth = RegistryAuth::Anonymous;

    let (manifest, _digest) = client
        .pull_manifest(&reference, &auth)
        .await
        .map_err(|e| KrazeError::RemoteFetch(format!("pulling manifest for '{image}': {e}")))?;

    let manifest = match manifest {
        OciManifest::Image(m) => m,
        OciManifest::ImageIndex(_) => {
            return Err(KrazeError::RemoteFetch(format!(
                "'{image}' resolved to a multi-platform index, expected a single chart artifact"
            )))
        }
    };

    let layer = manifest
        .layers
        .first()
        .ok_or_else(|| KrazeError::RemoteFetch(format!("'{image}' has no layers")))?;

    let mut buf = Vec::new();
    client
        .pull_blob(&reference, layer, &mut buf)
        .await
        .map_err(|e| KrazeError::RemoteFetch(format!("pulling chart layer for '{image}': {e}")))?;

    let temp = TempDir::new()?;
    untar_gz(&buf, temp.path())?;
    let root = first_subdirectory(temp.path()).unwrap_or_else(|| temp.path().to_path_buf());

    Ok(ResolvedChart { root, _temp: Some(temp) })
}

async fn pull_http_repo(repo_url: &str, spec: &ChartSpec) -> Result<ResolvedChart> {
    let chart_name = spec
        .chart
        .as_deref()
        .ok_or_else(|| KrazeError::ApiError("repository chart requires a chart name".to_string()))?;

    let index_url = format!("{}/index.yaml", repo_url.trim_end_matches('/'));
    let index_text = reqwest::get(&index_url)
        .await
        .map_err(|e| KrazeError::RemoteFetch(format!("fetching {index_url}: {e}")))?
        .text()
        .await
        .map_err(|e| KrazeError::RemoteFetch(format!("reading {index_url}: {e}")))?;

    let index: YamlValue = serde_yaml::from_str(&index_text)?;
    let entries = index
        .get("entries")
        .and_then(|e| e.get(chart_name))
        .and_then(|e| e.as_sequence())
        .ok_or_else(|| KrazeError::RemoteFetch(format!("chart '{chart_name}' not found in {index_url}")))?;

    let entry = match &spec.version {
        Some(version) => entries
            .iter()
            .find(|e| e.get("version").and_then(|v| v.as_str()) == Some(version.as_str())),
        None => entries.first(),
    }
    .ok_or_else(|| KrazeError::RemoteFetch(format!("no matching version for chart '{chart_name}'")))?;

    let chart_url = entry
        .get("urls")
        .and_then(|u| u.as_sequence())
        .and_then(|u| u.first())
        .and_then(|u| u.as_str())
        .ok_or_else(|| KrazeError::RemoteFetch(format!("chart '{chart_name}' has no download URL")))?;

    let absolute_url = if chart_url.starts_with("http://") || chart_url.starts_with("https://") {
        chart_url.to_string()
    } else {
        format!("{}/{}", repo_url.trim_end_matches('/'), chart_url)
    };

    let bytes = reqwest::get(&absolute_url)
        .await
        .map_err(|e| KrazeError::RemoteFetch(format!("fetching {absolute_url}: {e}")))?
        .bytes()
        .await
        .map_err(|e| KrazeError::RemoteFetch(format!("reading {absolute_url}: {e}")))?;

    let temp = TempDir::new()?;
    untar_gz(&bytes, temp.path())?;
    let root = first_subdirectory(temp.path()).unwrap_or_else(|| temp.path().to_path_buf());

    Ok(ResolvedChart { root, _temp: Some(temp) })
}

fn untar_gz(bytes: &[u8], dest: &Path) -> Result<()> {
    let decoder = flate2::read::GzDecoder::new(bytes);
    let mut archive = tar::Archive::new(decoder);
    archive.unpack(dest)?;
    Ok(())
}

fn first_subdirectory(dir: &Path) -> Option<PathBuf> {
    std::fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .find(|p| p.is_dir())
}

/// Deterministic repository-name derivation: strip scheme, replace
/// non-alphanumerics with `-`, trim; fall back to a sha256-derived name
/// when the sanitized form exceeds 50 characters.
pub fn repo_name(url: &str) -> String {
    let stripped = url
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_start_matches("oci://");

    let sanitized: String = stripped
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let trimmed = sanitized.trim_matches('-').to_string();

    if trimmed.len() > 50 {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        let digest = hex::encode(hasher.finalize());
        format!("repo-{}", &digest[..16])
    } else {
        trimmed
    }
}

/// Deep-merges `override_doc` onto `base`: when both sides of a key are
/// mappings, recurse; otherwise the override wins.
pub fn deep_merge(base: Value, override_doc: Value) -> Value {
    match (base, override_doc) {
        (Value::Object(mut base_map), Value::Object(override_map)) => {
            for (key, override_value) in override_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, override_value),
                    None => override_value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, override_value) => override_value,
    }
}

/// Assembles the effective values document for a chart service: inline
/// values win outright; otherwise the values files are deep-merged
/// left-to-right.
pub fn assemble_values(spec: &ChartSpec) -> Result<Value> {
    if let Some(inline) = &spec.values_inline {
        let parsed: YamlValue = serde_yaml::from_str(inline)?;
        return Ok(yaml_to_json(parsed));
    }

    let mut merged = Value::Object(Default::default());
    for path in spec.values.paths() {
        let text = std::fs::read_to_string(path)?;
        let parsed: YamlValue = serde_yaml::from_str(&text)?;
        merged = deep_merge(merged, yaml_to_json(parsed));
    }
    Ok(merged)
}

fn yaml_to_json(value: YamlValue) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_name_sanitizes_url() {
        assert_eq!(repo_name("https://charts.bitnami.com/bitnami"), "charts-bitnami-com-bitnami");
    }

    #[test]
    fn repo_name_falls_back_to_hash_when_too_long() {
        let long_url = format!("https://{}", "x".repeat(60));
        let name = repo_name(&long_url);
        assert!(name.starts_with("repo-"));
        assert_eq!(name.len(), 21);
    }

    #[test]
    fn deep_merge_overrides_scalars() {
        let base = serde_json::json!({"a": 1, "b": 2});
        let over = serde_json::json!({"b": 3});
        let merged = deep_merge(base, over);
        assert_eq!(merged, serde_json::json!({"a": 1, "b": 3}));
    }

    #[test]
    fn deep_merge_recurses_into_nested_maps() {
        let base = serde_json::json!({"nested": {"a": 1, "b": 2}});
        let over = serde_json::json!({"nested": {"b": 3, "c": 4}});
        let merged = deep_merge(base, over);
        assert_eq!(merged, serde_json::json!({"nested": {"a": 1, "b": 3, "c": 4}}));
    }

    #[test]
    fn deep_merge_override_replaces_non_map_with_map() {
        let base = serde_json::json!({"a": 1});
        let over = serde_json::json!({"a": {"nested": true}});
        let merged = deep_merge(base, over);
        assert_eq!(merged, serde_json::json!({"a": {"nested": true}}));
    }
}
