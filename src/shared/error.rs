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

use thiserror::Error;

pub type Result<T> = std::result::Result<T, KrazeError>;

/// A single field-tagged validation failure, as required for config
/// loader errors: {field, message}.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Error, Debug)]
pub enum KrazeError {
    #[error("invalid configuration: {}", format_field_errors(.0))]
    InvalidConfig(Vec<FieldError>),

    #[error("failed to fetch remote resource: {0}")]
    RemoteFetch(String),

    #[error("cluster API unavailable: {0}")]
    ApiUnavailable(String),

    #[error("cluster API error: {0}")]
    ApiError(String),

    #[error("readiness deadline exceeded: {0}")]
    NotReady(String),

    #[error("pod failure: {message}")]
    PodFailure { message: String, diagnostics: String },

    #[error("service '{name}' failed: {source}")]
    Service {
        name: String,
        #[source]
        source: Box<KrazeError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Kubernetes client error: {0}")]
    Kube(#[from] kube::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

fn format_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Warning events are not `Result::Err` — they are logged at the call
/// site via `tracing::warn!` and never propagated as a failure. This
/// helper centralizes the formatting so every warning looks the same.
pub fn warn(context: &str, message: impl std::fmt::Display) {
    tracing::warn!("{}: {}", context, message);
}
