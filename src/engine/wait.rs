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

//! Component G: Readiness Waiter. Polls applied resources at a fixed
//! cadence, evaluates kind-specific readiness, and detects unrecoverable
//! pod failure early rather than waiting out the full deadline.

use crate::cluster::Catalog;
use crate::shared::error::{KrazeError, Result};
use k8s_openapi::api::core::v1::{Event, Pod};
use kube::api::{Api, ListParams};
use kube::core::GroupVersionKind;
use kube::Client;
use std::time::{Duration, Instant};
use tokio::time::interval;
use tokio_util::sync::CancellationToken;

const POLL_INTERVAL: Duration = Duration::from_secs(2);
pub(crate) const FAILURE_DETECTION_KINDS: &[&str] = &["Deployment", "StatefulSet", "DaemonSet", "Job", "Pod"];
const WORKLOAD_GVKS: &[(&str, &str, &str)] = &[
    ("apps", "v1", "Deployment"),
    ("apps", "v1", "StatefulSet"),
    ("apps", "v1", "DaemonSet"),
    ("batch", "v1", "Job"),
    ("", "v1", "Pod"),
];

/// The (group, version, kind) triples [`is_ready`] knows how to judge,
/// for callers that need to enumerate workload kinds by GVK rather than
/// bare kind string (status queries over a label selector).
pub(crate) fn workload_gvks() -> impl Iterator<Item = kube::core::GroupVersionKind> {
    WORKLOAD_GVKS.iter().map(|(group, version, kind)| kube::core::GroupVersionKind {
        group: group.to_string(),
        version: version.to_string(),
        kind: kind.to_string(),
    })
}

const IMMEDIATE_FAILURE_REASONS: &[&str] = &[
    "ImagePullBackOff",
    "ErrImagePull",
    "CrashLoopBackOff",
    "CreateContainerConfigError",
    "CreateContainerError",
    "InvalidImageName",
    "ErrImageNeverPull",
];

pub struct Waiter<'a> {
    client: Client,
    catalog: &'a Catalog,
}

impl<'a> Waiter<'a> {
    pub fn new(client: Client, catalog: &'a Catalog) -> Self {
        Self { client, catalog }
    }

    /// Waits for `name`/`namespace` of the given `gvk` to become ready,
    /// polling every 2 seconds until `timeout` elapses or `cancel` fires.
    pub async fn wait_ready(
        &self,
        gvk: &GroupVersionKind,
        name: &str,
        namespace: Option<&str>,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if !FAILURE_DETECTION_KINDS.contains(&gvk.kind.as_str()) {
            return Ok(());
        }

        let (api_resource, _capabilities) = self.catalog.resolve(gvk)?;
        let api: Api<kube::api::DynamicObject> = match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &api_resource),
            None => Api::all_with(self.client.clone(), &api_resource),
        };

        let deadline = Instant::now() + timeout;
        let mut observed = false;
        let mut ticker = interval(POLL_INTERVAL);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(KrazeError::NotReady(format!("wait for {} '{}' cancelled", gvk.kind, name)));
                }
                _ = ticker.tick() => {
                    if Instant::now() >= deadline {
                        return Err(KrazeError::NotReady(format!(
                            "{} '{}' did not become ready within {:?}",
                            gvk.kind, name, timeout
                        )));
                    }

                    match api.get_opt(name).await {
                        Ok(Some(object)) => {
                            observed = true;
                            if let Some(failure) = self.check_pod_failures(&gvk.kind, name, namespace, &object).await? {
                                return Err(failure);
                            }
                            if is_ready(&gvk.kind, &object)? {
                                return Ok(());
                            }
                        }
                        Ok(None) => {
                            if observed {
                                return Err(KrazeError::NotReady(format!(
                                    "{} '{}' disappeared while waiting for readiness",
                                    gvk.kind, name
                                )));
                            }
                        }
                        Err(e) => return Err(KrazeError::ApiError(format!("polling {} '{}': {e}", gvk.kind, name))),
                    }
                }
            }
        }
    }

    /// Finds the Pods behind `owner` (itself, if it's a Pod; otherwise
    /// its controller-owned Pods, found via `owner`'s own
    /// `spec.selector.matchLabels`) and checks each for the failure
    /// conditions in [`pod_failure_reason`].
    async fn check_pod_failures(
        &self,
        owner_kind: &str,
        owner_name: &str,
        namespace: Option<&str>,
        owner: &kube::api::DynamicObject,
    ) -> Result<Option<KrazeError>> {
        let Some(ns) = namespace else { return Ok(None) };
        let api: Api<Pod> = Api::namespaced(self.client.clone(), ns);

        let pods = if owner_kind == "Pod" {
            match api.get_opt(owner_name).await {
                Ok(Some(p)) => vec![p],
                Ok(None) => return Ok(None),
                Err(e) => return Err(KrazeError::ApiError(e.to_string())),
            }
        } else {
            let selector = match_labels_selector(owner);
            if selector.is_empty() {
                return Ok(None);
            }
            api.list(&ListParams::default().labels(&selector))
                .await
                .map_err(|e| KrazeError::ApiError(e.to_string()))?
                .items
        };

        for pod in &pods {
            if pod.metadata.deletion_timestamp.is_some() {
                continue;
            }
            if let Some(reason) = pod_failure_reason(pod) {
                let diagnostics = self.collect_diagnostics(ns, pod, &reason).await;
                return Ok(Some(KrazeError::PodFailure {
                    message: reason,
                    diagnostics,
                }));
            }
        }
        Ok(None)
    }

    /// Last 5 involving events plus, for a CrashLoopBackOff or non-zero
    /// exit, the last 20 log lines of the container named in `reason`.
    async fn collect_diagnostics(&self, namespace: &str, pod: &Pod, reason: &str) -> String {
        let name = pod.metadata.name.as_deref().unwrap_or("<unnamed>");
        let mut out = String::new();

        let events: Api<Event> = Api::namespaced(self.client.clone(), namespace);
        let selector = format!("involvedObject.name={name},involvedObject.kind=Pod");
        if let Ok(list) = events.list(&ListParams::default().fields(&selector)).await {
            let mut recent: Vec<_> = list.items.iter().collect();
            recent.sort_by_key(|e| e.last_timestamp.clone().map(|t| t.0));
            for event in recent.iter().rev().take(5) {
                out.push_str(&format!(
                    "{}: {}\n",
                    event.reason.clone().unwrap_or_default(),
                    event.message.clone().unwrap_or_default()
                ));
            }
        }

        if let Some(container) = container_from_failure_reason(reason) {
            let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
            let log_params = kube::api::LogParams {
                container: Some(container.to_string()),
                tail_lines: Some(20),
                ..Default::default()
            };
            match pods.logs(name, &log_params).await {
                Ok(log) => {
                    out.push_str(&format!("--- last 20 lines of container '{container}' ---\n"));
                    out.push_str(&log);
                }
                Err(e) => crate::shared::error::warn("wait-diagnostics", format!("fetching logs for '{container}': {e}")),
            }
        }

        out
    }
}

/// Builds a `k=v,...` label selector from a Deployment/StatefulSet/
/// DaemonSet/Job's `spec.selector.matchLabels`. Empty if the owner
/// carries no such selector (nothing to match against).
fn match_labels_selector(owner: &kube::api::DynamicObject) -> String {
    let json = serde_json::to_value(owner).unwrap_or_default();
    let Some(labels) = json
        .get("spec")
        .and_then(|s| s.get("selector"))
        .and_then(|s| s.get("matchLabels"))
        .and_then(|m| m.as_object())
    else {
        return String::new();
    };
    labels
        .iter()
        .filter_map(|(k, v)| v.as_str().map(|v| format!("{k}={v}")))
        .collect::<Vec<_>>()
        .join(",")
}

/// Extracts the container name from a `pod_failure_reason` message for
/// the two cases the spec singles out: CrashLoopBackOff and non-zero
/// exit. Returns `None` for other failure shapes (phase=Failed has no
/// single implicated container).
fn container_from_failure_reason(reason: &str) -> Option<&str> {
    if !reason.contains("CrashLoopBackOff") && !reason.contains("terminated with exit code") {
        return None;
    }
    let after = reason.split_once("container '")?.1;
    after.split_once('\'').map(|(name, _)| name)
}

/// Exposed for status queries: callers that already hold a fetched
/// object (e.g. [`crate::engine::provider::ManifestsProvider::status`])
/// can reuse the same per-kind readiness predicate the Waiter polls on.
pub(crate) fn is_ready(kind: &str, object: &kube::api::DynamicObject) -> Result<bool> {
    let json = serde_json::to_value(object).unwrap_or_default();
    let get_i64 = |path: &str| -> Option<i64> {
        let mut cur = &json;
        for seg in path.split('.') {
            cur = cur.get(seg)?;
        }
        cur.as_i64()
    };
    let get_bool_condition = |kind_name: &str| -> bool {
        json.get("status")
            .and_then(|s| s.get("conditions"))
            .and_then(|c| c.as_array())
            .map(|conditions| {
                conditions.iter().any(|c| {
                    c.get("type").and_then(|t| t.as_str()) == Some(kind_name)
                        && c.get("status").and_then(|s| s.as_str()) == Some("True")
                })
            })
            .unwrap_or(false)
    };

    Ok(match kind {
        "Deployment" => {
            let desired = get_i64("spec.replicas").unwrap_or(1);
            let available = get_i64("status.availableReplicas").unwrap_or(0);
            let updated = get_i64("status.updatedReplicas").unwrap_or(0);
            available >= desired && updated >= desired
        }
        "StatefulSet" => {
            let desired = get_i64("spec.replicas").unwrap_or(1);
            let ready = get_i64("status.readyReplicas").unwrap_or(0);
            ready >= desired
        }
        "DaemonSet" => {
            let desired = get_i64("status.desiredNumberScheduled").unwrap_or(0);
            let ready = get_i64("status.numberReady").unwrap_or(0);
            desired > 0 && ready >= desired
        }
        "Job" => {
            if get_bool_condition("Failed") {
                return Err(KrazeError::PodFailure {
                    message: "job reported condition Failed=True".to_string(),
                    diagnostics: String::new(),
                });
            }
            get_i64("status.succeeded").unwrap_or(0) > 0 || get_bool_condition("Complete")
        }
        "Pod" => {
            let phase = json.get("status").and_then(|s| s.get("phase")).and_then(|p| p.as_str());
            phase == Some("Running") && get_bool_condition("Ready")
        }
        _ => {
            let has_conditions = json
                .get("status")
                .and_then(|s| s.get("conditions"))
                .is_some();
            !has_conditions || get_bool_condition("Ready")
        }
    })
}

/// Returns a human-readable failure reason if `pod` has failed
/// irrecoverably, per the waiting-reason set, terminated-nonzero-exit,
/// phase=Failed, and restart/age heuristics.
fn pod_failure_reason(pod: &Pod) -> Option<String> {
    let name = pod.metadata.name.as_deref().unwrap_or("<unnamed>");
    let status = pod.status.as_ref()?;

    if status.phase.as_deref() == Some("Failed") {
        return Some(format!("pod '{name}' is in Failed phase"));
    }

    let mut statuses: Vec<(bool, &k8s_openapi::api::core::v1::ContainerStatus)> = Vec::new();
    if let Some(cs) = &status.init_container_statuses {
        statuses.extend(cs.iter().map(|s| (true, s)));
    }
    if let Some(cs) = &status.container_statuses {
        statuses.extend(cs.iter().map(|s| (false, s)));
    }

    for (is_init, cs) in statuses {
        if let Some(waiting) = cs.state.as_ref().and_then(|s| s.waiting.as_ref()) {
            if let Some(reason) = &waiting.reason {
                if IMMEDIATE_FAILURE_REASONS.contains(&reason.as_str()) {
                    return Some(format!("container '{}' in pod '{name}' is {reason}", cs.name));
                }
            }
        }

        if let Some(terminated) = cs.state.as_ref().and_then(|s| s.terminated.as_ref()) {
            if terminated.exit_code != 0 {
                return Some(format!(
                    "container '{}' in pod '{name}' terminated with exit code {}",
                    cs.name, terminated.exit_code
                ));
            }
        }

        if cs.ready {
            continue;
        }

        let running_secs = cs
            .state
            .as_ref()
            .and_then(|s| s.running.as_ref())
            .and_then(|r| r.started_at.as_ref())
            .map(|t| (chrono::Utc::now() - t.0).num_seconds())
            .unwrap_or(0);

        let restarts = cs.restart_count;

        let failed = if is_init {
            restarts > 0 || running_secs >= 45
        } else if restarts >= 5 {
            true
        } else if restarts >= 2 && running_secs >= 90 {
            true
        } else {
            restarts <= 1 && running_secs >= 180
        };

        if failed {
            return Some(format!(
                "container '{}' in pod '{name}' restarted {restarts} times without becoming ready",
                cs.name
            ));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{ContainerState, ContainerStateWaiting, ContainerStatus, PodStatus};

    fn pod_with_container(status: ContainerStatus) -> Pod {
        Pod {
            metadata: Default::default(),
            spec: None,
            status: Some(PodStatus {
                phase: Some("Running".to_string()),
                container_statuses: Some(vec![status]),
                ..Default::default()
            }),
        }
    }

    fn base_container_status(name: &str) -> ContainerStatus {
        ContainerStatus {
            name: name.to_string(),
            ready: false,
            restart_count: 0,
            image: String::new(),
            image_id: String::new(),
            state: None,
            ..Default::default()
        }
    }

    /// S5 — a Deployment-owned pod stuck in CrashLoopBackOff yields a
    /// PodFailure message naming the container, and that name is the
    /// one the log-tail lookup extracts for diagnostics.
    #[test]
    fn crash_loop_backoff_failure_names_the_container_for_log_lookup() {
        let cs = ContainerStatus {
            state: Some(ContainerState {
                waiting: Some(ContainerStateWaiting {
                    reason: Some("CrashLoopBackOff".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..base_container_status("worker")
        };
        let pod = pod_with_container(cs);
        let reason = pod_failure_reason(&pod).expect("expected failure");
        assert!(reason.contains("CrashLoopBackOff"));
        assert_eq!(container_from_failure_reason(&reason), Some("worker"));
    }

    #[test]
    fn detects_crash_loop_backoff() {
        let cs = ContainerStatus {
            state: Some(ContainerState {
                waiting: Some(ContainerStateWaiting {
                    reason: Some("CrashLoopBackOff".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..base_container_status("app")
        };
        let pod = pod_with_container(cs);
        let reason = pod_failure_reason(&pod).expect("expected failure");
        assert!(reason.contains("CrashLoopBackOff"));
    }

    #[test]
    fn tolerates_ready_container() {
        let cs = ContainerStatus {
            ready: true,
            ..base_container_status("app")
        };
        let pod = pod_with_container(cs);
        assert!(pod_failure_reason(&pod).is_none());
    }

    #[test]
    fn high_restart_count_is_a_failure() {
        let cs = ContainerStatus {
            restart_count: 6,
            ..base_container_status("app")
        };
        let pod = pod_with_container(cs);
        assert!(pod_failure_reason(&pod).is_some());
    }

    #[test]
    fn match_labels_selector_builds_comma_joined_pairs() {
        let owner: kube::api::DynamicObject = serde_json::from_value(serde_json::json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": { "name": "api" },
            "spec": { "selector": { "matchLabels": { "app.kubernetes.io/name": "api" } } },
        }))
        .unwrap();
        assert_eq!(match_labels_selector(&owner), "app.kubernetes.io/name=api");
    }

    #[test]
    fn match_labels_selector_is_empty_without_a_selector() {
        let owner: kube::api::DynamicObject = serde_json::from_value(serde_json::json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": { "name": "api" },
        }))
        .unwrap();
        assert!(match_labels_selector(&owner).is_empty());
    }

    #[test]
    fn container_from_failure_reason_extracts_crash_loop_container() {
        let reason = "container 'app' in pod 'api-0' is CrashLoopBackOff";
        assert_eq!(container_from_failure_reason(reason), Some("app"));
    }

    #[test]
    fn container_from_failure_reason_extracts_exit_code_container() {
        let reason = "container 'worker' in pod 'api-0' terminated with exit code 1";
        assert_eq!(container_from_failure_reason(reason), Some("worker"));
    }

    #[test]
    fn container_from_failure_reason_ignores_phase_failed() {
        let reason = "pod 'api-0' is in Failed phase";
        assert_eq!(container_from_failure_reason(reason), None);
    }
}
