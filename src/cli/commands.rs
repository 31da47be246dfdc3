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

//! CLI command definitions: `up`, `down`, `status`, `port-forward`.

use crate::cli::display::{ServiceRow, TableRenderer};
use crate::cluster::{Session, SessionOptions};
use crate::reconcile::{Reconciler, Selection};
use crate::shared::duration;
use clap::Parser;
use kube::api::Api;
use std::time::Duration;
use tokio::io::{self, AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(
    name = "kraze",
    version,
    about = "Declarative multi-service Kubernetes deployment engine",
    long_about = "Installs, uninstalls, and reports on a bundle of Helm charts and raw manifests declared in a single configuration document"
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Install selected services with dependency closure
    Up(UpCommand),

    /// Uninstall selected services
    Down(DownCommand),

    /// Show the installed/ready status of every service
    Status(StatusCommand),

    /// Forward a local port to a service's pod
    PortForward(PortForwardCommand),
}

/// Flags shared by every subcommand that touches a cluster.
#[derive(Parser, Debug, Clone)]
pub struct CommonArgs {
    /// Path to the bundle configuration document
    pub config: String,

    /// Path to kubeconfig (defaults to KUBECONFIG env / ~/.kube/config)
    #[arg(long)]
    pub kubeconfig: Option<String>,

    /// Kubeconfig context to use
    #[arg(long)]
    pub context: Option<String>,

    /// Skip TLS certificate verification (local ephemeral clusters only)
    #[arg(long)]
    pub insecure_skip_tls_verify: bool,

    /// Verbose logging
    #[arg(long)]
    pub verbose: bool,

    /// Suppress non-error logging
    #[arg(long)]
    pub quiet: bool,

    /// Restrict to these service names plus their dependencies (repeatable)
    #[arg(long = "service")]
    pub services: Vec<String>,

    /// Do not pull in dependencies of the named services
    #[arg(long)]
    pub no_deps: bool,

    /// Restrict to services whose labels match key=value (repeatable)
    #[arg(long = "label")]
    pub labels: Vec<String>,
}

impl CommonArgs {
    fn session_options(&self) -> SessionOptions {
        SessionOptions {
            kubeconfig: self.kubeconfig.clone(),
            context: self.context.clone(),
            insecure_skip_tls_verify: self.insecure_skip_tls_verify,
        }
    }

    fn selection(&self) -> Selection {
        if !self.labels.is_empty() {
            return Selection::Labels(
                self.labels
                    .iter()
                    .filter_map(|kv| kv.split_once('='))
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            );
        }
        if self.services.is_empty() {
            return Selection::All;
        }
        if self.no_deps {
            Selection::NoDependencies(self.services.clone())
        } else {
            Selection::WithDependencies(self.services.clone())
        }
    }
}

#[derive(Parser, Debug)]
pub struct UpCommand {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Wait for workloads to become ready after applying
    #[arg(long, default_value_t = true)]
    pub wait: bool,

    /// Readiness timeout (Go-style duration, e.g. "10m")
    #[arg(long)]
    pub timeout: Option<String>,
}

#[derive(Parser, Debug)]
pub struct DownCommand {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Keep CustomResourceDefinitions found in release manifests
    #[arg(long)]
    pub keep_crds: bool,

    /// Delete each service's namespace afterward if left empty of user resources
    #[arg(long)]
    pub delete_namespace: bool,

    /// When deleting a namespace, delete its PersistentVolumeClaims first
    #[arg(long)]
    pub delete_pvcs_first: bool,
}

#[derive(Parser, Debug)]
pub struct StatusCommand {
    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Parser, Debug)]
pub struct PortForwardCommand {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Service whose pod to forward into
    pub service: String,

    /// Port mappings, `[LOCAL:]REMOTE`
    #[arg(required = true)]
    pub ports: Vec<String>,
}

impl UpCommand {
    pub async fn execute(&self) -> anyhow::Result<()> {
        let mut bundle = crate::config::load(&self.common.config)?;
        if let Some(timeout) = &self.timeout {
            let parsed = duration::parse(timeout).map_err(|e| anyhow::anyhow!("invalid --timeout: {e}"))?;
            apply_timeout_override(&mut bundle, parsed, self.wait);
        }

        let session = Session::connect(&self.common.session_options()).await?;
        let reconciler = Reconciler::new(&bundle, &session);
        let cancel = CancellationToken::new();
        let cancel_on_signal = cancel.clone();
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            cancel_on_signal.cancel();
        });

        reconciler
            .install(self.common.selection(), &cancel)
            .await
            .map_err(|e| anyhow::anyhow!("up failed: {e}"))?;

        println!("bundle '{}' installed", bundle.cluster.name);
        Ok(())
    }
}

impl DownCommand {
    pub async fn execute(&self) -> anyhow::Result<()> {
        let mut bundle = crate::config::load(&self.common.config)?;
        if self.keep_crds {
            for descriptor in bundle.services.values_mut() {
                descriptor.keep_crds = Some(true);
            }
        }

        let session = Session::connect(&self.common.session_options()).await?;
        let reconciler = Reconciler::new(&bundle, &session);

        let uninstalled = reconciler.resolve_selection(&self.common.selection());

        reconciler
            .uninstall(self.common.selection())
            .await
            .map_err(|e| anyhow::anyhow!("down failed: {e}"))?;

        if self.delete_namespace {
            let mut namespaces: Vec<&str> = uninstalled
                .iter()
                .filter_map(|name| bundle.service(name))
                .map(|d| d.namespace.as_str())
                .collect();
            namespaces.sort_unstable();
            namespaces.dedup();
            for namespace in namespaces {
                match crate::engine::uninstall::cleanup_namespace(&session.client(), namespace, self.delete_pvcs_first).await {
                    Ok(true) => println!("namespace '{namespace}' deleted"),
                    Ok(false) => println!("namespace '{namespace}' left in place (not empty)"),
                    Err(e) => crate::shared::error::warn("down", format!("namespace '{namespace}': {e}")),
                }
            }
        }

        println!("bundle '{}' uninstalled", bundle.cluster.name);
        Ok(())
    }
}

impl StatusCommand {
    pub async fn execute(&self) -> anyhow::Result<()> {
        let bundle = crate::config::load(&self.common.config)?;
        let session = Session::connect(&self.common.session_options()).await?;
        let reconciler = Reconciler::new(&bundle, &session);

        let statuses = reconciler
            .status(self.common.selection())
            .await
            .map_err(|e| anyhow::anyhow!("status failed: {e}"))?;

        let mut rows: Vec<ServiceRow> = statuses
            .into_iter()
            .map(|(name, status)| {
                let namespace = bundle
                    .service(&name)
                    .map(|d| d.namespace.clone())
                    .unwrap_or_default();
                ServiceRow { name, namespace, status }
            })
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));

        let renderer = TableRenderer::new();
        print!("{}", renderer.render_service_status(&bundle.cluster.name, &rows));

        if rows.iter().any(|r| r.status.installed && !r.status.ready) {
            std::process::exit(1);
        }
        Ok(())
    }
}

impl PortForwardCommand {
    /// Opens a single port-forward stream to the service's namespace
    /// and relays bytes until Ctrl-C. No retry or reconnect logic —
    /// this is a thin pass-through, not a managed tunnel.
    pub async fn execute(&self) -> anyhow::Result<()> {
        let bundle = crate::config::load(&self.common.config)?;
        let descriptor = bundle
            .service(&self.service)
            .ok_or_else(|| anyhow::anyhow!("unknown service '{}'", self.service))?;

        let session = Session::connect(&self.common.session_options()).await?;
        let pods: Api<k8s_openapi::api::core::v1::Pod> = Api::namespaced(session.client(), &descriptor.namespace);

        let (local, remote) = parse_port_mapping(&self.ports[0])?;
        let pod_name = find_forward_target(&session, descriptor).await?;

        let mut forwarder = pods.portforward(&pod_name, &[remote]).await?;
        let upstream = forwarder
            .take_stream(remote)
            .ok_or_else(|| anyhow::anyhow!("port {remote} not present in portforward response"))?;
        let (mut upstream_read, mut upstream_write) = io::split(upstream);

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", local)).await?;
        println!("forwarding 127.0.0.1:{local} -> {pod_name}:{remote} (ctrl-c to stop)");

        tokio::select! {
            accepted = listener.accept() => {
                let (mut local_conn, _) = accepted?;
                let (mut read_half, mut write_half) = local_conn.split();
                let client_to_pod = async {
                    let mut buf = [0u8; 8192];
                    loop {
                        let n = read_half.read(&mut buf).await?;
                        if n == 0 { break; }
                        upstream_write.write_all(&buf[..n]).await?;
                    }
                    anyhow::Ok(())
                };
                let pod_to_client = async {
                    let mut buf = [0u8; 8192];
                    loop {
                        let n = upstream_read.read(&mut buf).await?;
                        if n == 0 { break; }
                        write_half.write_all(&buf[..n]).await?;
                    }
                    anyhow::Ok(())
                };
                tokio::select! {
                    _ = client_to_pod => {}
                    _ = pod_to_client => {}
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("stopping port-forward");
            }
        }
        Ok(())
    }
}

async fn find_forward_target(
    session: &Session,
    descriptor: &crate::config::model::ServiceDescriptor,
) -> anyhow::Result<String> {
    let pods: Api<k8s_openapi::api::core::v1::Pod> =
        Api::namespaced(session.client(), &descriptor.namespace);
    let list = pods
        .list(&kube::api::ListParams::default().labels(&format!("{}={}", crate::engine::apply::SERVICE_LABEL, descriptor.name)))
        .await?;
    let first = list
        .items
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("no pods found for service '{}'", descriptor.name))?;
    first
        .metadata
        .name
        .ok_or_else(|| anyhow::anyhow!("pod has no name"))
}

fn parse_port_mapping(spec: &str) -> anyhow::Result<(u16, u16)> {
    match spec.split_once(':') {
        Some((local, remote)) => Ok((local.parse()?, remote.parse()?)),
        None => {
            let port: u16 = spec.parse()?;
            Ok((port, port))
        }
    }
}

fn apply_timeout_override(bundle: &mut crate::config::Bundle, timeout: Duration, wait: bool) {
    for descriptor in bundle.services.values_mut() {
        let mut spec = descriptor.wait.clone().unwrap_or_default();
        spec.enabled = wait;
        spec.timeout = timeout;
        descriptor.wait = Some(spec);
    }
}
