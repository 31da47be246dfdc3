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

//! kraze: a declarative multi-service Kubernetes deployment engine.
//!
//! A bundle configuration document names a cluster and a set of
//! services — each either a Helm chart or a list of raw manifests —
//! with dependency edges between them. The [`reconcile::Reconciler`]
//! expands a requested selection, orders it topologically, and drives
//! each service through install, uninstall, or status via the
//! polymorphic providers in [`engine`].

pub mod cli;
pub mod cluster;
pub mod config;
pub mod engine;
pub mod manifests;
pub mod reconcile;
pub mod shared;

pub use config::{load, Bundle};
pub use shared::error::{FieldError, KrazeError, Result};
