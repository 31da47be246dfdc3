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

//! Component A: Config Loader. Turns a declarative document on disk into
//! a validated [`model::Bundle`].

pub mod env_subst;
pub mod loader;
pub mod model;
pub mod wire;

pub use loader::load;
pub use model::{
    Bundle, ChartSource, ChartSpec, ClusterDescriptor, ExternalClusterRef, ManifestsSpec,
    NetworkingSpec, NodeSpec, ServiceDescriptor, ServiceKind, ServiceStatus, ValuesSource,
    WaitSpec,
};
