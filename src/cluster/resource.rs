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

//! A thin, safe-accessor wrapper around [`DynamicObject`] used everywhere
//! a resource's kind is not known until it's read off the wire.

use kube::api::DynamicObject;
use kube::core::GroupVersionKind;

#[derive(Debug, Clone)]
pub struct Resource {
    pub object: DynamicObject,
    pub gvk: GroupVersionKind,
}

impl Resource {
    pub fn new(object: DynamicObject, gvk: GroupVersionKind) -> Self {
        Self { object, gvk }
    }

    pub fn name(&self) -> &str {
        self.object.metadata.name.as_deref().unwrap_or("<unnamed>")
    }

    pub fn namespace(&self) -> Option<&str> {
        self.object.metadata.namespace.as_deref()
    }

    pub fn kind(&self) -> &str {
        &self.gvk.kind
    }

    pub fn display_name(&self) -> String {
        match self.namespace() {
            Some(ns) => format!("{}/{}/{}", ns, self.kind(), self.name()),
            None => format!("{}/{}", self.kind(), self.name()),
        }
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.object
            .metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(key))
            .map(String::as_str)
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.object
            .metadata
            .labels
            .as_ref()
            .and_then(|l| l.get(key))
            .map(String::as_str)
    }

    /// Reads a dotted path (e.g. `"status.readyReplicas"`) out of the
    /// object's JSON tree as a string, returning `None` if any segment is
    /// absent or not a string.
    pub fn get_str(&self, path: &str) -> Option<String> {
        let json = serde_json::to_value(&self.object).ok()?;
        let mut cur = &json;
        for segment in path.split('.') {
            cur = cur.get(segment)?;
        }
        cur.as_str().map(str::to_string)
    }

    pub fn get_i64(&self, path: &str) -> Option<i64> {
        let json = serde_json::to_value(&self.object).ok()?;
        let mut cur = &json;
        for segment in path.split('.') {
            cur = cur.get(segment)?;
        }
        cur.as_i64()
    }
}
