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

//! Textual `${NAME}` / `${NAME:-DEFAULT}` substitution, run before the
//! document is structurally parsed. Substitution is not recursive: a
//! DEFAULT or substituted value is never re-scanned for further
//! references.

use regex::Regex;
use std::sync::OnceLock;

fn pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(:-(.*?))?\}").expect("static regex is valid")
    })
}

pub fn substitute(input: &str) -> String {
    substitute_with(input, |name| std::env::var(name).ok())
}

/// Testable variant that takes an explicit lookup function instead of
/// reading the real process environment.
pub fn substitute_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    pattern()
        .replace_all(input, |caps: &regex::Captures| {
            let name = &caps[1];
            if let Some(value) = lookup(name) {
                value
            } else {
                caps.get(3).map(|m| m.as_str().to_string()).unwrap_or_default()
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from<'a>(map: &'a HashMap<&'a str, &'a str>) -> impl Fn(&str) -> Option<String> + 'a {
        move |name| map.get(name).map(|v| v.to_string())
    }

    #[test]
    fn substitutes_defined_variable() {
        let mut env = HashMap::new();
        env.insert("ENV", "staging");
        let out = substitute_with("cluster-${ENV}", lookup_from(&env));
        assert_eq!(out, "cluster-staging");
    }

    #[test]
    fn falls_back_to_default_when_undefined() {
        let env = HashMap::new();
        let out = substitute_with("cluster-${ENV:-production}", lookup_from(&env));
        assert_eq!(out, "cluster-production");
    }

    #[test]
    fn empty_default_when_omitted_and_undefined() {
        let env = HashMap::new();
        let out = substitute_with("name-${MISSING}", lookup_from(&env));
        assert_eq!(out, "name-");
    }

    #[test]
    fn does_not_recursively_substitute() {
        let mut env = HashMap::new();
        env.insert("OUTER", "${INNER}");
        let out = substitute_with("${OUTER}", lookup_from(&env));
        assert_eq!(out, "${INNER}");
    }
}
