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

//! Component D: Manifests Pipeline. Loads raw YAML text from a local
//! file, a non-recursive directory listing, or an HTTP(S) URL, then
//! splits it into individual documents in file order.

use crate::shared::error::{KrazeError, Result};
use std::path::Path;

/// Loads and concatenates every manifest source named by `paths`,
/// resolving directories (non-recursively, `.yaml`/`.yml` only) and
/// fetching `http(s)://` URLs.
pub async fn load_all(paths: &[String]) -> Result<Vec<String>> {
    let mut docs = Vec::new();
    for path in paths {
        docs.extend(load_one(path).await?);
    }
    Ok(docs)
}

async fn load_one(path: &str) -> Result<Vec<String>> {
    if path.starts_with("http://") || path.starts_with("https://") {
        let body = fetch_url(path).await?;
        return Ok(split_documents(&body));
    }

    let fs_path = Path::new(path);
    if fs_path.is_dir() {
        let mut entries: Vec<_> = std::fs::read_dir(fs_path)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
                    .unwrap_or(false)
            })
            .collect();
        entries.sort();

        let mut docs = Vec::new();
        for entry in entries {
            let content = std::fs::read_to_string(&entry)?;
            docs.extend(split_documents(&content));
        }
        Ok(docs)
    } else {
        let content = std::fs::read_to_string(fs_path)?;
        Ok(split_documents(&content))
    }
}

async fn fetch_url(url: &str) -> Result<String> {
    let response = reqwest::get(url)
        .await
        .map_err(|e| KrazeError::RemoteFetch(format!("{url}: {e}")))?;
    if !response.status().is_success() {
        return Err(KrazeError::RemoteFetch(format!(
            "{url}: unexpected status {}",
            response.status()
        )));
    }
    response
        .text()
        .await
        .map_err(|e| KrazeError::RemoteFetch(format!("{url}: {e}")))
}

/// Splits a multi-document YAML string on lines that are exactly `---`
/// once trimmed, discarding documents that are empty or comment-only.
pub fn split_documents(content: &str) -> Vec<String> {
    let mut docs = Vec::new();
    let mut current = String::new();

    for line in content.lines() {
        if line.trim() == "---" {
            push_if_meaningful(&mut docs, &current);
            current.clear();
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    push_if_meaningful(&mut docs, &current);
    docs
}

fn push_if_meaningful(docs: &mut Vec<String>, doc: &str) {
    let is_meaningful = doc
        .lines()
        .any(|l| !l.trim().is_empty() && !l.trim().starts_with('#'));
    if is_meaningful {
        docs.push(doc.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_document_separator() {
        let input = "a: 1\n---\nb: 2\n";
        let docs = split_documents(input);
        assert_eq!(docs.len(), 2);
        assert!(docs[0].contains("a: 1"));
        assert!(docs[1].contains("b: 2"));
    }

    #[test]
    fn skips_comment_only_documents() {
        let input = "a: 1\n---\n# just a comment\n---\nb: 2\n";
        let docs = split_documents(input);
        assert_eq!(docs.len(), 2);
    }

    #[test]
    fn skips_empty_documents() {
        let input = "---\n---\na: 1\n";
        let docs = split_documents(input);
        assert_eq!(docs.len(), 1);
    }

    #[test]
    fn single_document_with_no_separator() {
        let input = "a: 1\nb: 2\n";
        let docs = split_documents(input);
        assert_eq!(docs.len(), 1);
    }
}
