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

//! Table rendering for CLI output.

use super::{ColorTheme, StatusIcon};
use crate::config::model::ServiceStatus;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, ContentArrangement, Table};

/// One row in the `status` table: a service name paired with its
/// namespace and the status reported by its provider.
#[derive(Debug, Clone)]
pub struct ServiceRow {
    pub name: String,
    pub namespace: String,
    pub status: ServiceStatus,
}

/// Table renderer for formatted output.
pub struct TableRenderer {
    theme: ColorTheme,
}

impl Default for TableRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TableRenderer {
    pub fn new() -> Self {
        Self {
            theme: ColorTheme::default(),
        }
    }

    /// Render a bundle's service statuses as a formatted table.
    pub fn render_service_status(&self, cluster_name: &str, rows: &[ServiceRow]) -> String {
        if rows.is_empty() {
            return "No services in this bundle".to_string();
        }

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("SERVICE").set_alignment(CellAlignment::Left),
                Cell::new("NAMESPACE").set_alignment(CellAlignment::Left),
                Cell::new("STATUS").set_alignment(CellAlignment::Center),
                Cell::new("MESSAGE").set_alignment(CellAlignment::Left),
            ]);

        let mut ready_count = 0;
        for row in rows {
            let icon = StatusIcon::get_status_icon(row.status.installed, row.status.ready);
            let text = StatusIcon::get_status_text(row.status.installed, row.status.ready);
            let color = self.theme.get_status_color(row.status.installed, row.status.ready);
            if row.status.ready {
                ready_count += 1;
            }

            table.add_row(vec![
                Cell::new(&row.name),
                Cell::new(&row.namespace),
                Cell::new(format!("{icon} {text}")).fg(color),
                Cell::new(&row.status.message),
            ]);
        }

        let mut output = String::new();
        output.push_str(&format!(
            "\u{2577} cluster {} {}\n",
            cluster_name,
            format!("[{ready_count}/{} ready]", rows.len()).bright_black()
        ));
        output.push_str(&table.to_string());
        output.push('\n');
        output.push_str(&format!(
            "Legend: {} Ready  {} Not ready  {} Unknown\n",
            StatusIcon::SUCCESS.green(),
            StatusIcon::WARNING.yellow(),
            StatusIcon::UNKNOWN.bright_black()
        ));

        output
    }

    /// Render the outcome of an `up`/`down` run: one line per service in
    /// the order it was processed, success or failure.
    pub fn render_run_summary(&self, results: &[(String, Result<(), String>)]) -> String {
        let mut output = String::new();
        for (name, result) in results {
            match result {
                Ok(()) => output.push_str(&format!("{} {name}\n", StatusIcon::SUCCESS.green())),
                Err(message) => {
                    output.push_str(&format!("{} {name}: {}\n", StatusIcon::ERROR.red(), message.color(colored::Color::Red)))
                }
            }
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_empty_services() {
        let renderer = TableRenderer::new();
        let output = renderer.render_service_status("demo", &[]);
        assert!(output.contains("No services"));
    }

    #[test]
    fn test_render_single_service() {
        let renderer = TableRenderer::new();
        let rows = vec![ServiceRow {
            name: "api".to_string(),
            namespace: "default".to_string(),
            status: ServiceStatus {
                installed: true,
                ready: true,
                message: "release revision 1".to_string(),
            },
        }];
        let output = renderer.render_service_status("demo", &rows);
        assert!(output.contains("api"));
        assert!(output.contains("default"));
        assert!(output.contains("release revision 1"));
    }

    #[test]
    fn test_render_run_summary() {
        let renderer = TableRenderer::new();
        let results = vec![
            ("db".to_string(), Ok(())),
            ("api".to_string(), Err("timed out".to_string())),
        ];
        let output = renderer.render_run_summary(&results);
        assert!(output.contains("db"));
        assert!(output.contains("api: timed out"));
    }
}
