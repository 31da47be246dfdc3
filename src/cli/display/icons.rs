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

//! Status icons for CLI output.

/// Status icons for different states.
pub struct StatusIcon;

impl StatusIcon {
    pub const SUCCESS: &'static str = "\u{2713}";
    pub const WARNING: &'static str = "\u{26A0}";
    pub const ERROR: &'static str = "\u{2717}";
    pub const UNKNOWN: &'static str = "?";

    /// Icon for a service's installed/ready status.
    pub fn get_status_icon(installed: bool, ready: bool) -> &'static str {
        if !installed {
            Self::UNKNOWN
        } else if ready {
            Self::SUCCESS
        } else {
            Self::WARNING
        }
    }

    /// Text for a service's installed/ready status.
    pub fn get_status_text(installed: bool, ready: bool) -> &'static str {
        if !installed {
            "Not installed"
        } else if ready {
            "Ready"
        } else {
            "Not ready"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_status_icon() {
        assert_eq!(StatusIcon::get_status_icon(true, true), StatusIcon::SUCCESS);
        assert_eq!(StatusIcon::get_status_icon(true, false), StatusIcon::WARNING);
        assert_eq!(StatusIcon::get_status_icon(false, false), StatusIcon::UNKNOWN);
    }

    #[test]
    fn test_get_status_text() {
        assert_eq!(StatusIcon::get_status_text(true, true), "Ready");
        assert_eq!(StatusIcon::get_status_text(true, false), "Not ready");
        assert_eq!(StatusIcon::get_status_text(false, false), "Not installed");
    }
}
