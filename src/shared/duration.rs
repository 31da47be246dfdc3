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

//! Parses Go-style duration strings ("10m", "30s", "1h30m") used by
//! `wait_timeout` in the configuration document and `--timeout` on the
//! command line. Only the units we ever need appear in config: h, m, s, ms.

use std::time::Duration;

pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(600);

pub fn parse(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("empty duration".to_string());
    }

    let mut total = Duration::ZERO;
    let mut rest = input;
    let mut saw_component = false;

    while !rest.is_empty() {
        let digits_end = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .ok_or_else(|| format!("missing unit in duration '{}'", input))?;
        if digits_end == 0 {
            return Err(format!("invalid duration '{}'", input));
        }
        let (num_str, unit_rest) = rest.split_at(digits_end);
        let num: f64 = num_str
            .parse()
            .map_err(|_| format!("invalid number '{}' in duration '{}'", num_str, input))?;

        let (unit, remainder) = if let Some(r) = unit_rest.strip_prefix("ms") {
            ("ms", r)
        } else if let Some(r) = unit_rest.strip_prefix('h') {
            ("h", r)
        } else if let Some(r) = unit_rest.strip_prefix('m') {
            ("m", r)
        } else if let Some(r) = unit_rest.strip_prefix('s') {
            ("s", r)
        } else {
            return Err(format!("unknown unit in duration '{}'", input));
        };

        let secs = match unit {
            "h" => num * 3600.0,
            "m" => num * 60.0,
            "s" => num,
            "ms" => num / 1000.0,
            _ => unreachable!(),
        };
        total += Duration::from_secs_f64(secs);
        saw_component = true;
        rest = remainder;
    }

    if !saw_component {
        return Err(format!("invalid duration '{}'", input));
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_units() {
        assert_eq!(parse("10m").unwrap(), Duration::from_secs(600));
        assert_eq!(parse("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse("2h").unwrap(), Duration::from_secs(7200));
    }

    #[test]
    fn parses_compound_durations() {
        assert_eq!(parse("1h30m").unwrap(), Duration::from_secs(5400));
    }

    #[test]
    fn rejects_missing_unit() {
        assert!(parse("10").is_err());
    }

    #[test]
    fn rejects_empty() {
        assert!(parse("").is_err());
    }
}
