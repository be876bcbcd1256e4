//! Public suffix list matching.
//!
//! Implements the lookup algorithm from <https://publicsuffix.org/list/>:
//! the longest matching rule wins, exception rules beat wildcard rules, and
//! hosts under an unknown top-level domain fall back to the implicit `*` rule.

use std::collections::HashSet;
use std::fs;
use std::net::IpAddr;
use std::path::Path;
use std::time::Instant;
use tracing::info;

use crate::error::{DebuggerError, Result};

const EMBEDDED_SUFFIXES: &str = include_str!("../default_public_suffixes.txt");

#[derive(Debug, Clone, Default)]
pub struct SuffixList {
    rules: HashSet<String>,
    /// Parents of wildcard rules, `*.ck` is stored as `ck`
    wildcards: HashSet<String>,
    exceptions: HashSet<String>,
}

impl SuffixList {
    /// Parse a list in the public suffix list text format.
    ///
    /// Lines starting with `//` or `#` are comments. Only the first
    /// whitespace-delimited token of a line is read.
    pub fn parse(content: &str) -> Result<Self> {
        let mut list = SuffixList::default();

        for (line_num, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with("//") || line.starts_with('#') {
                continue;
            }
            let Some(token) = line.split_whitespace().next() else {
                continue;
            };
            let rule = token.trim_end_matches('.').to_lowercase();

            if let Some(exception) = rule.strip_prefix('!') {
                if exception.is_empty() || exception.contains('*') {
                    return Err(invalid_rule(line_num, token));
                }
                list.exceptions.insert(exception.to_string());
            } else if let Some(parent) = rule.strip_prefix("*.") {
                if parent.is_empty() || parent.contains('*') {
                    return Err(invalid_rule(line_num, token));
                }
                list.wildcards.insert(parent.to_string());
            } else if rule.contains('*') || rule.starts_with('.') {
                return Err(invalid_rule(line_num, token));
            } else {
                list.rules.insert(rule);
            }
        }

        Ok(list)
    }

    /// The bundled subset shipped with the crate
    pub fn embedded() -> Self {
        // The bundled file is checked by the tests below.
        Self::parse(EMBEDDED_SUFFIXES).unwrap_or_default()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let start_time = Instant::now();
        let content = fs::read_to_string(path)?;
        let list = Self::parse(&content)?;
        info!(
            action = "loaded",
            component = "suffix_list",
            file_path = ?path,
            rule_count = list.len(),
            duration_ms = start_time.elapsed().as_millis(),
            "Loaded public suffix list"
        );
        Ok(list)
    }

    pub fn len(&self) -> usize {
        self.rules.len() + self.wildcards.len() + self.exceptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of trailing labels that form the public suffix
    fn suffix_label_count(&self, labels: &[&str]) -> usize {
        let n = labels.len();
        for i in 0..n {
            let candidate = labels[i..].join(".");
            if self.exceptions.contains(&candidate) {
                return n - i - 1;
            }
            if self.rules.contains(&candidate) {
                return n - i;
            }
            if i + 1 < n && self.wildcards.contains(&labels[i + 1..].join(".")) {
                return n - i;
            }
        }
        1
    }

    /// Public suffix of `host`, or `None` for IP addresses and empty input
    pub fn public_suffix(&self, host: &str) -> Option<String> {
        let host = clean_host(host);
        if host.is_empty() || host.parse::<IpAddr>().is_ok() {
            return None;
        }
        let labels: Vec<&str> = host.split('.').collect();
        let count = self.suffix_label_count(&labels).min(labels.len());
        Some(labels[labels.len() - count..].join("."))
    }

    /// Registrable domain (eTLD+1) of `host`.
    ///
    /// IP addresses and hosts that are themselves a public suffix map to
    /// themselves, so every host still lands in exactly one group.
    pub fn base_domain(&self, host: &str) -> String {
        let host = clean_host(host);
        if host.is_empty() || host.parse::<IpAddr>().is_ok() {
            return host;
        }
        let labels: Vec<&str> = host.split('.').collect();
        let count = self.suffix_label_count(&labels);
        if labels.len() <= count {
            return host;
        }
        labels[labels.len() - count - 1..].join(".")
    }
}

fn clean_host(host: &str) -> String {
    host.trim()
        .trim_end_matches('.')
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_lowercase()
}

fn invalid_rule(line_num: usize, token: &str) -> DebuggerError {
    DebuggerError::InvalidSuffixRule {
        line: line_num + 1,
        rule: token.to_string(),
    }
}
