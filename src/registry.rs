//! Table of trackers seen on a page and their blocked state.
//!
//! Every tracker starts out blocked. The registry keeps the set of hosts the
//! user (or a debugging session) has unblocked, plus a selection used for
//! bulk block/unblock actions.

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::domain::{has_valid_tld, normalize_host};
use crate::error::Result;

/// Why the tracker's channel was blocked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    TrackingProtection,
    FingerprintingProtection,
    CryptominingProtection,
    SocialTrackingProtection,
    Unknown,
}

impl BlockReason {
    pub fn label(&self) -> &'static str {
        match self {
            BlockReason::TrackingProtection => "Tracking Protection",
            BlockReason::FingerprintingProtection => "Fingerprinting Protection",
            BlockReason::CryptominingProtection => "Cryptomining Protection",
            BlockReason::SocialTrackingProtection => "Social Tracking Protection",
            BlockReason::Unknown => "unknown",
        }
    }
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for BlockReason {
    type Err = std::convert::Infallible;

    /// Unrecognised reasons map to [`BlockReason::Unknown`]
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let reason = match s.trim().to_lowercase().replace(['-', '_', ' '], "").as_str() {
            "tracking" | "trackingprotection" => BlockReason::TrackingProtection,
            "fingerprinting" | "fingerprintingprotection" => BlockReason::FingerprintingProtection,
            "cryptomining" | "cryptominingprotection" => BlockReason::CryptominingProtection,
            "social" | "socialtracking" | "socialtrackingprotection" => {
                BlockReason::SocialTrackingProtection
            }
            _ => BlockReason::Unknown,
        };
        Ok(reason)
    }
}

/// One row of the tracker table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackerRow {
    pub hostname: String,
    pub blocked: bool,
    pub reason: BlockReason,
}

#[derive(Debug, Clone, Default)]
pub struct TrackerRegistry {
    trackers: IndexMap<String, BlockReason>,
    unblocked: HashSet<String>,
    selected: IndexSet<String>,
}

impl TrackerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a blocked channel for `url`.
    ///
    /// Returns `true` when the host has been unblocked and the channel should
    /// be allowed through.
    pub fn record_blocked_channel(&mut self, url: &str, reason: BlockReason) -> Result<bool> {
        let host = normalize_host(url)?;
        let allow = self.unblocked.contains(&host);
        debug!(action = "record", component = "tracker_registry", host = %host, reason = %reason, allow, "Recorded blocked channel");
        self.trackers.insert(host, reason);
        Ok(allow)
    }

    pub fn len(&self) -> usize {
        self.trackers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trackers.is_empty()
    }

    /// Hostnames in the order they were first seen
    pub fn hostnames(&self) -> Vec<String> {
        self.trackers.keys().cloned().collect()
    }

    pub fn reason(&self, host: &str) -> Option<BlockReason> {
        self.trackers.get(host).copied()
    }

    pub fn is_blocked(&self, host: &str) -> bool {
        !self.unblocked.contains(host)
    }

    pub fn set_blocked<S: AsRef<str>>(&mut self, blocked: bool, hosts: &[S]) {
        for host in hosts {
            let host = host.as_ref();
            if blocked {
                self.unblocked.remove(host);
            } else {
                self.unblocked.insert(host.to_string());
            }
        }
    }

    /// Flip the blocked state of one host, returning the new state
    pub fn toggle(&mut self, host: &str) -> bool {
        let blocked = !self.is_blocked(host);
        self.set_blocked(blocked, &[host]);
        blocked
    }

    pub fn select(&mut self, host: &str) {
        self.selected.insert(host.to_string());
    }

    pub fn deselect(&mut self, host: &str) {
        self.selected.shift_remove(host);
    }

    pub fn select_all(&mut self, checked: bool) {
        self.selected.clear();
        if checked {
            self.selected.extend(self.trackers.keys().cloned());
        }
    }

    pub fn selected(&self) -> &IndexSet<String> {
        &self.selected
    }

    /// Apply `blocked` to every selected host. Returns `false` when nothing
    /// is selected.
    pub fn block_selected(&mut self, blocked: bool) -> bool {
        if self.selected.is_empty() {
            return false;
        }
        let selected: Vec<String> = self.selected.iter().cloned().collect();
        self.set_blocked(blocked, &selected);
        true
    }

    /// Clear the selection and block everything again
    pub fn reset(&mut self) {
        self.selected.clear();
        self.unblocked.clear();
    }

    pub fn rows(&self) -> Vec<TrackerRow> {
        self.trackers
            .iter()
            .map(|(hostname, reason)| TrackerRow {
                hostname: hostname.clone(),
                blocked: self.is_blocked(hostname),
                reason: *reason,
            })
            .collect()
    }

    /// Build a registry from a tracker list.
    ///
    /// One entry per line: a hostname or URL, optionally followed by a block
    /// reason. Blank lines and `#` comments are ignored. Entries without a
    /// usable host or a valid top-level domain are skipped; the second value
    /// is how many were skipped.
    pub fn parse_tracker_list(content: &str) -> (Self, u32) {
        let mut registry = Self::new();
        let mut skipped = 0;

        for (line_num, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut parts = line.split_whitespace();
            let Some(entry) = parts.next() else {
                continue;
            };
            let reason = parts
                .next()
                .and_then(|r| r.parse().ok())
                .unwrap_or(BlockReason::TrackingProtection);

            match normalize_host(entry) {
                Ok(host) if has_valid_tld(&host) => {
                    registry.trackers.insert(host, reason);
                }
                Ok(host) => {
                    warn!(action = "parse", component = "tracker_list", line_number = line_num + 1, host = %host, "Skipping tracker without a valid TLD");
                    skipped += 1;
                }
                Err(e) => {
                    warn!(action = "parse", component = "tracker_list", line_number = line_num + 1, error = %e, "Skipping invalid tracker entry");
                    skipped += 1;
                }
            }
        }

        info!(
            action = "loaded",
            component = "tracker_list",
            tracker_count = registry.len(),
            skipped,
            "Parsed tracker list"
        );
        (registry, skipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_channels_once_per_host() {
        let mut registry = TrackerRegistry::new();
        let allow = registry
            .record_blocked_channel("https://tracking.example.org/a.js", BlockReason::TrackingProtection)
            .unwrap();
        assert!(!allow);
        registry
            .record_blocked_channel("https://tracking.example.org/b.js", BlockReason::FingerprintingProtection)
            .unwrap();

        assert_eq!(registry.hostnames(), vec!["tracking.example.org"]);
        assert_eq!(
            registry.reason("tracking.example.org"),
            Some(BlockReason::FingerprintingProtection)
        );
    }

    #[test]
    fn unblocked_hosts_are_allowed_through() {
        let mut registry = TrackerRegistry::new();
        registry.set_blocked(false, &["social-tracking.example.org"]);

        let allow = registry
            .record_blocked_channel(
                "https://social-tracking.example.org/",
                BlockReason::SocialTrackingProtection,
            )
            .unwrap();
        assert!(allow);
        assert!(!registry.is_blocked("social-tracking.example.org"));
    }

    #[test]
    fn selection_drives_bulk_actions() {
        let (mut registry, _) = TrackerRegistry::parse_tracker_list("a.com\nb.com\nc.com\n");
        assert!(!registry.block_selected(false));

        registry.select("a.com");
        registry.select("c.com");
        assert!(registry.block_selected(false));
        assert!(!registry.is_blocked("a.com"));
        assert!(registry.is_blocked("b.com"));
        assert!(!registry.is_blocked("c.com"));

        registry.deselect("a.com");
        assert!(registry.block_selected(true));
        assert!(!registry.is_blocked("a.com"));
        assert!(registry.is_blocked("c.com"));

        registry.select_all(true);
        assert_eq!(registry.selected().len(), 3);
        registry.select_all(false);
        assert!(registry.selected().is_empty());
    }

    #[test]
    fn toggle_and_reset() {
        let (mut registry, _) = TrackerRegistry::parse_tracker_list("a.com\n");
        assert!(!registry.toggle("a.com"));
        assert!(registry.toggle("a.com"));

        registry.toggle("a.com");
        registry.select("a.com");
        registry.reset();
        assert!(registry.is_blocked("a.com"));
        assert!(registry.selected().is_empty());
    }

    #[test]
    fn rows_reflect_state() {
        let (mut registry, _) =
            TrackerRegistry::parse_tracker_list("a.com fingerprinting\nhttps://b.com/x.js\n");
        registry.set_blocked(false, &["b.com"]);

        assert_eq!(
            registry.rows(),
            vec![
                TrackerRow {
                    hostname: "a.com".to_string(),
                    blocked: true,
                    reason: BlockReason::FingerprintingProtection,
                },
                TrackerRow {
                    hostname: "b.com".to_string(),
                    blocked: false,
                    reason: BlockReason::TrackingProtection,
                },
            ]
        );
    }

    #[test]
    fn tracker_list_skips_bad_entries() {
        let content = "# trackers\n\nads.example.com social\nlocalhost\nfile:///tmp/x\nADS.example.com\n";
        let (registry, skipped) = TrackerRegistry::parse_tracker_list(content);

        assert_eq!(registry.hostnames(), vec!["ads.example.com"]);
        assert_eq!(skipped, 2);
    }

    #[test]
    fn reason_parsing() {
        let parse = |s: &str| s.parse::<BlockReason>().unwrap();
        assert_eq!(parse("social"), BlockReason::SocialTrackingProtection);
        assert_eq!(parse("Cryptomining-Protection"), BlockReason::CryptominingProtection);
        assert_eq!(parse("whatever"), BlockReason::Unknown);
        assert_eq!(BlockReason::TrackingProtection.to_string(), "Tracking Protection");
    }
}
