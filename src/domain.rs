use indexmap::{IndexMap, IndexSet};
use regex::Regex;
use url::Url;

use crate::error::{DebuggerError, Result};
use crate::suffix::SuffixList;

/// Maps a tracker host to the registrable domain it is grouped under
pub trait BaseDomain: Send + Sync {
    fn base_domain(&self, host: &str) -> String;
}

impl<F> BaseDomain for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn base_domain(&self, host: &str) -> String {
        self(host)
    }
}

/// Default resolver: override patterns first, then the public suffix list
#[derive(Debug, Clone)]
pub struct DomainResolver {
    suffixes: SuffixList,
    patterns: Vec<Regex>,
}

impl DomainResolver {
    pub fn new(suffixes: SuffixList, patterns: Vec<Regex>) -> Self {
        Self { suffixes, patterns }
    }

    pub fn suffixes(&self) -> &SuffixList {
        &self.suffixes
    }
}

impl Default for DomainResolver {
    fn default() -> Self {
        Self::new(SuffixList::embedded(), Vec::new())
    }
}

impl BaseDomain for DomainResolver {
    fn base_domain(&self, host: &str) -> String {
        let host = host.trim().trim_end_matches('.').to_lowercase();

        for pattern in &self.patterns {
            if let Some(captures) = pattern.captures(&host) {
                if let Some(matched) = captures.get(1) {
                    return matched.as_str().to_string();
                }
            }
        }

        self.suffixes.base_domain(&host)
    }
}

pub fn has_valid_tld(domain: &str) -> bool {
    if domain.is_empty() || domain.len() < 3 || !domain.contains('.') {
        return false;
    }

    if let Some(last_dot) = domain.rfind('.') {
        if last_dot == domain.len() - 1 {
            return false;
        }
        let tld = &domain[last_dot + 1..];
        // Punycode TLDs (xn--...) are allowed alongside plain ASCII letters
        tld.len() >= 2
            && (tld.chars().all(|c| c.is_ascii_lowercase())
                || (tld.starts_with("xn--")
                    && tld
                        .chars()
                        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')))
    } else {
        false
    }
}

/// Extract the lowercase host from a bare hostname or a URL
pub fn normalize_host(input: &str) -> Result<String> {
    let input = input.trim();
    if input.is_empty() {
        return Err(DebuggerError::InvalidHost(input.to_string()));
    }

    let parsed = if input.contains("://") {
        Url::parse(input)
    } else {
        Url::parse(&format!("http://{}", input))
    };

    let host = parsed
        .ok()
        .and_then(|url| url.host_str().map(|h| h.trim_end_matches('.').to_string()))
        .filter(|h| !h.is_empty())
        .ok_or_else(|| DebuggerError::InvalidHost(input.to_string()))?;

    Ok(host.trim_start_matches('[').trim_end_matches(']').to_string())
}

/// Trackers sharing one registrable domain, blocked and unblocked as a unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainGroup {
    pub domain: String,
    pub hosts: Vec<String>,
}

/// Partition trackers by registrable domain.
///
/// Groups come out in the order their domain is first seen; hosts keep their
/// input order with duplicates dropped.
pub fn group_by_domain(trackers: &[String], resolver: &dyn BaseDomain) -> Vec<DomainGroup> {
    let mut groups: IndexMap<String, IndexSet<String>> = IndexMap::new();

    for tracker in trackers {
        let domain = resolver.base_domain(tracker);
        groups.entry(domain).or_default().insert(tracker.clone());
    }

    groups
        .into_iter()
        .map(|(domain, hosts)| DomainGroup {
            domain,
            hosts: hosts.into_iter().collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hosts(list: &[&str]) -> Vec<String> {
        list.iter().map(|h| h.to_string()).collect()
    }

    #[test]
    fn groups_in_discovery_order() {
        let resolver = DomainResolver::default();
        let trackers = hosts(&[
            "ads.b.com",
            "pixel.a.co.uk",
            "cdn.b.com",
            "a.co.uk",
            "ads.b.com",
        ]);

        let groups = group_by_domain(&trackers, &resolver);
        assert_eq!(
            groups,
            vec![
                DomainGroup {
                    domain: "b.com".to_string(),
                    hosts: hosts(&["ads.b.com", "cdn.b.com"]),
                },
                DomainGroup {
                    domain: "a.co.uk".to_string(),
                    hosts: hosts(&["pixel.a.co.uk", "a.co.uk"]),
                },
            ]
        );
    }

    #[test]
    fn every_tracker_lands_in_exactly_one_group() {
        let resolver = DomainResolver::default();
        let trackers = hosts(&[
            "x.sub.example.com",
            "example.com",
            "t.example.org",
            "10.0.0.1",
            "s.project.github.io",
            "other.github.io",
        ]);

        let groups = group_by_domain(&trackers, &resolver);
        let total: usize = groups.iter().map(|g| g.hosts.len()).sum();
        assert_eq!(total, trackers.len());

        for group in &groups {
            for host in &group.hosts {
                assert_eq!(resolver.base_domain(host), group.domain);
            }
        }
        for tracker in &trackers {
            let count = groups.iter().filter(|g| g.hosts.contains(tracker)).count();
            assert_eq!(count, 1, "{tracker} should be in one group");
        }
    }

    #[test]
    fn patterns_override_suffix_list() {
        let pattern = Regex::new(r"^.+\.(cloudfront\.net)$").unwrap();
        let resolver = DomainResolver::new(SuffixList::embedded(), vec![pattern]);

        assert_eq!(resolver.base_domain("d1.cloudfront.net"), "cloudfront.net");
        assert_eq!(resolver.base_domain("ads.example.com"), "example.com");
        assert_eq!(
            DomainResolver::default().base_domain("d1.cloudfront.net"),
            "d1.cloudfront.net"
        );
    }

    #[test]
    fn closures_are_resolvers() {
        let first_label = |host: &str| host.split('.').next().unwrap_or_default().to_string();
        let groups = group_by_domain(&hosts(&["a.x", "a.y", "b.x"]), &first_label);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].hosts, hosts(&["a.x", "a.y"]));
    }

    #[test]
    fn normalize_host_accepts_urls_and_hosts() {
        assert_eq!(
            normalize_host("https://Tracking.Example.org/pixel.gif?x=1").unwrap(),
            "tracking.example.org"
        );
        assert_eq!(normalize_host("  ads.example.com ").unwrap(), "ads.example.com");
        assert_eq!(normalize_host("cdn.example.com:8443").unwrap(), "cdn.example.com");
        assert_eq!(normalize_host("http://[::1]/").unwrap(), "::1");
        assert!(normalize_host("").is_err());
        assert!(normalize_host("file:///etc/hosts").is_err());
    }

    #[test]
    fn valid_tld_check() {
        assert!(has_valid_tld("example.com"));
        assert!(has_valid_tld("example.xn--p1ai"));
        assert!(!has_valid_tld("localhost"));
        assert!(!has_valid_tld("example."));
        assert!(!has_valid_tld("10.0.0.1"));
    }
}
