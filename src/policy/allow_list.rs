//! The destination allow-list.

use std::collections::HashSet;

use crate::policy::host::normalize_host;

/// Immutable set of permitted domains.
///
/// Each entry covers itself and every subdomain beneath it. An empty list
/// denies everything.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    domains: HashSet<String>,
}

impl AllowList {
    /// Build an allow-list from configured domain strings.
    ///
    /// Entries are normalized the same way request hosts are, so duplicates
    /// differing only in case or port collapse into one. Entries that do not
    /// normalize are dropped with a warning; config validation rejects them
    /// before this point in normal startup.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut domains = HashSet::new();
        for entry in entries {
            match normalize_host(entry.as_ref()) {
                Some(domain) => {
                    domains.insert(domain);
                }
                None => {
                    tracing::warn!(entry = %entry.as_ref(), "Ignoring malformed allow-list entry");
                }
            }
        }
        Self { domains }
    }

    /// Returns true if `hostname` is an entry or a strict subdomain of one.
    pub fn is_allowed(&self, hostname: &str) -> bool {
        match normalize_host(hostname) {
            Some(host) => self.matches_normalized(&host),
            None => false,
        }
    }

    /// Match an already-normalized host.
    ///
    /// Walks the host's suffixes at label boundaries: `a.b.c` probes `a.b.c`,
    /// `b.c`, then `c`. A suffix is only ever taken right after a `.`, which
    /// is what keeps `evilgoogle.com` from matching `google.com`.
    pub(crate) fn matches_normalized(&self, host: &str) -> bool {
        if self.domains.is_empty() || host.is_empty() {
            return false;
        }

        let mut candidate = host;
        loop {
            if self.domains.contains(candidate) {
                return true;
            }
            match candidate.split_once('.') {
                Some((_, parent)) => candidate = parent,
                None => return false,
            }
        }
    }

    /// Number of distinct entries.
    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    /// Entries in sorted order, for logging.
    pub fn domains(&self) -> Vec<&str> {
        let mut domains: Vec<&str> = self.domains.iter().map(String::as_str).collect();
        domains.sort_unstable();
        domains
    }
}
