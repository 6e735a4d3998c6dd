use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Rows per page in the scan history listing
pub const HISTORY_PAGE_SIZE: usize = 10;

/// A URL the signed-in user has submitted for scanning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannedUrl {
    pub url_id: String,
    pub url: String,
    #[serde(default)]
    pub created_at: String,
}

/// The individual analyses the remote service runs for a URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanKind {
    Ssl,
    Dns,
    Http,
    Vuln,
}

impl ScanKind {
    pub const ALL: [ScanKind; 4] = [ScanKind::Ssl, ScanKind::Dns, ScanKind::Http, ScanKind::Vuln];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScanKind::Ssl => "ssl",
            ScanKind::Dns => "dns",
            ScanKind::Http => "http",
            ScanKind::Vuln => "vuln",
        }
    }

    /// API path of this result for a scanned URL
    pub fn result_path(&self, url_id: &str) -> String {
        format!("/v1/urlscan/{}-result/{}", self.as_str(), url_id)
    }
}

impl fmt::Display for ScanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ScanKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown scan kind '{}' (expected ssl, dns, http or vuln)", s))
    }
}

/// Searchable, paginated view over the scan history
#[derive(Debug, Clone)]
pub struct UrlHistory {
    entries: Vec<ScannedUrl>,
}

impl UrlHistory {
    pub fn new(entries: Vec<ScannedUrl>) -> Self {
        Self { entries }
    }

    /// Keep entries whose URL contains `term`, ignoring case
    pub fn filter(&self, term: &str) -> Vec<&ScannedUrl> {
        let needle = term.to_lowercase();
        self.entries
            .iter()
            .filter(|e| needle.is_empty() || e.url.to_lowercase().contains(&needle))
            .collect()
    }

    pub fn page_count(matches: usize) -> usize {
        matches.div_ceil(HISTORY_PAGE_SIZE)
    }

    /// Requested one-based page, or page 1 when it is out of range
    pub fn clamp_page(page: usize, matches: usize) -> usize {
        if page == 0 || page > Self::page_count(matches) {
            1
        } else {
            page
        }
    }

    /// One-based page of the filtered entries; out-of-range pages are empty
    pub fn page<'a>(matches: &[&'a ScannedUrl], page: usize) -> Vec<&'a ScannedUrl> {
        if page == 0 {
            return Vec::new();
        }
        matches
            .iter()
            .skip((page - 1) * HISTORY_PAGE_SIZE)
            .take(HISTORY_PAGE_SIZE)
            .copied()
            .collect()
    }
}
