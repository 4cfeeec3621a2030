//! Public Suffix List (PSL) utilities for registrable-domain extraction
//!
//! This module answers "what is the eTLD+1 of this host" with LRU caching.
//! A real list can be installed at runtime with [`init_psl`]; until then a
//! fallback heuristic (the implicit `*` rule plus a handful of common
//! two-label registries) is used.
//!
//! # Examples
//!
//! ```
//! use fps_core::psl::get_registrable_domain;
//!
//! let domain = get_registrable_domain("sub.example.test").unwrap();
//! assert_eq!(domain.as_str(), "example.test");
//! assert_eq!(domain.suffix(), "test");
//! assert_eq!(domain.label(), "example");
//! ```

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::net::IpAddr;
use std::sync::{PoisonError, RwLock};

use publicsuffix::{List, Psl};

// =============================================================================
// Registrable Domain
// =============================================================================

/// A registrable domain (eTLD+1) together with the length of its public suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistrableDomain {
    domain: String,
    suffix_len: usize,
}

impl RegistrableDomain {
    fn new(domain: String, suffix_len: usize) -> Self {
        debug_assert!(suffix_len < domain.len());
        Self { domain, suffix_len }
    }

    /// The full registrable domain, e.g. `example.co.uk`.
    pub fn as_str(&self) -> &str {
        &self.domain
    }

    /// The public suffix part, e.g. `co.uk`.
    pub fn suffix(&self) -> &str {
        &self.domain[self.domain.len() - self.suffix_len..]
    }

    /// The registrable label with the suffix (and its dot) removed, e.g. `example`.
    pub fn label(&self) -> &str {
        &self.domain[..self.domain.len() - self.suffix_len - 1]
    }
}

// =============================================================================
// LRU Cache
// =============================================================================

/// Simple fixed-size cache for registrable-domain lookups.
/// Uses a basic LRU strategy with a hashmap + deque.
pub struct LruCache {
    capacity: usize,
    entries: HashMap<String, Option<RegistrableDomain>>,
    order: VecDeque<String>,
}

impl LruCache {
    /// Create a new LRU cache with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    /// Get a value from the cache. The outer `Option` is the cache hit.
    pub fn get(&mut self, key: &str) -> Option<Option<RegistrableDomain>> {
        if self.entries.contains_key(key) {
            // Move to back (most recently used)
            self.order.retain(|k| k != key);
            self.order.push_back(key.to_string());
            self.entries.get(key).cloned()
        } else {
            None
        }
    }

    /// Insert a value into the cache.
    pub fn insert(&mut self, key: String, value: Option<RegistrableDomain>) {
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            // Evict oldest
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self.order.retain(|k| k != &key);
        self.order.push_back(key.clone());
        self.entries.insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clear the cache.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

// =============================================================================
// PSL Rules
// =============================================================================

/// Error type for PSL loading.
#[derive(Debug, thiserror::Error)]
pub enum PslError {
    #[error("Invalid public suffix list: {0}")]
    InvalidList(String),
    #[error("Public suffix list contains no rules")]
    Empty,
}

/// Parsed public suffix rules.
pub struct PslRules {
    list: List,
}

impl PslRules {
    /// Parse rules from the standard `public_suffix_list.dat` text format.
    pub fn parse(text: &str) -> Result<Self, PslError> {
        let has_rules = text.lines().map(str::trim).any(|line| !line.is_empty() && !line.starts_with("//"));
        if !has_rules {
            return Err(PslError::Empty);
        }

        let list: List = text
            .parse()
            .map_err(|e: publicsuffix::Error| PslError::InvalidList(e.to_string()))?;
        Ok(Self { list })
    }

    /// Look up the registrable domain of an already normalized host.
    pub fn registrable_domain(&self, host: &str) -> Option<RegistrableDomain> {
        if !is_valid_host(host) {
            return None;
        }

        let domain = self.list.domain(host.as_bytes())?;
        let suffix_len = domain.suffix().as_bytes().len();
        let domain = std::str::from_utf8(domain.as_bytes()).ok()?.to_string();
        if suffix_len >= domain.len() {
            return None;
        }
        Some(RegistrableDomain::new(domain, suffix_len))
    }
}

impl fmt::Debug for PslRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PslRules").finish_non_exhaustive()
    }
}

// =============================================================================
// Global PSL State
// =============================================================================

static PSL_RULES: RwLock<Option<PslRules>> = RwLock::new(None);

static REGISTRABLE_CACHE: RwLock<Option<LruCache>> = RwLock::new(None);

const CACHE_CAPACITY: usize = 4096;

/// Install a parsed list as the process-wide PSL.
pub fn init_psl(rules: PslRules) {
    *PSL_RULES.write().unwrap_or_else(PoisonError::into_inner) = Some(rules);
    *REGISTRABLE_CACHE.write().unwrap_or_else(PoisonError::into_inner) = Some(LruCache::new(CACHE_CAPACITY));
    log::info!("installed public suffix list");
}

/// Check if PSL is initialized.
pub fn is_psl_initialized() -> bool {
    PSL_RULES.read().unwrap_or_else(PoisonError::into_inner).is_some()
}

// =============================================================================
// Registrable Domain Extraction
// =============================================================================

/// Common two-part registries for the fallback heuristic.
const COMMON_TWO_PART_TLDS: &[&str] = &[
    "co.uk", "co.jp", "co.nz", "co.za", "co.in", "co.kr",
    "com.au", "com.br", "com.cn", "com.mx", "com.tw", "com.hk",
    "net.au", "net.nz",
    "org.uk", "org.au",
    "gov.uk", "gov.au",
    "ac.uk", "ac.jp",
    "ne.jp", "or.jp",
];

/// Get the registrable domain (eTLD+1) for a hostname.
///
/// Returns `None` for IP literals, hosts with empty labels (including trailing
/// dots), and hosts that are themselves a public suffix.
pub fn get_registrable_domain(host: &str) -> Option<RegistrableDomain> {
    let host = host.to_ascii_lowercase();

    // Check cache
    if let Some(ref mut cache) = *REGISTRABLE_CACHE.write().unwrap_or_else(PoisonError::into_inner) {
        if let Some(cached) = cache.get(&host) {
            return cached;
        }
    }

    let result = compute_registrable_domain(&host);

    // Store in cache
    if let Some(ref mut cache) = *REGISTRABLE_CACHE.write().unwrap_or_else(PoisonError::into_inner) {
        cache.insert(host, result.clone());
    }

    result
}

/// Compute the registrable domain without caching.
fn compute_registrable_domain(host: &str) -> Option<RegistrableDomain> {
    if let Some(ref rules) = *PSL_RULES.read().unwrap_or_else(PoisonError::into_inner) {
        return rules.registrable_domain(host);
    }

    if !is_valid_host(host) {
        return None;
    }
    let labels: Vec<&str> = host.split('.').collect();
    fallback_registrable_domain(&labels)
}

/// Fallback heuristic: implicit `*` rule plus common two-label registries.
fn fallback_registrable_domain(labels: &[&str]) -> Option<RegistrableDomain> {
    let n = labels.len();
    if n < 2 {
        return None;
    }

    let last_two = format!("{}.{}", labels[n - 2], labels[n - 1]);
    let suffix_labels = if COMMON_TWO_PART_TLDS.contains(&last_two.as_str()) { 2 } else { 1 };
    if n <= suffix_labels {
        return None;
    }

    let suffix_len = labels[n - suffix_labels..].iter().map(|l| l.len()).sum::<usize>() + suffix_labels - 1;
    Some(RegistrableDomain::new(labels[n - suffix_labels - 1..].join("."), suffix_len))
}

fn is_valid_host(host: &str) -> bool {
    if host.is_empty() || host.starts_with('[') || host.parse::<IpAddr>().is_ok() {
        return false;
    }
    host.split('.').all(|label| !label.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fallback(host: &str) -> Option<String> {
        let labels: Vec<&str> = host.split('.').collect();
        fallback_registrable_domain(&labels).map(|d| d.as_str().to_string())
    }

    #[test]
    fn test_fallback_simple() {
        assert_eq!(fallback("example.com").as_deref(), Some("example.com"));
        assert_eq!(fallback("sub.example.com").as_deref(), Some("example.com"));
        assert_eq!(fallback("com"), None);
    }

    #[test]
    fn test_fallback_two_part() {
        assert_eq!(fallback("sub.example.co.uk").as_deref(), Some("example.co.uk"));
        assert_eq!(fallback("example.co.uk").as_deref(), Some("example.co.uk"));
        assert_eq!(fallback("co.uk"), None);
    }

    #[test]
    fn test_registrable_parts() {
        let labels = ["www", "member1", "co", "uk"];
        let domain = fallback_registrable_domain(&labels).unwrap();
        assert_eq!(domain.suffix(), "co.uk");
        assert_eq!(domain.label(), "member1");
    }

    #[test]
    fn test_rejects_malformed_hosts() {
        assert!(!is_valid_host("example.test."));
        assert!(!is_valid_host("example..test"));
        assert!(!is_valid_host("127.0.0.1"));
        assert!(!is_valid_host("[::1]"));
        assert!(is_valid_host("example.test"));
    }

    #[test]
    fn test_rules_from_list_text() {
        let rules = PslRules::parse(
            "// ===BEGIN ICANN DOMAINS===\ncom\nuk\nco.uk\n*.ck\n!www.ck\n// ===END ICANN DOMAINS===\n",
        )
        .unwrap();

        let domain = rules.registrable_domain("a.b.example.co.uk").unwrap();
        assert_eq!(domain.as_str(), "example.co.uk");
        assert_eq!(domain.label(), "example");

        assert_eq!(rules.registrable_domain("foo.bar.ck").unwrap().as_str(), "foo.bar.ck");
        assert_eq!(rules.registrable_domain("www.ck").unwrap().as_str(), "www.ck");
        assert!(rules.registrable_domain("co.uk").is_none());
    }

    #[test]
    fn test_empty_list_is_rejected() {
        assert!(matches!(PslRules::parse("// only a comment\n"), Err(PslError::Empty)));
    }

    #[test]
    fn test_lru_cache_evicts_oldest() {
        let mut cache = LruCache::new(2);
        cache.insert("a".into(), None);
        cache.insert("b".into(), None);
        assert!(cache.get("a").is_some());
        cache.insert("c".into(), None);
        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
        assert_eq!(cache.len(), 2);
    }
}
