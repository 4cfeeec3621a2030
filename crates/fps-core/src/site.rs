//! Site canonicalization
//!
//! A [`Site`] is the `https` scheme plus the registrable domain of an origin.
//! Every site in a First-Party Set goes through [`Site::canonicalize`], which
//! is the only way to construct one.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::{Host, Url};

use crate::psl::{get_registrable_domain, RegistrableDomain};

const HTTPS_SCHEME: &str = "https";
const HTTPS_PREFIX: &str = "https://";

/// Error type for origin canonicalization.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CanonicalizeError {
    #[error("Opaque or unparsable origin")]
    OpaqueOrigin,
    #[error("Unsupported scheme: {0}")]
    NonHttpsScheme(String),
    #[error("No registrable domain for host: {0}")]
    NoRegistrableDomain(String),
}

/// Canonical https registrable-domain identifier for a web origin.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Site(String);

impl Site {
    /// Canonicalize an origin string into a site.
    ///
    /// `emit_errors` only controls whether a rejection is logged.
    pub fn canonicalize(origin: &str, emit_errors: bool) -> Result<Self, CanonicalizeError> {
        let result = canonicalize_origin(origin);
        if emit_errors {
            if let Err(ref e) = result {
                log::warn!("rejected origin {origin:?}: {e}");
            }
        }
        result
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The registrable domain, without the scheme.
    pub fn host(&self) -> &str {
        &self.0[HTTPS_PREFIX.len()..]
    }

    /// The registrable label with the public suffix removed.
    ///
    /// Two sites that differ only in their top-level domain have equal labels,
    /// which is what makes one a valid ccTLD alias of the other.
    pub fn registrable_label(&self) -> Option<String> {
        get_registrable_domain(self.host()).map(|domain| domain.label().to_string())
    }
}

fn canonicalize_origin(origin: &str) -> Result<Site, CanonicalizeError> {
    let url = Url::parse(origin.trim()).map_err(|_| CanonicalizeError::OpaqueOrigin)?;
    if !url.origin().is_tuple() {
        return Err(CanonicalizeError::OpaqueOrigin);
    }

    if url.scheme() != HTTPS_SCHEME {
        return Err(CanonicalizeError::NonHttpsScheme(url.scheme().to_string()));
    }

    let host = match url.host() {
        Some(Host::Domain(domain)) => domain,
        Some(other) => return Err(CanonicalizeError::NoRegistrableDomain(other.to_string())),
        None => return Err(CanonicalizeError::OpaqueOrigin),
    };

    let domain: RegistrableDomain = get_registrable_domain(host)
        .ok_or_else(|| CanonicalizeError::NoRegistrableDomain(host.to_string()))?;

    Ok(Site(format!("{HTTPS_PREFIX}{}", domain.as_str())))
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Site {
    type Error = CanonicalizeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Site::canonicalize(&value, false)
    }
}

impl TryFrom<&str> for Site {
    type Error = CanonicalizeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Site::canonicalize(value, false)
    }
}

impl From<Site> for String {
    fn from(site: Site) -> Self {
        site.0
    }
}
