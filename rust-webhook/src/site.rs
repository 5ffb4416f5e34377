//! Site identifiers.
//!
//! A [`SiteId`] is the coordination key for one rebuildable site. It ends up
//! in filesystem paths and in the generator's source URL, so only a
//! conservative character set is accepted.

use std::fmt;

/// Maximum accepted identifier length.
const MAX_SITE_ID_LEN: usize = 128;

/// Validated, opaque site identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SiteId(String);

impl SiteId {
    /// Parse a raw identifier, returning `None` if it is not a safe key.
    pub fn parse(raw: &str) -> Option<Self> {
        let valid = !raw.is_empty()
            && raw.len() <= MAX_SITE_ID_LEN
            && raw != "."
            && raw != ".."
            && raw
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.'));

        valid.then(|| SiteId(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SiteId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Check that a resolved domain is usable as a single path component.
pub fn is_safe_domain(domain: &str) -> bool {
    !domain.is_empty()
        && domain != "."
        && !domain.contains("..")
        && !domain.contains(['/', '\\'])
        && !domain.chars().any(char::is_whitespace)
}
