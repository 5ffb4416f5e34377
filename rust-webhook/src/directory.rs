//! Site directory lookup.
//!
//! Resolves a site identifier to the domain its output is published under.
//! The default implementation reads `site.env` files from a sites root:
//!
//! ```text
//! /sites/<dir>/site.env
//!     SITE_NAME=blog
//!     SITE_DOMAIN=blog.example.com
//! ```
//!
//! Every lookup rescans all sites, which is O(number of sites). That is fine
//! for a handful of sites; a cache keyed by site would be the next step if
//! the directory grows.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tracing::{error, warn};

use crate::error::WebhookError;
use crate::site::{is_safe_domain, SiteId};

/// Resolves site identifiers to publish domains.
#[async_trait]
pub trait SiteDirectory: Send + Sync {
    /// Return the publish domain for `site`.
    ///
    /// Fails with `SiteUnresolvable`/`DomainUnresolvable` when the site is
    /// unknown, or `Infrastructure` when the lookup itself broke.
    async fn resolve(&self, site: &SiteId) -> Result<String, WebhookError>;
}

/// Directory backed by `<root>/*/site.env` files.
#[derive(Debug, Clone)]
pub struct EnvFileDirectory {
    root: PathBuf,
}

impl EnvFileDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Scan every `site.env` for one naming `site`.
    async fn find_domain(&self, site: &SiteId) -> Result<Option<String>, WebhookError> {
        let mut entries = fs::read_dir(&self.root).await.map_err(|e| {
            error!(root = %self.root.display(), error = %e, "site_directory_scan_failed");
            WebhookError::Infrastructure("Error finding site domain".to_string())
        })?;

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "site_directory_entry_unreadable");
                    continue;
                }
            };

            let env_path = entry.path().join("site.env");
            let content = match fs::read_to_string(&env_path).await {
                Ok(content) => content,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    warn!(path = %env_path.display(), error = %e, "site_env_unreadable");
                    continue;
                }
            };

            if env_value(&content, "SITE_NAME") == Some(site.as_str()) {
                if let Some(domain) = env_value(&content, "SITE_DOMAIN") {
                    return Ok(Some(domain.to_string()));
                }
            }
        }

        Ok(None)
    }
}

#[async_trait]
impl SiteDirectory for EnvFileDirectory {
    async fn resolve(&self, site: &SiteId) -> Result<String, WebhookError> {
        let site_dir = self.root.join(site.as_str());
        if !fs::try_exists(&site_dir).await.unwrap_or(false) {
            warn!(site = %site, "site_not_found");
            return Err(WebhookError::SiteUnresolvable {
                site: site.to_string(),
            });
        }

        match self.find_domain(site).await? {
            Some(domain) if is_safe_domain(&domain) => Ok(domain),
            Some(domain) => {
                warn!(site = %site, domain = %domain, "site_domain_rejected");
                Err(WebhookError::DomainUnresolvable { site: site.clone() })
            }
            None => {
                warn!(site = %site, "site_domain_not_found");
                Err(WebhookError::DomainUnresolvable { site: site.clone() })
            }
        }
    }
}

/// Read `KEY=value` from env-file content. Surrounding quotes are stripped.
fn env_value<'a>(content: &'a str, key: &str) -> Option<&'a str> {
    content.lines().find_map(|line| {
        let (k, v) = line.trim().split_once('=')?;
        if k.trim() != key {
            return None;
        }
        let v = v.trim().trim_matches(|c| c == '"' || c == '\'');
        (!v.is_empty()).then_some(v)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_site(root: &std::path::Path, dir: &str, env: &str) {
        let path = root.join(dir);
        std::fs::create_dir_all(&path).unwrap();
        std::fs::write(path.join("site.env"), env).unwrap();
    }

    fn site(name: &str) -> SiteId {
        SiteId::parse(name).unwrap()
    }

    #[test]
    fn test_env_value() {
        let content = "# comment\nSITE_NAME=blog\nSITE_DOMAIN=\"blog.example.com\"\n";
        assert_eq!(env_value(content, "SITE_NAME"), Some("blog"));
        assert_eq!(env_value(content, "SITE_DOMAIN"), Some("blog.example.com"));
        assert_eq!(env_value(content, "MISSING"), None);
        assert_eq!(env_value("SITE_NAME=\n", "SITE_NAME"), None);
    }

    #[tokio::test]
    async fn test_resolve_found() {
        let root = tempfile::tempdir().unwrap();
        write_site(root.path(), "blog", "SITE_NAME=blog\nSITE_DOMAIN=blog.example.com\n");

        let directory = EnvFileDirectory::new(root.path());
        assert_eq!(directory.resolve(&site("blog")).await.unwrap(), "blog.example.com");
    }

    #[tokio::test]
    async fn test_resolve_domain_from_other_directory() {
        // The site directory must exist, but the matching site.env may live elsewhere.
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("shop")).unwrap();
        write_site(root.path(), "shop-config", "SITE_NAME=shop\nSITE_DOMAIN=shop.example.com\n");

        let directory = EnvFileDirectory::new(root.path());
        assert_eq!(directory.resolve(&site("shop")).await.unwrap(), "shop.example.com");
    }

    #[tokio::test]
    async fn test_resolve_missing_site() {
        let root = tempfile::tempdir().unwrap();
        let directory = EnvFileDirectory::new(root.path());

        let err = directory.resolve(&site("ghost")).await.unwrap_err();
        assert!(matches!(err, WebhookError::SiteUnresolvable { .. }));
    }

    #[tokio::test]
    async fn test_resolve_missing_domain() {
        let root = tempfile::tempdir().unwrap();
        write_site(root.path(), "blog", "SITE_NAME=blog\n");

        let directory = EnvFileDirectory::new(root.path());
        let err = directory.resolve(&site("blog")).await.unwrap_err();
        assert!(matches!(err, WebhookError::DomainUnresolvable { .. }));
    }

    #[tokio::test]
    async fn test_resolve_rejects_path_like_domain() {
        let root = tempfile::tempdir().unwrap();
        write_site(root.path(), "blog", "SITE_NAME=blog\nSITE_DOMAIN=../../etc\n");

        let directory = EnvFileDirectory::new(root.path());
        let err = directory.resolve(&site("blog")).await.unwrap_err();
        assert!(matches!(err, WebhookError::DomainUnresolvable { .. }));
    }
}
