//! Configuration module for environment variable parsing.
//!
//! Everything except the signing secret has a default matching the original
//! container layout (`/sites`, `/output`, `static-generator`).

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;
use tracing::warn;

/// Errors that prevent the process from starting.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("WEBHOOK_SECRET must be set to a non-empty value")]
    MissingSecret,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// Shared secret used to sign notifications
    pub webhook_secret: String,

    /// Maximum age in seconds for signature timestamps (None disables the check)
    pub signature_max_age: Option<u64>,

    // =========================================================================
    // Site Directory
    // =========================================================================

    /// Root directory holding one subdirectory (with a site.env) per site
    pub sites_dir: PathBuf,

    // =========================================================================
    // Job Runner
    // =========================================================================

    /// Root directory for generated output; each domain gets a subdirectory
    pub output_dir: PathBuf,

    /// Docker CLI binary
    pub docker_bin: String,

    /// Container the static generator runs in
    pub generator_container: String,

    /// Generator executable inside the container
    pub generator_bin: String,

    /// Host prefix for the source site (`<prefix><site>`)
    pub source_host_prefix: String,

    /// Port the source site listens on
    pub source_port: u16,

    /// Optional publish step run after a successful build
    pub post_build_command: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Fails when `WEBHOOK_SECRET` is missing or blank.
    pub fn from_env() -> Result<Self, ConfigError> {
        let webhook_secret = env::var("WEBHOOK_SECRET")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::MissingSecret)?;

        Ok(Config {
            port: parse_or("PORT", 9000),

            webhook_secret,

            signature_max_age: parse_optional("SIGNATURE_MAX_AGE"),

            sites_dir: env::var("SITES_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/sites")),

            output_dir: env::var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/output")),

            docker_bin: env::var("DOCKER_BIN").unwrap_or_else(|_| "docker".to_string()),

            generator_container: env::var("GENERATOR_CONTAINER")
                .unwrap_or_else(|_| "static-generator".to_string()),

            generator_bin: env::var("GENERATOR_BIN").unwrap_or_else(|_| "gssg".to_string()),

            source_host_prefix: env::var("SOURCE_HOST_PREFIX")
                .unwrap_or_else(|_| "ghost_".to_string()),

            source_port: parse_or("SOURCE_PORT", 2368),

            post_build_command: env::var("POST_BUILD_COMMAND")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        })
    }
}

/// Parse a variable, falling back to `default` when unset or invalid.
fn parse_or<T: FromStr + Copy>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(env_var = name, value = %raw, "Invalid value, using default");
            default
        }),
        Err(_) => default,
    }
}

/// Parse an optional variable; invalid values are treated as unset.
fn parse_optional<T: FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid value, ignoring");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_or_valid() {
        env::set_var("TEST_SITEGEN_PORT", "8123");
        assert_eq!(parse_or("TEST_SITEGEN_PORT", 1u16), 8123);
        env::remove_var("TEST_SITEGEN_PORT");
    }

    #[test]
    fn test_parse_or_invalid_uses_default() {
        env::set_var("TEST_SITEGEN_BAD_PORT", "not-a-port");
        assert_eq!(parse_or("TEST_SITEGEN_BAD_PORT", 9000u16), 9000);
        env::remove_var("TEST_SITEGEN_BAD_PORT");
    }

    #[test]
    fn test_parse_optional() {
        assert_eq!(parse_optional::<u64>("TEST_SITEGEN_UNSET"), None);
        env::set_var("TEST_SITEGEN_MAX_AGE", "300");
        assert_eq!(parse_optional::<u64>("TEST_SITEGEN_MAX_AGE"), Some(300));
        env::remove_var("TEST_SITEGEN_MAX_AGE");
    }

    // The only test touching WEBHOOK_SECRET, so no other test races on it.
    #[test]
    fn test_from_env_secret_required() {
        env::remove_var("WEBHOOK_SECRET");
        assert!(matches!(Config::from_env(), Err(ConfigError::MissingSecret)));

        env::set_var("WEBHOOK_SECRET", "   ");
        assert!(matches!(Config::from_env(), Err(ConfigError::MissingSecret)));

        env::set_var("WEBHOOK_SECRET", "s3cret");
        let config = Config::from_env().unwrap();
        assert_eq!(config.webhook_secret, "s3cret");
        env::remove_var("WEBHOOK_SECRET");
    }
}
