//! Sitegen webhook - signed rebuild notifications for static sites.
//!
//! ## Architecture
//!
//! ```text
//! POST /notify/:site → signature check → site directory → coordinator → job runner
//! ```
//!
//! The coordinator runs at most one build per site and folds notifications
//! that arrive mid-build into a single follow-up build.

pub mod config;
pub mod coordinator;
pub mod directory;
pub mod error;
pub mod runner;
pub mod site;
pub mod web;

// Re-export commonly used types
pub use config::{Config, ConfigError};
pub use coordinator::{Decision, GenerationCoordinator, GenerationStatus};
pub use directory::{EnvFileDirectory, SiteDirectory};
pub use error::{JobError, WebhookError};
pub use runner::{BuildReport, DockerJobRunner, JobRunner};
pub use site::SiteId;
pub use web::AppState;
