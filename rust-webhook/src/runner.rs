//! Build job execution.
//!
//! A [`JobRunner`] performs the slow rebuild for one site. The coordinator
//! guarantees it is never invoked twice concurrently for the same site; it
//! knows nothing about how the build actually happens.
//!
//! [`DockerJobRunner`] runs the static generator inside a container:
//!
//! ```text
//! docker exec static-generator gssg --url http://ghost_<site>:2368 --dest /output/<domain>
//! ```
//!
//! followed by an optional post-build command (e.g. a publish script).

use std::path::PathBuf;
use std::process::Output;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{JobError, WebhookError};
use crate::site::SiteId;

/// Outcome of a successful build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Post-build steps that failed. These never turn the build into a failure.
    pub auxiliary_failures: Vec<JobError>,
}

/// Performs the actual build/publish work for a site.
#[async_trait]
pub trait JobRunner: Send + Sync + 'static {
    /// Prepare anything the build needs before the request is accepted.
    ///
    /// Errors here are reported to the caller as infrastructure failures and
    /// no job is scheduled.
    async fn prepare(&self, _site: &SiteId, _domain: &str) -> Result<(), WebhookError> {
        Ok(())
    }

    /// Run one build to completion.
    async fn run(&self, site: &SiteId, domain: &str) -> Result<BuildReport, JobError>;
}

/// Runs the static generator through `docker exec`.
#[derive(Debug, Clone)]
pub struct DockerJobRunner {
    docker_bin: String,
    container: String,
    generator_bin: String,
    source_host_prefix: String,
    source_port: u16,
    output_dir: PathBuf,
    post_build_command: Option<String>,
}

impl DockerJobRunner {
    pub fn from_config(config: &Config) -> Self {
        Self {
            docker_bin: config.docker_bin.clone(),
            container: config.generator_container.clone(),
            generator_bin: config.generator_bin.clone(),
            source_host_prefix: config.source_host_prefix.clone(),
            source_port: config.source_port,
            output_dir: config.output_dir.clone(),
            post_build_command: config.post_build_command.clone(),
        }
    }

    /// Output directory for a domain.
    pub fn output_path(&self, domain: &str) -> PathBuf {
        self.output_dir.join(domain)
    }

    /// URL the generator crawls for a site.
    pub fn source_url(&self, site: &SiteId) -> String {
        format!(
            "http://{}{}:{}",
            self.source_host_prefix, site, self.source_port
        )
    }

    fn build_command(&self, site: &SiteId, domain: &str) -> Command {
        let mut cmd = Command::new(&self.docker_bin);
        cmd.arg("exec")
            .arg(&self.container)
            .arg(&self.generator_bin)
            .arg("--url")
            .arg(self.source_url(site))
            .arg("--dest")
            .arg(self.output_path(domain));
        cmd
    }

    async fn post_build(&self, site: &SiteId, domain: &str) -> Option<JobError> {
        let program = self.post_build_command.as_deref()?;

        info!(site = %site, command = %program, "post_build_starting");

        let result = Command::new(program)
            .arg(site.as_str())
            .arg(domain)
            .arg(self.output_path(domain))
            .output()
            .await;

        match check_output(result) {
            Ok(output) => {
                info!(
                    site = %site,
                    stdout = %String::from_utf8_lossy(&output.stdout).trim(),
                    "post_build_complete"
                );
                None
            }
            Err(reason) => Some(JobError::AuxiliaryStepFailure {
                step: program.to_string(),
                reason,
            }),
        }
    }
}

#[async_trait]
impl JobRunner for DockerJobRunner {
    async fn prepare(&self, site: &SiteId, domain: &str) -> Result<(), WebhookError> {
        let path = self.output_path(domain);
        tokio::fs::create_dir_all(&path).await.map_err(|e| {
            error!(site = %site, path = %path.display(), error = %e, "output_dir_create_failed");
            WebhookError::Infrastructure("Error creating output directory".to_string())
        })
    }

    async fn run(&self, site: &SiteId, domain: &str) -> Result<BuildReport, JobError> {
        info!(
            site = %site,
            domain = %domain,
            url = %self.source_url(site),
            dest = %self.output_path(domain).display(),
            "generator_starting"
        );

        let output = check_output(self.build_command(site, domain).output().await)
            .map_err(JobError::Failure)?;

        info!(
            site = %site,
            stdout = %String::from_utf8_lossy(&output.stdout).trim(),
            "generator_complete"
        );

        let mut report = BuildReport::default();
        if let Some(failure) = self.post_build(site, domain).await {
            warn!(site = %site, error = %failure, "post_build_failed");
            report.auxiliary_failures.push(failure);
        }

        Ok(report)
    }
}

/// Turn a finished process into `Ok` only on a zero exit status.
fn check_output(result: std::io::Result<Output>) -> Result<Output, String> {
    let output = result.map_err(|e| format!("failed to launch: {e}"))?;
    if output.status.success() {
        return Ok(output);
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(format!("{}: {}", output.status, stderr.trim()))
}
