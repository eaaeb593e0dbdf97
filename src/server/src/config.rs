//! Service configuration loading and validation

use anyhow::{Context, Result};
use clap::ValueEnum;
use rolemap_crawler::clients::{IAM_BASE_URL, RESOURCE_MANAGER_BASE_URL};
use rolemap_crawler::limiter::MIN_RATE;
use rolemap_crawler::sink::{PERMISSIONS_TABLE, ROLES_TABLE};
use rolemap_crawler::{CrawlMode, CrawlerConfig, ParentResetPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Which parents a crawl covers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModeKind {
    /// Custom roles of one organization
    Organization,
    /// Custom roles of every active project
    Project,
    /// Predefined roles
    #[default]
    Default,
}

/// Complete service configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub crawl: CrawlSection,

    #[serde(default)]
    pub google: GoogleSection,

    #[serde(default)]
    pub sink: SinkSection,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Cancel a crawl that runs longer than this
    #[serde(default)]
    pub crawl_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CrawlSection {
    #[serde(default)]
    pub mode: ModeKind,
    /// Numeric organization id
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_rate")]
    pub rate_per_second: f64,
    #[serde(default = "default_burst")]
    pub burst: u32,
    #[serde(default)]
    pub max_in_flight: Option<usize>,
    #[serde(default)]
    pub page_size: Option<u32>,
    #[serde(default)]
    pub reset_policy: ParentResetPolicy,
    #[serde(default = "default_true")]
    pub seed_permission_catalog: bool,
    #[serde(default)]
    pub catalog_resource: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GoogleSection {
    #[serde(default = "default_iam_url")]
    pub iam_url: String,
    #[serde(default = "default_resource_manager_url")]
    pub resource_manager_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Bearer token; normally supplied through `GOOGLE_ACCESS_TOKEN`
    #[serde(default, skip_serializing)]
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SinkSection {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_roles_table")]
    pub roles_table: String,
    #[serde(default = "default_permissions_table")]
    pub permissions_table: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            crawl_timeout_secs: None,
        }
    }
}

impl Default for CrawlSection {
    fn default() -> Self {
        Self {
            mode: ModeKind::Default,
            organization: None,
            region: default_region(),
            rate_per_second: default_rate(),
            burst: default_burst(),
            max_in_flight: None,
            page_size: None,
            reset_policy: ParentResetPolicy::Accumulate,
            seed_permission_catalog: true,
            catalog_resource: None,
        }
    }
}

impl Default for GoogleSection {
    fn default() -> Self {
        Self {
            iam_url: default_iam_url(),
            resource_manager_url: default_resource_manager_url(),
            request_timeout_secs: default_request_timeout(),
            access_token: None,
        }
    }
}

impl Default for SinkSection {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            roles_table: default_roles_table(),
            permissions_table: default_permissions_table(),
        }
    }
}

// Default value functions
fn default_true() -> bool { true }
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_region() -> String { "global".to_string() }
fn default_rate() -> f64 { 4.0 }
fn default_burst() -> u32 { 4 }
fn default_iam_url() -> String { IAM_BASE_URL.to_string() }
fn default_resource_manager_url() -> String { RESOURCE_MANAGER_BASE_URL.to_string() }
fn default_request_timeout() -> u64 { 30 }
fn default_output_dir() -> PathBuf { PathBuf::from("./rolemap-data") }
fn default_roles_table() -> String { ROLES_TABLE.to_string() }
fn default_permissions_table() -> String { PERMISSIONS_TABLE.to_string() }

impl ServiceConfig {
    /// Load configuration from TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read configuration file {:?}", path.as_ref()))?;

        let config: ServiceConfig =
            toml::from_str(&contents).context("Failed to parse configuration file")?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.crawl.mode == ModeKind::Organization
            && self
                .crawl
                .organization
                .as_deref()
                .map(str::trim)
                .unwrap_or_default()
                .is_empty()
        {
            anyhow::bail!("Organization mode requires an organization id");
        }

        if !self.crawl.rate_per_second.is_finite() || self.crawl.rate_per_second < MIN_RATE {
            anyhow::bail!(
                "Crawl rate must be at least {} requests per second",
                MIN_RATE
            );
        }

        if self.crawl.burst == 0 {
            anyhow::bail!("Crawl burst must be at least 1");
        }

        if self.crawl.max_in_flight == Some(0) {
            anyhow::bail!("max_in_flight must be at least 1");
        }

        if self.crawl.region.trim().is_empty() {
            anyhow::bail!("Region tag must not be empty");
        }

        Ok(())
    }

    /// Mode to crawl, with its organization id where relevant
    pub fn crawl_mode(&self) -> CrawlMode {
        match self.crawl.mode {
            ModeKind::Organization => {
                CrawlMode::Organization(self.crawl.organization.clone().unwrap_or_default())
            }
            ModeKind::Project => CrawlMode::Project {
                organization: self
                    .crawl
                    .organization
                    .clone()
                    .filter(|id| !id.trim().is_empty()),
            },
            ModeKind::Default => CrawlMode::Default,
        }
    }

    /// Crawler settings derived from the `[crawl]` section
    pub fn crawler_config(&self) -> CrawlerConfig {
        CrawlerConfig {
            region: self.crawl.region.clone(),
            rate_per_second: self.crawl.rate_per_second,
            burst: self.crawl.burst,
            max_in_flight: self.crawl.max_in_flight,
            page_size: self.crawl.page_size,
            reset_policy: self.crawl.reset_policy,
            seed_permission_catalog: self.crawl.seed_permission_catalog,
            catalog_resource: self.crawl.catalog_resource.clone(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.google.request_timeout_secs)
    }

    pub fn crawl_timeout(&self) -> Option<Duration> {
        self.server.crawl_timeout_secs.map(Duration::from_secs)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_all_defaults() {
        let config: ServiceConfig = toml::from_str("").unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.crawl.mode, ModeKind::Default);
        assert_eq!(config.crawl.rate_per_second, 4.0);
        assert_eq!(config.crawl.burst, 4);
        assert_eq!(config.sink.roles_table, "roles");
        assert!(config.validate().is_ok());
        assert_eq!(config.crawl_mode(), CrawlMode::Default);
    }

    #[test]
    fn test_parse_sections() {
        let config: ServiceConfig = toml::from_str(
            r#"
            [server]
            port = 9000
            crawl_timeout_secs = 600

            [crawl]
            mode = "project"
            organization = "42"
            reset_policy = "reset_per_parent"
            max_in_flight = 2

            [sink]
            output_dir = "/var/lib/rolemap"
            "#,
        )
        .unwrap();

        assert_eq!(config.listen_addr(), "0.0.0.0:9000");
        assert_eq!(config.crawl_timeout(), Some(Duration::from_secs(600)));
        assert_eq!(
            config.crawl_mode(),
            CrawlMode::Project {
                organization: Some("42".to_string())
            }
        );

        let crawler = config.crawler_config();
        assert_eq!(crawler.reset_policy, ParentResetPolicy::ResetPerParent);
        assert_eq!(crawler.in_flight_limit(), 2);
        assert_eq!(config.sink.output_dir, PathBuf::from("/var/lib/rolemap"));
    }

    #[test]
    fn test_validation() {
        let mut config = ServiceConfig::default();
        config.crawl.mode = ModeKind::Organization;
        assert!(config.validate().is_err());

        config.crawl.organization = Some("42".to_string());
        assert!(config.validate().is_ok());
        assert_eq!(config.crawl_mode(), CrawlMode::Organization("42".to_string()));

        config.crawl.rate_per_second = 0.0;
        assert!(config.validate().is_err());

        config.crawl.rate_per_second = 1e-20;
        assert!(config.validate().is_err());

        config.crawl.rate_per_second = 4.0;
        config.crawl.burst = 0;
        assert!(config.validate().is_err());

        config.crawl.burst = 4;
        config.crawl.max_in_flight = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_access_token_is_never_written_back() {
        let mut config = ServiceConfig::default();
        config.google.access_token = Some("secret".to_string());

        let text = toml::to_string(&config).unwrap();
        assert!(!text.contains("secret"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rolemap.toml");
        std::fs::write(&path, "[crawl]\nregion = \"europe\"\n").unwrap();

        let config = ServiceConfig::load(&path).unwrap();
        assert_eq!(config.crawl.region, "europe");
        assert!(ServiceConfig::load(dir.path().join("missing.toml")).is_err());
    }
}
