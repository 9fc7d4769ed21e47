//! Run configuration
//!
//! Loaded from TOML, then overridden by `SHOPFLOW_*` environment variables,
//! then by command-line flags in the harness.

use serde::{Deserialize, Serialize};
use shopflow_common::SelectorCatalog;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::{E2eError, E2eResult};
use crate::playwright::{Browser, PlaywrightConfig};

/// Top-level run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// The e-commerce demo site
    pub storefront: SiteConfig,

    /// The finance-tracker demo site
    pub finance: SiteConfig,

    /// Browser engine settings
    pub browser: BrowserConfig,

    /// Where suites, fixtures and results live
    pub paths: PathsConfig,
}

/// A site under test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Base URL without trailing slash
    pub base_url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self::storefront()
    }
}

impl SiteConfig {
    pub fn storefront() -> Self {
        Self {
            base_url: "https://automationexercise.com".to_string(),
        }
    }

    pub fn finance() -> Self {
        Self {
            base_url: "https://devfinance-agilizei.netlify.app".to_string(),
        }
    }
}

/// Browser configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// chromium, firefox or webkit
    pub kind: Browser,

    /// Run without a visible window
    pub headless: bool,

    pub viewport_width: u32,
    pub viewport_height: u32,

    /// Wait window for every expectation and engine action
    pub default_timeout_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            kind: Browser::Chromium,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            default_timeout_ms: 4000,
        }
    }
}

/// Filesystem layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory of suite YAML files
    pub scenarios_dir: PathBuf,

    /// Directory holding the profile fixture and attachments
    pub fixtures_dir: PathBuf,

    /// Output directory for results and failure screenshots
    pub output_dir: PathBuf,

    /// Optional YAML file of selector overrides
    pub selector_overrides: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            scenarios_dir: PathBuf::from("scenarios"),
            fixtures_dir: PathBuf::from("fixtures"),
            output_dir: PathBuf::from("test-results"),
            selector_overrides: None,
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            storefront: SiteConfig::storefront(),
            finance: SiteConfig::finance(),
            browser: BrowserConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl RunConfig {
    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: &Path) -> E2eResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            debug!("Loaded config from {}", path.display());
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> E2eResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| E2eError::InvalidConfig(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply `SHOPFLOW_*` environment overrides
    pub fn apply_env(&mut self) -> E2eResult<()> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    fn apply_vars<F>(&mut self, var: F) -> E2eResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = var("SHOPFLOW_STOREFRONT_URL") {
            self.storefront.base_url = url;
        }
        if let Some(url) = var("SHOPFLOW_FINANCE_URL") {
            self.finance.base_url = url;
        }
        if let Some(headless) = var("SHOPFLOW_HEADLESS") {
            self.browser.headless = parse_bool(&headless).ok_or_else(|| {
                E2eError::InvalidConfig(format!("SHOPFLOW_HEADLESS: not a boolean: {headless}"))
            })?;
        }
        if let Some(timeout) = var("SHOPFLOW_TIMEOUT_MS") {
            self.browser.default_timeout_ms = timeout.parse().map_err(|_| {
                E2eError::InvalidConfig(format!("SHOPFLOW_TIMEOUT_MS: not a number: {timeout}"))
            })?;
        }
        Ok(())
    }

    /// Reject values that would make every run fail in confusing ways
    pub fn validate(&self) -> E2eResult<()> {
        for (site, cfg) in [("storefront", &self.storefront), ("finance", &self.finance)] {
            if !cfg.base_url.starts_with("http://") && !cfg.base_url.starts_with("https://") {
                return Err(E2eError::InvalidConfig(format!(
                    "{site}.base_url must be an http(s) URL, got '{}'",
                    cfg.base_url
                )));
            }
        }
        if self.browser.default_timeout_ms == 0 {
            return Err(E2eError::InvalidConfig(
                "browser.default_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.browser.default_timeout_ms)
    }

    /// Base URL for a site, trailing slash removed
    pub fn base_url(&self, site: crate::spec::Site) -> &str {
        let url = match site {
            crate::spec::Site::Storefront => &self.storefront.base_url,
            crate::spec::Site::Finance => &self.finance.base_url,
        };
        url.trim_end_matches('/')
    }

    /// Builtin selector maps, merged with the override file when configured
    pub fn selector_catalog(&self) -> E2eResult<SelectorCatalog> {
        Ok(match &self.paths.selector_overrides {
            Some(path) => SelectorCatalog::with_overrides(path)?,
            None => SelectorCatalog::builtin(),
        })
    }

    /// Resolve relative paths against `base`
    pub fn anchor_paths(&mut self, base: &Path) {
        let anchor = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        anchor(&mut self.paths.scenarios_dir);
        anchor(&mut self.paths.fixtures_dir);
        anchor(&mut self.paths.output_dir);
        if let Some(p) = self.paths.selector_overrides.as_mut() {
            anchor(p);
        }
    }

    /// Playwright settings derived from this configuration
    pub fn playwright(&self) -> PlaywrightConfig {
        PlaywrightConfig {
            browser: self.browser.kind,
            headless: self.browser.headless,
            viewport_width: self.browser.viewport_width,
            viewport_height: self.browser.viewport_height,
            default_timeout_ms: self.browser.default_timeout_ms,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
