//! Action primitives
//!
//! [`Page`] binds a [`Driver`] to one site: its base URL, its selector map and
//! the default wait window. Every `expect_*` polls until the condition holds
//! or the window elapses; nothing here retries an action.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shopflow_common::{Locator, SelectorMap};
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::driver::Driver;
use crate::error::{E2eError, E2eResult};

/// How often expectations re-probe the page
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// An element reference inside a step: a selector-map name or an inline locator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Target {
    Named(String),
    Inline(Locator),
}

impl Target {
    pub fn named(name: &str) -> Self {
        Target::Named(name.to_string())
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Named(name) => f.write_str(name),
            Target::Inline(locator) => write!(f, "{locator}"),
        }
    }
}

/// Expected state of the address bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlExpectation {
    Contains(String),
    Equals(String),
}

impl UrlExpectation {
    pub fn matches(&self, url: &str) -> bool {
        match self {
            UrlExpectation::Contains(fragment) => url.contains(fragment.as_str()),
            UrlExpectation::Equals(expected) => url == expected,
        }
    }
}

impl std::fmt::Display for UrlExpectation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UrlExpectation::Contains(s) => write!(f, "url containing '{s}'"),
            UrlExpectation::Equals(s) => write!(f, "url equal to '{s}'"),
        }
    }
}

/// A driver bound to one site
pub struct Page<'a> {
    driver: &'a dyn Driver,
    selectors: &'a SelectorMap,
    base_url: String,
    timeout: Duration,
}

impl<'a> Page<'a> {
    pub fn new(
        driver: &'a dyn Driver,
        selectors: &'a SelectorMap,
        base_url: &str,
        timeout: Duration,
    ) -> Self {
        Self {
            driver,
            selectors,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub fn driver(&self) -> &'a dyn Driver {
        self.driver
    }

    pub fn selectors(&self) -> &'a SelectorMap {
        self.selectors
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Absolute URL for a site path; absolute URLs pass through.
    pub fn absolute_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    pub fn element(&self, name: &str) -> E2eResult<&'a Locator> {
        Ok(self.selectors.get(name)?)
    }

    pub fn resolve(&self, target: &Target) -> E2eResult<Locator> {
        match target {
            Target::Named(name) => Ok(self.element(name)?.clone()),
            Target::Inline(locator) => Ok(locator.clone()),
        }
    }

    pub async fn visit(&self, path: &str) -> E2eResult<()> {
        let url = self.absolute_url(path);
        debug!("visit {}", url);
        self.driver.goto(&url).await
    }

    pub async fn type_into(&self, target: &Target, text: &str) -> E2eResult<()> {
        let locator = self.resolve(target)?;
        self.driver.fill(&locator, text).await
    }

    pub async fn select(&self, target: &Target, option: &str) -> E2eResult<()> {
        let locator = self.resolve(target)?;
        self.driver.select_option(&locator, option).await
    }

    pub async fn check(&self, target: &Target, value: Option<&str>) -> E2eResult<()> {
        let locator = self.resolve(target)?;
        self.driver.check(&locator, value).await
    }

    pub async fn click(&self, target: &Target) -> E2eResult<()> {
        let locator = self.resolve(target)?;
        debug!("click {}", target);
        self.driver.click(&locator).await
    }

    pub async fn upload(&self, target: &Target, file: &Path) -> E2eResult<()> {
        if !file.exists() {
            return Err(E2eError::StepFailed {
                step: format!("upload:{target}"),
                reason: format!("attachment not found: {}", file.display()),
            });
        }
        let locator = self.resolve(target)?;
        self.driver.set_input_files(&locator, file).await
    }

    /// Presence right now, without waiting
    pub async fn is_present(&self, target: &Target) -> E2eResult<bool> {
        let locator = self.resolve(target)?;
        Ok(self.driver.count(&locator).await? > 0)
    }

    /// Visible text right now, without waiting
    pub async fn body_contains(&self, text: &str) -> E2eResult<bool> {
        self.driver.has_text(text).await
    }

    pub async fn url(&self) -> E2eResult<String> {
        self.driver.current_url().await
    }

    pub async fn expect_text(&self, text: &str) -> E2eResult<()> {
        let driver = self.driver;
        self.wait_until(&format!("text \"{text}\" visible"), move || async move {
            driver.has_text(text).await
        })
        .await
    }

    pub async fn expect_visible(&self, target: &Target) -> E2eResult<()> {
        let locator = self.resolve(target)?;
        let driver = self.driver;
        let locator = &locator;
        self.wait_until(&format!("{target} visible"), move || async move {
            driver.is_visible(locator).await
        })
        .await
    }

    pub async fn expect_absent(&self, target: &Target) -> E2eResult<()> {
        let locator = self.resolve(target)?;
        let driver = self.driver;
        let locator = &locator;
        self.wait_until(&format!("{target} absent"), move || async move {
            Ok(driver.count(locator).await? == 0)
        })
        .await
    }

    pub async fn expect_count(&self, target: &Target, expected: usize) -> E2eResult<()> {
        let locator = self.resolve(target)?;
        let driver = self.driver;
        let locator = &locator;
        self.wait_until(
            &format!("{expected} element(s) matching {target}"),
            move || async move { Ok(driver.count(locator).await? == expected) },
        )
        .await
    }

    pub async fn expect_element_text(&self, target: &Target, contains: &str) -> E2eResult<()> {
        let locator = self.resolve(target)?;
        let driver = self.driver;
        let locator = &locator;
        self.wait_until(
            &format!("{target} containing \"{contains}\""),
            move || async move {
                Ok(driver
                    .inner_text(locator)
                    .await?
                    .map(|text| text.contains(contains))
                    .unwrap_or(false))
            },
        )
        .await
    }

    pub async fn expect_url(&self, expected: &UrlExpectation) -> E2eResult<()> {
        let driver = self.driver;
        self.wait_until(&expected.to_string(), move || async move {
            Ok(expected.matches(&driver.current_url().await?))
        })
        .await
    }

    /// Poll until one of `texts` is visible; the index of the first found,
    /// or `None` when the wait window elapses.
    pub async fn first_of(&self, texts: &[&str]) -> E2eResult<Option<usize>> {
        let deadline = Instant::now() + self.timeout;
        loop {
            for (i, text) in texts.iter().enumerate() {
                if self.driver.has_text(text).await? {
                    return Ok(Some(i));
                }
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn wait_until<F, Fut>(&self, what: &str, mut probe: F) -> E2eResult<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = E2eResult<bool>>,
    {
        let deadline = Instant::now() + self.timeout;
        loop {
            if probe().await? {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(E2eError::AssertionFailed(format!(
                    "expected {what} within {} ms",
                    self.timeout.as_millis()
                )));
            }
            sleep(POLL_INTERVAL).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_deserializes_both_forms() {
        let named: Target = serde_yaml::from_str("signup_name").unwrap();
        assert_eq!(named, Target::named("signup_name"));

        let inline: Target = serde_yaml::from_str("xpath: //tbody/tr").unwrap();
        assert_eq!(inline, Target::Inline(Locator::xpath("//tbody/tr")));
    }

    #[test]
    fn test_url_expectation() {
        let contains = UrlExpectation::Contains("/login".into());
        assert!(contains.matches("https://automationexercise.com/login"));
        assert!(!contains.matches("https://automationexercise.com/"));

        let equals = UrlExpectation::Equals("https://automationexercise.com/".into());
        assert!(equals.matches("https://automationexercise.com/"));
        assert!(!equals.matches("https://automationexercise.com/contact_us"));
    }
}
