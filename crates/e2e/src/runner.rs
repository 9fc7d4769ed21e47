//! Suite runner: sequences suites and scenarios against one driver and
//! collects results

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shopflow_common::SelectorCatalog;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::actions::Page;
use crate::config::RunConfig;
use crate::driver::Driver;
use crate::error::E2eResult;
use crate::executor::{sanitize_file_name, Bindings, Executor, FixtureContext, StepResult};
use crate::hooks;
use crate::spec::{ScenarioSpec, SuiteSpec};

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub success: bool,
    pub duration_ms: u64,
    pub steps: Vec<StepResult>,
    pub error: Option<String>,
    /// Page capture taken when the scenario failed
    pub screenshot: Option<PathBuf>,
    /// Cleanup steps that failed; never affects `success`
    pub cleanup_failures: usize,
}

impl ScenarioResult {
    fn failed(name: &str, error: String) -> Self {
        Self {
            name: name.to_string(),
            success: false,
            duration_ms: 0,
            steps: Vec::new(),
            error: Some(error),
            screenshot: None,
            cleanup_failures: 0,
        }
    }
}

/// Result of running one suite file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub name: String,
    pub source: Option<PathBuf>,
    pub setup: Vec<StepResult>,
    pub scenarios: Vec<ScenarioResult>,
    pub teardown: Vec<StepResult>,
    pub teardown_failures: usize,
}

/// Result of a whole run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub driver: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// Scenarios left out by the filter
    pub skipped: usize,
    pub duration_ms: u64,
    pub suites: Vec<SuiteResult>,
}

impl RunSummary {
    pub fn success(&self) -> bool {
        self.failed == 0
    }

    /// Every scenario result, in run order
    pub fn scenarios(&self) -> impl Iterator<Item = &ScenarioResult> {
        self.suites.iter().flat_map(|s| s.scenarios.iter())
    }
}

/// Which scenarios to run
#[derive(Debug, Clone, Default)]
pub struct ScenarioFilter {
    /// Tag on the suite or the scenario
    pub tag: Option<String>,
    /// Scenario name, or suite name for all of its scenarios
    pub name: Option<String>,
}

impl ScenarioFilter {
    pub fn selects(&self, suite: &SuiteSpec, scenario: &ScenarioSpec) -> bool {
        let tag_ok = self
            .tag
            .as_deref()
            .map(|t| suite.has_tag(t) || scenario.has_tag(t))
            .unwrap_or(true);
        let name_ok = self
            .name
            .as_deref()
            .map(|n| scenario.name == n || suite.name == n)
            .unwrap_or(true);
        tag_ok && name_ok
    }
}

/// Runs suites sequentially against one driver
pub struct SuiteRunner {
    config: RunConfig,
    driver: Box<dyn Driver>,
    catalog: SelectorCatalog,
    fixtures: FixtureContext,
    filter: ScenarioFilter,
}

impl SuiteRunner {
    pub fn new(config: RunConfig, driver: Box<dyn Driver>) -> E2eResult<Self> {
        let catalog = config.selector_catalog()?;
        let fixtures = FixtureContext::new(&config.paths.fixtures_dir).with_profile()?;
        Ok(Self {
            config,
            driver,
            catalog,
            fixtures,
            filter: ScenarioFilter::default(),
        })
    }

    pub fn with_filter(mut self, filter: ScenarioFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn catalog(&self) -> &SelectorCatalog {
        &self.catalog
    }

    pub fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    /// Run every suite in the scenarios directory
    pub async fn run_all(&self) -> E2eResult<RunSummary> {
        let suites = SuiteSpec::load_all(&self.config.paths.scenarios_dir)?;
        Ok(self.run_suites(&suites).await)
    }

    /// Run a list of suites in order
    pub async fn run_suites(&self, suites: &[SuiteSpec]) -> RunSummary {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();

        let selected: usize = suites
            .iter()
            .map(|s| s.scenarios.iter().filter(|sc| self.filter.selects(s, sc)).count())
            .sum();
        let available: usize = suites.iter().map(|s| s.scenarios.len()).sum();

        info!(
            %run_id,
            driver = self.driver.name(),
            "Running {} scenario(s) from {} suite(s)...",
            selected,
            suites.len()
        );

        let mut results = Vec::with_capacity(suites.len());
        for suite in suites {
            results.push(self.run_suite(suite).await);
        }

        let passed = results
            .iter()
            .flat_map(|s| s.scenarios.iter())
            .filter(|r| r.success)
            .count();
        let total = results.iter().map(|s| s.scenarios.len()).sum::<usize>();
        let failed = total - passed;
        let duration_ms = start.elapsed().as_millis() as u64;

        info!("");
        info!(
            "Results: {} passed, {} failed, {} skipped ({} ms)",
            passed,
            failed,
            available - selected,
            duration_ms
        );

        RunSummary {
            run_id,
            started_at,
            driver: self.driver.name().to_string(),
            total,
            passed,
            failed,
            skipped: available - selected,
            duration_ms,
            suites: results,
        }
    }

    /// Run one suite: shared fixtures, setup, scenarios, teardown
    pub async fn run_suite(&self, suite: &SuiteSpec) -> SuiteResult {
        let mut result = SuiteResult {
            name: suite.name.clone(),
            source: suite.source.clone(),
            setup: Vec::new(),
            scenarios: Vec::new(),
            teardown: Vec::new(),
            teardown_failures: 0,
        };

        let scenarios: Vec<&ScenarioSpec> = suite
            .scenarios
            .iter()
            .filter(|sc| self.filter.selects(suite, sc))
            .collect();
        if scenarios.is_empty() {
            debug!("Skipping suite {}: nothing selected", suite.name);
            return result;
        }
        info!("Suite: {}", suite.name);

        let selectors = match self.catalog.get(&suite.selector_map()) {
            Ok(map) => map,
            Err(e) => {
                return self.fail_all(result, &scenarios, format!("selector map: {e}"));
            }
        };
        let shared = match Bindings::materialize(&Bindings::new(), &suite.shared, &self.fixtures) {
            Ok(b) => b,
            Err(e) => {
                return self.fail_all(result, &scenarios, format!("shared fixtures: {e}"));
            }
        };

        let page = Page::new(
            self.driver.as_ref(),
            selectors,
            self.config.base_url(suite.site),
            self.config.default_timeout(),
        );
        let shots = self.screenshot_dir();
        let suite_exec = Executor::new(&page, &shared, &self.config.paths.fixtures_dir, &shots);

        let setup_error = hooks::setup(&suite_exec, suite, &mut result.setup)
            .await
            .err()
            .map(|e| format!("setup failed: {e}"));

        for scenario in scenarios {
            let scenario_result = match &setup_error {
                Some(err) => ScenarioResult::failed(&scenario.name, err.clone()),
                None => self.run_scenario(&page, &shared, suite, scenario).await,
            };
            if scenario_result.success {
                info!("  ✓ {} ({} ms)", scenario_result.name, scenario_result.duration_ms);
            } else {
                error!(
                    "  ✗ {} - {}",
                    scenario_result.name,
                    scenario_result.error.as_deref().unwrap_or("unknown error")
                );
            }
            result.scenarios.push(scenario_result);
        }

        result.teardown_failures = hooks::teardown(&suite_exec, suite, &mut result.teardown).await;
        result
    }

    async fn run_scenario(
        &self,
        page: &Page<'_>,
        shared: &Bindings,
        suite: &SuiteSpec,
        scenario: &ScenarioSpec,
    ) -> ScenarioResult {
        let start = Instant::now();
        debug!("Running scenario: {}", scenario.name);

        let own_page;
        let page = match &scenario.selectors {
            Some(name) => match self.catalog.get(name) {
                Ok(map) => {
                    own_page = Page::new(self.driver.as_ref(), map, page.base_url(), page.timeout());
                    &own_page
                }
                Err(e) => {
                    return ScenarioResult::failed(&scenario.name, format!("selector map: {e}"))
                }
            },
            None => page,
        };

        let bindings = match Bindings::materialize(shared, &scenario.fixtures, &self.fixtures) {
            Ok(b) => b,
            Err(e) => return ScenarioResult::failed(&scenario.name, format!("fixtures: {e}")),
        };
        let shots = self.screenshot_dir();
        let exec = Executor::new(page, &bindings, &self.config.paths.fixtures_dir, &shots);

        let mut steps = Vec::new();
        let mut error = match hooks::before_each(&exec, suite, &mut steps).await {
            Ok(()) => None,
            Err(e) => Some(format!("before_each failed: {e}")),
        };
        if error.is_none() {
            if let Err(e) = exec.run_steps(&scenario.steps, &mut steps).await {
                error = Some(e.to_string());
            }
        }

        let screenshot = match error {
            Some(_) => self.capture_failure(suite, scenario).await,
            None => None,
        };
        let cleanup_failures = hooks::cleanup(&exec, scenario, &mut steps).await;

        ScenarioResult {
            name: scenario.name.clone(),
            success: error.is_none(),
            duration_ms: start.elapsed().as_millis() as u64,
            steps,
            error,
            screenshot,
            cleanup_failures,
        }
    }

    async fn capture_failure(&self, suite: &SuiteSpec, scenario: &ScenarioSpec) -> Option<PathBuf> {
        let dir = self.screenshot_dir();
        if let Err(e) = std::fs::create_dir_all(&dir) {
            warn!("Cannot create {}: {}", dir.display(), e);
            return None;
        }
        let path = dir.join(format!(
            "{}--{}--failure.png",
            sanitize_file_name(&suite.name),
            sanitize_file_name(&scenario.name)
        ));
        match self.driver.screenshot(&path).await {
            Ok(()) => Some(path),
            Err(e) => {
                warn!("Failure screenshot for '{}' not taken: {}", scenario.name, e);
                None
            }
        }
    }

    fn fail_all(
        &self,
        mut result: SuiteResult,
        scenarios: &[&ScenarioSpec],
        reason: String,
    ) -> SuiteResult {
        for scenario in scenarios {
            error!("  ✗ {} - {}", scenario.name, reason);
            result
                .scenarios
                .push(ScenarioResult::failed(&scenario.name, reason.clone()));
        }
        result
    }

    fn screenshot_dir(&self) -> PathBuf {
        self.config.paths.output_dir.join("screenshots")
    }

    /// Write results to `test-results.json` in the output directory
    pub fn write_results(&self, summary: &RunSummary) -> E2eResult<PathBuf> {
        write_results(&self.config.paths.output_dir, summary)
    }

    /// Close the driver
    pub async fn shutdown(self) -> E2eResult<()> {
        self.driver.close().await
    }
}

/// Write a summary as pretty JSON into `output_dir`
pub fn write_results(output_dir: &Path, summary: &RunSummary) -> E2eResult<PathBuf> {
    std::fs::create_dir_all(output_dir)?;

    let path = output_dir.join("test-results.json");
    let json = serde_json::to_string_pretty(summary)?;
    std::fs::write(&path, json)?;

    info!("Results written to: {}", path.display());
    Ok(path)
}
