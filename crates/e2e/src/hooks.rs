//! Suite and scenario lifecycle hooks
//!
//! `setup` and `before_each` failures count against the scenarios they guard.
//! `cleanup` and `teardown` are best-effort: every step is attempted and
//! errors are only logged.

use tracing::{debug, warn};

use crate::error::E2eResult;
use crate::executor::{Executor, StepResult};
use crate::spec::{ScenarioSpec, Step, SuiteSpec};

/// Run the suite's `setup` steps once
pub async fn setup(
    executor: &Executor<'_>,
    suite: &SuiteSpec,
    trace: &mut Vec<StepResult>,
) -> E2eResult<()> {
    if suite.setup.is_empty() {
        return Ok(());
    }
    debug!(suite = %suite.name, "setup");
    executor.run_steps(&suite.setup, trace).await
}

/// Reset the session when the suite asks for isolation, then run `before_each`
pub async fn before_each(
    executor: &Executor<'_>,
    suite: &SuiteSpec,
    trace: &mut Vec<StepResult>,
) -> E2eResult<()> {
    if suite.isolate {
        debug!(suite = %suite.name, "clearing cookies");
        executor.page().driver().clear_cookies().await?;
    }
    executor.run_steps(&suite.before_each, trace).await
}

/// Run a scenario's `cleanup` steps; returns how many failed
pub async fn cleanup(
    executor: &Executor<'_>,
    scenario: &ScenarioSpec,
    trace: &mut Vec<StepResult>,
) -> usize {
    best_effort(executor, &scenario.cleanup, trace, &scenario.name).await
}

/// Run the suite's `teardown` steps; returns how many failed
pub async fn teardown(
    executor: &Executor<'_>,
    suite: &SuiteSpec,
    trace: &mut Vec<StepResult>,
) -> usize {
    best_effort(executor, &suite.teardown, trace, &suite.name).await
}

async fn best_effort(
    executor: &Executor<'_>,
    steps: &[Step],
    trace: &mut Vec<StepResult>,
    owner: &str,
) -> usize {
    let mut failures = 0;
    for step in steps {
        if let Err(e) = executor.run_step(step, trace).await {
            failures += 1;
            warn!("{}: best-effort step '{}' failed: {}", owner, step.label(), e);
        }
    }
    failures
}
