//! shopflow E2E workflow runner
//!
//! This crate drives browser workflows against the storefront and finance
//! tracker demo sites:
//! - Binds semantic selector maps to a [`Driver`] through [`actions::Page`]
//! - Composes idempotent workflows (signup, login, logout, cleanup)
//! - Parses declarative YAML suites and runs them with lifecycle hooks
//! - Drives Playwright through a long-lived Node bridge, or an in-memory
//!   simulation of both sites
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     SuiteRunner (Rust)                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  SuiteSpec (YAML)                                           │
//! │    ├── shared fixtures, setup, before_each, teardown        │
//! │    └── scenarios: [ScenarioSpec]                            │
//! │          ├── fixtures: alias -> user | contact | ...        │
//! │          ├── steps: [Step]   primitives + workflows         │
//! │          └── cleanup: [Step] best-effort                    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Executor  -> Storefront / FinanceTracker -> Page           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Driver: PlaywrightHandle (node bridge) | SimulatedSite     │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod actions;
pub mod config;
pub mod driver;
pub mod error;
pub mod executor;
pub mod hooks;
pub mod playwright;
pub mod preflight;
pub mod runner;
pub mod session;
pub mod sim;
pub mod spec;
pub mod workflows;

pub use actions::{Page, Target, UrlExpectation};
pub use config::RunConfig;
pub use driver::Driver;
pub use error::{E2eError, E2eResult};
pub use runner::{RunSummary, ScenarioFilter, SuiteRunner};
pub use session::{probe_session, SessionState};
pub use sim::SimulatedSite;
pub use spec::{ScenarioSpec, Site, Step, SuiteSpec};
pub use workflows::{FinanceTracker, Storefront};
