//! Declarative YAML suite specification

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use shopflow_common::selectors::{finance_map_name, STOREFRONT};

use crate::actions::{Target, UrlExpectation};
use crate::error::{E2eError, E2eResult};
use crate::workflows::{DeleteOutcome, LoginOutcome, LogoutOutcome, SignupOutcome};

/// Which site a suite drives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Site {
    #[default]
    Storefront,
    Finance,
}

/// One YAML file: a group of scenarios sharing setup and teardown
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteSpec {
    /// Unique name for this suite
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub site: Site,

    /// Selector map to bind; defaults to the site's builtin map
    #[serde(default)]
    pub selectors: Option<String>,

    /// Tags for filtering
    #[serde(default)]
    pub tags: Vec<String>,

    /// Fixtures generated once and visible to every scenario
    #[serde(default)]
    pub shared: BTreeMap<String, FixtureSource>,

    /// Runs once before the first scenario
    #[serde(default)]
    pub setup: Vec<Step>,

    /// Runs before every scenario
    #[serde(default)]
    pub before_each: Vec<Step>,

    /// Runs once after the last scenario, best-effort
    #[serde(default)]
    pub teardown: Vec<Step>,

    /// Clear cookies before each scenario
    #[serde(default)]
    pub isolate: bool,

    pub scenarios: Vec<ScenarioSpec>,

    /// File this suite was read from
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSpec {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Selector map for this scenario only, overriding the suite's
    #[serde(default)]
    pub selectors: Option<String>,

    /// Fixtures generated fresh for this scenario
    #[serde(default)]
    pub fixtures: BTreeMap<String, FixtureSource>,

    pub steps: Vec<Step>,

    /// Always runs after the steps, best-effort
    #[serde(default)]
    pub cleanup: Vec<Step>,
}

/// How a fixture alias is materialised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixtureSource {
    /// Generated user with a unique email
    User,
    /// Generated contact-form submission
    Contact,
    /// Generated finance-tracker entry
    Transaction,
    /// The on-disk profile's user with a fresh email
    ProfileUser,
    /// The on-disk profile's contact with a fresh email
    ProfileContact,
}

impl FixtureSource {
    /// Record kind the alias will hold
    pub fn kind(self) -> &'static str {
        match self {
            FixtureSource::User | FixtureSource::ProfileUser => "user",
            FixtureSource::Contact | FixtureSource::ProfileContact => "contact",
            FixtureSource::Transaction => "transaction",
        }
    }
}

/// A single step in a scenario
///
/// String arguments may reference fixtures as `{alias.field}`. Fields named
/// `user`, `contact` or `transaction` take a fixture alias directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Load a path relative to the site, or an absolute URL
    Navigate { url: String },

    /// Replace an input's value
    Type { target: Target, text: String },

    /// Choose a select option
    Select { target: Target, option: String },

    /// Check a checkbox, or the radio with the given value
    Check {
        target: Target,
        #[serde(default)]
        value: Option<String>,
    },

    Click { target: Target },

    /// Attach a file; relative paths resolve against the fixtures directory
    Upload { target: Target, file: String },

    ExpectText { text: String },

    ExpectVisible { target: Target },

    ExpectAbsent { target: Target },

    ExpectElementText { target: Target, contains: String },

    ExpectCount { target: Target, count: usize },

    ExpectUrl {
        #[serde(default)]
        contains: Option<String>,
        #[serde(default)]
        equals: Option<String>,
    },

    /// Branch on an element being present right now
    IfPresent {
        target: Target,
        #[serde(default)]
        then: Vec<Step>,
        #[serde(default, rename = "else")]
        otherwise: Vec<Step>,
    },

    /// Branch on a text being visible right now
    IfText {
        text: String,
        #[serde(default)]
        then: Vec<Step>,
        #[serde(default, rename = "else")]
        otherwise: Vec<Step>,
    },

    /// Branch on the current URL
    IfUrl {
        contains: String,
        #[serde(default)]
        then: Vec<Step>,
        #[serde(default, rename = "else")]
        otherwise: Vec<Step>,
    },

    /// Save a full-page screenshot under the output directory
    Screenshot { name: String },

    /// Log a message (for debugging)
    Log { message: String },

    OpenHome,

    NavigateToSignupLogin,

    StartSignup {
        name: String,
        email: String,
        #[serde(default)]
        expect: Option<SignupOutcome>,
    },

    FillProfile { user: String },

    SubmitRegistration { user: String },

    Register { user: String },

    Login {
        email: String,
        password: String,
        #[serde(default)]
        expect: Option<LoginOutcome>,
    },

    Logout {
        #[serde(default)]
        expect: Option<LogoutOutcome>,
    },

    DeleteAccount {
        #[serde(default)]
        expect: Option<DeleteOutcome>,
    },

    CleanupAccount { user: String },

    SubmitContact {
        contact: String,
        /// Overrides the contact record's own attachment
        #[serde(default)]
        attachment: Option<String>,
    },

    ReturnHome,

    OpenFinance,

    AddTransaction { transaction: String },
}

impl Step {
    /// Short label for logs and reports
    pub fn label(&self) -> String {
        match self {
            Step::Navigate { url } => format!("navigate {url}"),
            Step::Type { target, .. } => format!("type {target}"),
            Step::Select { target, option } => format!("select {target} = {option}"),
            Step::Check { target, value } => match value {
                Some(v) => format!("check {target} = {v}"),
                None => format!("check {target}"),
            },
            Step::Click { target } => format!("click {target}"),
            Step::Upload { target, file } => format!("upload {file} to {target}"),
            Step::ExpectText { text } => format!("expect text \"{text}\""),
            Step::ExpectVisible { target } => format!("expect visible {target}"),
            Step::ExpectAbsent { target } => format!("expect absent {target}"),
            Step::ExpectElementText { target, contains } => {
                format!("expect {target} contains \"{contains}\"")
            }
            Step::ExpectCount { target, count } => format!("expect {count} x {target}"),
            Step::ExpectUrl { contains, equals } => match (contains, equals) {
                (_, Some(e)) => format!("expect url = {e}"),
                (Some(c), None) => format!("expect url contains {c}"),
                (None, None) => "expect url".to_string(),
            },
            Step::IfPresent { target, .. } => format!("if present {target}"),
            Step::IfText { text, .. } => format!("if text \"{text}\""),
            Step::IfUrl { contains, .. } => format!("if url contains {contains}"),
            Step::Screenshot { name } => format!("screenshot {name}"),
            Step::Log { .. } => "log".to_string(),
            Step::OpenHome => "open_home".to_string(),
            Step::NavigateToSignupLogin => "navigate_to_signup_login".to_string(),
            Step::StartSignup { .. } => "start_signup".to_string(),
            Step::FillProfile { user } => format!("fill_profile {user}"),
            Step::SubmitRegistration { user } => format!("submit_registration {user}"),
            Step::Register { user } => format!("register {user}"),
            Step::Login { .. } => "login".to_string(),
            Step::Logout { .. } => "logout".to_string(),
            Step::DeleteAccount { .. } => "delete_account".to_string(),
            Step::CleanupAccount { user } => format!("cleanup_account {user}"),
            Step::SubmitContact { contact, .. } => format!("submit_contact {contact}"),
            Step::ReturnHome => "return_home".to_string(),
            Step::OpenFinance => "open_finance".to_string(),
            Step::AddTransaction { transaction } => format!("add_transaction {transaction}"),
        }
    }

    /// Aliases this step takes as whole records, with the kind each must be
    fn record_args(&self) -> Vec<(&str, &'static str)> {
        match self {
            Step::FillProfile { user }
            | Step::SubmitRegistration { user }
            | Step::Register { user }
            | Step::CleanupAccount { user } => vec![(user.as_str(), "user")],
            Step::SubmitContact { contact, .. } => vec![(contact.as_str(), "contact")],
            Step::AddTransaction { transaction } => vec![(transaction.as_str(), "transaction")],
            _ => Vec::new(),
        }
    }

    /// Nested branches of conditional steps
    fn children(&self) -> Vec<&Step> {
        match self {
            Step::IfPresent { then, otherwise, .. }
            | Step::IfText { then, otherwise, .. }
            | Step::IfUrl { then, otherwise, .. } => then.iter().chain(otherwise.iter()).collect(),
            _ => Vec::new(),
        }
    }

    /// The URL check of an `expect_url` step
    pub fn url_expectation(contains: &Option<String>, equals: &Option<String>) -> E2eResult<UrlExpectation> {
        match (contains, equals) {
            (_, Some(e)) => Ok(UrlExpectation::Equals(e.clone())),
            (Some(c), None) => Ok(UrlExpectation::Contains(c.clone())),
            (None, None) => Err(E2eError::SpecParse(
                "expect_url needs `contains` or `equals`".to_string(),
            )),
        }
    }
}

impl SuiteSpec {
    /// Parse a suite from YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let suite: Self = serde_yaml::from_str(yaml).map_err(E2eError::from)?;
        suite.validate()?;
        Ok(suite)
    }

    /// Parse a suite from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut suite = Self::from_yaml(&content)
            .map_err(|e| E2eError::SpecParse(format!("{}: {}", path.display(), e)))?;
        suite.source = Some(path.to_path_buf());
        Ok(suite)
    }

    /// Load all suites from a directory, ordered by file name
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut suites = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            let suite = Self::from_file(entry.path())?;
            suites.push(suite);
        }

        let mut seen = HashSet::new();
        for suite in &suites {
            if !seen.insert(suite.name.as_str()) {
                return Err(E2eError::SpecParse(format!(
                    "duplicate suite name '{}'",
                    suite.name
                )));
            }
        }

        Ok(suites)
    }

    /// Filter suites by tag, on the suite or on any of its scenarios
    pub fn filter_by_tag<'a>(suites: &'a [Self], tag: &str) -> Vec<&'a Self> {
        suites
            .iter()
            .filter(|s| s.has_tag(tag) || s.scenarios.iter().any(|sc| sc.has_tag(tag)))
            .collect()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Name of the selector map to bind
    pub fn selector_map(&self) -> String {
        match (&self.selectors, self.site) {
            (Some(name), _) => name.clone(),
            (None, Site::Storefront) => STOREFRONT.to_string(),
            (None, Site::Finance) => finance_map_name(1),
        }
    }

    /// Structural checks that do not need a browser
    pub fn validate(&self) -> E2eResult<()> {
        if self.scenarios.is_empty() {
            return Err(E2eError::SpecParse(format!(
                "suite '{}' has no scenarios",
                self.name
            )));
        }

        let mut names = HashSet::new();
        for scenario in &self.scenarios {
            if !names.insert(scenario.name.as_str()) {
                return Err(E2eError::SpecParse(format!(
                    "suite '{}': duplicate scenario name '{}'",
                    self.name, scenario.name
                )));
            }
        }

        let shared = &self.shared;
        for step in self.setup.iter().chain(&self.before_each).chain(&self.teardown) {
            check_record_args(step, shared, None)?;
        }
        for scenario in &self.scenarios {
            for step in scenario.steps.iter().chain(&scenario.cleanup) {
                check_record_args(step, shared, Some(&scenario.fixtures))?;
            }
        }
        Ok(())
    }
}

impl ScenarioSpec {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

fn check_record_args(
    step: &Step,
    shared: &BTreeMap<String, FixtureSource>,
    local: Option<&BTreeMap<String, FixtureSource>>,
) -> E2eResult<()> {
    for (alias, kind) in step.record_args() {
        let source = local
            .and_then(|l| l.get(alias))
            .or_else(|| shared.get(alias))
            .ok_or_else(|| E2eError::UnknownAlias(alias.to_string()))?;
        if source.kind() != kind {
            return Err(E2eError::SpecParse(format!(
                "{}: alias '{}' is a {}, expected a {}",
                step.label(),
                alias,
                source.kind(),
                kind
            )));
        }
    }
    for child in step.children() {
        check_record_args(child, shared, local)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopflow_common::Locator;

    #[test]
    fn test_parse_suite() {
        let yaml = r#"
name: login
description: Login with correct credentials
tags: [auth, smoke]
isolate: true
scenarios:
  - name: correct credentials
    fixtures:
      account: user
    steps:
      - action: register
        user: account
      - action: logout
        expect: logged_out
      - action: login
        email: "{account.email}"
        password: "{account.password}"
        expect: logged_in
      - action: expect_text
        text: "Logged in as {account.name}"
    cleanup:
      - action: delete_account
"#;
        let suite = SuiteSpec::from_yaml(yaml).unwrap();
        assert_eq!(suite.name, "login");
        assert_eq!(suite.site, Site::Storefront);
        assert_eq!(suite.selector_map(), "storefront");
        assert!(suite.isolate);
        let scenario = &suite.scenarios[0];
        assert_eq!(scenario.steps.len(), 4);
        assert!(matches!(
            scenario.steps[2],
            Step::Login { expect: Some(LoginOutcome::LoggedIn), .. }
        ));
        assert_eq!(scenario.cleanup.len(), 1);
    }

    #[test]
    fn test_parse_targets_and_branches() {
        let yaml = r#"
name: finance
site: finance
selectors: finance-v3
scenarios:
  - name: inline
    steps:
      - action: open_finance
      - action: expect_count
        target:
          xpath: //tbody//tr
        count: 1
      - action: if_present
        target: nav_logout
        then:
          - action: click
            target: nav_logout
        else:
          - action: log
            message: already out
      - action: expect_url
        equals: https://devfinance-agilizei.netlify.app/
"#;
        let suite = SuiteSpec::from_yaml(yaml).unwrap();
        assert_eq!(suite.selector_map(), "finance-v3");
        let steps = &suite.scenarios[0].steps;
        match &steps[1] {
            Step::ExpectCount { target, count } => {
                assert_eq!(target, &Target::Inline(Locator::xpath("//tbody//tr")));
                assert_eq!(*count, 1);
            }
            other => panic!("unexpected step {other:?}"),
        }
        match &steps[2] {
            Step::IfPresent { then, otherwise, .. } => {
                assert_eq!(then.len(), 1);
                assert_eq!(otherwise.len(), 1);
            }
            other => panic!("unexpected step {other:?}"),
        }
    }

    #[test]
    fn test_finance_site_defaults_to_first_strategy() {
        let yaml = r#"
name: finance
site: finance
scenarios:
  - name: open
    steps:
      - action: open_finance
"#;
        assert_eq!(SuiteSpec::from_yaml(yaml).unwrap().selector_map(), "finance-v1");
    }

    #[test]
    fn test_undeclared_alias_is_rejected() {
        let yaml = r#"
name: broken
scenarios:
  - name: register
    steps:
      - action: register
        user: ghost
"#;
        let err = SuiteSpec::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, E2eError::UnknownAlias(alias) if alias == "ghost"));
    }

    #[test]
    fn test_alias_kind_mismatch_is_rejected() {
        let yaml = r#"
name: broken
shared:
  note: contact
scenarios:
  - name: register
    steps:
      - action: if_text
        text: New User Signup!
        then:
          - action: register
            user: note
"#;
        assert!(matches!(
            SuiteSpec::from_yaml(yaml).unwrap_err(),
            E2eError::SpecParse(_)
        ));
    }

    #[test]
    fn test_duplicate_scenario_names_are_rejected() {
        let yaml = r#"
name: dup
scenarios:
  - name: same
    steps: [{action: open_home}]
  - name: same
    steps: [{action: open_home}]
"#;
        assert!(SuiteSpec::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let yaml = r#"
name: bad
scenarios:
  - name: bad
    steps:
      - action: teleport
"#;
        assert!(SuiteSpec::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_filter_by_scenario_tag() {
        let a = SuiteSpec::from_yaml(
            "name: a\nscenarios:\n  - name: x\n    tags: [smoke]\n    steps: [{action: open_home}]\n",
        )
        .unwrap();
        let b = SuiteSpec::from_yaml(
            "name: b\nscenarios:\n  - name: y\n    steps: [{action: open_home}]\n",
        )
        .unwrap();
        let suites = vec![a, b];
        let picked = SuiteSpec::filter_by_tag(&suites, "smoke");
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].name, "a");
    }

    #[test]
    fn test_url_expectation_prefers_equals() {
        let e = Step::url_expectation(&Some("/login".into()), &Some("https://x/".into())).unwrap();
        assert_eq!(e, UrlExpectation::Equals("https://x/".into()));
        assert!(Step::url_expectation(&None, &None).is_err());
    }
}
