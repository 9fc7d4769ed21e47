//! Step execution
//!
//! Turns [`Step`]s into calls on [`Page`] and the workflow objects, with
//! fixture aliases bound per scope.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use futures::future::{BoxFuture, FutureExt};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use shopflow_common::{
    ContactRecord, Fixture, FixtureGenerator, ProfileFixture, TransactionRecord, UserRecord,
};
use tracing::{debug, info};

use crate::actions::Page;
use crate::error::{E2eError, E2eResult};
use crate::spec::{FixtureSource, Step};
use crate::workflows::{FinanceTracker, Storefront};

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\.([A-Za-z_][A-Za-z0-9_]*)\}")
        .expect("placeholder pattern is valid")
});

/// Where fixtures come from
#[derive(Debug, Clone)]
pub struct FixtureContext {
    pub generator: FixtureGenerator,
    /// Loaded profile, required by `profile_user` / `profile_contact`
    pub profile: Option<ProfileFixture>,
    /// Base for relative attachment paths
    pub fixtures_dir: PathBuf,
}

impl FixtureContext {
    pub fn new(fixtures_dir: &Path) -> Self {
        Self {
            generator: FixtureGenerator::default(),
            profile: None,
            fixtures_dir: fixtures_dir.to_path_buf(),
        }
    }

    /// Load `profile.json` from the fixtures directory when it exists
    pub fn with_profile(mut self) -> E2eResult<Self> {
        let path = self.fixtures_dir.join("profile.json");
        if path.exists() {
            self.profile = Some(ProfileFixture::load(&path)?);
        }
        Ok(self)
    }

    pub fn materialize(&self, source: FixtureSource) -> E2eResult<Fixture> {
        let gen = &self.generator;
        Ok(match source {
            FixtureSource::User => Fixture::User(gen.generate_user_data()),
            FixtureSource::Contact => Fixture::Contact(gen.generate_contact_data()),
            FixtureSource::Transaction => Fixture::Transaction(gen.generate_transaction()),
            FixtureSource::ProfileUser => Fixture::User(self.profile()?.user_record(gen)),
            FixtureSource::ProfileContact => {
                Fixture::Contact(self.profile()?.contact_record(gen, &self.fixtures_dir))
            }
        })
    }

    fn profile(&self) -> E2eResult<&ProfileFixture> {
        self.profile.as_ref().ok_or_else(|| {
            E2eError::InvalidConfig(format!(
                "no profile.json in {}",
                self.fixtures_dir.display()
            ))
        })
    }
}

/// Alias -> record, for one suite or scenario scope
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Bindings {
    records: BTreeMap<String, Fixture>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Materialise every declared alias on top of `parent`
    pub fn materialize(
        parent: &Bindings,
        sources: &BTreeMap<String, FixtureSource>,
        ctx: &FixtureContext,
    ) -> E2eResult<Self> {
        let mut bindings = parent.clone();
        for (alias, source) in sources {
            let fixture = ctx.materialize(*source)?;
            debug!(alias = %alias, kind = fixture.kind(), "bound fixture");
            bindings.insert(alias, fixture);
        }
        Ok(bindings)
    }

    pub fn insert(&mut self, alias: &str, fixture: Fixture) {
        self.records.insert(alias.to_string(), fixture);
    }

    pub fn get(&self, alias: &str) -> E2eResult<&Fixture> {
        self.records
            .get(alias)
            .ok_or_else(|| E2eError::UnknownAlias(alias.to_string()))
    }

    pub fn user(&self, alias: &str) -> E2eResult<&UserRecord> {
        match self.get(alias)? {
            Fixture::User(u) => Ok(u),
            other => Err(kind_mismatch(alias, other, "user")),
        }
    }

    pub fn contact(&self, alias: &str) -> E2eResult<&ContactRecord> {
        match self.get(alias)? {
            Fixture::Contact(c) => Ok(c),
            other => Err(kind_mismatch(alias, other, "contact")),
        }
    }

    pub fn transaction(&self, alias: &str) -> E2eResult<&TransactionRecord> {
        match self.get(alias)? {
            Fixture::Transaction(t) => Ok(t),
            other => Err(kind_mismatch(alias, other, "transaction")),
        }
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    /// Replace every `{alias.field}` in `template`.
    ///
    /// Braces that do not form a placeholder are left alone.
    pub fn interpolate(&self, template: &str) -> E2eResult<String> {
        let mut out = String::with_capacity(template.len());
        let mut last = 0;
        for caps in PLACEHOLDER.captures_iter(template) {
            let (Some(whole), Some(alias), Some(field)) = (caps.get(0), caps.get(1), caps.get(2))
            else {
                continue;
            };
            out.push_str(&template[last..whole.start()]);
            out.push_str(&self.get(alias.as_str())?.field(field.as_str())?);
            last = whole.end();
        }
        out.push_str(&template[last..]);
        Ok(out)
    }
}

fn kind_mismatch(alias: &str, actual: &Fixture, expected: &str) -> E2eError {
    E2eError::SpecParse(format!(
        "alias '{alias}' is a {}, expected a {expected}",
        actual.kind()
    ))
}

/// Outcome of one executed step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub label: String,
    pub success: bool,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Runs steps against one page with one set of bindings
pub struct Executor<'a> {
    page: &'a Page<'a>,
    bindings: &'a Bindings,
    fixtures_dir: &'a Path,
    screenshot_dir: &'a Path,
}

impl<'a> Executor<'a> {
    pub fn new(
        page: &'a Page<'a>,
        bindings: &'a Bindings,
        fixtures_dir: &'a Path,
        screenshot_dir: &'a Path,
    ) -> Self {
        Self {
            page,
            bindings,
            fixtures_dir,
            screenshot_dir,
        }
    }

    pub fn page(&self) -> &'a Page<'a> {
        self.page
    }

    /// Run steps in order, stopping at the first failure
    pub async fn run_steps(&self, steps: &[Step], trace: &mut Vec<StepResult>) -> E2eResult<()> {
        for step in steps {
            self.run_step(step, trace).await?;
        }
        Ok(())
    }

    /// Run one step and record it in `trace`. Branch steps record their
    /// children after themselves.
    pub fn run_step<'s>(
        &'s self,
        step: &'s Step,
        trace: &'s mut Vec<StepResult>,
    ) -> BoxFuture<'s, E2eResult<()>> {
        async move {
            let label = step.label();
            debug!("step: {}", label);
            let slot = trace.len();
            trace.push(StepResult {
                label: label.clone(),
                success: false,
                duration_ms: 0,
                error: None,
            });

            let start = Instant::now();
            let result = self.apply(step, trace).await;
            let entry = &mut trace[slot];
            entry.duration_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok(()) => entry.success = true,
                Err(e) => entry.error = Some(e.to_string()),
            }
            result
        }
        .boxed()
    }

    async fn apply(&self, step: &Step, trace: &mut Vec<StepResult>) -> E2eResult<()> {
        let page = self.page;
        let b = self.bindings;
        match step {
            Step::Navigate { url } => page.visit(&b.interpolate(url)?).await,
            Step::Type { target, text } => page.type_into(target, &b.interpolate(text)?).await,
            Step::Select { target, option } => {
                page.select(target, &b.interpolate(option)?).await
            }
            Step::Check { target, value } => {
                let value = value.as_deref().map(|v| b.interpolate(v)).transpose()?;
                page.check(target, value.as_deref()).await
            }
            Step::Click { target } => page.click(target).await,
            Step::Upload { target, file } => {
                let file = self.fixture_path(&b.interpolate(file)?);
                page.upload(target, &file).await
            }
            Step::ExpectText { text } => page.expect_text(&b.interpolate(text)?).await,
            Step::ExpectVisible { target } => page.expect_visible(target).await,
            Step::ExpectAbsent { target } => page.expect_absent(target).await,
            Step::ExpectElementText { target, contains } => {
                page.expect_element_text(target, &b.interpolate(contains)?)
                    .await
            }
            Step::ExpectCount { target, count } => page.expect_count(target, *count).await,
            Step::ExpectUrl { contains, equals } => {
                let contains = contains.as_deref().map(|c| b.interpolate(c)).transpose()?;
                let equals = equals.as_deref().map(|e| b.interpolate(e)).transpose()?;
                page.expect_url(&Step::url_expectation(&contains, &equals)?)
                    .await
            }
            Step::IfPresent {
                target,
                then,
                otherwise,
            } => {
                let branch = if page.is_present(target).await? {
                    then
                } else {
                    otherwise
                };
                self.run_steps(branch, trace).await
            }
            Step::IfText {
                text,
                then,
                otherwise,
            } => {
                let branch = if page.body_contains(&b.interpolate(text)?).await? {
                    then
                } else {
                    otherwise
                };
                self.run_steps(branch, trace).await
            }
            Step::IfUrl {
                contains,
                then,
                otherwise,
            } => {
                let fragment = b.interpolate(contains)?;
                let branch = if page.url().await?.contains(&fragment) {
                    then
                } else {
                    otherwise
                };
                self.run_steps(branch, trace).await
            }
            Step::Screenshot { name } => {
                let name = b.interpolate(name)?;
                std::fs::create_dir_all(self.screenshot_dir)?;
                let path = self
                    .screenshot_dir
                    .join(format!("{}.png", sanitize_file_name(&name)));
                page.driver().screenshot(&path).await
            }
            Step::Log { message } => {
                info!("{}", b.interpolate(message)?);
                Ok(())
            }

            Step::OpenHome => self.storefront().open_home().await,
            Step::NavigateToSignupLogin => self.storefront().navigate_to_signup_login().await,
            Step::StartSignup {
                name,
                email,
                expect,
            } => {
                let outcome = self
                    .storefront()
                    .start_signup(&b.interpolate(name)?, &b.interpolate(email)?)
                    .await?;
                check_outcome("signup", *expect, outcome)
            }
            Step::FillProfile { user } => {
                self.storefront().fill_profile_details(b.user(user)?).await
            }
            Step::SubmitRegistration { user } => {
                self.storefront().submit_registration(b.user(user)?).await
            }
            Step::Register { user } => self.storefront().register(b.user(user)?).await,
            Step::Login {
                email,
                password,
                expect,
            } => {
                let outcome = self
                    .storefront()
                    .login(&b.interpolate(email)?, &b.interpolate(password)?)
                    .await?;
                check_outcome("login", *expect, outcome)
            }
            Step::Logout { expect } => {
                let outcome = self.storefront().logout().await?;
                check_outcome("logout", *expect, outcome)
            }
            Step::DeleteAccount { expect } => {
                let outcome = self.storefront().delete_account().await?;
                check_outcome("delete_account", *expect, outcome)
            }
            Step::CleanupAccount { user } => {
                self.storefront().cleanup_account(b.user(user)?).await?;
                Ok(())
            }
            Step::SubmitContact {
                contact,
                attachment,
            } => {
                let attachment = attachment
                    .as_deref()
                    .map(|a| b.interpolate(a).map(|a| self.fixture_path(&a)))
                    .transpose()?;
                self.storefront()
                    .submit_contact_form(b.contact(contact)?, attachment.as_deref())
                    .await
            }
            Step::ReturnHome => self.storefront().return_home_from_contact().await,
            Step::OpenFinance => self.finance().open().await,
            Step::AddTransaction { transaction } => {
                self.finance()
                    .add_transaction(b.transaction(transaction)?)
                    .await
            }
        }
    }

    fn storefront(&self) -> Storefront<'a> {
        Storefront::new(self.page)
    }

    fn finance(&self) -> FinanceTracker<'a> {
        FinanceTracker::new(self.page)
    }

    fn fixture_path(&self, file: &str) -> PathBuf {
        let path = Path::new(file);
        if path.is_relative() {
            self.fixtures_dir.join(path)
        } else {
            path.to_path_buf()
        }
    }
}

fn check_outcome<T>(what: &str, expected: Option<T>, actual: T) -> E2eResult<()>
where
    T: PartialEq + std::fmt::Debug,
{
    match expected {
        Some(expected) if expected != actual => Err(E2eError::AssertionFailed(format!(
            "{what}: expected {expected:?}, got {actual:?}"
        ))),
        _ => {
            debug!("{} outcome: {:?}", what, actual);
            Ok(())
        }
    }
}

/// File-system safe version of a step or scenario name
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn bindings() -> Bindings {
        let gen = FixtureGenerator::default();
        let mut b = Bindings::new();
        b.insert("account", Fixture::User(gen.generate_user_data()));
        b.insert("note", Fixture::Contact(gen.generate_contact_data()));
        b
    }

    #[test]
    fn test_interpolate_fields() {
        let b = bindings();
        let user = b.user("account").unwrap().clone();
        let out = b
            .interpolate("Logged in as {account.name} <{account.email}>")
            .unwrap();
        assert_eq!(out, format!("Logged in as {} <{}>", user.name, user.email));
    }

    #[test]
    fn test_interpolate_leaves_other_braces() {
        let b = bindings();
        assert_eq!(b.interpolate("{} {x} {unique}").unwrap(), "{} {x} {unique}");
    }

    #[test]
    fn test_unknown_alias() {
        let err = bindings().interpolate("{ghost.email}").unwrap_err();
        assert!(matches!(err, E2eError::UnknownAlias(a) if a == "ghost"));
    }

    #[test]
    fn test_unknown_field() {
        let err = bindings().interpolate("{account.shoe_size}").unwrap_err();
        assert!(matches!(err, E2eError::Common(_)));
    }

    #[test]
    fn test_kind_mismatch() {
        assert!(bindings().user("note").is_err());
        assert!(bindings().contact("note").is_ok());
    }

    #[test]
    fn test_scope_inherits_parent() {
        let ctx = FixtureContext::new(Path::new("."));
        let parent = bindings();
        let mut sources = BTreeMap::new();
        sources.insert("entry".to_string(), FixtureSource::Transaction);
        let scoped = Bindings::materialize(&parent, &sources, &ctx).unwrap();
        assert!(scoped.user("account").is_ok());
        assert!(scoped.transaction("entry").is_ok());
        assert_eq!(scoped.aliases().count(), 3);
    }

    #[test]
    fn test_profile_sources_need_a_profile() {
        let ctx = FixtureContext::new(Path::new("/nonexistent"));
        assert!(matches!(
            ctx.materialize(FixtureSource::ProfileUser),
            Err(E2eError::InvalidConfig(_))
        ));
    }

    #[test_case("Register user", "register-user")]
    #[test_case("login: wrong/password", "login-wrong-password")]
    #[test_case("__ok__", "__ok__")]
    fn test_sanitize_file_name(input: &str, expected: &str) {
        assert_eq!(sanitize_file_name(input), expected);
    }

    #[test]
    fn test_check_outcome() {
        assert!(check_outcome("login", None, 1).is_ok());
        assert!(check_outcome("login", Some(1), 1).is_ok());
        assert!(matches!(
            check_outcome("login", Some(1), 2),
            Err(E2eError::AssertionFailed(_))
        ));
    }
}
