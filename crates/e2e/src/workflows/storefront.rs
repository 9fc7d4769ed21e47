//! Storefront workflows: signup, login, logout, account deletion, contact form

use std::path::Path;

use serde::{Deserialize, Serialize};
use shopflow_common::{ContactRecord, UserRecord};
use tracing::{debug, info, warn};

use super::text;
use crate::actions::{Page, Target, UrlExpectation};
use crate::error::{E2eError, E2eResult};
use crate::session::{probe_session, SessionState};

/// Where the signup form led
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignupOutcome {
    /// The account information form opened
    AccountForm,
    /// The site already knows this email
    EmailTaken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginOutcome {
    LoggedIn,
    /// The site answered with the incorrect-credentials message
    Rejected,
    /// The browser refused to submit, e.g. empty required fields
    NotSubmitted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoutOutcome {
    LoggedOut,
    AlreadyLoggedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    Deleted,
    /// No session, so nothing to delete
    NoAccount,
}

fn el(name: &str) -> Target {
    Target::named(name)
}

/// Workflows against automationexercise.com
pub struct Storefront<'a> {
    page: &'a Page<'a>,
}

impl<'a> Storefront<'a> {
    pub fn new(page: &'a Page<'a>) -> Self {
        Self { page }
    }

    pub fn page(&self) -> &'a Page<'a> {
        self.page
    }

    pub async fn open_home(&self) -> E2eResult<()> {
        self.page.visit("/").await?;
        self.page.expect_text(text::HOME_BRAND).await
    }

    pub async fn navigate_to_signup_login(&self) -> E2eResult<()> {
        self.page.click(&el("nav_login")).await?;
        self.page.expect_text(text::NEW_USER_SIGNUP).await
    }

    /// Submit the short signup form. Expects the signup form to be showing.
    pub async fn start_signup(&self, name: &str, email: &str) -> E2eResult<SignupOutcome> {
        self.page.expect_text(text::NEW_USER_SIGNUP).await?;
        self.page.type_into(&el("signup_name"), name).await?;
        self.page.type_into(&el("signup_email"), email).await?;
        self.page.click(&el("signup_button")).await?;

        match self
            .page
            .first_of(&[text::ENTER_ACCOUNT_INFORMATION, text::EMAIL_ALREADY_EXISTS])
            .await?
        {
            Some(0) => Ok(SignupOutcome::AccountForm),
            Some(_) => {
                debug!(email, "signup rejected: email taken");
                Ok(SignupOutcome::EmailTaken)
            }
            None => Err(E2eError::AssertionFailed(format!(
                "signup for {email} showed neither \"{}\" nor \"{}\"",
                text::ENTER_ACCOUNT_INFORMATION,
                text::EMAIL_ALREADY_EXISTS
            ))),
        }
    }

    pub async fn fill_profile_details(&self, user: &UserRecord) -> E2eResult<()> {
        let page = self.page;
        page.expect_text(text::ENTER_ACCOUNT_INFORMATION).await?;

        page.check(&el("title"), Some(user.title.as_str())).await?;
        page.type_into(&el("password"), &user.password).await?;
        page.select(&el("birth_day"), &user.birth_date.day).await?;
        page.select(&el("birth_month"), &user.birth_date.month).await?;
        page.select(&el("birth_year"), &user.birth_date.year).await?;

        if user.newsletter {
            page.check(&el("newsletter"), None).await?;
        }
        if user.offers {
            page.check(&el("optin"), None).await?;
        }

        page.type_into(&el("first_name"), &user.first_name).await?;
        page.type_into(&el("last_name"), &user.last_name).await?;
        if !user.company.is_empty() {
            page.type_into(&el("company"), &user.company).await?;
        }
        page.type_into(&el("address"), &user.address).await?;
        page.select(&el("country"), &user.country).await?;
        page.type_into(&el("state"), &user.state).await?;
        page.type_into(&el("city"), &user.city).await?;
        page.type_into(&el("zipcode"), &user.zipcode).await?;
        page.type_into(&el("mobile_number"), &user.mobile_number).await
    }

    pub async fn submit_registration(&self, user: &UserRecord) -> E2eResult<()> {
        let page = self.page;
        page.click(&el("create_account")).await?;
        page.expect_url(&UrlExpectation::Contains("account_created".into()))
            .await?;
        page.expect_text(text::ACCOUNT_CREATED).await?;
        page.click(&el("continue_button")).await?;
        page.expect_text(&text::logged_in_as(&user.name)).await?;
        info!(email = %user.email, "account created");
        Ok(())
    }

    /// Full registration from wherever the browser is. The email must be fresh.
    pub async fn register(&self, user: &UserRecord) -> E2eResult<()> {
        match probe_session(self.page).await? {
            SessionState::LoggedIn => {
                self.logout().await?;
            }
            SessionState::Unknown => self.open_home().await?,
            SessionState::LoggedOut => {}
        }
        if !self.page.body_contains(text::NEW_USER_SIGNUP).await? {
            self.navigate_to_signup_login().await?;
        }

        match self.start_signup(&user.name, &user.email).await? {
            SignupOutcome::AccountForm => {}
            SignupOutcome::EmailTaken => {
                return Err(E2eError::AssertionFailed(format!(
                    "cannot register {}: \"{}\"",
                    user.email,
                    text::EMAIL_ALREADY_EXISTS
                )))
            }
        }
        self.fill_profile_details(user).await?;
        self.submit_registration(user).await
    }

    /// Log in, ending any existing session first.
    pub async fn login(&self, email: &str, password: &str) -> E2eResult<LoginOutcome> {
        let page = self.page;
        match probe_session(page).await? {
            SessionState::LoggedIn => {
                self.logout().await?;
            }
            SessionState::Unknown => self.open_home().await?,
            SessionState::LoggedOut => {}
        }

        if !page.body_contains(text::LOGIN_TO_YOUR_ACCOUNT).await? {
            page.click(&el("nav_login")).await?;
        }
        page.expect_text(text::LOGIN_TO_YOUR_ACCOUNT).await?;

        page.type_into(&el("login_email"), email).await?;
        page.type_into(&el("login_password"), password).await?;
        page.click(&el("login_button")).await?;

        if email.is_empty() || password.is_empty() {
            // required fields block the submit in the browser
            page.expect_url(&UrlExpectation::Contains("/login".into()))
                .await?;
            return Ok(LoginOutcome::NotSubmitted);
        }

        match page
            .first_of(&[text::LOGGED_IN_AS, text::INCORRECT_CREDENTIALS])
            .await?
        {
            Some(0) => {
                info!(email, "logged in");
                Ok(LoginOutcome::LoggedIn)
            }
            Some(_) => Ok(LoginOutcome::Rejected),
            None => Err(E2eError::AssertionFailed(format!(
                "login as {email} showed neither \"{}\" nor \"{}\"",
                text::LOGGED_IN_AS,
                text::INCORRECT_CREDENTIALS
            ))),
        }
    }

    pub async fn logout(&self) -> E2eResult<LogoutOutcome> {
        let page = self.page;
        if !probe_session(page).await?.is_logged_in() {
            return Ok(LogoutOutcome::AlreadyLoggedOut);
        }
        page.click(&el("nav_logout")).await?;
        page.expect_url(&UrlExpectation::Contains("/login".into()))
            .await?;
        page.expect_text(text::LOGIN_TO_YOUR_ACCOUNT).await?;
        Ok(LogoutOutcome::LoggedOut)
    }

    pub async fn delete_account(&self) -> E2eResult<DeleteOutcome> {
        let page = self.page;
        if !page.is_present(&el("nav_delete_account")).await? {
            return Ok(DeleteOutcome::NoAccount);
        }
        page.click(&el("nav_delete_account")).await?;
        page.expect_text(text::ACCOUNT_DELETED).await?;
        page.click(&el("continue_button")).await?;
        info!("account deleted");
        Ok(DeleteOutcome::Deleted)
    }

    /// Best-effort removal of `user`'s account, whatever the current page.
    ///
    /// Always authenticates as `user` first: the banner only shows a display
    /// name, so an existing session may belong to another account.
    pub async fn cleanup_account(&self, user: &UserRecord) -> E2eResult<DeleteOutcome> {
        self.open_home().await?;
        match self.login(&user.email, &user.password).await? {
            LoginOutcome::LoggedIn => {}
            outcome => {
                warn!(email = %user.email, ?outcome, "cleanup: could not log in");
                return Ok(DeleteOutcome::NoAccount);
            }
        }
        self.page.expect_text(&text::logged_in_as(&user.name)).await?;
        self.delete_account().await
    }

    pub async fn submit_contact_form(
        &self,
        contact: &ContactRecord,
        attachment: Option<&Path>,
    ) -> E2eResult<()> {
        let page = self.page;
        if page.is_present(&el("nav_contact")).await? {
            page.click(&el("nav_contact")).await?;
        } else {
            page.visit("/contact_us").await?;
        }
        page.expect_url(&UrlExpectation::Contains("/contact_us".into()))
            .await?;
        page.expect_visible(&el("contact_heading")).await?;

        page.type_into(&el("contact_name"), &contact.name).await?;
        page.type_into(&el("contact_email"), &contact.email).await?;
        page.type_into(&el("contact_subject"), &contact.subject).await?;
        page.type_into(&el("contact_message"), &contact.message).await?;
        if let Some(file) = attachment.or(contact.attachment.as_deref()) {
            page.upload(&el("contact_upload"), file).await?;
        }
        page.click(&el("contact_submit")).await?;

        page.expect_element_text(&el("contact_status"), text::CONTACT_SUCCESS)
            .await?;
        page.expect_visible(&el("contact_status")).await
    }

    pub async fn return_home_from_contact(&self) -> E2eResult<()> {
        let page = self.page;
        page.click(&el("contact_home")).await?;
        page.expect_url(&UrlExpectation::Equals(format!("{}/", page.base_url())))
            .await?;
        page.expect_text(text::HOME_BRAND).await
    }
}
