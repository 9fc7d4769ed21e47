//! In-memory stand-ins for the storefront and the finance tracker
//!
//! [`SimulatedSite`] implements [`Driver`] without a browser. Locators are
//! mapped back to element names through the selector catalog, and each page
//! exposes the elements and texts the live site shows at that point. Only
//! the behaviour the workflows observe is modelled.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use shopflow_common::options::{COUNTRIES, FIRST_BIRTH_YEAR, LAST_BIRTH_YEAR, MONTHS};
use shopflow_common::{Locator, SelectorCatalog, TransactionRecord, UserRecord};
use tracing::debug;

use crate::config::RunConfig;
use crate::driver::Driver;
use crate::error::{E2eError, E2eResult};
use crate::spec::Site;
use crate::workflows::text;

/// 1x1 transparent PNG written for screenshots
const BLANK_PNG: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f,
    0x15, 0xc4, 0x89, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9c, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0d, 0x0a, 0x2d, 0xb4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
];

const NAV_ALWAYS: &[&str] = &["nav_contact"];
const NAV_LOGGED_OUT: &[&str] = &["nav_login"];
const NAV_LOGGED_IN: &[&str] = &["nav_logout", "nav_delete_account"];

const LOGIN_PAGE: &[&str] = &[
    "signup_name",
    "signup_email",
    "signup_button",
    "login_email",
    "login_password",
    "login_button",
];

const ACCOUNT_FORM: &[&str] = &[
    "title",
    "password",
    "birth_day",
    "birth_month",
    "birth_year",
    "newsletter",
    "optin",
    "first_name",
    "last_name",
    "company",
    "address",
    "country",
    "state",
    "city",
    "zipcode",
    "mobile_number",
    "create_account",
];

/// Fields the account form refuses to submit without
const ACCOUNT_REQUIRED: &[&str] = &[
    "password",
    "first_name",
    "last_name",
    "address",
    "state",
    "city",
    "zipcode",
    "mobile_number",
];

const CONTACT_FORM: &[&str] = &[
    "contact_heading",
    "contact_name",
    "contact_email",
    "contact_subject",
    "contact_message",
    "contact_upload",
    "contact_submit",
];

const FINANCE_MODAL: &[&str] = &["description", "amount", "date", "save"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    Blank,
    Home,
    Login,
    AccountForm,
    AccountCreated,
    AccountDeleted,
    Contact,
    /// Any other storefront path: header only
    Other,
    Finance,
}

#[derive(Debug, Clone)]
struct Account {
    name: String,
    password: String,
}

#[derive(Debug, Default)]
struct SimState {
    screen: Option<Screen>,
    url: String,
    /// Email of the logged-in account
    session: Option<String>,
    accounts: BTreeMap<String, Account>,
    /// Name and email accepted by the short signup form
    pending_signup: Option<(String, String)>,
    /// Message rendered on the login page after a rejected submit
    notice: Option<&'static str>,
    form: HashMap<String, String>,
    checked: HashSet<String>,
    attachment: Option<PathBuf>,
    contact_sent: bool,
    modal_open: bool,
    transactions: Vec<TransactionRecord>,
    closed: bool,
}

impl SimState {
    fn screen(&self) -> Screen {
        self.screen.unwrap_or(Screen::Blank)
    }

    fn field(&self, element: &str) -> &str {
        self.form.get(element).map(String::as_str).unwrap_or("")
    }

    fn logged_in_name(&self) -> Option<&str> {
        self.session
            .as_ref()
            .and_then(|email| self.accounts.get(email))
            .map(|a| a.name.as_str())
    }
}

/// Offline model of both sites
pub struct SimulatedSite {
    storefront_url: String,
    finance_url: String,
    catalog: SelectorCatalog,
    state: Mutex<SimState>,
}

impl SimulatedSite {
    pub fn new(storefront_url: &str, finance_url: &str, catalog: SelectorCatalog) -> Self {
        Self {
            storefront_url: storefront_url.trim_end_matches('/').to_string(),
            finance_url: finance_url.trim_end_matches('/').to_string(),
            catalog,
            state: Mutex::new(SimState::default()),
        }
    }

    pub fn from_config(config: &RunConfig, catalog: SelectorCatalog) -> Self {
        Self::new(
            config.base_url(Site::Storefront),
            config.base_url(Site::Finance),
            catalog,
        )
    }

    /// Register an account as if it had been created earlier
    pub fn seed_account(&self, user: &UserRecord) {
        self.state.lock().accounts.insert(
            user.email.clone(),
            Account {
                name: user.name.clone(),
                password: user.password.clone(),
            },
        );
    }

    pub fn has_account(&self, email: &str) -> bool {
        self.state.lock().accounts.contains_key(email)
    }

    pub fn account_count(&self) -> usize {
        self.state.lock().accounts.len()
    }

    /// Email of the logged-in account
    pub fn session(&self) -> Option<String> {
        self.state.lock().session.clone()
    }

    /// Path of the last file attached to the contact form
    pub fn last_attachment(&self) -> Option<PathBuf> {
        self.state.lock().attachment.clone()
    }

    pub fn transactions(&self) -> Vec<TransactionRecord> {
        self.state.lock().transactions.clone()
    }

    fn element_name(&self, locator: &Locator) -> Option<String> {
        self.catalog
            .maps()
            .find_map(|map| map.element_for(locator))
            .map(str::to_string)
    }

    fn guard<'s>(&'s self) -> E2eResult<parking_lot::MutexGuard<'s, SimState>> {
        let state = self.state.lock();
        if state.closed {
            return Err(E2eError::Bridge("simulated browser is closed".to_string()));
        }
        Ok(state)
    }

    fn navigate(&self, state: &mut SimState, url: &str) {
        state.form.clear();
        state.checked.clear();
        state.notice = None;
        state.modal_open = false;
        state.contact_sent = false;

        if strip_base(url, &self.finance_url).is_some() {
            state.screen = Some(Screen::Finance);
            state.url = format!("{}/", self.finance_url);
            return;
        }
        let Some(path) = strip_base(url, &self.storefront_url) else {
            state.screen = Some(Screen::Blank);
            state.url = url.to_string();
            return;
        };

        let path = path.to_string();
        let screen = match path.as_str() {
            "/" => Screen::Home,
            "/login" => Screen::Login,
            "/signup" if state.pending_signup.is_some() => Screen::AccountForm,
            "/signup" => return self.navigate(state, &self.storefront_path("/login")),
            "/account_created" => Screen::AccountCreated,
            "/logout" => {
                state.session = None;
                return self.navigate(state, &self.storefront_path("/login"));
            }
            "/delete_account" => match state.session.take() {
                Some(email) => {
                    state.accounts.remove(&email);
                    debug!(%email, "simulated account deleted");
                    Screen::AccountDeleted
                }
                None => return self.navigate(state, &self.storefront_path("/login")),
            },
            "/contact_us" => Screen::Contact,
            _ => Screen::Other,
        };
        state.screen = Some(screen);
        state.url = self.storefront_path(&path);
    }

    fn storefront_path(&self, path: &str) -> String {
        format!("{}{}", self.storefront_url, path)
    }

    fn present(&self, state: &SimState, element: &str) -> bool {
        let screen = state.screen();
        if screen == Screen::Finance {
            return match element {
                "new_transaction" => true,
                "rows" => !state.transactions.is_empty(),
                e if FINANCE_MODAL.contains(&e) => state.modal_open,
                _ => false,
            };
        }
        if screen == Screen::Blank {
            return false;
        }

        let nav = if state.session.is_some() {
            NAV_LOGGED_IN
        } else {
            NAV_LOGGED_OUT
        };
        if NAV_ALWAYS.contains(&element) || nav.contains(&element) {
            return true;
        }
        match screen {
            Screen::Login => LOGIN_PAGE.contains(&element),
            Screen::AccountForm => ACCOUNT_FORM.contains(&element),
            Screen::AccountCreated | Screen::AccountDeleted => element == "continue_button",
            Screen::Contact if state.contact_sent => {
                element == "contact_status" || element == "contact_home" || element == "contact_heading"
            }
            Screen::Contact => CONTACT_FORM.contains(&element),
            _ => false,
        }
    }

    fn texts(&self, state: &SimState) -> Vec<String> {
        let screen = state.screen();
        let mut texts = Vec::new();
        match screen {
            Screen::Blank => return texts,
            Screen::Finance => {
                texts.push("+ Nova Transação".to_string());
                for tx in &state.transactions {
                    texts.push(row_text(tx));
                }
                return texts;
            }
            _ => {}
        }

        texts.push(text::HOME_BRAND.to_string());
        match state.logged_in_name() {
            Some(name) => texts.push(text::logged_in_as(name)),
            None => texts.push(text::NAV_SIGNUP_LOGIN.to_string()),
        }
        match screen {
            Screen::Login => {
                texts.push(text::LOGIN_TO_YOUR_ACCOUNT.to_string());
                texts.push(text::NEW_USER_SIGNUP.to_string());
                if let Some(notice) = state.notice {
                    texts.push(notice.to_string());
                }
            }
            Screen::AccountForm => texts.push(text::ENTER_ACCOUNT_INFORMATION.to_string()),
            Screen::AccountCreated => texts.push(text::ACCOUNT_CREATED.to_string()),
            Screen::AccountDeleted => texts.push(text::ACCOUNT_DELETED.to_string()),
            Screen::Contact => {
                texts.push(text::GET_IN_TOUCH.to_string());
                if state.contact_sent {
                    texts.push(text::CONTACT_SUCCESS.to_string());
                }
            }
            _ => {}
        }
        texts
    }

    fn count_matches(&self, state: &SimState, locator: &Locator) -> usize {
        match self.element_name(locator) {
            Some(element) if element == "rows" => {
                if state.screen() != Screen::Finance {
                    return 0;
                }
                count_rows(locator, &state.transactions)
            }
            Some(element) => usize::from(self.present(state, &element)),
            None => match locator {
                Locator::Text(t) | Locator::Contains { text: t, .. } => {
                    usize::from(self.texts(state).iter().any(|s| s.contains(t.as_str())))
                }
                Locator::Css(_) | Locator::XPath(_) => 0,
            },
        }
    }

    /// Element name for an actionable locator on the current page
    fn actionable(&self, state: &SimState, locator: &Locator) -> E2eResult<String> {
        match self.element_name(locator) {
            Some(element) if self.present(state, &element) => Ok(element),
            _ => Err(E2eError::Timeout(format!("{locator} to be actionable"))),
        }
    }

    fn click_element(&self, state: &mut SimState, element: &str) {
        match element {
            "nav_login" => self.navigate(state, &self.storefront_path("/login")),
            "nav_logout" => self.navigate(state, &self.storefront_path("/logout")),
            "nav_delete_account" => self.navigate(state, &self.storefront_path("/delete_account")),
            "nav_contact" => self.navigate(state, &self.storefront_path("/contact_us")),
            "contact_home" | "continue_button" => self.navigate(state, &self.storefront_path("/")),
            "signup_button" => self.submit_signup(state),
            "login_button" => self.submit_login(state),
            "create_account" => self.submit_account(state),
            "contact_submit" => {
                if !state.field("contact_email").is_empty() && !state.field("contact_message").is_empty()
                {
                    state.contact_sent = true;
                }
            }
            "new_transaction" => state.modal_open = true,
            "save" => self.submit_transaction(state),
            _ => {}
        }
    }

    fn submit_signup(&self, state: &mut SimState) {
        let name = state.field("signup_name").to_string();
        let email = state.field("signup_email").to_string();
        if name.is_empty() || email.is_empty() {
            return;
        }
        if state.accounts.contains_key(&email) {
            self.navigate(state, &self.storefront_path("/login"));
            state.notice = Some(text::EMAIL_ALREADY_EXISTS);
            return;
        }
        state.pending_signup = Some((name, email));
        self.navigate(state, &self.storefront_path("/signup"));
    }

    fn submit_login(&self, state: &mut SimState) {
        let email = state.field("login_email").to_string();
        let password = state.field("login_password").to_string();
        if email.is_empty() || password.is_empty() {
            return;
        }
        let accepted = state
            .accounts
            .get(&email)
            .map(|a| a.password == password)
            .unwrap_or(false);
        if accepted {
            state.session = Some(email);
            self.navigate(state, &self.storefront_path("/"));
        } else {
            self.navigate(state, &self.storefront_path("/login"));
            state.notice = Some(text::INCORRECT_CREDENTIALS);
        }
    }

    fn submit_account(&self, state: &mut SimState) {
        if ACCOUNT_REQUIRED.iter().any(|f| state.field(f).is_empty()) {
            return;
        }
        let Some((name, email)) = state.pending_signup.take() else {
            return;
        };
        let password = state.field("password").to_string();
        state.accounts.insert(email.clone(), Account { name, password });
        state.session = Some(email);
        self.navigate(state, &self.storefront_path("/account_created"));
    }

    fn submit_transaction(&self, state: &mut SimState) {
        let tx = TransactionRecord {
            description: state.field("description").to_string(),
            amount: state.field("amount").to_string(),
            date: state.field("date").to_string(),
        };
        if tx.description.is_empty() || tx.amount.is_empty() || tx.date.is_empty() {
            return;
        }
        state.transactions.push(tx);
        state.modal_open = false;
        for f in FINANCE_MODAL {
            state.form.remove(*f);
        }
    }
}

fn strip_base<'u>(url: &'u str, base: &str) -> Option<&'u str> {
    let rest = url.strip_prefix(base)?;
    let rest = rest.split(['?', '#']).next().unwrap_or("");
    match rest {
        "" => Some("/"),
        r if r.starts_with('/') => Some(r),
        _ => None,
    }
}

fn row_text(tx: &TransactionRecord) -> String {
    format!("{} {} {}", tx.description, tx.amount, tx.date)
}

/// Rows matched by a row locator: all, only the first (`[1]`), or those
/// containing a text (`contains(text(), '...')`).
fn count_rows(locator: &Locator, rows: &[TransactionRecord]) -> usize {
    let expr = match locator {
        Locator::XPath(x) | Locator::Css(x) => x.as_str(),
        _ => "",
    };
    if let Some(start) = expr.find("contains(text(), '") {
        let needle = &expr[start + "contains(text(), '".len()..];
        let needle = needle.split('\'').next().unwrap_or("");
        return rows.iter().filter(|r| row_text(r).contains(needle)).count();
    }
    if expr.ends_with("[1]") {
        return rows.len().min(1);
    }
    rows.len()
}

fn is_listed_option(element: &str, option: &str) -> bool {
    match element {
        "birth_day" => option.parse::<u32>().map(|d| (1..=31).contains(&d)).unwrap_or(false),
        "birth_month" => MONTHS.contains(&option),
        "birth_year" => option
            .parse::<i32>()
            .map(|y| (FIRST_BIRTH_YEAR..=LAST_BIRTH_YEAR).contains(&y))
            .unwrap_or(false),
        "country" => COUNTRIES.contains(&option),
        _ => true,
    }
}

#[async_trait]
impl Driver for SimulatedSite {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn goto(&self, url: &str) -> E2eResult<()> {
        let mut state = self.guard()?;
        self.navigate(&mut state, url);
        debug!(url = %state.url, "simulated goto");
        Ok(())
    }

    async fn current_url(&self) -> E2eResult<String> {
        let state = self.guard()?;
        Ok(if state.url.is_empty() {
            "about:blank".to_string()
        } else {
            state.url.clone()
        })
    }

    async fn fill(&self, target: &Locator, value: &str) -> E2eResult<()> {
        let mut state = self.guard()?;
        let element = self.actionable(&state, target)?;
        state.form.insert(element, value.to_string());
        Ok(())
    }

    async fn select_option(&self, target: &Locator, option: &str) -> E2eResult<()> {
        let mut state = self.guard()?;
        let element = self.actionable(&state, target)?;
        if !is_listed_option(&element, option) {
            return Err(E2eError::Playwright(format!(
                "{target}: no option '{option}'"
            )));
        }
        state.form.insert(element, option.to_string());
        Ok(())
    }

    async fn check(&self, target: &Locator, value: Option<&str>) -> E2eResult<()> {
        let mut state = self.guard()?;
        let element = self.actionable(&state, target)?;
        if element == "title" {
            let value = value.unwrap_or("Mr");
            if value != "Mr" && value != "Mrs" {
                return Err(E2eError::Timeout(format!("{target} with value '{value}'")));
            }
            state.form.insert(element, value.to_string());
        } else {
            state.checked.insert(element);
        }
        Ok(())
    }

    async fn click(&self, target: &Locator) -> E2eResult<()> {
        let mut state = self.guard()?;
        let element = self.actionable(&state, target)?;
        self.click_element(&mut state, &element);
        Ok(())
    }

    async fn set_input_files(&self, target: &Locator, file: &Path) -> E2eResult<()> {
        let mut state = self.guard()?;
        self.actionable(&state, target)?;
        if !file.is_file() {
            return Err(E2eError::Playwright(format!(
                "cannot attach {}: no such file",
                file.display()
            )));
        }
        state.attachment = Some(file.to_path_buf());
        Ok(())
    }

    async fn count(&self, target: &Locator) -> E2eResult<usize> {
        let state = self.guard()?;
        Ok(self.count_matches(&state, target))
    }

    async fn is_visible(&self, target: &Locator) -> E2eResult<bool> {
        let state = self.guard()?;
        Ok(self.count_matches(&state, target) > 0)
    }

    async fn inner_text(&self, target: &Locator) -> E2eResult<Option<String>> {
        let state = self.guard()?;
        if self.count_matches(&state, target) == 0 {
            return Ok(None);
        }
        let text = match self.element_name(target).as_deref() {
            Some("rows") => state.transactions.first().map(row_text).unwrap_or_default(),
            Some("contact_status") => text::CONTACT_SUCCESS.to_string(),
            Some("contact_heading") => text::GET_IN_TOUCH.to_string(),
            Some("nav_login") => text::NAV_SIGNUP_LOGIN.to_string(),
            Some("nav_logout") => "Logout".to_string(),
            Some(element) => state.field(element).to_string(),
            None => match target {
                Locator::Text(t) | Locator::Contains { text: t, .. } => t.clone(),
                _ => String::new(),
            },
        };
        Ok(Some(text))
    }

    async fn has_text(&self, text: &str) -> E2eResult<bool> {
        let state = self.guard()?;
        Ok(self.texts(&state).iter().any(|t| t.contains(text)))
    }

    async fn clear_cookies(&self) -> E2eResult<()> {
        let mut state = self.guard()?;
        state.session = None;
        state.pending_signup = None;
        if state.screen() == Screen::Finance {
            state.transactions.clear();
        }
        state.screen = Some(Screen::Blank);
        state.url = "about:blank".to_string();
        Ok(())
    }

    async fn screenshot(&self, path: &Path) -> E2eResult<()> {
        self.guard()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, BLANK_PNG)?;
        Ok(())
    }

    async fn close(&self) -> E2eResult<()> {
        self.state.lock().closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopflow_common::SelectorMap;

    fn site() -> SimulatedSite {
        SimulatedSite::new(
            "https://shop.test",
            "https://finance.test",
            SelectorCatalog::builtin(),
        )
    }

    fn sel(name: &str) -> Locator {
        SelectorMap::storefront().get(name).unwrap().clone()
    }

    #[test]
    fn test_strip_base() {
        assert_eq!(strip_base("https://shop.test", "https://shop.test"), Some("/"));
        assert_eq!(strip_base("https://shop.test/login?x=1", "https://shop.test"), Some("/login"));
        assert_eq!(strip_base("https://shop.testing/", "https://shop.test"), None);
        assert_eq!(strip_base("https://other.test/", "https://shop.test"), None);
    }

    #[test]
    fn test_count_rows_by_strategy() {
        let rows = vec![
            TransactionRecord {
                description: "Mesada".into(),
                amount: "100".into(),
                date: "2023-02-01".into(),
            },
            TransactionRecord {
                description: "Rent".into(),
                amount: "900".into(),
                date: "2023-02-02".into(),
            },
        ];
        let count_for = |strategy: u8| {
            let map = SelectorMap::finance(strategy).unwrap();
            count_rows(map.get("rows").unwrap(), &rows)
        };
        assert_eq!(count_for(1), 2);
        assert_eq!(count_for(3), 1);
        assert_eq!(count_for(6), 1);
    }

    #[tokio::test]
    async fn test_home_shows_login_link_when_anonymous() {
        let site = site();
        site.goto("https://shop.test/").await.unwrap();
        assert_eq!(site.count(&sel("nav_login")).await.unwrap(), 1);
        assert_eq!(site.count(&sel("nav_logout")).await.unwrap(), 0);
        assert!(site.has_text("AutomationExercise").await.unwrap());
    }

    #[tokio::test]
    async fn test_click_on_absent_element_fails() {
        let site = site();
        site.goto("https://shop.test/").await.unwrap();
        let err = site.click(&sel("login_button")).await.unwrap_err();
        assert!(matches!(err, E2eError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_unlisted_country_is_rejected() {
        let site = site();
        site.goto("https://shop.test/login").await.unwrap();
        site.fill(&sel("signup_name"), "A").await.unwrap();
        site.fill(&sel("signup_email"), "a@b.test").await.unwrap();
        site.click(&sel("signup_button")).await.unwrap();
        assert!(site.has_text("Enter Account Information").await.unwrap());
        assert!(site.select_option(&sel("country"), "Atlantis").await.is_err());
        assert!(site.select_option(&sel("country"), "Canada").await.is_ok());
    }

    #[tokio::test]
    async fn test_closed_site_rejects_calls() {
        let site = site();
        site.close().await.unwrap();
        assert!(matches!(
            site.goto("https://shop.test/").await,
            Err(E2eError::Bridge(_))
        ));
    }
}
