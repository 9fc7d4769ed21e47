//! Semantic element names mapped to concrete lookup expressions
//!
//! Workflows only ever ask for elements by name ("signup_name",
//! "nav_logout"); the markup-specific expression lives here. A catalog holds
//! several named maps so alternate lookup strategies for the same page can be
//! compared side by side.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// How an element is found on the page
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locator {
    /// CSS selector
    Css(String),
    /// XPath expression
    #[serde(rename = "xpath")]
    XPath(String),
    /// Any element whose text contains the given string
    Text(String),
    /// An element of `tag` whose text contains `text`
    Contains { tag: String, text: String },
}

impl Locator {
    pub fn css(s: impl Into<String>) -> Self {
        Locator::Css(s.into())
    }

    pub fn xpath(s: impl Into<String>) -> Self {
        Locator::XPath(s.into())
    }

    pub fn contains(tag: impl Into<String>, text: impl Into<String>) -> Self {
        Locator::Contains {
            tag: tag.into(),
            text: text.into(),
        }
    }

    /// Render in Playwright's selector engine syntax.
    pub fn to_playwright(&self) -> String {
        match self {
            Locator::Css(s) => format!("css={s}"),
            Locator::XPath(s) => format!("xpath={s}"),
            Locator::Text(t) => format!("text={}", quote(t)),
            Locator::Contains { tag, text } => format!("{tag}:has-text({})", quote(text)),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(s) => write!(f, "css `{s}`"),
            Locator::XPath(s) => write!(f, "xpath `{s}`"),
            Locator::Text(t) => write!(f, "text \"{t}\""),
            Locator::Contains { tag, text } => write!(f, "{tag} containing \"{text}\""),
        }
    }
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Name of the storefront map in the built-in catalog.
pub const STOREFRONT: &str = "storefront";

/// Number of finance-tracker lookup strategies in the built-in catalog.
pub const FINANCE_STRATEGIES: u8 = 6;

/// Name of the n-th finance-tracker strategy (1-based).
pub fn finance_map_name(strategy: u8) -> String {
    format!("finance-v{strategy}")
}

/// Immutable mapping from element name to locator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectorMap {
    name: String,
    entries: BTreeMap<String, Locator>,
}

impl SelectorMap {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: BTreeMap::new(),
        }
    }

    pub fn with(mut self, element: &str, locator: Locator) -> Self {
        self.entries.insert(element.to_string(), locator);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, element: &str) -> Result<&Locator> {
        self.entries.get(element).ok_or_else(|| Error::UnknownSelector {
            map: self.name.clone(),
            name: element.to_string(),
        })
    }

    /// Reverse lookup: the element name a locator is registered under.
    pub fn element_for(&self, locator: &Locator) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, l)| *l == locator)
            .map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Locator)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Selectors for automationexercise.com
    pub fn storefront() -> Self {
        Self::new(STOREFRONT)
            // header navigation
            .with("nav_login", Locator::css(r#"a[href="/login"]"#))
            .with("nav_logout", Locator::css(r#"a[href="/logout"]"#))
            .with("nav_delete_account", Locator::css(r#"a[href="/delete_account"]"#))
            .with("nav_contact", Locator::css(r#"a[href="/contact_us"]"#))
            // signup / login page
            .with("signup_name", Locator::css(r#"[data-qa="signup-name"]"#))
            .with("signup_email", Locator::css(r#"[data-qa="signup-email"]"#))
            .with("signup_button", Locator::contains("button", "Signup"))
            .with("login_email", Locator::css(r#"[data-qa="login-email"]"#))
            .with("login_password", Locator::css(r#"[data-qa="login-password"]"#))
            .with("login_button", Locator::css(r#"[data-qa="login-button"]"#))
            // account information form
            .with("title", Locator::css(r#"input[type="radio"]"#))
            .with("password", Locator::css("input#password"))
            .with("birth_day", Locator::css("[data-qa=days]"))
            .with("birth_month", Locator::css("[data-qa=months]"))
            .with("birth_year", Locator::css("[data-qa=years]"))
            .with("newsletter", Locator::css(r#"input[type="checkbox"]#newsletter"#))
            .with("optin", Locator::css(r#"input[type="checkbox"]#optin"#))
            .with("first_name", Locator::css("input#first_name"))
            .with("last_name", Locator::css("input#last_name"))
            .with("company", Locator::css("input#company"))
            .with("address", Locator::css("input#address1"))
            .with("country", Locator::css("select#country"))
            .with("state", Locator::css("input#state"))
            .with("city", Locator::css("input#city"))
            .with("zipcode", Locator::css(r#"[data-qa="zipcode"]"#))
            .with("mobile_number", Locator::css(r#"[data-qa="mobile_number"]"#))
            .with("create_account", Locator::css(r#"[data-qa="create-account"]"#))
            .with("continue_button", Locator::css(r#"[data-qa="continue-button"]"#))
            // contact page
            .with("contact_heading", Locator::contains("h2", "Get In Touch"))
            .with("contact_name", Locator::css(r#"input[name="name"]"#))
            .with("contact_email", Locator::css(r#"input[name="email"]"#))
            .with("contact_subject", Locator::css(r#"input[name="subject"]"#))
            .with("contact_message", Locator::css(r#"textarea[name="message"]"#))
            .with("contact_upload", Locator::css(r#"input[name="upload_file"]"#))
            .with("contact_submit", Locator::css(r#"input[name="submit"]"#))
            .with("contact_status", Locator::css(".status"))
            .with("contact_home", Locator::css(r##"#form-section a[href="/"]"##))
    }

    /// Selectors for the finance tracker, one map per lookup strategy
    ///
    /// All strategies address the same page; they differ in how robust the
    /// expressions are to markup changes (text match, exact text, position,
    /// descendant paths).
    pub fn finance(strategy: u8) -> Result<Self> {
        const NEW_CONTAINS: &str = "//a[contains(text(), 'Nova Transação')]";
        const SAVE_CONTAINS: &str = "//button[contains(text(), 'Salvar')]";
        const FORM_BUTTON: &str = "//form//button";

        let by_id = |map: Self| {
            map.with("description", Locator::xpath("//input[@id='description']"))
                .with("amount", Locator::xpath("//input[@id='amount']"))
                .with("date", Locator::xpath("//input[@id='date']"))
        };

        let name = finance_map_name(strategy);
        let map = match strategy {
            1 => by_id(Self::new(name))
                .with("new_transaction", Locator::xpath(NEW_CONTAINS))
                .with("save", Locator::xpath(SAVE_CONTAINS))
                .with("rows", Locator::xpath("//tbody/tr")),
            2 => by_id(Self::new(name))
                .with("new_transaction", Locator::xpath(NEW_CONTAINS))
                .with("save", Locator::xpath(SAVE_CONTAINS))
                .with("rows", Locator::xpath("//tbody//tr")),
            3 => by_id(Self::new(name))
                .with("new_transaction", Locator::xpath(NEW_CONTAINS))
                .with("save", Locator::xpath(FORM_BUTTON))
                .with("rows", Locator::xpath("//tbody//tr[1]")),
            4 => by_id(Self::new(name))
                .with("new_transaction", Locator::xpath(NEW_CONTAINS))
                .with("save", Locator::xpath(SAVE_CONTAINS))
                .with("rows", Locator::xpath("//tbody//tr")),
            5 => by_id(Self::new(name))
                .with("new_transaction", Locator::xpath("//a[text()='+ Nova Transação']"))
                .with("save", Locator::xpath("//button[text()='Salvar']"))
                .with("rows", Locator::xpath("//tbody/tr")),
            6 => Self::new(name)
                .with("new_transaction", Locator::xpath("//body//a[contains(text(), 'Nova Transação')]"))
                .with("description", Locator::xpath("//form/div[1]//input"))
                .with("amount", Locator::xpath("//form/div[2]//input"))
                .with("date", Locator::xpath("//form/div[3]//input"))
                .with("save", Locator::xpath(FORM_BUTTON))
                .with("rows", Locator::xpath("//tbody//tr//td[contains(text(), 'Mesada')]")),
            _ => return Err(Error::UnknownSelectorMap(name)),
        };
        Ok(map)
    }
}

static BUILTIN: Lazy<SelectorCatalog> = Lazy::new(|| {
    let mut maps = HashMap::new();
    maps.insert(STOREFRONT.to_string(), SelectorMap::storefront());
    for strategy in 1..=FINANCE_STRATEGIES {
        if let Ok(map) = SelectorMap::finance(strategy) {
            maps.insert(map.name().to_string(), map);
        }
    }
    SelectorCatalog { maps }
});

/// Named selector maps available to a run
#[derive(Debug, Clone, Default)]
pub struct SelectorCatalog {
    maps: HashMap<String, SelectorMap>,
}

/// On-disk override format: `map -> element -> locator`
type OverrideFile = BTreeMap<String, BTreeMap<String, Locator>>;

impl SelectorCatalog {
    /// The catalog shipped with the crate
    pub fn builtin() -> Self {
        BUILTIN.clone()
    }

    /// Builtin catalog with entries from a YAML override file merged in.
    ///
    /// Unknown map names create new maps; known elements are replaced.
    pub fn with_overrides(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::builtin().merge_yaml(&content)
    }

    pub fn merge_yaml(mut self, yaml: &str) -> Result<Self> {
        // locators are written as single-key maps (`css: "#id"`), not YAML tags
        let overrides: OverrideFile = serde_yaml::with::singleton_map_recursive::deserialize(
            serde_yaml::Deserializer::from_str(yaml),
        )?;
        for (map_name, entries) in overrides {
            let map = self
                .maps
                .entry(map_name.clone())
                .or_insert_with(|| SelectorMap::new(map_name.clone()));
            for (element, locator) in entries {
                debug!(map = %map_name, element = %element, %locator, "selector override");
                map.entries.insert(element, locator);
            }
        }
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Result<&SelectorMap> {
        self.maps
            .get(name)
            .ok_or_else(|| Error::UnknownSelectorMap(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.maps.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn maps(&self) -> impl Iterator<Item = &SelectorMap> {
        self.maps.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playwright_rendering() {
        assert_eq!(
            Locator::css(r#"[data-qa="signup-name"]"#).to_playwright(),
            r#"css=[data-qa="signup-name"]"#
        );
        assert_eq!(
            Locator::xpath("//tbody/tr").to_playwright(),
            "xpath=//tbody/tr"
        );
        assert_eq!(
            Locator::contains("button", "Signup").to_playwright(),
            r#"button:has-text("Signup")"#
        );
        assert_eq!(
            Locator::Text(r#"say "hi""#.into()).to_playwright(),
            r#"text="say \"hi\"""#
        );
    }

    #[test]
    fn test_unknown_selector() {
        let map = SelectorMap::storefront();
        assert!(map.get("signup_name").is_ok());
        let err = map.get("nope").unwrap_err();
        assert!(matches!(err, Error::UnknownSelector { .. }));
    }

    #[test]
    fn test_builtin_catalog_has_all_maps() {
        let catalog = SelectorCatalog::builtin();
        assert!(catalog.get(STOREFRONT).is_ok());
        for strategy in 1..=FINANCE_STRATEGIES {
            let map = catalog.get(&finance_map_name(strategy)).unwrap();
            for element in ["new_transaction", "description", "amount", "date", "save", "rows"] {
                assert!(map.get(element).is_ok(), "{} missing {}", map.name(), element);
            }
        }
        assert!(SelectorMap::finance(7).is_err());
    }

    #[test]
    fn test_merge_overrides() {
        let yaml = r##"
storefront:
  login_button:
    css: "#login"
custom:
  banner:
    text: "Welcome"
  signup:
    contains:
      tag: button
      text: Signup
"##;
        let catalog = SelectorCatalog::builtin().merge_yaml(yaml).unwrap();
        assert_eq!(
            catalog.get(STOREFRONT).unwrap().get("login_button").unwrap(),
            &Locator::css("#login")
        );
        assert_eq!(
            catalog.get("custom").unwrap().get("banner").unwrap(),
            &Locator::Text("Welcome".into())
        );
        assert_eq!(
            catalog.get("custom").unwrap().get("signup").unwrap(),
            &Locator::contains("button", "Signup")
        );
        // untouched entries survive the merge
        assert!(catalog.get(STOREFRONT).unwrap().get("signup_name").is_ok());
    }

    #[test]
    fn test_override_file_with_unknown_locator_kind() {
        let yaml = "storefront:\n  login_button:\n    id: login\n";
        assert!(matches!(
            SelectorCatalog::builtin().merge_yaml(yaml),
            Err(Error::Yaml(_))
        ));
    }

    #[test]
    fn test_names_are_sorted() {
        let catalog = SelectorCatalog::builtin();
        let names = catalog.names();
        assert_eq!(names.len(), 1 + FINANCE_STRATEGIES as usize);
        assert_eq!(names[0], "finance-v1");
        assert_eq!(names.last(), Some(&STOREFRONT));
    }

    #[test]
    fn test_reverse_lookup() {
        let map = SelectorMap::storefront();
        let locator = map.get("nav_logout").unwrap().clone();
        assert_eq!(map.element_for(&locator), Some("nav_logout"));
    }
}
