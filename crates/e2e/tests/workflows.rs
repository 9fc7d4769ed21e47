//! Storefront and finance workflows against the simulated sites

use std::path::PathBuf;
use std::time::Duration;

use shopflow_common::{FixtureGenerator, SelectorCatalog, SelectorMap};
use shopflow_e2e::workflows::{DeleteOutcome, LoginOutcome, LogoutOutcome, SignupOutcome};
use shopflow_e2e::{probe_session, Page, SessionState, SimulatedSite, Storefront};
use shopflow_e2e::{Driver, FinanceTracker};

const SHOP: &str = "https://shop.test";
const FINANCE: &str = "https://finance.test";

fn site() -> SimulatedSite {
    SimulatedSite::new(SHOP, FINANCE, SelectorCatalog::builtin())
}

fn page<'a>(site: &'a SimulatedSite, map: &'a SelectorMap) -> Page<'a> {
    Page::new(site, map, SHOP, Duration::from_millis(200))
}

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

#[tokio::test]
async fn test_register_then_delete() {
    let site = site();
    let map = SelectorMap::storefront();
    let page = page(&site, &map);
    let shop = Storefront::new(&page);
    let user = FixtureGenerator::default().generate_user_data();

    shop.register(&user).await.unwrap();
    assert!(site.has_account(&user.email));
    assert_eq!(site.session().as_deref(), Some(user.email.as_str()));
    assert_eq!(probe_session(&page).await.unwrap(), SessionState::LoggedIn);

    assert_eq!(shop.delete_account().await.unwrap(), DeleteOutcome::Deleted);
    assert!(!site.has_account(&user.email));
    assert_eq!(probe_session(&page).await.unwrap(), SessionState::LoggedOut);
}

#[tokio::test]
async fn test_logout_and_delete_are_idempotent() {
    let site = site();
    let map = SelectorMap::storefront();
    let page = page(&site, &map);
    let shop = Storefront::new(&page);
    let user = FixtureGenerator::default().generate_user_data();

    shop.register(&user).await.unwrap();
    assert_eq!(shop.logout().await.unwrap(), LogoutOutcome::LoggedOut);
    assert_eq!(shop.logout().await.unwrap(), LogoutOutcome::AlreadyLoggedOut);

    // the repeated call leaves the same end state as the first
    assert!(page.url().await.unwrap().contains("/login"));
    assert_eq!(probe_session(&page).await.unwrap(), SessionState::LoggedOut);
    assert_eq!(site.session(), None);

    assert_eq!(shop.delete_account().await.unwrap(), DeleteOutcome::NoAccount);
    assert!(site.has_account(&user.email));
}

#[tokio::test]
async fn test_session_is_unknown_before_any_page() {
    let site = site();
    let map = SelectorMap::storefront();
    let page = page(&site, &map);
    assert_eq!(probe_session(&page).await.unwrap(), SessionState::Unknown);
}

#[tokio::test]
async fn test_duplicate_email_is_reported() {
    let site = site();
    let map = SelectorMap::storefront();
    let page = page(&site, &map);
    let shop = Storefront::new(&page);
    let user = FixtureGenerator::default().generate_user_data();
    site.seed_account(&user);

    shop.open_home().await.unwrap();
    shop.navigate_to_signup_login().await.unwrap();
    let outcome = shop.start_signup("Duplicate User", &user.email).await.unwrap();
    assert_eq!(outcome, SignupOutcome::EmailTaken);
    assert!(page.body_contains("Email Address already exist!").await.unwrap());

    // register refuses outright
    assert!(shop.register(&user).await.is_err());
    assert_eq!(site.account_count(), 1);
}

#[tokio::test]
async fn test_login_outcomes() {
    let site = site();
    let map = SelectorMap::storefront();
    let page = page(&site, &map);
    let shop = Storefront::new(&page);
    let user = FixtureGenerator::default().generate_user_data();
    site.seed_account(&user);

    let wrong = shop.login(&user.email, "wrongpassword123").await.unwrap();
    assert_eq!(wrong, LoginOutcome::Rejected);

    let unknown = shop
        .login("nonexistent.email.12345@notreal.com", "somepassword123")
        .await
        .unwrap();
    assert_eq!(unknown, LoginOutcome::Rejected);

    assert_eq!(shop.login("", "").await.unwrap(), LoginOutcome::NotSubmitted);
    assert!(page.url().await.unwrap().contains("/login"));

    let ok = shop.login(&user.email, &user.password).await.unwrap();
    assert_eq!(ok, LoginOutcome::LoggedIn);
    assert!(page
        .body_contains(&format!("Logged in as {}", user.name))
        .await
        .unwrap());
}

#[tokio::test]
async fn test_login_replaces_existing_session() {
    let site = site();
    let map = SelectorMap::storefront();
    let page = page(&site, &map);
    let shop = Storefront::new(&page);
    let gen = FixtureGenerator::default();
    let first = gen.generate_user_data();
    let second = gen.generate_user_data();
    site.seed_account(&second);

    shop.register(&first).await.unwrap();
    let outcome = shop.login(&second.email, &second.password).await.unwrap();
    assert_eq!(outcome, LoginOutcome::LoggedIn);
    assert_eq!(site.session().as_deref(), Some(second.email.as_str()));
}

#[tokio::test]
async fn test_cleanup_account_without_account() {
    let site = site();
    let map = SelectorMap::storefront();
    let page = page(&site, &map);
    let shop = Storefront::new(&page);
    let user = FixtureGenerator::default().generate_user_data();

    let outcome = shop.cleanup_account(&user).await.unwrap();
    assert_eq!(outcome, DeleteOutcome::NoAccount);
}

#[tokio::test]
async fn test_cleanup_account_logs_in_and_deletes() {
    let site = site();
    let map = SelectorMap::storefront();
    let page = page(&site, &map);
    let shop = Storefront::new(&page);
    let user = FixtureGenerator::default().generate_user_data();
    site.seed_account(&user);

    assert_eq!(shop.cleanup_account(&user).await.unwrap(), DeleteOutcome::Deleted);
    assert_eq!(site.account_count(), 0);
}

#[tokio::test]
async fn test_cleanup_account_ignores_another_session() {
    let site = site();
    let map = SelectorMap::storefront();
    let page = page(&site, &map);
    let shop = Storefront::new(&page);
    let gen = FixtureGenerator::default();
    let target = gen.generate_user_data();
    let bystander = gen.generate_user_data();

    shop.register(&target).await.unwrap();
    site.seed_account(&bystander);
    assert_eq!(
        shop.login(&bystander.email, &bystander.password).await.unwrap(),
        LoginOutcome::LoggedIn
    );

    assert_eq!(shop.cleanup_account(&target).await.unwrap(), DeleteOutcome::Deleted);
    assert!(!site.has_account(&target.email));
    assert!(site.has_account(&bystander.email));
}

#[tokio::test]
async fn test_cleanup_account_while_logged_in_as_user() {
    let site = site();
    let map = SelectorMap::storefront();
    let page = page(&site, &map);
    let shop = Storefront::new(&page);
    let user = FixtureGenerator::default().generate_user_data();

    shop.register(&user).await.unwrap();
    assert_eq!(shop.cleanup_account(&user).await.unwrap(), DeleteOutcome::Deleted);
    assert_eq!(site.account_count(), 0);
}

#[tokio::test]
async fn test_contact_form_with_attachment() {
    let site = site();
    let map = SelectorMap::storefront();
    let page = page(&site, &map);
    let shop = Storefront::new(&page);
    let contact = FixtureGenerator::default().generate_contact_data();
    let attachment = fixtures_dir().join("contact-attachment.txt");

    shop.open_home().await.unwrap();
    shop.submit_contact_form(&contact, Some(&attachment))
        .await
        .unwrap();
    assert_eq!(site.last_attachment(), Some(attachment));

    shop.return_home_from_contact().await.unwrap();
    assert_eq!(page.url().await.unwrap(), format!("{SHOP}/"));
}

#[tokio::test]
async fn test_contact_form_missing_attachment_fails() {
    let site = site();
    let map = SelectorMap::storefront();
    let page = page(&site, &map);
    let shop = Storefront::new(&page);
    let contact = FixtureGenerator::default().generate_contact_data();

    shop.open_home().await.unwrap();
    let missing = fixtures_dir().join("no-such-file.txt");
    assert!(shop
        .submit_contact_form(&contact, Some(&missing))
        .await
        .is_err());
}

#[tokio::test]
async fn test_generated_emails_are_unique() {
    let gen = FixtureGenerator::default();
    let a = gen.generate_user_data();
    let b = gen.generate_user_data();
    assert_ne!(a.email, b.email);
}

#[tokio::test]
async fn test_finance_strategies_add_one_row() {
    for strategy in 1..=6u8 {
        let site = site();
        let map = SelectorMap::finance(strategy).unwrap();
        let page = Page::new(&site, &map, FINANCE, Duration::from_millis(200));
        let tracker = FinanceTracker::new(&page);
        let mut entry = FixtureGenerator::default().generate_transaction();
        entry.description = "Mesada".to_string();

        tracker.open().await.unwrap();
        tracker.add_transaction(&entry).await.unwrap();

        let rows = map.get("rows").unwrap();
        assert_eq!(site.count(rows).await.unwrap(), 1, "strategy {strategy}");
        assert_eq!(site.transactions(), vec![entry]);
    }
}
