//! Workflow functions
//!
//! Named multi-step sequences over [`crate::actions::Page`]. Entry points that
//! change login state inspect the page first, so calling them twice in a row
//! is safe.

mod finance;
mod storefront;

pub use finance::FinanceTracker;
pub use storefront::{DeleteOutcome, LoginOutcome, LogoutOutcome, SignupOutcome, Storefront};

/// Texts the storefront renders at each workflow checkpoint
pub mod text {
    pub const HOME_BRAND: &str = "AutomationExercise";
    pub const NEW_USER_SIGNUP: &str = "New User Signup!";
    pub const LOGIN_TO_YOUR_ACCOUNT: &str = "Login to your account";
    pub const ENTER_ACCOUNT_INFORMATION: &str = "Enter Account Information";
    pub const ACCOUNT_CREATED: &str = "Account Created!";
    pub const ACCOUNT_DELETED: &str = "Account Deleted!";
    pub const LOGGED_IN_AS: &str = "Logged in as";
    pub const INCORRECT_CREDENTIALS: &str = "Your email or password is incorrect!";
    pub const EMAIL_ALREADY_EXISTS: &str = "Email Address already exist!";
    pub const GET_IN_TOUCH: &str = "Get In Touch";
    pub const CONTACT_SUCCESS: &str = "Success! Your details have been submitted successfully.";
    pub const NAV_SIGNUP_LOGIN: &str = "Signup / Login";

    /// The banner shown while `name` is logged in
    pub fn logged_in_as(name: &str) -> String {
        format!("{LOGGED_IN_AS} {name}")
    }
}
