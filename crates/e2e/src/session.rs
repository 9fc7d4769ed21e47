//! Login state probing

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::actions::{Page, Target};
use crate::error::E2eResult;

/// What the navigation bar says about the current session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    LoggedIn,
    LoggedOut,
    /// Neither affordance rendered, e.g. off-site or mid-navigation
    Unknown,
}

impl SessionState {
    pub fn is_logged_in(self) -> bool {
        self == SessionState::LoggedIn
    }
}

/// Inspect the current page once, without waiting.
pub async fn probe_session(page: &Page<'_>) -> E2eResult<SessionState> {
    let state = if page.is_present(&Target::named("nav_logout")).await? {
        SessionState::LoggedIn
    } else if page.is_present(&Target::named("nav_login")).await? {
        SessionState::LoggedOut
    } else {
        SessionState::Unknown
    };
    debug!(?state, "session probe");
    Ok(state)
}
