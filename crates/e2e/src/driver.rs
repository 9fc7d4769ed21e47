//! The seam between workflows and a browser automation engine
//!
//! Implementations must not wait on their own for conditions to become true;
//! polling lives in [`crate::actions::Page`]. Engine-level actionability
//! waits (an element becoming clickable) are fine.

use std::path::Path;

use async_trait::async_trait;
use shopflow_common::Locator;

use crate::error::E2eResult;

#[async_trait]
pub trait Driver: Send + Sync {
    /// Human-readable engine name for logs
    fn name(&self) -> &str;

    /// Load an absolute URL
    async fn goto(&self, url: &str) -> E2eResult<()>;

    /// URL of the current page
    async fn current_url(&self) -> E2eResult<String>;

    /// Replace the value of an input
    async fn fill(&self, target: &Locator, value: &str) -> E2eResult<()>;

    /// Choose a select option by value or label
    async fn select_option(&self, target: &Locator, option: &str) -> E2eResult<()>;

    /// Check a checkbox or radio; with `value`, the one whose value attribute matches
    async fn check(&self, target: &Locator, value: Option<&str>) -> E2eResult<()>;

    async fn click(&self, target: &Locator) -> E2eResult<()>;

    /// Attach a local file to a file input
    async fn set_input_files(&self, target: &Locator, file: &Path) -> E2eResult<()>;

    /// Number of matching elements right now
    async fn count(&self, target: &Locator) -> E2eResult<usize>;

    /// Whether the first match is visible right now
    async fn is_visible(&self, target: &Locator) -> E2eResult<bool>;

    /// Text of the first match, `None` when nothing matches
    async fn inner_text(&self, target: &Locator) -> E2eResult<Option<String>>;

    /// Whether some visible element contains `text`
    async fn has_text(&self, text: &str) -> E2eResult<bool>;

    /// Drop cookies and the current origin's storage, then leave the site
    async fn clear_cookies(&self) -> E2eResult<()>;

    /// Write a full-page PNG
    async fn screenshot(&self, path: &Path) -> E2eResult<()>;

    /// Release the engine; further calls fail
    async fn close(&self) -> E2eResult<()>;
}
