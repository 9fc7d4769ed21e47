//! shopflow common library
//!
//! Test data synthesis and the selector abstraction shared by the workflow
//! runner. Nothing in here touches a browser.

pub mod error;
pub mod fixtures;
pub mod options;
pub mod selectors;

// Re-export commonly used types
pub use error::{Error, Result};
pub use fixtures::{
    ContactRecord, Fixture, FixtureGenerator, ProfileFixture, TransactionRecord, UserRecord,
};
pub use options::{BirthDate, Title};
pub use selectors::{Locator, SelectorCatalog, SelectorMap};
