//! Finance tracker workflows

use shopflow_common::TransactionRecord;
use tracing::debug;

use crate::actions::{Page, Target};
use crate::error::E2eResult;

/// Workflows against the finance tracker. The bound selector map decides
/// which locator strategy is exercised.
pub struct FinanceTracker<'a> {
    page: &'a Page<'a>,
}

impl<'a> FinanceTracker<'a> {
    pub fn new(page: &'a Page<'a>) -> Self {
        Self { page }
    }

    pub async fn open(&self) -> E2eResult<()> {
        self.page.visit("/").await?;
        self.page
            .expect_visible(&Target::named("new_transaction"))
            .await
    }

    pub async fn add_transaction(&self, tx: &TransactionRecord) -> E2eResult<()> {
        let page = self.page;
        debug!(map = page.selectors().name(), description = %tx.description, "add transaction");
        page.click(&Target::named("new_transaction")).await?;
        page.type_into(&Target::named("description"), &tx.description)
            .await?;
        page.type_into(&Target::named("amount"), &tx.amount).await?;
        page.type_into(&Target::named("date"), &tx.date).await?;
        page.click(&Target::named("save")).await
    }
}
