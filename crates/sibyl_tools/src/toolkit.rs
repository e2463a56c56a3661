//! The toolkit bundles every collaborator the tool handlers need. It is
//! built once at startup and passed by reference; there is no global
//! state, so tests construct one with fakes per case.

use crate::mail::Mailer;
use crate::sheets::{extract_sheet_id, SheetStore};
use crate::warehouse::Warehouse;
use anyhow::Result;
use sibyl_core::alias::AliasStore;
use sibyl_core::config::SibylConfig;
use std::sync::Arc;

pub struct Toolkit {
    pub warehouse: Arc<dyn Warehouse>,
    pub sheets: Arc<dyn SheetStore>,
    pub mailer: Arc<dyn Mailer>,
    pub aliases: AliasStore,
    pub config: SibylConfig,
}

impl Toolkit {
    pub fn new(
        warehouse: Arc<dyn Warehouse>,
        sheets: Arc<dyn SheetStore>,
        mailer: Arc<dyn Mailer>,
        aliases: AliasStore,
        config: SibylConfig,
    ) -> Self {
        Self { warehouse, sheets, mailer, aliases, config }
    }

    /// Turn a user-facing sheet reference (alias, bare ID, or full URL)
    /// into a spreadsheet ID. Alias lookup happens first; unknown keys
    /// pass through unchanged, so a raw ID also works.
    pub async fn resolve_sheet_id(&self, reference: &str) -> String {
        let resolved = self.aliases.get_id(reference).await;
        extract_sheet_id(&resolved)
    }

    /// Canonical alias form: lowercased, spaces replaced by underscores.
    pub fn normalize_alias(name: &str) -> String {
        name.trim().to_lowercase().replace(' ', "_")
    }

    pub async fn save_alias(&self, alias: &str, id: &str) -> Result<()> {
        self.aliases.save_alias(&Self::normalize_alias(alias), id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_alias() {
        assert_eq!(Toolkit::normalize_alias("Q3 Revenue Report"), "q3_revenue_report");
        assert_eq!(Toolkit::normalize_alias("  Plain  "), "plain");
    }
}
