use duel_domain::{Item, ItemChoice};
use ledger_store::{Collection, DELETE_ALL, DocumentStore, LedgerStore, LedgerStoreError};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ItemCatalogError {
    #[error(transparent)]
    Store(#[from] LedgerStoreError),
    #[error("no image supplied for {0}")]
    MissingImage(ItemChoice),
}

/// The three playable items and their artwork.
#[derive(Debug, Clone)]
pub struct ItemCatalog<S> {
    store: LedgerStore<S>,
}

impl<S> ItemCatalog<S>
where
    S: DocumentStore,
{
    #[must_use]
    pub fn new(store: LedgerStore<S>) -> Self {
        Self { store }
    }

    /// Replaces the catalog. `images` holds base64 artwork per item.
    pub async fn seed_items(
        &self,
        images: &[(ItemChoice, String)],
    ) -> Result<Vec<Item>, ItemCatalogError> {
        let mut items = Vec::with_capacity(ItemChoice::ALL.len());
        for choice in ItemChoice::ALL {
            let image = images
                .iter()
                .find(|(c, _)| *c == choice)
                .map(|(_, image)| image.clone())
                .ok_or(ItemCatalogError::MissingImage(choice))?;
            items.push(Item {
                id: choice.catalog_id().to_string(),
                name: choice,
                image,
            });
        }

        self.store.delete(Collection::Items, DELETE_ALL).await?;
        for item in &items {
            self.store.put(Collection::Items, item).await?;
        }
        info!(count = items.len(), "item catalog seeded");
        Ok(items)
    }

    /// Catalog ordered by numeric id (rock, paper, scissors).
    pub async fn list_items(&self) -> Result<Vec<Item>, ItemCatalogError> {
        let mut items: Vec<Item> = self.store.query_all(Collection::Items).await?;
        items.sort_by_key(|item| item.id.parse::<u32>().unwrap_or(u32::MAX));
        Ok(items)
    }
}
