use std::collections::BTreeMap;

use sqlx::SqlitePool;
use tracing::info;

mod collection;
pub mod handlers;
pub mod schema;

pub use collection::{Collection, CollectionError, Item};
pub use handlers::{router, ApiVersion};

use schema::{Schema, CLOTHES, FOOD};

/// Maps a resource name from the URL to the collection that serves it.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    collections: BTreeMap<&'static str, Collection>,
}

impl ResourceRegistry {
    pub fn with_defaults() -> anyhow::Result<Self> {
        let mut registry = Self::default();
        registry.register(&FOOD)?;
        registry.register(&CLOTHES)?;
        Ok(registry)
    }

    pub fn register(&mut self, schema: &'static Schema) -> anyhow::Result<()> {
        schema.check()?;
        anyhow::ensure!(
            !self.collections.contains_key(schema.name),
            "resource `{}` is already registered",
            schema.name
        );
        self.collections.insert(schema.name, Collection::new(schema));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Collection> {
        self.collections.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.collections.keys().copied()
    }

    pub async fn ensure_tables(&self, db: &SqlitePool) -> anyhow::Result<()> {
        for collection in self.collections.values() {
            collection.ensure_table(db).await?;
        }
        info!(resources = ?self.names().collect::<Vec<_>>(), "resource tables ready");
        Ok(())
    }
}
