//! Persistence of the catalog database and its lightweight lookup index.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

use crate::domain::{CatalogDatabase, ProductIndexEntry};

pub const DATABASE_FILE: &str = "products.json";
pub const INDEX_FILE: &str = "product_index.json";

/// Writes the run's output documents under the archive root.
pub struct CatalogRepository {
    root: PathBuf,
}

impl CatalogRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Persist the full database and the parallel index document.
    /// Returns the database path.
    pub async fn save(&self, db: &CatalogDatabase) -> Result<PathBuf> {
        fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("failed to create output root {}", self.root.display()))?;

        let db_path = self.root.join(DATABASE_FILE);
        let payload = serde_json::to_string_pretty(db).context("failed to serialize database")?;
        fs::write(&db_path, payload)
            .await
            .with_context(|| format!("failed to write {}", db_path.display()))?;

        let index: Vec<ProductIndexEntry> = db.products.iter().map(Into::into).collect();
        let index_path = self.root.join(INDEX_FILE);
        let payload = serde_json::to_string_pretty(&index).context("failed to serialize index")?;
        fs::write(&index_path, payload)
            .await
            .with_context(|| format!("failed to write {}", index_path.display()))?;

        info!(
            "saved {} products to {}",
            db.metadata.total_products,
            db_path.display()
        );
        Ok(db_path)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ProductRecord;

    #[tokio::test]
    async fn save_writes_database_and_index() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = CatalogRepository::new(dir.path());
        let db = CatalogDatabase::new(
            "https://example.com",
            vec![ProductRecord::new(
                "Stand",
                "https://example.com/stand",
                "Retractable",
            )],
        );

        let db_path = repo.save(&db).await.expect("save");
        assert!(db_path.exists());
        assert!(dir.path().join(INDEX_FILE).exists());

        let raw = std::fs::read_to_string(dir.path().join(INDEX_FILE)).expect("read index");
        let index: Vec<ProductIndexEntry> = serde_json::from_str(&raw).expect("parse index");
        assert_eq!(index.len(), 1);
        assert_eq!(index[0].name, "Stand");
    }
}
