//! Product records and the asset references they own.

use serde::{Deserialize, Serialize};

/// Classification of a downloadable asset, used to pick its archive subdirectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Image,
    Template,
    SetupGuide,
    Brochure,
    Other,
}

impl AssetKind {
    /// Archive subdirectory this kind of asset is persisted under.
    pub fn subdir(self) -> &'static str {
        match self {
            Self::Image => "images",
            Self::Template => "templates",
            Self::SetupGuide => "setup_guides",
            Self::Brochure => "brochures",
            Self::Other => "other",
        }
    }
}

/// Lifecycle of one asset reference across resolution and download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    Unresolved,
    Resolved,
    Downloaded,
    Failed,
}

/// One downloadable file attached to a product. Exclusively owned by its
/// [`ProductRecord`], never shared between records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetReference {
    pub kind: AssetKind,
    pub url: String,
    pub filename: String,
    pub status: ResolutionStatus,
    /// Relative path under the archive root, set only once downloaded.
    pub local_path: Option<String>,
}

impl AssetReference {
    /// An asset whose source URL is already known (resolved against the
    /// downloads index, or an in-page image URL).
    pub fn resolved(kind: AssetKind, url: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
            filename: filename.into(),
            status: ResolutionStatus::Resolved,
            local_path: None,
        }
    }

    pub fn mark_downloaded(&mut self, local_path: String) {
        self.status = ResolutionStatus::Downloaded;
        self.local_path = Some(local_path);
    }

    pub fn mark_failed(&mut self) {
        self.status = ResolutionStatus::Failed;
    }
}

/// One key/value pair from tabular page data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub key: String,
    pub value: String,
}

/// A structured product record extracted from one product page.
///
/// Created once per distinct product URL; after creation it is only mutated
/// to attach resolved asset references and their download outcomes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRecord {
    /// May be empty; not guaranteed globally unique at extraction time.
    pub sku: String,
    /// Non-empty. Extraction discards the whole record when no name is found.
    pub name: String,
    /// Canonical source URL, the crawl dedup key.
    pub url: String,
    pub category: String,
    pub subcategory: String,
    pub description: String,
    /// Raw text from the page, never parsed as currency.
    pub price: String,
    pub sizes: Vec<String>,
    pub colors: Vec<String>,
    pub images: Vec<AssetReference>,
    pub downloads: Vec<AssetReference>,
    /// Ordered key/value pairs; a repeated key overwrites the earlier value
    /// in place (last write wins, position of first occurrence kept).
    pub attributes: Vec<Attribute>,
}

impl ProductRecord {
    pub fn new(name: impl Into<String>, url: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            sku: String::new(),
            name: name.into(),
            url: url.into(),
            category: category.into(),
            subcategory: String::new(),
            description: String::new(),
            price: String::new(),
            sizes: Vec::new(),
            colors: Vec::new(),
            images: Vec::new(),
            downloads: Vec::new(),
            attributes: Vec::new(),
        }
    }

    /// Insert an attribute, overwriting the value if the key already exists.
    pub fn push_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(existing) = self.attributes.iter_mut().find(|a| a.key == key) {
            existing.value = value;
        } else {
            self.attributes.push(Attribute { key, value });
        }
    }
}
