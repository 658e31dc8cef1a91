//! Core domain types for the catalog ingestion pipeline.

pub mod catalog;
pub mod product;

pub use catalog::{CatalogDatabase, ProductIndexEntry, RunMetadata, RunSummary};
pub use product::{AssetKind, AssetReference, Attribute, ProductRecord, ResolutionStatus};
