//! Catalog ingestion pipeline for an origin with no public API.
//!
//! Discovers product pages from a fixed category list, extracts structured
//! records, reconciles downloadable assets against the origin's downloads
//! hub table, and acquires every asset with content validation. A standalone
//! repair pass detects soft-error HTML saved as documents and re-resolves
//! the correct source.

pub mod domain;
pub mod infrastructure;
pub mod pipeline;
