//! Infrastructure: configuration, logging, HTTP transport, persistence.

pub mod catalog_repository;
pub mod config;
pub mod errors;
pub mod fetch;
pub mod logging;

pub use catalog_repository::CatalogRepository;
pub use config::AppConfig;
pub use errors::{ContentError, FetchError};
pub use fetch::{FetchPort, FetchedBody, HttpFetcher};
