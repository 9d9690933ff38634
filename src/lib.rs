//! Rust client for the Chrome UX Report (CrUX) API.
//!
//! CrUX aggregates real-user web performance data per URL and origin.
//! This crate covers single-record queries, history queries, and batched
//! lookups that bundle many queries into one `multipart/mixed` HTTP call
//! with per-item rate-limit reconciliation.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use crux_api::{Client, FormFactor, QueryOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), crux_api::Error> {
//!     let client = Client::builder("your-api-key").build()?;
//!
//!     let results = client.batch(vec![
//!         QueryOptions {
//!             origin: Some("https://github.com".into()),
//!             form_factor: Some(FormFactor::Desktop),
//!             ..Default::default()
//!         },
//!         QueryOptions {
//!             url: Some("https://github.com/explore".into()),
//!             ..Default::default()
//!         },
//!     ]).await?;
//!
//!     for (query, result) in results.iter().enumerate() {
//!         match result {
//!             Some(response) => println!("{}: {:?}", query, response.record.key),
//!             None => println!("{}: no data", query),
//!         }
//!     }
//!     Ok(())
//! }
//! ```

mod backoff;
mod batch;
mod client;
mod error;
mod normalize;
mod types;

pub use backoff::{Backoff, RandomizedBackoff};
pub use client::{Client, ClientBuilder};
pub use error::{Error, Result};
pub use normalize::normalize_url;
pub use types::*;
