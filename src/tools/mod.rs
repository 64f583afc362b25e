//! Data-source tools for the health research agents.
//!
//! Each public health API is wrapped by a small set of [`Tool`](registry::Tool)
//! implementations that take JSON arguments and return a normalized JSON record
//! or a typed [`SourceError`](crate::types::SourceError).
//!
//! # Module Structure
//!
//! - [`registry`] - The `Tool` trait and per-agent `ToolRegistry`
//! - [`http`] - `SourceClient`, the shared GET-JSON client with error classification
//! - [`args`] - Argument extraction helpers
//! - [`epht`] - CDC Environmental Public Health Tracking
//! - [`open_data`] - CDC Open Data (Socrata)
//! - [`healthcare_gov`] - data.healthcare.gov
//! - [`openfda`] - openFDA drug endpoints
//! - [`medlineplus`] - MedlinePlus Connect
//!
//! # Example
//!
//! ```ignore
//! let client = SourceClient::new("openfda", openfda::DEFAULT_BASE_URL, Duration::from_secs(30))?;
//! let mut registry = ToolRegistry::new();
//! openfda::register(&mut registry, client);
//! let result = registry.execute("fda_drug_recalls", json!({"drug_name": "metformin"})).await?;
//! ```

pub mod args;
pub mod epht;
pub mod healthcare_gov;
pub mod http;
pub mod medlineplus;
pub mod open_data;
pub mod openfda;
pub mod registry;

pub use http::SourceClient;
pub use registry::{Tool, ToolRegistry};
