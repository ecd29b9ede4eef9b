//! FHIR query tool served over MCP.
//!
//! One tool, `query-fhir`, posts `{from, where}` searches to a FHIR query
//! endpoint and returns a condensed summary of the resulting bundle.

mod client;
mod error;
pub mod query;
mod tool;

pub use client::FhirClient;
pub use error::{Error, Result};
pub use query::{QueryArgs, QuerySummary, SearchParams};
pub use tool::{FhirTool, TOOL_NAME};
