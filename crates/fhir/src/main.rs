//! `fhir-mcp`: the FHIR query tool as a stdio MCP server.
//!
//! Environment:
//!   FHIR_API_BASE     query endpoint (required)
//!   FHIR_AUTH_TOKEN   bearer token for calls that do not pass `authToken`
//!   RUST_LOG          log filter (default `info`)

use fhir::FhirTool;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // stdout carries JSON-RPC; logs must go to stderr.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    if let Err(e) = run().await {
        error!(error = %e, "fhir-mcp stopped");
        std::process::exit(1);
    }
}

async fn run() -> fhir::Result<()> {
    let tool = FhirTool::from_env()?;
    info!(endpoint = %tool.client().endpoint(), "FHIR MCP server running on stdio");
    mcp::serve_stdio(&tool).await?;
    Ok(())
}
