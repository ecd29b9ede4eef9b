use tracing::{debug, info, warn};

use crate::query::{Bundle, SearchParams};
use crate::{Error, Result};

/// Posts search queries to a FHIR query endpoint.
#[derive(Debug, Clone)]
pub struct FhirClient {
    http: reqwest::Client,
    endpoint: String,
}

impl FhirClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Run one search. `token` is sent as a bearer token when present.
    pub async fn search(&self, params: &SearchParams, token: Option<&str>) -> Result<Bundle> {
        info!(resource = %params.from, "querying FHIR");
        debug!(filter = ?params.filter, "search parameters");

        let mut req = self.http.post(&self.endpoint).json(params);
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "FHIR request rejected");
            return Err(Error::Status(status.as_u16()));
        }

        let bundle: Bundle = response.json().await?;
        debug!(
            resource_type = %bundle.resource_type,
            entries = bundle.entry.len(),
            "FHIR response"
        );
        Ok(bundle)
    }
}
