//! Query arguments, FHIR bundles, and the condensed form handed back to the
//! model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Arguments of the `query-fhir` tool.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryArgs {
    pub search_params: SearchParams,
    /// Empty means "use the server's own token".
    #[serde(default)]
    pub auth_token: String,
}

/// What to search for. Sent to the FHIR endpoint as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    /// Resource type, e.g. `MedicationRequest`.
    pub from: String,
    #[serde(rename = "where", default)]
    pub filter: BTreeMap<String, String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// FHIR Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    #[serde(default)]
    pub resource_type: String,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub entry: Vec<BundleEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BundleEntry {
    #[serde(default)]
    pub resource: Resource,
}

/// The handful of resource fields worth summarizing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub resource_type: Option<String>,
    pub status: Option<String>,
    pub medication_codeable_concept: Option<CodeableConcept>,
    pub medication_reference: Option<Reference>,
    #[serde(default)]
    pub dosage_instruction: Vec<Dosage>,
    pub authored_on: Option<String>,
    pub date_written: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CodeableConcept {
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Reference {
    pub display: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Dosage {
    pub text: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Summary
// ─────────────────────────────────────────────────────────────────────────────

/// A bundle reduced to what a model needs to answer from it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySummary {
    pub resource_type: String,
    pub count: u64,
    pub entries: Vec<EntrySummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntrySummary {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medication: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dosage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl From<Bundle> for QuerySummary {
    fn from(bundle: Bundle) -> Self {
        Self {
            resource_type: bundle.resource_type,
            count: bundle.total.unwrap_or(0),
            entries: bundle
                .entry
                .into_iter()
                .map(|entry| EntrySummary::from(entry.resource))
                .collect(),
        }
    }
}

impl From<Resource> for EntrySummary {
    fn from(resource: Resource) -> Self {
        let medication = non_empty(resource.medication_codeable_concept.and_then(|c| c.text))
            .or_else(|| non_empty(resource.medication_reference.and_then(|r| r.display)));
        let dosage = resource
            .dosage_instruction
            .into_iter()
            .next()
            .and_then(|d| d.text);
        let date = non_empty(resource.authored_on).or_else(|| non_empty(resource.date_written));

        Self {
            kind: resource.resource_type,
            status: resource.status,
            medication,
            dosage,
            date,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
