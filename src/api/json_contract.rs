use serde::{Deserialize, Serialize};

use crate::error::{PlotError, PlotResult};
use crate::render::Renderer;

use super::{PlotDocument, PlotEngine, SaveScope};

pub const PLOT_DOCUMENT_JSON_SCHEMA_V1: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotDocumentJsonContractV1 {
    pub schema_version: u32,
    pub document: PlotDocument,
}

impl PlotDocument {
    pub fn to_json_contract_v1_pretty(&self) -> PlotResult<String> {
        let payload = PlotDocumentJsonContractV1 {
            schema_version: PLOT_DOCUMENT_JSON_SCHEMA_V1,
            document: self.clone(),
        };
        serde_json::to_string_pretty(&payload)
            .map_err(|e| PlotError::Serialization(format!("failed to serialize plot document contract v1: {e}")))
    }

    /// Accepts either a bare document or a versioned contract wrapper.
    pub fn from_json_compat_str(input: &str) -> PlotResult<Self> {
        if let Ok(document) = serde_json::from_str::<PlotDocument>(input) {
            return Ok(document);
        }
        let payload: PlotDocumentJsonContractV1 = serde_json::from_str(input)
            .map_err(|e| PlotError::Serialization(format!("failed to parse plot document json payload: {e}")))?;
        if payload.schema_version != PLOT_DOCUMENT_JSON_SCHEMA_V1 {
            return Err(PlotError::Serialization(format!(
                "unsupported plot document schema version: {}",
                payload.schema_version
            )));
        }
        Ok(payload.document)
    }
}

impl<R: Renderer> PlotEngine<R> {
    pub fn document_json_contract_v1_pretty(&self, scope: SaveScope) -> PlotResult<String> {
        self.save_document(scope)?.to_json_contract_v1_pretty()
    }
}

#[cfg(test)]
mod tests {
    use super::{PlotDocumentJsonContractV1, PLOT_DOCUMENT_JSON_SCHEMA_V1};
    use crate::api::PlotDocument;

    #[test]
    fn rejects_future_schema_version() {
        let payload = PlotDocumentJsonContractV1 {
            schema_version: PLOT_DOCUMENT_JSON_SCHEMA_V1 + 1,
            document: PlotDocument {
                coordinates: None,
                items: Vec::new(),
            },
        };
        let json = serde_json::to_string(&payload).expect("serialize");
        assert!(PlotDocument::from_json_compat_str(&json).is_err());
    }

    #[test]
    fn bare_document_is_accepted() {
        let document = PlotDocument::from_json_compat_str(r#"{ "items": [] }"#).expect("parse");
        assert!(document.items.is_empty());
        assert!(document.coordinates.is_none());
    }
}
