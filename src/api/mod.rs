//! Host-facing facade: engine construction, item management, view control,
//! input routing, rendering/export and the document boundary.

mod document;
mod engine;
mod engine_accessors;
mod engine_config;
mod engine_document;
mod engine_init;
mod engine_input;
mod engine_items;
mod engine_view;
mod json_contract;
mod observer_dispatch;
mod observer_registry;

pub use document::{
    DataKeys, DataResolver, DataSlot, ItemDocument, ItemPayload, LutDocument, PlotDocument,
    SaveScope,
};
pub use engine::PlotEngine;
pub use engine_config::PlotEngineConfig;
pub use json_contract::{PlotDocumentJsonContractV1, PLOT_DOCUMENT_JSON_SCHEMA_V1};
