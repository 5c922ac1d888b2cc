//! sciplot-rs: interactive 2D plotting engine for curves, large images and
//! annotated shapes.
//!
//! Items read caller-owned arrays through revision-checked adapters, a render
//! pipeline turns the scene into device-space frames with per-item caching,
//! and one active tool at a time turns pointer input into scene edits.

pub mod api;
pub mod core;
pub mod error;
pub mod extensions;
pub mod interaction;
pub mod items;
pub mod render;
pub mod scene;
pub mod telemetry;

pub use api::{PlotEngine, PlotEngineConfig};
pub use error::{PlotError, PlotResult};
