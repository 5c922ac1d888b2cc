//! Host-facing hooks that sit outside the render and interaction paths.

pub mod observers;

pub use observers::{EventLog, ObserverContext, PlotEvent, PlotObserver};
