use thiserror::Error;

use crate::items::ItemId;

pub type PlotResult<T> = Result<T, PlotError>;

#[derive(Debug, Error)]
pub enum PlotError {
    #[error("invalid axis range: min={min}, max={max}")]
    InvalidRange { min: f64, max: f64 },

    #[error("stale buffer: {0}")]
    StaleBuffer(String),

    #[error("unsupported shape: {0}")]
    UnsupportedShape(String),

    #[error("tool `{requested}` cannot be activated while `{active}` gesture is in progress")]
    ToolBusy {
        active: &'static str,
        requested: &'static str,
    },

    #[error("invalid viewport size: width={width}, height={height}")]
    InvalidViewport { width: u32, height: u32 },

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("unknown item: {0}")]
    UnknownItem(ItemId),

    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl PlotError {
    pub(crate) fn invalid_range(min: f64, max: f64) -> Self {
        Self::InvalidRange { min, max }
    }
}
