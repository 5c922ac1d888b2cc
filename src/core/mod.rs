pub mod axis;
pub mod buffer;
pub mod color;
pub mod coordinates;
pub mod geometry;
pub mod histogram;
pub mod lut;
pub mod scale;
pub mod stats;
pub mod ticks;
pub mod transform;
pub mod types;

pub use axis::{Axis, AxisId, AxisPair};
pub use buffer::{
    ArrayLayout, ArrayRef, ArrayView, ArrayViewMut, Element, ElementType, LineView, RegionView,
    Shape, SharedArray,
};
pub use color::Color;
pub use coordinates::{AspectLock, CoordinateSystem};
pub use histogram::{Histogram, Histogram2D};
pub use lut::{palette_preset, palette_presets, LutState, Palette, DEFAULT_LUT_LEVELS};
pub use scale::{AxisScale, MappingTable};
pub use stats::{interval_stats, Aggregate, IntervalStats, RegionStats};
pub use ticks::{axis_ticks, AxisTicks};
pub use transform::ImageTransform;
pub use types::{DataPoint, DataRect, DevicePoint, DeviceRect, Viewport};
