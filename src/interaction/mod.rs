//! Input handling: exactly one active tool, plus navigation gestures (wheel
//! zoom, middle-button pan) available whenever no gesture is in progress.
//!
//! Tools are explicit state machines. A gesture starts on primary
//! pointer-down and ends on pointer-up (commit) or cancel (escape or a
//! secondary click), which restores whatever the gesture changed.

mod contrast;
mod cross_section;
mod filter;
mod interval;
mod selection;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::core::{AxisId, AxisPair, CoordinateSystem, DevicePoint, DeviceRect};
use crate::error::{PlotError, PlotResult};
use crate::extensions::PlotEvent;
use crate::render::{Color, ItemLayer, LineDash, RectPrimitive, StrokeStyle};
use crate::scene::Scene;

pub use contrast::{ContrastEdge, ContrastTool};
pub use cross_section::{
    BandAccumulator, CrossSectionCurve, CrossSectionGeometry, CrossSectionMode, CrossSectionPlot,
    CrossSectionTool, SectionAxis,
};
pub use filter::{FilterOutput, FilterResult, FilterTool, RegionFilter};
pub use interval::IntervalTool;
pub use selection::SelectionTool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointerButton {
    Primary,
    Middle,
    Secondary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Modifiers {
    pub shift: bool,
    pub control: bool,
    pub alt: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        shift: false,
        control: false,
        alt: false,
    };

    /// Shift or control extends the selection instead of replacing it.
    #[must_use]
    pub fn additive(self) -> bool {
        self.shift || self.control
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Key {
    Escape,
    Delete,
}

/// Input surface forwarded by the embedding toolkit, in device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum InputEvent {
    PointerDown {
        position: DevicePoint,
        button: PointerButton,
        modifiers: Modifiers,
    },
    PointerMove {
        position: DevicePoint,
        modifiers: Modifiers,
    },
    PointerUp {
        position: DevicePoint,
        button: PointerButton,
        modifiers: Modifiers,
    },
    /// Positive `delta` zooms in, in wheel notches.
    Wheel {
        position: DevicePoint,
        delta: f64,
        modifiers: Modifiers,
    },
    Key {
        key: Key,
        modifiers: Modifiers,
    },
}

impl InputEvent {
    #[must_use]
    pub fn down(x: f64, y: f64) -> Self {
        Self::PointerDown {
            position: DevicePoint::new(x, y),
            button: PointerButton::Primary,
            modifiers: Modifiers::NONE,
        }
    }

    #[must_use]
    pub fn moved(x: f64, y: f64) -> Self {
        Self::PointerMove {
            position: DevicePoint::new(x, y),
            modifiers: Modifiers::NONE,
        }
    }

    #[must_use]
    pub fn up(x: f64, y: f64) -> Self {
        Self::PointerUp {
            position: DevicePoint::new(x, y),
            button: PointerButton::Primary,
            modifiers: Modifiers::NONE,
        }
    }

    #[must_use]
    pub fn key(key: Key) -> Self {
        Self::Key {
            key,
            modifiers: Modifiers::NONE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ToolKind {
    #[default]
    Selection,
    IntervalSelection,
    ContrastRange,
    CrossSection,
    RectangularFilter,
}

impl ToolKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Selection => "selection",
            Self::IntervalSelection => "interval-selection",
            Self::ContrastRange => "contrast-range",
            Self::CrossSection => "cross-section",
            Self::RectangularFilter => "rectangular-filter",
        }
    }
}

/// Mutable state handed to a tool for one input event.
pub(crate) struct ToolContext<'a> {
    pub scene: &'a mut Scene,
    pub coords: &'a CoordinateSystem,
    pub tolerance: f64,
    pub events: &'a mut Vec<PlotEvent>,
}

pub(crate) trait GestureTool {
    fn is_busy(&self) -> bool;

    fn pointer_down(&mut self, ctx: &mut ToolContext<'_>, position: DevicePoint, modifiers: Modifiers) -> PlotResult<()>;

    fn pointer_move(&mut self, ctx: &mut ToolContext<'_>, position: DevicePoint) -> PlotResult<()>;

    fn pointer_up(&mut self, ctx: &mut ToolContext<'_>, position: DevicePoint) -> PlotResult<()>;

    fn cancel(&mut self, ctx: &mut ToolContext<'_>) -> PlotResult<()>;

    fn overlay(&self, _coords: &CoordinateSystem, _scene: &Scene) -> Option<ItemLayer> {
        None
    }
}

#[derive(Debug, Clone)]
pub enum Tool {
    Selection(SelectionTool),
    IntervalSelection(IntervalTool),
    ContrastRange(ContrastTool),
    CrossSection(CrossSectionTool),
    RectangularFilter(FilterTool),
}

impl Default for Tool {
    fn default() -> Self {
        Self::Selection(SelectionTool::default())
    }
}

macro_rules! impl_from_tool {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Tool {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

impl_from_tool!(
    Selection => SelectionTool,
    IntervalSelection => IntervalTool,
    ContrastRange => ContrastTool,
    CrossSection => CrossSectionTool,
    RectangularFilter => FilterTool,
);

impl Tool {
    #[must_use]
    pub fn kind(&self) -> ToolKind {
        match self {
            Self::Selection(_) => ToolKind::Selection,
            Self::IntervalSelection(_) => ToolKind::IntervalSelection,
            Self::ContrastRange(_) => ToolKind::ContrastRange,
            Self::CrossSection(_) => ToolKind::CrossSection,
            Self::RectangularFilter(_) => ToolKind::RectangularFilter,
        }
    }

    fn handler(&self) -> &dyn GestureTool {
        match self {
            Self::Selection(tool) => tool,
            Self::IntervalSelection(tool) => tool,
            Self::ContrastRange(tool) => tool,
            Self::CrossSection(tool) => tool,
            Self::RectangularFilter(tool) => tool,
        }
    }

    fn handler_mut(&mut self) -> &mut dyn GestureTool {
        match self {
            Self::Selection(tool) => tool,
            Self::IntervalSelection(tool) => tool,
            Self::ContrastRange(tool) => tool,
            Self::CrossSection(tool) => tool,
            Self::RectangularFilter(tool) => tool,
        }
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.handler().is_busy()
    }
}

#[derive(Debug, Clone)]
struct PanGesture {
    pair: AxisPair,
    last: DevicePoint,
    original: [(AxisId, (f64, f64)); 2],
}

/// Routes input events to the active tool or to navigation.
#[derive(Debug, Clone)]
pub struct InteractionController {
    tool: Tool,
    pan: Option<PanGesture>,
    hit_tolerance_px: f64,
    wheel_zoom_step: f64,
}

impl Default for InteractionController {
    fn default() -> Self {
        Self::new(5.0)
    }
}

impl InteractionController {
    #[must_use]
    pub fn new(hit_tolerance_px: f64) -> Self {
        Self {
            tool: Tool::default(),
            pan: None,
            hit_tolerance_px,
            wheel_zoom_step: 1.25,
        }
    }

    #[must_use]
    pub fn tool(&self) -> &Tool {
        &self.tool
    }

    pub fn tool_mut(&mut self) -> &mut Tool {
        &mut self.tool
    }

    #[must_use]
    pub fn tool_kind(&self) -> ToolKind {
        self.tool.kind()
    }

    #[must_use]
    pub fn hit_tolerance_px(&self) -> f64 {
        self.hit_tolerance_px
    }

    pub fn set_hit_tolerance_px(&mut self, tolerance: f64) {
        self.hit_tolerance_px = tolerance.max(0.0);
    }

    /// Zoom factor per wheel notch (> 1).
    pub fn set_wheel_zoom_step(&mut self, step: f64) -> PlotResult<()> {
        if !step.is_finite() || step <= 1.0 {
            return Err(PlotError::InvalidData("wheel zoom step must be finite and > 1".to_owned()));
        }
        self.wheel_zoom_step = step;
        Ok(())
    }

    /// Whether a tool gesture or a pan is in progress.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.pan.is_some() || self.tool.is_busy()
    }

    /// Switches tools; refused with `ToolBusy` in the middle of a gesture.
    pub fn set_tool(&mut self, tool: impl Into<Tool>) -> PlotResult<()> {
        let tool = tool.into();
        if self.is_busy() {
            let active = if self.pan.is_some() { "pan" } else { self.tool.kind().name() };
            return Err(PlotError::ToolBusy {
                active,
                requested: tool.kind().name(),
            });
        }
        debug!(tool = tool.kind().name(), "tool activated");
        self.tool = tool;
        Ok(())
    }

    /// Preview primitives of the gesture in progress, drawn above all items.
    #[must_use]
    pub fn overlay(&self, coords: &CoordinateSystem, scene: &Scene) -> Option<ItemLayer> {
        self.tool.handler().overlay(coords, scene)
    }

    pub fn handle(
        &mut self,
        event: InputEvent,
        scene: &mut Scene,
        coords: &mut CoordinateSystem,
    ) -> PlotResult<Vec<PlotEvent>> {
        let mut events = Vec::new();
        match event {
            InputEvent::Key { key: Key::Escape, .. } => self.cancel(scene, coords, &mut events)?,
            InputEvent::Key { key: Key::Delete, .. } => {
                if !self.is_busy() && matches!(self.tool, Tool::Selection(_)) {
                    delete_selected(scene, &mut events);
                }
            }
            InputEvent::PointerDown {
                button: PointerButton::Secondary,
                ..
            } => {
                if self.is_busy() {
                    self.cancel(scene, coords, &mut events)?;
                }
            }
            InputEvent::PointerDown {
                position,
                button: PointerButton::Middle,
                ..
            } => {
                if !self.is_busy() {
                    let pair = coords.active_axes();
                    self.pan = Some(PanGesture {
                        pair,
                        last: position,
                        original: [(pair.x, coords.axis_range(pair.x)), (pair.y, coords.axis_range(pair.y))],
                    });
                }
            }
            InputEvent::PointerDown {
                position,
                button: PointerButton::Primary,
                modifiers,
            } => {
                if self.pan.is_none() {
                    let mut ctx = self.context(scene, coords, &mut events);
                    self.tool.handler_mut().pointer_down(&mut ctx, position, modifiers)?;
                }
            }
            InputEvent::PointerMove { position, .. } => {
                if let Some(pan) = &mut self.pan {
                    let (dx, dy) = (position.x - pan.last.x, position.y - pan.last.y);
                    if dx != 0.0 || dy != 0.0 {
                        coords.pan_by_pixels(pan.pair, dx, dy)?;
                        pan.last = position;
                        push_view_events(coords, pan.pair, &mut events);
                    }
                } else if self.tool.is_busy() {
                    let mut ctx = self.context(scene, coords, &mut events);
                    self.tool.handler_mut().pointer_move(&mut ctx, position)?;
                }
            }
            InputEvent::PointerUp {
                button: PointerButton::Middle,
                ..
            } => {
                if self.pan.take().is_some() {
                    trace!("pan finished");
                }
            }
            InputEvent::PointerUp {
                position,
                button: PointerButton::Primary,
                ..
            } => {
                if self.tool.is_busy() {
                    let mut ctx = self.context(scene, coords, &mut events);
                    self.tool.handler_mut().pointer_up(&mut ctx, position)?;
                }
            }
            InputEvent::PointerUp {
                button: PointerButton::Secondary,
                ..
            } => {}
            InputEvent::Wheel { position, delta, .. } => {
                if !self.is_busy() && delta.is_finite() && delta != 0.0 {
                    let pair = coords.active_axes();
                    coords.zoom_around(pair, self.wheel_zoom_step.powf(delta), position)?;
                    push_view_events(coords, pair, &mut events);
                }
            }
        }
        Ok(events)
    }

    /// Aborts the gesture in progress without committing it.
    pub fn cancel(&mut self, scene: &mut Scene, coords: &mut CoordinateSystem, events: &mut Vec<PlotEvent>) -> PlotResult<()> {
        if let Some(pan) = self.pan.take() {
            for (axis, (min, max)) in pan.original {
                coords.set_axis_range(axis, min, max)?;
            }
            push_view_events(coords, pan.pair, events);
            debug!("pan cancelled");
        }
        if self.tool.is_busy() {
            let mut ctx = self.context(scene, coords, events);
            self.tool.handler_mut().cancel(&mut ctx)?;
            debug!(tool = self.tool.kind().name(), "gesture cancelled");
        }
        Ok(())
    }

    fn context<'a>(
        &self,
        scene: &'a mut Scene,
        coords: &'a CoordinateSystem,
        events: &'a mut Vec<PlotEvent>,
    ) -> ToolContext<'a> {
        ToolContext {
            scene,
            coords,
            tolerance: self.hit_tolerance_px,
            events,
        }
    }
}

fn push_view_events(coords: &CoordinateSystem, pair: AxisPair, events: &mut Vec<PlotEvent>) {
    for axis in [pair.x, pair.y] {
        let (min, max) = coords.axis_range(axis);
        events.push(PlotEvent::ViewRangeChanged { axis, min, max });
    }
}

/// Removes the selected items that are not read-only.
fn delete_selected(scene: &mut Scene, events: &mut Vec<PlotEvent>) {
    let mut removed = Vec::new();
    for id in scene.selected_ids() {
        if !scene.contains(id) {
            continue;
        }
        match scene.remove(id) {
            Ok(ids) => removed.extend(ids),
            Err(err) => debug!(%id, error = %err, "delete skipped item"),
        }
    }
    if !removed.is_empty() {
        events.push(PlotEvent::ItemsRemoved(removed));
        events.push(PlotEvent::SelectionChanged {
            selected: scene.selected_ids(),
        });
        events.push(PlotEvent::ActiveItemChanged(scene.active()));
    }
}

/// Dashed rectangle between two device points.
pub(crate) fn rubber_band(a: DevicePoint, b: DevicePoint) -> ItemLayer {
    let mut layer = ItemLayer::new(None);
    layer.rects.push(RectPrimitive::new(
        DeviceRect::from_corners(a, b),
        Some(Color::rgba(0.2, 0.4, 1.0, 0.15)),
        Some(StrokeStyle::solid(Color::rgb(0.2, 0.4, 1.0), 1.0).with_dash(LineDash::Dashed)),
    ));
    layer
}

/// Emits the selection events when the selection or active item changed.
pub(crate) fn push_selection_events(scene: &Scene, before_active: Option<crate::items::ItemId>, events: &mut Vec<PlotEvent>) {
    events.push(PlotEvent::SelectionChanged {
        selected: scene.selected_ids(),
    });
    if scene.active() != before_active {
        events.push(PlotEvent::ActiveItemChanged(scene.active()));
    }
}
