use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::core::{AxisId, IntervalStats, Viewport};
use crate::interaction::ToolKind;
use crate::items::ItemId;

/// Read-only state snapshot passed to observer hooks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObserverContext {
    pub viewport: Viewport,
    pub item_count: usize,
    pub selected_count: usize,
    pub active_item: Option<ItemId>,
    pub tool: ToolKind,
}

/// Event stream exposed to observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlotEvent {
    ItemsAdded(Vec<ItemId>),
    ItemsRemoved(Vec<ItemId>),
    SelectionChanged { selected: Vec<ItemId> },
    ActiveItemChanged(Option<ItemId>),
    /// Live geometry change during a drag.
    ItemMoved(ItemId),
    /// End of a gesture that changed the item.
    ItemCommitted(ItemId),
    ViewRangeChanged { axis: AxisId, min: f64, max: f64 },
    IntervalChanged {
        range: ItemId,
        x0: f64,
        x1: f64,
        stats: Option<IntervalStats>,
    },
    LutChanged { item: ItemId, lo: f64, hi: f64 },
    CrossSectionUpdated { curves: usize },
    FilterApplied { item: ItemId, rows: usize, cols: usize },
    ToolChanged(ToolKind),
    Rendered {
        items_drawn: usize,
        cache_hits: usize,
        items_skipped: usize,
    },
}

/// Extension hook interface for host-side reactions.
///
/// Observers see events after the engine state is updated and cannot mutate
/// it from inside the hook.
pub trait PlotObserver {
    fn id(&self) -> &str;
    fn on_event(&mut self, event: &PlotEvent, context: &ObserverContext);
}

/// Observer that keeps every event, for tests and replay tooling.
///
/// Clones share one log, so a handle kept by the host still sees events
/// after another clone was registered with the engine.
#[derive(Debug, Clone)]
pub struct EventLog {
    id: String,
    events: Rc<RefCell<Vec<PlotEvent>>>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new("event-log")
    }
}

impl EventLog {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            events: Rc::default(),
        }
    }

    #[must_use]
    pub fn events(&self) -> Vec<PlotEvent> {
        self.events.borrow().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    /// Whether any recorded event matches `predicate`.
    pub fn any(&self, predicate: impl Fn(&PlotEvent) -> bool) -> bool {
        self.events.borrow().iter().any(predicate)
    }
}

impl PlotObserver for EventLog {
    fn id(&self) -> &str {
        &self.id
    }

    fn on_event(&mut self, event: &PlotEvent, _context: &ObserverContext) {
        self.events.borrow_mut().push(event.clone());
    }
}
