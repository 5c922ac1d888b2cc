//! Zero-copy numeric buffers shared between the caller and the engine.
//!
//! The caller owns a [`SharedArray`]; the engine only ever holds an
//! [`ArrayRef`], a weak handle that records the storage generation it was
//! bound to. Reads go through [`ArrayView`], which borrows the storage under a
//! read lock and converts elements to `f64` on the fly. Nothing here copies the
//! numeric payload.

use std::fmt;
use std::ops::{Deref, DerefMut, Range};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{PlotError, PlotResult};

/// Native element type of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    U8,
    U16,
    U32,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl ElementType {
    #[must_use]
    pub const fn bit_width(self) -> u32 {
        match self {
            Self::U8 | Self::I8 => 8,
            Self::U16 | Self::I16 => 16,
            Self::U32 | Self::I32 | Self::F32 => 32,
            Self::I64 | Self::F64 => 64,
        }
    }

    #[must_use]
    pub const fn is_integer(self) -> bool {
        !matches!(self, Self::F32 | Self::F64)
    }
}

/// Numeric element readable (and writable) through an adapter.
pub trait Element: Copy + Send + Sync + 'static {
    const TYPE: ElementType;

    fn to_f64(self) -> f64;

    /// Saturating, rounding conversion used by in-place writes.
    fn from_f64(value: f64) -> Self;
}

macro_rules! impl_integer_element {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const TYPE: ElementType = ElementType::$kind;

                fn to_f64(self) -> f64 {
                    self as f64
                }

                fn from_f64(value: f64) -> Self {
                    // `as` saturates and maps NaN to zero.
                    value.round() as $ty
                }
            }
        )*
    };
}

impl_integer_element!(
    u8 => U8,
    u16 => U16,
    u32 => U32,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
);

impl Element for f32 {
    const TYPE: ElementType = ElementType::F32;

    fn to_f64(self) -> f64 {
        f64::from(self)
    }

    fn from_f64(value: f64) -> Self {
        value as f32
    }
}

impl Element for f64 {
    const TYPE: ElementType = ElementType::F64;

    fn to_f64(self) -> f64 {
        self
    }

    fn from_f64(value: f64) -> Self {
        value
    }
}

/// Logical shape of a buffer. 1D buffers have `rows == 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape {
    pub rows: usize,
    pub cols: usize,
}

impl Shape {
    #[must_use]
    pub fn len(self) -> usize {
        self.rows * self.cols
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        self.len() == 0
    }
}

/// Element addressing inside the backing storage, in elements (not bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArrayLayout {
    pub rows: usize,
    pub cols: usize,
    pub row_stride: isize,
    pub col_stride: isize,
    pub offset: usize,
}

impl ArrayLayout {
    #[must_use]
    pub fn contiguous_1d(len: usize) -> Self {
        Self::contiguous_2d(1, len)
    }

    #[must_use]
    pub fn contiguous_2d(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            row_stride: cols as isize,
            col_stride: 1,
            offset: 0,
        }
    }

    #[must_use]
    pub fn shape(&self) -> Shape {
        Shape {
            rows: self.rows,
            cols: self.cols,
        }
    }

    #[must_use]
    pub fn is_contiguous(&self) -> bool {
        self.col_stride == 1 && (self.rows <= 1 || self.row_stride == self.cols as isize)
    }

    /// Checks that every addressable element lies inside `storage_len`.
    pub fn validate(&self, storage_len: usize) -> PlotResult<()> {
        if self.rows == 0 || self.cols == 0 {
            return Ok(());
        }
        let last_row = (self.rows - 1) as isize;
        let last_col = (self.cols - 1) as isize;
        let offset = self.offset as isize;
        let corners = [
            offset,
            offset + last_row * self.row_stride,
            offset + last_col * self.col_stride,
            offset + last_row * self.row_stride + last_col * self.col_stride,
        ];
        let min = corners.iter().copied().min().unwrap_or(offset);
        let max = corners.iter().copied().max().unwrap_or(offset);
        if min < 0 || max >= storage_len as isize {
            return Err(PlotError::InvalidData(format!(
                "layout {}x{} (strides {}, {}, offset {}) exceeds storage of {storage_len} elements",
                self.rows, self.cols, self.row_stride, self.col_stride, self.offset
            )));
        }
        Ok(())
    }

    #[inline]
    fn flat_index(&self, row: usize, col: usize) -> usize {
        (self.offset as isize + row as isize * self.row_stride + col as isize * self.col_stride)
            as usize
    }
}

struct ArrayStorage<T> {
    data: Vec<T>,
    layout: ArrayLayout,
    generation: u64,
}

struct ArrayCell<T> {
    storage: RwLock<ArrayStorage<T>>,
    revision: AtomicU64,
}

/// Element access without knowledge of the native type.
trait ElementSource: Sync {
    fn value(&self, flat: usize) -> f64;
}

trait ElementSink: ElementSource {
    fn set(&mut self, flat: usize, value: f64);
}

impl<T: Element> ElementSource for Vec<T> {
    #[inline]
    fn value(&self, flat: usize) -> f64 {
        self.get(flat).map_or(f64::NAN, |v| v.to_f64())
    }
}

impl<T: Element> ElementSink for Vec<T> {
    #[inline]
    fn set(&mut self, flat: usize, value: f64) {
        if let Some(slot) = self.get_mut(flat) {
            *slot = T::from_f64(value);
        }
    }
}

/// Type-erased view of an [`ArrayCell`] used behind `Weak` handles.
trait ErasedArray: Send + Sync {
    fn element_type(&self) -> ElementType;
    fn revision(&self) -> u64;
    fn generation(&self) -> PlotResult<u64>;
    fn read(&self, generation: u64, visit: &mut dyn FnMut(&dyn ElementSource)) -> PlotResult<()>;
    fn write(&self, generation: u64, visit: &mut dyn FnMut(&mut dyn ElementSink)) -> PlotResult<()>;
    fn storage_len(&self) -> PlotResult<usize>;
}

fn poisoned() -> PlotError {
    PlotError::StaleBuffer("buffer lock poisoned by a panicking writer".to_owned())
}

fn reshaped(expected: u64, found: u64) -> PlotError {
    PlotError::StaleBuffer(format!(
        "buffer was reshaped (bound to generation {expected}, now {found})"
    ))
}

impl<T: Element> ErasedArray for ArrayCell<T> {
    fn element_type(&self) -> ElementType {
        T::TYPE
    }

    fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    fn generation(&self) -> PlotResult<u64> {
        Ok(self.storage.read().map_err(|_| poisoned())?.generation)
    }

    fn read(&self, generation: u64, visit: &mut dyn FnMut(&dyn ElementSource)) -> PlotResult<()> {
        let storage = self.storage.read().map_err(|_| poisoned())?;
        if storage.generation != generation {
            return Err(reshaped(generation, storage.generation));
        }
        visit(&storage.data);
        Ok(())
    }

    fn write(&self, generation: u64, visit: &mut dyn FnMut(&mut dyn ElementSink)) -> PlotResult<()> {
        let mut storage = self.storage.write().map_err(|_| poisoned())?;
        if storage.generation != generation {
            return Err(reshaped(generation, storage.generation));
        }
        visit(&mut storage.data);
        self.revision.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn storage_len(&self) -> PlotResult<usize> {
        Ok(self.storage.read().map_err(|_| poisoned())?.data.len())
    }
}

/// Caller-owned numeric array. Cloning shares the same storage.
pub struct SharedArray<T: Element> {
    cell: Arc<ArrayCell<T>>,
}

impl<T: Element> Clone for SharedArray<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T: Element> fmt::Debug for SharedArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedArray")
            .field("element_type", &T::TYPE)
            .field("layout", &self.layout().ok())
            .field("revision", &self.revision())
            .finish()
    }
}

impl<T: Element> SharedArray<T> {
    /// Wraps a 1D vector (curve samples, histogram input).
    #[must_use]
    pub fn from_vec(data: Vec<T>) -> Self {
        let layout = ArrayLayout::contiguous_1d(data.len());
        Self::from_parts(data, layout)
    }

    /// Wraps a row-major `rows x cols` image.
    pub fn from_vec_2d(data: Vec<T>, rows: usize, cols: usize) -> PlotResult<Self> {
        Self::with_layout(data, ArrayLayout::contiguous_2d(rows, cols))
    }

    /// Wraps storage addressed through an arbitrary strided layout.
    pub fn with_layout(data: Vec<T>, layout: ArrayLayout) -> PlotResult<Self> {
        if layout.is_contiguous() && layout.offset == 0 && layout.rows * layout.cols != data.len() {
            return Err(PlotError::InvalidData(format!(
                "contiguous {}x{} layout does not match {} elements",
                layout.rows,
                layout.cols,
                data.len()
            )));
        }
        layout.validate(data.len())?;
        Ok(Self::from_parts(data, layout))
    }

    fn from_parts(data: Vec<T>, layout: ArrayLayout) -> Self {
        Self {
            cell: Arc::new(ArrayCell {
                storage: RwLock::new(ArrayStorage {
                    data,
                    layout,
                    generation: 0,
                }),
                revision: AtomicU64::new(0),
            }),
        }
    }

    pub fn layout(&self) -> PlotResult<ArrayLayout> {
        Ok(self.cell.storage.read().map_err(|_| poisoned())?.layout)
    }

    pub fn shape(&self) -> PlotResult<Shape> {
        Ok(self.layout()?.shape())
    }

    #[must_use]
    pub fn revision(&self) -> u64 {
        self.cell.revision()
    }

    /// Records an out-of-band mutation so renders pick it up.
    pub fn touch(&self) {
        self.cell.revision.fetch_add(1, Ordering::AcqRel);
    }

    /// Non-owning adapter bound to the current layout.
    pub fn adapter(&self) -> PlotResult<ArrayRef> {
        let layout = self.layout()?;
        self.adapter_with_layout(layout)
    }

    /// Non-owning adapter addressing the storage through `layout`, e.g. one
    /// column of a row-major table.
    pub fn adapter_with_layout(&self, layout: ArrayLayout) -> PlotResult<ArrayRef> {
        let storage = self.cell.storage.read().map_err(|_| poisoned())?;
        layout.validate(storage.data.len())?;
        let erased: Arc<dyn ErasedArray> = self.cell.clone();
        Ok(ArrayRef {
            source: Arc::downgrade(&erased),
            element_type: T::TYPE,
            layout,
            generation: storage.generation,
        })
    }

    pub fn read(&self) -> PlotResult<ArrayReadGuard<'_, T>> {
        Ok(ArrayReadGuard {
            guard: self.cell.storage.read().map_err(|_| poisoned())?,
        })
    }

    /// Exclusive access to the elements. The revision is bumped when the
    /// guard drops.
    pub fn write(&self) -> PlotResult<ArrayWriteGuard<'_, T>> {
        Ok(ArrayWriteGuard {
            guard: self.cell.storage.write().map_err(|_| poisoned())?,
            revision: &self.cell.revision,
        })
    }

    /// Replaces storage and layout. Every adapter bound before this call
    /// fails with `StaleBuffer` until rebound.
    pub fn reshape(&self, data: Vec<T>, layout: ArrayLayout) -> PlotResult<()> {
        layout.validate(data.len())?;
        let mut storage = self.cell.storage.write().map_err(|_| poisoned())?;
        storage.data = data;
        storage.layout = layout;
        storage.generation += 1;
        self.cell.revision.fetch_add(1, Ordering::AcqRel);
        trace!(generation = storage.generation, "reshape shared array");
        Ok(())
    }

    /// Runs `f` over a view of the whole array.
    pub fn with_view<R>(&self, f: impl FnOnce(ArrayView<'_>) -> R) -> PlotResult<R> {
        let storage = self.cell.storage.read().map_err(|_| poisoned())?;
        let layout = storage.layout;
        Ok(f(ArrayView::new(&storage.data, layout)))
    }
}

pub struct ArrayReadGuard<'a, T> {
    guard: RwLockReadGuard<'a, ArrayStorage<T>>,
}

impl<T> Deref for ArrayReadGuard<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.guard.data
    }
}

pub struct ArrayWriteGuard<'a, T> {
    guard: RwLockWriteGuard<'a, ArrayStorage<T>>,
    revision: &'a AtomicU64,
}

impl<T> Deref for ArrayWriteGuard<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.guard.data
    }
}

impl<T> DerefMut for ArrayWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.guard.data
    }
}

impl<T> Drop for ArrayWriteGuard<'_, T> {
    fn drop(&mut self) {
        self.revision.fetch_add(1, Ordering::AcqRel);
    }
}

/// Weak, non-owning handle to a caller's [`SharedArray`].
///
/// Cheap to clone; never keeps the data alive. Reads fail with
/// `StaleBuffer` once the owner is dropped or reshaped.
#[derive(Clone)]
pub struct ArrayRef {
    source: Weak<dyn ErasedArray>,
    element_type: ElementType,
    layout: ArrayLayout,
    generation: u64,
}

impl fmt::Debug for ArrayRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayRef")
            .field("element_type", &self.element_type)
            .field("layout", &self.layout)
            .field("generation", &self.generation)
            .field("alive", &(self.source.strong_count() > 0))
            .finish()
    }
}

impl ArrayRef {
    #[must_use]
    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    #[must_use]
    pub fn layout(&self) -> ArrayLayout {
        self.layout
    }

    #[must_use]
    pub fn shape(&self) -> Shape {
        self.layout.shape()
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.source.strong_count() > 0
    }

    fn upgrade(&self) -> PlotResult<Arc<dyn ErasedArray>> {
        self.source
            .upgrade()
            .ok_or_else(|| PlotError::StaleBuffer("buffer owner was dropped".to_owned()))
    }

    /// Current owner revision; fails when the owner is gone or reshaped.
    pub fn revision(&self) -> PlotResult<u64> {
        let cell = self.upgrade()?;
        let generation = cell.generation()?;
        if generation != self.generation {
            return Err(reshaped(self.generation, generation));
        }
        Ok(cell.revision())
    }

    /// Re-binds to the owner's current storage after a reshape, keeping
    /// `layout` (which must fit the new storage).
    pub fn rebind(&mut self, layout: ArrayLayout) -> PlotResult<()> {
        let cell = self.upgrade()?;
        layout.validate(cell.storage_len()?)?;
        self.generation = cell.generation()?;
        self.layout = layout;
        Ok(())
    }

    /// Runs `f` over a read-locked view. Writers on the same buffer are
    /// excluded for the duration of the call.
    pub fn with_view<R>(&self, f: impl FnOnce(ArrayView<'_>) -> R) -> PlotResult<R> {
        let cell = self.upgrade()?;
        let layout = self.layout;
        let mut f = Some(f);
        let mut out = None;
        cell.read(self.generation, &mut |source| {
            if let Some(f) = f.take() {
                out = Some(f(ArrayView { source, layout }));
            }
        })?;
        out.ok_or_else(|| PlotError::StaleBuffer("buffer read did not run".to_owned()))
    }

    /// Runs `f` over a write-locked view and bumps the owner revision.
    ///
    /// This mutates caller data; concurrent readers of the same buffer are
    /// blocked until it returns.
    pub fn with_view_mut<R>(&self, f: impl FnOnce(&mut ArrayViewMut<'_>) -> R) -> PlotResult<R> {
        let cell = self.upgrade()?;
        let layout = self.layout;
        let mut f = Some(f);
        let mut out = None;
        cell.write(self.generation, &mut |sink| {
            if let Some(f) = f.take() {
                out = Some(f(&mut ArrayViewMut { sink, layout }));
            }
        })?;
        out.ok_or_else(|| PlotError::StaleBuffer("buffer write did not run".to_owned()))
    }
}

/// Borrowed, read-only, type-erased view. Values are converted to `f64` on access.
#[derive(Clone, Copy)]
pub struct ArrayView<'a> {
    source: &'a dyn ElementSource,
    layout: ArrayLayout,
}

impl<'a> ArrayView<'a> {
    fn new<T: Element>(data: &'a Vec<T>, layout: ArrayLayout) -> Self {
        Self {
            source: data,
            layout,
        }
    }

    #[must_use]
    pub fn shape(&self) -> Shape {
        self.layout.shape()
    }

    /// Length of a 1D view (number of columns of the single row).
    #[must_use]
    pub fn len(&self) -> usize {
        self.layout.shape().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at `(row, col)`; `None` outside the shape.
    #[must_use]
    pub fn element_at(&self, row: usize, col: usize) -> Option<f64> {
        (row < self.layout.rows && col < self.layout.cols)
            .then(|| self.source.value(self.layout.flat_index(row, col)))
    }

    /// Element `index` of a 1D view, row-major for 2D views.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<f64> {
        if self.layout.cols == 0 {
            return None;
        }
        self.element_at(index / self.layout.cols, index % self.layout.cols)
    }

    /// Row-major iteration over every element.
    pub fn iter(&self) -> impl Iterator<Item = f64> + 'a {
        let view = *self;
        (0..view.layout.rows).flat_map(move |row| view.row(row).into_iter())
    }

    #[must_use]
    pub fn row(&self, row: usize) -> LineView<'a> {
        let row = row.min(self.layout.rows.saturating_sub(1));
        LineView {
            source: self.source,
            start: self.layout.flat_index(row, 0) as isize,
            stride: self.layout.col_stride,
            len: if self.layout.rows == 0 { 0 } else { self.layout.cols },
        }
    }

    #[must_use]
    pub fn column(&self, col: usize) -> LineView<'a> {
        let col = col.min(self.layout.cols.saturating_sub(1));
        LineView {
            source: self.source,
            start: self.layout.flat_index(0, col) as isize,
            stride: self.layout.row_stride,
            len: if self.layout.cols == 0 { 0 } else { self.layout.rows },
        }
    }

    /// Lazy sub-rectangle view; each row is a strided view, never a copy.
    pub fn region(&self, rows: Range<usize>, cols: Range<usize>) -> PlotResult<RegionView<'a>> {
        if rows.start >= rows.end
            || cols.start >= cols.end
            || rows.end > self.layout.rows
            || cols.end > self.layout.cols
        {
            return Err(PlotError::InvalidData(format!(
                "region rows {rows:?} cols {cols:?} outside {}x{} buffer",
                self.layout.rows, self.layout.cols
            )));
        }
        let layout = ArrayLayout {
            rows: rows.end - rows.start,
            cols: cols.end - cols.start,
            row_stride: self.layout.row_stride,
            col_stride: self.layout.col_stride,
            offset: self.layout.flat_index(rows.start, cols.start),
        };
        Ok(RegionView {
            view: ArrayView {
                source: self.source,
                layout,
            },
            origin: (rows.start, cols.start),
        })
    }

    /// Streaming min/max over finite values.
    #[must_use]
    pub fn finite_min_max(&self) -> Option<(f64, f64)> {
        self.iter().filter(|v| v.is_finite()).fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }
}

/// One row or column of an [`ArrayView`].
#[derive(Clone, Copy)]
pub struct LineView<'a> {
    source: &'a dyn ElementSource,
    start: isize,
    stride: isize,
    len: usize,
}

impl<'a> LineView<'a> {
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<f64> {
        (index < self.len).then(|| self.source.value((self.start + index as isize * self.stride) as usize))
    }
}

impl<'a> IntoIterator for LineView<'a> {
    type Item = f64;
    type IntoIter = LineIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        LineIter { line: self, next: 0 }
    }
}

pub struct LineIter<'a> {
    line: LineView<'a>,
    next: usize,
}

impl Iterator for LineIter<'_> {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        let value = self.line.get(self.next)?;
        self.next += 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.line.len - self.next.min(self.line.len);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for LineIter<'_> {}

/// Axis-aligned sub-rectangle of an image.
#[derive(Clone, Copy)]
pub struct RegionView<'a> {
    view: ArrayView<'a>,
    origin: (usize, usize),
}

impl<'a> RegionView<'a> {
    #[must_use]
    pub fn shape(&self) -> Shape {
        self.view.shape()
    }

    /// `(row, col)` of the region's top-left element in the parent buffer.
    #[must_use]
    pub fn origin(&self) -> (usize, usize) {
        self.origin
    }

    #[must_use]
    pub fn element_at(&self, row: usize, col: usize) -> Option<f64> {
        self.view.element_at(row, col)
    }

    /// Lazy sequence of row views.
    pub fn rows(&self) -> impl Iterator<Item = LineView<'a>> + 'a {
        let view = self.view;
        (0..view.layout.rows).map(move |row| view.row(row))
    }

    #[must_use]
    pub fn as_view(&self) -> ArrayView<'a> {
        self.view
    }
}

/// Borrowed write access used by in-place filters.
pub struct ArrayViewMut<'a> {
    sink: &'a mut dyn ElementSink,
    layout: ArrayLayout,
}

impl ArrayViewMut<'_> {
    #[must_use]
    pub fn shape(&self) -> Shape {
        self.layout.shape()
    }

    #[must_use]
    pub fn element_at(&self, row: usize, col: usize) -> Option<f64> {
        (row < self.layout.rows && col < self.layout.cols)
            .then(|| self.sink.value(self.layout.flat_index(row, col)))
    }

    /// Writes `value` converted to the native element type; returns `false`
    /// outside the shape.
    pub fn set(&mut self, row: usize, col: usize, value: f64) -> bool {
        if row >= self.layout.rows || col >= self.layout.cols {
            return false;
        }
        self.sink.set(self.layout.flat_index(row, col), value);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::{ArrayLayout, ElementType, SharedArray};

    #[test]
    fn adapter_reads_native_u16_without_copy() {
        let owner = SharedArray::from_vec_2d((0u16..6).collect(), 2, 3).expect("array");
        let adapter = owner.adapter().expect("adapter");
        assert_eq!(adapter.element_type(), ElementType::U16);
        let value = adapter.with_view(|view| view.element_at(1, 2)).expect("read");
        assert_eq!(value, Some(5.0));
    }

    #[test]
    fn dropped_owner_makes_adapter_stale() {
        let owner = SharedArray::from_vec(vec![1.0f64, 2.0]);
        let adapter = owner.adapter().expect("adapter");
        drop(owner);
        assert!(!adapter.is_alive());
        assert!(adapter.with_view(|view| view.len()).is_err());
        assert!(adapter.revision().is_err());
    }

    #[test]
    fn reshape_invalidates_until_rebind() {
        let owner = SharedArray::from_vec(vec![1.0f32; 4]);
        let mut adapter = owner.adapter().expect("adapter");
        owner
            .reshape(vec![0.0; 6], ArrayLayout::contiguous_2d(2, 3))
            .expect("reshape");
        assert!(adapter.with_view(|view| view.len()).is_err());
        adapter
            .rebind(ArrayLayout::contiguous_2d(2, 3))
            .expect("rebind");
        assert_eq!(adapter.with_view(|view| view.len()).expect("read"), 6);
    }

    #[test]
    fn write_guard_bumps_revision() {
        let owner = SharedArray::from_vec(vec![0u8; 3]);
        let adapter = owner.adapter().expect("adapter");
        let before = adapter.revision().expect("revision");
        owner.write().expect("write")[1] = 9;
        assert_eq!(adapter.revision().expect("revision"), before + 1);
    }

    #[test]
    fn strided_column_adapter_views_table_column() {
        // 3 rows x 2 cols table, second column as a 1D series.
        let owner = SharedArray::from_vec_2d(vec![0.0, 10.0, 1.0, 11.0, 2.0, 12.0], 3, 2).expect("table");
        let column = ArrayLayout {
            rows: 1,
            cols: 3,
            row_stride: 0,
            col_stride: 2,
            offset: 1,
        };
        let adapter = owner.adapter_with_layout(column).expect("column adapter");
        let values: Vec<f64> = adapter.with_view(|view| view.iter().collect()).expect("read");
        assert_eq!(values, vec![10.0, 11.0, 12.0]);
    }

    #[test]
    fn region_rows_are_views_into_parent() {
        let owner = SharedArray::from_vec_2d((0i32..16).collect(), 4, 4).expect("image");
        let sums: Vec<f64> = owner
            .with_view(|view| {
                let region = view.region(1..3, 2..4).expect("region");
                region.rows().map(|row| row.into_iter().sum()).collect()
            })
            .expect("view");
        assert_eq!(sums, vec![6.0 + 7.0, 10.0 + 11.0]);
    }

    #[test]
    fn in_place_write_saturates_to_native_type() {
        let owner = SharedArray::from_vec_2d(vec![0u8; 4], 2, 2).expect("image");
        let adapter = owner.adapter().expect("adapter");
        adapter
            .with_view_mut(|view| {
                view.set(0, 0, 300.0);
                view.set(1, 1, -4.0);
            })
            .expect("write");
        assert_eq!(&*owner.read().expect("read"), &[255, 0, 0, 0]);
    }

    #[test]
    fn owner_and_adapter_views_see_the_same_storage() {
        let owner = SharedArray::from_vec_2d(vec![1.5f32, 2.5, 3.5, 4.5], 2, 2).expect("image");
        let adapter = owner.adapter().expect("adapter");
        adapter
            .with_view_mut(|view| assert!(view.set(1, 0, 8.0)))
            .expect("write");
        let through_owner = owner.with_view(|view| view.element_at(1, 0)).expect("owner view");
        let through_adapter = adapter.with_view(|view| view.element_at(1, 0)).expect("adapter view");
        assert_eq!(through_owner, Some(8.0));
        assert_eq!(through_adapter, through_owner);
        assert_eq!(adapter.with_view(|view| view.element_at(2, 0)).expect("view"), None);
    }

    #[test]
    fn out_of_bounds_layout_is_rejected() {
        let layout = ArrayLayout::contiguous_2d(3, 3);
        assert!(SharedArray::with_layout(vec![0.0f64; 8], layout).is_err());
    }
}
