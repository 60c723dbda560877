//! Dynamic arrays
//!
//! A [`DynamicArray`] models the common `{ data, count, capacity }` header of a
//! growable foreign array. Each refresh reads the header, pulls the whole
//! element block in one transfer and refreshes a pool of element views that
//! keeps its identity across refreshes.

use crate::field::FieldId;
use crate::layout::Layout;
use crate::source::{PointerWidth, Remote};
use crate::structure::{Record, Structure};
use crate::{Error, FieldSpec, Result};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Index;
use std::sync::Arc;
use std::time::Duration;

/// Default upper bound on elements carried by one array
pub const DEFAULT_MAX_CARRY: usize = 0x20000;

/// Header field used as the element count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CountSource {
    #[default]
    Count,
    Capacity,
}

impl CountSource {
    pub fn select(self, count: i32, capacity: i32) -> i32 {
        match self {
            CountSource::Count => count,
            CountSource::Capacity => capacity,
        }
    }
}

/// How elements are stored behind the data pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementMode {
    /// The data block holds pointers to elements
    #[default]
    Pointer,
    /// The data block holds the elements themselves
    Inline,
}

/// Pause between element refreshes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Throttle {
    /// Elements refreshed between two pauses
    pub every: usize,
    /// Pause length in milliseconds, zero disables throttling
    pub delay_ms: u64,
}

impl Default for Throttle {
    fn default() -> Self {
        Self {
            every: 1,
            delay_ms: 0,
        }
    }
}

impl Throttle {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn is_enabled(&self) -> bool {
        self.delay_ms > 0
    }
}

/// Per-array settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArrayOptions {
    /// Counts above this are treated as a corrupted header
    pub max_carry: usize,
    pub count_source: CountSource,
    pub element_mode: ElementMode,
    /// Bytes skipped after every element
    pub padding: usize,
    pub throttle: Throttle,
}

impl Default for ArrayOptions {
    fn default() -> Self {
        Self {
            max_carry: DEFAULT_MAX_CARRY,
            count_source: CountSource::default(),
            element_mode: ElementMode::default(),
            padding: 0,
            throttle: Throttle::default(),
        }
    }
}

/// Ids of the header fields in [`header_layout`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderFields {
    pub data: FieldId,
    pub count: FieldId,
    pub capacity: FieldId,
}

/// `data` pointer followed by `count` and `capacity` as 32-bit integers
pub fn header_layout(width: PointerWidth) -> (Layout, HeaderFields) {
    let mut layout = Layout::new("DynamicArray");
    let data = layout.field("data", FieldSpec::pointer(0));
    let count = layout.field("count", FieldSpec::primitive::<i32>(width.bytes()));
    let capacity = layout.field("capacity", FieldSpec::primitive::<i32>(width.bytes() + 4));
    (
        layout,
        HeaderFields {
            data,
            count,
            capacity,
        },
    )
}

type Factory<E> = Arc<dyn Fn(&Remote) -> Result<E> + Send + Sync>;
type Sleeper = Arc<dyn Fn(Duration) + Send + Sync>;

/// A foreign dynamic array of `E`
pub struct DynamicArray<E> {
    header: Structure,
    fields: HeaderFields,
    items: Vec<E>,
    factory: Factory<E>,
    element_size: usize,
    options: ArrayOptions,
    stale: bool,
    sleeper: Sleeper,
}

impl<E: Record> DynamicArray<E> {
    /// Array at `address` with default options
    ///
    /// `factory` builds one unplaced element view; it is called once up front
    /// to learn the element size and again whenever the array grows.
    pub fn new<F>(remote: &Remote, address: u64, factory: F) -> Result<Self>
    where
        F: Fn(&Remote) -> Result<E> + Send + Sync + 'static,
    {
        Self::with_options(remote, address, ArrayOptions::default(), factory)
    }

    pub fn with_options<F>(
        remote: &Remote,
        address: u64,
        options: ArrayOptions,
        factory: F,
    ) -> Result<Self>
    where
        F: Fn(&Remote) -> Result<E> + Send + Sync + 'static,
    {
        let (layout, fields) = header_layout(remote.pointer_width());
        let mut header = layout.build(remote)?;
        header.set_address(address);

        let element_size = factory(remote)?.structure().size();

        Ok(Self {
            header,
            fields,
            items: Vec::new(),
            factory: Arc::new(factory),
            element_size,
            options,
            stale: false,
            sleeper: Arc::new(std::thread::sleep),
        })
    }

    /// Replace the function used to pause between elements
    pub fn with_sleeper<F>(mut self, sleeper: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.sleeper = Arc::new(sleeper);
        self
    }

    /// Re-read the header and every element
    pub fn refresh(&mut self) -> Result<()> {
        self.header.refresh()?;
        self.populate()
    }

    /// Header invariant: `capacity > count` at a non-null address
    ///
    /// An empty array is refreshed once first, so a freshly created array
    /// reports on live data.
    pub fn is_valid(&mut self) -> bool {
        if self.selected() == 0 {
            if let Err(err) = self.refresh() {
                tracing::debug!("Array at {:#x} failed to refresh: {}", self.address(), err);
                return false;
            }
        }

        self.capacity() > self.count() && self.address() != 0
    }

    fn selected(&self) -> i32 {
        self.options
            .count_source
            .select(self.count(), self.capacity())
    }

    /// Steps following a header refresh
    fn populate(&mut self) -> Result<()> {
        let selected = self.selected();
        let max = self.options.max_carry;
        let n = usize::try_from(selected)
            .ok()
            .filter(|n| *n <= max)
            .ok_or(Error::OversizedCount {
                count: selected.into(),
                max,
            })?;
        let stride = self.stride();
        let block = n.checked_mul(stride).ok_or(Error::OversizedCount {
            count: selected.into(),
            max: usize::MAX / stride.max(1),
        })?;

        self.resize(n)?;
        if n == 0 {
            self.stale = false;
            return Ok(());
        }

        let data = self.data();
        let remote = self.header.remote().clone();

        let bytes = match data {
            0 => Err(Error::NullTarget),
            _ => remote.read(data, block),
        };
        let bytes = match bytes {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::debug!(
                    "Array at {:#x}: element block ({} x {} bytes at {:#x}) unreadable: {}",
                    self.address(),
                    n,
                    stride,
                    data,
                    err
                );
                self.stale = true;
                return Ok(());
            }
        };
        self.stale = false;

        let width = remote.pointer_width();
        let base = self.address();
        let element_size = self.element_size;
        let throttle = self.options.throttle;
        let mut pending = 0;

        for (i, item) in self.items.iter_mut().enumerate() {
            let offset = i * stride;

            let result = match self.options.element_mode {
                ElementMode::Pointer => {
                    item.set_address(width.decode(&bytes[offset..offset + width.bytes()]));
                    item.refresh()
                }
                ElementMode::Inline => {
                    item.set_address(base.wrapping_add(offset as u64));
                    item.refresh_from_bytes(&bytes[offset..offset + element_size])
                }
            };

            if let Err(err) = result {
                tracing::trace!("Array element {} at {:#x} not refreshed: {}", i, item.address(), err);
            }

            if throttle.is_enabled() {
                pending += 1;
                if pending >= throttle.every.max(1) {
                    (self.sleeper)(throttle.delay());
                    pending = 0;
                }
            }
        }

        Ok(())
    }

    /// Grow or shrink the element pool, keeping the surviving prefix
    fn resize(&mut self, n: usize) -> Result<()> {
        if self.items.len() > n {
            self.items.truncate(n);
            return Ok(());
        }

        let remote = self.header.remote().clone();
        self.items.reserve(n - self.items.len());
        while self.items.len() < n {
            self.items.push((self.factory)(&remote)?);
        }
        Ok(())
    }

    pub fn address(&self) -> u64 {
        self.header.address()
    }

    pub fn header(&self) -> &Structure {
        &self.header
    }

    pub fn header_fields(&self) -> HeaderFields {
        self.fields
    }

    pub fn data(&self) -> u64 {
        self.header.pointer(self.fields.data)
    }

    pub fn count(&self) -> i32 {
        self.header.read(self.fields.count)
    }

    pub fn capacity(&self) -> i32 {
        self.header.read(self.fields.capacity)
    }

    pub fn items(&self) -> &[E] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&E> {
        self.items.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut E> {
        self.items.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, E> {
        self.items.iter()
    }

    /// True when the last element block fetch failed and items hold older data
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn element_size(&self) -> usize {
        self.element_size
    }

    /// Distance between two elements in the data block
    pub fn stride(&self) -> usize {
        let base = match self.options.element_mode {
            ElementMode::Pointer => self.header.remote().pointer_width().bytes(),
            ElementMode::Inline => self.element_size,
        };
        base.saturating_add(self.options.padding)
    }

    pub fn options(&self) -> &ArrayOptions {
        &self.options
    }
}

impl DynamicArray<Structure> {
    /// Array whose elements are plain structures built from `layout`
    pub fn from_layout(
        remote: &Remote,
        address: u64,
        layout: Layout,
        options: ArrayOptions,
    ) -> Result<Self> {
        Self::with_options(remote, address, options, move |remote| layout.build(remote))
    }
}

impl<E: Record> Record for DynamicArray<E> {
    fn structure(&self) -> &Structure {
        &self.header
    }

    fn structure_mut(&mut self) -> &mut Structure {
        &mut self.header
    }

    fn refresh(&mut self) -> Result<()> {
        DynamicArray::refresh(self)
    }

    fn refresh_from_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.header.refresh_from_bytes(bytes)?;
        self.populate()
    }
}

impl<E> Index<usize> for DynamicArray<E> {
    type Output = E;

    fn index(&self, index: usize) -> &E {
        &self.items[index]
    }
}

impl<'a, E> IntoIterator for &'a DynamicArray<E> {
    type Item = &'a E;
    type IntoIter = std::slice::Iter<'a, E>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<E> fmt::Debug for DynamicArray<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicArray")
            .field("address", &self.header.address())
            .field("len", &self.items.len())
            .field("element_size", &self.element_size)
            .field("options", &self.options)
            .field("stale", &self.stale)
            .finish()
    }
}
