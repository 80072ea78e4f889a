//! Generational handles for arena-owned nodes
//!
//! Handles reference slots in a [`HandleMap`] without borrowing it. A handle
//! carries the generation of the slot it was issued for, so a handle kept
//! around after its value was removed is detected as stale instead of
//! silently aliasing whatever reuses the slot. A slot whose generations are
//! used up is retired rather than wrapped.

use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;

use crate::error::{Error, Result};

/// A type-safe handle to a value of type T stored in a [`HandleMap`]
#[repr(transparent)]
pub struct Handle<T> {
    /// Lower 24 bits: index, Upper 8 bits: generation
    bits: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    /// Maximum index value (24 bits)
    pub const MAX_INDEX: u32 = (1 << 24) - 1;

    /// Create a new handle from index and generation
    #[inline]
    pub const fn new(index: u32, generation: u8) -> Self {
        debug_assert!(index <= Self::MAX_INDEX);
        Self {
            bits: (generation as u32) << 24 | index,
            _marker: PhantomData,
        }
    }

    /// Create an invalid/null handle
    #[inline]
    pub const fn null() -> Self {
        Self {
            bits: u32::MAX,
            _marker: PhantomData,
        }
    }

    /// Check if this handle is null
    #[inline]
    pub const fn is_null(&self) -> bool {
        self.bits == u32::MAX
    }

    /// Get the index portion
    #[inline]
    pub const fn index(&self) -> u32 {
        self.bits & Self::MAX_INDEX
    }

    /// Get the generation portion
    #[inline]
    pub const fn generation(&self) -> u8 {
        (self.bits >> 24) as u8
    }
}

// Manual trait implementations to avoid T bounds
impl<T> Clone for Handle<T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.bits == other.bits
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bits.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "Handle(null)")
        } else {
            write!(f, "Handle({}v{})", self.index(), self.generation())
        }
    }
}

impl<T> fmt::Display for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "null")
        } else {
            write!(f, "{}v{}", self.index(), self.generation())
        }
    }
}

impl<T> Default for Handle<T> {
    fn default() -> Self {
        Self::null()
    }
}

/// Allocates handles with generation tracking
pub struct HandleAllocator<T> {
    /// Generations for each slot
    generations: Vec<u8>,
    /// Free list of available indices
    free_list: Vec<u32>,
    /// Slots that ran out of generations
    retired: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> HandleAllocator<T> {
    /// Create a new handle allocator
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    /// Create with specific initial capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            generations: Vec::with_capacity(capacity),
            free_list: Vec::with_capacity(capacity / 4),
            retired: 0,
            _marker: PhantomData,
        }
    }

    /// Allocate a new handle
    pub fn allocate(&mut self) -> Result<Handle<T>> {
        if let Some(index) = self.free_list.pop() {
            let gen = self.generations[index as usize];
            return Ok(Handle::new(index, gen));
        }

        let index = self.generations.len() as u32;
        if index > Handle::<T>::MAX_INDEX {
            return Err(Error::IllegalTreeState("handle allocator exhausted".into()));
        }
        self.generations.push(0);
        Ok(Handle::new(index, 0))
    }

    /// Generation marking a retired slot; never issued to a handle
    const RETIRED: u8 = u8::MAX;

    /// Free a handle, making its index available for reuse.
    ///
    /// A slot whose next generation would be [`u8::MAX`] is retired instead,
    /// so no handle issued for it can ever match again.
    pub fn free(&mut self, handle: Handle<T>) -> bool {
        if !self.is_valid(handle) {
            return false;
        }

        let index = handle.index() as usize;
        let gen = handle.generation() + 1;
        self.generations[index] = gen;
        if gen == Self::RETIRED {
            self.retired += 1;
        } else {
            self.free_list.push(handle.index());
        }
        true
    }

    /// Check if a handle is still valid
    pub fn is_valid(&self, handle: Handle<T>) -> bool {
        if handle.is_null() {
            return false;
        }
        let index = handle.index() as usize;
        if index >= self.generations.len() {
            return false;
        }
        let gen = self.generations[index];
        gen != Self::RETIRED && gen == handle.generation()
    }

    /// Get the number of allocated handles
    pub fn len(&self) -> usize {
        self.generations.len() - self.free_list.len() - self.retired
    }

    /// Check if no handles are allocated
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for HandleAllocator<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Arena storing values addressed by generational handles
pub struct HandleMap<T> {
    allocator: HandleAllocator<T>,
    values: Vec<Option<T>>,
}

impl<T> HandleMap<T> {
    /// Create a new handle map
    pub fn new() -> Self {
        Self {
            allocator: HandleAllocator::new(),
            values: Vec::new(),
        }
    }

    /// Insert a value and get a handle to it
    pub fn insert(&mut self, value: T) -> Result<Handle<T>> {
        let handle = self.allocator.allocate()?;
        let index = handle.index() as usize;

        if index >= self.values.len() {
            self.values.resize_with(index + 1, || None);
        }
        self.values[index] = Some(value);
        Ok(handle)
    }

    /// Remove a value by its handle
    pub fn remove(&mut self, handle: Handle<T>) -> Option<T> {
        if !self.allocator.free(handle) {
            return None;
        }
        self.values[handle.index() as usize].take()
    }

    /// Get a reference to a value by its handle
    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        if !self.allocator.is_valid(handle) {
            return None;
        }
        self.values.get(handle.index() as usize)?.as_ref()
    }

    /// Get a mutable reference to a value by its handle
    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        if !self.allocator.is_valid(handle) {
            return None;
        }
        self.values.get_mut(handle.index() as usize)?.as_mut()
    }

    /// Check if a handle is valid
    pub fn contains(&self, handle: Handle<T>) -> bool {
        self.allocator.is_valid(handle)
    }

    /// Get the number of values
    pub fn len(&self) -> usize {
        self.allocator.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.allocator.is_empty()
    }

    /// Iterate over all live handles and values
    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.values.iter().enumerate().filter_map(move |(i, opt)| {
            opt.as_ref().map(|v| {
                let gen = self.allocator.generations[i];
                (Handle::new(i as u32, gen), v)
            })
        })
    }
}

impl<T> Default for HandleMap<T> {
    fn default() -> Self {
        Self::new()
    }
}
