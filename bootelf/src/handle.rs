//! Bounds-checked record handles.

use core::fmt;
use core::marker::PhantomData;

use crate::view::Record;

/// Offset of a validated `R` record inside the source image.
///
/// Only the validator and the table walkers create handles, and only after
/// checking that `offset + size_of::<R>()` lies within the image. Reading a
/// field through a handle re-checks the extent, so a handle carried over to
/// a different (shorter) image reads as zero instead of out of bounds.
/// An invalid handle is `None` wherever a handle may be absent.
pub struct Handle<R: Record> {
    offset: usize,
    _kind: PhantomData<fn() -> R>,
}

impl<R: Record> Handle<R> {
    pub(crate) fn new(offset: usize) -> Self {
        Self {
            offset,
            _kind: PhantomData,
        }
    }

    /// Byte offset of the record within the image.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl<R: Record> Clone for Handle<R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R: Record> Copy for Handle<R> {}

impl<R: Record> PartialEq for Handle<R> {
    fn eq(&self, other: &Self) -> bool {
        self.offset == other.offset
    }
}

impl<R: Record> Eq for Handle<R> {}

impl<R: Record> fmt::Debug for Handle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:#x}", R::KIND, self.offset)
    }
}
