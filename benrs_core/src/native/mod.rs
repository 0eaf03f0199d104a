//! Ownership of the records handed to the Benson engine
//!
//! A record lives in a [`Handle`] and is torn down in two steps: its members are freed, then
//! the record itself is released. Both steps are idempotent and run on drop, so a record
//! that was only partially populated (for example because an allocation failed half way
//! through a build) is always safe to release.
pub mod buffer;
pub mod records;

use crate::benson::{EngineError, LpIdx, VlpAlgorithm};
use records::{OptRecord, VlpRecord};

pub use buffer::{AllocationError, NativeBuffer};

/// A record whose members can be released independently of the record itself
pub trait NativeRecord: Default {
    /// Release every owned member, leaving each one absent
    ///
    /// Must be safe to call with any subset of the members already absent.
    fn free_members(&mut self);
}

/// Owning handle around a solver record
#[derive(Debug)]
pub struct Handle<T: NativeRecord> {
    record: Option<Box<T>>,
}

impl<T: NativeRecord> Handle<T> {
    /// Allocate a record with every member absent
    pub fn new() -> Self {
        Handle {
            record: Some(Box::default()),
        }
    }

    pub fn get(&self) -> Option<&T> {
        self.record.as_deref()
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.record.as_deref_mut()
    }

    /// Mutable access to the record, allocating a fresh one if it was released
    pub fn get_or_init(&mut self) -> &mut T {
        self.record.get_or_insert_with(Box::default)
    }

    /// Whether the record has been released
    pub fn is_released(&self) -> bool {
        self.record.is_none()
    }

    /// First teardown step, keeps the record itself
    pub fn free_members(&mut self) {
        if let Some(record) = self.record.as_mut() {
            record.free_members();
        }
    }

    /// Free the members, then release the record
    pub fn release(&mut self) {
        if let Some(mut record) = self.record.take() {
            record.free_members();
        }
    }
}

impl<T: NativeRecord> Default for Handle<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: NativeRecord> Drop for Handle<T> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Guard over an initialised LP working structure of the engine
///
/// The structure is freed exactly once, when the guard is dropped.
pub struct LpLease<'e, E: VlpAlgorithm + ?Sized> {
    engine: &'e E,
    idx: LpIdx,
}

impl<'e, E: VlpAlgorithm + ?Sized> LpLease<'e, E> {
    /// Initialise the LP working structure `idx` for a problem
    ///
    /// When initialisation fails, whatever was set up is freed before the error is returned.
    pub fn acquire(
        engine: &'e E,
        idx: LpIdx,
        vlp: &VlpRecord,
        opt: &OptRecord,
    ) -> Result<Self, EngineError> {
        match engine.lp_init(idx, vlp, opt) {
            Ok(()) => Ok(LpLease { engine, idx }),
            Err(err) => {
                engine.lp_free(idx);
                Err(err)
            }
        }
    }

    pub fn idx(&self) -> LpIdx {
        self.idx
    }
}

impl<E: VlpAlgorithm + ?Sized> Drop for LpLease<'_, E> {
    fn drop(&mut self) {
        self.engine.lp_free(self.idx);
    }
}
