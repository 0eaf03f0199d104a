//! Fallibly allocated storage for the members of the solver records
use std::ops::Deref;

use thiserror::Error;

/// Raised when storage for a record member could not be reserved
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("failed to allocate storage for {requested} elements")]
pub struct AllocationError {
    /// Number of elements that were requested
    pub requested: usize,
}

/// Owned, fixed length storage for one record member
///
/// Allocation goes through [`Vec::try_reserve_exact`], so running out of memory surfaces as an
/// [`AllocationError`] instead of aborting the process.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeBuffer<T> {
    data: Box<[T]>,
}

impl<T> NativeBuffer<T> {
    /// Allocate a buffer holding the items of an exact size iterator
    pub fn try_from_iter<I>(items: I) -> Result<Self, AllocationError>
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: ExactSizeIterator,
    {
        let items = items.into_iter();
        let mut data = Vec::new();
        reserve(&mut data, items.len())?;
        data.extend(items);
        Ok(Self {
            data: data.into_boxed_slice(),
        })
    }

    /// Number of elements in the buffer
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }
}

impl<T: Clone> NativeBuffer<T> {
    /// Allocate a buffer holding a copy of `items`
    pub fn try_from_slice(items: &[T]) -> Result<Self, AllocationError> {
        Self::try_from_iter(items.iter().cloned())
    }

    /// Allocate a buffer of `len` copies of `value`
    pub fn try_filled(len: usize, value: T) -> Result<Self, AllocationError> {
        Self::try_from_iter(std::iter::repeat(value).take(len))
    }
}

impl<T> Deref for NativeBuffer<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.data
    }
}

fn reserve<T>(data: &mut Vec<T>, len: usize) -> Result<(), AllocationError> {
    #[cfg(test)]
    failure::check(len)?;
    data.try_reserve_exact(len)
        .map_err(|_| AllocationError { requested: len })
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_from_slice() {
        let buffer = NativeBuffer::try_from_slice(&[1f64, 2., 3.]).unwrap();
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.as_slice(), &[1., 2., 3.]);
        assert!((buffer[1] - 2.).abs() < 1e-25);
    }

    #[test]
    fn filled_buffer() {
        let buffer = NativeBuffer::try_filled(4, 0.5f64).unwrap();
        assert_eq!(buffer.len(), 4);
        assert!(buffer.iter().all(|v| (*v - 0.5).abs() < 1e-25));
        let empty: NativeBuffer<f64> = NativeBuffer::try_filled(0, 1.).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn injected_failure() {
        failure::fail_after(1);
        assert!(NativeBuffer::try_filled(2, 1u8).is_ok());
        match NativeBuffer::try_filled(5, 1u8) {
            Err(AllocationError { requested }) => assert_eq!(requested, 5),
            Ok(_) => panic!("Injected allocation failure not reported"),
        }
        failure::reset();
        assert!(NativeBuffer::try_filled(5, 1u8).is_ok());
    }
}
