//! Error type shared by the pool, the list, the index and the map.

use allocator_api2::collections::{TryReserveError, TryReserveErrorKind};
use core::alloc::Layout;
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// An allocation could not be satisfied by the pool or the system.
    #[error("out of memory: {size} bytes with {align} byte alignment")]
    OutOfMemory { size: usize, align: usize },

    /// `at` was asked for a key the map does not contain.
    #[error("key not found")]
    KeyNotFound,

    /// The position was erased, or was handed out by another container.
    #[error("position does not refer to a live element of this container")]
    InvalidPosition,
}

pub type Result<T, E = Error> = core::result::Result<T, E>;

impl Error {
    pub(crate) fn out_of_memory(layout: Layout) -> Self {
        Error::OutOfMemory {
            size: layout.size(),
            align: layout.align(),
        }
    }

    pub(crate) fn out_of_memory_for<T>() -> Self {
        Self::out_of_memory(Layout::new::<T>())
    }
}

impl From<TryReserveError> for Error {
    fn from(e: TryReserveError) -> Self {
        match e.kind() {
            TryReserveErrorKind::AllocError { layout, .. } => Error::out_of_memory(layout),
            TryReserveErrorKind::CapacityOverflow => Error::OutOfMemory {
                size: usize::MAX,
                align: 1,
            },
        }
    }
}

/// Diverges for allocation failures reached from infallible entry points
/// (`Clone`, `Extend`, `new`).
#[cold]
pub(crate) fn handle_alloc_error(err: Error) -> ! {
    match err {
        Error::OutOfMemory { size, align } => match Layout::from_size_align(size, align) {
            Ok(layout) => allocator_api2::alloc::handle_alloc_error(layout),
            Err(_) => panic!("capacity overflow"),
        },
        other => panic!("{other}"),
    }
}
