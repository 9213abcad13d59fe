//! Allocator with a shared budget of successful allocations, for exercising
//! out-of-memory paths.

use crate::pooled_alloc::FreshAllocator;
use allocator_api2::alloc::{AllocError, Allocator, Global};
use core::alloc::Layout;
use core::cell::Cell;
use core::ptr::NonNull;
use std::rc::Rc;

#[derive(Clone, Debug)]
pub(crate) struct BudgetAllocator {
    left: Rc<Cell<usize>>,
}

impl BudgetAllocator {
    /// Allow `n` more non-empty allocations across all clones.
    pub(crate) fn new(n: usize) -> Self {
        Self {
            left: Rc::new(Cell::new(n)),
        }
    }

    pub(crate) fn refill(&self, n: usize) {
        self.left.set(self.left.get() + n);
    }
}

unsafe impl Allocator for BudgetAllocator {
    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
        if layout.size() != 0 {
            let left = self.left.get();
            if left == 0 {
                return Err(AllocError);
            }
            self.left.set(left - 1);
        }
        Global.allocate(layout)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        Global.deallocate(ptr, layout)
    }
}

impl FreshAllocator for BudgetAllocator {
    fn fresh(&self) -> Self {
        Self::new(usize::MAX)
    }
}
