use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU8, Ordering};

/// A source of reusable values, consulted whenever a version record needs a
/// fresh buffer. Implementations must never hand out the same value to two
/// concurrent callers.
pub trait Pool<T> {
    fn acquire(&self) -> Option<T>;
    fn release(&self, value: T);
}

/// Every request allocates a fresh value; every returned value is dropped.
/// The baseline implementation, useful when reuse is not worth the
/// synchronization overhead (e.g. short-lived storages, tests).
#[derive(Debug, Default)]
pub struct UnpooledPool;

impl<T> Pool<T> for UnpooledPool {
    fn acquire(&self) -> Option<T> {
        None
    }

    fn release(&self, _value: T) {}
}

const EMPTY: u8 = 0;
const BUSY: u8 = 1;
const FILLED: u8 = 2;

/// A single cached instance guarded by a three-state atomic: `Empty` (no
/// instance cached), `Busy` (a thread is transitionally reading or writing the
/// cell), `Filled` (an instance is cached and ready to be taken). `Busy` is
/// held only for the instant it takes to move a value into or out of the
/// cell; a contending thread that observes `Busy` treats it exactly like
/// `Empty` and falls back to allocation rather than spinning.
pub struct SingleSlotPool<T> {
    state: AtomicU8,
    slot: UnsafeCell<Option<T>>,
}

impl<T> Default for SingleSlotPool<T> {
    fn default() -> Self {
        SingleSlotPool {
            state: AtomicU8::new(EMPTY),
            slot: UnsafeCell::new(None),
        }
    }
}

// SAFETY: access to `slot` is gated entirely by the `state` compare-exchange
// below, which admits at most one thread into the `Busy` critical section at
// a time.
unsafe impl<T: Send> Sync for SingleSlotPool<T> {}

impl<T> SingleSlotPool<T> {
    pub fn new() -> Self {
        SingleSlotPool::default()
    }
}

impl<T> Pool<T> for SingleSlotPool<T> {
    fn acquire(&self) -> Option<T> {
        if self
            .state
            .compare_exchange(FILLED, BUSY, Ordering::Acquire, Ordering::Acquire)
            .is_err()
        {
            log::trace!("pool slot miss, falling back to allocation");
            return None;
        }
        // SAFETY: we are the sole holder of the Busy state.
        let value = unsafe { (*self.slot.get()).take() };
        self.state.store(EMPTY, Ordering::Release);
        value
    }

    fn release(&self, value: T) {
        if self
            .state
            .compare_exchange(EMPTY, BUSY, Ordering::Acquire, Ordering::Acquire)
            .is_err()
        {
            // Slot already filled or mid-transition elsewhere: drop the value
            // instead of spinning for a slot that another release already won.
            log::trace!("pool slot contended on release, dropping surplus value");
            return;
        }
        // SAFETY: we are the sole holder of the Busy state.
        unsafe {
            *self.slot.get() = Some(value);
        }
        self.state.store(FILLED, Ordering::Release);
    }
}
