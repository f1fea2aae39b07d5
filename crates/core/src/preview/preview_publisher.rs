use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, TryLockError};

/// Single-value mailbox: the writer never waits, readers get the newest value.
pub struct LatestSlot<T> {
    value: Mutex<Option<Arc<T>>>,
}

impl<T> LatestSlot<T> {
    pub fn new() -> Self {
        Self {
            value: Mutex::new(None),
        }
    }

    /// Replaces the held value unless a reader holds the lock right now, in
    /// which case `value` is dropped. Returns whether it was stored.
    pub fn offer(&self, value: T) -> bool {
        self.offer_if(value, || true)
    }

    /// Like `offer`, but `accept` is evaluated while the lock is held and the
    /// value is dropped when it returns false.
    pub fn offer_if(&self, value: T, accept: impl FnOnce() -> bool) -> bool {
        let mut slot = match self.value.try_lock() {
            Ok(slot) => slot,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return false,
        };
        if !accept() {
            return false;
        }
        *slot = Some(Arc::new(value));
        true
    }

    pub fn latest(&self) -> Option<Arc<T>> {
        self.value.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn clear(&self) {
        *self.value.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

impl<T> Default for LatestSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Hands annotated preview frames from the capture thread to whoever wants
/// to display them.
///
/// While disabled the capture loop skips annotation entirely.
pub struct PreviewPublisher<T = crate::shared::frame::Frame> {
    enabled: AtomicBool,
    slot: LatestSlot<T>,
}

impl<T> PreviewPublisher<T> {
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(false),
            slot: LatestSlot::new(),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        if !enabled {
            self.slot.clear();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Stores `frame` as the latest preview. Never blocks; a frame published
    /// while disabled or while a reader holds the slot is dropped.
    pub fn publish(&self, frame: T) -> bool {
        if !self.is_enabled() {
            return false;
        }
        // Re-checked under the slot lock so a concurrent disable cannot be
        // followed by a store.
        self.slot.offer_if(frame, || self.is_enabled())
    }

    pub fn latest(&self) -> Option<Arc<T>> {
        self.slot.latest()
    }

    pub fn clear(&self) {
        self.slot.clear();
    }
}

impl<T> Default for PreviewPublisher<T> {
    fn default() -> Self {
        Self::new()
    }
}
