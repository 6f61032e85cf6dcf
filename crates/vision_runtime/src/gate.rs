use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// In-flight flag for frame processing. At most one [`TickPermit`] exists at a time.
#[derive(Debug, Clone, Default)]
pub struct TickGate(Arc<AtomicBool>);

impl TickGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` while a tick is already in flight.
    pub fn try_enter(&self) -> Option<TickPermit> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| TickPermit(Arc::clone(&self.0)))
    }

    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Held for the duration of one tick; dropping it reopens the gate.
#[derive(Debug)]
pub struct TickPermit(Arc<AtomicBool>);

impl Drop for TickPermit {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
