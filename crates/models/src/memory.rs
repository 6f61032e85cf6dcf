//! Accounting for live tensors and model weights.
//!
//! Tensors are freed by ownership; the ledger records what each scope
//! registered so tests and logs can observe that every scope gave it back.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub tensors: usize,
    pub bytes: usize,
}

#[derive(Debug, Default)]
pub struct MemoryLedger {
    tensors: AtomicUsize,
    bytes: AtomicUsize,
    peak_bytes: AtomicUsize,
}

impl MemoryLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            tensors: self.tensors.load(Ordering::SeqCst),
            bytes: self.bytes.load(Ordering::SeqCst),
        }
    }

    pub fn peak_bytes(&self) -> usize {
        self.peak_bytes.load(Ordering::SeqCst)
    }

    fn acquire(&self, tensors: usize, bytes: usize) {
        self.tensors.fetch_add(tensors, Ordering::SeqCst);
        let now = self.bytes.fetch_add(bytes, Ordering::SeqCst) + bytes;
        self.peak_bytes.fetch_max(now, Ordering::SeqCst);
    }

    fn release(&self, tensors: usize, bytes: usize) {
        self.tensors.fetch_sub(tensors, Ordering::SeqCst);
        self.bytes.fetch_sub(bytes, Ordering::SeqCst);
    }

    /// Open a scope; everything it tracks is released when it drops.
    pub fn scope(self: &Arc<Self>, label: &'static str) -> TensorScope {
        TensorScope {
            ledger: Arc::clone(self),
            label,
            tensors: 0,
            bytes: 0,
        }
    }
}

/// RAII registration of tensors (or a loaded model) against a ledger.
#[derive(Debug)]
pub struct TensorScope {
    ledger: Arc<MemoryLedger>,
    label: &'static str,
    tensors: usize,
    bytes: usize,
}

impl TensorScope {
    pub fn track<B: Backend, const D: usize>(&mut self, tensor: &Tensor<B, D>) {
        let bytes = tensor.shape().num_elements() * std::mem::size_of::<f32>();
        self.track_raw(1, bytes);
    }

    pub fn track_raw(&mut self, tensors: usize, bytes: usize) {
        self.ledger.acquire(tensors, bytes);
        self.tensors += tensors;
        self.bytes += bytes;
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn tracked(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            tensors: self.tensors,
            bytes: self.bytes,
        }
    }
}

impl Drop for TensorScope {
    fn drop(&mut self) {
        self.ledger.release(self.tensors, self.bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn scope_releases_on_drop_even_when_unwinding() {
        let ledger = MemoryLedger::new();
        {
            let mut scope = ledger.scope("step");
            let t = Tensor::<NdArray<f32>, 2>::zeros([4, 4], &Default::default());
            scope.track(&t);
            assert_eq!(ledger.snapshot(), LedgerSnapshot { tensors: 1, bytes: 64 });
        }
        assert_eq!(ledger.snapshot(), LedgerSnapshot::default());

        let l2 = Arc::clone(&ledger);
        let result = std::panic::catch_unwind(move || {
            let mut scope = l2.scope("frame");
            scope.track_raw(3, 300);
            panic!("detector blew up");
        });
        assert!(result.is_err());
        assert_eq!(ledger.snapshot(), LedgerSnapshot::default());
        assert_eq!(ledger.peak_bytes(), 300);
    }
}
