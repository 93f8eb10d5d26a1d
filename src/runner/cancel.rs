//! External cancellation for a running loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

/// Checked by the loop between iterations.
#[async_trait]
pub trait CancelSignal: Send + Sync {
    /// Check if the run should stop before its next generator call.
    async fn is_cancelled(&self) -> bool;
}

/// Cancel signal that never fires.
pub struct NeverCancel;

#[async_trait]
impl CancelSignal for NeverCancel {
    async fn is_cancelled(&self) -> bool {
        false
    }
}

/// Shared flag; clones observe the same cancellation.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CancelSignal for CancellationFlag {
    async fn is_cancelled(&self) -> bool {
        self.is_set()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_never_cancel() {
        assert!(!NeverCancel.is_cancelled().await);
    }

    #[tokio::test]
    async fn test_cancellation_flag_shared_between_clones() {
        let flag = CancellationFlag::new();
        let handle = flag.clone();
        assert!(!flag.is_cancelled().await);

        handle.cancel();
        assert!(flag.is_cancelled().await);
        assert!(flag.is_set());

        handle.cancel();
        assert!(flag.is_set());
    }
}
