use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic search counter used to discard results of superseded searches.
#[derive(Debug, Default)]
pub struct GenerationGuard {
    current: AtomicU64,
}

impl GenerationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new generation and returns it.
    pub fn advance(&self) -> u64 {
        self.current.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn current(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.current() == generation
    }
}

/// Identifier attached to a rendered row, unique across searches.
pub fn row_id(generation: u64, index: usize) -> String {
    format!("{generation}-{index}")
}
