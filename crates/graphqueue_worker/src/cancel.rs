use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative stop signal for the worker loop. Checked between long-sleep
/// points, never used to interrupt an in-flight upstream call.
#[derive(Debug, Clone, Default)]
pub struct StopToken {
    stopped: Arc<AtomicBool>,
}

impl StopToken {
    pub fn new() -> Self {
        Self {
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}
