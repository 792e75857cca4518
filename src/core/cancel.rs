use std::sync::{Arc, Mutex, PoisonError};

use tokio_util::sync::CancellationToken;

/// Shared stop signal for the turn in flight.
///
/// The UI side calls [`cancel`](Self::cancel) at any time; the session calls
/// [`reset`](Self::reset) when a new turn starts, which swaps in a fresh
/// token.
#[derive(Clone, Debug, Default)]
pub struct CancellationChannel {
    current: Arc<Mutex<CancellationToken>>,
}

impl CancellationChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.lock().cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.lock().is_cancelled()
    }

    /// Installs a fresh token and returns it for the turn that is starting.
    pub fn reset(&self) -> CancellationToken {
        let mut guard = self.lock();
        *guard = CancellationToken::new();
        guard.clone()
    }

    pub fn token(&self) -> CancellationToken {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CancellationToken> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
