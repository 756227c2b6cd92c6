use std::sync::Arc;

use tokio::sync::watch;

/// Cooperative suspension switch checked by a runner between rows.
#[derive(Debug, Clone)]
pub struct PauseSignal {
    state: Arc<watch::Sender<bool>>,
}

impl Default for PauseSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl PauseSignal {
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self {
            state: Arc::new(state),
        }
    }

    /// Arms the signal. Returns `false` when it was already armed.
    pub fn pause(&self) -> bool {
        self.state.send_if_modified(|paused| !std::mem::replace(paused, true))
    }

    /// Releases the signal. Returns `false` when it was not armed.
    pub fn resume(&self) -> bool {
        self.state.send_if_modified(|paused| std::mem::replace(paused, false))
    }

    pub fn is_paused(&self) -> bool {
        *self.state.borrow()
    }

    /// Completes immediately unless armed, otherwise when released.
    pub async fn wait_until_resumed(&self) {
        let mut receiver = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = receiver.wait_for(|paused| !*paused).await;
    }
}
