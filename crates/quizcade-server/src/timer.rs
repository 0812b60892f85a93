use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// One pending timer per room: either the question budget or the reveal
/// delay, never both. Arming replaces (and aborts) whatever was pending.
pub struct TimerMap {
    handles: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl TimerMap {
    pub fn new() -> Self {
        Self {
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Run `task` after `delay`, replacing any timer already armed for this
    /// room. The task itself must re-check room state when it fires; a stale
    /// timer losing the race to an abort is normal.
    pub async fn arm<F>(&self, room_code: &str, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
        let mut handles = self.handles.lock().await;
        if let Some(old) = handles.insert(room_code.to_string(), handle) {
            old.abort();
        }
    }

    /// Abort the room's pending timer, if any.
    pub async fn cancel(&self, room_code: &str) {
        let mut handles = self.handles.lock().await;
        if let Some(handle) = handles.remove(room_code) {
            handle.abort();
        }
    }
}

impl Default for TimerMap {
    fn default() -> Self {
        Self::new()
    }
}
